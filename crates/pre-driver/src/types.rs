//! Type-safe PRE handle wrappers and driver-facing value types.
//!
//! Handles are opaque values allocated by the driver. The phantom kind
//! parameter keeps a node handle from being passed where a group or ECMP
//! handle is expected.

use std::cmp::Ordering;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

/// Raw handle type as allocated by the driver.
pub type RawHandle = u32;

/// Reserved all-ones handle. Never a live object; iteration primitives write
/// it into unused buffer slots to mark the end of a member list.
pub const SENTINEL_HANDLE: RawHandle = RawHandle::MAX;

/// Device identifier.
pub type DevId = u32;

/// Device port number.
pub type DevPort = u32;

/// LAG identifier (key of the LAG table).
pub type LagId = u32;

/// L2 exclusion id (key of the prune table).
pub type L2Xid = u32;

/// L1 exclusion id carried on a group branch.
pub type L1Xid = u16;

/// Replication id carried by an L1 node.
pub type Rid = u16;

/// Multicast group index as programmed into the ASIC.
pub type Mgid = u16;

/// Pipe identifier inside a device.
pub type PipeId = u32;

/// Pipe id meaning "every pipe of the device".
pub const ALL_PIPES: PipeId = 0xFFFF;

/// Marker trait for PRE object kinds. Implemented by zero-sized markers.
pub trait PreObjectKind:
    fmt::Debug + Clone + Copy + PartialEq + Eq + Hash + Send + Sync + 'static
{
    /// Returns the object type name for debugging.
    fn type_name() -> &'static str;
}

/// A type-safe PRE object handle.
///
/// # Examples
///
/// ```
/// use pre_driver::{NodeHdl, EcmpHdl};
///
/// let node = NodeHdl::from_raw(0x10).unwrap();
/// let ecmp = EcmpHdl::from_raw(0x10).unwrap();
///
/// // Same raw value, different kinds; this would fail to compile:
/// // assert_eq!(node, ecmp);
/// assert_eq!(node.as_raw(), ecmp.as_raw());
/// ```
#[derive(Clone, Copy)]
pub struct PreHandle<T: PreObjectKind> {
    raw: RawHandle,
    _marker: PhantomData<T>,
}

impl<T: PreObjectKind> PreHandle<T> {
    /// The sentinel handle.
    pub const SENTINEL: Self = Self {
        raw: SENTINEL_HANDLE,
        _marker: PhantomData,
    };

    /// Creates a handle from a raw value.
    ///
    /// Returns `None` for the sentinel value.
    pub fn from_raw(raw: RawHandle) -> Option<Self> {
        if raw == SENTINEL_HANDLE {
            None
        } else {
            Some(Self {
                raw,
                _marker: PhantomData,
            })
        }
    }

    /// Creates a handle from a raw value, including the sentinel.
    pub const fn from_raw_unchecked(raw: RawHandle) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    /// Returns the raw handle value.
    pub const fn as_raw(&self) -> RawHandle {
        self.raw
    }

    /// Returns true if this is the end-of-list sentinel.
    pub const fn is_sentinel(&self) -> bool {
        self.raw == SENTINEL_HANDLE
    }
}

impl<T: PreObjectKind> fmt::Debug for PreHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:08x})", T::type_name(), self.raw)
    }
}

impl<T: PreObjectKind> fmt::Display for PreHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.raw)
    }
}

impl<T: PreObjectKind> PartialEq for PreHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T: PreObjectKind> Eq for PreHandle<T> {}

impl<T: PreObjectKind> PartialOrd for PreHandle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: PreObjectKind> Ord for PreHandle<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl<T: PreObjectKind> Hash for PreHandle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

macro_rules! define_object_kind {
    ($name:ident, $type_name:literal, $hdl_alias:ident) => {
        #[doc = concat!("Marker type for PRE ", $type_name, " objects.")]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name;

        impl PreObjectKind for $name {
            fn type_name() -> &'static str {
                $type_name
            }
        }

        #[doc = concat!("Handle of a PRE ", $type_name, " object.")]
        pub type $hdl_alias = PreHandle<$name>;
    };
}

define_object_kind!(MgidKind, "Mgid", MgidHdl);
define_object_kind!(NodeKind, "Node", NodeHdl);
define_object_kind!(EcmpKind, "Ecmp", EcmpHdl);

/// Session handle issued by the session façade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle(pub u32);

/// Device/pipe pair every table operation is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target {
    pub dev_id: DevId,
    pub pipe_id: PipeId,
}

impl Target {
    /// Targets every pipe of `dev_id`.
    pub fn device(dev_id: DevId) -> Self {
        Self {
            dev_id,
            pipe_id: ALL_PIPES,
        }
    }
}

/// A member of a multicast group as seen by the driver: the child handle plus
/// the branch's optional L1 exclusion id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupMember<T: PreObjectKind> {
    pub handle: PreHandle<T>,
    pub l1_xid: Option<L1Xid>,
}

impl<T: PreObjectKind> GroupMember<T> {
    pub fn new(handle: PreHandle<T>, l1_xid: Option<L1Xid>) -> Self {
        Self { handle, l1_xid }
    }

    /// An empty buffer slot.
    pub fn sentinel() -> Self {
        Self {
            handle: PreHandle::SENTINEL,
            l1_xid: None,
        }
    }
}

/// Fixed-width bitmap used for port and LAG fan-out sets.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bitmap<const WORDS: usize> {
    words: [u64; WORDS],
}

impl<const WORDS: usize> Bitmap<WORDS> {
    /// Number of addressable bits.
    pub const CAPACITY: usize = WORDS * 64;

    /// Creates an empty bitmap.
    pub const fn new() -> Self {
        Self { words: [0; WORDS] }
    }

    /// Sets `bit`. Returns false if `bit` is beyond the capacity.
    pub fn set(&mut self, bit: usize) -> bool {
        if bit >= Self::CAPACITY {
            return false;
        }
        self.words[bit / 64] |= 1 << (bit % 64);
        true
    }

    /// Clears `bit`. Out-of-range bits are already clear.
    pub fn clear(&mut self, bit: usize) {
        if bit < Self::CAPACITY {
            self.words[bit / 64] &= !(1 << (bit % 64));
        }
    }

    /// Returns true if `bit` is set.
    pub fn contains(&self, bit: usize) -> bool {
        bit < Self::CAPACITY && self.words[bit / 64] & (1 << (bit % 64)) != 0
    }

    /// Returns true if no bit is set.
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Number of set bits.
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterates over set bits in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(i, word)| {
            (0..64).filter_map(move |b| (word & (1 << b) != 0).then_some(i * 64 + b))
        })
    }

    /// Highest set bit, if any.
    pub fn last(&self) -> Option<usize> {
        self.words
            .iter()
            .enumerate()
            .rev()
            .find(|(_, w)| **w != 0)
            .map(|(i, w)| i * 64 + 63 - w.leading_zeros() as usize)
    }
}

impl<const WORDS: usize> Default for Bitmap<WORDS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const WORDS: usize> fmt::Debug for Bitmap<WORDS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Port fan-out bitmap, indexed by device port.
pub type PortMap = Bitmap<8>;

/// LAG fan-out bitmap, indexed by LAG id.
pub type LagMap = Bitmap<4>;

/// Attributes of an L1 node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeAttr {
    pub rid: Rid,
    pub ports: PortMap,
    pub lags: LagMap,
}

/// Remote member counts of a LAG, used for cross-chassis weighting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoteLagCount {
    pub msb: u32,
    pub lsb: u32,
}
