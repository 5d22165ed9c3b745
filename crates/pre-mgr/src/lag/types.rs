use pre_driver::{DevPort, RemoteLagCount};
use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// LAG entry fields a call reads or writes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LagFields: u8 {
        const PORTS = 1;
        const REMOTE_COUNT = 1 << 1;
    }
}

/// Fields of a LAG entry. `None` leaves the field untouched on write and
/// marks a field that was not read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LagData {
    pub ports: Option<Vec<DevPort>>,
    #[serde(with = "remote_count", default)]
    pub remote_count: Option<RemoteLagCount>,
}

impl LagData {
    /// No member ports and zero remote counts.
    pub fn empty() -> Self {
        Self {
            ports: Some(Vec::new()),
            remote_count: Some(RemoteLagCount::default()),
        }
    }

    pub fn with_ports(mut self, ports: impl IntoIterator<Item = DevPort>) -> Self {
        self.ports = Some(ports.into_iter().collect());
        self
    }

    pub fn with_remote_count(mut self, msb: u32, lsb: u32) -> Self {
        self.remote_count = Some(RemoteLagCount { msb, lsb });
        self
    }

    /// The fields that are `Some`.
    pub fn fields(&self) -> LagFields {
        let mut fields = LagFields::empty();
        fields.set(LagFields::PORTS, self.ports.is_some());
        fields.set(LagFields::REMOTE_COUNT, self.remote_count.is_some());
        fields
    }
}

/// `RemoteLagCount` lives in the driver crate, which carries no serde
/// support; it is written as a `[msb, lsb]` pair.
mod remote_count {
    use pre_driver::RemoteLagCount;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        count: &Option<RemoteLagCount>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        count.map(|c| [c.msb, c.lsb]).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<RemoteLagCount>, D::Error> {
        let pair = Option::<[u32; 2]>::deserialize(deserializer)?;
        Ok(pair.map(|[msb, lsb]| RemoteLagCount { msb, lsb }))
    }
}
