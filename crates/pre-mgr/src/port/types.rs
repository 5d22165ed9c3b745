use pre_driver::DevPort;
use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// Port attributes a call reads or writes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PortFields: u8 {
        const BACKUP_PORT = 1;
        const FORWARD = 1 << 1;
        /// Write-only. Naming it on a read leaves the field `None`.
        const CLEAR_FAST_FAILOVER = 1 << 2;
        const COPY_TO_CPU = 1 << 3;
    }
}

/// Attributes of a device port. Only the fields that are `Some` are written
/// or read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortData {
    /// Protection port used when this port fails over.
    pub backup_port: Option<DevPort>,
    /// Multicast forwarding towards the port.
    pub forward: Option<bool>,
    /// `Some(true)` clears the latched fast-failover state. The hardware has
    /// no getter for it, so reads leave it `None`.
    pub clear_fast_failover: Option<bool>,
    pub copy_to_cpu: Option<bool>,
}

impl PortData {
    /// Readable attributes of a port nobody has configured.
    pub fn defaults(port: DevPort) -> Self {
        Self {
            backup_port: Some(port),
            forward: Some(true),
            clear_fast_failover: None,
            copy_to_cpu: Some(false),
        }
    }

    pub fn with_backup_port(mut self, port: DevPort) -> Self {
        self.backup_port = Some(port);
        self
    }

    pub fn with_forward(mut self, enabled: bool) -> Self {
        self.forward = Some(enabled);
        self
    }

    pub fn with_clear_fast_failover(mut self) -> Self {
        self.clear_fast_failover = Some(true);
        self
    }

    pub fn with_copy_to_cpu(mut self, enabled: bool) -> Self {
        self.copy_to_cpu = Some(enabled);
        self
    }

    /// The fields that are `Some`.
    pub fn fields(&self) -> PortFields {
        let mut fields = PortFields::empty();
        fields.set(PortFields::BACKUP_PORT, self.backup_port.is_some());
        fields.set(PortFields::FORWARD, self.forward.is_some());
        fields.set(PortFields::CLEAR_FAST_FAILOVER, self.clear_fast_failover.is_some());
        fields.set(PortFields::COPY_TO_CPU, self.copy_to_cpu.is_some());
        fields
    }

    /// Number of driver writes a set of this data issues.
    pub(crate) fn write_count(&self) -> usize {
        [
            self.backup_port.is_some(),
            self.forward.is_some(),
            self.copy_to_cpu.is_some(),
            self.clear_fast_failover == Some(true),
        ]
        .iter()
        .filter(|write| **write)
        .count()
    }
}
