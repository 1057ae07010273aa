//! Device identity.

use std::fmt;

/// A fleet member as resolved from the inventory.
///
/// `name` is the inventory hostname and the key used everywhere else
/// (golden file names, staging directories, result maps). `address` is the
/// management endpoint used to open sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Device {
    /// Inventory hostname.
    pub name: String,

    /// Management address (IP or FQDN).
    pub address: String,
}

impl Device {
    /// Create a new device.
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}
