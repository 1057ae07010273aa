//! Read-only fleet queries.
//!
//! Each tool resolves an inventory group, talks to every device through the
//! same [`Connector`](crate::transport::Connector) the pulse uses, prints
//! its own report and returns a [`RunStatus`](crate::pulse::RunStatus).

mod inventory_check;
mod ping;
mod vlan;

pub use inventory_check::inventory_check;
pub use ping::{PingOptions, PingPatterns, PingVerdict, ping_loopbacks};
pub use vlan::{highlight_vlans, vlan_brief};

#[cfg(test)]
pub(crate) mod testing {
    use std::path::{Path, PathBuf};

    use serde_json::json;

    /// Write a rendered inventory with one group of `(host, address)` pairs.
    pub(crate) fn write_inventory(dir: &Path, group: &str, hosts: &[(&str, &str)]) -> PathBuf {
        let hostvars: serde_json::Map<String, serde_json::Value> = hosts
            .iter()
            .map(|(host, address)| (host.to_string(), json!({"ansible_host": address})))
            .collect();
        let names: Vec<&str> = hosts.iter().map(|(host, _)| *host).collect();
        let document = json!({
            group: {"hosts": names},
            "_meta": {"hostvars": hostvars},
        });

        let path = dir.join("inventory.json");
        std::fs::write(&path, document.to_string()).unwrap();
        path
    }
}
