//! # Fabric Pulse
//!
//! Fleet health dashboard and configuration drift warden for Arista EOS
//! fabrics.
//!
//! Fabric Pulse resolves a group of devices from an Ansible inventory,
//! shows their health at a glance, compares every running configuration
//! with an approved golden file, and can drive drifted devices back to
//! golden with `configure replace` followed by a verification pass.
//!
//! ## Features
//!
//! - Arista eAPI (JSON-RPC over HTTP/HTTPS) and EOS CLI over SSH via russh
//! - Bounded concurrent fan-out across the fleet
//! - Per-field and per-device failure isolation: one bad device or command
//!   never aborts the run
//! - Detect → Report → Fix → Verify with a single operator confirmation
//! - Read-only query tools: inventory check, Loopback0 ping mesh, VLAN brief
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fabric_pulse::{
//!     BaselineStore, Console, FleetConnector, InventorySource, Pulse, PulseOptions,
//!     SessionConfig, StagingArea, TransportKind,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), fabric_pulse::Error> {
//!     let config = SessionConfig::new(TransportKind::Https, "admin", "admin").with_insecure(true);
//!     let connector = FleetConnector::new(config)?;
//!
//!     let pulse = Pulse::new(
//!         &connector,
//!         BaselineStore::new("build/configs"),
//!         StagingArea::new("clab-dc1_fabric"),
//!         PulseOptions::default(),
//!     );
//!
//!     let mut console = Console::stdio(true);
//!     let status = pulse
//!         .run(&mut console, &InventorySource::from_path("inventory/inventory.yml"))
//!         .await?;
//!     std::process::exit(status.code().into());
//! }
//! ```

pub mod channel;
pub mod device;
pub mod drift;
pub mod error;
pub mod facts;
pub mod health;
pub mod inventory;
pub mod pulse;
pub mod remediation;
pub mod report;
pub mod snapshot;
pub mod tools;
pub mod transport;

// Re-export main types for convenience
pub use device::Device;
pub use drift::{BaselineStore, DriftDetector, DriftReport, DriftResult, DriftState};
pub use error::{Error, Result};
pub use health::Health;
pub use inventory::InventorySource;
pub use pulse::{ExitPolicy, Pulse, PulseOptions, RunStatus};
pub use remediation::{Orchestrator, RemediationOutcome, RemediationState, StagingArea};
pub use report::Console;
pub use snapshot::Snapshot;
pub use transport::{FleetConnector, HostKeyVerification, SessionConfig, TransportKind};
