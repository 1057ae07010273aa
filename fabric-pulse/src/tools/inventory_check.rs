//! Hostname and software version of every device in a group.

use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};

use futures_util::stream::{self, StreamExt};
use serde_json::Value;

use crate::device::Device;
use crate::error::ConnectionError;
use crate::facts::UNAVAILABLE;
use crate::inventory::InventorySource;
use crate::pulse::{RunStatus, resolve_devices};
use crate::report::{Console, Style};
use crate::transport::{CommandOutput, Connector, Encoding, Session};

/// What the device says about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Identity {
    hostname: String,
    version: String,
}

async fn identify<C: Connector>(connector: &C, device: &Device) -> Result<Identity, ConnectionError> {
    let mut session = connector.connect(device).await?;
    let outputs = session
        .execute(&["show hostname", "show version"], Encoding::Structured)
        .await;
    session.close().await;
    let outputs = outputs?;

    let field = |index: usize, key: &str| {
        outputs
            .get(index)
            .and_then(CommandOutput::as_structured)
            .and_then(|value| value.get(key))
            .and_then(Value::as_str)
            .unwrap_or(UNAVAILABLE)
            .to_string()
    };
    Ok(Identity {
        hostname: field(0, "hostname"),
        version: field(1, "version"),
    })
}

/// Print hostname and EOS version for each device in `group`.
///
/// Per-device errors are shown inline and do not affect the status.
pub async fn inventory_check<C: Connector, W: Write, R: BufRead>(
    connector: &C,
    console: &mut Console<W, R>,
    source: &InventorySource,
    group: &str,
    concurrency: usize,
) -> io::Result<RunStatus> {
    let Some(devices) = resolve_devices(console, source, group).await? else {
        return Ok(RunStatus::SetupFailure);
    };

    let rows: BTreeMap<String, Result<Identity, ConnectionError>> = stream::iter(&devices)
        .map(|device| async move { (device.name.clone(), identify(connector, device).await) })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    console.line(&format!(
        "{:<15} {:<20} {:<35}",
        "Inventory Host", "Hostname (device)", "EOS Version"
    ))?;
    console.line(&"-".repeat(75))?;

    for (name, row) in &rows {
        match row {
            Ok(identity) => console.line(
                format!("{name:<15} {:<20} {}", identity.hostname, identity.version).trim_end(),
            )?,
            Err(e) => {
                let error = console.paint(&format!("{:<20}", "ERROR"), Style::Bad);
                console.line(&format!("{name:<15} {error} {e}"))?;
            }
        }
    }
    Ok(RunStatus::Success)
}
