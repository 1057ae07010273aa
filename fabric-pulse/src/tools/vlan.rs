//! `show vlan brief` across a group, with VLAN rows highlighted.

use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};

use futures_util::stream::{self, StreamExt};
use regex::Regex;

use crate::device::Device;
use crate::error::ConnectionError;
use crate::inventory::InventorySource;
use crate::pulse::{RunStatus, resolve_devices};
use crate::report::{Console, Style};
use crate::transport::{Connector, Encoding, Session};

/// Rows whose first token is a two-digit VLAN id.
fn vlan_row_pattern() -> Result<Regex, regex::Error> {
    Regex::new(r"^\s*(\d{2})\s+")
}

/// Pair each output line with its style: VLAN rows are highlighted.
pub fn highlight_vlans<'a>(output: &'a str, pattern: &Regex) -> Vec<(&'a str, Style)> {
    output
        .lines()
        .map(|line| {
            let style = if pattern.is_match(line) {
                Style::Good
            } else {
                Style::Plain
            };
            (line, style)
        })
        .collect()
}

async fn vlan_text<C: Connector>(connector: &C, device: &Device) -> Result<String, ConnectionError> {
    let mut session = connector.connect(device).await?;
    let output = session.execute_one("show vlan brief", Encoding::Text).await;
    session.close().await;
    Ok(output?.into_text())
}

/// Print `show vlan brief` for every device in `group`.
pub async fn vlan_brief<C: Connector, W: Write, R: BufRead>(
    connector: &C,
    console: &mut Console<W, R>,
    source: &InventorySource,
    group: &str,
    concurrency: usize,
) -> io::Result<RunStatus> {
    let Some(devices) = resolve_devices(console, source, group).await? else {
        return Ok(RunStatus::SetupFailure);
    };
    let pattern = vlan_row_pattern().map_err(io::Error::other)?;

    let replies: BTreeMap<&Device, Result<String, ConnectionError>> = stream::iter(&devices)
        .map(|device| async move { (device, vlan_text(connector, device).await) })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut failures = 0usize;
    for (device, reply) in replies {
        let rule = "=".repeat(20);
        console.line("")?;
        console.styled(
            &format!("{rule} {} ({}) {rule}", device.name, device.address),
            Style::Highlight,
        )?;
        match reply {
            Ok(text) => {
                for (line, style) in highlight_vlans(text.trim_end(), &pattern) {
                    console.styled(line, style)?;
                }
            }
            Err(e) => {
                failures += 1;
                console.line(&format!("ERROR: {e}"))?;
            }
        }
    }

    Ok(if failures > 0 {
        RunStatus::Failure
    } else {
        RunStatus::Success
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::{console, output};
    use crate::tools::testing::write_inventory;
    use crate::transport::mock::{MockDevice, MockFleet};

    const VLANS: &str = "VLAN  Name                             Status    Ports\n\
        ----- -------------------------------- --------- -------------------------------\n\
        1     default                          active    Et3, Et4\n\
        11    VRF10_VLAN11                     active    Cpu, Et5, Vx1\n\
        12    VRF10_VLAN12                     active    Cpu, Vx1\n\
        4094  MLAG_PEER                        active    Cpu, Po1\n\n";

    #[test]
    fn test_highlight_two_digit_vlans() {
        let pattern = vlan_row_pattern().unwrap();
        let styled = highlight_vlans(VLANS, &pattern);
        let highlighted: Vec<&str> = styled
            .iter()
            .filter(|(_, style)| *style == Style::Good)
            .map(|(line, _)| line.split_whitespace().next().unwrap_or(""))
            .collect();
        assert_eq!(highlighted, vec!["11", "12"]);
        assert_eq!(styled[0].1, Style::Plain);
    }

    #[tokio::test]
    async fn test_vlan_brief_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_inventory(
            dir.path(),
            "DC1_L3_LEAVES",
            &[("leaf1", "10.0.0.1"), ("leaf2", "10.0.0.2")],
        );
        let fleet = MockFleet::new()
            .with_device("10.0.0.1", MockDevice::healthy("").with_text("show vlan brief", VLANS))
            .with_device("10.0.0.2", MockDevice::unreachable());

        let mut console = console("");
        let status = vlan_brief(
            &fleet,
            &mut console,
            &InventorySource::from_path(&path),
            "DC1_L3_LEAVES",
            4,
        )
        .await
        .unwrap();

        assert_eq!(status, RunStatus::Failure);
        let out = output(console);
        assert!(out.contains("==================== leaf1 (10.0.0.1) ===================="));
        assert!(out.contains("11    VRF10_VLAN11"));
        assert!(out.contains("==================== leaf2 (10.0.0.2) ===================="));
        assert!(out.contains("ERROR: "));
        assert!(!out.ends_with("\n\n\n"));
    }

    #[test]
    fn test_all_reachable_is_success() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_inventory(dir.path(), "DC1_L3_LEAVES", &[("leaf1", "10.0.0.1")]);
        let fleet = MockFleet::new()
            .with_device("10.0.0.1", MockDevice::healthy("").with_text("show vlan brief", VLANS));

        let mut console = console("");
        let status = tokio_test::block_on(vlan_brief(
            &fleet,
            &mut console,
            &InventorySource::from_path(&path),
            "DC1_L3_LEAVES",
            1,
        ))
        .unwrap();
        assert_eq!(status, RunStatus::Success);
    }
}
