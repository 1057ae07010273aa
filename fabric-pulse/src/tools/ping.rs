//! Full-mesh Loopback0 reachability between the leaves of a group.

use std::io::{self, BufRead, Write};
use std::net::Ipv4Addr;

use futures_util::stream::{self, StreamExt};
use log::debug;
use regex::Regex;

use crate::device::Device;
use crate::error::ConnectionError;
use crate::inventory::InventorySource;
use crate::pulse::{RunStatus, resolve_devices};
use crate::report::{Console, Style};
use crate::transport::{Connector, Encoding, Session};

const LOOPBACK_COMMAND: &str = "show ip interface Loopback0";
const RULE_WIDTH: usize = 78;

/// Ping parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingOptions {
    /// Echo requests per destination.
    pub repeat: u32,
    /// Per-request timeout, in seconds.
    pub timeout: u32,
    pub concurrency: usize,
}

impl Default for PingOptions {
    fn default() -> Self {
        Self {
            repeat: 3,
            timeout: 2,
            concurrency: 8,
        }
    }
}

impl PingOptions {
    pub fn command(&self, target: Ipv4Addr) -> String {
        format!(
            "ping {target} source Loopback0 repeat {} timeout {}",
            self.repeat, self.timeout
        )
    }
}

/// Outcome of one ping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingVerdict {
    pub passed: bool,
    pub message: String,
}

/// Parsers for interface and ping output.
#[derive(Debug, Clone)]
pub struct PingPatterns {
    loopback: Regex,
    eos: Regex,
    linux: Regex,
}

impl PingPatterns {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            loopback: Regex::new(r"Internet address is\s+(\d+\.\d+\.\d+\.\d+)/\d+")?,
            eos: Regex::new(r"Success rate is\s+(\d+) percent\s+\((\d+)/(\d+)\)")?,
            linux: Regex::new(
                r"(?i)(\d+) packets transmitted,\s*(\d+) received,\s*(\d+)% packet loss",
            )?,
        })
    }

    /// Primary IPv4 address from `show ip interface Loopback0`.
    pub fn loopback_address(&self, output: &str) -> Option<Ipv4Addr> {
        self.loopback.captures(output)?.get(1)?.as_str().parse().ok()
    }

    /// Judge ping output. EOS reports a success rate; the Linux form
    /// reports packet loss.
    pub fn verdict(&self, output: &str) -> PingVerdict {
        if let Some(caps) = self.eos.captures(output) {
            let percent: u32 = caps[1].parse().unwrap_or(0);
            return PingVerdict {
                passed: percent == 100,
                message: format!("Success rate {}% ({}/{})", percent, &caps[2], &caps[3]),
            };
        }

        if let Some(caps) = self.linux.captures(output) {
            let transmitted: u64 = caps[1].parse().unwrap_or(0);
            let received: u64 = caps[2].parse().unwrap_or(0);
            let loss: u64 = caps[3].parse().unwrap_or(100);
            return PingVerdict {
                passed: transmitted > 0 && loss == 0 && received == transmitted,
                message: format!("Packet loss {loss}% ({received}/{transmitted})"),
            };
        }

        PingVerdict {
            passed: false,
            message: "Could not parse ping result".to_string(),
        }
    }
}

/// One source/destination pair.
#[derive(Debug)]
struct PingRow {
    source: String,
    source_address: Ipv4Addr,
    destination: String,
    destination_address: Ipv4Addr,
    result: Result<PingVerdict, ConnectionError>,
}

/// Open a session and read the device's Loopback0 address. The session is
/// kept for the ping phase.
async fn probe<C: Connector>(
    connector: &C,
    device: &Device,
    patterns: &PingPatterns,
) -> Result<(C::Session, Ipv4Addr), ConnectionError> {
    let mut session = connector.connect(device).await?;
    let address = match session.execute_one(LOOPBACK_COMMAND, Encoding::Text).await {
        Ok(output) => patterns.loopback_address(&output.into_text()),
        Err(e) => {
            session.close().await;
            return Err(e);
        }
    };
    match address {
        Some(address) => Ok((session, address)),
        None => {
            session.close().await;
            Err(ConnectionError::MalformedResponse(
                "Unable to parse Loopback0 IP".to_string(),
            ))
        }
    }
}

/// Ping every leaf's Loopback0 from every other leaf's Loopback0.
pub async fn ping_loopbacks<C: Connector, W: Write, R: BufRead>(
    connector: &C,
    console: &mut Console<W, R>,
    source: &InventorySource,
    group: &str,
    options: PingOptions,
) -> io::Result<RunStatus> {
    let Some(devices) = resolve_devices(console, source, group).await? else {
        return Ok(RunStatus::SetupFailure);
    };
    if devices.len() < 2 {
        console.line("Need at least two leafs in the selected group.")?;
        return Ok(RunStatus::SetupFailure);
    }
    let patterns = PingPatterns::new().map_err(io::Error::other)?;
    let concurrency = options.concurrency.max(1);

    console.line("Collecting Loopback0 IPs...")?;
    let mut probed: Vec<(&Device, Result<(C::Session, Ipv4Addr), ConnectionError>)> =
        stream::iter(&devices)
            .map(|device| {
                let patterns = &patterns;
                async move { (device, probe(connector, device, patterns).await) }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;
    probed.sort_by(|a, b| a.0.name.cmp(&b.0.name));

    let mut failures = 0usize;
    let mut sessions = Vec::new();
    for (device, result) in probed {
        match result {
            Ok((session, address)) => {
                console.line(&format!("  {:<12} -> {}", device.name, address))?;
                sessions.push((device, session, address));
            }
            Err(e) => {
                failures += 1;
                console.line(&format!("  {:<12} -> ERROR: {}", device.name, e))?;
            }
        }
    }

    if sessions.len() < 2 {
        for (_, session, _) in sessions {
            session.close().await;
        }
        console.line("Not enough valid Loopback0 addresses to run matrix ping.")?;
        return Ok(RunStatus::SetupFailure);
    }

    let targets: Vec<(String, Ipv4Addr)> = sessions
        .iter()
        .map(|(device, _, address)| (device.name.clone(), *address))
        .collect();

    console.line("")?;
    console.line("Pinging Loopback0-to-Loopback0 between all leafs:")?;
    console.line(&"-".repeat(RULE_WIDTH))?;
    console.line(&format!(
        "{:<14} {:<16} {:<14} {:<16} Result",
        "Source", "Source Lo0", "Destination", "Dest Lo0"
    ))?;
    console.line(&"-".repeat(RULE_WIDTH))?;

    let batches: Vec<Vec<PingRow>> = stream::iter(sessions)
        .map(|(device, mut session, source_address)| {
            let targets = &targets;
            let patterns = &patterns;
            async move {
                let mut rows = Vec::new();
                for (destination, destination_address) in targets {
                    if *destination == device.name {
                        continue;
                    }
                    let command = options.command(*destination_address);
                    debug!("{}: {}", device.name, command);
                    let result = session
                        .execute_one(&command, Encoding::Text)
                        .await
                        .map(|output| patterns.verdict(&output.into_text()));
                    rows.push(PingRow {
                        source: device.name.clone(),
                        source_address,
                        destination: destination.clone(),
                        destination_address: *destination_address,
                        result,
                    });
                }
                session.close().await;
                rows
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let mut rows: Vec<PingRow> = batches.into_iter().flatten().collect();
    rows.sort_by(|a, b| (&a.source, &a.destination).cmp(&(&b.source, &b.destination)));

    for row in &rows {
        let (state, detail) = match &row.result {
            Ok(verdict) if verdict.passed => (console.paint("PASS", Style::Good), verdict.message.clone()),
            Ok(verdict) => {
                failures += 1;
                (console.paint("FAIL", Style::Bad), verdict.message.clone())
            }
            Err(e) => {
                failures += 1;
                (console.paint("ERROR", Style::Bad), e.to_string())
            }
        };
        console.line(&format!(
            "{:<14} {:<16} {:<14} {:<16} {} - {}",
            row.source,
            row.source_address.to_string(),
            row.destination,
            row.destination_address.to_string(),
            state,
            detail
        ))?;
    }

    console.line(&"-".repeat(RULE_WIDTH))?;
    if failures > 0 {
        console.line(&format!("Completed with {failures} issue(s)."))?;
        return Ok(RunStatus::Failure);
    }
    console.line("All Loopback0-to-Loopback0 pings passed.")?;
    Ok(RunStatus::Success)
}
