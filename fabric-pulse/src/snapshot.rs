//! Snapshot collection.
//!
//! A [`Snapshot`] is one device's health facts for one poll cycle.
//! Collection never fails: an unreachable device yields a snapshot whose
//! facts are all unavailable, and a failing command degrades only the fact
//! it backs.

use std::collections::BTreeMap;

use futures_util::stream::{self, StreamExt};
use log::{debug, info, warn};
use serde_json::Value;

use crate::device::Device;
use crate::error::FieldParseError;
use crate::facts::{
    self, Celsius, LinkAggState, PeerSummary, Percent, Reading, Uptime, VersionInfo,
};
use crate::health::{self, Health};
use crate::transport::{CommandOutput, Connector, Encoding, Session};

/// Point-in-time health facts for one device.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub device_name: String,
    pub model: Reading<String>,
    pub software_version: Reading<String>,
    pub uptime: Reading<Uptime>,
    pub cpu_load: Reading<Percent>,
    pub max_temperature: Reading<Celsius>,
    pub routing_summary: Reading<PeerSummary>,
    pub link_agg_state: Reading<LinkAggState>,
    pub reachable: bool,
    /// Present only when `reachable` is false.
    pub error_detail: Option<String>,
}

impl Snapshot {
    /// Snapshot for a device that could not be reached.
    pub fn unreachable(device_name: impl Into<String>, detail: impl Into<String>) -> Self {
        let mut detail = detail.into();
        if detail.is_empty() {
            detail = "unknown error".to_string();
        }
        Self {
            device_name: device_name.into(),
            model: gone(),
            software_version: gone(),
            uptime: gone(),
            cpu_load: gone(),
            max_temperature: gone(),
            routing_summary: gone(),
            link_agg_state: gone(),
            reachable: false,
            error_detail: Some(detail),
        }
    }

    /// Severity from CPU load and temperature.
    pub fn health(&self) -> Health {
        health::evaluate(
            self.cpu_load.as_ref().ok().map(|p| p.0),
            self.max_temperature.as_ref().ok().map(|c| c.0),
        )
    }
}

fn gone<T>() -> Reading<T> {
    Err(FieldParseError::Unreachable)
}

/// Run one structured command and extract a fact from it.
async fn query<S, T>(
    session: &mut S,
    command: &str,
    extract: fn(&Value) -> Reading<T>,
) -> Reading<T>
where
    S: Session,
{
    match session.execute_one(command, Encoding::Structured).await {
        Ok(CommandOutput::Structured(value)) => extract(&value),
        Ok(CommandOutput::Text(_)) => Err(FieldParseError::UnexpectedType("output")),
        Err(e) => {
            debug!("'{}' failed: {}", command, e);
            Err(FieldParseError::Command(e.to_string()))
        }
    }
}

/// Collect a snapshot of one device.
///
/// Reachability is decided by connecting and running `show version`. Every
/// other fact is queried with its own command.
pub async fn collect<C: Connector>(connector: &C, device: &Device) -> Snapshot {
    let mut session = match connector.connect(device).await {
        Ok(session) => session,
        Err(e) => {
            warn!("{}: unreachable: {}", device, e);
            return Snapshot::unreachable(&device.name, e.to_string());
        }
    };

    let version = match session
        .execute_one("show version", Encoding::Structured)
        .await
    {
        Ok(CommandOutput::Structured(value)) => facts::version_info(&value),
        Ok(CommandOutput::Text(_)) => {
            session.close().await;
            return Snapshot::unreachable(&device.name, "show version returned text");
        }
        Err(e) => {
            warn!("{}: unreachable: {}", device, e);
            session.close().await;
            return Snapshot::unreachable(&device.name, e.to_string());
        }
    };
    let VersionInfo {
        model,
        software_version,
        uptime,
    } = version;

    let cpu_load = query(&mut session, "show processes top once", facts::cpu_load).await;
    let max_temperature = query(
        &mut session,
        "show system environment temperature",
        facts::max_temperature,
    )
    .await;
    let routing_summary = query(&mut session, "show ip bgp summary", facts::peer_summary).await;
    let link_agg_state = query(&mut session, "show mlag", facts::link_agg_state).await;

    session.close().await;

    Snapshot {
        device_name: device.name.clone(),
        model,
        software_version,
        uptime,
        cpu_load,
        max_temperature,
        routing_summary,
        link_agg_state,
        reachable: true,
        error_detail: None,
    }
}

/// Collect snapshots of every device, at most `concurrency` at a time.
pub async fn collect_fleet<C: Connector>(
    connector: &C,
    devices: &[Device],
    concurrency: usize,
) -> BTreeMap<String, Snapshot> {
    info!("collecting snapshots from {} devices", devices.len());
    stream::iter(devices)
        .map(|device| collect(connector, device))
        .buffer_unordered(concurrency.max(1))
        .map(|snapshot| (snapshot.device_name.clone(), snapshot))
        .collect()
        .await
}
