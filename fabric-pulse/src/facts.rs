//! Typed extraction of health facts from structured command output.
//!
//! One function per fact. Each returns a [`Reading`]: the value, or the
//! reason it is unavailable. Callers never probe JSON themselves.

use std::fmt;

use serde_json::Value;

use crate::error::FieldParseError;

/// A single fact: present, or unavailable with a cause.
pub type Reading<T> = Result<T, FieldParseError>;

/// Text shown for an unavailable fact.
pub const UNAVAILABLE: &str = "n/a";

/// Render a reading, using [`UNAVAILABLE`] for errors.
pub fn render<T: fmt::Display>(reading: &Reading<T>) -> String {
    match reading {
        Ok(value) => value.to_string(),
        Err(_) => UNAVAILABLE.to_string(),
    }
}

/// Device uptime in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Uptime(pub u64);

impl fmt::Display for Uptime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let days = self.0 / 86_400;
        let hours = (self.0 % 86_400) / 3_600;
        let minutes = (self.0 % 3_600) / 60;
        write!(f, "{days}d {hours}h {minutes}m")
    }
}

/// CPU utilisation in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Percent(pub f64);

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}%", self.0)
    }
}

/// Temperature in degrees Celsius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Celsius(pub f64);

impl fmt::Display for Celsius {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}C", self.0)
    }
}

/// Established versus configured BGP peers across all VRFs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerSummary {
    pub established: usize,
    pub total: usize,
}

impl fmt::Display for PeerSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} up", self.established, self.total)
    }
}

/// MLAG state as reported by `show mlag`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkAggState {
    Active,
    Enabled,
    Inactive,
    Disabled,
    Other(String),
}

impl LinkAggState {
    /// Parse a reported state; matching is case-insensitive.
    pub fn parse(state: &str) -> Self {
        match state.to_ascii_lowercase().as_str() {
            "active" => Self::Active,
            "enabled" => Self::Enabled,
            "inactive" => Self::Inactive,
            "disabled" | "" => Self::Disabled,
            _ => Self::Other(state.to_string()),
        }
    }
}

impl fmt::Display for LinkAggState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => f.write_str("active"),
            Self::Enabled => f.write_str("enabled"),
            Self::Inactive => f.write_str("inactive"),
            Self::Disabled => f.write_str("disabled"),
            Self::Other(state) => f.write_str(state),
        }
    }
}

/// Facts carried by `show version`.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionInfo {
    pub model: Reading<String>,
    pub software_version: Reading<String>,
    pub uptime: Reading<Uptime>,
}

fn string_field(value: &Value, key: &'static str) -> Reading<String> {
    match value.get(key) {
        None | Some(Value::Null) => Err(FieldParseError::Missing(key)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(_) => Err(FieldParseError::UnexpectedType(key)),
    }
}

/// Extract model, version and uptime from `show version`.
///
/// Uptime must be an integer number of seconds; anything else is unavailable.
pub fn version_info(value: &Value) -> VersionInfo {
    let uptime = match value.get("uptime") {
        None => Err(FieldParseError::Missing("uptime")),
        Some(v) => v
            .as_u64()
            .map(Uptime)
            .ok_or(FieldParseError::UnexpectedType("uptime")),
    };

    VersionInfo {
        model: string_field(value, "modelName"),
        software_version: string_field(value, "version"),
        uptime,
    }
}

/// Extract CPU utilisation from `show processes top once`.
pub fn cpu_load(value: &Value) -> Reading<Percent> {
    for key in ["cpu", "cpuUtilization", "cpuTotal"] {
        if let Some(load) = value.get(key).and_then(Value::as_f64) {
            return Ok(Percent(load));
        }
    }

    value
        .pointer("/cpuInfo/%Cpu(s)/idle")
        .and_then(Value::as_f64)
        .map(|idle| Percent(100.0 - idle))
        .ok_or(FieldParseError::Missing("cpu"))
}

/// Iterate the entries of a JSON object or array.
fn entries(value: &Value) -> Box<dyn Iterator<Item = &Value> + '_> {
    match value {
        Value::Object(map) => Box::new(map.values()),
        Value::Array(items) => Box::new(items.iter()),
        _ => Box::new(std::iter::empty()),
    }
}

/// Extract the hottest sensor from `show system environment temperature`.
///
/// Sensors are looked up in card slots, power supply slots and the
/// top-level sensor list, including sensors nested inside slots.
pub fn max_temperature(value: &Value) -> Reading<Celsius> {
    let mut readings = Vec::new();

    for section in ["cardSlots", "powerSupplySlots", "tempSensors"] {
        let Some(items) = value.get(section) else {
            continue;
        };
        for item in entries(items) {
            if let Some(t) = item.get("currentTemperature").and_then(Value::as_f64) {
                readings.push(t);
            }
            if let Some(nested) = item.get("tempSensors") {
                readings.extend(
                    entries(nested)
                        .filter_map(|sensor| sensor.get("currentTemperature"))
                        .filter_map(Value::as_f64),
                );
            }
        }
    }

    readings
        .into_iter()
        .reduce(f64::max)
        .map(Celsius)
        .ok_or(FieldParseError::Missing("currentTemperature"))
}

/// Count established BGP peers across all VRFs from `show ip bgp summary`.
///
/// A device with no peers at all reports the summary as unavailable.
pub fn peer_summary(value: &Value) -> Reading<PeerSummary> {
    let vrfs = value
        .get("vrfs")
        .and_then(Value::as_object)
        .ok_or(FieldParseError::Missing("vrfs"))?;

    let mut summary = PeerSummary {
        established: 0,
        total: 0,
    };
    for vrf in vrfs.values() {
        let Some(peers) = vrf.get("peers").and_then(Value::as_object) else {
            continue;
        };
        summary.total += peers.len();
        summary.established += peers
            .values()
            .filter(|peer| peer.get("peerState").and_then(Value::as_str) == Some("Established"))
            .count();
    }

    if summary.total == 0 {
        return Err(FieldParseError::Missing("peers"));
    }
    Ok(summary)
}

/// Extract the MLAG state from `show mlag`; no state means MLAG is disabled.
pub fn link_agg_state(value: &Value) -> Reading<LinkAggState> {
    let field = |key: &str| value.get(key).and_then(Value::as_str).filter(|s| !s.is_empty());
    let state = field("state").or_else(|| field("mlagState")).unwrap_or("");
    Ok(LinkAggState::parse(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_uptime_format() {
        assert_eq!(Uptime(90_061).to_string(), "1d 1h 1m");
        assert_eq!(Uptime(59).to_string(), "0d 0h 0m");
        assert_eq!(Uptime(3 * 86_400 + 7 * 3_600 + 42 * 60).to_string(), "3d 7h 42m");
    }

    #[test]
    fn test_version_info() {
        let info = version_info(&json!({
            "modelName": "DCS-7050SX3-48YC8",
            "version": "4.32.0F",
            "uptime": 3600
        }));
        assert_eq!(info.model, Ok("DCS-7050SX3-48YC8".to_string()));
        assert_eq!(info.software_version, Ok("4.32.0F".to_string()));
        assert_eq!(info.uptime, Ok(Uptime(3600)));
    }

    #[test]
    fn test_non_integer_uptime_unavailable() {
        let info = version_info(&json!({"uptime": 3600.75}));
        assert_eq!(info.uptime, Err(FieldParseError::UnexpectedType("uptime")));
        assert_eq!(info.model, Err(FieldParseError::Missing("modelName")));
        assert_eq!(render(&info.uptime), "n/a");

        let info = version_info(&json!({"uptime": "1 day"}));
        assert!(info.uptime.is_err());
    }

    #[test]
    fn test_cpu_load_keys() {
        assert_eq!(cpu_load(&json!({"cpu": 3})), Ok(Percent(3.0)));
        assert_eq!(cpu_load(&json!({"cpuTotal": 7.25})), Ok(Percent(7.25)));
        assert_eq!(render(&cpu_load(&json!({"cpuUtilization": 12.5}))), "12.5%");
    }

    #[test]
    fn test_cpu_load_from_idle() {
        let value = json!({"cpuInfo": {"%Cpu(s)": {"idle": 92.5, "user": 4.0}}});
        assert_eq!(cpu_load(&value), Ok(Percent(7.5)));
    }

    #[test]
    fn test_cpu_load_missing() {
        assert_eq!(cpu_load(&json!({"processes": {}})), Err(FieldParseError::Missing("cpu")));
        assert_eq!(cpu_load(&json!({"cpu": "busy"})), Err(FieldParseError::Missing("cpu")));
    }

    #[test]
    fn test_max_temperature_object_sections() {
        let value = json!({
            "cardSlots": {"1": {"currentTemperature": 55.0}},
            "powerSupplySlots": {"1": {"currentTemperature": 38.5}},
            "tempSensors": {"TempSensor1": {"currentTemperature": 61.25}}
        });
        assert_eq!(max_temperature(&value), Ok(Celsius(61.25)));
        assert_eq!(render(&max_temperature(&value)), "61.2C");
    }

    #[test]
    fn test_max_temperature_nested_arrays() {
        let value = json!({
            "tempSensors": [{"name": "TempSensor1", "currentTemperature": 30}],
            "cardSlots": [{"tempSensors": [
                {"name": "TempSensor1/1", "currentTemperature": 47.0},
                {"name": "TempSensor1/2", "currentTemperature": 72.0}
            ]}]
        });
        assert_eq!(max_temperature(&value), Ok(Celsius(72.0)));
    }

    #[test]
    fn test_max_temperature_missing() {
        assert!(max_temperature(&json!({"systemStatus": "temperatureOk"})).is_err());
    }

    #[test]
    fn test_peer_summary_sums_vrfs() {
        let value = json!({"vrfs": {
            "default": {"peers": {
                "10.0.0.1": {"peerState": "Established"},
                "10.0.0.3": {"peerState": "Active"}
            }},
            "TENANT_A": {"peers": {"10.255.1.1": {"peerState": "Established"}}}
        }});
        let summary = peer_summary(&value).unwrap();
        assert_eq!(summary, PeerSummary { established: 2, total: 3 });
        assert_eq!(summary.to_string(), "2/3 up");
    }

    #[test]
    fn test_peer_summary_no_peers() {
        assert!(peer_summary(&json!({"vrfs": {"default": {"peers": {}}}})).is_err());
        assert!(peer_summary(&json!({})).is_err());
    }

    #[test]
    fn test_link_agg_state() {
        assert_eq!(link_agg_state(&json!({"state": "active"})), Ok(LinkAggState::Active));
        assert_eq!(link_agg_state(&json!({"mlagState": "Inactive"})), Ok(LinkAggState::Inactive));
        assert_eq!(link_agg_state(&json!({})), Ok(LinkAggState::Disabled));
        assert_eq!(
            link_agg_state(&json!({"state": "primary-only"})),
            Ok(LinkAggState::Other("primary-only".to_string()))
        );
    }

    #[test]
    fn test_link_agg_state_blank_state_falls_back() {
        assert_eq!(
            link_agg_state(&json!({"state": "", "mlagState": "active"})),
            Ok(LinkAggState::Active)
        );
        assert_eq!(
            link_agg_state(&json!({"state": null, "mlagState": "inactive"})),
            Ok(LinkAggState::Inactive)
        );
        assert_eq!(link_agg_state(&json!({"state": ""})), Ok(LinkAggState::Disabled));
    }
}
