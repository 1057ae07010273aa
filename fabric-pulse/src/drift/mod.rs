//! Drift detection against golden configurations.
//!
//! Each device's running configuration is fetched as text and compared with
//! `<golden_dir>/<name>.cfg` after both sides are normalized. A device is
//! classified as exactly one of clean, drifted or unknown.

mod diff;

pub use diff::unified_diff;

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use futures_util::stream::{self, StreamExt};
use log::{debug, info, warn};

use crate::device::Device;
use crate::error::BaselineError;
use crate::transport::{Connector, Encoding, Session};

/// Lines of context around each hunk.
pub const DIFF_CONTEXT: usize = 2;

/// Reason recorded when a device has no golden file.
pub const GOLDEN_MISSING: &str = "Golden config missing";

/// Canonical form used for comparison.
///
/// Trailing whitespace is stripped from every line, leading and trailing
/// blank lines are dropped and the result ends with exactly one newline.
pub fn normalize(text: &str) -> String {
    let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    let Some(start) = lines.iter().position(|line| !line.is_empty()) else {
        return "\n".to_string();
    };
    let end = lines
        .iter()
        .rposition(|line| !line.is_empty())
        .unwrap_or(start);

    let mut out = lines[start..=end].join("\n");
    out.push('\n');
    out
}

/// Read-only directory of golden configurations.
#[derive(Debug, Clone)]
pub struct BaselineStore {
    dir: PathBuf,
}

impl BaselineStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<dir>/<device_name>.cfg`
    pub fn path_for(&self, device_name: &str) -> PathBuf {
        self.dir.join(format!("{device_name}.cfg"))
    }

    /// Read the golden configuration for a device, as stored.
    pub async fn load(&self, device_name: &str) -> Result<String, BaselineError> {
        let path = self.path_for(device_name);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(BaselineError::Missing { path }),
            Err(source) => Err(BaselineError::Read { path, source }),
        }
    }
}

/// Classification of one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriftState {
    /// Running configuration matches the golden file.
    Clean,
    /// Running configuration differs; the unified diff is attached.
    Drifted { diff_lines: Vec<String> },
    /// Comparison could not be made.
    Unknown { reason: String },
}

/// Drift classification of one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriftResult {
    pub device_name: String,
    pub baseline_path: PathBuf,
    pub state: DriftState,
}

impl DriftResult {
    pub fn has_drift(&self) -> bool {
        matches!(self.state, DriftState::Drifted { .. })
    }

    pub fn unknown_reason(&self) -> Option<&str> {
        match &self.state {
            DriftState::Unknown { reason } => Some(reason),
            _ => None,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.state == DriftState::Clean
    }

    /// Diff lines; empty unless drifted.
    pub fn diff_lines(&self) -> &[String] {
        match &self.state {
            DriftState::Drifted { diff_lines } => diff_lines,
            _ => &[],
        }
    }
}

/// Results of one detection pass, ordered by device name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriftReport {
    results: BTreeMap<String, DriftResult>,
}

impl DriftReport {
    pub fn get(&self, device_name: &str) -> Option<&DriftResult> {
        self.results.get(device_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DriftResult> {
        self.results.values()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn has_drift(&self, device_name: &str) -> bool {
        self.get(device_name).is_some_and(DriftResult::has_drift)
    }

    /// Devices whose configuration diverges from golden.
    pub fn drifted(&self) -> impl Iterator<Item = &DriftResult> {
        self.iter().filter(|r| r.has_drift())
    }

    /// Devices that could not be compared.
    pub fn unknown(&self) -> impl Iterator<Item = &DriftResult> {
        self.iter().filter(|r| r.unknown_reason().is_some())
    }

    pub fn any_drift(&self) -> bool {
        self.drifted().next().is_some()
    }

    pub fn any_unknown(&self) -> bool {
        self.unknown().next().is_some()
    }
}

impl FromIterator<DriftResult> for DriftReport {
    fn from_iter<I: IntoIterator<Item = DriftResult>>(iter: I) -> Self {
        Self {
            results: iter
                .into_iter()
                .map(|r| (r.device_name.clone(), r))
                .collect(),
        }
    }
}

/// Compares devices against their golden configurations.
#[derive(Debug)]
pub struct DriftDetector<'a, C> {
    connector: &'a C,
    baselines: &'a BaselineStore,
    concurrency: usize,
}

impl<'a, C: Connector> DriftDetector<'a, C> {
    pub fn new(connector: &'a C, baselines: &'a BaselineStore) -> Self {
        Self {
            connector,
            baselines,
            concurrency: 8,
        }
    }

    /// Maximum devices compared at once.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Classify every device.
    pub async fn detect(&self, devices: &[Device]) -> DriftReport {
        info!("checking {} devices for drift", devices.len());
        let results: Vec<DriftResult> = stream::iter(devices)
            .map(|device| self.detect_one(device))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        results.into_iter().collect()
    }

    /// Classify one device.
    ///
    /// A missing golden file short-circuits before any network call.
    pub async fn detect_one(&self, device: &Device) -> DriftResult {
        let baseline_path = self.baselines.path_for(&device.name);
        let unknown = |reason: String| DriftResult {
            device_name: device.name.clone(),
            baseline_path: baseline_path.clone(),
            state: DriftState::Unknown { reason },
        };

        let golden = match self.baselines.load(&device.name).await {
            Ok(text) => text,
            Err(BaselineError::Missing { .. }) => {
                debug!("{}: no golden config", device.name);
                return unknown(GOLDEN_MISSING.to_string());
            }
            Err(BaselineError::Read { source, .. }) => {
                warn!("{}: golden config unreadable: {}", device.name, source);
                return unknown(format!("Error reading golden config: {source}"));
            }
        };

        let running = match self.fetch_running(device).await {
            Ok(text) => text,
            Err(e) => {
                warn!("{}: running-config unavailable: {}", device.name, e);
                return unknown(format!("Error reading running-config: {e}"));
            }
        };

        let diff_lines = unified_diff(
            &normalize(&golden),
            &normalize(&running),
            &format!("golden/{}.cfg", device.name),
            &format!("running/{}", device.name),
            DIFF_CONTEXT,
        );
        debug!("{}: {} diff lines", device.name, diff_lines.len());

        let state = if diff_lines.is_empty() {
            DriftState::Clean
        } else {
            DriftState::Drifted { diff_lines }
        };
        DriftResult {
            device_name: device.name.clone(),
            baseline_path,
            state,
        }
    }

    async fn fetch_running(
        &self,
        device: &Device,
    ) -> Result<String, crate::error::ConnectionError> {
        let mut session = self.connector.connect(device).await?;
        let output = session
            .execute_one("show running-config", Encoding::Text)
            .await;
        session.close().await;
        Ok(output?.into_text())
    }
}
