//! Remediation of drifted devices.
//!
//! Each device runs its own state machine:
//!
//! ```text
//! Detected -> Staged -> Replaced -> Verified
//!     \          \          \
//!      +----------+----------+--> Failed
//! ```
//!
//! A failure stops that device only. Nothing is rolled back: a staged file
//! stays staged when the replace fails.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use futures_util::stream::{self, StreamExt};
use log::{debug, info, warn};

use crate::device::Device;
use crate::drift::{BaselineStore, DriftDetector, DriftReport, DriftResult, DriftState};
use crate::error::{BaselineError, ConnectionError, RemediationStepError};
use crate::transport::{Connector, Encoding, Session};

/// Device-local storage the golden file is copied into before it is applied.
///
/// Layout: `<root>/<device_name>/flash/golden-<device_name>.cfg`.
#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File name of the staged artifact, as the device sees it on flash.
    pub fn artifact_name(device_name: &str) -> String {
        format!("golden-{device_name}.cfg")
    }

    pub fn dir_for(&self, device_name: &str) -> PathBuf {
        self.root.join(device_name).join("flash")
    }

    pub fn path_for(&self, device_name: &str) -> PathBuf {
        self.dir_for(device_name)
            .join(Self::artifact_name(device_name))
    }

    /// Copy `baseline` into the device's flash directory, creating it.
    ///
    /// Returns the artifact name.
    pub async fn stage(
        &self,
        device_name: &str,
        baseline: &Path,
    ) -> Result<String, RemediationStepError> {
        let exists = tokio::fs::try_exists(baseline)
            .await
            .map_err(|source| BaselineError::Read {
                path: baseline.to_path_buf(),
                source,
            })?;
        if !exists {
            return Err(BaselineError::Missing {
                path: baseline.to_path_buf(),
            }
            .into());
        }

        let dir = self.dir_for(device_name);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| RemediationStepError::Stage {
                path: dir.clone(),
                source,
            })?;

        let target = self.path_for(device_name);
        tokio::fs::copy(baseline, &target)
            .await
            .map_err(|source| RemediationStepError::Stage {
                path: target.clone(),
                source,
            })?;

        debug!("staged {} -> {}", baseline.display(), target.display());
        Ok(Self::artifact_name(device_name))
    }
}

/// Per-device remediation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemediationState {
    Detected,
    Staged,
    Replaced,
    Verified,
    Failed,
}

impl fmt::Display for RemediationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Detected => "detected",
            Self::Staged => "staged",
            Self::Replaced => "replaced",
            Self::Verified => "verified",
            Self::Failed => "failed",
        })
    }
}

/// Terminal result of remediating one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemediationOutcome {
    pub device_name: String,
    /// Set once the golden file has been staged.
    pub staged_artifact_name: Option<String>,
    /// `Verified` or `Failed`.
    pub state: RemediationState,
    /// Last state reached before the outcome was decided.
    pub last_completed: RemediationState,
    pub message: String,
    /// Post-replace drift check, when the replace went through.
    pub verification: Option<DriftResult>,
}

impl RemediationOutcome {
    pub fn succeeded(&self) -> bool {
        self.state == RemediationState::Verified
    }

    fn failed(
        device: &Device,
        last_completed: RemediationState,
        staged_artifact_name: Option<String>,
        error: RemediationStepError,
    ) -> Self {
        warn!(
            "{}: remediation failed after {}: {}",
            device.name, last_completed, error
        );
        Self {
            device_name: device.name.clone(),
            staged_artifact_name,
            state: RemediationState::Failed,
            last_completed,
            message: error.to_string(),
            verification: None,
        }
    }
}

/// Commands that load the staged file and persist it.
pub fn replace_commands(artifact_name: &str) -> [String; 2] {
    [
        format!("configure replace flash:{artifact_name}"),
        "write memory".to_string(),
    ]
}

/// Drives drifted devices back to their golden configuration.
#[derive(Debug)]
pub struct Orchestrator<'a, C> {
    connector: &'a C,
    baselines: &'a BaselineStore,
    staging: &'a StagingArea,
    concurrency: usize,
}

impl<'a, C: Connector> Orchestrator<'a, C> {
    pub fn new(connector: &'a C, baselines: &'a BaselineStore, staging: &'a StagingArea) -> Self {
        Self {
            connector,
            baselines,
            staging,
            concurrency: 8,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Remediate every device `report` marks as drifted.
    ///
    /// Clean and unknown devices are never touched; each drifted device is
    /// attempted exactly once.
    pub async fn remediate(
        &self,
        devices: &[Device],
        report: &DriftReport,
    ) -> BTreeMap<String, RemediationOutcome> {
        let targets: Vec<&Device> = devices
            .iter()
            .filter(|device| report.has_drift(&device.name))
            .collect();
        info!("remediating {} drifted devices", targets.len());

        stream::iter(targets)
            .map(|device| self.remediate_one(device))
            .buffer_unordered(self.concurrency)
            .map(|outcome| (outcome.device_name.clone(), outcome))
            .collect()
            .await
    }

    /// Run the state machine for one device.
    pub async fn remediate_one(&self, device: &Device) -> RemediationOutcome {
        let baseline = self.baselines.path_for(&device.name);

        let artifact = match self.staging.stage(&device.name, &baseline).await {
            Ok(name) => name,
            Err(e) => {
                return RemediationOutcome::failed(device, RemediationState::Detected, None, e);
            }
        };
        debug!("{}: {}", device.name, RemediationState::Staged);

        if let Err(e) = self.replace(device, &artifact).await {
            return RemediationOutcome::failed(
                device,
                RemediationState::Staged,
                Some(artifact),
                e.into(),
            );
        }
        debug!("{}: {}", device.name, RemediationState::Replaced);

        let verification = DriftDetector::new(self.connector, self.baselines)
            .detect_one(device)
            .await;

        if verification.is_clean() {
            info!("{}: converged", device.name);
            return RemediationOutcome {
                device_name: device.name.clone(),
                message: format!("Restored from flash:{artifact}"),
                staged_artifact_name: Some(artifact),
                state: RemediationState::Verified,
                last_completed: RemediationState::Replaced,
                verification: Some(verification),
            };
        }

        let detail = match &verification.state {
            DriftState::Drifted { diff_lines } => format!("{} diff lines", diff_lines.len()),
            DriftState::Unknown { reason } => reason.clone(),
            DriftState::Clean => String::new(),
        };
        let mut outcome = RemediationOutcome::failed(
            device,
            RemediationState::Replaced,
            Some(artifact),
            RemediationStepError::StillDivergent {
                device: device.name.clone(),
                detail,
            },
        );
        outcome.verification = Some(verification);
        outcome
    }

    async fn replace(&self, device: &Device, artifact: &str) -> Result<(), ConnectionError> {
        let commands = replace_commands(artifact);
        let batch: Vec<&str> = commands.iter().map(String::as_str).collect();

        let mut session = self.connector.connect(device).await?;
        let result = session.execute(&batch, Encoding::Text).await;
        session.close().await;
        result.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{MockDevice, MockFleet};

    const GOLDEN: &str = "hostname leaf2\n!\nip routing\n!\nend\n";
    const ROGUE: &str = "hostname leaf2\n!\nip routing\nlogging host 10.0.0.9\n!\nend\n";

    struct Lab {
        golden: tempfile::TempDir,
        flash: tempfile::TempDir,
    }

    impl Lab {
        fn new(names: &[&str]) -> Self {
            let golden = tempfile::tempdir().unwrap();
            for name in names {
                std::fs::write(golden.path().join(format!("{name}.cfg")), GOLDEN).unwrap();
            }
            Self {
                golden,
                flash: tempfile::tempdir().unwrap(),
            }
        }

        fn stores(&self) -> (BaselineStore, StagingArea) {
            (
                BaselineStore::new(self.golden.path()),
                StagingArea::new(self.flash.path()),
            )
        }

        fn flash_of(&self, name: &str) -> PathBuf {
            self.flash.path().join(name).join("flash")
        }
    }

    fn drifted(name: &str, baselines: &BaselineStore) -> DriftResult {
        DriftResult {
            device_name: name.to_string(),
            baseline_path: baselines.path_for(name),
            state: DriftState::Drifted {
                diff_lines: vec!["+logging host 10.0.0.9".to_string()],
            },
        }
    }

    #[test]
    fn test_staging_layout() {
        let staging = StagingArea::new("clab-dc1_fabric");
        assert_eq!(StagingArea::artifact_name("leaf2"), "golden-leaf2.cfg");
        assert_eq!(
            staging.path_for("leaf2"),
            PathBuf::from("clab-dc1_fabric/leaf2/flash/golden-leaf2.cfg")
        );
        assert_eq!(
            replace_commands("golden-leaf2.cfg"),
            [
                "configure replace flash:golden-leaf2.cfg".to_string(),
                "write memory".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_stage_missing_baseline() {
        let lab = Lab::new(&[]);
        let (baselines, staging) = lab.stores();
        let err = staging
            .stage("leaf2", &baselines.path_for("leaf2"))
            .await
            .unwrap_err();
        assert!(matches!(err, RemediationStepError::Baseline(BaselineError::Missing { .. })));
        assert!(!staging.dir_for("leaf2").exists());
    }

    #[tokio::test]
    async fn test_stage_unreadable_baseline_keeps_cause() {
        let lab = Lab::new(&[]);
        let (_, staging) = lab.stores();
        let scratch = tempfile::tempdir().unwrap();
        let not_a_dir = scratch.path().join("configs");
        std::fs::write(&not_a_dir, "plain file").unwrap();

        let err = staging
            .stage("leaf2", &not_a_dir.join("leaf2.cfg"))
            .await
            .unwrap_err();
        assert!(matches!(err, RemediationStepError::Baseline(BaselineError::Read { .. })));
        assert!(err.to_string().starts_with("Failed to read golden config"));
    }

    #[tokio::test]
    async fn test_remediate_and_verify() {
        let lab = Lab::new(&["leaf2"]);
        let (baselines, staging) = lab.stores();
        let fleet = MockFleet::new().with_device(
            "10.0.0.2",
            MockDevice::healthy(ROGUE).with_flash(lab.flash_of("leaf2")),
        );
        let device = Device::new("leaf2", "10.0.0.2");

        let outcome = Orchestrator::new(&fleet, &baselines, &staging)
            .remediate_one(&device)
            .await;

        assert!(outcome.succeeded());
        assert_eq!(outcome.state, RemediationState::Verified);
        assert_eq!(outcome.staged_artifact_name.as_deref(), Some("golden-leaf2.cfg"));
        assert_eq!(outcome.message, "Restored from flash:golden-leaf2.cfg");
        assert!(outcome.verification.as_ref().is_some_and(DriftResult::is_clean));
        assert_eq!(
            std::fs::read_to_string(staging.path_for("leaf2")).unwrap(),
            GOLDEN
        );
        assert_eq!(
            fleet.commands_for("10.0.0.2"),
            vec![
                "configure replace flash:golden-leaf2.cfg",
                "write memory",
                "show running-config",
            ]
        );
    }

    #[tokio::test]
    async fn test_only_drifted_devices_are_remediated() {
        let lab = Lab::new(&["leaf1", "leaf2"]);
        let (baselines, staging) = lab.stores();
        let fleet = MockFleet::new()
            .with_device("10.0.0.1", MockDevice::healthy(GOLDEN))
            .with_device(
                "10.0.0.2",
                MockDevice::healthy(ROGUE).with_flash(lab.flash_of("leaf2")),
            )
            .with_device("10.0.0.3", MockDevice::healthy(ROGUE));
        let devices = vec![
            Device::new("leaf1", "10.0.0.1"),
            Device::new("leaf2", "10.0.0.2"),
            Device::new("leaf3", "10.0.0.3"),
        ];
        let report: DriftReport = vec![
            DriftResult {
                device_name: "leaf1".to_string(),
                baseline_path: baselines.path_for("leaf1"),
                state: DriftState::Clean,
            },
            drifted("leaf2", &baselines),
            DriftResult {
                device_name: "leaf3".to_string(),
                baseline_path: baselines.path_for("leaf3"),
                state: DriftState::Unknown {
                    reason: "Golden config missing".to_string(),
                },
            },
        ]
        .into_iter()
        .collect();

        let outcomes = Orchestrator::new(&fleet, &baselines, &staging)
            .remediate(&devices, &report)
            .await;

        assert_eq!(outcomes.keys().collect::<Vec<_>>(), vec!["leaf2"]);
        assert!(outcomes["leaf2"].succeeded());
        assert!(fleet.commands_for("10.0.0.1").is_empty());
        assert!(fleet.commands_for("10.0.0.3").is_empty());
        assert!(!staging.dir_for("leaf3").exists());
        assert_eq!(fleet.running_config("10.0.0.3"), ROGUE);
    }

    #[tokio::test]
    async fn test_replace_failure_leaves_file_staged() {
        let lab = Lab::new(&["leaf2"]);
        let (baselines, staging) = lab.stores();
        let fleet = MockFleet::new().with_device(
            "10.0.0.2",
            MockDevice::healthy(ROGUE)
                .with_flash(lab.flash_of("leaf2"))
                .failing("write memory"),
        );

        let outcome = Orchestrator::new(&fleet, &baselines, &staging)
            .remediate_one(&Device::new("leaf2", "10.0.0.2"))
            .await;

        assert!(!outcome.succeeded());
        assert_eq!(outcome.state, RemediationState::Failed);
        assert_eq!(outcome.last_completed, RemediationState::Staged);
        assert!(outcome.message.contains("write memory"));
        assert!(outcome.verification.is_none());
        assert!(staging.path_for("leaf2").exists());
        assert!(!fleet.commands_for("10.0.0.2").contains(&"show running-config".to_string()));
    }

    #[tokio::test]
    async fn test_still_divergent_after_replace() {
        let lab = Lab::new(&["leaf2"]);
        let (baselines, staging) = lab.stores();
        let stale = tempfile::tempdir().unwrap();
        std::fs::write(stale.path().join("golden-leaf2.cfg"), ROGUE).unwrap();
        let fleet = MockFleet::new().with_device(
            "10.0.0.2",
            MockDevice::healthy(ROGUE).with_flash(stale.path()),
        );

        let outcome = Orchestrator::new(&fleet, &baselines, &staging)
            .remediate_one(&Device::new("leaf2", "10.0.0.2"))
            .await;

        assert_eq!(outcome.state, RemediationState::Failed);
        assert_eq!(outcome.last_completed, RemediationState::Replaced);
        assert!(outcome.message.starts_with("leaf2 still diverges from golden config"));
        assert!(outcome.verification.as_ref().is_some_and(DriftResult::has_drift));
    }
}
