//! The Detect → Report → Fix → Verify pass.
//!
//! One invocation collects snapshots (once, or repeatedly in watch mode),
//! checks every device for drift, optionally remediates the drifted ones
//! after a single fleet-wide confirmation, and maps the result onto a
//! process exit status.

use std::future::Future;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::time::Duration;

use log::{info, warn};
use tokio::task::JoinHandle;

use crate::device::Device;
use crate::drift::{BaselineStore, DriftDetector, DriftReport};
use crate::inventory::InventorySource;
use crate::remediation::{Orchestrator, StagingArea};
use crate::report::{Console, Style};
use crate::snapshot::collect_fleet;
use crate::transport::Connector;

/// Process outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Nothing left to fix.
    Success,
    /// Drift or failures remain.
    Failure,
    /// Inventory could not be resolved or was empty.
    SetupFailure,
}

impl RunStatus {
    pub fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::SetupFailure => 2,
        }
    }
}

impl From<RunStatus> for ExitCode {
    fn from(status: RunStatus) -> Self {
        ExitCode::from(status.code())
    }
}

/// How unknown devices affect the exit status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExitPolicy {
    /// Treat devices whose drift state is unknown as unresolved.
    pub unknown_fails: bool,
}

/// Options for one pulse run.
#[derive(Debug, Clone)]
pub struct PulseOptions {
    pub group: String,
    pub watch: bool,
    pub interval: Duration,
    /// Offer remediation when drift is found.
    pub restore: bool,
    /// Skip the confirmation prompt and remediate.
    pub assume_yes: bool,
    pub max_diff_lines: usize,
    pub concurrency: usize,
    pub exit_policy: ExitPolicy,
}

impl Default for PulseOptions {
    fn default() -> Self {
        Self {
            group: "FABRIC".to_string(),
            watch: false,
            interval: Duration::from_secs(3),
            restore: true,
            assume_yes: false,
            max_diff_lines: 120,
            concurrency: 8,
            exit_policy: ExitPolicy::default(),
        }
    }
}

/// Resolve the device list, reporting setup failures on the console.
///
/// `None` means the run cannot proceed.
pub async fn resolve_devices<W: Write, R: BufRead>(
    console: &mut Console<W, R>,
    source: &InventorySource,
    group: &str,
) -> io::Result<Option<Vec<Device>>> {
    match source.devices(group).await {
        Ok(devices) if devices.is_empty() => {
            console.styled("No devices found in selected inventory group.", Style::BadBold)?;
            Ok(None)
        }
        Ok(devices) => {
            info!("{} devices in group {}", devices.len(), group);
            Ok(Some(devices))
        }
        Err(e) => {
            let label = console.paint("Inventory load failed:", Style::BadBold);
            console.line(&format!("{label} {e}"))?;
            Ok(None)
        }
    }
}

/// Resolves once the operator presses Ctrl+C.
pub async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("cannot listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Run `action` once `stop` resolves, on its own task.
///
/// Once a Ctrl+C listener has been installed the default handler no longer
/// terminates the process, so the watch loop hands over to this.
fn on_stop<F>(stop: impl Future<Output = ()> + Send + 'static, action: F) -> JoinHandle<()>
where
    F: FnOnce() + Send + 'static,
{
    tokio::spawn(async move {
        stop.await;
        action();
    })
}

/// Drives one pulse run.
pub struct Pulse<'a, C> {
    connector: &'a C,
    baselines: BaselineStore,
    staging: StagingArea,
    options: PulseOptions,
}

impl<'a, C: Connector> Pulse<'a, C> {
    pub fn new(
        connector: &'a C,
        baselines: BaselineStore,
        staging: StagingArea,
        options: PulseOptions,
    ) -> Self {
        Self {
            connector,
            baselines,
            staging,
            options,
        }
    }

    /// Full run: resolve the group, show health, then detect and fix.
    pub async fn run<W: Write, R: BufRead>(
        &self,
        console: &mut Console<W, R>,
        source: &InventorySource,
    ) -> io::Result<RunStatus> {
        console.styled("Starting Arista Fabric Pulse", Style::Accent)?;
        let Some(devices) = resolve_devices(console, source, &self.options.group).await? else {
            return Ok(RunStatus::SetupFailure);
        };

        if !self.options.watch {
            let snapshots = collect_fleet(self.connector, &devices, self.options.concurrency).await;
            console.dashboard(&snapshots)?;
            return self.detect_and_fix(console, &devices).await;
        }

        self.watch_until(console, &devices, interrupted()).await?;
        let exit_guard = on_stop(interrupted(), || {
            warn!("interrupted");
            std::process::exit(130);
        });
        let status = self.detect_and_fix(console, &devices).await;
        exit_guard.abort();
        status
    }

    /// Redraw the dashboard every interval until `stop` resolves.
    ///
    /// A cycle cut short by `stop` is dropped without rendering.
    pub async fn watch_until<W: Write, R: BufRead>(
        &self,
        console: &mut Console<W, R>,
        devices: &[Device],
        stop: impl Future<Output = ()>,
    ) -> io::Result<()> {
        tokio::pin!(stop);
        loop {
            let snapshots = tokio::select! {
                _ = &mut stop => break,
                snapshots = collect_fleet(self.connector, devices, self.options.concurrency) => snapshots,
            };
            console.clear()?;
            console.dashboard(&snapshots)?;
            console.flush()?;

            tokio::select! {
                _ = &mut stop => break,
                _ = tokio::time::sleep(self.options.interval) => {}
            }
        }
        info!("watch stopped");
        Ok(())
    }

    /// Detect drift, report it, and remediate if allowed.
    pub async fn detect_and_fix<W: Write, R: BufRead>(
        &self,
        console: &mut Console<W, R>,
        devices: &[Device],
    ) -> io::Result<RunStatus> {
        console.heading("Detect -> Report")?;
        let report = DriftDetector::new(self.connector, &self.baselines)
            .with_concurrency(self.options.concurrency)
            .detect(devices)
            .await;
        console.drift_report(&report)?;
        for result in report.drifted() {
            console.diff_panel(
                &result.device_name,
                result.diff_lines(),
                self.options.max_diff_lines,
            )?;
        }

        if !report.any_drift() {
            console.styled("No drift detected.", Style::Good)?;
            return self.settle(console, &report);
        }
        if !self.options.restore {
            console.styled(
                "Drift detected. Restore disabled by --no-restore.",
                Style::Caution,
            )?;
            return Ok(RunStatus::Failure);
        }
        if !self.options.assume_yes
            && !console.confirm("Drift detected! Restore to Golden State?", false)?
        {
            console.styled("Restore cancelled by user.", Style::Caution)?;
            return Ok(RunStatus::Failure);
        }

        console.heading("Fix -> Verify")?;
        let outcomes = Orchestrator::new(self.connector, &self.baselines, &self.staging)
            .with_concurrency(self.options.concurrency)
            .remediate(devices, &report)
            .await;
        console.outcomes(&outcomes)?;

        // Devices that stopped before verification are re-read so every
        // remediated device shows its final state.
        let unverified: Vec<Device> = devices
            .iter()
            .filter(|device| {
                outcomes
                    .get(&device.name)
                    .is_some_and(|outcome| outcome.verification.is_none())
            })
            .cloned()
            .collect();
        let redetected = DriftDetector::new(self.connector, &self.baselines)
            .with_concurrency(self.options.concurrency)
            .detect(&unverified)
            .await;
        let final_state: DriftReport = outcomes
            .values()
            .filter_map(|outcome| outcome.verification.clone())
            .chain(redetected.iter().cloned())
            .collect();
        console.drift_report(&final_state)?;

        let remaining: Vec<&str> = outcomes
            .values()
            .filter(|outcome| !outcome.succeeded())
            .map(|outcome| outcome.device_name.as_str())
            .collect();
        if !remaining.is_empty() {
            console.styled(
                &format!("Drift still present on: {}", remaining.join(", ")),
                Style::Bad,
            )?;
            return Ok(RunStatus::Failure);
        }

        console.styled("Fabric restored to Golden State.", Style::GoodBold)?;
        self.settle(console, &report)
    }

    /// Apply the unknown-device policy to an otherwise successful run.
    fn settle<W: Write, R: BufRead>(
        &self,
        console: &mut Console<W, R>,
        report: &DriftReport,
    ) -> io::Result<RunStatus> {
        if self.options.exit_policy.unknown_fails && report.any_unknown() {
            let names: Vec<&str> = report.unknown().map(|r| r.device_name.as_str()).collect();
            console.styled(
                &format!("Drift state unknown on: {}", names.join(", ")),
                Style::Caution,
            )?;
            return Ok(RunStatus::Failure);
        }
        Ok(RunStatus::Success)
    }
}
