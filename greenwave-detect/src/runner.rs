use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use async_trait::async_trait;
use log::{debug, error, info, warn};
use tokio::process::Command;
use tokio::time::timeout;

use crate::error::DetectError;
use crate::parse::{parse_run_dir, DetectionBatch};
use crate::profile::{DetectionProfile, ProfileWeights};

/// Characters of stderr kept inside the error value. The full text goes to
/// the log.
const STDERR_TAIL: usize = 400;

/// Source of detection batches. The production implementation shells out to
/// the detector script; tests substitute stubs, and an in-process model can
/// slot in behind the same seam.
#[async_trait]
pub trait ObjectDetector: Send + Sync {
    async fn detect(
        &self,
        image: &Path,
        profile: DetectionProfile,
    ) -> Result<DetectionBatch, DetectError>;
}

/// Everything needed to invoke the external detector script.
#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub program: String,
    pub script: PathBuf,
    pub weights: ProfileWeights,
    pub output_root: PathBuf,
    pub image_size: u32,
    pub confidence: f32,
    pub timeout_secs: u64,
    /// `Some(n)` keeps only the newest `n` run directories after each call;
    /// `None` keeps every run on disk.
    pub retain_runs: Option<usize>,
}

/// Runs the detector as a child process, once per call, and collects the run
/// directory it leaves behind.
pub struct YoloDetector {
    settings: DetectorSettings,
}

impl YoloDetector {
    pub fn new(settings: DetectorSettings) -> Self {
        YoloDetector { settings }
    }

    /// The detector names its run directory itself; the most recent
    /// modification time is the only handle we have on the run we just
    /// caused.
    fn newest_run_dir(&self) -> Result<PathBuf, DetectError> {
        let runs = self.run_dirs()?;
        runs.into_iter()
            .max_by_key(|(modified, _)| *modified)
            .map(|(_, path)| path)
            .ok_or_else(|| DetectError::OutputMissing {
                root: self.settings.output_root.clone(),
            })
    }

    fn run_dirs(&self) -> Result<Vec<(SystemTime, PathBuf)>, DetectError> {
        let root = &self.settings.output_root;
        let entries = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(DetectError::OutputMissing { root: root.clone() })
            }
            Err(err) => return Err(err.into()),
        };

        let mut runs = Vec::new();
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            runs.push((entry.metadata()?.modified()?, path));
        }
        Ok(runs)
    }

    /// Removes all but the newest `keep` run directories. A stored overlay
    /// reference into a removed run will be gone on the next fetch.
    fn prune_runs(&self, keep: usize) -> Result<(), DetectError> {
        let mut runs = self.run_dirs()?;
        if runs.len() <= keep {
            return Ok(());
        }
        runs.sort_by_key(|(modified, _)| *modified);
        let excess = runs.len() - keep;
        for (_, path) in runs.into_iter().take(excess) {
            debug!("pruning old run {}", path.display());
            fs::remove_dir_all(&path)?;
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectDetector for YoloDetector {
    async fn detect(
        &self,
        image: &Path,
        profile: DetectionProfile,
    ) -> Result<DetectionBatch, DetectError> {
        let weights = self.settings.weights.for_profile(profile);
        info!(
            "{} detection on {} (weights {})",
            profile.label(),
            image.display(),
            weights.display()
        );

        let mut command = Command::new(&self.settings.program);
        command
            .arg(&self.settings.script)
            .arg("--weights")
            .arg(weights)
            .arg("--img")
            .arg(self.settings.image_size.to_string())
            .arg("--conf")
            .arg(self.settings.confidence.to_string())
            .arg("--save-csv")
            .arg("--source")
            .arg(image)
            .kill_on_drop(true);

        let started = Instant::now();
        let wait = timeout(Duration::from_secs(self.settings.timeout_secs), command.output());
        let output = match wait.await {
            Ok(result) => result.map_err(DetectError::SpawnFailed)?,
            Err(_) => {
                warn!(
                    "{} detection timed out after {}s",
                    profile.label(),
                    self.settings.timeout_secs
                );
                return Err(DetectError::TimedOut(self.settings.timeout_secs));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let code = output.status.code().unwrap_or(-1);
            error!("detector exited with code {code}: {}", stderr.trim());
            return Err(DetectError::ProcessFailed {
                code,
                stderr: tail(&stderr),
            });
        }
        debug!("detector finished in {:?}", started.elapsed());

        let run_dir = self.newest_run_dir()?;
        let batch = parse_run_dir(&run_dir)?;
        info!(
            "{} detection found {} objects in {}",
            profile.label(),
            batch.count(),
            run_dir.display()
        );

        if let Some(keep) = self.settings.retain_runs {
            if let Err(err) = self.prune_runs(keep) {
                warn!("run pruning failed: {err}");
            }
        }
        Ok(batch)
    }
}

fn tail(text: &str) -> String {
    let trimmed = text.trim();
    let total = trimmed.chars().count();
    if total <= STDERR_TAIL {
        return trimmed.to_string();
    }
    trimmed.chars().skip(total - STDERR_TAIL).collect()
}
