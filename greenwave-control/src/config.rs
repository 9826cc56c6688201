use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use log::info;
use serde::Deserialize;

use greenwave_detect::profile::ProfileWeights;
use greenwave_detect::runner::DetectorSettings;

/// Service configuration, loaded from YAML. Every field has a default so a
/// bare deployment starts with the stock four-approach intersection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub uploads_dir: PathBuf,
    pub detector: DetectorConfig,
    pub allocation: AllocationConfig,
    pub signals: Vec<SignalConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub program: String,
    pub script: PathBuf,
    pub output_root: PathBuf,
    pub image_size: u32,
    pub confidence: f32,
    pub timeout_secs: u64,
    pub retain_runs: Option<usize>,
    pub vehicle_weights: PathBuf,
    pub ambulance_weights: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AllocationConfig {
    /// Minimum seconds for vehicle-proportional grants. The older controller
    /// ran with 15; leave unset for the current no-floor behavior.
    pub non_priority_floor_secs: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignalConfig {
    pub id: u8,
    pub name: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig::default(),
            uploads_dir: PathBuf::from("uploads"),
            detector: DetectorConfig::default(),
            allocation: AllocationConfig::default(),
            signals: default_signals(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        DetectorConfig {
            program: "python3".to_string(),
            script: PathBuf::from("yolov5/detect.py"),
            output_root: PathBuf::from("yolov5/runs/detect"),
            image_size: 640,
            confidence: 0.4,
            timeout_secs: 120,
            retain_runs: None,
            vehicle_weights: PathBuf::from("best.pt"),
            ambulance_weights: PathBuf::from("er_best.pt"),
        }
    }
}

fn default_signals() -> Vec<SignalConfig> {
    [(1, "North Signal"), (2, "South Signal"), (3, "East Signal"), (4, "West Signal")]
        .into_iter()
        .map(|(id, name)| SignalConfig {
            id,
            name: name.to_string(),
        })
        .collect()
}

impl Config {
    /// Reads the YAML file at `path`. A missing file falls back to built-in
    /// defaults; a present but invalid one is an error.
    pub fn load(path: &str) -> Result<Self> {
        let config = match fs::read_to_string(path) {
            Ok(contents) => {
                serde_yaml::from_str(&contents).with_context(|| format!("invalid config {path}"))?
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                info!("config {path} not found, using defaults");
                Config::default()
            }
            Err(err) => return Err(err).with_context(|| format!("could not read config {path}")),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.signals.is_empty() {
            bail!("at least one signal must be configured");
        }
        let mut seen = HashSet::new();
        for signal in &self.signals {
            if !seen.insert(signal.id) {
                bail!("duplicate signal id {}", signal.id);
            }
        }
        if self.server.port == 0 {
            bail!("server.port must be non-zero");
        }
        if self.detector.timeout_secs == 0 {
            bail!("detector.timeout_secs must be positive");
        }
        Ok(())
    }
}

impl DetectorConfig {
    pub fn to_settings(&self) -> DetectorSettings {
        DetectorSettings {
            program: self.program.clone(),
            script: self.script.clone(),
            weights: ProfileWeights {
                vehicles: self.vehicle_weights.clone(),
                ambulance: self.ambulance_weights.clone(),
            },
            output_root: self.output_root.clone(),
            image_size: self.image_size,
            confidence: self.confidence,
            timeout_secs: self.timeout_secs,
            retain_runs: self.retain_runs,
        }
    }
}
