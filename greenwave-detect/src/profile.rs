use std::path::{Path, PathBuf};

/// Which trained weights, and with them which class vocabulary, a detection
/// pass runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectionProfile {
    /// General road traffic: cars, buses, trucks, motorbikes.
    Vehicles,
    /// Emergency vehicles only.
    Ambulance,
}

impl DetectionProfile {
    pub fn label(self) -> &'static str {
        match self {
            DetectionProfile::Vehicles => "vehicle",
            DetectionProfile::Ambulance => "ambulance",
        }
    }
}

/// Weights file per profile, resolved once from configuration.
#[derive(Debug, Clone)]
pub struct ProfileWeights {
    pub vehicles: PathBuf,
    pub ambulance: PathBuf,
}

impl ProfileWeights {
    pub fn for_profile(&self, profile: DetectionProfile) -> &Path {
        match profile {
            DetectionProfile::Vehicles => &self.vehicles,
            DetectionProfile::Ambulance => &self.ambulance,
        }
    }
}
