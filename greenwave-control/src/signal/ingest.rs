use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::Local;
use log::info;
use thiserror::Error;
use tokio::fs;

use greenwave_detect::error::DetectError;
use greenwave_detect::profile::DetectionProfile;
use greenwave_detect::runner::ObjectDetector;

use super::store::{SignalStore, UnknownSignal};

const UPLOAD_TIMESTAMP: &str = "%Y%m%d_%H%M%S";

/// Why an upload could not be folded into the store.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    UnknownSignal(#[from] UnknownSignal),

    #[error("detection failed: {0}")]
    Detection(#[from] DetectError),

    #[error("could not persist upload: {0}")]
    SaveFailed(#[source] std::io::Error),
}

/// Counts reported back to the uploader after a successful ingestion.
#[derive(Debug, Clone, Copy)]
pub struct IngestSummary {
    pub vehicle_count: u32,
    pub ambulance_count: u32,
}

/// Persists an uploaded image, runs both detection passes on it, and folds
/// the counts into the signal's state in one atomic update.
///
/// The store stays unlocked while the detector runs. The two passes are
/// sequential: concurrent runs would race each other in the run-directory
/// discovery.
pub async fn ingest_image(
    store: &SignalStore,
    detector: &dyn ObjectDetector,
    uploads_dir: &Path,
    signal_id: u8,
    image: Bytes,
) -> Result<IngestSummary, IngestError> {
    if !store.contains(signal_id) {
        return Err(UnknownSignal(signal_id).into());
    }

    let saved = save_upload(uploads_dir, signal_id, image).await?;
    info!("signal {signal_id}: upload stored at {}", saved.display());

    let vehicles = detector.detect(&saved, DetectionProfile::Vehicles).await?;
    let ambulances = detector.detect(&saved, DetectionProfile::Ambulance).await?;

    let summary = IngestSummary {
        vehicle_count: vehicles.count(),
        ambulance_count: ambulances.count(),
    };
    // The ambulance overlay wins while an ambulance is present.
    let annotated = if summary.ambulance_count > 0 {
        ambulances.annotated_image
    } else {
        vehicles.annotated_image
    };

    store.update(signal_id, |signal| {
        signal.vehicle_count = summary.vehicle_count;
        signal.ambulance_count = summary.ambulance_count;
        signal.annotated_image = annotated;
    })?;

    info!(
        "signal {signal_id}: {} vehicles, {} ambulances",
        summary.vehicle_count, summary.ambulance_count
    );
    Ok(summary)
}

async fn save_upload(uploads_dir: &Path, signal_id: u8, image: Bytes) -> Result<PathBuf, IngestError> {
    fs::create_dir_all(uploads_dir)
        .await
        .map_err(IngestError::SaveFailed)?;
    let filename = format!(
        "signal_{signal_id}_{}.jpg",
        Local::now().format(UPLOAD_TIMESTAMP)
    );
    let path = uploads_dir.join(filename);
    fs::write(&path, &image).await.map_err(IngestError::SaveFailed)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tempfile::TempDir;

    use greenwave_detect::parse::{DetectionBatch, DetectionRecord};

    struct StubDetector {
        vehicles: u32,
        ambulances: u32,
        calls: AtomicUsize,
    }

    impl StubDetector {
        fn new(vehicles: u32, ambulances: u32) -> Self {
            StubDetector {
                vehicles,
                ambulances,
                calls: AtomicUsize::new(0),
            }
        }

        fn batch(count: u32, profile: DetectionProfile) -> DetectionBatch {
            let records = (0..count)
                .map(|_| DetectionRecord {
                    source_file: "input.jpg".to_string(),
                    object_class: match profile {
                        DetectionProfile::Vehicles => "car".to_string(),
                        DetectionProfile::Ambulance => "ambulance".to_string(),
                    },
                    confidence: 0.9,
                })
                .collect::<Vec<_>>();
            let run_dir = PathBuf::from(format!("runs/{}", profile.label()));
            DetectionBatch {
                annotated_image: (count > 0).then(|| run_dir.join("overlay.jpg")),
                records,
                run_dir,
            }
        }
    }

    #[async_trait]
    impl ObjectDetector for StubDetector {
        async fn detect(
            &self,
            _image: &Path,
            profile: DetectionProfile,
        ) -> Result<DetectionBatch, DetectError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let count = match profile {
                DetectionProfile::Vehicles => self.vehicles,
                DetectionProfile::Ambulance => self.ambulances,
            };
            Ok(Self::batch(count, profile))
        }
    }

    fn store() -> SignalStore {
        SignalStore::new([(1, "North Signal".to_string()), (2, "South Signal".to_string())])
    }

    #[tokio::test]
    async fn unknown_signal_short_circuits_before_detection() {
        let store = store();
        let detector = StubDetector::new(3, 0);
        let uploads = TempDir::new().unwrap();

        let err = ingest_image(&store, &detector, uploads.path(), 9, Bytes::from_static(b"jpeg"))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::UnknownSignal(UnknownSignal(9))));
        assert_eq!(detector.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn folds_both_passes_into_the_signal() {
        let store = store();
        let detector = StubDetector::new(4, 1);
        let uploads = TempDir::new().unwrap();

        let summary = ingest_image(&store, &detector, uploads.path(), 1, Bytes::from_static(b"jpeg"))
            .await
            .unwrap();
        assert_eq!(summary.vehicle_count, 4);
        assert_eq!(summary.ambulance_count, 1);
        assert_eq!(detector.calls.load(Ordering::SeqCst), 2);

        let signal = store.get(1).unwrap();
        assert_eq!(signal.vehicle_count, 4);
        assert_eq!(signal.ambulance_count, 1);
        // Ambulance present, so its overlay is the one kept.
        assert_eq!(
            signal.annotated_image,
            Some(PathBuf::from("runs/ambulance/overlay.jpg"))
        );
    }

    #[tokio::test]
    async fn vehicle_overlay_is_kept_when_no_ambulance() {
        let store = store();
        let detector = StubDetector::new(2, 0);
        let uploads = TempDir::new().unwrap();

        ingest_image(&store, &detector, uploads.path(), 2, Bytes::from_static(b"jpeg"))
            .await
            .unwrap();

        let signal = store.get(2).unwrap();
        assert_eq!(signal.ambulance_count, 0);
        assert_eq!(
            signal.annotated_image,
            Some(PathBuf::from("runs/vehicle/overlay.jpg"))
        );
    }

    #[tokio::test]
    async fn upload_lands_in_the_uploads_dir() {
        let store = store();
        let detector = StubDetector::new(0, 0);
        let uploads = TempDir::new().unwrap();

        ingest_image(&store, &detector, uploads.path(), 1, Bytes::from_static(b"payload"))
            .await
            .unwrap();

        let mut entries = std::fs::read_dir(uploads.path()).unwrap();
        let saved = entries.next().unwrap().unwrap();
        let name = saved.file_name().to_string_lossy().to_string();
        assert!(name.starts_with("signal_1_"), "unexpected name {name}");
        assert!(name.ends_with(".jpg"));
        assert_eq!(std::fs::read(saved.path()).unwrap(), b"payload");
    }

    #[tokio::test]
    async fn detection_failure_leaves_the_signal_untouched() {
        struct FailingDetector;

        #[async_trait]
        impl ObjectDetector for FailingDetector {
            async fn detect(
                &self,
                _image: &Path,
                _profile: DetectionProfile,
            ) -> Result<DetectionBatch, DetectError> {
                Err(DetectError::TimedOut(1))
            }
        }

        let store = store();
        let uploads = TempDir::new().unwrap();

        let err = ingest_image(&store, &FailingDetector, uploads.path(), 1, Bytes::from_static(b"jpeg"))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Detection(DetectError::TimedOut(1))));

        let signal = store.get(1).unwrap();
        assert_eq!(signal.vehicle_count, 0);
        assert!(signal.annotated_image.is_none());
    }
}
