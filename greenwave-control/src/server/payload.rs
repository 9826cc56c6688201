use serde::{Deserialize, Serialize};

use crate::signal::store::Signal;
use crate::signal::timing::TimingRequest;

/// One signal as `GET /signals` reports it. Filesystem paths stay private;
/// the overlay is reachable through its fetch URL instead.
#[derive(Debug, Serialize)]
pub struct SignalView {
    pub name: String,
    pub vehicle_count: u32,
    pub ambulance_count: u32,
    pub timing: u32,
    pub image_url: Option<String>,
}

impl From<&Signal> for SignalView {
    fn from(signal: &Signal) -> Self {
        SignalView {
            name: signal.name.clone(),
            vehicle_count: signal.vehicle_count,
            ambulance_count: signal.ambulance_count,
            timing: signal.timing,
            image_url: signal
                .annotated_image
                .as_ref()
                .map(|_| format!("/get-image/{}", signal.id)),
        }
    }
}

/// One entry of an `/update-timings` request. Clients also send a requested
/// timing and a cycle `signal_duration` per entry; both are ignored, the
/// allocator trusts the store's sensed state plus the counts given here.
#[derive(Debug, Deserialize)]
pub struct TimingEntry {
    pub signal_id: u8,
    pub vehicle_count: u32,
}

impl TimingEntry {
    pub fn as_request(&self) -> TimingRequest {
        TimingRequest {
            signal_id: self.signal_id,
            vehicle_count: self.vehicle_count,
        }
    }
}

/// `POST /update-timings` body.
#[derive(Debug, Deserialize)]
pub struct UpdateTimings {
    pub timings: Vec<TimingEntry>,
    pub total_time: u32,
}

/// `POST /update-timings` reply.
#[derive(Debug, Serialize)]
pub struct TimingsUpdated {
    pub message: &'static str,
    pub ambulance_priority: bool,
}

/// `POST /upload-image/{signal_id}` reply.
#[derive(Debug, Serialize)]
pub struct UploadAccepted {
    pub signal_id: u8,
    pub vehicle_count: u32,
    pub ambulance_count: u32,
    pub message: &'static str,
    pub image_url: String,
}

/// Body of every non-2xx JSON response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}
