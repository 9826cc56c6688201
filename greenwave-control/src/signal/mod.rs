pub mod ingest;
pub mod store;
pub mod timing;

/// Seconds guaranteed to a signal with an ambulance inbound, however thin
/// the cycle budget gets once it is split between priority signals.
pub(crate) const PRIORITY_FLOOR_SECS: i64 = 45;
