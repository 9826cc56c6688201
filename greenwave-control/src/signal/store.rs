use std::collections::BTreeMap;
use std::path::PathBuf;

use parking_lot::Mutex;
use thiserror::Error;

/// Lookup of a signal id outside the fixed set configured at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown signal id {0}")]
pub struct UnknownSignal(pub u8);

/// Sensed state of one intersection approach.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub id: u8,
    pub name: String,
    pub vehicle_count: u32,
    pub ambulance_count: u32,
    pub timing: u32,
    pub annotated_image: Option<PathBuf>,
}

impl Signal {
    fn new(id: u8, name: String) -> Self {
        Signal {
            id,
            name,
            vehicle_count: 0,
            ambulance_count: 0,
            timing: 0,
            annotated_image: None,
        }
    }
}

/// Owns every signal's sensed state. The id set is fixed at construction, so
/// the outer map is never locked; each signal carries its own mutex and every
/// read-modify-write happens under it.
pub struct SignalStore {
    signals: BTreeMap<u8, Mutex<Signal>>,
}

impl SignalStore {
    pub fn new(definitions: impl IntoIterator<Item = (u8, String)>) -> Self {
        let signals = definitions
            .into_iter()
            .map(|(id, name)| (id, Mutex::new(Signal::new(id, name))))
            .collect();
        SignalStore { signals }
    }

    pub fn contains(&self, id: u8) -> bool {
        self.signals.contains_key(&id)
    }

    /// Cloned snapshot of one signal.
    pub fn get(&self, id: u8) -> Result<Signal, UnknownSignal> {
        self.signals
            .get(&id)
            .map(|slot| slot.lock().clone())
            .ok_or(UnknownSignal(id))
    }

    /// Applies `apply` under the signal's lock. Concurrent updates to the
    /// same id serialize; the closure sees and leaves a consistent signal.
    pub fn update(&self, id: u8, apply: impl FnOnce(&mut Signal)) -> Result<(), UnknownSignal> {
        let slot = self.signals.get(&id).ok_or(UnknownSignal(id))?;
        let mut signal = slot.lock();
        apply(&mut signal);
        Ok(())
    }

    /// Per-signal snapshots of the whole table, keyed by id.
    pub fn snapshot(&self) -> BTreeMap<u8, Signal> {
        self.signals
            .iter()
            .map(|(id, slot)| (*id, slot.lock().clone()))
            .collect()
    }
}

// ============================================================
// Tests
// ============================================================
