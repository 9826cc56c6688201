use std::collections::{BTreeMap, HashSet};

use log::debug;

use super::PRIORITY_FLOOR_SECS;

/// One requested signal in an allocation round.
#[derive(Debug, Clone, Copy)]
pub struct TimingRequest {
    pub signal_id: u8,
    pub vehicle_count: u32,
}

/// Tunable allocation behavior. The default matches the current controller:
/// vehicle-proportional grants carry no floor. Setting
/// `non_priority_floor_secs` restores the older controller's 15 second
/// minimum per served signal.
#[derive(Debug, Clone, Default)]
pub struct AllocationPolicy {
    pub non_priority_floor_secs: Option<u32>,
}

/// What one allocation round decided. Signals absent from `timings` keep
/// their prior value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationOutcome {
    pub timings: BTreeMap<u8, u32>,
    pub ambulance_priority: bool,
}

/// Splits `total_time` seconds of green across the requested signals.
///
/// Signals with an ambulance inbound are served first: each gets an even
/// split of the whole budget, or `PRIORITY_FLOOR_SECS` if the split falls
/// under it. Whatever remains (negative when many priority signals squeeze a
/// small budget) is divided among the rest in proportion to their vehicle
/// counts. When those counts sum to zero the remainder is not distributed at
/// all and the non-priority signals keep their prior timing.
pub fn allocate(
    requests: &[TimingRequest],
    ambulance_presence: &HashSet<u8>,
    total_time: u32,
    policy: &AllocationPolicy,
) -> AllocationOutcome {
    let mut timings = BTreeMap::new();

    let (priority, rest): (Vec<&TimingRequest>, Vec<&TimingRequest>) = requests
        .iter()
        .partition(|request| ambulance_presence.contains(&request.signal_id));

    let mut remaining = i64::from(total_time);
    if !priority.is_empty() {
        let priority_time = PRIORITY_FLOOR_SECS.max(i64::from(total_time) / priority.len() as i64);
        for request in &priority {
            timings.insert(request.signal_id, priority_time as u32);
            remaining -= priority_time;
        }
    }

    let total_vehicles: i64 = rest.iter().map(|request| i64::from(request.vehicle_count)).sum();
    if total_vehicles > 0 {
        let floor = i64::from(policy.non_priority_floor_secs.unwrap_or(0));
        for request in &rest {
            let share = (i128::from(request.vehicle_count) * i128::from(remaining)
                / i128::from(total_vehicles)) as i64;
            timings.insert(request.signal_id, share.max(floor).max(0) as u32);
        }
    }

    debug!(
        "allocated {:?} from {}s budget (priority: {})",
        timings,
        total_time,
        !priority.is_empty()
    );
    AllocationOutcome {
        timings,
        ambulance_priority: !priority.is_empty(),
    }
}
