//! Daily schedule builder.
//!
//! Greedy, deterministic allocator: peak hours get the largest budget
//! and the widest eligibility list, every Nth hour gets a medium
//! budget for high-priority zones, the rest get a small budget for the
//! head of the high-priority list. The running total is capped at the
//! ceiling; the slot that would overflow is truncated and later hours
//! get nothing. Predictable and tier-fair rather than optimal — that
//! trade-off is deliberate.

use std::collections::BTreeMap;

use common::config::QuotaConfig;
use common::{PriorityTier, ZoneRegistry};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Lifecycle of an hourly slot. Never moves backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Pending,
    Active,
    Completed,
}

/// One hour's worth of planned refresh work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSlot {
    /// Hour of day, 0-23.
    pub hour: u32,
    /// Calls budgeted for this slot.
    pub planned: u32,
    /// Calls actually made in this slot.
    pub executed: u32,
    /// Zone IDs eligible for refresh, in priority order.
    pub zones: Vec<String>,
    pub status: SlotStatus,
}

impl ScheduleSlot {
    pub fn is_completed(&self) -> bool {
        self.status == SlotStatus::Completed
    }

    /// Remaining budget in this slot.
    pub fn remaining(&self) -> u32 {
        self.planned.saturating_sub(self.executed)
    }
}

/// Build the 24-hour schedule for one day, capped at `ceiling`.
///
/// The eligibility list of each slot is truncated to half the planned
/// budget, leaving headroom for forced refreshes and retries.
pub fn build_daily_schedule(
    ceiling: u32,
    registry: &ZoneRegistry,
    config: &QuotaConfig,
) -> BTreeMap<u32, ScheduleSlot> {
    let high = registry.ids_by_priority(PriorityTier::High);
    let medium = registry.ids_by_priority(PriorityTier::Medium);

    let mut schedule = BTreeMap::new();
    let mut total = 0u32;

    for hour in 0..24u32 {
        let (mut planned, eligible): (u32, Vec<String>) = if config.peak_hours.contains(&hour) {
            // Peak hours: all high-priority zones plus a few medium.
            let mut zones = high.clone();
            zones.extend(medium.iter().take(4).cloned());
            (config.peak_slot_calls, zones)
        } else if config.offpeak_cadence_hours > 0 && hour % config.offpeak_cadence_hours == 0 {
            (config.cadence_slot_calls, high.clone())
        } else {
            (config.offpeak_slot_calls, high.iter().take(4).cloned().collect())
        };

        // Truncate the slot that would overflow the ceiling.
        if total + planned > ceiling {
            planned = ceiling - total;
        }

        let mut zones = eligible;
        zones.truncate((planned / 2) as usize);

        schedule.insert(
            hour,
            ScheduleSlot {
                hour,
                planned,
                executed: 0,
                zones,
                status: SlotStatus::Pending,
            },
        );

        total += planned;
        if total >= ceiling {
            break;
        }
    }

    info!(
        "Built daily schedule: {} slots, {} planned calls (ceiling {})",
        schedule.len(),
        total,
        ceiling
    );
    schedule
}

/// Sum of planned calls across all slots.
pub fn total_planned(schedule: &BTreeMap<u32, ScheduleSlot>) -> u32 {
    schedule.values().map(|s| s.planned).sum()
}

/// First slot at or after `hour` that still has budget left.
pub fn next_available_hour(schedule: &BTreeMap<u32, ScheduleSlot>, hour: u32) -> Option<u32> {
    schedule
        .range(hour..)
        .find(|(_, slot)| !slot.is_completed() && slot.remaining() > 0)
        .map(|(h, _)| *h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::config::QuotaConfig;
    use common::ZoneRegistry;

    fn build_default() -> BTreeMap<u32, ScheduleSlot> {
        let registry = ZoneRegistry::guadeloupe();
        let config = QuotaConfig::default();
        build_daily_schedule(config.daily_call_limit, &registry, &config)
    }

    #[test]
    fn test_total_planned_within_ceiling() {
        let schedule = build_default();
        assert!(total_planned(&schedule) <= 1000);
    }

    #[test]
    fn test_peak_hours_outrank_all_others() {
        // Scenario: ceiling 1000, 32 zones, peak {6,8,12,16,18,20} —
        // every peak slot's budget must be >= every non-peak slot's.
        let schedule = build_default();
        let config = QuotaConfig::default();

        let min_peak = config
            .peak_hours
            .iter()
            .filter_map(|h| schedule.get(h))
            .map(|s| s.planned)
            .min()
            .unwrap();
        let max_offpeak = schedule
            .values()
            .filter(|s| !config.peak_hours.contains(&s.hour))
            .map(|s| s.planned)
            .max()
            .unwrap();

        assert!(
            min_peak >= max_offpeak,
            "peak slot budget {min_peak} below off-peak {max_offpeak}"
        );
    }

    #[test]
    fn test_deterministic() {
        let a = build_default();
        let b = build_default();
        assert_eq!(a.len(), b.len());
        for (hour, slot) in &a {
            let other = &b[hour];
            assert_eq!(slot.planned, other.planned);
            assert_eq!(slot.zones, other.zones);
        }
    }

    #[test]
    fn test_small_ceiling_truncates_and_stops() {
        let registry = ZoneRegistry::guadeloupe();
        let config = QuotaConfig::default();
        let schedule = build_daily_schedule(60, &registry, &config);

        assert_eq!(total_planned(&schedule), 60);
        // Hour 0 (cadence) takes 35, hour 1 takes 20, hour 2 is
        // truncated to the remaining 5 and allocation stops there.
        assert_eq!(schedule[&0].planned, 35);
        assert_eq!(schedule[&1].planned, 20);
        assert_eq!(schedule[&2].planned, 5);
        assert!(!schedule.contains_key(&3));
    }

    #[test]
    fn test_eligibility_biased_toward_high_priority() {
        let registry = ZoneRegistry::guadeloupe();
        let high = registry.ids_by_priority(common::PriorityTier::High);
        let schedule = build_default();

        // Cadence slots carry only high-priority zones.
        let slot = &schedule[&0];
        for zone in &slot.zones {
            assert!(high.contains(zone), "{zone} is not high priority");
        }

        // Peak slots reach into medium priority.
        let peak = &schedule[&6];
        assert!(peak.zones.len() > slot.zones.len());
    }

    #[test]
    fn test_next_available_hour_skips_spent_slots() {
        let mut schedule = build_default();
        if let Some(slot) = schedule.get_mut(&0) {
            slot.executed = slot.planned;
            slot.status = SlotStatus::Completed;
        }
        assert_eq!(next_available_hour(&schedule, 0), Some(1));
    }
}
