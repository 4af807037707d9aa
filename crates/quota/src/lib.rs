//! Daily call-quota accounting and scheduling.
//!
//! The ledger owns the one piece of state that must never be wrong:
//! how many upstream calls have been spent today against the ceiling.
//! The schedule builder partitions the day into hourly slots so the
//! budget concentrates where consumers actually look.

pub mod ledger;
pub mod schedule;

pub use ledger::{Admission, DenyReason, QuotaLedger, QuotaStats, Reservation, UsageCounters};
pub use schedule::{build_daily_schedule, ScheduleSlot, SlotStatus};
