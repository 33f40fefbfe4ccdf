//! Approximate firing order of all hardware alarms.
//!
//! A full priority queue is not needed: the register only ever holds the
//! first *enabled* entry, so the schedule keeps enabled entries sorted by
//! their next firing time and lets disabled entries sit wherever they were
//! inserted. A disabled entry's position reflects the "now" of its insertion,
//! so it is only trusted once it reaches the front: [`Schedule::reconcile`]
//! lifts leading disabled entries out and re-inserts them against the
//! current time.

use chrono::NaiveDateTime;
use heapless::index_map::FnvIndexMap;

use crate::alarm::{Alarm, AlarmId};
use crate::config::{MAX_ALARMS, MAX_HARDWARE_ALARMS};
use crate::hw_alarm::HardwareAlarm;

/// Alarm table keyed by id.
pub type AlarmTable = FnvIndexMap<AlarmId, Alarm, MAX_ALARMS>;

fn is_enabled(alarms: &AlarmTable, id: AlarmId) -> bool {
    alarms.get(&id).is_some_and(|alarm| alarm.enabled)
}

/// Ordered sequence of [`HardwareAlarm`]s.
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    entries: heapless::Vec<HardwareAlarm, MAX_HARDWARE_ALARMS>,
}

impl Schedule {
    /// Empty schedule.
    pub const fn new() -> Self {
        Self {
            entries: heapless::Vec::new(),
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate in firing order.
    pub fn iter(&self) -> impl Iterator<Item = &HardwareAlarm> {
        self.entries.iter()
    }

    /// Free slots left.
    pub fn remaining_capacity(&self) -> usize {
        MAX_HARDWARE_ALARMS.saturating_sub(self.entries.len())
    }

    /// Insert `entry` before the first enabled entry that fires at the same
    /// time or later; append if there is none.
    ///
    /// Returns the insertion index, or gives `entry` back if the schedule is
    /// full.
    pub fn insert(
        &mut self,
        entry: HardwareAlarm,
        now: &NaiveDateTime,
        alarms: &AlarmTable,
    ) -> Result<usize, HardwareAlarm> {
        let fires_at = entry.next_firing(now);
        let position = self
            .entries
            .iter()
            .position(|other| {
                is_enabled(alarms, other.parent()) && fires_at <= other.next_firing(now)
            })
            .unwrap_or(self.entries.len());

        self.entries.insert(position, entry)?;
        tracing::debug!("scheduled hardware alarm ({}) at position {}", entry, position);
        Ok(position)
    }

    /// Remove every entry of `parent`, returning how many were dropped.
    pub fn remove_alarm(&mut self, parent: AlarmId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.parent() != parent);
        before.saturating_sub(self.entries.len())
    }

    /// Remove and return the entry at `index`.
    pub fn take(&mut self, index: usize) -> Option<HardwareAlarm> {
        (index < self.entries.len()).then(|| self.entries.remove(index))
    }

    /// Entry at `index`.
    pub fn get(&self, index: usize) -> Option<&HardwareAlarm> {
        self.entries.get(index)
    }

    /// Index of the entry with the same parent and weekday as `entry`.
    pub fn position_of(&self, entry: &HardwareAlarm) -> Option<usize> {
        self.entries.iter().position(|other| other.same_slot(entry))
    }

    /// Index of the first entry whose parent is enabled.
    pub fn first_enabled(&self, alarms: &AlarmTable) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| is_enabled(alarms, entry.parent()))
    }

    /// Re-insert leading disabled entries against `now` and return the entry
    /// that should be loaded into the register.
    ///
    /// The leading block is lifted out as a whole before re-insertion, so
    /// each entry moves exactly once even when it lands back at the front.
    pub fn reconcile(&mut self, now: &NaiveDateTime, alarms: &AlarmTable) -> Option<HardwareAlarm> {
        let leading_disabled = self
            .entries
            .iter()
            .take_while(|entry| !is_enabled(alarms, entry.parent()))
            .count();

        if leading_disabled > 0 {
            let mut lifted: heapless::Vec<HardwareAlarm, MAX_HARDWARE_ALARMS> =
                heapless::Vec::new();
            for _ in 0..leading_disabled {
                if let Some(entry) = self.take(0) {
                    let _ = lifted.push(entry);
                }
            }
            for entry in lifted {
                // Slots were just freed, so this cannot fail
                let _ = self.insert(entry, now, alarms);
            }
        }

        self.first_enabled(alarms)
            .and_then(|index| self.entries.get(index))
            .copied()
    }

    /// Snapshot of the current order.
    pub fn snapshot(&self) -> heapless::Vec<HardwareAlarm, MAX_HARDWARE_ALARMS> {
        self.entries.clone()
    }
}
