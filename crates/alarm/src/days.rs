//! Repeat pattern of an alarm.

use core::fmt;

use chrono::Weekday;
use platform::OutOfRangeError;

/// Seven-bit weekday set; bit *d* is the day *d* days after Monday.
///
/// The set falls into three classes that drive scheduling:
///
/// | Class | Mask | Behaviour |
/// |-------|------|-----------|
/// | [one-shot](Self::is_one_shot) | empty | fires once, then disables itself |
/// | [every day](Self::is_every_day) | all seven | one day-independent trigger |
/// | [weekly](Self::uses_days_of_week) | anything else | one trigger per selected day |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DaysOfWeek(u8);

impl DaysOfWeek {
    const ALL_BITS: u8 = 0x7F;

    /// No days: a one-shot alarm.
    pub const NONE: Self = Self(0);

    /// All seven days.
    pub const EVERY_DAY: Self = Self(Self::ALL_BITS);

    /// Monday to Friday.
    pub const WEEKDAYS: Self = Self(0x1F);

    /// Build from a raw mask.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] if bit 7 is set.
    pub fn try_from_mask(mask: u8) -> Result<Self, OutOfRangeError> {
        if mask & !Self::ALL_BITS == 0 {
            Ok(Self(mask))
        } else {
            Err(OutOfRangeError {
                value: u32::from(mask),
                min: 0,
                max: u32::from(Self::ALL_BITS),
            })
        }
    }

    /// Build from one flag per day, Monday first.
    pub fn from_flags(flags: [bool; 7]) -> Self {
        flags
            .iter()
            .zip(0u32..)
            .filter(|(set, _)| **set)
            .fold(Self::NONE, |days, (_, bit)| Self(days.0 | 1u8.wrapping_shl(bit)))
    }

    /// Raw mask.
    pub const fn mask(self) -> u8 {
        self.0
    }

    /// Whether `day` is selected.
    pub fn is_set(self, day: Weekday) -> bool {
        self.0 & Self::bit(day) != 0
    }

    /// Select or deselect `day`.
    pub fn set(&mut self, day: Weekday, value: bool) {
        if value {
            self.0 |= Self::bit(day);
        } else {
            self.0 &= !Self::bit(day);
        }
    }

    /// Number of selected days.
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// No repeat days.
    pub const fn is_one_shot(self) -> bool {
        self.0 == 0
    }

    /// All seven days.
    pub const fn is_every_day(self) -> bool {
        self.0 == Self::ALL_BITS
    }

    /// Whether the alarm needs one trigger per selected weekday.
    pub const fn uses_days_of_week(self) -> bool {
        !self.is_one_shot() && !self.is_every_day()
    }

    /// Selected days, Monday first.
    pub fn iter(self) -> impl Iterator<Item = Weekday> {
        [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ]
        .into_iter()
        .filter(move |day| self.is_set(*day))
    }

    fn bit(day: Weekday) -> u8 {
        1u8.wrapping_shl(day.num_days_from_monday())
    }
}

impl fmt::Display for DaysOfWeek {
    /// `MTWTFSS` with `-` for unselected days.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const LETTERS: [(Weekday, char); 7] = [
            (Weekday::Mon, 'M'),
            (Weekday::Tue, 'T'),
            (Weekday::Wed, 'W'),
            (Weekday::Thu, 'T'),
            (Weekday::Fri, 'F'),
            (Weekday::Sat, 'S'),
            (Weekday::Sun, 'S'),
        ];
        for (day, letter) in LETTERS {
            let c = if self.is_set(day) { letter } else { '-' };
            fmt::Write::write_char(f, c)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classes() {
        assert!(DaysOfWeek::NONE.is_one_shot());
        assert!(!DaysOfWeek::NONE.uses_days_of_week());

        assert!(DaysOfWeek::EVERY_DAY.is_every_day());
        assert!(!DaysOfWeek::EVERY_DAY.uses_days_of_week());

        assert!(DaysOfWeek::WEEKDAYS.uses_days_of_week());
        assert!(!DaysOfWeek::WEEKDAYS.is_one_shot());
    }

    #[test]
    fn test_set_and_clear() {
        let mut days = DaysOfWeek::NONE;
        days.set(Weekday::Sun, true);
        assert!(days.is_set(Weekday::Sun));
        assert_eq!(days.mask(), 0x40);

        days.set(Weekday::Sun, false);
        assert!(days.is_one_shot());
    }

    #[test]
    fn test_try_from_mask_rejects_bit_seven() {
        assert_eq!(DaysOfWeek::try_from_mask(0x7F), Ok(DaysOfWeek::EVERY_DAY));
        let err = DaysOfWeek::try_from_mask(0x80).unwrap_err();
        assert_eq!(err.value, 0x80);
        assert_eq!(err.max, 0x7F);
    }

    #[test]
    fn test_from_flags_monday_first() {
        let days = DaysOfWeek::from_flags([true, false, true, false, false, false, true]);
        assert_eq!(days.mask(), 0b100_0101);
        assert_eq!(days.count(), 3);
    }

    #[test]
    fn test_iter_yields_selected_days_in_order() {
        let days = DaysOfWeek::from_flags([false, true, false, false, true, false, false]);
        let selected: Vec<Weekday> = days.iter().collect();
        assert_eq!(selected, vec![Weekday::Tue, Weekday::Fri]);
    }

    #[test]
    fn test_display() {
        assert_eq!(DaysOfWeek::WEEKDAYS.to_string(), "MTWTF--");
        assert_eq!(DaysOfWeek::NONE.to_string(), "-------");
    }
}
