//! Business-day calendar (Monday to Friday)

use chrono::{Datelike, NaiveDate, Weekday};

pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// All business days in `[start, end]`, ascending. Empty when `end < start`.
pub fn business_days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|day| *day <= end)
        .filter(|day| is_business_day(*day))
        .collect()
}

/// First business day strictly after `date`, `None` past the end of the calendar
pub fn next_business_day(date: NaiveDate) -> Option<NaiveDate> {
    date.iter_days().skip(1).find(|day| is_business_day(*day))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_business_days_skip_weekend() {
        // 2026-03-06 is a Friday
        let days = business_days(d(2026, 3, 6), d(2026, 3, 10));
        assert_eq!(days, vec![d(2026, 3, 6), d(2026, 3, 9), d(2026, 3, 10)]);
    }

    #[test]
    fn test_weekend_only_range_is_empty() {
        assert!(business_days(d(2026, 3, 7), d(2026, 3, 8)).is_empty());
        assert!(business_days(d(2026, 3, 10), d(2026, 3, 9)).is_empty());
    }

    #[test]
    fn test_next_business_day() {
        assert_eq!(next_business_day(d(2026, 3, 6)), Some(d(2026, 3, 9)));
        assert_eq!(next_business_day(d(2026, 3, 7)), Some(d(2026, 3, 9)));
        assert_eq!(next_business_day(d(2026, 3, 9)), Some(d(2026, 3, 10)));
    }

    #[test]
    fn test_calendar_end_does_not_overflow() {
        let start = NaiveDate::MAX - chrono::Duration::days(10);
        let days = business_days(start, NaiveDate::MAX);
        assert!(!days.is_empty());
        assert!(days.len() <= 11);
        assert_eq!(next_business_day(NaiveDate::MAX), None);
    }
}
