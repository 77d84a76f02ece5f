use jiff::{
    ToSpan,
    civil::{Date, Weekday},
};

/// A date in a week numbering scheme with a configurable first day of the
/// week.
///
/// Week number one of a year is the first week that contains at least four
/// days of that calendar year. With weeks starting on Monday this is exactly
/// the ISO 8601 week date calendar; WKST shifts which weekday opens a week
/// and, with it, where week boundaries fall at the edges of a year.
#[derive(Clone, Copy, Debug)]
pub(crate) struct WeekDate {
    start: Weekday,
    year: i16,
    week: i8,
    weekday: Weekday,
}

impl WeekDate {
    /// Create a new week date.
    ///
    /// Returns `None` when the week number does not exist for the year
    /// (week 53 in a short year) or when the date would fall outside the
    /// supported calendar range.
    pub(crate) fn new(
        start: Weekday,
        year: i16,
        week: i8,
        weekday: Weekday,
    ) -> Option<WeekDate> {
        if week < 1 || week > weeks_in_year(start, year) {
            return None;
        }
        let wd = WeekDate { start, year, week, weekday };
        // Constructing the Gregorian date is the cheapest way to find out
        // whether the week date is representable at the calendar limits.
        wd.to_date()?;
        Some(wd)
    }

    /// Converts this week date to its corresponding Gregorian date.
    pub(crate) fn to_date(self) -> Option<Date> {
        let start_of_year = week_start_of_year(self.start, self.year)?;
        let mut days = i32::from(self.week - 1) * 7;
        days += i32::from(self.weekday.since(self.start));
        start_of_year.checked_add(days.days()).ok()
    }
}

/// Returns the number of weeks in the given week year: 53 for a "long"
/// year and 52 otherwise.
pub(crate) fn weeks_in_year(start: Weekday, year: i16) -> i8 {
    let Ok(last) = Date::new(year, 12, 31) else { return 52 };
    let weekday = last.weekday();
    let long = weekday == start.wrapping_add(3)
        || (last.in_leap_year() && weekday == start.wrapping_add(4));
    if long { 53 } else { 52 }
}

/// Returns the first date in the first week of the given year.
///
/// The date returned is guaranteed to have a weekday equivalent to `start`.
fn week_start_of_year(start: Weekday, year: i16) -> Option<Date> {
    // RFC 5545 defines week one as the first week with at least four days
    // in the calendar year, which means Jan 4 is always inside it.
    let date_in_first_week = Date::new(year, 1, 4).ok()?;
    let diff_from_start = date_in_first_week.weekday().since(start);
    date_in_first_week.checked_sub(diff_from_start.days()).ok()
}

#[cfg(test)]
mod tests {
    use jiff::civil::{Weekday::*, date};

    use super::*;

    #[test]
    fn week_one_boundaries() {
        // Week 1 of 2018 opens on 2018-01-01, a Monday.
        let wd = WeekDate::new(Monday, 2018, 1, Monday).unwrap();
        assert_eq!(wd.to_date(), Some(date(2018, 1, 1)));

        // Week 1 of 2019 already opens in the previous calendar year.
        let wd = WeekDate::new(Monday, 2019, 1, Monday).unwrap();
        assert_eq!(wd.to_date(), Some(date(2018, 12, 31)));

        // Week 1 of 2020 opens on 2019-12-30.
        let wd = WeekDate::new(Monday, 2020, 1, Monday).unwrap();
        assert_eq!(wd.to_date(), Some(date(2019, 12, 30)));
    }

    #[test]
    fn long_and_short_years() {
        // 2020 is a long ISO year (it starts on a Wednesday and is leap).
        assert_eq!(weeks_in_year(Monday, 2020), 53);
        assert_eq!(weeks_in_year(Monday, 2021), 52);
        assert!(WeekDate::new(Monday, 2020, 53, Friday).is_some());
        assert!(WeekDate::new(Monday, 2021, 53, Friday).is_none());
        assert!(WeekDate::new(Monday, 2021, 0, Friday).is_none());
    }

    /// For weeks starting on Monday the scheme must agree with Jiff's ISO
    /// week dates.
    #[test]
    fn consistent_with_iso() {
        for year in [1997, 2015, 2016, 2020, 2021, 2024] {
            for (month, day) in [(1, 1), (1, 4), (6, 15), (12, 28), (12, 31)]
            {
                let d = date(year, month, day);
                let iso = d.iso_week_date();
                let wd = WeekDate::new(
                    Monday,
                    iso.year(),
                    iso.week(),
                    iso.weekday(),
                )
                .unwrap();
                assert_eq!(wd.to_date(), Some(d), "for {d}");
            }
        }
    }

    #[test]
    fn respects_week_start() {
        // With weeks starting on Sunday, week 1 of 2019 opens on
        // 2018-12-30 (the Sunday whose week contains 2019-01-03).
        let wd = WeekDate::new(Sunday, 2019, 1, Sunday).unwrap();
        assert_eq!(wd.to_date(), Some(date(2018, 12, 30)));
    }
}
