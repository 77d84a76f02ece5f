use jiff::{
    ToSpan, Zoned,
    civil::{Date, DateTime, Time, Weekday},
    tz::TimeZone,
};

/// The granularity of a wall-clock addition.
#[derive(Clone, Copy, Debug)]
pub(crate) enum WallUnit {
    Days,
    Weeks,
    Months,
    Years,
}

impl WallUnit {
    fn to_span(self, n: i64) -> Option<jiff::Span> {
        let span = jiff::Span::new();
        match self {
            WallUnit::Days => span.try_days(n).ok(),
            WallUnit::Weeks => span.try_weeks(n).ok(),
            WallUnit::Months => span.try_months(n).ok(),
            WallUnit::Years => span.try_years(n).ok(),
        }
    }
}

/// Returns the given weekday as an ISO 8601 number in `1..=7`, with Monday
/// as `1`.
///
/// This is the ordering BYDAY lists canonicalize under. (The other common
/// numbering, Sunday as `0`, is `Weekday::to_sunday_zero_offset` and needs
/// no wrapper.)
pub(crate) fn iso_weekday_number(wd: Weekday) -> i8 {
    wd.to_monday_one_offset()
}

/// Returns the number of days in the given month, or `None` if the year
/// and month do not name a valid month.
pub(crate) fn days_in_month(year: i16, month: i8) -> Option<i8> {
    Some(Date::new(year, month, 1).ok()?.days_in_month())
}

/// Returns the soonest date on or after `date` that falls on `weekday`.
pub(crate) fn next_weekday_on_or_after(
    date: Date,
    weekday: Weekday,
) -> Option<Date> {
    if date.weekday() == weekday {
        Some(date)
    } else {
        date.nth_weekday(1, weekday).ok()
    }
}

/// Returns the latest date on or before `date` that falls on `weekday`.
pub(crate) fn previous_weekday_on_or_before(
    date: Date,
    weekday: Weekday,
) -> Option<Date> {
    if date.weekday() == weekday {
        Some(date)
    } else {
        date.nth_weekday(-1, weekday).ok()
    }
}

/// Resolves a civil datetime to an instant in the given time zone.
///
/// A datetime that does not exist on the local clock (it fell into a DST
/// gap) is forwarded to the next legal instant, so the result may carry a
/// later wall-clock reading than `dt`; callers can observe the displacement
/// by comparing `result.datetime()` with `dt`. An ambiguous datetime (a DST
/// fold) resolves to the earlier of the two instants.
///
/// Returns `None` when the instant falls outside the representable range.
pub(crate) fn resolve(tz: &TimeZone, dt: DateTime) -> Option<Zoned> {
    tz.to_ambiguous_zoned(dt).compatible().ok()
}

/// Advances a zoned datetime by `n` units of date granularity, then
/// re-applies the given wall-clock time-of-day.
///
/// Re-applying the time-of-day is load bearing: when a previous occurrence
/// was forwarded out of a DST gap, its stored wall clock no longer matches
/// the anchor, and naive date arithmetic would propagate the shifted
/// time-of-day to every subsequent occurrence.
pub(crate) fn add_wall(
    zdt: &Zoned,
    n: i64,
    unit: WallUnit,
    time_of_day: Time,
) -> Option<Zoned> {
    let span = unit.to_span(n)?;
    let date = zdt.datetime().date().checked_add(span).ok()?;
    resolve(zdt.time_zone(), date.to_datetime(time_of_day))
}

/// Advances a zoned datetime by `n` days, keeping whatever wall-clock
/// time-of-day the datetime currently has.
///
/// Used by the stepping loops where BYHOUR drives the time-of-day and the
/// anchor's clock reading must not be re-applied.
pub(crate) fn add_days_keep_time(zdt: &Zoned, n: i64) -> Option<Zoned> {
    let dt = zdt.datetime();
    let date = dt.date().checked_add(n.days()).ok()?;
    resolve(zdt.time_zone(), date.to_datetime(dt.time()))
}

#[cfg(test)]
mod tests {
    use jiff::civil::{Weekday::*, date, time};

    use super::*;

    #[test]
    fn weekday_numbering() {
        assert_eq!(iso_weekday_number(Monday), 1);
        assert_eq!(iso_weekday_number(Thursday), 4);
        assert_eq!(iso_weekday_number(Sunday), 7);
    }

    #[test]
    fn month_lengths() {
        assert_eq!(days_in_month(2020, 2), Some(29));
        assert_eq!(days_in_month(2021, 2), Some(28));
        assert_eq!(days_in_month(2021, 12), Some(31));
        assert_eq!(days_in_month(2021, 4), Some(30));
        assert_eq!(days_in_month(2021, 13), None);
    }

    #[test]
    fn weekday_search() {
        // 2020-01-01 is a Wednesday.
        let d = date(2020, 1, 1);
        assert_eq!(next_weekday_on_or_after(d, Wednesday), Some(d));
        assert_eq!(
            next_weekday_on_or_after(d, Monday),
            Some(date(2020, 1, 6))
        );
        assert_eq!(previous_weekday_on_or_before(d, Wednesday), Some(d));
        assert_eq!(
            previous_weekday_on_or_before(d, Monday),
            Some(date(2019, 12, 30))
        );
    }

    #[test]
    fn add_wall_reapplies_time_of_day() {
        // 2020-03-08 02:30 does not exist in New York. The resolved
        // occurrence for that day is forwarded an hour, but the next
        // day must come back to the anchor's clock reading.
        let tz = TimeZone::get("America/New_York").unwrap();
        let anchor = time(2, 30, 0, 0);
        let start = resolve(&tz, date(2020, 3, 7).at(2, 30, 0, 0)).unwrap();

        let gap_day = add_wall(&start, 1, WallUnit::Days, anchor).unwrap();
        assert_eq!(gap_day.datetime(), date(2020, 3, 8).at(3, 30, 0, 0));

        let after = add_wall(&gap_day, 1, WallUnit::Days, anchor).unwrap();
        assert_eq!(after.datetime(), date(2020, 3, 9).at(2, 30, 0, 0));
    }

    #[test]
    fn add_wall_constrains_short_months() {
        let tz = TimeZone::get("UTC").unwrap();
        let anchor = time(9, 0, 0, 0);
        let start = resolve(&tz, date(2020, 1, 31).at(9, 0, 0, 0)).unwrap();
        let next = add_wall(&start, 1, WallUnit::Months, anchor).unwrap();
        assert_eq!(next.datetime(), date(2020, 2, 29).at(9, 0, 0, 0));
    }
}
