use jiff::{ToSpan, civil::Date, civil::DateTime};

use crate::{
    calendar::{days_in_month, next_weekday_on_or_after},
    rule::{ByWeekday, Rule},
};

/// One candidate occurrence within a single (year, month) cell.
///
/// The derived ordering is the lexicographic `(day, hour, minute, second)`
/// ordering the drivers compare cursors against.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub(crate) struct Candidate {
    pub(crate) day: i8,
    pub(crate) hour: i8,
    pub(crate) minute: i8,
    pub(crate) second: i8,
}

impl Candidate {
    /// A floor that every real candidate compares above.
    pub(crate) const MIN: Candidate =
        Candidate { day: 0, hour: 0, minute: 0, second: 0 };
}

/// Computes the sorted, deduplicated candidate occurrences that the rule's
/// BY parts generate within the given month.
///
/// The day set comes from BYDAY and/or BYMONTHDAY. When both are present
/// the result is their intersection, and a numbered BYDAY entry selects its
/// k-th matching date *before* the intersection is taken. When neither is
/// present, `anchor_day_fallback` selects the anchor's day-of-month (used
/// by yearly expansion over BYMONTH); days that do not exist in the month
/// are dropped, as are numbered entries whose k-th occurrence does not
/// exist.
///
/// The day set is then crossed with BYHOUR/BYMINUTE/BYSECOND, each falling
/// back to the anchor's time-of-day, and finally filtered by BYSETPOS.
pub(crate) fn occurrences(
    rule: &Rule,
    anchor: DateTime,
    year: i16,
    month: i8,
    anchor_day_fallback: bool,
) -> Vec<Candidate> {
    let Some(days_in_month) = days_in_month(year, month) else {
        return vec![];
    };
    let Ok(first) = Date::new(year, month, 1) else { return vec![] };

    let weekday_days = if rule.by_day().is_empty() {
        None
    } else {
        let mut days: Vec<i8> = vec![];
        for entry in rule.by_day() {
            match *entry {
                ByWeekday::Any(weekday) => {
                    let mut date = next_weekday_on_or_after(first, weekday);
                    while let Some(d) = date {
                        if (d.year(), d.month()) != (year, month) {
                            break;
                        }
                        days.push(d.day());
                        date = d.checked_add(1.weeks()).ok();
                    }
                }
                ByWeekday::Numbered { nth, weekday } => {
                    // The k-th matching date, counted from the end of the
                    // month for negative k. A month without a k-th match
                    // contributes nothing.
                    if let Ok(d) = first.nth_weekday_of_month(nth, weekday) {
                        days.push(d.day());
                    }
                }
            }
        }
        days.sort();
        days.dedup();
        Some(days)
    };

    let month_days = if rule.by_month_day().is_empty() {
        None
    } else {
        let mut days: Vec<i8> = vec![];
        for &v in rule.by_month_day() {
            let day = if v > 0 { v } else { days_in_month + 1 + v };
            if 1 <= day && day <= days_in_month {
                days.push(day);
            }
        }
        days.sort();
        days.dedup();
        Some(days)
    };

    let day_set: Vec<i8> = match (weekday_days, month_days) {
        (Some(mut bd), Some(bmd)) => {
            bd.retain(|day| bmd.binary_search(day).is_ok());
            bd
        }
        (Some(bd), None) => bd,
        (None, Some(bmd)) => bmd,
        (None, None) => {
            if anchor_day_fallback && anchor.day() <= days_in_month {
                vec![anchor.day()]
            } else {
                vec![]
            }
        }
    };

    let hours = or_anchor(rule.by_hour(), anchor.hour());
    let minutes = or_anchor(rule.by_minute(), anchor.minute());
    let seconds = or_anchor(rule.by_second(), anchor.second());

    let mut candidates = Vec::with_capacity(
        day_set.len() * hours.len() * minutes.len() * seconds.len(),
    );
    for &day in &day_set {
        for &hour in &hours {
            for &minute in &minutes {
                for &second in &seconds {
                    candidates.push(Candidate { day, hour, minute, second });
                }
            }
        }
    }
    candidates.sort();
    candidates.dedup();
    apply_by_set_pos(rule.by_set_pos(), candidates)
}

fn or_anchor(values: &[i8], anchor: i8) -> Vec<i8> {
    if values.is_empty() { vec![anchor] } else { values.to_vec() }
}

/// Selects the BYSETPOS positions out of an ordered candidate list.
///
/// Positions are one-indexed; negative positions count from the end.
/// Out-of-range positions are dropped, and the selection is emitted in the
/// candidates' own ascending order, not in BYSETPOS order.
fn apply_by_set_pos(
    positions: &[i32],
    candidates: Vec<Candidate>,
) -> Vec<Candidate> {
    if positions.is_empty() {
        return candidates;
    }
    let len = candidates.len() as i64;
    let mut keep: Vec<usize> = vec![];
    for &p in positions {
        let idx =
            if p > 0 { i64::from(p) - 1 } else { len + i64::from(p) };
        if 0 <= idx && idx < len {
            keep.push(idx as usize);
        }
    }
    keep.sort();
    keep.dedup();
    keep.into_iter().map(|i| candidates[i]).collect()
}

#[cfg(test)]
mod tests {
    use jiff::civil::{Weekday, date};

    use super::*;
    use crate::rule::Frequency;

    fn days(candidates: &[Candidate]) -> Vec<i8> {
        let mut days: Vec<i8> =
            candidates.iter().map(|c| c.day).collect();
        days.dedup();
        days
    }

    #[test]
    fn plain_weekdays() {
        let rule = Rule::builder(Frequency::Monthly)
            .by_day([Weekday::Tuesday])
            .build()
            .unwrap();
        let anchor = date(2020, 1, 1).at(9, 0, 0, 0);
        let occ = occurrences(&rule, anchor, 2020, 1, false);
        assert_eq!(days(&occ), vec![7, 14, 21, 28]);
        // Every candidate carries the anchor's time of day.
        assert!(occ.iter().all(|c| (c.hour, c.minute, c.second) == (9, 0, 0)));
    }

    #[test]
    fn numbered_weekdays() {
        let rule = Rule::builder(Frequency::Monthly)
            .by_day([(2, Weekday::Tuesday), (-1, Weekday::Friday)])
            .build()
            .unwrap();
        let anchor = date(2020, 1, 1).at(9, 0, 0, 0);
        let occ = occurrences(&rule, anchor, 2020, 1, false);
        assert_eq!(days(&occ), vec![14, 31]);
    }

    #[test]
    fn absent_nth_is_dropped() {
        // Thursdays in January 2020: 2, 9, 16, 23 and 30. February 2020
        // has only four, so its fifth Thursday contributes nothing.
        let rule = Rule::builder(Frequency::Monthly)
            .by_day([(5, Weekday::Thursday)])
            .build()
            .unwrap();
        let anchor = date(2020, 1, 1).at(9, 0, 0, 0);
        assert_eq!(days(&occurrences(&rule, anchor, 2020, 1, false)), [30]);
        assert!(occurrences(&rule, anchor, 2020, 2, false).is_empty());
    }

    #[test]
    fn negative_month_days() {
        let rule = Rule::builder(Frequency::Monthly)
            .by_month_day([-1, 1, 31])
            .build()
            .unwrap();
        let anchor = date(2020, 1, 1).at(9, 0, 0, 0);
        assert_eq!(
            days(&occurrences(&rule, anchor, 2020, 1, false)),
            vec![1, 31],
        );
        // In February the 31st does not exist and -1 maps to the 29th.
        assert_eq!(
            days(&occurrences(&rule, anchor, 2020, 2, false)),
            vec![1, 29],
        );
    }

    #[test]
    fn by_day_intersects_by_month_day() {
        // Fridays in March 2020: 6, 13, 20, 27. The 13th is the only one
        // that is also selected by BYMONTHDAY.
        let rule = Rule::builder(Frequency::Monthly)
            .by_day([Weekday::Friday])
            .by_month_day([13, 14])
            .build()
            .unwrap();
        let anchor = date(2020, 1, 1).at(9, 0, 0, 0);
        assert_eq!(
            days(&occurrences(&rule, anchor, 2020, 3, false)),
            vec![13],
        );
    }

    #[test]
    fn anchor_day_fallback() {
        let rule = Rule::builder(Frequency::Yearly)
            .by_month([2])
            .by_hour([9, 17])
            .build()
            .unwrap();
        let anchor = date(2019, 1, 31).at(9, 0, 0, 0);
        // Day 31 does not exist in February, so the fallback produces
        // nothing rather than rolling over.
        assert!(occurrences(&rule, anchor, 2019, 2, true).is_empty());
        let occ = occurrences(&rule, anchor, 2019, 3, true);
        assert_eq!(
            occ,
            vec![
                Candidate { day: 31, hour: 9, minute: 0, second: 0 },
                Candidate { day: 31, hour: 17, minute: 0, second: 0 },
            ],
        );
    }

    #[test]
    fn by_set_pos_selects_in_order() {
        // Weekdays of January 2020 with the last and the first selected.
        let rule = Rule::builder(Frequency::Monthly)
            .by_day([
                Weekday::Monday,
                Weekday::Tuesday,
                Weekday::Wednesday,
                Weekday::Thursday,
                Weekday::Friday,
            ])
            .by_set_pos([-1, 1])
            .build()
            .unwrap();
        let anchor = date(2020, 1, 1).at(9, 0, 0, 0);
        let occ = occurrences(&rule, anchor, 2020, 1, false);
        // Emitted ascending even though BYSETPOS listed -1 first.
        assert_eq!(days(&occ), vec![1, 31]);
    }

    #[test]
    fn by_set_pos_out_of_range_is_dropped() {
        let rule = Rule::builder(Frequency::Monthly)
            .by_month_day([1, 2, 3])
            .by_set_pos([2, 17])
            .build()
            .unwrap();
        let anchor = date(2020, 1, 1).at(9, 0, 0, 0);
        assert_eq!(
            days(&occurrences(&rule, anchor, 2020, 1, false)),
            vec![2],
        );
    }
}
