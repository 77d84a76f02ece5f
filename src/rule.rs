use std::{cmp::Ordering, sync::Arc};

use jiff::{Timestamp, Zoned, civil::DateTime, civil::Weekday};

use crate::{
    calendar::iso_weekday_number,
    error::{Error, Result, ensure_rule},
};

/// The fundamental cadence of a recurrence rule.
///
/// The secondly and minutely cadences are recognized by the parser so that
/// the error for them is about support rather than syntax, but the engine
/// ships no drivers for them and building such a rule fails.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Frequency {
    Secondly,
    Minutely,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match *self {
            Frequency::Secondly => "secondly",
            Frequency::Minutely => "minutely",
            Frequency::Hourly => "hourly",
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Yearly => "yearly",
        }
    }
}

impl std::str::FromStr for Frequency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Frequency> {
        let freq = match &*s.to_ascii_uppercase() {
            "SECONDLY" => Frequency::Secondly,
            "MINUTELY" => Frequency::Minutely,
            "HOURLY" => Frequency::Hourly,
            "DAILY" => Frequency::Daily,
            "WEEKLY" => Frequency::Weekly,
            "MONTHLY" => Frequency::Monthly,
            "YEARLY" => Frequency::Yearly,
            _ => {
                return Err(Error::InvalidRule(format!(
                    "unknown frequency `{s}`"
                )));
            }
        };
        Ok(freq)
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single BYDAY entry: either any occurrence of a weekday, or the nth
/// occurrence of a weekday within its month or year.
///
/// The numeric form is only meaningful for monthly and yearly expansion.
/// Other frequencies accept it but use the bare weekday.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ByWeekday {
    Any(Weekday),
    Numbered { nth: i8, weekday: Weekday },
}

impl ByWeekday {
    /// Returns the weekday of this entry, numbered or not.
    pub fn weekday(&self) -> Weekday {
        match *self {
            ByWeekday::Any(weekday) => weekday,
            ByWeekday::Numbered { weekday, .. } => weekday,
        }
    }

    /// Returns the numeric offset, if this is a numbered entry.
    pub fn nth(&self) -> Option<i8> {
        match *self {
            ByWeekday::Any(_) => None,
            ByWeekday::Numbered { nth, .. } => Some(nth),
        }
    }
}

impl From<Weekday> for ByWeekday {
    fn from(weekday: Weekday) -> ByWeekday {
        ByWeekday::Any(weekday)
    }
}

impl From<(i8, Weekday)> for ByWeekday {
    fn from((nth, weekday): (i8, Weekday)) -> ByWeekday {
        ByWeekday::Numbered { nth, weekday }
    }
}

impl Ord for ByWeekday {
    fn cmp(&self, rhs: &ByWeekday) -> Ordering {
        match (*self, *rhs) {
            (ByWeekday::Any(lhs), ByWeekday::Any(rhs)) => {
                iso_weekday_number(lhs).cmp(&iso_weekday_number(rhs))
            }
            (
                ByWeekday::Numbered { nth: lhs_nth, weekday: lhs_weekday },
                ByWeekday::Numbered { nth: rhs_nth, weekday: rhs_weekday },
            ) => {
                let lhs = (lhs_nth, iso_weekday_number(lhs_weekday));
                let rhs = (rhs_nth, iso_weekday_number(rhs_weekday));
                lhs.cmp(&rhs)
            }
            (ByWeekday::Any(_), ByWeekday::Numbered { .. }) => Ordering::Less,
            (ByWeekday::Numbered { .. }, ByWeekday::Any(_)) => {
                Ordering::Greater
            }
        }
    }
}

impl PartialOrd for ByWeekday {
    fn partial_cmp(&self, rhs: &ByWeekday) -> Option<Ordering> {
        Some(self.cmp(rhs))
    }
}

impl std::fmt::Display for ByWeekday {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        fn code(wd: Weekday) -> &'static str {
            match wd {
                Weekday::Sunday => "SU",
                Weekday::Monday => "MO",
                Weekday::Tuesday => "TU",
                Weekday::Wednesday => "WE",
                Weekday::Thursday => "TH",
                Weekday::Friday => "FR",
                Weekday::Saturday => "SA",
            }
        }

        match *self {
            ByWeekday::Any(weekday) => write!(f, "{}", code(weekday)),
            ByWeekday::Numbered { nth, weekday } => {
                write!(f, "{nth}{}", code(weekday))
            }
        }
    }
}

/// The UNTIL bound of a rule.
///
/// A rule is parsed without knowledge of the start instant, so an UNTIL
/// value stays in the form it was given in until a cursor binds the rule to
/// a start: a UTC instant (the `...Z` form), a floating civil datetime
/// (resolved in the start's time zone), or an already zoned datetime when
/// the rule was built programmatically.
#[derive(Clone, Debug)]
pub enum Until {
    Instant(Timestamp),
    Floating(DateTime),
    Zoned(Zoned),
}

/// A parsed and validated recurrence rule.
///
/// A `Rule` is immutable and cheap to clone; clones share the underlying
/// data. The rule deliberately does not carry its start instant: the same
/// rule can anchor any number of cursors at different starting points.
#[derive(Clone, Debug)]
pub struct Rule {
    inner: Arc<RuleInner>,
}

#[derive(Debug)]
pub(crate) struct RuleInner {
    pub(crate) freq: Frequency,
    pub(crate) interval: i32,
    pub(crate) count: Option<u64>,
    pub(crate) until: Option<Until>,
    pub(crate) by_month: Box<[i8]>,
    // can be negative
    pub(crate) by_week_no: Box<[i8]>,
    // can be negative
    pub(crate) by_year_day: Box<[i16]>,
    // can be negative
    pub(crate) by_month_day: Box<[i8]>,
    pub(crate) by_day: Box<[ByWeekday]>,
    pub(crate) by_hour: Box<[i8]>,
    pub(crate) by_minute: Box<[i8]>,
    pub(crate) by_second: Box<[i8]>,
    // can be negative
    pub(crate) by_set_pos: Box<[i32]>,
    pub(crate) week_start: Weekday,
}

impl Rule {
    /// Returns a builder for constructing a rule programmatically.
    ///
    /// The frequency is the only required rule part.
    pub fn builder(freq: Frequency) -> RuleBuilder {
        RuleBuilder::new(freq)
    }

    pub fn frequency(&self) -> Frequency {
        self.inner.freq
    }

    pub fn interval(&self) -> i32 {
        self.inner.interval
    }

    pub fn count(&self) -> Option<u64> {
        self.inner.count
    }

    pub fn until(&self) -> Option<&Until> {
        self.inner.until.as_ref()
    }

    pub fn week_start(&self) -> Weekday {
        self.inner.week_start
    }

    pub fn by_month(&self) -> &[i8] {
        &self.inner.by_month
    }

    pub fn by_week_no(&self) -> &[i8] {
        &self.inner.by_week_no
    }

    pub fn by_year_day(&self) -> &[i16] {
        &self.inner.by_year_day
    }

    pub fn by_month_day(&self) -> &[i8] {
        &self.inner.by_month_day
    }

    pub fn by_day(&self) -> &[ByWeekday] {
        &self.inner.by_day
    }

    pub fn by_hour(&self) -> &[i8] {
        &self.inner.by_hour
    }

    pub fn by_minute(&self) -> &[i8] {
        &self.inner.by_minute
    }

    pub fn by_second(&self) -> &[i8] {
        &self.inner.by_second
    }

    pub fn by_set_pos(&self) -> &[i32] {
        &self.inner.by_set_pos
    }

    /// True if and only if the given weekday is matched by at least one
    /// BYDAY entry, ignoring numeric offsets.
    pub(crate) fn by_day_matches(&self, wd: Weekday) -> bool {
        self.inner.by_day.iter().any(|bywd| bywd.weekday() == wd)
    }
}

/// A builder for constructing a valid recurrence rule.
///
/// All validation happens in [`RuleBuilder::build`]: the setters accept
/// anything and the build step reports the first problem found.
#[derive(Clone, Debug)]
pub struct RuleBuilder {
    freq: Frequency,
    interval: i32,
    count: Option<u64>,
    until: Option<Until>,
    by_month: Vec<i8>,
    by_week_no: Vec<i8>,
    by_year_day: Vec<i16>,
    by_month_day: Vec<i8>,
    by_day: Vec<ByWeekday>,
    by_hour: Vec<i8>,
    by_minute: Vec<i8>,
    by_second: Vec<i8>,
    by_set_pos: Vec<i32>,
    week_start: Weekday,
}

impl RuleBuilder {
    fn new(freq: Frequency) -> RuleBuilder {
        RuleBuilder {
            freq,
            interval: 1,
            count: None,
            until: None,
            by_month: vec![],
            by_week_no: vec![],
            by_year_day: vec![],
            by_month_day: vec![],
            by_day: vec![],
            by_hour: vec![],
            by_minute: vec![],
            by_second: vec![],
            by_set_pos: vec![],
            week_start: Weekday::Monday,
        }
    }

    pub fn interval(&mut self, interval: i32) -> &mut RuleBuilder {
        self.interval = interval;
        self
    }

    pub fn count(&mut self, count: u64) -> &mut RuleBuilder {
        self.count = Some(count);
        self
    }

    pub fn until(&mut self, until: Zoned) -> &mut RuleBuilder {
        self.until = Some(Until::Zoned(until));
        self
    }

    pub(crate) fn until_part(&mut self, until: Until) -> &mut RuleBuilder {
        self.until = Some(until);
        self
    }

    pub fn by_month(
        &mut self,
        months: impl IntoIterator<Item = i8>,
    ) -> &mut RuleBuilder {
        self.by_month.extend(months);
        self
    }

    pub fn by_week_no(
        &mut self,
        weeks: impl IntoIterator<Item = i8>,
    ) -> &mut RuleBuilder {
        self.by_week_no.extend(weeks);
        self
    }

    pub fn by_year_day(
        &mut self,
        days: impl IntoIterator<Item = i16>,
    ) -> &mut RuleBuilder {
        self.by_year_day.extend(days);
        self
    }

    pub fn by_month_day(
        &mut self,
        days: impl IntoIterator<Item = i8>,
    ) -> &mut RuleBuilder {
        self.by_month_day.extend(days);
        self
    }

    pub fn by_day<W: Into<ByWeekday>>(
        &mut self,
        week_days: impl IntoIterator<Item = W>,
    ) -> &mut RuleBuilder {
        self.by_day.extend(week_days.into_iter().map(Into::into));
        self
    }

    pub fn by_hour(
        &mut self,
        hours: impl IntoIterator<Item = i8>,
    ) -> &mut RuleBuilder {
        self.by_hour.extend(hours);
        self
    }

    pub fn by_minute(
        &mut self,
        minutes: impl IntoIterator<Item = i8>,
    ) -> &mut RuleBuilder {
        self.by_minute.extend(minutes);
        self
    }

    pub fn by_second(
        &mut self,
        seconds: impl IntoIterator<Item = i8>,
    ) -> &mut RuleBuilder {
        self.by_second.extend(seconds);
        self
    }

    pub fn by_set_pos(
        &mut self,
        positions: impl IntoIterator<Item = i32>,
    ) -> &mut RuleBuilder {
        self.by_set_pos.extend(positions);
        self
    }

    pub fn week_start(&mut self, weekday: Weekday) -> &mut RuleBuilder {
        self.week_start = weekday;
        self
    }

    pub fn build(&self) -> Result<Rule> {
        fn sort_and_dedup<T: Clone + Ord>(slice: &[T]) -> Box<[T]> {
            let mut vec = slice.to_vec();
            vec.sort();
            vec.dedup();
            vec.into_boxed_slice()
        }

        ensure_rule!(
            !matches!(
                self.freq,
                Frequency::Secondly | Frequency::Minutely
            ),
            "the {} frequency is not supported \
             (supported frequencies are hourly through yearly)",
            self.freq,
        );
        ensure_rule!(
            self.interval >= 1,
            "interval value of `{}` is invalid \
             (interval must be greater than or equal to 1)",
            self.interval,
        );
        if let Some(count) = self.count {
            ensure_rule!(
                count >= 1,
                "count value of `{count}` is invalid \
                 (count must be greater than or equal to 1)",
            );
            ensure_rule!(
                self.until.is_none(),
                "count and until may not both be set on one rule",
            );
        }
        for &v in self.by_month.iter() {
            ensure_rule!(
                1 <= v && v <= 12,
                "invalid 'by month' value `{v}` \
                 (values must be in range 1..=12)",
            );
        }
        for &v in self.by_week_no.iter() {
            ensure_rule!(
                (-53 <= v && v <= -1) || (1 <= v && v <= 53),
                "invalid 'by week' value `{v}` \
                 (values must be in range 1..=53 or -53..=-1)",
            );
        }
        for &v in self.by_year_day.iter() {
            ensure_rule!(
                (-366 <= v && v <= -1) || (1 <= v && v <= 366),
                "invalid 'by day of the year' value `{v}` \
                 (values must be in range 1..=366 or -366..=-1)",
            );
        }
        for &v in self.by_month_day.iter() {
            ensure_rule!(
                (-31 <= v && v <= -1) || (1 <= v && v <= 31),
                "invalid 'by day of the month' value `{v}` \
                 (values must be in range 1..=31 or -31..=-1)",
            );
        }
        for &v in self.by_day.iter() {
            let ByWeekday::Numbered { nth, .. } = v else { continue };
            ensure_rule!(
                (-5 <= nth && nth <= -1) || (1 <= nth && nth <= 5),
                "invalid numbered 'by week day' value `{v}` \
                 (values must be in range 1..=5 or -5..=-1)",
            );
        }
        for &v in self.by_hour.iter() {
            ensure_rule!(
                0 <= v && v <= 23,
                "invalid 'by hour' value `{v}` \
                 (values must be in range 0..=23)",
            );
        }
        for &v in self.by_minute.iter() {
            ensure_rule!(
                0 <= v && v <= 59,
                "invalid 'by minute' value `{v}` \
                 (values must be in range 0..=59)",
            );
        }
        for &v in self.by_second.iter() {
            // RFC 5545 technically allows `60` for leap seconds, but a leap
            // second has no stable civil representation here, so it is
            // rejected like any other out-of-range value.
            ensure_rule!(
                0 <= v && v <= 59,
                "invalid 'by second' value `{v}` \
                 (values must be in range 0..=59)",
            );
        }
        for &v in self.by_set_pos.iter() {
            ensure_rule!(
                (-366 <= v && v <= -1) || (1 <= v && v <= 366),
                "invalid 'by set position' value `{v}` \
                 (values must be in range 1..=366 or -366..=-1)",
            );
        }

        // Some additional frequency-specific errors.
        if !self.by_week_no.is_empty() {
            ensure_rule!(
                matches!(self.freq, Frequency::Yearly),
                "'by week' cannot be used with any frequency except yearly",
            );
        }
        if !self.by_year_day.is_empty() {
            ensure_rule!(
                !matches!(
                    self.freq,
                    Frequency::Monthly | Frequency::Weekly | Frequency::Daily
                ),
                "'by day of the year' cannot be used \
                 with monthly, weekly or daily frequency",
            );
        }
        if !self.by_month_day.is_empty() {
            ensure_rule!(
                !matches!(self.freq, Frequency::Weekly),
                "'by day of the month' cannot be used with weekly frequency",
            );
        }

        // BYSETPOS selects from the candidates the other BY rules generate,
        // so it is meaningless (and would select from nothing) on its own.
        if !self.by_set_pos.is_empty() {
            ensure_rule!(
                !self.by_month.is_empty()
                    || !self.by_week_no.is_empty()
                    || !self.by_year_day.is_empty()
                    || !self.by_month_day.is_empty()
                    || !self.by_day.is_empty()
                    || !self.by_hour.is_empty()
                    || !self.by_minute.is_empty()
                    || !self.by_second.is_empty(),
                "when 'by set position' is used, at least one other \
                 'by' rule must be specified, but all are empty",
            );
        }

        let inner = Arc::new(RuleInner {
            freq: self.freq,
            interval: self.interval,
            count: self.count,
            until: self.until.clone(),
            by_month: sort_and_dedup(&self.by_month),
            by_week_no: sort_and_dedup(&self.by_week_no),
            by_year_day: sort_and_dedup(&self.by_year_day),
            by_month_day: sort_and_dedup(&self.by_month_day),
            by_day: sort_and_dedup(&self.by_day),
            by_hour: sort_and_dedup(&self.by_hour),
            by_minute: sort_and_dedup(&self.by_minute),
            by_second: sort_and_dedup(&self.by_second),
            by_set_pos: sort_and_dedup(&self.by_set_pos),
            week_start: self.week_start,
        });
        Ok(Rule { inner })
    }
}
