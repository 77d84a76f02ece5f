/*!
An RFC 5545 (iCalendar) recurrence rule expansion engine.

This crate parses [RRULE] recurrence rules and lazily produces the ordered,
potentially unbounded sequence of occurrence datetimes a rule generates from
a start instant. It is the engine behind questions like "every second
Tuesday of the month", "the last workday of each month" or "every year on
the 100th day".

The start instant is a [`jiff::Zoned`], and occurrences are produced in its
time zone with its wall-clock time-of-day unless BYHOUR/BYMINUTE/BYSECOND
override it. Daylight saving transitions are handled the way RFC 5545 asks:
wall-clock readings that do not exist locally are forwarded past the gap,
and the anchor's clock reading is re-applied afterwards so a single
transition does not shift the rest of the sequence.

# Example

```
use recur::Rule;

let start: jiff::Zoned = "2020-01-06T09:00:00[America/New_York]".parse()?;
let rule: Rule = "FREQ=WEEKLY;BYDAY=MO,WE,FR;COUNT=4".parse()?;
let occurrences: Vec<String> =
    rule.occurrences(&start).map(|zdt| zdt.to_string()).collect();
assert_eq!(
    occurrences,
    [
        "2020-01-06T09:00:00-05:00[America/New_York]",
        "2020-01-08T09:00:00-05:00[America/New_York]",
        "2020-01-10T09:00:00-05:00[America/New_York]",
        "2020-01-13T09:00:00-05:00[America/New_York]",
    ],
);
# Ok::<(), Box<dyn std::error::Error>>(())
```

For stepwise control, or to jump to a distant point in the sequence without
visiting everything before it, use the cursor interface:

```
use recur::Rule;

let start: jiff::Zoned = "2020-01-01T12:00:00[America/New_York]".parse()?;
let target: jiff::Zoned = "2023-05-01T00:00:00[America/New_York]".parse()?;
let rule: Rule = "FREQ=DAILY".parse()?;

let mut cursor = rule.iter(&start);
cursor.fast_forward(&target)?;
assert_eq!(
    cursor.current().unwrap().to_string(),
    "2023-05-01T12:00:00-04:00[America/New_York]",
);
# Ok::<(), Box<dyn std::error::Error>>(())
```

[RRULE]: https://datatracker.ietf.org/doc/html/rfc5545#section-3.3.10
*/

pub use crate::{
    error::{Error, Result},
    iter::{Counter, Occurrences, RecurrenceIter},
    rule::{ByWeekday, Frequency, Rule, RuleBuilder, Until},
};

/// The latest instant the engine will ever produce: the largest timestamp
/// `jiff` can represent (at the very end of the year 9999).
///
/// Occurrences beyond it are never generated; a cursor that would cross it
/// goes permanently invalid instead.
pub const HORIZON: jiff::Timestamp = jiff::Timestamp::MAX;

mod calendar;
mod driver;
mod error;
mod iter;
mod monthly;
mod parse;
mod rule;
mod weekdate;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horizon_is_the_last_representable_second() {
        assert_eq!(HORIZON.to_string(), "9999-12-31T23:59:59Z");
    }
}
