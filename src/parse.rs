use std::collections::HashMap;

use jiff::{
    civil::{Time, Weekday},
    fmt::strtime,
    tz::TimeZone,
};

use crate::{
    error::{Error, Result},
    rule::{ByWeekday, Frequency, Rule, RuleBuilder, Until},
};

impl std::str::FromStr for Rule {
    type Err = Error;

    /// Parses a rule from its `KEY=VALUE;KEY=VALUE` form.
    ///
    /// Keys are case-insensitive and values may be comma-separated lists.
    /// Empty segments (such as a trailing semicolon) are ignored.
    fn from_str(s: &str) -> Result<Rule> {
        Rule::from_parts(s.split(';').filter(|p| !p.is_empty()).map(|p| {
            match p.split_once('=') {
                Some((key, value)) => (key, value),
                // Surfaced as an unknown key below.
                None => (p, ""),
            }
        }))
    }
}

impl Rule {
    /// Parses a rule from its `KEY=VALUE;KEY=VALUE` form.
    ///
    /// This is `Rule::from_str` under a more discoverable name.
    pub fn parse(s: &str) -> Result<Rule> {
        s.parse()
    }

    /// Builds a rule from pre-tokenized `(key, value)` pairs.
    ///
    /// Keys are case-insensitive. A value may be a comma-separated list for
    /// the parts that accept lists. When a key appears more than once, the
    /// last value wins. Keys outside the recognized set fail with
    /// [`Error::UnknownPart`].
    pub fn from_parts<K, V, I>(parts: I) -> Result<Rule>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        type Assemble = Box<dyn Fn(&mut RuleBuilder)>;

        let mut freq: Option<Frequency> = None;
        let mut assemble: HashMap<String, Assemble> = HashMap::new();
        for (key, value) in parts {
            let (key, value) = (key.as_ref(), value.as_ref());
            let upper_key = key.to_ascii_uppercase();
            log::trace!("recurrence rule part {upper_key}={value}");
            let setter: Assemble = match &*upper_key {
                "FREQ" => {
                    freq = Some(value.parse()?);
                    continue;
                }
                "INTERVAL" => {
                    let v: i32 = parse_int("INTERVAL", value)?;
                    Box::new(move |b| {
                        b.interval(v);
                    })
                }
                "COUNT" => {
                    let v: u64 = parse_int("COUNT", value)?;
                    Box::new(move |b| {
                        b.count(v);
                    })
                }
                "UNTIL" => {
                    let until = parse_until(value)?;
                    Box::new(move |b| {
                        b.until_part(until.clone());
                    })
                }
                "BYSECOND" => {
                    let vs: Vec<i8> = parse_int_list("BYSECOND", value)?;
                    Box::new(move |b| {
                        b.by_second(vs.iter().copied());
                    })
                }
                "BYMINUTE" => {
                    let vs: Vec<i8> = parse_int_list("BYMINUTE", value)?;
                    Box::new(move |b| {
                        b.by_minute(vs.iter().copied());
                    })
                }
                "BYHOUR" => {
                    let vs: Vec<i8> = parse_int_list("BYHOUR", value)?;
                    Box::new(move |b| {
                        b.by_hour(vs.iter().copied());
                    })
                }
                "BYDAY" => {
                    let vs = value
                        .split(',')
                        .map(|tok| tok.trim().parse::<ByWeekday>())
                        .collect::<Result<Vec<ByWeekday>>>()?;
                    Box::new(move |b| {
                        b.by_day(vs.iter().copied());
                    })
                }
                "BYMONTHDAY" => {
                    let vs: Vec<i8> = parse_int_list("BYMONTHDAY", value)?;
                    Box::new(move |b| {
                        b.by_month_day(vs.iter().copied());
                    })
                }
                "BYYEARDAY" => {
                    let vs: Vec<i16> = parse_int_list("BYYEARDAY", value)?;
                    Box::new(move |b| {
                        b.by_year_day(vs.iter().copied());
                    })
                }
                "BYWEEKNO" => {
                    let vs: Vec<i8> = parse_int_list("BYWEEKNO", value)?;
                    Box::new(move |b| {
                        b.by_week_no(vs.iter().copied());
                    })
                }
                "BYMONTH" => {
                    let vs: Vec<i8> = parse_int_list("BYMONTH", value)?;
                    Box::new(move |b| {
                        b.by_month(vs.iter().copied());
                    })
                }
                "BYSETPOS" => {
                    let vs: Vec<i32> = parse_int_list("BYSETPOS", value)?;
                    Box::new(move |b| {
                        b.by_set_pos(vs.iter().copied());
                    })
                }
                "WKST" => {
                    let wd = parse_weekday_code(value).ok_or_else(|| {
                        Error::InvalidRule(format!(
                            "invalid WKST value `{value}` \
                             (expected one of SU, MO, TU, WE, TH, FR, SA)"
                        ))
                    })?;
                    Box::new(move |b| {
                        b.week_start(wd);
                    })
                }
                _ => return Err(Error::UnknownPart(key.to_string())),
            };
            assemble.insert(upper_key, setter);
        }

        let Some(freq) = freq else {
            return Err(Error::InvalidRule(
                "rule is missing its FREQ part".to_string(),
            ));
        };
        let mut builder = Rule::builder(freq);
        for setter in assemble.values() {
            setter(&mut builder);
        }
        builder.build()
    }
}

impl std::str::FromStr for ByWeekday {
    type Err = Error;

    /// Parses a BYDAY entry of the shape
    /// `[+-]? [1-5]? (SU|MO|TU|WE|TH|FR|SA)`, case-insensitively.
    fn from_str(s: &str) -> Result<ByWeekday> {
        let err = || {
            Error::InvalidRule(format!(
                "invalid 'by week day' entry `{s}` (entries must be an \
                 optionally signed and numbered two-letter weekday)"
            ))
        };
        let upper = s.to_ascii_uppercase();
        let (sign, rest) = match upper.as_bytes().first() {
            Some(b'+') => (1i8, &upper[1..]),
            Some(b'-') => (-1i8, &upper[1..]),
            _ => (1i8, &*upper),
        };
        match rest.as_bytes() {
            [digit @ b'1'..=b'9', _, _] => {
                let nth = sign * i8::try_from(digit - b'0').unwrap();
                let weekday =
                    parse_weekday_code(&rest[1..]).ok_or_else(err)?;
                Ok(ByWeekday::Numbered { nth, weekday })
            }
            [_, _] => {
                // A bare sign is tolerated: it carries no offset.
                let weekday = parse_weekday_code(rest).ok_or_else(err)?;
                Ok(ByWeekday::Any(weekday))
            }
            _ => Err(err()),
        }
    }
}

fn parse_weekday_code(s: &str) -> Option<Weekday> {
    let wd = match &*s.to_ascii_uppercase() {
        "SU" => Weekday::Sunday,
        "MO" => Weekday::Monday,
        "TU" => Weekday::Tuesday,
        "WE" => Weekday::Wednesday,
        "TH" => Weekday::Thursday,
        "FR" => Weekday::Friday,
        "SA" => Weekday::Saturday,
        _ => return None,
    };
    Some(wd)
}

fn parse_int<T: std::str::FromStr>(part: &str, value: &str) -> Result<T> {
    value.trim().parse::<T>().map_err(|_| {
        Error::InvalidRule(format!(
            "invalid {part} value `{value}` (expected an integer)"
        ))
    })
}

fn parse_int_list<T: std::str::FromStr>(
    part: &str,
    value: &str,
) -> Result<Vec<T>> {
    value.split(',').map(|v| parse_int(part, v)).collect()
}

/// Parses an UNTIL value.
///
/// RFC 5545 permits a date (`19971224`), a floating date-time
/// (`19971224T000000`) and a UTC date-time (`19971224T000000Z`). A floating
/// value is resolved in the start instant's time zone once a cursor binds
/// the rule to a start.
fn parse_until(value: &str) -> Result<Until> {
    let err = || {
        Error::InvalidRule(format!(
            "invalid UNTIL value `{value}` (expected a date or date-time)"
        ))
    };
    let upper = value.trim().to_ascii_uppercase();
    let (text, utc) = match upper.strip_suffix('Z') {
        Some(rest) => (rest, true),
        None => (&*upper, false),
    };
    let dt = if text.len() == 8 {
        strtime::parse("%Y%m%d", text)
            .and_then(|b| b.to_date())
            .map(|d| d.to_datetime(Time::midnight()))
    } else {
        strtime::parse("%Y%m%dT%H%M%S", text).and_then(|b| b.to_datetime())
    }
    .map_err(|_| err())?;
    if utc {
        let ts = dt.to_zoned(TimeZone::UTC).map_err(|_| err())?.timestamp();
        Ok(Until::Instant(ts))
    } else {
        Ok(Until::Floating(dt))
    }
}
