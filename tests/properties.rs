use jiff::{ToSpan, Zoned};

use recur::Rule;

fn zoned(s: &str) -> Zoned {
    s.parse().unwrap()
}

fn rule(s: &str) -> Rule {
    s.parse().unwrap()
}

fn seq(rule_str: &str, start: &str, n: usize) -> Vec<Zoned> {
    rule(rule_str).occurrences(&zoned(start)).take(n).collect()
}

const START: &str = "2020-01-06T09:30:00[America/New_York]";

/// A mix of rules whose starts all satisfy their own BY parts.
/// 2020-01-06 is a Monday.
const CORPUS: &[&str] = &[
    "FREQ=HOURLY;INTERVAL=7",
    "FREQ=DAILY",
    "FREQ=DAILY;INTERVAL=3;BYDAY=MO,TU,WE,TH,FR",
    "FREQ=WEEKLY;INTERVAL=2;BYDAY=MO,FR",
    "FREQ=MONTHLY;BYDAY=1MO,-1FR",
    "FREQ=MONTHLY;BYMONTHDAY=6,20",
    "FREQ=MONTHLY;BYDAY=MO,TU,WE,TH,FR;BYSETPOS=1,-1",
    "FREQ=YEARLY;BYMONTH=1,6;BYMONTHDAY=6",
    "FREQ=YEARLY;BYWEEKNO=2;BYDAY=MO",
    "FREQ=YEARLY;BYYEARDAY=6,200",
];

#[test]
fn sequences_are_strictly_increasing() {
    for rule_str in CORPUS {
        let occurrences = seq(rule_str, START, 50);
        assert_eq!(occurrences.len(), 50, "for {rule_str}");
        for pair in occurrences.windows(2) {
            assert!(
                pair[1] > pair[0],
                "for {rule_str}: {} does not follow {}",
                pair[1],
                pair[0],
            );
        }
    }
}

#[test]
fn the_start_is_the_first_occurrence() {
    let start = zoned(START);
    for rule_str in CORPUS {
        let occurrences = seq(rule_str, START, 1);
        assert_eq!(occurrences[0], start, "for {rule_str}");
    }
    // Even when the start does not itself match the rule.
    let occurrences = seq("FREQ=MONTHLY;BYMONTHDAY=20", START, 2);
    assert_eq!(occurrences[0], start);
    assert_eq!(
        occurrences[1].to_string(),
        "2020-01-20T09:30:00-05:00[America/New_York]",
    );
}

#[test]
fn count_is_exact() {
    for n in [1, 2, 7, 30] {
        let occurrences =
            seq(&format!("FREQ=DAILY;COUNT={n}"), START, 1000);
        assert_eq!(occurrences.len(), n);
    }
}

#[test]
fn until_is_respected() {
    // 14:30Z is 09:30 in New York.
    let occurrences =
        seq("FREQ=WEEKLY;UNTIL=20200302T000000Z", START, 1000);
    let until = zoned("2020-03-01T19:00:00[America/New_York]");
    let last = occurrences.last().unwrap();
    assert!(*last < until);
    // The next weekly slot after the last occurrence is past the bound.
    assert!(last.checked_add(1.week()).unwrap() > until);
}

#[test]
fn by_filters_hold_field_by_field() {
    use jiff::civil::Weekday;

    for zdt in &seq("FREQ=WEEKLY;INTERVAL=2;BYDAY=MO,FR", START, 50) {
        assert!(matches!(
            zdt.weekday(),
            Weekday::Monday | Weekday::Friday
        ));
    }
    for zdt in &seq("FREQ=YEARLY;BYMONTH=1,6;BYMONTHDAY=6", START, 50) {
        assert!([1, 6].contains(&zdt.month()));
        assert_eq!(zdt.day(), 6);
    }
    for zdt in &seq("FREQ=MONTHLY;BYMONTHDAY=6,20", START, 50) {
        assert!([6, 20].contains(&zdt.day()));
    }
    // The start itself is exempt: it anchors the sequence whether or not
    // it matches.
    let daily_hours = seq("FREQ=DAILY;BYHOUR=6,18", START, 50);
    for zdt in &daily_hours[1..] {
        assert!([6, 18].contains(&zdt.hour()));
        assert_eq!(zdt.minute(), 30);
    }
}

#[test]
fn plain_daily_cadence_is_exact() {
    let occurrences = seq("FREQ=DAILY;INTERVAL=4", START, 50);
    for pair in occurrences.windows(2) {
        let days = pair[0]
            .datetime()
            .date()
            .until(pair[1].datetime().date())
            .unwrap()
            .get_days();
        assert_eq!(days, 4);
    }
}

#[test]
fn leap_day_starts_stay_on_leap_days() {
    let occurrences = seq(
        "FREQ=YEARLY",
        "2020-02-29T12:00:00[America/New_York]",
        10,
    );
    assert_eq!(occurrences.len(), 10);
    for zdt in &occurrences {
        assert_eq!((zdt.month(), zdt.day()), (2, 29), "got {zdt}");
    }
}

#[test]
fn by_set_pos_output_is_a_subsequence() {
    let unfiltered: Vec<Zoned> =
        seq("FREQ=MONTHLY;BYDAY=MO,TU,WE,TH,FR", START, 400);
    let filtered =
        seq("FREQ=MONTHLY;BYDAY=MO,TU,WE,TH,FR;BYSETPOS=1,-1", START, 20);
    for zdt in &filtered {
        assert!(
            unfiltered.contains(zdt),
            "{zdt} not produced by the unfiltered rule",
        );
    }
}

#[test]
fn fast_forward_agrees_with_naive_stepping() {
    let start = zoned(START);
    let target = zoned("2023-03-20T00:00:00[America/New_York]");
    for rule_str in CORPUS {
        let r = rule(rule_str);
        let naive = r
            .occurrences(&start)
            .find(|zdt| *zdt >= target)
            .unwrap();
        let mut cursor = r.iter(&start);
        cursor.fast_forward(&target).unwrap();
        assert_eq!(
            cursor.current().as_ref(),
            Some(&naive),
            "for {rule_str}",
        );
    }
}

#[test]
fn fast_forward_before_agrees_with_naive_stepping() {
    let start = zoned(START);
    let target = zoned("2023-03-20T00:00:00[America/New_York]");
    for rule_str in CORPUS {
        let r = rule(rule_str);
        let naive = r
            .occurrences(&start)
            .take_while(|zdt| *zdt < target)
            .last()
            .unwrap();
        let mut cursor = r.iter(&start);
        cursor.fast_forward_before(&target).unwrap();
        assert_eq!(
            cursor.current().as_ref(),
            Some(&naive),
            "for {rule_str}",
        );
    }
}
