use jiff::{
    ToSpan, Zoned,
    civil::{Date, DateTime, Time, Weekday},
};

use crate::{
    HORIZON,
    calendar::{self, WallUnit},
    error::{Error, Result},
    iter::{Cursor, RecurrenceIter},
    monthly::{self, Candidate},
    rule::Frequency,
    weekdate::{self, WeekDate},
};

impl RecurrenceIter {
    /// Advances the cursor by `amount` intervals of the rule's frequency.
    ///
    /// Postcondition for every driver: an active cursor points at the next
    /// legitimate occurrence strictly after its previous position. An
    /// exhausted cursor stays exhausted.
    pub(crate) fn step(&mut self, amount: i64) -> Result<()> {
        match self.rule.frequency() {
            Frequency::Hourly => self.next_hourly(amount),
            Frequency::Daily => self.next_daily(amount),
            Frequency::Weekly => self.next_weekly(amount),
            Frequency::Monthly => self.next_monthly(amount),
            Frequency::Yearly => self.next_yearly(amount),
            // Rejected at rule construction.
            Frequency::Secondly | Frequency::Minutely => unreachable!(),
        }
    }

    fn cursor_zoned(&self) -> Option<Zoned> {
        self.cursor.active().cloned()
    }

    fn anchor(&self) -> DateTime {
        self.start.datetime()
    }

    fn anchor_time(&self) -> Time {
        self.start.datetime().time()
    }

    fn exhaust(&mut self) {
        self.cursor = Cursor::Exhausted;
    }

    /// A yearly scan ran past the last representable year without finding
    /// an occurrence. The cursor always goes invalid; whether that is also
    /// an error is a cursor configuration.
    fn yearly_overrun(&mut self) -> Result<()> {
        self.exhaust();
        if self.yearly_skip_upper_limit {
            Ok(())
        } else {
            Err(Error::HorizonExceeded)
        }
    }

    fn set_cursor_candidate(&mut self, year: i16, month: i8, c: Candidate) {
        let Ok(date) = Date::new(year, month, c.day) else {
            self.exhaust();
            return;
        };
        let time = jiff::civil::time(
            c.hour,
            c.minute,
            c.second,
            self.anchor_time().subsec_nanosecond(),
        );
        match calendar::resolve(self.start.time_zone(), date.to_datetime(time))
        {
            Some(zdt) => self.cursor = Cursor::Active(zdt),
            None => self.exhaust(),
        }
    }

    /// Hourly cadence is physical: adding hours to an instant. A DST
    /// spring-forward displaces the landing wall hour; for intervals
    /// greater than one the displacement is remembered in `hour_jump` and
    /// undone on the next advance so the cadence re-aligns, while an
    /// interval of one simply skips the missing wall hour.
    fn next_hourly(&mut self, amount: i64) -> Result<()> {
        let Some(mut cur) = self.cursor_zoned() else { return Ok(()) };
        if self.hour_jump != 0 {
            let jump = i64::from(self.hour_jump);
            self.hour_jump = 0;
            let Ok(zdt) = cur.checked_sub(jump.hours()) else {
                self.exhaust();
                return Ok(());
            };
            cur = zdt;
        }
        let Some(hours) =
            i64::from(self.rule.interval()).checked_mul(amount)
        else {
            self.exhaust();
            return Ok(());
        };
        let expected = (i64::from(cur.hour()) + hours).rem_euclid(24);
        let Ok(next) = cur.checked_add(hours.hours()) else {
            self.exhaust();
            return Ok(());
        };
        if self.rule.interval() > 1 {
            // A gap pushes the occurrence later than the modular arithmetic
            // predicts. A fold pulls it earlier; the repeated hour needs no
            // compensation.
            let diff = (i64::from(next.hour()) - expected).rem_euclid(24);
            self.hour_jump = if diff <= 12 { diff as i32 } else { 0 };
        }
        self.cursor = Cursor::Active(next);
        Ok(())
    }

    fn next_daily(&mut self, amount: i64) -> Result<()> {
        let Some(cur) = self.cursor_zoned() else { return Ok(()) };
        let interval = i64::from(self.rule.interval());
        if self.rule.by_hour().is_empty()
            && self.rule.by_day().is_empty()
            && self.rule.by_month().is_empty()
        {
            let Some(days) = interval.checked_mul(amount) else {
                self.exhaust();
                return Ok(());
            };
            match calendar::add_wall(
                &cur,
                days,
                WallUnit::Days,
                self.anchor_time(),
            ) {
                Some(zdt) => self.cursor = Cursor::Active(zdt),
                None => self.exhaust(),
            }
            return Ok(());
        }

        // Stepping scan. A combined amount is approximated with one
        // up-front jump; only single steps need to be exact.
        let mut cur = if amount > 1 {
            match calendar::add_wall(
                &cur,
                (amount - 1) * interval,
                WallUnit::Days,
                self.anchor_time(),
            ) {
                Some(zdt) => zdt,
                None => {
                    self.exhaust();
                    return Ok(());
                }
            }
        } else {
            cur
        };
        let stepping_hours = !self.rule.by_hour().is_empty();
        loop {
            let next = if stepping_hours {
                // When the hour is about to roll over, move to the next
                // interval-day first so the day cadence holds.
                let base = if cur.hour() == 23 {
                    match calendar::add_days_keep_time(&cur, interval - 1) {
                        Some(zdt) => zdt,
                        None => {
                            self.exhaust();
                            return Ok(());
                        }
                    }
                } else {
                    cur
                };
                base.checked_add(1.hour()).ok()
            } else {
                calendar::add_wall(
                    &cur,
                    interval,
                    WallUnit::Days,
                    self.anchor_time(),
                )
            };
            let Some(next) = next else {
                self.exhaust();
                return Ok(());
            };
            cur = next;
            if cur.timestamp() > HORIZON {
                self.exhaust();
                return Ok(());
            }
            let day_ok = self.rule.by_day().is_empty()
                || self.rule.by_day_matches(cur.weekday());
            let hour_ok =
                !stepping_hours || self.rule.by_hour().contains(&cur.hour());
            let month_ok = self.rule.by_month().is_empty()
                || self.rule.by_month().contains(&cur.month());
            if day_ok && hour_ok && month_ok {
                break;
            }
        }
        self.cursor = Cursor::Active(cur);
        Ok(())
    }

    fn next_weekly(&mut self, amount: i64) -> Result<()> {
        let Some(cur) = self.cursor_zoned() else { return Ok(()) };
        let interval = i64::from(self.rule.interval());
        if self.rule.by_hour().is_empty() && self.rule.by_day().is_empty() {
            let Some(weeks) = interval.checked_mul(amount) else {
                self.exhaust();
                return Ok(());
            };
            match calendar::add_wall(
                &cur,
                weeks,
                WallUnit::Weeks,
                self.anchor_time(),
            ) {
                Some(zdt) => self.cursor = Cursor::Active(zdt),
                None => self.exhaust(),
            }
            return Ok(());
        }

        let mut cur = if amount > 1 {
            match calendar::add_days_keep_time(
                &cur,
                (amount - 1) * interval * 7,
            ) {
                Some(zdt) => zdt,
                None => {
                    self.exhaust();
                    return Ok(());
                }
            }
        } else {
            cur
        };
        let first_day = self.rule.week_start();
        let stepping_hours = !self.rule.by_hour().is_empty();
        loop {
            let next = if stepping_hours {
                cur.checked_add(1.hour()).ok()
            } else {
                calendar::add_wall(
                    &cur,
                    1,
                    WallUnit::Days,
                    self.anchor_time(),
                )
            };
            let Some(next) = next else {
                self.exhaust();
                return Ok(());
            };
            cur = next;
            if cur.timestamp() > HORIZON {
                self.exhaust();
                return Ok(());
            }
            let weekday = cur.weekday();
            let hour = cur.hour();
            if weekday == first_day && (!stepping_hours || hour == 0) {
                // Rolled into a new week: skip ahead to the next interval
                // week and, should the arithmetic have drifted off the week
                // start, normalize back to the first day of that week.
                let jumped = if stepping_hours {
                    calendar::add_days_keep_time(&cur, (interval - 1) * 7)
                } else {
                    calendar::add_wall(
                        &cur,
                        interval - 1,
                        WallUnit::Weeks,
                        self.anchor_time(),
                    )
                };
                let Some(mut jumped) = jumped else {
                    self.exhaust();
                    return Ok(());
                };
                if jumped.weekday() != first_day {
                    let normalized = calendar::previous_weekday_on_or_before(
                        jumped.datetime().date(),
                        first_day,
                    )
                    .and_then(|date| {
                        calendar::resolve(
                            jumped.time_zone(),
                            date.to_datetime(jumped.datetime().time()),
                        )
                    });
                    let Some(normalized) = normalized else {
                        self.exhaust();
                        return Ok(());
                    };
                    jumped = normalized;
                }
                cur = jumped;
            }
            let day_ok = self.rule.by_day().is_empty()
                || self.rule.by_day_matches(weekday);
            let hour_ok =
                !stepping_hours || self.rule.by_hour().contains(&hour);
            if day_ok && hour_ok {
                break;
            }
        }
        self.cursor = Cursor::Active(cur);
        Ok(())
    }

    fn next_monthly(&mut self, amount: i64) -> Result<()> {
        let Some(cur) = self.cursor_zoned() else { return Ok(()) };
        let interval = i64::from(self.rule.interval());
        if self.rule.by_month_day().is_empty() && self.rule.by_day().is_empty()
        {
            return self.next_monthly_plain(cur, amount, interval);
        }

        let civil = cur.datetime();
        let anchor = self.anchor();
        let (mut year, mut month) = add_months(
            i32::from(civil.year()),
            civil.month(),
            (amount - 1) * interval,
        );
        let mut floor =
            if (i32::from(civil.year()), civil.month()) == (year, month) {
                candidate_of(civil)
            } else {
                Candidate::MIN
            };
        loop {
            if year > 9999 {
                self.exhaust();
                return Ok(());
            }
            let month_ok = self.rule.by_month().is_empty()
                || self.rule.by_month().contains(&month);
            if month_ok {
                let occ = monthly::occurrences(
                    &self.rule,
                    anchor,
                    year as i16,
                    month,
                    false,
                );
                if let Some(c) = occ.into_iter().find(|c| *c > floor) {
                    self.set_cursor_candidate(year as i16, month, c);
                    return Ok(());
                }
            }
            (year, month) = add_months(year, month, interval);
            floor = Candidate::MIN;
        }
    }

    /// Monthly cadence without expanding BY parts: the start's day-of-month
    /// is preserved, skipping months where it does not exist.
    fn next_monthly_plain(
        &mut self,
        cur: Zoned,
        amount: i64,
        interval: i64,
    ) -> Result<()> {
        let day = cur.datetime().day();
        if day < 29 && self.rule.by_month().is_empty() {
            let Some(months) = interval.checked_mul(amount) else {
                self.exhaust();
                return Ok(());
            };
            match calendar::add_wall(
                &cur,
                months,
                WallUnit::Months,
                self.anchor_time(),
            ) {
                Some(zdt) => self.cursor = Cursor::Active(zdt),
                None => self.exhaust(),
            }
            return Ok(());
        }
        // Days 29 through 31 can vanish, and BYMONTH can exclude months.
        // Probe whole multiples of the interval from the current position
        // so that a constrained month does not stick to the cursor.
        let mut attempt = amount.max(1);
        loop {
            let Some(months) = interval.checked_mul(attempt) else {
                self.exhaust();
                return Ok(());
            };
            let Some(next) = calendar::add_wall(
                &cur,
                months,
                WallUnit::Months,
                self.anchor_time(),
            ) else {
                self.exhaust();
                return Ok(());
            };
            let month_ok = self.rule.by_month().is_empty()
                || self.rule.by_month().contains(&next.month());
            if next.day() == day && month_ok {
                self.cursor = Cursor::Active(next);
                return Ok(());
            }
            attempt += 1;
        }
    }

    fn next_yearly(&mut self, amount: i64) -> Result<()> {
        let Some(cur) = self.cursor_zoned() else { return Ok(()) };
        let interval = i64::from(self.rule.interval());
        if self.rule.by_month().is_empty() {
            if !self.rule.by_week_no().is_empty() {
                return self.next_yearly_week_no(cur, amount, interval);
            }
            if !self.rule.by_year_day().is_empty() {
                return self.next_yearly_year_day(cur, amount, interval);
            }
            return self.next_yearly_plain(cur, amount, interval);
        }
        let expands = !self.rule.by_day().is_empty()
            || !self.rule.by_month_day().is_empty()
            || !self.rule.by_hour().is_empty()
            || !self.rule.by_minute().is_empty()
            || !self.rule.by_second().is_empty()
            || !self.rule.by_set_pos().is_empty();
        if expands {
            self.next_yearly_month_scan(cur, amount, interval)
        } else {
            self.next_yearly_month_cycle(cur, amount, interval)
        }
    }

    fn next_yearly_plain(
        &mut self,
        cur: Zoned,
        amount: i64,
        interval: i64,
    ) -> Result<()> {
        let civil = cur.datetime();
        if civil.month() == 2 && civil.day() == 29 {
            // Constrained arithmetic would land on Feb 28 and stay there
            // forever, so probe whole multiples of the interval until the
            // next leap year.
            let mut attempt = amount.max(1);
            loop {
                let Some(years) = interval.checked_mul(attempt) else {
                    return self.yearly_overrun();
                };
                let Some(next) = calendar::add_wall(
                    &cur,
                    years,
                    WallUnit::Years,
                    self.anchor_time(),
                ) else {
                    return self.yearly_overrun();
                };
                if next.day() == 29 {
                    self.cursor = Cursor::Active(next);
                    return Ok(());
                }
                attempt += 1;
            }
        }
        let Some(years) = interval.checked_mul(amount) else {
            self.exhaust();
            return Ok(());
        };
        match calendar::add_wall(
            &cur,
            years,
            WallUnit::Years,
            self.anchor_time(),
        ) {
            Some(zdt) => self.cursor = Cursor::Active(zdt),
            None => self.exhaust(),
        }
        Ok(())
    }

    /// BYWEEKNO expansion: week-date candidates for the scanned year,
    /// one per requested week number and weekday (Monday when BYDAY is
    /// absent), in the week numbering anchored at WKST.
    fn next_yearly_week_no(
        &mut self,
        cur: Zoned,
        amount: i64,
        interval: i64,
    ) -> Result<()> {
        let wkst = self.rule.week_start();
        let weekdays: Vec<Weekday> = if self.rule.by_day().is_empty() {
            vec![Weekday::Monday]
        } else {
            let mut weekdays: Vec<Weekday> = self
                .rule
                .by_day()
                .iter()
                .map(|bywd| bywd.weekday())
                .collect();
            weekdays.sort_by_key(|&wd| calendar::iso_weekday_number(wd));
            weekdays.dedup();
            weekdays
        };
        let anchor_time = self.anchor_time();
        let civil = cur.datetime();
        let mut year = i64::from(civil.year()) + (amount - 1) * interval;
        loop {
            if year > 9999 {
                return self.yearly_overrun();
            }
            let mut best: Option<DateTime> = None;
            for &week in self.rule.by_week_no() {
                let week = if week < 0 {
                    weekdate::weeks_in_year(wkst, year as i16) + week + 1
                } else {
                    week
                };
                if week < 1 {
                    continue;
                }
                for &weekday in &weekdays {
                    let date =
                        WeekDate::new(wkst, year as i16, week, weekday)
                            .and_then(WeekDate::to_date);
                    let Some(date) = date else { continue };
                    let dt = date.to_datetime(anchor_time);
                    if dt > civil && best.map_or(true, |b| dt < b) {
                        best = Some(dt);
                    }
                }
            }
            if let Some(dt) = best {
                match calendar::resolve(cur.time_zone(), dt) {
                    Some(zdt) => self.cursor = Cursor::Active(zdt),
                    None => self.exhaust(),
                }
                return Ok(());
            }
            year += interval;
        }
    }

    /// BYYEARDAY expansion: absolute days of the scanned year, negative
    /// values counted back from December 31, filtered by the BYDAY
    /// weekdays when present.
    fn next_yearly_year_day(
        &mut self,
        cur: Zoned,
        amount: i64,
        interval: i64,
    ) -> Result<()> {
        let anchor_time = self.anchor_time();
        let civil = cur.datetime();
        let mut year = i64::from(civil.year()) + (amount - 1) * interval;
        loop {
            if year > 9999 {
                return self.yearly_overrun();
            }
            let mut best: Option<DateTime> = None;
            for &day in self.rule.by_year_day() {
                let date = if day > 0 {
                    Date::new(year as i16, 1, 1).ok().and_then(|d| {
                        d.checked_add((i64::from(day) - 1).days()).ok()
                    })
                } else {
                    Date::new(year as i16, 12, 31).ok().and_then(|d| {
                        d.checked_add((i64::from(day) + 1).days()).ok()
                    })
                };
                let Some(date) = date else { continue };
                // Day 366 of a common year lands in the next year.
                if i64::from(date.year()) != year {
                    continue;
                }
                if !self.rule.by_day().is_empty()
                    && !self.rule.by_day_matches(date.weekday())
                {
                    continue;
                }
                let dt = date.to_datetime(anchor_time);
                if dt > civil && best.map_or(true, |b| dt < b) {
                    best = Some(dt);
                }
            }
            if let Some(dt) = best {
                match calendar::resolve(cur.time_zone(), dt) {
                    Some(zdt) => self.cursor = Cursor::Active(zdt),
                    None => self.exhaust(),
                }
                return Ok(());
            }
            year += interval;
        }
    }

    /// BYMONTH with expanding BY parts: scan the listed months of each
    /// year in ascending order, asking the monthly expansion for the first
    /// candidate above the cursor.
    fn next_yearly_month_scan(
        &mut self,
        cur: Zoned,
        amount: i64,
        interval: i64,
    ) -> Result<()> {
        let anchor = self.anchor();
        let civil = cur.datetime();
        let start_year = i64::from(civil.year());
        let mut year = start_year + (amount - 1) * interval;
        loop {
            if year > 9999 {
                return self.yearly_overrun();
            }
            for &month in self.rule.by_month() {
                if year == start_year && month < civil.month() {
                    continue;
                }
                let floor = if year == start_year && month == civil.month()
                {
                    candidate_of(civil)
                } else {
                    Candidate::MIN
                };
                let occ = monthly::occurrences(
                    &self.rule,
                    anchor,
                    year as i16,
                    month,
                    true,
                );
                if let Some(c) = occ.into_iter().find(|c| *c > floor) {
                    self.set_cursor_candidate(year as i16, month, c);
                    return Ok(());
                }
            }
            year += interval;
        }
    }

    /// BYMONTH alone: cycle through the listed months, preserving the
    /// start's day-of-month and wall time, rolling the year forward by the
    /// interval on wrap-around. Months where the day does not exist are
    /// passed over.
    fn next_yearly_month_cycle(
        &mut self,
        cur: Zoned,
        amount: i64,
        interval: i64,
    ) -> Result<()> {
        let months = self.rule.by_month();
        let day = self.anchor().day();
        let anchor_time = self.anchor_time();
        let civil = cur.datetime();
        let mut year = i64::from(civil.year()) + (amount - 1) * interval;
        let mut month = civil.month();
        loop {
            match months.iter().copied().find(|&m| m > month) {
                Some(m) => month = m,
                None => {
                    year += interval;
                    month = months[0];
                }
            }
            if year > 9999 {
                return self.yearly_overrun();
            }
            if let Ok(date) = Date::new(year as i16, month, day) {
                match calendar::resolve(
                    cur.time_zone(),
                    date.to_datetime(anchor_time),
                ) {
                    Some(zdt) => self.cursor = Cursor::Active(zdt),
                    None => self.exhaust(),
                }
                return Ok(());
            }
        }
    }
}

fn candidate_of(dt: DateTime) -> Candidate {
    Candidate {
        day: dt.day(),
        hour: dt.hour(),
        minute: dt.minute(),
        second: dt.second(),
    }
}

/// Adds `n` months to a (year, month) pair without day-of-month concerns.
fn add_months(year: i32, month: i8, n: i64) -> (i32, i8) {
    let zero = i64::from(year) * 12 + i64::from(month) - 1 + n;
    let year = zero.div_euclid(12).clamp(i64::from(i32::MIN), 10_000);
    let month = zero.rem_euclid(12) + 1;
    (year as i32, month as i8)
}
