use jiff::{ToSpan, Zoned};

use crate::{
    HORIZON, calendar,
    error::{Error, Result},
    rule::{Frequency, Rule, Until},
};

/// The position of a recurrence cursor.
///
/// An exhausted cursor is terminal: no driver can move it again.
#[derive(Clone, Debug)]
pub(crate) enum Cursor {
    Active(Zoned),
    Exhausted,
}

impl Cursor {
    pub(crate) fn active(&self) -> Option<&Zoned> {
        match *self {
            Cursor::Active(ref zdt) => Some(zdt),
            Cursor::Exhausted => None,
        }
    }
}

/// The ordinal of a cursor within its occurrence sequence.
///
/// The ordinal is zero-based and exact until a coarse jump skips an unknown
/// number of occurrences, at which point it becomes opaque for the rest of
/// the cursor's life (or until a reset).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Counter {
    Known(u64),
    Opaque,
}

impl Counter {
    /// Returns the ordinal, unless it is opaque.
    pub fn known(self) -> Option<u64> {
        match self {
            Counter::Known(n) => Some(n),
            Counter::Opaque => None,
        }
    }
}

/// A saved cursor position, used to back out of an overshooting advance.
#[derive(Clone, Debug)]
pub(crate) struct State {
    cursor: Cursor,
    counter: Counter,
    hour_jump: i32,
}

/// A lazy cursor over the occurrences of a recurrence rule anchored at a
/// start instant.
///
/// The start instant is always the first occurrence, whether or not it
/// matches the rule's BY parts. Occurrences are produced in the start's
/// time zone with the start's wall-clock time-of-day, unless
/// BYHOUR/BYMINUTE/BYSECOND override it. A generated occurrence whose
/// wall-clock reading does not exist locally (a DST spring-forward gap) is
/// forwarded to the next legal instant; an ambiguous reading (a fall-back
/// fold) resolves to the earlier instant.
///
/// Nothing is produced beyond [`HORIZON`]; a cursor that crosses it goes
/// permanently invalid instead.
#[derive(Clone, Debug)]
pub struct RecurrenceIter {
    pub(crate) rule: Rule,
    pub(crate) start: Zoned,
    pub(crate) until: Option<Zoned>,
    pub(crate) yearly_skip_upper_limit: bool,
    pub(crate) cursor: Cursor,
    pub(crate) counter: Counter,
    pub(crate) hour_jump: i32,
}

impl Rule {
    /// Returns a cursor over this rule's occurrences, anchored at `start`.
    pub fn iter(&self, start: &Zoned) -> RecurrenceIter {
        RecurrenceIter::new(self.clone(), start.clone())
    }

    /// Returns a standard iterator over this rule's occurrences, anchored
    /// at `start`.
    ///
    /// Note that the iterator may be "infinite," in the sense that it keeps
    /// producing datetimes up to the supported horizon. Callers should
    /// either bound the rule with COUNT or UNTIL, or call `take(N)`.
    pub fn occurrences(&self, start: &Zoned) -> Occurrences {
        self.iter(start).into_occurrences()
    }
}

impl RecurrenceIter {
    /// Creates a cursor for the given rule, anchored at `start`.
    ///
    /// An UNTIL bound earlier than the start is clamped to the start, which
    /// degenerates the rule to a single occurrence.
    pub fn new(rule: Rule, start: Zoned) -> RecurrenceIter {
        let until = rule
            .until()
            .map(|until| match until {
                Until::Zoned(zdt) => zdt.clone(),
                Until::Instant(ts) => {
                    ts.to_zoned(start.time_zone().clone())
                }
                Until::Floating(dt) => {
                    calendar::resolve(start.time_zone(), *dt)
                        .unwrap_or_else(|| start.clone())
                }
            })
            .map(|until| if until < start { start.clone() } else { until });
        RecurrenceIter {
            rule,
            until,
            yearly_skip_upper_limit: true,
            cursor: Cursor::Active(start.clone()),
            counter: Counter::Known(0),
            hour_jump: 0,
            start,
        }
    }

    /// Configures what happens when a yearly scan runs past the horizon
    /// without finding an occurrence: silently invalidate the cursor (the
    /// default) or fail with [`Error::HorizonExceeded`].
    pub fn yearly_skip_upper_limit(
        mut self,
        skip: bool,
    ) -> RecurrenceIter {
        self.yearly_skip_upper_limit = skip;
        self
    }

    /// Returns the rule this cursor expands.
    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    /// Returns the start instant this cursor is anchored at.
    pub fn start(&self) -> &Zoned {
        &self.start
    }

    /// Returns the occurrence the cursor points at, or `None` when the
    /// cursor has moved past the rule's bounds or the horizon.
    pub fn current(&self) -> Option<Zoned> {
        let zdt = self.cursor.active()?;
        if let (Counter::Known(n), Some(count)) =
            (self.counter, self.rule.count())
        {
            if n >= count {
                return None;
            }
        }
        if let Some(ref until) = self.until {
            if zdt > until {
                return None;
            }
        }
        if zdt.timestamp() > HORIZON {
            return None;
        }
        Some(zdt.clone())
    }

    /// Returns the ordinal of the cursor within the occurrence sequence.
    ///
    /// The ordinal is opaque after a coarse jump.
    pub fn key(&self) -> Counter {
        self.counter
    }

    /// True if and only if the rule has neither a COUNT nor an UNTIL
    /// bound.
    pub fn is_infinite(&self) -> bool {
        self.rule.count().is_none() && self.until.is_none()
    }

    /// Rewinds the cursor to the start instant.
    pub fn reset(&mut self) {
        self.cursor = Cursor::Active(self.start.clone());
        self.counter = Counter::Known(0);
        self.hour_jump = 0;
    }

    /// Moves the cursor to the next occurrence.
    ///
    /// This only fails when the cursor is configured to fault on a yearly
    /// horizon overrun; the ordinary end of a rule is signalled by
    /// [`RecurrenceIter::current`] returning `None` instead.
    pub fn advance(&mut self) -> Result<()> {
        self.advance_by(1)
    }

    /// Moves the cursor forward by `n` occurrence slots in one combined
    /// arithmetic step where the frequency driver allows it.
    ///
    /// The counter is incremented once per call, not once per slot, so
    /// this is only counter-exact for `n = 1`; the coarse jump machinery
    /// marks the counter opaque before using larger steps.
    pub fn advance_by(&mut self, n: u64) -> Result<()> {
        if n == 0 {
            return Ok(());
        }
        self.step(n as i64)?;
        if let Counter::Known(ref mut counter) = self.counter {
            *counter += 1;
        }
        Ok(())
    }

    /// Advances the cursor to the first occurrence at or after `target`.
    ///
    /// When the rule is not COUNT-bounded, a coarse jump skips over most of
    /// the intervening occurrences without visiting them, leaving the
    /// counter opaque. If the rule ends before `target`, the cursor is left
    /// past the end and [`RecurrenceIter::current`] returns `None`.
    pub fn fast_forward(&mut self, target: &Zoned) -> Result<()> {
        if self.rule.count().is_none() {
            let _ = self.jump_ahead(target)?;
        }
        loop {
            match self.cursor {
                Cursor::Exhausted => break,
                Cursor::Active(ref zdt) if *zdt >= *target => break,
                Cursor::Active(_) => {}
            }
            if self.current().is_none() {
                break;
            }
            self.advance()?;
        }
        Ok(())
    }

    /// Advances the cursor to the last occurrence strictly before
    /// `target`, or leaves it at the start when there is none.
    pub fn fast_forward_before(&mut self, target: &Zoned) -> Result<()> {
        let mut below = if self.rule.count().is_none() {
            self.jump_ahead(target)?
        } else {
            None
        };
        loop {
            match self.cursor {
                Cursor::Exhausted => break,
                Cursor::Active(ref zdt) if *zdt >= *target => break,
                Cursor::Active(_) => {}
            }
            if self.current().is_none() {
                break;
            }
            below = Some(self.state());
            self.advance()?;
        }
        // The loop only stops once the cursor has become unacceptable:
        // at or past the target, past the rule's own bounds, or exhausted.
        // Back up to the last saved position, if there was one; otherwise
        // nothing precedes the target and the cursor is still at the start.
        if let Some(state) = below {
            self.restore(state);
        }
        Ok(())
    }

    /// Advances the cursor to the final occurrence of the rule.
    ///
    /// Fails with [`Error::Logic`] when the rule is infinite.
    pub fn fast_forward_to_end(&mut self) -> Result<()> {
        if self.is_infinite() {
            return Err(Error::Logic(
                "cannot fast forward to the end of a recurrence rule \
                 with neither a count nor an until bound",
            ));
        }
        if self.rule.count().is_none() {
            if let Some(until) = self.until.clone() {
                // Seek just past the bound so the backup step below lands
                // on the final occurrence at or before it.
                if let Ok(past) = until.checked_add(1.nanosecond()) {
                    self.fast_forward_before(&past)?;
                }
            }
        }
        loop {
            let state = self.state();
            self.advance()?;
            if self.current().is_none() {
                self.restore(state);
                break;
            }
        }
        Ok(())
    }

    /// Converts this cursor into a standard iterator over its remaining
    /// occurrences, starting with the one the cursor points at.
    pub fn into_occurrences(self) -> Occurrences {
        Occurrences { iter: self, primed: false }
    }

    pub(crate) fn state(&self) -> State {
        State {
            cursor: self.cursor.clone(),
            counter: self.counter,
            hour_jump: self.hour_jump,
        }
    }

    pub(crate) fn restore(&mut self, state: State) {
        self.cursor = state.cursor;
        self.counter = state.counter;
        self.hour_jump = state.hour_jump;
    }

    /// Coarsely jumps toward `target`, leaving the cursor strictly before
    /// it whenever that is possible.
    ///
    /// Returns the last saved position known to be strictly before the
    /// target, if any coarse work was done. The estimate divides the
    /// remaining distance by the frequency's nominal days-per-interval and
    /// jumps a quarter of that at a time, falling back to fine stepping
    /// once the jump size is small. Since the jump sizes are guesses, any
    /// overshoot is rolled back before returning.
    fn jump_ahead(&mut self, target: &Zoned) -> Result<Option<State>> {
        let days_per_interval = match self.rule.frequency() {
            Frequency::Hourly => 1.0 / 24.0,
            Frequency::Daily => 1.0,
            Frequency::Weekly => 7.0,
            Frequency::Monthly => 30.0,
            Frequency::Yearly => 365.0,
            Frequency::Secondly | Frequency::Minutely => return Ok(None),
        } * f64::from(self.rule.interval());

        let mut below: Option<State> = None;
        loop {
            let remaining = {
                let Cursor::Active(ref cur) = self.cursor else {
                    return Ok(below);
                };
                if *cur >= *target {
                    return Ok(below);
                }
                let seconds = target
                    .timestamp()
                    .as_second()
                    .saturating_sub(cur.timestamp().as_second());
                seconds as f64 / 86_400.0 / days_per_interval
            };
            // An UNTIL bound or the horizon can end the sequence well
            // before the target; there is nothing left to jump over then.
            if self.current().is_none() {
                return Ok(below);
            }
            let size = (remaining / 4.0).floor().max(1.0) as u64;
            if size <= 4 {
                return Ok(below);
            }
            log::debug!(
                "coarse recurrence jump of {size} intervals toward {target}"
            );
            self.counter = Counter::Opaque;
            let mut before: Option<State> = None;
            loop {
                match self.cursor {
                    Cursor::Active(ref cur) if *cur < *target => {}
                    _ => break,
                }
                if self.current().is_none() {
                    break;
                }
                before = Some(self.state());
                self.advance_by(size)?;
            }
            match before {
                Some(state) => {
                    // The saved position is the last one strictly before
                    // the target. Re-take one fine step so the next size
                    // estimate shrinks even when this jump overshot
                    // immediately.
                    self.restore(state.clone());
                    below = Some(state);
                    self.advance()?;
                }
                None => {
                    // The cursor crossed the target with no saved position
                    // to return to. Start over with fine stepping.
                    self.reset();
                    return Ok(None);
                }
            }
        }
    }
}

/// A standard iterator over the occurrences of a recurrence cursor.
///
/// The iterator is fused: once it returns `None`, it keeps returning
/// `None`. A yearly horizon fault cannot occur here because the fault mode
/// is an explicit cursor configuration; iteration treats an invalid cursor
/// as the end of the sequence.
#[derive(Clone, Debug)]
pub struct Occurrences {
    iter: RecurrenceIter,
    primed: bool,
}

impl Iterator for Occurrences {
    type Item = Zoned;

    fn next(&mut self) -> Option<Zoned> {
        if !self.primed {
            self.primed = true;
            return self.iter.current();
        }
        self.iter.current()?;
        self.iter.advance().ok()?;
        self.iter.current()
    }
}

impl std::iter::FusedIterator for Occurrences {}
