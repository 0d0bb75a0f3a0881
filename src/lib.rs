//! A Quartz-flavoured cron expression parser and next-fire evaluator.
//!
//! Expressions have 5, 6, or 7 whitespace-separated fields (optional seconds
//! in front, optional years at the back) and support the extended
//! day-of-month and day-of-week syntax: `L`, `LW`, `nW`, `wL`, `w#n`, `?`,
//! named months and weekdays, and ranges that wrap around the top of their
//! field. An expression compiles into a small set of per-field bitmasks, and
//! the next fire time is found by walking year → month → day → hour →
//! minute → second with bit scans instead of enumerating calendar days.
//!
//! # Example
//! ```
//! use fennel::{Cron, DateTime};
//!
//! let cron: Cron = "*/15 * 9-17 * * MON-FRI".parse().expect("valid expression");
//!
//! let from = DateTime::new(2024, 5, 6, 9, 0, 0).expect("valid date");
//! let next = cron.next_after(from).expect("matches in range");
//! assert_eq!(next.to_string(), "2024-05-06 09:00:15");
//! assert!(cron.contains(next));
//! ```

pub mod parse;

pub(crate) mod internal {
    pub trait Sealed {}
}

use core::fmt;
use core::iter::FusedIterator;
use core::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

use self::parse::{
    CronExpr, CronParseError, DayOfMonthEntry, DayOfMonthExpr, DayOfWeekEntry, DayOfWeekExpr,
    Expr, ExprValue, OrsExpr, Year,
};

/// Days from year zero to 1970-01-01: five 400-year cycles back from 2000,
/// minus the 30 years with 7 leap days between 1970 and 2000.
const DAYS_0000_TO_1970: i64 = 146_097 * 5 - (30 * 365 + 7);

fn is_leap_year(year: u16) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

/// Returns the number of days in the month, 28-31
fn length_of_month(year: u16, month: u8) -> u8 {
    match month {
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// Rata-Die style day count relative to the unix epoch.
fn to_epoch_day(year: u16, month: u8, day: u8) -> i64 {
    let y = i64::from(year);
    let m = i64::from(month);
    let mut total = 365 * y + (y + 3) / 4 - (y + 99) / 100 + (y + 399) / 400;
    total += (367 * m - 362) / 12;
    total += i64::from(day) - 1;
    if m > 2 {
        total -= 1;
        if !is_leap_year(year) {
            total -= 1;
        }
    }
    total - DAYS_0000_TO_1970
}

/// Day of the week of a calendar date, 0 = Sunday .. 6 = Saturday.
fn day_of_week(year: u16, month: u8, day: u8) -> u8 {
    let dow = (to_epoch_day(year, month, day) + 3).rem_euclid(7) + 1;
    if dow == 7 {
        0
    } else {
        dow as u8
    }
}

/// The position of the first set bit at or after `from`: the universal
/// "smallest allowed value ≥ from" query on a field mask.
#[inline]
fn match_field(mask: u64, from: u8) -> Option<u8> {
    let cleared = (mask >> from) << from;
    if cleared == 0 {
        None
    } else {
        Some(cleared.trailing_zeros() as u8)
    }
}

/// The smallest value in a non-empty field mask.
#[inline]
fn min_bit(mask: u64) -> u8 {
    mask.trailing_zeros() as u8
}

/// ORs the values covered by one parsed entry into a field mask.
fn fill_bits<E>(bits: &mut u64, expr: &OrsExpr<E>)
where
    E: ExprValue + Copy,
    u16: From<E>,
{
    match *expr {
        OrsExpr::One(v) => *bits |= 1 << u16::from(v),
        OrsExpr::Range(start, end) => fill_span::<E>(bits, start.into(), end.into(), 1),
        OrsExpr::Step { start, end, step } => {
            fill_span::<E>(bits, start.into(), end.into(), step.into())
        }
    }
}

fn fill_span<E: ExprValue>(bits: &mut u64, begin: u16, end: u16, step: u16) {
    if begin <= end {
        let mut i = begin;
        while i <= end {
            *bits |= 1 << i;
            i += step;
        }
        return;
    }

    // wrapping range: run to the top of the field, then re-enter at the
    // wrap base keeping the step phase across the seam
    let mut i = begin;
    while i <= E::MAX {
        *bits |= 1 << i;
        i += step;
    }
    i = i - (E::MAX + 1) + E::WRAP_MIN;
    while i <= end {
        *bits |= 1 << i;
        i += step;
    }
}

fn compile_mask<E>(expr: Expr<E>, all: u64) -> u64
where
    E: ExprValue + Copy,
    u16: From<E>,
{
    match expr {
        Expr::All => all,
        Expr::Many(exprs) => {
            let mut bits = 0u64;
            for ors in &exprs {
                fill_bits(&mut bits, ors);
            }
            bits & all
        }
    }
}

/// A bit-mask of the seconds in a minute set in an expression.
#[derive(Debug, Default, PartialEq, Eq, Hash, Clone, Copy)]
struct Seconds(u64);
impl Seconds {
    const ALL: u64 = 0x0FFF_FFFF_FFFF_FFFF;

    fn compile(expr: Expr<parse::Second>) -> Self {
        Self(compile_mask(expr, Self::ALL))
    }

    #[inline]
    fn contains(self, second: u8) -> bool {
        self.0 & (1 << second) != 0
    }
}

/// A bit-mask of the minutes in an hour set in an expression.
#[derive(Debug, Default, PartialEq, Eq, Hash, Clone, Copy)]
struct Minutes(u64);
impl Minutes {
    const ALL: u64 = 0x0FFF_FFFF_FFFF_FFFF;

    fn compile(expr: Expr<parse::Minute>) -> Self {
        Self(compile_mask(expr, Self::ALL))
    }

    #[inline]
    fn contains(self, minute: u8) -> bool {
        self.0 & (1 << minute) != 0
    }
}

/// A bit-mask of the hours in a day set in an expression.
#[derive(Debug, Default, PartialEq, Eq, Hash, Clone, Copy)]
struct Hours(u32);
impl Hours {
    const ALL: u32 = 0x00FF_FFFF;

    fn compile(expr: Expr<parse::Hour>) -> Self {
        Self(compile_mask(expr, u64::from(Self::ALL)) as u32)
    }

    #[inline]
    fn contains(self, hour: u8) -> bool {
        self.0 & (1 << hour) != 0
    }
}

/// A bit-mask of the months set in an expression, bits 1-12.
#[derive(Debug, Default, PartialEq, Eq, Hash, Clone, Copy)]
struct Months(u16);
impl Months {
    const ALL: u16 = 0x1FFE;

    fn compile(expr: Expr<parse::Month>) -> Self {
        Self(compile_mask(expr, u64::from(Self::ALL)) as u16)
    }

    #[inline]
    fn contains(self, month: u8) -> bool {
        self.0 & (1 << month) != 0
    }
}

/// Compiled day-of-month state: the base mask (bits 1-31) plus the extended
/// tokens' side channels, merged per month by the resolver.
#[derive(Debug, Default, PartialEq, Eq, Hash, Clone, Copy)]
struct DaysOfMonth {
    days: u32,
    workdays: u32,
    last_day: bool,
    last_workday: bool,
}
impl DaysOfMonth {
    const ALL: u32 = 0xFFFF_FFFE;

    fn compile(expr: DayOfMonthExpr) -> Self {
        match expr {
            DayOfMonthExpr::All => Self {
                days: Self::ALL,
                ..Self::default()
            },
            DayOfMonthExpr::Entries(entries) => {
                let mut dom = Self::default();
                let mut bits = 0u64;
                for entry in &entries {
                    match *entry {
                        DayOfMonthEntry::Ors(ors) => fill_bits(&mut bits, &ors),
                        DayOfMonthEntry::Any => bits |= u64::from(Self::ALL),
                        DayOfMonthEntry::Last => dom.last_day = true,
                        DayOfMonthEntry::LastWeekday => dom.last_workday = true,
                        DayOfMonthEntry::NearestWeekday(day) => {
                            dom.workdays |= 1 << u16::from(day)
                        }
                    }
                }
                dom.days = bits as u32 & Self::ALL;
                dom
            }
        }
    }

    /// The field accepts every day; `?` compiles to the same mask as `*`.
    #[inline]
    fn is_unrestricted(self) -> bool {
        self.days == Self::ALL
    }
}

/// Compiled day-of-week state. The weekday sets are carried in a five-week
/// expanded form (bits 1-35) so that a single shift by the month's first
/// weekday lands every weekday bit on each matching date of the month.
#[derive(Debug, Default, PartialEq, Eq, Hash, Clone, Copy)]
struct DaysOfWeek {
    days: u64,
    nth: u64,
    last: u64,
}
impl DaysOfWeek {
    const ALL: u64 = 0x0000_000F_FFFF_FFFE;
    const WEEK: u64 = 0x7F;

    fn compile(expr: DayOfWeekExpr) -> Self {
        match expr {
            DayOfWeekExpr::All => Self {
                days: Self::ALL,
                ..Self::default()
            },
            DayOfWeekExpr::Entries(entries) => {
                let mut raw_days = 0u64;
                let mut raw_last = 0u64;
                let mut nth = 0u64;
                for entry in &entries {
                    match *entry {
                        DayOfWeekEntry::Ors(ors) => fill_bits(&mut raw_days, &ors),
                        DayOfWeekEntry::Any => raw_days |= 0xFF,
                        DayOfWeekEntry::Last(day) => raw_last |= 1 << u16::from(day),
                        DayOfWeekEntry::Nth(day, n) => {
                            let slot = (u16::from(n) - 1) * 7 + u16::from(day.num_from_sunday()) + 1;
                            nth |= 1 << slot;
                        }
                    }
                }
                Self {
                    days: adjust_week_bits(raw_days),
                    nth,
                    last: adjust_week_bits(raw_last),
                }
            }
        }
    }

    /// The field accepts every weekday; `?` compiles to the same mask as `*`.
    #[inline]
    fn is_unrestricted(self) -> bool {
        self.days == Self::ALL
    }
}

/// Folds the 7-as-Sunday alias onto bit 0, replicates the weekday pattern
/// across five weeks, and re-bases Sunday onto bit 1 so that bit *d* reads
/// "day *d* of a month that starts on a Sunday".
fn adjust_week_bits(raw: u64) -> u64 {
    let mut v = raw;
    if v & (1 << 7) != 0 {
        v |= 1;
    }
    let week = v & DaysOfWeek::WEEK;
    let mut expanded = 0u64;
    let mut shift = 0;
    while shift < 35 {
        expanded |= week << shift;
        shift += 7;
    }
    expanded << 1
}

/// A bit-set of the years 1970-2199 set in an expression, indexed from 1970
/// across four words.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
struct Years([u64; 4]);
impl Years {
    /// 230 valid bits: three full words plus 38 in the last.
    const LAST_WORD: u64 = (1 << 38) - 1;

    fn all() -> Self {
        Self([!0, !0, !0, Self::LAST_WORD])
    }

    fn compile(expr: Expr<Year>) -> Self {
        match expr {
            Expr::All => Self::all(),
            Expr::Many(exprs) => {
                let mut words = [0u64; 4];
                for ors in &exprs {
                    // the year grammar rejects wrap-around, so begin <= end
                    let (begin, end, step) = match *ors {
                        OrsExpr::One(y) => (u16::from(y), u16::from(y), 1),
                        OrsExpr::Range(start, end) => (start.into(), end.into(), 1),
                        OrsExpr::Step { start, end, step } => {
                            (start.into(), end.into(), step.into())
                        }
                    };
                    let mut year = begin;
                    while year <= end {
                        let idx = usize::from(year - Year::MIN);
                        words[idx >> 6] |= 1 << (idx & 0x3F);
                        year += step;
                    }
                }
                Self(words)
            }
        }
    }

    /// The first set year at or after `year`, spanning the words, or `None`
    /// once the range is exhausted.
    fn first_from(self, year: u16) -> Option<u16> {
        if year > Year::MAX {
            return None;
        }
        let idx = usize::from(year.max(Year::MIN) - Year::MIN);
        let mut bit = idx & 0x3F;
        for word in (idx >> 6)..self.0.len() {
            let cleared = (self.0[word] >> bit) << bit;
            if cleared != 0 {
                let found = (word << 6) + cleared.trailing_zeros() as usize;
                return Some(Year::MIN + found as u16);
            }
            bit = 0;
        }
        None
    }
}

/// A broken-down instant (year, month, day, hour, minute, second) with no
/// time-zone semantics. Conversion to and from absolute time is the
/// caller's concern; [`DateTime::from_naive`] and [`DateTime::to_naive`]
/// cover the common chrono case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateTime {
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
}

impl DateTime {
    /// Creates a calendar-valid instant, or `None` if any component is out
    /// of range (the day is checked against the real month length).
    pub fn new(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Option<Self> {
        if !(1..=12).contains(&month) || day == 0 || hour > 23 || minute > 59 || second > 59 {
            return None;
        }
        if day > length_of_month(year, month) {
            return None;
        }
        Some(Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        })
    }

    /// The year component
    pub fn year(&self) -> u16 {
        self.year
    }
    /// The month component, 1-12
    pub fn month(&self) -> u8 {
        self.month
    }
    /// The day component, 1-31
    pub fn day(&self) -> u8 {
        self.day
    }
    /// The hour component, 0-23
    pub fn hour(&self) -> u8 {
        self.hour
    }
    /// The minute component, 0-59
    pub fn minute(&self) -> u8 {
        self.minute
    }
    /// The second component, 0-59
    pub fn second(&self) -> u8 {
        self.second
    }

    /// Breaks a chrono naive timestamp down, discarding sub-second
    /// precision. `None` for dates whose year does not fit the record.
    pub fn from_naive(dt: NaiveDateTime) -> Option<Self> {
        let year = u16::try_from(dt.year()).ok()?;
        Self::new(
            year,
            dt.month() as u8,
            dt.day() as u8,
            dt.hour() as u8,
            dt.minute() as u8,
            dt.second() as u8,
        )
    }

    /// The equivalent chrono naive timestamp.
    pub fn to_naive(self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(
            i32::from(self.year),
            u32::from(self.month),
            u32::from(self.day),
        )?
        .and_hms_opt(
            u32::from(self.hour),
            u32::from(self.minute),
            u32::from(self.second),
        )
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// A compiled cron value. Immutable once built, cheap to clone, and safe to
/// share across threads; evaluation allocates nothing.
///
/// # Example
/// ```
/// use fennel::{Cron, DateTime};
///
/// // noon on the last weekday of every month
/// let cron: Cron = "0 0 12 LW * ?".parse().expect("valid expression");
///
/// let from = DateTime::new(2013, 11, 2, 0, 0, 0).expect("valid date");
/// assert_eq!(
///     cron.next_after(from).map(|t| t.to_string()),
///     Some("2013-11-29 12:00:00".to_string())
/// );
/// ```
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct Cron {
    seconds: Seconds,
    minutes: Minutes,
    hours: Hours,
    dom: DaysOfMonth,
    months: Months,
    dow: DaysOfWeek,
    years: Years,
}

impl FromStr for Cron {
    type Err = CronParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // parse to the expression tree, then reduce it into the bitmask form
        s.parse().map(Cron::new)
    }
}

impl Cron {
    /// Compiles a parsed expression into its bitmask form.
    pub fn new(expr: CronExpr) -> Self {
        Self {
            seconds: Seconds::compile(expr.seconds),
            minutes: Minutes::compile(expr.minutes),
            hours: Hours::compile(expr.hours),
            dom: DaysOfMonth::compile(expr.doms),
            months: Months::compile(expr.months),
            dow: DaysOfWeek::compile(expr.dows),
            years: Years::compile(expr.years),
        }
    }

    /// Builds a value directly from raw field masks, where bit *i* accepts
    /// the value *i* (the day-of-week mask in its five-week expanded form,
    /// bits 1-35). Bits outside each field's valid window are discarded and
    /// the years default to the full range.
    pub fn from_fields(
        seconds: u64,
        minutes: u64,
        hours: u64,
        days_of_month: u64,
        months: u64,
        days_of_week: u64,
    ) -> Self {
        Self {
            seconds: Seconds(seconds & Seconds::ALL),
            minutes: Minutes(minutes & Minutes::ALL),
            hours: Hours(hours as u32 & Hours::ALL),
            dom: DaysOfMonth {
                days: days_of_month as u32 & DaysOfMonth::ALL,
                ..DaysOfMonth::default()
            },
            months: Months(months as u16 & Months::ALL),
            dow: DaysOfWeek {
                days: days_of_week & DaysOfWeek::ALL,
                ..DaysOfWeek::default()
            },
            years: Years::all(),
        }
    }

    /// Returns whether the expression matches the given instant.
    pub fn contains(&self, t: DateTime) -> bool {
        self.years.first_from(t.year) == Some(t.year)
            && self.months.contains(t.month)
            && self.hours.contains(t.hour)
            && self.minutes.contains(t.minute)
            && self.seconds.contains(t.second)
            && self.actual_days_of_month(t.year, t.month) & (1 << t.day) != 0
    }

    /// Returns the next instant strictly after `from` that matches the
    /// expression, or `None` if the year range is exhausted first.
    ///
    /// # Example
    /// ```
    /// use fennel::{Cron, DateTime};
    ///
    /// let cron: Cron = "* * * * * * *".parse().expect("valid expression");
    /// let from = DateTime::new(2013, 2, 28, 23, 59, 59).expect("valid date");
    /// assert_eq!(
    ///     cron.next_after(from).map(|t| t.to_string()),
    ///     Some("2013-03-01 00:00:00".to_string())
    /// );
    /// ```
    pub fn next_after(&self, from: DateTime) -> Option<DateTime> {
        let t = from;

        // Each helper below assumes every higher field already matches, so
        // the entry point walks the fields top-down and hands off to the
        // right "advance" helper at the first mismatch.
        let year = self.years.first_from(t.year)?;
        if year != t.year {
            return self.next_year(t);
        }

        match match_field(u64::from(self.months.0), t.month) {
            None => return self.next_year(t),
            Some(month) if month != t.month => return self.next_month(t),
            _ => {}
        }

        let days = self.actual_days_of_month(t.year, t.month);
        if days == 0 {
            return self.next_month(t);
        }

        match match_field(u64::from(days), t.day) {
            None => return self.next_month(t),
            Some(day) if day != t.day => return self.next_day(t, days),
            _ => {}
        }

        match match_field(u64::from(self.hours.0), t.hour) {
            None => return self.next_day(t, days),
            Some(hour) if hour != t.hour => return self.next_hour(t, days),
            _ => {}
        }

        match match_field(self.minutes.0, t.minute) {
            None => return self.next_hour(t, days),
            Some(minute) if minute != t.minute => return self.next_minute(t, days),
            _ => {}
        }

        match match_field(self.seconds.0, t.second) {
            None => self.next_minute(t, days),
            // the current second matches; "strictly after" forces a step
            Some(_) => self.next_second(t, days),
        }
    }

    /// Iterates over the instants strictly after `from` that match the
    /// expression.
    ///
    /// # Example
    /// ```
    /// use fennel::{Cron, DateTime};
    ///
    /// let cron: Cron = "0 0 0 1 * ?".parse().expect("valid expression");
    /// let from = DateTime::new(2020, 11, 15, 0, 0, 0).expect("valid date");
    /// let firsts: Vec<String> = cron.iter_after(from).take(3).map(|t| t.to_string()).collect();
    /// assert_eq!(
    ///     firsts,
    ///     ["2020-12-01 00:00:00", "2021-01-01 00:00:00", "2021-02-01 00:00:00"]
    /// );
    /// ```
    pub fn iter_after(&self, from: DateTime) -> CronTimesIter {
        CronTimesIter {
            next: self.next_after(from),
            cron: self.clone(),
        }
    }

    /// Merges the day-of-month mask, the day-of-week mask, and the extended
    /// modifiers with the month's real calendar into one mask of matching
    /// days, bits 1..=`length_of_month`.
    fn actual_days_of_month(&self, year: u16, month: u8) -> u32 {
        let last_day = length_of_month(year, month);
        // clear the base window's bits past the end of this month
        let this_months_mask = (DaysOfMonth::ALL << (31 - last_day)) >> (31 - last_day);

        // if neither side is restricted every day of the month is a hit
        if self.dom.is_unrestricted() && self.dow.is_unrestricted() {
            return this_months_mask;
        }

        let first_weekday = day_of_week(year, month, 1);
        let last_weekday = day_of_week(year, month, last_day);
        let mut days = 0u32;

        if !self.dom.is_unrestricted() {
            days |= self.dom.days;

            if self.dom.last_day {
                days |= 1 << last_day;
            }
            if self.dom.last_workday {
                days |= 1 << last_workday(last_day, last_weekday);
            }

            let mut workdays = self.dom.workdays & this_months_mask;
            while workdays != 0 {
                let target = workdays.trailing_zeros() as u8;
                workdays &= workdays - 1;
                let day = if target == 1 {
                    first_workday(first_weekday)
                } else if target == last_day {
                    last_workday(last_day, last_weekday)
                } else {
                    nearest_workday(target, day_of_week(year, month, target))
                };
                days |= 1 << day;
            }
        }

        if !self.dow.is_unrestricted() {
            // the expanded masks read "day d if the month started on a
            // Sunday"; shifting by the real first weekday aligns them
            days |= (self.dow.days >> first_weekday) as u32;
            days |= (self.dow.nth >> first_weekday) as u32;

            // wL hits only count in the closing week of the month
            let window = last_day - 7;
            let last = ((self.dow.last >> first_weekday) >> window) << window;
            days |= last as u32;
        }

        days & this_months_mask
    }

    fn next_year(&self, t: DateTime) -> Option<DateTime> {
        let year = self.years.first_from(t.year.saturating_add(1))?;
        let month = min_bit(u64::from(self.months.0));
        let days = self.actual_days_of_month(year, month);
        let reset = DateTime {
            year,
            month,
            day: 1,
            hour: min_bit(u64::from(self.hours.0)),
            minute: min_bit(self.minutes.0),
            second: min_bit(self.seconds.0),
        };
        if days == 0 {
            return self.next_month(reset);
        }
        Some(DateTime {
            day: min_bit(u64::from(days)),
            ..reset
        })
    }

    fn next_month(&self, t: DateTime) -> Option<DateTime> {
        let month = match match_field(u64::from(self.months.0), t.month + 1) {
            None => return self.next_year(t),
            Some(month) => month,
        };
        let days = self.actual_days_of_month(t.year, month);
        let reset = DateTime {
            year: t.year,
            month,
            day: 1,
            hour: min_bit(u64::from(self.hours.0)),
            minute: min_bit(self.minutes.0),
            second: min_bit(self.seconds.0),
        };
        if days == 0 {
            return self.next_month(reset);
        }
        Some(DateTime {
            day: min_bit(u64::from(days)),
            ..reset
        })
    }

    fn next_day(&self, t: DateTime, days: u32) -> Option<DateTime> {
        match match_field(u64::from(days), t.day + 1) {
            None => self.next_month(t),
            Some(day) => Some(DateTime {
                day,
                hour: min_bit(u64::from(self.hours.0)),
                minute: min_bit(self.minutes.0),
                second: min_bit(self.seconds.0),
                ..t
            }),
        }
    }

    fn next_hour(&self, t: DateTime, days: u32) -> Option<DateTime> {
        match match_field(u64::from(self.hours.0), t.hour + 1) {
            None => self.next_day(t, days),
            Some(hour) => Some(DateTime {
                hour,
                minute: min_bit(self.minutes.0),
                second: min_bit(self.seconds.0),
                ..t
            }),
        }
    }

    fn next_minute(&self, t: DateTime, days: u32) -> Option<DateTime> {
        match match_field(self.minutes.0, t.minute + 1) {
            None => self.next_hour(t, days),
            Some(minute) => Some(DateTime {
                minute,
                second: min_bit(self.seconds.0),
                ..t
            }),
        }
    }

    fn next_second(&self, t: DateTime, days: u32) -> Option<DateTime> {
        match match_field(self.seconds.0, t.second + 1) {
            None => self.next_minute(t, days),
            Some(second) => Some(DateTime { second, ..t }),
        }
    }
}

/// Weekday nearest the last day of the month, never crossing into the next
/// month.
fn last_workday(last_day: u8, last_weekday: u8) -> u8 {
    match last_weekday {
        6 => last_day - 1,
        0 => last_day - 2,
        _ => last_day,
    }
}

/// Weekday nearest the 1st, never crossing into the previous month.
fn first_workday(first_weekday: u8) -> u8 {
    match first_weekday {
        6 => 3,
        0 => 2,
        _ => 1,
    }
}

fn nearest_workday(day: u8, weekday: u8) -> u8 {
    match weekday {
        6 => day - 1,
        0 => day + 1,
        _ => day,
    }
}

/// An iterator over the instants matching a cron value, created with
/// [`Cron::iter_after`].
///
/// [`Cron::iter_after`]: struct.Cron.html#method.iter_after
pub struct CronTimesIter {
    cron: Cron,
    next: Option<DateTime>,
}

impl CronTimesIter {
    /// Returns the underlying cron value.
    pub fn cron(&self) -> &Cron {
        &self.cron
    }
}

impl Iterator for CronTimesIter {
    type Item = DateTime;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.cron.next_after(current);
        Some(current)
    }
}

impl FusedIterator for CronTimesIter {}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> DateTime {
        DateTime::new(year, month, day, hour, minute, second).expect("valid test date")
    }

    fn cron(expr: &str) -> Cron {
        expr.parse()
            .unwrap_or_else(|e| panic!("cron {expr:?} failed to parse: {e}"))
    }

    fn parse_dt(s: &str) -> DateTime {
        let naive =
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").expect("well-formed test date");
        DateTime::from_naive(naive).expect("test date in range")
    }

    /// Checks a table of (from, expected next) pairs against one expression,
    /// along with the strictly-greater and result-matches properties.
    fn check_next(expr: &str, cases: &[(&str, &str)]) {
        let compiled = cron(expr);
        for (from, want) in cases {
            let from_dt = parse_dt(from);
            let got = compiled
                .next_after(from_dt)
                .unwrap_or_else(|| panic!("cron {expr:?} found nothing after {from}"));
            assert_eq!(got.to_string(), *want, "cron {expr:?} from {from}");
            assert!(got > from_dt, "cron {expr:?} must move strictly forward");
            assert!(
                compiled.contains(got),
                "cron {expr:?} must contain its own result {got}"
            );
        }
    }

    #[test]
    fn every_second() {
        check_next(
            "* * * * * * *",
            &[
                ("2013-01-01 00:00:00", "2013-01-01 00:00:01"),
                ("2013-01-01 00:00:59", "2013-01-01 00:01:00"),
                ("2013-01-01 00:59:59", "2013-01-01 01:00:00"),
                ("2013-01-01 23:59:59", "2013-01-02 00:00:00"),
                ("2013-02-28 23:59:59", "2013-03-01 00:00:00"),
                ("2016-02-28 23:59:59", "2016-02-29 00:00:00"),
                ("2012-12-31 23:59:59", "2013-01-01 00:00:00"),
            ],
        );
    }

    #[test]
    fn every_fifth_second() {
        check_next(
            "*/5 * * * * * *",
            &[
                ("2013-01-01 00:00:00", "2013-01-01 00:00:05"),
                ("2013-01-01 00:00:59", "2013-01-01 00:01:00"),
                ("2013-01-01 23:59:59", "2013-01-02 00:00:00"),
                ("2016-02-28 23:59:59", "2016-02-29 00:00:00"),
            ],
        );
    }

    #[test]
    fn every_minute() {
        check_next(
            "* * * * *",
            &[
                ("2013-01-01 00:00:00", "2013-01-01 00:01:00"),
                ("2013-01-01 00:00:59", "2013-01-01 00:01:00"),
                ("2013-01-01 00:59:00", "2013-01-01 01:00:00"),
                ("2013-01-01 23:59:00", "2013-01-02 00:00:00"),
                ("2013-02-28 23:59:00", "2013-03-01 00:00:00"),
                ("2016-02-28 23:59:00", "2016-02-29 00:00:00"),
                ("2012-12-31 23:59:00", "2013-01-01 00:00:00"),
            ],
        );
    }

    #[test]
    fn stepped_minute_range() {
        check_next(
            "17-43/5 * * * *",
            &[
                ("2013-01-01 00:00:00", "2013-01-01 00:17:00"),
                ("2013-01-01 00:16:59", "2013-01-01 00:17:00"),
                ("2013-01-01 00:30:00", "2013-01-01 00:32:00"),
                ("2013-01-01 00:50:00", "2013-01-01 01:17:00"),
                ("2013-01-01 23:50:00", "2013-01-02 00:17:00"),
                ("2013-02-28 23:50:00", "2013-03-01 00:17:00"),
                ("2016-02-28 23:50:00", "2016-02-29 00:17:00"),
                ("2012-12-31 23:50:00", "2013-01-01 00:17:00"),
            ],
        );
    }

    #[test]
    fn stepped_range_with_list() {
        check_next(
            "15-30/4,55 * * * *",
            &[
                ("2013-01-01 00:00:00", "2013-01-01 00:15:00"),
                ("2013-01-01 00:16:00", "2013-01-01 00:19:00"),
                ("2013-01-01 00:30:00", "2013-01-01 00:55:00"),
                ("2013-01-01 00:55:00", "2013-01-01 01:15:00"),
                ("2013-01-01 23:55:00", "2013-01-02 00:15:00"),
                ("2012-12-31 23:54:00", "2012-12-31 23:55:00"),
                ("2012-12-31 23:55:00", "2013-01-01 00:15:00"),
            ],
        );
    }

    #[test]
    fn mondays() {
        check_next(
            "0 0 * * MON",
            &[
                ("2013-01-28 00:00:00", "2013-02-04 00:00:00"),
                ("2013-12-30 00:30:00", "2014-01-06 00:00:00"),
            ],
        );
    }

    #[test]
    fn fridays_by_full_name() {
        check_next(
            "0 0 * * friday",
            &[
                ("2013-01-01 00:00:00", "2013-01-04 00:00:00"),
                ("2013-01-28 00:00:00", "2013-02-01 00:00:00"),
                ("2013-12-30 00:30:00", "2014-01-03 00:00:00"),
            ],
        );
    }

    #[test]
    fn weekends_with_sunday_alias() {
        check_next(
            "0 0 * * 6,7",
            &[
                ("2013-01-01 00:00:00", "2013-01-05 00:00:00"),
                ("2013-01-28 00:00:00", "2013-02-02 00:00:00"),
                ("2013-12-30 00:30:00", "2014-01-04 00:00:00"),
            ],
        );
    }

    #[test]
    fn fifth_saturday() {
        // only some months have a fifth Saturday
        check_next(
            "0 0 * * 6#5",
            &[("2013-09-02 00:00:00", "2013-11-30 00:00:00")],
        );
    }

    #[test]
    fn nearest_weekday() {
        check_next(
            "0 0 14W * *",
            &[
                // the 14th of April 2013 is a Sunday, so Monday the 15th
                ("2013-03-31 00:00:00", "2013-04-15 00:00:00"),
                // the 14th of September 2013 is a Saturday, so Friday the 13th
                ("2013-08-31 00:00:00", "2013-09-13 00:00:00"),
            ],
        );
    }

    #[test]
    fn nearest_weekday_at_month_end() {
        check_next(
            "0 0 30W * *",
            &[
                ("2013-03-02 00:00:00", "2013-03-29 00:00:00"),
                // June 30th 2013 is a Sunday and the last day, so Friday the 28th
                ("2013-06-02 00:00:00", "2013-06-28 00:00:00"),
                ("2013-09-02 00:00:00", "2013-09-30 00:00:00"),
                ("2013-11-02 00:00:00", "2013-11-29 00:00:00"),
            ],
        );
    }

    #[test]
    fn last_day_of_month() {
        check_next(
            "0 0 L * *",
            &[
                ("2013-09-02 00:00:00", "2013-09-30 00:00:00"),
                ("2014-01-01 00:00:00", "2014-01-31 00:00:00"),
                ("2014-02-01 00:00:00", "2014-02-28 00:00:00"),
                ("2016-02-15 00:00:00", "2016-02-29 00:00:00"),
            ],
        );
    }

    #[test]
    fn last_workday_of_month() {
        check_next(
            "0 0 LW * *",
            &[
                ("2013-09-02 00:00:00", "2013-09-30 00:00:00"),
                ("2013-11-02 00:00:00", "2013-11-29 00:00:00"),
                ("2014-08-15 00:00:00", "2014-08-29 00:00:00"),
            ],
        );
    }

    #[test]
    fn named_month_with_unrestricted_weekday() {
        check_next(
            "0 30 08 15 Jul ?",
            &[("2012-07-16 08:29:59", "2013-07-15 08:30:00")],
        );
    }

    #[test]
    fn restricted_days_union_weekdays() {
        // both day fields restricted: either side matching fires
        check_next(
            "0 * * */10 * Sun",
            &[("2012-07-14 23:59:59", "2012-07-15 00:00:00")],
        );
    }

    #[test]
    fn year_far_in_the_future() {
        check_next(
            "0 * * * 7 Sun 2020",
            &[("2012-07-14 23:59:59", "2020-07-05 00:00:00")],
        );
    }

    #[test]
    fn wrapping_weekday_range() {
        check_next(
            "0 0 12 ? * sat-mon",
            &[
                ("2022-08-26 07:52:05", "2022-08-27 12:00:00"),
                ("2022-08-27 12:00:05", "2022-08-28 12:00:00"),
                ("2022-08-28 12:00:05", "2022-08-29 12:00:00"),
                ("2022-08-29 12:00:05", "2022-09-03 12:00:00"),
            ],
        );
    }

    #[test]
    fn century_leap_rules() {
        // 2100 is not a leap year
        check_next(
            "0 0 0 L 2 ? 2100",
            &[("2100-01-01 00:00:00", "2100-02-28 00:00:00")],
        );
        check_next(
            "0 0 0 29 2 *",
            &[("2013-03-01 00:00:00", "2016-02-29 00:00:00")],
        );
    }

    #[test]
    fn schedule_ends_when_years_run_out() {
        let past = cron("* * * * * * 1970");
        assert_eq!(past.next_after(dt(2013, 1, 1, 0, 0, 0)), None);

        let single = cron("0 0 1 1 * ? 2020");
        assert_eq!(single.next_after(dt(2020, 6, 1, 0, 0, 0)), None);

        // a year bound ahead of the input clamps forward
        let ahead = cron("* * * * * * 1999");
        assert_eq!(
            ahead.next_after(dt(1970, 1, 1, 0, 0, 0)),
            Some(dt(1999, 1, 1, 0, 0, 0))
        );
    }

    #[test]
    fn wrapping_hours() {
        let night = cron("* 22-2 * * *");
        for hour in [22, 23, 0, 1, 2] {
            assert!(night.contains(dt(2020, 6, 1, hour, 15, 0)), "hour {hour}");
        }
        for hour in [3, 12, 21] {
            assert!(!night.contains(dt(2020, 6, 1, hour, 15, 0)), "hour {hour}");
        }
    }

    #[test]
    fn wrapping_seconds_keep_step_phase() {
        // 50-2/2 runs 50, 52, 54, 56, 58 and carries the phase over the
        // wrap to 0, 2
        let c = cron("50-2/2 * * * * ?");
        for second in [50, 52, 54, 56, 58, 0, 2] {
            assert!(c.contains(dt(2020, 6, 1, 10, 0, second)), "second {second}");
        }
        for second in [1, 4, 49, 51, 59] {
            assert!(!c.contains(dt(2020, 6, 1, 10, 0, second)), "second {second}");
        }
    }

    #[test]
    fn impossible_days_never_match() {
        // February the 30th compiles but never fires in February; the
        // search keeps cascading until the year range runs dry
        let c = cron("0 0 0 30 2 ?");
        assert_eq!(c.next_after(dt(2020, 1, 1, 0, 0, 0)), None);
    }

    #[test]
    fn aliases() {
        assert_eq!(
            cron("@daily").next_after(dt(2020, 5, 5, 10, 0, 0)),
            Some(dt(2020, 5, 6, 0, 0, 0))
        );
        assert_eq!(
            cron("@midnight").next_after(dt(2020, 5, 5, 10, 0, 0)),
            Some(dt(2020, 5, 6, 0, 0, 0))
        );
        assert_eq!(
            cron("@hourly").next_after(dt(2020, 5, 5, 10, 0, 0)),
            Some(dt(2020, 5, 5, 11, 0, 0))
        );
        // May 5th 2020 is a Tuesday; the next Sunday is the 10th
        assert_eq!(
            cron("@weekly").next_after(dt(2020, 5, 5, 10, 0, 0)),
            Some(dt(2020, 5, 10, 0, 0, 0))
        );
        assert_eq!(
            cron("@monthly").next_after(dt(2020, 5, 5, 10, 0, 0)),
            Some(dt(2020, 6, 1, 0, 0, 0))
        );
        assert_eq!(
            cron("@yearly").next_after(dt(2020, 5, 5, 10, 0, 0)),
            Some(dt(2021, 1, 1, 0, 0, 0))
        );
        assert_eq!(
            cron("@annually").next_after(dt(2020, 5, 5, 10, 0, 0)),
            Some(dt(2021, 1, 1, 0, 0, 0))
        );
    }

    #[test]
    fn from_fields_matches_parsed_midnight() {
        // second, minute, and hour 0; every day, month, and weekday
        let built = Cron::from_fields(1, 1, 1, !0, !0, !0);
        let parsed = cron("0 0 0 * * ? *");
        assert_eq!(built, parsed);
        assert_eq!(
            built.next_after(dt(2020, 5, 5, 10, 0, 0)),
            Some(dt(2020, 5, 6, 0, 0, 0))
        );
    }

    #[test]
    fn compile_is_deterministic() {
        assert_eq!(cron("0 0 12 ? * sat-mon"), cron("0 0 12 ? * sat-mon"));
        let cloned = cron("0 0 L * *").clone();
        assert_eq!(
            cloned.next_after(dt(2016, 2, 15, 0, 0, 0)),
            Some(dt(2016, 2, 29, 0, 0, 0))
        );
    }

    #[test]
    fn no_instant_between_fire_times() {
        let c = cron("*/10 * * * *");
        let from = dt(2013, 1, 1, 0, 0, 0);
        let next = c.next_after(from).expect("matches in range");
        assert_eq!(next, dt(2013, 1, 1, 0, 10, 0));
        for minute in 1..10 {
            for second in [0, 30] {
                assert!(!c.contains(dt(2013, 1, 1, 0, minute, second)));
            }
        }
    }

    #[test]
    fn iterator_walks_successive_times() {
        let times: Vec<String> = cron("*/15 * * * * * *")
            .iter_after(dt(2020, 1, 1, 0, 0, 0))
            .take(5)
            .map(|t| t.to_string())
            .collect();
        assert_eq!(
            times,
            [
                "2020-01-01 00:00:15",
                "2020-01-01 00:00:30",
                "2020-01-01 00:00:45",
                "2020-01-01 00:01:00",
                "2020-01-01 00:01:15",
            ]
        );
    }

    #[test]
    fn chrono_round_trip_preserves_fields() {
        let c = cron("0 0 12 * * ?");
        let from = NaiveDate::from_ymd_opt(2021, 3, 3)
            .unwrap()
            .and_hms_opt(13, 0, 0)
            .unwrap();
        let next = c
            .next_after(DateTime::from_naive(from).unwrap())
            .and_then(DateTime::to_naive)
            .unwrap();
        assert_eq!(
            next,
            NaiveDate::from_ymd_opt(2021, 3, 4)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn datetime_validation() {
        assert!(DateTime::new(2020, 2, 29, 0, 0, 0).is_some());
        assert!(DateTime::new(2021, 2, 29, 0, 0, 0).is_none());
        assert!(DateTime::new(2021, 13, 1, 0, 0, 0).is_none());
        assert!(DateTime::new(2021, 0, 1, 0, 0, 0).is_none());
        assert!(DateTime::new(2021, 6, 0, 0, 0, 0).is_none());
        assert!(DateTime::new(2021, 6, 1, 24, 0, 0).is_none());
        assert!(DateTime::new(2021, 6, 1, 0, 60, 0).is_none());
        assert!(DateTime::new(2021, 6, 1, 0, 0, 60).is_none());
    }

    #[test]
    fn calendar_probe() {
        assert!(is_leap_year(2000));
        assert!(is_leap_year(2016));
        assert!(!is_leap_year(2100));
        assert!(!is_leap_year(2013));

        assert_eq!(length_of_month(2016, 2), 29);
        assert_eq!(length_of_month(2013, 2), 28);
        assert_eq!(length_of_month(2013, 9), 30);
        assert_eq!(length_of_month(2013, 12), 31);

        // 1970-01-01 was a Thursday, 2000-01-01 a Saturday
        assert_eq!(day_of_week(1970, 1, 1), 4);
        assert_eq!(day_of_week(2000, 1, 1), 6);
        assert_eq!(day_of_week(2013, 1, 1), 2);
        assert_eq!(day_of_week(2024, 2, 29), 4);
        assert_eq!(day_of_week(2199, 12, 31), 2);
    }

    #[test]
    fn display_pads_components() {
        assert_eq!(dt(2013, 1, 2, 3, 4, 5).to_string(), "2013-01-02 03:04:05");
    }
}
