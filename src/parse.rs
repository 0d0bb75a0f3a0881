//! Field-level parsing of extended cron expressions. The types here form a
//! loss-free expression tree that can be inspected directly or reduced into a
//! compiled [`Cron`](../struct.Cron.html) value.

use crate::internal::Sealed;
use core::fmt::{self, Display, Formatter};
use core::iter::{once, Chain, Once};
use core::marker::PhantomData;
use core::slice;
use core::str::FromStr;
use nom::{
    branch::alt,
    bytes::complete::tag_no_case,
    character::complete::{char, digit1},
    combinator::{all_consuming, map, map_res, opt},
    IResult,
};
use std::vec;
use thiserror::Error;

/// An error returned if an expression value is out of range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("expression value out of the field's valid range")]
pub struct ValueOutOfRangeError;

/// A trait implemented for expression values that defines the valid range of
/// the field the value belongs to.
pub trait ExprValue: Sized + Sealed {
    /// The smallest valid value for the field
    const MIN: u16;
    /// The largest valid value for the field
    const MAX: u16;
    /// The value a wrap-around range re-enters the field at. This is `MIN`
    /// everywhere except the day of week, which re-enters at 1 because 7 is
    /// an alias for Sunday and folds onto 0 after parsing.
    const WRAP_MIN: u16 = Self::MIN;

    /// The min value as this expression value type
    fn min() -> Self;
    /// The max value as this expression value type
    fn max() -> Self;
}

/// A second value, 0-59
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Second(u8);
impl Sealed for Second {}
impl ExprValue for Second {
    const MIN: u16 = 0;
    const MAX: u16 = 59;

    fn min() -> Self {
        Self(Self::MIN as u8)
    }
    fn max() -> Self {
        Self(Self::MAX as u8)
    }
}
impl From<Second> for u16 {
    #[inline]
    fn from(v: Second) -> Self {
        u16::from(v.0)
    }
}
impl TryFrom<u16> for Second {
    type Error = ValueOutOfRangeError;

    #[inline]
    fn try_from(value: u16) -> Result<Self, Self::Error> {
        if value <= Self::MAX {
            Ok(Self(value as u8))
        } else {
            Err(ValueOutOfRangeError)
        }
    }
}

/// A minute value, 0-59
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Minute(u8);
impl Sealed for Minute {}
impl ExprValue for Minute {
    const MIN: u16 = 0;
    const MAX: u16 = 59;

    fn min() -> Self {
        Self(Self::MIN as u8)
    }
    fn max() -> Self {
        Self(Self::MAX as u8)
    }
}
impl From<Minute> for u16 {
    #[inline]
    fn from(v: Minute) -> Self {
        u16::from(v.0)
    }
}
impl TryFrom<u16> for Minute {
    type Error = ValueOutOfRangeError;

    #[inline]
    fn try_from(value: u16) -> Result<Self, Self::Error> {
        if value <= Self::MAX {
            Ok(Self(value as u8))
        } else {
            Err(ValueOutOfRangeError)
        }
    }
}

/// An hour value, 0-23
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hour(u8);
impl Sealed for Hour {}
impl ExprValue for Hour {
    const MIN: u16 = 0;
    const MAX: u16 = 23;

    fn min() -> Self {
        Self(Self::MIN as u8)
    }
    fn max() -> Self {
        Self(Self::MAX as u8)
    }
}
impl From<Hour> for u16 {
    #[inline]
    fn from(v: Hour) -> Self {
        u16::from(v.0)
    }
}
impl TryFrom<u16> for Hour {
    type Error = ValueOutOfRangeError;

    #[inline]
    fn try_from(value: u16) -> Result<Self, Self::Error> {
        if value <= Self::MAX {
            Ok(Self(value as u8))
        } else {
            Err(ValueOutOfRangeError)
        }
    }
}

/// A day of the month, 1-31
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayOfMonth(u8);
impl Sealed for DayOfMonth {}
impl ExprValue for DayOfMonth {
    const MIN: u16 = 1;
    const MAX: u16 = 31;

    fn min() -> Self {
        Self(Self::MIN as u8)
    }
    fn max() -> Self {
        Self(Self::MAX as u8)
    }
}
impl From<DayOfMonth> for u16 {
    #[inline]
    fn from(v: DayOfMonth) -> Self {
        u16::from(v.0)
    }
}
impl TryFrom<u16> for DayOfMonth {
    type Error = ValueOutOfRangeError;

    #[inline]
    fn try_from(value: u16) -> Result<Self, Self::Error> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(ValueOutOfRangeError)
        }
    }
}

/// A month, 1-12
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month(u8);
impl Sealed for Month {}
impl ExprValue for Month {
    const MIN: u16 = 1;
    const MAX: u16 = 12;

    fn min() -> Self {
        Self(Self::MIN as u8)
    }
    fn max() -> Self {
        Self(Self::MAX as u8)
    }
}
impl From<Month> for u16 {
    #[inline]
    fn from(v: Month) -> Self {
        u16::from(v.0)
    }
}
impl TryFrom<u16> for Month {
    type Error = ValueOutOfRangeError;

    #[inline]
    fn try_from(value: u16) -> Result<Self, Self::Error> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(ValueOutOfRangeError)
        }
    }
}

/// A day of the week, 0-7 with Sunday as 0. The value 7 is also accepted as
/// an alias for Sunday and folds onto 0 when the expression is compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayOfWeek(u8);
impl Sealed for DayOfWeek {}
impl ExprValue for DayOfWeek {
    const MIN: u16 = 0;
    const MAX: u16 = 7;
    const WRAP_MIN: u16 = 1;

    fn min() -> Self {
        Self(Self::MIN as u8)
    }
    fn max() -> Self {
        Self(Self::MAX as u8)
    }
}
impl DayOfWeek {
    /// The zero-based index from Sunday, with the 7 alias folded onto 0.
    #[inline]
    pub fn num_from_sunday(self) -> u8 {
        self.0 % 7
    }
}
impl From<DayOfWeek> for u16 {
    #[inline]
    fn from(v: DayOfWeek) -> Self {
        u16::from(v.0)
    }
}
impl TryFrom<u16> for DayOfWeek {
    type Error = ValueOutOfRangeError;

    #[inline]
    fn try_from(value: u16) -> Result<Self, Self::Error> {
        if value <= Self::MAX {
            Ok(Self(value as u8))
        } else {
            Err(ValueOutOfRangeError)
        }
    }
}

/// A year, 1970-2199
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Year(u16);
impl Sealed for Year {}
impl ExprValue for Year {
    const MIN: u16 = 1970;
    const MAX: u16 = 2199;

    fn min() -> Self {
        Self(Self::MIN)
    }
    fn max() -> Self {
        Self(Self::MAX)
    }
}
impl From<Year> for u16 {
    #[inline]
    fn from(v: Year) -> Self {
        v.0
    }
}
impl TryFrom<u16> for Year {
    type Error = ValueOutOfRangeError;

    #[inline]
    fn try_from(value: u16) -> Result<Self, Self::Error> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ValueOutOfRangeError)
        }
    }
}

/// An "nth" occurrence in a `#` entry, 1-5
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NthDay(u8);
impl Sealed for NthDay {}
impl NthDay {
    const MIN: u16 = 1;
    const MAX: u16 = 5;
}
impl From<NthDay> for u16 {
    #[inline]
    fn from(v: NthDay) -> Self {
        u16::from(v.0)
    }
}
impl TryFrom<u16> for NthDay {
    type Error = ValueOutOfRangeError;

    #[inline]
    fn try_from(value: u16) -> Result<Self, Self::Error> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(ValueOutOfRangeError)
        }
    }
}

/// A step value constrained by an expression value: at least 1, at most the
/// width of the field (`E::MAX - E::MIN`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Step<E> {
    value: u16,
    e: PhantomData<fn(E) -> E>,
}
impl<E: Sealed> Sealed for Step<E> {}
impl<E: ExprValue> ExprValue for Step<E> {
    const MIN: u16 = 1;
    const MAX: u16 = E::MAX - E::MIN;

    fn min() -> Self {
        Self {
            value: Self::MIN,
            e: PhantomData,
        }
    }
    fn max() -> Self {
        Self {
            value: Self::MAX,
            e: PhantomData,
        }
    }
}
impl<E> From<Step<E>> for u16 {
    #[inline]
    fn from(s: Step<E>) -> Self {
        s.value
    }
}
impl<E: ExprValue> TryFrom<u16> for Step<E> {
    type Error = ValueOutOfRangeError;

    #[inline]
    fn try_from(value: u16) -> Result<Self, Self::Error> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self {
                value,
                e: PhantomData,
            })
        } else {
            Err(ValueOutOfRangeError)
        }
    }
}

/// Either one value, an inclusive range, or a step expression.
///
/// A range whose start exceeds its end wraps around the top of the field
/// (`50-10` in the minutes field covers 50-59 and 0-10). The year field is
/// the one place wrap-around is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OrsExpr<E> {
    /// One value
    One(E),
    /// A '-' expression
    Range(E, E),
    /// A '/' expression
    Step {
        /// The start value. A leading '*' stands for the min value of E.
        start: E,
        /// The end value. A step without an explicit end runs to the max of E.
        end: E,
        /// The step value.
        step: Step<E>,
    },
}

/// A non-empty, comma-separated set of entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exprs<T> {
    /// The first entry
    pub first: T,
    /// The rest of the entries in source order
    pub tail: Vec<T>,
}

/// An immutable iterator over all entries in a set of [`Exprs`]
///
/// [`Exprs`]: struct.Exprs.html
pub type ExprsIter<'a, T> = Chain<Once<&'a T>, slice::Iter<'a, T>>;

/// An owned iterator over all entries in a set of [`Exprs`]
///
/// [`Exprs`]: struct.Exprs.html
pub type IntoExprsIter<T> = Chain<Once<T>, vec::IntoIter<T>>;

impl<T> Exprs<T> {
    /// Creates a new set of entries from its first element
    pub fn new(first: T) -> Self {
        Self {
            first,
            tail: Vec::new(),
        }
    }

    /// Iterates over all entries in this set
    pub fn iter(&self) -> ExprsIter<T> {
        once(&self.first).chain(self.tail.iter())
    }
}

impl<T> IntoIterator for Exprs<T> {
    type Item = T;
    type IntoIter = IntoExprsIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        once(self.first).chain(self.tail)
    }
}

impl<'a, T> IntoIterator for &'a Exprs<T> {
    type Item = &'a T;
    type IntoIter = ExprsIter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A generic field expression that is either a '*' or a set of entries.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Expr<E> {
    /// A '*' character
    All,
    /// Possibly multiple values, ranges, or steps
    Many(Exprs<OrsExpr<E>>),
}

/// One comma-entry of the day of month field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum DayOfMonthEntry {
    /// A value, range, or step
    Ors(OrsExpr<DayOfMonth>),
    /// A '?', leaving the field unrestricted
    Any,
    /// An 'L', the last day of the month
    Last,
    /// An 'LW', the last weekday of the month
    LastWeekday,
    /// A 'W' entry, the weekday nearest the given day without leaving the
    /// month
    NearestWeekday(DayOfMonth),
}

/// A day of the month expression.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DayOfMonthExpr {
    /// A '*' character
    All,
    /// Comma-separated entries, possibly mixing plain days with the extended
    /// tokens
    Entries(Exprs<DayOfMonthEntry>),
}

/// One comma-entry of the day of week field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum DayOfWeekEntry {
    /// A value, range, or step
    Ors(OrsExpr<DayOfWeek>),
    /// A '?', leaving the field unrestricted
    Any,
    /// An 'L' suffix, the last such weekday of the month
    Last(DayOfWeek),
    /// A '#' entry, the nth such weekday of the month
    Nth(DayOfWeek, NthDay),
}

/// A day of the week expression.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DayOfWeekExpr {
    /// A '*' character
    All,
    /// Comma-separated entries, possibly mixing plain weekdays with the
    /// extended tokens
    Entries(Exprs<DayOfWeekEntry>),
}

/// A parsed cron expression. This can be inspected directly or reduced into
/// a [`Cron`](../struct.Cron.html) value.
///
/// An expression has 5, 6, or 7 whitespace-separated fields. With 5 fields
/// the seconds default to `0`; with fewer than 7 the years default to `*`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct CronExpr {
    /// The seconds part of the expression
    pub seconds: Expr<Second>,
    /// The minutes part of the expression
    pub minutes: Expr<Minute>,
    /// The hours part of the expression
    pub hours: Expr<Hour>,
    /// The day of the month part of the expression
    pub doms: DayOfMonthExpr,
    /// The month part of the expression
    pub months: Expr<Month>,
    /// The day of the week part of the expression
    pub dows: DayOfWeekExpr,
    /// The year part of the expression
    pub years: Expr<Year>,
}

/// Names the seven fields of an expression, mostly for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// The seconds field
    Second,
    /// The minutes field
    Minute,
    /// The hours field
    Hour,
    /// The day of month field
    DayOfMonth,
    /// The month field
    Month,
    /// The day of week field
    DayOfWeek,
    /// The year field
    Year,
}

impl FieldKind {
    /// The inclusive bounds of the field's integer values.
    pub fn bounds(self) -> (u16, u16) {
        match self {
            FieldKind::Second => (Second::MIN, Second::MAX),
            FieldKind::Minute => (Minute::MIN, Minute::MAX),
            FieldKind::Hour => (Hour::MIN, Hour::MAX),
            FieldKind::DayOfMonth => (DayOfMonth::MIN, DayOfMonth::MAX),
            FieldKind::Month => (Month::MIN, Month::MAX),
            FieldKind::DayOfWeek => (DayOfWeek::MIN, DayOfWeek::MAX),
            FieldKind::Year => (Year::MIN, Year::MAX),
        }
    }
}

impl Display for FieldKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Second => "seconds",
            FieldKind::Minute => "minutes",
            FieldKind::Hour => "hours",
            FieldKind::DayOfMonth => "day of month",
            FieldKind::Month => "month",
            FieldKind::DayOfWeek => "day of week",
            FieldKind::Year => "year",
        };
        name.fmt(f)
    }
}

/// An error indicating that a cron expression failed to compile.
///
/// Every token is validated before a [`CronExpr`] is returned; no partially
/// parsed expression ever escapes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CronParseError {
    /// The input was empty or all whitespace
    #[error("empty cron expression")]
    Empty,
    /// The input had fewer than five fields
    #[error("missing field(s) in cron expression `{0}`")]
    MissingFields(String),
    /// A field contained an entry that does not parse or is out of range
    #[error("syntax error in the {field} field: invalid entry `{token}`")]
    InvalidField {
        /// The field the entry belongs to
        field: FieldKind,
        /// The offending whitespace-delimited token
        token: String,
    },
    /// An unrecognized `@`-prefixed name
    #[error("unrecognized named expression `{0}`")]
    UnknownAlias(String),
}

#[inline]
fn map_digit1<E>() -> impl Fn(&str) -> IResult<&str, E>
where
    E: TryFrom<u16, Error = ValueOutOfRangeError>,
{
    move |input: &str| {
        map_res(digit1, |s: &str| {
            let value = s.parse::<u16>().map_err(|_| ValueOutOfRangeError)?;
            E::try_from(value)
        })(input)
    }
}

#[inline]
fn step_digit<E: ExprValue>() -> impl Fn(&str) -> IResult<&str, Step<E>> {
    map_digit1()
}

/// A parser for a single value, a range of values, or a step expression
fn ors_expr<E, F>(f: F) -> impl Fn(&str) -> IResult<&str, OrsExpr<E>>
where
    E: ExprValue + TryFrom<u16, Error = ValueOutOfRangeError> + Copy,
    F: Fn(&str) -> IResult<&str, E>,
{
    move |input: &str| {
        let (input, star) = opt(char('*'))(input)?;
        if star.is_some() {
            // a lone '*' covers the whole field; with a '/' it becomes the
            // base of a step
            return match opt(char('/'))(input)? {
                (input, Some(_)) => map(step_digit::<E>(), |step| OrsExpr::Step {
                    start: E::min(),
                    end: E::max(),
                    step,
                })(input),
                (input, None) => Ok((input, OrsExpr::Range(E::min(), E::max()))),
            };
        }

        let (input, value) = f(input)?;
        match opt(alt((char('/'), char('-'))))(input)? {
            (input, Some('/')) => map(step_digit::<E>(), |step| OrsExpr::Step {
                start: value,
                end: E::max(),
                step,
            })(input),
            (input, Some('-')) => {
                let (input, end) = f(input)?;
                match opt(char('/'))(input)? {
                    (input, Some(_)) => map(step_digit::<E>(), |step| OrsExpr::Step {
                        start: value,
                        end,
                        step,
                    })(input),
                    (input, None) => Ok((input, OrsExpr::Range(value, end))),
                }
            }
            (input, _) => Ok((input, OrsExpr::One(value))),
        }
    }
}

/// Like [`ors_expr`] for the year field, which forbids wrap-around ranges.
fn year_ors(input: &str) -> IResult<&str, OrsExpr<Year>> {
    let (rest, ors) = ors_expr(map_digit1::<Year>())(input)?;
    let ordered = match ors {
        OrsExpr::One(_) => true,
        OrsExpr::Range(start, end) => start <= end,
        OrsExpr::Step { start, end, .. } => start <= end,
    };
    if ordered {
        Ok((rest, ors))
    } else {
        Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Verify,
        )))
    }
}

/// Consumes the trailing comma-separated entries of a field
fn tail_entries<'a, T, F>(
    mut input: &'a str,
    f: F,
    mut exprs: Exprs<T>,
) -> IResult<&'a str, Exprs<T>>
where
    F: Fn(&'a str) -> IResult<&'a str, T>,
{
    loop {
        let (rest, comma) = opt(char(','))(input)?;
        input = rest;
        if comma.is_none() {
            break Ok((input, exprs));
        }

        let (rest, entry) = f(input)?;
        input = rest;
        exprs.tail.push(entry);
    }
}

/// A parser for the fields without extended syntax (seconds, minutes, hours,
/// months).
fn expr<E, F>(f: F) -> impl Fn(&str) -> IResult<&str, Expr<E>>
where
    E: ExprValue + TryFrom<u16, Error = ValueOutOfRangeError> + Copy,
    F: Fn(&str) -> IResult<&str, E>,
{
    move |input: &str| {
        let ors = ors_expr::<E, _>(&f);

        let (input, star) = opt(char('*'))(input)?;
        if star.is_some() {
            let (input, slash) = opt(char('/'))(input)?;
            if slash.is_none() {
                return Ok((input, Expr::All));
            }
            let (input, step) = step_digit::<E>()(input)?;
            let head = OrsExpr::Step {
                start: E::min(),
                end: E::max(),
                step,
            };
            let (input, exprs) = tail_entries(input, &ors, Exprs::new(head))?;
            return Ok((input, Expr::Many(exprs)));
        }

        let (input, head) = ors(input)?;
        let (input, exprs) = tail_entries(input, &ors, Exprs::new(head))?;
        Ok((input, Expr::Many(exprs)))
    }
}

fn month(s: &str) -> IResult<&str, Month> {
    alt((
        map_digit1::<Month>(),
        // full names first so that JAN does not nibble the front of JANUARY
        alt((
            map(tag_no_case("JANUARY"), |_| Month(1)),
            map(tag_no_case("FEBRUARY"), |_| Month(2)),
            map(tag_no_case("MARCH"), |_| Month(3)),
            map(tag_no_case("APRIL"), |_| Month(4)),
            map(tag_no_case("JUNE"), |_| Month(6)),
            map(tag_no_case("JULY"), |_| Month(7)),
            map(tag_no_case("AUGUST"), |_| Month(8)),
            map(tag_no_case("SEPTEMBER"), |_| Month(9)),
            map(tag_no_case("OCTOBER"), |_| Month(10)),
            map(tag_no_case("NOVEMBER"), |_| Month(11)),
            map(tag_no_case("DECEMBER"), |_| Month(12)),
        )),
        alt((
            map(tag_no_case("JAN"), |_| Month(1)),
            map(tag_no_case("FEB"), |_| Month(2)),
            map(tag_no_case("MAR"), |_| Month(3)),
            map(tag_no_case("APR"), |_| Month(4)),
            map(tag_no_case("MAY"), |_| Month(5)),
            map(tag_no_case("JUN"), |_| Month(6)),
            map(tag_no_case("JUL"), |_| Month(7)),
            map(tag_no_case("AUG"), |_| Month(8)),
            map(tag_no_case("SEP"), |_| Month(9)),
            map(tag_no_case("OCT"), |_| Month(10)),
            map(tag_no_case("NOV"), |_| Month(11)),
            map(tag_no_case("DEC"), |_| Month(12)),
        )),
    ))(s)
}

fn weekday(s: &str) -> IResult<&str, DayOfWeek> {
    alt((
        map_digit1::<DayOfWeek>(),
        alt((
            map(tag_no_case("SUNDAY"), |_| DayOfWeek(0)),
            map(tag_no_case("MONDAY"), |_| DayOfWeek(1)),
            map(tag_no_case("TUESDAY"), |_| DayOfWeek(2)),
            map(tag_no_case("WEDNESDAY"), |_| DayOfWeek(3)),
            map(tag_no_case("THURSDAY"), |_| DayOfWeek(4)),
            map(tag_no_case("FRIDAY"), |_| DayOfWeek(5)),
            map(tag_no_case("SATURDAY"), |_| DayOfWeek(6)),
        )),
        alt((
            map(tag_no_case("SUN"), |_| DayOfWeek(0)),
            map(tag_no_case("MON"), |_| DayOfWeek(1)),
            map(tag_no_case("TUE"), |_| DayOfWeek(2)),
            map(tag_no_case("WED"), |_| DayOfWeek(3)),
            map(tag_no_case("THU"), |_| DayOfWeek(4)),
            map(tag_no_case("FRI"), |_| DayOfWeek(5)),
            map(tag_no_case("SAT"), |_| DayOfWeek(6)),
        )),
    ))(s)
}

#[inline]
fn seconds_expr(s: &str) -> IResult<&str, Expr<Second>> {
    expr(map_digit1())(s)
}

#[inline]
fn minutes_expr(s: &str) -> IResult<&str, Expr<Minute>> {
    expr(map_digit1())(s)
}

#[inline]
fn hours_expr(s: &str) -> IResult<&str, Expr<Hour>> {
    expr(map_digit1())(s)
}

#[inline]
fn months_expr(s: &str) -> IResult<&str, Expr<Month>> {
    expr(month)(s)
}

fn years_expr(input: &str) -> IResult<&str, Expr<Year>> {
    let (input, star) = opt(char('*'))(input)?;
    if star.is_some() {
        let (input, slash) = opt(char('/'))(input)?;
        if slash.is_none() {
            return Ok((input, Expr::All));
        }
        let (input, step) = step_digit::<Year>()(input)?;
        let head = OrsExpr::Step {
            start: <Year as ExprValue>::min(),
            end: <Year as ExprValue>::max(),
            step,
        };
        let (input, exprs) = tail_entries(input, year_ors, Exprs::new(head))?;
        return Ok((input, Expr::Many(exprs)));
    }

    let (input, head) = year_ors(input)?;
    let (input, exprs) = tail_entries(input, year_ors, Exprs::new(head))?;
    Ok((input, Expr::Many(exprs)))
}

fn dom_entry(input: &str) -> IResult<&str, DayOfMonthEntry> {
    let (rest, any) = opt(char('?'))(input)?;
    if any.is_some() {
        return Ok((rest, DayOfMonthEntry::Any));
    }
    let (rest, lw) = opt(tag_no_case("LW"))(input)?;
    if lw.is_some() {
        return Ok((rest, DayOfMonthEntry::LastWeekday));
    }
    let (rest, last) = opt(tag_no_case("L"))(input)?;
    if last.is_some() {
        return Ok((rest, DayOfMonthEntry::Last));
    }
    // a day followed by 'W' is a nearest-weekday entry; anything else
    // re-parses as a plain value, range, or step
    if let Ok((rest, day)) = map_digit1::<DayOfMonth>()(input) {
        let (rest, w) = opt(tag_no_case("W"))(rest)?;
        if w.is_some() {
            return Ok((rest, DayOfMonthEntry::NearestWeekday(day)));
        }
    }
    map(ors_expr(map_digit1::<DayOfMonth>()), DayOfMonthEntry::Ors)(input)
}

fn dom_expr(input: &str) -> IResult<&str, DayOfMonthExpr> {
    let (input, star) = opt(char('*'))(input)?;
    if star.is_some() {
        let (input, slash) = opt(char('/'))(input)?;
        if slash.is_none() {
            return Ok((input, DayOfMonthExpr::All));
        }
        let (input, step) = step_digit::<DayOfMonth>()(input)?;
        let head = DayOfMonthEntry::Ors(OrsExpr::Step {
            start: <DayOfMonth as ExprValue>::min(),
            end: <DayOfMonth as ExprValue>::max(),
            step,
        });
        let (input, entries) = tail_entries(input, dom_entry, Exprs::new(head))?;
        return Ok((input, DayOfMonthExpr::Entries(entries)));
    }

    let (input, head) = dom_entry(input)?;
    let (input, entries) = tail_entries(input, dom_entry, Exprs::new(head))?;
    Ok((input, DayOfMonthExpr::Entries(entries)))
}

fn dow_entry(input: &str) -> IResult<&str, DayOfWeekEntry> {
    let (rest, any) = opt(char('?'))(input)?;
    if any.is_some() {
        return Ok((rest, DayOfWeekEntry::Any));
    }
    // a weekday followed by 'L' or '#' is an extended entry; anything else
    // re-parses as a plain value, range, or step
    if let Ok((rest, day)) = weekday(input) {
        let (rest_last, last) = opt(tag_no_case("L"))(rest)?;
        if last.is_some() {
            return Ok((rest_last, DayOfWeekEntry::Last(day)));
        }
        let (rest_nth, hash) = opt(char('#'))(rest)?;
        if hash.is_some() {
            return map(map_digit1::<NthDay>(), move |nth| {
                DayOfWeekEntry::Nth(day, nth)
            })(rest_nth);
        }
    }
    map(ors_expr(weekday), DayOfWeekEntry::Ors)(input)
}

fn dow_expr(input: &str) -> IResult<&str, DayOfWeekExpr> {
    let (input, star) = opt(char('*'))(input)?;
    if star.is_some() {
        let (input, slash) = opt(char('/'))(input)?;
        if slash.is_none() {
            return Ok((input, DayOfWeekExpr::All));
        }
        let (input, step) = step_digit::<DayOfWeek>()(input)?;
        let head = DayOfWeekEntry::Ors(OrsExpr::Step {
            start: <DayOfWeek as ExprValue>::min(),
            end: <DayOfWeek as ExprValue>::max(),
            step,
        });
        let (input, entries) = tail_entries(input, dow_entry, Exprs::new(head))?;
        return Ok((input, DayOfWeekExpr::Entries(entries)));
    }

    let (input, head) = dow_entry(input)?;
    let (input, entries) = tail_entries(input, dow_entry, Exprs::new(head))?;
    Ok((input, DayOfWeekExpr::Entries(entries)))
}

/// Parses one whitespace-delimited field in full, mapping any failure to the
/// field's name and the offending token.
fn field<'a, O>(
    parser: impl Fn(&'a str) -> IResult<&'a str, O>,
    kind: FieldKind,
    token: &'a str,
) -> Result<O, CronParseError> {
    all_consuming(parser)(token)
        .map(|(_, value)| value)
        .map_err(|_| CronParseError::InvalidField {
            field: kind,
            token: token.to_string(),
        })
}

fn named_expr(spec: &str) -> Result<CronExpr, CronParseError> {
    fn at_min<E: ExprValue>() -> Expr<E> {
        Expr::Many(Exprs::new(OrsExpr::One(E::min())))
    }

    let first_day = DayOfMonthExpr::Entries(Exprs::new(DayOfMonthEntry::Ors(OrsExpr::One(
        <DayOfMonth as ExprValue>::min(),
    ))));
    let sunday = DayOfWeekExpr::Entries(Exprs::new(DayOfWeekEntry::Ors(OrsExpr::One(
        <DayOfWeek as ExprValue>::min(),
    ))));

    let expr = match spec.to_ascii_lowercase().as_str() {
        // 0 0 0 1 1 * *
        "@yearly" | "@annually" => CronExpr {
            seconds: at_min(),
            minutes: at_min(),
            hours: at_min(),
            doms: first_day,
            months: at_min(),
            dows: DayOfWeekExpr::All,
            years: Expr::All,
        },
        // 0 0 0 1 * * *
        "@monthly" => CronExpr {
            seconds: at_min(),
            minutes: at_min(),
            hours: at_min(),
            doms: first_day,
            months: Expr::All,
            dows: DayOfWeekExpr::All,
            years: Expr::All,
        },
        // 0 0 0 * * 0 *
        "@weekly" => CronExpr {
            seconds: at_min(),
            minutes: at_min(),
            hours: at_min(),
            doms: DayOfMonthExpr::All,
            months: Expr::All,
            dows: sunday,
            years: Expr::All,
        },
        // 0 0 0 * * * *
        "@daily" | "@midnight" => CronExpr {
            seconds: at_min(),
            minutes: at_min(),
            hours: at_min(),
            doms: DayOfMonthExpr::All,
            months: Expr::All,
            dows: DayOfWeekExpr::All,
            years: Expr::All,
        },
        // 0 0 * * * * *
        "@hourly" => CronExpr {
            seconds: at_min(),
            minutes: at_min(),
            hours: Expr::All,
            doms: DayOfMonthExpr::All,
            months: Expr::All,
            dows: DayOfWeekExpr::All,
            years: Expr::All,
        },
        _ => return Err(CronParseError::UnknownAlias(spec.to_string())),
    };
    Ok(expr)
}

impl FromStr for CronExpr {
    type Err = CronParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let spec = s.trim();
        if spec.is_empty() {
            return Err(CronParseError::Empty);
        }
        if spec.starts_with('@') {
            return named_expr(spec);
        }

        let fields: Vec<&str> = spec.split_whitespace().collect();
        if fields.len() < 5 {
            return Err(CronParseError::MissingFields(spec.to_string()));
        }
        if fields.len() > 7 {
            return Err(CronParseError::InvalidField {
                field: FieldKind::Year,
                token: fields[7].to_string(),
            });
        }

        // with 5 fields the seconds default to 0 and parsing begins at the
        // minutes
        let (seconds, rest) = if fields.len() == 5 {
            let zero = Expr::Many(Exprs::new(OrsExpr::One(<Second as ExprValue>::min())));
            (zero, &fields[..])
        } else {
            let seconds = field(seconds_expr, FieldKind::Second, fields[0])?;
            (seconds, &fields[1..])
        };

        let minutes = field(minutes_expr, FieldKind::Minute, rest[0])?;
        let hours = field(hours_expr, FieldKind::Hour, rest[1])?;
        let doms = field(dom_expr, FieldKind::DayOfMonth, rest[2])?;
        let months = field(months_expr, FieldKind::Month, rest[3])?;
        let dows = field(dow_expr, FieldKind::DayOfWeek, rest[4])?;
        let years = if rest.len() > 5 {
            field(years_expr, FieldKind::Year, rest[5])?
        } else {
            Expr::All
        };

        Ok(CronExpr {
            seconds,
            minutes,
            hours,
            doms,
            months,
            dows,
            years,
        })
    }
}
