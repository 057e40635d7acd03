/// A calendar date as written in the DSL, e.g. `2024-04-15`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Date {
    pub year: u32,
    pub month: u32,
    pub day: u32,
}

impl Date {
    pub fn to_iso(&self) -> String {
        format!("{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

/// The point a date-math expression is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Now,
    /// A date anchor, written `2024-04-15||` in front of the offsets.
    Date(Date),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Plus,
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
    Months,
    Years,
}

/// One `±N<unit>` step, e.g. the `-1d` in `now-1d/M`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Offset {
    pub sign: Sign,
    pub amount: u32,
    pub unit: OffsetUnit,
}

/// Trailing `/x` rounding. Anything outside `d w M Y` is carried through as
/// `Unknown` so the renderer can decide how to degrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    Day,
    Week,
    Month,
    Year,
    Unknown(char),
}

/// A parsed date-math token. The two forms observed in practice: a bare
/// `YYYY-MM-DD` literal, and an expression like `now-1d/M`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateMath {
    PlainDate(Date),
    Expr {
        anchor: Anchor,
        offsets: Vec<Offset>,
        rounding: Option<Rounding>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalUnit {
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
    Months,
    Quarters,
    Years,
}

/// A histogram interval, either fixed (`30s`, `1h`) or calendar (`month`).
/// Calendar units reduce to fixed widths because the bucketing expression
/// divides by a constant number of milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub amount: u64,
    pub unit: IntervalUnit,
}

impl Interval {
    pub fn milliseconds(&self) -> i64 {
        let unit_ms: i64 = match self.unit {
            IntervalUnit::Milliseconds => 1,
            IntervalUnit::Seconds => 1_000,
            IntervalUnit::Minutes => 60 * 1_000,
            IntervalUnit::Hours => 3_600 * 1_000,
            IntervalUnit::Days => 86_400 * 1_000,
            IntervalUnit::Weeks => 7 * 86_400 * 1_000,
            IntervalUnit::Months => 30 * 86_400 * 1_000,
            IntervalUnit::Quarters => 90 * 86_400 * 1_000,
            IntervalUnit::Years => 365 * 86_400 * 1_000,
        };
        self.amount as i64 * unit_ms
    }
}
