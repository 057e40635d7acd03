use chumsky::prelude::*;

use crate::ast::*;
use crate::parser::utils::*;

pub fn interval() -> impl Psr<Interval> {
    calendar_word().or(numeric())
}

/// Bare calendar units as accepted for `calendar_interval`.
fn calendar_word() -> impl Psr<Interval> {
    choice((
        exactly("second").to(IntervalUnit::Seconds),
        exactly("minute").to(IntervalUnit::Minutes),
        exactly("hour").to(IntervalUnit::Hours),
        exactly("day").to(IntervalUnit::Days),
        exactly("week").to(IntervalUnit::Weeks),
        exactly("month").to(IntervalUnit::Months),
        exactly("quarter").to(IntervalUnit::Quarters),
        exactly("year").to(IntervalUnit::Years),
    ))
    .map(|unit| Interval { amount: 1, unit })
}

fn numeric() -> impl Psr<Interval> {
    text::int::<char, Simple<char>>(10)
        .from_str()
        .unwrapped()
        .then(unit())
        .map(|(amount, unit)| Interval { amount, unit })
}

fn unit() -> impl Psr<IntervalUnit> {
    // `ms` must win over the bare `m` of minutes.
    choice((
        exactly("ms").to(IntervalUnit::Milliseconds),
        just('s').to(IntervalUnit::Seconds),
        just('m').to(IntervalUnit::Minutes),
        just('h').to(IntervalUnit::Hours),
        just('d').to(IntervalUnit::Days),
        just('w').to(IntervalUnit::Weeks),
        just('M').to(IntervalUnit::Months),
        just('q').to(IntervalUnit::Quarters),
        just('y').to(IntervalUnit::Years),
    ))
}
