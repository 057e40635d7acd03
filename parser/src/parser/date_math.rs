use chumsky::prelude::*;

use crate::ast::*;
use crate::parser::utils::*;

pub fn date_math() -> impl Psr<DateMath> {
    expr().or(date().map(DateMath::PlainDate))
}

fn expr() -> impl Psr<DateMath> {
    anchor()
        .then(offset().repeated())
        .then(rounding().or_not())
        .map(|((anchor, offsets), rounding)| DateMath::Expr {
            anchor,
            offsets,
            rounding,
        })
}

fn date() -> impl Psr<Date> {
    usize_with_digit_count(4)
        .then_ignore(just('-'))
        .then(usize_with_digit_count(2))
        .then_ignore(just('-'))
        .then(usize_with_digit_count(2))
        .map(|((year, month), day)| Date { year, month, day })
        .labelled("date")
}

fn anchor() -> impl Psr<Anchor> {
    exactly("now")
        .to(Anchor::Now)
        .or(date().then_ignore(exactly("||")).map(Anchor::Date))
        .labelled("anchor")
}

fn offset() -> impl Psr<Offset> {
    one_of("+-")
        .map(|c| match c {
            '+' => Sign::Plus,
            _ => Sign::Minus,
        })
        .then(text::int::<char, Simple<char>>(10).from_str().unwrapped())
        .then(offset_unit())
        .map(|((sign, amount), unit)| Offset { sign, amount, unit })
        .labelled("offset")
}

fn offset_unit() -> impl Psr<OffsetUnit> {
    choice((
        just('s').to(OffsetUnit::Seconds),
        just('m').to(OffsetUnit::Minutes),
        just('h').to(OffsetUnit::Hours),
        just('d').to(OffsetUnit::Days),
        just('w').to(OffsetUnit::Weeks),
        just('M').to(OffsetUnit::Months),
        just('y').to(OffsetUnit::Years),
    ))
}

fn rounding() -> impl Psr<Rounding> {
    just('/')
        .ignore_then(filter(char::is_ascii_alphanumeric))
        .map(|c| match c {
            'd' => Rounding::Day,
            'w' => Rounding::Week,
            'M' => Rounding::Month,
            'Y' => Rounding::Year,
            other => Rounding::Unknown(other),
        })
        .labelled("rounding")
}
