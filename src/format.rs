//! Display helpers for the fixed `en-IN` / INR locale.

use chrono::{DateTime, NaiveDate, TimeZone};
use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt::Display;

pub const RUPEE: char = '₹';

/// Whole rupees with Indian digit grouping, e.g. `₹12,34,568` or `-₹500`.
/// Half a rupee rounds away from zero.
pub fn inr(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    let digits = rounded.abs().trunc().to_string();
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}{RUPEE}{}", group_indian(&digits))
}

/// Groups a run of ASCII digits as `xx,xx,xxx`.
fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }
    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut out = String::with_capacity(digits.len() + digits.len() / 2);
    let lead = head.len() % 2;
    if lead == 1 {
        out.push_str(&head[..1]);
    }
    for (i, pair) in head.as_bytes()[lead..].chunks(2).enumerate() {
        if i > 0 || lead == 1 {
            out.push(',');
        }
        out.push_str(std::str::from_utf8(pair).unwrap_or_default());
    }
    out.push(',');
    out.push_str(tail);
    out
}

pub fn date(d: NaiveDate) -> String {
    d.format("%d %b %Y").to_string()
}

pub fn timestamp<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    at.format("%d %b %Y, %H:%M").to_string()
}
