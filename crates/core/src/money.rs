//! Rupee formatting with Indian digit grouping.
//!
//! `₹1,50,000`: the last three integer digits form one group, every
//! group before that has two digits.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Format an amount in rupees, showing paise only when non-zero.
pub fn format_inr(amount: Decimal) -> String {
    render(amount, false)
}

/// Format an amount in rupees, always with two decimal places.
pub fn format_inr_fixed(amount: Decimal) -> String {
    render(amount, true)
}

fn render(amount: Decimal, fixed: bool) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let abs = rounded.abs();
    let whole = abs.trunc();
    let paise = ((abs - whole) * Decimal::ONE_HUNDRED)
        .trunc()
        .to_u32()
        .unwrap_or(0);

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push('₹');
    out.push_str(&group_indian(&whole.to_u128().unwrap_or(0).to_string()));
    if fixed || paise != 0 {
        out.push_str(&format!(".{paise:02}"));
    }
    out
}

fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }
    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups: Vec<&str> = Vec::new();
    let mut end = head.len();
    while end > 0 {
        let start = end.saturating_sub(2);
        groups.push(&head[start..end]);
        end = start;
    }
    groups.reverse();
    format!("{},{}", groups.join(","), tail)
}

/// The first unsigned integer embedded in an amount string.
///
/// Digit-group commas are removed first, so `"₹1,50,000"` reads as
/// `150000`. Strings without digits (`"N/A"`, `"Error"`) yield `None`.
pub fn first_integer(amount: &str) -> Option<Decimal> {
    let cleaned: String = amount.chars().filter(|c| *c != ',').collect();
    let digits: String = cleaned
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<Decimal>().ok()
}
