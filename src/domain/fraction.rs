//! Percentage parsing and fraction formatting
//!
//! Percentages are plain `f64` values on a 0–100 scale. Fractions are only a
//! display format: `format_fraction` approximates with a fixed denominator of
//! one million, so values that are not multiples of 1/1,000,000 lose precision.

use std::sync::OnceLock;

use regex::Regex;

/// Denominator used when approximating a percentage as a fraction.
pub const FRACTION_PRECISION: i64 = 1_000_000;

/// Parse user input into a percentage of the source's interest.
///
/// Accepted forms:
/// - `"a/b"` → `(a / b) * 100`, whitespace around either part is ignored
/// - a decimal strictly between 0 and 1 → multiplied by 100 (`"0.25"` → 25)
/// - any other number → taken literally (`"25"` → 25, `"150"` → 150)
///
/// Returns `None` for empty or non-numeric input, and for a zero denominator.
/// Input is never truncated to a leading number: `"1/2/3"` and `"25abc"` are
/// both `None`.
pub fn parse_percentage(input: &str) -> Option<f64> {
    let trimmed = input.trim();

    if let Some((numerator, denominator)) = trimmed.split_once('/') {
        let numerator = parse_number(numerator)?;
        let denominator = parse_number(denominator)?;
        if denominator == 0.0 {
            return None;
        }
        return Some((numerator / denominator) * 100.0);
    }

    let value = parse_number(trimmed)?;
    if value > 0.0 && value < 1.0 {
        return Some(value * 100.0);
    }
    Some(value)
}

fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Greatest common divisor of the rounded absolute values.
pub fn gcd(a: f64, b: f64) -> i64 {
    let mut a = a.round().abs() as i64;
    let mut b = b.round().abs() as i64;
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

/// Render a percentage as a reduced fraction string.
///
/// `0` renders as `"0"` and `100` as `"1/1"`; everything else is scaled onto
/// a denominator of [`FRACTION_PRECISION`], rounded, then reduced.
pub fn format_fraction(percentage: f64) -> String {
    if percentage == 0.0 {
        return "0".to_string();
    }
    if percentage == 100.0 {
        return "1/1".to_string();
    }

    let numerator = ((percentage / 100.0) * FRACTION_PRECISION as f64).round() as i64;
    let denominator = FRACTION_PRECISION;

    let divisor = gcd(numerator as f64, denominator as f64);
    if divisor == 0 {
        return format!("{}/{}", numerator, denominator);
    }
    format!("{}/{}", numerator / divisor, denominator / divisor)
}

/// Title-case a name as typed by the user: `"JOHN o'brien"` → `"John O'Brien"`.
pub fn to_title_case(name: &str) -> String {
    static WORD_START: OnceLock<Regex> = OnceLock::new();
    let re = WORD_START.get_or_init(|| Regex::new(r"\b\w").expect("valid word-start regex"));

    let lower = name.to_lowercase();
    re.replace_all(&lower, |caps: &regex::Captures| caps[0].to_uppercase())
        .into_owned()
}
