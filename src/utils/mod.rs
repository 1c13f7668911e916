//! Utility functions and helpers.

pub mod http;

use regex::Regex;

/// Extract the first run of decimal digits from text as a number.
///
/// Returns `None` when there are no digits or the run overflows `u32`.
pub fn first_number(text: &str) -> Option<u32> {
    let digits = Regex::new(r"\d+").ok()?;
    digits.find(text)?.as_str().parse().ok()
}
