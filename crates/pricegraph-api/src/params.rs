//! Lenient query-string parsing.
//!
//! Numeric parameters are accepted as strings so a malformed value is
//! ignored instead of failing the whole request.

/// `1`, `true`, `yes` or `y` (any case) are true; any other present value is
/// false; a missing value gives `default`.
pub fn flag(raw: Option<&str>, default: bool) -> bool {
  match raw {
    None => default,
    Some(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "y"),
  }
}

/// A strictly positive integer, or `None` for anything else.
pub fn positive(raw: Option<&str>) -> Option<usize> {
  raw
    .and_then(|s| s.trim().parse::<i64>().ok())
    .filter(|&n| n > 0)
    .and_then(|n| usize::try_from(n).ok())
}

pub fn number(raw: Option<&str>) -> Option<f64> {
  raw.and_then(|s| s.trim().parse::<f64>().ok())
}
