// Utility helpers for parsing, rounding and number formatting.
//
// Spreadsheet exports mix locale-formatted numbers, codes and free text in
// the same file; this module keeps that handling in one place so the rest of
// the code works with typed values.
use num_format::{Locale, ToFormattedString};
use std::cmp::Ordering;

/// Marker shown wherever a value is not applicable (first edition of a
/// series, percent change over a zero score).
pub const NOT_APPLICABLE: &str = "N/A";

/// Parse a cell into `f64`, being forgiving about spreadsheet formatting.
///
/// - Trims whitespace; empty cells are `None`.
/// - Rejects anything with alphabetic characters (`"nan"` included).
/// - A lone comma is read as the decimal separator (`"450,5"`); when both
///   separators appear, commas are thousands separators and are dropped.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let s = if s.contains('.') {
        s.replace(',', "")
    } else {
        s.replace(',', ".")
    };
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Round to two decimal places, the precision every numeric cell is kept at.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Remove `.` and `,` from an identifier so `"2.304.400"` and `"2304400"`
/// compare equal.
pub fn strip_separators(s: &str) -> String {
    s.trim().chars().filter(|c| *c != '.' && *c != ',').collect()
}

pub fn cmp_f64(a: &f64, b: &f64) -> Ordering {
    a.partial_cmp(b).unwrap_or(Ordering::Equal)
}

pub fn median(mut v: Vec<f64>) -> Option<f64> {
    if v.is_empty() {
        return None;
    }
    v.sort_by(cmp_f64);
    let mid = v.len() / 2;
    if v.len() % 2 == 1 {
        Some(v[mid])
    } else {
        Some((v[mid - 1] + v[mid]) / 2.0)
    }
}

/// Linear-interpolated quantile over an ascending slice.
///
/// Position `q * (n - 1)` is interpolated between its neighbouring order
/// statistics, which is the default quantile method of most dataframe
/// libraries.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        return Some(sorted[lo]);
    }
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// `1` → `"1º"`.
pub fn ordinal(n: usize) -> String {
    format!("{}º", n)
}

/// Signed magnitude with one decimal: `+30.0`, `-4.5`, `0.0`.
pub fn format_signed(v: f64, suffix: &str) -> String {
    let magnitude = format!("{:.1}", v.abs());
    if magnitude.trim_start_matches(['0', '.']).is_empty() {
        return format!("{}{}", magnitude, suffix);
    }
    let sign = if v > 0.0 { '+' } else { '-' };
    format!("{}{}{}", sign, magnitude, suffix)
}

pub fn format_signed_opt(v: Option<f64>, suffix: &str) -> String {
    match v {
        Some(v) => format_signed(v, suffix),
        None => NOT_APPLICABLE.to_string(),
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    // Thousands separators for counts in console messages (`9,855 rows`).
    n.to_formatted_string(&Locale::en)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_locale_formatted_numbers() {
        assert_eq!(parse_f64_safe(Some(" 450.5 ")), Some(450.5));
        assert_eq!(parse_f64_safe(Some("450,5")), Some(450.5));
        assert_eq!(parse_f64_safe(Some("1,234.5")), Some(1234.5));
        assert_eq!(parse_f64_safe(Some("nan")), None);
        assert_eq!(parse_f64_safe(Some("")), None);
        assert_eq!(parse_f64_safe(None), None);
    }

    #[test]
    fn identifiers_lose_separators() {
        assert_eq!(strip_separators("2.304.400"), "2304400");
        assert_eq!(strip_separators("2,019"), "2019");
        assert_eq!(strip_separators("23001"), "23001");
    }

    #[test]
    fn rounds_to_two_places() {
        assert_eq!(round2(487.456), 487.46);
        assert_eq!(round2(12.0), 12.0);
    }

    #[test]
    fn quantile_interpolates_between_order_statistics() {
        let v = [450.0, 450.0, 500.0, 600.0];
        assert_eq!(quantile(&v, 0.25), Some(450.0));
        assert_eq!(quantile(&v, 0.5), Some(475.0));
        assert_eq!(quantile(&v, 0.75), Some(525.0));
        assert_eq!(quantile(&[7.0], 0.75), Some(7.0));
        assert_eq!(quantile(&[], 0.5), None);
    }

    #[test]
    fn signed_formatting() {
        assert_eq!(format_signed(30.0, ""), "+30.0");
        assert_eq!(format_signed(10.0, "%"), "+10.0%");
        assert_eq!(format_signed(-4.54, ""), "-4.5");
        assert_eq!(format_signed(0.0, "%"), "0.0%");
        assert_eq!(format_signed(-0.01, ""), "0.0");
        assert_eq!(format_signed_opt(None, "%"), "N/A");
        assert_eq!(ordinal(3), "3º");
    }
}
