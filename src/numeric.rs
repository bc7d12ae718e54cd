//! Loose numeric input as typed by staff: localized digits, thousands
//! separators and a cosmetic trailing percent sign.

use crate::error::{KpiError, Result};

const PERSIAN_ZERO: u32 = 0x06F0;
const ARABIC_INDIC_ZERO: u32 = 0x0660;
const ARABIC_DECIMAL_SEPARATOR: char = '\u{066B}';
const ARABIC_THOUSANDS_SEPARATOR: char = '\u{066C}';

fn latin_digit(c: char) -> Option<char> {
    let code = c as u32;
    [PERSIAN_ZERO, ARABIC_INDIC_ZERO]
        .into_iter()
        .find(|zero| (*zero..*zero + 10).contains(&code))
        .and_then(|zero| char::from_digit(code - zero, 10))
}

/// Maps Persian and Arabic-Indic digits to ASCII and trims whitespace.
pub fn normalize_digits(text: &str) -> String {
    text.trim()
        .chars()
        .map(|c| match c {
            ARABIC_DECIMAL_SEPARATOR => '.',
            other => latin_digit(other).unwrap_or(other),
        })
        .collect()
}

/// Parses `"12"`, `"12.5"`, `"12,345"`, `"۱۲٫۵"` or `"7%"`.
///
/// A trailing `%` is dropped without scaling: `"7%"` is `7.0`, not `0.07`.
pub fn parse_numeric(text: &str) -> Result<f64> {
    let mut cleaned: String = normalize_digits(text)
        .chars()
        .filter(|c| *c != ',' && *c != ARABIC_THOUSANDS_SEPARATOR)
        .collect();

    if cleaned.ends_with('%') {
        cleaned.pop();
    }

    let value: f64 = cleaned
        .trim()
        .parse()
        .map_err(|_| KpiError::invalid_numeric(text))?;

    if !value.is_finite() {
        return Err(KpiError::invalid_numeric(text));
    }

    Ok(value)
}

pub fn is_positive_number(text: &str) -> bool {
    matches!(parse_numeric(text), Ok(value) if value >= 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn strips_thousands_separators() {
        assert_eq!(parse_numeric("12,345").unwrap(), 12345.0);
        assert_eq!(parse_numeric("1,234,567.5").unwrap(), 1234567.5);
    }

    #[test]
    fn percent_sign_is_cosmetic() {
        assert_eq!(parse_numeric("7%").unwrap(), 7.0);
        assert_eq!(parse_numeric("12.5%").unwrap(), 12.5);
    }

    #[test]
    fn localized_digits_are_normalized() {
        assert_eq!(parse_numeric("۱۲.۵").unwrap(), 12.5);
        assert_eq!(parse_numeric("٣٤").unwrap(), 34.0);
        assert_eq!(parse_numeric("۱۲٫۵").unwrap(), 12.5);
        assert_eq!(parse_numeric("۱٬۲۰۰").unwrap(), 1200.0);
        assert_eq!(normalize_digits("  ۰۹ "), "09");
    }

    #[test]
    fn rejects_non_numeric_text() {
        assert_matches!(parse_numeric("abc"), Err(KpiError::InvalidNumericInput { .. }));
        assert_matches!(parse_numeric(""), Err(KpiError::InvalidNumericInput { .. }));
        assert_matches!(parse_numeric("%"), Err(KpiError::InvalidNumericInput { .. }));
        assert_matches!(parse_numeric("12 apples"), Err(KpiError::InvalidNumericInput { .. }));
        assert_matches!(parse_numeric("7%%"), Err(KpiError::InvalidNumericInput { .. }));
    }

    #[test]
    fn rejects_non_finite_values() {
        assert_matches!(parse_numeric("inf"), Err(KpiError::InvalidNumericInput { .. }));
        assert_matches!(parse_numeric("NaN"), Err(KpiError::InvalidNumericInput { .. }));
    }

    #[test]
    fn error_keeps_the_original_text() {
        let err = parse_numeric("۱۲x").unwrap_err();
        assert_matches!(err, KpiError::InvalidNumericInput { input } if input == "۱۲x");
    }

    #[test]
    fn positive_number_predicate() {
        assert!(is_positive_number("0"));
        assert!(is_positive_number("۵"));
        assert!(is_positive_number("3,000"));
        assert!(!is_positive_number("-1"));
        assert!(!is_positive_number("n/a"));
    }
}
