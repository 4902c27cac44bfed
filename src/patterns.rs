// Shared text patterns for dates and amounts on bank statements
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

/// A full date at the start of a line: day/month/year with slashes,
/// "16 February 2024", or ISO.
pub static DATE_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(\d{1,2}/\d{1,2}/(?:\d{4}|\d{2})|\d{1,2}\s+[a-z]{3,9}\.?,?\s+\d{4}|\d{4}-\d{1,2}-\d{1,2})\b",
    )
    .expect("date prefix regex")
});

/// Any amount with two decimals.
pub static AMOUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+\.\d{2}").expect("amount regex"));

/// Amount occurrences as they appear in statement columns, e.g. `1,250.00-`.
pub static AMOUNT_OCCURRENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\d,]*\d\.\d{2}-?").expect("amount occurrence regex"));

/// A fragment that consists of nothing but an amount column.
pub static AMOUNT_FRAGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\d,]+\.\d{2}-?$").expect("amount fragment regex"));

/// Text that ends with an amount column.
pub static TRAILING_AMOUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\d,]+\.\d{2}-?$").expect("trailing amount regex"));

static SHORT_YEAR_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,2}/\d{1,2}/\d{2}$").expect("short year regex"));

const DATE_FORMATS: &[&str] = &[
    "%d/%m/%Y", "%d %B %Y", "%d %b %Y", "%Y-%m-%d", "%d-%m-%Y", "%Y/%m/%d",
];

/// Returns the date text at the start of `line`, if any.
pub fn leading_date(line: &str) -> Option<&str> {
    DATE_PREFIX
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

pub fn starts_with_date(line: &str) -> bool {
    DATE_PREFIX.is_match(line)
}

/// Parse a day-first date in any of the layouts bank statements use.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let cleaned = text.trim().trim_end_matches(',').replace(['.', ','], "");
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if SHORT_YEAR_DATE.is_match(&cleaned) {
        return NaiveDate::parse_from_str(&cleaned, "%d/%m/%y").ok();
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(&cleaned, format).ok())
}

/// Number of amount columns present in `text`.
pub fn count_amounts(text: &str) -> usize {
    AMOUNT_OCCURRENCE.find_iter(text).count()
}

pub fn ends_with_amount(text: &str) -> bool {
    TRAILING_AMOUNT.is_match(text.trim_end())
}

/// True when `word` occurs in `haystack` as a whole word, ignoring case.
/// `haystack` must already be lowercase.
pub fn contains_word(haystack: &str, word: &str) -> bool {
    haystack
        .split(|c: char| !c.is_alphanumeric())
        .any(|token| token == word)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("01/02/2024 Payment", Some("01/02/2024"))]
    #[case("16 February 2024 Opening", Some("16 February 2024"))]
    #[case("2024-03-18 Deposit", Some("2024-03-18"))]
    #[case("Payment 01/02/2024", None)]
    #[case("16 Feb Payment", None)]
    fn test_leading_date(#[case] line: &str, #[case] expected: Option<&str>) {
        assert_eq!(leading_date(line), expected);
    }

    #[rstest]
    #[case("01/02/2024", 2024, 2, 1)]
    #[case("1/2/24", 2024, 2, 1)]
    #[case("16 February 2024", 2024, 2, 16)]
    #[case("16 Feb 2024", 2024, 2, 16)]
    #[case("2024-03-18", 2024, 3, 18)]
    #[case("18-3-2024", 2024, 3, 18)]
    fn test_parse_date(#[case] text: &str, #[case] y: i32, #[case] m: u32, #[case] d: u32) {
        assert_eq!(parse_date(text), NaiveDate::from_ymd_opt(y, m, d));
    }

    #[test]
    fn test_count_amounts_ignores_dates() {
        assert_eq!(count_amounts("01/02/2024 Payment to ABC 100.00 1,500.00"), 2);
        assert_eq!(count_amounts("01/02/2024 Payment to ABC"), 0);
    }

    #[test]
    fn test_contains_word_is_whole_word() {
        assert!(contains_word("atm withdrawal", "atm"));
        assert!(!contains_word("batman", "atm"));
    }
}
