//! Parse the free-text statement period printed on a bank statement,
//! e.g. `16 February 2024 to 18 March 2024`.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::StatementPeriod;

static RANGE_SEPARATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*(?:\bto\b|\buntil\b|–|—|\s-\s)\s*").expect("range separator regex")
});

static NAMED_MONTH_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(\d{1,2}\s+[a-z]{3,9}\.?,?\s+\d{4})\s+to\s+(\d{1,2}\s+[a-z]{3,9}\.?,?\s+\d{4})",
    )
    .expect("named month range regex")
});

static NUMERIC_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(\d{1,2}[/-]\d{1,2}[/-]\d{4}|\d{4}[/-]\d{1,2}[/-]\d{1,2})\s+to\s+(\d{1,2}[/-]\d{1,2}[/-]\d{4}|\d{4}[/-]\d{1,2}[/-]\d{1,2})",
    )
    .expect("numeric range regex")
});

/// Month names that OCR reliably gets wrong on statement headers.
static MONTH_TYPOS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)febuary|novmber").expect("month typo regex"));

const SIDE_FORMATS: &[&str] = &[
    "%d %B %Y", "%d %b %Y", "%d/%m/%Y", "%d-%m-%Y", "%Y-%m-%d", "%Y/%m/%d",
];

/// Returns `None` when no known range layout matches; never panics on noise.
pub fn parse_statement_period(raw: &str) -> Option<StatementPeriod> {
    let normalized = normalize(raw);

    let captures = NAMED_MONTH_RANGE
        .captures(&normalized)
        .or_else(|| NUMERIC_RANGE.captures(&normalized))?;

    let start = parse_side(captures.get(1)?.as_str())?;
    let end = parse_side(captures.get(2)?.as_str())?;
    if end < start {
        return None;
    }
    Some(StatementPeriod { start, end })
}

fn normalize(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            '\u{00A0}' | '\u{2007}' | '\u{202F}' => ' ',
            other => other,
        })
        .collect();
    RANGE_SEPARATOR.replace_all(&replaced, " to ").into_owned()
}

fn parse_side(side: &str) -> Option<NaiveDate> {
    let cleaned: String = side
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '/' | '-'))
        .collect();
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let cleaned = MONTH_TYPOS.replace_all(&cleaned, |caps: &regex::Captures| {
        if caps[0].eq_ignore_ascii_case("febuary") {
            "February"
        } else {
            "November"
        }
    });
    SIDE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(&cleaned, format).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_named_month_range() {
        let period = parse_statement_period("16 February 2024 to 18 March 2024").unwrap();
        assert_eq!(period.start, date(2024, 2, 16));
        assert_eq!(period.end, date(2024, 3, 18));
    }

    #[rstest]
    #[case("Statement Period: 16 Feb 2024 to 18 Mar 2024")]
    #[case("16 february 2024 – 18 march 2024")]
    #[case("16\u{a0}February 2024 TO 18 March 2024")]
    #[case("16 Febuary 2024 to 18 March 2024")]
    #[case("16/02/2024 to 18/03/2024")]
    #[case("2024-02-16 to 2024-03-18")]
    #[case("16-2-2024 until 18-3-2024")]
    #[case("16 FEBUARY 2024 to 18 March 2024")]
    fn test_layouts_parse_to_same_range(#[case] raw: &str) {
        let period = parse_statement_period(raw).unwrap();
        assert_eq!(period.start, date(2024, 2, 16));
        assert_eq!(period.end, date(2024, 3, 18));
    }

    #[rstest]
    #[case("garbage")]
    #[case("")]
    #[case("32 February 2024 to 18 March 2024")]
    #[case("18 March 2024 to 16 February 2024")]
    #[case("16 \u{212A}novmber 2024 to 18 March 2025")]
    #[case("16 Ma\u{0130} 2024 to 18 Ju\u{0130}y 2024")]
    fn test_unparseable_is_absent(#[case] raw: &str) {
        assert_eq!(parse_statement_period(raw), None);
    }
}
