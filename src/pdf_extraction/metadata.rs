// Account number and statement period captured while lines stream past
use once_cell::sync::Lazy;
use regex::Regex;

use crate::patterns;

static ACCOUNT_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\baccount\s*(?:number|no\.?|#)\s*[:.]?\s*(\d[\d\s-]{4,}\d)")
        .expect("account number regex")
});

/// The label must open the line, so a transaction mentioning a period is not
/// mistaken for the header.
static PERIOD_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\W*(?:statement\s+)?period\b\s*[:.]?\s*(.+)$").expect("period label regex")
});

static DATE_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(\d{1,2}[ /-](?:\d{1,2}|[a-z]{3,9})[ /-]\d{4}|\d{4}-\d{1,2}-\d{1,2})\s*(?:to|until|–|—|-)\s*(\d{1,2}[ /-](?:\d{1,2}|[a-z]{3,9})[ /-]\d{4}|\d{4}-\d{1,2}-\d{1,2})",
    )
    .expect("date range regex")
});

/// Per-document accumulator. First match per field wins and is never
/// overwritten. Lives only as long as one `parse_document` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataAccumulator {
    account_number: Option<String>,
    statement_period: Option<String>,
}

impl MetadataAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, line: &str) {
        if self.account_number.is_none() {
            if let Some(caps) = ACCOUNT_NUMBER.captures(line) {
                let digits: String = caps[1].chars().filter(|c| c.is_ascii_digit()).collect();
                if digits.len() >= 6 {
                    self.account_number = Some(digits);
                }
            }
        }
        if self.statement_period.is_none() {
            self.statement_period = capture_period(line);
        }
    }

    pub fn observe_all<S: AsRef<str>>(&mut self, lines: &[S]) {
        for line in lines {
            self.observe(line.as_ref());
        }
    }

    pub fn account_number(&self) -> Option<&str> {
        self.account_number.as_deref()
    }

    pub fn statement_period(&self) -> Option<&str> {
        self.statement_period.as_deref()
    }

    pub fn into_parts(self) -> (Option<String>, Option<String>) {
        (self.account_number, self.statement_period)
    }
}

fn capture_period(line: &str) -> Option<String> {
    if let Some(caps) = PERIOD_LABEL.captures(line) {
        let rest = caps[1].trim();
        if rest.chars().any(|c| c.is_ascii_digit()) {
            return Some(rest.to_string());
        }
    }
    // Unlabelled headers: a line that is just two dates joined by a separator.
    if patterns::starts_with_date(line) {
        if let Some(m) = DATE_RANGE.find(line) {
            if patterns::count_amounts(line) == 0 {
                return Some(m.as_str().to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_captures_account_number_without_separators() {
        let mut meta = MetadataAccumulator::new();
        meta.observe("Account Number: 6234 5678 901");
        assert_eq!(meta.account_number(), Some("62345678901"));
    }

    #[test]
    fn test_first_match_wins() {
        let mut meta = MetadataAccumulator::new();
        meta.observe_all(&[
            "Statement Period: 16 February 2024 to 18 March 2024",
            "Account No. 111111",
            "Period: 1 January 2023 to 31 January 2023",
            "Account No. 222222",
        ]);
        assert_eq!(meta.account_number(), Some("111111"));
        assert_eq!(meta.statement_period(), Some("16 February 2024 to 18 March 2024"));
    }

    #[test]
    fn test_period_inside_transaction_line_is_not_a_label() {
        let mut meta = MetadataAccumulator::new();
        meta.observe("Interest period adj 12.50");
        assert_eq!(meta.statement_period(), None);
        meta.observe("Statement Period: 1 March 2024 to 31 March 2024");
        assert_eq!(meta.statement_period(), Some("1 March 2024 to 31 March 2024"));
    }

    #[test]
    fn test_unlabelled_date_range() {
        let mut meta = MetadataAccumulator::new();
        meta.observe("01/02/2024 Payment to ABC 100.00 500.00");
        assert_eq!(meta.statement_period(), None);
        meta.observe("16/02/2024 to 18/03/2024");
        assert_eq!(meta.statement_period(), Some("16/02/2024 to 18/03/2024"));
    }

    #[test]
    fn test_short_numbers_are_not_accounts() {
        let mut meta = MetadataAccumulator::new();
        meta.observe("Account # 12");
        assert_eq!(meta.account_number(), None);
    }
}
