// Rows dated "16 Feb" with the year left to the statement
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

use super::amount::{classify, split_trailing_amounts, Amount};
use super::{FormatParser, ParsingContext};
use crate::error::ParserError;
use crate::patterns;
use crate::types::{ParsedTransaction, TransactionKind};

const NAME: &str = "short_date";

static SHORT_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(\d{1,2})\s+(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+(.+)$")
        .expect("short date regex")
});

/// True for a line led by a day and month with no year.
pub fn starts_with_short_date(line: &str) -> bool {
    SHORT_DATE.is_match(line) && !patterns::starts_with_date(line)
}

fn month_number(abbrev: &str) -> Option<u32> {
    let month = match abbrev.to_ascii_lowercase().as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// `DD Mon DESCRIPTION AMOUNT [BALANCE]` on one line.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShortDateParser;

impl FormatParser for ShortDateParser {
    fn name(&self) -> &'static str {
        NAME
    }

    fn can_parse(&self, line: &str, _context: &ParsingContext) -> bool {
        starts_with_short_date(line) && patterns::ends_with_amount(line)
    }

    fn parse(
        &self,
        line: &str,
        context: &ParsingContext,
    ) -> Result<Option<ParsedTransaction>, ParserError> {
        let caps = SHORT_DATE
            .captures(line)
            .ok_or_else(|| ParserError::new(NAME, line, "missing day and month"))?;
        let day: u32 = caps[1]
            .parse()
            .map_err(|_| ParserError::new(NAME, line, "bad day"))?;
        let month = month_number(&caps[2])
            .ok_or_else(|| ParserError::new(NAME, line, "bad month"))?;

        // A December row on a January statement belongs to the previous year.
        let statement = context.statement_date;
        let year = if month > statement.month() {
            statement.year() - 1
        } else {
            statement.year()
        };
        let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
            ParserError::new(NAME, line, format!("no such date {} {} {}", day, &caps[2], year))
        })?;

        let (description, amounts) = split_trailing_amounts(&caps[3]);
        let amount = amounts
            .first()
            .copied()
            .ok_or_else(|| ParserError::new(NAME, line, "missing amount"))?;
        let kind = classify(&description, &amount);
        Ok(Some(ParsedTransaction {
            date,
            balance: amounts.get(1).map(Amount::signed),
            amount: amount.value,
            service_fee: kind == TransactionKind::ServiceFee,
            kind,
            description,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn ctx(year: i32, month: u32, day: u32) -> ParsingContext {
        ParsingContext::with_statement_date(NaiveDate::from_ymd_opt(year, month, day).unwrap(), "s.pdf")
    }

    #[rstest]
    #[case("16 Feb POS purchase Checkers 245.90 1,754.10", true)]
    #[case("3 March Salary 12,000.00", true)]
    #[case("16 Feb 2024 POS purchase 245.90", false)]
    #[case("16 Feb POS purchase pending", false)]
    #[case("Feb 16 POS purchase 245.90", false)]
    fn test_can_parse(#[case] line: &str, #[case] expected: bool) {
        assert_eq!(ShortDateParser.can_parse(line, &ctx(2024, 3, 31)), expected);
    }

    #[test]
    fn test_year_comes_from_statement() {
        let tx = ShortDateParser
            .parse("16 Feb POS purchase Checkers 245.90 1,754.10", &ctx(2024, 3, 31))
            .unwrap()
            .unwrap();
        assert_eq!(tx.date, NaiveDate::from_ymd_opt(2024, 2, 16).unwrap());
        assert_eq!(tx.description, "POS purchase Checkers");
        assert_eq!(tx.kind, TransactionKind::Debit);
    }

    #[test]
    fn test_later_month_rolls_back_a_year() {
        let tx = ShortDateParser
            .parse("28 Dec Interest 12.40", &ctx(2024, 1, 31))
            .unwrap()
            .unwrap();
        assert_eq!(tx.date, NaiveDate::from_ymd_opt(2023, 12, 28).unwrap());
        assert_eq!(tx.kind, TransactionKind::Credit);
    }

    #[test]
    fn test_impossible_day_is_an_error() {
        let err = ShortDateParser
            .parse("31 Apr Transfer 10.00", &ctx(2024, 5, 31))
            .unwrap_err();
        assert_eq!(err.parser, "short_date");
    }
}
