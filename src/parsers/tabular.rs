// Multi-line tabular layout: date, description, amount, balance columns
use chrono::NaiveDate;
use tracing::debug;

use super::amount::{classify, split_trailing_amounts, Amount};
use super::short_date::starts_with_short_date;
use super::{ParsingContext, StatefulParser};
use crate::error::ParserError;
use crate::patterns;
use crate::pdf_extraction::reconstruct::{is_boilerplate, is_column_header};
use crate::types::{ParsedTransaction, TransactionKind};

const NAME: &str = "tabular";

/// A row whose columns may wrap onto following lines.
#[derive(Debug, Clone, PartialEq)]
struct PendingRow {
    date: NaiveDate,
    description: String,
    amounts: Vec<Amount>,
}

impl PendingRow {
    fn is_complete(&self) -> bool {
        !self.amounts.is_empty()
    }

    fn append_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if !self.description.is_empty() {
            self.description.push(' ');
        }
        self.description.push_str(text);
    }

    fn into_transaction(self) -> Option<ParsedTransaction> {
        let amount = *self.amounts.first()?;
        let kind = classify(&self.description, &amount);
        Some(ParsedTransaction {
            date: self.date,
            balance: self.amounts.get(1).map(Amount::signed),
            amount: amount.value,
            service_fee: kind == TransactionKind::ServiceFee,
            kind,
            description: self.description,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
enum State {
    #[default]
    Idle,
    Accumulating(PendingRow),
    Flushed,
}

/// Stateful parser for statements printed as a date-led table. A row starts
/// on a line beginning with a full date; wrapped description text and an
/// amount column on a later line are folded into it. A row is emitted when
/// the next row starts or at end of input.
#[derive(Debug, Default)]
pub struct TabularParser {
    state: State,
}

impl TabularParser {
    pub fn new() -> Self {
        Self::default()
    }

    fn start_row(line: &str) -> Result<PendingRow, ParserError> {
        let date_text = patterns::leading_date(line)
            .ok_or_else(|| ParserError::new(NAME, line, "missing date"))?;
        let date = patterns::parse_date(date_text)
            .ok_or_else(|| ParserError::new(NAME, line, format!("invalid date {:?}", date_text)))?;

        let rest = patterns::DATE_PREFIX.replace(line, "");
        let (description, amounts) = split_trailing_amounts(&rest);
        Ok(PendingRow {
            date,
            description,
            amounts,
        })
    }
}

impl StatefulParser for TabularParser {
    fn name(&self) -> &'static str {
        NAME
    }

    fn can_parse(&self, line: &str, _context: &ParsingContext) -> bool {
        if is_boilerplate(line) || is_column_header(line) {
            return false;
        }
        if patterns::starts_with_date(line) {
            return true;
        }
        match &self.state {
            State::Accumulating(row) => {
                // A complete row only takes more description; a new amount
                // belongs to some other layout.
                !starts_with_short_date(line)
                    && !(row.is_complete() && patterns::count_amounts(line) > 0)
            }
            State::Idle | State::Flushed => false,
        }
    }

    fn parse(
        &mut self,
        line: &str,
        _context: &ParsingContext,
    ) -> Result<Option<ParsedTransaction>, ParserError> {
        if patterns::starts_with_date(line) {
            let row = Self::start_row(line)?;
            let previous = std::mem::replace(&mut self.state, State::Accumulating(row));
            return Ok(match previous {
                State::Accumulating(previous) => emit(previous),
                State::Idle | State::Flushed => None,
            });
        }

        let State::Accumulating(row) = &mut self.state else {
            return Err(ParserError::new(NAME, line, "continuation line without a row"));
        };
        let (text, amounts) = split_trailing_amounts(line);
        row.append_text(&text);
        if !row.is_complete() {
            row.amounts = amounts;
        }
        Ok(None)
    }

    fn finalize_parsing(&mut self) -> Option<ParsedTransaction> {
        match std::mem::replace(&mut self.state, State::Flushed) {
            State::Accumulating(row) => emit(row),
            State::Idle | State::Flushed => None,
        }
    }

    fn reset(&mut self) {
        self.state = State::Idle;
    }
}

/// A dated row that never received an amount is a heading, not a transaction.
fn emit(row: PendingRow) -> Option<ParsedTransaction> {
    if !row.is_complete() {
        debug!("dropping dated row without amount: {:?}", row.description);
    }
    row.into_transaction()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn ctx() -> ParsingContext {
        ParsingContext::with_statement_date(
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
            "feb.pdf",
        )
    }

    fn feed(parser: &mut TabularParser, lines: &[&str]) -> Vec<ParsedTransaction> {
        let ctx = ctx();
        let mut out = Vec::new();
        for line in lines {
            assert!(parser.can_parse(line, &ctx), "should claim {:?}", line);
            out.extend(parser.parse(line, &ctx).unwrap());
        }
        out.extend(parser.finalize_parsing());
        out
    }

    #[test]
    fn test_single_line_row() {
        let mut parser = TabularParser::new();
        let out = feed(&mut parser, &["01/02/2024 Payment to ABC 100.00 500.00"]);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].date, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(out[0].description, "Payment to ABC");
        assert_eq!(out[0].amount, Decimal::new(10000, 2));
        assert_eq!(out[0].balance, Some(Decimal::new(50000, 2)));
        assert_eq!(out[0].kind, TransactionKind::Debit);
    }

    #[test]
    fn test_amount_on_following_line() {
        let mut parser = TabularParser::new();
        let out = feed(
            &mut parser,
            &["03/02/2024 Transfer from", "J Smith savings", "2,000.00 2,500.00"],
        );

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].description, "Transfer from J Smith savings");
        assert_eq!(out[0].kind, TransactionKind::Credit);
        assert_eq!(out[0].amount, Decimal::new(200000, 2));
    }

    #[test]
    fn test_row_is_held_until_next_row() {
        let mut parser = TabularParser::new();
        let ctx = ctx();
        assert_eq!(parser.parse("01/02/2024 Fuel 450.00 1,000.00", &ctx).unwrap(), None);
        let emitted = parser.parse("02/02/2024 Bank charges 35.00 965.00", &ctx).unwrap();
        assert_eq!(emitted.map(|t| t.description), Some("Fuel".to_string()));

        let last = parser.finalize_parsing().unwrap();
        assert!(last.service_fee);
        assert_eq!(last.kind, TransactionKind::ServiceFee);
    }

    #[test]
    fn test_complete_row_does_not_claim_new_amounts() {
        let mut parser = TabularParser::new();
        let ctx = ctx();
        parser.parse("01/02/2024 Fuel 450.00 1,000.00", &ctx).unwrap();
        assert!(!parser.can_parse("Monthly fee 5.00", &ctx));
        assert!(parser.can_parse("Engen Rivonia", &ctx));
    }

    #[test]
    fn test_ignores_boilerplate_and_idle_text() {
        let parser = TabularParser::new();
        let ctx = ctx();
        assert!(!parser.can_parse("01/02/2024 Opening balance 500.00", &ctx));
        assert!(!parser.can_parse("Interest rate 7.5%", &ctx));
    }

    #[test]
    fn test_column_header_is_not_description() {
        let mut parser = TabularParser::new();
        let ctx = ctx();
        parser.parse("01/02/2024 Fuel 450.00 1,000.00", &ctx).unwrap();
        assert!(!parser.can_parse("Date Description Amount Balance", &ctx));
        assert!(!parser.can_parse("Page 2 of 3", &ctx));
    }

    #[test]
    fn test_heading_row_without_amount_is_dropped() {
        let mut parser = TabularParser::new();
        let out = feed(
            &mut parser,
            &["01/02/2024 Transactions", "02/02/2024 Deposit 300.00 800.00"],
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].description, "Deposit");
    }

    #[test]
    fn test_invalid_date_is_an_error_and_keeps_state() {
        let mut parser = TabularParser::new();
        let ctx = ctx();
        parser.parse("01/02/2024 Fuel 450.00 1,000.00", &ctx).unwrap();
        let err = parser.parse("30/02/2024 Bad 1.00 2.00", &ctx).unwrap_err();
        assert_eq!(err.parser, "tabular");
        assert_eq!(parser.finalize_parsing().map(|t| t.description), Some("Fuel".to_string()));
    }

    #[test]
    fn test_reset_returns_to_idle() {
        let mut parser = TabularParser::new();
        let ctx = ctx();
        parser.parse("01/02/2024 Fuel 450.00 1,000.00", &ctx).unwrap();
        parser.reset();
        assert_eq!(parser.finalize_parsing(), None);
        assert!(!parser.can_parse("Engen Rivonia", &ctx));
    }
}
