// Bank statement layout parsers and the chain that dispatches lines to them
pub mod amount;
pub mod service_fee;
pub mod short_date;
pub mod tabular;

use chrono::{Datelike, Local, NaiveDate};
use tracing::{debug, warn};

use crate::error::ParserError;
use crate::pdf_extraction::reconstruct::{is_boilerplate, is_column_header};
use crate::types::{ParsedTransaction, StatementPeriod};

pub use service_fee::ServiceFeeParser;
pub use short_date::ShortDateParser;
pub use tabular::TabularParser;

/// Per-document facts every parser may need. Built once, shared by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsingContext {
    /// End of the statement period, used to date undated rows and to
    /// supply the year for rows printed without one.
    pub statement_date: NaiveDate,
    pub source: String,
}

impl ParsingContext {
    pub const FALLBACK_MONTH: u32 = 6;
    pub const FALLBACK_DAY: u32 = 30;

    pub fn new(period: Option<&StatementPeriod>, source: impl Into<String>) -> Self {
        let statement_date = match period {
            Some(period) => period.end,
            None => Self::fallback_date(Local::now().year()),
        };
        Self::with_statement_date(statement_date, source)
    }

    pub fn with_statement_date(statement_date: NaiveDate, source: impl Into<String>) -> Self {
        Self {
            statement_date,
            source: source.into(),
        }
    }

    /// Mid-year date used when the statement period is unknown.
    pub fn fallback_date(year: i32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, Self::FALLBACK_MONTH, Self::FALLBACK_DAY).unwrap_or_default()
    }
}

/// A single-line layout recogniser.
pub trait FormatParser {
    fn name(&self) -> &'static str;

    fn can_parse(&self, line: &str, context: &ParsingContext) -> bool;

    fn parse(
        &self,
        line: &str,
        context: &ParsingContext,
    ) -> Result<Option<ParsedTransaction>, ParserError>;
}

/// A layout that may build one transaction from several physical lines.
/// `parse` returning `Ok(None)` means the line was absorbed.
pub trait StatefulParser {
    fn name(&self) -> &'static str;

    fn can_parse(&self, line: &str, context: &ParsingContext) -> bool;

    fn parse(
        &mut self,
        line: &str,
        context: &ParsingContext,
    ) -> Result<Option<ParsedTransaction>, ParserError>;

    /// Emit a transaction still being assembled at end of input.
    fn finalize_parsing(&mut self) -> Option<ParsedTransaction>;

    fn reset(&mut self);
}

/// Transactions and line failures from one pass over a document.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ParseOutcome {
    pub transactions: Vec<ParsedTransaction>,
    pub errors: Vec<ParserError>,
}

/// Ordered parsers for one document. The stateful layout parser always
/// gets the first look at a line; the rest are tried in registration order.
pub struct ParserChain {
    layout: Box<dyn StatefulParser>,
    parsers: Vec<Box<dyn FormatParser>>,
}

impl Default for ParserChain {
    fn default() -> Self {
        Self::new(
            Box::new(TabularParser::new()),
            vec![Box::new(ServiceFeeParser), Box::new(ShortDateParser)],
        )
    }
}

impl ParserChain {
    pub fn new(layout: Box<dyn StatefulParser>, parsers: Vec<Box<dyn FormatParser>>) -> Self {
        Self { layout, parsers }
    }

    /// Parse every line. A failing line is recorded and skipped; it never
    /// stops the rest of the document.
    pub fn run<S: AsRef<str>>(mut self, lines: &[S], context: &ParsingContext) -> ParseOutcome {
        let mut outcome = lines
            .iter()
            .map(|line| line.as_ref().trim())
            .enumerate()
            .filter(|(_, line)| !line.is_empty())
            .fold(ParseOutcome::default(), |mut outcome, (index, line)| {
                let (transactions, error) = self.dispatch(line, context);
                outcome.transactions.extend(transactions);
                if let Some(error) = error {
                    let error = error.at_line(index + 1);
                    warn!("{}: skipping {}", context.source, error);
                    outcome.errors.push(error);
                }
                outcome
            });

        outcome.transactions.extend(self.layout.finalize_parsing());
        self.layout.reset();
        debug!(
            transactions = outcome.transactions.len(),
            errors = outcome.errors.len(),
            "parsed {}",
            context.source
        );
        outcome
    }

    fn dispatch(
        &mut self,
        line: &str,
        context: &ParsingContext,
    ) -> (Vec<ParsedTransaction>, Option<ParserError>) {
        let mut layout_error = None;
        let mut transactions = Vec::new();
        if self.layout.can_parse(line, context) {
            match self.layout.parse(line, context) {
                Ok(parsed) => return (parsed.into_iter().collect(), None),
                Err(e) => layout_error = Some(e),
            }
        } else if is_boilerplate(line) || is_column_header(line) {
            // Page furniture closes the row being assembled; text after it
            // is not part of that row.
            transactions.extend(self.layout.finalize_parsing());
        }

        let Some(parser) = self.parsers.iter().find(|p| p.can_parse(line, context)) else {
            return (transactions, layout_error);
        };

        // Whatever the layout parser holds precedes this line.
        transactions.extend(self.layout.finalize_parsing());
        match parser.parse(line, context) {
            Ok(parsed) => {
                transactions.extend(parsed);
                (transactions, None)
            }
            Err(e) => (transactions, Some(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransactionKind;
    use rust_decimal::Decimal;

    fn context() -> ParsingContext {
        ParsingContext::with_statement_date(
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            "march.pdf",
        )
    }

    #[test]
    fn test_fallback_statement_date_is_mid_year() {
        let ctx = ParsingContext::new(None, "x.pdf");
        assert_eq!(ctx.statement_date.month(), 6);
        assert_eq!(ctx.statement_date.day(), 30);
        assert_eq!(ctx.statement_date.year(), Local::now().year());
    }

    #[test]
    fn test_statement_period_end_is_statement_date() {
        let period = StatementPeriod {
            start: NaiveDate::from_ymd_opt(2024, 2, 16).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 3, 18).unwrap(),
        };
        let ctx = ParsingContext::new(Some(&period), "x.pdf");
        assert_eq!(ctx.statement_date, period.end);
    }

    #[test]
    fn test_mixed_layouts_keep_document_order() {
        let lines = [
            "Statement Period: 1 March 2024 to 31 March 2024",
            "01/03/2024 Salary ACME Ltd 15,000.00 15,500.00",
            "Monthly service fee 65.00",
            "02/03/2024 Card purchase",
            "Woolworths Sandton",
            "350.25 15,084.75",
            "05 Mar ATM withdrawal 500.00 14,584.75",
        ];
        let outcome = ParserChain::default().run(&lines, &context());

        assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
        let descriptions: Vec<&str> = outcome
            .transactions
            .iter()
            .map(|t| t.description.as_str())
            .collect();
        assert_eq!(
            descriptions,
            vec![
                "Salary ACME Ltd",
                "Monthly service fee",
                "Card purchase Woolworths Sandton",
                "ATM withdrawal",
            ]
        );
        assert_eq!(outcome.transactions[0].kind, TransactionKind::Credit);
        assert_eq!(outcome.transactions[1].kind, TransactionKind::ServiceFee);
        assert_eq!(outcome.transactions[2].amount, Decimal::new(35025, 2));
        assert_eq!(
            outcome.transactions[3].date,
            NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
        );
    }

    #[test]
    fn test_bad_line_is_recorded_and_skipped() {
        let lines = [
            "31/02/2024 Impossible date 10.00 100.00",
            "01/03/2024 Payment to ABC 100.00 500.00",
        ];
        let outcome = ParserChain::default().run(&lines, &context());

        assert_eq!(outcome.transactions.len(), 1);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].line_number, 1);
        assert_eq!(outcome.errors[0].parser, "tabular");
    }

    #[test]
    fn test_page_furniture_closes_the_pending_row() {
        let lines = [
            "01/03/2024 Payment to ABC 100.00 500.00",
            "Date Description Amount Balance",
            "02/03/2024 Payment to XYZ 50.00 450.00",
            "Closing balance 450.00",
            "Thank you for banking with us",
        ];
        let outcome = ParserChain::default().run(&lines, &context());

        assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
        let descriptions: Vec<&str> = outcome
            .transactions
            .iter()
            .map(|t| t.description.as_str())
            .collect();
        assert_eq!(descriptions, vec!["Payment to ABC", "Payment to XYZ"]);
    }

    #[test]
    fn test_trailing_transaction_is_flushed_at_end() {
        let lines = ["01/03/2024 Payment to ABC 100.00 500.00", "Reference INV-22"];
        let outcome = ParserChain::default().run(&lines, &context());

        assert_eq!(outcome.transactions.len(), 1);
        assert_eq!(outcome.transactions[0].description, "Payment to ABC Reference INV-22");
    }
}
