// Undated bank charge rows
use super::amount::{is_fee, split_trailing_amounts, Amount};
use super::{FormatParser, ParsingContext};
use crate::error::ParserError;
use crate::patterns;
use crate::types::{ParsedTransaction, TransactionKind};

const NAME: &str = "service_fee";

/// Fee summary rows such as `Monthly service fee 65.00`, printed without a
/// date. They are booked on the statement date and are always debits.
#[derive(Debug, Default, Clone, Copy)]
pub struct ServiceFeeParser;

impl FormatParser for ServiceFeeParser {
    fn name(&self) -> &'static str {
        NAME
    }

    fn can_parse(&self, line: &str, _context: &ParsingContext) -> bool {
        !patterns::starts_with_date(line) && is_fee(line) && patterns::ends_with_amount(line)
    }

    fn parse(
        &self,
        line: &str,
        context: &ParsingContext,
    ) -> Result<Option<ParsedTransaction>, ParserError> {
        let (description, amounts) = split_trailing_amounts(line);
        let amount = amounts
            .first()
            .ok_or_else(|| ParserError::new(NAME, line, "missing fee amount"))?;
        if description.is_empty() {
            return Err(ParserError::new(NAME, line, "missing fee description"));
        }
        Ok(Some(ParsedTransaction {
            date: context.statement_date,
            description,
            amount: amount.value,
            balance: amounts.get(1).map(Amount::signed),
            kind: TransactionKind::ServiceFee,
            service_fee: true,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn ctx() -> ParsingContext {
        ParsingContext::with_statement_date(NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(), "s.pdf")
    }

    #[test]
    fn test_fee_row_is_dated_on_statement_date() {
        let tx = ServiceFeeParser
            .parse("Monthly service fee 65.00", &ctx())
            .unwrap()
            .unwrap();
        assert_eq!(tx.date, NaiveDate::from_ymd_opt(2024, 3, 31).unwrap());
        assert_eq!(tx.amount, Decimal::new(6500, 2));
        assert!(tx.service_fee);
        assert_eq!(tx.kind, TransactionKind::ServiceFee);
    }

    #[test]
    fn test_signed_fee_is_still_a_debit_amount() {
        let tx = ServiceFeeParser
            .parse("Bank charges 12.50- 987.50", &ctx())
            .unwrap()
            .unwrap();
        assert_eq!(tx.amount, Decimal::new(1250, 2));
        assert_eq!(tx.balance, Some(Decimal::new(98750, 2)));
    }

    #[test]
    fn test_only_claims_undated_fee_rows() {
        let ctx = ctx();
        assert!(ServiceFeeParser.can_parse("Admin fee 5.00", &ctx));
        assert!(!ServiceFeeParser.can_parse("01/03/2024 Admin fee 5.00", &ctx));
        assert!(!ServiceFeeParser.can_parse("Card purchase 5.00", &ctx));
        assert!(!ServiceFeeParser.can_parse("Service fee waived", &ctx));
    }
}
