// Core data model for statement ingestion
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type CompanyId = i64;
pub type FiscalPeriodId = i64;

/// Uploaded file content. Dropped once extraction is done.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl RawDocument {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Credit,
    Debit,
    ServiceFee,
}

/// A transaction as recognised by a format parser, before any ledger context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedTransaction {
    pub date: NaiveDate,
    pub description: String,
    /// Always non-negative; direction lives in `kind`.
    pub amount: Decimal,
    pub balance: Option<Decimal>,
    pub kind: TransactionKind,
    pub service_fee: bool,
}

impl ParsedTransaction {
    pub fn is_credit(&self) -> bool {
        self.kind == TransactionKind::Credit
    }
}

/// A company's reporting period, inclusive on both ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalPeriod {
    pub id: FiscalPeriodId,
    pub company_id: CompanyId,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl FiscalPeriod {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

/// Persisted shape of a bank transaction. Exactly one of `debit`/`credit`
/// is non-zero for a valid record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub company_id: CompanyId,
    pub fiscal_period_id: Option<FiscalPeriodId>,
    pub date: NaiveDate,
    pub description: String,
    pub debit: Decimal,
    pub credit: Decimal,
    pub balance: Option<Decimal>,
    pub service_fee: bool,
    pub source_file: String,
}

impl TransactionRecord {
    pub fn from_parsed(
        parsed: &ParsedTransaction,
        company_id: CompanyId,
        fiscal_period_id: Option<FiscalPeriodId>,
        source_file: &str,
    ) -> Self {
        let (debit, credit) = if parsed.is_credit() {
            (Decimal::ZERO, parsed.amount)
        } else {
            (parsed.amount, Decimal::ZERO)
        };
        Self {
            company_id,
            fiscal_period_id,
            date: parsed.date,
            description: parsed.description.clone(),
            debit,
            credit,
            balance: parsed.balance,
            service_fee: parsed.service_fee,
            source_file: source_file.to_string(),
        }
    }

    /// Signed amount: credits positive, debits negative.
    pub fn net_amount(&self) -> Decimal {
        self.credit - self.debit
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionReason {
    Duplicate,
    OutOfPeriod,
    ValidationError,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedTransaction {
    pub record: TransactionRecord,
    pub reason: RejectionReason,
    pub detail: String,
}

/// Date range printed on a bank statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl StatementPeriod {
    pub fn overlaps(&self, period: &FiscalPeriod) -> bool {
        self.end >= period.start_date && self.start <= period.end_date
    }
}

/// Which strategy produced the final line set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStrategy {
    TextLayer,
    Reconstructed,
    Ocr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineError {
    pub line_number: usize,
    pub line: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub accepted: usize,
    pub duplicates: usize,
    pub out_of_period: usize,
    pub invalid: usize,
    pub parser_errors: usize,
}

impl OutcomeCounts {
    pub fn record(&mut self, reason: RejectionReason) {
        match reason {
            RejectionReason::Duplicate => self.duplicates += 1,
            RejectionReason::OutOfPeriod => self.out_of_period += 1,
            RejectionReason::ValidationError => self.invalid += 1,
        }
    }

    pub fn total_transactions(&self) -> usize {
        self.accepted + self.duplicates + self.out_of_period + self.invalid
    }
}

/// Everything one upload produced, returned to the calling layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub source_file: String,
    pub accepted: Vec<TransactionRecord>,
    pub rejected: Vec<RejectedTransaction>,
    pub counts: OutcomeCounts,
    pub errors: Vec<LineError>,
    pub raw_lines: Vec<String>,
    pub extraction_strategy: ExtractionStrategy,
    pub ocr_truncated: bool,
    pub account_number: Option<String>,
    pub statement_period_raw: Option<String>,
    pub statement_period_start: Option<NaiveDate>,
    pub statement_period_end: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn period() -> FiscalPeriod {
        FiscalPeriod {
            id: 1,
            company_id: 1,
            name: "FY2024".to_string(),
            start_date: date(2024, 3, 1),
            end_date: date(2025, 2, 28),
        }
    }

    #[test]
    fn test_fiscal_period_contains_is_inclusive() {
        let p = period();
        assert!(p.contains(date(2024, 3, 1)));
        assert!(p.contains(date(2025, 2, 28)));
        assert!(!p.contains(date(2024, 2, 29)));
        assert!(!p.contains(date(2025, 3, 1)));
    }

    #[test]
    fn test_record_from_parsed_sets_one_side() {
        let parsed = ParsedTransaction {
            date: date(2024, 4, 2),
            description: "Salary".to_string(),
            amount: Decimal::new(150000, 2),
            balance: None,
            kind: TransactionKind::Credit,
            service_fee: false,
        };
        let record = TransactionRecord::from_parsed(&parsed, 7, Some(1), "april.pdf");
        assert_eq!(record.credit, Decimal::new(150000, 2));
        assert_eq!(record.debit, Decimal::ZERO);
        assert_eq!(record.net_amount(), Decimal::new(150000, 2));
    }

    #[test]
    fn test_statement_period_overlap() {
        let p = period();
        let inside = StatementPeriod { start: date(2024, 2, 16), end: date(2024, 3, 18) };
        let before = StatementPeriod { start: date(2024, 1, 1), end: date(2024, 2, 29) };
        assert!(inside.overlaps(&p));
        assert!(!before.overlaps(&p));
    }
}
