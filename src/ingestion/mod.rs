// Statement ingestion: extraction, parsing, fiscal resolution, classification
pub mod collaborators;
pub mod ledger;

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::IngestConfig;
use crate::error::{IngestError, ParserError, Result};
use crate::parsers::{ParserChain, ParsingContext};
use crate::pdf_extraction::{DocumentExtractor, TimeBudget};
use crate::statement_period::parse_statement_period;
use crate::types::{
    CompanyId, FiscalPeriod, FiscalPeriodId, LineError, OutcomeCounts, ProcessingResult,
    RawDocument, RejectedTransaction, RejectionReason, StatementPeriod, TransactionRecord,
};

pub use collaborators::{
    DuplicateChecker, FieldValidator, FiscalBoundaryValidator, FiscalPeriodLookup,
    TransactionSink, ValidationOutcome,
};
pub use ledger::{InMemoryLedger, LedgerSnapshot, PeriodBoundaryValidator, RequiredFieldsValidator};

/// Who the upload is for and, optionally, which fiscal period it must fall in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestRequest {
    pub company_id: CompanyId,
    pub target_fiscal_period: Option<FiscalPeriodId>,
}

/// Ledger-side collaborators for one ingestor.
#[derive(Clone)]
pub struct LedgerServices {
    pub duplicates: Arc<dyn DuplicateChecker>,
    pub boundary: Arc<dyn FiscalBoundaryValidator>,
    pub fields: Arc<dyn FieldValidator>,
    pub periods: Arc<dyn FiscalPeriodLookup>,
    pub sink: Arc<dyn TransactionSink>,
}

impl LedgerServices {
    /// One in-memory ledger with the default validators.
    pub fn in_memory(ledger: Arc<InMemoryLedger>) -> Self {
        Self {
            duplicates: ledger.clone(),
            boundary: Arc::new(PeriodBoundaryValidator),
            fields: Arc::new(RequiredFieldsValidator),
            periods: ledger.clone(),
            sink: ledger,
        }
    }
}

pub struct StatementIngestor {
    extractor: DocumentExtractor,
    services: LedgerServices,
}

impl StatementIngestor {
    pub fn new(extractor: DocumentExtractor, services: LedgerServices) -> Self {
        Self {
            extractor,
            services,
        }
    }

    pub fn from_config(config: &IngestConfig, services: LedgerServices) -> Self {
        Self::new(DocumentExtractor::from_config(config), services)
    }

    fn config(&self) -> &IngestConfig {
        self.extractor.config()
    }

    /// Run one upload end to end. Document-level problems abort with an
    /// error; line and transaction problems end up inside the result.
    pub fn process(&self, document: &RawDocument, request: &IngestRequest) -> Result<ProcessingResult> {
        let limit = self.config().max_upload_bytes;
        if document.len() > limit {
            return Err(IngestError::OversizedInput {
                size: document.len(),
                limit,
            });
        }
        let budget = TimeBudget::start(self.config().time_budget());

        let target = match request.target_fiscal_period {
            Some(period_id) => Some(
                self.services
                    .periods
                    .fiscal_period(request.company_id, period_id)
                    .map_err(IngestError::Persistence)?
                    .ok_or(IngestError::UnknownFiscalPeriod {
                        company_id: request.company_id,
                        period_id,
                    })?,
            ),
            None => None,
        };

        let extraction = self.extractor.parse_document_within(document, &budget)?;

        let statement_period = extraction
            .statement_period
            .as_deref()
            .and_then(parse_statement_period);
        if let Some(target) = &target {
            check_statement_against(statement_period, extraction.statement_period.as_deref(), target)?;
        }

        let context = ParsingContext::new(statement_period.as_ref(), document.filename.clone());
        let parsed = ParserChain::default().run(&extraction.lines, &context);

        let periods = self
            .services
            .periods
            .fiscal_periods(request.company_id)
            .map_err(IngestError::Persistence)?;

        let mut counts = OutcomeCounts {
            parser_errors: parsed.errors.len(),
            ..OutcomeCounts::default()
        };
        let mut accepted = Vec::new();
        let mut rejected = Vec::new();
        for transaction in &parsed.transactions {
            let fiscal_period_id = resolve_fiscal_period(&periods, transaction.date);
            if fiscal_period_id.is_none() {
                warn!(
                    "no fiscal period of company {} contains {}",
                    request.company_id, transaction.date
                );
            }
            let record = TransactionRecord::from_parsed(
                transaction,
                request.company_id,
                fiscal_period_id,
                &document.filename,
            );

            match self.classify(&record, target.as_ref()) {
                Some((reason, detail)) => {
                    counts.record(reason);
                    rejected.push(RejectedTransaction {
                        record,
                        reason,
                        detail,
                    });
                }
                None => {
                    self.services
                        .sink
                        .persist(&record)
                        .map_err(IngestError::Persistence)?;
                    counts.accepted += 1;
                    accepted.push(record);
                }
            }
        }

        info!(
            accepted = counts.accepted,
            duplicates = counts.duplicates,
            out_of_period = counts.out_of_period,
            invalid = counts.invalid,
            parser_errors = counts.parser_errors,
            "processed {} in {:?}",
            document.filename,
            budget.elapsed()
        );

        Ok(ProcessingResult {
            source_file: document.filename.clone(),
            accepted,
            rejected,
            counts,
            errors: parsed.errors.into_iter().map(LineError::from).collect(),
            raw_lines: extraction.lines,
            extraction_strategy: extraction.strategy,
            ocr_truncated: extraction.ocr_truncated,
            account_number: extraction.account_number,
            statement_period_raw: extraction.statement_period,
            statement_period_start: statement_period.map(|p| p.start),
            statement_period_end: statement_period.map(|p| p.end),
        })
    }

    /// First matching rejection wins.
    fn classify(
        &self,
        record: &TransactionRecord,
        target: Option<&FiscalPeriod>,
    ) -> Option<(RejectionReason, String)> {
        if let Some(existing) = self.services.duplicates.find_duplicate(record) {
            return Some((
                RejectionReason::Duplicate,
                format!(
                    "already recorded: {} {} from {}",
                    existing.date, existing.description, existing.source_file
                ),
            ));
        }
        if let Some(period) = target {
            if !self.services.boundary.is_within_fiscal_period(record, period) {
                return Some((
                    RejectionReason::OutOfPeriod,
                    self.services.boundary.explain(record, period),
                ));
            }
        }
        let validation = self.services.fields.validate(record);
        if !validation.valid {
            return Some((RejectionReason::ValidationError, validation.errors.join("; ")));
        }
        None
    }
}

/// The statement must parse and overlap the fiscal period the caller chose.
fn check_statement_against(
    statement_period: Option<StatementPeriod>,
    raw: Option<&str>,
    target: &FiscalPeriod,
) -> Result<()> {
    let Some(statement) = statement_period else {
        return Err(IngestError::StatementPeriodUnparseable {
            raw: raw.map(str::to_string),
        });
    };
    if !statement.overlaps(target) {
        return Err(IngestError::FiscalPeriodOverlapMismatch {
            statement_start: statement.start,
            statement_end: statement.end,
            fiscal_start: target.start_date,
            fiscal_end: target.end_date,
        });
    }
    Ok(())
}

/// `periods` is ordered most recent first; the first containing period wins.
pub fn resolve_fiscal_period(periods: &[FiscalPeriod], date: chrono::NaiveDate) -> Option<FiscalPeriodId> {
    periods.iter().find(|p| p.contains(date)).map(|p| p.id)
}

impl From<ParserError> for LineError {
    fn from(error: ParserError) -> Self {
        Self {
            line_number: error.line_number,
            message: format!("{}: {}", error.parser, error.message),
            line: error.line,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn fy(id: FiscalPeriodId, start: NaiveDate, end: NaiveDate) -> FiscalPeriod {
        FiscalPeriod {
            id,
            company_id: 1,
            name: format!("P{}", id),
            start_date: start,
            end_date: end,
        }
    }

    #[test]
    fn test_resolution_is_inclusive_and_prefers_recent() {
        let periods = vec![
            fy(2, date(2024, 3, 1), date(2024, 3, 31)),
            fy(1, date(2024, 2, 1), date(2024, 3, 1)),
        ];
        assert_eq!(resolve_fiscal_period(&periods, date(2024, 3, 1)), Some(2));
        assert_eq!(resolve_fiscal_period(&periods, date(2024, 2, 1)), Some(1));
        assert_eq!(resolve_fiscal_period(&periods, date(2024, 3, 31)), Some(2));
        assert_eq!(resolve_fiscal_period(&periods, date(2024, 4, 1)), None);
    }

    #[test]
    fn test_statement_gate() {
        let target = fy(1, date(2024, 3, 1), date(2025, 2, 28));
        let inside = StatementPeriod {
            start: date(2024, 2, 16),
            end: date(2024, 3, 18),
        };
        assert!(check_statement_against(Some(inside), None, &target).is_ok());

        let before = StatementPeriod {
            start: date(2024, 1, 1),
            end: date(2024, 1, 31),
        };
        assert!(matches!(
            check_statement_against(Some(before), None, &target),
            Err(IngestError::FiscalPeriodOverlapMismatch { .. })
        ));
        assert!(matches!(
            check_statement_against(None, Some("sometime"), &target),
            Err(IngestError::StatementPeriodUnparseable { raw: Some(_) })
        ));
    }

    #[test]
    fn test_parser_error_becomes_line_error() {
        let line: LineError = ParserError::new("tabular", "31/02/2024 x", "invalid date").at_line(4).into();
        assert_eq!(line.line_number, 4);
        assert_eq!(line.message, "tabular: invalid date");
    }
}
