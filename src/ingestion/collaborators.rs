// Narrow contracts the ingestion pipeline consumes from the ledger side
use anyhow::Result;

use crate::types::{CompanyId, FiscalPeriod, FiscalPeriodId, TransactionRecord};

/// Looks for an already-stored record equal to `record`.
pub trait DuplicateChecker: Send + Sync {
    fn find_duplicate(&self, record: &TransactionRecord) -> Option<TransactionRecord>;

    fn is_duplicate(&self, record: &TransactionRecord) -> bool {
        self.find_duplicate(record).is_some()
    }
}

pub trait FiscalBoundaryValidator: Send + Sync {
    fn is_within_fiscal_period(&self, record: &TransactionRecord, period: &FiscalPeriod) -> bool;

    /// Human-readable reason for a rejection.
    fn explain(&self, record: &TransactionRecord, period: &FiscalPeriod) -> String;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationOutcome {
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

pub trait FieldValidator: Send + Sync {
    fn validate(&self, record: &TransactionRecord) -> ValidationOutcome;
}

/// Read-only company and fiscal period queries.
pub trait FiscalPeriodLookup: Send + Sync {
    /// All periods of a company, most recent start date first.
    fn fiscal_periods(&self, company_id: CompanyId) -> Result<Vec<FiscalPeriod>>;

    fn fiscal_period(
        &self,
        company_id: CompanyId,
        period_id: FiscalPeriodId,
    ) -> Result<Option<FiscalPeriod>>;
}

/// Stores accepted records. Records stored earlier in the same upload must
/// be visible to the duplicate checker.
pub trait TransactionSink: Send + Sync {
    fn persist(&self, record: &TransactionRecord) -> Result<()>;
}
