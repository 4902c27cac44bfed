// In-memory ledger and the default record validators
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::collaborators::{
    DuplicateChecker, FieldValidator, FiscalBoundaryValidator, FiscalPeriodLookup,
    TransactionSink, ValidationOutcome,
};
use crate::types::{CompanyId, FiscalPeriod, FiscalPeriodId, TransactionRecord};

/// On-disk shape of a ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSnapshot {
    pub fiscal_periods: Vec<FiscalPeriod>,
    pub transactions: Vec<TransactionRecord>,
}

/// Fiscal periods and stored transactions held in memory. Serves the CLI
/// and tests as duplicate checker, period lookup and sink at once.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    fiscal_periods: Vec<FiscalPeriod>,
    transactions: Mutex<Vec<TransactionRecord>>,
}

impl InMemoryLedger {
    pub fn new(fiscal_periods: Vec<FiscalPeriod>) -> Self {
        Self::from_snapshot(LedgerSnapshot {
            fiscal_periods,
            transactions: Vec::new(),
        })
    }

    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Self {
        Self {
            fiscal_periods: snapshot.fiscal_periods,
            transactions: Mutex::new(snapshot.transactions),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read ledger {}", path.display()))?;
        let snapshot: LedgerSnapshot = serde_json::from_str(&raw)
            .with_context(|| format!("invalid ledger {}", path.display()))?;
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.snapshot())?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write ledger {}", path.display()))
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            fiscal_periods: self.fiscal_periods.clone(),
            transactions: self.transactions().clone(),
        }
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions().len()
    }

    fn transactions(&self) -> MutexGuard<'_, Vec<TransactionRecord>> {
        // A panic while holding the lock cannot leave a half-pushed record.
        self.transactions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn same_transaction(a: &TransactionRecord, b: &TransactionRecord) -> bool {
    a.company_id == b.company_id
        && a.date == b.date
        && a.debit == b.debit
        && a.credit == b.credit
        && a.description.trim().eq_ignore_ascii_case(b.description.trim())
}

impl DuplicateChecker for InMemoryLedger {
    fn find_duplicate(&self, record: &TransactionRecord) -> Option<TransactionRecord> {
        self.transactions()
            .iter()
            .find(|stored| same_transaction(stored, record))
            .cloned()
    }
}

impl FiscalPeriodLookup for InMemoryLedger {
    fn fiscal_periods(&self, company_id: CompanyId) -> Result<Vec<FiscalPeriod>> {
        let mut periods: Vec<FiscalPeriod> = self
            .fiscal_periods
            .iter()
            .filter(|p| p.company_id == company_id)
            .cloned()
            .collect();
        periods.sort_by(|a, b| b.start_date.cmp(&a.start_date));
        Ok(periods)
    }

    fn fiscal_period(
        &self,
        company_id: CompanyId,
        period_id: FiscalPeriodId,
    ) -> Result<Option<FiscalPeriod>> {
        Ok(self
            .fiscal_periods
            .iter()
            .find(|p| p.company_id == company_id && p.id == period_id)
            .cloned())
    }
}

impl TransactionSink for InMemoryLedger {
    fn persist(&self, record: &TransactionRecord) -> Result<()> {
        self.transactions().push(record.clone());
        Ok(())
    }
}

/// Inclusive date check against the period bounds.
#[derive(Debug, Default, Clone, Copy)]
pub struct PeriodBoundaryValidator;

impl FiscalBoundaryValidator for PeriodBoundaryValidator {
    fn is_within_fiscal_period(&self, record: &TransactionRecord, period: &FiscalPeriod) -> bool {
        period.contains(record.date)
    }

    fn explain(&self, record: &TransactionRecord, period: &FiscalPeriod) -> String {
        format!(
            "transaction date {} is outside fiscal period {} ({} to {})",
            record.date, period.name, period.start_date, period.end_date
        )
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RequiredFieldsValidator;

impl FieldValidator for RequiredFieldsValidator {
    fn validate(&self, record: &TransactionRecord) -> ValidationOutcome {
        let mut errors = Vec::new();
        if record.description.trim().is_empty() {
            errors.push("description is required".to_string());
        }
        if record.debit < Decimal::ZERO || record.credit < Decimal::ZERO {
            errors.push("amounts must not be negative".to_string());
        }
        match (record.debit.is_zero(), record.credit.is_zero()) {
            (true, true) => errors.push("amount must not be zero".to_string()),
            (false, false) => errors.push("only one of debit or credit may be set".to_string()),
            _ => {}
        }
        ValidationOutcome::from_errors(errors)
    }
}
