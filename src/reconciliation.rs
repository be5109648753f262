// ⚖️ ARC Reconciliation - drop accounts already resolved via ARC
// A loan row survives only if its account number is absent from the ARC file.

use crate::error::{InputRole, PipelineError, PipelineResult};
use crate::loan_filter::LOAN_ACCOUNT_NUMBER;
use crate::table::Table;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

// ============================================================================
// RECONCILIATION RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ArcReconciliation {
    /// Loan rows that are not in the ARC file, original order
    pub table: Table,
    pub summary: ArcSummary,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArcSummary {
    /// Distinct account keys found in the ARC file
    pub arc_accounts: usize,
    pub loans_checked: usize,
    pub loans_removed: usize,
}

impl ArcSummary {
    pub fn loans_retained(&self) -> usize {
        self.loans_checked - self.loans_removed
    }

    pub fn summary(&self) -> String {
        format!(
            "ARC reconciliation: {} ARC accounts, {} of {} loans removed, {} retained",
            self.arc_accounts,
            self.loans_removed,
            self.loans_checked,
            self.loans_retained()
        )
    }
}

// ============================================================================
// RECONCILER
// ============================================================================

pub struct ArcReconciler {
    /// Case-insensitive fragment identifying the ARC account column
    pub account_pattern: String,
}

impl ArcReconciler {
    pub fn new() -> Self {
        ArcReconciler {
            account_pattern: LOAN_ACCOUNT_NUMBER.to_string(),
        }
    }

    /// First ARC header containing the account pattern (headers trimmed)
    pub fn locate_account_column(&self, arc: &Table) -> PipelineResult<usize> {
        let pattern = self.account_pattern.to_lowercase();
        arc.headers()
            .iter()
            .position(|h| h.trim().to_lowercase().contains(&pattern))
            .ok_or_else(|| PipelineError::missing_column(InputRole::Arc, self.account_pattern.as_str()))
    }

    /// Account keys listed in the ARC file
    pub fn arc_accounts(&self, arc: &Table) -> PipelineResult<HashSet<String>> {
        let column = self.locate_account_column(arc)?;
        debug!(column = %arc.headers()[column].trim(), "ARC account column located");

        Ok(arc
            .rows()
            .iter()
            .filter_map(|row| row.get(column).key())
            .collect())
    }

    /// Remove loans whose account appears in the ARC file
    pub fn reconcile(&self, loans: &Table, arc: &Table) -> PipelineResult<ArcReconciliation> {
        let accounts = self.arc_accounts(arc)?;
        let loan_column = loans.require_column(LOAN_ACCOUNT_NUMBER, InputRole::Loan)?;

        let table = loans.filter_rows(|row| match row.get(loan_column).key() {
            Some(key) if accounts.contains(&key) => {
                debug!(line = row.line, account = %key, "loan removed by ARC match");
                false
            }
            _ => true,
        });

        let summary = ArcSummary {
            arc_accounts: accounts.len(),
            loans_checked: loans.row_count(),
            loans_removed: loans.row_count() - table.row_count(),
        };
        info!("{}", summary.summary());

        Ok(ArcReconciliation { table, summary })
    }
}

impl Default for ArcReconciler {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
