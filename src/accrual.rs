// 💰 Accrual Aggregator - accrual income per loan account
// Sums LMS053 voucher debits for ACCRUAL INCOME entries and left-joins the
// totals onto the loan table as `Accrul_Amount`.

use crate::error::{InputRole, PipelineResult};
use crate::loan_filter::LOAN_ACCOUNT_NUMBER;
use crate::table::{amount_at, Cell, Table};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

pub const GL_DESC: &str = "Gl Desc";
pub const LEDGER_ACCOUNT_NUMBER: &str = "Loan Account Number";
pub const DEBIT_AMOUNT: &str = "Debit Amount";
pub const ACCRUAL_INCOME: &str = "ACCRUAL INCOME";

/// Column appended to the loan table (spelling is part of the extract layout)
pub const ACCRUAL_AMOUNT: &str = "Accrul_Amount";

// ============================================================================
// AGGREGATE
// ============================================================================

/// Account key → summed accrual debit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccrualAggregate {
    totals: HashMap<String, f64>,
    /// Ledger rows that contributed
    entry_count: usize,
}

impl AccrualAggregate {
    pub fn get(&self, account: &str) -> Option<f64> {
        self.totals.get(account).copied()
    }

    /// Number of distinct accounts
    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    pub fn total(&self) -> f64 {
        self.totals.values().sum()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AccrualSummary {
    pub ledger_rows: usize,
    pub accrual_rows: usize,
    pub accounts: usize,
    pub loans_matched: usize,
    pub total_accrual: f64,
}

// ============================================================================
// AGGREGATOR
// ============================================================================

pub struct AccrualAggregator {
    /// `Gl Desc` value selected after upper-casing
    pub gl_desc: String,
}

impl AccrualAggregator {
    pub fn new() -> Self {
        AccrualAggregator {
            gl_desc: ACCRUAL_INCOME.to_string(),
        }
    }

    /// Group accrual-income ledger rows by account and sum their debits
    ///
    /// Rows without an account number are skipped. Debit amounts follow the
    /// crate-wide numeric policy: blank is 0, unparseable text aborts.
    pub fn aggregate(&self, ledger: &Table) -> PipelineResult<AccrualAggregate> {
        let ledger = ledger.with_trimmed_headers();

        let gl_desc_idx = ledger.require_column(GL_DESC, InputRole::Ledger)?;
        let accruals = ledger.filter_rows(|row| row.get(gl_desc_idx).as_text().to_uppercase() == self.gl_desc);

        let account_idx = accruals.require_column(LEDGER_ACCOUNT_NUMBER, InputRole::Ledger)?;
        let debit_idx = accruals.require_column(DEBIT_AMOUNT, InputRole::Ledger)?;

        let mut aggregate = AccrualAggregate::default();
        for row in accruals.rows() {
            let Some(account) = row.get(account_idx).key() else {
                debug!(line = row.line, "accrual row without account number skipped");
                continue;
            };
            let debit = amount_at(row, debit_idx, DEBIT_AMOUNT, InputRole::Ledger)?;

            *aggregate.totals.entry(account).or_insert(0.0) += debit;
            aggregate.entry_count += 1;
        }

        debug!(
            ledger_rows = ledger.row_count(),
            accrual_rows = accruals.row_count(),
            accounts = aggregate.len(),
            "ledger aggregated"
        );

        Ok(aggregate)
    }

    /// Left-join the aggregate onto `loans`
    ///
    /// Every loan row keeps its place; unmatched rows get 0. Returns the new
    /// table and the number of matched rows.
    pub fn attach(&self, loans: &Table, aggregate: &AccrualAggregate) -> PipelineResult<(Table, usize)> {
        let account_idx = loans.require_column(LOAN_ACCOUNT_NUMBER, InputRole::Loan)?;

        let mut matched = 0;
        let values: Vec<Cell> = loans
            .rows()
            .iter()
            .map(|row| {
                let total = row
                    .get(account_idx)
                    .key()
                    .and_then(|key| aggregate.get(&key));
                if total.is_some() {
                    matched += 1;
                }
                Cell::Number(total.unwrap_or(0.0))
            })
            .collect();

        Ok((loans.with_column(ACCRUAL_AMOUNT, values), matched))
    }

    /// Aggregate `ledger` and attach the totals to `loans`
    pub fn enrich(&self, loans: &Table, ledger: &Table) -> PipelineResult<(Table, AccrualSummary)> {
        let aggregate = self.aggregate(ledger)?;
        let (table, loans_matched) = self.attach(loans, &aggregate)?;

        let summary = AccrualSummary {
            ledger_rows: ledger.row_count(),
            accrual_rows: aggregate.entry_count(),
            accounts: aggregate.len(),
            loans_matched,
            total_accrual: aggregate.total(),
        };
        info!(
            accrual_rows = summary.accrual_rows,
            accounts = summary.accounts,
            loans_matched = summary.loans_matched,
            "accrual income attached"
        );

        Ok((table, summary))
    }
}

impl Default for AccrualAggregator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
