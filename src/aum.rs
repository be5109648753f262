// 📈 AUM Calculator - Assets Under Management per loan
//
//   AUM = max(principal_outstanding - (pending_amount + total_excess_money), 0)
//         + Accrul_Amount
//
// In the 46-column extract layout these are the spreadsheet columns AD, AB,
// AE and AT. They are resolved by name here, never by position.

use crate::accrual::ACCRUAL_AMOUNT;
use crate::error::{InputRole, PipelineError, PipelineResult};
use crate::loan_filter::{KEEP_COLUMNS, PENDING_AMOUNT, PRINCIPAL_OUTSTANDING, TOTAL_EXCESS_MONEY};
use crate::table::{amount_at, Cell, Row, Table};
use tracing::info;

pub const AUM: &str = "AUM";

/// Keep-list plus `Accrul_Amount`
pub const AUM_REQUIRED_COLUMNS: usize = KEEP_COLUMNS.len() + 1;

/// Column indices of the four AUM inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AumColumns {
    pub pending_amount: usize,
    pub principal_outstanding: usize,
    pub total_excess_money: usize,
    pub accrual_amount: usize,
}

impl AumColumns {
    pub fn resolve(table: &Table) -> PipelineResult<Self> {
        Ok(AumColumns {
            pending_amount: table.require_column(PENDING_AMOUNT, InputRole::Loan)?,
            principal_outstanding: table.require_column(PRINCIPAL_OUTSTANDING, InputRole::Loan)?,
            total_excess_money: table.require_column(TOTAL_EXCESS_MONEY, InputRole::Loan)?,
            accrual_amount: table.require_column(ACCRUAL_AMOUNT, InputRole::Loan)?,
        })
    }

    /// AUM of one row
    pub fn aum_for(&self, row: &Row) -> PipelineResult<f64> {
        let pending = amount_at(row, self.pending_amount, PENDING_AMOUNT, InputRole::Loan)?;
        let principal = amount_at(row, self.principal_outstanding, PRINCIPAL_OUTSTANDING, InputRole::Loan)?;
        let excess = amount_at(row, self.total_excess_money, TOTAL_EXCESS_MONEY, InputRole::Loan)?;
        let accrual = amount_at(row, self.accrual_amount, ACCRUAL_AMOUNT, InputRole::Loan)?;

        Ok(aum(principal, pending, excess, accrual))
    }
}

/// Net principal floored at zero, plus accrued income
pub fn aum(principal_outstanding: f64, pending_amount: f64, total_excess_money: f64, accrual_amount: f64) -> f64 {
    (principal_outstanding - (pending_amount + total_excess_money)).max(0.0) + accrual_amount
}

pub struct AumCalculator {
    pub required_columns: usize,
}

impl AumCalculator {
    pub fn new() -> Self {
        AumCalculator {
            required_columns: AUM_REQUIRED_COLUMNS,
        }
    }

    /// Append `AUM` to the enriched loan table
    ///
    /// The column count is checked before any row is read; the first row with a
    /// non-numeric input aborts the whole calculation.
    pub fn calculate(&self, loans: &Table) -> PipelineResult<Table> {
        if loans.column_count() < self.required_columns {
            return Err(PipelineError::InsufficientColumns {
                found: loans.column_count(),
                required: self.required_columns,
            });
        }

        let columns = AumColumns::resolve(loans)?;
        let values = loans
            .rows()
            .iter()
            .map(|row| columns.aum_for(row).map(Cell::Number))
            .collect::<PipelineResult<Vec<_>>>()?;

        info!(rows = values.len(), "AUM calculated");
        Ok(loans.with_column(AUM, values))
    }
}

impl Default for AumCalculator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
