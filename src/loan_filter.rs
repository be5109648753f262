// 🔎 Loan Filter - active, non-written-off loans only
// Selects live loan records and projects the portfolio column set

use crate::error::{InputRole, PipelineResult};
use crate::table::{Row, Table};
use tracing::debug;

// ============================================================================
// COLUMN NAMES
// ============================================================================

pub const LOAN_ACCOUNT_NUMBER: &str = "loan_account_number";
pub const LOAN_STATUS: &str = "loan_status";
pub const ACCOUNTING_WRITEOFF: &str = "accounting_writeoff";

/// Amount fields read by the AUM formula
pub const PENDING_AMOUNT: &str = "pending_amount";
pub const PRINCIPAL_OUTSTANDING: &str = "principal_outstanding";
pub const TOTAL_EXCESS_MONEY: &str = "total_excess_money";

/// Portfolio extract columns, in output order
pub const KEEP_COLUMNS: [&str; 45] = [
    LOAN_ACCOUNT_NUMBER,
    "customer_name",
    "cibil",
    "product_code",
    "product_name",
    "interest_rate",
    "original_tenure",
    "ltv",
    "login_date",
    "sourcing_channel",
    "dsa_name",
    "dealer_code",
    "dealer_name",
    "collateral_type",
    "model",
    "model_year",
    "registration_number",
    "chasis_no",
    "engine_no",
    "sanction_date",
    "sanctioned_amount",
    "interest_start_date",
    "repayment_start_date",
    "maturity_date",
    "installment_amount",
    "disbursal_date",
    "disbursal_amount",
    PENDING_AMOUNT,
    "disbursal_status",
    PRINCIPAL_OUTSTANDING,
    TOTAL_EXCESS_MONEY,
    "dpd",
    "dpd_wise",
    "asset_classification",
    "credit_manager_id",
    "credit_manager_name",
    "sourcing_rm_id",
    "sourcing_rm_name",
    "branch_id",
    "branch_code",
    "branch_name",
    "state",
    "repayment_mode",
    "nach_status",
    LOAN_STATUS,
];

/// Headers the loan file must carry before any filtering happens
pub const REQUIRED_LOAN_COLUMNS: [&str; 3] = [LOAN_ACCOUNT_NUMBER, LOAN_STATUS, ACCOUNTING_WRITEOFF];

// ============================================================================
// FILTER
// ============================================================================

/// Fail with `MissingColumn` if the loan file lacks an identity or status header
pub fn validate_loan_table(loans: &Table) -> PipelineResult<()> {
    for column in REQUIRED_LOAN_COLUMNS {
        loans.require_column(column, InputRole::Loan)?;
    }
    Ok(())
}

/// Case-insensitive status check; no trimming
pub fn is_active_loan(loan_status: &str, accounting_writeoff: &str) -> bool {
    accounting_writeoff.to_lowercase() != "yes" && loan_status.to_lowercase() == "active"
}

/// Drop closed and written-off loans, then project onto `KEEP_COLUMNS`
///
/// Missing status cells read as "". Keep-list columns absent from the input
/// are left out of the result.
pub fn filter_active_loans(loans: &Table) -> Table {
    let status_idx = loans.column_index(LOAN_STATUS);
    let writeoff_idx = loans.column_index(ACCOUNTING_WRITEOFF);

    let text_at = |row: &Row, idx: Option<usize>| -> String {
        idx.map(|i| row.get(i).as_text().into_owned())
            .unwrap_or_default()
    };

    let active = loans.filter_rows(|row| {
        let keep = is_active_loan(&text_at(row, status_idx), &text_at(row, writeoff_idx));
        if !keep {
            debug!(line = row.line, "loan row dropped by status filter");
        }
        keep
    });

    active.select_columns(&KEEP_COLUMNS)
}

// ============================================================================
// TESTS
// ============================================================================
