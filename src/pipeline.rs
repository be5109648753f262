// 🔗 Portfolio Pipeline - loan filter → ARC → accruals → AUM
// Pure function of three input tables; any stage error aborts the run.

use crate::accrual::{AccrualAggregator, AccrualSummary};
use crate::aum::AumCalculator;
use crate::error::PipelineResult;
use crate::loan_filter::{filter_active_loans, validate_loan_table};
use crate::reconciliation::{ArcReconciler, ArcSummary};
use crate::table::Table;
use serde::{Deserialize, Serialize};
use tracing::info;

// ============================================================================
// REPORT
// ============================================================================

/// Row counts per stage plus a fingerprint of the output data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub loan_rows_read: usize,
    pub active_loans: usize,
    pub arc: ArcSummary,
    pub accrual: AccrualSummary,
    pub output_rows: usize,
    pub output_columns: usize,
    /// SHA-256 of headers and cell values
    pub fingerprint: String,
}

impl PipelineReport {
    pub fn summary(&self) -> String {
        format!(
            "{} loan rows → {} active → {} after ARC ({} removed) → {} rows x {} columns, {} accruals matched",
            self.loan_rows_read,
            self.active_loans,
            self.arc.loans_retained(),
            self.arc.loans_removed,
            self.output_rows,
            self.output_columns,
            self.accrual.loans_matched
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub table: Table,
    pub report: PipelineReport,
}

// ============================================================================
// PIPELINE
// ============================================================================

pub struct PortfolioPipeline {
    pub arc: ArcReconciler,
    pub accrual: AccrualAggregator,
    pub aum: AumCalculator,
}

impl PortfolioPipeline {
    pub fn new() -> Self {
        PortfolioPipeline {
            arc: ArcReconciler::new(),
            accrual: AccrualAggregator::new(),
            aum: AumCalculator::new(),
        }
    }

    /// Run every stage in order over borrowed inputs
    ///
    /// Inputs are never modified. Filtering happens before ARC reconciliation,
    /// so a closed loan is gone whether or not ARC lists it.
    pub fn run(&self, loans: &Table, arc: &Table, ledger: &Table) -> PipelineResult<PipelineOutput> {
        validate_loan_table(loans)?;

        let active = filter_active_loans(loans);
        info!(read = loans.row_count(), active = active.row_count(), "loan filter applied");

        let reconciled = self.arc.reconcile(&active, arc)?;
        let (enriched, accrual) = self.accrual.enrich(&reconciled.table, ledger)?;
        let table = self.aum.calculate(&enriched)?;

        let report = PipelineReport {
            loan_rows_read: loans.row_count(),
            active_loans: active.row_count(),
            arc: reconciled.summary,
            accrual,
            output_rows: table.row_count(),
            output_columns: table.column_count(),
            fingerprint: table.fingerprint(),
        };
        info!("{}", report.summary());

        Ok(PipelineOutput { table, report })
    }
}

impl Default for PortfolioPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the pipeline with default settings
pub fn run_pipeline(loans: &Table, arc: &Table, ledger: &Table) -> PipelineResult<PipelineOutput> {
    PortfolioPipeline::new().run(loans, arc, ledger)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accrual::ACCRUAL_AMOUNT;
    use crate::aum::AUM;
    use crate::error::{InputRole, PipelineError};
    use crate::loan_filter::{
        ACCOUNTING_WRITEOFF, KEEP_COLUMNS, LOAN_ACCOUNT_NUMBER, LOAN_STATUS, PENDING_AMOUNT,
        PRINCIPAL_OUTSTANDING, TOTAL_EXCESS_MONEY,
    };
    use crate::table::Cell;

    struct TestLoan {
        account: &'static str,
        status: &'static str,
        writeoff: &'static str,
        principal: f64,
        pending: f64,
        excess: f64,
    }

    fn loan(account: &'static str, status: &'static str, writeoff: &'static str) -> TestLoan {
        TestLoan {
            account,
            status,
            writeoff,
            principal: 0.0,
            pending: 0.0,
            excess: 0.0,
        }
    }

    /// Loan export with every keep-list column plus the write-off flag
    fn create_test_loans(loans: &[TestLoan]) -> Table {
        let mut headers: Vec<String> = KEEP_COLUMNS.iter().map(|c| c.to_string()).collect();
        headers.insert(3, ACCOUNTING_WRITEOFF.to_string());

        let idx = |name: &str| headers.iter().position(|h| h == name).unwrap();
        let (acct, status, writeoff) = (idx(LOAN_ACCOUNT_NUMBER), idx(LOAN_STATUS), idx(ACCOUNTING_WRITEOFF));
        let (principal, pending, excess) = (idx(PRINCIPAL_OUTSTANDING), idx(PENDING_AMOUNT), idx(TOTAL_EXCESS_MONEY));

        let rows = loans
            .iter()
            .map(|l| {
                let mut cells = vec![Cell::text("x"); headers.len()];
                cells[acct] = Cell::text(l.account);
                cells[status] = Cell::text(l.status);
                cells[writeoff] = Cell::text(l.writeoff);
                cells[principal] = Cell::Number(l.principal);
                cells[pending] = Cell::Number(l.pending);
                cells[excess] = Cell::Number(l.excess);
                cells
            })
            .collect();

        Table::from_rows(headers, rows)
    }

    fn create_test_arc(accounts: &[&str]) -> Table {
        Table::from_rows(
            vec!["ARC loan_account_number".to_string()],
            accounts.iter().map(|a| vec![Cell::text(*a)]).collect(),
        )
    }

    fn create_test_ledger(rows: &[(&str, &str, f64)]) -> Table {
        Table::from_rows(
            vec!["Gl Desc".to_string(), "Loan Account Number".to_string(), "Debit Amount".to_string()],
            rows.iter()
                .map(|(desc, acct, amount)| vec![Cell::text(*desc), Cell::text(*acct), Cell::Number(*amount)])
                .collect(),
        )
    }

    fn column_values(table: &Table, name: &str) -> Vec<String> {
        let idx = table.column_index(name).unwrap();
        table
            .rows()
            .iter()
            .map(|r| r.get(idx).as_text().into_owned())
            .collect()
    }

    #[test]
    fn test_filter_runs_before_reconcile() {
        let loans = create_test_loans(&[loan("L1", "active", ""), loan("L2", "closed", "")]);
        let arc = create_test_arc(&["L1"]);
        let ledger = create_test_ledger(&[("ACCRUAL INCOME", "L2", 500.0)]);

        let output = run_pipeline(&loans, &arc, &ledger).unwrap();

        assert!(output.table.is_empty());
        assert_eq!(output.report.active_loans, 1);
        assert_eq!(output.report.arc.loans_removed, 1);
        assert_eq!(output.report.accrual.loans_matched, 0);
    }

    #[test]
    fn test_accrual_excludes_other_gl_desc() {
        let loans = create_test_loans(&[loan("L3", "active", "no")]);
        let arc = create_test_arc(&[]);
        let ledger = create_test_ledger(&[
            ("ACCRUAL INCOME", "L3", 100.0),
            ("ACCRUAL INCOME", "L3", 250.0),
            ("PRINCIPAL RECEIVED", "L3", 9999.0),
        ]);

        let output = run_pipeline(&loans, &arc, &ledger).unwrap();

        assert_eq!(column_values(&output.table, ACCRUAL_AMOUNT), vec!["350"]);
    }

    #[test]
    fn test_output_layout_and_aum() {
        let mut l4 = loan("L4", "Active", "");
        l4.principal = 10_000.0;
        l4.pending = 1_500.0;
        l4.excess = 500.0;
        let mut l5 = loan("L5", "active", "");
        l5.principal = 100.0;
        l5.pending = 200.0;

        let loans = create_test_loans(&[l4, l5, loan("L6", "active", "YES")]);
        let arc = create_test_arc(&["L99"]);
        let ledger = create_test_ledger(&[("accrual income", "L4", 42.5), ("ACCRUAL INCOME", "L5", 7.0)]);

        let output = run_pipeline(&loans, &arc, &ledger).unwrap();
        let table = &output.table;

        assert_eq!(table.column_count(), 47);
        assert!(!table.has_column(ACCOUNTING_WRITEOFF));
        assert_eq!(table.headers()[45], ACCRUAL_AMOUNT);
        assert_eq!(table.headers()[46], AUM);
        assert_eq!(column_values(table, LOAN_ACCOUNT_NUMBER), vec!["L4", "L5"]);
        assert_eq!(column_values(table, AUM), vec!["8042.5", "7"]);
        assert_eq!(output.report.output_rows, 2);

        println!("✅ Test passed: {}", output.report.summary());
    }

    #[test]
    fn test_pipeline_is_idempotent() {
        let loans = create_test_loans(&[loan("A", "active", ""), loan("B", "active", "")]);
        let arc = create_test_arc(&["B"]);
        let ledger = create_test_ledger(&[("ACCRUAL INCOME", "A", 12.0)]);

        let first = run_pipeline(&loans, &arc, &ledger).unwrap();
        let second = run_pipeline(&loans, &arc, &ledger).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.report.fingerprint, second.report.fingerprint);
    }

    #[test]
    fn test_missing_arc_column_aborts() {
        let loans = create_test_loans(&[loan("A", "active", "")]);
        let arc = Table::from_rows(vec!["Account".to_string()], vec![vec![Cell::text("A")]]);
        let ledger = create_test_ledger(&[]);

        assert_eq!(
            run_pipeline(&loans, &arc, &ledger),
            Err(PipelineError::missing_column(InputRole::Arc, "loan_account_number"))
        );
    }

    #[test]
    fn test_missing_gl_desc_aborts() {
        let loans = create_test_loans(&[loan("A", "active", "")]);
        let arc = create_test_arc(&[]);
        let ledger = Table::new(vec!["GL Description".to_string(), "Debit Amount".to_string()]);

        assert_eq!(
            run_pipeline(&loans, &arc, &ledger),
            Err(PipelineError::missing_column(InputRole::Ledger, "Gl Desc"))
        );
    }

    #[test]
    fn test_narrow_loan_file_is_insufficient_for_aum() {
        let loans = create_test_loans(&[loan("A", "active", "")])
            .select_columns(&[LOAN_ACCOUNT_NUMBER, LOAN_STATUS, ACCOUNTING_WRITEOFF, PRINCIPAL_OUTSTANDING]);
        let arc = create_test_arc(&[]);
        let ledger = create_test_ledger(&[]);

        // loan_account_number, principal_outstanding, loan_status + Accrul_Amount
        assert_eq!(
            run_pipeline(&loans, &arc, &ledger),
            Err(PipelineError::InsufficientColumns {
                found: 4,
                required: 46,
            })
        );
    }

    #[test]
    fn test_missing_loan_status_column_aborts() {
        let loans = create_test_loans(&[loan("A", "active", "")])
            .select_columns(&[LOAN_ACCOUNT_NUMBER, ACCOUNTING_WRITEOFF]);

        assert_eq!(
            run_pipeline(&loans, &create_test_arc(&[]), &create_test_ledger(&[])),
            Err(PipelineError::missing_column(InputRole::Loan, LOAN_STATUS))
        );
    }

    #[test]
    fn test_inputs_are_not_mutated() {
        let loans = create_test_loans(&[loan("A", "active", "")]);
        let arc = create_test_arc(&["Z"]);
        let ledger = create_test_ledger(&[("ACCRUAL INCOME", "A", 1.0)]);
        let snapshot = (loans.clone(), arc.clone(), ledger.clone());

        run_pipeline(&loans, &arc, &ledger).unwrap();

        assert_eq!((loans, arc, ledger), snapshot);
    }
}
