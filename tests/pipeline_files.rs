// File-level flow: exports on disk → pipeline → stored extract → reloaded

use loan_portfolio::loan_filter::{
    ACCOUNTING_WRITEOFF, LOAN_ACCOUNT_NUMBER, LOAN_STATUS, PENDING_AMOUNT, PRINCIPAL_OUTSTANDING,
    TOTAL_EXCESS_MONEY,
};
use loan_portfolio::{
    encode, load_table, run_pipeline, Cell, ExtractFormat, ExtractStore, InputRole, PipelineError, Table,
    ACCRUAL_AMOUNT, AUM, KEEP_COLUMNS,
};
use std::fs;
use std::path::{Path, PathBuf};

/// (account, status, writeoff, principal_outstanding, pending_amount, total_excess_money)
type LoanLine<'a> = (&'a str, &'a str, &'a str, &'a str, &'a str, &'a str);

fn write_loans_csv(dir: &Path, loans: &[LoanLine]) -> PathBuf {
    let mut headers: Vec<&str> = vec![ACCOUNTING_WRITEOFF, "extra_internal_column"];
    headers.extend(KEEP_COLUMNS.iter());

    let mut out = headers.join(",");
    out.push('\n');
    for (acct, status, writeoff, principal, pending, excess) in loans {
        let line: Vec<String> = headers
            .iter()
            .map(|h| match *h {
                h if h == LOAN_ACCOUNT_NUMBER => acct.to_string(),
                h if h == LOAN_STATUS => status.to_string(),
                h if h == ACCOUNTING_WRITEOFF => writeoff.to_string(),
                h if h == PRINCIPAL_OUTSTANDING => principal.to_string(),
                h if h == PENDING_AMOUNT => pending.to_string(),
                h if h == TOTAL_EXCESS_MONEY => excess.to_string(),
                _ => "n/a".to_string(),
            })
            .collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }

    let path = dir.join("loan_portfolio.csv");
    fs::write(&path, out).unwrap();
    path
}

fn write_csv(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn column_text(table: &Table, name: &str) -> Vec<String> {
    let idx = table.column_index(name).unwrap();
    table
        .rows()
        .iter()
        .map(|r| r.get(idx).as_text().into_owned())
        .collect()
}

#[test]
fn test_csv_exports_to_stored_xlsx_extract() {
    let tmp = tempfile::tempdir().unwrap();
    let loans = write_loans_csv(
        tmp.path(),
        &[
            ("L1", "Active", "", "5000", "1000", "0"),
            ("L2", "active", "", "2000", "0", "0"),
            ("L3", "closed", "", "9000", "0", "0"),
            ("L4", "ACTIVE", "yes", "9000", "0", "0"),
            ("L5", "active", "No", "300", "200", "200"),
        ],
    );
    let arc = write_csv(tmp.path(), "arc.csv", " ARC_Loan_Account_Number ,Remarks\nL2,sold\n");
    let ledger = write_csv(
        tmp.path(),
        "lms053.csv",
        "Gl Desc ,Loan Account Number,Debit Amount\n\
         ACCRUAL INCOME,L1,\"1,200.50\"\n\
         ACCRUAL INCOME,L1,99.50\n\
         BOUNCE CHARGES,L1,750\n\
         accrual income,L5,40\n",
    );

    let output = run_pipeline(
        &load_table(&loans).unwrap(),
        &load_table(&arc).unwrap(),
        &load_table(&ledger).unwrap(),
    )
    .unwrap();

    assert_eq!(column_text(&output.table, LOAN_ACCOUNT_NUMBER), vec!["L1", "L5"]);
    assert_eq!(column_text(&output.table, ACCRUAL_AMOUNT), vec!["1300", "40"]);
    // L1: 5000 - 1000 + 1300; L5: floored at 0, plus 40
    assert_eq!(column_text(&output.table, AUM), vec!["5300", "40"]);
    assert_eq!(output.report.arc.loans_removed, 1);

    let store = ExtractStore::new(tmp.path().join("uploads"), "Loan_Portfolio");
    let bytes = encode(&output.table, ExtractFormat::Xlsx, "Loan Portfolio").unwrap();
    let saved = store.save(&bytes, ExtractFormat::Xlsx).unwrap();

    assert!(saved
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap()
        .ends_with("_Loan_Portfolio.xlsx"));
    assert_eq!(store.latest().unwrap(), Some(saved.clone()));

    let reloaded = load_table(&saved).unwrap();
    assert_eq!(reloaded.headers(), output.table.headers());
    assert_eq!(reloaded.row_count(), 2);
    let aum_idx = reloaded.column_index(AUM).unwrap();
    assert_eq!(reloaded.rows()[0].get(aum_idx), &Cell::Number(5300.0));
}

#[test]
fn test_csv_extract_matches_table() {
    let tmp = tempfile::tempdir().unwrap();
    let loans = write_loans_csv(tmp.path(), &[("L7", "active", "", "100", "0", "0")]);
    let arc = write_csv(tmp.path(), "arc.csv", "loan_account_number\n");
    let ledger = write_csv(tmp.path(), "lms.csv", "Gl Desc,Loan Account Number,Debit Amount\n");

    let output = run_pipeline(
        &load_table(&loans).unwrap(),
        &load_table(&arc).unwrap(),
        &load_table(&ledger).unwrap(),
    )
    .unwrap();

    let csv = String::from_utf8(encode(&output.table, ExtractFormat::Csv, "unused").unwrap()).unwrap();
    let mut lines = csv.lines();
    let header = lines.next().unwrap();
    assert!(header.starts_with("loan_account_number,customer_name,"));
    assert!(header.ends_with(",loan_status,Accrul_Amount,AUM"));
    assert!(lines.next().unwrap().ends_with(",active,0,100"));
}

#[test]
fn test_non_numeric_ledger_amount_aborts_with_row() {
    let tmp = tempfile::tempdir().unwrap();
    let loans = write_loans_csv(tmp.path(), &[("L1", "active", "", "100", "0", "0")]);
    let arc = write_csv(tmp.path(), "arc.csv", "loan_account_number\n");
    let ledger = write_csv(
        tmp.path(),
        "lms.csv",
        "Gl Desc,Loan Account Number,Debit Amount\nACCRUAL INCOME,L1,10\nACCRUAL INCOME,L1,TBD\n",
    );

    let err = run_pipeline(
        &load_table(&loans).unwrap(),
        &load_table(&arc).unwrap(),
        &load_table(&ledger).unwrap(),
    )
    .unwrap_err();

    assert_eq!(
        err,
        PipelineError::NumericCoercion {
            role: InputRole::Ledger,
            column: "Debit Amount".to_string(),
            row: 3,
            value: "TBD".to_string(),
        }
    );
}
