// Loan Portfolio Extract - Core Library
// Exposes the pipeline and its I/O edges for the CLI, API server, and tests

pub mod error;
pub mod table;
pub mod loan_filter;     // Stage 1: active, non-written-off loans
pub mod reconciliation;  // Stage 2: ARC exclusion
pub mod accrual;         // Stage 3: accrual income per account
pub mod aum;             // Stage 4: Assets Under Management
pub mod pipeline;
pub mod loader;
pub mod writer;
pub mod store;
pub mod config;
pub mod logging;

// Re-export commonly used types
pub use error::{InputRole, PipelineError, PipelineResult};
pub use table::{Cell, Row, Table};
pub use loan_filter::{filter_active_loans, is_active_loan, validate_loan_table, KEEP_COLUMNS};
pub use reconciliation::{ArcReconciler, ArcReconciliation, ArcSummary};
pub use accrual::{AccrualAggregate, AccrualAggregator, AccrualSummary, ACCRUAL_AMOUNT};
pub use aum::{aum, AumCalculator, AumColumns, AUM};
pub use pipeline::{run_pipeline, PipelineOutput, PipelineReport, PortfolioPipeline};
pub use loader::{get_reader, load_table, load_table_bytes, SourceFormat, TableReader};
pub use writer::{encode, ExtractFormat};
pub use store::ExtractStore;
pub use config::PortfolioConfig;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
