// 🚫 Pipeline Errors - typed abort signals
// Every stage either returns a new table or one of these; nothing is partial.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// INPUT ROLES
// ============================================================================

/// Which of the three uploaded files a problem belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputRole {
    Loan,
    Arc,
    Ledger,
}

impl InputRole {
    /// Human-readable name for error messages
    pub fn name(&self) -> &str {
        match self {
            InputRole::Loan => "Loan Portfolio file",
            InputRole::Arc => "ARC Finance file",
            InputRole::Ledger => "LMS053 Voucher MIS file",
        }
    }
}

impl fmt::Display for InputRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// PIPELINE ERROR
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    /// A required column is absent from a named input
    #[error("{role} must contain a '{column}' column")]
    MissingColumn { role: InputRole, column: String },

    /// The enriched loan table is too narrow to compute AUM
    #[error("Not enough columns to calculate AUM: found {found}, need at least {required}")]
    InsufficientColumns { found: usize, required: usize },

    /// A value feeding the accrual sum or the AUM formula is not a number
    #[error("{role}, row {row}: '{column}' value '{value}' is not numeric")]
    NumericCoercion {
        role: InputRole,
        column: String,
        row: usize,
        value: String,
    },
}

impl PipelineError {
    pub fn missing_column(role: InputRole, column: impl Into<String>) -> Self {
        PipelineError::MissingColumn {
            role,
            column: column.into(),
        }
    }

    /// The input the failure is attributed to, if any
    pub fn role(&self) -> Option<InputRole> {
        match self {
            PipelineError::MissingColumn { role, .. } => Some(*role),
            PipelineError::NumericCoercion { role, .. } => Some(*role),
            PipelineError::InsufficientColumns { .. } => None,
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
