//! Report generation port trait.

use crate::domain::error::BackledgerError;
use crate::domain::ledger::Ledger;
use crate::domain::metrics::LedgerSummary;

/// Port for writing the outcome of a finished run.
pub trait ReportPort {
    fn write(
        &self,
        summary: &LedgerSummary,
        ledger: &Ledger<'_>,
        output_path: &str,
    ) -> Result<(), BackledgerError>;
}
