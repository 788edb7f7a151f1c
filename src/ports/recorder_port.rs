//! Durable transaction sink port.

use crate::domain::error::BackledgerError;
use crate::domain::transaction::TransactionRecord;

/// Receives every committed ledger action.
///
/// The ledger logs and swallows errors returned here; a failing recorder
/// never rejects or rolls back an action.
pub trait TransactionRecorder {
    fn record(
        &self,
        account_id: &str,
        venue: &str,
        record: &TransactionRecord,
    ) -> Result<(), BackledgerError>;
}
