mod messaging;
mod reconciliation_database;

pub use messaging::{MessageError, MessageProvider};
pub use reconciliation_database::{stale_cutoff, ReconciliationDatabase, ReconciliationError};
