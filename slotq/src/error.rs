use deadpool_sqlite::InteractError;

/// A [std::result::Result] whose error type defaults to [Error].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that can be returned from the queue.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The job request or queue configuration was invalid. Retrying the same call will fail
    /// the same way.
    #[error("Invalid job options: {0}")]
    Validation(String),
    /// Failed to serialize a job payload.
    #[error("Error processing payload: {0}")]
    PayloadError(serde_json::Error),
    /// An error occurred while updating the database to a new schema version.
    #[error("Migration error: {0}")]
    Migration(#[from] rusqlite_migration::Error),
    /// An error occurred while opening the database.
    #[error("Error opening database: {0}")]
    OpenDatabase(eyre::Report),
    /// Failed to acquire a database connection from the pool.
    #[error("Error acquiring database connection: {0}")]
    PoolError(#[from] deadpool_sqlite::PoolError),
    /// Encountered an error communicating with the database.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// The database contained invalid data.
    #[error("Unexpected value type for {1}: {0}")]
    ColumnType(#[source] rusqlite::Error, &'static str),
    /// A stored job payload could not be decoded.
    #[error("Error decoding stored payload: {0}")]
    InvalidStoredData(serde_json::Error),
    /// An internal error occurred while running a pooled database call.
    #[error("Internal error: {0}")]
    DbInteract(String),
    /// A job had an unknown state value
    #[error("Invalid job state {0}")]
    InvalidJobState(String),
    /// A stored timestamp could not be represented.
    #[error("Timestamp {0} out of range")]
    TimestampOutOfRange(&'static str),
}

/// The two broad classes of failure. Validation failures are raised before the database is
/// touched and are the caller's to fix; storage failures come from the database and are passed
/// through unchanged.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request was invalid.
    Validation,
    /// The database or connection pool failed.
    Storage,
}

impl From<InteractError> for Error {
    fn from(e: InteractError) -> Self {
        Error::DbInteract(e.to_string())
    }
}

impl Error {
    pub(crate) fn open_database(err: impl Into<eyre::Report>) -> Self {
        Error::OpenDatabase(err.into())
    }

    pub(crate) fn validation(message: impl ToString) -> Self {
        Error::Validation(message.to_string())
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) | Error::PayloadError(_) => ErrorKind::Validation,
            _ => ErrorKind::Storage,
        }
    }

    /// Returns true if this error was caused by invalid input.
    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }
}
