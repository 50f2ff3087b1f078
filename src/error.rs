use thiserror::Error;

/// Request-level ingestion failures. Any of these aborts the whole upload.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("unsupported file type `{0}`: only .csv uploads are accepted, export the spreadsheet as CSV and try again")]
    UnsupportedFormat(String),

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("failed to read upload: {0}")]
    Io(#[from] std::io::Error),
}

/// A single row's failure. Captured into the batch error list.
#[derive(Debug, Error)]
pub enum RowError {
    #[error("missing required field {0}")]
    MissingField(&'static str),

    #[error("column {0} appears more than once")]
    DuplicateColumn(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate {entity} `{key}`")]
    Duplicate { entity: &'static str, key: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("invalid school year `{0}`, expected YYYY-YYYY")]
    SchoolYear(String),

    #[error("invalid semester `{0}`, expected 1st, 2nd or Summer")]
    Semester(String),

    #[error("invalid period `{0}`, expected All, P1, P2 or P3")]
    Period(String),
}
