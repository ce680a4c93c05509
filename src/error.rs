use thiserror::Error;

#[derive(Error, Debug)]
pub enum QuickloadError {
    #[error("Catalog directory validation failed: {0}")]
    DirectoryValidation(String),

    #[error("Form validation failed: {0}")]
    FormValidation(String),

    #[error("Catalog parsing failed: {0}")]
    CatalogParsing(String),

    #[error("Catalog serialization failed: {0}")]
    CatalogSerialization(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Catalog does not conform to schema: {0}")]
    SchemaValidation(String),

    #[error("Operation cancelled by user")]
    UserCancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timestamp error: {0}")]
    Time(#[from] jiff::Error),
}

pub type Result<T> = std::result::Result<T, QuickloadError>;
