use crate::cli::Cli;
use std::path::PathBuf;

pub const DEFAULT_SCHEMA_FILE: &str = "products.xsd";
pub const DEFAULT_CREATOR: &str = "Festo Didactic";

/// Where catalogs live and how new ones are stamped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogConfig {
    pub directory: PathBuf,
    pub schema_file: PathBuf,
    pub creator: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            schema_file: PathBuf::from(DEFAULT_SCHEMA_FILE),
            creator: DEFAULT_CREATOR.to_string(),
        }
    }
}

impl CatalogConfig {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            directory: PathBuf::from(&cli.path),
            schema_file: PathBuf::from(&cli.schema),
            creator: cli.creator.clone(),
        }
    }
}
