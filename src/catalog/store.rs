use crate::catalog::model::Catalog;
use crate::catalog::schema::{SchemaCheck, SchemaValidator};
use crate::config::CatalogConfig;
use crate::error::{QuickloadError, Result};
use crate::utils::path_validator::PathValidator;
use jiff::{SignedDuration, Zoned};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

pub const CATALOG_PREFIX: &str = "products";
pub const CATALOG_EXTENSION: &str = ".xml";
pub const DEFAULT_CATALOG_FILE: &str = "products.xml";

/// Upper bound on millisecond bumps when a snapshot name is already taken
const MAX_ROTATE_ATTEMPTS: u32 = 1000;

/// File-level operations on the catalogs of one directory
pub struct CatalogStore {
    directory: PathBuf,
    creator: String,
    schema: SchemaValidator,
}

impl CatalogStore {
    pub fn open(config: &CatalogConfig) -> Result<Self> {
        let directory = PathValidator::catalog_dir(&config.directory)?;
        let schema = SchemaValidator::new(PathValidator::schema_file(
            &directory,
            &config.schema_file,
        )?);

        Ok(Self {
            directory,
            creator: config.creator.clone(),
            schema,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn schema(&self) -> &SchemaValidator {
        &self.schema
    }

    /// Newest `products*.xml` file by modification time, or the default path
    /// (not created) when the directory holds none.
    pub fn locate_catalog(&self) -> Result<PathBuf> {
        // Ties on mtime go to timestamped snapshots, then to the later name.
        let mut newest: Option<((SystemTime, bool, String), PathBuf)> = None;

        for entry in fs::read_dir(&self.directory)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !is_catalog_file_name(&name) {
                continue;
            }

            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }

            let rank = (metadata.modified()?, is_snapshot_name(&name), name);
            if newest.as_ref().is_none_or(|(best, _)| rank > *best) {
                newest = Some((rank, entry.path()));
            }
        }

        match newest {
            Some((_, path)) => {
                debug!(catalog = %path.display(), "located newest catalog");
                Ok(path)
            }
            None => {
                debug!("no catalog found, using default file name");
                Ok(self.directory.join(DEFAULT_CATALOG_FILE))
            }
        }
    }

    /// Reads and parses an existing catalog without any fallback.
    pub fn load_existing(&self, path: &Path) -> Result<Catalog> {
        let content = fs::read_to_string(path).map_err(|e| {
            QuickloadError::CatalogParsing(format!(
                "Failed to read catalog '{}': {}",
                path.display(),
                e
            ))
        })?;

        Catalog::from_xml(&content).map_err(|e| {
            QuickloadError::CatalogParsing(format!(
                "Failed to parse catalog '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Loads the catalog at `path`, replacing it with a fresh empty catalog when it
    /// is missing, empty, not well-formed, not rooted at `<Products>` or rejected
    /// by the schema.
    ///
    /// Other metadata errors and a failure to write the fresh catalog are returned.
    pub fn load_or_create(&self, path: &Path) -> Result<Catalog> {
        let is_empty = match fs::metadata(path) {
            Ok(metadata) => metadata.len() == 0,
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(e) => return Err(e.into()),
        };
        if is_empty {
            info!(catalog = %path.display(), "catalog missing or empty, creating a new one");
            return self.create_empty(path);
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!(catalog = %path.display(), error = %e, "catalog unreadable, recreating");
                return self.create_empty(path);
            }
        };

        let catalog = match Catalog::from_xml(&content) {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!(catalog = %path.display(), error = %e, "catalog corrupt, recreating");
                return self.create_empty(path);
            }
        };

        if let SchemaCheck::Invalid(problems) = self.schema.check_str(&content) {
            warn!(
                catalog = %path.display(),
                problems = %problems.join("; "),
                "catalog does not match schema, recreating"
            );
            return self.create_empty(path);
        }

        debug!(
            catalog = %path.display(),
            products = catalog.products().len(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    /// Writes the catalog to `path`, replacing whatever is there.
    pub fn persist(&self, catalog: &Catalog, path: &Path) -> Result<()> {
        let xml = catalog.to_xml()?;
        fs::write(path, xml).map_err(|e| {
            QuickloadError::CatalogSerialization(format!(
                "Failed to write catalog '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Renames `path` to a timestamped snapshot name in the same directory.
    pub fn rotate(&self, path: &Path) -> Result<PathBuf> {
        let target = self.free_snapshot_path(Zoned::now())?;
        fs::rename(path, &target)?;
        info!(
            from = %path.display(),
            to = %target.display(),
            "catalog snapshot written"
        );
        Ok(target)
    }

    fn free_snapshot_path(&self, start: Zoned) -> Result<PathBuf> {
        let mut at = start;
        for _ in 0..MAX_ROTATE_ATTEMPTS {
            let candidate = self.directory.join(snapshot_file_name(&at));
            if !candidate.exists() {
                return Ok(candidate);
            }
            at = at.checked_add(SignedDuration::from_millis(1))?;
        }

        Err(QuickloadError::CatalogSerialization(format!(
            "No free snapshot name in '{}' after {} attempts",
            self.directory.display(),
            MAX_ROTATE_ATTEMPTS
        )))
    }

    fn create_empty(&self, path: &Path) -> Result<Catalog> {
        let catalog = Catalog::empty(&self.creator);
        self.persist(&catalog, path)?;
        Ok(catalog)
    }
}

/// `products-YYYY-MM-DD_HH-MM-SS-mmm.xml`
pub fn snapshot_file_name(at: &Zoned) -> String {
    format!(
        "{CATALOG_PREFIX}-{}-{:03}{CATALOG_EXTENSION}",
        at.strftime("%Y-%m-%d_%H-%M-%S"),
        at.subsec_nanosecond() / 1_000_000
    )
}

fn is_catalog_file_name(name: &str) -> bool {
    name.starts_with(CATALOG_PREFIX) && name.ends_with(CATALOG_EXTENSION)
}

fn is_snapshot_name(name: &str) -> bool {
    name.starts_with(&format!("{CATALOG_PREFIX}-"))
}
