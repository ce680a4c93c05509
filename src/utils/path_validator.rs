use crate::error::{QuickloadError, Result};
use std::path::{Component, Path, PathBuf};

/// System locations a catalog directory may never point into
const SYSTEM_DIRS: &[&str] = &["/etc", "/sys", "/proc", "/dev", "/boot"];

/// Checks the paths handed in on the command line before anything is read or written.
pub struct PathValidator;

impl PathValidator {
    /// Canonical catalog directory: it must exist, be a writable directory and lie
    /// outside the system locations.
    pub fn catalog_dir(path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();
        let directory = path.canonicalize().map_err(|e| {
            QuickloadError::DirectoryValidation(format!(
                "Catalog directory '{}' is not accessible: {e}",
                path.display()
            ))
        })?;

        let metadata = directory.metadata()?;
        if !metadata.is_dir() {
            return Err(QuickloadError::DirectoryValidation(format!(
                "'{}' is not a directory",
                directory.display()
            )));
        }

        if let Some(system) = system_dir_containing(&directory) {
            return Err(QuickloadError::DirectoryValidation(format!(
                "Catalogs cannot be kept under the system directory '{system}'"
            )));
        }

        if metadata.permissions().readonly() {
            return Err(QuickloadError::DirectoryValidation(format!(
                "Catalog directory '{}' is read-only",
                directory.display()
            )));
        }

        Ok(directory)
    }

    /// Resolves the `--schema` value against the catalog directory.
    ///
    /// The schema has to stay inside the directory: absolute paths and `..` are
    /// rejected, and an existing file must not resolve (through a symlink) to a
    /// place outside it. A schema that does not exist yet is accepted.
    pub fn schema_file(directory: &Path, schema: &Path) -> Result<PathBuf> {
        let relative = schema
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
        if !relative || schema.as_os_str().is_empty() {
            return Err(QuickloadError::DirectoryValidation(format!(
                "Schema '{}' must be a path inside the catalog directory",
                schema.display()
            )));
        }

        let resolved = directory.join(schema);
        if let Ok(target) = resolved.canonicalize() {
            if !target.starts_with(directory) {
                return Err(QuickloadError::DirectoryValidation(format!(
                    "Schema '{}' resolves to '{}', outside the catalog directory",
                    schema.display(),
                    target.display()
                )));
            }
        }

        Ok(resolved)
    }
}

fn system_dir_containing(directory: &Path) -> Option<&'static str> {
    SYSTEM_DIRS.iter().copied().find(|system| {
        let system_path = Path::new(system);
        directory.starts_with(system_path)
            || system_path
                .canonicalize()
                .is_ok_and(|canonical| directory.starts_with(canonical))
    })
}
