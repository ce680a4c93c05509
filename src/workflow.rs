use crate::catalog::{Catalog, CatalogStore, CatalogUpdater, SchemaCheck, UpdateOutcome};
use crate::config::CatalogConfig;
use crate::error::{QuickloadError, Result};
use crate::form::ProductForm;
use crate::interaction::ReviewPrompt;
use colored::Colorize;
use std::path::Path;

/// Add a product to a new catalog snapshot
pub fn execute_add(config: &CatalogConfig, form: &ProductForm, interactive: bool) -> Result<()> {
    println!("{}", "Adding product to catalog...".cyan().bold());

    println!("\n{}", "1. Checking product input...".yellow());
    let form = form.validate()?;
    let steps = form.build_steps();
    println!("{}", format!("✓ {}", form.summary()).green());

    if !ReviewPrompt::new(interactive).confirm(&form)? {
        return Err(QuickloadError::UserCancelled);
    }

    println!("\n{}", "2. Opening catalog directory...".yellow());
    let store = CatalogStore::open(config)?;
    println!("   Directory: {}", store.directory().display().to_string().bright_cyan());
    print_schema_location(store.schema().schema_file());

    println!("\n{}", "3. Writing catalog snapshot...".yellow());
    let outcome = CatalogUpdater::new(&store).run(&form.name, &form.description, &steps)?;

    match outcome {
        UpdateOutcome::AlreadyExists { name, catalog } => {
            println!(
                "{}",
                format!(
                    "⚠ Product '{}' with this workplan already exists in {}",
                    name,
                    file_name(&catalog)
                )
                .yellow()
            );
            println!("\n{}", "No new snapshot was written".yellow());
        }
        UpdateOutcome::Written {
            source,
            snapshot,
            schema,
        } => {
            println!("   Based on: {}", file_name(&source).dimmed());
            println!(
                "{}",
                format!("✓ Snapshot written: {}", file_name(&snapshot)).green()
            );
            print_schema_result(&schema);
            println!("\n{}", "✨ Product added successfully!".green().bold());
        }
    }

    Ok(())
}

/// List all products in the newest catalog without modifying it
pub fn execute_list(config: &CatalogConfig) -> Result<()> {
    println!("{}", "Listing products in catalog...".cyan().bold());

    let store = CatalogStore::open(config)?;
    let path = store.locate_catalog()?;
    if !path.exists() {
        println!(
            "\n{}",
            format!("No catalog found in {}", store.directory().display()).yellow()
        );
        return Ok(());
    }

    println!("\n{}", format!("Reading {}...", file_name(&path)).yellow());
    let catalog = store.load_existing(&path)?;
    print_catalog(&catalog);

    Ok(())
}

/// Validate the newest catalog against the schema
pub fn execute_validate(config: &CatalogConfig) -> Result<()> {
    println!("{}", "Validating catalog...".cyan().bold());

    let store = CatalogStore::open(config)?;
    let path = store.locate_catalog()?;
    if !path.exists() {
        return Err(QuickloadError::CatalogParsing(format!(
            "No catalog found in {}",
            store.directory().display()
        )));
    }

    println!("\n{}", format!("Checking {}...", file_name(&path)).yellow());
    print_schema_location(store.schema().schema_file());

    match store.schema().check_file(&path) {
        SchemaCheck::Invalid(problems) => {
            for problem in &problems {
                println!("   {} {}", "✗".red(), problem);
            }
            Err(QuickloadError::SchemaValidation(format!(
                "{} problem(s) in {}",
                problems.len(),
                file_name(&path)
            )))
        }
        check => {
            print_schema_result(&check);
            Ok(())
        }
    }
}

fn print_catalog(catalog: &Catalog) {
    println!(
        "   Version {} · created by {}",
        catalog.version().bright_cyan(),
        catalog.creator().bright_cyan()
    );

    let products = catalog.products();
    if products.is_empty() {
        println!("\n{}", "The catalog contains no products".yellow());
        return;
    }

    println!(
        "\n{}",
        format!("📦 Products ({}):", products.len()).cyan().bold()
    );
    for product in &products {
        println!(
            "\n  • {} {}",
            product.name.white().bold(),
            product.description.dimmed()
        );
        match &product.workplan {
            Some(workplan) => {
                for step in &workplan.steps {
                    println!(
                        "      {:>4}  {} ({}) {}",
                        step.number,
                        step.function.bright_cyan(),
                        step.parameter,
                        step.description
                    );
                }
            }
            None => println!("      {}", "(no workplan)".dimmed()),
        }
    }
}

fn print_schema_location(schema_file: &Path) {
    if schema_file.is_file() {
        println!("   Schema: {}", schema_file.display().to_string().dimmed());
    } else {
        println!(
            "   {}",
            format!("Schema {} not found, validation skipped", schema_file.display()).dimmed()
        );
    }
}

fn print_schema_result(check: &SchemaCheck) {
    match check {
        SchemaCheck::Valid => println!("{}", "✓ Catalog matches the schema".green()),
        SchemaCheck::Skipped => println!("{}", "   Schema check skipped".dimmed()),
        SchemaCheck::Invalid(problems) => {
            println!(
                "{}",
                "⚠ Warning: the written catalog does not match the schema".red()
            );
            for problem in problems {
                println!("   • {}", problem.dimmed());
            }
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{Distribution, Workpiece};
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn config_for(dir: &Path) -> CatalogConfig {
        CatalogConfig {
            directory: dir.to_path_buf(),
            ..CatalogConfig::default()
        }
    }

    fn form(name: &str) -> ProductForm {
        ProductForm {
            name: name.to_string(),
            description: "demo".to_string(),
            workpiece: Workpiece::Red,
            mount_cap: true,
            check_colour: true,
            distribution: Distribution::National,
        }
    }

    fn snapshots(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with("products-"))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn add_writes_one_snapshot_per_new_product() {
        let dir = tempdir().unwrap();
        let config = config_for(dir.path());

        execute_add(&config, &form("Widget A"), false).unwrap();
        execute_add(&config, &form("Widget A"), false).unwrap();
        assert_eq!(snapshots(dir.path()).len(), 1);

        execute_add(&config, &form("Widget B"), false).unwrap();
        assert_eq!(snapshots(dir.path()).len(), 2);
    }

    #[test]
    fn add_rejects_blank_name_before_touching_disk() {
        let dir = tempdir().unwrap();
        let err = execute_add(&config_for(dir.path()), &form("  "), false).unwrap_err();

        assert!(matches!(err, QuickloadError::FormValidation(_)));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn add_rejects_schema_outside_catalog_directory() {
        let dir = tempdir().unwrap();
        let config = CatalogConfig {
            schema_file: PathBuf::from("../products.xsd"),
            ..config_for(dir.path())
        };

        let err = execute_add(&config, &form("Widget A"), false).unwrap_err();
        assert!(matches!(err, QuickloadError::DirectoryValidation(_)));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn list_does_not_create_catalog() {
        let dir = tempdir().unwrap();
        execute_list(&config_for(dir.path())).unwrap();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn list_reports_corrupt_catalog() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("products.xml"), "<Products>").unwrap();
        assert!(execute_list(&config_for(dir.path())).is_err());
    }

    #[test]
    fn validate_fails_for_invalid_catalog() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("products.xsd"),
            include_str!("../schema/products.xsd"),
        )
        .unwrap();
        fs::write(dir.path().join("products.xml"), "<Products/>").unwrap();

        let err = execute_validate(&config_for(dir.path())).unwrap_err();
        assert!(matches!(err, QuickloadError::SchemaValidation(_)));
    }

    #[test]
    fn validate_without_catalog_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(execute_validate(&config_for(dir.path())).is_err());
    }
}
