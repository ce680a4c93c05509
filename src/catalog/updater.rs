use crate::catalog::model::StepSpec;
use crate::catalog::schema::SchemaCheck;
use crate::catalog::store::CatalogStore;
use crate::error::Result;
use std::path::PathBuf;
use tracing::{info, warn};

/// Working file the new catalog is written to before it receives its snapshot
/// name. The leading dot keeps it out of the `products*.xml` selection.
pub const STAGING_FILE_NAME: &str = ".products-staging.xml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The same product with the same workplan is already recorded; nothing was written
    AlreadyExists { name: String, catalog: PathBuf },
    Written {
        source: PathBuf,
        snapshot: PathBuf,
        schema: SchemaCheck,
    },
}

/// Adds one product to the newest catalog and leaves the result in a new snapshot.
pub struct CatalogUpdater<'a> {
    store: &'a CatalogStore,
}

impl<'a> CatalogUpdater<'a> {
    pub fn new(store: &'a CatalogStore) -> Self {
        Self { store }
    }

    pub fn run(&self, name: &str, description: &str, steps: &[StepSpec]) -> Result<UpdateOutcome> {
        let source = self.store.locate_catalog()?;
        let mut catalog = self.store.load_or_create(&source)?;

        if catalog.exists(name, steps) {
            info!(product = name, catalog = %source.display(), "product already exists");
            return Ok(UpdateOutcome::AlreadyExists {
                name: name.to_string(),
                catalog: source,
            });
        }

        catalog.append(name, description, steps);
        info!(
            product = name,
            steps = steps.len(),
            products = catalog.products().len(),
            "product added"
        );

        let staging = self.store.directory().join(STAGING_FILE_NAME);
        self.store.persist(&catalog, &staging)?;
        let snapshot = self.store.rotate(&staging)?;

        let schema = self.store.schema().check_file(&snapshot);
        if let SchemaCheck::Invalid(problems) = &schema {
            warn!(
                snapshot = %snapshot.display(),
                problems = %problems.join("; "),
                "written catalog does not match schema"
            );
        }

        Ok(UpdateOutcome::Written {
            source,
            snapshot,
            schema,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CatalogConfig;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    const PRODUCTS_XSD: &str = include_str!("../../schema/products.xsd");

    fn store_in(dir: &TempDir) -> CatalogStore {
        let config = CatalogConfig {
            directory: dir.path().to_path_buf(),
            ..CatalogConfig::default()
        };
        CatalogStore::open(&config).unwrap()
    }

    fn red_release() -> StepSpec {
        StepSpec::new("RR", 1, "release red workpiece")
    }

    fn snapshot_of(outcome: UpdateOutcome) -> PathBuf {
        match outcome {
            UpdateOutcome::Written { snapshot, .. } => snapshot,
            other => panic!("expected a written snapshot, got {other:?}"),
        }
    }

    #[test]
    fn first_run_creates_default_and_snapshot() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        let outcome = CatalogUpdater::new(&store)
            .run("Widget A", "test", &[red_release()])
            .unwrap();

        let UpdateOutcome::Written {
            source,
            snapshot,
            schema,
        } = outcome
        else {
            panic!("expected a written snapshot");
        };
        assert_eq!(source.file_name().unwrap(), "products.xml");
        assert_eq!(schema, SchemaCheck::Skipped);
        assert!(!store.directory().join(STAGING_FILE_NAME).exists());

        let empty = store.load_existing(&source).unwrap();
        assert!(empty.products().is_empty());

        let written = store.load_existing(&snapshot).unwrap();
        let products = written.products();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "Widget A");
        assert!(written.exists("Widget A", &[red_release()]));
    }

    #[test]
    fn second_run_with_same_product_is_rejected() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        let updater = CatalogUpdater::new(&store);

        let snapshot = snapshot_of(updater.run("Widget A", "test", &[red_release()]).unwrap());
        let before = fs::read_to_string(&snapshot).unwrap();

        let outcome = updater.run("Widget A", "other text", &[red_release()]).unwrap();
        assert_eq!(
            outcome,
            UpdateOutcome::AlreadyExists {
                name: "Widget A".to_string(),
                catalog: snapshot.clone(),
            }
        );
        assert_eq!(fs::read_to_string(&snapshot).unwrap(), before);
    }

    #[test]
    fn runs_build_on_latest_snapshot_without_touching_it() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        let updater = CatalogUpdater::new(&store);

        let first = snapshot_of(updater.run("Widget A", "a", &[red_release()]).unwrap());
        let first_content = fs::read_to_string(&first).unwrap();

        let extended = [red_release(), StepSpec::new("MC", 1, "mount cap")];
        let second = snapshot_of(updater.run("Widget A", "b", &extended).unwrap());

        assert_ne!(first, second);
        assert_eq!(fs::read_to_string(&first).unwrap(), first_content);

        let catalog = store.load_existing(&second).unwrap();
        let products = catalog.products();
        assert_eq!(products.len(), 2);
        assert!(catalog.exists("Widget A", &[red_release()]));
        assert!(catalog.exists("Widget A", &extended));

        let numbers: Vec<&str> = products[1]
            .workplan
            .as_ref()
            .unwrap()
            .steps
            .iter()
            .map(|step| step.number.as_str())
            .collect();
        assert_eq!(numbers, vec!["10", "20"]);
    }

    #[test]
    fn written_snapshot_passes_bundled_schema() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("products.xsd"), PRODUCTS_XSD).unwrap();
        let store = store_in(&dir);

        let outcome = CatalogUpdater::new(&store)
            .run("Widget B", "checked", &[red_release()])
            .unwrap();

        match outcome {
            UpdateOutcome::Written { schema, .. } => assert_eq!(schema, SchemaCheck::Valid),
            other => panic!("expected a written snapshot, got {other:?}"),
        }
    }

    #[test]
    fn schema_mismatch_after_write_is_only_a_warning() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        let updater = CatalogUpdater::new(&store);
        updater.run("Widget A", "a", &[red_release()]).unwrap();

        // A schema that loaded catalogs pass but new products cannot satisfy
        fs::write(
            dir.path().join("products.xsd"),
            PRODUCTS_XSD.replace(
                r#"<xs:element name="Product" type="ProductType" minOccurs="0" maxOccurs="unbounded"/>"#,
                r#"<xs:element name="Product" type="ProductType" minOccurs="0" maxOccurs="1"/>"#,
            ),
        )
        .unwrap();

        let outcome = updater
            .run("Widget C", "c", &[StepSpec::new("RB", 1, "release black workpiece")])
            .unwrap();

        match outcome {
            UpdateOutcome::Written { schema, snapshot, .. } => {
                assert!(!schema.is_acceptable());
                assert_eq!(store.load_existing(&snapshot).unwrap().products().len(), 2);
            }
            other => panic!("expected a written snapshot, got {other:?}"),
        }
    }

    #[test]
    fn snapshot_keeps_content_the_tool_does_not_know() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("products.xml"),
            r#"<?xml version="1.0" encoding="utf-8"?>
<Products Version="1.0" Creator="Festo Didactic" Site="Line4">
  <Product>
    <ProductName>Old</ProductName>
    <ProductDescription>kept</ProductDescription>
    <Picture>old.png</Picture>
    <Workplan>
      <Step>
        <Number>10</Number>
        <Function>RR</Function>
        <Parameter>1</Parameter>
        <FunctionDescription>release red workpiece</FunctionDescription>
        <ErrorStep>90</ErrorStep>
      </Step>
    </Workplan>
  </Product>
</Products>
"#,
        )
        .unwrap();
        let store = store_in(&dir);

        let snapshot = snapshot_of(
            CatalogUpdater::new(&store)
                .run("New", "added", &[StepSpec::new("SN", 1, "national distribution")])
                .unwrap(),
        );

        let written = fs::read_to_string(&snapshot).unwrap();
        assert!(written.contains(r#"Site="Line4""#));
        assert!(written.contains("<Picture>old.png</Picture>"));
        assert!(written.contains("<ErrorStep>90</ErrorStep>"));
        assert!(written.contains("<ProductName>New</ProductName>"));
    }

    #[test]
    fn catalog_with_loose_step_number_is_extended_not_replaced() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("products.xml"),
            r#"<Products Version="1.0" Creator="Festo Didactic"><Product><ProductName>Keep me</ProductName><ProductDescription/><Workplan><Step><Function>RR</Function><Parameter>1</Parameter><FunctionDescription>release red workpiece</FunctionDescription></Step></Workplan></Product></Products>"#,
        )
        .unwrap();
        let store = store_in(&dir);

        let snapshot = snapshot_of(
            CatalogUpdater::new(&store)
                .run("New", "added", &[red_release()])
                .unwrap(),
        );

        let names: Vec<String> = store
            .load_existing(&snapshot)
            .unwrap()
            .products()
            .into_iter()
            .map(|product| product.name)
            .collect();
        assert_eq!(names, vec!["Keep me", "New"]);
    }

    #[test]
    fn duplicate_is_found_in_products_separated_by_other_elements() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("products.xml"),
            r#"<Products Version="1.0" Creator="Festo Didactic"><Product><ProductName>Other</ProductName></Product><Note/><Product><ProductName>Widget A</ProductName><ProductDescription/><Workplan><Step><Number>10</Number><Function>RR</Function><Parameter>1</Parameter><FunctionDescription>release red workpiece</FunctionDescription></Step></Workplan></Product></Products>"#,
        )
        .unwrap();
        let store = store_in(&dir);

        let outcome = CatalogUpdater::new(&store)
            .run("Widget A", "again", &[red_release()])
            .unwrap();
        assert!(matches!(outcome, UpdateOutcome::AlreadyExists { .. }));
    }
}
