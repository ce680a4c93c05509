pub mod model;
pub mod schema;
pub mod store;
pub mod updater;
pub mod xml_tree;

pub use model::{Catalog, StepSpec};
pub use schema::SchemaCheck;
pub use store::CatalogStore;
pub use updater::{CatalogUpdater, UpdateOutcome};
