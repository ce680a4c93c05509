use crate::config::{DEFAULT_CREATOR, DEFAULT_SCHEMA_FILE};
use crate::form::{Distribution, Workpiece};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "quickload",
    about = "QuickLoad - record products and their workplans into the XML product catalog",
    version
)]
pub struct Cli {
    /// Directory holding the products*.xml catalogs (defaults to current directory)
    #[arg(short, long, default_value = ".", global = true)]
    pub path: String,

    /// Schema file used to validate catalogs; validation is skipped when it does not exist
    #[arg(long, value_name = "FILE", default_value = DEFAULT_SCHEMA_FILE, global = true)]
    pub schema: String,

    /// Creator attribute written into newly created catalogs
    #[arg(long, default_value = DEFAULT_CREATOR, global = true)]
    pub creator: String,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add a product and its workplan to a new catalog snapshot
    Add {
        /// Product name
        #[arg(long)]
        name: String,

        /// Product description
        #[arg(long)]
        description: String,

        /// Workpiece released at the start of the workplan
        #[arg(long, value_enum)]
        workpiece: Workpiece,

        /// Mount a cap on the workpiece
        #[arg(long)]
        mount_cap: bool,

        /// Check the workpiece colour
        #[arg(long, alias = "check-color")]
        check_colour: bool,

        /// Distribution region
        #[arg(long, value_enum)]
        distribution: Distribution,

        /// Review the product before it is written
        #[arg(short, long)]
        interactive: bool,
    },

    /// List all products in the newest catalog
    List,

    /// Validate the newest catalog against the schema
    Validate,
}
