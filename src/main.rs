mod catalog;
mod cli;
mod config;
mod error;
mod form;
mod interaction;
mod utils;
mod workflow;

use clap::Parser;
use cli::{Cli, Commands};
use colored::Colorize;
use config::CatalogConfig;
use error::QuickloadError;
use form::ProductForm;
use std::process;

fn main() {
    let cli = Cli::parse();
    utils::logging::init(cli.verbose);

    let config = CatalogConfig::from_cli(&cli);

    let result = match cli.command {
        Commands::Add {
            name,
            description,
            workpiece,
            mount_cap,
            check_colour,
            distribution,
            interactive,
        } => {
            let form = ProductForm {
                name,
                description,
                workpiece,
                mount_cap,
                check_colour,
                distribution,
            };
            workflow::execute_add(&config, &form, interactive)
        }
        Commands::List => workflow::execute_list(&config),
        Commands::Validate => workflow::execute_validate(&config),
    };

    match result {
        Ok(()) => {}
        Err(QuickloadError::UserCancelled) => {
            println!("\n{}", "Cancelled; the catalog was not changed.".yellow());
        }
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            process::exit(1);
        }
    }
}
