//! Algorithm registry commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use tator_core::config::AppConfig;
use tator_core::error::AppError;
use tator_core::types::AlgorithmId;
use tator_entity::algorithm::Algorithm;

use crate::output::{self, OutputFormat};

/// Arguments for algorithm commands
#[derive(Debug, Args)]
pub struct AlgorithmArgs {
    /// Algorithm subcommand
    #[command(subcommand)]
    pub command: AlgorithmCommand,
}

/// Algorithm subcommands
#[derive(Debug, Subcommand)]
pub enum AlgorithmCommand {
    /// Register an algorithm
    Add {
        /// Display name
        #[arg(long)]
        name: String,
        /// Most jobs of this algorithm allowed to run at once
        #[arg(long, default_value_t = 1)]
        max_concurrent: i32,
    },
    /// Show one algorithm
    Show {
        /// Algorithm id
        id: i64,
    },
}

#[derive(Debug, Serialize, Tabled)]
struct AlgorithmRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Max Concurrent")]
    max_concurrent: i32,
}

impl From<&Algorithm> for AlgorithmRow {
    fn from(a: &Algorithm) -> Self {
        Self {
            id: a.id.get(),
            name: a.name.clone(),
            max_concurrent: a.max_concurrent,
        }
    }
}

/// Execute algorithm commands
pub async fn execute(
    args: &AlgorithmArgs,
    config: AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let stores = super::open_stores(&config).await?;

    match &args.command {
        AlgorithmCommand::Add {
            name,
            max_concurrent,
        } => {
            let algorithm = stores.algorithms.create(name, *max_concurrent).await?;
            output::print_item(&AlgorithmRow::from(&algorithm), format);
        }
        AlgorithmCommand::Show { id } => {
            let algorithm = stores
                .algorithms
                .find_by_id(AlgorithmId(*id))
                .await?
                .ok_or_else(|| AppError::not_found(format!("Algorithm {id} not found")))?;
            output::print_item(&AlgorithmRow::from(&algorithm), format);
        }
    }
    Ok(())
}
