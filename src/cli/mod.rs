//! CLI module for subscriber-tables
//!
//! Every command connects to the configured table store, makes sure the
//! subscriber table exists and then runs one operation:
//! - `import`: load records from a JSON file
//! - `search`: query by keys, name prefix and minimum balance
//! - `update`: change fields of one record under optimistic concurrency
//! - `delete` / `delete-all`: remove one record or all of them

pub mod bootstrap;
pub mod delete;
pub mod import;
pub mod search;
pub mod update;

use clap::{Parser, Subcommand};

/// Subscriber records on a cloud key-value table store
#[derive(Parser, Debug)]
#[command(name = "subscriber-tables")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Import subscribers from a JSON file
    Import(import::ImportArgs),

    /// Search subscribers
    Search(search::SearchArgs),

    /// Update fields of one subscriber
    Update(update::UpdateArgs),

    /// Delete one subscriber
    Delete(delete::DeleteArgs),

    /// Delete every subscriber in the table
    DeleteAll(delete::DeleteAllArgs),
}
