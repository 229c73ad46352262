use clap::Parser;
use subscriber_tables::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Import(args) => cli::import::run(args).await,
        Command::Search(args) => cli::search::run(args).await,
        Command::Update(args) => cli::update::run(args).await,
        Command::Delete(args) => cli::delete::run(args).await,
        Command::DeleteAll(args) => cli::delete::run_all(args).await,
    }
}
