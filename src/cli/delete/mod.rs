//! Delete commands - single record and whole table

use clap::Args;

use crate::cli::bootstrap::bootstrap;

/// Arguments for the delete command
#[derive(Args, Clone, Debug)]
pub struct DeleteArgs {
    pub partition_key: String,

    pub row_key: String,
}

/// Arguments for the delete-all command
#[derive(Args, Clone, Debug, Default)]
pub struct DeleteAllArgs {
    /// Confirm removal of every record in the table
    #[arg(long)]
    pub yes: bool,
}

/// Run the delete command
pub async fn run(args: DeleteArgs) -> anyhow::Result<()> {
    let (_, service) = bootstrap(false).await?;

    if service
        .delete_record(&args.partition_key, &args.row_key)
        .await?
    {
        println!("Deleted {}/{}", args.partition_key, args.row_key);
    } else {
        println!("{}/{} not found, nothing deleted", args.partition_key, args.row_key);
    }

    Ok(())
}

/// Run the delete-all command
pub async fn run_all(args: DeleteAllArgs) -> anyhow::Result<()> {
    if !args.yes {
        anyhow::bail!("Refusing to delete every record without --yes");
    }

    let (_, service) = bootstrap(false).await?;

    let deleted = service.delete_all().await?;
    println!("Deleted {} subscriber(s) from '{}'", deleted, service.table_name());

    Ok(())
}
