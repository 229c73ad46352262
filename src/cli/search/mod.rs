//! Search command - runs a filtered query and prints the matches

use clap::Args;

use crate::cli::bootstrap::bootstrap;
use crate::domain::subscriber::{format_balance, Subscriber, SubscriberFilter};
use crate::infrastructure::subscriber::MAX_QUERY_RESULTS;

/// Arguments for the search command. Every criterion is optional; omitting all
/// of them lists the whole table.
#[derive(Args, Clone, Debug, Default)]
pub struct SearchArgs {
    #[arg(long)]
    pub partition_key: Option<String>,

    #[arg(long)]
    pub row_key: Option<String>,

    /// Match names starting with this text (case-sensitive)
    #[arg(long)]
    pub name_prefix: Option<String>,

    /// Only records whose balance is at least this amount
    #[arg(long)]
    pub min_balance: Option<f64>,

    /// Print results as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

impl SearchArgs {
    pub fn to_filter(&self) -> SubscriberFilter {
        let mut filter = SubscriberFilter::new();

        if let Some(ref partition_key) = self.partition_key {
            filter = filter.with_partition_key(partition_key.as_str());
        }
        if let Some(ref row_key) = self.row_key {
            filter = filter.with_row_key(row_key.as_str());
        }
        if let Some(ref prefix) = self.name_prefix {
            filter = filter.with_name_prefix(prefix.as_str());
        }
        if let Some(min_balance) = self.min_balance {
            filter = filter.with_min_balance(min_balance);
        }

        filter
    }
}

/// Run the search command
pub async fn run(args: SearchArgs) -> anyhow::Result<()> {
    let (_, service) = bootstrap(false).await?;

    let filter = args.to_filter();
    let subscribers = service.query(&filter).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&subscribers)?);
        return Ok(());
    }

    println!("Filter: {}", filter.describe());
    println!("{}", render_table(&subscribers));
    println!("{}", summary(subscribers.len()));

    Ok(())
}

fn summary(count: usize) -> String {
    if count >= MAX_QUERY_RESULTS {
        format!(
            "{} match(es), result limit reached (further matches were not read)",
            count
        )
    } else {
        format!("{} match(es)", count)
    }
}

fn render_table(subscribers: &[Subscriber]) -> String {
    let header = [
        "PartitionKey",
        "RowKey",
        "Name",
        "Email",
        "Age",
        "Balance",
        "Active",
    ];

    let rows: Vec<[String; 7]> = subscribers
        .iter()
        .map(|s| {
            [
                s.partition_key.clone(),
                s.row_key.clone(),
                s.name.clone().unwrap_or_default(),
                s.email.clone().unwrap_or_default(),
                s.age.map(|a| a.to_string()).unwrap_or_default(),
                s.balance.map(format_balance).unwrap_or_default(),
                s.is_active.map(|a| a.to_string()).unwrap_or_default(),
            ]
        })
        .collect();

    let mut widths = header.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let format_row = |cells: &[String]| {
        cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = width))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![format_row(&header.map(String::from))];
    lines.extend(rows.iter().map(|row| format_row(row)));
    lines.join("\n")
}
