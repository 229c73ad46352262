//! Update command - read-modify-write of a single subscriber

use clap::Args;

use crate::cli::bootstrap::bootstrap;
use crate::domain::subscriber::format_balance;
use crate::infrastructure::subscriber::UpdateSubscriberRequest;

/// Arguments for the update command. Only the given fields are changed.
#[derive(Args, Clone, Debug, Default)]
pub struct UpdateArgs {
    pub partition_key: String,

    pub row_key: String,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub gender: Option<String>,

    #[arg(long)]
    pub company: Option<String>,

    #[arg(long)]
    pub phone: Option<String>,

    #[arg(long)]
    pub address: Option<String>,

    #[arg(long)]
    pub about: Option<String>,

    #[arg(long)]
    pub email: Option<String>,

    #[arg(long)]
    pub age: Option<i32>,

    #[arg(long)]
    pub balance: Option<f64>,

    /// Set the active flag (`true` or `false`)
    #[arg(long)]
    pub active: Option<bool>,
}

impl From<&UpdateArgs> for UpdateSubscriberRequest {
    fn from(args: &UpdateArgs) -> Self {
        Self {
            name: args.name.clone(),
            gender: args.gender.clone(),
            company: args.company.clone(),
            phone: args.phone.clone(),
            address: args.address.clone(),
            about: args.about.clone(),
            email: args.email.clone(),
            age: args.age,
            balance: args.balance,
            is_active: args.active,
        }
    }
}

/// Run the update command
pub async fn run(args: UpdateArgs) -> anyhow::Result<()> {
    let changes = UpdateSubscriberRequest::from(&args);
    if changes.is_empty() {
        anyhow::bail!("Nothing to update, pass at least one field option");
    }

    let (_, service) = bootstrap(false).await?;

    let updated = service
        .update_record(&args.partition_key, &args.row_key, &changes)
        .await?;

    println!(
        "Updated {} (name: {}, balance: {})",
        updated.identity(),
        updated.name.as_deref().unwrap_or("-"),
        updated
            .balance
            .map(format_balance)
            .unwrap_or_else(|| "-".to_string())
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_to_request() {
        let args = UpdateArgs {
            partition_key: "customers".to_string(),
            row_key: "R1".to_string(),
            phone: Some("555-0101".to_string()),
            balance: Some(12.5),
            active: Some(false),
            ..Default::default()
        };

        let request = UpdateSubscriberRequest::from(&args);
        assert_eq!(request.phone.as_deref(), Some("555-0101"));
        assert_eq!(request.balance, Some(12.5));
        assert_eq!(request.is_active, Some(false));
        assert_eq!(request.name, None);
        assert!(!request.is_empty());
    }

    #[test]
    fn test_no_field_options_is_empty_request() {
        let args = UpdateArgs {
            partition_key: "customers".to_string(),
            row_key: "R1".to_string(),
            ..Default::default()
        };
        assert!(UpdateSubscriberRequest::from(&args).is_empty());
    }
}
