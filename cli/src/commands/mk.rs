use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use bq_client::{read_schema, BigqueryClient, Reference};
use log::info;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
pub struct MkArgs {
    #[structopt(short = "d", long = "dataset")]
    /// Create dataset with this name
    dataset: bool,

    #[structopt(short = "t", long = "table")]
    /// Create table with this name
    table: bool,

    #[structopt(short = "f", long = "force")]
    /// Ignore errors reporting that the object already exists
    force: bool,

    #[structopt(long = "description")]
    /// Description of the dataset or table
    description: Option<String>,

    #[structopt(long = "expiration")]
    /// Expiration time, in seconds from now, of a table
    expiration: Option<u64>,

    #[structopt(name = "identifier")]
    identifier: Option<String>,

    #[structopt(name = "schema")]
    /// Either a filename or a comma-separated list of fields in the form
    /// name[:type]
    schema: Option<String>,
}

pub fn run(args: &MkArgs, client: &BigqueryClient) -> Result<()> {
    if args.dataset && args.table {
        bail!("Cannot specify both -d and -t.");
    }
    let identifier = args.identifier.as_deref().unwrap_or("");

    let reference = if args.table {
        Reference::Table(client.resolve_table_reference(identifier)?)
    } else if args.dataset || identifier.is_empty() {
        Reference::Dataset(client.resolve_dataset_reference(identifier)?)
    } else {
        match client.resolve_reference(identifier)? {
            reference @ (Reference::Dataset(_) | Reference::Table(_)) => reference,
            _ => bail!("Invalid identifier `{}` for mk.", identifier),
        }
    };

    match reference {
        Reference::Dataset(dataset) => {
            if args.schema.is_some() {
                bail!("Cannot specify schema with a dataset.");
            }
            if args.expiration.is_some() {
                bail!("Cannot specify an expiration for a dataset.");
            }
            if client
                .dataset_exists(&dataset)
                .context("Could not check whether the dataset exists.")?
            {
                let message = format!("Dataset `{dataset}` already exists.");
                if !args.force {
                    bail!(message);
                }
                info!("{message}");
                return Ok(());
            }
            client
                .create_dataset(&dataset, true, args.description.as_deref())
                .context("Operation to create dataset has failed.")?;
            info!("Dataset `{dataset}` successfully created.");
        }
        Reference::Table(table) => {
            if client
                .table_exists(&table)
                .context("Could not check whether the table exists.")?
            {
                let message = format!("Table `{table}` already exists.");
                if !args.force {
                    bail!(message);
                }
                info!("{message}");
                return Ok(());
            }
            let schema = args.schema.as_deref().map(read_schema).transpose()?;
            let expiration_time = args.expiration.map(expiration_from_now);
            client
                .create_table(
                    &table,
                    true,
                    schema.as_ref(),
                    args.description.as_deref(),
                    expiration_time,
                )
                .context("Operation to create table has failed.")?;
            info!("Table `{table}` successfully created.");
        }
        _ => {}
    }
    Ok(())
}

/// Seconds from now to a millisecond epoch.
pub(crate) fn expiration_from_now(seconds: u64) -> i64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    ((now.as_secs() + seconds) * 1000) as i64
}
