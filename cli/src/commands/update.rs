use anyhow::{bail, Context, Result};
use bq_client::{read_schema, BigqueryClient, Reference};
use log::info;
use structopt::StructOpt;

use crate::commands::mk::expiration_from_now;

#[derive(Debug, StructOpt)]
pub struct UpdateArgs {
    #[structopt(short = "d", long = "dataset")]
    /// Update a dataset with this name
    dataset: bool,

    #[structopt(short = "t", long = "table")]
    /// Update a table with this name
    table: bool,

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

pub fn run(args: &UpdateArgs, client: &BigqueryClient) -> Result<()> {
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
            _ => bail!("Invalid identifier `{}` for update.", identifier),
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
            client
                .update_dataset(&dataset, args.description.as_deref())
                .context("Operation to update dataset has failed.")?;
            info!("Dataset `{dataset}` successfully updated.");
        }
        Reference::Table(table) => {
            let schema = args.schema.as_deref().map(read_schema).transpose()?;
            let expiration_time = args.expiration.map(expiration_from_now);
            client
                .update_table(
                    &table,
                    schema.as_ref(),
                    args.description.as_deref(),
                    expiration_time,
                )
                .context("Operation to update table has failed.")?;
            info!("Table `{table}` successfully updated.");
        }
        _ => {}
    }
    Ok(())
}
