use anyhow::{bail, Context, Result};
use bq_client::{BigqueryClient, Reference};
use log::info;
use structopt::StructOpt;

use crate::utils::confirm;

#[derive(Debug, StructOpt)]
pub struct RmArgs {
    #[structopt(short = "d", long = "dataset")]
    /// Remove dataset described by this identifier
    dataset: bool,

    #[structopt(short = "t", long = "table")]
    /// Remove table described by this identifier
    table: bool,

    #[structopt(short = "f", long = "force")]
    /// Ignore missing objects, don't prompt
    force: bool,

    #[structopt(short = "r", long = "recursive")]
    /// Remove dataset and any tables it may contain
    recursive: bool,

    #[structopt(name = "identifier")]
    identifier: String,
}

pub fn run(args: &RmArgs, client: &BigqueryClient) -> Result<()> {
    if args.dataset && args.table {
        bail!("Cannot specify more than one of -d and -t.");
    }
    if args.identifier.is_empty() {
        bail!("Must provide an identifier for rm.");
    }

    let reference = if args.table {
        Reference::Table(client.resolve_table_reference(&args.identifier)?)
    } else if args.dataset {
        Reference::Dataset(client.resolve_dataset_reference(&args.identifier)?)
    } else {
        match client.resolve_reference(&args.identifier)? {
            reference @ (Reference::Dataset(_) | Reference::Table(_)) => reference,
            _ => bail!("Invalid identifier `{}` for rm.", args.identifier),
        }
    };

    if matches!(reference, Reference::Table(_)) && args.recursive {
        bail!("Cannot specify -r with a table reference.");
    }

    if !args.force {
        let exists = match &reference {
            Reference::Dataset(dataset) => client
                .dataset_exists(dataset)
                .context("Could not check whether the dataset exists.")?,
            Reference::Table(table) => client
                .table_exists(table)
                .context("Could not check whether the table exists.")?,
            _ => false,
        };
        if exists && !confirm(&format!("rm: remove {} `{}`?", reference.kind(), reference))? {
            info!("NOT deleting `{reference}`, exiting.");
            return Ok(());
        }
    }

    match reference {
        Reference::Dataset(dataset) => {
            client
                .delete_dataset(
                    &dataset,
                    args.force,
                    if args.recursive { Some(true) } else { None },
                )
                .context("Operation to delete dataset has failed.")?;
            info!("Deleted dataset.");
        }
        Reference::Table(table) => {
            client
                .delete_table(&table, args.force)
                .context("Operation to delete table has failed.")?;
            info!("Deleted table.");
        }
        _ => {}
    }
    Ok(())
}
