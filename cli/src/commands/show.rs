use anyhow::{Context, Result};
use bq_client::{BigqueryClient, Reference};
use structopt::StructOpt;

use crate::printer::Printer;

#[derive(Debug, StructOpt)]
pub struct ShowArgs {
    #[structopt(short = "j", long = "job")]
    /// If set, interpret this identifier as a job id
    job: bool,

    #[structopt(short = "d", long = "dataset")]
    /// Show dataset with this name
    dataset: bool,

    #[structopt(name = "identifier")]
    identifier: Option<String>,
}

pub fn run(args: &ShowArgs, client: &BigqueryClient, printer: &Printer) -> Result<()> {
    let identifier = args.identifier.as_deref().unwrap_or("");

    let reference = if args.job {
        Reference::Job(client.resolve_job_reference(identifier)?)
    } else if args.dataset {
        Reference::Dataset(client.resolve_dataset_reference(identifier)?)
    } else {
        client
            .resolve_reference(identifier)
            .context("Must provide an identifier for show.")?
    };

    let info = client
        .get_object_info(&reference)
        .context("Operation to show object has failed.")?;
    printer.print_object_info(&reference, info)
}
