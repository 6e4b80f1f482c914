use anyhow::{Context, Result};
use bq_client::{BigqueryClient, JobState, WriteDisposition};
use log::info;
use structopt::StructOpt;

use crate::commands::print_job_start_info;
use crate::utils::confirm;

#[derive(Debug, StructOpt)]
pub struct CpArgs {
    #[structopt(short = "n", long = "no-clobber")]
    /// Do not overwrite an existing table
    no_clobber: bool,

    #[structopt(short = "f", long = "force")]
    /// Ignore existing destination tables, don't prompt
    force: bool,

    #[structopt(name = "source_table")]
    source_table: String,

    #[structopt(name = "dest_table")]
    dest_table: String,
}

pub fn run(args: &CpArgs, client: &BigqueryClient, job_id: Option<&str>) -> Result<()> {
    let source = client.resolve_table_reference(&args.source_table)?;
    let destination = client.resolve_table_reference(&args.dest_table)?;

    let (write_disposition, ignore_already_exists) = if args.no_clobber {
        (WriteDisposition::WriteEmpty, true)
    } else {
        if !args.force
            && client
                .table_exists(&destination)
                .context("Could not check whether the destination table exists.")?
            && !confirm(&format!("cp: replace table `{destination}`?"))?
        {
            info!("NOT copying `{source}`, exiting.");
            return Ok(());
        }
        (WriteDisposition::WriteTruncate, false)
    };

    let copied = client
        .copy_table(
            &source,
            &destination,
            Some(write_disposition),
            ignore_already_exists,
            job_id,
        )
        .context("Operation to copy table has failed.")?;
    match copied {
        None => info!("Table `{destination}` already exists, skipping"),
        Some(job) if job.state() == Some(JobState::Done) => {
            info!("Table `{source}` successfully copied to `{destination}`");
        }
        Some(job) => print_job_start_info(&job),
    }
    Ok(())
}
