use anyhow::{Context, Result};
use bq_client::{BigqueryClient, JobState};
use log::info;
use structopt::StructOpt;

use crate::commands::print_job_start_info;
use crate::utils::normalize_field_delimiter;

#[derive(Debug, StructOpt)]
pub struct ExtractArgs {
    #[structopt(name = "source_table")]
    /// Source table to extract
    source_table: String,

    #[structopt(name = "destination_uri")]
    /// Cloud storage URI, or a comma-separated list of URIs
    destination_uri: String,

    #[structopt(short = "F", long = "field-delimiter")]
    /// The character that indicates the boundary between columns in the
    /// output file. "\t" and "tab" are accepted names for tab.
    field_delimiter: Option<String>,
}

pub fn run(args: &ExtractArgs, client: &BigqueryClient, job_id: Option<&str>) -> Result<()> {
    let source = client.resolve_table_reference(&args.source_table)?;
    let destination_uris = args
        .destination_uri
        .split(',')
        .map(str::to_owned)
        .collect();
    let field_delimiter = args
        .field_delimiter
        .as_deref()
        .map(normalize_field_delimiter);

    let job = client
        .extract(&source, destination_uris, field_delimiter, job_id)
        .context("Operation to extract table has failed.")?;
    if job.state() == Some(JobState::Done) {
        info!("Successfully extracted `{source}`");
    } else {
        print_job_start_info(&job);
    }
    Ok(())
}
