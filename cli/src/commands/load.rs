use anyhow::{Context, Result};
use bq_client::{
    read_schema, BigqueryClient, JobState, LoadOptions, UploadPayload, WriteDisposition,
};
use log::info;
use structopt::StructOpt;

use crate::commands::print_job_start_info;
use crate::utils::normalize_field_delimiter;

#[derive(Debug, StructOpt)]
pub struct LoadArgs {
    #[structopt(name = "destination_table")]
    /// Fully-qualified table to create, or append to if it already exists
    destination_table: String,

    #[structopt(name = "source")]
    /// Path to a single local file, or a comma-separated list of URIs
    source: String,

    #[structopt(name = "schema")]
    /// Either a filename or a comma-separated list of fields in the form
    /// name[:type]; omit it if the table already has a schema
    schema: Option<String>,

    #[structopt(short = "F", long = "field-delimiter")]
    /// The character that indicates the boundary between columns in the
    /// input file. "\t" and "tab" are accepted names for tab.
    field_delimiter: Option<String>,

    #[structopt(short = "E", long = "encoding", possible_values = &["UTF-8", "ISO-8859-1"])]
    /// The character encoding used by the input file
    encoding: Option<String>,

    #[structopt(long = "skip-leading-rows")]
    /// The number of rows at the beginning of the source file to skip
    skip_leading_rows: Option<u32>,

    #[structopt(long = "replace")]
    /// Erase existing contents before loading new data
    replace: bool,

    #[structopt(long = "max-bad-records")]
    /// Maximum number of bad records allowed before the entire job fails
    max_bad_records: Option<u32>,

    #[structopt(long = "allow-quoted-newlines")]
    /// Allow quoted newlines in CSV import data
    allow_quoted_newlines: bool,
}

pub fn run(args: &LoadArgs, client: &BigqueryClient, job_id: Option<&str>) -> Result<()> {
    let destination = client.resolve_table_reference(&args.destination_table)?;
    let schema = args.schema.as_deref().map(read_schema).transpose()?;

    // A source containing `://` is a list of remote URIs; anything else is a
    // local file streamed along with the request.
    let (source_uris, upload) = if args.source.contains("://") {
        (
            args.source.split(',').map(str::to_owned).collect(),
            None,
        )
    } else {
        let upload = UploadPayload::from_path(&args.source)
            .with_context(|| format!("Could not open source file `{}`", args.source))?;
        (Vec::new(), Some(upload))
    };

    let options = LoadOptions {
        write_disposition: args.replace.then_some(WriteDisposition::WriteTruncate),
        field_delimiter: args
            .field_delimiter
            .as_deref()
            .map(normalize_field_delimiter),
        skip_leading_rows: args.skip_leading_rows,
        encoding: args.encoding.clone(),
        max_bad_records: args.max_bad_records,
        allow_quoted_newlines: args.allow_quoted_newlines.then_some(true),
    };

    let job = client
        .load(&destination, source_uris, upload, schema, options, job_id)
        .context("Operation to load data has failed.")?;
    if job.state() == Some(JobState::Done) {
        info!("Successfully loaded data into `{destination}`");
    } else {
        print_job_start_info(&job);
    }
    Ok(())
}
