use anyhow::{anyhow, bail, Context, Result};
use bq_client::{BigqueryClient, JobConfigurationKind, JobState, QueryPriority};
use structopt::StructOpt;

use crate::commands::print_job_start_info;
use crate::printer::Printer;

#[derive(Debug, StructOpt)]
pub struct QueryArgs {
    #[structopt(long = "destination-table")]
    /// Name of destination table for query results
    destination_table: Option<String>,

    #[structopt(short = "n", long = "max-rows", default_value = "100")]
    /// How many rows to return in the result
    max_rows: usize,

    #[structopt(long = "batch")]
    /// Run the query in batch mode
    batch: bool,

    #[structopt(name = "sql")]
    /// The query to execute
    sql: Vec<String>,
}

pub fn run(
    args: &QueryArgs,
    client: &BigqueryClient,
    printer: &Printer,
    job_id: Option<&str>,
) -> Result<()> {
    let sql = args.sql.join(" ");
    if sql.trim().is_empty() {
        bail!("Must provide a query to execute.");
    }

    let destination = args
        .destination_table
        .as_deref()
        .filter(|identifier| !identifier.is_empty())
        .map(|identifier| client.resolve_table_reference(identifier))
        .transpose()?;
    let priority = args.batch.then_some(QueryPriority::Batch);

    let job = client
        .query(&sql, destination, priority, job_id)
        .context("Operation to run query has failed.")?;

    if job.state() == Some(JobState::Done) {
        // The server fills in the result table even when none was named.
        let destination = match &job.configuration.kind {
            JobConfigurationKind::Query(query) => query
                .destination_table
                .clone()
                .ok_or_else(|| anyhow!("Query job has no destination table."))?,
            _ => bail!("Server returned a non-query job for a query."),
        };
        let (fields, rows) = client
            .read_schema_and_rows(&destination, args.max_rows)
            .context("Operation to read query results has failed.")?;
        printer.print_table_data(&fields, &rows)
    } else {
        print_job_start_info(&job);
        Ok(())
    }
}
