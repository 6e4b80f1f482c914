use anyhow::{Context, Result};
use bq_client::BigqueryClient;
use structopt::StructOpt;

use crate::printer::Printer;

#[derive(Debug, StructOpt)]
pub struct HeadArgs {
    #[structopt(short = "n", long = "max-rows", default_value = "100")]
    /// The number of rows to print when showing table data
    max_rows: usize,

    #[structopt(name = "identifier")]
    identifier: Option<String>,
}

pub fn run(args: &HeadArgs, client: &BigqueryClient, printer: &Printer) -> Result<()> {
    let identifier = args.identifier.as_deref().unwrap_or("");
    let table = client
        .resolve_reference(identifier)?
        .try_into_table()
        .context("Must provide a table identifier for head.")?;

    let (fields, rows) = client
        .read_schema_and_rows(&table, args.max_rows)
        .context("Operation to read table data has failed.")?;
    printer.print_table_data(&fields, &rows)
}
