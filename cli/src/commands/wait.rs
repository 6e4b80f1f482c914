use std::time::Duration;

use anyhow::{bail, Context, Result};
use bq_client::{BigqueryClient, JobState};
use structopt::StructOpt;

use crate::printer::Printer;

#[derive(Debug, StructOpt)]
pub struct WaitArgs {
    #[structopt(name = "job_id")]
    /// Job to wait on; with no job id, waits on the single currently
    /// running job
    job_id: Option<String>,

    #[structopt(name = "secs")]
    /// Number of seconds to wait; waits forever if unspecified, and 0
    /// checks whether the job is already done
    secs: Option<u64>,
}

pub fn run(args: &WaitArgs, client: &BigqueryClient, printer: &Printer) -> Result<()> {
    let job_reference = match args.job_id.as_deref().filter(|job_id| !job_id.is_empty()) {
        Some(job_id) => client.resolve_job_reference(job_id)?,
        None => {
            let mut running = client
                .list_job_references(&[JobState::Pending, JobState::Running])
                .context("Operation to list running jobs has failed.")?;
            if running.len() != 1 {
                bail!("No job id provided, found {} running jobs", running.len());
            }
            running.remove(0)
        }
    };

    let max_wait = args.secs.map_or(Duration::MAX, Duration::from_secs);
    let job = client
        .wait_job(&job_reference, JobState::Done, max_wait)
        .context("Operation to wait for job has failed.")?;
    printer.print_resources(&[job])
}
