use bq_client::Job;
use log::info;

pub mod config;
pub mod cp;
pub mod extract;
pub mod head;
pub mod load;
pub mod ls;
pub mod mk;
pub mod query;
pub mod rm;
pub mod show;
pub mod update;
pub mod wait;

/// Report an asynchronously started job; `bq wait` picks it up from here.
pub fn print_job_start_info(job: &Job) {
    match &job.job_reference {
        Some(reference) => info!(
            "Successfully started {} job {}",
            job.configuration.kind.type_name(),
            reference
        ),
        None => info!(
            "Successfully started {} job",
            job.configuration.kind.type_name()
        ),
    }
}
