use anyhow::{bail, Context, Result};
use bq_client::{BigqueryClient, Reference};
use structopt::StructOpt;

use crate::printer::Printer;

#[derive(Debug, StructOpt)]
pub struct LsArgs {
    #[structopt(short = "j", long = "jobs")]
    /// Show jobs described by this identifier
    jobs: bool,

    #[structopt(short = "p", long = "projects")]
    /// Show all projects
    projects: bool,

    #[structopt(short = "d", long = "datasets")]
    /// Show datasets described by this identifier
    datasets: bool,

    #[structopt(short = "n", long = "max-results")]
    /// Maximum number to list
    max_results: Option<u32>,

    #[structopt(name = "identifier")]
    /// Project or dataset to list; a trailing `:` or `.` can be used to
    /// signify a project or dataset
    identifier: Option<String>,
}

pub fn run(args: &LsArgs, client: &BigqueryClient, printer: &Printer) -> Result<()> {
    if args.jobs && args.projects {
        bail!("Cannot specify more than one of -j and -p.");
    }
    if args.projects && args.identifier.is_some() {
        bail!("Cannot specify an identifier with -p.");
    }
    let identifier = args.identifier.as_deref().unwrap_or("");

    if args.jobs {
        let project = client
            .resolve_project_reference(identifier)
            .with_context(|| format!("Cannot determine job(s) associated with `{identifier}`"))?;
        let jobs = client
            .list_jobs(&project, args.max_results, &[])
            .context("Operation to list jobs has failed.")?;
        return printer.print_resources(&jobs);
    }
    if args.projects {
        let projects = client
            .list_projects(args.max_results)
            .context("Operation to list projects has failed.")?;
        return printer.print_resources(&projects);
    }

    let mut reference = if identifier.is_empty() {
        // No identifier and no defaults falls through to listing projects.
        client.resolve_reference(identifier).ok()
    } else {
        Some(client.resolve_reference(identifier)?)
    };

    // `ls foo` with a default dataset set resolves to a table; retry the
    // identifier as a dataset before giving up on it.
    if matches!(reference, Some(Reference::Table(_))) {
        if let Ok(dataset) = client.resolve_dataset_reference(identifier) {
            reference = Some(Reference::Dataset(dataset));
        }
    }

    // -d lists the datasets of the project owning the named dataset.
    if args.datasets {
        if let Some(Reference::Dataset(dataset)) = &reference {
            reference = Some(Reference::Project(dataset.project()));
        }
    }

    match reference {
        None => {
            let projects = client
                .list_projects(args.max_results)
                .context("Operation to list projects has failed.")?;
            printer.print_resources(&projects)
        }
        Some(Reference::Project(project)) => {
            let datasets = client
                .list_datasets(&project, args.max_results)
                .context("Operation to list datasets has failed.")?;
            printer.print_resources(&datasets)
        }
        Some(Reference::Dataset(dataset)) => {
            let tables = client
                .list_tables(&dataset, args.max_results)
                .context("Operation to list tables has failed.")?;
            printer.print_resources(&tables)
        }
        Some(other) => bail!(
            "Invalid identifier `{}` for ls, cannot call list on a {} reference.",
            identifier,
            other.kind()
        ),
    }
}
