use std::path::PathBuf;

use structopt::StructOpt;
use url::Url;

use crate::commands::{
    config::ConfigArgs, cp::CpArgs, extract::ExtractArgs, head::HeadArgs, load::LoadArgs,
    ls::LsArgs, mk::MkArgs, query::QueryArgs, rm::RmArgs, show::ShowArgs, update::UpdateArgs,
    wait::WaitArgs,
};
use crate::printer::OutputFormat;

/// bq is the command line interface to the BigQuery service.
#[derive(Debug, StructOpt)]
#[structopt(
    global_settings = &[
        structopt::clap::AppSettings::ColoredHelp,
        structopt::clap::AppSettings::InferSubcommands,
    ]
)]
pub struct Args {
    #[structopt(long = "config-file", parse(from_os_str))]
    /// Path to the configuration file. Typically defaults to ~/.config/bq on Linux.
    pub config: Option<PathBuf>,

    #[structopt(long = "project-id")]
    /// Default project to use for requests. Overrides the configured one, if any.
    pub project_id: Option<String>,

    #[structopt(long = "dataset-id")]
    /// Default dataset to use for requests. Overrides the configured one, if any.
    pub dataset_id: Option<String>,

    #[structopt(long = "endpoint", parse(try_from_str))]
    /// Specify what endpoint to use. Overrides the configured one, if any.
    pub endpoint: Option<Url>,

    #[structopt(long = "token")]
    /// Specify what API token to use. Overrides the configured one, if any.
    pub token: Option<String>,

    #[structopt(short = "k", long = "accept-invalid-certificates", parse(try_from_str))]
    pub accept_invalid_certificates: Option<bool>,

    #[structopt(long = "proxy", parse(try_from_str))]
    /// URL of a proxy to route requests through.
    pub proxy: Option<Url>,

    #[structopt(long = "job-id")]
    /// Explicit job id for job-creating commands. Reusing a job id makes
    /// retried submissions safe: the server rejects the duplicate instead
    /// of running the job twice.
    pub job_id: Option<String>,

    #[structopt(long = "sync")]
    /// Wait for job-creating commands to finish instead of returning the
    /// job id right after submission.
    pub sync: bool,

    #[structopt(short = "o", long = "format", default_value = "pretty")]
    /// Output format: pretty, sparse, json, prettyjson or csv.
    pub format: OutputFormat,

    #[structopt(short = "q", long = "quiet")]
    /// Suppress informational messages.
    pub quiet: bool,

    #[structopt(short = "v", long = "verbose")]
    /// Enable more verbose logging.
    pub verbose: bool,

    #[structopt(subcommand)]
    pub command: Command,
}

#[derive(Debug, StructOpt)]
pub enum Command {
    #[structopt(name = "config")]
    /// Manage default project, dataset and endpoint settings
    Config {
        #[structopt(subcommand)]
        config_args: ConfigArgs,
    },

    #[structopt(name = "ls")]
    /// List the objects contained in the named collection
    Ls {
        #[structopt(flatten)]
        ls_args: LsArgs,
    },

    #[structopt(name = "show")]
    /// Show all information about an object
    Show {
        #[structopt(flatten)]
        show_args: ShowArgs,
    },

    #[structopt(name = "mk")]
    /// Create a dataset or table
    Mk {
        #[structopt(flatten)]
        mk_args: MkArgs,
    },

    #[structopt(name = "update")]
    /// Update a dataset or table
    Update {
        #[structopt(flatten)]
        update_args: UpdateArgs,
    },

    #[structopt(name = "rm")]
    /// Delete the dataset or table described by an identifier
    Rm {
        #[structopt(flatten)]
        rm_args: RmArgs,
    },

    #[structopt(name = "cp")]
    /// Copy one table to another
    Cp {
        #[structopt(flatten)]
        cp_args: CpArgs,
    },

    #[structopt(name = "load")]
    /// Load data into a destination table
    Load {
        #[structopt(flatten)]
        load_args: LoadArgs,
    },

    #[structopt(name = "query")]
    /// Execute a query
    Query {
        #[structopt(flatten)]
        query_args: QueryArgs,
    },

    #[structopt(name = "extract")]
    /// Extract a source table to cloud storage URIs
    Extract {
        #[structopt(flatten)]
        extract_args: ExtractArgs,
    },

    #[structopt(name = "head")]
    /// Display rows in a table
    Head {
        #[structopt(flatten)]
        head_args: HeadArgs,
    },

    #[structopt(name = "wait")]
    /// Wait some number of seconds for a job to finish
    Wait {
        #[structopt(flatten)]
        wait_args: WaitArgs,
    },
}
