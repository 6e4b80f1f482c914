#![deny(clippy::all)]

// Module declarations
mod args;
mod commands;
mod config;
mod printer;
mod utils;

// External crate imports
use anyhow::{bail, Context, Result};
use bq_client::BigqueryClient;
use log::{error, warn};
use once_cell::sync::Lazy;
use std::{fs, path::PathBuf, process};
use structopt::StructOpt;
use url::Url;

// Internal crate imports
use crate::{
    args::{Args, Command},
    commands::{
        config as config_command, cp, extract, head, load, ls, mk, query, rm, show, update, wait,
    },
    config::BqConfig,
    printer::Printer,
    utils::init_env_logger,
};

static DEFAULT_ENDPOINT: Lazy<Url> = Lazy::new(|| {
    Url::parse("https://www.googleapis.com/bigquery/v2/").expect("Default URL is well-formed")
});

fn run(args: Args) -> Result<()> {
    let config_path = find_configuration(&args)?;
    let file_config = config::read_bq_config(&config_path)?;
    let printer = Printer::new(args.format);

    match &args.command {
        Command::Config { config_args } => {
            config_command::run(config_args, file_config, config_path)
        }
        Command::Ls { ls_args } => {
            ls::run(ls_args, &client_from_args(&args, &file_config)?, &printer)
        }
        Command::Show { show_args } => {
            show::run(show_args, &client_from_args(&args, &file_config)?, &printer)
        }
        Command::Mk { mk_args } => mk::run(mk_args, &client_from_args(&args, &file_config)?),
        Command::Update { update_args } => {
            update::run(update_args, &client_from_args(&args, &file_config)?)
        }
        Command::Rm { rm_args } => rm::run(rm_args, &client_from_args(&args, &file_config)?),
        Command::Cp { cp_args } => cp::run(
            cp_args,
            &client_from_args(&args, &file_config)?,
            args.job_id.as_deref(),
        ),
        Command::Load { load_args } => load::run(
            load_args,
            &client_from_args(&args, &file_config)?,
            args.job_id.as_deref(),
        ),
        Command::Query { query_args } => query::run(
            query_args,
            &client_from_args(&args, &file_config)?,
            &printer,
            args.job_id.as_deref(),
        ),
        Command::Extract { extract_args } => extract::run(
            extract_args,
            &client_from_args(&args, &file_config)?,
            args.job_id.as_deref(),
        ),
        Command::Head { head_args } => {
            head::run(head_args, &client_from_args(&args, &file_config)?, &printer)
        }
        Command::Wait { wait_args } => {
            wait::run(wait_args, &client_from_args(&args, &file_config)?, &printer)
        }
    }
}

fn client_from_args(args: &Args, config: &BqConfig) -> Result<BigqueryClient> {
    let project_id = args
        .project_id
        .clone()
        .or_else(|| config.project_id.clone())
        .unwrap_or_default();
    let dataset_id = args
        .dataset_id
        .clone()
        .or_else(|| config.dataset_id.clone())
        .unwrap_or_default();
    if !dataset_id.is_empty() && project_id.is_empty() {
        bail!("Cannot set a default dataset without a default project.");
    }

    let endpoint = args
        .endpoint
        .clone()
        .or_else(|| config.endpoint.clone())
        .unwrap_or_else(|| DEFAULT_ENDPOINT.clone());

    let token = args.token.clone().or_else(|| config.token.clone());

    let accept_invalid_certificates = args
        .accept_invalid_certificates
        .unwrap_or(config.accept_invalid_certificates);
    if accept_invalid_certificates {
        warn!(concat!(
            "TLS certificate verification is disabled. ",
            "Do NOT use this over an insecure network."
        ));
    }

    let proxy = args.proxy.clone().or_else(|| config.proxy.clone());

    BigqueryClient::new(bq_client::Config {
        endpoint,
        token,
        project_id,
        dataset_id,
        accept_invalid_certificates,
        proxy,
        sync: args.sync,
    })
    .context("Failed to initialise the client.")
}

fn find_configuration(args: &Args) -> Result<PathBuf> {
    let config_path = if let Some(config_path) = args.config.clone() {
        if !config_path.exists() {
            warn!(
                "Configuration file `{}` doesn't exist.",
                config_path.display()
            );
        }
        config_path
    } else {
        let mut config_path =
            dirs::config_dir().context("Could not get path to the user's config directory")?;
        config_path.push("bq");
        fs::create_dir_all(&config_path).with_context(|| {
            format!(
                "Could not create config directory {}",
                config_path.display()
            )
        })?;
        config_path.push("config.json");
        config_path
    };
    Ok(config_path)
}

fn main() {
    let args = Args::from_args();
    init_env_logger(args.verbose, args.quiet);

    if let Err(error) = run(args) {
        error!("An error occurred:");
        for cause in error.chain() {
            error!(" |- {cause}");
        }

        #[cfg(feature = "backtrace")]
        {
            error!("{}", error.backtrace());
        }

        process::exit(1);
    }
}
