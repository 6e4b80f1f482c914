use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use log::info;
use structopt::StructOpt;

use crate::config::{write_bq_config, BqConfig};

#[derive(Debug, StructOpt)]
pub enum ConfigArgs {
    #[structopt(name = "set-project")]
    /// Set the default project used to fill in partial identifiers
    SetProject {
        #[structopt(name = "project_id")]
        project_id: String,
    },

    #[structopt(name = "set-dataset")]
    /// Set the default dataset used to fill in partial identifiers
    SetDataset {
        #[structopt(name = "dataset_id")]
        dataset_id: String,
    },

    #[structopt(name = "set-endpoint")]
    /// Set the service endpoint to send requests to
    SetEndpoint {
        #[structopt(name = "endpoint", parse(try_from_str))]
        endpoint: url::Url,
    },

    #[structopt(name = "show")]
    /// Print the current configuration
    Show,
}

pub fn run(args: &ConfigArgs, mut config: BqConfig, path: PathBuf) -> Result<()> {
    match args {
        ConfigArgs::SetProject { project_id } => {
            config.project_id = Some(project_id.clone());
            write_bq_config(&path, &config)?;
            info!("Set default project to `{project_id}`.");
        }
        ConfigArgs::SetDataset { dataset_id } => {
            if config.project_id.is_none() {
                bail!("Cannot set a default dataset without a default project.");
            }
            config.dataset_id = Some(dataset_id.clone());
            write_bq_config(&path, &config)?;
            info!("Set default dataset to `{dataset_id}`.");
        }
        ConfigArgs::SetEndpoint { endpoint } => {
            config.endpoint = Some(endpoint.clone());
            write_bq_config(&path, &config)?;
            info!("Set endpoint to `{endpoint}`.");
        }
        ConfigArgs::Show => {
            let mut shown = config;
            if shown.token.is_some() {
                shown.token = Some("<hidden>".to_owned());
            }
            println!(
                "{}",
                serde_json::to_string_pretty(&shown)
                    .context("Could not serialise configuration.")?
            );
        }
    }
    Ok(())
}
