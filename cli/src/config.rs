use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};
use url::Url;

/// Persistent defaults, read at startup and overridable by flags.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct BqConfig {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub dataset_id: Option<String>,
    #[serde(default)]
    pub endpoint: Option<Url>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub accept_invalid_certificates: bool,
    #[serde(default)]
    pub proxy: Option<Url>,
}

pub fn read_bq_config(path: impl AsRef<Path>) -> Result<BqConfig> {
    debug!("Reading config file at `{}`", path.as_ref().display());
    if path.as_ref().exists() {
        let file = File::open(&path)
            .with_context(|| format!("Could not open config file `{}`", path.as_ref().display()))?;
        let config_reader = BufReader::new(file);
        serde_json::from_reader(config_reader)
            .with_context(|| format!("Could not parse config file `{}`", path.as_ref().display()))
    } else {
        Ok(Default::default())
    }
}

pub fn write_bq_config(path: impl AsRef<Path>, config: &BqConfig) -> Result<()> {
    debug!("Writing config file at `{}`", path.as_ref().display());
    let file = File::create(&path)
        .with_context(|| format!("Could not create config file `{}`", path.as_ref().display()))?;
    let config_writer = BufWriter::new(file);
    serde_json::to_writer_pretty(config_writer, &config).with_context(|| {
        format!(
            "Could not serialise configuration to `{}`",
            path.as_ref().display()
        )
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_config_round_trip() {
        let path = std::env::temp_dir().join("bq_cli_config_test.json");
        let config = BqConfig {
            project_id: Some("prj".to_owned()),
            dataset_id: Some("ds".to_owned()),
            ..Default::default()
        };
        write_bq_config(&path, &config).unwrap();
        let read_back = read_bq_config(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(read_back.project_id.as_deref(), Some("prj"));
        assert_eq!(read_back.dataset_id.as_deref(), Some("ds"));
        assert_eq!(read_back.token, None);
    }

    #[test]
    fn test_missing_config_is_default() {
        let config = read_bq_config("/nonexistent/bq/config.json").unwrap();
        assert!(config.project_id.is_none());
        assert!(!config.accept_invalid_certificates);
    }
}
