use std::{env, io::Write, ops::Deref};

use anyhow::{Context, Result};
use colored::{ColoredString, Colorize};
use dialoguer::Confirm;
use env_logger::{fmt::Formatter as LogFormatter, Builder as LogBuilder};
use log::{Level as LogLevel, LevelFilter as LogLevelFilter, Record as LogRecord};
use once_cell::sync::Lazy;

pub fn init_env_logger(verbose: bool, quiet: bool) {
    // this closure formats logging, choose colour and determines level of verbosity
    let format = |formatter: &mut LogFormatter, record: &LogRecord<'_>| {
        let level = match record.level() {
            LogLevel::Debug => LOG_PREFIX_DEBUG.deref(),
            LogLevel::Info => LOG_PREFIX_INFO.deref(),
            LogLevel::Warn => LOG_PREFIX_WARN.deref(),
            LogLevel::Error => LOG_PREFIX_ERROR.deref(),
            LogLevel::Trace => LOG_PREFIX_TRACE.deref(),
        };
        writeln!(formatter, "{} {}", level, record.args())
    };

    let mut builder = LogBuilder::new();
    builder.format(format).filter(
        None,
        if verbose {
            LogLevelFilter::Debug
        } else if quiet {
            LogLevelFilter::Warn
        } else {
            LogLevelFilter::Info
        },
    );

    if let Ok(filters) = env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }

    builder.init();
}

/// Ask before a destructive operation; declining is not an error.
pub fn confirm(prompt: &str) -> Result<bool> {
    Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .context("Failed to read confirmation from the terminal.")
}

/// Tab can be awkward to pass on a command line; accept spellings for it.
pub fn normalize_field_delimiter(field_delimiter: &str) -> String {
    match field_delimiter.to_lowercase().as_str() {
        "tab" | "\\t" => "\t".to_owned(),
        _ => field_delimiter.to_owned(),
    }
}

pub static LOG_PREFIX_DEBUG: Lazy<ColoredString> = Lazy::new(|| "D".normal());
pub static LOG_PREFIX_INFO: Lazy<ColoredString> = Lazy::new(|| "I".green());
pub static LOG_PREFIX_WARN: Lazy<ColoredString> = Lazy::new(|| "W".yellow());
pub static LOG_PREFIX_ERROR: Lazy<ColoredString> = Lazy::new(|| "E".red());
pub static LOG_PREFIX_TRACE: Lazy<ColoredString> = Lazy::new(|| "T".normal());

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::normalize_field_delimiter;

    #[test]
    fn test_normalize_field_delimiter() {
        assert_eq!(normalize_field_delimiter("tab"), "\t");
        assert_eq!(normalize_field_delimiter("\\t"), "\t");
        assert_eq!(normalize_field_delimiter(","), ",");
        assert_eq!(normalize_field_delimiter("|"), "|");
    }
}
