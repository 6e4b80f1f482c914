use std::io::{self, Write};
use std::str::FromStr;

use anyhow::{anyhow, Context, Error, Result};
use bq_client::{
    Dataset, Job, JobState, Project, Reference, Table, TableFieldSchema, TableSchema,
};
use chrono::{Local, TimeZone};
use prettytable::{cell, format, row, Cell, Row, Table as PrettyTable};
use serde::Serialize;

pub fn print_resources_as_json<Resource>(
    resources: impl IntoIterator<Item = Resource>,
    mut writer: impl Write,
) -> Result<()>
where
    Resource: Serialize,
{
    for resource in resources {
        serde_json::to_writer(&mut writer, &resource)
            .context("Could not serialise resource.")
            .and_then(|_| writeln!(writer).context("Failed to write JSON resource to writer."))?;
    }
    Ok(())
}

#[derive(Copy, Clone, Debug)]
pub enum OutputFormat {
    Pretty,
    Sparse,
    Json,
    PrettyJson,
    Csv,
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat::Pretty
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(string: &str) -> Result<Self> {
        match string {
            "pretty" => Ok(OutputFormat::Pretty),
            "sparse" => Ok(OutputFormat::Sparse),
            "json" => Ok(OutputFormat::Json),
            "prettyjson" => Ok(OutputFormat::PrettyJson),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(anyhow!("unknown output format `{}`", string)),
        }
    }
}

/// Represents a resource that is able to be displayed as a table.
///
/// The implementation must implement `to_table_headers` to return headers for
/// the resource type, and `to_table_row`, which should return a data row for
/// the given resource instance.
pub trait DisplayTable {
    fn to_table_headers() -> Row;

    fn to_table_row(&self) -> Row;
}

impl DisplayTable for Project {
    fn to_table_headers() -> Row {
        row![bFg => "projectId", "friendlyName"]
    }

    fn to_table_row(&self) -> Row {
        row![
            self.project_reference.project_id,
            self.friendly_name.as_deref().unwrap_or("")
        ]
    }
}

impl DisplayTable for Dataset {
    fn to_table_headers() -> Row {
        row![bFg => "datasetId"]
    }

    fn to_table_row(&self) -> Row {
        row![self.dataset_reference.dataset_id]
    }
}

impl DisplayTable for Table {
    fn to_table_headers() -> Row {
        row![bFg => "tableId"]
    }

    fn to_table_row(&self) -> Row {
        row![self.table_reference.table_id]
    }
}

impl DisplayTable for Job {
    fn to_table_headers() -> Row {
        row![bFg => "jobId", "Job Type", "State", "Start Time", "Duration"]
    }

    fn to_table_row(&self) -> Row {
        let (start_time, duration) = match &self.statistics {
            Some(statistics) => (
                statistics.start_time.map(format_time).unwrap_or_default(),
                statistics
                    .duration_seconds()
                    .map(format_duration)
                    .unwrap_or_default(),
            ),
            None => (String::new(), String::new()),
        };
        row![
            self.job_reference
                .as_ref()
                .map(|reference| reference.to_string())
                .unwrap_or_default(),
            self.configuration.kind.type_name(),
            job_state_name(self),
            start_time,
            duration
        ]
    }
}

/// DONE splits into SUCCESS and FAILURE depending on the job's own result.
fn job_state_name(job: &Job) -> String {
    let failed = job
        .status
        .as_ref()
        .map_or(false, |status| status.error_result.is_some());
    match job.state() {
        Some(JobState::Done) if failed => "FAILURE".to_owned(),
        Some(JobState::Done) => "SUCCESS".to_owned(),
        Some(state) => state.to_string(),
        None => "UNKNOWN".to_owned(),
    }
}

/// Millisecond epoch to local `01 Jan 12:34:56`.
fn format_time(millis: i64) -> String {
    Local
        .timestamp_millis_opt(millis)
        .single()
        .map(|time| time.format("%d %b %H:%M:%S").to_string())
        .unwrap_or_default()
}

fn format_duration(total_seconds: i64) -> String {
    let seconds = total_seconds.max(0);
    let (days, rest) = (seconds / 86_400, seconds % 86_400);
    let (hours, rest) = (rest / 3_600, rest % 3_600);
    let (minutes, seconds) = (rest / 60, rest % 60);
    if days > 0 {
        format!(
            "{} day{}, {}:{:02}:{:02}",
            days,
            if days == 1 { "" } else { "s" },
            hours,
            minutes,
            seconds
        )
    } else {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    }
}

/// Render a schema as an indented field tree.
pub fn format_schema(schema: &TableSchema) -> String {
    fn push_fields(lines: &mut Vec<String>, fields: &[TableFieldSchema], indent: usize) {
        for field in fields {
            let prefix = "|  ".repeat(indent);
            let junction = if field.field_type.eq_ignore_ascii_case("RECORD") {
                '+'
            } else {
                '|'
            };
            let mut entry = format!(
                "{}- {}: {}",
                junction,
                field.name,
                field.field_type.to_lowercase()
            );
            if let Some(mode) = &field.mode {
                if !mode.eq_ignore_ascii_case("NULLABLE") {
                    entry.push_str(&format!(" ({})", mode.to_lowercase()));
                }
            }
            lines.push(prefix + &entry);
            if !field.fields.is_empty() {
                push_fields(lines, &field.fields, indent + 1);
            }
        }
    }

    let mut lines = Vec::new();
    push_fields(&mut lines, &schema.fields, 0);
    lines.join("\n")
}

/// Group a server-returned ACL by role for printing.
fn format_acl(access: &serde_json::Value) -> String {
    let mut entries: [(&str, Vec<String>); 3] =
        [("Owners", Vec::new()), ("Writers", Vec::new()), ("Readers", Vec::new())];
    for entry in access.as_array().into_iter().flatten() {
        let role = entry.get("role").and_then(|role| role.as_str()).unwrap_or("");
        let index = match role {
            "OWNER" => 0,
            "WRITER" => 1,
            "READER" => 2,
            _ => continue,
        };
        if let Some(object) = entry.as_object() {
            for (key, value) in object {
                if key == "role" {
                    continue;
                }
                if key == "allAuthenticatedUsers" {
                    entries[index].1.push(key.clone());
                } else if let Some(value) = value.as_str() {
                    entries[index].1.push(value.to_owned());
                }
            }
        }
    }
    let mut result_lines = Vec::new();
    for (title, members) in &entries {
        if !members.is_empty() {
            result_lines.push(format!("{title}:"));
            result_lines.push(
                members
                    .iter()
                    .map(|member| format!("  {member}"))
                    .collect::<Vec<_>>()
                    .join(",\n"),
            );
        }
    }
    result_lines.join("\n")
}

pub struct Printer {
    format: OutputFormat,
}

impl Printer {
    pub fn new(format: OutputFormat) -> Self {
        Printer { format }
    }

    /// Print a listing of resources in the configured format.
    pub fn print_resources<T: DisplayTable + Serialize>(&self, resources: &[T]) -> Result<()> {
        match self.format {
            OutputFormat::Pretty | OutputFormat::Sparse => {
                let mut table = self.new_table();
                table.set_titles(T::to_table_headers());
                for resource in resources {
                    table.add_row(resource.to_table_row());
                }
                table.printstd();
                Ok(())
            }
            OutputFormat::Json => print_resources_as_json(resources, io::stdout().lock()),
            OutputFormat::PrettyJson => {
                let stdout = io::stdout();
                let mut lock = stdout.lock();
                serde_json::to_writer_pretty(&mut lock, &resources)
                    .context("Could not serialise resources.")?;
                writeln!(lock).context("Failed to write to stdout.")?;
                Ok(())
            }
            OutputFormat::Csv => {
                let mut writer = csv::Writer::from_writer(io::stdout().lock());
                writer
                    .write_record(row_contents(&T::to_table_headers()))
                    .context("Failed to write CSV header.")?;
                for resource in resources {
                    writer
                        .write_record(row_contents(&resource.to_table_row()))
                        .context("Failed to write CSV record.")?;
                }
                writer.flush().context("Failed to flush CSV output.")?;
                Ok(())
            }
        }
    }

    /// Print one object in full, as fetched for `show`.
    pub fn print_object_info(&self, reference: &Reference, info: serde_json::Value) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(&info).context("Could not serialise object.")?);
                Ok(())
            }
            OutputFormat::PrettyJson => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&info).context("Could not serialise object.")?
                );
                Ok(())
            }
            OutputFormat::Pretty | OutputFormat::Sparse | OutputFormat::Csv => {
                println!("{} {}\n", capitalize(reference.kind()), reference);
                let mut table = self.new_table();
                match reference {
                    Reference::Project(_) => {
                        let project: Project = serde_json::from_value(info)
                            .context("Could not parse project returned by server.")?;
                        table.set_titles(Project::to_table_headers());
                        table.add_row(project.to_table_row());
                    }
                    Reference::Dataset(_) => {
                        let dataset: Dataset = serde_json::from_value(info)
                            .context("Could not parse dataset returned by server.")?;
                        table.set_titles(row![bFg => "datasetId", "Last modified", "ACLs"]);
                        table.add_row(row![
                            dataset.dataset_reference.dataset_id,
                            dataset
                                .last_modified_time
                                .map(format_time)
                                .unwrap_or_default(),
                            dataset.access.as_ref().map(format_acl).unwrap_or_default()
                        ]);
                    }
                    Reference::Table(_) => {
                        let table_info: Table = serde_json::from_value(info)
                            .context("Could not parse table returned by server.")?;
                        table.set_titles(row![bFg => "tableId", "Last modified", "Schema"]);
                        table.add_row(row![
                            table_info.table_reference.table_id,
                            table_info
                                .last_modified_time
                                .map(format_time)
                                .unwrap_or_default(),
                            table_info
                                .schema
                                .as_ref()
                                .map(format_schema)
                                .unwrap_or_default()
                        ]);
                    }
                    Reference::Job(_) => {
                        let job: Job = serde_json::from_value(info)
                            .context("Could not parse job returned by server.")?;
                        table.set_titles(Job::to_table_headers());
                        table.add_row(job.to_table_row());
                        table.printstd();
                        println!();
                        if let Some(error) = job
                            .status
                            .as_ref()
                            .and_then(|status| status.error_result.as_ref())
                        {
                            let classified = bq_client::Error::from_error_proto(error);
                            println!("Errors encountered during job execution. {classified}\n");
                        }
                        return Ok(());
                    }
                }
                table.printstd();
                println!();
                Ok(())
            }
        }
    }

    /// Print raw table data with one column per schema field.
    pub fn print_table_data(&self, fields: &[TableFieldSchema], rows: &[Vec<String>]) -> Result<()> {
        match self.format {
            OutputFormat::Json | OutputFormat::PrettyJson => {
                let objects: Vec<serde_json::Map<String, serde_json::Value>> = rows
                    .iter()
                    .map(|cells| {
                        fields
                            .iter()
                            .zip(cells)
                            .map(|(field, cell)| {
                                (field.name.clone(), serde_json::Value::String(cell.clone()))
                            })
                            .collect()
                    })
                    .collect();
                if matches!(self.format, OutputFormat::Json) {
                    print_resources_as_json(objects, io::stdout().lock())
                } else {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&objects)
                            .context("Could not serialise rows.")?
                    );
                    Ok(())
                }
            }
            OutputFormat::Csv => {
                let mut writer = csv::Writer::from_writer(io::stdout().lock());
                writer
                    .write_record(fields.iter().map(|field| field.name.as_str()))
                    .context("Failed to write CSV header.")?;
                for cells in rows {
                    writer.write_record(cells).context("Failed to write CSV record.")?;
                }
                writer.flush().context("Failed to flush CSV output.")?;
                Ok(())
            }
            OutputFormat::Pretty | OutputFormat::Sparse => {
                let mut table = self.new_table();
                let mut titles = Row::empty();
                for field in fields {
                    titles.add_cell(Cell::new(&field.name).style_spec("bFg"));
                }
                table.set_titles(titles);
                for cells in rows {
                    table.add_row(Row::new(cells.iter().map(|cell| Cell::new(cell)).collect()));
                }
                table.printstd();
                Ok(())
            }
        }
    }

    fn new_table(&self) -> PrettyTable {
        let mut table = PrettyTable::new();
        match self.format {
            OutputFormat::Sparse => table.set_format(*format::consts::FORMAT_CLEAN),
            _ => table.set_format(*format::consts::FORMAT_BOX_CHARS),
        }
        table
    }
}

fn row_contents(row: &Row) -> Vec<String> {
    row.iter().map(|cell| cell.get_content()).collect()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use bq_client::JobReference;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(7), "0:00:07");
        assert_eq!(format_duration(3_725), "1:02:05");
        assert_eq!(format_duration(90_000), "1 day, 1:00:00");
        assert_eq!(format_duration(-5), "0:00:00");
    }

    #[test]
    fn test_format_schema() {
        let schema: TableSchema = serde_json::from_value(json!({
            "fields": [
                {"name": "name", "type": "STRING"},
                {"name": "count", "type": "INTEGER", "mode": "REQUIRED"},
                {
                    "name": "nested",
                    "type": "RECORD",
                    "fields": [{"name": "leaf", "type": "STRING"}]
                }
            ]
        }))
        .unwrap();
        assert_eq!(
            format_schema(&schema),
            "|- name: string\n\
             |- count: integer (required)\n\
             +- nested: record\n\
             |  |- leaf: string"
        );
    }

    #[test]
    fn test_job_row_state_and_duration() {
        let job: Job = serde_json::from_value(json!({
            "configuration": {"query": {"query": "select 1"}},
            "jobReference": {"projectId": "prj", "jobId": "job_7"},
            "statistics": {"startTime": "10900", "endTime": "17901"},
            "status": {"state": "DONE"}
        }))
        .unwrap();
        assert_eq!(
            job.job_reference,
            Some(JobReference::new("prj", "job_7").unwrap())
        );
        let row = job.to_table_row();
        let contents = row_contents(&row);
        assert_eq!(contents[0], "job_7");
        assert_eq!(contents[1], "query");
        assert_eq!(contents[2], "SUCCESS");
        assert_eq!(contents[4], "0:00:07");
    }

    #[test]
    fn test_failed_job_displays_failure() {
        let job: Job = serde_json::from_value(json!({
            "configuration": {"query": {"query": "select 1"}},
            "status": {
                "state": "DONE",
                "errorResult": {"reason": "invalidQuery", "message": "bad"}
            }
        }))
        .unwrap();
        assert_eq!(job_state_name(&job), "FAILURE");
    }

    #[test]
    fn test_format_acl() {
        let access = json!([
            {"role": "OWNER", "userByEmail": "admin@example.com"},
            {"role": "READER", "allAuthenticatedUsers": true},
            {"role": "READER", "groupByEmail": "team@example.com"}
        ]);
        assert_eq!(
            format_acl(&access),
            "Owners:\n  admin@example.com\nReaders:\n  allAuthenticatedUsers,\n  team@example.com"
        );
    }

    #[test]
    fn test_output_format_from_str() {
        assert!(matches!("pretty".parse(), Ok(OutputFormat::Pretty)));
        assert!(matches!("prettyjson".parse(), Ok(OutputFormat::PrettyJson)));
        assert!(matches!("csv".parse(), Ok(OutputFormat::Csv)));
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}
