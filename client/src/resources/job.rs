use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::ErrorProto;
use crate::resources::reference::{DatasetReference, JobReference, TableReference};
use crate::resources::schema::TableSchema;

/// One remote asynchronous operation. The server owns the authoritative
/// state; instances held by the client are snapshots fetched by polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    pub configuration: JobConfiguration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_reference: Option<JobReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<JobStatistics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
}

impl Job {
    pub fn state(&self) -> Option<JobState> {
        self.status.as_ref().map(|status| status.state)
    }
}

impl From<JobConfiguration> for Job {
    fn from(configuration: JobConfiguration) -> Self {
        Job {
            kind: None,
            etag: None,
            id: None,
            self_link: None,
            user_email: None,
            configuration,
            job_reference: None,
            statistics: None,
            status: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_result: Option<ErrorProto>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorProto>,
    pub state: JobState,
}

/// Job lifecycle state. Transitions run monotonically toward `Done`, which
/// is terminal for both successful and failed jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Pending,
    Running,
    Done,
}

impl JobState {
    /// The value the jobs.list `stateFilter` parameter expects.
    pub(crate) fn filter_value(self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Done => "done",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JobState::Pending => "PENDING",
            JobState::Running => "RUNNING",
            JobState::Done => "DONE",
        })
    }
}

/// Timestamps are millisecond epoch integers, transmitted as strings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobStatistics {
    #[serde(
        with = "super::int64::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub creation_time: Option<i64>,
    #[serde(
        with = "super::int64::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_time: Option<i64>,
    #[serde(
        with = "super::int64::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_time: Option<i64>,
    #[serde(
        with = "super::int64::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub total_bytes_processed: Option<i64>,
}

impl JobStatistics {
    /// Whole-second runtime; sub-second precision is discarded on purpose,
    /// both endpoints being truncated to seconds before subtracting.
    pub fn duration_seconds(&self) -> Option<i64> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some(end / 1000 - start / 1000),
            _ => None,
        }
    }
}

/// Wire form is `{"load": {...}}` etc. with exactly one of the four keys,
/// plus the optional shared fields alongside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_type: Option<JobType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<HashMap<String, String>>,
    #[serde(flatten)]
    pub kind: JobConfigurationKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobType {
    Load,
    Query,
    Extract,
    Copy,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobConfigurationKind {
    Load(JobConfigurationLoad),
    Query(JobConfigurationQuery),
    Extract(JobConfigurationExtract),
    Copy(JobConfigurationTableCopy),
}

impl JobConfigurationKind {
    /// Name of the single configuration key, shown in job listings.
    pub fn type_name(&self) -> &'static str {
        match self {
            JobConfigurationKind::Load(_) => "load",
            JobConfigurationKind::Query(_) => "query",
            JobConfigurationKind::Extract(_) => "extract",
            JobConfigurationKind::Copy(_) => "copy",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobConfigurationLoad {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_uris: Vec<String>,
    pub destination_table: TableReference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<TableSchema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_disposition: Option<WriteDisposition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_delimiter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_leading_rows: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_bad_records: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_quoted_newlines: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobConfigurationQuery {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_table: Option<TableReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_dataset: Option<DatasetReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_disposition: Option<WriteDisposition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<QueryPriority>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobConfigurationExtract {
    pub source_table: TableReference,
    pub destination_uris: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_delimiter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub print_header: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobConfigurationTableCopy {
    pub source_table: TableReference,
    pub destination_table: TableReference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_disposition: Option<WriteDisposition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WriteDisposition {
    WriteAppend,
    WriteTruncate,
    WriteEmpty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryPriority {
    Interactive,
    Batch,
}

macro_rules! impl_from_kind {
    ($config:ty, $variant:ident) => {
        impl From<$config> for JobConfiguration {
            fn from(config: $config) -> Self {
                JobConfiguration {
                    job_type: None,
                    properties: None,
                    kind: JobConfigurationKind::$variant(config),
                }
            }
        }
    };
}

impl_from_kind!(JobConfigurationLoad, Load);
impl_from_kind!(JobConfigurationQuery, Query);
impl_from_kind!(JobConfigurationExtract, Extract);
impl_from_kind!(JobConfigurationTableCopy, Copy);

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_configuration_has_exactly_one_tag_key() {
        let configuration = JobConfiguration::from(JobConfigurationQuery {
            query: "select 1".to_owned(),
            destination_table: None,
            default_dataset: None,
            write_disposition: None,
            priority: Some(QueryPriority::Batch),
        });
        assert_eq!(
            serde_json::to_value(&configuration).unwrap(),
            json!({"query": {"query": "select 1", "priority": "BATCH"}})
        );
    }

    #[test]
    fn test_job_deserializes_from_server_payload() {
        let job: Job = serde_json::from_value(json!({
            "kind": "bigquery#job",
            "id": "prj:job_abc",
            "configuration": {
                "jobType": "EXTRACT",
                "extract": {
                    "sourceTable": {
                        "projectId": "prj",
                        "datasetId": "ds",
                        "tableId": "tbl"
                    },
                    "destinationUris": ["gs://bucket/out.csv"],
                    "printHeader": true
                }
            },
            "jobReference": {"projectId": "prj", "jobId": "job_abc"},
            "statistics": {"startTime": "1731550230926", "endTime": "1731550237831"},
            "status": {"state": "DONE"}
        }))
        .unwrap();

        assert_eq!(job.state(), Some(JobState::Done));
        assert_eq!(job.configuration.kind.type_name(), "extract");
        assert_eq!(
            job.job_reference,
            Some(JobReference::new("prj", "job_abc").unwrap())
        );
    }

    #[test]
    fn test_duration_discards_subsecond_precision() {
        let statistics = JobStatistics {
            start_time: Some(1_731_550_230_926),
            end_time: Some(1_731_550_237_831),
            ..Default::default()
        };
        // 6905ms elapsed, but both endpoints truncate to seconds first.
        assert_eq!(statistics.duration_seconds(), Some(7));

        let statistics = JobStatistics {
            start_time: Some(10_900),
            end_time: Some(11_100),
            ..Default::default()
        };
        assert_eq!(statistics.duration_seconds(), Some(1));
    }

    #[test]
    fn test_state_display_and_filter_values() {
        assert_eq!(JobState::Pending.to_string(), "PENDING");
        assert_eq!(JobState::Done.to_string(), "DONE");
        assert_eq!(JobState::Running.filter_value(), "running");
    }
}
