use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::errors::{check_job_result, Error, Result};
use crate::identifier::parse_identifier;
use crate::resources::dataset::Dataset;
use crate::resources::job::{
    Job, JobConfiguration, JobConfigurationExtract, JobConfigurationLoad, JobConfigurationQuery,
    JobConfigurationTableCopy, JobState, QueryPriority, WriteDisposition,
};
use crate::resources::project::Project;
use crate::resources::reference::{
    DatasetReference, JobReference, ProjectReference, Reference, TableReference,
};
use crate::resources::schema::{TableFieldSchema, TableSchema};
use crate::resources::table::Table;
use crate::transport::{ApiRequest, HttpTransport, Transport, TransportConfig, UploadPayload};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(240);
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(30);
const LIST_ROWS_PAGE_SIZE: usize = 10_000;

/// Client-wide settings: transport endpoint and credentials, plus the
/// default project and dataset used to fill in partial identifiers.
#[derive(Debug, Clone)]
pub struct Config {
    pub endpoint: Url,
    pub token: Option<String>,
    pub project_id: String,
    pub dataset_id: String,
    pub accept_invalid_certificates: bool,
    pub proxy: Option<Url>,
    /// When set, job-creating operations wait for completion instead of
    /// returning right after submission.
    pub sync: bool,
}

/// Inter-poll sleep schedule: quick 1s polls at first so short jobs return
/// promptly, a ramp to 30s, then steady 30s pings for long-running jobs.
/// Infinite and restartable; the wait loop consumes one entry per poll.
pub fn poll_intervals() -> impl Iterator<Item = Duration> {
    std::iter::repeat(Duration::from_secs(1))
        .take(8)
        .chain((2u64..30).step_by(3).map(Duration::from_secs))
        .chain(std::iter::repeat(MAX_POLL_INTERVAL))
}

/// Client for the remote job service, composing identifier resolution, the
/// job driver and resource CRUD behind one facade.
pub struct BigqueryClient {
    transport: Box<dyn Transport>,
    project_id: String,
    dataset_id: String,
    sync: bool,
}

impl BigqueryClient {
    pub fn new(config: Config) -> Result<Self> {
        let transport = HttpTransport::new(TransportConfig {
            endpoint: config.endpoint,
            token: config.token,
            accept_invalid_certificates: config.accept_invalid_certificates,
            proxy: config.proxy,
            timeout: DEFAULT_TIMEOUT,
        })?;
        Ok(Self::with_transport(
            Box::new(transport),
            config.project_id,
            config.dataset_id,
            config.sync,
        ))
    }

    pub fn with_transport(
        transport: Box<dyn Transport>,
        project_id: impl Into<String>,
        dataset_id: impl Into<String>,
        sync: bool,
    ) -> Self {
        BigqueryClient {
            transport,
            project_id: project_id.into(),
            dataset_id: dataset_id.into(),
            sync,
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    // ------------------------------------------------------------------
    // Identifier resolution
    // ------------------------------------------------------------------

    /// Determine a project reference from an identifier and the defaults.
    pub fn resolve_project_reference(&self, identifier: &str) -> Result<ProjectReference> {
        let (project_id, dataset_id, table_id) = parse_identifier(identifier);
        // A bare token parses as a table id, but here it reads as a project.
        let project_id = [project_id, table_id, self.project_id.as_str()]
            .into_iter()
            .find(|part| !part.is_empty())
            .unwrap_or("");
        if dataset_id.is_empty() {
            if let Ok(reference) = ProjectReference::new(project_id) {
                return Ok(reference);
            }
        }
        Err(Error::ReferenceResolution {
            kind: "project",
            identifier: identifier.to_owned(),
        })
    }

    /// Determine a dataset reference from an identifier and the defaults.
    pub fn resolve_dataset_reference(&self, identifier: &str) -> Result<DatasetReference> {
        let (mut project_id, mut dataset_id, table_id) = parse_identifier(identifier);
        if !table_id.is_empty() && project_id.is_empty() && dataset_id.is_empty() {
            // identifier is a bare token, read as the dataset id.
            project_id = &self.project_id;
            dataset_id = table_id;
        } else if !project_id.is_empty() && !dataset_id.is_empty() && table_id.is_empty() {
            // identifier is `project:dataset`.
        } else if identifier.is_empty() {
            project_id = &self.project_id;
            dataset_id = &self.dataset_id;
        } else {
            return Err(Error::ReferenceResolution {
                kind: "dataset",
                identifier: identifier.to_owned(),
            });
        }
        DatasetReference::new(project_id, dataset_id).map_err(|_| Error::ReferenceResolution {
            kind: "dataset",
            identifier: identifier.to_owned(),
        })
    }

    /// Determine a table reference from an identifier and the defaults.
    pub fn resolve_table_reference(&self, identifier: &str) -> Result<TableReference> {
        let (project_id, dataset_id, table_id) = parse_identifier(identifier);
        TableReference::new(
            or_default(project_id, &self.project_id),
            or_default(dataset_id, &self.dataset_id),
            table_id,
        )
        .map_err(|_| Error::ReferenceResolution {
            kind: "table",
            identifier: identifier.to_owned(),
        })
    }

    /// Determine a job reference from a job id, optionally project-qualified.
    pub fn resolve_job_reference(&self, identifier: &str) -> Result<JobReference> {
        let (project_id, job_id) = match identifier.rsplit_once(':') {
            Some((project_id, job_id)) => (project_id, job_id),
            None => ("", identifier),
        };
        JobReference::new(or_default(project_id, &self.project_id), job_id).map_err(|_| {
            Error::ReferenceResolution {
                kind: "job",
                identifier: identifier.to_owned(),
            }
        })
    }

    /// Deduce a project, dataset or table reference from an identifier.
    ///
    /// The most specific interpretation wins: table first, then dataset,
    /// then project, each attempt independent of the previous one.
    pub fn resolve_reference(&self, identifier: &str) -> Result<Reference> {
        if let Ok(table) = self.resolve_table_reference(identifier) {
            return Ok(Reference::Table(table));
        }
        if let Ok(dataset) = self.resolve_dataset_reference(identifier) {
            return Ok(Reference::Dataset(dataset));
        }
        if let Ok(project) = self.resolve_project_reference(identifier) {
            return Ok(Reference::Project(project));
        }
        Err(Error::ReferenceResolution {
            kind: "reference",
            identifier: identifier.to_owned(),
        })
    }

    // ------------------------------------------------------------------
    // Job driver
    // ------------------------------------------------------------------

    /// Start a job. An explicit `job_id` makes retried submissions safe to
    /// repeat; the server rejects the duplicate instead of running twice.
    pub fn submit_job(
        &self,
        configuration: JobConfiguration,
        job_id: Option<&str>,
        upload: Option<UploadPayload>,
    ) -> Result<Job> {
        if self.project_id.is_empty() {
            return Err(Error::ReferenceResolution {
                kind: "project",
                identifier: String::new(),
            });
        }
        let mut job = Job::from(configuration);
        if let Some(job_id) = job_id {
            job.job_reference = Some(JobReference::new(&self.project_id, job_id).map_err(
                |_| Error::ReferenceResolution {
                    kind: "job",
                    identifier: job_id.to_owned(),
                },
            )?);
        }
        let body = serde_json::to_value(&job)
            .map_err(|error| Error::Interface(format!("could not encode job request: {error}")))?;

        let mut request =
            ApiRequest::new(Method::POST, format!("projects/{}/jobs", self.project_id))
                .body(body);
        if let Some(upload) = upload {
            request = request.upload(upload);
        }
        job_from_value(self.transport.execute(request)?)
    }

    /// Fetch the job status once and report whether it reached
    /// `desired_state`. Never blocks beyond the call's own latency.
    pub fn poll_job(
        &self,
        job_reference: &JobReference,
        desired_state: JobState,
    ) -> Result<(bool, Job)> {
        let request = ApiRequest::new(
            Method::GET,
            format!(
                "projects/{}/jobs/{}",
                job_reference.project_id, job_reference.job_id
            ),
        );
        let job = job_from_value(self.transport.execute(request)?)?;
        let state = job
            .state()
            .ok_or_else(|| Error::Interface("job status missing from server response".to_owned()))?;
        Ok((state == desired_state, job))
    }

    /// Poll until the job reaches `desired_state` or `max_wait` elapses.
    ///
    /// Communication errors while waiting on a job are tolerated: the job
    /// keeps running server-side, so the poll is simply retried on the next
    /// tick. The deadline is checked before every sleep, so a zero wait
    /// polls once and times out without sleeping. Reaching the desired
    /// state returns the job regardless of its own outcome; callers decide
    /// success separately via [`check_job_result`].
    pub fn wait_job(
        &self,
        job_reference: &JobReference,
        desired_state: JobState,
        max_wait: Duration,
    ) -> Result<Job> {
        self.wait_job_with_schedule(job_reference, desired_state, max_wait, poll_intervals())
    }

    pub(crate) fn wait_job_with_schedule(
        &self,
        job_reference: &JobReference,
        desired_state: JobState,
        max_wait: Duration,
        mut schedule: impl Iterator<Item = Duration>,
    ) -> Result<Job> {
        let start = Instant::now();
        let mut last_state: Option<JobState> = None;
        loop {
            match self.poll_job(job_reference, desired_state) {
                Ok((true, job)) => {
                    info!(
                        "Job {} reached state {} after {}s",
                        job_reference,
                        desired_state,
                        start.elapsed().as_secs()
                    );
                    return Ok(job);
                }
                Ok((false, job)) => {
                    last_state = job.state();
                    debug!(
                        "Waiting on job {} ({}s), current state {}",
                        job_reference,
                        start.elapsed().as_secs(),
                        job.state().map_or("UNKNOWN".to_owned(), |s| s.to_string())
                    );
                }
                Err(Error::Communication(error)) => {
                    // Transient; the job keeps running server-side.
                    warn!("Transient error during job status check: {error}");
                }
                Err(error) => return Err(error),
            }

            let elapsed = start.elapsed();
            if elapsed >= max_wait {
                return Err(Error::Timeout {
                    waited_secs: elapsed.as_secs(),
                    state: last_state.map_or("UNKNOWN".to_owned(), |state| state.to_string()),
                });
            }
            let interval = schedule.next().unwrap_or(MAX_POLL_INTERVAL);
            thread::sleep(interval.min(max_wait - elapsed));
        }
    }

    /// Submit, wait for DONE, then classify the job's own outcome.
    pub fn run_job_synchronously(
        &self,
        configuration: JobConfiguration,
        job_id: Option<&str>,
        upload: Option<UploadPayload>,
    ) -> Result<Job> {
        let job = self.submit_job(configuration, job_id, upload)?;
        let job_reference = job.job_reference.clone().ok_or_else(|| {
            Error::Interface("job reference missing from server response".to_owned())
        })?;
        let job = self.wait_job(&job_reference, JobState::Done, Duration::MAX)?;
        check_job_result(job)
    }

    /// Submit synchronously or asynchronously per the configured mode.
    pub fn execute_job(
        &self,
        configuration: JobConfiguration,
        job_id: Option<&str>,
        upload: Option<UploadPayload>,
    ) -> Result<Job> {
        if self.sync {
            self.run_job_synchronously(configuration, job_id, upload)
        } else {
            self.submit_job(configuration, job_id, upload)
        }
    }

    // ------------------------------------------------------------------
    // Job builders
    // ------------------------------------------------------------------

    /// Load data into `destination`, either from remote URIs or from one
    /// local payload streamed with the request.
    pub fn load(
        &self,
        destination: &TableReference,
        source_uris: Vec<String>,
        upload: Option<UploadPayload>,
        schema: Option<TableSchema>,
        options: LoadOptions,
        job_id: Option<&str>,
    ) -> Result<Job> {
        let configuration = JobConfigurationLoad {
            source_uris,
            destination_table: destination.clone(),
            schema,
            write_disposition: options.write_disposition,
            field_delimiter: options.field_delimiter,
            skip_leading_rows: options.skip_leading_rows,
            encoding: options.encoding,
            max_bad_records: options.max_bad_records,
            allow_quoted_newlines: options.allow_quoted_newlines,
        };
        self.execute_job(configuration.into(), job_id, upload)
    }

    /// Run a SQL query, defaulting the dataset context when one is set.
    pub fn query(
        &self,
        sql: &str,
        destination: Option<TableReference>,
        priority: Option<QueryPriority>,
        job_id: Option<&str>,
    ) -> Result<Job> {
        let default_dataset = DatasetReference::new(&self.project_id, &self.dataset_id).ok();
        let configuration = JobConfigurationQuery {
            query: sql.to_owned(),
            destination_table: destination,
            default_dataset,
            write_disposition: None,
            priority,
        };
        self.execute_job(configuration.into(), job_id, None)
    }

    /// Extract a table to one or more destination URIs.
    pub fn extract(
        &self,
        source: &TableReference,
        destination_uris: Vec<String>,
        field_delimiter: Option<String>,
        job_id: Option<&str>,
    ) -> Result<Job> {
        let configuration = JobConfigurationExtract {
            source_table: source.clone(),
            destination_uris,
            destination_format: None,
            field_delimiter,
            print_header: None,
        };
        self.execute_job(configuration.into(), job_id, None)
    }

    /// Copy a table via a copy job. With `ignore_already_exists` a
    /// duplicate destination is not an error and `None` is returned.
    pub fn copy_table(
        &self,
        source: &TableReference,
        destination: &TableReference,
        write_disposition: Option<WriteDisposition>,
        ignore_already_exists: bool,
        job_id: Option<&str>,
    ) -> Result<Option<Job>> {
        let configuration = JobConfigurationTableCopy {
            source_table: source.clone(),
            destination_table: destination.clone(),
            write_disposition,
        };
        match self.execute_job(configuration.into(), job_id, None) {
            Ok(job) => Ok(Some(job)),
            Err(Error::Duplicate(_)) if ignore_already_exists => Ok(None),
            Err(error) => Err(error),
        }
    }

    // ------------------------------------------------------------------
    // Resource CRUD
    // ------------------------------------------------------------------

    pub fn dataset_exists(&self, reference: &DatasetReference) -> Result<bool> {
        match self
            .transport
            .execute(ApiRequest::new(Method::GET, dataset_path(reference)))
        {
            Ok(_) => Ok(true),
            Err(Error::NotFound(_)) => Ok(false),
            Err(error) => Err(error),
        }
    }

    pub fn table_exists(&self, reference: &TableReference) -> Result<bool> {
        match self
            .transport
            .execute(ApiRequest::new(Method::GET, table_path(reference)))
        {
            Ok(_) => Ok(true),
            Err(Error::NotFound(_)) => Ok(false),
            Err(error) => Err(error),
        }
    }

    /// Create a dataset. An existing dataset is only an error when
    /// `ignore_existing` is unset.
    pub fn create_dataset(
        &self,
        reference: &DatasetReference,
        ignore_existing: bool,
        description: Option<&str>,
    ) -> Result<()> {
        let mut body = json!({ "datasetReference": reference });
        if let Some(description) = description {
            body["description"] = json!(description);
        }
        let request = ApiRequest::new(
            Method::POST,
            format!("projects/{}/datasets", reference.project_id),
        )
        .body(body);
        match self.transport.execute(request) {
            Ok(_) => Ok(()),
            Err(Error::Duplicate(_)) if ignore_existing => Ok(()),
            Err(error) => Err(error),
        }
    }

    /// Create a table, optionally with a schema, description and an
    /// expiration (millisecond epoch).
    pub fn create_table(
        &self,
        reference: &TableReference,
        ignore_existing: bool,
        schema: Option<&TableSchema>,
        description: Option<&str>,
        expiration_time: Option<i64>,
    ) -> Result<()> {
        let mut body = json!({ "tableReference": reference });
        if let Some(schema) = schema {
            body["schema"] = json!(schema);
        }
        if let Some(description) = description {
            body["description"] = json!(description);
        }
        if let Some(expiration_time) = expiration_time {
            body["expirationTime"] = json!(expiration_time.to_string());
        }
        let request = ApiRequest::new(
            Method::POST,
            format!(
                "projects/{}/datasets/{}/tables",
                reference.project_id, reference.dataset_id
            ),
        )
        .body(body);
        match self.transport.execute(request) {
            Ok(_) => Ok(()),
            Err(Error::Duplicate(_)) if ignore_existing => Ok(()),
            Err(error) => Err(error),
        }
    }

    /// Delete a dataset. A missing dataset is only an error when
    /// `ignore_not_found` is unset; `delete_contents` empties a non-empty
    /// dataset instead of failing the delete.
    pub fn delete_dataset(
        &self,
        reference: &DatasetReference,
        ignore_not_found: bool,
        delete_contents: Option<bool>,
    ) -> Result<()> {
        let mut request = ApiRequest::new(Method::DELETE, dataset_path(reference));
        if let Some(delete_contents) = delete_contents {
            request = request.query("deleteContents", delete_contents.to_string());
        }
        match self.transport.execute(request) {
            Ok(_) => Ok(()),
            Err(Error::NotFound(_)) if ignore_not_found => Ok(()),
            Err(error) => Err(error),
        }
    }

    pub fn delete_table(&self, reference: &TableReference, ignore_not_found: bool) -> Result<()> {
        match self
            .transport
            .execute(ApiRequest::new(Method::DELETE, table_path(reference)))
        {
            Ok(_) => Ok(()),
            Err(Error::NotFound(_)) if ignore_not_found => Ok(()),
            Err(error) => Err(error),
        }
    }

    pub fn update_dataset(
        &self,
        reference: &DatasetReference,
        description: Option<&str>,
    ) -> Result<()> {
        let mut body = json!({ "datasetReference": reference });
        if let Some(description) = description {
            body["description"] = json!(description);
        }
        let request = ApiRequest::new(Method::PATCH, dataset_path(reference)).body(body);
        self.transport.execute(request).map(|_| ())
    }

    pub fn update_table(
        &self,
        reference: &TableReference,
        schema: Option<&TableSchema>,
        description: Option<&str>,
        expiration_time: Option<i64>,
    ) -> Result<()> {
        let mut body = json!({ "tableReference": reference });
        if let Some(schema) = schema {
            body["schema"] = json!(schema);
        }
        if let Some(description) = description {
            body["description"] = json!(description);
        }
        if let Some(expiration_time) = expiration_time {
            body["expirationTime"] = json!(expiration_time.to_string());
        }
        let request = ApiRequest::new(Method::PATCH, table_path(reference)).body(body);
        self.transport.execute(request).map(|_| ())
    }

    // ------------------------------------------------------------------
    // Listings and lookups
    // ------------------------------------------------------------------

    pub fn list_projects(&self, max_results: Option<u32>) -> Result<Vec<Project>> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(default)]
            projects: Vec<Project>,
        }
        let mut request = ApiRequest::new(Method::GET, "projects");
        if let Some(max_results) = max_results {
            request = request.query("maxResults", max_results.to_string());
        }
        let response: Response = decode(self.transport.execute(request)?)?;
        Ok(response.projects)
    }

    pub fn list_datasets(
        &self,
        reference: &ProjectReference,
        max_results: Option<u32>,
    ) -> Result<Vec<Dataset>> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(default)]
            datasets: Vec<Dataset>,
        }
        let mut request = ApiRequest::new(
            Method::GET,
            format!("projects/{}/datasets", reference.project_id),
        );
        if let Some(max_results) = max_results {
            request = request.query("maxResults", max_results.to_string());
        }
        let response: Response = decode(self.transport.execute(request)?)?;
        Ok(response.datasets)
    }

    pub fn list_tables(
        &self,
        reference: &DatasetReference,
        max_results: Option<u32>,
    ) -> Result<Vec<Table>> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(default)]
            tables: Vec<Table>,
        }
        let mut request = ApiRequest::new(
            Method::GET,
            format!(
                "projects/{}/datasets/{}/tables",
                reference.project_id, reference.dataset_id
            ),
        );
        if let Some(max_results) = max_results {
            request = request.query("maxResults", max_results.to_string());
        }
        let response: Response = decode(self.transport.execute(request)?)?;
        Ok(response.tables)
    }

    pub fn list_jobs(
        &self,
        reference: &ProjectReference,
        max_results: Option<u32>,
        state_filter: &[JobState],
    ) -> Result<Vec<Job>> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(default)]
            jobs: Vec<Job>,
        }
        let mut request = ApiRequest::new(
            Method::GET,
            format!("projects/{}/jobs", reference.project_id),
        )
        .query("projection", "full");
        if let Some(max_results) = max_results {
            request = request.query("maxResults", max_results.to_string());
        }
        for state in state_filter {
            request = request.query("stateFilter", state.filter_value());
        }
        let response: Response = decode(self.transport.execute(request)?)?;
        Ok(response.jobs)
    }

    /// References of jobs currently in one of the given states, for the
    /// default project.
    pub fn list_job_references(&self, state_filter: &[JobState]) -> Result<Vec<JobReference>> {
        let project =
            ProjectReference::new(&self.project_id).map_err(|_| Error::ReferenceResolution {
                kind: "project",
                identifier: String::new(),
            })?;
        let jobs = self.list_jobs(&project, None, state_filter)?;
        Ok(jobs.into_iter().filter_map(|job| job.job_reference).collect())
    }

    /// Everything the server reports about one object, as raw JSON.
    ///
    /// Projects only have a list endpoint, so showing one means finding it
    /// in the listing.
    pub fn get_object_info(&self, reference: &Reference) -> Result<serde_json::Value> {
        match reference {
            Reference::Project(project) => {
                for candidate in self.list_projects(None)? {
                    if candidate.project_reference == *project {
                        return serde_json::to_value(candidate).map_err(|error| {
                            Error::Interface(format!("could not encode project: {error}"))
                        });
                    }
                }
                Err(Error::NotFound(format!("unknown project '{project}'")))
            }
            Reference::Dataset(dataset) => self
                .transport
                .execute(ApiRequest::new(Method::GET, dataset_path(dataset))),
            Reference::Table(table) => self
                .transport
                .execute(ApiRequest::new(Method::GET, table_path(table))),
            Reference::Job(job) => self.transport.execute(ApiRequest::new(
                Method::GET,
                format!("projects/{}/jobs/{}", job.project_id, job.job_id),
            )),
        }
    }

    pub fn get_table_schema(&self, reference: &TableReference) -> Result<TableSchema> {
        let value = self
            .transport
            .execute(ApiRequest::new(Method::GET, table_path(reference)))?;
        let table: Table = decode(value)?;
        Ok(table.schema.unwrap_or_default())
    }

    /// Read at most `max_rows` rows from a table, paging as needed.
    pub fn read_table_rows(
        &self,
        reference: &TableReference,
        max_rows: usize,
    ) -> Result<Vec<Vec<String>>> {
        let mut rows: Vec<Vec<String>> = Vec::new();
        let mut max_rows = max_rows;
        while rows.len() < max_rows {
            let page_size = LIST_ROWS_PAGE_SIZE.min(max_rows - rows.len());
            let request = ApiRequest::new(Method::GET, format!("{}/data", table_path(reference)))
                .query("maxResults", page_size.to_string())
                .query("startIndex", rows.len().to_string());
            let data = self.transport.execute(request)?;

            if let Some(total_rows) = data
                .get("totalRows")
                .and_then(value_as_u64)
                .map(|total| total as usize)
            {
                max_rows = max_rows.min(total_rows);
            }

            let page = data
                .get("rows")
                .and_then(|rows| rows.as_array())
                .cloned()
                .unwrap_or_default();
            for row in &page {
                let cells = row
                    .get("f")
                    .and_then(|fields| fields.as_array())
                    .map(|fields| {
                        fields
                            .iter()
                            .map(|entry| cell_value(entry.get("v")))
                            .collect()
                    })
                    .unwrap_or_default();
                rows.push(cells);
            }
            if page.is_empty() && rows.len() != max_rows {
                return Err(Error::Interface(format!(
                    "not enough rows returned by server for '{reference}'"
                )));
            }
        }
        Ok(rows)
    }

    /// Fields and rows of a table in one convenient call.
    pub fn read_schema_and_rows(
        &self,
        reference: &TableReference,
        max_rows: usize,
    ) -> Result<(Vec<TableFieldSchema>, Vec<Vec<String>>)> {
        Ok((
            self.get_table_schema(reference)?.fields,
            self.read_table_rows(reference, max_rows)?,
        ))
    }
}

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.is_empty() {
        default
    } else {
        value
    }
}

fn dataset_path(reference: &DatasetReference) -> String {
    format!(
        "projects/{}/datasets/{}",
        reference.project_id, reference.dataset_id
    )
}

fn table_path(reference: &TableReference) -> String {
    format!(
        "projects/{}/datasets/{}/tables/{}",
        reference.project_id, reference.dataset_id, reference.table_id
    )
}

fn job_from_value(value: serde_json::Value) -> Result<Job> {
    decode(value)
}

fn decode<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|error| Error::Interface(format!("malformed resource in server response: {error}")))
}

fn value_as_u64(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(number) => number.as_u64(),
        serde_json::Value::String(text) => text.parse().ok(),
        _ => None,
    }
}

fn cell_value(value: Option<&serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::String(text)) => text.clone(),
        Some(serde_json::Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Options for load jobs beyond source and destination.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub write_disposition: Option<WriteDisposition>,
    pub field_delimiter: Option<String>,
    pub skip_leading_rows: Option<u32>,
    pub encoding: Option<String>,
    pub max_bad_records: Option<u32>,
    pub allow_quoted_newlines: Option<bool>,
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::iter;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    struct MockTransport {
        responses: Mutex<VecDeque<Result<serde_json::Value>>>,
        requests: Arc<Mutex<Vec<(Method, String)>>>,
    }

    impl MockTransport {
        fn new(responses: Vec<Result<serde_json::Value>>) -> Self {
            MockTransport {
                responses: Mutex::new(responses.into()),
                requests: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn request_log(&self) -> Arc<Mutex<Vec<(Method, String)>>> {
            Arc::clone(&self.requests)
        }
    }

    impl Transport for MockTransport {
        fn execute(&self, request: ApiRequest) -> Result<serde_json::Value> {
            self.requests
                .lock()
                .unwrap()
                .push((request.method.clone(), request.path.clone()));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected request")
        }
    }

    fn client_with(responses: Vec<Result<serde_json::Value>>) -> BigqueryClient {
        BigqueryClient::with_transport(
            Box::new(MockTransport::new(responses)),
            "defproj",
            "defds",
            false,
        )
    }

    fn bare_client() -> BigqueryClient {
        BigqueryClient::with_transport(Box::new(MockTransport::new(Vec::new())), "", "", false)
    }

    fn job_value(state: &str) -> serde_json::Value {
        json!({
            "configuration": {"query": {"query": "select 1"}},
            "jobReference": {"projectId": "defproj", "jobId": "job_1"},
            "status": {"state": state}
        })
    }

    fn job_ref() -> JobReference {
        JobReference::new("defproj", "job_1").unwrap()
    }

    #[test]
    fn test_resolve_reference_cascade() {
        let client = client_with(Vec::new());

        assert_eq!(
            client.resolve_reference("prj:ds.tbl").unwrap(),
            Reference::Table(TableReference::new("prj", "ds", "tbl").unwrap())
        );
        // A bare token is the most specific thing it can be: a table.
        assert_eq!(
            client.resolve_reference("tbl").unwrap(),
            Reference::Table(TableReference::new("defproj", "defds", "tbl").unwrap())
        );
        assert_eq!(
            client.resolve_reference("prj:ds").unwrap(),
            Reference::Dataset(DatasetReference::new("prj", "ds").unwrap())
        );
        assert_eq!(
            client.resolve_reference("example.com:prj").unwrap(),
            Reference::Project(ProjectReference::new("example.com:prj").unwrap())
        );
        assert_eq!(
            client.resolve_reference("").unwrap(),
            Reference::Dataset(DatasetReference::new("defproj", "defds").unwrap())
        );
    }

    #[test]
    fn test_resolution_without_defaults() {
        let client = bare_client();

        assert!(matches!(
            client.resolve_reference("ds.tbl"),
            Err(Error::ReferenceResolution { .. })
        ));
        // A lone token still reads as a project when nothing else fits.
        assert_eq!(
            client.resolve_reference("prj").unwrap(),
            Reference::Project(ProjectReference::new("prj").unwrap())
        );
    }

    #[test]
    fn test_resolve_table_with_default_project() {
        let client = BigqueryClient::with_transport(
            Box::new(MockTransport::new(Vec::new())),
            "defproj",
            "",
            false,
        );
        assert_eq!(
            client.resolve_table_reference("ds.tbl").unwrap(),
            TableReference::new("defproj", "ds", "tbl").unwrap()
        );
        // No default dataset, so a bare token cannot be a table.
        assert!(client.resolve_table_reference("tbl").is_err());
    }

    #[test]
    fn test_resolve_dataset_reference() {
        let client = client_with(Vec::new());

        assert_eq!(
            client.resolve_dataset_reference("ds").unwrap(),
            DatasetReference::new("defproj", "ds").unwrap()
        );
        assert_eq!(
            client.resolve_dataset_reference("example.com:prj:ds").unwrap(),
            DatasetReference::new("example.com:prj", "ds").unwrap()
        );
        for invalid in ["ds.tbl", "prj:ds.tbl"] {
            assert!(client.resolve_dataset_reference(invalid).is_err(), "{invalid}");
        }
    }

    #[test]
    fn test_resolve_project_reference() {
        let client = client_with(Vec::new());

        assert_eq!(
            client.resolve_project_reference("prj:").unwrap(),
            ProjectReference::new("prj").unwrap()
        );
        assert_eq!(
            client.resolve_project_reference("").unwrap(),
            ProjectReference::new("defproj").unwrap()
        );
        for invalid in ["prj:ds", "example.com:prj:ds", "ds.tbl"] {
            assert!(client.resolve_project_reference(invalid).is_err(), "{invalid}");
        }
    }

    #[test]
    fn test_resolve_job_reference() {
        let client = client_with(Vec::new());

        assert_eq!(client.resolve_job_reference("job_1").unwrap(), job_ref());
        assert_eq!(
            client.resolve_job_reference("other:job_2").unwrap(),
            JobReference::new("other", "job_2").unwrap()
        );
        assert!(bare_client().resolve_job_reference("job_1").is_err());
    }

    #[test]
    fn test_parse_is_left_inverse_of_canonical_form() {
        let client = client_with(Vec::new());
        for identifier in ["prj:ds.tbl", "ds.tbl", "tbl", "prj:ds"] {
            let reference = client.resolve_reference(identifier).unwrap();
            let (project_id, dataset_id, table_id) = parse_identifier(identifier);
            let expected = (
                or_default(project_id, "defproj").to_owned(),
                or_default(dataset_id, "defds").to_owned(),
                table_id.to_owned(),
            );
            // Once defaults are applied, parsing the canonical string form
            // gives back the same parts as parsing the original identifier.
            let canonical = reference.to_string();
            let (project_id, dataset_id, table_id) = parse_identifier(&canonical);
            let reparsed = (
                project_id.to_owned(),
                dataset_id.to_owned(),
                table_id.to_owned(),
            );
            assert_eq!(reparsed, expected, "`{identifier}`");
        }
    }

    #[test]
    fn test_poll_intervals_schedule() {
        let waits: Vec<u64> = poll_intervals().take(20).map(|d| d.as_secs()).collect();
        assert_eq!(
            waits,
            vec![1, 1, 1, 1, 1, 1, 1, 1, 2, 5, 8, 11, 14, 17, 20, 23, 26, 29, 30, 30]
        );
        // Restartable: a fresh iterator starts over.
        assert_eq!(poll_intervals().next(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_wait_tolerates_transient_communication_errors() {
        let client = client_with(vec![
            Err(Error::Communication("connection reset".to_owned())),
            Err(Error::Communication("connection reset".to_owned())),
            Err(Error::Communication("connection reset".to_owned())),
            Ok(job_value("DONE")),
        ]);
        let job = client
            .wait_job_with_schedule(
                &job_ref(),
                JobState::Done,
                Duration::from_secs(60),
                iter::repeat(Duration::ZERO),
            )
            .unwrap();
        assert_eq!(job.state(), Some(JobState::Done));
    }

    #[test]
    fn test_wait_surfaces_service_errors() {
        let client = client_with(vec![Err(Error::NotFound("no such job".to_owned()))]);
        assert!(matches!(
            client.wait_job_with_schedule(
                &job_ref(),
                JobState::Done,
                Duration::from_secs(60),
                iter::repeat(Duration::ZERO),
            ),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_wait_zero_deadline_times_out_without_sleeping() {
        let client = client_with(vec![Ok(job_value("RUNNING"))]);
        let started = std::time::Instant::now();
        let result = client.wait_job(&job_ref(), JobState::Done, Duration::ZERO);
        assert!(matches!(
            result,
            Err(Error::Timeout { waited_secs: 0, ref state }) if state == "RUNNING"
        ));
        // One poll, no trip through the sleep schedule.
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_wait_returns_done_job_without_inspecting_outcome() {
        let failed = json!({
            "configuration": {"query": {"query": "select 1"}},
            "jobReference": {"projectId": "defproj", "jobId": "job_1"},
            "status": {
                "state": "DONE",
                "errorResult": {"reason": "invalidQuery", "message": "bad"}
            }
        });
        let client = client_with(vec![Ok(failed)]);
        // Wait succeeds; it is check_job_result that fails.
        let job = client
            .wait_job(&job_ref(), JobState::Done, Duration::from_secs(1))
            .unwrap();
        assert!(matches!(
            crate::errors::check_job_result(job),
            Err(Error::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_run_job_synchronously_surfaces_job_failure() {
        let submitted = json_job_pending();
        let failed = json!({
            "configuration": {"query": {"query": "select bogus"}},
            "jobReference": {"projectId": "defproj", "jobId": "job_1"},
            "status": {
                "state": "DONE",
                "errorResult": {"reason": "invalidQuery", "message": "syntax error"}
            }
        });
        let client = client_with(vec![Ok(submitted), Ok(failed)]);
        let configuration = JobConfiguration::from(JobConfigurationQuery {
            query: "select bogus".to_owned(),
            destination_table: None,
            default_dataset: None,
            write_disposition: None,
            priority: None,
        });
        assert!(matches!(
            client.run_job_synchronously(configuration, None, None),
            Err(Error::InvalidQuery(message)) if message == "syntax error"
        ));
    }

    fn json_job_pending() -> serde_json::Value {
        json_job_with_state("PENDING")
    }

    fn json_job_with_state(state: &str) -> serde_json::Value {
        json!({
            "configuration": {"query": {"query": "select bogus"}},
            "jobReference": {"projectId": "defproj", "jobId": "job_1"},
            "status": {"state": state}
        })
    }

    #[test]
    fn test_submit_job_requires_default_project() {
        let client = bare_client();
        let configuration = JobConfiguration::from(JobConfigurationQuery {
            query: "select 1".to_owned(),
            destination_table: None,
            default_dataset: None,
            write_disposition: None,
            priority: None,
        });
        assert!(matches!(
            client.submit_job(configuration, None, None),
            Err(Error::ReferenceResolution { kind: "project", .. })
        ));
    }

    #[test]
    fn test_create_dataset_ignore_existing() {
        let client = client_with(vec![Err(Error::Duplicate("exists".to_owned()))]);
        let reference = DatasetReference::new("defproj", "ds").unwrap();
        assert!(client.create_dataset(&reference, true, None).is_ok());

        let client = client_with(vec![Err(Error::Duplicate("exists".to_owned()))]);
        assert!(matches!(
            client.create_dataset(&reference, false, None),
            Err(Error::Duplicate(_))
        ));
    }

    #[test]
    fn test_delete_table_ignore_not_found() {
        let reference = TableReference::new("defproj", "ds", "tbl").unwrap();

        let client = client_with(vec![Err(Error::NotFound("gone".to_owned()))]);
        assert!(client.delete_table(&reference, true).is_ok());

        let client = client_with(vec![Err(Error::NotFound("gone".to_owned()))]);
        assert!(matches!(
            client.delete_table(&reference, false),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_copy_table_ignore_already_exists() {
        let source = TableReference::new("defproj", "ds", "src").unwrap();
        let destination = TableReference::new("defproj", "ds", "dst").unwrap();

        let client = client_with(vec![Err(Error::Duplicate("exists".to_owned()))]);
        let copied = client
            .copy_table(
                &source,
                &destination,
                Some(WriteDisposition::WriteEmpty),
                true,
                None,
            )
            .unwrap();
        assert_eq!(copied, None);
    }

    #[test]
    fn test_dataset_exists() {
        let reference = DatasetReference::new("defproj", "ds").unwrap();

        let client = client_with(vec![Ok(json!({"datasetReference": reference}))]);
        assert!(client.dataset_exists(&reference).unwrap());

        let client = client_with(vec![Err(Error::NotFound("gone".to_owned()))]);
        assert!(!client.dataset_exists(&reference).unwrap());

        let client = client_with(vec![Err(Error::AccessDenied("no".to_owned()))]);
        assert!(client.dataset_exists(&reference).is_err());
    }

    #[test]
    fn test_read_table_rows_pages_and_clamps() {
        let reference = TableReference::new("defproj", "ds", "tbl").unwrap();
        let client = client_with(vec![Ok(json!({
            "totalRows": "2",
            "rows": [
                {"f": [{"v": "a"}, {"v": "1"}]},
                {"f": [{"v": "b"}, {"v": serde_json::Value::Null}]}
            ]
        }))]);
        let rows = client.read_table_rows(&reference, 100).unwrap();
        assert_eq!(
            rows,
            vec![
                vec!["a".to_owned(), "1".to_owned()],
                vec!["b".to_owned(), String::new()]
            ]
        );
    }

    #[test]
    fn test_read_table_rows_short_response_is_interface_error() {
        let reference = TableReference::new("defproj", "ds", "tbl").unwrap();
        let client = client_with(vec![Ok(json!({"totalRows": "5", "rows": []}))]);
        assert!(matches!(
            client.read_table_rows(&reference, 5),
            Err(Error::Interface(_))
        ));
    }

    #[test]
    fn test_submit_job_posts_to_jobs_collection() {
        let transport = MockTransport::new(vec![Ok(json_job_pending())]);
        let requests = transport.request_log();
        let client =
            BigqueryClient::with_transport(Box::new(transport), "defproj", "defds", false);
        let configuration = JobConfiguration::from(JobConfigurationQuery {
            query: "select 1".to_owned(),
            destination_table: None,
            default_dataset: None,
            write_disposition: None,
            priority: None,
        });
        let job = client
            .submit_job(configuration, Some("job_1"), None)
            .unwrap();
        assert_eq!(job.job_reference, Some(job_ref()));
        assert_eq!(
            requests.lock().unwrap().clone(),
            vec![(Method::POST, "projects/defproj/jobs".to_owned())]
        );
    }
}
