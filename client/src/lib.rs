#![deny(clippy::all)]

//! Client library for the BigQuery job service: identifier resolution, a
//! typed error taxonomy, the polled job lifecycle and resource CRUD. All
//! remote calls go through the [`Transport`] boundary; nothing here touches
//! a terminal.

mod client;
mod errors;
mod identifier;
pub mod resources;
mod transport;

pub use crate::client::{poll_intervals, BigqueryClient, Config, LoadOptions};
pub use crate::errors::{check_job_result, Error, ErrorProto, Result};
pub use crate::identifier::parse_identifier;
pub use crate::resources::dataset::Dataset;
pub use crate::resources::job::{
    Job, JobConfiguration, JobConfigurationExtract, JobConfigurationKind, JobConfigurationLoad,
    JobConfigurationQuery, JobConfigurationTableCopy, JobState, JobStatistics, JobStatus,
    JobType, QueryPriority, WriteDisposition,
};
pub use crate::resources::project::Project;
pub use crate::resources::reference::{
    DatasetReference, JobReference, ProjectReference, Reference, TableReference,
};
pub use crate::resources::schema::{read_schema, TableFieldSchema, TableSchema};
pub use crate::resources::table::Table;
pub use crate::transport::{ApiRequest, HttpTransport, Transport, TransportConfig, UploadPayload};
