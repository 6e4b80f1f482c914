use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// Required-field validation failure when constructing a reference.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("missing required field `{field}` for a {kind} reference")]
pub struct MissingField {
    kind: &'static str,
    field: &'static str,
}

fn require(kind: &'static str, field: &'static str, value: &str) -> Result<(), MissingField> {
    if value.is_empty() {
        Err(MissingField { kind, field })
    } else {
        Ok(())
    }
}

/// Identifies a project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectReference {
    pub project_id: String,
}

impl ProjectReference {
    pub fn new(project_id: impl Into<String>) -> Result<Self, MissingField> {
        let project_id = project_id.into();
        require("project", "projectId", &project_id)?;
        Ok(ProjectReference { project_id })
    }
}

impl fmt::Display for ProjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.project_id)
    }
}

/// Identifies a dataset within a project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetReference {
    pub project_id: String,
    pub dataset_id: String,
}

impl DatasetReference {
    pub fn new(
        project_id: impl Into<String>,
        dataset_id: impl Into<String>,
    ) -> Result<Self, MissingField> {
        let project_id = project_id.into();
        let dataset_id = dataset_id.into();
        require("dataset", "projectId", &project_id)?;
        require("dataset", "datasetId", &dataset_id)?;
        Ok(DatasetReference {
            project_id,
            dataset_id,
        })
    }

    pub fn project(&self) -> ProjectReference {
        ProjectReference {
            project_id: self.project_id.clone(),
        }
    }
}

impl fmt::Display for DatasetReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.project_id, self.dataset_id)
    }
}

/// Identifies a table within a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableReference {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
}

impl TableReference {
    pub fn new(
        project_id: impl Into<String>,
        dataset_id: impl Into<String>,
        table_id: impl Into<String>,
    ) -> Result<Self, MissingField> {
        let project_id = project_id.into();
        let dataset_id = dataset_id.into();
        let table_id = table_id.into();
        require("table", "projectId", &project_id)?;
        require("table", "datasetId", &dataset_id)?;
        require("table", "tableId", &table_id)?;
        Ok(TableReference {
            project_id,
            dataset_id,
            table_id,
        })
    }

    pub fn dataset(&self) -> DatasetReference {
        DatasetReference {
            project_id: self.project_id.clone(),
            dataset_id: self.dataset_id.clone(),
        }
    }

    pub fn project(&self) -> ProjectReference {
        ProjectReference {
            project_id: self.project_id.clone(),
        }
    }
}

impl fmt::Display for TableReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}.{}", self.project_id, self.dataset_id, self.table_id)
    }
}

/// Identifies a job within a project. The canonical form is the bare job id;
/// the owning project is carried for request routing, not display.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReference {
    pub project_id: String,
    pub job_id: String,
}

impl JobReference {
    pub fn new(
        project_id: impl Into<String>,
        job_id: impl Into<String>,
    ) -> Result<Self, MissingField> {
        let project_id = project_id.into();
        let job_id = job_id.into();
        require("job", "projectId", &project_id)?;
        require("job", "jobId", &job_id)?;
        Ok(JobReference { project_id, job_id })
    }
}

impl fmt::Display for JobReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.job_id)
    }
}

/// A reference of any kind, as produced by cascading identifier resolution.
///
/// Operations that need one concrete kind convert with the `try_into_*`
/// methods, which fail fast with [`Error::TypeMismatch`] when handed the
/// wrong kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    Project(ProjectReference),
    Dataset(DatasetReference),
    Table(TableReference),
    Job(JobReference),
}

impl Reference {
    pub fn kind(&self) -> &'static str {
        match self {
            Reference::Project(_) => "project",
            Reference::Dataset(_) => "dataset",
            Reference::Table(_) => "table",
            Reference::Job(_) => "job",
        }
    }

    pub fn try_into_project(self) -> Result<ProjectReference, Error> {
        match self {
            Reference::Project(project) => Ok(project),
            other => Err(mismatch("project", &other)),
        }
    }

    pub fn try_into_dataset(self) -> Result<DatasetReference, Error> {
        match self {
            Reference::Dataset(dataset) => Ok(dataset),
            other => Err(mismatch("dataset", &other)),
        }
    }

    pub fn try_into_table(self) -> Result<TableReference, Error> {
        match self {
            Reference::Table(table) => Ok(table),
            other => Err(mismatch("table", &other)),
        }
    }

    pub fn try_into_job(self) -> Result<JobReference, Error> {
        match self {
            Reference::Job(job) => Ok(job),
            other => Err(mismatch("job", &other)),
        }
    }
}

fn mismatch(expected: &'static str, found: &Reference) -> Error {
    Error::TypeMismatch {
        expected,
        found: found.kind(),
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Project(project) => project.fmt(f),
            Reference::Dataset(dataset) => dataset.fmt(f),
            Reference::Table(table) => table.fmt(f),
            Reference::Job(job) => job.fmt(f),
        }
    }
}

impl From<ProjectReference> for Reference {
    fn from(reference: ProjectReference) -> Self {
        Reference::Project(reference)
    }
}

impl From<DatasetReference> for Reference {
    fn from(reference: DatasetReference) -> Self {
        Reference::Dataset(reference)
    }
}

impl From<TableReference> for Reference {
    fn from(reference: TableReference) -> Self {
        Reference::Table(reference)
    }
}

impl From<JobReference> for Reference {
    fn from(reference: JobReference) -> Self {
        Reference::Job(reference)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_canonical_strings() {
        assert_eq!(ProjectReference::new("prj").unwrap().to_string(), "prj");
        assert_eq!(
            DatasetReference::new("prj", "ds").unwrap().to_string(),
            "prj:ds"
        );
        assert_eq!(
            TableReference::new("prj", "ds", "tbl").unwrap().to_string(),
            "prj:ds.tbl"
        );
        assert_eq!(
            JobReference::new("prj", "job_123").unwrap().to_string(),
            "job_123"
        );
    }

    #[test]
    fn test_missing_fields_fail_construction() {
        assert!(ProjectReference::new("").is_err());
        assert!(DatasetReference::new("prj", "").is_err());
        assert!(DatasetReference::new("", "ds").is_err());
        assert!(TableReference::new("prj", "ds", "").is_err());
        assert!(JobReference::new("", "job_123").is_err());
    }

    #[test]
    fn test_equality_by_fields() {
        let direct = TableReference::new("prj", "ds", "tbl").unwrap();
        let derived: TableReference =
            serde_json::from_str(r#"{"projectId":"prj","datasetId":"ds","tableId":"tbl"}"#)
                .unwrap();
        assert_eq!(direct, derived);
    }

    #[test]
    fn test_navigation() {
        let table = TableReference::new("prj", "ds", "tbl").unwrap();
        assert_eq!(table.dataset(), DatasetReference::new("prj", "ds").unwrap());
        assert_eq!(table.project(), ProjectReference::new("prj").unwrap());
        assert_eq!(
            table.dataset().project(),
            ProjectReference::new("prj").unwrap()
        );
    }

    #[test]
    fn test_kind_conversions() {
        let reference = Reference::from(DatasetReference::new("prj", "ds").unwrap());
        assert_eq!(reference.kind(), "dataset");
        assert!(reference.clone().try_into_dataset().is_ok());
        assert!(matches!(
            reference.try_into_table(),
            Err(Error::TypeMismatch {
                expected: "table",
                found: "dataset"
            })
        ));
    }

    #[test]
    fn test_wire_form_is_camel_case() {
        let table = TableReference::new("prj", "ds", "tbl").unwrap();
        assert_eq!(
            serde_json::to_value(&table).unwrap(),
            serde_json::json!({"projectId": "prj", "datasetId": "ds", "tableId": "tbl"})
        );
    }
}
