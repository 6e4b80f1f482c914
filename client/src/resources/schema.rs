use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    #[serde(default)]
    pub fields: Vec<TableFieldSchema>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableFieldSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Nested fields of a RECORD column.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<TableFieldSchema>,
}

/// Create a schema from inline text or a filename.
///
/// If `schema` contains no `:` and names an existing file it is read as a
/// JSON array of `{name, type, mode?}` objects. Otherwise it must be a
/// comma-separated list of `name[:type]` entries, the type defaulting to
/// STRING when omitted.
pub fn read_schema(schema: &str) -> Result<TableSchema> {
    if schema.is_empty() {
        return Err(Error::Schema("schema cannot be empty".to_owned()));
    }
    if !schema.contains(':') && Path::new(schema).exists() {
        let contents = fs::read_to_string(schema)
            .map_err(|error| Error::Schema(format!("cannot read schema file {schema}: {error}")))?;
        let fields = serde_json::from_str(&contents).map_err(|error| {
            Error::Schema(format!(
                "error decoding JSON schema from file {schema}: {error}; \
                 to specify a one-column schema, use \"name:string\""
            ))
        })?;
        return Ok(TableSchema { fields });
    }
    let fields = schema
        .split(',')
        .map(parse_field_entry)
        .collect::<Result<Vec<_>>>()?;
    Ok(TableSchema { fields })
}

fn parse_field_entry(entry: &str) -> Result<TableFieldSchema> {
    let (name, field_type) = match entry.split_once(':') {
        Some((name, field_type)) => (name, field_type),
        None => (entry, ""),
    };
    if field_type.contains(':') || name.trim().is_empty() {
        return Err(Error::Schema(format!("invalid schema entry: {entry}")));
    }
    let field_type = field_type.trim();
    Ok(TableFieldSchema {
        name: name.trim().to_owned(),
        field_type: if field_type.is_empty() {
            "STRING".to_owned()
        } else {
            field_type.to_uppercase()
        },
        mode: None,
        fields: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn field(name: &str, field_type: &str) -> TableFieldSchema {
        TableFieldSchema {
            name: name.to_owned(),
            field_type: field_type.to_owned(),
            mode: None,
            fields: Vec::new(),
        }
    }

    #[test]
    fn test_read_schema_from_text() {
        assert_eq!(
            read_schema("foo:integer").unwrap().fields,
            vec![field("foo", "INTEGER")]
        );
        assert_eq!(
            read_schema("foo:integer, bar:string").unwrap().fields,
            vec![field("foo", "INTEGER"), field("bar", "STRING")]
        );
        assert_eq!(read_schema("foo").unwrap().fields, vec![field("foo", "STRING")]);
        assert_eq!(
            read_schema("foo,bar").unwrap().fields,
            vec![field("foo", "STRING"), field("bar", "STRING")]
        );
        assert_eq!(
            read_schema("foo:integer, bar").unwrap().fields,
            vec![field("foo", "INTEGER"), field("bar", "STRING")]
        );
    }

    #[test]
    fn test_read_schema_rejects_bad_entries() {
        assert!(matches!(read_schema(""), Err(Error::Schema(_))));
        // Two colons in one entry.
        assert!(matches!(read_schema("foo,bar:int:baz"), Err(Error::Schema(_))));
        // Empty name.
        assert!(matches!(read_schema("foo:int,,bar:string"), Err(Error::Schema(_))));
    }

    #[test]
    fn test_read_schema_from_json_file() {
        let dir = std::env::temp_dir();
        let path = dir.join("bq_client_schema_test.json");
        fs::write(
            &path,
            r#"[
                {"name": "Number", "type": "integer", "mode": "REQUIRED"},
                {"name": "Name", "type": "string"}
            ]"#,
        )
        .unwrap();

        let schema = read_schema(path.to_str().unwrap()).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(schema.fields.len(), 2);
        assert_eq!(schema.fields[0].name, "Number");
        assert_eq!(schema.fields[0].field_type, "integer");
        assert_eq!(schema.fields[0].mode.as_deref(), Some("REQUIRED"));
    }
}
