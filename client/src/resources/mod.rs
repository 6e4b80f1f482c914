pub mod dataset;
pub mod job;
pub mod project;
pub mod reference;
pub mod schema;
pub mod table;

/// The server transmits 64-bit integers as JSON strings.
pub(crate) mod int64 {
    pub(crate) mod option {
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<i64>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => serializer.serialize_str(&value.to_string()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<i64>, D::Error> {
            #[derive(Deserialize)]
            #[serde(untagged)]
            enum Raw {
                Int(i64),
                Str(String),
            }
            Ok(match Option::<Raw>::deserialize(deserializer)? {
                None => None,
                Some(Raw::Int(value)) => Some(value),
                Some(Raw::Str(value)) => {
                    Some(value.parse().map_err(serde::de::Error::custom)?)
                }
            })
        }
    }
}
