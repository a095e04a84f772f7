//! Management resource models
//!
//! Wire names are camelCase. The mock server feeds these from CSV files, so
//! numbers may arrive as strings and list fields as delimited text; the
//! [`lenient`] helpers accept both shapes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    #[serde(deserialize_with = "lenient::id")]
    pub id: i64,
    pub name: String,
    #[serde(default, deserialize_with = "lenient::blob")]
    pub metadata: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workbench {
    #[serde(deserialize_with = "lenient::id")]
    pub id: i64,
    #[serde(deserialize_with = "lenient::id")]
    pub tenant_id: i64,
    pub code: String,
    #[serde(default, deserialize_with = "lenient::blob")]
    pub config: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequest {
    #[serde(deserialize_with = "lenient::id")]
    pub id: i64,
    #[serde(deserialize_with = "lenient::id")]
    pub tenant_id: i64,
    #[serde(deserialize_with = "lenient::id")]
    pub workbench_id: i64,
    pub status: String,
    #[serde(default, deserialize_with = "lenient::blob")]
    pub payload: Value,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(deserialize_with = "lenient::id")]
    pub id: i64,
    #[serde(deserialize_with = "lenient::id")]
    pub request_id: i64,
    #[serde(default, deserialize_with = "lenient::optional_id")]
    pub assignee_id: Option<i64>,
    pub status: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Queue {
    #[serde(deserialize_with = "lenient::id")]
    pub id: i64,
    pub name: String,
    #[serde(deserialize_with = "lenient::id")]
    pub workbench_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    #[serde(deserialize_with = "lenient::id")]
    pub id: i64,
    pub name: String,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    #[serde(deserialize_with = "lenient::id")]
    pub id: i64,
    pub name: String,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub capabilities: Vec<String>,
}

/// Output of the `compute_health` tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub sla_met: bool,
    pub elapsed: f64,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Performance {
    pub total_tasks: u64,
    pub completed_on_time: u64,
    pub breach_count: u64,
}

pub mod lenient {
    //! Deserializers tolerant of CSV-sourced values

    use serde::de::{Deserializer, Error};
    use serde::Deserialize;
    use serde_json::Value;

    /// Integer, or a string holding one
    pub fn id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Number(n) => n
                .as_i64()
                .ok_or_else(|| D::Error::custom(format!("id {n} is not an integer"))),
            Value::String(s) => s
                .trim()
                .parse()
                .map_err(|_| D::Error::custom(format!("id '{s}' is not an integer"))),
            other => Err(D::Error::custom(format!("unexpected id value {other}"))),
        }
    }

    /// Like [`id`], with null and empty strings read as `None`
    pub fn optional_id<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<i64>, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(None),
            Value::String(s) if s.trim().is_empty() => Ok(None),
            value => id(value).map(Some).map_err(D::Error::custom),
        }
    }

    /// Any JSON; a string that itself holds JSON is decoded
    pub fn blob<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Value, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => match serde_json::from_str::<Value>(&s) {
                Ok(decoded @ (Value::Object(_) | Value::Array(_))) => decoded,
                _ => Value::String(s),
            },
            other => other,
        })
    }

    /// Array of strings, or text delimited by `;`, `,` or `|`
    pub fn string_list<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<String>, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(Vec::new()),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s),
                    other => Err(D::Error::custom(format!("expected string, found {other}"))),
                })
                .collect(),
            Value::String(s) => {
                if let Ok(items) = serde_json::from_str::<Vec<String>>(&s) {
                    return Ok(items);
                }
                Ok(s.split([';', ',', '|'])
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .map(str::to_string)
                    .collect())
            }
            other => Err(D::Error::custom(format!("expected list, found {other}"))),
        }
    }
}
