//! Column definitions
//!
//! A column either reads a field of the listed item, projects one of the
//! common columns, or is a constant.

use serde::Serialize;
use serde_json::Value;

use crate::aws::identity::CommonColumnData;
use crate::hydrate::GLOBAL_REGION;

/// Value type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Int,
    Bool,
    Json,
    Timestamp,
}

/// Field of [`CommonColumnData`] a column projects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommonField {
    Partition,
    Region,
    AccountId,
}

impl CommonField {
    pub fn project(self, data: &CommonColumnData) -> Value {
        let value = match self {
            CommonField::Partition => &data.partition,
            CommonField::Region => &data.region,
            CommonField::AccountId => &data.account_id,
        };
        Value::String(value.clone())
    }
}

/// Where a column's value comes from
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnSource {
    /// Dot path into the listed item
    Field(String),
    /// Cache-backed common column
    Common(CommonField),
    Constant(Value),
}

/// Column definition
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub description: String,
    pub column_type: ColumnType,
    pub source: ColumnSource,
}

impl ColumnDef {
    /// A column reading the item field of the same name
    pub fn new(name: &str, column_type: ColumnType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            column_type,
            source: ColumnSource::Field(name.to_string()),
        }
    }

    /// Read from `path` instead of the column name
    pub fn from_path(mut self, path: &str) -> Self {
        self.source = ColumnSource::Field(path.to_string());
        self
    }

    pub fn from_common(mut self, field: CommonField) -> Self {
        self.source = ColumnSource::Common(field);
        self
    }

    pub fn from_constant(mut self, value: impl Into<Value>) -> Self {
        self.source = ColumnSource::Constant(value.into());
        self
    }

    pub fn is_common(&self) -> bool {
        matches!(self.source, ColumnSource::Common(_))
    }
}

const PARTITION_DESCRIPTION: &str =
    "The AWS partition in which the resource is located (aws, aws-cn, or aws-us-gov).";
const REGION_DESCRIPTION: &str = "The AWS Region in which the resource is located.";
const ACCOUNT_ID_DESCRIPTION: &str = "The AWS Account ID in which the resource is located.";

fn partition_column() -> ColumnDef {
    ColumnDef::new("partition", ColumnType::String, PARTITION_DESCRIPTION)
        .from_common(CommonField::Partition)
}

fn region_column() -> ColumnDef {
    ColumnDef::new("region", ColumnType::String, REGION_DESCRIPTION)
        .from_common(CommonField::Region)
}

fn account_id_column() -> ColumnDef {
    ColumnDef::new("account_id", ColumnType::String, ACCOUNT_ID_DESCRIPTION)
        .from_common(CommonField::AccountId)
}

/// Append the common columns for regional resources
pub fn regional_columns(mut columns: Vec<ColumnDef>) -> Vec<ColumnDef> {
    columns.extend([partition_column(), region_column(), account_id_column()]);
    columns
}

/// Append the common columns for global resources; `region` is always "global"
pub fn global_columns(mut columns: Vec<ColumnDef>) -> Vec<ColumnDef> {
    columns.extend([
        partition_column(),
        region_column().from_constant(GLOBAL_REGION),
        account_id_column(),
    ]);
    columns
}

/// Append the common columns for S3 resources, which carry no region column
pub fn s3_columns(mut columns: Vec<ColumnDef>) -> Vec<ColumnDef> {
    columns.extend([partition_column(), account_id_column()]);
    columns
}

/// Extract a value from JSON using a dot-notation path
/// Numeric segments index into arrays; missing paths give `Value::Null`
pub fn extract_json_value(item: &Value, path: &str) -> Value {
    let mut current = item;

    for part in path.split('.') {
        let next = match (current, part.parse::<usize>()) {
            (Value::Array(arr), Ok(idx)) => arr.get(idx),
            _ => current.get(part),
        };
        current = match next {
            Some(v) => v,
            None => return Value::Null,
        };
    }

    current.clone()
}
