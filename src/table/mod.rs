//! Table definitions and row binding
//!
//! Listing remote entities is up to the caller; this module turns listed items
//! into output rows, filling cache-backed columns through a [`Connection`].
//!
//! # Example
//!
//! ```ignore
//! use awsrows::table::{regional_columns, ColumnDef, ColumnType, TableDef};
//!
//! let table = TableDef::new(
//!     "aws_audit_manager_evidence",
//!     "AWS Audit Manager Evidence",
//!     regional_columns(vec![ColumnDef::new("id", ColumnType::String, "Evidence id")]),
//! );
//! let rows = table.bind_rows(&connection, &ctx, &items).await?;
//! ```

mod columns;

pub use columns::{
    extract_json_value, global_columns, regional_columns, s3_columns, ColumnDef, ColumnSource,
    ColumnType, CommonField,
};

use std::sync::Arc;

use futures::future::try_join_all;
use serde_json::{json, Map, Value};

use crate::aws::identity::CommonColumnData;
use crate::connection::Connection;
use crate::hydrate::{HydrateError, QueryContext};

/// One output row, keyed by column name
pub type Row = Map<String, Value>;

/// Table definition
#[derive(Debug, Clone)]
pub struct TableDef {
    pub name: String,
    pub description: String,
    pub columns: Vec<ColumnDef>,
}

impl TableDef {
    pub fn new(name: &str, description: &str, columns: Vec<ColumnDef>) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            columns,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Column schema as JSON: name, type and description of every column
    pub fn schema(&self) -> Value {
        let columns: Vec<Value> = self
            .columns
            .iter()
            .map(|c| {
                json!({
                    "name": c.name,
                    "type": c.column_type,
                    "description": c.description,
                })
            })
            .collect();

        json!({
            "name": self.name,
            "description": self.description,
            "columns": columns,
        })
    }

    /// Bind one listed item to a row.
    ///
    /// Common columns are resolved once per row, and only if the table has any.
    pub async fn bind_row(
        &self,
        connection: &Connection,
        ctx: &QueryContext,
        item: &Value,
    ) -> Result<Row, HydrateError> {
        let mut common: Option<Arc<CommonColumnData>> = None;
        let mut row = Row::new();

        for column in &self.columns {
            let value = match &column.source {
                ColumnSource::Field(path) => extract_json_value(item, path),
                ColumnSource::Constant(value) => value.clone(),
                ColumnSource::Common(field) => {
                    if common.is_none() {
                        common = Some(connection.common_columns(ctx).await?);
                    }
                    match &common {
                        Some(data) => field.project(data),
                        None => Value::Null,
                    }
                }
            };
            row.insert(column.name.clone(), value);
        }

        Ok(row)
    }

    /// Bind every item concurrently. Fails if any row fails.
    pub async fn bind_rows(
        &self,
        connection: &Connection,
        ctx: &QueryContext,
        items: &[Value],
    ) -> Result<Vec<Row>, HydrateError> {
        tracing::debug!(
            "{}: binding {} rows for region {}",
            self.name,
            items.len(),
            ctx.region()
        );
        try_join_all(items.iter().map(|item| self.bind_row(connection, ctx, item))).await
    }
}
