//! Relational-store adapter.
//!
//! The relational backend speaks raw SQL text: this adapter synthesizes
//! statements from the abstract query descriptor and the schema's declared
//! properties, and reconstructs field maps by zipping result rows
//! positionally against the declared property order.

use std::sync::Arc;

use log::{debug, warn};
use serde_json::Value;

use crate::record::{Record, RecordError};
use crate::schema::{FieldMap, Schema, TypeTag};

use super::errors::{StoreError, StoreResult};
use super::query::Query;

/// One result row, positionally ordered.
pub type Row = Vec<Value>;

/// A connected relational-engine handle executing raw statements.
pub trait RelationalEngine: Send + Sync {
    /// Executes one statement and returns the resulting rows (empty for
    /// statements without a result set).
    fn execute(&self, statement: &str) -> StoreResult<Vec<Row>>;
}

/// Translates queries and records for one schema into SQL statements.
pub struct RelationalAdapter {
    schema: Arc<Schema>,
    engine: Arc<dyn RelationalEngine>,
}

impl RelationalAdapter {
    pub fn new(schema: Arc<Schema>, engine: Arc<dyn RelationalEngine>) -> Self {
        Self { schema, engine }
    }

    /// Records matching the query, reconstructed from result rows.
    pub fn find(&self, query: &Query) -> StoreResult<Vec<Record>> {
        let statement = self.select_statement(query);
        let rows = self.execute(&statement)?;
        rows.into_iter()
            .map(|row| {
                Record::materialize(self.schema.clone(), self.row_to_fields(row))
                    .map_err(StoreError::from)
            })
            .collect()
    }

    pub fn find_one(&self, filter: &FieldMap) -> StoreResult<Option<Record>> {
        let query = Query::with_filter(filter.clone()).limit(1);
        Ok(self.find(&query)?.into_iter().next())
    }

    /// Looks up a single row by the schema's designated primary key.
    pub fn find_by_id(&self, id: &Value) -> StoreResult<Option<Record>> {
        let primary = self.primary_key()?;
        let mut filter = FieldMap::new();
        filter.insert(primary.to_string(), id.clone());
        self.find_one(&filter)
    }

    /// The most recently created match: primary key descending, limit one.
    pub fn find_latest(&self, filter: &FieldMap) -> StoreResult<Option<Record>> {
        let primary = self.primary_key()?;
        let query = Query::with_filter(filter.clone())
            .sort(primary, super::query::SortOrder::Descending)
            .limit(1);
        Ok(self.find(&query)?.into_iter().next())
    }

    pub fn count(&self, filter: &FieldMap) -> StoreResult<u64> {
        let mut statement = format!("SELECT COUNT(*) FROM {}", self.schema.name());
        statement.push_str(&self.where_clause(filter));
        let rows = self.execute(&statement)?;
        Ok(rows
            .first()
            .and_then(|row| row.first())
            .and_then(scalar_to_u64)
            .unwrap_or(0))
    }

    /// Validates and writes the record: an `UPDATE` targeted at the primary
    /// key when the record is already persisted, an `INSERT` otherwise, so
    /// repeated saves never duplicate rows.
    pub fn save(&self, record: &mut Record) -> StoreResult<()> {
        record.validate().map_err(RecordError::from)?;

        if record.is_persisted() {
            let statement = self.update_statement(record)?;
            self.execute(&statement)?;
        } else {
            self.insert(record)?;
        }
        Ok(())
    }

    /// Validates and inserts the record as a new row.
    pub fn insert(&self, record: &mut Record) -> StoreResult<()> {
        record.validate().map_err(RecordError::from)?;
        let statement = self.insert_statement(record.fields());
        self.execute(&statement)?;
        record.mark_persisted();
        Ok(())
    }

    /// Deletes the record's row, targeted at the designated primary key.
    pub fn delete(&self, record: &mut Record) -> StoreResult<bool> {
        let primary = self.primary_key()?;
        let value = record.primary_value().ok_or_else(|| {
            RecordError::NotPersisted(format!("record carries no '{}' value", primary))
        })?;

        let table = self.schema.name();
        let statement = format!(
            "DELETE FROM {} WHERE {}.{} = {}",
            table,
            table,
            primary,
            render_literal(value)
        );
        self.execute(&statement)?;
        record.mark_unpersisted();
        Ok(true)
    }

    /// Validates and inserts a batch of records with one multi-row
    /// statement. Absent declared properties insert as `NULL`.
    pub fn bulk_insert(&self, records: &mut [Record]) -> StoreResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        for record in records.iter() {
            record.validate().map_err(RecordError::from)?;
        }

        let mut statement = format!(
            "INSERT INTO {} ({}) VALUES ",
            self.schema.name(),
            self.column_list()
        );
        for (i, record) in records.iter().enumerate() {
            if i > 0 {
                statement.push_str(", ");
            }
            let values: Vec<String> = self
                .schema
                .properties()
                .iter()
                .map(|(name, _)| {
                    record
                        .fields()
                        .get(name)
                        .map(render_literal)
                        .unwrap_or_else(|| "NULL".to_string())
                })
                .collect();
            statement.push_str(&format!("({})", values.join(", ")));
        }

        self.execute(&statement)?;
        for record in records.iter_mut() {
            record.mark_persisted();
        }
        Ok(())
    }

    /// Removes every row of this schema's table.
    pub fn clear(&self) -> StoreResult<()> {
        let statement = format!("DELETE FROM {}", self.schema.name());
        self.execute(&statement)?;
        Ok(())
    }

    /// Synthesizes the table definition for this schema.
    pub fn create_table_statement(&self) -> String {
        let columns: Vec<String> = self
            .schema
            .properties()
            .iter()
            .map(|(name, node)| format!("{} {}", name, column_type(node)))
            .collect();

        let mut statement = format!(
            "CREATE TABLE IF NOT EXISTS {} ({}",
            self.schema.name(),
            columns.join(", ")
        );
        if let Some(primary) = self.schema.primary_key() {
            statement.push_str(&format!(", PRIMARY KEY ({})", primary));
        }
        statement.push(')');
        statement
    }

    /// Executes the synthesized table definition.
    pub fn ensure_table(&self) -> StoreResult<()> {
        let statement = self.create_table_statement();
        self.execute(&statement)?;
        Ok(())
    }

    /// Synthesizes the `SELECT` for one query descriptor.
    ///
    /// `skip` is not translated; a query carrying one is answered from the
    /// full result set and the drop is logged.
    pub fn select_statement(&self, query: &Query) -> String {
        if query.skip_option().is_some() {
            warn!(
                "'skip' is not translated for the relational backend; ignoring it for '{}'",
                self.schema.name()
            );
        }

        let mut statement = format!(
            "SELECT {} FROM {}",
            self.column_list(),
            self.schema.name()
        );
        statement.push_str(&self.where_clause(query.filter()));

        if let Some((field, order)) = query.sort_option() {
            statement.push_str(&format!(" ORDER BY {} {}", field, order.keyword()));
        }
        if let Some(limit) = query.limit_option() {
            statement.push_str(&format!(" LIMIT {}", limit));
        }
        statement
    }

    fn execute(&self, statement: &str) -> StoreResult<Vec<Row>> {
        debug!("executing: {}", statement);
        self.engine.execute(statement)
    }

    /// Zips one row positionally against the declared property order.
    fn row_to_fields(&self, row: Row) -> FieldMap {
        let mut fields = FieldMap::new();
        for ((name, _), value) in self.schema.properties().iter().zip(row) {
            fields.insert(name.clone(), value);
        }
        fields
    }

    fn column_list(&self) -> String {
        self.schema
            .properties()
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    fn where_clause(&self, filter: &FieldMap) -> String {
        if filter.is_empty() {
            return String::new();
        }
        let table = self.schema.name();
        let predicates: Vec<String> = filter
            .iter()
            .map(|(key, value)| format!("{}.{} = {}", table, key, render_literal(value)))
            .collect();
        format!(" WHERE {}", predicates.join(" AND "))
    }

    fn insert_statement(&self, fields: &FieldMap) -> String {
        let mut columns = Vec::new();
        let mut values = Vec::new();
        for (name, _) in self.schema.properties() {
            if let Some(value) = fields.get(name) {
                columns.push(name.as_str());
                values.push(render_literal(value));
            }
        }
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.schema.name(),
            columns.join(", "),
            values.join(", ")
        )
    }

    fn update_statement(&self, record: &Record) -> StoreResult<String> {
        let primary = self.primary_key()?;
        let value = record.primary_value().ok_or_else(|| {
            RecordError::NotPersisted(format!("record carries no '{}' value", primary))
        })?;
        let rendered_key = render_literal(value);

        let assignments: Vec<String> = self
            .schema
            .properties()
            .iter()
            .filter(|(name, _)| name.as_str() != primary)
            .filter_map(|(name, _)| {
                record
                    .fields()
                    .get(name)
                    .map(|value| format!("{} = {}", name, render_literal(value)))
            })
            .collect();

        let table = self.schema.name();
        Ok(format!(
            "UPDATE {} SET {} WHERE {}.{} = {}",
            table,
            assignments.join(", "),
            table,
            primary,
            rendered_key
        ))
    }

    fn primary_key(&self) -> StoreResult<&str> {
        self.schema
            .primary_key()
            .ok_or_else(|| StoreError::MissingPrimaryKey {
                schema: self.schema.name().to_string(),
            })
    }
}

/// Renders one value as a SQL literal. Strings are quote-wrapped with
/// embedded quotes doubled; containers serialize to quoted JSON text.
fn render_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        other => format!("'{}'", other.to_string().replace('\'', "''")),
    }
}

fn column_type(node: &crate::schema::SchemaNode) -> String {
    match node.type_spec().single() {
        Some(TypeTag::Integer) => "INTEGER".to_string(),
        Some(TypeTag::Number) => "DOUBLE PRECISION".to_string(),
        Some(TypeTag::Boolean) => "BOOLEAN".to_string(),
        Some(TypeTag::Date) => "TIMESTAMP".to_string(),
        _ => format!("VARCHAR({})", node.length().unwrap_or(64)),
    }
}

fn scalar_to_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_i64().and_then(|i| u64::try_from(i).ok()))
            .or_else(|| n.as_f64().map(|f| f as u64)),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
