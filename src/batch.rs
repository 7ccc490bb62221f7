//! Chunked multi-row writes. These go straight to the engine and never touch
//! navigations.

use eagerload_core::engine::SqlEngine;
use eagerload_core::materialize::Record;
use eagerload_core::metadata::{ColumnDescriptor, EntityDescriptor};
use eagerload_core::{Dialect, EagerError, MetadataProvider, Parameters, Result, Value};

use crate::session::Session;

/// Most engines cap bound parameters per statement; SQLite's historical limit
/// is the lowest common denominator.
const MAX_PARAMETERS: usize = 999;

impl<E: SqlEngine> Session<E> {
    /// Inserts `records` into `entity`'s table, one multi-row `INSERT` per
    /// chunk. Properties missing from a record are written as NULL; generated
    /// columns are only written when some record supplies them.
    ///
    /// Returns the number of inserted rows.
    pub fn batch_insert(&self, entity: &str, records: &[Record]) -> Result<u64> {
        eagerload_core::eager_profile_scope!("batch", "insert");
        let descriptor = self.registry().require(entity)?;
        let columns: Vec<&ColumnDescriptor> = descriptor
            .mapped_columns()
            .filter(|c| !c.is_generated() || records.iter().any(|r| r.contains(&c.property)))
            .collect();
        if records.is_empty() || columns.is_empty() {
            return Ok(0);
        }

        let dialect = self.dialect();
        let q = |ident: &str| dialect.quote_ident(ident);
        let head = format!(
            "INSERT INTO {} ({}) VALUES ",
            q(&descriptor.table),
            columns.iter().map(|c| q(&c.column)).collect::<Vec<_>>().join(", ")
        );

        let mut inserted = 0;
        for chunk in records.chunks(self.chunk_rows(columns.len())) {
            let mut params = Parameters::new();
            let mut tuples = Vec::with_capacity(chunk.len());
            for (row, record) in chunk.iter().enumerate() {
                let values: Vec<String> = columns
                    .iter()
                    .map(|c| {
                        let value = record.get(&c.property).cloned().unwrap_or(Value::Null);
                        params.placeholder(dialect, &format!("{}_{row}", c.property), value)
                    })
                    .collect();
                tuples.push(format!("({})", values.join(", ")));
            }
            let sql = format!("{head}{}", tuples.join(", "));
            inserted += self.run(&sql, &params)?;
        }
        eagerload_core::eager_debug!("batch", "inserted {inserted} {entity} rows");
        Ok(inserted)
    }

    /// Updates `records` by primary key. Each chunk is one `UPDATE` whose
    /// columns are set through a `CASE` on the key, so a record only changes
    /// the properties it carries.
    ///
    /// Every record must carry its primary key. Returns the number of updated
    /// rows.
    pub fn batch_update(&self, entity: &str, records: &[Record]) -> Result<u64> {
        eagerload_core::eager_profile_scope!("batch", "update");
        let descriptor = self.registry().require(entity)?;
        let key = descriptor.primary_key_column()?;
        if let Some(position) = records.iter().position(|r| r.get(&key.property).is_none_or(Value::is_null)) {
            return Err(EagerError::InvalidUsage(format!(
                "batch_update: record {position} of {entity} has no {} value",
                key.property
            )));
        }
        let columns: Vec<&ColumnDescriptor> = descriptor
            .mapped_columns()
            .filter(|c| !c.is_primary_key() && records.iter().any(|r| r.contains(&c.property)))
            .collect();
        if records.is_empty() || columns.is_empty() {
            return Ok(0);
        }

        let dialect = self.dialect();
        let mut updated = 0;
        for chunk in records.chunks(self.chunk_rows(2 * columns.len() + 1)) {
            let (sql, params) = update_statement(dialect, &descriptor, key, &columns, chunk);
            updated += self.run(&sql, &params)?;
        }
        eagerload_core::eager_debug!("batch", "updated {updated} {entity} rows");
        Ok(updated)
    }

    /// Deletes rows of `entity` by primary key, one `DELETE ... IN` per chunk.
    /// Returns the number of deleted rows.
    pub fn batch_delete<I, K>(&self, entity: &str, keys: I) -> Result<u64>
    where
        I: IntoIterator<Item = K>,
        K: Into<Value>,
    {
        eagerload_core::eager_profile_scope!("batch", "delete");
        let descriptor = self.registry().require(entity)?;
        let key = descriptor.primary_key_column()?;
        let keys: Vec<Value> = keys.into_iter().map(Into::into).collect();
        if keys.is_empty() {
            return Ok(0);
        }

        let dialect = self.dialect();
        let mut deleted = 0;
        for chunk in keys.chunks(self.chunk_rows(1)) {
            let mut params = Parameters::new();
            let list: Vec<String> = chunk
                .iter()
                .map(|value| params.placeholder(dialect, &key.property, value.clone()))
                .collect();
            let sql = format!(
                "DELETE FROM {} WHERE {} IN ({})",
                dialect.quote_ident(&descriptor.table),
                dialect.quote_ident(&key.column),
                list.join(", ")
            );
            deleted += self.run(&sql, &params)?;
        }
        eagerload_core::eager_debug!("batch", "deleted {deleted} {entity} rows");
        Ok(deleted)
    }

    /// Rows per statement when each row binds `per_row` parameters.
    fn chunk_rows(&self, per_row: usize) -> usize {
        (MAX_PARAMETERS / per_row.max(1)).clamp(1, self.options().batch_size.max(1))
    }
}

fn update_statement(
    dialect: Dialect,
    descriptor: &EntityDescriptor,
    key: &ColumnDescriptor,
    columns: &[&ColumnDescriptor],
    chunk: &[Record],
) -> (String, Parameters) {
    let q = |ident: &str| dialect.quote_ident(ident);
    let key_column = q(&key.column);
    let mut params = Parameters::new();

    let mut assignments = Vec::with_capacity(columns.len());
    for column in columns {
        let target = q(&column.column);
        let mut arms = String::new();
        for record in chunk {
            let (Some(id), Some(value)) = (record.get(&key.property), record.get(&column.property)) else {
                continue;
            };
            let id = params.placeholder(dialect, &key.property, id.clone());
            let value = params.placeholder(dialect, &column.property, value.clone());
            arms.push_str(&format!(" WHEN {id} THEN {value}"));
        }
        if !arms.is_empty() {
            assignments.push(format!("{target} = CASE {key_column}{arms} ELSE {target} END"));
        }
    }

    let ids: Vec<String> = chunk
        .iter()
        .filter_map(|record| record.get(&key.property))
        .map(|id| params.placeholder(dialect, &key.property, id.clone()))
        .collect();

    let sql = format!(
        "UPDATE {} SET {} WHERE {key_column} IN ({})",
        q(&descriptor.table),
        assignments.join(", "),
        ids.join(", ")
    );
    (sql, params)
}
