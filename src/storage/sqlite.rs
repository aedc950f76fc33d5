//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the ProductStore trait,
//! with an FTS5 table mirroring the searchable product fields.

use crate::product::ProductRecord;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ProductStore, StorageError, StorageResult};
use crate::storage::{DatabaseStats, ProductFilter, UpsertOutcome};
use chrono::{TimeZone, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use tracing::{debug, warn};

/// SQLite product store
pub struct SqliteProductStore {
    conn: Connection,
}

impl SqliteProductStore {
    /// Opens or creates the store at `path`
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA mmap_size = 268435456;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory store
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

/// Writes one record and its search entry on an open transaction or savepoint
fn upsert_in(conn: &Connection, record: &ProductRecord, now_ms: i64) -> StorageResult<UpsertOutcome> {
    if record.url.trim().is_empty() {
        return Err(StorageError::InvalidRecord(format!(
            "product '{}' has no url",
            record.title
        )));
    }

    let id = record.resolve_id();
    let mut stored = record.clone();
    stored.id = Some(id.clone());
    let data = serde_json::to_string(&stored)?;

    let existed = conn
        .query_row("SELECT 1 FROM products WHERE id = ?1", params![id], |_| Ok(()))
        .optional()?
        .is_some();

    let price = stored.price.as_ref();
    conn.execute(
        "INSERT INTO products (id, source, title, description, price, original_price, currency,
                               brand, category, url, data, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)
         ON CONFLICT(id) DO UPDATE SET
            source = excluded.source,
            title = excluded.title,
            description = excluded.description,
            price = excluded.price,
            original_price = excluded.original_price,
            currency = excluded.currency,
            brand = excluded.brand,
            category = excluded.category,
            url = excluded.url,
            data = excluded.data,
            updated_at = excluded.updated_at",
        params![
            id,
            stored.source,
            stored.title,
            stored.description,
            price.and_then(|p| p.current),
            price.and_then(|p| p.original),
            price.map(|p| p.currency.as_str()),
            stored.brand,
            stored.category,
            stored.url,
            data,
            now_ms,
        ],
    )?;

    conn.execute("DELETE FROM product_search WHERE id = ?1", params![id])?;
    conn.execute(
        "INSERT INTO product_search (id, title, description, brand, category)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            id,
            stored.title,
            stored.description,
            stored.brand,
            stored.category
        ],
    )?;

    Ok(UpsertOutcome {
        id,
        inserted: !existed,
    })
}

/// Turns free text into an FTS5 query of quoted terms joined by implicit AND
///
/// Returns None when the text contains no terms.
pub fn fts_query(text: &str) -> Option<String> {
    let terms: Vec<String> = text
        .split_whitespace()
        .map(|word| word.replace('"', ""))
        .filter(|word| !word.is_empty())
        .map(|word| format!("\"{}\"", word))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}

fn decode_record(data: &str) -> StorageResult<ProductRecord> {
    Ok(serde_json::from_str(data)?)
}

impl ProductStore for SqliteProductStore {
    // ===== Ingestion =====

    fn try_upsert(&mut self, record: &ProductRecord) -> StorageResult<UpsertOutcome> {
        let tx = self.conn.transaction()?;
        let outcome = upsert_in(&tx, record, Utc::now().timestamp_millis())?;
        tx.commit()?;
        Ok(outcome)
    }

    fn bulk_upsert(&mut self, records: &[ProductRecord]) -> StorageResult<(usize, usize)> {
        let mut succeeded = 0;
        let mut failed = 0;

        let mut tx = self.conn.transaction()?;
        for record in records {
            let savepoint = tx.savepoint()?;
            match upsert_in(&savepoint, record, Utc::now().timestamp_millis()) {
                Ok(_) => {
                    savepoint.commit()?;
                    succeeded += 1;
                }
                Err(e) => {
                    // Dropping the savepoint rolls back this record only
                    warn!("Skipping product {:?}: {}", record.url, e);
                    failed += 1;
                }
            }
        }
        tx.commit()?;

        debug!("Bulk upsert: {} stored, {} failed", succeeded, failed);
        Ok((succeeded, failed))
    }

    // ===== Lookup =====

    fn find(
        &self,
        filter: &ProductFilter,
        limit: usize,
        offset: usize,
    ) -> StorageResult<(Vec<ProductRecord>, u64)> {
        let mut conditions: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(query) = filter.query.as_deref().and_then(fts_query) {
            let any_match: bool = self.conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM product_search WHERE product_search MATCH ?1)",
                params![query],
                |row| row.get(0),
            )?;
            if !any_match {
                return Ok((Vec::new(), 0));
            }
            conditions.push("id IN (SELECT id FROM product_search WHERE product_search MATCH ?)");
            values.push(Value::Text(query));
        }

        if let Some(source) = &filter.source {
            conditions.push("source = ? COLLATE NOCASE");
            values.push(Value::Text(source.clone()));
        }

        if let Some(category) = &filter.category {
            conditions.push("category = ?");
            values.push(Value::Text(category.clone()));
        }

        if let Some(brand) = &filter.brand {
            conditions.push("brand = ?");
            values.push(Value::Text(brand.clone()));
        }

        if let Some(min) = filter.min_price {
            conditions.push("price >= ?");
            values.push(Value::Real(min));
        }

        if let Some(max) = filter.max_price {
            conditions.push("price <= ?");
            values.push(Value::Real(max));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM products{}", where_clause),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        let mut page_values = values;
        page_values.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
        page_values.push(Value::Integer(i64::try_from(offset).unwrap_or(i64::MAX)));

        let mut stmt = self.conn.prepare(&format!(
            "SELECT data FROM products{} ORDER BY updated_at DESC, rowid DESC LIMIT ? OFFSET ?",
            where_clause
        ))?;

        let rows = stmt
            .query_map(params_from_iter(page_values.iter()), |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let records = rows
            .iter()
            .map(|data| decode_record(data))
            .collect::<StorageResult<Vec<_>>>()?;

        Ok((records, total as u64))
    }

    fn get_by_id(&self, id: &str) -> StorageResult<Option<ProductRecord>> {
        let data: Option<String> = self
            .conn
            .query_row(
                "SELECT data FROM products WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        data.as_deref().map(decode_record).transpose()
    }

    fn stats(&self) -> StorageResult<DatabaseStats> {
        let total_products: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?;

        let mut stmt = self.conn.prepare(
            "SELECT source, COUNT(*) FROM products GROUP BY source ORDER BY COUNT(*) DESC, source",
        )?;
        let by_source = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let top_categories = self.top_values("category")?;
        let top_brands = self.top_values("brand")?;

        let page_count: i64 = self
            .conn
            .query_row("PRAGMA page_count", [], |row| row.get(0))?;
        let page_size: i64 = self
            .conn
            .query_row("PRAGMA page_size", [], |row| row.get(0))?;

        let last_updated_ms: Option<i64> =
            self.conn
                .query_row("SELECT MAX(updated_at) FROM products", [], |row| row.get(0))?;

        Ok(DatabaseStats {
            total_products: total_products as u64,
            by_source,
            top_categories,
            top_brands,
            size_bytes: (page_count * page_size) as u64,
            last_updated: last_updated_ms.and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        })
    }

    // ===== Maintenance =====

    fn delete_by_source(&mut self, source: &str) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM product_search
             WHERE id IN (SELECT id FROM products WHERE source = ?1 COLLATE NOCASE)",
            params![source],
        )?;
        let removed = tx.execute(
            "DELETE FROM products WHERE source = ?1 COLLATE NOCASE",
            params![source],
        )?;
        tx.commit()?;
        Ok(removed)
    }

    fn delete_product(&mut self, id: &str) -> StorageResult<bool> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM product_search WHERE id = ?1", params![id])?;
        let removed = tx.execute("DELETE FROM products WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(removed > 0)
    }

    fn backup_to(&self, path: &Path) -> StorageResult<()> {
        if path.exists() {
            return Err(StorageError::Database(format!(
                "backup target {} already exists",
                path.display()
            )));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let target = path.to_string_lossy();
        self.conn.execute("VACUUM INTO ?1", params![target.as_ref()])?;
        Ok(())
    }
}

impl SqliteProductStore {
    /// Ten most common non-empty values of a text column
    fn top_values(&self, column: &str) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {col}, COUNT(*) FROM products WHERE {col} != ''
             GROUP BY {col} ORDER BY COUNT(*) DESC, {col} LIMIT 10",
            col = column
        ))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
