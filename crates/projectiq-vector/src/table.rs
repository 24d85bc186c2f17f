//! Connection helpers and the per-collection `meta` table.
//!
//! Each collection `c` has a sibling key/value table `c_meta` recording the
//! embedder that built it, its dimension, row count and build time.
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use arrow_array::{RecordBatch, RecordBatchIterator, StringArray, TimestampMillisecondArray};
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection};

use crate::schema::meta_schema;

pub const META_EMBEDDER_ID: &str = "embedder_id";
pub const META_DIM: &str = "dim";
pub const META_CHUNK_COUNT: &str = "chunk_count";
pub const META_BUILT_AT: &str = "built_at";

pub fn meta_table_name(collection: &str) -> String { format!("{collection}_meta") }

pub async fn open_db(dir: &Path) -> Result<Connection> {
    Ok(connect(dir.to_string_lossy().as_ref()).execute().await?)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let names = conn.table_names().execute().await?;
    Ok(names.iter().any(|n| n == name))
}

async fn create_empty_meta(conn: &Connection, name: &str) -> Result<()> {
    let empty = RecordBatchIterator::new(Vec::new().into_iter(), meta_schema());
    conn.create_table(name, Box::new(empty)).execute().await?;
    Ok(())
}

/// Insert or overwrite `key` in the meta table `meta`, creating the table on first use.
pub async fn set_meta(conn: &Connection, meta: &str, key: &str, value: &str) -> Result<()> {
    if !table_exists(conn, meta).await? {
        create_empty_meta(conn, meta).await?;
    }
    let table = conn.open_table(meta).execute().await?;
    let row = RecordBatch::try_new(
        meta_schema(),
        vec![
            Arc::new(StringArray::from(vec![key])),
            Arc::new(StringArray::from(vec![value])),
            Arc::new(TimestampMillisecondArray::from(vec![Utc::now().timestamp_millis()])),
        ],
    )?;
    let mut upsert = table.merge_insert(&["key"]);
    upsert.when_matched_update_all(None).when_not_matched_insert_all();
    upsert.execute(Box::new(RecordBatchIterator::new(vec![Ok(row)].into_iter(), meta_schema()))).await?;
    Ok(())
}

pub async fn get_meta(conn: &Connection, meta: &str, key: &str) -> Result<Option<String>> {
    if !table_exists(conn, meta).await? {
        return Ok(None);
    }
    let table = conn.open_table(meta).execute().await?;
    let filter = format!("key = '{}'", key.replace('\'', "''"));
    let batches: Vec<RecordBatch> = table.query().only_if(filter).execute().await?.try_collect().await?;
    let Some(batch) = batches.into_iter().find(|b| b.num_rows() > 0) else {
        return Ok(None);
    };
    let values = batch
        .column_by_name("value")
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow!("{meta}.value column missing"))?;
    Ok(Some(values.value(0).to_string()))
}
