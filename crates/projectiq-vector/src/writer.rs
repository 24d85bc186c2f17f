use anyhow::{ensure, Result};
use arrow_array::types::Float32Type;
use arrow_array::{FixedSizeListArray, Int32Array, RecordBatch, RecordBatchIterator, StringArray};
use lancedb::Connection;
use std::sync::Arc;
use tracing::debug;

use projectiq_core::types::Chunk;

use crate::schema::chunk_schema;

/// Rows per record batch.
const WRITE_BATCH: usize = 1000;

/// Create `table` holding `chunks` with their `embeddings`; row order is the ordinal.
pub async fn write_chunks(conn: &Connection, table: &str, chunks: &[Chunk], embeddings: &[Vec<f32>], dim: usize) -> Result<()> {
	ensure!(chunks.len() == embeddings.len(), "{} chunks but {} embeddings", chunks.len(), embeddings.len());
	let dim = i32::try_from(dim)?;
	let schema = chunk_schema(dim);
	let mut batches = Vec::new();
	for (n, (rows, vecs)) in chunks.chunks(WRITE_BATCH).zip(embeddings.chunks(WRITE_BATCH)).enumerate() {
		batches.push(Ok(to_record_batch(n * WRITE_BATCH, rows, vecs, dim)?));
	}
	debug!("Writing {} chunks in {} batches to '{}'", chunks.len(), batches.len(), table);
	let reader = Box::new(RecordBatchIterator::new(batches.into_iter(), schema));
	conn.create_table(table, reader).execute().await?;
	Ok(())
}

fn to_record_batch(first_ordinal: usize, chunks: &[Chunk], embeddings: &[Vec<f32>], dim: i32) -> Result<RecordBatch> {
	let mut ordinals = Vec::with_capacity(chunks.len());
	let mut chunk_indices = Vec::with_capacity(chunks.len());
	let mut total_chunks = Vec::with_capacity(chunks.len());
	let mut metadata = Vec::with_capacity(chunks.len());
	for (i, chunk) in chunks.iter().enumerate() {
		ordinals.push(i32::try_from(first_ordinal + i)?);
		chunk_indices.push(i32::try_from(chunk.chunk_index)?);
		total_chunks.push(i32::try_from(chunk.total_chunks)?);
		metadata.push(serde_json::to_string(&chunk.metadata)?);
	}
	let vectors = embeddings.iter().map(|v| Some(v.iter().map(|&x| Some(x)).collect::<Vec<_>>()));
	Ok(RecordBatch::try_new(chunk_schema(dim), vec![
		Arc::new(StringArray::from_iter_values(chunks.iter().map(|c| c.id.as_str()))),
		Arc::new(Int32Array::from(ordinals)),
		Arc::new(StringArray::from_iter_values(chunks.iter().map(|c| c.content.as_str()))),
		Arc::new(StringArray::from_iter_values(chunks.iter().map(Chunk::source))),
		Arc::new(StringArray::from(metadata)),
		Arc::new(Int32Array::from(chunk_indices)),
		Arc::new(Int32Array::from(total_chunks)),
		Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, dim)),
	])?)
}
