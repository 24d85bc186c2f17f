use anyhow::{anyhow, Result};
use arrow_array::{Array, Float32Array, Int32Array, RecordBatch, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{DistanceType, Table};

use projectiq_core::types::{Chunk, Meta, RetrievedChunk};

use crate::schema::{COL_CHUNK_INDEX, COL_CONTENT, COL_ID, COL_METADATA, COL_ORDINAL, COL_TOTAL_CHUNKS};

/// Candidates fetched per requested result before the final ordering.
pub const CANDIDATE_FACTOR: usize = 10;

struct Candidate {
	distance: f32,
	ordinal: i32,
	chunk: Chunk,
}

/// Cosine nearest neighbours of `query`, closest first; ties go to the earlier row.
pub async fn nearest(table: &Table, query: Vec<f32>, k: usize) -> Result<Vec<RetrievedChunk>> {
	if k == 0 { return Ok(Vec::new()); }
	let mut stream = table
		.vector_search(query)?
		.distance_type(DistanceType::Cosine)
		.limit(k * CANDIDATE_FACTOR)
		.execute()
		.await?;
	let mut candidates = Vec::new();
	while let Some(batch) = stream.try_next().await? {
		decode_batch(&batch, &mut candidates)?;
	}
	candidates.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.ordinal.cmp(&b.ordinal)));
	candidates.truncate(k);
	Ok(candidates.into_iter().map(|c| RetrievedChunk { chunk: c.chunk, score: 1.0 - c.distance }).collect())
}

fn decode_batch(batch: &RecordBatch, out: &mut Vec<Candidate>) -> Result<()> {
	let ids = column::<StringArray>(batch, COL_ID)?;
	let ordinals = column::<Int32Array>(batch, COL_ORDINAL)?;
	let contents = column::<StringArray>(batch, COL_CONTENT)?;
	let metadata = column::<StringArray>(batch, COL_METADATA)?;
	let chunk_indices = column::<Int32Array>(batch, COL_CHUNK_INDEX)?;
	let totals = column::<Int32Array>(batch, COL_TOTAL_CHUNKS)?;
	let distances = column::<Float32Array>(batch, "_distance")?;
	for i in 0..batch.num_rows() {
		let meta: Meta = serde_json::from_str(metadata.value(i))?;
		out.push(Candidate {
			distance: distances.value(i),
			ordinal: ordinals.value(i),
			chunk: Chunk {
				id: ids.value(i).to_string(),
				content: contents.value(i).to_string(),
				metadata: meta,
				chunk_index: usize::try_from(chunk_indices.value(i))?,
				total_chunks: usize::try_from(totals.value(i))?,
			},
		});
	}
	Ok(())
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_any().downcast_ref::<T>())
		.ok_or_else(|| anyhow!("column '{}' missing or of unexpected type", name))
}
