use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

pub const COL_ID: &str = "id";
pub const COL_ORDINAL: &str = "ordinal";
pub const COL_CONTENT: &str = "content";
pub const COL_SOURCE: &str = "source";
pub const COL_METADATA: &str = "metadata";
pub const COL_CHUNK_INDEX: &str = "chunk_index";
pub const COL_TOTAL_CHUNKS: &str = "total_chunks";
pub const COL_VECTOR: &str = "vector";

/// Chunk rows; `dim` is fixed per collection by the embedder that built it.
pub fn chunk_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new(COL_ID, DataType::Utf8, false),
		Field::new(COL_ORDINAL, DataType::Int32, false),
		Field::new(COL_CONTENT, DataType::Utf8, false),
		Field::new(COL_SOURCE, DataType::Utf8, false),
		Field::new(COL_METADATA, DataType::Utf8, false),
		Field::new(COL_CHUNK_INDEX, DataType::Int32, false),
		Field::new(COL_TOTAL_CHUNKS, DataType::Int32, false),
		Field::new(COL_VECTOR, DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}

pub fn meta_schema() -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("key", DataType::Utf8, false),
		Field::new("value", DataType::Utf8, false),
		Field::new("updated_at", DataType::Timestamp(arrow_schema::TimeUnit::Millisecond, None), false),
	]))
}
