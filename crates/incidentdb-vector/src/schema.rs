use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

/// Must match the embedding provider's output dimensionality. A mismatch
/// between ingest-time and query-time vectors makes every search miss.
pub const EMBEDDING_DIM: i32 = 384;

pub fn build_arrow_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("incident_id", DataType::Utf8, false),
        Field::new("tech_stack", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                EMBEDDING_DIM,
            ),
            true,
        ),
    ]))
}
