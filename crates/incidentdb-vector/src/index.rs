use std::path::Path;
use std::sync::Arc;

use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection, DistanceType};

use incidentdb_core::error::{Result, RetrievalError};
use incidentdb_core::traits::VectorIndex;
use incidentdb_core::types::{IndexedVector, VectorHit};

use crate::schema::{build_arrow_schema, EMBEDDING_DIM};

/// LanceDB-backed nearest-neighbor index. One row per incident:
/// `incident_id`, `tech_stack`, and a 384-dim embedding, queried with
/// cosine distance.
pub struct LanceVectorIndex {
    db: Connection,
    table_name: String,
}

impl LanceVectorIndex {
    /// Connects once; the connection is shared for the process lifetime.
    pub async fn open(db_path: &Path, table_name: &str) -> Result<Self> {
        let db = connect(db_path.to_string_lossy().as_ref())
            .execute()
            .await
            .map_err(|e| RetrievalError::Unavailable(format!("lancedb connect: {e}")))?;
        Ok(Self {
            db,
            table_name: table_name.to_string(),
        })
    }

    async fn table_exists(&self) -> Result<bool> {
        let names = self
            .db
            .table_names()
            .execute()
            .await
            .map_err(|e| RetrievalError::Unavailable(format!("lancedb table_names: {e}")))?;
        Ok(names.contains(&self.table_name))
    }

    fn to_record_batch(&self, vectors: &[IndexedVector]) -> Result<RecordBatch> {
        let schema = build_arrow_schema();
        let mut ids = Vec::new();
        let mut stacks = Vec::new();
        let mut embeddings: Vec<Option<Vec<Option<f32>>>> = Vec::new();
        for v in vectors {
            if v.vector.len() != EMBEDDING_DIM as usize {
                return Err(RetrievalError::Unavailable(format!(
                    "embedding dim {} does not match index dim {} for {}",
                    v.vector.len(),
                    EMBEDDING_DIM,
                    v.incident_id
                )));
            }
            ids.push(v.incident_id.clone());
            stacks.push(v.tech_stack.as_str().to_string());
            embeddings.push(Some(v.vector.iter().map(|&x| Some(x)).collect()));
        }
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(stacks)),
                Arc::new(FixedSizeListArray::from_iter_primitive::<
                    arrow_array::types::Float32Type,
                    _,
                    _,
                >(embeddings.into_iter(), EMBEDDING_DIM)),
            ],
        )
        .map_err(|e| RetrievalError::Unavailable(format!("arrow batch: {e}")))
    }
}

#[async_trait::async_trait]
impl VectorIndex for LanceVectorIndex {
    async fn upsert(&self, vectors: &[IndexedVector]) -> Result<()> {
        if vectors.is_empty() {
            return Ok(());
        }
        let record_batch = self.to_record_batch(vectors)?;
        let schema = record_batch.schema();
        let reader = Box::new(RecordBatchIterator::new(
            vec![Ok(record_batch)].into_iter(),
            schema,
        ));

        if self.table_exists().await? {
            let table = self
                .db
                .open_table(&self.table_name)
                .execute()
                .await
                .map_err(|e| RetrievalError::Unavailable(format!("lancedb open_table: {e}")))?;
            // Replace-by-id: drop any existing rows for these incidents first.
            let id_list = vectors
                .iter()
                .map(|v| format!("'{}'", v.incident_id.replace('\'', "''")))
                .collect::<Vec<_>>()
                .join(",");
            table
                .delete(&format!("incident_id IN ({id_list})"))
                .await
                .map_err(|e| RetrievalError::Unavailable(format!("lancedb delete: {e}")))?;
            table
                .add(reader)
                .execute()
                .await
                .map_err(|e| RetrievalError::Unavailable(format!("lancedb add: {e}")))?;
        } else {
            self.db
                .create_table(&self.table_name, reader)
                .execute()
                .await
                .map_err(|e| RetrievalError::Unavailable(format!("lancedb create_table: {e}")))?;
        }
        tracing::debug!(count = vectors.len(), table = %self.table_name, "upserted vectors");
        Ok(())
    }

    async fn query(&self, vector: &[f32], limit: usize) -> Result<Vec<VectorHit>> {
        // A store that was never ingested has no table yet; that is the
        // valid "no historical data" case, not an outage.
        if !self.table_exists().await? {
            return Ok(Vec::new());
        }
        let table = self
            .db
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| RetrievalError::Unavailable(format!("lancedb open_table: {e}")))?;
        let mut stream = table
            .vector_search(vector.to_vec())
            .map_err(|e| RetrievalError::Unavailable(format!("lancedb vector_search: {e}")))?
            .distance_type(DistanceType::Cosine)
            .limit(limit)
            .execute()
            .await
            .map_err(|e| RetrievalError::Unavailable(format!("lancedb query: {e}")))?;

        let mut hits = Vec::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| RetrievalError::Unavailable(format!("lancedb stream: {e}")))?
        {
            let ids = string_column(&batch, "incident_id")?;
            let stacks = string_column(&batch, "tech_stack")?;
            let distances = float_column(&batch, "_distance")?;
            for i in 0..batch.num_rows() {
                hits.push(VectorHit {
                    incident_id: ids.value(i).to_string(),
                    tech_stack: stacks.value(i).to_string(),
                    // Cosine distance -> similarity, higher is better.
                    score: 1.0 - distances.value(i),
                });
            }
        }
        Ok(hits)
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| RetrievalError::Unavailable(format!("missing string column: {name}")))
}

fn float_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Float32Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
        .ok_or_else(|| RetrievalError::Unavailable(format!("missing float column: {name}")))
}
