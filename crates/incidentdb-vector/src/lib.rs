pub mod index;
pub mod schema;

pub use index::LanceVectorIndex;
pub use schema::EMBEDDING_DIM;
