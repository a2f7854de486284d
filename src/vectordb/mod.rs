//! Vector recall: the `VectorIndex` seam plus Qdrant and in-memory backends.

pub mod client;
pub mod error;
pub mod index;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod model;


pub use client::QdrantClient;
pub use error::VectorDbError;
pub use index::{IndexWriter, QdrantIndex, VectorIndex};
#[cfg(any(test, feature = "mock"))]
pub use mock::MockVectorIndex;
pub use model::{Candidate, document_point, point_id};
