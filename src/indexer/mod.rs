//! Batched index build from a line-delimited document file.
//!
//! Re-running a build upserts by document id, so it never duplicates entries.
//! The result cache is left untouched; see `fathom index --rebuild`.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::document::{DocumentBatches, DocumentError};
use crate::vectordb::{IndexWriter, VectorDbError};

#[derive(Debug, Error)]
pub enum IndexBuildError {
    #[error("documents file not found: {path} (run ingestion first)")]
    DocumentsNotFound { path: PathBuf },

    #[error(transparent)]
    Document(DocumentError),

    #[error("failed to write batch {batch}: {source}")]
    Write {
        batch: usize,
        #[source]
        source: VectorDbError,
    },

    #[error("batch size must be greater than zero")]
    InvalidBatchSize,
}

impl From<DocumentError> for IndexBuildError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::NotFound { path } => IndexBuildError::DocumentsNotFound { path },
            other => IndexBuildError::Document(other),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexReport {
    pub documents: usize,
    pub batches: usize,
}

/// Streams `path` into `writer`, at most `batch_size` documents per upsert.
#[instrument(skip(writer), fields(path = %path.display()))]
pub async fn build_index<W: IndexWriter>(
    writer: &W,
    path: &Path,
    batch_size: usize,
) -> Result<IndexReport, IndexBuildError> {
    if batch_size == 0 {
        return Err(IndexBuildError::InvalidBatchSize);
    }

    let mut report = IndexReport::default();
    for batch in DocumentBatches::open(path, batch_size)? {
        let batch = batch?;
        let written = writer
            .upsert_documents(batch)
            .await
            .map_err(|source| IndexBuildError::Write {
                batch: report.batches,
                source,
            })?;

        report.documents += written;
        report.batches += 1;
        debug!(batch = report.batches, written, "Batch indexed");
    }

    info!(
        documents = report.documents,
        batches = report.batches,
        "Index built / updated"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vectordb::{MockVectorIndex, VectorIndex};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_docs(n: usize) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for i in 0..n {
            writeln!(
                file,
                r#"{{"id":"prod_{i}_{i}","text":"Title: Item {i}","meta":{{"pid":"{i}"}}}}"#
            )
            .unwrap();
        }
        file
    }

    #[tokio::test]
    async fn test_build_in_batches() {
        let file = write_docs(5);
        let index = MockVectorIndex::new();

        let report = build_index(&index, file.path(), 2).await.unwrap();

        assert_eq!(report, IndexReport { documents: 5, batches: 3 });
        assert_eq!(index.len(), 5);
    }

    #[tokio::test]
    async fn test_rebuild_is_idempotent() {
        let file = write_docs(3);
        let index = MockVectorIndex::new();

        build_index(&index, file.path(), 1024).await.unwrap();
        build_index(&index, file.path(), 1024).await.unwrap();

        assert_eq!(index.len(), 3);
        let hits = index.query_nearest("item", 10).await.unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let index = MockVectorIndex::new();
        let err = build_index(&index, Path::new("/nonexistent/processed.jsonl"), 10)
            .await
            .unwrap_err();

        assert!(matches!(err, IndexBuildError::DocumentsNotFound { .. }));
        assert!(err.to_string().contains("run ingestion first"));
    }

    #[tokio::test]
    async fn test_malformed_line_stops_build() {
        let mut file = write_docs(2);
        writeln!(file, "{{broken").unwrap();
        let index = MockVectorIndex::new();

        let err = build_index(&index, file.path(), 10).await.unwrap_err();

        assert!(matches!(
            err,
            IndexBuildError::Document(DocumentError::Malformed { line: 3, .. })
        ));
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn test_writer_failure() {
        let file = write_docs(2);
        let index = MockVectorIndex::new();
        index.set_failing(true);

        let err = build_index(&index, file.path(), 10).await.unwrap_err();
        assert!(matches!(err, IndexBuildError::Write { batch: 0, .. }));
    }

    #[tokio::test]
    async fn test_zero_batch_size() {
        let file = write_docs(1);
        let index = MockVectorIndex::new();

        let err = build_index(&index, file.path(), 0).await.unwrap_err();
        assert!(matches!(err, IndexBuildError::InvalidBatchSize));
    }
}
