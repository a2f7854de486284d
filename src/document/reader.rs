use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use super::{Document, DocumentError};

/// Streams documents from JSONL in batches of at most `batch_size`.
///
/// Blank lines are skipped. The iterator stops after the first error.
pub struct DocumentBatches<R> {
    reader: R,
    path: PathBuf,
    batch_size: usize,
    line_no: usize,
    done: bool,
}

impl DocumentBatches<BufReader<File>> {
    pub fn open(path: &Path, batch_size: usize) -> Result<Self, DocumentError> {
        if !path.exists() {
            return Err(DocumentError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let file = File::open(path).map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_reader(BufReader::new(file), path, batch_size))
    }
}

impl<R: BufRead> DocumentBatches<R> {
    pub fn from_reader(reader: R, path: &Path, batch_size: usize) -> Self {
        Self {
            reader,
            path: path.to_path_buf(),
            batch_size: batch_size.max(1),
            line_no: 0,
            done: false,
        }
    }

    fn next_document(&mut self) -> Option<Result<Document, DocumentError>> {
        let mut line = String::new();
        loop {
            line.clear();
            match self.reader.read_line(&mut line) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(source) => {
                    return Some(Err(DocumentError::Io {
                        path: self.path.clone(),
                        source,
                    }));
                }
            }
            self.line_no += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let parsed = serde_json::from_str::<Document>(trimmed).map_err(|source| {
                DocumentError::Malformed {
                    line: self.line_no,
                    source,
                }
            });
            return Some(parsed.and_then(|doc| {
                if doc.id.trim().is_empty() {
                    Err(DocumentError::EmptyId { line: self.line_no })
                } else {
                    Ok(doc)
                }
            }));
        }
    }
}

impl<R: BufRead> Iterator for DocumentBatches<R> {
    type Item = Result<Vec<Document>, DocumentError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut batch = Vec::with_capacity(self.batch_size.min(1024));
        while batch.len() < self.batch_size {
            match self.next_document() {
                Some(Ok(doc)) => batch.push(doc),
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    break;
                }
            }
        }

        if batch.is_empty() { None } else { Some(Ok(batch)) }
    }
}

/// Reads a whole JSONL document file into memory.
pub fn read_documents(path: &Path) -> Result<Vec<Document>, DocumentError> {
    let mut docs = Vec::new();
    for batch in DocumentBatches::open(path, usize::MAX)? {
        docs.extend(batch?);
    }
    Ok(docs)
}
