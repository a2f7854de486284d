//! Catalogue documents, ranked hits and line-delimited document files.

pub mod error;
pub mod reader;

#[cfg(test)]
mod tests;

pub use error::DocumentError;
pub use reader::{DocumentBatches, read_documents};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Metadata attached to a document (title, brand, price, ...).
///
/// A `BTreeMap` so serialized hits have a stable key order.
pub type Metadata = BTreeMap<String, String>;

/// A normalized product document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    #[serde(default, alias = "meta")]
    pub metadata: Metadata,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Raw product fields as delivered by ingestion.
///
/// [`ProductRecord::into_document`] composes the indexed text as
/// `Title: .. Brand: .. Category: .. Price: ..`, skipping empty fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductRecord {
    pub pid: String,
    pub title: String,
    pub brand: String,
    pub category: String,
    pub subcategory: String,
    pub gender: String,
    pub color: String,
    pub material: String,
    pub description: String,
    pub price: String,
}

impl ProductRecord {
    /// Returns `None` when every text field is empty.
    pub fn into_document(self, row: usize) -> Option<Document> {
        let fields = [
            ("Title", &self.title),
            ("Brand", &self.brand),
            ("Category", &self.category),
            ("Subcategory", &self.subcategory),
            ("Gender", &self.gender),
            ("Color", &self.color),
            ("Material", &self.material),
            ("Description", &self.description),
            ("Price", &self.price),
        ];

        let text = fields
            .iter()
            .map(|(label, value)| (label, normalize_text(value)))
            .filter(|(_, value)| !value.is_empty())
            .map(|(label, value)| format!("{label}: {value}"))
            .collect::<Vec<_>>()
            .join(" ");

        if text.is_empty() {
            return None;
        }

        let mut metadata = Metadata::new();
        metadata.insert("pid".into(), self.pid.clone());
        for (key, value) in [
            ("title", &self.title),
            ("brand", &self.brand),
            ("category", &self.category),
            ("subcategory", &self.subcategory),
            ("gender", &self.gender),
            ("color", &self.color),
            ("material", &self.material),
            ("price", &self.price),
        ] {
            metadata.insert(key.into(), normalize_text(value));
        }

        Some(Document {
            id: format!("prod_{}_{}", self.pid, row),
            text,
            metadata,
        })
    }
}

/// One ranked result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub doc_id: String,
    pub text: String,
    pub score: f64,
    #[serde(default, alias = "meta")]
    pub metadata: Metadata,
}

impl Hit {
    pub fn title(&self) -> &str {
        self.metadata.get("title").map(String::as_str).unwrap_or("")
    }

    pub fn brand(&self) -> &str {
        self.metadata.get("brand").map(String::as_str).unwrap_or("")
    }

    /// First `max_chars` characters of the text (char-boundary safe).
    pub fn snippet(&self, max_chars: usize) -> &str {
        match self.text.char_indices().nth(max_chars) {
            Some((idx, _)) => &self.text[..idx],
            None => &self.text,
        }
    }
}

/// Ordered hits, best first.
///
/// Serializes as a plain JSON array of [`Hit`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSet(pub Vec<Hit>);

impl ResultSet {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn hits(&self) -> &[Hit] {
        &self.0
    }

    pub fn into_hits(self) -> Vec<Hit> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Texts in rank order, as fed to answer generation.
    pub fn contexts(&self) -> Vec<String> {
        self.0.iter().map(|h| h.text.clone()).collect()
    }

    /// `score[i] >= score[i + 1]` for every adjacent pair.
    pub fn is_ordered(&self) -> bool {
        self.0.windows(2).all(|w| w[0].score >= w[1].score)
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

impl From<Vec<Hit>> for ResultSet {
    fn from(hits: Vec<Hit>) -> Self {
        Self(hits)
    }
}

impl IntoIterator for ResultSet {
    type Item = Hit;
    type IntoIter = std::vec::IntoIter<Hit>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Collapses whitespace runs to one space and trims.
pub fn normalize_text(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
