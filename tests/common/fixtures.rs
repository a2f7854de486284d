//! Test fixtures for integration tests.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use fathom::cache::{MockResultStore, ResultCache};
use fathom::config::SearchConfig;
use fathom::document::{Document, ProductRecord};
use fathom::embedding::MockScorer;
use fathom::pipeline::RetrievalPipeline;
use fathom::vectordb::MockVectorIndex;
use tempfile::NamedTempFile;

pub const MIDI_DRESS_QUERY: &str = "women summer cotton midi dress under 2000 rupees";

pub type MockPipeline = RetrievalPipeline<MockVectorIndex, MockScorer, MockResultStore>;
pub type DurablePipeline = RetrievalPipeline<MockVectorIndex, MockScorer, ResultCache>;

#[derive(Default)]
pub struct ProductBuilder {
    record: ProductRecord,
}

impl ProductBuilder {
    pub fn new(pid: &str, title: &str) -> Self {
        Self {
            record: ProductRecord {
                pid: pid.to_string(),
                title: title.to_string(),
                ..Default::default()
            },
        }
    }

    pub fn brand(mut self, brand: &str) -> Self {
        self.record.brand = brand.to_string();
        self
    }

    pub fn gender(mut self, gender: &str) -> Self {
        self.record.gender = gender.to_string();
        self
    }

    pub fn color(mut self, color: &str) -> Self {
        self.record.color = color.to_string();
        self
    }

    pub fn material(mut self, material: &str) -> Self {
        self.record.material = material.to_string();
        self
    }

    pub fn price(mut self, price: &str) -> Self {
        self.record.price = price.to_string();
        self
    }

    pub fn build(self, row: usize) -> Document {
        self.record
            .into_document(row)
            .expect("fixture products always have a title")
    }
}

/// Small apparel catalogue; the midi dress sits in the middle of recall order.
pub fn apparel_catalogue() -> Vec<Document> {
    vec![
        ProductBuilder::new("101", "Kids Fleece Hoodie")
            .brand("Northpeak")
            .gender("Boys")
            .material("Fleece")
            .price("1299")
            .build(0),
        ProductBuilder::new("102", "Men Running Shoes")
            .brand("Stride")
            .gender("Men")
            .color("Black")
            .material("Mesh")
            .price("2999")
            .build(1),
        ProductBuilder::new("103", "Women Denim Jacket")
            .brand("Blue Harbor")
            .gender("Women")
            .color("Blue")
            .price("2499")
            .build(2),
        ProductBuilder::new("104", "Summer Cotton Midi Dress")
            .brand("Aurelia")
            .gender("Women")
            .color("Yellow")
            .material("Cotton")
            .price("1899")
            .build(3),
        ProductBuilder::new("105", "Women Silk Saree")
            .brand("Kanchi House")
            .gender("Women")
            .material("Silk")
            .price("5999")
            .build(4),
        ProductBuilder::new("106", "Cotton Kurta")
            .brand("Loomcraft")
            .gender("Men")
            .material("Cotton")
            .price("899")
            .build(5),
        ProductBuilder::new("107", "Wool Winter Scarf")
            .brand("Northpeak")
            .material("Wool")
            .price("699")
            .build(6),
    ]
}

pub fn mock_pipeline(docs: Vec<Document>) -> MockPipeline {
    RetrievalPipeline::new(
        Arc::new(MockVectorIndex::with_documents(docs)),
        Arc::new(MockScorer::new()),
        Arc::new(MockResultStore::new()),
        SearchConfig::default(),
    )
}

pub fn durable_pipeline(docs: Vec<Document>, cache_path: &Path) -> DurablePipeline {
    let cache = ResultCache::open(cache_path, 64).expect("cache should open");
    RetrievalPipeline::new(
        Arc::new(MockVectorIndex::with_documents(docs)),
        Arc::new(MockScorer::new()),
        Arc::new(cache),
        SearchConfig::default(),
    )
}

pub fn write_jsonl(docs: &[Document]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    for doc in docs {
        let line = serde_json::to_string(doc).expect("document serializes");
        writeln!(file, "{line}").expect("write line");
    }
    file.flush().expect("flush");
    file
}
