//! 内存向量库：目的地记录 + 嵌入向量，余弦距离检索

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{DestinationRecord, StoreError, StoreHit, VectorStore};
use crate::llm::EmbeddingProvider;

struct Entry {
    hit: StoreHit,
    embedding: Vec<f32>,
}

pub struct InMemoryVectorStore {
    collection: String,
    embedder: Arc<dyn EmbeddingProvider>,
    entries: RwLock<Vec<Entry>>,
}

impl InMemoryVectorStore {
    pub fn new(collection: impl Into<String>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            collection: collection.into(),
            embedder,
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// 编码并加入一条目的地；id 取 `dest_{序号}`
    pub async fn add_record(&self, record: &DestinationRecord) -> Result<(), StoreError> {
        let document = record.document();
        let embedding = self
            .embedder
            .embed(&document)
            .await
            .map_err(StoreError::Embedding)?;
        let mut entries = self.entries.write().await;
        let id = format!("dest_{}", entries.len());
        entries.push(Entry {
            hit: StoreHit {
                id,
                document,
                metadata: record.metadata(),
                distance: 0.0,
            },
            embedding,
        });
        Ok(())
    }

    pub async fn add_records(&self, records: &[DestinationRecord]) -> Result<usize, StoreError> {
        for record in records {
            self.add_record(record).await?;
        }
        Ok(records.len())
    }

    /// 从 JSON 种子文件（DestinationRecord 数组）加载；文件不存在时得到空集合
    pub async fn load_seed_file(
        collection: impl Into<String>,
        embedder: Arc<dyn EmbeddingProvider>,
        path: impl AsRef<Path>,
    ) -> Result<Self, StoreError> {
        let store = Self::new(collection, embedder);
        let path = path.as_ref();
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "seed file not found, destination collection is empty");
                return Ok(store);
            }
            Err(e) => return Err(StoreError::Seed(format!("{}: {e}", path.display()))),
        };
        let records: Vec<DestinationRecord> = serde_json::from_str(&raw)
            .map_err(|e| StoreError::Seed(format!("{}: {e}", path.display())))?;
        let added = store.add_records(&records).await?;
        tracing::info!(collection = %store.collection, added, "destination collection loaded");
        Ok(store)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.entries.read().await.len())
    }

    async fn query(&self, text: &str, n_results: usize) -> Result<Vec<StoreHit>, StoreError> {
        let query = self.embedder.embed(text).await.map_err(StoreError::Embedding)?;
        let entries = self.entries.read().await;
        let mut hits: Vec<StoreHit> = entries
            .iter()
            .map(|entry| StoreHit {
                distance: 1.0 - cosine_similarity(&query, &entry.embedding),
                ..entry.hit.clone()
            })
            .collect();
        hits.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(n_results);
        Ok(hits)
    }
}
