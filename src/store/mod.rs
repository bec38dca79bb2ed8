//! 目的地向量库抽象
//!
//! 外部依赖（相似度检索服务）只通过 VectorStore 消费：count 与 query（返回文档、字符串元数据与距离）。
//! 自带实现 InMemoryVectorStore：从 JSON 种子文件加载目的地，经 EmbeddingProvider 编码后做余弦检索。

pub mod in_memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

pub use in_memory::InMemoryVectorStore;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("vector store unavailable: {0}")]
    Unavailable(String),
    #[error("embedding failed: {0}")]
    Embedding(String),
    #[error("seed data error: {0}")]
    Seed(String),
}

/// 一条检索命中；distance 越小越相似（相似度 = 1 - distance）
#[derive(Debug, Clone, PartialEq)]
pub struct StoreHit {
    pub id: String,
    pub document: String,
    pub metadata: BTreeMap<String, String>,
    pub distance: f32,
}

impl StoreHit {
    pub fn similarity(&self) -> f32 {
        1.0 - self.distance
    }

    pub fn meta(&self, key: &str) -> &str {
        self.metadata.get(key).map(String::as_str).unwrap_or("")
    }
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// 集合内文档总数
    async fn count(&self) -> Result<usize, StoreError>;

    /// 文本相似度检索，按距离升序返回至多 n_results 条
    async fn query(&self, text: &str, n_results: usize) -> Result<Vec<StoreHit>, StoreError>;
}

/// 种子数据中的一条目的地；列表字段既可写成数组，也可写成逗号分隔字符串
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationRecord {
    pub destination: String,
    pub description: String,
    #[serde(deserialize_with = "list_or_csv")]
    pub famous_for: Vec<String>,
    #[serde(deserialize_with = "list_or_csv")]
    pub unique_offerings: Vec<String>,
    pub region: String,
    pub country: String,
    pub other_characteristics: String,
    pub best_time_to_travel: String,
}

impl DestinationRecord {
    /// 用于嵌入的文档文本
    pub fn document(&self) -> String {
        format!(
            "{}. {} Famous for: {}. Unique offerings: {}. Region: {}. Country: {}. {} Best time to travel: {}.",
            self.destination,
            self.description,
            self.famous_for.join(", "),
            self.unique_offerings.join(", "),
            self.region,
            self.country,
            self.other_characteristics,
            self.best_time_to_travel,
        )
    }

    /// 存入向量库的字符串元数据（列表字段以逗号拼接）
    pub fn metadata(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("destination".to_string(), self.destination.clone()),
            ("description".to_string(), self.description.clone()),
            ("famous_for".to_string(), self.famous_for.join(", ")),
            ("unique_offerings".to_string(), self.unique_offerings.join(", ")),
            ("region".to_string(), self.region.clone()),
            ("country".to_string(), self.country.clone()),
            ("other_characteristics".to_string(), self.other_characteristics.clone()),
            ("best_time_to_travel".to_string(), self.best_time_to_travel.clone()),
        ])
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListOrCsv {
    List(Vec<String>),
    Csv(String),
}

fn list_or_csv<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match ListOrCsv::deserialize(deserializer)? {
        ListOrCsv::List(items) => items,
        ListOrCsv::Csv(s) => split_csv(&s),
    })
}

/// 逗号分隔字符串 → 去空白的非空项
pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_accepts_csv_and_list() {
        let json = r#"[
            {"destination": "Kyoto", "famous_for": "temples, gardens", "country": "Japan"},
            {"destination": "Algarve", "famous_for": ["beaches", "cliffs"], "country": "Portugal"}
        ]"#;
        let records: Vec<DestinationRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(records[0].famous_for, vec!["temples", "gardens"]);
        assert_eq!(records[1].famous_for, vec!["beaches", "cliffs"]);
        assert_eq!(records[1].metadata()["famous_for"], "beaches, cliffs");
        assert!(records[0].document().starts_with("Kyoto."));
    }

    #[test]
    fn test_split_csv_drops_empty() {
        assert_eq!(split_csv(" a, ,b ,"), vec!["a", "b"]);
        assert!(split_csv("").is_empty());
    }
}
