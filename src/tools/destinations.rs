//! 目的地工具：向量检索、按名称查找、按条件检索、库统计
//!
//! 所有失败（库不可用、空集合、检索异常）都以 `{success:false, message, ...}` 返回，不抛错。

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::store::{StoreHit, VectorStore};
use crate::tools::schema::{parse_args, schema_of};
use crate::tools::{Tool, ToolId};

pub const EMPTY_COLLECTION_MESSAGE: &str =
    "No destinations found in database. Please run the setup script to populate the database.";
pub const STORE_UNAVAILABLE_MESSAGE: &str =
    "Travel vector database not available. Please run the setup script first.";

/// 名称匹配的最低相似度（在整词包含成立时才参与比较）
const NAME_MATCH_THRESHOLD: f32 = 0.2;
const NAME_LOOKUP_CANDIDATES: usize = 10;
const STATS_SAMPLE_SIZE: usize = 100;
const STATS_SAMPLE_LIMIT: usize = 10;

fn hit_to_result(hit: &StoreHit) -> Value {
    json!({
        "label": hit.meta("destination"),
        "metadata": hit.metadata,
        "score": hit.similarity(),
    })
}

/// 检查集合是否可用且非空；不可用或为空时返回失败载荷
async fn ensure_populated(store: &dyn VectorStore, empty: Value) -> Result<usize, Value> {
    let mut payload = empty;
    match store.count().await {
        Ok(0) => {
            payload["success"] = json!(false);
            payload["message"] = json!(EMPTY_COLLECTION_MESSAGE);
            payload["total_in_collection"] = json!(0);
            Err(payload)
        }
        Ok(count) => Ok(count),
        Err(e) => {
            tracing::warn!(error = %e, "destination store unavailable");
            payload["success"] = json!(false);
            payload["message"] = json!(STORE_UNAVAILABLE_MESSAGE);
            Err(payload)
        }
    }
}

fn search_error(message: &str, e: impl std::fmt::Display, empty: Value) -> Value {
    let mut payload = empty;
    payload["success"] = json!(false);
    payload["message"] = json!(format!("{message}: {e}"));
    payload
}

// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchDestinationsArgs {
    /// Search query for destinations, e.g. "beach destinations" or "cultural cities"
    pub query: String,
    /// Number of results to return
    #[serde(default = "default_search_results")]
    pub max_results: usize,
}

fn default_search_results() -> usize {
    5
}

pub struct SearchDestinationsTool {
    store: Arc<dyn VectorStore>,
}

impl SearchDestinationsTool {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for SearchDestinationsTool {
    fn id(&self) -> ToolId {
        ToolId::SearchDestinations
    }

    fn description(&self) -> &str {
        "Search travel destinations by semantic similarity. Returns matching destinations with similarity scores."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<SearchDestinationsArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let args: SearchDestinationsArgs = parse_args(args)?;
        let empty = json!({"results": [], "query": args.query});
        let count = match ensure_populated(self.store.as_ref(), empty.clone()).await {
            Ok(count) => count,
            Err(payload) => return Ok(payload),
        };
        let hits = match self.store.query(&args.query, args.max_results.min(count)).await {
            Ok(hits) => hits,
            Err(e) => return Ok(search_error("Error searching destinations", e, empty)),
        };
        let results: Vec<Value> = hits.iter().map(hit_to_result).collect();
        Ok(json!({
            "success": true,
            "message": format!("Found {} destinations matching '{}'", results.len(), args.query),
            "results": results,
            "query": args.query,
            "total_in_collection": count,
        }))
    }
}

// ---------------------------------------------------------------------------

/// 小写、非字母数字替换为空格、折叠空白
pub fn normalize_name(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// `needle` 的词序列是否作为连续整词出现在 `haystack` 中（二者均已规范化）
fn contains_words(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let hay: Vec<&str> = haystack.split(' ').collect();
    let pat: Vec<&str> = needle.split(' ').collect();
    hay.windows(pat.len()).any(|w| w == pat.as_slice())
}

/// 在候选中选出与请求名称匹配的目的地：规范化后完全相等优先；
/// 否则要求任一方向整词包含且相似度不低于阈值，取相似度最高者
pub fn best_name_match<'a>(requested: &str, hits: &'a [StoreHit]) -> Option<&'a StoreHit> {
    let wanted = normalize_name(requested);
    if wanted.is_empty() {
        return None;
    }
    if let Some(exact) = hits
        .iter()
        .find(|hit| normalize_name(hit.meta("destination")) == wanted)
    {
        return Some(exact);
    }
    hits.iter()
        .filter(|hit| {
            let name = normalize_name(hit.meta("destination"));
            contains_words(&name, &wanted) || contains_words(&wanted, &name)
        })
        .filter(|hit| hit.similarity() >= NAME_MATCH_THRESHOLD)
        .max_by(|a, b| {
            a.similarity()
                .partial_cmp(&b.similarity())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DestinationByNameArgs {
    /// Name of the destination, e.g. "Kyoto"
    pub destination_name: String,
}

pub struct GetDestinationByNameTool {
    store: Arc<dyn VectorStore>,
}

impl GetDestinationByNameTool {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for GetDestinationByNameTool {
    fn id(&self) -> ToolId {
        ToolId::GetDestinationByName
    }

    fn description(&self) -> &str {
        "Get detailed information about a specific destination by its name."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<DestinationByNameArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let args: DestinationByNameArgs = parse_args(args)?;
        let empty = json!({"destination": null});
        let count = match ensure_populated(self.store.as_ref(), empty.clone()).await {
            Ok(count) => count,
            Err(payload) => return Ok(payload),
        };
        let hits = match self
            .store
            .query(&args.destination_name, NAME_LOOKUP_CANDIDATES.min(count))
            .await
        {
            Ok(hits) => hits,
            Err(e) => return Ok(search_error("Error getting destination", e, empty)),
        };
        Ok(match best_name_match(&args.destination_name, &hits) {
            Some(hit) => json!({
                "success": true,
                "message": format!("Found destination: {}", hit.meta("destination")),
                "destination": hit_to_result(hit),
            }),
            None => json!({
                "success": false,
                "message": format!("Destination '{}' not found in database", args.destination_name),
                "destination": null,
            }),
        })
    }
}

// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DestinationCriteriaArgs {
    /// Filter by country
    #[serde(default)]
    pub country: Option<String>,
    /// Filter by region
    #[serde(default)]
    pub region: Option<String>,
    /// Activity type, e.g. "beach", "cultural", "adventure"
    #[serde(default)]
    pub activity_type: Option<String>,
    /// Preferred travel period, e.g. "spring"
    #[serde(default)]
    pub best_time: Option<String>,
    /// Number of results to return
    #[serde(default = "default_criteria_results")]
    pub max_results: usize,
}

fn default_criteria_results() -> usize {
    10
}

impl DestinationCriteriaArgs {
    fn query_text(&self) -> String {
        let mut parts = Vec::new();
        if let Some(country) = &self.country {
            parts.push(format!("country {country}"));
        }
        if let Some(region) = &self.region {
            parts.push(format!("region {region}"));
        }
        if let Some(activity) = &self.activity_type {
            parts.push(format!("{activity} activities"));
        }
        if let Some(best_time) = &self.best_time {
            parts.push(format!("best time {best_time}"));
        }
        if parts.is_empty() {
            "travel destinations".to_string()
        } else {
            parts.join(" ")
        }
    }

    fn accepts(&self, hit: &StoreHit) -> bool {
        let field_matches = |filter: &Option<String>, key: &str| match filter {
            Some(wanted) => hit.meta(key).to_lowercase().contains(&wanted.to_lowercase()),
            None => true,
        };
        field_matches(&self.country, "country") && field_matches(&self.region, "region")
    }

    fn criteria(&self) -> Value {
        json!({
            "country": self.country,
            "region": self.region,
            "activity_type": self.activity_type,
            "best_time": self.best_time,
        })
    }
}

pub struct SearchDestinationsByCriteriaTool {
    store: Arc<dyn VectorStore>,
}

impl SearchDestinationsByCriteriaTool {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for SearchDestinationsByCriteriaTool {
    fn id(&self) -> ToolId {
        ToolId::SearchDestinationsByCriteria
    }

    fn description(&self) -> &str {
        "Search destinations by country, region, activity type or best travel time."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<DestinationCriteriaArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let args: DestinationCriteriaArgs = parse_args(args)?;
        let empty = json!({"results": [], "search_criteria": args.criteria()});
        let count = match ensure_populated(self.store.as_ref(), empty.clone()).await {
            Ok(count) => count,
            Err(payload) => return Ok(payload),
        };
        let hits = match self
            .store
            .query(&args.query_text(), args.max_results.min(count))
            .await
        {
            Ok(hits) => hits,
            Err(e) => return Ok(search_error("Error searching destinations", e, empty)),
        };
        let results: Vec<Value> = hits
            .iter()
            .filter(|hit| args.accepts(hit))
            .map(hit_to_result)
            .collect();
        Ok(json!({
            "success": true,
            "message": format!("Found {} destinations matching criteria", results.len()),
            "results": results,
            "search_criteria": args.criteria(),
            "total_in_collection": count,
        }))
    }
}

// ---------------------------------------------------------------------------

pub struct GetDatabaseStatsTool {
    store: Arc<dyn VectorStore>,
}

impl GetDatabaseStatsTool {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for GetDatabaseStatsTool {
    fn id(&self) -> ToolId {
        ToolId::GetDatabaseStats
    }

    fn description(&self) -> &str {
        "Get statistics about the destination database: totals and sample countries and regions."
    }

    async fn execute(&self, _args: Value) -> Result<Value, String> {
        let count = match self.store.count().await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(error = %e, "destination store unavailable");
                return Ok(json!({
                    "success": false,
                    "message": STORE_UNAVAILABLE_MESSAGE,
                    "stats": null,
                }));
            }
        };
        let mut countries = BTreeSet::new();
        let mut regions = BTreeSet::new();
        if count > 0 {
            let hits = match self
                .store
                .query("travel destinations", STATS_SAMPLE_SIZE.min(count))
                .await
            {
                Ok(hits) => hits,
                Err(e) => {
                    return Ok(search_error("Error getting database stats", e, json!({"stats": null})))
                }
            };
            for hit in &hits {
                if !hit.meta("country").is_empty() {
                    countries.insert(hit.meta("country").to_string());
                }
                if !hit.meta("region").is_empty() {
                    regions.insert(hit.meta("region").to_string());
                }
            }
        }
        Ok(json!({
            "success": true,
            "message": format!("Database contains {count} destinations"),
            "stats": {
                "total_destinations": count,
                "unique_countries": countries.len(),
                "unique_regions": regions.len(),
                "sample_countries": countries.iter().take(STATS_SAMPLE_LIMIT).collect::<Vec<_>>(),
                "sample_regions": regions.iter().take(STATS_SAMPLE_LIMIT).collect::<Vec<_>>(),
            },
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use std::collections::BTreeMap;

    /// 固定命中的静态向量库
    struct StaticStore {
        hits: Vec<StoreHit>,
        fail: bool,
    }

    #[async_trait]
    impl VectorStore for StaticStore {
        async fn count(&self) -> Result<usize, StoreError> {
            if self.fail {
                return Err(StoreError::Unavailable("offline".to_string()));
            }
            Ok(self.hits.len())
        }

        async fn query(&self, _text: &str, n_results: usize) -> Result<Vec<StoreHit>, StoreError> {
            Ok(self.hits.iter().take(n_results).cloned().collect())
        }
    }

    fn hit(name: &str, country: &str, region: &str, distance: f32) -> StoreHit {
        StoreHit {
            id: name.to_lowercase(),
            document: name.to_string(),
            metadata: BTreeMap::from([
                ("destination".to_string(), name.to_string()),
                ("country".to_string(), country.to_string()),
                ("region".to_string(), region.to_string()),
            ]),
            distance,
        }
    }

    fn store(hits: Vec<StoreHit>) -> Arc<dyn VectorStore> {
        Arc::new(StaticStore { hits, fail: false })
    }

    #[tokio::test]
    async fn test_search_empty_collection() {
        let tool = SearchDestinationsTool::new(store(vec![]));
        let out = tool.execute(json!({"query": "beach"})).await.unwrap();
        assert_eq!(out["success"], false);
        assert_eq!(out["message"], EMPTY_COLLECTION_MESSAGE);
        assert_eq!(out["results"], json!([]));
        assert_eq!(out["total_in_collection"], 0);
    }

    #[tokio::test]
    async fn test_search_unavailable_store() {
        let tool = SearchDestinationsTool::new(Arc::new(StaticStore { hits: vec![], fail: true }));
        let out = tool.execute(json!({"query": "beach"})).await.unwrap();
        assert_eq!(out["success"], false);
        assert_eq!(out["message"], STORE_UNAVAILABLE_MESSAGE);
    }

    #[tokio::test]
    async fn test_search_returns_labels_and_scores() {
        let tool = SearchDestinationsTool::new(store(vec![
            hit("Algarve", "Portugal", "Europe", 0.25),
            hit("Bali", "Indonesia", "Asia", 0.5),
        ]));
        let out = tool.execute(json!({"query": "beach", "max_results": 1})).await.unwrap();
        assert_eq!(out["success"], true);
        assert_eq!(out["results"].as_array().unwrap().len(), 1);
        assert_eq!(out["results"][0]["label"], "Algarve");
        assert_eq!(out["results"][0]["score"], 0.75);
        assert_eq!(out["results"][0]["metadata"]["country"], "Portugal");
        assert_eq!(out["total_in_collection"], 2);
    }

    #[tokio::test]
    async fn test_search_rejects_missing_query() {
        let tool = SearchDestinationsTool::new(store(vec![]));
        assert!(tool.execute(json!({"max_results": 2})).await.is_err());
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  São-Paulo,  Brazil "), "são paulo brazil");
        assert_eq!(normalize_name("KYOTO"), "kyoto");
    }

    #[test]
    fn test_name_match_requires_whole_words() {
        let hits = vec![hit("Indiana", "USA", "North America", 0.1)];
        assert!(best_name_match("India", &hits).is_none());

        let hits = vec![hit("Goa", "India", "Asia", 0.6), hit("North Goa", "India", "Asia", 0.3)];
        assert_eq!(best_name_match("goa", &hits).unwrap().meta("destination"), "Goa");
        assert_eq!(
            best_name_match("North Goa beaches", &hits).unwrap().meta("destination"),
            "North Goa"
        );
    }

    #[test]
    fn test_name_match_respects_threshold() {
        let hits = vec![hit("Paris", "France", "Europe", 0.95)];
        assert!(best_name_match("Paris France", &hits).is_none());
        // 完全相等不受阈值限制
        assert!(best_name_match("paris", &hits).is_some());
    }

    #[tokio::test]
    async fn test_get_destination_by_name_not_found() {
        let tool = GetDestinationByNameTool::new(store(vec![hit("Indiana", "USA", "", 0.1)]));
        let out = tool.execute(json!({"destination_name": "India"})).await.unwrap();
        assert_eq!(out["success"], false);
        assert!(out["destination"].is_null());
    }

    #[tokio::test]
    async fn test_criteria_filters_country() {
        let tool = SearchDestinationsByCriteriaTool::new(store(vec![
            hit("Kyoto", "Japan", "Asia", 0.2),
            hit("Lisbon", "Portugal", "Europe", 0.3),
        ]));
        let out = tool.execute(json!({"country": "japan"})).await.unwrap();
        assert_eq!(out["success"], true);
        assert_eq!(out["results"].as_array().unwrap().len(), 1);
        assert_eq!(out["results"][0]["label"], "Kyoto");
        assert_eq!(out["search_criteria"]["country"], "japan");
    }

    #[tokio::test]
    async fn test_stats() {
        let tool = GetDatabaseStatsTool::new(store(vec![
            hit("Kyoto", "Japan", "Asia", 0.2),
            hit("Osaka", "Japan", "Asia", 0.3),
            hit("Lisbon", "Portugal", "Europe", 0.4),
        ]));
        let out = tool.execute(json!({})).await.unwrap();
        assert_eq!(out["stats"]["total_destinations"], 3);
        assert_eq!(out["stats"]["unique_countries"], 2);
        assert_eq!(out["stats"]["sample_regions"], json!(["Asia", "Europe"]));
    }
}
