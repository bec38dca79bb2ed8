//! 工具注册表
//!
//! 工具标识是封闭枚举 ToolId，启动时一次性注册为 ToolId → Arc<dyn Tool>；
//! 模型给出的工具名只在这里解析一次，不再按名称子串扫描。

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm::ToolSpec;

/// 全部可调用工具
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolId {
    SearchDestinations,
    GetDestinationByName,
    SearchDestinationsByCriteria,
    GetDatabaseStats,
    SearchFlights,
    SearchHotels,
    GetAirportCodes,
    GetCityCodes,
    FormatTravelResults,
}

impl ToolId {
    pub const ALL: [ToolId; 9] = [
        ToolId::SearchDestinations,
        ToolId::GetDestinationByName,
        ToolId::SearchDestinationsByCriteria,
        ToolId::GetDatabaseStats,
        ToolId::SearchFlights,
        ToolId::SearchHotels,
        ToolId::GetAirportCodes,
        ToolId::GetCityCodes,
        ToolId::FormatTravelResults,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolId::SearchDestinations => "search_destinations",
            ToolId::GetDestinationByName => "get_destination_by_name",
            ToolId::SearchDestinationsByCriteria => "search_destinations_by_criteria",
            ToolId::GetDatabaseStats => "get_database_stats",
            ToolId::SearchFlights => "search_flights",
            ToolId::SearchHotels => "search_hotels",
            ToolId::GetAirportCodes => "get_airport_codes",
            ToolId::GetCityCodes => "get_city_codes",
            ToolId::FormatTravelResults => "format_travel_results",
        }
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| format!("Unknown tool: {s}"))
    }
}

/// 工具 trait：标识、描述（供 LLM 理解）、参数 schema、异步执行（参数与结果均为 JSON）
///
/// execute 返回 Err 表示工具内部异常；ToolExecutor 会把它包装成失败结果，不会向引擎传播。
#[async_trait]
pub trait Tool: Send + Sync {
    fn id(&self) -> ToolId;

    fn description(&self) -> &str;

    /// 参数 JSON Schema；默认无参数
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, String>;
}

/// 工具注册表
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<ToolId, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.tools.insert(tool.id(), Arc::new(tool));
    }

    pub fn get(&self, id: ToolId) -> Option<Arc<dyn Tool>> {
        self.tools.get(&id).cloned()
    }

    pub fn ids(&self) -> Vec<ToolId> {
        self.tools.keys().copied().collect()
    }

    /// 按给定顺序生成已注册工具的声明（未注册的跳过）
    pub fn specs(&self, ids: &[ToolId]) -> Vec<ToolSpec> {
        ids.iter()
            .filter_map(|id| self.tools.get(id))
            .map(|tool| ToolSpec {
                name: tool.id().as_str().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect()
    }
}
