//! 工具层：注册表、参数 schema、执行器与旅行工具集

pub mod destinations;
pub mod executor;
pub mod format;
pub mod registry;
pub mod schema;
pub mod travel;

use std::sync::Arc;

pub use destinations::{
    GetDatabaseStatsTool, GetDestinationByNameTool, SearchDestinationsByCriteriaTool,
    SearchDestinationsTool,
};
pub use executor::{failure_payload, ToolExecutor, ToolResult};
pub use format::{format_travel_results, FormatArgs, FormatTravelResultsTool};
pub use registry::{Tool, ToolId, ToolRegistry};
pub use schema::{parse_args, schema_of};
pub use travel::{LocationCodesTool, SearchFlightsTool, SearchHotelsTool};

use crate::integrations::TravelApi;
use crate::store::VectorStore;

/// 注册全部旅行工具；api 为 None 时预订类工具返回"API 不可用"的失败结果
pub fn travel_registry(store: Arc<dyn VectorStore>, api: Option<Arc<dyn TravelApi>>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(SearchDestinationsTool::new(store.clone()));
    registry.register(GetDestinationByNameTool::new(store.clone()));
    registry.register(SearchDestinationsByCriteriaTool::new(store.clone()));
    registry.register(GetDatabaseStatsTool::new(store));
    registry.register(SearchFlightsTool::new(api.clone()));
    registry.register(SearchHotelsTool::new(api.clone()));
    registry.register(LocationCodesTool::airports(api.clone()));
    registry.register(LocationCodesTool::cities(api));
    registry.register(FormatTravelResultsTool);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::HashingEmbedder;
    use crate::store::InMemoryVectorStore;

    #[test]
    fn test_travel_registry_registers_every_tool() {
        let store = Arc::new(InMemoryVectorStore::new("t", Arc::new(HashingEmbedder::default())));
        let registry = travel_registry(store, None);
        assert_eq!(registry.ids(), ToolId::ALL.to_vec());
        let specs = registry.specs(&ToolId::ALL);
        assert!(specs.iter().all(|s| s.parameters["type"] == "object"));
    }
}
