//! Agent 目录：每个 Agent 只是同一引擎的一组参数（指令 + 工具子集）
//!
//! 阶段型 Agent 固定一个旅行阶段；supervisor 在会话开始时由 IntentRouter 选择阶段。

pub mod intent;
pub mod prompts;

use serde::Serialize;

use crate::core::Phase;
use crate::tools::ToolId;

pub use intent::IntentRouter;
pub use prompts::render_instructions;

pub const DEFAULT_AGENT: &str = "travel-planning-agent";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentKind {
    Chat,
    Rag,
    Phase(Phase),
    /// 按意图自动路由到某个阶段
    Supervisor,
}

/// 目录中的一个 Agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentProfile {
    pub key: &'static str,
    pub description: &'static str,
    pub kind: AgentKind,
}

/// 对外展示的 Agent 信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentInfo {
    pub key: String,
    pub description: String,
}

const CATALOG: &[AgentProfile] = &[
    AgentProfile {
        key: "chatbot",
        description: "A simple chatbot.",
        kind: AgentKind::Chat,
    },
    AgentProfile {
        key: "rag-assistant",
        description: "A RAG assistant with access to information in a database.",
        kind: AgentKind::Rag,
    },
    AgentProfile {
        key: "travel-planning-agent",
        description: "A comprehensive travel planning agent with end-to-end travel coordination.",
        kind: AgentKind::Phase(Phase::GenericPlanning),
    },
    AgentProfile {
        key: "travel-destination-agent",
        description: "A specialized agent for destination research and travel insights.",
        kind: AgentKind::Phase(Phase::DestinationResearch),
    },
    AgentProfile {
        key: "travel-package-agent",
        description: "A specialized agent for travel package search and booking assistance.",
        kind: AgentKind::Phase(Phase::PackageSearch),
    },
    AgentProfile {
        key: "travel-booking-agent",
        description: "A specialized agent for travel package booking and reservation management.",
        kind: AgentKind::Phase(Phase::Booking),
    },
    AgentProfile {
        key: "travel-supervisor-agent",
        description: "A travel supervisor agent that auto-routes requests to the right travel phase.",
        kind: AgentKind::Supervisor,
    },
];

pub fn agent_catalog() -> Vec<AgentInfo> {
    CATALOG
        .iter()
        .map(|p| AgentInfo {
            key: p.key.to_string(),
            description: p.description.to_string(),
        })
        .collect()
}

pub fn find_profile(key: &str) -> Option<&'static AgentProfile> {
    CATALOG.iter().find(|p| p.key == key)
}

/// 阶段对应的阶段型 Agent
pub fn profile_for_phase(phase: Phase) -> &'static AgentProfile {
    CATALOG
        .iter()
        .find(|p| p.kind == AgentKind::Phase(phase))
        .unwrap_or(&CATALOG[2])
}

/// 阶段可用的工具子集（顺序即暴露给模型的顺序）
pub fn phase_tools(phase: Phase) -> Vec<ToolId> {
    use ToolId::*;
    match phase {
        Phase::GenericPlanning => vec![
            SearchDestinations,
            GetDestinationByName,
            SearchDestinationsByCriteria,
            GetDatabaseStats,
            GetAirportCodes,
            GetCityCodes,
            FormatTravelResults,
        ],
        Phase::DestinationResearch => vec![
            SearchDestinations,
            GetDestinationByName,
            SearchDestinationsByCriteria,
            GetDatabaseStats,
            FormatTravelResults,
        ],
        Phase::PackageSearch => vec![
            SearchDestinations,
            SearchFlights,
            SearchHotels,
            GetAirportCodes,
            GetCityCodes,
            FormatTravelResults,
        ],
        Phase::Booking => vec![
            SearchFlights,
            SearchHotels,
            GetAirportCodes,
            GetCityCodes,
            FormatTravelResults,
        ],
    }
}

pub fn phase_instructions(phase: Phase) -> &'static str {
    match phase {
        Phase::GenericPlanning => prompts::GENERIC_PLANNING,
        Phase::DestinationResearch => prompts::DESTINATION_RESEARCH,
        Phase::PackageSearch => prompts::PACKAGE_SEARCH,
        Phase::Booking => prompts::BOOKING,
    }
}

impl AgentKind {
    /// 非阶段型 Agent 的指令与工具；阶段型与 supervisor 由阶段决定
    pub fn fixed_setup(&self) -> Option<(&'static str, Vec<ToolId>)> {
        match self {
            AgentKind::Chat => Some((prompts::CHATBOT, Vec::new())),
            AgentKind::Rag => Some((
                prompts::RAG_ASSISTANT,
                vec![
                    ToolId::SearchDestinations,
                    ToolId::GetDestinationByName,
                    ToolId::GetDatabaseStats,
                ],
            )),
            AgentKind::Phase(_) | AgentKind::Supervisor => None,
        }
    }
}
