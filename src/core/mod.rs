//! 核心编排层：错误、步数预算、编排状态、模型调用、过程事件与状态机引擎

pub mod budget;
pub mod engine;
pub mod error;
pub mod events;
pub mod invoker;
pub mod state;

pub use budget::{StepBudget, FALLBACK_THRESHOLD};
pub use engine::{
    safety_message, side_channel_key, EngineConfig, Node, OrchestrationEngine, TurnOutcome,
    BUDGET_FALLBACK_MESSAGE,
};
pub use error::EngineError;
pub use events::EngineEvent;
pub use invoker::{validate_assistant, ModelInvoker};
pub use state::{OrchestrationState, Phase, AIRPORTS_INFO, DESTINATION_INFO, PACKAGE_INFO};
