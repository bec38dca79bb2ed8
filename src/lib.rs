//! Atlas - Rust 旅行规划智能体编排引擎
//!
//! 模块划分：
//! - **agent**: 会话边界（TravelAgent::invoke），依赖一次性构建并共享
//! - **agents**: Agent 目录、意图路由、各阶段指令
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 编排状态机、步数预算、模型调用、错误与过程事件
//! - **integrations**: 旅行预订 API（Amadeus）
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock / Scripted）、模型路由、嵌入
//! - **memory**: 消息模型与只追加的对话历史
//! - **safety**: 内容安全分类（Llama Guard）
//! - **store**: 目的地向量库
//! - **tools**: 工具注册表、执行器与旅行工具集

pub mod agent;
pub mod agents;
pub mod config;
pub mod core;
pub mod integrations;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod safety;
pub mod store;
pub mod tools;

pub use agent::{TravelAgent, TurnRequest, TurnResponse};
pub use core::{EngineError, Phase};
