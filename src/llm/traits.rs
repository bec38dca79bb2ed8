//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock / Scripted）实现 LlmClient：一次请求返回恰好一条消息，
//! 消息可带零个或多个工具调用。客户端内部不重试，瞬时失败交给上层。

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::memory::Message;

/// 调用模型时可能出现的错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("Request timeout")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limited (retry after {retry_after_ms}ms)")]
    RateLimited { retry_after_ms: u64 },

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// 响应无法解析为一条 assistant 消息（如工具参数不是合法 JSON）
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("API error: {0}")]
    ApiError(String),
}

impl LlmError {
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Timeout | LlmError::Network(_) | LlmError::RateLimited { .. } => true,
            LlmError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// 暴露给模型的工具声明（名称、描述、参数 JSON Schema）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// 单次补全请求：system 指令不属于历史，每次调用临时拼接
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSpec>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            system: None,
            messages,
            tools: Vec::new(),
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }
}

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 请求一次补全，返回模型产出的那条消息（通常为 assistant 角色）
    async fn complete(&self, request: &CompletionRequest) -> Result<Message, LlmError>;

    /// 模型标识（日志用）
    fn model_name(&self) -> &str {
        "unknown"
    }
}
