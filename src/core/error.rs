//! 编排层错误类型
//!
//! 只有「引擎无法继续」的情况才是错误：安全服务不可用、模型不可用、模型输出畸形、被取消、配置非法。
//! 安全拦截、工具不可用、步数耗尽都是定义好的终态，不走这里。

use thiserror::Error;

use crate::llm::LlmError;

/// 单轮编排失败（向调用方显式传播，绝不静默给出错误答案）
#[derive(Error, Debug)]
pub enum EngineError {
    /// 安全分类服务不可达或返回无法解析的结果；不会默认为 SAFE
    #[error("Safety classifier unavailable: {0}")]
    SafetyUnavailable(String),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Malformed model output: {0}")]
    MalformedModelOutput(String),

    /// 调用方在某个挂起点取消；已追加的历史与已提交的工具副作用不回滚
    #[error("Turn cancelled")]
    Cancelled,

    #[error("Config error: {0}")]
    Config(String),
}

impl EngineError {
    /// 可重试的错误（调用方可换模型或稍后重试；引擎内部不重试）
    pub fn is_transient(&self) -> bool {
        match self {
            EngineError::Llm(e) => e.is_transient(),
            EngineError::SafetyUnavailable(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_error_converts() {
        let err: EngineError = LlmError::Timeout.into();
        assert!(matches!(err, EngineError::Llm(LlmError::Timeout)));
        assert!(err.is_transient());
    }

    #[test]
    fn test_malformed_not_transient() {
        let err = EngineError::MalformedModelOutput("expected assistant".to_string());
        assert!(!err.is_transient());
        assert!(err.to_string().contains("expected assistant"));
    }
}
