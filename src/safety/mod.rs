//! 内容安全：SafetyClassifier 抽象、判定结果与测试用的静态分类器
//!
//! 引擎在调用模型前检查用户输入（SubjectRole::User），在接受每条模型输出前检查输出（SubjectRole::Agent）。
//! 分类器不可用时返回错误，绝不默认判定为安全。

pub mod llama_guard;

use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::memory::Message;

pub use llama_guard::LlamaGuard;

/// 被检查内容的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SubjectRole {
    User,
    Agent,
}

impl SubjectRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectRole::User => "User",
            SubjectRole::Agent => "Agent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SafetyAssessment {
    Safe,
    Unsafe,
}

/// 安全判定；Unsafe 时 categories 非空
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafetyVerdict {
    pub assessment: SafetyAssessment,
    pub categories: Vec<String>,
}

impl SafetyVerdict {
    pub fn safe() -> Self {
        Self {
            assessment: SafetyAssessment::Safe,
            categories: Vec::new(),
        }
    }

    /// 未给出类别时记为 "Unspecified"，保证 Unsafe 判定总带类别
    pub fn unsafe_with<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut categories: Vec<String> = categories.into_iter().map(Into::into).collect();
        if categories.is_empty() {
            categories.push("Unspecified".to_string());
        }
        Self {
            assessment: SafetyAssessment::Unsafe,
            categories,
        }
    }

    pub fn is_unsafe(&self) -> bool {
        self.assessment == SafetyAssessment::Unsafe
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SafetyError {
    #[error("safety service unavailable: {0}")]
    Unavailable(String),
    #[error("unparseable safety verdict: {0}")]
    UnparseableVerdict(String),
}

/// 安全分类器：不得修改输入
#[async_trait]
pub trait SafetyClassifier: Send + Sync {
    async fn classify(
        &self,
        role: SubjectRole,
        messages: &[Message],
    ) -> Result<SafetyVerdict, SafetyError>;
}

/// 固定判定的分类器（测试与离线演示用），记录每次调用的角色
#[derive(Debug)]
pub struct StaticSafety {
    input: Result<SafetyVerdict, SafetyError>,
    output: Result<SafetyVerdict, SafetyError>,
    calls: Mutex<Vec<SubjectRole>>,
}

impl StaticSafety {
    pub fn safe() -> Self {
        Self {
            input: Ok(SafetyVerdict::safe()),
            output: Ok(SafetyVerdict::safe()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_input(mut self, verdict: SafetyVerdict) -> Self {
        self.input = Ok(verdict);
        self
    }

    pub fn with_output(mut self, verdict: SafetyVerdict) -> Self {
        self.output = Ok(verdict);
        self
    }

    /// 模拟分类服务不可达
    pub fn unavailable() -> Self {
        let err = SafetyError::Unavailable("connection refused".to_string());
        Self {
            input: Err(err.clone()),
            output: Err(err),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<SubjectRole> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SafetyClassifier for StaticSafety {
    async fn classify(
        &self,
        role: SubjectRole,
        _messages: &[Message],
    ) -> Result<SafetyVerdict, SafetyError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(role);
        }
        match role {
            SubjectRole::User => self.input.clone(),
            SubjectRole::Agent => self.output.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsafe_always_has_category() {
        let v = SafetyVerdict::unsafe_with(Vec::<String>::new());
        assert!(v.is_unsafe());
        assert_eq!(v.categories, vec!["Unspecified"]);
    }

    #[tokio::test]
    async fn test_static_safety_records_roles() {
        let s = StaticSafety::safe().with_output(SafetyVerdict::unsafe_with(["Hate"]));
        assert!(!s.classify(SubjectRole::User, &[]).await.unwrap().is_unsafe());
        assert!(s.classify(SubjectRole::Agent, &[]).await.unwrap().is_unsafe());
        assert_eq!(s.calls(), vec![SubjectRole::User, SubjectRole::Agent]);
    }
}
