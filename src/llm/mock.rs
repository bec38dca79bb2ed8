//! Mock / Scripted LLM 客户端（用于测试与离线运行，无需 API）
//!
//! - MockLlmClient：离线演示。有可用的目的地搜索工具时先请求一次搜索，拿到工具结果后给出总结；
//!   收到安全审查提示时回答 safe。
//! - ScriptedLlmClient：按顺序返回预设响应，并记录每次请求，供引擎测试断言。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use crate::llm::{CompletionRequest, LlmClient, LlmError};
use crate::memory::{Message, Role, ToolCall};

/// Mock 客户端
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    fn model_name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Message, LlmError> {
        let last = request.messages.last();

        if request.tools.is_empty() {
            let asks_for_verdict = last
                .map(|m| m.content.contains("unsafe content"))
                .unwrap_or(false);
            let text = if asks_for_verdict {
                "safe".to_string()
            } else {
                format!(
                    "Echo from Mock: {}",
                    last.map(|m| m.content.as_str()).unwrap_or("(no input)")
                )
            };
            return Ok(Message::assistant(text).with_id(uuid::Uuid::new_v4().to_string()));
        }

        if let Some(m) = last.filter(|m| m.role == Role::Tool) {
            return Ok(Message::assistant(format!("Here is what I found:\n{}", m.content))
                .with_id(uuid::Uuid::new_v4().to_string()));
        }

        let last_user = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();

        if request.tools.iter().any(|t| t.name == "search_destinations") {
            let call = ToolCall::new(
                "mock_call_1",
                "search_destinations",
                json!({"query": last_user, "max_results": 5}),
            );
            return Ok(Message::assistant_with_tools("", vec![call])
                .with_id(uuid::Uuid::new_v4().to_string()));
        }

        Ok(Message::assistant(format!("Echo from Mock: {}", last_user))
            .with_id(uuid::Uuid::new_v4().to_string()))
    }
}

/// 预设脚本客户端：依次弹出响应；脚本耗尽后返回 ApiError
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    responses: Mutex<VecDeque<Result<Message, LlmError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    calls: AtomicUsize,
}

impl ScriptedLlmClient {
    pub fn new(responses: Vec<Result<Message, LlmError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// 全部为成功响应的便捷构造
    pub fn with_messages(messages: Vec<Message>) -> Self {
        Self::new(messages.into_iter().map(Ok).collect())
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 已收到的请求（按调用顺序）
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Message, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut reqs) = self.requests.lock() {
            reqs.push(request.clone());
        }
        let next = self
            .responses
            .lock()
            .map_err(|e| LlmError::ApiError(e.to_string()))?
            .pop_front();
        next.unwrap_or_else(|| Err(LlmError::ApiError("script exhausted".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ToolSpec;

    fn search_spec() -> ToolSpec {
        ToolSpec {
            name: "search_destinations".to_string(),
            description: String::new(),
            parameters: json!({}),
        }
    }

    #[tokio::test]
    async fn test_mock_requests_search_then_summarizes() {
        let client = MockLlmClient;
        let first = client
            .complete(&CompletionRequest::new(vec![Message::user("beach")]).with_tools(vec![search_spec()]))
            .await
            .unwrap();
        assert_eq!(first.tool_calls.len(), 1);
        assert_eq!(first.tool_calls[0].args["query"], "beach");

        let second = client
            .complete(
                &CompletionRequest::new(vec![
                    Message::user("beach"),
                    first.clone(),
                    Message::tool("mock_call_1", "{\"success\":true}"),
                ])
                .with_tools(vec![search_spec()]),
            )
            .await
            .unwrap();
        assert!(second.tool_calls.is_empty());
        assert!(second.content.contains("success"));
    }

    #[tokio::test]
    async fn test_scripted_exhausts() {
        let client = ScriptedLlmClient::with_messages(vec![Message::assistant("one")]);
        let req = CompletionRequest::new(vec![Message::user("x")]);
        assert_eq!(client.complete(&req).await.unwrap().content, "one");
        assert!(matches!(client.complete(&req).await, Err(LlmError::ApiError(_))));
        assert_eq!(client.call_count(), 2);
        assert_eq!(client.requests().len(), 2);
    }
}
