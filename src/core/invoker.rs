//! ModelInvoker：拼接 system 指令、绑定工具 schema、调用模型并校验返回形状
//!
//! system 指令每次调用时重新计算，不写入历史；模型返回的消息 id 原样保留（缺失时补一个 UUID，
//! 供预算兜底时沿用同一 id 替换）。内部不重试。

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;

use crate::core::EngineError;
use crate::llm::{CompletionRequest, LlmClient, LlmError, ToolSpec};
use crate::memory::{Message, Role};

pub struct ModelInvoker {
    llm: Arc<dyn LlmClient>,
}

impl ModelInvoker {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    /// 调用模型，返回恰好一条 assistant 消息
    pub async fn invoke(
        &self,
        instructions: &str,
        tools: &[ToolSpec],
        history: &[Message],
    ) -> Result<Message, EngineError> {
        let request = CompletionRequest::new(history.to_vec())
            .with_system(instructions)
            .with_tools(tools.to_vec());
        let response = self.llm.complete(&request).await.map_err(|e| match e {
            LlmError::MalformedResponse(detail) => EngineError::MalformedModelOutput(detail),
            other => EngineError::Llm(other),
        })?;
        let response = validate_assistant(response)?;
        tracing::info!(
            model = %self.llm.model_name(),
            tool_calls = response.tool_calls.len(),
            "model responded"
        );
        Ok(response)
    }
}

/// 校验模型输出：必须为 assistant 角色；工具调用 id / 名称非空且 id 唯一；参数为对象（null 视为空对象）
pub fn validate_assistant(mut msg: Message) -> Result<Message, EngineError> {
    if msg.role != Role::Assistant {
        return Err(EngineError::MalformedModelOutput(format!(
            "expected assistant message, got {:?}",
            msg.role
        )));
    }
    if msg.tool_call_id.is_some() {
        return Err(EngineError::MalformedModelOutput(
            "assistant message carries tool_call_id".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    for call in msg.tool_calls.iter_mut() {
        if call.id.trim().is_empty() || call.name.trim().is_empty() {
            return Err(EngineError::MalformedModelOutput(
                "tool call without id or name".to_string(),
            ));
        }
        if !seen.insert(call.id.clone()) {
            return Err(EngineError::MalformedModelOutput(format!(
                "duplicate tool call id '{}'",
                call.id
            )));
        }
        match &call.args {
            Value::Object(_) => {}
            Value::Null => call.args = Value::Object(Default::default()),
            other => {
                return Err(EngineError::MalformedModelOutput(format!(
                    "arguments of '{}' must be an object, got {}",
                    call.name, other
                )))
            }
        }
    }
    if msg.id.is_none() {
        msg.id = Some(uuid::Uuid::new_v4().to_string());
    }
    Ok(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;
    use crate::memory::ToolCall;
    use serde_json::json;

    #[tokio::test]
    async fn test_invoke_prepends_system_without_touching_history() {
        let llm = Arc::new(ScriptedLlmClient::with_messages(vec![
            Message::assistant("hello").with_id("resp_1"),
        ]));
        let invoker = ModelInvoker::new(llm.clone());
        let history = vec![Message::user("hi")];
        let msg = invoker.invoke("You are a travel agent", &[], &history).await.unwrap();
        assert_eq!(msg.id.as_deref(), Some("resp_1"));
        let req = &llm.requests()[0];
        assert_eq!(req.system.as_deref(), Some("You are a travel agent"));
        assert_eq!(req.messages, history);
    }

    #[test]
    fn test_validate_rejects_wrong_role() {
        let err = validate_assistant(Message::user("x")).unwrap_err();
        assert!(matches!(err, EngineError::MalformedModelOutput(_)));
    }

    #[test]
    fn test_validate_rejects_duplicate_ids_and_bad_args() {
        let dup = Message::assistant_with_tools(
            "",
            vec![
                ToolCall::new("a", "get_database_stats", json!({})),
                ToolCall::new("a", "get_database_stats", json!({})),
            ],
        );
        assert!(validate_assistant(dup).is_err());

        let bad = Message::assistant_with_tools("", vec![ToolCall::new("a", "search_flights", json!([1]))]);
        assert!(validate_assistant(bad).is_err());
    }

    #[test]
    fn test_validate_normalizes_null_args_and_assigns_id() {
        let msg = Message::assistant_with_tools("", vec![ToolCall::new("a", "get_database_stats", Value::Null)]);
        let msg = validate_assistant(msg).unwrap();
        assert_eq!(msg.tool_calls[0].args, json!({}));
        assert!(msg.id.is_some());
    }

    #[tokio::test]
    async fn test_malformed_response_maps_to_engine_error() {
        let llm = Arc::new(ScriptedLlmClient::new(vec![Err(LlmError::MalformedResponse(
            "bad json".to_string(),
        ))]));
        let invoker = ModelInvoker::new(llm);
        let err = invoker.invoke("", &[], &[]).await.unwrap_err();
        assert!(matches!(err, EngineError::MalformedModelOutput(_)));
    }
}
