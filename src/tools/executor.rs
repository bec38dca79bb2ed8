//! 工具执行器
//!
//! 由引擎按模型请求的顺序逐个执行（不并发、不重排，工具可能有副作用如预订），每次调用施加超时；
//! 未知工具、不在当前阶段子集内的工具、参数非法、执行异常与超时都转为 `{success:false, ...}` 结果，
//! 不向引擎传播。每次调用输出结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::core::EngineError;
use crate::llm::ToolSpec;
use crate::memory::ToolCall;
use crate::tools::{ToolId, ToolRegistry};

/// 单次工具调用的结构化结果
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub tool: String,
    pub output: Value,
}

impl ToolResult {
    pub fn is_success(&self) -> bool {
        self.output.get("success").and_then(Value::as_bool).unwrap_or(true)
    }

    /// 已解析的工具标识（未知工具为 None）
    pub fn tool_id(&self) -> Option<ToolId> {
        self.tool.parse().ok()
    }
}

/// 失败结果载荷
pub fn failure_payload(tool: &str, message: impl Into<String>) -> Value {
    json!({
        "success": false,
        "message": message.into(),
        "tool": tool,
    })
}

/// 工具执行器：持有注册表与单次调用超时
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn with_timeout(registry: ToolRegistry, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// 当前阶段暴露给模型的工具声明
    pub fn specs_for(&self, allowed: &[ToolId]) -> Vec<ToolSpec> {
        self.registry.specs(allowed)
    }

    /// 执行单个调用；引擎按请求顺序逐个调用，事件按 调用 → 结果 交替输出。仅在取消时返回错误
    pub async fn execute_call(
        &self,
        call: &ToolCall,
        allowed: &[ToolId],
        cancel: &CancellationToken,
    ) -> Result<ToolResult, EngineError> {
        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            out = self.execute_one(call, allowed) => out,
        };
        Ok(ToolResult {
            tool_call_id: call.id.clone(),
            tool: call.name.clone(),
            output,
        })
    }

    async fn execute_one(&self, call: &ToolCall, allowed: &[ToolId]) -> Value {
        let start = Instant::now();
        let (outcome, output) = match self.resolve(&call.name, allowed) {
            Err(message) => ("rejected", failure_payload(&call.name, message)),
            Ok(tool) => match timeout(self.timeout, tool.execute(call.args.clone())).await {
                Ok(Ok(value)) => ("ok", value),
                Ok(Err(e)) => ("error", failure_payload(&call.name, e)),
                Err(_) => (
                    "timeout",
                    failure_payload(
                        &call.name,
                        format!("Tool '{}' timed out after {}s", call.name, self.timeout.as_secs()),
                    ),
                ),
            },
        };
        let audit = json!({
            "event": "tool_audit",
            "tool": call.name,
            "call_id": call.id,
            "outcome": outcome,
            "success": output.get("success").and_then(Value::as_bool).unwrap_or(true),
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview(&call.args),
        });
        tracing::info!(audit = %audit, "tool");
        output
    }

    fn resolve(
        &self,
        name: &str,
        allowed: &[ToolId],
    ) -> Result<std::sync::Arc<dyn crate::tools::Tool>, String> {
        let id: ToolId = name.parse()?;
        if !allowed.contains(&id) {
            return Err(format!("Tool '{name}' is not available in this conversation phase"));
        }
        self.registry
            .get(id)
            .ok_or_else(|| format!("Tool '{name}' is not configured"))
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Tool;
    use async_trait::async_trait;

    struct SlowStats {
        delay_ms: u64,
    }

    #[async_trait]
    impl Tool for SlowStats {
        fn id(&self) -> ToolId {
            ToolId::GetDatabaseStats
        }

        fn description(&self) -> &str {
            "stats"
        }

        async fn execute(&self, _args: Value) -> Result<Value, String> {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            Ok(json!({"success": true, "stats": {"total_destinations": 3}}))
        }
    }

    struct Exploding;

    #[async_trait]
    impl Tool for Exploding {
        fn id(&self) -> ToolId {
            ToolId::SearchFlights
        }

        fn description(&self) -> &str {
            "always fails"
        }

        async fn execute(&self, _args: Value) -> Result<Value, String> {
            Err("connection reset".to_string())
        }
    }

    async fn run_all(exec: &ToolExecutor, calls: &[ToolCall], allowed: &[ToolId]) -> Vec<ToolResult> {
        let cancel = CancellationToken::new();
        let mut results = Vec::new();
        for call in calls {
            results.push(exec.execute_call(call, allowed, &cancel).await.unwrap());
        }
        results
    }

    fn executor(delay_ms: u64, timeout: Duration) -> ToolExecutor {
        let mut registry = ToolRegistry::new();
        registry.register(SlowStats { delay_ms });
        registry.register(Exploding);
        ToolExecutor::with_timeout(registry, timeout)
    }

    #[tokio::test]
    async fn test_failures_become_results() {
        let exec = executor(0, Duration::from_secs(1));
        let calls = vec![
            ToolCall::new("1", "search_flights", json!({})),
            ToolCall::new("2", "no_such_tool", json!({})),
            ToolCall::new("3", "get_database_stats", json!({})),
            ToolCall::new("4", "get_airport_codes", json!({})),
        ];
        let allowed = [ToolId::SearchFlights, ToolId::GetDatabaseStats, ToolId::GetAirportCodes];
        let results = run_all(&exec, &calls, &allowed).await;
        assert_eq!(results.len(), 4);
        assert!(!results[0].is_success());
        assert_eq!(results[0].output["message"], "connection reset");
        assert!(results[1].output["message"].as_str().unwrap().contains("Unknown tool"));
        assert!(results[2].is_success());
        assert!(results[3].output["message"].as_str().unwrap().contains("not configured"));
    }

    #[tokio::test]
    async fn test_tool_outside_phase_is_rejected() {
        let exec = executor(0, Duration::from_secs(1));
        let calls = vec![ToolCall::new("1", "get_database_stats", json!({}))];
        let results = run_all(&exec, &calls, &[ToolId::SearchFlights]).await;
        assert!(!results[0].is_success());
        assert!(results[0].output["message"].as_str().unwrap().contains("not available"));
    }

    #[tokio::test]
    async fn test_timeout_becomes_result() {
        let exec = executor(200, Duration::from_millis(20));
        let calls = vec![ToolCall::new("1", "get_database_stats", json!({}))];
        let results = run_all(&exec, &calls, &[ToolId::GetDatabaseStats]).await;
        assert!(!results[0].is_success());
        assert!(results[0].output["message"].as_str().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_cancelled_before_execution() {
        let exec = executor(0, Duration::from_secs(1));
        let token = CancellationToken::new();
        token.cancel();
        let call = ToolCall::new("1", "get_database_stats", json!({}));
        let r = exec.execute_call(&call, &[ToolId::GetDatabaseStats], &token).await;
        assert!(matches!(r, Err(EngineError::Cancelled)));
    }
}
