//! 编排引擎：guard_input → model ↔ tools → done / block_unsafe_content
//!
//! 所有 Agent 共用同一个引擎，只是 EngineConfig（指令、工具子集、步数上限）不同。
//! 每个挂起点（安全检查、模型调用、工具执行）都可被 CancellationToken 取消。

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::agents::prompts::{render_instructions, today};
use crate::core::{
    EngineError, EngineEvent, ModelInvoker, OrchestrationState, StepBudget, AIRPORTS_INFO,
    DESTINATION_INFO, PACKAGE_INFO,
};
use crate::llm::LlmClient;
use crate::memory::{Message, Role};
use crate::safety::{SafetyClassifier, SafetyVerdict, SubjectRole};
use crate::tools::{ToolExecutor, ToolId};

/// 预算兜底时替换模型回复的固定文案
pub const BUDGET_FALLBACK_MESSAGE: &str =
    "I need more steps to complete this; here is what I can provide now";

pub fn safety_message(verdict: &SafetyVerdict) -> String {
    format!(
        "This conversation was flagged for unsafe content: {}",
        verdict.categories.join(", ")
    )
}

/// 引擎参数：一个 Agent 就是一份配置
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub instructions: String,
    pub tools: Vec<ToolId>,
    pub max_steps: usize,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.max_steps == 0 {
            return Err(EngineError::Config("max_steps must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// 状态机节点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    GuardInput,
    Model,
    Tools,
    BlockUnsafeContent,
    Done,
}

/// 单轮终态
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub final_message: Message,
    pub safety_blocked: bool,
    pub budget_fallback: bool,
    pub steps_used: usize,
}

/// 工具结果写入的旁路键
pub fn side_channel_key(tool: ToolId) -> Option<&'static str> {
    match tool {
        ToolId::SearchDestinations
        | ToolId::GetDestinationByName
        | ToolId::SearchDestinationsByCriteria => Some(DESTINATION_INFO),
        ToolId::SearchFlights | ToolId::SearchHotels => Some(PACKAGE_INFO),
        ToolId::GetAirportCodes | ToolId::GetCityCodes => Some(AIRPORTS_INFO),
        ToolId::GetDatabaseStats | ToolId::FormatTravelResults => None,
    }
}

async fn cancellable<F: Future>(cancel: &CancellationToken, fut: F) -> Result<F::Output, EngineError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(EngineError::Cancelled),
        out = fut => Ok(out),
    }
}

pub struct OrchestrationEngine {
    config: EngineConfig,
    invoker: ModelInvoker,
    safety: Arc<dyn SafetyClassifier>,
    executor: Arc<ToolExecutor>,
    event_tx: Option<mpsc::UnboundedSender<EngineEvent>>,
}

impl OrchestrationEngine {
    pub fn new(
        config: EngineConfig,
        llm: Arc<dyn LlmClient>,
        safety: Arc<dyn SafetyClassifier>,
        executor: Arc<ToolExecutor>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            config,
            invoker: ModelInvoker::new(llm),
            safety,
            executor,
            event_tx: None,
        })
    }

    pub fn with_event_tx(mut self, tx: mpsc::UnboundedSender<EngineEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn emit(&self, ev: EngineEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(ev);
        }
    }

    /// 运行一轮直到终态；state 中已追加的消息在出错或取消时保留
    pub async fn run(
        &self,
        state: &mut OrchestrationState,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, EngineError> {
        let mut node = Node::GuardInput;
        let mut safety_blocked = false;
        let mut budget_fallback = false;
        loop {
            self.emit(EngineEvent::NodeEntered { node });
            node = match node {
                Node::GuardInput => self.guard_input(state, cancel).await?,
                Node::Model => {
                    let (next, outcome) = self.model(state, cancel).await?;
                    safety_blocked |= outcome == ModelOutcome::SafetyBlocked;
                    budget_fallback |= outcome == ModelOutcome::BudgetFallback;
                    next
                }
                Node::Tools => self.tools(state, cancel).await?,
                Node::BlockUnsafeContent => {
                    safety_blocked = true;
                    self.block_unsafe_content(state);
                    Node::Done
                }
                Node::Done => break,
            };
        }
        self.finish(state, safety_blocked, budget_fallback)
    }

    async fn guard_input(
        &self,
        state: &mut OrchestrationState,
        cancel: &CancellationToken,
    ) -> Result<Node, EngineError> {
        let verdict = self.classify(SubjectRole::User, state.messages(), cancel).await?;
        let unsafe_input = verdict.is_unsafe();
        state.set_safety(verdict);
        Ok(if unsafe_input {
            Node::BlockUnsafeContent
        } else {
            Node::Model
        })
    }

    async fn classify(
        &self,
        role: SubjectRole,
        messages: &[Message],
        cancel: &CancellationToken,
    ) -> Result<SafetyVerdict, EngineError> {
        let verdict = cancellable(cancel, self.safety.classify(role, messages))
            .await?
            .map_err(|e| EngineError::SafetyUnavailable(e.to_string()))?;
        self.emit(EngineEvent::SafetyChecked {
            role: role.as_str().to_string(),
            safe: !verdict.is_unsafe(),
        });
        Ok(verdict)
    }

    async fn model(
        &self,
        state: &mut OrchestrationState,
        cancel: &CancellationToken,
    ) -> Result<(Node, ModelOutcome), EngineError> {
        let remaining_before = state.remaining_steps();
        if remaining_before == 0 {
            tracing::warn!("model node entered with exhausted budget");
            self.emit(EngineEvent::BudgetFallback { discarded_calls: 0 });
            state.append(
                Message::assistant(BUDGET_FALLBACK_MESSAGE).with_id(uuid::Uuid::new_v4().to_string()),
            );
            return Ok((Node::Done, ModelOutcome::BudgetFallback));
        }

        let instructions = render_instructions(&self.config.instructions, state.side_channel(), &today());
        let specs = self.executor.specs_for(&self.config.tools);
        let response = cancellable(
            cancel,
            self.invoker.invoke(&instructions, &specs, state.messages()),
        )
        .await??;
        state.budget_mut().decrement();
        self.emit(EngineEvent::StepUpdate {
            remaining: state.remaining_steps(),
            max_steps: state.budget().max(),
        });

        let mut candidate = state.messages().to_vec();
        candidate.push(response.clone());
        let verdict = self.classify(SubjectRole::Agent, &candidate, cancel).await?;
        if verdict.is_unsafe() {
            tracing::warn!(categories = ?verdict.categories, "model output blocked");
            self.emit(EngineEvent::SafetyBlocked {
                categories: verdict.categories.clone(),
            });
            state.append(Message::assistant(safety_message(&verdict)));
            state.set_safety(verdict);
            return Ok((Node::Done, ModelOutcome::SafetyBlocked));
        }

        let has_calls = response.has_pending_tool_calls();
        if StepBudget::should_fallback(remaining_before, has_calls) {
            tracing::info!(
                remaining = remaining_before,
                discarded = response.tool_calls.len(),
                "step budget low, discarding tool calls"
            );
            self.emit(EngineEvent::BudgetFallback {
                discarded_calls: response.tool_calls.len(),
            });
            let mut fallback = Message::assistant(BUDGET_FALLBACK_MESSAGE);
            fallback.id = response.id;
            state.append(fallback);
            return Ok((Node::Done, ModelOutcome::BudgetFallback));
        }

        state.append(response);
        Ok(if has_calls {
            (Node::Tools, ModelOutcome::Accepted)
        } else {
            (Node::Done, ModelOutcome::Accepted)
        })
    }

    async fn tools(
        &self,
        state: &mut OrchestrationState,
        cancel: &CancellationToken,
    ) -> Result<Node, EngineError> {
        let calls = match state.last_message() {
            Some(msg) if msg.has_pending_tool_calls() => msg.tool_calls.clone(),
            _ => {
                return Err(EngineError::MalformedModelOutput(
                    "tools node entered without pending tool calls".to_string(),
                ))
            }
        };
        for call in &calls {
            self.emit(EngineEvent::ToolCall {
                id: call.id.clone(),
                tool: call.name.clone(),
                args: call.args.clone(),
            });
            let result = self
                .executor
                .execute_call(call, &self.config.tools, cancel)
                .await?;
            let success = result.is_success();
            self.emit(EngineEvent::ToolResult {
                id: result.tool_call_id.clone(),
                tool: result.tool.clone(),
                success,
            });
            if success {
                if let Some(key) = result.tool_id().and_then(side_channel_key) {
                    state.record_side_data(key, &result.tool, result.output.clone());
                }
            }
            state.append(Message::tool(result.tool_call_id, result.output.to_string()));
        }
        Ok(Node::Model)
    }

    fn block_unsafe_content(&self, state: &mut OrchestrationState) {
        let verdict = state
            .safety()
            .cloned()
            .unwrap_or_else(|| SafetyVerdict::unsafe_with(Vec::<String>::new()));
        tracing::warn!(categories = ?verdict.categories, "user input blocked");
        self.emit(EngineEvent::SafetyBlocked {
            categories: verdict.categories.clone(),
        });
        state.append(Message::assistant(safety_message(&verdict)));
    }

    fn finish(
        &self,
        state: &OrchestrationState,
        safety_blocked: bool,
        budget_fallback: bool,
    ) -> Result<TurnOutcome, EngineError> {
        let final_message = match state.last_message() {
            Some(msg) if msg.role == Role::Assistant && msg.tool_calls.is_empty() => msg.clone(),
            Some(msg) => {
                return Err(EngineError::MalformedModelOutput(format!(
                    "final message is not a plain assistant message (role {:?})",
                    msg.role
                )))
            }
            None => {
                return Err(EngineError::MalformedModelOutput(
                    "turn ended with empty history".to_string(),
                ))
            }
        };
        let steps_used = state.budget().used();
        self.emit(EngineEvent::Done { steps_used });
        tracing::info!(steps_used, safety_blocked, budget_fallback, "turn finished");
        Ok(TurnOutcome {
            final_message,
            safety_blocked,
            budget_fallback,
            steps_used,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModelOutcome {
    Accepted,
    SafetyBlocked,
    BudgetFallback,
}
