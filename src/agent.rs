//! 会话边界：TravelAgent
//!
//! from_config 一次性构建模型路由、安全分类器、向量库、旅行 API 与工具执行器（以 Arc 共享）；
//! invoke 为每轮选择 Agent 配置、建立编排状态并运行引擎。
//! Agent 选择优先级：请求的 phase > 请求的 agent 键 > 配置的默认 Agent；supervisor 按意图自动路由。

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::agents::{
    find_profile, phase_instructions, phase_tools, profile_for_phase, AgentKind, IntentRouter,
    DEFAULT_AGENT,
};
use crate::config::AppConfig;
use crate::core::{
    EngineConfig, EngineError, EngineEvent, OrchestrationEngine, OrchestrationState, Phase,
};
use crate::integrations::{AmadeusClient, TravelApi};
use crate::llm::{create_embedder_from_config, LlmClient, MockLlmClient, ModelRouter, OpenAiClient};
use crate::memory::{ConversationHistory, Message};
use crate::safety::{LlamaGuard, SafetyClassifier};
use crate::store::{InMemoryVectorStore, VectorStore};
use crate::tools::{travel_registry, ToolExecutor};

/// 单轮请求
#[derive(Debug, Clone, Default)]
pub struct TurnRequest {
    /// 目录中的 Agent 键；None 时使用默认 Agent
    pub agent: Option<String>,
    /// 直接指定阶段（优先于 agent）
    pub phase: Option<Phase>,
    pub user_message: String,
    /// 先前轮次的历史（多轮会话）
    pub prior_history: Vec<Message>,
    /// 模型标识；None 或未注册时使用默认模型
    pub model: Option<String>,
}

impl TurnRequest {
    pub fn new(user_message: impl Into<String>) -> Self {
        Self {
            user_message: user_message.into(),
            ..Default::default()
        }
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.prior_history = history;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// 单轮结果
#[derive(Debug, Clone, Serialize)]
pub struct TurnResponse {
    pub final_message: Message,
    pub safety_blocked: bool,
    pub budget_fallback: bool,
    pub steps_used: usize,
    pub agent: String,
    /// 旅行阶段；chatbot / rag-assistant 无阶段
    pub phase: Option<Phase>,
    /// 完整历史（含先前轮次），供下一轮作为 prior_history
    pub messages: Vec<Message>,
}

/// 本轮选定的 Agent 配置
struct TurnSetup {
    agent: &'static str,
    phase: Option<Phase>,
    instructions: &'static str,
    tools: Vec<crate::tools::ToolId>,
}

pub struct TravelAgent {
    models: ModelRouter,
    safety: Arc<dyn SafetyClassifier>,
    executor: Arc<ToolExecutor>,
    router: IntentRouter,
    max_steps: usize,
    default_agent: String,
}

impl TravelAgent {
    pub fn new(
        models: ModelRouter,
        safety: Arc<dyn SafetyClassifier>,
        executor: Arc<ToolExecutor>,
        max_steps: usize,
    ) -> Result<Self, EngineError> {
        if max_steps == 0 {
            return Err(EngineError::Config("max_steps must be at least 1".to_string()));
        }
        Ok(Self {
            models,
            safety,
            executor,
            router: IntentRouter::new(),
            max_steps,
            default_agent: DEFAULT_AGENT.to_string(),
        })
    }

    pub fn with_default_agent(mut self, agent: impl Into<String>) -> Result<Self, EngineError> {
        let agent = agent.into();
        if find_profile(&agent).is_none() {
            return Err(EngineError::Config(format!("unknown agent: {agent}")));
        }
        self.default_agent = agent;
        Ok(self)
    }

    /// 按配置构建全部依赖；缺少 API Key 时模型与安全检查回退 Mock，缺少旅行 API 凭据时预订工具返回不可用
    pub async fn from_config(cfg: &AppConfig) -> Result<Self, EngineError> {
        cfg.validate()?;
        let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());
        let use_remote = cfg.llm.provider.eq_ignore_ascii_case("openai") && api_key.is_some();
        let timeout = cfg.llm.timeouts.request;

        let mut models = ModelRouter::new(cfg.llm.default_model.clone());
        let mut names = cfg.llm.models.clone();
        if !names.contains(&cfg.llm.default_model) {
            names.push(cfg.llm.default_model.clone());
        }
        for name in &names {
            let client: Arc<dyn LlmClient> = if use_remote {
                Arc::new(OpenAiClient::new(
                    cfg.llm.base_url.as_deref(),
                    name,
                    api_key.as_deref(),
                    timeout,
                )?)
            } else {
                Arc::new(MockLlmClient)
            };
            models.add_model(name.clone(), client);
        }
        if use_remote {
            tracing::info!(models = ?names, default = %cfg.llm.default_model, "using OpenAI-compatible LLM");
        } else {
            tracing::warn!("No OPENAI_API_KEY set or provider is mock, using Mock LLM");
        }

        let guard_llm: Arc<dyn LlmClient> = if use_remote {
            let model = cfg.safety.model.as_deref().unwrap_or(&cfg.llm.default_model);
            let base = cfg.safety.base_url.as_deref().or(cfg.llm.base_url.as_deref());
            Arc::new(OpenAiClient::new(base, model, api_key.as_deref(), timeout)?)
        } else {
            Arc::new(MockLlmClient)
        };
        let safety: Arc<dyn SafetyClassifier> = Arc::new(LlamaGuard::new(guard_llm));

        let embedder = create_embedder_from_config(
            cfg.llm.base_url.as_deref(),
            &cfg.vector_store.embedding_model,
            api_key.as_deref(),
        );
        let store: Arc<dyn VectorStore> = match InMemoryVectorStore::load_seed_file(
            cfg.vector_store.collection.clone(),
            embedder.clone(),
            &cfg.vector_store.seed_path,
        )
        .await
        {
            Ok(store) => Arc::new(store),
            Err(e) => {
                tracing::warn!(error = %e, "destination seed not loaded, collection is empty");
                Arc::new(InMemoryVectorStore::new(cfg.vector_store.collection.clone(), embedder))
            }
        };

        let travel_api: Option<Arc<dyn TravelApi>> =
            match AmadeusClient::from_env(cfg.travel_api.base_url.as_deref(), timeout) {
                Ok(client) => Some(Arc::new(client)),
                Err(e) => {
                    tracing::warn!(error = %e, "travel API disabled");
                    None
                }
            };

        let executor = Arc::new(ToolExecutor::new(
            travel_registry(store, travel_api),
            cfg.tools.tool_timeout_secs,
        ));
        Self::new(models, safety, executor, cfg.engine.max_steps)?
            .with_default_agent(cfg.engine.default_agent.clone())
    }

    pub fn model_names(&self) -> Vec<String> {
        self.models.model_names()
    }

    pub fn default_model(&self) -> &str {
        self.models.default_model()
    }

    fn select(&self, req: &TurnRequest, prior: &ConversationHistory) -> Result<TurnSetup, EngineError> {
        if let Some(phase) = req.phase {
            return Ok(self.phase_setup(profile_for_phase(phase).key, phase));
        }
        let key = req.agent.as_deref().unwrap_or(&self.default_agent);
        let profile =
            find_profile(key).ok_or_else(|| EngineError::Config(format!("unknown agent: {key}")))?;
        match profile.kind {
            AgentKind::Phase(phase) => Ok(self.phase_setup(profile.key, phase)),
            AgentKind::Supervisor => {
                let initial = prior
                    .first_user_message()
                    .map(|m| m.content.as_str())
                    .unwrap_or(&req.user_message);
                Ok(self.phase_setup(profile.key, self.router.classify(initial)))
            }
            kind => {
                let (instructions, tools) = kind.fixed_setup().ok_or_else(|| {
                    EngineError::Config(format!("agent {key} has no fixed setup"))
                })?;
                Ok(TurnSetup {
                    agent: profile.key,
                    phase: None,
                    instructions,
                    tools,
                })
            }
        }
    }

    fn phase_setup(&self, agent: &'static str, phase: Phase) -> TurnSetup {
        TurnSetup {
            agent,
            phase: Some(phase),
            instructions: phase_instructions(phase),
            tools: phase_tools(phase),
        }
    }

    pub async fn invoke(
        &self,
        req: TurnRequest,
        cancel: &CancellationToken,
    ) -> Result<TurnResponse, EngineError> {
        self.run_turn(req, cancel, None).await
    }

    /// 同 invoke，并把过程事件推送到 event_tx
    pub async fn invoke_with_events(
        &self,
        req: TurnRequest,
        cancel: &CancellationToken,
        event_tx: mpsc::UnboundedSender<EngineEvent>,
    ) -> Result<TurnResponse, EngineError> {
        self.run_turn(req, cancel, Some(event_tx)).await
    }

    async fn run_turn(
        &self,
        mut req: TurnRequest,
        cancel: &CancellationToken,
        event_tx: Option<mpsc::UnboundedSender<EngineEvent>>,
    ) -> Result<TurnResponse, EngineError> {
        let prior = ConversationHistory::from_messages(std::mem::take(&mut req.prior_history));
        let setup = self.select(&req, &prior)?;
        let llm = self.models.resolve(req.model.as_deref())?;
        tracing::info!(
            agent = setup.agent,
            phase = ?setup.phase,
            model = llm.model_name(),
            "turn started"
        );
        let config = EngineConfig {
            instructions: setup.instructions.to_string(),
            tools: setup.tools,
            max_steps: self.max_steps,
        };
        let mut engine =
            OrchestrationEngine::new(config, llm, self.safety.clone(), self.executor.clone())?;
        if let Some(tx) = event_tx {
            engine = engine.with_event_tx(tx);
        }

        let mut state = OrchestrationState::new(
            setup.phase.unwrap_or(Phase::GenericPlanning),
            self.max_steps,
            prior.into_messages(),
            Message::user(req.user_message),
        );
        let outcome = engine.run(&mut state, cancel).await?;
        Ok(TurnResponse {
            final_message: outcome.final_message,
            safety_blocked: outcome.safety_blocked,
            budget_fallback: outcome.budget_fallback,
            steps_used: outcome.steps_used,
            agent: setup.agent.to_string(),
            phase: setup.phase,
            messages: state.into_messages(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{HashingEmbedder, ScriptedLlmClient};
    use crate::safety::StaticSafety;

    fn agent_with(llm: Arc<dyn LlmClient>) -> TravelAgent {
        let mut models = ModelRouter::new("scripted");
        models.add_model("scripted", llm);
        let store = Arc::new(InMemoryVectorStore::new("t", Arc::new(HashingEmbedder::default())));
        let executor = Arc::new(ToolExecutor::new(travel_registry(store, None), 5));
        TravelAgent::new(models, Arc::new(StaticSafety::safe()), executor, 6).unwrap()
    }

    #[tokio::test]
    async fn test_phase_hint_beats_agent_key() {
        let llm = Arc::new(ScriptedLlmClient::with_messages(vec![Message::assistant("ok")]));
        let agent = agent_with(llm.clone());
        let req = TurnRequest::new("Tell me about Kyoto")
            .with_agent("chatbot")
            .with_phase(Phase::Booking);
        let resp = agent.invoke(req, &CancellationToken::new()).await.unwrap();
        assert_eq!(resp.phase, Some(Phase::Booking));
        assert_eq!(resp.agent, "travel-booking-agent");
        let tools: Vec<String> = llm.requests()[0].tools.iter().map(|t| t.name.clone()).collect();
        assert!(tools.contains(&"search_flights".to_string()));
        assert!(!tools.contains(&"search_destinations".to_string()));
    }

    #[tokio::test]
    async fn test_supervisor_routes_by_intent() {
        let llm = Arc::new(ScriptedLlmClient::with_messages(vec![Message::assistant("ok")]));
        let agent = agent_with(llm);
        let req = TurnRequest::new("Tell me about Kyoto in autumn").with_agent("travel-supervisor-agent");
        let resp = agent.invoke(req, &CancellationToken::new()).await.unwrap();
        assert_eq!(resp.phase, Some(Phase::DestinationResearch));
        assert_eq!(resp.agent, "travel-supervisor-agent");
    }

    #[tokio::test]
    async fn test_chatbot_has_no_tools() {
        let llm = Arc::new(ScriptedLlmClient::with_messages(vec![Message::assistant("hello!")]));
        let agent = agent_with(llm.clone());
        let resp = agent
            .invoke(TurnRequest::new("hi").with_agent("chatbot"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(resp.phase, None);
        assert_eq!(resp.final_message.content, "hello!");
        assert!(llm.requests()[0].tools.is_empty());
        assert_eq!(resp.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_requested_model_is_used() {
        let default_llm = Arc::new(ScriptedLlmClient::with_messages(vec![Message::assistant("default")]));
        let other_llm = Arc::new(ScriptedLlmClient::with_messages(vec![Message::assistant("other")]));
        let mut models = ModelRouter::new("default");
        models.add_model("default", default_llm.clone());
        models.add_model("other", other_llm.clone());
        let store = Arc::new(InMemoryVectorStore::new("t", Arc::new(HashingEmbedder::default())));
        let executor = Arc::new(ToolExecutor::new(travel_registry(store, None), 5));
        let agent = TravelAgent::new(models, Arc::new(StaticSafety::safe()), executor, 4).unwrap();
        assert_eq!(agent.default_model(), "default");
        assert_eq!(agent.model_names(), vec!["default".to_string(), "other".to_string()]);

        let resp = agent
            .invoke(
                TurnRequest::new("hi").with_agent("chatbot").with_model("other"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(resp.final_message.content, "other");
        assert_eq!(default_llm.call_count(), 0);
        assert_eq!(other_llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_agent_is_config_error() {
        let agent = agent_with(Arc::new(ScriptedLlmClient::with_messages(vec![])));
        let err = agent
            .invoke(TurnRequest::new("hi").with_agent("nope"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_zero_steps_rejected() {
        let store = Arc::new(InMemoryVectorStore::new("t", Arc::new(HashingEmbedder::default())));
        let executor = Arc::new(ToolExecutor::new(travel_registry(store, None), 5));
        let r = TravelAgent::new(ModelRouter::new("m"), Arc::new(StaticSafety::safe()), executor, 0);
        assert!(matches!(r, Err(EngineError::Config(_))));
    }
}
