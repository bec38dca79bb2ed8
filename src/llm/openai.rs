//! OpenAI 兼容 Chat Completions 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url），请求中绑定 function tools，
//! 响应中的 tool_calls 解析为 ToolCall；保留响应 id 作为消息 id。每次调用记录 token 使用。

use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionMessageToolCall, ChatCompletionMessageToolCalls,
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestToolMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionTool, ChatCompletionTools,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    FunctionCall, FunctionObjectArgs, Role as WireRole,
};
use async_openai::Client;
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llm::{CompletionRequest, LlmClient, LlmError, ToolSpec};
use crate::memory::{Message, Role, ToolCall};

/// OpenAI 兼容客户端：持有 async_openai Client 与 model 名
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiClient {
    /// HTTP 客户端无法构建（如 TLS 初始化失败）时返回错误，不静默丢弃超时设置
    pub fn new(
        base_url: Option<&str>,
        model: &str,
        api_key: Option<&str>,
        timeout_secs: u64,
    ) -> Result<Self, LlmError> {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let config = match base_url {
            Some(url) => OpenAIConfig::new()
                .with_api_base(url.trim_end_matches('/'))
                .with_api_key(api_key),
            None => OpenAIConfig::new().with_api_key(api_key),
        };
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| LlmError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client: Client::with_config(config).with_http_client(http),
            model: model.to_string(),
        })
    }

    fn build_request(&self, request: &CompletionRequest) -> Result<CreateChatCompletionRequest, LlmError> {
        let mut messages: Vec<ChatCompletionRequestMessage> =
            Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system {
            messages.push(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system.clone())
                    .build()
                    .map_err(map_openai_error)?
                    .into(),
            );
        }
        for m in &request.messages {
            messages.push(to_openai_message(m)?);
        }

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model).messages(messages);
        if !request.tools.is_empty() {
            let tools = request
                .tools
                .iter()
                .map(to_openai_tool)
                .collect::<Result<Vec<_>, _>>()?;
            args.tools(tools);
        }
        args.build().map_err(map_openai_error)
    }
}

fn to_openai_tool(spec: &ToolSpec) -> Result<ChatCompletionTools, LlmError> {
    let function = FunctionObjectArgs::default()
        .name(spec.name.clone())
        .description(spec.description.clone())
        .parameters(spec.parameters.clone())
        .build()
        .map_err(map_openai_error)?;
    Ok(ChatCompletionTools::Function(ChatCompletionTool { function }))
}

fn to_openai_message(m: &Message) -> Result<ChatCompletionRequestMessage, LlmError> {
    let msg: ChatCompletionRequestMessage = match m.role {
        Role::User => ChatCompletionRequestUserMessageArgs::default()
            .content(m.content.clone())
            .build()
            .map_err(map_openai_error)?
            .into(),
        Role::Assistant => {
            let mut args = ChatCompletionRequestAssistantMessageArgs::default();
            if !m.content.is_empty() || m.tool_calls.is_empty() {
                args.content(m.content.clone());
            }
            if !m.tool_calls.is_empty() {
                let calls: Vec<ChatCompletionMessageToolCalls> = m
                    .tool_calls
                    .iter()
                    .map(|c| {
                        ChatCompletionMessageToolCalls::Function(ChatCompletionMessageToolCall {
                            id: c.id.clone(),
                            function: FunctionCall {
                                name: c.name.clone(),
                                arguments: c.args.to_string(),
                            },
                        })
                    })
                    .collect();
                args.tool_calls(calls);
            }
            args.build().map_err(map_openai_error)?.into()
        }
        Role::Tool => ChatCompletionRequestToolMessageArgs::default()
            .content(m.content.clone())
            .tool_call_id(m.tool_call_id.clone().unwrap_or_default())
            .build()
            .map_err(map_openai_error)?
            .into(),
    };
    Ok(msg)
}

fn parse_arguments(raw: &str) -> Result<Value, LlmError> {
    if raw.trim().is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_str(raw)
        .map_err(|e| LlmError::MalformedResponse(format!("tool arguments are not JSON: {e}: {raw}")))
}

/// 取首个 choice 转为 Message；工具参数必须是合法 JSON
fn from_openai_response(response: CreateChatCompletionResponse) -> Result<Message, LlmError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::MalformedResponse("response has no choices".to_string()))?;
    let message = choice.message;

    let role = match message.role {
        WireRole::Assistant => Role::Assistant,
        WireRole::User => Role::User,
        WireRole::Tool => Role::Tool,
        other => {
            return Err(LlmError::MalformedResponse(format!("unexpected role '{other:?}'")))
        }
    };
    let tool_calls = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| match tc {
            ChatCompletionMessageToolCalls::Function(call) => Ok(ToolCall::new(
                call.id,
                call.function.name,
                parse_arguments(&call.function.arguments)?,
            )),
            ChatCompletionMessageToolCalls::Custom(call) => Err(LlmError::MalformedResponse(
                format!("unsupported custom tool call '{}'", call.custom_tool.name),
            )),
        })
        .collect::<Result<Vec<_>, LlmError>>()?;

    Ok(Message {
        id: Some(response.id).filter(|id| !id.is_empty()),
        role,
        content: message.content.unwrap_or_default(),
        tool_calls,
        tool_call_id: None,
    })
}

fn map_openai_error(e: OpenAIError) -> LlmError {
    match e {
        OpenAIError::Reqwest(err) if err.is_timeout() => LlmError::Timeout,
        OpenAIError::Reqwest(err) => match err.status() {
            Some(status) => LlmError::Http {
                status: status.as_u16(),
                body: err.to_string(),
            },
            None => LlmError::Network(err.to_string()),
        },
        OpenAIError::ApiError(api) => {
            let kind = format!(
                "{} {}",
                api.r#type.as_deref().unwrap_or_default(),
                api.code.as_deref().unwrap_or_default()
            );
            if kind.contains("invalid_api_key") || kind.contains("authentication") {
                LlmError::Auth(api.message)
            } else if kind.contains("rate_limit") {
                LlmError::RateLimited { retry_after_ms: 1000 }
            } else {
                LlmError::ApiError(api.to_string())
            }
        }
        OpenAIError::JSONDeserialize(err, _) => LlmError::MalformedResponse(err.to_string()),
        other => LlmError::ApiError(other.to_string()),
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Message, LlmError> {
        let body = self.build_request(request)?;
        let response = self
            .client
            .chat()
            .create(body)
            .await
            .map_err(map_openai_error)?;

        if let Some(usage) = &response.usage {
            tracing::info!(
                model = %self.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                "token usage"
            );
        }
        from_openai_response(response)
    }
}
