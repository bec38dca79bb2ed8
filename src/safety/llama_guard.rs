//! Llama Guard 安全分类
//!
//! 将对话渲染为 Llama Guard 提示（S1–S14 策略类别 + User/Agent 对话记录），调用专用的 guard 模型，
//! 解析首行 safe/unsafe 与第二行的类别编号。tool 消息不参与审查；
//! 每条 assistant 消息都渲染为 Agent 行（连同其工具调用名与参数），待审回复总是最后一条 Agent。

use std::sync::Arc;

use async_trait::async_trait;

use crate::llm::{CompletionRequest, LlmClient};
use crate::memory::{Message, Role};
use crate::safety::{SafetyClassifier, SafetyError, SafetyVerdict, SubjectRole};

const CATEGORIES: [(&str, &str); 14] = [
    ("S1", "Violent Crimes"),
    ("S2", "Non-Violent Crimes"),
    ("S3", "Sex Crimes"),
    ("S4", "Child Exploitation"),
    ("S5", "Defamation"),
    ("S6", "Specialized Advice"),
    ("S7", "Privacy"),
    ("S8", "Intellectual Property"),
    ("S9", "Indiscriminate Weapons"),
    ("S10", "Hate"),
    ("S11", "Self-Harm"),
    ("S12", "Sexual Content"),
    ("S13", "Elections"),
    ("S14", "Code Interpreter Abuse"),
];

/// 基于 LLM 的 Llama Guard 分类器
pub struct LlamaGuard {
    llm: Arc<dyn LlmClient>,
}

impl LlamaGuard {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

fn category_name(code: &str) -> String {
    CATEGORIES
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(code))
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| code.to_string())
}

/// assistant 消息的 Agent 行：正文后逐条附上工具调用
fn agent_line(m: &Message) -> String {
    let mut parts: Vec<String> = Vec::new();
    if !m.content.is_empty() {
        parts.push(m.content.clone());
    }
    for call in &m.tool_calls {
        parts.push(format!("[tool call] {} {}", call.name, call.args));
    }
    format!("Agent: {}", parts.join("\n"))
}

/// 构建 Llama Guard 提示
pub fn build_prompt(role: SubjectRole, messages: &[Message]) -> String {
    let categories = CATEGORIES
        .iter()
        .map(|(code, name)| format!("{code}: {name}."))
        .collect::<Vec<_>>()
        .join("\n");
    let conversation = messages
        .iter()
        .filter_map(|m| match m.role {
            Role::User => Some(format!("User: {}", m.content)),
            Role::Assistant => Some(agent_line(m)),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    let role = role.as_str();
    format!(
        "Task: Check if there is unsafe content in '{role}' messages in conversations according to our safety policy with the below categories.\n\n\
<BEGIN UNSAFE CONTENT CATEGORIES>\n{categories}\n<END UNSAFE CONTENT CATEGORIES>\n\n\
<BEGIN CONVERSATION>\n\n{conversation}\n\n<END CONVERSATION>\n\n\
Provide your safety assessment for ONLY THE LAST {role} message in the above conversation:\n\
- First line must read 'safe' or 'unsafe'.\n\
- If unsafe, a second line must include a comma-separated list of violated categories."
    )
}

/// 解析 guard 模型输出：首行 safe / unsafe，unsafe 时第二行为类别编号列表
pub fn parse_verdict(output: &str) -> Result<SafetyVerdict, SafetyError> {
    let mut lines = output.trim().lines().map(str::trim).filter(|l| !l.is_empty());
    match lines.next().map(str::to_lowercase).as_deref() {
        Some("safe") => Ok(SafetyVerdict::safe()),
        Some("unsafe") => {
            let categories: Vec<String> = lines
                .next()
                .map(|l| {
                    l.split(',')
                        .map(str::trim)
                        .filter(|c| !c.is_empty())
                        .map(category_name)
                        .collect()
                })
                .unwrap_or_default();
            Ok(SafetyVerdict::unsafe_with(categories))
        }
        _ => Err(SafetyError::UnparseableVerdict(output.to_string())),
    }
}

#[async_trait]
impl SafetyClassifier for LlamaGuard {
    async fn classify(
        &self,
        role: SubjectRole,
        messages: &[Message],
    ) -> Result<SafetyVerdict, SafetyError> {
        let prompt = build_prompt(role, messages);
        let request = CompletionRequest::new(vec![Message::user(prompt)]);
        let response = self
            .llm
            .complete(&request)
            .await
            .map_err(|e| SafetyError::Unavailable(e.to_string()))?;
        let verdict = parse_verdict(&response.content)?;
        tracing::debug!(role = role.as_str(), unsafe_content = verdict.is_unsafe(), "llama guard verdict");
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, MockLlmClient, ScriptedLlmClient};
    use crate::memory::ToolCall;

    #[test]
    fn test_parse_verdict() {
        assert_eq!(parse_verdict("safe").unwrap(), SafetyVerdict::safe());
        let v = parse_verdict("unsafe\nS1, S10").unwrap();
        assert_eq!(v.categories, vec!["Violent Crimes", "Hate"]);
        let v = parse_verdict("\n unsafe \n").unwrap();
        assert_eq!(v.categories, vec!["Unspecified"]);
        assert!(matches!(parse_verdict("maybe"), Err(SafetyError::UnparseableVerdict(_))));
    }

    #[test]
    fn test_prompt_skips_tool_messages() {
        let messages = vec![
            Message::user("beach trip"),
            Message::tool("c1", "{\"secret\":1}"),
            Message::assistant("Try Algarve"),
        ];
        let prompt = build_prompt(SubjectRole::Agent, &messages);
        assert!(prompt.contains("User: beach trip"));
        assert!(prompt.contains("Agent: Try Algarve"));
        assert!(!prompt.contains("secret"));
        assert!(prompt.contains("ONLY THE LAST Agent message"));
    }

    #[test]
    fn test_prompt_shows_tool_call_only_response_last() {
        let messages = vec![
            Message::user("plan a Lisbon trip"),
            Message::assistant("Happy to help with your Lisbon trip!"),
            Message::user("now find something"),
            Message::assistant_with_tools(
                "",
                vec![ToolCall::new(
                    "c1",
                    "search_destinations",
                    serde_json::json!({"query": "UNSAFE_QUERY_TEXT"}),
                )],
            ),
        ];
        let prompt = build_prompt(SubjectRole::Agent, &messages);
        let conversation = prompt
            .split("<BEGIN CONVERSATION>")
            .nth(1)
            .and_then(|s| s.split("<END CONVERSATION>").next())
            .unwrap();
        let last_agent = conversation
            .split("\n\n")
            .filter(|block| block.starts_with("Agent:"))
            .last()
            .unwrap();
        assert!(last_agent.contains("search_destinations"));
        assert!(last_agent.contains("UNSAFE_QUERY_TEXT"));
        assert!(!last_agent.contains("Lisbon"));
    }

    #[test]
    fn test_agent_line_keeps_text_and_calls() {
        let msg = Message::assistant_with_tools(
            "Let me look",
            vec![ToolCall::new("c1", "get_database_stats", serde_json::json!({}))],
        );
        assert_eq!(agent_line(&msg), "Agent: Let me look\n[tool call] get_database_stats {}");
    }

    #[tokio::test]
    async fn test_guard_with_mock_is_safe() {
        let guard = LlamaGuard::new(Arc::new(MockLlmClient));
        let v = guard.classify(SubjectRole::User, &[Message::user("hi")]).await.unwrap();
        assert!(!v.is_unsafe());
    }

    #[tokio::test]
    async fn test_guard_failure_is_error_not_safe() {
        let llm = ScriptedLlmClient::new(vec![Err(LlmError::Timeout)]);
        let guard = LlamaGuard::new(Arc::new(llm));
        let r = guard.classify(SubjectRole::User, &[Message::user("hi")]).await;
        assert!(matches!(r, Err(SafetyError::Unavailable(_))));
    }
}
