//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `ATLAS__*` 覆盖（双下划线表示嵌套，如 `ATLAS__ENGINE__MAX_STEPS=8`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::core::EngineError;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmSection,
    pub engine: EngineSection,
    pub tools: ToolsSection,
    pub vector_store: VectorStoreSection,
    pub travel_api: TravelApiSection,
    pub safety: SafetySection,
}

impl AppConfig {
    /// 加载后的一致性校验
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.engine.max_steps == 0 {
            return Err(EngineError::Config(
                "engine.max_steps must be at least 1".to_string(),
            ));
        }
        if self.tools.tool_timeout_secs == 0 {
            return Err(EngineError::Config(
                "tools.tool_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// [llm] 段：后端选择、模型与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// openai / mock；openai 缺少 OPENAI_API_KEY 时回退 mock
    pub provider: String,
    /// 注册到模型路由的模型列表
    pub models: Vec<String>,
    /// 请求未指定模型或模型未注册时使用
    pub default_model: String,
    pub base_url: Option<String>,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            models: Vec::new(),
            default_model: default_model(),
            base_url: None,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    60
}

/// [engine] 段：单轮模型↔工具循环的步数上限
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    /// 未指定 Agent 时使用的目录键
    #[serde(default = "default_agent")]
    pub default_agent: String,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            default_agent: default_agent(),
        }
    }
}

fn default_max_steps() -> usize {
    12
}

fn default_agent() -> String {
    crate::agents::DEFAULT_AGENT.to_string()
}

/// [tools] 段
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

fn default_tool_timeout_secs() -> u64 {
    30
}

/// [vector_store] 段：目的地集合与种子文件
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VectorStoreSection {
    pub collection: String,
    pub seed_path: PathBuf,
    pub embedding_model: String,
}

impl Default for VectorStoreSection {
    fn default() -> Self {
        Self {
            collection: "travel_destinations".to_string(),
            seed_path: PathBuf::from("data/destinations.json"),
            embedding_model: "text-embedding-3-small".to_string(),
        }
    }
}

/// [travel_api] 段；凭据只从环境变量 AMADEUS_CLIENT_ID / AMADEUS_CLIENT_SECRET 读取
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TravelApiSection {
    pub base_url: Option<String>,
}

/// [safety] 段：Llama Guard 模型端点；未设置 model 时使用 llm.default_model
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SafetySection {
    pub model: Option<String>,
    pub base_url: Option<String>,
}

/// 从 config 目录加载配置，环境变量 ATLAS__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 ATLAS__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("ATLAS")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.engine.max_steps, 12);
        assert_eq!(cfg.tools.tool_timeout_secs, 30);
        assert_eq!(cfg.vector_store.collection, "travel_destinations");
        assert_eq!(cfg.engine.default_agent, "travel-planning-agent");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_load_from_explicit_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[engine]\nmax_steps = 4\n\n[llm]\nprovider = \"mock\"\nmodels = [\"gpt-4o\", \"gpt-4o-mini\"]"
        )
        .unwrap();
        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.engine.max_steps, 4);
        assert_eq!(cfg.llm.provider, "mock");
        assert_eq!(cfg.llm.models.len(), 2);
        assert_eq!(cfg.llm.timeouts.request, 60);
    }

    #[test]
    fn test_zero_max_steps_invalid() {
        let mut cfg = AppConfig::default();
        cfg.engine.max_steps = 0;
        assert!(matches!(cfg.validate(), Err(EngineError::Config(_))));
    }
}
