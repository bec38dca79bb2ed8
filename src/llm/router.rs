//! 模型路由器
//!
//! 按模型标识选择客户端：请求的模型已注册则使用之，否则回退到默认模型（config 中的 default_model）。

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{LlmClient, LlmError};

/// 模型标识 → 客户端
pub struct ModelRouter {
    models: BTreeMap<String, Arc<dyn LlmClient>>,
    default_model: String,
}

impl ModelRouter {
    pub fn new(default_model: impl Into<String>) -> Self {
        Self {
            models: BTreeMap::new(),
            default_model: default_model.into(),
        }
    }

    pub fn add_model(&mut self, name: impl Into<String>, client: Arc<dyn LlmClient>) {
        self.models.insert(name.into(), client);
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn model_names(&self) -> Vec<String> {
        self.models.keys().cloned().collect()
    }

    /// 解析模型：未指定或未注册时回退默认模型；默认模型也缺失则报错
    pub fn resolve(&self, requested: Option<&str>) -> Result<Arc<dyn LlmClient>, LlmError> {
        let name = match requested {
            Some(name) if self.models.contains_key(name) => name,
            Some(name) => {
                tracing::warn!(requested = %name, fallback = %self.default_model, "unknown model, using default");
                self.default_model.as_str()
            }
            None => self.default_model.as_str(),
        };
        self.models
            .get(name)
            .cloned()
            .ok_or_else(|| LlmError::ApiError(format!("No model available: {name}")))
    }
}
