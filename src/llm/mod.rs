//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Mock / Scripted）、模型路由、嵌入

pub mod embedding;
pub mod mock;
pub mod openai;
pub mod router;
pub mod traits;

pub use embedding::{create_embedder_from_config, EmbeddingProvider, HashingEmbedder, OpenAiEmbedder};
pub use mock::{MockLlmClient, ScriptedLlmClient};
pub use openai::OpenAiClient;
pub use router::ModelRouter;
pub use traits::{CompletionRequest, LlmClient, LlmError, ToolSpec};
