//! 记忆层：消息模型与只追加的对话历史

pub mod conversation;

pub use conversation::{ConversationHistory, Message, Role, ToolCall};
