//! 编排过程事件：用于流式展示节点转移、工具调用与终态

use serde::Serialize;

use crate::core::engine::Node;

/// 单步过程事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// 进入某个节点
    NodeEntered { node: Node },
    /// 模型调用完成，预算已递减
    StepUpdate { remaining: usize, max_steps: usize },
    /// 安全判定（role 为 User 或 Agent）
    SafetyChecked { role: String, safe: bool },
    /// 调用工具
    ToolCall {
        id: String,
        tool: String,
        args: serde_json::Value,
    },
    /// 工具返回
    ToolResult { id: String, tool: String, success: bool },
    /// 预算不足，丢弃工具调用并给出部分回答
    BudgetFallback { discarded_calls: usize },
    /// 内容被安全策略拦截
    SafetyBlocked { categories: Vec<String> },
    /// 本轮结束
    Done { steps_used: usize },
}
