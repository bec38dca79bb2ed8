//! 编排状态：单轮内由引擎节点独占修改
//!
//! 持有只追加的对话历史、当前安全判定、步数预算、阶段标签，以及阶段相关的旁路数据
//! （destination_info / package_info / airports_info），后者由工具结果写入、由指令渲染读取。

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::StepBudget;
use crate::memory::{ConversationHistory, Message};
use crate::safety::SafetyVerdict;

/// 路由阶段：决定指令与工具子集
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    GenericPlanning,
    DestinationResearch,
    PackageSearch,
    Booking,
}

impl Phase {
    pub const ALL: [Phase; 4] = [
        Phase::GenericPlanning,
        Phase::DestinationResearch,
        Phase::PackageSearch,
        Phase::Booking,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::GenericPlanning => "generic-planning",
            Phase::DestinationResearch => "destination-research",
            Phase::PackageSearch => "package-search",
            Phase::Booking => "booking",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "generic-planning" | "planning" => Ok(Phase::GenericPlanning),
            "destination-research" | "destination" => Ok(Phase::DestinationResearch),
            "package-search" | "package" => Ok(Phase::PackageSearch),
            "booking" => Ok(Phase::Booking),
            other => Err(format!("unknown phase: {other}")),
        }
    }
}

/// 旁路数据键
pub const DESTINATION_INFO: &str = "destination_info";
pub const PACKAGE_INFO: &str = "package_info";
pub const AIRPORTS_INFO: &str = "airports_info";

/// 单轮编排状态
#[derive(Debug, Clone)]
pub struct OrchestrationState {
    history: ConversationHistory,
    /// 本轮第一条消息在历史中的下标（之前为先前轮次的历史）
    turn_start: usize,
    safety: Option<SafetyVerdict>,
    budget: StepBudget,
    phase: Phase,
    side_channel: BTreeMap<String, Value>,
}

impl OrchestrationState {
    /// 新建一轮：先前历史（可为空）+ 本轮用户消息
    pub fn new(phase: Phase, max_steps: usize, prior: Vec<Message>, user_message: Message) -> Self {
        let mut history = ConversationHistory::from_messages(prior);
        let turn_start = history.len();
        history.push(user_message);
        Self {
            history,
            turn_start,
            safety: None,
            budget: StepBudget::new(max_steps),
            phase,
            side_channel: BTreeMap::new(),
        }
    }

    pub fn messages(&self) -> &[Message] {
        self.history.messages()
    }

    /// 本轮追加的消息（含本轮用户输入）
    pub fn turn_messages(&self) -> &[Message] {
        &self.history.messages()[self.turn_start..]
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.history.last()
    }

    pub(crate) fn append(&mut self, msg: Message) {
        self.history.push(msg);
    }

    pub fn safety(&self) -> Option<&SafetyVerdict> {
        self.safety.as_ref()
    }

    pub(crate) fn set_safety(&mut self, verdict: SafetyVerdict) {
        self.safety = Some(verdict);
    }

    pub fn remaining_steps(&self) -> usize {
        self.budget.remaining()
    }

    pub fn budget(&self) -> &StepBudget {
        &self.budget
    }

    pub(crate) fn budget_mut(&mut self) -> &mut StepBudget {
        &mut self.budget
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn side_channel(&self) -> &BTreeMap<String, Value> {
        &self.side_channel
    }

    /// 在 key 对应的对象下记录某个工具的最新结果
    pub(crate) fn record_side_data(&mut self, key: &str, tool: &str, value: Value) {
        let entry = self
            .side_channel
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Default::default()));
        if let Value::Object(map) = entry {
            map.insert(tool.to_string(), value);
        }
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.history.into_messages()
    }
}
