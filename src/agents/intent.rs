//! 意图路由：按关键词规则把会话的第一条用户消息映射到旅行阶段
//!
//! 规则按顺序检查（预订 → 套餐 → 目的地 → 规划），首个命中即返回，均未命中时为通用规划。
//! 纯函数，相同输入总是得到相同阶段；一个回合内不重新路由。

use regex::Regex;

use crate::core::Phase;

/// (阶段, 整词匹配的关键词模式)，顺序即优先级
const RULES: &[(Phase, &str)] = &[
    (
        Phase::Booking,
        r"\b(book|booking|bookings|reserve|reservation|reservations|confirm|confirmation|payment|pay for)\b",
    ),
    (
        Phase::PackageSearch,
        r"\b(package|packages|deal|deals|flight|flights|hotel|hotels|price|prices|pricing|bundle|all inclusive)\b",
    ),
    (
        Phase::DestinationResearch,
        r"\b(tell me about|best time|visit|attractions|culture|cultural|weather|things to do)\b",
    ),
    (Phase::GenericPlanning, r"\b(plan|planning|itinerary|trip)\b"),
];

/// 小写、连字符与空白折叠为单个空格
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .replace('-', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct IntentRouter {
    rules: Vec<(Phase, Regex)>,
}

impl IntentRouter {
    pub fn new() -> Self {
        let rules = RULES
            .iter()
            .filter_map(|(phase, pattern)| match Regex::new(pattern) {
                Ok(re) => Some((*phase, re)),
                Err(e) => {
                    tracing::error!(phase = %phase, error = %e, "invalid intent pattern");
                    None
                }
            })
            .collect();
        Self { rules }
    }

    /// 对初始用户消息分类
    pub fn classify(&self, initial_user_message: &str) -> Phase {
        let text = normalize(initial_user_message);
        let phase = self
            .rules
            .iter()
            .find(|(_, re)| re.is_match(&text))
            .map(|(phase, _)| *phase)
            .unwrap_or(Phase::GenericPlanning);
        tracing::info!(phase = %phase, "intent routed");
        phase
    }
}

impl Default for IntentRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_beats_package() {
        let router = IntentRouter::new();
        assert_eq!(
            router.classify("I want to book a 5-night package to Goa"),
            Phase::Booking
        );
    }

    #[test]
    fn test_destination_research() {
        let router = IntentRouter::new();
        assert_eq!(
            router.classify("Tell me about Kyoto in autumn"),
            Phase::DestinationResearch
        );
        assert_eq!(
            router.classify("What's the best time to visit Bali?"),
            Phase::DestinationResearch
        );
    }

    #[test]
    fn test_package_and_planning() {
        let router = IntentRouter::new();
        assert_eq!(router.classify("Show me travel DEALS for Lisbon"), Phase::PackageSearch);
        assert_eq!(router.classify("Find an all-inclusive resort"), Phase::PackageSearch);
        assert_eq!(router.classify("Help me plan a trip to Peru"), Phase::GenericPlanning);
        assert_eq!(router.classify("hello there"), Phase::GenericPlanning);
    }

    #[test]
    fn test_whole_word_only() {
        let router = IntentRouter::new();
        // "notebook" 不含整词 book，"visitor" 不含整词 visit
        assert_eq!(router.classify("my notebook for the visitors"), Phase::GenericPlanning);
    }

    #[test]
    fn test_deterministic() {
        let router = IntentRouter::new();
        let msg = "Any flights and hotels in Rome?";
        assert_eq!(router.classify(msg), router.classify(msg));
        assert_eq!(router.classify(msg), Phase::PackageSearch);
    }
}
