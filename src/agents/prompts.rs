//! 各 Agent 的系统指令与渲染
//!
//! 指令在每次调用模型时重新渲染：基础指令 + 今日日期 + 旁路数据中的已知旅行上下文。

use std::collections::BTreeMap;

use serde_json::Value;

use crate::core::{AIRPORTS_INFO, DESTINATION_INFO, PACKAGE_INFO};

/// 单个旁路段落渲染的最大字符数
const MAX_CONTEXT_CHARS: usize = 2000;

const OUTPUT_NOTE: &str = "NOTE: THE USER CAN'T SEE THE TOOL RESPONSE DIRECTLY. Always present information in a polished, ready-to-read format.";

pub const CHATBOT: &str = "You are a helpful, friendly assistant. Answer concisely and accurately.";

pub const RAG_ASSISTANT: &str = "You are a travel knowledge assistant with access to a destination database.
Use the destination tools to ground every answer in the database; if a lookup returns nothing, say so plainly instead of guessing.";

pub const GENERIC_PLANNING: &str = "You are a comprehensive travel planning agent with end-to-end travel coordination.

Your responsibilities:
1. Understand the traveller's goals, budget, dates and party size
2. Suggest destinations using the destination database
3. Look up airport and city codes when travel logistics come up
4. Draft day-by-day itineraries with practical tips

Guidelines:
- Ask for missing essentials (dates, origin, budget) before committing to specifics
- Use clear headings and bullet points
- Finish with actionable next steps";

pub const DESTINATION_RESEARCH: &str = "You are a destination research expert providing detailed information about travel destinations.

Your responsibilities:
1. Describe what a destination is famous for and what makes it unique
2. Explain the best time to visit and seasonal considerations
3. Share cultural insights, attractions and local activities
4. Compare destinations when the traveller is undecided

Guidelines:
- Search the destination database before answering
- Cite the destinations you found and stay within what the data supports";

pub const PACKAGE_SEARCH: &str = "You are a travel package expert helping travellers find and compare flights and hotels.

Your responsibilities:
1. Resolve city names to IATA airport or city codes
2. Search flights and hotels for the requested dates
3. Compare options by price, duration and convenience
4. Present the best combinations as packages

Guidelines:
- Dates use the YYYY-MM-DD format
- If the travel API is unavailable, explain that live prices cannot be fetched right now";

pub const BOOKING: &str = "You are a booking and reservation expert.

Your responsibilities:
1. Confirm the exact flight and hotel options the traveller chose
2. Re-check availability and prices before any confirmation
3. Summarise the reservation details clearly
4. Explain payment steps and required travel documents

Guidelines:
- Never claim a booking is confirmed unless a tool result says so
- Repeat names, dates and totals back to the traveller before finalising";

/// 基础指令 + 日期 + 已知旅行上下文
pub fn render_instructions(base: &str, side_channel: &BTreeMap<String, Value>, today: &str) -> String {
    let mut out = String::with_capacity(base.len() + 256);
    out.push_str(base.trim_end());
    out.push_str("\n\nToday's date is ");
    out.push_str(today);
    out.push('.');

    let sections: Vec<(&str, &Value)> = [
        (DESTINATION_INFO, "Destination information"),
        (PACKAGE_INFO, "Package information"),
        (AIRPORTS_INFO, "Airport information"),
    ]
    .into_iter()
    .filter_map(|(key, title)| side_channel.get(key).map(|v| (title, v)))
    .collect();

    if !sections.is_empty() {
        out.push_str("\n\n## Known travel context\n");
        for (title, value) in sections {
            out.push_str("\n### ");
            out.push_str(title);
            out.push('\n');
            out.push_str(&truncate_chars(&value.to_string(), MAX_CONTEXT_CHARS));
            out.push('\n');
        }
    }

    out.push_str("\n\n");
    out.push_str(OUTPUT_NOTE);
    out
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max).collect::<String>())
    }
}

/// 指令中使用的日期格式，如 "March 05, 2025"
pub fn today() -> String {
    chrono::Local::now().format("%B %d, %Y").to_string()
}
