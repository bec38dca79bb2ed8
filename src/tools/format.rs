//! 结果格式化：把目的地 / 航班 / 酒店 / 机场检索结果渲染为 Markdown
//!
//! 纯函数，无 I/O；相同输入产生逐字节相同的输出。

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::tools::schema::{parse_args, schema_of};
use crate::tools::{Tool, ToolId};

const MAX_DESTINATIONS: usize = 5;
const MAX_FLIGHTS: usize = 5;
const MAX_HOTELS: usize = 5;
const MAX_AIRPORTS: usize = 3;

pub const NO_RESULTS: &str = "No search results available.";

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct FormatArgs {
    /// Output of search_destinations or search_destinations_by_criteria
    #[serde(default)]
    pub destination_results: Option<Value>,
    /// Output of search_flights
    #[serde(default)]
    pub flight_results: Option<Value>,
    /// Output of search_hotels
    #[serde(default)]
    pub hotel_results: Option<Value>,
    /// Output of get_airport_codes
    #[serde(default)]
    pub airport_results: Option<Value>,
}

fn succeeded(v: &Option<Value>) -> Option<&Value> {
    v.as_ref()
        .filter(|v| v.get("success").and_then(Value::as_bool).unwrap_or(false))
}

fn list<'a>(v: &'a Value, key: &str) -> &'a [Value] {
    v.get(key).and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[])
}

fn text<'a>(v: &'a Value, pointer: &str) -> Option<&'a str> {
    v.pointer(pointer).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn scalar(v: &Value, pointer: &str) -> String {
    match v.pointer(pointer) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => "N/A".to_string(),
    }
}

fn render_destinations(out: &mut Vec<String>, results: &Value) {
    out.push("## 🌍 Destinations".to_string());
    let items = list(results, "results");
    if items.is_empty() {
        out.push("No destinations found for the specified criteria.".to_string());
        return;
    }
    for item in items.iter().take(MAX_DESTINATIONS) {
        let label = text(item, "/label").unwrap_or("Unknown");
        match text(item, "/metadata/country") {
            Some(country) => out.push(format!("### {label}, {country}")),
            None => out.push(format!("### {label}")),
        }
        if let Some(desc) = text(item, "/metadata/description") {
            out.push(desc.to_string());
        }
        if let Some(famous) = text(item, "/metadata/famous_for") {
            out.push(format!("- **Famous for**: {famous}"));
        }
        if let Some(best) = text(item, "/metadata/best_time_to_travel") {
            out.push(format!("- **Best time to travel**: {best}"));
        }
        if let Some(score) = item.get("score").and_then(Value::as_f64) {
            out.push(format!("- **Match**: {:.0}%", score * 100.0));
        }
        out.push(String::new());
    }
}

fn render_flights(out: &mut Vec<String>, results: &Value) {
    out.push("## ✈️ Flight Search Results".to_string());
    let flights = list(results, "flights");
    if flights.is_empty() {
        out.push("No flights found for the specified criteria.".to_string());
        return;
    }
    let params = results.get("search_params").cloned().unwrap_or(Value::Null);
    for (i, flight) in flights.iter().take(MAX_FLIGHTS).enumerate() {
        out.push(format!("### Flight {}", i + 1));
        out.push(format!(
            "- **Route**: {} → {}",
            scalar(&params, "/origin"),
            scalar(&params, "/destination")
        ));
        out.push(format!("- **Date**: {}", scalar(&params, "/departure_date")));
        if let Some(ret) = text(&params, "/return_date") {
            out.push(format!("- **Return**: {ret}"));
        }
        out.push(format!("- **Passengers**: {} adults", scalar(&params, "/adults")));
        if flight.pointer("/price/total").is_some() {
            out.push(format!(
                "- **Price**: {} {}",
                scalar(flight, "/price/total"),
                scalar(flight, "/price/currency")
            ));
        }
        if let Some(carrier) = text(flight, "/itineraries/0/segments/0/carrierCode") {
            out.push(format!("- **Carrier**: {carrier}"));
        }
        out.push(String::new());
    }
}

fn render_hotels(out: &mut Vec<String>, results: &Value) {
    out.push("## 🏨 Hotel Search Results".to_string());
    let hotels = list(results, "hotels");
    if hotels.is_empty() {
        out.push("No hotels found for the specified criteria.".to_string());
        return;
    }
    let params = results.get("search_params").cloned().unwrap_or(Value::Null);
    for (i, hotel) in hotels.iter().take(MAX_HOTELS).enumerate() {
        match text(hotel, "/hotel/name") {
            Some(name) => out.push(format!("### Hotel {}: {name}", i + 1)),
            None => out.push(format!("### Hotel {}", i + 1)),
        }
        out.push(format!("- **Location**: {}", scalar(&params, "/city_code")));
        out.push(format!("- **Check-in**: {}", scalar(&params, "/check_in")));
        out.push(format!("- **Check-out**: {}", scalar(&params, "/check_out")));
        out.push(format!(
            "- **Guests**: {} adults, {} rooms",
            scalar(&params, "/adults"),
            scalar(&params, "/rooms")
        ));
        if hotel.pointer("/offers/0/price/total").is_some() {
            out.push(format!(
                "- **Price**: {} {}",
                scalar(hotel, "/offers/0/price/total"),
                scalar(hotel, "/offers/0/price/currency")
            ));
        }
        out.push(String::new());
    }
}

fn render_airports(out: &mut Vec<String>, results: &Value) {
    out.push("## 🛫 Airport Information".to_string());
    let airports = list(results, "airports");
    if airports.is_empty() {
        out.push("No airports found for the specified criteria.".to_string());
        return;
    }
    for airport in airports.iter().take(MAX_AIRPORTS) {
        out.push(format!(
            "- **{}** ({})",
            text(airport, "/name").unwrap_or("Unknown"),
            text(airport, "/iataCode").unwrap_or("N/A")
        ));
        out.push(format!(
            "  - {}, {}",
            text(airport, "/address/cityName").unwrap_or("Unknown City"),
            text(airport, "/address/countryName").unwrap_or("Unknown Country")
        ));
    }
}

/// 渲染全部成功的检索结果；失败或缺省的部分跳过，全部缺省时返回固定提示
pub fn format_travel_results(args: &FormatArgs) -> String {
    let mut out = Vec::new();
    if let Some(v) = succeeded(&args.destination_results) {
        render_destinations(&mut out, v);
    }
    if let Some(v) = succeeded(&args.flight_results) {
        render_flights(&mut out, v);
    }
    if let Some(v) = succeeded(&args.hotel_results) {
        render_hotels(&mut out, v);
    }
    if let Some(v) = succeeded(&args.airport_results) {
        render_airports(&mut out, v);
    }
    if out.is_empty() {
        return NO_RESULTS.to_string();
    }
    out.join("\n")
}

pub struct FormatTravelResultsTool;

#[async_trait]
impl Tool for FormatTravelResultsTool {
    fn id(&self) -> ToolId {
        ToolId::FormatTravelResults
    }

    fn description(&self) -> &str {
        "Format destination, flight, hotel and airport search results into readable markdown."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<FormatArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let args: FormatArgs = parse_args(args)?;
        Ok(json!({
            "success": true,
            "markdown": format_travel_results(&args),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_args() -> Value {
        json!({
            "destination_results": {
                "success": true,
                "results": [{
                    "label": "Algarve",
                    "metadata": {"country": "Portugal", "famous_for": "beaches, cliffs"},
                    "score": 0.82
                }]
            },
            "flight_results": {
                "success": true,
                "flights": [{"price": {"total": "199.00", "currency": "EUR"}}],
                "search_params": {"origin": "LHR", "destination": "FAO", "departure_date": "2025-07-01", "adults": 2}
            },
            "hotel_results": {"success": false, "message": "Travel API not available.", "hotels": []}
        })
    }

    #[tokio::test]
    async fn test_format_is_idempotent() {
        let tool = FormatTravelResultsTool;
        let a = tool.execute(sample_args()).await.unwrap();
        let b = tool.execute(sample_args()).await.unwrap();
        assert_eq!(a["markdown"].as_str().unwrap().as_bytes(), b["markdown"].as_str().unwrap().as_bytes());
    }

    #[test]
    fn test_format_skips_failed_sections() {
        let args: FormatArgs = serde_json::from_value(sample_args()).unwrap();
        let md = format_travel_results(&args);
        assert!(md.contains("### Algarve, Portugal"));
        assert!(md.contains("- **Match**: 82%"));
        assert!(md.contains("- **Route**: LHR → FAO"));
        assert!(md.contains("- **Price**: 199.00 EUR"));
        assert!(!md.contains("Hotel"));
    }

    #[test]
    fn test_format_empty_input() {
        assert_eq!(format_travel_results(&FormatArgs::default()), NO_RESULTS);
    }

    #[test]
    fn test_airports_missing_fields() {
        let args = FormatArgs {
            airport_results: Some(json!({"success": true, "airports": [{"iataCode": "LIS"}]})),
            ..Default::default()
        };
        let md = format_travel_results(&args);
        assert!(md.contains("- **Unknown** (LIS)"));
        assert!(md.contains("Unknown City, Unknown Country"));
    }
}
