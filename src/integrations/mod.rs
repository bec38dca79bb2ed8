//! 外部集成：旅行预订 API（航班、酒店、机场/城市代码）
//!
//! 引擎只通过 TravelApi trait 消费；AmadeusClient 为自带实现（OAuth2 client credentials）。

pub mod amadeus;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use amadeus::AmadeusClient;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TravelApiError {
    #[error("missing credentials: {0}")]
    MissingCredentials(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("request failed: {0}")]
    Network(String),
    #[error("API error {status}: {body}")]
    Http { status: u16, body: String },
    #[error("unexpected response: {0}")]
    MalformedResponse(String),
}

/// 航班检索条件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FlightQuery {
    /// Origin airport or city IATA code, e.g. "NYC"
    pub origin: String,
    /// Destination airport or city IATA code, e.g. "PAR"
    pub destination: String,
    /// Departure date, YYYY-MM-DD
    pub departure_date: String,
    /// Return date, YYYY-MM-DD; omit for one-way
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_date: Option<String>,
    #[serde(default = "default_flight_adults")]
    pub adults: u32,
    #[serde(default)]
    pub children: u32,
    #[serde(default)]
    pub infants: u32,
    /// ECONOMY, PREMIUM_ECONOMY, BUSINESS or FIRST
    #[serde(default = "default_travel_class")]
    pub travel_class: String,
}

fn default_flight_adults() -> u32 {
    1
}

fn default_travel_class() -> String {
    "ECONOMY".to_string()
}

/// 酒店检索条件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HotelQuery {
    /// City IATA code, e.g. "PAR"
    pub city_code: String,
    /// Check-in date, YYYY-MM-DD
    pub check_in: String,
    /// Check-out date, YYYY-MM-DD
    pub check_out: String,
    #[serde(default = "default_hotel_adults")]
    pub adults: u32,
    #[serde(default = "default_rooms")]
    pub rooms: u32,
    /// Currency code, e.g. USD, EUR
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_hotel_adults() -> u32 {
    2
}

fn default_rooms() -> u32 {
    1
}

fn default_currency() -> String {
    "USD".to_string()
}

/// 地点检索的子类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationKind {
    Airport,
    City,
}

impl LocationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationKind::Airport => "AIRPORT",
            LocationKind::City => "CITY",
        }
    }
}

/// 旅行预订 API；返回值为供应方的原始 JSON 数组
#[async_trait]
pub trait TravelApi: Send + Sync {
    async fn search_flights(&self, query: &FlightQuery) -> Result<Vec<Value>, TravelApiError>;

    async fn search_hotels(&self, query: &HotelQuery) -> Result<Vec<Value>, TravelApiError>;

    async fn search_locations(
        &self,
        keyword: &str,
        kind: LocationKind,
    ) -> Result<Vec<Value>, TravelApiError>;
}
