//! Amadeus Self-Service API 客户端
//!
//! 认证：OAuth2 client credentials，token 缓存至过期前 60 秒。
//! 凭据来自环境变量 AMADEUS_CLIENT_ID / AMADEUS_CLIENT_SECRET。

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;

use super::{FlightQuery, HotelQuery, LocationKind, TravelApi, TravelApiError};

pub const DEFAULT_BASE_URL: &str = "https://test.api.amadeus.com";

/// 酒店报价接口单次最多查询的酒店数
const MAX_HOTEL_IDS: usize = 20;
const MAX_FLIGHT_OFFERS: u32 = 10;
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    1799
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

pub struct AmadeusClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<CachedToken>>,
}

impl AmadeusClient {
    pub fn new(
        base_url: Option<&str>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, TravelApiError> {
        let client_id = client_id.into();
        let client_secret = client_secret.into();
        if client_id.trim().is_empty() || client_secret.trim().is_empty() {
            return Err(TravelApiError::MissingCredentials(
                "client id and secret must be non-empty".to_string(),
            ));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| TravelApiError::Network(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            client_id,
            client_secret,
            token: Mutex::new(None),
        })
    }

    /// 从 AMADEUS_CLIENT_ID / AMADEUS_CLIENT_SECRET 创建
    pub fn from_env(base_url: Option<&str>, timeout_secs: u64) -> Result<Self, TravelApiError> {
        let id = std::env::var("AMADEUS_CLIENT_ID")
            .map_err(|_| TravelApiError::MissingCredentials("AMADEUS_CLIENT_ID not set".to_string()))?;
        let secret = std::env::var("AMADEUS_CLIENT_SECRET").map_err(|_| {
            TravelApiError::MissingCredentials("AMADEUS_CLIENT_SECRET not set".to_string())
        })?;
        Self::new(base_url, id, secret, timeout_secs)
    }

    async fn access_token(&self) -> Result<String, TravelApiError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() + TOKEN_REFRESH_MARGIN < token.expires_at {
                return Ok(token.value.clone());
            }
        }
        let url = format!("{}/v1/security/oauth2/token", self.base_url);
        let resp = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| TravelApiError::Network(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TravelApiError::Auth(format!("{}: {}", status.as_u16(), body)));
        }
        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| TravelApiError::MalformedResponse(e.to_string()))?;
        tracing::debug!(expires_in = token.expires_in, "amadeus token refreshed");
        let value = token.access_token.clone();
        *cached = Some(CachedToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(value)
    }

    /// 带 bearer token 的 GET，返回响应中的 `data` 数组
    async fn get_data(&self, path: &str, query: &[(&str, String)]) -> Result<Vec<Value>, TravelApiError> {
        let token = self.access_token().await?;
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .query(query)
            .send()
            .await
            .map_err(|e| TravelApiError::Network(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TravelApiError::Http {
                status: status.as_u16(),
                body,
            });
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| TravelApiError::MalformedResponse(e.to_string()))?;
        extract_data(body)
    }
}

fn extract_data(body: Value) -> Result<Vec<Value>, TravelApiError> {
    match body.get("data") {
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(Value::Null) | None => Ok(Vec::new()),
        Some(other) => Err(TravelApiError::MalformedResponse(format!(
            "expected data array, got {other}"
        ))),
    }
}

fn flight_params(q: &FlightQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("originLocationCode", q.origin.to_uppercase()),
        ("destinationLocationCode", q.destination.to_uppercase()),
        ("departureDate", q.departure_date.clone()),
        ("adults", q.adults.max(1).to_string()),
        ("travelClass", q.travel_class.to_uppercase()),
        ("max", MAX_FLIGHT_OFFERS.to_string()),
    ];
    if let Some(ret) = &q.return_date {
        params.push(("returnDate", ret.clone()));
    }
    if q.children > 0 {
        params.push(("children", q.children.to_string()));
    }
    if q.infants > 0 {
        params.push(("infants", q.infants.to_string()));
    }
    params
}

#[async_trait]
impl TravelApi for AmadeusClient {
    async fn search_flights(&self, query: &FlightQuery) -> Result<Vec<Value>, TravelApiError> {
        self.get_data("/v2/shopping/flight-offers", &flight_params(query)).await
    }

    async fn search_hotels(&self, query: &HotelQuery) -> Result<Vec<Value>, TravelApiError> {
        let hotels = self
            .get_data(
                "/v1/reference-data/locations/hotels/by-city",
                &[("cityCode", query.city_code.to_uppercase())],
            )
            .await?;
        let ids: Vec<&str> = hotels
            .iter()
            .filter_map(|h| h.get("hotelId").and_then(Value::as_str))
            .take(MAX_HOTEL_IDS)
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.get_data(
            "/v3/shopping/hotel-offers",
            &[
                ("hotelIds", ids.join(",")),
                ("checkInDate", query.check_in.clone()),
                ("checkOutDate", query.check_out.clone()),
                ("adults", query.adults.max(1).to_string()),
                ("roomQuantity", query.rooms.max(1).to_string()),
                ("currency", query.currency.to_uppercase()),
            ],
        )
        .await
    }

    async fn search_locations(
        &self,
        keyword: &str,
        kind: LocationKind,
    ) -> Result<Vec<Value>, TravelApiError> {
        self.get_data(
            "/v1/reference-data/locations",
            &[
                ("subType", kind.as_str().to_string()),
                ("keyword", keyword.to_string()),
            ],
        )
        .await
    }
}
