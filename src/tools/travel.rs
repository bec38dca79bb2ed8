//! 旅行预订工具：航班、酒店、机场代码、城市代码
//!
//! 未配置 TravelApi（缺少凭据）时返回失败结果而不是报错。

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::integrations::{FlightQuery, HotelQuery, LocationKind, TravelApi};
use crate::tools::schema::{parse_args, schema_of};
use crate::tools::{Tool, ToolId};

pub const API_UNAVAILABLE_MESSAGE: &str = "Travel API not available. Please check API credentials.";

fn unavailable(list_key: &str) -> Value {
    json!({
        "success": false,
        "message": API_UNAVAILABLE_MESSAGE,
        list_key: [],
    })
}

fn api_failure(what: &str, list_key: &str, e: impl std::fmt::Display) -> Value {
    tracing::warn!(error = %e, "{what} failed");
    json!({
        "success": false,
        "message": format!("Error searching {what}: {e}"),
        list_key: [],
    })
}

pub struct SearchFlightsTool {
    api: Option<Arc<dyn TravelApi>>,
}

impl SearchFlightsTool {
    pub fn new(api: Option<Arc<dyn TravelApi>>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Tool for SearchFlightsTool {
    fn id(&self) -> ToolId {
        ToolId::SearchFlights
    }

    fn description(&self) -> &str {
        "Search flight offers between two airport or city codes on given dates."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<FlightQuery>()
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let query: FlightQuery = parse_args(args)?;
        let Some(api) = &self.api else {
            return Ok(unavailable("flights"));
        };
        Ok(match api.search_flights(&query).await {
            Ok(flights) => json!({
                "success": true,
                "message": format!(
                    "Found {} flights from {} to {}",
                    flights.len(),
                    query.origin,
                    query.destination
                ),
                "flights": flights,
                "search_params": query,
            }),
            Err(e) => api_failure("flights", "flights", e),
        })
    }
}

pub struct SearchHotelsTool {
    api: Option<Arc<dyn TravelApi>>,
}

impl SearchHotelsTool {
    pub fn new(api: Option<Arc<dyn TravelApi>>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Tool for SearchHotelsTool {
    fn id(&self) -> ToolId {
        ToolId::SearchHotels
    }

    fn description(&self) -> &str {
        "Search hotel offers in a city (IATA city code) for check-in and check-out dates."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<HotelQuery>()
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let query: HotelQuery = parse_args(args)?;
        let Some(api) = &self.api else {
            return Ok(unavailable("hotels"));
        };
        Ok(match api.search_hotels(&query).await {
            Ok(hotels) => json!({
                "success": true,
                "message": format!("Found {} hotels in {}", hotels.len(), query.city_code),
                "hotels": hotels,
                "search_params": query,
            }),
            Err(e) => api_failure("hotels", "hotels", e),
        })
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CityNameArgs {
    /// City name, e.g. "Lisbon"
    pub city_name: String,
}

/// 机场 / 城市代码查询（同一接口，不同子类型）
pub struct LocationCodesTool {
    api: Option<Arc<dyn TravelApi>>,
    kind: LocationKind,
}

impl LocationCodesTool {
    pub fn airports(api: Option<Arc<dyn TravelApi>>) -> Self {
        Self {
            api,
            kind: LocationKind::Airport,
        }
    }

    pub fn cities(api: Option<Arc<dyn TravelApi>>) -> Self {
        Self {
            api,
            kind: LocationKind::City,
        }
    }

    fn list_key(&self) -> &'static str {
        match self.kind {
            LocationKind::Airport => "airports",
            LocationKind::City => "cities",
        }
    }
}

#[async_trait]
impl Tool for LocationCodesTool {
    fn id(&self) -> ToolId {
        match self.kind {
            LocationKind::Airport => ToolId::GetAirportCodes,
            LocationKind::City => ToolId::GetCityCodes,
        }
    }

    fn description(&self) -> &str {
        match self.kind {
            LocationKind::Airport => "Look up airport IATA codes for a city name.",
            LocationKind::City => "Look up city IATA codes for a city name.",
        }
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<CityNameArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let args: CityNameArgs = parse_args(args)?;
        let key = self.list_key();
        let Some(api) = &self.api else {
            return Ok(unavailable(key));
        };
        Ok(match api.search_locations(&args.city_name, self.kind).await {
            Ok(items) => json!({
                "success": true,
                "message": format!("Found {} {} for {}", items.len(), key, args.city_name),
                key: items,
            }),
            Err(e) => api_failure(key, key, e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::TravelApiError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeApi {
        fail: bool,
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TravelApi for FakeApi {
        async fn search_flights(&self, q: &FlightQuery) -> Result<Vec<Value>, TravelApiError> {
            self.queries.lock().unwrap().push(format!("{}-{}", q.origin, q.destination));
            if self.fail {
                return Err(TravelApiError::Http {
                    status: 500,
                    body: "boom".to_string(),
                });
            }
            Ok(vec![json!({"id": "1", "price": {"total": "420.00", "currency": "EUR"}})])
        }

        async fn search_hotels(&self, _q: &HotelQuery) -> Result<Vec<Value>, TravelApiError> {
            Ok(vec![])
        }

        async fn search_locations(
            &self,
            keyword: &str,
            kind: LocationKind,
        ) -> Result<Vec<Value>, TravelApiError> {
            Ok(vec![json!({"name": keyword.to_uppercase(), "subType": kind.as_str()})])
        }
    }

    fn flight_args() -> Value {
        json!({"origin": "LIS", "destination": "CDG", "departure_date": "2025-05-01"})
    }

    #[tokio::test]
    async fn test_missing_api_is_structured_failure() {
        let out = SearchFlightsTool::new(None).execute(flight_args()).await.unwrap();
        assert_eq!(out["success"], false);
        assert_eq!(out["message"], API_UNAVAILABLE_MESSAGE);
        assert_eq!(out["flights"], json!([]));
    }

    #[tokio::test]
    async fn test_flights_defaults_and_params() {
        let api = Arc::new(FakeApi::default());
        let out = SearchFlightsTool::new(Some(api.clone())).execute(flight_args()).await.unwrap();
        assert_eq!(out["success"], true);
        assert_eq!(out["search_params"]["adults"], 1);
        assert_eq!(out["search_params"]["travel_class"], "ECONOMY");
        assert_eq!(out["flights"].as_array().unwrap().len(), 1);
        assert_eq!(api.queries.lock().unwrap().as_slice(), ["LIS-CDG"]);
    }

    #[tokio::test]
    async fn test_api_error_is_structured_failure() {
        let api = Arc::new(FakeApi {
            fail: true,
            ..Default::default()
        });
        let out = SearchFlightsTool::new(Some(api)).execute(flight_args()).await.unwrap();
        assert_eq!(out["success"], false);
        assert!(out["message"].as_str().unwrap().contains("500"));
    }

    #[tokio::test]
    async fn test_location_tools_use_their_kind() {
        let api: Arc<dyn TravelApi> = Arc::new(FakeApi::default());
        let airports = LocationCodesTool::airports(Some(api.clone()));
        let cities = LocationCodesTool::cities(Some(api));
        assert_eq!(airports.id(), ToolId::GetAirportCodes);
        let out = cities.execute(json!({"city_name": "lisbon"})).await.unwrap();
        assert_eq!(out["cities"][0]["subType"], "CITY");
        assert_eq!(out["cities"][0]["name"], "LISBON");
    }

    #[tokio::test]
    async fn test_invalid_args_rejected() {
        let r = SearchHotelsTool::new(None).execute(json!({"city_code": "PAR"})).await;
        assert!(r.is_err());
    }
}
