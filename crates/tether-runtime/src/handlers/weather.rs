use serde::Deserialize;
use tether_core::{ContentBlock, ToolSpec};

use super::{HandlerError, HandlerFuture, ToolHandler};

pub const TOOL_NAME: &str = "get_weather";

pub const DEFAULT_GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
pub const DEFAULT_FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// Upstream weather APIs (Open-Meteo compatible).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherEndpoints {
    pub geocoding_url: String,
    pub forecast_url: String,
}

impl Default for WeatherEndpoints {
    fn default() -> Self {
        Self {
            geocoding_url: DEFAULT_GEOCODING_URL.into(),
            forecast_url: DEFAULT_FORECAST_URL.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Option<Vec<Place>>,
}

#[derive(Debug, Deserialize)]
struct Place {
    name: String,
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current_weather: CurrentWeather,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    temperature: f64,
    #[serde(default)]
    weathercode: u32,
}

/// Label for a WMO weather interpretation code.
pub fn condition_for_code(code: u32) -> &'static str {
    match code {
        0 => "Sunny",
        1 => "Mainly Clear",
        2 => "Partly Cloudy",
        3 => "Overcast",
        45 | 48 => "Fog",
        51 | 53 | 55 => "Drizzle",
        61 | 63 | 65 => "Rain",
        71 | 73 | 75 => "Snow",
        80..=82 => "Rain Showers",
        95 | 96 | 99 => "Thunderstorm",
        _ => "Clear",
    }
}

/// Resolves a city name to coordinates, then fetches current conditions.
pub struct WeatherLookup {
    http: reqwest::Client,
    endpoints: WeatherEndpoints,
}

impl WeatherLookup {
    pub fn new(http: reqwest::Client, endpoints: WeatherEndpoints) -> Self {
        Self { http, endpoints }
    }

    async fn geocode(&self, city: &str) -> Result<Place, HandlerError> {
        let response: GeocodingResponse = self
            .http
            .get(&self.endpoints.geocoding_url)
            .query(&[("name", city), ("count", "1")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response
            .results
            .and_then(|places| places.into_iter().next())
            .ok_or_else(|| HandlerError::NotFound(format!("City {city} not found.")))
    }

    async fn current(&self, place: &Place) -> Result<CurrentWeather, HandlerError> {
        let query = [
            ("latitude", place.latitude.to_string()),
            ("longitude", place.longitude.to_string()),
            ("current_weather", "true".to_string()),
        ];
        let response: ForecastResponse = self
            .http
            .get(&self.endpoints.forecast_url)
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.current_weather)
    }
}

impl ToolHandler for WeatherLookup {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: TOOL_NAME.into(),
            description: "Get current weather for a city.".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "city": {
                        "type": "string",
                        "description": "Name of the city (e.g., Gurgaon, Bangalore)"
                    }
                },
                "required": ["city"]
            }),
        }
    }

    fn call<'a>(&'a self, arguments: &'a serde_json::Value) -> HandlerFuture<'a> {
        Box::pin(async move {
            let city = ["city", "location"]
                .iter()
                .find_map(|key| {
                    arguments.get(*key)?.as_str().map(str::trim).filter(|c| !c.is_empty())
                })
                .ok_or(HandlerError::MissingArgument("city"))?;

            let place = self.geocode(city).await?;
            let weather = self.current(&place).await?;

            tracing::debug!(city, location = %place.name, code = weather.weathercode, "Weather resolved");

            // JSON keeps the fields easy for the model to pick apart.
            let body = serde_json::json!({
                "temp": weather.temperature,
                "condition": condition_for_code(weather.weathercode),
                "location": place.name,
            });
            Ok(vec![ContentBlock::text(body.to_string())])
        })
    }
}
