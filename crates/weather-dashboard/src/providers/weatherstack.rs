use chrono::Utc;
use rand::Rng;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::model::{
    Coordinates, CurrentConditions, ForecastPoint, ForecastProvenance, ForecastSeries,
    GeocodingResult, LocationMeta, MAX_SEARCH_LIMIT, TemperatureBlock, Units, WeatherSnapshot,
    Wind,
};
use crate::rate_limit::RateLimiter;
use crate::weather_code;

use super::{ProviderError, Transport, WeatherProvider};

const PROVIDER_NAME: &str = "Weatherstack";

pub const SYNTHESIZED_POINTS: usize = 40;
pub const SYNTHESIZED_STRIDE_SECS: i64 = 3 * 3600;
const SYNTHESIZED_MAX_POP: f64 = 0.3;
/// Half-day offset used to approximate sunrise and sunset around local time.
const DAYLIGHT_HALF_SPAN_SECS: i64 = 6 * 3600;
const KMH_PER_MS: f64 = 3.6;
const METERS_PER_KM: f64 = 1000.0;
const METERS_PER_MILE: f64 = 1609.344;

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    #[serde(default)]
    error: Option<ErrorPayload>,
    #[serde(default)]
    location: Option<LocationPayload>,
    #[serde(default)]
    current: Option<CurrentPayload>,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    info: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LocationPayload {
    #[serde(default)]
    name: String,
    #[serde(default)]
    country: String,
    #[serde(default)]
    lat: Value,
    #[serde(default)]
    lon: Value,
    #[serde(default)]
    localtime_epoch: i64,
    #[serde(default)]
    utc_offset: Value,
}

#[derive(Debug, Deserialize)]
struct CurrentPayload {
    temperature: f64,
    #[serde(default)]
    weather_code: i32,
    #[serde(default)]
    weather_descriptions: Vec<String>,
    #[serde(default)]
    wind_speed: f64,
    #[serde(default)]
    wind_degree: f64,
    #[serde(default)]
    pressure: f64,
    #[serde(default)]
    humidity: f64,
    #[serde(default)]
    cloudcover: f64,
    feelslike: f64,
    #[serde(default)]
    visibility: f64,
    #[serde(default)]
    is_day: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AutocompleteResponse {
    #[serde(default)]
    results: Vec<AutocompletePayload>,
}

#[derive(Debug, Deserialize)]
struct AutocompletePayload {
    name: String,
    #[serde(default)]
    country: String,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    lat: Value,
    #[serde(default)]
    lon: Value,
}

/// Adapter for the Weatherstack `/current` endpoint.
///
/// Weatherstack reports no forecast on this tier, so the series is
/// synthesized from current conditions and tagged `Synthesized`.
#[derive(Debug)]
pub struct WeatherstackProvider<T> {
    transport: T,
    limiter: RateLimiter,
    api_key: String,
    base_url: String,
}

impl<T: Transport> WeatherstackProvider<T> {
    pub fn new(transport: T, limiter: RateLimiter, api_key: &str, base_url: &str) -> Self {
        Self {
            transport,
            limiter,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn fetch_current(&self, lat: f64, lon: f64, units: Units) -> Result<CurrentConditions, ProviderError> {
        let params = [
            ("access_key", self.api_key.clone()),
            ("query", format!("{lat},{lon}")),
            ("units", unit_param(units).to_string()),
        ];
        debug!(lat, lon, units = units.as_str(), "fetching Weatherstack current");
        let body = self
            .transport
            .get(&format!("{}/current", self.base_url), &params)?;
        parse_current_response(&body, Coordinates { lat, lon }, units)
    }

    fn try_search(&self, query: &str, limit: usize) -> Result<Vec<GeocodingResult>, ProviderError> {
        self.limiter.acquire()?;

        let params = [
            ("access_key", self.api_key.clone()),
            ("query", query.to_string()),
        ];
        let body = self
            .transport
            .get(&format!("{}/autocomplete", self.base_url), &params)?;
        parse_autocomplete_response(&body, limit)
    }
}

impl<T: Transport> WeatherProvider for WeatherstackProvider<T> {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn served_units(&self, requested: Units) -> Units {
        match requested {
            Units::Imperial => Units::Imperial,
            Units::Metric | Units::Standard => Units::Metric,
        }
    }

    fn fetch_by_coordinates(
        &self,
        lat: f64,
        lon: f64,
        units: Units,
    ) -> Result<WeatherSnapshot, ProviderError> {
        self.limiter.acquire()?;

        let current = self
            .fetch_current(lat, lon, units)
            .map_err(|error| error.with_provider(PROVIDER_NAME))?;
        let forecast = synthesize_forecast(&current, Utc::now().timestamp(), &mut rand::thread_rng());

        Ok(WeatherSnapshot { current, forecast })
    }

    fn search_by_name(&self, query: &str, limit: usize) -> Vec<GeocodingResult> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        self.try_search(query, limit).unwrap_or_else(|error| {
            warn!(%error, "Weatherstack autocomplete search failed");
            Vec::new()
        })
    }
}

/// Weatherstack has no Kelvin mode; `standard` is served in metric.
fn unit_param(units: Units) -> &'static str {
    match units {
        Units::Imperial => "f",
        Units::Metric | Units::Standard => "m",
    }
}

/// Wind speed in the canonical unit: m/s for metric, mph kept for imperial.
fn wind_speed(raw: f64, units: Units) -> f64 {
    match units {
        Units::Imperial => raw,
        Units::Metric | Units::Standard => raw / KMH_PER_MS,
    }
}

/// Visibility in meters; upstream reports km (metric) or miles (imperial).
fn visibility_meters(raw: f64, units: Units) -> f64 {
    match units {
        Units::Imperial => raw * METERS_PER_MILE,
        Units::Metric | Units::Standard => raw * METERS_PER_KM,
    }
}

fn parse_current_response(
    body: &str,
    requested: Coordinates,
    units: Units,
) -> Result<CurrentConditions, ProviderError> {
    let payload: CurrentResponse = serde_json::from_str(body)
        .map_err(|error| ProviderError::InvalidResponse(format!("current payload: {error}")))?;

    // Weatherstack reports failures inside a 200 response.
    if let Some(error) = payload.error {
        let message = error
            .info
            .map(|info| info.trim().to_string())
            .filter(|info| !info.is_empty())
            .unwrap_or_else(|| match error.code {
                Some(code) => format!("request failed with code {code}"),
                None => "request failed".to_string(),
            });
        return Err(ProviderError::Upstream {
            provider: PROVIDER_NAME,
            message,
        });
    }

    let location = payload.location.ok_or_else(|| {
        ProviderError::InvalidResponse("current payload: missing location".to_string())
    })?;
    let current = payload.current.ok_or_else(|| {
        ProviderError::InvalidResponse("current payload: missing current".to_string())
    })?;

    let is_day = current
        .is_day
        .as_deref()
        .is_none_or(|value| value.eq_ignore_ascii_case("yes"));
    let code = weather_code::from_weatherstack(current.weather_code).unwrap_or(current.weather_code);
    let condition = weather_code::condition(
        code,
        current.weather_descriptions.first().map(String::as_str),
        is_day,
    );

    Ok(CurrentConditions {
        coord: Coordinates {
            lat: loose_f64(&location.lat).unwrap_or(requested.lat),
            lon: loose_f64(&location.lon).unwrap_or(requested.lon),
        },
        weather: vec![condition],
        main: TemperatureBlock {
            temp: current.temperature,
            feels_like: current.feelslike,
            temp_min: current.temperature,
            temp_max: current.temperature,
            pressure: current.pressure,
            humidity: current.humidity,
        },
        visibility: visibility_meters(current.visibility, units),
        wind: Wind {
            speed: wind_speed(current.wind_speed, units),
            deg: current.wind_degree,
        },
        clouds: current.cloudcover,
        dt: location.localtime_epoch,
        location: LocationMeta {
            name: location.name,
            country: location.country,
            sunrise: location.localtime_epoch - DAYLIGHT_HALF_SPAN_SECS,
            sunset: location.localtime_epoch + DAYLIGHT_HALF_SPAN_SECS,
            timezone_offset: utc_offset_secs(&location.utc_offset),
        },
    })
}

fn parse_autocomplete_response(
    body: &str,
    limit: usize,
) -> Result<Vec<GeocodingResult>, ProviderError> {
    let payload: AutocompleteResponse = serde_json::from_str(body).map_err(|error| {
        ProviderError::InvalidResponse(format!("autocomplete payload: {error}"))
    })?;

    Ok(payload
        .results
        .into_iter()
        .filter_map(|item| {
            Some(GeocodingResult {
                lat: loose_f64(&item.lat)?,
                lon: loose_f64(&item.lon)?,
                name: item.name,
                country: item.country,
                state: item.region.filter(|region| !region.trim().is_empty()),
            })
        })
        .take(limit.min(MAX_SEARCH_LIMIT))
        .collect())
}

/// Fabricates a 5 day / 3 hour series around the current reading.
pub fn synthesize_forecast<R: Rng + ?Sized>(
    current: &CurrentConditions,
    start: i64,
    rng: &mut R,
) -> ForecastSeries {
    let points = (0..SYNTHESIZED_POINTS)
        .map(|index| {
            let variation = (index as f64 * 0.5).sin() * 5.0;
            ForecastPoint {
                dt: start + index as i64 * SYNTHESIZED_STRIDE_SECS,
                main: TemperatureBlock {
                    temp: current.main.temp + variation,
                    feels_like: current.main.feels_like + variation,
                    temp_min: current.main.temp_min + variation - 2.0,
                    temp_max: current.main.temp_max + variation + 2.0,
                    pressure: current.main.pressure,
                    humidity: current.main.humidity,
                },
                weather: current.weather.clone(),
                wind: current.wind,
                clouds: current.clouds,
                visibility: current.visibility,
                pop: rng.gen_range(0.0..SYNTHESIZED_MAX_POP),
            }
        })
        .collect();

    ForecastSeries {
        provenance: ForecastProvenance::Synthesized,
        points,
    }
}

fn loose_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(raw) => raw.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|parsed| parsed.is_finite())
}

fn utc_offset_secs(value: &Value) -> i32 {
    loose_f64(value)
        .map(|hours| (hours * 3600.0).round() as i32)
        .unwrap_or(0)
}
