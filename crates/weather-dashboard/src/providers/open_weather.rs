use serde::Deserialize;
use tracing::{debug, warn};

use crate::model::{
    Coordinates, CurrentConditions, ForecastPoint, ForecastProvenance, ForecastSeries,
    GeocodingResult, LocationMeta, MAX_SEARCH_LIMIT, TemperatureBlock, Units, WeatherCondition,
    WeatherSnapshot, Wind,
};
use crate::rate_limit::RateLimiter;
use crate::weather_code;

use super::{ProviderError, Transport, WeatherProvider};

const PROVIDER_NAME: &str = "OpenWeather";

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    coord: CoordPayload,
    #[serde(default)]
    weather: Vec<ConditionPayload>,
    main: MainPayload,
    #[serde(default)]
    visibility: Option<f64>,
    #[serde(default)]
    wind: WindPayload,
    #[serde(default)]
    clouds: CloudsPayload,
    dt: i64,
    #[serde(default)]
    sys: SysPayload,
    #[serde(default)]
    timezone: i32,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct CoordPayload {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct ConditionPayload {
    id: i32,
    #[serde(default)]
    description: String,
    #[serde(default)]
    icon: String,
}

#[derive(Debug, Deserialize)]
struct MainPayload {
    temp: f64,
    feels_like: f64,
    temp_min: f64,
    temp_max: f64,
    #[serde(default)]
    pressure: f64,
    #[serde(default)]
    humidity: f64,
}

#[derive(Debug, Default, Deserialize)]
struct WindPayload {
    #[serde(default)]
    speed: f64,
    #[serde(default)]
    deg: f64,
}

#[derive(Debug, Default, Deserialize)]
struct CloudsPayload {
    #[serde(default)]
    all: f64,
}

#[derive(Debug, Default, Deserialize)]
struct SysPayload {
    #[serde(default)]
    country: String,
    #[serde(default)]
    sunrise: i64,
    #[serde(default)]
    sunset: i64,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    list: Vec<ForecastItem>,
}

#[derive(Debug, Deserialize)]
struct ForecastItem {
    dt: i64,
    main: MainPayload,
    #[serde(default)]
    weather: Vec<ConditionPayload>,
    #[serde(default)]
    wind: WindPayload,
    #[serde(default)]
    clouds: CloudsPayload,
    #[serde(default)]
    visibility: Option<f64>,
    #[serde(default)]
    pop: f64,
}

#[derive(Debug, Deserialize)]
struct GeoPayload {
    name: String,
    lat: f64,
    lon: f64,
    #[serde(default)]
    country: String,
    #[serde(default)]
    state: Option<String>,
}

/// Adapter for the OpenWeather current + 5 day/3 hour forecast endpoints.
#[derive(Debug)]
pub struct OpenWeatherProvider<T> {
    transport: T,
    limiter: RateLimiter,
    api_key: String,
    base_url: String,
    geo_url: String,
}

impl<T: Transport> OpenWeatherProvider<T> {
    pub fn new(
        transport: T,
        limiter: RateLimiter,
        api_key: &str,
        base_url: &str,
        geo_url: &str,
    ) -> Self {
        Self {
            transport,
            limiter,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            geo_url: geo_url.trim_end_matches('/').to_string(),
        }
    }

    fn coordinate_query(&self, lat: f64, lon: f64, units: Units) -> Vec<(&'static str, String)> {
        vec![
            ("lat", lat.to_string()),
            ("lon", lon.to_string()),
            ("units", units.as_str().to_string()),
            ("appid", self.api_key.clone()),
        ]
    }

    fn try_search(&self, query: &str, limit: usize) -> Result<Vec<GeocodingResult>, ProviderError> {
        self.limiter.acquire()?;

        let params = [
            ("q", query.to_string()),
            ("limit", limit.min(MAX_SEARCH_LIMIT).to_string()),
            ("appid", self.api_key.clone()),
        ];
        let body = self
            .transport
            .get(&format!("{}/direct", self.geo_url), &params)?;
        let mut results = parse_geocoding_response(&body)?;
        results.truncate(limit.min(MAX_SEARCH_LIMIT));
        Ok(results)
    }
}

impl<T: Transport> WeatherProvider for OpenWeatherProvider<T> {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn fetch_by_coordinates(
        &self,
        lat: f64,
        lon: f64,
        units: Units,
    ) -> Result<WeatherSnapshot, ProviderError> {
        self.limiter.acquire()?;

        let query = self.coordinate_query(lat, lon, units);
        let current_url = format!("{}/weather", self.base_url);
        let forecast_url = format!("{}/forecast", self.base_url);
        debug!(lat, lon, units = units.as_str(), "fetching OpenWeather current and forecast");

        let (current, forecast) = std::thread::scope(|scope| {
            let forecast = scope.spawn(|| self.transport.get(&forecast_url, &query));
            let current = self.transport.get(&current_url, &query);
            let forecast = forecast.join().unwrap_or_else(|_| {
                Err(ProviderError::Transport(
                    "forecast request thread panicked".to_string(),
                ))
            });
            (current, forecast)
        });

        let current = current
            .and_then(|body| parse_current_response(&body))
            .map_err(|error| error.with_provider(PROVIDER_NAME))?;
        let forecast = forecast
            .and_then(|body| parse_forecast_response(&body))
            .map_err(|error| error.with_provider(PROVIDER_NAME))?;

        Ok(WeatherSnapshot { current, forecast })
    }

    fn search_by_name(&self, query: &str, limit: usize) -> Vec<GeocodingResult> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        self.try_search(query, limit).unwrap_or_else(|error| {
            warn!(%error, "OpenWeather geocoding search failed");
            Vec::new()
        })
    }
}

fn parse_current_response(body: &str) -> Result<CurrentConditions, ProviderError> {
    let payload: CurrentResponse = serde_json::from_str(body)
        .map_err(|error| ProviderError::InvalidResponse(format!("current payload: {error}")))?;

    if payload.weather.is_empty() {
        return Err(ProviderError::InvalidResponse(
            "current payload: missing weather conditions".to_string(),
        ));
    }

    Ok(CurrentConditions {
        coord: Coordinates {
            lat: payload.coord.lat,
            lon: payload.coord.lon,
        },
        weather: map_conditions(payload.weather),
        main: map_main(payload.main),
        visibility: payload.visibility.unwrap_or(0.0),
        wind: map_wind(payload.wind),
        clouds: payload.clouds.all,
        dt: payload.dt,
        location: LocationMeta {
            name: payload.name,
            country: payload.sys.country,
            sunrise: payload.sys.sunrise,
            sunset: payload.sys.sunset,
            timezone_offset: payload.timezone,
        },
    })
}

fn parse_forecast_response(body: &str) -> Result<ForecastSeries, ProviderError> {
    let payload: ForecastResponse = serde_json::from_str(body)
        .map_err(|error| ProviderError::InvalidResponse(format!("forecast payload: {error}")))?;

    let mut points: Vec<ForecastPoint> = payload
        .list
        .into_iter()
        .map(|item| ForecastPoint {
            dt: item.dt,
            main: map_main(item.main),
            weather: map_conditions(item.weather),
            wind: map_wind(item.wind),
            clouds: item.clouds.all,
            visibility: item.visibility.unwrap_or(0.0),
            pop: clamp_probability(item.pop),
        })
        .collect();
    points.sort_by_key(|point| point.dt);

    Ok(ForecastSeries {
        provenance: ForecastProvenance::Native,
        points,
    })
}

fn parse_geocoding_response(body: &str) -> Result<Vec<GeocodingResult>, ProviderError> {
    let payload: Vec<GeoPayload> = serde_json::from_str(body)
        .map_err(|error| ProviderError::InvalidResponse(format!("geocoding payload: {error}")))?;

    Ok(payload
        .into_iter()
        .map(|item| GeocodingResult {
            name: item.name,
            lat: item.lat,
            lon: item.lon,
            country: item.country,
            state: item.state.filter(|state| !state.trim().is_empty()),
        })
        .collect())
}

fn map_conditions(conditions: Vec<ConditionPayload>) -> Vec<WeatherCondition> {
    conditions
        .into_iter()
        .map(|condition| {
            // Vendor icons end in 'n' at night; anything else counts as day.
            let is_day = !condition.icon.ends_with('n');
            weather_code::condition(condition.id, Some(&condition.description), is_day)
        })
        .collect()
}

fn map_main(main: MainPayload) -> TemperatureBlock {
    TemperatureBlock {
        temp: main.temp,
        feels_like: main.feels_like,
        temp_min: main.temp_min,
        temp_max: main.temp_max,
        pressure: main.pressure,
        humidity: main.humidity,
    }
}

fn map_wind(wind: WindPayload) -> Wind {
    Wind {
        speed: wind.speed,
        deg: wind.deg,
    }
}

fn clamp_probability(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}
