use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_QUERY_CHARS: usize = 100;
pub const MAX_SEARCH_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
    Standard,
}

impl Units {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Metric => "metric",
            Self::Imperial => "imperial",
            Self::Standard => "standard",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "metric" => Some(Self::Metric),
            "imperial" => Some(Self::Imperial),
            "standard" => Some(Self::Standard),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// Canonical condition quad; `id` lives in the OpenWeather numeric code space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherCondition {
    pub id: i32,
    pub main: String,
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureBlock {
    pub temp: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub pressure: f64,
    pub humidity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    pub speed: f64,
    pub deg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationMeta {
    pub name: String,
    pub country: String,
    pub sunrise: i64,
    pub sunset: i64,
    pub timezone_offset: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub coord: Coordinates,
    pub weather: Vec<WeatherCondition>,
    pub main: TemperatureBlock,
    /// Meters.
    pub visibility: f64,
    pub wind: Wind,
    /// Cloud cover percentage.
    pub clouds: f64,
    /// Observation instant, Unix seconds UTC.
    pub dt: i64,
    pub location: LocationMeta,
}

impl CurrentConditions {
    pub fn primary_condition(&self) -> Option<&WeatherCondition> {
        self.weather.first()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub dt: i64,
    pub main: TemperatureBlock,
    pub weather: Vec<WeatherCondition>,
    pub wind: Wind,
    pub clouds: f64,
    pub visibility: f64,
    /// Precipitation probability in `[0.0, 1.0]`.
    pub pop: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastProvenance {
    /// Points came from the upstream forecast endpoint.
    Native,
    /// Points were fabricated from current conditions; not real forecast data.
    Synthesized,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSeries {
    pub provenance: ForecastProvenance,
    pub points: Vec<ForecastPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub current: CurrentConditions,
    pub forecast: ForecastSeries,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodingResult {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeatherRequest {
    pub lat: f64,
    pub lon: f64,
    pub units: Units,
}

impl WeatherRequest {
    pub fn new(
        lat: Option<f64>,
        lon: Option<f64>,
        units: Option<&str>,
    ) -> Result<Self, ValidationError> {
        let lat = lat.ok_or(ValidationError::MissingLatitude)?;
        let lon = lon.ok_or(ValidationError::MissingLongitude)?;
        validate_coordinates(lat, lon)?;

        let units = match units.map(str::trim).filter(|raw| !raw.is_empty()) {
            Some(raw) => {
                Units::parse(raw).ok_or_else(|| ValidationError::InvalidUnits(raw.to_string()))?
            }
            None => Units::default(),
        };

        Ok(Self { lat, lon, units })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub limit: usize,
}

impl SearchRequest {
    pub fn new(raw_query: &str, limit: Option<usize>) -> Result<Self, ValidationError> {
        let query = raw_query.trim();
        if query.is_empty() {
            return Err(ValidationError::EmptyQuery);
        }

        let length = query.chars().count();
        if length > MAX_QUERY_CHARS {
            return Err(ValidationError::QueryTooLong(length));
        }

        let limit = limit.unwrap_or(MAX_SEARCH_LIMIT);
        if !(1..=MAX_SEARCH_LIMIT).contains(&limit) {
            return Err(ValidationError::InvalidLimit(limit));
        }

        Ok(Self {
            query: query.to_string(),
            limit,
        })
    }
}

pub fn validate_coordinates(lat: f64, lon: f64) -> Result<(), ValidationError> {
    if !((-90.0)..=90.0).contains(&lat) {
        return Err(ValidationError::InvalidLatitude(lat));
    }
    if !((-180.0)..=180.0).contains(&lon) {
        return Err(ValidationError::InvalidLongitude(lon));
    }
    Ok(())
}

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("latitude is required")]
    MissingLatitude,
    #[error("longitude is required")]
    MissingLongitude,
    #[error("invalid latitude {0}: must be between -90 and 90")]
    InvalidLatitude(f64),
    #[error("invalid longitude {0}: must be between -180 and 180")]
    InvalidLongitude(f64),
    #[error("invalid units '{0}': must be metric, imperial, or standard")]
    InvalidUnits(String),
    #[error("search query is required")]
    EmptyQuery,
    #[error("search query must be between 1 and 100 characters (got {0})")]
    QueryTooLong(usize),
    #[error("search limit must be between 1 and 5 (got {0})")]
    InvalidLimit(usize),
}
