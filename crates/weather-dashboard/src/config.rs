use std::path::PathBuf;

use dashboard_common::EnvMap;

use crate::error::ConfigError;

pub const CACHE_TTL_SECS: u64 = 300;
pub const MAX_REQUESTS_PER_MINUTE: u32 = 60;
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

pub const WEATHER_PROVIDER_ENV: &str = "WEATHER_PROVIDER";
pub const OPENWEATHER_API_KEY_ENV: &str = "OPENWEATHER_API_KEY";
pub const WEATHERSTACK_API_KEY_ENV: &str = "WEATHERSTACK_API_KEY";
pub const OPENWEATHER_BASE_URL_ENV: &str = "OPENWEATHER_BASE_URL";
pub const OPENWEATHER_GEO_URL_ENV: &str = "OPENWEATHER_GEO_URL";
pub const WEATHERSTACK_BASE_URL_ENV: &str = "WEATHERSTACK_BASE_URL";
pub const CACHE_TTL_SECONDS_ENV: &str = "CACHE_TTL_SECONDS";
pub const MAX_REQUESTS_PER_MINUTE_ENV: &str = "WEATHER_MAX_REQUESTS_PER_MINUTE";
pub const REQUEST_TIMEOUT_SECS_ENV: &str = "WEATHER_REQUEST_TIMEOUT_SECS";
pub const WEATHER_CACHE_DIR_ENV: &str = "WEATHER_CACHE_DIR";

pub const DEFAULT_OPENWEATHER_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";
pub const DEFAULT_OPENWEATHER_GEO_URL: &str = "https://api.openweathermap.org/geo/1.0";
pub const DEFAULT_WEATHERSTACK_BASE_URL: &str = "http://api.weatherstack.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    #[default]
    OpenWeather,
    Weatherstack,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenWeather => "openweather",
            Self::Weatherstack => "weatherstack",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "openweather" | "openweathermap" => Some(Self::OpenWeather),
            "weatherstack" => Some(Self::Weatherstack),
            _ => None,
        }
    }

    pub fn api_key_env(self) -> &'static str {
        match self {
            Self::OpenWeather => OPENWEATHER_API_KEY_ENV,
            Self::Weatherstack => WEATHERSTACK_API_KEY_ENV,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub provider: ProviderKind,
    pub api_key: String,
    pub openweather_base_url: String,
    pub openweather_geo_url: String,
    pub weatherstack_base_url: String,
    pub cache_dir: PathBuf,
    pub cache_ttl_secs: u64,
    pub max_requests_per_minute: u32,
    pub request_timeout_secs: u64,
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(&EnvMap::from_env())
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::from_env_map(&EnvMap::from_pairs(pairs))
    }

    fn from_env_map(env: &EnvMap) -> Result<Self, ConfigError> {
        let provider = match env.get(WEATHER_PROVIDER_ENV) {
            Some(raw) => ProviderKind::parse(raw)
                .ok_or_else(|| ConfigError::UnknownProvider(raw.to_string()))?,
            None => ProviderKind::default(),
        };

        let api_key = env
            .get(provider.api_key_env())
            .map(str::to_string)
            .ok_or(ConfigError::MissingApiKey {
                provider: provider.as_str(),
                env: provider.api_key_env(),
            })?;

        Ok(Self {
            provider,
            api_key,
            openweather_base_url: resolve_url(
                env,
                OPENWEATHER_BASE_URL_ENV,
                DEFAULT_OPENWEATHER_BASE_URL,
            ),
            openweather_geo_url: resolve_url(
                env,
                OPENWEATHER_GEO_URL_ENV,
                DEFAULT_OPENWEATHER_GEO_URL,
            ),
            weatherstack_base_url: resolve_url(
                env,
                WEATHERSTACK_BASE_URL_ENV,
                DEFAULT_WEATHERSTACK_BASE_URL,
            ),
            cache_dir: resolve_cache_dir(env),
            cache_ttl_secs: env
                .positive_u64(CACHE_TTL_SECONDS_ENV)
                .unwrap_or(CACHE_TTL_SECS),
            max_requests_per_minute: env
                .positive_u64(MAX_REQUESTS_PER_MINUTE_ENV)
                .and_then(|value| u32::try_from(value).ok())
                .unwrap_or(MAX_REQUESTS_PER_MINUTE),
            request_timeout_secs: env
                .positive_u64(REQUEST_TIMEOUT_SECS_ENV)
                .unwrap_or(REQUEST_TIMEOUT_SECS),
        })
    }
}

fn resolve_url(env: &EnvMap, key: &str, default: &str) -> String {
    env.get(key)
        .unwrap_or(default)
        .trim_end_matches('/')
        .to_string()
}

fn resolve_cache_dir(env: &EnvMap) -> PathBuf {
    env.path(WEATHER_CACHE_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("nils-weather-dashboard"))
}
