use std::time::Duration;

use dashboard_common::redact_sensitive;
use reqwest::blocking::{Client, RequestBuilder};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::config::{ProviderKind, RuntimeConfig};
use crate::model::{GeocodingResult, Units, WeatherSnapshot};
use crate::rate_limit::RateLimiter;

pub mod open_weather;
pub mod weatherstack;

pub use open_weather::OpenWeatherProvider;
pub use weatherstack::WeatherstackProvider;

/// One upstream weather API normalized into `WeatherSnapshot`.
pub trait WeatherProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn fetch_by_coordinates(
        &self,
        lat: f64,
        lon: f64,
        units: Units,
    ) -> Result<WeatherSnapshot, ProviderError>;

    /// Unit system the values of a fetch in `requested` units are actually expressed in.
    fn served_units(&self, requested: Units) -> Units {
        requested
    }

    /// City search. Degrades to an empty list on any failure.
    fn search_by_name(&self, query: &str, limit: usize) -> Vec<GeocodingResult>;
}

impl<P: WeatherProvider + ?Sized> WeatherProvider for Box<P> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn fetch_by_coordinates(
        &self,
        lat: f64,
        lon: f64,
        units: Units,
    ) -> Result<WeatherSnapshot, ProviderError> {
        (**self).fetch_by_coordinates(lat, lon, units)
    }

    fn served_units(&self, requested: Units) -> Units {
        (**self).served_units(requested)
    }

    fn search_by_name(&self, query: &str, limit: usize) -> Vec<GeocodingResult> {
        (**self).search_by_name(query, limit)
    }
}

/// HTTP GET seam; returns the body of a 2xx response.
pub trait Transport: Send + Sync {
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<String, ProviderError>;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout_secs: u64) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|error| ProviderError::Transport(error.to_string()))?;

        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<String, ProviderError> {
        debug!(%url, "upstream request");
        execute_request(self.client.get(url).query(query))
    }
}

fn execute_request(request: RequestBuilder) -> Result<String, ProviderError> {
    let response = request
        .send()
        .map_err(|error| ProviderError::Transport(redact_sensitive(&error.to_string())))?;
    let status = response.status();
    let body = response
        .text()
        .map_err(|error| ProviderError::Transport(redact_sensitive(&error.to_string())))?;

    if status.is_success() {
        return Ok(body);
    }

    let message = extract_error_message(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    });

    Err(ProviderError::Http {
        status: status.as_u16(),
        message,
    })
}

/// Upstream message from an error body: a top-level string field, Weatherstack's
/// nested `error.info`, or the raw body.
pub(crate) fn extract_error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    let from_json = serde_json::from_str::<Value>(trimmed)
        .ok()
        .and_then(|json| {
            for key in ["message", "reason", "error", "detail", "description"] {
                if let Some(value) = json.get(key).and_then(Value::as_str) {
                    let message = value.trim();
                    if !message.is_empty() {
                        return Some(message.to_string());
                    }
                }
            }
            json.pointer("/error/info")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|message| !message.is_empty())
                .map(str::to_string)
        });

    from_json.or_else(|| Some(trimmed.to_string()))
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("http error ({status}): {message}")]
    Http { status: u16, message: String },
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
    #[error("{provider} API error: {message}")]
    Upstream {
        provider: &'static str,
        message: String,
    },
    #[error("rate limit exceeded: at most {limit} upstream requests per minute")]
    RateLimited { limit: u32 },
}

impl ProviderError {
    /// Folds transport and payload failures into a provider-labelled upstream error.
    pub fn with_provider(self, provider: &'static str) -> Self {
        match self {
            ProviderError::Transport(message) | ProviderError::InvalidResponse(message) => {
                ProviderError::Upstream { provider, message }
            }
            ProviderError::Http { status, message } => ProviderError::Upstream {
                provider,
                message: format!("{message} (status {status})"),
            },
            other => other,
        }
    }
}

pub fn build_provider(config: &RuntimeConfig) -> Result<Box<dyn WeatherProvider>, ProviderError> {
    let transport = HttpTransport::new(config.request_timeout_secs)?;
    let limiter = RateLimiter::per_minute(config.max_requests_per_minute);

    let provider: Box<dyn WeatherProvider> = match config.provider {
        ProviderKind::OpenWeather => Box::new(OpenWeatherProvider::new(
            transport,
            limiter,
            &config.api_key,
            &config.openweather_base_url,
            &config.openweather_geo_url,
        )),
        ProviderKind::Weatherstack => Box::new(WeatherstackProvider::new(
            transport,
            limiter,
            &config.api_key,
            &config.weatherstack_base_url,
        )),
    };
    Ok(provider)
}

#[cfg(test)]
pub(crate) mod fake {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::{ProviderError, Transport};

    /// Scripted transport: routes by URL suffix and records every call.
    #[derive(Default)]
    pub(crate) struct FakeTransport {
        routes: Mutex<Vec<(String, VecDeque<Result<String, ProviderError>>)>>,
        calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
    }

    impl FakeTransport {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn route(self, suffix: &str, response: Result<String, ProviderError>) -> Self {
            {
                let mut routes = self.routes.lock().expect("routes");
                match routes.iter_mut().find(|(existing, _)| existing == suffix) {
                    Some((_, queue)) => queue.push_back(response),
                    None => routes.push((suffix.to_string(), VecDeque::from([response]))),
                }
            }
            self
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.lock().expect("calls").len()
        }

        pub(crate) fn calls(&self) -> Vec<(String, Vec<(String, String)>)> {
            self.calls.lock().expect("calls").clone()
        }
    }

    impl Transport for FakeTransport {
        fn get(&self, url: &str, query: &[(&str, String)]) -> Result<String, ProviderError> {
            self.calls.lock().expect("calls").push((
                url.to_string(),
                query
                    .iter()
                    .map(|(key, value)| ((*key).to_string(), value.clone()))
                    .collect(),
            ));

            let mut routes = self.routes.lock().expect("routes");
            let Some((_, queue)) = routes.iter_mut().find(|(suffix, _)| url.ends_with(suffix))
            else {
                return Err(ProviderError::Transport(format!("no route for {url}")));
            };
            // The last scripted response repeats.
            if queue.len() > 1 {
                queue.pop_front().unwrap_or_else(|| Err(ProviderError::Transport("empty".into())))
            } else {
                queue
                    .front()
                    .cloned()
                    .unwrap_or_else(|| Err(ProviderError::Transport("empty".into())))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_extract_error_message_prefers_message_field() {
        let body = r#"{"cod": 401, "message": "Invalid API key."}"#;
        assert_eq!(
            extract_error_message(body),
            Some("Invalid API key.".to_string())
        );
    }

    #[test]
    fn provider_extract_error_message_reads_nested_info() {
        let body = r#"{"success": false, "error": {"code": 101, "info": "You have not supplied a valid API Access Key."}}"#;
        assert_eq!(
            extract_error_message(body),
            Some("You have not supplied a valid API Access Key.".to_string())
        );
    }

    #[test]
    fn provider_extract_error_message_falls_back_to_raw_body() {
        assert_eq!(
            extract_error_message("  bad gateway "),
            Some("bad gateway".to_string())
        );
        assert_eq!(extract_error_message("   "), None);
    }

    #[test]
    fn provider_error_with_provider_labels_upstream_failures() {
        let error = ProviderError::Http {
            status: 404,
            message: "city not found".to_string(),
        }
        .with_provider("OpenWeather");
        assert_eq!(
            error.to_string(),
            "OpenWeather API error: city not found (status 404)"
        );

        let limited = ProviderError::RateLimited { limit: 60 }.with_provider("OpenWeather");
        assert_eq!(limited, ProviderError::RateLimited { limit: 60 });
    }

    #[test]
    fn provider_factory_selects_configured_variant() {
        let openweather =
            RuntimeConfig::from_pairs(vec![("OPENWEATHER_API_KEY", "ow-key")]).expect("config");
        assert_eq!(
            build_provider(&openweather).expect("provider").name(),
            "OpenWeather"
        );

        let weatherstack = RuntimeConfig::from_pairs(vec![
            ("WEATHER_PROVIDER", "weatherstack"),
            ("WEATHERSTACK_API_KEY", "ws-key"),
        ])
        .expect("config");
        assert_eq!(
            build_provider(&weatherstack).expect("provider").name(),
            "Weatherstack"
        );
    }
}
