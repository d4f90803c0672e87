use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use dashboard_common::{
    OutputMode, error_envelope, redact_sensitive, render, select_output_mode, success_envelope,
};
use serde::Serialize;
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

use weather_dashboard::{
    cache::{CacheStore, FileCacheStore, TtlCache},
    config::RuntimeConfig,
    error::{AppError, ErrorKind},
    model::{GeocodingResult, SearchRequest, Units, WeatherRequest},
    providers::{WeatherProvider, build_provider},
    service::{WeatherOutcome, WeatherService},
};

const DEFAULT_LOG_FILTER: &str = "weather_dashboard=warn";
const ERROR_CODE_USER_OUTPUT_MODE_CONFLICT: &str = "user.output_mode_conflict";
const ERROR_CODE_RUNTIME_PROVIDER_INIT: &str = "runtime.provider_init_failed";
const ERROR_CODE_RUNTIME_SERIALIZE: &str = "runtime.serialize_failed";

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Weather dashboard core: cached current conditions, forecast and city search"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Current conditions and forecast for a coordinate.
    Current {
        #[arg(long, allow_negative_numbers = true)]
        lat: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        lon: Option<f64>,
        /// metric (default), imperial or standard.
        #[arg(long)]
        units: Option<String>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Search cities by name.
    Search {
        #[arg(long)]
        query: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Inspect or prune the response cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Debug, Subcommand)]
enum CacheAction {
    /// Delete expired entries.
    Sweep {
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Count total, expired and active entries.
    Stats {
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Delete every entry.
    Clear {
        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Debug, Clone, Copy, Args)]
struct OutputArgs {
    #[arg(long, value_enum)]
    output: Option<OutputModeArg>,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputModeArg {
    Human,
    Json,
}

impl From<OutputModeArg> for OutputMode {
    fn from(value: OutputModeArg) -> Self {
        match value {
            OutputModeArg::Human => OutputMode::Human,
            OutputModeArg::Json => OutputMode::Json,
        }
    }
}

impl Cli {
    fn output_args(&self) -> OutputArgs {
        match &self.command {
            Commands::Current { output, .. } | Commands::Search { output, .. } => *output,
            Commands::Cache { action } => match action {
                CacheAction::Sweep { output }
                | CacheAction::Stats { output }
                | CacheAction::Clear { output } => *output,
            },
        }
    }

    fn output_mode_hint(&self) -> OutputMode {
        let args = self.output_args();
        if args.json {
            OutputMode::Json
        } else {
            args.output.map(Into::into).unwrap_or(OutputMode::Human)
        }
    }
}

/// Validated unit of work, resolved before any configuration is loaded.
#[derive(Debug, Clone, PartialEq)]
enum Action {
    Weather(WeatherRequest),
    Search(SearchRequest),
    CacheSweep,
    CacheStats,
    CacheClear,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliError {
    kind: ErrorKind,
    code: &'static str,
    message: String,
}

impl CliError {
    fn new(kind: ErrorKind, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
        }
    }

    fn exit_code(&self) -> i32 {
        self.kind.exit_code()
    }

    fn status(&self) -> u16 {
        self.kind.status()
    }
}

impl From<AppError> for CliError {
    fn from(error: AppError) -> Self {
        Self::new(error.kind, error.code(), error.message)
    }
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let output_mode = cli.output_mode_hint();
    match run(cli) {
        Ok(output) => println!("{output}"),
        Err(error) => {
            emit_error(output_mode, &error);
            std::process::exit(error.exit_code());
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run(cli: Cli) -> Result<String, CliError> {
    let (action, output_mode) = plan(&cli)?;

    let config = RuntimeConfig::from_env().map_err(AppError::from)?;
    let provider = build_provider(&config).map_err(|error| {
        CliError::new(
            ErrorKind::Runtime,
            ERROR_CODE_RUNTIME_PROVIDER_INIT,
            error.to_string(),
        )
    })?;
    let cache = TtlCache::new(FileCacheStore::new(&config.cache_dir), config.cache_ttl_secs);
    let service = WeatherService::new(provider, cache, Utc::now);

    execute(&service, action, output_mode)
}

fn plan(cli: &Cli) -> Result<(Action, OutputMode), CliError> {
    let args = cli.output_args();
    let output_mode = select_output_mode(args.output.map(Into::into), args.json, OutputMode::Human)
        .map_err(|error| {
            CliError::new(
                ErrorKind::User,
                ERROR_CODE_USER_OUTPUT_MODE_CONFLICT,
                error.to_string(),
            )
        })?;

    let action = match &cli.command {
        Commands::Current {
            lat, lon, units, ..
        } => Action::Weather(
            WeatherRequest::new(*lat, *lon, units.as_deref()).map_err(AppError::from)?,
        ),
        Commands::Search { query, limit, .. } => Action::Search(
            SearchRequest::new(query.as_deref().unwrap_or_default(), *limit)
                .map_err(AppError::from)?,
        ),
        Commands::Cache { action } => match action {
            CacheAction::Sweep { .. } => Action::CacheSweep,
            CacheAction::Stats { .. } => Action::CacheStats,
            CacheAction::Clear { .. } => Action::CacheClear,
        },
    };

    Ok((action, output_mode))
}

fn execute<P, S, N>(
    service: &WeatherService<P, S, N>,
    action: Action,
    output_mode: OutputMode,
) -> Result<String, CliError>
where
    P: WeatherProvider,
    S: CacheStore,
    N: Fn() -> DateTime<Utc>,
{
    match action {
        Action::Weather(request) => {
            let outcome = service.get_weather(&request)?;
            match output_mode {
                OutputMode::Json => Ok(render(&success_envelope(
                    to_json(&outcome.snapshot)?,
                    &[("cached", Value::Bool(outcome.cached))],
                ))),
                OutputMode::Human => Ok(format_weather_text(
                    &outcome,
                    service.served_units(request.units),
                )),
            }
        }
        Action::Search(request) => {
            let results = service.search(&request);
            match output_mode {
                OutputMode::Json => Ok(render(&success_envelope(
                    to_json(&results)?,
                    &[("count", json!(results.len()))],
                ))),
                OutputMode::Human => Ok(format_search_text(&results)),
            }
        }
        Action::CacheSweep => {
            let removed = service.sweep_cache();
            Ok(render_cache_count(output_mode, "swept", removed))
        }
        Action::CacheClear => {
            let removed = service.clear_cache();
            Ok(render_cache_count(output_mode, "cleared", removed))
        }
        Action::CacheStats => {
            let stats = service.cache_stats();
            match output_mode {
                OutputMode::Json => Ok(render(&success_envelope(to_json(&stats)?, &[]))),
                OutputMode::Human => Ok(format!(
                    "cache entries: total={} active={} expired={} ttl={}s",
                    stats.total_entries,
                    stats.active_entries,
                    stats.expired_entries,
                    stats.ttl_secs
                )),
            }
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, CliError> {
    serde_json::to_value(value).map_err(|error| {
        CliError::new(
            ErrorKind::Runtime,
            ERROR_CODE_RUNTIME_SERIALIZE,
            format!("failed to serialize output: {error}"),
        )
    })
}

fn render_cache_count(output_mode: OutputMode, verb: &str, removed: usize) -> String {
    match output_mode {
        OutputMode::Json => render(&success_envelope(json!({ "removed": removed }), &[])),
        OutputMode::Human => format!("{verb} {removed} cache entries"),
    }
}

fn emit_error(output_mode: OutputMode, error: &CliError) {
    match output_mode {
        OutputMode::Json => {
            println!(
                "{}",
                render(&error_envelope(&error.message, error.code, error.status()))
            );
        }
        OutputMode::Human => {
            eprintln!(
                "error[{}]: {}",
                error.code,
                redact_sensitive(&error.message)
            );
        }
    }
}

fn unit_labels(units: Units) -> (&'static str, &'static str) {
    match units {
        Units::Metric => ("°C", "m/s"),
        Units::Imperial => ("°F", "mph"),
        Units::Standard => ("K", "m/s"),
    }
}

fn coordinate_label(lat: f64, lon: f64) -> String {
    format!("{lat:.4},{lon:.4}")
}

fn format_weather_text(outcome: &WeatherOutcome, units: Units) -> String {
    let (temp_unit, speed_unit) = unit_labels(units);
    let current = &outcome.snapshot.current;
    let description = current
        .primary_condition()
        .map(|condition| condition.description.as_str())
        .unwrap_or("unknown");
    let place = match (
        current.location.name.is_empty(),
        current.location.country.is_empty(),
    ) {
        (false, false) => format!("{}, {}", current.location.name, current.location.country),
        (false, true) => current.location.name.clone(),
        _ => coordinate_label(current.coord.lat, current.coord.lon),
    };

    let mut lines = vec![
        format!(
            "{place} | {:.1}{temp_unit} {description} | feels {:.1}{temp_unit} | humidity {:.0}% | wind {:.1} {speed_unit}",
            current.main.temp, current.main.feels_like, current.main.humidity, current.wind.speed
        ),
        format!(
            "source={} | key={}",
            if outcome.cached { "cache" } else { "live" },
            outcome.fingerprint
        ),
    ];

    let forecast = &outcome.snapshot.forecast;
    let provenance = serde_json::to_value(forecast.provenance)
        .ok()
        .and_then(|value| value.as_str().map(str::to_string))
        .unwrap_or_default();
    lines.push(format!(
        "forecast ({provenance}): {} points",
        forecast.points.len()
    ));
    for point in forecast.points.iter().take(4) {
        let at = DateTime::<Utc>::from_timestamp(point.dt, 0)
            .map(|value| value.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| point.dt.to_string());
        lines.push(format!(
            "{at}Z {:.1}{temp_unit} pop:{:.0}%",
            point.main.temp,
            point.pop * 100.0
        ));
    }

    lines.join("\n")
}

fn format_search_text(results: &[GeocodingResult]) -> String {
    if results.is_empty() {
        return "no matching cities".to_string();
    }

    results
        .iter()
        .map(|result| {
            let region = match &result.state {
                Some(state) => format!("{state}, {}", result.country),
                None => result.country.clone(),
            };
            format!(
                "{} ({region}) {:.4},{:.4}",
                result.name, result.lat, result.lon
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::TimeZone;
    use weather_dashboard::cache::MemoryCacheStore;
    use weather_dashboard::model::WeatherSnapshot;
    use weather_dashboard::providers::ProviderError;

    use super::*;

    struct FakeProvider {
        fetch_result: Result<WeatherSnapshot, ProviderError>,
        fetch_calls: AtomicUsize,
        kelvin_supported: bool,
    }

    impl FakeProvider {
        fn ok() -> Self {
            Self {
                fetch_result: Ok(snapshot()),
                fetch_calls: AtomicUsize::new(0),
                kelvin_supported: true,
            }
        }

        fn without_kelvin() -> Self {
            Self {
                kelvin_supported: false,
                ..Self::ok()
            }
        }
    }

    impl WeatherProvider for FakeProvider {
        fn name(&self) -> &'static str {
            "Fake"
        }

        fn served_units(&self, requested: Units) -> Units {
            match requested {
                Units::Standard if !self.kelvin_supported => Units::Metric,
                other => other,
            }
        }

        fn fetch_by_coordinates(
            &self,
            _lat: f64,
            _lon: f64,
            _units: Units,
        ) -> Result<WeatherSnapshot, ProviderError> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            self.fetch_result.clone()
        }

        fn search_by_name(&self, query: &str, limit: usize) -> Vec<GeocodingResult> {
            if query.trim().is_empty() {
                return Vec::new();
            }
            vec![
                GeocodingResult {
                    name: "London".to_string(),
                    lat: 51.5073,
                    lon: -0.1276,
                    country: "GB".to_string(),
                    state: Some("England".to_string()),
                },
                GeocodingResult {
                    name: "London".to_string(),
                    lat: 42.9834,
                    lon: -81.233,
                    country: "CA".to_string(),
                    state: None,
                },
            ]
            .into_iter()
            .take(limit)
            .collect()
        }
    }

    fn snapshot() -> WeatherSnapshot {
        serde_json::from_value(json!({
            "current": {
                "coord": {"lat": 51.5074, "lon": -0.1278},
                "weather": [{"id": 803, "main": "Clouds", "description": "broken clouds", "icon": "04d"}],
                "main": {"temp": 12.3, "feels_like": 11.1, "temp_min": 10.9, "temp_max": 13.8, "pressure": 1012.0, "humidity": 81.0},
                "visibility": 10000.0,
                "wind": {"speed": 4.6, "deg": 230.0},
                "clouds": 75.0,
                "dt": 1770811200,
                "location": {"name": "London", "country": "GB", "sunrise": 1770794100, "sunset": 1770829800, "timezone_offset": 0}
            },
            "forecast": {
                "provenance": "native",
                "points": [{
                    "dt": 1770822000,
                    "main": {"temp": 11.0, "feels_like": 10.2, "temp_min": 10.8, "temp_max": 11.0, "pressure": 1012.0, "humidity": 80.0},
                    "weather": [{"id": 804, "main": "Clouds", "description": "overcast clouds", "icon": "04d"}],
                    "wind": {"speed": 4.9, "deg": 235.0},
                    "clouds": 100.0,
                    "visibility": 10000.0,
                    "pop": 0.2
                }]
            }
        }))
        .expect("snapshot fixture")
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 11, 12, 0, 0)
            .single()
            .expect("time")
    }

    fn service(
        provider: FakeProvider,
    ) -> WeatherService<FakeProvider, MemoryCacheStore, fn() -> DateTime<Utc>> {
        WeatherService::new(
            provider,
            TtlCache::new(MemoryCacheStore::new(), 300),
            fixed_now as fn() -> DateTime<Utc>,
        )
    }

    fn run_args<P, S, N>(service: &WeatherService<P, S, N>, args: &[&str]) -> Result<String, CliError>
    where
        P: WeatherProvider,
        S: CacheStore,
        N: Fn() -> DateTime<Utc>,
    {
        let cli = Cli::parse_from(args);
        let (action, output_mode) = plan(&cli)?;
        execute(service, action, output_mode)
    }

    #[test]
    fn main_current_json_envelope_reports_cache_state() {
        let service = service(FakeProvider::ok());
        let args = [
            "weather-dashboard",
            "current",
            "--lat",
            "51.5074",
            "--lon",
            "-0.1278",
            "--json",
        ];

        let first: Value =
            serde_json::from_str(&run_args(&service, &args).expect("first")).expect("json");
        assert_eq!(first["success"], Value::Bool(true));
        assert_eq!(first["cached"], Value::Bool(false));
        assert_eq!(first["data"]["current"]["location"]["name"], json!("London"));
        assert_eq!(first["data"]["forecast"]["provenance"], json!("native"));

        let second: Value =
            serde_json::from_str(&run_args(&service, &args).expect("second")).expect("json");
        assert_eq!(second["cached"], Value::Bool(true));
        assert_eq!(second["data"], first["data"]);
    }

    #[test]
    fn main_current_human_output_summarizes_conditions() {
        let service = service(FakeProvider::ok());
        let output = run_args(
            &service,
            &[
                "weather-dashboard",
                "current",
                "--lat",
                "51.5074",
                "--lon",
                "-0.1278",
                "--units",
                "imperial",
            ],
        )
        .expect("human");

        assert!(output.contains("London, GB"));
        assert!(output.contains("12.3°F broken clouds"));
        assert!(output.contains("wind 4.6 mph"));
        assert!(output.contains("source=live"));
        assert!(output.contains("key=51.5074_-0.1278_imperial"));
        assert!(output.contains("forecast (native): 1 points"));
    }

    #[test]
    fn main_human_output_labels_units_the_provider_served() {
        let args = [
            "weather-dashboard",
            "current",
            "--lat",
            "51.5074",
            "--lon",
            "-0.1278",
            "--units",
            "standard",
        ];

        let kelvin = run_args(&service(FakeProvider::ok()), &args).expect("kelvin");
        assert!(kelvin.contains("12.3K broken clouds"));

        let metric = run_args(&service(FakeProvider::without_kelvin()), &args).expect("metric");
        assert!(metric.contains("12.3°C broken clouds"));
        assert!(!metric.contains("12.3K"));
        assert!(metric.contains("key=51.5074_-0.1278_standard"));
    }

    #[test]
    fn main_human_output_falls_back_to_coordinates_without_place_name() {
        let mut unnamed = snapshot();
        unnamed.current.location.name.clear();
        unnamed.current.coord.lat = 25.0330123;
        unnamed.current.coord.lon = 121.5654123;
        let provider = FakeProvider {
            fetch_result: Ok(unnamed),
            ..FakeProvider::ok()
        };

        let output = run_args(
            &service(provider),
            &["weather-dashboard", "current", "--lat", "25.033", "--lon", "121.5654"],
        )
        .expect("human");

        assert!(output.starts_with("25.0330,121.5654 | "));
    }

    #[test]
    fn main_search_json_envelope_carries_count() {
        let service = service(FakeProvider::ok());
        let output = run_args(
            &service,
            &[
                "weather-dashboard",
                "search",
                "--query",
                "London",
                "--limit",
                "1",
                "--output",
                "json",
            ],
        )
        .expect("search");
        let json: Value = serde_json::from_str(&output).expect("json");

        assert_eq!(json["success"], Value::Bool(true));
        assert_eq!(json["count"], json!(1));
        assert_eq!(json["data"][0]["state"], json!("England"));
    }

    #[test]
    fn main_search_human_output_lists_matches() {
        let service = service(FakeProvider::ok());
        let output = run_args(&service, &["weather-dashboard", "search", "--query", "London"])
            .expect("search");

        assert_eq!(
            output,
            "London (England, GB) 51.5073,-0.1276\nLondon (CA) 42.9834,-81.2330"
        );
    }

    #[test]
    fn main_rejects_blank_search_query() {
        let service = service(FakeProvider::ok());
        let err = run_args(&service, &["weather-dashboard", "search", "--query", "  "])
            .expect_err("must fail");

        assert_eq!(err.kind, ErrorKind::User);
        assert_eq!(err.code, "user.invalid_input");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn main_rejects_out_of_range_coordinates() {
        let service = service(FakeProvider::ok());
        let err = run_args(
            &service,
            &["weather-dashboard", "current", "--lat", "91", "--lon", "0"],
        )
        .expect_err("must fail");

        assert_eq!(err.kind, ErrorKind::User);
        assert_eq!(err.status(), 400);
        assert_eq!(service.provider_name(), "Fake");
    }

    #[test]
    fn main_maps_upstream_failure() {
        let service = service(FakeProvider {
            fetch_result: Err(ProviderError::Upstream {
                provider: "OpenWeather",
                message: "Invalid API key.".to_string(),
            }),
            fetch_calls: AtomicUsize::new(0),
            kelvin_supported: true,
        });

        let err = run_args(
            &service,
            &["weather-dashboard", "current", "--lat", "1", "--lon", "2", "--json"],
        )
        .expect_err("must fail");

        assert_eq!(err.kind, ErrorKind::Upstream);
        assert_eq!(err.code, "runtime.upstream_failed");
        assert_eq!(err.status(), 502);
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn main_maps_rate_limit_failure() {
        let service = service(FakeProvider {
            fetch_result: Err(ProviderError::RateLimited { limit: 60 }),
            fetch_calls: AtomicUsize::new(0),
            kelvin_supported: true,
        });

        let err = run_args(
            &service,
            &["weather-dashboard", "current", "--lat", "1", "--lon", "2"],
        )
        .expect_err("must fail");

        assert_eq!(err.code, "user.rate_limited");
        assert_eq!(err.status(), 429);
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn main_rejects_conflicting_json_flags() {
        let service = service(FakeProvider::ok());
        let err = run_args(
            &service,
            &[
                "weather-dashboard",
                "search",
                "--query",
                "London",
                "--json",
                "--output",
                "human",
            ],
        )
        .expect_err("must fail");

        assert_eq!(err.kind, ErrorKind::User);
        assert_eq!(err.code, ERROR_CODE_USER_OUTPUT_MODE_CONFLICT);
    }

    #[test]
    fn main_cache_commands_report_counts() {
        let service = service(FakeProvider::ok());
        run_args(
            &service,
            &["weather-dashboard", "current", "--lat", "1", "--lon", "2"],
        )
        .expect("prime");

        let stats: Value = serde_json::from_str(
            &run_args(&service, &["weather-dashboard", "cache", "stats", "--json"])
                .expect("stats"),
        )
        .expect("json");
        assert_eq!(stats["data"]["total_entries"], json!(1));
        assert_eq!(stats["data"]["active_entries"], json!(1));
        assert_eq!(stats["data"]["ttl_secs"], json!(300));

        let swept = run_args(&service, &["weather-dashboard", "cache", "sweep"]).expect("sweep");
        assert_eq!(swept, "swept 0 cache entries");

        let cleared: Value = serde_json::from_str(
            &run_args(&service, &["weather-dashboard", "cache", "clear", "--json"])
                .expect("clear"),
        )
        .expect("json");
        assert_eq!(cleared["data"]["removed"], json!(1));
    }

    #[test]
    fn main_output_mode_hint_prefers_json_flag() {
        let cli = Cli::parse_from([
            "weather-dashboard",
            "cache",
            "stats",
            "--json",
            "--output",
            "human",
        ]);
        assert_eq!(cli.output_mode_hint(), OutputMode::Json);
    }

    #[test]
    fn main_help_flag_is_supported() {
        let help = Cli::try_parse_from(["weather-dashboard", "--help"]).expect_err("help");
        assert_eq!(help.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
