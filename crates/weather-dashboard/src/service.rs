use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::cache::{CacheLookup, CacheStats, CacheStore, TtlCache};
use crate::error::AppError;
use crate::fingerprint::fingerprint;
use crate::model::{GeocodingResult, SearchRequest, Units, WeatherRequest, WeatherSnapshot};
use crate::providers::WeatherProvider;

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherOutcome {
    pub snapshot: WeatherSnapshot,
    pub cached: bool,
    pub fingerprint: String,
}

/// Cache-first fetch orchestration over one provider.
///
/// Concurrent misses on the same fingerprint are not coalesced: each caller
/// fetches and writes through, and the last write wins.
pub struct WeatherService<P, S, N> {
    provider: P,
    cache: TtlCache<S>,
    now_fn: N,
}

impl<P, S, N> WeatherService<P, S, N>
where
    P: WeatherProvider,
    S: CacheStore,
    N: Fn() -> DateTime<Utc>,
{
    pub fn new(provider: P, cache: TtlCache<S>, now_fn: N) -> Self {
        Self {
            provider,
            cache,
            now_fn,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn served_units(&self, requested: Units) -> Units {
        self.provider.served_units(requested)
    }

    pub fn get_weather(&self, request: &WeatherRequest) -> Result<WeatherOutcome, AppError> {
        let key = fingerprint(request.lat, request.lon, request.units);

        match self
            .cache
            .lookup(request.lat, request.lon, request.units, (self.now_fn)())
        {
            CacheLookup::Hit(entry) => {
                return Ok(WeatherOutcome {
                    snapshot: entry.snapshot,
                    cached: true,
                    fingerprint: key,
                });
            }
            CacheLookup::Absent(reason) => {
                debug!(fingerprint = %key, ?reason, provider = self.provider.name(), "fetching from provider");
            }
        }

        let snapshot = self
            .provider
            .fetch_by_coordinates(request.lat, request.lon, request.units)
            .map_err(|error| {
                warn!(fingerprint = %key, %error, "provider fetch failed");
                AppError::from(error)
            })?;

        self.cache.set(
            request.lat,
            request.lon,
            request.units,
            &snapshot,
            (self.now_fn)(),
        );

        Ok(WeatherOutcome {
            snapshot,
            cached: false,
            fingerprint: key,
        })
    }

    pub fn search(&self, request: &SearchRequest) -> Vec<GeocodingResult> {
        self.provider.search_by_name(&request.query, request.limit)
    }

    pub fn sweep_cache(&self) -> usize {
        self.cache.sweep((self.now_fn)())
    }

    pub fn clear_cache(&self) -> usize {
        self.cache.clear_all()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats((self.now_fn)())
    }
}
