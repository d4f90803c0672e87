pub mod cache;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod model;
pub mod providers;
pub mod rate_limit;
pub mod service;
pub mod weather_code;

#[cfg(test)]
pub(crate) mod test_support;
