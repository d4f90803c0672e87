//! Shared weather-dashboard plumbing.
//!
//! - `config`: environment snapshots and home-path expansion.
//! - `envelope`: JSON success/error envelopes and output-mode selection.
//! - `redact`: credential masking for user-visible error text.

pub mod config;
pub mod envelope;
pub mod redact;

pub use config::{EnvMap, expand_home_tokens};
pub use envelope::{
    OutputMode, OutputModeSelectionError, error_envelope, render, select_output_mode,
    success_envelope,
};
pub use redact::redact_sensitive;
