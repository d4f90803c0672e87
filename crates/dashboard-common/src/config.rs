use std::collections::HashMap;

const HOME_ENV: &str = "HOME";

/// Snapshot of process environment variables.
///
/// Runtime configs are resolved from an `EnvMap` rather than `std::env`
/// directly so tests can feed explicit key/value pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvMap {
    values: HashMap<String, String>,
}

impl EnvMap {
    pub fn from_env() -> Self {
        Self::from_pairs(std::env::vars())
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Trimmed, non-empty value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// Positive integer value for `key`; anything unparsable or zero yields `None`.
    pub fn positive_u64(&self, key: &str) -> Option<u64> {
        self.get(key)
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|value| *value > 0)
    }

    pub fn home(&self) -> Option<&str> {
        self.get(HOME_ENV)
    }

    /// Value for `key` with `~` / `$HOME` expanded against this snapshot's `HOME`.
    pub fn path(&self, key: &str) -> Option<String> {
        let raw = self.get(key)?;
        Some(match self.home() {
            Some(home) => expand_home_tokens(raw, home),
            None => raw.to_string(),
        })
    }
}

pub fn expand_home_tokens(raw: &str, home: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let home = home.trim().trim_end_matches('/');
    let mut expanded = trimmed.replace("$HOME", home);

    if expanded == "~" {
        expanded = home.to_string();
    } else if let Some(rest) = expanded.strip_prefix("~/") {
        expanded = format!("{home}/{rest}");
    }

    expanded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_map_trims_and_drops_blank_values() {
        let env = EnvMap::from_pairs(vec![("A", "  value "), ("B", "   ")]);
        assert_eq!(env.get("A"), Some("value"));
        assert_eq!(env.get("B"), None);
        assert_eq!(env.get("C"), None);
    }

    #[test]
    fn env_map_positive_u64_rejects_zero_and_garbage() {
        let env = EnvMap::from_pairs(vec![("TTL", "900"), ("ZERO", "0"), ("BAD", "abc")]);
        assert_eq!(env.positive_u64("TTL"), Some(900));
        assert_eq!(env.positive_u64("ZERO"), None);
        assert_eq!(env.positive_u64("BAD"), None);
    }

    #[test]
    fn env_map_path_expands_home_prefix() {
        let env = EnvMap::from_pairs(vec![
            ("HOME", "/Users/tester/"),
            ("CACHE", "~/.cache/weather"),
            ("OTHER", "$HOME/data"),
        ]);
        assert_eq!(
            env.path("CACHE").as_deref(),
            Some("/Users/tester/.cache/weather")
        );
        assert_eq!(env.path("OTHER").as_deref(), Some("/Users/tester/data"));
    }

    #[test]
    fn expand_home_tokens_handles_bare_tilde() {
        assert_eq!(expand_home_tokens("~", "/home/me"), "/home/me");
        assert_eq!(expand_home_tokens("/tmp/x", "/home/me"), "/tmp/x");
    }
}
