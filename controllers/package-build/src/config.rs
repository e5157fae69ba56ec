//! Controller configuration.
//!
//! Read once from environment variables at startup. Unset or blank variables
//! fall back to defaults; values that do not parse stop the controller.

use crate::error::ControllerError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BASE_BUILD_IMAGE: &str = "docker.io/spack/ubuntu-bionic:latest";
pub const DEFAULT_BUILD_LOGIC_CONFIGMAP: &str = "spack-build-logic";
pub const DEFAULT_BUILD_HISTORY_LIMIT: i32 = 5;
pub const DEFAULT_CONCURRENCY: u16 = 4;
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// Runtime settings for the controller and the build resources it creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Namespace to watch; every namespace when `None`
    pub watch_namespace: Option<String>,
    /// Image the Spack build runs in and the runtime stage starts from
    pub base_build_image: String,
    /// Pre-existing ConfigMap holding the shared build scripts
    pub build_logic_config_map: String,
    /// Successful and failed builds kept per BuildConfig
    pub build_history_limit: i32,
    /// Reconciliations allowed to run at once
    pub concurrency: u16,
    /// Quiet period before a burst of events on one resource is reconciled
    pub debounce: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            watch_namespace: None,
            base_build_image: DEFAULT_BASE_BUILD_IMAGE.to_string(),
            build_logic_config_map: DEFAULT_BUILD_LOGIC_CONFIGMAP.to_string(),
            build_history_limit: DEFAULT_BUILD_HISTORY_LIMIT,
            concurrency: DEFAULT_CONCURRENCY,
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
        }
    }
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load settings through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        Ok(Self {
            watch_namespace: var("WATCH_NAMESPACE"),
            base_build_image: var("BASE_BUILD_IMAGE").unwrap_or(defaults.base_build_image),
            build_logic_config_map: var("BUILD_LOGIC_CONFIGMAP")
                .unwrap_or(defaults.build_logic_config_map),
            build_history_limit: parse_positive(
                "BUILD_HISTORY_LIMIT",
                var("BUILD_HISTORY_LIMIT"),
                defaults.build_history_limit,
            )?,
            concurrency: parse_positive(
                "RECONCILE_CONCURRENCY",
                var("RECONCILE_CONCURRENCY"),
                defaults.concurrency,
            )?,
            debounce: match var("RECONCILE_DEBOUNCE_MS") {
                Some(raw) => Duration::from_millis(parse("RECONCILE_DEBOUNCE_MS", &raw)?),
                None => defaults.debounce,
            },
        })
    }
}

fn parse<T: FromStr>(key: &str, raw: &str) -> Result<T, ControllerError> {
    raw.parse().map_err(|_| {
        ControllerError::InvalidConfig(format!("{} must be a number, got {:?}", key, raw))
    })
}

fn parse_positive<T>(key: &str, raw: Option<String>, default: T) -> Result<T, ControllerError>
where
    T: FromStr + PartialOrd + Default,
{
    let Some(raw) = raw else {
        return Ok(default);
    };
    let value: T = parse(key, &raw)?;
    if value <= T::default() {
        return Err(ControllerError::InvalidConfig(format!(
            "{} must be greater than zero, got {}",
            key, raw
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_from(vars: &[(&str, &str)]) -> Result<Settings, ControllerError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let settings = settings_from(&[]).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.watch_namespace, None);
        assert_eq!(settings.base_build_image, "docker.io/spack/ubuntu-bionic:latest");
        assert_eq!(settings.build_history_limit, 5);
        assert_eq!(settings.concurrency, 4);
        assert_eq!(settings.debounce, Duration::from_millis(500));
    }

    #[test]
    fn test_overrides() {
        let settings = settings_from(&[
            ("WATCH_NAMESPACE", "builds"),
            ("BASE_BUILD_IMAGE", "quay.io/spack/centos7:latest"),
            ("BUILD_LOGIC_CONFIGMAP", "custom-logic"),
            ("BUILD_HISTORY_LIMIT", "2"),
            ("RECONCILE_CONCURRENCY", "8"),
            ("RECONCILE_DEBOUNCE_MS", "0"),
        ])
        .unwrap();

        assert_eq!(settings.watch_namespace.as_deref(), Some("builds"));
        assert_eq!(settings.base_build_image, "quay.io/spack/centos7:latest");
        assert_eq!(settings.build_logic_config_map, "custom-logic");
        assert_eq!(settings.build_history_limit, 2);
        assert_eq!(settings.concurrency, 8);
        assert_eq!(settings.debounce, Duration::ZERO);
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let settings = settings_from(&[("WATCH_NAMESPACE", "  "), ("BUILD_HISTORY_LIMIT", "")]).unwrap();
        assert_eq!(settings.watch_namespace, None);
        assert_eq!(settings.build_history_limit, DEFAULT_BUILD_HISTORY_LIMIT);
    }

    #[test]
    fn test_invalid_numbers_are_rejected() {
        for (key, value) in [
            ("BUILD_HISTORY_LIMIT", "five"),
            ("BUILD_HISTORY_LIMIT", "0"),
            ("BUILD_HISTORY_LIMIT", "-1"),
            ("RECONCILE_CONCURRENCY", "0"),
            ("RECONCILE_DEBOUNCE_MS", "soon"),
        ] {
            let err = settings_from(&[(key, value)]).unwrap_err();
            assert!(
                matches!(err, ControllerError::InvalidConfig(ref msg) if msg.contains(key)),
                "{key}={value} should be rejected, got {err}"
            );
        }
    }
}
