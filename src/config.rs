//! Service configuration.
//!
//! Every runtime knob lives in [`ServiceConfig`], built through
//! [`ServiceConfigBuilder`] or read from the environment with
//! [`ServiceConfig::from_env`]. The CLI maps its flags onto the same builder.
//!
//! # Environment variables
//!
//! | Variable | Field |
//! |----------|-------|
//! | `DOCWEAVE_STORE` | `store_root` |
//! | `DOCWEAVE_SWEEP_INTERVAL_SECS` | `sweep_interval` |
//! | `DOCWEAVE_MAX_AGE_SECS` | both max ages |
//! | `DOCWEAVE_INBOUND_MAX_AGE_SECS` | `inbound_max_age` |
//! | `DOCWEAVE_OUTBOUND_MAX_AGE_SECS` | `outbound_max_age` |
//! | `DOCWEAVE_CONVERSION_TIMEOUT_SECS` | `conversion_timeout` |
//! | `DOCWEAVE_SOFFICE_PATH` | `soffice_path` |
//! | `FRONTEND_URL` | appended to `allowed_origins` |
//! | `DOCWEAVE_BIND` | `bind_addr` |

use crate::error::{DocWeaveError, Result};
use crate::store::Retention;
use crate::sweeper::SweepPolicy;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a [`crate::service::DocWeave`] instance.
///
/// # Example
/// ```rust
/// use docweave::ServiceConfig;
/// use std::time::Duration;
///
/// let config = ServiceConfig::builder()
///     .store_root("/tmp/docweave")
///     .max_age(Duration::from_secs(600))
///     .build()
///     .unwrap();
/// assert_eq!(config.outbound_max_age, Duration::from_secs(600));
/// ```
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Directory holding the `inbound/`, `outbound/` and `.staging/` trees.
    /// Default: `<system temp>/docweave`.
    pub store_root: PathBuf,

    /// Time between two sweeper passes. Default: 10 minutes.
    pub sweep_interval: Duration,

    /// Retention of uploaded sources. Default: 30 minutes.
    pub inbound_max_age: Duration,

    /// Retention of composed outputs. Default: 30 minutes.
    pub outbound_max_age: Duration,

    /// Upper bound for one DOCX conversion. Default: 120 s.
    pub conversion_timeout: Duration,

    /// Resolution used to size image pages (points = px × 72 / dpi).
    /// Range: 10–1200. Default: 100.
    pub image_dpi: f32,

    /// Colour transparent image pixels are composited onto. Default: white.
    pub flatten_background: [u8; 3],

    /// Explicit `soffice` executable; discovered when `None`.
    pub soffice_path: Option<PathBuf>,

    /// Files of one upload batch normalized concurrently. Default: 4.
    pub ingest_concurrency: usize,

    /// Origins allowed by the HTTP CORS layer.
    pub allowed_origins: Vec<String>,

    /// Listen address of the HTTP server. Default: `127.0.0.1:5000`.
    pub bind_addr: SocketAddr,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            store_root: std::env::temp_dir().join("docweave"),
            sweep_interval: Duration::from_secs(10 * 60),
            inbound_max_age: Duration::from_secs(30 * 60),
            outbound_max_age: Duration::from_secs(30 * 60),
            conversion_timeout: Duration::from_secs(120),
            image_dpi: 100.0,
            flatten_background: [255, 255, 255],
            soffice_path: None,
            ingest_concurrency: 4,
            allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:3000".to_string(),
            ],
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
        }
    }
}

impl ServiceConfig {
    /// Create a new builder starting from the defaults.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }

    /// Defaults overlaid with the `DOCWEAVE_*` / `FRONTEND_URL` environment.
    pub fn from_env() -> Result<Self> {
        Self::builder().env_overrides(|key| std::env::var(key).ok())?.build()
    }

    pub fn retention(&self) -> Retention {
        Retention {
            inbound: self.inbound_max_age,
            outbound: self.outbound_max_age,
        }
    }

    pub fn sweep_policy(&self) -> SweepPolicy {
        SweepPolicy {
            interval: self.sweep_interval,
            inbound_max_age: self.inbound_max_age,
            outbound_max_age: self.outbound_max_age,
        }
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn store_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.store_root = root.into();
        self
    }

    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    /// Set both partitions' retention.
    pub fn max_age(mut self, age: Duration) -> Self {
        self.config.inbound_max_age = age;
        self.config.outbound_max_age = age;
        self
    }

    pub fn inbound_max_age(mut self, age: Duration) -> Self {
        self.config.inbound_max_age = age;
        self
    }

    pub fn outbound_max_age(mut self, age: Duration) -> Self {
        self.config.outbound_max_age = age;
        self
    }

    pub fn conversion_timeout(mut self, timeout: Duration) -> Self {
        self.config.conversion_timeout = timeout;
        self
    }

    pub fn image_dpi(mut self, dpi: f32) -> Self {
        self.config.image_dpi = dpi.clamp(10.0, 1200.0);
        self
    }

    pub fn flatten_background(mut self, rgb: [u8; 3]) -> Self {
        self.config.flatten_background = rgb;
        self
    }

    pub fn soffice_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.soffice_path = Some(path.into());
        self
    }

    pub fn ingest_concurrency(mut self, n: usize) -> Self {
        self.config.ingest_concurrency = n.max(1);
        self
    }

    /// Replace the CORS allow-list.
    pub fn allowed_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.allowed_origins = origins.into_iter().map(Into::into).collect();
        self
    }

    /// Add one origin to the CORS allow-list (duplicates are ignored).
    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        let origin = origin.into();
        if !self.config.allowed_origins.contains(&origin) {
            self.config.allowed_origins.push(origin);
        }
        self
    }

    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.config.bind_addr = addr;
        self
    }

    /// Apply overrides from an environment lookup function.
    ///
    /// Unset variables leave the current value alone; unparseable values are
    /// an [`DocWeaveError::InvalidConfig`].
    pub fn env_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secs = |key: &str| -> Result<Option<Duration>> {
            lookup(key)
                .map(|v| {
                    v.trim().parse::<u64>().map(Duration::from_secs).map_err(|_| {
                        DocWeaveError::InvalidConfig(format!("{key} must be a number of seconds, got '{v}'"))
                    })
                })
                .transpose()
        };

        if let Some(root) = lookup("DOCWEAVE_STORE") {
            self = self.store_root(root);
        }
        if let Some(d) = secs("DOCWEAVE_SWEEP_INTERVAL_SECS")? {
            self = self.sweep_interval(d);
        }
        if let Some(d) = secs("DOCWEAVE_MAX_AGE_SECS")? {
            self = self.max_age(d);
        }
        if let Some(d) = secs("DOCWEAVE_INBOUND_MAX_AGE_SECS")? {
            self = self.inbound_max_age(d);
        }
        if let Some(d) = secs("DOCWEAVE_OUTBOUND_MAX_AGE_SECS")? {
            self = self.outbound_max_age(d);
        }
        if let Some(d) = secs("DOCWEAVE_CONVERSION_TIMEOUT_SECS")? {
            self = self.conversion_timeout(d);
        }
        if let Some(path) = lookup(office_auto::SOFFICE_PATH_ENV) {
            self = self.soffice_path(path);
        }
        if let Some(url) = lookup("FRONTEND_URL").filter(|u| !u.trim().is_empty()) {
            self = self.allow_origin(url.trim());
        }
        if let Some(bind) = lookup("DOCWEAVE_BIND") {
            let addr = bind
                .parse()
                .map_err(|_| DocWeaveError::InvalidConfig(format!("DOCWEAVE_BIND is not a socket address: '{bind}'")))?;
            self = self.bind_addr(addr);
        }
        Ok(self)
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig> {
        let c = &self.config;
        if c.sweep_interval.is_zero() {
            return Err(DocWeaveError::InvalidConfig(
                "Sweep interval must be > 0".into(),
            ));
        }
        if c.inbound_max_age.is_zero() || c.outbound_max_age.is_zero() {
            return Err(DocWeaveError::InvalidConfig(
                "Retention must be > 0".into(),
            ));
        }
        if c.conversion_timeout.is_zero() {
            return Err(DocWeaveError::InvalidConfig(
                "Conversion timeout must be > 0".into(),
            ));
        }
        if c.store_root.as_os_str().is_empty() {
            return Err(DocWeaveError::InvalidConfig("Store root must not be empty".into()));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let c = ServiceConfig::default();
        assert_eq!(c.sweep_interval, Duration::from_secs(600));
        assert_eq!(c.inbound_max_age, Duration::from_secs(1800));
        assert_eq!(c.outbound_max_age, Duration::from_secs(1800));
        assert_eq!(c.image_dpi, 100.0);
        assert!(c.allowed_origins.contains(&"http://localhost:5173".to_string()));
    }

    #[test]
    fn env_overrides_apply_in_order() {
        let c = ServiceConfig::builder()
            .env_overrides(env(&[
                ("DOCWEAVE_STORE", "/srv/dw"),
                ("DOCWEAVE_MAX_AGE_SECS", "60"),
                ("DOCWEAVE_OUTBOUND_MAX_AGE_SECS", "90"),
                ("FRONTEND_URL", "https://app.example.com"),
                ("DOCWEAVE_BIND", "0.0.0.0:8080"),
            ]))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(c.store_root, PathBuf::from("/srv/dw"));
        assert_eq!(c.inbound_max_age, Duration::from_secs(60));
        assert_eq!(c.outbound_max_age, Duration::from_secs(90));
        assert_eq!(c.allowed_origins.len(), 3);
        assert_eq!(c.bind_addr.port(), 8080);
    }

    #[test]
    fn bad_env_values_are_rejected() {
        let err = ServiceConfig::builder()
            .env_overrides(env(&[("DOCWEAVE_SWEEP_INTERVAL_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, DocWeaveError::InvalidConfig(_)));
    }

    #[test]
    fn zero_durations_fail_validation() {
        assert!(ServiceConfig::builder().max_age(Duration::ZERO).build().is_err());
        assert!(ServiceConfig::builder().sweep_interval(Duration::ZERO).build().is_err());
    }

    #[test]
    fn setters_clamp() {
        let c = ServiceConfig::builder()
            .image_dpi(1.0)
            .ingest_concurrency(0)
            .allow_origin("http://localhost:3000")
            .build()
            .unwrap();
        assert_eq!(c.image_dpi, 10.0);
        assert_eq!(c.ingest_concurrency, 1);
        assert_eq!(c.allowed_origins.len(), 2);
    }
}
