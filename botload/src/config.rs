use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use botload_core::{Defaults, THREAD_COUNT_LIMIT};
use botload_core::runner::RunSettings;
use serde::Deserialize;

use crate::cli::{ServeArgs, TargetArgs};

const DEFAULT_BIND: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080);

/// Effective settings after layering defaults, the config file, env vars and flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AppConfig {
    pub bind: SocketAddr,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub defaults: Defaults,
    pub run: RunSettings,
    pub log: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND,
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
            defaults: Defaults::default(),
            run: RunSettings::default(),
            log: None,
        }
    }
}

/// On-disk shape of `--config`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct FileConfig {
    bind: Option<SocketAddr>,
    bot_url: Option<String>,
    #[serde(default)]
    connect_timeout: Option<YamlDuration>,
    #[serde(default)]
    read_timeout: Option<YamlDuration>,
    thread_count: Option<u32>,
    max_thread_count: Option<u32>,
    #[serde(alias = "requestsPerWorker")]
    requests_per_thread: Option<u32>,
    #[serde(default)]
    delay_between_requests: Option<YamlDuration>,
    api_method: Option<String>,
    #[serde(default)]
    max_execution_time: Option<YamlDuration>,
    #[serde(default)]
    stop_grace_period: Option<YamlDuration>,
    log: Option<String>,
}

impl AppConfig {
    /// Built-in defaults overlaid with `path`, when given.
    pub(crate) fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut cfg = Self::default();
        if let Some(path) = path {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            cfg.apply_file(&raw)
                .with_context(|| format!("invalid config: {}", path.display()))?;
        }
        Ok(cfg)
    }

    fn apply_file(&mut self, raw: &str) -> anyhow::Result<()> {
        // An empty document parses as unit, not as a map.
        if raw.trim().is_empty() {
            return Ok(());
        }
        let file: FileConfig = serde_yaml::from_str(raw).context("failed to parse YAML")?;

        if let Some(v) = file.bind {
            self.bind = v;
        }
        if let Some(v) = file.bot_url {
            self.defaults.base_url = Some(v);
        }
        if let Some(v) = file.connect_timeout {
            self.connect_timeout = v.into_inner();
        }
        if let Some(v) = file.read_timeout {
            self.read_timeout = v.into_inner();
        }
        if let Some(v) = file.thread_count {
            self.defaults.thread_count = v;
        }
        if let Some(v) = file.max_thread_count {
            self.defaults.max_thread_count = v;
        }
        if let Some(v) = file.requests_per_thread {
            self.defaults.requests_per_worker = v;
        }
        if let Some(v) = file.delay_between_requests {
            self.defaults.delay = v.into_inner();
        }
        if let Some(v) = file.api_method {
            self.defaults.api_method = v;
        }
        if let Some(v) = file.max_execution_time {
            self.run.max_execution_time = v.into_inner();
        }
        if let Some(v) = file.stop_grace_period {
            self.run.stop_grace_period = v.into_inner();
        }
        if file.log.is_some() {
            self.log = file.log;
        }
        Ok(())
    }

    /// Flag/env values win over whatever was loaded from the file.
    pub(crate) fn apply_target(&mut self, args: &TargetArgs) {
        if let Some(v) = &args.bot_url {
            self.defaults.base_url = Some(v.clone());
        }
        if let Some(v) = args.connect_timeout {
            self.connect_timeout = v;
        }
        if let Some(v) = args.read_timeout {
            self.read_timeout = v;
        }
        if let Some(v) = args.max_execution_time {
            self.run.max_execution_time = v;
        }
        if let Some(v) = args.stop_grace_period {
            self.run.stop_grace_period = v;
        }
    }

    pub(crate) fn apply_serve(&mut self, args: &ServeArgs) {
        if let Some(v) = args.bind {
            self.bind = v;
        }
        if let Some(v) = args.default_threads {
            self.defaults.thread_count = v;
        }
        if let Some(v) = args.max_threads {
            self.defaults.max_thread_count = v;
        }
        if let Some(v) = args.default_requests {
            self.defaults.requests_per_worker = v;
        }
        if let Some(v) = args.default_delay {
            self.defaults.delay = v;
        }
        if let Some(v) = &args.api_method {
            self.defaults.api_method = v.clone();
        }
        self.apply_target(&args.target);
    }

    pub(crate) fn validate(&self) -> anyhow::Result<()> {
        if self.defaults.thread_count == 0 {
            anyhow::bail!("default thread count must be a positive integer");
        }
        let max = self.defaults.max_thread_count;
        if max == 0 || max > THREAD_COUNT_LIMIT {
            anyhow::bail!("max thread count must be between 1 and {THREAD_COUNT_LIMIT}");
        }
        if self.defaults.thread_count > max {
            anyhow::bail!("default thread count must not exceed the max thread count ({max})");
        }
        if self.defaults.requests_per_worker == 0 {
            anyhow::bail!("default requests per thread must be a positive integer");
        }
        if self.defaults.api_method.trim().is_empty() {
            anyhow::bail!("default api method must not be blank");
        }
        if self.connect_timeout.is_zero() || self.read_timeout.is_zero() {
            anyhow::bail!("connect and read timeouts must be greater than zero");
        }
        if self.run.max_execution_time.is_zero() {
            anyhow::bail!("max execution time must be greater than zero");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct YamlDuration(Duration);

impl YamlDuration {
    fn into_inner(self) -> Duration {
        self.0
    }
}

impl<'de> Deserialize<'de> for YamlDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl serde::de::Visitor<'_> for V {
            type Value = YamlDuration;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("duration as string (e.g. 250ms, 10s), integer seconds, or float seconds")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(YamlDuration(Duration::from_secs(v)))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u64::try_from(v)
                    .map(|secs| YamlDuration(Duration::from_secs(secs)))
                    .map_err(|_| E::custom("duration must not be negative"))
            }

            fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if !v.is_finite() || v < 0.0 {
                    return Err(E::custom("duration must be a non-negative, finite number"));
                }
                Ok(YamlDuration(Duration::from_secs_f64(v)))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let d = humantime::parse_duration(v.trim()).map_err(E::custom)?;
                Ok(YamlDuration(d))
            }
        }

        deserializer.deserialize_any(V)
    }
}
