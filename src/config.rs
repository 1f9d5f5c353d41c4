//! Configuration module
//!
//! TOML-based persistent configuration with auto-creation and defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::domain::{ExtendedMode, SchedulingConfig, TariffPeriod, TariffWindow};

/// Root application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Station layout: pile counts, powers, waiting area
    #[serde(default)]
    pub station: StationConfig,

    /// Time-of-use pricing windows
    #[serde(default)]
    pub pricing: PricingConfig,

    /// Pile simulator endpoint
    #[serde(default)]
    pub simulator: SimulatorSettings,

    /// Logging
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind host
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Graceful shutdown timeout (seconds)
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,
}

/// Station layout and scheduling parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    /// Number of fast piles (`F1..Fn`)
    #[serde(default = "default_fast_piles")]
    pub fast_pile_count: u32,

    /// Number of slow piles (`T1..Tn`)
    #[serde(default = "default_slow_piles")]
    pub slow_pile_count: u32,

    /// Waiting-area capacity
    #[serde(default = "default_waiting_area")]
    pub waiting_area_size: u32,

    /// Per-pile queue length including the charging slot
    #[serde(default = "default_queue_len")]
    pub charging_queue_len: u32,

    /// Fast pile power (kWh/h)
    #[serde(default = "default_fast_power")]
    pub fast_power: f64,

    /// Slow pile power (kWh/h)
    #[serde(default = "default_slow_power")]
    pub slow_power: f64,

    /// Extended scheduling mode: disabled, batch or singleOptimal
    #[serde(default)]
    pub extended_mode: ExtendedMode,
}

/// Time-of-use pricing. Hour pairs are `[start, end)`; an end smaller than
/// its start wraps past midnight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    #[serde(default = "default_peak_price")]
    pub peak_price: f64,

    #[serde(default = "default_normal_price")]
    pub normal_price: f64,

    #[serde(default = "default_valley_price")]
    pub valley_price: f64,

    /// Service fee per kWh, applied in every window
    #[serde(default = "default_service_fee")]
    pub service_fee: f64,

    #[serde(default = "default_peak_hours")]
    pub peak_hours: Vec<[u32; 2]>,

    #[serde(default = "default_normal_hours")]
    pub normal_hours: Vec<[u32; 2]>,

    #[serde(default = "default_valley_hours")]
    pub valley_hours: Vec<[u32; 2]>,
}

/// Pile simulator endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorSettings {
    /// Base URL, e.g. `http://localhost:8090`
    #[serde(default = "default_simulator_url")]
    pub base_url: String,

    /// RPC timeout (seconds)
    #[serde(default = "default_simulator_timeout")]
    pub timeout_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" (human-readable) or "json" (structured)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// ── Default value helpers ──────────────────────────────────────

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
fn default_shutdown_timeout() -> u64 {
    30
}
fn default_fast_piles() -> u32 {
    2
}
fn default_slow_piles() -> u32 {
    3
}
fn default_waiting_area() -> u32 {
    6
}
fn default_queue_len() -> u32 {
    2
}
fn default_fast_power() -> f64 {
    30.0
}
fn default_slow_power() -> f64 {
    7.0
}
fn default_peak_price() -> f64 {
    1.0
}
fn default_normal_price() -> f64 {
    0.7
}
fn default_valley_price() -> f64 {
    0.4
}
fn default_service_fee() -> f64 {
    0.8
}
fn default_peak_hours() -> Vec<[u32; 2]> {
    vec![[10, 15], [18, 21]]
}
fn default_normal_hours() -> Vec<[u32; 2]> {
    vec![[7, 10], [15, 18], [21, 23]]
}
fn default_valley_hours() -> Vec<[u32; 2]> {
    vec![[23, 7]]
}
fn default_simulator_url() -> String {
    "http://localhost:8090".into()
}
fn default_simulator_timeout() -> u64 {
    10
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}

// ── Trait implementations ──────────────────────────────────────

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            station: StationConfig::default(),
            pricing: PricingConfig::default(),
            simulator: SimulatorSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            fast_pile_count: default_fast_piles(),
            slow_pile_count: default_slow_piles(),
            waiting_area_size: default_waiting_area(),
            charging_queue_len: default_queue_len(),
            fast_power: default_fast_power(),
            slow_power: default_slow_power(),
            extended_mode: ExtendedMode::default(),
        }
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            peak_price: default_peak_price(),
            normal_price: default_normal_price(),
            valley_price: default_valley_price(),
            service_fee: default_service_fee(),
            peak_hours: default_peak_hours(),
            normal_hours: default_normal_hours(),
            valley_hours: default_valley_hours(),
        }
    }
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            base_url: default_simulator_url(),
            timeout_secs: default_simulator_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// ── Convenience converters ─────────────────────────────────────

impl StationConfig {
    /// The scheduling parameters persisted into the store at bootstrap.
    pub fn scheduling_config(&self) -> SchedulingConfig {
        SchedulingConfig {
            fast_pile_count: self.fast_pile_count,
            slow_pile_count: self.slow_pile_count,
            waiting_area_size: self.waiting_area_size,
            queue_length: self.charging_queue_len,
            fast_power: self.fast_power,
            slow_power: self.slow_power,
            extended_mode: self.extended_mode,
        }
    }
}

impl PricingConfig {
    /// Expand the configured hour spans into tariff windows.
    pub fn tariff_windows(&self) -> Vec<TariffWindow> {
        let mut windows = Vec::new();
        let groups = [
            (TariffPeriod::Peak, self.peak_price, &self.peak_hours),
            (TariffPeriod::Normal, self.normal_price, &self.normal_hours),
            (TariffPeriod::Valley, self.valley_price, &self.valley_hours),
        ];
        for (period, price, spans) in groups {
            for span in spans.iter() {
                windows.push(TariffWindow {
                    period,
                    start_hour: span[0],
                    end_hour: span[1],
                    electric_fee: price,
                    service_fee: self.service_fee,
                });
            }
        }
        windows
    }
}

// ── File I/O ───────────────────────────────────────────────────

/// Default configuration directory and file
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chargegrid")
        .join("config.toml")
}

impl AppConfig {
    /// Load configuration from a TOML file.
    /// If the file doesn't exist, creates one with defaults.
    /// Environment variables override TOML values (highest priority).
    pub fn load(path: &Path) -> Result<Self, String> {
        let mut cfg = if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
            toml::from_str(&content)
                .map_err(|e| format!("Invalid TOML in {}: {}", path.display(), e))?
        } else {
            let cfg = AppConfig::default();
            cfg.save(path)?;
            cfg
        };

        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply environment variable overrides.
    ///
    /// Supported variables:
    /// - `CHARGEGRID_PORT` → `[server].port`
    /// - `CHARGEGRID_SIMULATOR_URL` → `[simulator].base_url`
    /// - `CHARGEGRID_LOG_LEVEL` → `[logging].level`
    /// - `CHARGEGRID_LOG_FORMAT` → `[logging].format`
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("CHARGEGRID_PORT") {
            if let Ok(port) = v.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(v) = std::env::var("CHARGEGRID_SIMULATOR_URL") {
            self.simulator.base_url = v;
        }
        if let Ok(v) = std::env::var("CHARGEGRID_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Ok(v) = std::env::var("CHARGEGRID_LOG_FORMAT") {
            self.logging.format = v;
        }
    }

    /// Validate the configuration for common mistakes.
    pub fn validate(&self) -> Result<(), String> {
        let mut errors = Vec::new();

        if self.station.fast_pile_count == 0 && self.station.slow_pile_count == 0 {
            errors.push("at least one pile must be configured".to_string());
        }
        if self.station.waiting_area_size == 0 {
            errors.push("waiting area size must be positive".to_string());
        }
        if self.station.charging_queue_len == 0 {
            errors.push("charging queue length must be positive".to_string());
        }
        if self.station.fast_power <= 0.0 || self.station.slow_power <= 0.0 {
            errors.push("pile powers must be positive".to_string());
        }

        if self.pricing.peak_price <= 0.0
            || self.pricing.normal_price <= 0.0
            || self.pricing.valley_price <= 0.0
        {
            errors.push("electric fees must be positive".to_string());
        }
        if self.pricing.service_fee < 0.0 {
            errors.push("service fee must not be negative".to_string());
        }
        for span in self
            .pricing
            .peak_hours
            .iter()
            .chain(&self.pricing.normal_hours)
            .chain(&self.pricing.valley_hours)
        {
            if span[0] > 24 || span[1] > 24 {
                errors.push(format!("pricing hours out of range: [{}, {}]", span[0], span[1]));
            }
        }

        if self.simulator.base_url.is_empty() {
            errors.push("simulator base URL must not be empty".to_string());
        }
        if self.server.shutdown_timeout < 5 {
            errors.push(format!(
                "shutdown timeout ({}) must be at least 5 seconds",
                self.server.shutdown_timeout
            ));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            errors.push(format!(
                "invalid log level '{}'. Valid: {:?}",
                self.logging.level, valid_levels
            ));
        }
        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.to_lowercase().as_str()) {
            errors.push(format!(
                "invalid log format '{}'. Valid: {:?}",
                self.logging.format, valid_formats
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(format!(
                "Configuration validation failed:\n  • {}",
                errors.join("\n  • ")
            ))
        }
    }

    /// Persist current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Cannot create dirs {}: {}", parent.display(), e))?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| format!("Serialization error: {}", e))?;

        let header = "# chargegrid station configuration\n\
                      # Changes take effect after a server restart.\n\n";

        std::fs::write(path, format!("{}{}", header, content))
            .map_err(|e| format!("Cannot write {}: {}", path.display(), e))?;
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_piles_is_error() {
        let mut cfg = AppConfig::default();
        cfg.station.fast_pile_count = 0;
        cfg.station.slow_pile_count = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.contains("at least one pile"));
    }

    #[test]
    fn zero_queue_len_is_error() {
        let mut cfg = AppConfig::default();
        cfg.station.charging_queue_len = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.contains("queue length"));
    }

    #[test]
    fn pricing_hours_out_of_range() {
        let mut cfg = AppConfig::default();
        cfg.pricing.peak_hours = vec![[10, 25]];
        let err = cfg.validate().unwrap_err();
        assert!(err.contains("out of range"));
    }

    #[test]
    fn invalid_log_level() {
        let mut cfg = AppConfig::default();
        cfg.logging.level = "verbose".into();
        let err = cfg.validate().unwrap_err();
        assert!(err.contains("invalid log level"));
    }

    #[test]
    fn scheduling_config_mirrors_station() {
        let cfg = AppConfig::default();
        let sched = cfg.station.scheduling_config();
        assert_eq!(sched.fast_pile_count, cfg.station.fast_pile_count);
        assert_eq!(sched.queue_length, cfg.station.charging_queue_len);
        assert_eq!(sched.fast_power, cfg.station.fast_power);
    }

    #[test]
    fn tariff_windows_expand_all_spans() {
        let cfg = AppConfig::default();
        let windows = cfg.pricing.tariff_windows();
        // 2 peak + 3 normal + 1 valley spans
        assert_eq!(windows.len(), 6);
        assert!(windows
            .iter()
            .any(|w| w.period == TariffPeriod::Valley && w.start_hour == 23 && w.end_hour == 7));
        for w in &windows {
            assert_eq!(w.service_fee, 0.8);
        }
    }

    #[test]
    fn env_overrides_port_and_url() {
        let mut cfg = AppConfig::default();
        std::env::set_var("CHARGEGRID_PORT", "9999");
        std::env::set_var("CHARGEGRID_SIMULATOR_URL", "http://sim:1234");
        cfg.apply_env_overrides();
        std::env::remove_var("CHARGEGRID_PORT");
        std::env::remove_var("CHARGEGRID_SIMULATOR_URL");
        assert_eq!(cfg.server.port, 9999);
        assert_eq!(cfg.simulator.base_url, "http://sim:1234");
    }

    #[test]
    fn env_override_invalid_port_ignored() {
        let mut cfg = AppConfig::default();
        let original = cfg.server.port;
        std::env::set_var("CHARGEGRID_PORT", "not_a_number");
        cfg.apply_env_overrides();
        std::env::remove_var("CHARGEGRID_PORT");
        assert_eq!(cfg.server.port, original);
    }

    #[test]
    fn save_and_reload() {
        let dir = std::env::temp_dir().join("chargegrid_test_config");
        let _ = std::fs::create_dir_all(&dir);
        let path = dir.join("test_config.toml");

        let cfg = AppConfig::default();
        cfg.save(&path).unwrap();
        assert!(path.exists());

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.server.port, cfg.server.port);
        assert_eq!(loaded.station.fast_pile_count, cfg.station.fast_pile_count);
        assert_eq!(loaded.pricing.peak_hours, cfg.pricing.peak_hours);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn bind_address_joins_host_and_port() {
        let mut cfg = AppConfig::default();
        cfg.server.host = "127.0.0.1".into();
        cfg.server.port = 8081;
        assert_eq!(cfg.bind_address(), "127.0.0.1:8081");
    }
}
