//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and every field is optional; anything left out takes the
//! default below. One file configures both roles: the airside process reads
//! `[airside]` and `[outbound]`, the groundstation reads `[groundstation]`
//! and `[recording]`, both read `[ingest]` and `[logging]`.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{RelayError, Result};
use crate::transport::bluetooth::is_valid_address;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub airside: AirsideConfig,
    #[serde(default)]
    pub outbound: OutboundConfig,
    #[serde(default)]
    pub groundstation: GroundstationConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub recording: RecordingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Flight-controller input (airside)
#[derive(Debug, Deserialize, Clone)]
pub struct AirsideConfig {
    #[serde(default = "default_fc_port")]
    pub fc_port: String,

    #[serde(default = "default_baud_rate")]
    pub fc_baud_rate: u32,
}

/// Outbound links the airside relay writes to
#[derive(Debug, Deserialize, Clone)]
pub struct OutboundConfig {
    #[serde(default = "default_true")]
    pub udp_enabled: bool,

    #[serde(default = "default_udp_host")]
    pub udp_host: String,

    #[serde(default = "default_udp_port")]
    pub udp_port: u16,

    #[serde(default = "default_true")]
    pub bluetooth_enabled: bool,

    #[serde(default = "default_bluetooth_address")]
    pub bluetooth_address: String,

    #[serde(default = "default_bluetooth_channel")]
    pub bluetooth_channel: u8,

    /// RFCOMM TTY bound to `bluetooth_address`
    #[serde(default = "default_bluetooth_device")]
    pub bluetooth_device: String,

    #[serde(default = "default_true")]
    pub radio_enabled: bool,

    #[serde(default = "default_radio_port")]
    pub radio_port: String,

    #[serde(default = "default_baud_rate")]
    pub radio_baud_rate: u32,

    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
}

/// Inbound links on the groundstation
#[derive(Debug, Deserialize, Clone)]
pub struct GroundstationConfig {
    #[serde(default = "default_udp_port")]
    pub udp_bind_port: u16,

    #[serde(default = "default_baud_rate")]
    pub radio_baud_rate: u32,

    #[serde(default = "default_rc_baud_rate")]
    pub rc_baud_rate: u32,

    /// Serial devices to search; empty means platform detection
    #[serde(default)]
    pub candidate_ports: Vec<String>,

    /// Devices for the radio worker only; empty falls back to `candidate_ports`
    #[serde(default)]
    pub radio_ports: Vec<String>,

    /// Devices for the RC worker only; empty falls back to `candidate_ports`
    #[serde(default)]
    pub rc_ports: Vec<String>,
}

/// Read and reconnect timing shared by every reader
#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_udp_buffer_size")]
    pub udp_buffer_size: usize,
}

/// Snapshot recording (groundstation)
#[derive(Debug, Deserialize, Clone)]
pub struct RecordingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,

    #[serde(default = "default_record_interval_ms")]
    pub interval_ms: u64,
}

/// Diagnostic log output
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Also write a daily rolling log file here when set
    #[serde(default)]
    pub file_dir: Option<String>,
}

// Default value functions
fn default_true() -> bool { true }
fn default_baud_rate() -> u32 { 115200 }

fn default_fc_port() -> String { "/dev/ttyAMA0".to_string() }

fn default_udp_host() -> String { "192.168.1.100".to_string() }
fn default_udp_port() -> u16 { 14550 }
fn default_bluetooth_address() -> String { "00:11:22:33:44:55".to_string() }
fn default_bluetooth_channel() -> u8 { 1 }
fn default_bluetooth_device() -> String { "/dev/rfcomm0".to_string() }
fn default_radio_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_write_timeout_ms() -> u64 { 1000 }

fn default_rc_baud_rate() -> u32 { 57600 }

fn default_read_timeout_ms() -> u64 { 1000 }
fn default_retry_delay_ms() -> u64 { 100 }
fn default_udp_buffer_size() -> usize { 1024 }

fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }
fn default_record_interval_ms() -> u64 { 1000 }

fn default_log_level() -> String { "info".to_string() }

/// Line speeds accepted for any serial link
const VALID_BAUD_RATES: &[u32] = &[9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600];

const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Default for AirsideConfig {
    fn default() -> Self {
        Self {
            fc_port: default_fc_port(),
            fc_baud_rate: default_baud_rate(),
        }
    }
}

impl Default for OutboundConfig {
    fn default() -> Self {
        Self {
            udp_enabled: true,
            udp_host: default_udp_host(),
            udp_port: default_udp_port(),
            bluetooth_enabled: true,
            bluetooth_address: default_bluetooth_address(),
            bluetooth_channel: default_bluetooth_channel(),
            bluetooth_device: default_bluetooth_device(),
            radio_enabled: true,
            radio_port: default_radio_port(),
            radio_baud_rate: default_baud_rate(),
            write_timeout_ms: default_write_timeout_ms(),
        }
    }
}

impl Default for GroundstationConfig {
    fn default() -> Self {
        Self {
            udp_bind_port: default_udp_port(),
            radio_baud_rate: default_baud_rate(),
            rc_baud_rate: default_rc_baud_rate(),
            candidate_ports: Vec::new(),
            radio_ports: Vec::new(),
            rc_ports: Vec::new(),
        }
    }
}

impl GroundstationConfig {
    /// Devices the radio worker searches
    pub fn radio_candidates(&self) -> &[String] {
        pinned_or_shared(&self.radio_ports, &self.candidate_ports)
    }

    /// Devices the RC worker searches
    pub fn rc_candidates(&self) -> &[String] {
        pinned_or_shared(&self.rc_ports, &self.candidate_ports)
    }
}

fn pinned_or_shared<'a>(pinned: &'a [String], shared: &'a [String]) -> &'a [String] {
    if pinned.is_empty() {
        shared
    } else {
        pinned
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: default_read_timeout_ms(),
            retry_delay_ms: default_retry_delay_ms(),
            udp_buffer_size: default_udp_buffer_size(),
        }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_dir: default_log_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
            interval_ms: default_record_interval_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_dir: None,
        }
    }
}

impl OutboundConfig {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

impl IngestConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl RecordingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

fn invalid(message: impl std::fmt::Display) -> RelayError {
    RelayError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use telemetry_relay::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults
    ///
    /// A file that exists and is invalid is still an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Config::default())
        }
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        // Airside input
        if self.airside.fc_port.is_empty() {
            return Err(invalid("fc_port cannot be empty"));
        }

        for (name, baud) in [
            ("fc_baud_rate", self.airside.fc_baud_rate),
            ("outbound radio_baud_rate", self.outbound.radio_baud_rate),
            ("groundstation radio_baud_rate", self.groundstation.radio_baud_rate),
            ("rc_baud_rate", self.groundstation.rc_baud_rate),
        ] {
            if !VALID_BAUD_RATES.contains(&baud) {
                return Err(invalid(format!(
                    "{} must be one of: {:?}",
                    name, VALID_BAUD_RATES
                )));
            }
        }

        // Outbound links
        let outbound = &self.outbound;
        if outbound.udp_enabled {
            if outbound.udp_host.is_empty() {
                return Err(invalid("udp_host cannot be empty when UDP is enabled"));
            }
            if outbound.udp_port == 0 {
                return Err(invalid("udp_port must be greater than 0"));
            }
        }

        if outbound.bluetooth_enabled {
            if !is_valid_address(&outbound.bluetooth_address) {
                return Err(invalid(format!(
                    "bluetooth_address {:?} is not of the form XX:XX:XX:XX:XX:XX",
                    outbound.bluetooth_address
                )));
            }
            // RFCOMM channels are 1-30
            if outbound.bluetooth_channel == 0 || outbound.bluetooth_channel > 30 {
                return Err(invalid("bluetooth_channel must be between 1 and 30"));
            }
            if outbound.bluetooth_device.is_empty() {
                return Err(invalid("bluetooth_device cannot be empty when Bluetooth is enabled"));
            }
        }

        if outbound.radio_enabled && outbound.radio_port.is_empty() {
            return Err(invalid("radio_port cannot be empty when the radio is enabled"));
        }

        if outbound.write_timeout_ms == 0 || outbound.write_timeout_ms > 10000 {
            return Err(invalid("write_timeout_ms must be between 1 and 10000"));
        }

        // Groundstation
        if self.groundstation.udp_bind_port == 0 {
            return Err(invalid("udp_bind_port must be greater than 0"));
        }

        for (name, ports) in [
            ("candidate_ports", &self.groundstation.candidate_ports),
            ("radio_ports", &self.groundstation.radio_ports),
            ("rc_ports", &self.groundstation.rc_ports),
        ] {
            if ports.iter().any(|p| p.is_empty()) {
                return Err(invalid(format!("{} cannot contain empty entries", name)));
            }
        }

        let gs = &self.groundstation;
        if !gs.radio_ports.is_empty() && gs.radio_ports.iter().any(|p| gs.rc_ports.contains(p)) {
            return Err(invalid("radio_ports and rc_ports cannot share a device"));
        }

        // Timing
        if self.ingest.read_timeout_ms == 0 || self.ingest.read_timeout_ms > 10000 {
            return Err(invalid("read_timeout_ms must be between 1 and 10000"));
        }

        if self.ingest.retry_delay_ms == 0 || self.ingest.retry_delay_ms > 60000 {
            return Err(invalid("retry_delay_ms must be between 1 and 60000"));
        }

        if self.ingest.udp_buffer_size < 64 || self.ingest.udp_buffer_size > 65536 {
            return Err(invalid("udp_buffer_size must be between 64 and 65536"));
        }

        // Recording
        if self.recording.enabled && self.recording.log_dir.is_empty() {
            return Err(invalid("recording log_dir cannot be empty when enabled"));
        }

        if self.recording.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if self.recording.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        if self.recording.interval_ms == 0 || self.recording.interval_ms > 60000 {
            return Err(invalid("recording interval_ms must be between 1 and 60000"));
        }

        // Logging
        if !VALID_LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(invalid(format!(
                "logging level must be one of: {}",
                VALID_LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_valid_config() -> Config {
        Config::default()
    }

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(contents.as_bytes()).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    #[test]
    fn test_default_config() {
        let config = create_valid_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.airside.fc_port, "/dev/ttyAMA0");
        assert_eq!(config.outbound.udp_host, "192.168.1.100");
        assert_eq!(config.groundstation.udp_bind_port, 14550);
        assert_eq!(config.ingest.read_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_load_config_from_file() {
        let temp_file = write_temp(
            r#"
[airside]
fc_port = "/dev/serial0"

[outbound]
udp_host = "10.0.0.2"
bluetooth_enabled = false

[groundstation]
candidate_ports = ["/dev/ttyUSB1", "/dev/ttyUSB2"]

[ingest]
retry_delay_ms = 250
"#,
        );

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.airside.fc_port, "/dev/serial0");
        assert_eq!(config.airside.fc_baud_rate, 115200);
        assert_eq!(config.outbound.udp_host, "10.0.0.2");
        assert!(!config.outbound.bluetooth_enabled);
        assert_eq!(config.groundstation.candidate_ports.len(), 2);
        assert_eq!(config.ingest.retry_delay(), Duration::from_millis(250));
        assert_eq!(config.recording.log_dir, "./logs");
    }

    #[test]
    fn test_empty_file_is_all_defaults() {
        let temp_file = write_temp("");
        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.groundstation.rc_baud_rate, 57600);
        assert!(config.groundstation.candidate_ports.is_empty());
    }

    #[test]
    fn test_bundled_default_config_is_valid() {
        let config: Config = toml::from_str(include_str!("../config/default.toml")).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.outbound.udp_port, 14550);
    }

    #[test]
    fn test_load_or_default_invalid_file_is_error() {
        let temp_file = write_temp("[ingest]\nread_timeout_ms = 0\n");
        assert!(Config::load_or_default(temp_file.path()).is_err());
    }

    #[test]
    fn test_malformed_toml() {
        let temp_file = write_temp("[airside\nfc_port = ");
        assert!(matches!(
            Config::load(temp_file.path()),
            Err(RelayError::Config(_))
        ));
    }

    #[test]
    fn test_empty_fc_port() {
        let mut config = create_valid_config();
        config.airside.fc_port = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_baud_rate() {
        let mut config = create_valid_config();
        config.groundstation.rc_baud_rate = 12345;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_valid_baud_rates() {
        for &rate in VALID_BAUD_RATES {
            let mut config = create_valid_config();
            config.airside.fc_baud_rate = rate;
            assert!(config.validate().is_ok(), "Baud rate {} should be valid", rate);
        }
    }

    #[test]
    fn test_udp_port_zero() {
        let mut config = create_valid_config();
        config.outbound.udp_port = 0;
        assert!(config.validate().is_err());

        config.outbound.udp_enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_bluetooth_address() {
        let mut config = create_valid_config();
        config.outbound.bluetooth_address = "00:11:22".to_string();
        assert!(config.validate().is_err());

        config.outbound.bluetooth_enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bluetooth_channel_range() {
        let mut config = create_valid_config();
        config.outbound.bluetooth_channel = 0;
        assert!(config.validate().is_err());
        config.outbound.bluetooth_channel = 31;
        assert!(config.validate().is_err());
        config.outbound.bluetooth_channel = 30;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_radio_port_when_enabled() {
        let mut config = create_valid_config();
        config.outbound.radio_port = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_write_timeout_range() {
        let mut config = create_valid_config();
        config.outbound.write_timeout_ms = 0;
        assert!(config.validate().is_err());
        config.outbound.write_timeout_ms = 10001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_udp_bind_port_zero() {
        let mut config = create_valid_config();
        config.groundstation.udp_bind_port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_candidate_port() {
        let mut config = create_valid_config();
        config.groundstation.candidate_ports = vec!["/dev/ttyUSB0".into(), String::new()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_radio_and_rc_ports_fall_back_to_shared_list() {
        let temp_file = write_temp(
            r#"
[groundstation]
candidate_ports = ["/dev/ttyUSB0", "/dev/ttyUSB1"]
radio_ports = ["/dev/ttyACM0"]
"#,
        );

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.groundstation.radio_candidates(), ["/dev/ttyACM0".to_string()]);
        assert_eq!(
            config.groundstation.rc_candidates(),
            ["/dev/ttyUSB0".to_string(), "/dev/ttyUSB1".to_string()]
        );

        let defaults = create_valid_config();
        assert!(defaults.groundstation.radio_candidates().is_empty());
        assert!(defaults.groundstation.rc_candidates().is_empty());
    }

    #[test]
    fn test_radio_and_rc_ports_must_not_overlap() {
        let mut config = create_valid_config();
        config.groundstation.radio_ports = vec!["/dev/ttyACM0".into()];
        config.groundstation.rc_ports = vec!["/dev/ttyUSB0".into()];
        assert!(config.validate().is_ok());

        config.groundstation.rc_ports.push("/dev/ttyACM0".into());
        assert!(config.validate().is_err());

        config.groundstation.rc_ports = vec![String::new()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_read_timeout_range() {
        let mut config = create_valid_config();
        config.ingest.read_timeout_ms = 0;
        assert!(config.validate().is_err());
        config.ingest.read_timeout_ms = 10001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_delay_range() {
        let mut config = create_valid_config();
        config.ingest.retry_delay_ms = 0;
        assert!(config.validate().is_err());
        config.ingest.retry_delay_ms = 60001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_udp_buffer_size_range() {
        let mut config = create_valid_config();
        config.ingest.udp_buffer_size = 16;
        assert!(config.validate().is_err());
        config.ingest.udp_buffer_size = 70000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_dir_when_enabled() {
        let mut config = create_valid_config();
        config.recording.log_dir = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_dir_when_disabled() {
        let mut config = create_valid_config();
        config.recording.enabled = false;
        config.recording.log_dir = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_recording_limits_zero() {
        let mut config = create_valid_config();
        config.recording.max_records_per_file = 0;
        assert!(config.validate().is_err());

        let mut config = create_valid_config();
        config.recording.max_files_to_keep = 0;
        assert!(config.validate().is_err());

        let mut config = create_valid_config();
        config.recording.interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut config = create_valid_config();
        config.logging.level = "DEBUG".to_string();
        assert!(config.validate().is_ok());
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_fc_port(), "/dev/ttyAMA0");
        assert_eq!(default_baud_rate(), 115200);
        assert_eq!(default_udp_host(), "192.168.1.100");
        assert_eq!(default_udp_port(), 14550);
        assert_eq!(default_bluetooth_address(), "00:11:22:33:44:55");
        assert_eq!(default_bluetooth_channel(), 1);
        assert_eq!(default_bluetooth_device(), "/dev/rfcomm0");
        assert_eq!(default_radio_port(), "/dev/ttyUSB0");
        assert_eq!(default_write_timeout_ms(), 1000);
        assert_eq!(default_rc_baud_rate(), 57600);
        assert_eq!(default_read_timeout_ms(), 1000);
        assert_eq!(default_retry_delay_ms(), 100);
        assert_eq!(default_udp_buffer_size(), 1024);
        assert_eq!(default_log_dir(), "./logs");
        assert_eq!(default_max_records_per_file(), 10000);
        assert_eq!(default_max_files_to_keep(), 10);
        assert_eq!(default_record_interval_ms(), 1000);
        assert_eq!(default_log_level(), "info");
    }
}
