use clap::{ Parser, ValueEnum };
use log::LevelFilter;
use thiserror::Error;
use yaml_rust::{ Yaml, YamlLoader };

use std::path::{ Path, PathBuf };
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "wss://stats.x3c.ca";
pub const DEFAULT_CONVERGENCE_RATE: f64 = 0.03;
pub const DEFAULT_FRAME_RATE: u32 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {}: {source}", path.display())]
    Io { path: PathBuf, source: std::io::Error },
    #[error("failed to parse yaml: {0}")]
    Yaml(#[from] yaml_rust::ScanError),
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputKind {
    /// Human readable status and stats through the logger
    Log,
    /// One JSON object per frame on stdout
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "loadwaves")]
#[command(about = "Animate shader parameters from a live server stats stream")]
pub struct CliArgs {
    /// YAML file with settings; flags given here win over it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// WebSocket endpoint streaming the stats
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Fraction of the remaining gap closed per frame, in (0, 1]
    #[arg(long)]
    pub convergence_rate: Option<f64>,

    /// Frames per second driving the interpolation
    #[arg(long)]
    pub frame_rate: Option<u32>,

    #[arg(long, value_enum)]
    pub output: Option<OutputKind>,

    /// off, error, warn, info, debug or trace. RUST_LOG still applies on top.
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub endpoint: String,
    pub convergence_rate: f64,
    pub frame_rate: u32,
    pub output: OutputKind,
    pub log_level: LevelFilter,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            convergence_rate: DEFAULT_CONVERGENCE_RATE,
            frame_rate: DEFAULT_FRAME_RATE,
            output: OutputKind::Log,
            log_level: LevelFilter::Info,
        }
    }
}

fn as_number(value: &Yaml) -> Option<f64> {
    match value {
        Yaml::Integer(number) => Some(*number as f64),
        Yaml::Real(_) => value.as_f64(),
        _ => None,
    }
}

fn invalid(key: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue { key, reason: reason.into() }
}

fn parse_level(key: &'static str, level: &str) -> Result<LevelFilter, ConfigError> {
    LevelFilter::from_str(level).map_err(|_| invalid(key, format!("unknown log level '{}'", level)))
}

fn parse_output(output: &str) -> Result<OutputKind, ConfigError> {
    <OutputKind as ValueEnum>::from_str(output, true).map_err(|_| invalid("output", format!("expected log or json, got '{}'", output)))
}

impl Settings {
    pub fn frame_period(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.frame_rate))
    }

    /// Layers a YAML document over the current values. Missing keys keep
    /// their value, unknown keys are ignored.
    pub fn merge_yaml(mut self, source: &str) -> Result<Settings, ConfigError> {
        let docs = YamlLoader::load_from_str(source)?;
        let doc = match docs.first() {
            Some(doc) => doc,
            None => return Ok(self),
        };

        match &doc["endpoint"] {
            Yaml::BadValue => {},
            Yaml::String(endpoint) => self.endpoint = endpoint.clone(),
            _ => return Err(invalid("endpoint", "expected a string")),
        }

        match &doc["convergence_rate"] {
            Yaml::BadValue => {},
            value => self.convergence_rate = as_number(value)
                .ok_or_else(|| invalid("convergence_rate", "expected a number"))?,
        }

        match &doc["frame_rate"] {
            Yaml::BadValue => {},
            Yaml::Integer(rate) => self.frame_rate = u32::try_from(*rate)
                .map_err(|_| invalid("frame_rate", format!("{} is out of range", rate)))?,
            _ => return Err(invalid("frame_rate", "expected an integer")),
        }

        match &doc["output"] {
            Yaml::BadValue => {},
            Yaml::String(output) => self.output = parse_output(output)?,
            _ => return Err(invalid("output", "expected log or json")),
        }

        match &doc["log_level"] {
            Yaml::BadValue => {},
            Yaml::String(level) => self.log_level = parse_level("log_level", level)?,
            _ => return Err(invalid("log_level", "expected a string")),
        }

        Ok(self)
    }

    pub fn load(self, path: &Path) -> Result<Settings, ConfigError> {
        let source = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        self.merge_yaml(&source)
    }

    /// Defaults, then the config file if any, then the flags.
    pub fn resolve(args: &CliArgs) -> Result<Settings, ConfigError> {
        let mut settings = Settings::default();
        if let Some(path) = &args.config {
            settings = settings.load(path)?;
        }

        if let Some(endpoint) = &args.endpoint {
            settings.endpoint = endpoint.clone();
        }
        if let Some(rate) = args.convergence_rate {
            settings.convergence_rate = rate;
        }
        if let Some(frame_rate) = args.frame_rate {
            settings.frame_rate = frame_rate;
        }
        if let Some(output) = args.output {
            settings.output = output;
        }
        if let Some(level) = &args.log_level {
            settings.log_level = parse_level("log-level", level)?;
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.convergence_rate > 0.0 && self.convergence_rate <= 1.0) {
            return Err(invalid("convergence_rate", format!("{} is outside (0, 1]", self.convergence_rate)));
        }
        if self.frame_rate == 0 {
            return Err(invalid("frame_rate", "must be at least 1"));
        }
        if self.endpoint.is_empty() {
            return Err(invalid("endpoint", "must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_the_stats_shader() {
        let settings = Settings::default();
        assert_eq!(settings.endpoint, "wss://stats.x3c.ca");
        assert_eq!(settings.convergence_rate, 0.03);
        assert_eq!(settings.frame_rate, 60);
        assert_eq!(settings.output, OutputKind::Log);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn yaml_overrides_known_keys() {
        let settings = Settings::default().merge_yaml("
endpoint: ws://localhost:9000
convergence_rate: 0.1
frame_rate: 30
output: json
log_level: debug
colour: blue
").unwrap();
        assert_eq!(settings.endpoint, "ws://localhost:9000");
        assert_eq!(settings.convergence_rate, 0.1);
        assert_eq!(settings.frame_rate, 30);
        assert_eq!(settings.output, OutputKind::Json);
        assert_eq!(settings.log_level, LevelFilter::Debug);
    }

    #[test]
    fn integer_convergence_rate_is_accepted() {
        let settings = Settings::default().merge_yaml("convergence_rate: 1").unwrap();
        assert_eq!(settings.convergence_rate, 1.0);
    }

    #[test]
    fn empty_yaml_keeps_defaults() {
        assert_eq!(Settings::default().merge_yaml("").unwrap(), Settings::default());
    }

    #[test]
    fn wrong_types_are_rejected() {
        assert!(matches!(
            Settings::default().merge_yaml("frame_rate: fast"),
            Err(ConfigError::InvalidValue { key: "frame_rate", .. })
        ));
        assert!(matches!(
            Settings::default().merge_yaml("convergence_rate: [1]"),
            Err(ConfigError::InvalidValue { key: "convergence_rate", .. })
        ));
        assert!(matches!(
            Settings::default().merge_yaml("output: shader"),
            Err(ConfigError::InvalidValue { key: "output", .. })
        ));
    }

    #[test]
    fn broken_yaml_is_a_yaml_error() {
        assert!(matches!(Settings::default().merge_yaml("endpoint: [unclosed"), Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn convergence_rate_must_be_in_unit_interval() {
        for rate in [0.0, -0.5, 1.5, f64::NAN] {
            let settings = Settings { convergence_rate: rate, ..Settings::default() };
            assert!(settings.validate().is_err(), "rate {}", rate);
        }
        let settings = Settings { convergence_rate: 1.0, ..Settings::default() };
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn flags_win_over_file() {
        let mut file = std::env::temp_dir();
        file.push(format!("loadwaves-config-{}.yaml", std::process::id()));
        {
            let mut handle = std::fs::File::create(&file).unwrap();
            writeln!(handle, "endpoint: ws://from-file\nframe_rate: 24").unwrap();
        }

        let args = CliArgs::try_parse_from([
            "loadwaves",
            "--config", file.to_str().unwrap(),
            "--frame-rate", "120",
            "--output", "json",
        ]).unwrap();
        let settings = Settings::resolve(&args).unwrap();
        std::fs::remove_file(&file).unwrap();

        assert_eq!(settings.endpoint, "ws://from-file");
        assert_eq!(settings.frame_rate, 120);
        assert_eq!(settings.output, OutputKind::Json);
    }

    #[test]
    fn missing_config_file_is_reported() {
        let args = CliArgs::try_parse_from(["loadwaves", "--config", "/nonexistent/loadwaves.yaml"]).unwrap();
        assert!(matches!(Settings::resolve(&args), Err(ConfigError::Io { .. })));
    }

    #[test]
    fn frame_period_follows_frame_rate() {
        let settings = Settings { frame_rate: 50, ..Settings::default() };
        assert_eq!(settings.frame_period(), Duration::from_millis(20));
    }
}
