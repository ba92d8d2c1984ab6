use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(deserialize_with = "deserialize_log_level")]
    pub log_level: LogLevel,
    pub models: ModelConfig,
    #[serde(default)]
    pub disease: DiseaseConfig,
}

fn deserialize_log_level<'de, D>(deserializer: D) -> Result<LogLevel, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.try_into().map_err(serde::de::Error::custom)
}

pub trait Validatable {
    fn validate(&self) -> Result<(), String>;
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn get_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    pub model_dir: PathBuf,
    pub crop_file: String,
    pub fertilizer_file: String,
    pub disease_file: String,
    #[serde(default = "default_model_instances")]
    pub num_instances: usize,
}

fn default_model_instances() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl ModelConfig {
    pub fn crop_path(&self) -> PathBuf {
        self.model_dir.join(&self.crop_file)
    }

    pub fn fertilizer_path(&self) -> PathBuf {
        self.model_dir.join(&self.fertilizer_file)
    }

    pub fn disease_path(&self) -> PathBuf {
        self.model_dir.join(&self.disease_file)
    }
}

impl Validatable for ModelConfig {
    fn validate(&self) -> Result<(), String> {
        if self.num_instances == 0 {
            return Err("models.num_instances must be at least 1".to_string());
        }
        for path in [self.crop_path(), self.fertilizer_path(), self.disease_path()] {
            if !path.exists() {
                return Err(format!("Model file not found: {:?}", path));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DiseaseConfig {
    #[serde(default = "default_input_size")]
    pub input_size: u32,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_input_size() -> u32 {
    256
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for DiseaseConfig {
    fn default() -> Self {
        Self {
            input_size: default_input_size(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl Validatable for DiseaseConfig {
    fn validate(&self) -> Result<(), String> {
        if self.input_size == 0 {
            return Err("disease.input_size must be greater than 0".to_string());
        }
        if self.max_upload_bytes == 0 {
            return Err("disease.max_upload_bytes must be greater than 0".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub enum LogLevel {
    Debug,
    Info,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            other => Err(format!(
                "{} is not a supported minimum log level. Use either `debug` or `info`.",
                other
            )),
        }
    }
}

/// Loads `configuration/base.yaml`, the environment overlay selected by
/// `APP_ENVIRONMENT`, then `APP_*` environment variables.
pub fn get_configuration() -> Result<Config, config::ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Message(format!("no working directory: {}", e)))?;
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;

    let config = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join("base.yaml"),
        ))
        .add_source(config::File::from(
            configuration_directory.join(format!("{}.yaml", environment.as_str())),
        ))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let config: Config = config.try_deserialize::<Config>()?;

    let checks: [&dyn Validatable; 2] = [&config.models, &config.disease];
    for section in checks {
        if let Err(e) = section.validate() {
            tracing::error!("Configuration validation failed: {}", e);
            return Err(config::ConfigError::Message(e));
        }
    }

    Ok(config)
}
