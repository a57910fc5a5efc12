use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("Failed to read config file: {0}")]
  FileRead(#[from] std::io::Error),
  #[error("Failed to parse YAML: {0}")]
  YamlParse(#[from] serde_yml::Error),
  #[error("Configuration validation error: {0}")]
  Validation(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
  /// Unique name for this provider; requests address it by this name
  pub name: String,

  /// Provider kind: "s3" or "fs"
  pub kind: String,

  /// S3 bucket name (s3 only)
  #[serde(skip_serializing_if = "Option::is_none")]
  pub bucket_name: Option<String>,

  /// Key prefix inside the bucket (s3 only)
  #[serde(default)]
  pub prefix: String,

  /// AWS Access Key ID (optional - auto-discovered if not provided)
  #[serde(skip_serializing_if = "Option::is_none")]
  pub access_key_id: Option<String>,

  /// Environment variable name holding the AWS Access Key ID
  #[serde(skip_serializing_if = "Option::is_none")]
  pub access_key_id_env: Option<String>,

  /// AWS Secret Access Key (optional - auto-discovered if not provided)
  #[serde(skip_serializing_if = "Option::is_none")]
  pub secret_access_key: Option<String>,

  /// Environment variable name holding the AWS Secret Access Key
  #[serde(skip_serializing_if = "Option::is_none")]
  pub secret_access_key_env: Option<String>,

  /// AWS Session Token (optional)
  #[serde(skip_serializing_if = "Option::is_none")]
  pub session_token: Option<String>,

  /// Environment variable name holding the AWS Session Token
  #[serde(skip_serializing_if = "Option::is_none")]
  pub session_token_env: Option<String>,

  /// AWS Region (optional - auto-discovered if not provided)
  #[serde(skip_serializing_if = "Option::is_none")]
  pub region: Option<String>,

  /// Custom S3 endpoint URL (for MinIO, etc.)
  #[serde(skip_serializing_if = "Option::is_none")]
  pub endpoint_url: Option<String>,

  /// Force path-style addressing (required for MinIO and some S3-compatible services)
  #[serde(default)]
  pub force_path_style: bool,

  /// S3 operation timeout in seconds
  #[serde(default = "default_timeout")]
  pub timeout: u64,

  /// Answer downloads with a pre-signed URL instead of proxying bytes (s3 only)
  #[serde(default)]
  pub presign_downloads: bool,

  /// Lifetime of pre-signed URLs in seconds
  #[serde(default = "default_presign_expiry")]
  pub presign_expiry_secs: u64,

  /// Root directory (fs only)
  #[serde(skip_serializing_if = "Option::is_none")]
  pub root: Option<String>,
}

fn default_timeout() -> u64 {
  30
}

fn default_presign_expiry() -> u64 {
  300
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
  /// List of provider configurations
  pub providers: Vec<ProviderConfig>,

  /// HTTP server port (optional, defaults to 3000)
  #[serde(default = "default_port")]
  pub port: u16,

  /// Read size for proxied downloads, in bytes
  #[serde(default = "default_chunk_size")]
  pub chunk_size: usize,

  /// Seconds to wait for a provider to finalize an upload
  #[serde(default = "default_upload_timeout")]
  pub upload_timeout: u64,

  /// Enable debug logging
  #[serde(default)]
  pub debug: bool,
}

fn default_port() -> u16 {
  3000
}

fn default_chunk_size() -> usize {
  65536
}

fn default_upload_timeout() -> u64 {
  300
}

impl GatewayConfig {
  /// Load configuration from a YAML file
  pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: GatewayConfig = serde_yml::from_str(&content)?;
    config.validate()?;
    Ok(config)
  }

  /// Validate the configuration
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.providers.is_empty() {
      return Err(ConfigError::Validation(
        "At least one provider must be configured".to_string(),
      ));
    }

    let mut names = std::collections::HashSet::new();
    for provider in &self.providers {
      if provider.name.is_empty() {
        return Err(ConfigError::Validation(
          "Provider name cannot be empty".to_string(),
        ));
      }
      if !names.insert(&provider.name) {
        return Err(ConfigError::Validation(format!(
          "Duplicate provider name: {}",
          provider.name
        )));
      }

      match provider.kind.as_str() {
        "s3" => {
          if provider.bucket_name.as_deref().unwrap_or("").is_empty() {
            return Err(ConfigError::Validation(format!(
              "Provider '{}' must have a bucketName",
              provider.name
            )));
          }
        },
        "fs" => {
          if provider.root.as_deref().unwrap_or("").is_empty() {
            return Err(ConfigError::Validation(format!(
              "Provider '{}' must have a root directory",
              provider.name
            )));
          }
        },
        other => {
          return Err(ConfigError::Validation(format!(
            "Provider '{}' has unknown kind '{}' (expected 's3' or 'fs')",
            provider.name, other
          )));
        },
      }
    }

    if self.port == 0 {
      return Err(ConfigError::Validation(
        "Port must be greater than 0".to_string(),
      ));
    }

    if self.chunk_size == 0 {
      return Err(ConfigError::Validation(
        "chunkSize must be greater than 0".to_string(),
      ));
    }

    Ok(())
  }

  /// Resolve all environment variables and return a resolved configuration
  pub fn resolve_env_vars(&self) -> Result<ResolvedConfig, ConfigError> {
    let mut resolved_providers = Vec::new();

    for provider in &self.providers {
      let access_key_id =
        Self::resolve_optional_env(&provider.access_key_id, &provider.access_key_id_env)?;

      let secret_access_key =
        Self::resolve_optional_env(&provider.secret_access_key, &provider.secret_access_key_env)?;

      let session_token =
        Self::resolve_optional_env(&provider.session_token, &provider.session_token_env)?;

      // Validate credential pairs
      match (&access_key_id, &secret_access_key) {
        (Some(_), None) => {
          return Err(ConfigError::Validation(format!(
            "Provider '{}': if accessKeyId is provided, secretAccessKey must also be provided",
            provider.name
          )));
        },
        (None, Some(_)) => {
          return Err(ConfigError::Validation(format!(
            "Provider '{}': if secretAccessKey is provided, accessKeyId must also be provided",
            provider.name
          )));
        },
        _ => {},
      }

      resolved_providers.push(ResolvedProviderConfig {
        name: provider.name.clone(),
        kind: provider.kind.clone(),
        bucket_name: provider.bucket_name.clone(),
        prefix: Self::normalize_prefix(&provider.prefix),
        access_key_id,
        secret_access_key,
        session_token,
        region: provider.region.clone(),
        endpoint_url: provider.endpoint_url.clone(),
        force_path_style: provider.force_path_style,
        timeout: provider.timeout,
        presign_downloads: provider.presign_downloads,
        presign_expiry_secs: provider.presign_expiry_secs,
        root: provider.root.clone(),
      });
    }

    Ok(ResolvedConfig {
      providers: resolved_providers,
      port: self.port,
      chunk_size: self.chunk_size,
      upload_timeout: self.upload_timeout,
      debug: self.debug,
    })
  }

  /// Resolve an optional field that can be a value or env var reference
  fn resolve_optional_env(
    value: &Option<String>,
    env_var: &Option<String>,
  ) -> Result<Option<String>, ConfigError> {
    match (value, env_var) {
      (Some(v), _) => Ok(Some(v.clone())),
      (None, Some(env_name)) => match std::env::var(env_name) {
        Ok(v) => Ok(Some(v)),
        Err(_) => Ok(None), // Environment variable not set is OK for optional fields
      },
      (None, None) => Ok(None),
    }
  }

  /// Normalize prefix so it carries no leading or trailing slash
  fn normalize_prefix(prefix: &str) -> String {
    prefix.trim().trim_matches('/').to_string()
  }
}

/// Fully resolved configuration with all environment variables loaded
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
  pub providers: Vec<ResolvedProviderConfig>,
  pub port: u16,
  pub chunk_size: usize,
  pub upload_timeout: u64,
  pub debug: bool,
}

#[derive(Debug, Clone)]
pub struct ResolvedProviderConfig {
  pub name: String,
  pub kind: String,
  pub bucket_name: Option<String>,
  pub prefix: String,
  pub access_key_id: Option<String>,
  pub secret_access_key: Option<String>,
  pub session_token: Option<String>,
  pub region: Option<String>,
  pub endpoint_url: Option<String>,
  pub force_path_style: bool,
  pub timeout: u64,
  pub presign_downloads: bool,
  pub presign_expiry_secs: u64,
  pub root: Option<String>,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn s3_provider(name: &str) -> ProviderConfig {
    ProviderConfig {
      name: name.to_string(),
      kind: "s3".to_string(),
      bucket_name: Some("my-bucket".to_string()),
      prefix: String::new(),
      access_key_id: None,
      access_key_id_env: None,
      secret_access_key: None,
      secret_access_key_env: None,
      session_token: None,
      session_token_env: None,
      region: Some("us-west-2".to_string()),
      endpoint_url: None,
      force_path_style: false,
      timeout: 30,
      presign_downloads: false,
      presign_expiry_secs: 300,
      root: None,
    }
  }

  fn config_with(providers: Vec<ProviderConfig>) -> GatewayConfig {
    GatewayConfig {
      providers,
      port: 3000,
      chunk_size: 65536,
      upload_timeout: 300,
      debug: false,
    }
  }

  #[test]
  fn test_normalize_prefix() {
    assert_eq!(GatewayConfig::normalize_prefix(""), "");
    assert_eq!(GatewayConfig::normalize_prefix("/"), "");
    assert_eq!(GatewayConfig::normalize_prefix("/ci"), "ci");
    assert_eq!(GatewayConfig::normalize_prefix("ci"), "ci");
    assert_eq!(GatewayConfig::normalize_prefix("/ci/"), "ci");
    assert_eq!(
      GatewayConfig::normalize_prefix("team1/subteam"),
      "team1/subteam"
    );
    assert_eq!(GatewayConfig::normalize_prefix("  /ci  "), "ci");
  }

  #[test]
  fn test_validation_empty_providers() {
    assert!(config_with(vec![]).validate().is_err());
  }

  #[test]
  fn test_validation_duplicate_names() {
    let config = config_with(vec![s3_provider("store"), s3_provider("store")]);
    assert!(config.validate().is_err());
  }

  #[test]
  fn test_validation_unknown_kind() {
    let mut provider = s3_provider("store");
    provider.kind = "ftp".to_string();
    assert!(config_with(vec![provider]).validate().is_err());
  }

  #[test]
  fn test_validation_s3_requires_bucket() {
    let mut provider = s3_provider("store");
    provider.bucket_name = None;
    assert!(config_with(vec![provider]).validate().is_err());
  }

  #[test]
  fn test_validation_fs_requires_root() {
    let mut provider = s3_provider("local");
    provider.kind = "fs".to_string();
    provider.bucket_name = None;
    assert!(config_with(vec![provider]).validate().is_err());

    let mut provider = s3_provider("local");
    provider.kind = "fs".to_string();
    provider.bucket_name = None;
    provider.root = Some("/var/data".to_string());
    assert!(config_with(vec![provider]).validate().is_ok());
  }

  #[test]
  fn test_validation_success() {
    assert!(config_with(vec![s3_provider("store")]).validate().is_ok());
  }

  #[test]
  fn test_resolve_rejects_half_credentials() {
    let mut provider = s3_provider("store");
    provider.access_key_id = Some("AKIA123".to_string());
    let config = config_with(vec![provider]);
    assert!(config.resolve_env_vars().is_err());
  }

  #[test]
  fn test_resolve_keeps_defaults() {
    let config = config_with(vec![s3_provider("store")]);
    let resolved = config.resolve_env_vars().unwrap();
    assert_eq!(resolved.port, 3000);
    assert_eq!(resolved.chunk_size, 65536);
    assert_eq!(resolved.providers.len(), 1);
    assert_eq!(resolved.providers[0].prefix, "");
  }

  #[test]
  fn test_parse_yaml_document() {
    let yaml = r#"
port: 8080
chunkSize: 32768
providers:
  - name: archive
    kind: s3
    bucketName: archive-bucket
    prefix: /files
    region: eu-central-1
    presignDownloads: true
  - name: scratch
    kind: fs
    root: /var/lib/streamgate
"#;
    let config: GatewayConfig = serde_yml::from_str(yaml).unwrap();
    config.validate().unwrap();
    assert_eq!(config.port, 8080);
    assert_eq!(config.chunk_size, 32768);
    assert_eq!(config.providers.len(), 2);
    assert!(config.providers[0].presign_downloads);
    assert_eq!(
      config.providers[1].root.as_deref(),
      Some("/var/lib/streamgate")
    );
  }
}
