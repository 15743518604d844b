use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Which persistence backend the share store runs on
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    File {
        path: PathBuf,
    },
    Remote {
        url: String,
        api_key: Option<String>,
        table: String,
    },
}

impl StorageBackend {
    pub fn name(&self) -> &'static str {
        match self {
            StorageBackend::Memory => "memory",
            StorageBackend::File { .. } => "file",
            StorageBackend::Remote { .. } => "remote",
        }
    }
}

pub struct Config {
    pub host: String,
    pub http_port: u16,
    pub storage: StorageBackend,
    pub retention: Duration,
    pub sweep_interval_override: Option<Duration>,
    pub io_timeout_override: Option<Duration>,
    pub allowed_origins: Vec<String>,
    pub max_body_bytes: usize,
}

impl Config {
    const DEFAULT_HOST: &str = "0.0.0.0";
    const DEFAULT_HTTP_PORT: u16 = 3001;
    const DEFAULT_DATA_FILE: &str = "./data/shares.json";
    const DEFAULT_REMOTE_TABLE: &str = "shares";
    const DEFAULT_RETENTION_SECS: u64 = 7 * 24 * 60 * 60;
    const DEFAULT_MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

    const MEMORY_SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
    const FILE_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);
    const FILE_IO_TIMEOUT: Duration = Duration::from_millis(5_000);
    const REMOTE_IO_TIMEOUT: Duration = Duration::from_millis(10_000);

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup, so tests don't touch the process env
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let http_port = var("FERRY_HTTP_PORT")
            .or_else(|| var("PORT"))
            .map(|raw| parse_or("FERRY_HTTP_PORT", &raw, Self::DEFAULT_HTTP_PORT))
            .unwrap_or(Self::DEFAULT_HTTP_PORT);

        let storage = match var("FERRY_STORAGE")
            .map(|s| s.trim().to_lowercase())
            .as_deref()
        {
            None | Some("memory") => StorageBackend::Memory,
            Some("file") => StorageBackend::File {
                path: PathBuf::from(
                    var("FERRY_DATA_FILE").unwrap_or_else(|| Self::DEFAULT_DATA_FILE.to_string()),
                ),
            },
            Some("remote") => match var("FERRY_REMOTE_URL") {
                Some(url) => StorageBackend::Remote {
                    url: url.trim_end_matches('/').to_string(),
                    api_key: var("FERRY_REMOTE_KEY"),
                    table: var("FERRY_REMOTE_TABLE")
                        .unwrap_or_else(|| Self::DEFAULT_REMOTE_TABLE.to_string()),
                },
                None => {
                    warn!("FERRY_STORAGE=remote but FERRY_REMOTE_URL is not set, using memory storage");
                    StorageBackend::Memory
                }
            },
            Some(other) => {
                warn!("Unknown FERRY_STORAGE '{}', using memory storage", other);
                StorageBackend::Memory
            }
        };

        let retention_secs = var("FERRY_RETENTION_SECS")
            .map(|raw| parse_or("FERRY_RETENTION_SECS", &raw, Self::DEFAULT_RETENTION_SECS))
            .unwrap_or(Self::DEFAULT_RETENTION_SECS);

        Self {
            host: var("FERRY_HOST").unwrap_or_else(|| Self::DEFAULT_HOST.to_string()),
            http_port,
            storage,
            retention: Duration::from_secs(retention_secs),
            sweep_interval_override: var("FERRY_SWEEP_INTERVAL_SECS")
                .and_then(|raw| parse_opt::<u64>("FERRY_SWEEP_INTERVAL_SECS", &raw))
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            io_timeout_override: var("FERRY_IO_TIMEOUT_MS")
                .and_then(|raw| parse_opt::<u64>("FERRY_IO_TIMEOUT_MS", &raw))
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
            allowed_origins: var("FERRY_ALLOWED_ORIGINS")
                .unwrap_or_else(|| "*".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            max_body_bytes: var("FERRY_MAX_BODY_BYTES")
                .map(|raw| parse_or("FERRY_MAX_BODY_BYTES", &raw, Self::DEFAULT_MAX_BODY_BYTES))
                .unwrap_or(Self::DEFAULT_MAX_BODY_BYTES),
        }
    }

    /// Sweep cadence for the configured backend. `None` means no sweeper runs.
    pub fn sweep_interval(&self) -> Option<Duration> {
        match self.storage {
            StorageBackend::Remote { .. } => None,
            StorageBackend::Memory => Some(self.memory_sweep_interval()),
            StorageBackend::File { .. } => Some(self.file_sweep_interval()),
        }
    }

    /// Cadence for a memory store, whether configured or fallen back to
    pub fn memory_sweep_interval(&self) -> Duration {
        self.sweep_interval_override
            .unwrap_or(Self::MEMORY_SWEEP_INTERVAL)
    }

    pub fn file_sweep_interval(&self) -> Duration {
        self.sweep_interval_override
            .unwrap_or(Self::FILE_SWEEP_INTERVAL)
    }

    pub fn io_timeout(&self) -> Duration {
        self.io_timeout_override.unwrap_or(match self.storage {
            StorageBackend::Remote { .. } => Self::REMOTE_IO_TIMEOUT,
            _ => Self::FILE_IO_TIMEOUT,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }

    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.is_empty() || self.allowed_origins.iter().any(|o| o == "*")
    }
}

fn parse_opt<T: FromStr>(key: &str, raw: &str) -> Option<T> {
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring unparseable {}='{}'", key, raw);
            None
        }
    }
}

fn parse_or<T: FromStr>(key: &str, raw: &str, default: T) -> T {
    parse_opt(key, raw).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.http_port, 3001);
        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.retention, Duration::from_secs(604_800));
        assert_eq!(config.sweep_interval(), Some(Duration::from_secs(86_400)));
        assert_eq!(config.io_timeout(), Duration::from_millis(5_000));
        assert!(config.allows_any_origin());
        assert_eq!(config.max_body_bytes, 50 * 1024 * 1024);
    }

    #[test]
    fn test_file_backend_sweeps_hourly() {
        let config = config_from(&[
            ("FERRY_STORAGE", "file"),
            ("FERRY_DATA_FILE", "/tmp/ferry/shares.json"),
        ]);
        assert_eq!(
            config.storage,
            StorageBackend::File {
                path: PathBuf::from("/tmp/ferry/shares.json")
            }
        );
        assert_eq!(config.sweep_interval(), Some(Duration::from_secs(3_600)));
    }

    #[test]
    fn test_remote_backend() {
        let config = config_from(&[
            ("FERRY_STORAGE", "Remote"),
            ("FERRY_REMOTE_URL", "https://example.supabase.co/"),
            ("FERRY_REMOTE_KEY", "secret"),
        ]);
        assert_eq!(
            config.storage,
            StorageBackend::Remote {
                url: "https://example.supabase.co".to_string(),
                api_key: Some("secret".to_string()),
                table: "shares".to_string(),
            }
        );
        assert_eq!(config.sweep_interval(), None);
        assert_eq!(config.io_timeout(), Duration::from_millis(10_000));
    }

    #[test]
    fn test_remote_without_url_falls_back_to_memory() {
        let config = config_from(&[("FERRY_STORAGE", "remote")]);
        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.sweep_interval(), Some(Duration::from_secs(86_400)));
    }

    #[test]
    fn test_per_kind_sweep_intervals() {
        let config = config_from(&[
            ("FERRY_STORAGE", "remote"),
            ("FERRY_REMOTE_URL", "https://example.supabase.co"),
        ]);
        assert_eq!(config.sweep_interval(), None);
        assert_eq!(config.memory_sweep_interval(), Duration::from_secs(86_400));
        assert_eq!(config.file_sweep_interval(), Duration::from_secs(3_600));

        let config = config_from(&[("FERRY_SWEEP_INTERVAL_SECS", "30")]);
        assert_eq!(config.memory_sweep_interval(), Duration::from_secs(30));
        assert_eq!(config.file_sweep_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_port_fallback_and_bad_numbers() {
        let config = config_from(&[("PORT", "4000"), ("FERRY_RETENTION_SECS", "soon")]);
        assert_eq!(config.http_port, 4000);
        assert_eq!(config.retention, Duration::from_secs(604_800));

        let config = config_from(&[("PORT", "4000"), ("FERRY_HTTP_PORT", "5000")]);
        assert_eq!(config.http_port, 5000);
    }

    #[test]
    fn test_overrides_and_origins() {
        let config = config_from(&[
            ("FERRY_SWEEP_INTERVAL_SECS", "60"),
            ("FERRY_IO_TIMEOUT_MS", "250"),
            ("FERRY_ALLOWED_ORIGINS", "https://a.example, https://b.example"),
        ]);
        assert_eq!(config.sweep_interval(), Some(Duration::from_secs(60)));
        assert_eq!(config.io_timeout(), Duration::from_millis(250));
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert!(!config.allows_any_origin());
    }
}
