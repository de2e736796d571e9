use std::path::PathBuf;
use std::str::FromStr;

fn parsed<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    get(key).and_then(|s| s.trim().parse().ok())
}

/// Server configuration, read from `RESERVO_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub catalog: Option<PathBuf>,
    pub password: String,
    pub max_connections: usize,
    pub metrics_port: Option<u16>,
    pub reservations_module: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unparsable values fall back to defaults.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            bind: get("RESERVO_BIND").unwrap_or_else(|| "0.0.0.0".into()),
            port: parsed(&get, "RESERVO_PORT").unwrap_or(5480),
            data_dir: get("RESERVO_DATA_DIR")
                .unwrap_or_else(|| "./data".into())
                .into(),
            catalog: get("RESERVO_CATALOG").map(PathBuf::from),
            password: get("RESERVO_PASSWORD").unwrap_or_else(|| "reservo".into()),
            max_connections: parsed(&get, "RESERVO_MAX_CONNECTIONS").unwrap_or(256),
            metrics_port: parsed(&get, "RESERVO_METRICS_PORT"),
            reservations_module: get("RESERVO_RESERVATIONS_MODULE")
                .map(|s| !matches!(s.trim().to_ascii_lowercase().as_str(), "0" | "false" | "off" | "no"))
                .unwrap_or(true),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("reservations.wal")
    }
}
