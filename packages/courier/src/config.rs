use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

// =============================================================================
// File config (figment-deserialized from defaults / courier.toml / env vars)
// =============================================================================
//
//   courier.toml:    [server]
//                    ws_port = 9000
//
//   env var:         COURIER_SERVER__WS_PORT=9000   (double underscore = nesting)

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub storage: StorageFileConfig,
    #[serde(default)]
    pub relay: RelayFileConfig,
}

/// Listener settings (lives under `[server]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_ws_port")]
    pub ws_port: u16,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
            ws_port: default_ws_port(),
        }
    }
}

/// Media storage settings (lives under `[storage]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageFileConfig {
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: u64,
}

impl Default for StorageFileConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            max_file_size_bytes: default_max_file_size(),
        }
    }
}

/// Relay behaviour (lives under `[relay]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelayFileConfig {
    /// Close a connection that sends a frame the relay cannot parse.
    #[serde(default)]
    pub close_on_malformed: bool,
    /// Outbound frames buffered per connection before new ones are dropped.
    #[serde(default = "default_outbox_capacity")]
    pub outbox_capacity: usize,
}

impl Default for RelayFileConfig {
    fn default() -> Self {
        Self {
            close_on_malformed: false,
            outbox_capacity: default_outbox_capacity(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    3000
}
fn default_ws_port() -> u16 {
    8080
}
fn default_storage_path() -> PathBuf {
    PathBuf::from("/tmp/client-side-compression/")
}
fn default_max_file_size() -> u64 {
    16 * 1024 * 1024
}
fn default_outbox_capacity() -> usize {
    256
}

/// Build a figment that layers: defaults → courier.toml → COURIER_* env vars.
///
/// A missing config file is not an error; figment simply skips it.
pub fn load_config(config_path: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(config_path))
        .merge(Env::prefixed("COURIER_").split("__"))
}

/// CLI overrides (highest priority).
#[derive(Clone, Debug, Default)]
pub struct RuntimeOverrides {
    pub host: Option<String>,
    pub http_port: Option<u16>,
    pub ws_port: Option<u16>,
    pub storage_dir: Option<PathBuf>,
}

// =============================================================================
// Runtime config (derived from FileConfig, used throughout the server)
// =============================================================================

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub path: PathBuf,
    pub max_file_size_bytes: u64,
}

#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub close_on_malformed: bool,
    pub outbox_capacity: usize,
}

#[derive(Clone, Debug)]
pub struct CourierConfig {
    pub http_addr: SocketAddr,
    pub ws_addr: SocketAddr,
    pub storage: StorageConfig,
    pub relay: RelayConfig,
}

impl CourierConfig {
    pub fn from_file(fc: &FileConfig) -> Result<Self> {
        let host: IpAddr = fc
            .server
            .host
            .parse()
            .with_context(|| format!("Invalid server host: {}", fc.server.host))?;

        Ok(Self {
            http_addr: SocketAddr::new(host, fc.server.http_port),
            ws_addr: SocketAddr::new(host, fc.server.ws_port),
            storage: StorageConfig {
                path: fc.storage.path.clone(),
                max_file_size_bytes: fc.storage.max_file_size_bytes,
            },
            relay: RelayConfig {
                close_on_malformed: fc.relay.close_on_malformed,
                // A zero-capacity mpsc channel panics on creation.
                outbox_capacity: fc.relay.outbox_capacity.max(1),
            },
        })
    }

    /// Resolve the full configuration: file/env layers first, then CLI overrides.
    pub fn load(config_path: &Path, overrides: &RuntimeOverrides) -> Result<Self> {
        let mut fc: FileConfig = load_config(config_path)
            .extract()
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

        if let Some(host) = &overrides.host {
            fc.server.host = host.clone();
        }
        if let Some(port) = overrides.http_port {
            fc.server.http_port = port;
        }
        if let Some(port) = overrides.ws_port {
            fc.server.ws_port = port;
        }
        if let Some(dir) = &overrides.storage_dir {
            fc.storage.path = dir.clone();
        }

        Self::from_file(&fc)
    }
}
