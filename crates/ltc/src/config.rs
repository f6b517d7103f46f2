//! Persisted CLI configuration.
//!
//! The configuration holds the lattice target, its optional basic-auth
//! credentials and an optional blob store endpoint. It is kept in memory
//! and written through a [`ConfigPersister`] as a whole-file overwrite on
//! every save.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LtcError, Result};

/// Environment variable overriding the directory holding `.lattice/`.
pub const LATTICE_CLI_HOME_ENV: &str = "LATTICE_CLI_HOME";

const CONFIG_DIR: &str = ".lattice";
const CONFIG_FILE: &str = "config.json";

/// Blob store endpoint used for droplet and build artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobTarget {
    /// Blob store host.
    #[serde(rename = "host")]
    pub target_host: String,
    /// Blob store port.
    #[serde(rename = "port")]
    pub target_port: u16,
    /// S3-style access key.
    #[serde(rename = "access_key")]
    pub access_key: String,
    /// S3-style secret key.
    #[serde(rename = "secret_key")]
    pub secret_key: String,
    /// Bucket holding the blobs.
    #[serde(rename = "bucket_name")]
    pub bucket_name: String,
}

/// On-disk configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Data {
    /// Lattice system domain, e.g. `192.168.11.11.xip.io`.
    #[serde(default)]
    pub target: String,
    /// Receptor username.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    /// Receptor password.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
    /// Blob store endpoint, when configured.
    #[serde(rename = "blob_target_info", default, skip_serializing_if = "Option::is_none")]
    pub blob_target: Option<BlobTarget>,
}

/// Loads and stores [`Data`].
pub trait ConfigPersister: Send + Sync {
    /// Loads the stored document. A missing store yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the store exists but cannot be read or parsed.
    fn load(&self) -> Result<Data>;

    /// Replaces the stored document with `data`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn save(&self, data: &Data) -> Result<()>;
}

impl<T: ConfigPersister + ?Sized> ConfigPersister for std::sync::Arc<T> {
    fn load(&self) -> Result<Data> {
        (**self).load()
    }

    fn save(&self, data: &Data) -> Result<()> {
        (**self).save(data)
    }
}

/// JSON file persister.
#[derive(Debug, Clone)]
pub struct FilePersister {
    path: PathBuf,
}

impl FilePersister {
    /// Persists to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the config file below `home`.
    #[must_use]
    pub fn config_file_path(home: &Path) -> PathBuf {
        home.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Directory whose `.lattice/` holds the config file:
    /// `LATTICE_CLI_HOME` when set, the user's home directory otherwise.
    #[must_use]
    pub fn default_home() -> PathBuf {
        std::env::var_os(LATTICE_CLI_HOME_ENV)
            .map(PathBuf::from)
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// The file this persister writes.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigPersister for FilePersister {
    fn load(&self) -> Result<Data> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no config file, using defaults");
                return Ok(Data::default());
            }
            Err(e) => {
                return Err(LtcError::Persistence(format!(
                    "failed to read config file {}: {e}",
                    self.path.display()
                )));
            }
        };

        serde_json::from_str(&content).map_err(|e| {
            LtcError::Persistence(format!(
                "failed to parse config file {}: {e}",
                self.path.display()
            ))
        })
    }

    fn save(&self, data: &Data) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .map_err(|e| LtcError::Persistence(format!("failed to create {}: {e}", dir.display())))?;
            restrict_permissions(dir)?;
        }

        let json = serde_json::to_vec(data)?;
        fs::write(&self.path, json).map_err(|e| {
            LtcError::Persistence(format!("failed to write {}: {e}", self.path.display()))
        })?;
        restrict_permissions(&self.path)?;
        debug!(path = %self.path.display(), "config saved");
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o700))
        .map_err(|e| LtcError::Persistence(format!("failed to chmod {}: {e}", path.display())))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

/// In-memory persister.
#[derive(Debug, Default)]
pub struct MemPersister {
    data: Mutex<Data>,
}

impl MemPersister {
    /// Starts with `data` stored.
    #[must_use]
    pub fn with_data(data: Data) -> Self {
        Self {
            data: Mutex::new(data),
        }
    }

    /// The stored document.
    #[must_use]
    pub fn stored(&self) -> Data {
        self.data.lock().clone()
    }
}

impl ConfigPersister for MemPersister {
    fn load(&self) -> Result<Data> {
        Ok(self.data.lock().clone())
    }

    fn save(&self, data: &Data) -> Result<()> {
        *self.data.lock() = data.clone();
        Ok(())
    }
}

/// In-memory configuration bound to a persister.
pub struct Config {
    data: Data,
    persister: Box<dyn ConfigPersister>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("target", &self.data.target)
            .field("username", &self.data.username)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new(persister: impl ConfigPersister + 'static) -> Self {
        Self {
            data: Data::default(),
            persister: Box::new(persister),
        }
    }

    /// Replaces the in-memory values with the persisted ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the persister fails.
    pub fn load(&mut self) -> Result<()> {
        self.data = self.persister.load()?;
        Ok(())
    }

    /// Writes the in-memory values through the persister.
    ///
    /// # Errors
    ///
    /// Returns an error if the persister fails.
    pub fn save(&self) -> Result<()> {
        self.persister.save(&self.data)
    }

    /// Current values.
    #[must_use]
    pub const fn data(&self) -> &Data {
        &self.data
    }

    /// Sets the lattice system domain.
    pub fn set_target(&mut self, target: impl Into<String>) {
        self.data.target = target.into();
    }

    /// Sets or clears (with empty strings) the receptor credentials.
    pub fn set_login(&mut self, username: impl Into<String>, password: impl Into<String>) {
        self.data.username = username.into();
        self.data.password = password.into();
    }

    /// Configures the blob store endpoint.
    pub fn set_blob_target(&mut self, blob_target: BlobTarget) {
        self.data.blob_target = Some(blob_target);
    }

    /// The lattice system domain.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.data.target
    }

    /// The receptor username, empty when unauthenticated.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.data.username
    }

    /// The blob store endpoint, if configured.
    #[must_use]
    pub const fn blob_target(&self) -> Option<&BlobTarget> {
        self.data.blob_target.as_ref()
    }

    /// Receptor base URL, with basic-auth credentials when set.
    #[must_use]
    pub fn receptor(&self) -> String {
        if self.data.username.is_empty() {
            format!("http://receptor.{}", self.data.target)
        } else {
            format!(
                "http://{}:{}@receptor.{}",
                urlencoding::encode(&self.data.username),
                urlencoding::encode(&self.data.password),
                self.data.target
            )
        }
    }

    /// Log streaming host.
    #[must_use]
    pub fn loggregator(&self) -> String {
        format!("doppler.{}", self.data.target)
    }

    /// WebSocket base URL for the log stream.
    #[must_use]
    pub fn loggregator_url(&self) -> String {
        format!("ws://{}", self.loggregator())
    }
}
