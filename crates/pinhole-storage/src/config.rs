use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;
use typed_builder::TypedBuilder;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Which backend a [`StorageConfig`] selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    InMemory,
    File,
    Database,
}

impl Display for BackendKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::InMemory => write!(f, "in-memory"),
            BackendKind::File => write!(f, "file"),
            BackendKind::Database => write!(f, "database"),
        }
    }
}

/// Storage settings consumed by [`Storage::from_config`](crate::Storage::from_config).
///
/// Empty strings count as unset, so an exported-but-empty environment
/// variable does not select a backend.
#[derive(Debug, Clone, TypedBuilder)]
pub struct StorageConfig {
    #[builder(default)]
    pub database_dsn: Option<String>,
    #[builder(default)]
    pub file_storage_path: Option<PathBuf>,
    #[builder(default = DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: u32,
    #[builder(default)]
    pub query_timeout: Option<Duration>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl StorageConfig {
    /// Applies the selection precedence: database, then file, then memory.
    pub fn backend_kind(&self) -> BackendKind {
        if self.dsn().is_some() {
            BackendKind::Database
        } else if self.file_path().is_some() {
            BackendKind::File
        } else {
            BackendKind::InMemory
        }
    }

    pub(crate) fn dsn(&self) -> Option<&str> {
        self.database_dsn.as_deref().filter(|dsn| !dsn.is_empty())
    }

    pub(crate) fn file_path(&self) -> Option<&PathBuf> {
        self.file_storage_path
            .as_ref()
            .filter(|path| !path.as_os_str().is_empty())
    }
}
