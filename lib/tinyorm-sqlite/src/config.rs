use std::path::{Path, PathBuf};

/// Where a SQLite connection opens its database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionConfig {
    /// A private in-memory database.
    Memory,
    /// A named in-memory database shared by every connection opened with the
    /// same name in this process, e.g. a write and a read connection.
    SharedMemory(String),
    /// A database file.
    Path(PathBuf),
}

impl ConnectionConfig {
    pub(crate) fn uri(&self) -> String {
        match self {
            ConnectionConfig::Memory => ":memory:".to_string(),
            ConnectionConfig::SharedMemory(name) => {
                format!("file:{name}?mode=memory&cache=shared")
            }
            ConnectionConfig::Path(path) => path.display().to_string(),
        }
    }
}

impl From<&str> for ConnectionConfig {
    fn from(path: &str) -> Self {
        if path == ":memory:" {
            ConnectionConfig::Memory
        } else {
            ConnectionConfig::Path(PathBuf::from(path))
        }
    }
}

impl From<String> for ConnectionConfig {
    fn from(path: String) -> Self {
        ConnectionConfig::from(path.as_str())
    }
}

impl From<&String> for ConnectionConfig {
    fn from(path: &String) -> Self {
        ConnectionConfig::from(path.as_str())
    }
}

impl From<&Path> for ConnectionConfig {
    fn from(path: &Path) -> Self {
        ConnectionConfig::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for ConnectionConfig {
    fn from(path: PathBuf) -> Self {
        ConnectionConfig::Path(path)
    }
}
