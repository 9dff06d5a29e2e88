use std::path::PathBuf;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_LEVELS_DIR: &str = "public/levels";
pub const DEFAULT_LEVEL: &str = "level1";

/// Runtime configuration for the world server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory holding `<level>.json` files
    pub levels_dir: PathBuf,
    /// Level used when a join does not name one
    pub default_level: String,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            levels_dir: PathBuf::from(DEFAULT_LEVELS_DIR),
            default_level: DEFAULT_LEVEL.to_string(),
        }
    }
}
