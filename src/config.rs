use serde::Deserialize;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 4567;
const DEFAULT_MAX_BODY_SIZE: usize = 100 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound on a single buffered request, header section included.
    pub client_max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            client_max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub fn load_config(path: &str) -> Result<ServerConfig, crate::error::ServerError> {
    let file_content = std::fs::read_to_string(path)?;
    let config: ServerConfig = serde_yaml::from_str(&file_content)?;
    Ok(config)
}
