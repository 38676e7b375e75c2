use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;

pub const DEFAULT_ADMIN_PASSWORD: &str = "changeme";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub persist_path: Option<PathBuf>,
    pub admin_password: String,
    pub cors_origin: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            persist_path: None,
            admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
            cors_origin: None,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .context("BIND_ADDR is not a socket address")?;

        let admin_password = match env::var("ADMIN_PASSWORD") {
            Ok(value) if !value.is_empty() => value,
            _ => {
                tracing::warn!("ADMIN_PASSWORD not set, falling back to the default password");
                DEFAULT_ADMIN_PASSWORD.to_string()
            }
        };

        Ok(Self {
            bind_addr,
            persist_path: env::var("PERSIST_PATH").ok().map(PathBuf::from),
            admin_password,
            cors_origin: env::var("CORS_ORIGIN").ok().filter(|v| !v.is_empty()),
        })
    }
}
