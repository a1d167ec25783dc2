use std::{env, path::PathBuf};

use log::{info, warn};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub bind_addr: String,
    pub media_root: PathBuf,
    /// Header the fronting auth proxy uses to assert the username.
    pub auth_header: String,
}

impl Config {
    pub fn load() -> Self {
        dotenv::dotenv().ok();

        Self {
            database_path: load_or("FINEST_DATABASE", "finest.db"),
            bind_addr: load_or("FINEST_BIND_ADDR", "127.0.0.1:8000"),
            media_root: PathBuf::from(load_or("FINEST_MEDIA_ROOT", "media")),
            auth_header: load_or("FINEST_AUTH_HEADER", "X-Remote-User"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "finest.db".into(),
            bind_addr: "127.0.0.1:8000".into(),
            media_root: PathBuf::from("media"),
            auth_header: "X-Remote-User".into(),
        }
    }
}

fn load_or(key: &str, default: &str) -> String {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => value,
        Ok(_) => {
            warn!("{key} is empty, using default: {default}");
            default.to_string()
        }
        Err(_) => {
            info!("{key} not set, using default: {default}");
            default.to_string()
        }
    }
}
