use std::{collections::HashMap, fs};

#[derive(Debug)]
pub struct Settings {
    pub rpc_url: String,
    pub package_id: String,
    pub database_url: String,
    pub account: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rpc_url: "https://api.testnet.iota.cafe".into(),
            package_id: "0x0".into(),
            database_url: "sqlite://./data/pizza.db".into(),
            account: None,
        }
    }
}

/// Defaults, overridden by `pizza.toml`, overridden by environment.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("pizza.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("rpc_url") {
                settings.rpc_url = v.clone();
            }
            if let Some(v) = file_cfg.get("package_id") {
                settings.package_id = v.clone();
            }
            if let Some(v) = file_cfg.get("database_url") {
                settings.database_url = v.clone();
            }
            if let Some(v) = file_cfg.get("account") {
                settings.account = Some(v.clone());
            }
        }
    }

    if let Ok(v) = std::env::var("PIZZA_RPC_URL") {
        settings.rpc_url = v;
    }
    if let Ok(v) = std::env::var("PIZZA_PACKAGE_ID") {
        settings.package_id = v;
    }
    if let Ok(v) = std::env::var("PIZZA_DATABASE_URL") {
        settings.database_url = v;
    }
    if let Ok(v) = std::env::var("PIZZA_ACCOUNT") {
        settings.account = Some(v);
    }

    settings
}
