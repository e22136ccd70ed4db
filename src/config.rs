use std::path::PathBuf;

use color_eyre::eyre::Context;
use once_cell::sync::Lazy;
use serde::Deserialize;

#[derive(Deserialize)]
pub struct Config {
    pub api_url: String,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,
    #[serde(default = "default_report_path")]
    pub report_path: PathBuf,
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".into()
}

fn default_storage_path() -> PathBuf {
    "data".into()
}

fn default_report_path() -> PathBuf {
    "report.xlsx".into()
}

fn default_refresh_secs() -> u64 {
    300
}

pub static CONFIG: Lazy<Config> = Lazy::new(|| {
    dotenvy::dotenv().ok();
    envy::from_env::<Config>()
        .wrap_err("failed to load config")
        .unwrap()
});
