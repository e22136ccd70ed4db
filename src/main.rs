use color_eyre::Result;
use log::info;

mod api;
mod config;
mod fetcher;
mod model;
mod normalize;
mod report;
mod storage;

use config::CONFIG;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    env_logger::init();

    let table = storage::load_latest_snapshot(&CONFIG.storage_path)?;
    if let Some(rows) = &table {
        info!("loaded persisted snapshot: {} rows", rows.len());
    }
    let state = api::AppState::new(table);

    tokio::spawn(fetcher::refresh_loop(state.clone()));

    let listener = tokio::net::TcpListener::bind(&CONFIG.bind_addr).await?;
    info!("listening on {}", CONFIG.bind_addr);
    axum::serve(listener, api::router(state)).await?;
    Ok(())
}
