use std::net::SocketAddr;

use anyhow::Context;
use log::info;
use warp::Filter;

use account_gateway::config::Settings;
use account_gateway::routes;
use account_gateway::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();
    info!("Logger initialized. Starting account gateway...");

    let settings = Settings::from_env().context("invalid configuration")?;
    let addr: SocketAddr = ([0, 0, 0, 0], settings.port).into();
    info!("Will bind to: {}", addr);

    let state = AppState::new(settings);
    info!(
        "Adapter registry ready with backends: {:?}",
        state.registry.backend_names()
    );

    let cors = warp::cors()
        .allow_any_origin()
        .allow_header("content-type")
        .allow_header("cache-control")
        .allow_methods(vec!["GET", "PUT", "DELETE"]);

    let api = routes::routes(state).with(cors);
    info!("Routes configured successfully with CORS.");

    info!("Starting server on {}", addr);
    warp::serve(api).run(addr).await;
    Ok(())
}
