mod api;
mod config;
mod error;
mod game;
mod store;

use config::Config;
use game::GameCoordinator;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    let coordinator = GameCoordinator::new(&config.game);

    let routes = api::routes::routes(coordinator);

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        "Quiz server listening"
    );
    warp::serve(routes).run(config.bind_address()).await;
}
