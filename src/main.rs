use anyhow::Context;
use env_logger::Env;

use student_registry::config::Config;
use student_registry::store::Store;
use student_registry::token::SessionKeys;
use student_registry::{router, AppContext};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Config::from_env().context("loading configuration")?;
    log::debug!("{:?}", config);

    let store = Store::open(&config.database_url).await?;
    store.prepare(&config.admin).await?;

    let keys = match &config.token_secret {
        Some(secret) => SessionKeys::new(secret.clone()),
        None => {
            log::warn!("STUDENTS_TOKEN_SECRET is unset; sessions will not survive a restart");
            SessionKeys::generate()
        }
    };

    let app = router(AppContext::new(store.clone(), keys));
    let addr = config.socket_addr();
    log::info!("Starting student registry on http://{}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close().await;
    log::info!("Student registry stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
}
