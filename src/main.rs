// Load settings, set up logging, serve

use crypto_price_index::{api, Settings};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::new()?;
    log::info!("Starting Crypto Price Index API ...");
    api::start_server(settings).await
}
