// Actix routes, server setup

use crate::aggregator::{Aggregator, AggregatorOptions};
use crate::cache::{KeyValueStore, MemoryStore, PriceCache, SledStore};
use crate::config::{CacheBackend, Settings};
use crate::error::{PriceIndexError, Result};
use crate::exchanges::bitso::BitsoClient;
use crate::fetcher::PriceFetcher;
use crate::models::{Asset, Currency, NormalizedPriceRow, PriceRow, Prices};
use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(get_cryptos, get_crypto_by_id),
    components(schemas(NormalizedPriceRow, PriceRow, Prices, Asset, Currency)),
    tags((name = "cryptos", description = "BTC, ETH and XRP prices in USD and MXN"))
)]
pub struct ApiDoc;

pub struct AppState {
    pub aggregator: Arc<Aggregator>,
}

impl AppState {
    pub fn new(aggregator: Arc<Aggregator>) -> Self {
        Self { aggregator }
    }
}

fn error_response(err: PriceIndexError) -> HttpResponse {
    let body = serde_json::json!({ "error": err.to_string() });
    match err {
        PriceIndexError::UnknownAssetId(_) => HttpResponse::NotFound().json(body),
        other => {
            error!("request failed: {}", other);
            HttpResponse::InternalServerError().json(body)
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/cryptos",
    tag = "cryptos",
    responses(
        (status = 200, description = "One row per asset", body = [NormalizedPriceRow]),
        (status = 500, description = "The run failed")
    )
)]
pub async fn get_cryptos(data: web::Data<AppState>) -> impl Responder {
    match data.aggregator.get_all().await {
        Ok(rows) => {
            let rows: Vec<NormalizedPriceRow> = rows.into_iter().map(Into::into).collect();
            HttpResponse::Ok().json(rows)
        }
        Err(e) => error_response(e),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/cryptos/{id}",
    tag = "cryptos",
    params(("id" = u32, Path, description = "0 = BTC, 1 = ETH, 2 = XRP")),
    responses(
        (status = 200, description = "Prices of one asset", body = NormalizedPriceRow),
        (status = 400, description = "Id is not a non-negative integer"),
        (status = 404, description = "Unknown id"),
        (status = 500, description = "The run failed")
    )
)]
pub async fn get_crypto_by_id(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let id = match path.into_inner().parse::<u32>() {
        Ok(id) => id,
        Err(_) => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": "id must be a non-negative integer",
            }));
        }
    };

    match data.aggregator.get_by_id(id).await {
        Ok(row) => HttpResponse::Ok().json(NormalizedPriceRow::from(row)),
        Err(e) => error_response(e),
    }
}

pub async fn openapi_json() -> impl Responder {
    HttpResponse::Ok().json(ApiDoc::openapi())
}

/// Registers the `/api/v1/cryptos` routes and the OpenAPI document at
/// `/api/v1/openapi.json`.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/openapi.json", web::get().to(openapi_json))
            .service(
                web::scope("/cryptos")
                    .route("", web::get().to(get_cryptos))
                    .route("/", web::get().to(get_cryptos))
                    .route("/{id}", web::get().to(get_crypto_by_id)),
            ),
    );
}

// Drops expired entries that are never read again.
fn spawn_cache_sweeper<F>(every: Duration, purge: F)
where
    F: Fn() -> Result<usize> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every.max(Duration::from_secs(1)));
        loop {
            interval.tick().await;
            match purge() {
                Ok(0) => {}
                Ok(removed) => debug!("purged {} expired cache entries", removed),
                Err(e) => warn!("cache sweep failed: {}", e),
            }
        }
    });
}

fn open_store(settings: &Settings) -> Result<Arc<dyn KeyValueStore>> {
    let every = settings.cache_ttl();
    match settings.cache.backend {
        CacheBackend::Memory => {
            let store = Arc::new(MemoryStore::new());
            let swept = store.clone();
            spawn_cache_sweeper(every, move || Ok(swept.purge_expired()));
            Ok(store)
        }
        CacheBackend::Sled => {
            info!("Opening price cache at {}", settings.cache.path);
            let store = Arc::new(SledStore::open(&settings.cache.path)?);
            let swept = store.clone();
            spawn_cache_sweeper(every, move || swept.purge_expired());
            Ok(store)
        }
    }
}

/// Wires the Bitso client, the configured cache backend and the aggregator,
/// then serves HTTP until shutdown.
pub async fn start_server(settings: Settings) -> anyhow::Result<()> {
    let client = Arc::new(BitsoClient::new(&settings.bitso)?);
    info!("Using Bitso ticker endpoint {}", client.ticker_url());

    let fetcher = PriceFetcher::with_max_attempts(client, settings.aggregator.max_attempts);
    let cache = PriceCache::new(open_store(&settings)?);
    let aggregator = Arc::new(Aggregator::new(
        cache,
        fetcher,
        AggregatorOptions::from(&settings),
    ));

    let app_state = web::Data::new(AppState::new(aggregator));
    let addr = settings.server_addr();
    info!("Listening on {}", addr);

    HttpServer::new(move || App::new().app_data(app_state.clone()).configure(routes))
        .bind(&addr)?
        .run()
        .await?;
    Ok(())
}
