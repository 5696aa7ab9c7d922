use std::sync::Arc;

use clap::Parser;
use halfway::{
    AppState,
    backends::{CachedGeocoder, NominatimGeocoder, OsrmDirections, OverpassSearch},
    config::{Args, Config},
    create_router,
    session::{Session, SessionBackends},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "halfway=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_args(Args::parse())?;
    let client = config.http_client()?;

    tracing::info!("geocoding via {}", config.nominatim_url);
    tracing::info!("place search via {}", config.overpass_url);
    tracing::info!("directions via {}", config.osrm_url);

    let geocoder = Arc::new(NominatimGeocoder::new(client.clone(), &config.nominatim_url));
    let backends = SessionBackends {
        geocoder: Arc::new(CachedGeocoder::new(geocoder, config.geocode_cache)),
        search: Arc::new(OverpassSearch::new(client.clone(), &config.overpass_url)),
        directions: Arc::new(OsrmDirections::new(client, &config.osrm_url)),
    };

    let session = Arc::new(Session::new(config.session.clone(), backends));
    let worker = session.start_enrichment();
    let app = create_router(AppState { session });

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!("starting halfway on http://{}", config.bind);
    tracing::info!("API endpoints:");
    tracing::info!("  GET    /api/session - Current origins, midpoint and places");
    tracing::info!("  PUT    /api/origins/:slot - Set an origin from coordinates");
    tracing::info!("  POST   /api/origins/:slot/geocode - Set an origin from an address");
    tracing::info!("  DELETE /api/origins/:slot - Clear an origin");
    tracing::info!("  PUT    /api/search - Change radius, category or query");
    tracing::info!("  POST   /api/search/expand - Widen the radius after an empty result");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;

    worker.shutdown().await;
    Ok(())
}
