use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

use crate::error::HalfwayError;
use crate::session::SessionConfig;

const DEFAULT_BIND: &str = "0.0.0.0:8080";
const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";
const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";
const DEFAULT_OSRM_URL: &str = "https://router.project-osrm.org";

/// Command-line arguments. Service URLs and the bind address fall back to
/// environment variables, then to public defaults.
#[derive(Debug, Clone, Parser)]
#[command(
    author,
    version,
    about = "Find a fair meeting point and the places around it"
)]
pub struct Args {
    /// Address to listen on [env: HALFWAY_BIND]
    #[arg(long)]
    pub bind: Option<String>,

    /// Nominatim base URL used for geocoding [env: NOMINATIM_URL]
    #[arg(long)]
    pub nominatim_url: Option<String>,

    /// Overpass interpreter endpoint used for place search [env: OVERPASS_URL]
    #[arg(long)]
    pub overpass_url: Option<String>,

    /// OSRM base URL used for travel times [env: OSRM_URL]
    #[arg(long)]
    pub osrm_url: Option<String>,

    /// Number of origin slots
    #[arg(long, default_value_t = 5)]
    pub max_origins: usize,

    /// Initial search radius in meters
    #[arg(long, default_value_t = shared::DEFAULT_RADIUS_M)]
    pub radius_m: f64,

    /// Largest radius the automatic retry or an expansion may reach
    #[arg(long, default_value_t = 5_000.0)]
    pub max_radius_m: f64,

    /// Places kept per backend query
    #[arg(long, default_value_t = 5)]
    pub per_query_limit: usize,

    /// Delay between two travel-time lookups
    #[arg(long, default_value_t = 1_000)]
    pub enrichment_interval_ms: u64,

    /// Timeout applied to every backend request
    #[arg(long, default_value_t = 10_000)]
    pub request_timeout_ms: u64,

    /// Number of geocoded addresses kept in memory
    #[arg(long, default_value_t = 128)]
    pub geocode_cache: usize,

    /// User-Agent sent to the public OpenStreetMap services
    #[arg(long)]
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: SocketAddr,
    pub nominatim_url: String,
    pub overpass_url: String,
    pub osrm_url: String,
    pub geocode_cache: usize,
    pub user_agent: String,
    pub session: SessionConfig,
}

fn flag_or_env(flag: Option<String>, var: &str, default: &str) -> String {
    flag.or_else(|| std::env::var(var).ok())
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

impl Config {
    pub fn from_args(args: Args) -> Result<Self, HalfwayError> {
        let bind = flag_or_env(args.bind, "HALFWAY_BIND", DEFAULT_BIND);
        let bind = bind
            .parse()
            .map_err(|e| HalfwayError::Config(format!("invalid bind address {bind:?}: {e}")))?;

        let config = Self {
            bind,
            nominatim_url: flag_or_env(args.nominatim_url, "NOMINATIM_URL", DEFAULT_NOMINATIM_URL),
            overpass_url: flag_or_env(args.overpass_url, "OVERPASS_URL", DEFAULT_OVERPASS_URL),
            osrm_url: flag_or_env(args.osrm_url, "OSRM_URL", DEFAULT_OSRM_URL),
            geocode_cache: args.geocode_cache,
            user_agent: args
                .user_agent
                .unwrap_or_else(|| format!("halfway/{}", env!("CARGO_PKG_VERSION"))),
            session: SessionConfig {
                max_origins: args.max_origins,
                default_radius_m: args.radius_m,
                max_radius_m: args.max_radius_m,
                per_query_limit: args.per_query_limit,
                enrichment_interval: Duration::from_millis(args.enrichment_interval_ms),
                request_timeout: Duration::from_millis(args.request_timeout_ms),
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), HalfwayError> {
        let session = &self.session;
        if session.max_origins < 2 {
            return Err(HalfwayError::Config(format!(
                "at least 2 origin slots are needed, got {}",
                session.max_origins
            )));
        }
        if session.per_query_limit == 0 {
            return Err(HalfwayError::Config("per-query limit must be at least 1".into()));
        }
        if session.enrichment_interval.is_zero() || session.request_timeout.is_zero() {
            return Err(HalfwayError::Config(
                "enrichment interval and request timeout must be non-zero".into(),
            ));
        }
        if !(session.default_radius_m > 0.0 && session.default_radius_m <= session.max_radius_m) {
            return Err(HalfwayError::Config(format!(
                "radius {} m must be positive and at most the maximum {} m",
                session.default_radius_m, session.max_radius_m
            )));
        }
        Ok(())
    }

    /// Shared HTTP client for every backend adapter.
    pub fn http_client(&self) -> Result<reqwest::Client, HalfwayError> {
        reqwest::Client::builder()
            .timeout(self.session.request_timeout)
            .user_agent(self.user_agent.clone())
            .build()
            .map_err(|e| HalfwayError::Config(format!("failed to build HTTP client: {e}")))
    }
}
