use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::HeaderValue;
use axum::http::{HeaderName, Method};
use axum::response::IntoResponse;
use axum::{
    routing::{get, post, put},
    Router,
};
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use atelier_backend::config::Config;
use atelier_backend::db::postgres_purchase_repository::PostgresPurchaseRepository;
use atelier_backend::db::postgres_user_repository::PostgresUserRepository;
use atelier_backend::db::purchase_repository::PurchaseRepository;
use atelier_backend::db::user_repository::UserRepository;
use atelier_backend::responses::JsonResponse;
use atelier_backend::routes::account::{handle_me, health, list_purchases, update_profile};
use atelier_backend::routes::checkout::create_checkout_session;
use atelier_backend::routes::pages::{cancel, landing, success};
use atelier_backend::routes::stripe_webhook::stripe_webhook;
use atelier_backend::services::stripe::{LiveStripeService, StripeService};
use atelier_backend::state::AppState;
use atelier_backend::utils::csrf::{get_csrf_token, validate_csrf};
use atelier_backend::utils::jwt::JwtKeys;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Missing or malformed configuration aborts startup here, before any
    // listener is bound.
    let config = Arc::new(Config::from_env()?);
    let jwt_keys = Arc::new(JwtKeys::from_secret(config.jwt_secret.as_bytes())?);

    let rate_limit_ms: u64 = std::env::var("RATE_LIMITER_MILLISECONDS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        // Default: 200ms/token (~5 req/sec)
        .unwrap_or(200);
    let rate_limit_burst: u32 = std::env::var("RATE_LIMITER_BURST")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        // Default: allow short bursts during client polling
        .unwrap_or(20);
    let global_governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(rate_limit_ms)
            .burst_size(rate_limit_burst)
            .use_headers()
            .error_handler(|_err| {
                JsonResponse::too_many_requests(
                    "Too many requests. Please wait a moment and try again.",
                )
                .into_response()
            })
            .finish()
            .unwrap(),
    );

    // Background task to cleanup old IPs
    let governor_limiter = global_governor_conf.limiter().clone();
    std::thread::spawn(move || {
        let interval = std::time::Duration::from_secs(60);
        loop {
            std::thread::sleep(interval);
            governor_limiter.retain_recent();
        }
    });

    let pg_pool = establish_connection(&config.database_url).await;
    let user_repo = Arc::new(PostgresUserRepository {
        pool: pg_pool.clone(),
    }) as Arc<dyn UserRepository>;
    let purchase_repo = Arc::new(PostgresPurchaseRepository {
        pool: pg_pool.clone(),
    }) as Arc<dyn PurchaseRepository>;
    let stripe = Arc::new(LiveStripeService::from_settings(&config.stripe)) as Arc<dyn StripeService>;

    let state = AppState {
        db: user_repo,
        purchases: purchase_repo,
        stripe,
        config: config.clone(),
        jwt_keys,
    };

    let cors = CorsLayer::new()
        .allow_origin(config.frontend_origin.parse::<HeaderValue>()?)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static("x-csrf-token"),
        ])
        .allow_credentials(true);

    let csrf_layer = ServiceBuilder::new().layer(axum::middleware::from_fn(validate_csrf));

    // Cookie-authenticated state-changing routes sit behind the CSRF check.
    let csrf_protected_routes = Router::new()
        .route("/create-checkout-session", post(create_checkout_session))
        .route("/account/profile", put(update_profile))
        .layer(csrf_layer);

    // The webhook is authenticated by its signature, not a session, and must
    // see the raw body; it stays outside the CSRF layer.
    let api_routes = Router::new()
        .route("/health", get(health))
        .route("/csrf-token", get(get_csrf_token))
        .route("/me", get(handle_me))
        .route("/account/purchases", get(list_purchases))
        .route("/stripe-webhook", post(stripe_webhook))
        .merge(csrf_protected_routes);

    let app = Router::new()
        .route("/", get(landing))
        .route("/success", get(success))
        .route("/cancel", get(cancel))
        .nest("/api", api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(GovernorLayer {
            config: global_governor_conf.clone(),
        })
        .layer(cors);

    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    let addr = config.bind_addr;

    let listener = TcpListener::bind(addr).await?;
    info!("listening at http://{}", addr);
    axum::serve(listener, make_service).await?;
    Ok(())
}

/// Establish a connection to the database and verify it.
async fn establish_connection(database_url: &str) -> PgPool {
    let pool = PgPool::connect(database_url)
        .await
        .expect("Failed to connect to the database");

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .expect("Failed to verify database connection");

    info!("✅ Successfully connected to the database");
    pool
}
