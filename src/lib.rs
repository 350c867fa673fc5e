pub mod auth;
pub mod cache;
pub mod clock;
pub mod error;
pub mod feedback;
pub mod handlers;
pub mod models;
pub mod openapi;
pub mod remote;
pub mod repository;
pub mod settings;
pub mod store;
pub mod users;
pub mod validation;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use handlers::{
    add_feedback, create_class, delete_class, enroll, get_class, healthz_live, healthz_ready,
    list_classes, list_feedback, refresh_classes, root, sign_in, sign_up, unenroll, update_class,
};
use tower_http::LatencyUnit;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, info};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::clock::SystemClock;
use crate::feedback::FeedbackLog;
use crate::openapi::ApiDoc;
use crate::remote::ClassesClient;
use crate::repository::ClassRepository;
use crate::settings::Settings;
use crate::store::{FileStore, KeyValueStore};
use crate::users::UserDirectory;

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub classes: ClassRepository,
    pub feedback: FeedbackLog,
    pub users: UserDirectory,
}

impl AppState {
    pub fn new(
        settings: Settings,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self, remote::RemoteError> {
        let clock = Arc::new(SystemClock);
        let remote = ClassesClient::new(
            settings.remote_base_url.clone(),
            settings.remote_timeout(),
            settings.remote_token.clone(),
        )?;

        Ok(Self {
            classes: ClassRepository::new(
                store.clone(),
                remote,
                clock.clone(),
                settings.repository_config(),
            ),
            feedback: FeedbackLog::new(store.clone(), clock),
            users: UserDirectory::new(store),
            settings,
        })
    }
}

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;

    let env_filter = if settings.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .without_time()
        .init();

    let store = Arc::new(FileStore::new(settings.data_dir.clone()));
    info!(
        data_dir = %store.dir().display(),
        remote = %settings.remote_base_url,
        "using class storage"
    );
    let state = AppState::new(settings, store)?;

    let app = build_router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], state.settings.port));
    info!("Starting Gym Booking API on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        );

    let mut router = Router::new()
        .route("/", get(root))
        .route("/healthz/live", get(healthz_live))
        .route("/healthz/ready", get(healthz_ready))
        .route("/classes", get(list_classes).post(create_class))
        .route("/classes/refresh", post(refresh_classes))
        .route(
            "/classes/{id}",
            get(get_class).put(update_class).delete(delete_class),
        )
        .route("/classes/{id}/enroll", post(enroll))
        .route("/classes/{id}/unenroll", post(unenroll))
        .route("/feedback", get(list_feedback).post(add_feedback))
        .route("/users/signup", post(sign_up))
        .route("/users/login", post(sign_in))
        .with_state(state.clone());

    if state.settings.enable_swagger {
        let openapi = ApiDoc::openapi();
        let swagger = SwaggerUi::new("/docs").url("/openapi.json", openapi);
        router = router.merge(swagger);
    }

    router.layer(trace_layer).layer(CorsLayer::permissive())
}
