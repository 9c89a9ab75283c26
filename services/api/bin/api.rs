//! Main Entrypoint for the Switchboard API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing the database connection pool and running migrations.
//! 3. Wiring up the conversation engine, LLM client, and telephony gateway.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use sqlx::PgPool;
use std::{fs, net::SocketAddr, sync::Arc};
use switchboard_api::{
    config::Config,
    db::Db,
    router::create_router,
    state::AppState,
    telephony::{TelephonyGateway, TwilioGateway},
};
use switchboard_core::{
    events::{BroadcastHub, DEFAULT_EVENT_CAPACITY},
    lifecycle::{CallLifecycle, DEFAULT_GREETING},
    llm_client::{DEFAULT_PERSONA, LLMClient, OpenAICompatibleClient},
    registry::SessionRegistry,
    responder::ResponseGenerator,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Database ---
    let pool = PgPool::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    let db = Arc::new(Db::new(pool));
    db.run_migrations().await?;
    info!("Database connection established and migrations are up-to-date.");

    // --- 4. Wire Up the Conversation Engine ---
    let persona = match &config.persona_path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read persona file '{}'", path.display()))?,
        None => DEFAULT_PERSONA.to_string(),
    };
    let greeting = config
        .greeting_text
        .clone()
        .unwrap_or_else(|| DEFAULT_GREETING.to_string());

    let openai_config = OpenAIConfig::new()
        .with_api_key(&config.openai_api_key)
        .with_api_base("https://api.openai.com/v1/");
    let llm_client: Arc<dyn LLMClient> = Arc::new(OpenAICompatibleClient::new(
        openai_config,
        config.chat_model.clone(),
    ));

    let events = BroadcastHub::new(DEFAULT_EVENT_CAPACITY);
    let registry = Arc::new(SessionRegistry::new(events.clone(), persona));
    let responder = ResponseGenerator::new(Arc::clone(&registry), llm_client);
    let lifecycle = Arc::new(CallLifecycle::new(
        registry,
        responder,
        events.clone(),
        greeting,
    ));

    let gateway: Arc<dyn TelephonyGateway> = Arc::new(TwilioGateway::new(
        config.twilio_account_sid.clone(),
        config.twilio_auth_token.clone(),
        config.twilio_phone_number.clone(),
        config.public_url.clone(),
    ));

    let app_state = Arc::new(AppState {
        db,
        lifecycle,
        events,
        gateway,
        config: Arc::new(config.clone()),
    });

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        model = %config.chat_model,
        public_url = %config.public_url,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
