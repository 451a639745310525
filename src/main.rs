use std::sync::{Arc, Mutex};

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use garagebook::config::AppConfig;
use garagebook::db;
use garagebook::handlers;
use garagebook::services::activity::ActivityLog;
use garagebook::services::host::{HostOptions, PeriodicHost};
use garagebook::services::messaging::log::{LogEmailChannel, LogTextChannel};
use garagebook::services::messaging::mailgun::MailgunEmailChannel;
use garagebook::services::messaging::twilio::TwilioTextChannel;
use garagebook::services::messaging::{EmailChannel, TextChannel};
use garagebook::services::notifications::log::LogAlertHost;
use garagebook::services::notifications::push::PushAlertHost;
use garagebook::services::notifications::AlertHost;
use garagebook::services::run::{self, RunGuard, TriggerResult};
use garagebook::services::store::SqliteStore;
use garagebook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;
    let db = Arc::new(Mutex::new(conn));

    let text: Box<dyn TextChannel> = match config.text_provider.as_str() {
        "twilio" => {
            anyhow::ensure!(
                !config.twilio_account_sid.is_empty(),
                "TWILIO_ACCOUNT_SID must be set when TEXT_PROVIDER=twilio"
            );
            tracing::info!(
                "using Twilio text provider (from: {})",
                config.twilio_phone_number
            );
            Box::new(TwilioTextChannel::new(
                config.twilio_account_sid.clone(),
                config.twilio_auth_token.clone(),
                config.twilio_phone_number.clone(),
            ))
        }
        _ => {
            tracing::info!("using log text provider");
            Box::new(LogTextChannel)
        }
    };

    let email: Box<dyn EmailChannel> = match config.email_provider.as_str() {
        "mailgun" => {
            anyhow::ensure!(
                !config.mailgun_api_key.is_empty(),
                "MAILGUN_API_KEY must be set when EMAIL_PROVIDER=mailgun"
            );
            tracing::info!(
                "using Mailgun email provider (domain: {})",
                config.mailgun_domain
            );
            Box::new(MailgunEmailChannel::new(
                config.mailgun_domain.clone(),
                config.mailgun_api_key.clone(),
                config.mailgun_from.clone(),
            ))
        }
        _ => {
            tracing::info!("using log email provider");
            Box::new(LogEmailChannel)
        }
    };

    let alerts: Box<dyn AlertHost> = match config.alert_provider.as_str() {
        "push" => {
            tracing::info!("using push alert gateway (url: {})", config.alert_gateway_url);
            Box::new(PushAlertHost::new(
                config.alert_gateway_url.clone(),
                config.alert_gateway_token.clone(),
            ))
        }
        _ => {
            tracing::info!("using log alert provider");
            Box::new(LogAlertHost)
        }
    };

    // Asked once at startup; denied means runs proceed without local alerts
    let alerts_granted = alerts.request_permission().await;
    if !alerts_granted {
        tracing::warn!("alert permission denied, runs will skip local alerts");
    }

    let state = Arc::new(AppState {
        db: Arc::clone(&db),
        config: config.clone(),
        store: Arc::new(SqliteStore::new(Arc::clone(&db))),
        text,
        email,
        alerts,
        alerts_granted,
        activity: ActivityLog::new(Arc::clone(&db)),
        host: PeriodicHost::new(),
        run_guard: RunGuard::new(),
    });

    // Bootstrap run at startup, then hand the cadence to the periodic host
    if let TriggerResult::Completed(outcome) = run::trigger_run(&state).await {
        tracing::info!(outcome = ?outcome, "bootstrap reminder run");
    }

    let tick_state = Arc::clone(&state);
    state.host.register(
        HostOptions {
            minimum_interval_secs: config.reminder_interval_secs,
            continue_after_exit: false,
            start_on_boot: false,
        },
        move || {
            let state = Arc::clone(&tick_state);
            async move {
                if let TriggerResult::Busy = run::trigger_run(&state).await {
                    tracing::debug!("periodic tick skipped, run in progress");
                }
            }
        },
    );

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route(
            "/api/clients",
            post(handlers::clients::create_client).get(handlers::clients::list_clients),
        )
        .route("/api/vehicles", post(handlers::clients::create_vehicle))
        .route(
            "/api/appointments",
            post(handlers::appointments::create_appointment)
                .get(handlers::appointments::list_appointments),
        )
        .route(
            "/api/appointments/:id/cancel",
            post(handlers::appointments::cancel_appointment),
        )
        .route(
            "/api/availability",
            get(handlers::appointments::check_availability),
        )
        .route("/api/admin/status", get(handlers::admin::get_status))
        .route(
            "/api/admin/reminders/run",
            post(handlers::admin::trigger_reminder_run),
        )
        .route("/api/admin/activity", get(handlers::admin::get_activity))
        .route(
            "/api/admin/activity/events",
            get(handlers::admin::activity_events),
        )
        .route(
            "/webhook/delivery-status",
            post(handlers::webhook::delivery_status),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
