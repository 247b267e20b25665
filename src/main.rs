use anyhow::Context;
use duka_backend::api::{self, ApiState};
use duka_backend::config::AppConfig;
use duka_backend::database::analytics_repository::PgAnalyticsStore;
use duka_backend::database::order_repository::PgOrderStore;
use duka_backend::database::otp_repository::PgOtpSessionStore;
use duka_backend::database::user_repository::PgUserStore;
use duka_backend::database::init_pool_from_config;
use duka_backend::health::HealthChecker;
use duka_backend::logging::init_tracing;
use duka_backend::middleware::logging::{request_logging_middleware, UuidRequestId};
use duka_backend::payments::mpesa::MpesaClient;
use duka_backend::payments::provider::StkGateway;
use duka_backend::services::admin::AdminService;
use duka_backend::services::mailer::{LogMailer, Mailer};
use duka_backend::services::otp::OtpService;
use duka_backend::services::poller::PaymentStatusPoller;
use duka_backend::services::reconciler::PaymentReconciler;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("failed to load configuration")?;
    config.validate().context("configuration is invalid")?;

    init_tracing(&config.logging);

    info!(
        environment = %config.mpesa.environment,
        "starting duka-backend"
    );

    let pool = init_pool_from_config(&config.database)
        .await
        .context("failed to initialize database pool")?;

    let orders = Arc::new(PgOrderStore::new(pool.clone()));
    let sessions = Arc::new(PgOtpSessionStore::new(pool.clone()));
    let users = Arc::new(PgUserStore::new(pool.clone()));
    let analytics = Arc::new(PgAnalyticsStore::new(pool.clone()));

    let gateway: Arc<dyn StkGateway> = Arc::new(
        MpesaClient::new(config.mpesa.clone()).context("failed to initialize M-Pesa client")?,
    );
    let mailer: Arc<dyn Mailer> = Arc::new(LogMailer::new(config.smtp.clone()));

    let reconciler = Arc::new(PaymentReconciler::new(orders.clone()));
    let poller = Arc::new(PaymentStatusPoller::new(
        gateway.clone(),
        reconciler.clone(),
    ));
    let otp = Arc::new(OtpService::new(
        sessions,
        users.clone(),
        analytics.clone(),
        mailer,
        config.otp.clone(),
    ));
    let admin = Arc::new(AdminService::new(
        users,
        analytics,
        config.admin.super_admin_email.clone(),
    ));
    let health = Arc::new(HealthChecker::new(pool));

    let state = ApiState {
        gateway,
        orders,
        reconciler,
        poller,
        otp,
        admin,
        health,
    };

    let app = api::build_router(state).layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
            .layer(axum::middleware::from_fn(request_logging_middleware))
            .layer(PropagateRequestIdLayer::x_request_id()),
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!(addr = %addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c"),
        _ = terminate => info!("received terminate signal"),
    }
}
