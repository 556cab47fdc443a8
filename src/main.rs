//! Onboarding API server.
//!
//! Serves signup verification, account provisioning, checkout and the Stripe
//! webhook. Every external provider left unconfigured outside production is
//! replaced by its in-memory adapter.

use std::sync::Arc;

use anyhow::Context;
use axum::http::{header, HeaderValue, Method};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use onboarding_pipeline::adapters::http::{onboarding_router, OnboardingAppState, OnboardingSettings};
use onboarding_pipeline::adapters::identity::{ZitadelConfig, ZitadelIdentityProvider};
use onboarding_pipeline::adapters::memory::{
    InMemoryIdentityProvider, InMemoryStore, RecordingMessageChannel,
};
use onboarding_pipeline::adapters::messaging::{
    AddressRoutingChannel, ResendConfig, ResendEmailChannel, TwilioConfig, TwilioSmsChannel,
};
use onboarding_pipeline::adapters::postgres::{
    PostgresCustomerRepository, PostgresLeadRepository, PostgresSignupRepository,
    PostgresTenantRepository, PostgresWebhookEventRepository, MIGRATOR,
};
use onboarding_pipeline::adapters::stripe::{
    MockPaymentProvider, StripeConfig, StripePaymentAdapter,
};
use onboarding_pipeline::application::handlers::{
    CheckoutSettings, RepairTenantsCommand, RepairTenantsHandler,
};
use onboarding_pipeline::config::{AppConfig, DatabaseConfig, MessagingConfig, ServerConfig};
use onboarding_pipeline::domain::billing::WebhookSignatureVerifier;
use onboarding_pipeline::ports::{
    Clock, CustomerRepository, IdentityProvider, LeadRepository, MessageChannel,
    PaymentProvider, SignupRepository, SystemClock, TenantRepository, WebhookEventRepository,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("loading configuration")?;
    init_tracing(&config.server);
    config.validate().context("validating configuration")?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.server.environment,
        "starting onboarding API"
    );

    let state = build_state(&config).await?;

    if let Some(every) = config.provisioning.repair_interval() {
        let repair = RepairTenantsHandler::new(
            state.tenant_repository.clone(),
            state.tenant_enricher(),
        );
        let limit = config.provisioning.repair_batch_size;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            let mut after = None;
            loop {
                ticker.tick().await;
                match repair.handle(RepairTenantsCommand { limit, after: after.take() }).await {
                    Ok(result) => {
                        if result.examined > 0 {
                            tracing::info!(
                                examined = result.examined,
                                repaired = result.repaired,
                                still_incomplete = result.still_incomplete,
                                "tenant repair run finished"
                            );
                        }
                        after = result.next;
                    }
                    Err(err) => tracing::warn!(error = %err, "tenant repair run failed"),
                }
            }
        });
        tracing::info!(interval_secs = every.as_secs(), "tenant repair job started");
    }

    let app = onboarding_router()
        .with_state(state)
        .layer(TimeoutLayer::new(config.server.request_timeout()))
        .layer(cors_layer(&config.server))
        .layer(TraceLayer::new_for_http());

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// JSON logs in production, human readable otherwise. `RUST_LOG` overrides
/// the configured filter.
fn init_tracing(server: &ServerConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&server.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if server.is_production() {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .cors_origins_list()
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_origin(AllowOrigin::list(origins))
}

struct Storage {
    signups: Arc<dyn SignupRepository>,
    tenants: Arc<dyn TenantRepository>,
    customers: Arc<dyn CustomerRepository>,
    leads: Arc<dyn LeadRepository>,
    webhook_events: Arc<dyn WebhookEventRepository>,
}

async fn build_state(config: &AppConfig) -> anyhow::Result<OnboardingAppState> {
    let storage = storage(&config.database).await?;

    let payment_provider: Arc<dyn PaymentProvider> = if config.payment.is_configured() {
        let stripe = StripeConfig::new(config.payment.stripe_api_key.clone()).with_timeout(
            std::time::Duration::from_secs(config.payment.request_timeout_secs),
        );
        Arc::new(StripePaymentAdapter::new(stripe))
    } else {
        tracing::warn!("Stripe API key not set, checkout uses the mock provider");
        Arc::new(MockPaymentProvider::new())
    };

    let identity_provider: Arc<dyn IdentityProvider> = if config.identity.is_configured() {
        let zitadel = ZitadelConfig::new(
            config.identity.zitadel_authority.clone(),
            config.identity.zitadel_service_token.clone(),
            config.identity.zitadel_organization_id.clone(),
        )
        .with_timeout(config.identity.request_timeout());
        Arc::new(ZitadelIdentityProvider::new(zitadel))
    } else {
        tracing::warn!("Zitadel not configured, identities are kept in memory");
        Arc::new(InMemoryIdentityProvider::new())
    };

    let settings = OnboardingSettings {
        signup_policy: config.signup.policy(),
        provisioning_step_timeout: config.provisioning.step_timeout(),
        checkout: CheckoutSettings {
            catalog: config.payment.price_catalog(),
            success_url: config.payment.success_url.clone(),
            cancel_url: config.payment.cancel_url.clone(),
        },
        webhook_verifier: WebhookSignatureVerifier::new(
            config.payment.stripe_webhook_secret.clone(),
        )
        .require_livemode(config.payment.require_livemode),
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    Ok(OnboardingAppState {
        signup_repository: storage.signups,
        tenant_repository: storage.tenants,
        customer_repository: storage.customers,
        lead_repository: storage.leads,
        webhook_event_repository: storage.webhook_events,
        message_channel: message_channel(&config.messaging),
        identity_provider,
        payment_provider,
        clock,
        settings: Arc::new(settings),
    })
}

async fn storage(database: &DatabaseConfig) -> anyhow::Result<Storage> {
    if !database.is_configured() {
        tracing::warn!("database URL not set, using in-memory storage");
        let store = Arc::new(InMemoryStore::new());
        return Ok(Storage {
            signups: store.clone(),
            tenants: store.clone(),
            customers: store.clone(),
            leads: store.clone(),
            webhook_events: store,
        });
    }

    let pool = PgPoolOptions::new()
        .min_connections(database.min_connections)
        .max_connections(database.max_connections)
        .acquire_timeout(database.acquire_timeout())
        .connect(&database.url)
        .await
        .context("connecting to PostgreSQL")?;
    tracing::info!("database connection established");

    if database.run_migrations {
        MIGRATOR.run(&pool).await.context("running migrations")?;
        tracing::info!("database migrations applied");
    }

    Ok(Storage {
        signups: Arc::new(PostgresSignupRepository::new(pool.clone())),
        tenants: Arc::new(PostgresTenantRepository::new(pool.clone())),
        customers: Arc::new(PostgresCustomerRepository::new(pool.clone())),
        leads: Arc::new(PostgresLeadRepository::new(pool.clone())),
        webhook_events: Arc::new(PostgresWebhookEventRepository::new(pool)),
    })
}

fn message_channel(messaging: &MessagingConfig) -> Arc<dyn MessageChannel> {
    let timeout = std::time::Duration::from_secs(messaging.request_timeout_secs);

    let sms: Arc<dyn MessageChannel> = if messaging.sms_configured() {
        Arc::new(TwilioSmsChannel::new(TwilioConfig {
            request_timeout: timeout,
            ..TwilioConfig::new(
                messaging.twilio_account_sid.clone(),
                messaging.twilio_auth_token.clone(),
                messaging.twilio_from_number.clone(),
            )
        }))
    } else {
        tracing::warn!("Twilio not configured, SMS codes are logged instead of sent");
        Arc::new(RecordingMessageChannel::logging())
    };

    let email: Arc<dyn MessageChannel> = if messaging.email_configured() {
        Arc::new(ResendEmailChannel::new(ResendConfig {
            request_timeout: timeout,
            ..ResendConfig::new(
                messaging.resend_api_key.clone(),
                messaging.from_email.clone(),
                messaging.from_name.clone(),
            )
        }))
    } else {
        tracing::warn!("Resend not configured, email codes are logged instead of sent");
        Arc::new(RecordingMessageChannel::logging())
    };

    Arc::new(AddressRoutingChannel::new(sms, email))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
