//! The startup supervisor: loads boot config, constructs providers and the
//! agent client, registers rebuilders, opens the readiness gate, serves
//! HTTP, and drains on signal. Boot order is dotenv → tracing init →
//! crypto provider install → config load → state construction → serve;
//! shutdown races a `SIGTERM`/`SIGINT` future against the server future and
//! enforces a forced-exit deadline once drain begins.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::net::TcpListener;

use crate::agent::SessionClient;
use crate::config::{ConfigStore, GatewayConfig};
use crate::http::{self, AppState, RateLimiter};
use crate::orchestrator::Orchestrator;
use crate::rebuilders;

/// How long the drain sequence waits for in-flight requests before forcing
/// process exit.
const FORCED_EXIT_DEADLINE: Duration = Duration::from_secs(10);

const RATE_LIMITER_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Run the full boot-to-drain lifecycle. Returns once the server has
/// drained and exited cleanly; a hung drain exits the process directly
/// rather than returning.
pub async fn run() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    crate::logging::init();
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install default TLS crypto provider"))?;

    let config = GatewayConfig::from_env()?;
    let addr = socket_addr(&config)?;

    let state = build_state(config);
    run_prechecks(&state).await;
    state.readiness.store(true, Ordering::Relaxed);
    tracing::info!("readiness gate open");

    spawn_rate_limiter_prune_tick(state.rate_limiter.clone());

    let router = http::build_router(state.clone());
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "voice-turn gateway listening");

    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(drain_on_signal(state))
        .await?;

    Ok(())
}

fn socket_addr(config: &GatewayConfig) -> anyhow::Result<SocketAddr> {
    format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid HOST/PORT combination: {e}"))
}

/// Construct every long-lived dependency and wire the rebuilders to the
/// config store. The gate starts closed; `run` opens it after
/// pre-checks.
fn build_state(config: GatewayConfig) -> Arc<AppState> {
    let store = Arc::new(ConfigStore::new(config));
    let snapshot = store.get();

    let providers = Arc::new(rebuilders::build_all_providers(&snapshot));
    let session_client = Arc::new(ArcSwap::from_pointee(rebuilders::build_session_client(&snapshot)));

    rebuilders::register_stt_rebuilder(&store, providers.clone());
    rebuilders::register_session_rebuilder(&store, session_client.clone());

    let orchestrator = Arc::new(Orchestrator::new(providers.clone(), session_client.clone()));

    Arc::new(AppState {
        config: store,
        providers,
        session_client,
        orchestrator,
        readiness: Arc::new(AtomicBool::new(false)),
        rate_limiter: Arc::new(RateLimiter::new()),
    })
}

/// Probe the configured active provider once at boot and log the outcome.
/// The gate opens regardless: a dependency that's down at boot is exactly
/// what `/readyz` exists to report on an ongoing basis, and refusing to
/// start would turn a transient upstream blip into a boot failure.
async fn run_prechecks(state: &AppState) {
    let config = state.config.get();
    if let Some(provider) = state.providers.get(&config.stt_provider) {
        let health = provider.value().health_check().await;
        tracing::info!(
            provider = %config.stt_provider,
            healthy = health.healthy,
            message = %health.message,
            "startup pre-check: STT provider"
        );
    }
    tracing::info!(
        healthy = state.session_client.load().is_healthy(),
        "startup pre-check: agent session client"
    );
}

fn spawn_rate_limiter_prune_tick(rate_limiter: Arc<RateLimiter>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMITER_PRUNE_INTERVAL);
        interval.tick().await; // first tick fires immediately; skip it
        loop {
            interval.tick().await;
            rate_limiter.prune();
        }
    });
}

/// Wait for SIGTERM/SIGINT, then run the drain sequence: close the
/// readiness gate (new requests see 503 immediately), disconnect the
/// agent session client (rejecting its pending turns), and arm a
/// forced-exit deadline in case in-flight work never finishes. Resolving
/// this future is what tells `axum::serve` to stop accepting new
/// connections and wait for in-flight requests.
async fn drain_on_signal(state: Arc<AppState>) {
    wait_for_shutdown_signal().await;
    tracing::info!("drain: shutdown signal received, closing readiness gate");
    state.readiness.store(false, Ordering::Relaxed);

    let session_client: Arc<SessionClient> = state.session_client.load_full();
    tokio::spawn(async move {
        session_client.disconnect().await;
    });

    tokio::spawn(async move {
        tokio::time::sleep(FORCED_EXIT_DEADLINE).await;
        tracing::error!("drain: forced-exit deadline elapsed, exiting");
        std::process::exit(1);
    });
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    {
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(error) => {
                    tracing::error!(%error, "failed to install SIGTERM handler");
                }
            }
        };

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
}
