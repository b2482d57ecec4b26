//! The dependency bundle every handler and middleware function reads from
//! (`axum::extract::State`).

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::agent::SessionClient;
use crate::config::ConfigStore;
use crate::orchestrator::{Orchestrator, ProviderMap};

use super::rate_limit::RateLimiter;

pub struct AppState {
    pub config: Arc<ConfigStore>,
    pub providers: Arc<ProviderMap>,
    pub session_client: Arc<ArcSwap<SessionClient>>,
    pub orchestrator: Arc<Orchestrator>,
    /// Open only once startup pre-checks pass; closed immediately on drain.
    pub readiness: Arc<AtomicBool>,
    pub rate_limiter: Arc<RateLimiter>,
}
