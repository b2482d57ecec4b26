//! Config-change rebuilders: construct fresh STT provider instances
//! and a fresh agent session client from a `GatewayConfig` snapshot, and
//! wire them to `ConfigStore::on_change` so a settings patch that touches
//! STT or agent-gateway fields takes effect without a restart. Each
//! rebuild constructs a brand new adapter from the merged config rather
//! than mutating one in place.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::agent::{SessionClient, SessionClientConfig};
use crate::config::{ConfigStore, GatewayConfig};
use crate::domain::ProviderId;
use crate::orchestrator::ProviderMap;
use crate::stt::{CustomHttpSTT, OpenAiSTT, SttProvider, WhisperXSTT};

/// Build every STT provider adapter from a config snapshot. All three are
/// always built, not just the active one: switching `sttProvider` at
/// runtime must not require a second round of construction.
pub fn build_all_providers(config: &GatewayConfig) -> ProviderMap {
    let map = ProviderMap::new();
    map.insert(ProviderId::WhisperX, build_provider(config, ProviderId::WhisperX));
    map.insert(ProviderId::OpenAI, build_provider(config, ProviderId::OpenAI));
    map.insert(ProviderId::Custom, build_provider(config, ProviderId::Custom));
    map
}

fn build_provider(config: &GatewayConfig, id: ProviderId) -> Arc<dyn SttProvider> {
    match id {
        ProviderId::WhisperX => Arc::new(WhisperXSTT::new(config.whisperx.clone())),
        ProviderId::OpenAI => Arc::new(OpenAiSTT::new(config.openai.clone())),
        ProviderId::Custom => Arc::new(CustomHttpSTT::new(config.custom_http.clone())),
    }
}

/// Register the STT rebuilder: whenever a patch touches provider config,
/// rebuild every adapter and swap them into `providers` one key at a time.
/// In-flight `transcribe` calls hold their own `Arc<dyn SttProvider>` clone
/// from before the swap and run to completion against the old instance.
pub fn register_stt_rebuilder(store: &ConfigStore, providers: Arc<ProviderMap>) {
    store.on_change(Arc::new(move |patch, config| {
        if !patch.touches_stt() {
            return;
        }
        tracing::info!("rebuilding STT providers after config change");
        for id in ProviderId::all() {
            providers.insert(id, build_provider(config, id));
        }
    }));
}

/// Build a fresh, not-yet-dialed agent session client from a config
/// snapshot.
pub fn build_session_client(config: &GatewayConfig) -> SessionClient {
    let token = if config.openclaw_gateway_token.is_empty() {
        None
    } else {
        Some(config.openclaw_gateway_token.clone())
    };
    SessionClient::new(SessionClientConfig::new(config.openclaw_gateway_url.clone(), token))
}

/// Register the session-client rebuilder: whenever a patch touches the
/// agent gateway URL or token, build a replacement client, swap it in, and
/// disconnect the old one. Turns already holding an `Arc` clone of the old
/// client from before the swap still run their in-flight send against it —
/// `disconnect` fails those in flight rather than yanking the socket out
/// from under them silently. The new client is never eagerly dialed here;
/// the first turn that needs it triggers the dial.
pub fn register_session_rebuilder(store: &ConfigStore, session_client: Arc<ArcSwap<SessionClient>>) {
    store.on_change(Arc::new(move |patch, config| {
        if !patch.touches_session_client() {
            return;
        }
        tracing::info!("rebuilding agent session client after config change");
        let old = session_client.swap(Arc::new(build_session_client(config)));
        tokio::spawn(async move {
            old.disconnect().await;
        });
    }));
}
