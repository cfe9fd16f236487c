//! HTTP endpoint for the Slack Events API.
//!
//! Every request gets a `200` with a short plain-text body, whatever happens
//! downstream, so Slack never retries a delivery.

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::get,
};
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    base::types::{Admission, EventEnvelope, InboundEvent},
    interaction::{admission, response},
    runtime::Runtime,
};

/// Acknowledgement for anything the relay does not act on.
pub const EVENT_IGNORED: &str = "Event ignored";

/// Acknowledgement for an event that started a response task.
pub const PROCESSING: &str = "Processing";

/// Build the router serving the liveness check and the events endpoint.
pub fn router(runtime: Runtime) -> Router {
    Router::new().route("/", get(liveness).post(handle_event)).with_state(runtime)
}

async fn liveness(State(runtime): State<Runtime>) -> String {
    format!("{} bot is running.", runtime.persona.display_name)
}

#[instrument(skip_all)]
async fn handle_event(State(runtime): State<Runtime>, body: Bytes) -> (StatusCode, String) {
    info!("Slack event received.");

    (StatusCode::OK, process_envelope(&runtime, &body, Utc::now()).await)
}

/// Handle a raw envelope body as if it arrived at `now`, returning the acknowledgement text.
pub async fn process_envelope(runtime: &Runtime, body: &[u8], now: DateTime<Utc>) -> String {
    let envelope = match serde_json::from_slice::<EventEnvelope>(body) {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!("Unparseable event payload: {}", err);
            return EVENT_IGNORED.to_string();
        }
    };

    debug!("Envelope `{}`: {:#?}", envelope.kind, envelope.event);

    if !is_authentic(runtime, &envelope) {
        warn!("Verification token mismatch, ignoring payload.");
        return EVENT_IGNORED.to_string();
    }

    match envelope.kind.as_str() {
        "url_verification" => {
            info!("URL verification challenge.");
            envelope.challenge.unwrap_or_default()
        }
        "event_callback" => match envelope.event {
            Some(event) => handle_event_callback(runtime, InboundEvent::from(event), now).await,
            None => EVENT_IGNORED.to_string(),
        },
        _ => EVENT_IGNORED.to_string(),
    }
}

async fn handle_event_callback(runtime: &Runtime, event: InboundEvent, now: DateTime<Utc>) -> String {
    info!("Event type: {:?}", event.kind);

    match admission::evaluate(&event, &runtime.persona, &runtime.state, now).await {
        Ok(Admission::Respond(context)) => {
            info!("Starting async response task.");

            // Detached; the acknowledgement does not wait on the reply.
            drop(response::dispatch(context, runtime.clone()));

            PROCESSING.to_string()
        }
        Ok(Admission::Skip(reason)) => {
            info!("Skipping event: {}.", reason);
            reason.ack().to_string()
        }
        Err(err) => {
            error!("Error while admitting event: {}", err);
            EVENT_IGNORED.to_string()
        }
    }
}

/// Compare the envelope's token with the configured verification token, if any.
fn is_authentic(runtime: &Runtime, envelope: &EventEnvelope) -> bool {
    let expected = &runtime.config.slack_verification_token;

    expected.is_empty() || envelope.token.as_deref() == Some(expected.as_str())
}
