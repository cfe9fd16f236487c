//! Library root for `persona-relay`.
//!
//! Persona-relay lets an LLM-backed executive persona take part in Slack conversations:
//! - Receives Slack Events API deliveries over HTTP
//! - Decides whether the persona should answer (mentions, keywords, working hours)
//! - Rate limits itself per thread (cooldown, turn limit, staleness)
//! - Answers in-thread using an OpenAI chat completion
//!
//! The relay integrates with Slack for chat, OpenAI for responses, and SurrealDB
//! for conversation state.  Each service sits behind a trait so that different
//! implementations (or test doubles) can be swapped in.

pub mod base;
pub mod interaction;
pub mod runtime;
pub mod service;

use base::{config::Config, types::Void};
use rustls::crypto;
use tracing::info;

/// Public async entry for the binary crate.
///
/// Sets up necessary services and starts the relay runtime:
/// - Initializes the crypto provider
/// - Creates the runtime context with state, LLM, and chat clients
/// - Serves the webhook until shutdown
pub async fn start(config: Config) -> Void {
    info!("Starting persona-relay ...");

    // Start the crypto provider.
    crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("A crypto provider was already installed."))?;

    // Initialize the runtime.
    let runtime = runtime::Runtime::new(config).await?;

    // Start the runtime.
    runtime.start().await?;

    Ok(())
}
