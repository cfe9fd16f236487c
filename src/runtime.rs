//! Runtime services and shared state for the relay.

use std::sync::Arc;

use tracing::{error, info, instrument};

use crate::{
    base::{
        config::Config,
        persona::Persona,
        types::{Res, Void},
    },
    interaction::webhook,
    service::{chat::ChatClient, llm::LlmClient, state::StateClient},
};

/// Runtime service context that can be shared across the application.
///
/// This struct holds the configuration, the persona, and the service clients.
/// It is designed to be trivially cloneable, allowing it to be passed around
/// without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct Runtime {
    /// The configuration for the application.
    pub config: Config,
    /// The persona the relay speaks as.
    pub persona: Arc<Persona>,
    /// The conversation state client instance.
    pub state: StateClient,
    /// The LLM client instance.
    pub llm: LlmClient,
    /// The chat client instance.
    pub chat: ChatClient,
}

impl Runtime {
    /// Create a new runtime instance.
    #[instrument(skip_all)]
    pub async fn new(config: Config) -> Res<Self> {
        // Initialize the state store.
        let state = StateClient::surreal(&config).await?;

        // Initialize the LLM client.
        let llm = LlmClient::openai(&config);

        // Initialize the slack client.
        let chat = ChatClient::slack(&config).await?;

        // The persona needs the bot's own user ID, which may come from Slack.
        let persona = Arc::new(Persona::from_config(&config, chat.bot_user_id())?);

        Ok(Self { config, persona, state, llm, chat })
    }

    /// Serve the webhook until Ctrl-C.
    pub async fn start(&self) -> Void {
        let address = format!("{}:{}", self.config.bind_address, self.config.port);
        let listener = tokio::net::TcpListener::bind(&address).await?;

        info!("{} is listening for Slack events on {} ...", self.persona.display_name, address);

        axum::serve(listener, webhook::router(self.clone())).with_graceful_shutdown(shutdown_signal()).await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", err);
    }

    info!("Shutting down ...");
}
