//! OpenAI implementation of the LLM service.
//!
//! Persona replies are a single chat completion: the persona's system prompt
//! and the user's message go in, and the first choice's text comes out.  A
//! failed call fails the response task; nothing is retried.

use std::sync::Arc;

use crate::base::{
    config::Config,
    types::{Conversation, PromptRole, Res},
};
use anyhow::anyhow;
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse,
    },
};
use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{GenericLlmClient, LlmClient};

// Extra methods on `LlmClient` applied by the openai implementation.

impl LlmClient {
    pub fn openai(config: &Config) -> Self {
        let client = OpenAiLlmClient::new(config);
        Self { inner: Arc::new(client) }
    }
}

// Specific implementations.

/// OpenAI LLM client implementation.
#[derive(Clone)]
pub struct OpenAiLlmClient {
    client: Client<OpenAIConfig>,
    config: Config,
}

impl OpenAiLlmClient {
    /// Create a new OpenAI LLM client.
    #[instrument(name = "OpenAiLlmClient::new", skip_all)]
    pub fn new(config: &Config) -> Self {
        let cfg = OpenAIConfig::new().with_api_key(config.openai_api_key.clone());

        Self {
            client: Client::with_config(cfg),
            config: config.clone(),
        }
    }
}

#[async_trait]
impl GenericLlmClient for OpenAiLlmClient {
    #[instrument(name = "OpenAiLlmClient::get_completion", skip_all)]
    async fn get_completion(&self, conversation: &Conversation) -> Res<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.config.openai_model)
            .max_completion_tokens(self.config.openai_max_tokens)
            .messages(build_openai_messages(conversation)?)
            .build()?;

        let response = self.client.chat().create(request).await?;

        debug!("OpenAI completion `{}` used model `{}`", response.id, response.model);

        parse_openai_response(&response)
    }
}

// Helpers.

/// Map the conversation onto OpenAI chat messages, preserving order.
fn build_openai_messages(conversation: &Conversation) -> Res<Vec<ChatCompletionRequestMessage>> {
    conversation
        .messages
        .iter()
        .map(|message| -> Res<ChatCompletionRequestMessage> {
            let message: ChatCompletionRequestMessage = match message.role {
                PromptRole::System => ChatCompletionRequestSystemMessageArgs::default().content(message.content.clone()).build()?.into(),
                PromptRole::User => ChatCompletionRequestUserMessageArgs::default().content(message.content.clone()).build()?.into(),
            };

            Ok(message)
        })
        .collect()
}

/// Take the text of the first choice.
fn parse_openai_response(response: &CreateChatCompletionResponse) -> Res<String> {
    let choice = response.choices.first().ok_or_else(|| anyhow!("OpenAI returned no choices."))?;

    if let Some(refusal) = &choice.message.refusal {
        return Err(anyhow!("Request refused: {refusal}"));
    }

    choice.message.content.clone().ok_or_else(|| anyhow!("OpenAI returned no text content."))
}

// Tests.
