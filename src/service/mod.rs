//! Service integrations for external APIs and clients.
//!
//! This module contains implementations for the services the relay talks to:
//! - Chat services (e.g., Slack)
//! - LLM services (e.g., OpenAI)
//! - Conversation state (e.g., SurrealDB)
//!
//! Each service module defines both generic traits and concrete implementations,
//! allowing for extensibility and easy testing.

pub mod chat;
pub mod llm;
pub mod state;
