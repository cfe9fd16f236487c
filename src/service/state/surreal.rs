//! SurrealDB implementation of the conversation state store.
//!
//! Defaults to an in-memory engine (`mem://`), but any endpoint SurrealDB's
//! `any` engine understands can be configured.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::{
    Surreal,
    engine::any::{self, Any},
    opt::auth::Root,
};
use tracing::{debug, info, instrument};

use crate::base::{
    config::Config,
    types::{InboundEvent, Res, Void},
};

use super::{GenericStateClient, StateClient};

// Tables.

const COOLDOWN_TABLE: &str = "cooldown";
const TURN_TABLE: &str = "turn";
const THREAD_TABLE: &str = "thread";
const ACTIVITY_TABLE: &str = "activity";
const ACTIVITY_KEY: &str = "inbound";

// Records.

/// The last time a persona responded anywhere.
#[derive(Debug, Serialize, Deserialize)]
struct CooldownRecord {
    last_response_ms: i64,
}

/// How many times a persona has responded in a thread.
#[derive(Debug, Serialize, Deserialize)]
struct TurnRecord {
    count: u32,
}

/// The most recent message seen in a thread.
#[derive(Debug, Serialize, Deserialize)]
struct ThreadRecord {
    latest_ts: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ActivityRecord {
    last_message_ms: i64,
}

// Extra methods on `StateClient` applied by the surreal implementation.

impl StateClient {
    /// Creates a new SurrealDB-backed state client from the config.
    pub async fn surreal(config: &Config) -> Res<Self> {
        let client = SurrealStateClient::connect(&config.db_endpoint, &config.db_username, &config.db_password).await?;
        Ok(Self { inner: Arc::new(client) })
    }

    /// Creates a new in-memory SurrealDB-backed state client.
    pub async fn surreal_memory() -> Res<Self> {
        let client = SurrealStateClient::connect("mem://", "", "").await?;
        Ok(Self { inner: Arc::new(client) })
    }
}

// Structs.

/// SurrealDB state client.
#[derive(Clone)]
pub struct SurrealStateClient {
    db: Surreal<Any>,
}

impl SurrealStateClient {
    /// Connect to the state store.
    #[instrument(name = "SurrealStateClient::connect", skip(username, password))]
    pub async fn connect(endpoint: &str, username: &str, password: &str) -> Res<Self> {
        let db = any::connect(endpoint).await?;

        if !username.is_empty() {
            db.signin(Root { username, password }).await?;
        }

        db.use_ns("persona").use_db("relay").await?;

        info!("State store initialized successfully.");

        Ok(Self { db })
    }
}

#[async_trait]
impl GenericStateClient for SurrealStateClient {
    #[instrument(skip(self))]
    async fn is_in_cooldown(&self, persona: &str, cooldown: Duration) -> Res<bool> {
        let record: Option<CooldownRecord> = self.db.select((COOLDOWN_TABLE, persona)).await?;

        let Some(record) = record else {
            return Ok(false);
        };

        let elapsed_ms = Utc::now().timestamp_millis() - record.last_response_ms;

        Ok(i128::from(elapsed_ms) < cooldown.as_millis() as i128)
    }

    #[instrument(skip(self))]
    async fn turn_count_exceeded(&self, persona: &str, thread_ts: &str, max_turns: u32) -> Res<bool> {
        let record: Option<TurnRecord> = self.db.select((TURN_TABLE, turn_key(persona, thread_ts))).await?;
        let count = record.map(|r| r.count).unwrap_or_default();

        debug!("Persona `{persona}` has {count}/{max_turns} turns in thread `{thread_ts}`.");

        Ok(count >= max_turns)
    }

    #[instrument(skip(self))]
    async fn record_response(&self, persona: &str, thread_ts: &str) -> Void {
        let key = turn_key(persona, thread_ts);

        let record: Option<TurnRecord> = self.db.select((TURN_TABLE, key.as_str())).await?;
        let count = record.map(|r| r.count).unwrap_or_default() + 1;

        let _: Option<TurnRecord> = self.db.upsert((TURN_TABLE, key.as_str())).content(TurnRecord { count }).await?;

        let _: Option<CooldownRecord> = self
            .db
            .upsert((COOLDOWN_TABLE, persona))
            .content(CooldownRecord {
                last_response_ms: Utc::now().timestamp_millis(),
            })
            .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn latest_message_id(&self, thread_ts: &str) -> Res<Option<String>> {
        let record: Option<ThreadRecord> = self.db.select((THREAD_TABLE, thread_ts)).await?;
        Ok(record.map(|r| r.latest_ts))
    }

    #[instrument(skip_all, fields(ts = %event.ts))]
    async fn resolve_thread_context(&self, event: &InboundEvent) -> Res<String> {
        let thread_ts = event.thread_ts.clone().filter(|t| !t.is_empty()).unwrap_or_else(|| event.ts.clone());

        let _: Option<ThreadRecord> = self
            .db
            .upsert((THREAD_TABLE, thread_ts.as_str()))
            .content(ThreadRecord { latest_ts: event.ts.clone() })
            .await?;

        Ok(thread_ts)
    }

    #[instrument(skip(self))]
    async fn record_last_message_time(&self) -> Void {
        let now = Utc::now();

        if let Some(previous) = self.last_message_time().await? {
            debug!("Previous inbound message was {}s ago.", (now - previous).num_seconds());
        }

        let _: Option<ActivityRecord> = self
            .db
            .upsert((ACTIVITY_TABLE, ACTIVITY_KEY))
            .content(ActivityRecord {
                last_message_ms: now.timestamp_millis(),
            })
            .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn last_message_time(&self) -> Res<Option<DateTime<Utc>>> {
        let record: Option<ActivityRecord> = self.db.select((ACTIVITY_TABLE, ACTIVITY_KEY)).await?;
        Ok(record.and_then(|r| DateTime::from_timestamp_millis(r.last_message_ms)))
    }
}

/// Turn counts are tracked per persona and thread.
fn turn_key(persona: &str, thread_ts: &str) -> String {
    format!("{persona}/{thread_ts}")
}

// Tests.
