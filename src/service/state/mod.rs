pub mod surreal;

use std::{ops::Deref, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::base::types::{InboundEvent, Res, Void};

// Traits.

/// Generic conversation state trait that stores must implement.
///
/// This holds everything that outlives a single event: per-persona cooldowns,
/// per-thread turn counts, and the latest message seen in each thread.
///
/// None of these operations are transactional.  Concurrent response tasks may
/// read and write the same keys, and the relay accepts the resulting races.
#[async_trait]
pub trait GenericStateClient: Send + Sync + 'static {
    /// Whether the persona responded less than `cooldown` ago.
    async fn is_in_cooldown(&self, persona: &str, cooldown: Duration) -> Res<bool>;

    /// Whether the persona has already responded `max_turns` times in the thread.
    async fn turn_count_exceeded(&self, persona: &str, thread_ts: &str, max_turns: u32) -> Res<bool>;

    /// Record that the persona responded in the thread.
    ///
    /// This bumps the thread's turn count and starts the persona's cooldown.
    async fn record_response(&self, persona: &str, thread_ts: &str) -> Void;

    /// The most recent message seen in the thread, if any.
    async fn latest_message_id(&self, thread_ts: &str) -> Res<Option<String>>;

    /// Resolve the thread an event belongs to, and mark the event as the thread's latest message.
    ///
    /// Top-level messages start a new thread keyed by their own timestamp.
    async fn resolve_thread_context(&self, event: &InboundEvent) -> Res<String>;

    /// Stamp the time the relay last saw an inbound message.
    async fn record_last_message_time(&self) -> Void;

    /// The time the relay last saw an inbound message, if ever.
    async fn last_message_time(&self) -> Res<Option<DateTime<Utc>>>;
}

// Structs.

/// State client for the relay.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct StateClient {
    inner: Arc<dyn GenericStateClient>,
}

impl Deref for StateClient {
    type Target = dyn GenericStateClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl StateClient {
    pub fn new(inner: Arc<dyn GenericStateClient>) -> Self {
        Self { inner }
    }
}
