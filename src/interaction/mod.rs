//! Event handling and user interactions for the relay.
//!
//! This module provides the path an inbound event takes:
//! - Receiving Slack webhook deliveries
//! - Deciding whether the persona should answer
//! - Generating and posting the answer in a detached task

pub mod admission;
pub mod response;
pub mod webhook;
