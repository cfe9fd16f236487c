//! Core components, types, and utilities for the relay.
//!
//! This module contains fundamental building blocks used throughout the application:
//! - Configuration handling and environment variables.
//! - The persona definition and its pure predicates.
//! - Default prompts and keywords.
//! - Common types and result handling.

pub mod config;
pub mod persona;
pub mod prompts;
pub mod types;
