//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store calls into reminder/task use-case APIs.
//! - Keep callers decoupled from storage details.

pub mod item_service;
