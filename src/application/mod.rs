//! Application layer - Use cases and business logic
//!
//! This layer contains:
//! - Errors: Domain-specific errors
//! - Messaging: Message parsing, conversation state, routing
//! - Services: Broadcasting and the daily scheduler

pub mod errors;
pub mod messaging;
pub mod services;
