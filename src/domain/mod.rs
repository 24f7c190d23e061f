//! Domain layer - Core business logic with no external dependencies
//!
//! This layer contains:
//! - Entities: Core business objects (User, Message, Phrase, Command, Reply)
//! - Traits: Abstractions for infrastructure (Bot, PhraseStore, Clock)

pub mod entities;
pub mod traits;
