//! Domain traits - Abstractions for infrastructure implementations

pub mod bot;
pub mod clock;
pub mod store;

pub use bot::{Bot, BotInfo};
pub use clock::{Clock, SystemClock};
pub use store::PhraseStore;
