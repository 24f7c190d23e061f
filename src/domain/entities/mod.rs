//! Domain entities - Core business objects with no external dependencies

pub mod user;
pub mod message;
pub mod command;
pub mod phrase;
pub mod reply;

pub use user::{User, UserId};
pub use message::{ChatId, Content, Message};
pub use command::{Command, CommandRegistry, MenuCommand};
pub use phrase::{Phrase, TopSubmitter};
pub use reply::{KeyboardButton, Markup, Reply};
