//! Message handling - Parsing, conversation state, routing and dispatch

pub mod conversation;
pub mod dispatcher;
pub mod parser;
pub mod router;

pub use dispatcher::MessageDispatcher;
pub use parser::MessageParser;
pub use router::StateRouter;
