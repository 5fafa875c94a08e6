//! Command handlers for the medrag CLI.

pub mod ask;
pub mod chat;
pub mod session;
pub mod templates;

pub use ask::AskCommand;
pub use chat::ChatCommand;
pub use templates::TemplatesCommand;
