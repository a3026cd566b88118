// Public modules
pub mod message;
pub mod session;

// Re-exports
pub use message::{ChatEntry, ChatMessage, ClientTempId, HistoryItem, MessageId, PendingMessage};
pub use session::{PROVISIONAL_TITLE_CHARS, SessionId, SessionSummary};
