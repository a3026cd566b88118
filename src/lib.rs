// Public modules
pub mod chat;
pub mod client;
pub mod client_logger;
pub mod config;
pub mod credentials;
pub mod error;
pub mod navigation;
pub mod observability;
pub mod store;
pub mod sync;
pub mod types;
pub mod validate;

// Re-exports
pub use client::{ApiClient, ChatBackend, UnauthorizedHandler, validate_question};
pub use client_logger::ClientLogger;
pub use config::ClientConfig;
pub use credentials::{CredentialStore, Credentials, FileCredentials, MemoryCredentials};
pub use error::{Error, Result};
pub use navigation::{LoginRedirect, Navigator};
pub use observability::register_biometrics;
pub use store::{ChatEvent, ChatState, LoadingState, Request, Store};
pub use sync::{ChatRoute, ChatSync, SendOutcome};
pub use types::*;
