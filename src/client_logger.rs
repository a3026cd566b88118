//! Logging trait for API client operations.
//!
//! This module provides the [`ClientLogger`] trait that allows users to capture
//! and log every HTTP exchange passing through the [`ApiClient`](crate::ApiClient).

/// A trait for logging API client operations.
///
/// Implement this trait to record the requests the client issues and the raw
/// responses it receives, before any validation happens.
///
/// # Example
///
/// ```rust,ignore
/// use chatsync::ClientLogger;
/// use std::io::Write;
/// use std::sync::Mutex;
///
/// struct FileLogger {
///     file: Mutex<std::fs::File>,
/// }
///
/// impl ClientLogger for FileLogger {
///     fn log_request(&self, method: &str, path: &str) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "--> {method} {path}").unwrap();
///     }
///
///     fn log_response(&self, method: &str, path: &str, status: u16, body: &[u8]) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "<-- {status} {method} {path} ({} bytes)", body.len()).unwrap();
///     }
/// }
/// ```
pub trait ClientLogger: Send + Sync {
    /// Log a request just before it is sent.
    ///
    /// `path` is relative to the configured base URL, e.g. `/api/chat/sessions`.
    fn log_request(&self, method: &str, path: &str);

    /// Log a response once its body has been read.
    ///
    /// Called for every response that arrives, successful or not.  Transport
    /// failures that produce no response are not logged here.
    fn log_response(&self, method: &str, path: &str, status: u16, body: &[u8]);
}
