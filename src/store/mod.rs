//! Session reference store

mod session_store;

pub use session_store::{format_size, ImageRecord, SessionStore, SessionStoreStats};
