//! Ambient helpers: file logging and the developer log sink.
pub mod devlog;
pub mod logger;
