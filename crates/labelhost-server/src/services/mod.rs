//! Request-independent logic used by the handlers.

pub mod version;
