//! QuantumGuard core: shared pieces of the demo enterprise dashboard.
//!
//! Holds the gateway configuration, the mock AHE/HEE transform, and the
//! hosted chat-completion bridge. Everything stateful (SQLite store, route
//! handlers) lives in `quantumguard-gateway`.

pub mod cipher;
pub mod config;
pub mod llm;

pub use cipher::{decrypt, encrypt, CipherError, ALGORITHM_LABEL, CIPHER_DELIMITER};
pub use config::CoreConfig;
pub use llm::ChatBridge;
