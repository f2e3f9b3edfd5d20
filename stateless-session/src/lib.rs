#![doc = include_str!("../README.md")]
//!

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]

pub mod algorithm;
pub mod codec;
pub mod config;
pub mod error;
pub mod manager;
pub mod record;

pub use algorithm::{SigningAlgorithm, SigningSecret};
pub use config::{ConfigError, ConfigReadError, ConfigToml, SessionConfig};
pub use error::{SessionError, UnusableReason};
pub use manager::SessionManager;
pub use record::{SessionRecord, SessionUser, TtlBasis};

pub mod timestamp {
    //! Timestamp used to stamp session records.
    pub use pubky_timestamp::*;

    /// Current wall clock time in milliseconds since the unix epoch.
    pub fn now_ms() -> u64 {
        Timestamp::now().as_u64() / 1_000
    }
}
