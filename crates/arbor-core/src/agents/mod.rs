//! Session kinds and CLI tool detection.
//!
//! # Usage
//!
//! ```rust
//! use arbor_core::agents::SessionKind;
//!
//! let kind = SessionKind::parse("claude").unwrap();
//! assert_eq!(kind.binary(), Some("claude"));
//! assert!(SessionKind::parse("unknown").is_none());
//! ```

pub mod checker;
pub mod types;

pub use checker::{PathToolChecker, ToolChecker};
pub use types::SessionKind;
