//! JSON-lines protocol spoken by `arbor serve`.
//!
//! Requests arrive on stdin as `{"id", "method", "params"}`; replies and
//! session events leave on stdout, one object per line.

pub(crate) mod dispatch;
pub(crate) mod messages;

pub(crate) use dispatch::dispatch;
pub(crate) use messages::{Outbound, parse_request};
