//! The relay core — event classification, the four flows, and texts.

pub mod event;
pub mod router;
pub mod templates;

pub use event::{AdminAction, Command, Route, classify, parse_command};
pub use router::RelayRouter;
