//! Core functionality for the data visualization platform
//!
//! This crate provides the event emission primitives shared by the data
//! layer and the components that consume it.

pub mod events;

// Re-export commonly used types
pub use events::{EventDetail, EventEmitter, HandlerId};
