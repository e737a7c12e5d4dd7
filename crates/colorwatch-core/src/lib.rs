//! colorwatch core library
//!
//! Color presence detection, the edge-triggered latch, and the notifiers
//! that relay presence transitions to the relay server.

pub mod color;
pub mod config;
pub mod detector;
pub mod error;
pub mod latch;
pub mod message;
pub mod notifier;

pub use error::{ColorwatchError, ColorwatchResult};
