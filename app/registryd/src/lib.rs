//! registryd - the accessibility registry daemon.
//!
//! The daemon brokers accessibility traffic on the accessibility bus:
//! applications embed their root accessible under the desktop object,
//! assistive technologies subscribe to events and register keystroke and
//! mouse listeners, and raw input events are routed to those listeners.
//!
//! - [`registry`]: synchronous broker state and its operations
//! - [`actor`]: the task that owns the registry and performs remote calls
//! - [`bus`]: D-Bus objects, signals and name tracking
//! - [`ipc`]: the control socket the inspection commands talk to
//! - [`cli`]: command-line entry points

pub mod actor;
pub mod bus;
pub mod cli;
pub mod config;
pub mod constants;
pub mod daemon;
pub mod error;
pub mod ipc;
pub mod logging;
pub mod registry;
pub mod schema;
