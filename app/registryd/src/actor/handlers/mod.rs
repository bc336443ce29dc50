//! Handler modules for the registry actor.
//!
//! Each module contains the handlers for one category of messages:
//! - `apps` - embedding and bus name loss
//! - `events` - event subscriptions and event delivery
//! - `devices` - key and mouse listeners, synthesis, pointer polling
//!
//! Handlers mutate the [`Registry`](crate::registry::Registry) synchronously
//! and spawn the remote calls it asks for; they never await.

pub mod apps;
pub mod devices;
pub mod events;

pub use apps::{on_embed, on_name_vanished, on_unembed};
pub use devices::{
    on_deregister_device_listener, on_deregister_keystroke_listener, on_generate_keyboard_event,
    on_generate_mouse_event, on_mouse_poll_tick, on_notify_mouse_listeners,
    on_register_device_listener, on_register_keystroke_listener,
};
pub use events::{deliver_events, on_deregister_event, on_dispatch_event, on_register_event};
