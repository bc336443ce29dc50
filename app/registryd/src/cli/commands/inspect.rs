//! Commands that inspect a running daemon over the control socket.

use colored::Colorize;
use serde::de::DeserializeOwned;
use tabled::Tabled;

use crate::cli::output;
use crate::config;
use crate::error::RegistryError;
use crate::ipc::{self, IpcError, IpcQuery, IpcResponse};
use crate::registry::{
    Application, EventListener, GrabMask, KeyDefinition, KeyListener, MouseListener,
    RegistryStatus,
};

/// What an inspection command lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InspectTarget {
    Status,
    Applications,
    Events,
    Keystrokes,
    Devices,
    Grabs,
}

impl InspectTarget {
    #[must_use]
    pub const fn query(self) -> IpcQuery {
        match self {
            Self::Status => IpcQuery::Status,
            Self::Applications => IpcQuery::Applications,
            Self::Events => IpcQuery::EventListeners,
            Self::Keystrokes => IpcQuery::KeystrokeListeners,
            Self::Devices => IpcQuery::DeviceListeners,
            Self::Grabs => IpcQuery::GrabMasks,
        }
    }
}

/// Queries the daemon and prints the answer as tables, or as JSON with
/// `json`.
///
/// # Errors
///
/// Returns [`RegistryError::IpcError`] when the daemon is not reachable or
/// answers with an error.
pub fn execute(target: InspectTarget, json: bool) -> Result<(), RegistryError> {
    let socket_path = config::socket_path(config::get_config());

    let response = ipc::send_query(&socket_path, target.query()).map_err(|err| match err {
        IpcError::DaemonNotRunning => RegistryError::IpcError(format!(
            "registryd is not running (no daemon at {})",
            socket_path.display()
        )),
        other => RegistryError::IpcError(other.to_string()),
    })?;

    let data = match response {
        IpcResponse::Success { data } => data,
        IpcResponse::Error { error } => return Err(RegistryError::IpcError(error)),
    };

    if json {
        output::print_highlighted_json(&data);
        return Ok(());
    }

    match target {
        InspectTarget::Status => print_status(&parse(data)?),
        InspectTarget::Applications => print_applications(parse(data)?),
        InspectTarget::Events => print_event_listeners(parse(data)?),
        InspectTarget::Keystrokes => print_keystroke_listeners(parse(data)?),
        InspectTarget::Devices => print_device_listeners(parse(data)?),
        InspectTarget::Grabs => print_grab_masks(parse(data)?),
    }
    Ok(())
}

fn parse<T: DeserializeOwned>(data: serde_json::Value) -> Result<T, RegistryError> {
    serde_json::from_value(data)
        .map_err(|err| RegistryError::IpcError(format!("unexpected response: {err}")))
}

fn print_status(status: &RegistryStatus) {
    println!("{} {}", "registryd".bold(), "running".green());
    println!("  {:<20} {}", "Bus name", status.bus_name.cyan());
    println!("  {:<20} {}", "Applications", status.applications);
    println!("  {:<20} {}", "Event listeners", status.event_listeners);
    println!("  {:<20} {}", "Keystroke listeners", status.keystroke_listeners);
    println!("  {:<20} {}", "Device listeners", status.device_listeners);
    println!("  {:<20} {}", "Key grabs", status.grab_masks);
    println!("  {:<20} {}", "Pointer polling", output::format_bool(status.polling));
}

#[derive(Tabled)]
struct ApplicationRow {
    #[tabled(rename = "Id")]
    id: i32,
    #[tabled(rename = "Bus Name")]
    name: String,
    #[tabled(rename = "Path")]
    path: String,
}

fn print_applications(apps: Vec<Application>) {
    let rows = apps
        .into_iter()
        .map(|app| ApplicationRow {
            id: app.id,
            name: app.reference.name,
            path: output::truncate(&app.reference.path, 48),
        })
        .collect();
    output::print_table("Applications", rows, "No applications embedded.");
}

#[derive(Tabled)]
struct EventListenerRow {
    #[tabled(rename = "Id")]
    id: u64,
    #[tabled(rename = "Subscriber")]
    subscriber: String,
    #[tabled(rename = "Event")]
    event: String,
    #[tabled(rename = "Properties")]
    properties: String,
}

fn print_event_listeners(listeners: Vec<EventListener>) {
    let rows = listeners
        .into_iter()
        .map(|listener| EventListenerRow {
            id: listener.id,
            subscriber: listener.subscriber,
            event: listener.filter.to_string(),
            properties: listener.properties.join(", "),
        })
        .collect();
    output::print_table("Event listeners", rows, "No event listeners registered.");
}

#[derive(Tabled)]
struct KeystrokeListenerRow {
    #[tabled(rename = "Id")]
    id: u64,
    #[tabled(rename = "Listener")]
    address: String,
    #[tabled(rename = "Keys")]
    keys: String,
    #[tabled(rename = "Modifiers")]
    mask: String,
    #[tabled(rename = "Types")]
    types: String,
    #[tabled(rename = "Sync")]
    synchronous: String,
    #[tabled(rename = "Preemptive")]
    preemptive: String,
    #[tabled(rename = "Global")]
    global: String,
}

fn print_keystroke_listeners(listeners: Vec<KeyListener>) {
    let rows = listeners
        .into_iter()
        .map(|listener| KeystrokeListenerRow {
            id: listener.id,
            address: output::truncate(&listener.address.to_string(), 48),
            keys: describe_keys(&listener.keys),
            mask: output::format_mask(listener.mask),
            types: output::format_mask(listener.types),
            synchronous: output::format_bool(listener.mode.synchronous),
            preemptive: output::format_bool(listener.mode.preemptive),
            global: output::format_bool(listener.mode.global),
        })
        .collect();
    output::print_table("Keystroke listeners", rows, "No keystroke listeners registered.");
}

fn describe_keys(keys: &[KeyDefinition]) -> String {
    if keys.is_empty() {
        return "all".to_string();
    }
    let described: Vec<String> = keys
        .iter()
        .map(|key| {
            if !key.keystring.is_empty() {
                format!("{:?}", key.keystring)
            } else if key.keysym != 0 {
                format!("sym {}", key.keysym)
            } else {
                format!("code {}", key.keycode)
            }
        })
        .collect();
    output::truncate(&described.join(", "), 40)
}

#[derive(Tabled)]
struct DeviceListenerRow {
    #[tabled(rename = "Id")]
    id: u64,
    #[tabled(rename = "Listener")]
    address: String,
    #[tabled(rename = "Types")]
    types: String,
}

fn print_device_listeners(listeners: Vec<MouseListener>) {
    let rows = listeners
        .into_iter()
        .map(|listener| DeviceListenerRow {
            id: listener.id,
            address: output::truncate(&listener.address.to_string(), 48),
            types: output::format_mask(listener.types),
        })
        .collect();
    output::print_table("Device listeners", rows, "No device listeners registered.");
}

#[derive(Tabled)]
struct GrabRow {
    #[tabled(rename = "Key Code")]
    key_code: String,
    #[tabled(rename = "Modifiers")]
    mod_mask: String,
    #[tabled(rename = "Refs")]
    ref_count: u32,
    #[tabled(rename = "State")]
    state: String,
}

fn print_grab_masks(masks: Vec<GrabMask>) {
    let rows = masks
        .into_iter()
        .map(|mask| GrabRow {
            key_code: if mask.key_code == 0 { "any".to_string() } else { mask.key_code.to_string() },
            mod_mask: format!("{:#06x}", mask.mod_mask),
            ref_count: mask.ref_count,
            state: grab_state(&mask).to_string(),
        })
        .collect();
    output::print_table("Key grabs", rows, "No key grabs active.");
}

const fn grab_state(mask: &GrabMask) -> &'static str {
    match (mask.pending_add, mask.pending_remove) {
        (true, _) => "adding",
        (_, true) => "removing",
        _ => "active",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_targets_map_to_queries() {
        assert_eq!(InspectTarget::Status.query(), IpcQuery::Status);
        assert_eq!(InspectTarget::Events.query(), IpcQuery::EventListeners);
        assert_eq!(InspectTarget::Grabs.query(), IpcQuery::GrabMasks);
    }

    #[test]
    fn test_describe_keys() {
        assert_eq!(describe_keys(&[]), "all");
        let keys = [
            KeyDefinition::keystring("a"),
            KeyDefinition::keysym(65),
            KeyDefinition::keycode(38),
        ];
        assert_eq!(describe_keys(&keys), r#""a", sym 65, code 38"#);
    }

    #[test]
    fn test_grab_state() {
        let mut mask = GrabMask {
            mod_mask: 0,
            key_code: 0,
            ref_count: 1,
            pending_add: true,
            pending_remove: false,
        };
        assert_eq!(grab_state(&mask), "adding");
        mask.pending_add = false;
        assert_eq!(grab_state(&mask), "active");
        mask.pending_remove = true;
        assert_eq!(grab_state(&mask), "removing");
    }

    #[test]
    fn test_query_results_parse_from_daemon_json() {
        let data = serde_json::json!([{
            "id": 3,
            "reference": {"name": ":1.7", "path": "/org/a11y/atspi/accessible/root"}
        }]);
        let apps: Vec<Application> = parse(data).unwrap();
        assert_eq!(apps[0].id, 3);
        assert_eq!(apps[0].reference.name, ":1.7");

        assert!(parse::<Vec<Application>>(serde_json::json!({"bogus": 1})).is_err());
    }
}
