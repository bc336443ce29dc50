//! Inbound bus signals: peers leaving the bus and accessibility events
//! emitted by applications.

use futures::StreamExt;
use zbus::fdo::DBusProxy;
use zbus::message::Type as MessageType;
use zbus::{Connection, MatchRule, Message, MessageStream};

use super::wire::{EventBody, LegacyEventBody, event_from_signal, upgrade_legacy_body};
use crate::actor::RegistryHandle;
use crate::constants::{EVENT_CATEGORIES, EVENT_INTERFACE_PREFIX};
use crate::registry::{AccessibleEvent, ObjectRef};

/// Reports every name whose owner left the bus to the registry.
///
/// Returns when the signal stream ends or the actor stops.
///
/// # Errors
///
/// Returns an error if the `NameOwnerChanged` subscription fails.
pub async fn watch_vanished_names(
    connection: Connection,
    registry: RegistryHandle,
) -> zbus::Result<()> {
    let proxy = DBusProxy::new(&connection).await?;
    let mut stream = proxy.receive_name_owner_changed_with_args(&[(2, "")]).await?;

    while let Some(signal) = stream.next().await {
        let args = match signal.args() {
            Ok(args) => args,
            Err(err) => {
                tracing::debug!(error = %err, "bus: unreadable NameOwnerChanged");
                continue;
            }
        };

        if args.new_owner().is_some() {
            continue;
        }

        let name = args.name().to_string();
        tracing::trace!(name, "bus: name vanished");
        if registry.name_vanished(name).await.is_err() {
            break;
        }
    }

    Ok(())
}

/// Relays accessibility event signals from applications to the registry.
///
/// # Errors
///
/// Returns an error if a match rule cannot be added.
pub async fn relay_accessible_events(
    connection: Connection,
    registry: RegistryHandle,
) -> zbus::Result<()> {
    let mut streams = Vec::with_capacity(EVENT_CATEGORIES.len());
    for category in EVENT_CATEGORIES {
        let interface = format!("{EVENT_INTERFACE_PREFIX}{category}");
        let rule = MatchRule::builder()
            .msg_type(MessageType::Signal)
            .interface(interface.as_str())?
            .build();
        streams.push(MessageStream::for_match_rule(rule, &connection, None).await?);
    }

    let own_name = connection.unique_name().map(ToString::to_string);
    let mut signals = futures::stream::select_all(streams);
    tracing::debug!(categories = EVENT_CATEGORIES.len(), "bus: relaying accessibility events");

    while let Some(message) = signals.next().await {
        let message = match message {
            Ok(message) => message,
            Err(err) => {
                tracing::debug!(error = %err, "bus: dropped unreadable event signal");
                continue;
            }
        };

        let Some(event) = accessible_event(&message, own_name.as_deref()) else {
            continue;
        };
        if registry.dispatch_event(event).await.is_err() {
            break;
        }
    }

    Ok(())
}

/// Decodes an event signal. Signals sent by the registry itself and
/// bodies of unknown shape are skipped.
fn accessible_event(message: &Message, own_name: Option<&str>) -> Option<AccessibleEvent> {
    let header = message.header();
    let sender = header.sender()?.to_string();
    if own_name == Some(sender.as_str()) {
        return None;
    }

    let interface = header.interface()?.to_string();
    let member = header.member()?.to_string();
    let path = header.path()?.to_string();

    let body = message.body();
    let decoded = body
        .deserialize::<EventBody>()
        .or_else(|_| body.deserialize::<LegacyEventBody>().map(upgrade_legacy_body));

    match decoded {
        Ok(decoded) => {
            Some(event_from_signal(&interface, &member, ObjectRef::new(sender, path), decoded))
        }
        Err(err) => {
            tracing::debug!(%interface, %member, error = %err, "bus: event signal with unexpected body");
            None
        }
    }
}
