//! Application handlers for the registry actor.
//!
//! - Embed → append to the desktop, then assign the application id remotely
//! - Unembed → remove the exact (name, path) entry
//! - Name vanished → drop everything the name owned

use std::sync::Arc;

use crate::registry::{Embedded, ListenerTransport, ObjectRef, Registry};

/// Handles an embed request.
///
/// The id is assigned on the application's own root object after the
/// entry exists; a failure there is logged and the entry is kept.
pub fn on_embed(
    registry: &mut Registry,
    transport: &Arc<dyn ListenerTransport>,
    application: ObjectRef,
) -> Embedded {
    let embedded = registry.embed(application.clone());

    let call = transport.assign_application_id(&application, embedded.id);
    tokio::spawn(async move {
        if let Err(err) = call.await {
            tracing::debug!(error = %err, %application, "registry: could not assign application id");
        }
    });

    embedded
}

/// Handles an unembed request.
pub fn on_unembed(registry: &mut Registry, application: &ObjectRef) {
    if !registry.unembed(application) {
        tracing::trace!(%application, "registry: nothing to unembed");
    }
}

/// Handles the loss of a bus name.
pub fn on_name_vanished(registry: &mut Registry, name: &str) {
    tracing::debug!(name, "registry: bus name vanished");
    registry.name_vanished(name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::transport::fake::RecordingTransport;

    #[tokio::test]
    async fn test_embed_assigns_id_through_transport() {
        let mut registry = Registry::headless();
        let fake = RecordingTransport::new();
        let transport: Arc<dyn ListenerTransport> = fake.clone();
        let app = ObjectRef::new(":1.40", "/org/a11y/atspi/accessible/root");

        let embedded = on_embed(&mut registry, &transport, app.clone());

        assert_eq!(embedded.index, 0);
        assert_eq!(fake.ids.lock().get(&app), Some(&embedded.id));
    }

    #[tokio::test]
    async fn test_name_vanished_removes_applications() {
        let mut registry = Registry::headless();
        let transport: Arc<dyn ListenerTransport> = RecordingTransport::new();
        on_embed(&mut registry, &transport, ObjectRef::new(":1.40", "/root"));
        on_embed(&mut registry, &transport, ObjectRef::new(":1.41", "/root"));

        on_name_vanished(&mut registry, ":1.40");

        assert_eq!(registry.children(), vec![ObjectRef::new(":1.41", "/root")]);
    }

    #[test]
    fn test_unembed_unknown_is_noop() {
        let mut registry = Registry::headless();
        on_unembed(&mut registry, &ObjectRef::new(":1.9", "/root"));
        assert!(registry.apps().is_empty());
    }
}
