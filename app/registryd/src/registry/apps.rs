//! Application directory.
//!
//! Applications embed their accessibility root into the registry's desktop
//! frame and are listed in embedding order; the list position is the child
//! index clients see. Removal shifts later entries down by one.

use eyeball::{Observable, Subscriber};
use eyeball_im::ObservableVector;
use serde::{Deserialize, Serialize};

use super::Registry;
use super::event_type::EventType;
use super::notify::RegistryNotification;
use super::types::ObjectRef;

/// An embedded application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    /// Sequential id assigned at embedding.
    pub id: i32,
    pub reference: ObjectRef,
}

/// Result of [`Registry::embed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Embedded {
    pub id: i32,
    pub index: usize,
    /// The desktop accessible the application was embedded into.
    pub parent: ObjectRef,
}

pub struct ApplicationDirectory {
    apps: ObservableVector<Application>,
    child_count: Observable<usize>,
    next_id: i32,
}

impl ApplicationDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            apps: ObservableVector::new(),
            child_count: Observable::new(0),
            next_id: 1,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize { self.apps.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.apps.is_empty() }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Application> { self.apps.get(index) }

    pub fn iter(&self) -> impl Iterator<Item = &Application> { self.apps.iter() }

    /// Child count as exposed on the desktop accessible.
    #[must_use]
    pub fn child_count(&self) -> usize { *Observable::get(&self.child_count) }

    /// Stream of child count changes.
    #[must_use]
    pub fn subscribe_child_count(&self) -> Subscriber<usize> {
        Observable::subscribe(&self.child_count)
    }

    #[must_use]
    pub fn position(&self, reference: &ObjectRef) -> Option<usize> {
        self.apps.iter().position(|app| &app.reference == reference)
    }

    fn push(&mut self, reference: ObjectRef) -> (usize, i32) {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        self.apps.push_back(Application { id, reference });
        Observable::set(&mut self.child_count, self.apps.len());
        (self.apps.len() - 1, id)
    }

    fn remove(&mut self, index: usize) -> Application {
        let app = self.apps.remove(index);
        Observable::set(&mut self.child_count, self.apps.len());
        app
    }
}

impl Default for ApplicationDirectory {
    fn default() -> Self { Self::new() }
}

impl std::fmt::Debug for ApplicationDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.apps.iter()).finish()
    }
}

impl Registry {
    /// Appends `application` to the desktop and assigns its id.
    pub fn embed(&mut self, application: ObjectRef) -> Embedded {
        let (index, id) = self.apps.push(application.clone());
        tracing::debug!(%application, index, id, "registry: application embedded");

        self.notify(RegistryNotification::ChildAdded { index, child: application });
        Embedded { id, index, parent: self.root_reference() }
    }

    /// Removes the application with this exact name and path.
    ///
    /// Returns `false` when no such application is embedded.
    pub fn unembed(&mut self, application: &ObjectRef) -> bool {
        let Some(index) = self.apps.position(application) else {
            tracing::debug!(%application, "registry: unembed of unknown application");
            return false;
        };

        self.remove_application(index);
        true
    }

    /// Cleans up after `name` left the bus: every application it owned and
    /// every listener it registered.
    pub fn name_vanished(&mut self, name: &str) {
        let mut index = 0;
        while index < self.apps.len() {
            if self.apps.get(index).is_some_and(|app| app.reference.name == name) {
                self.remove_application(index);
            } else {
                index += 1;
            }
        }

        self.remove_device_listeners_of(name);

        let removed = self.listeners.remove_event_listeners(name, &EventType::any());
        if !removed.is_empty() {
            tracing::debug!(name, count = removed.len(), "registry: dropped event listeners");
            self.notify(RegistryNotification::EventListenerDeregistered {
                subscriber: name.to_string(),
                event: String::new(),
            });
            self.update_poll_demand();
        }
    }

    fn remove_application(&mut self, index: usize) {
        let app = self.apps.remove(index);
        tracing::debug!(application = %app.reference, index, "registry: application removed");

        self.remove_device_listeners_of(&app.reference.name);
        self.notify(RegistryNotification::ChildRemoved { index, child: app.reference });
    }

    /// The application at `index`, or the null reference when out of range.
    #[must_use]
    pub fn child_at_index(&self, index: i32) -> ObjectRef {
        usize::try_from(index)
            .ok()
            .and_then(|index| self.apps.get(index))
            .map_or_else(|| ObjectRef::null(self.bus_name.clone()), |app| app.reference.clone())
    }

    #[must_use]
    pub fn children(&self) -> Vec<ObjectRef> {
        self.apps.iter().map(|app| app.reference.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use smallvec::smallvec;

    use super::*;
    use crate::registry::types::{KeyDefinition, ListenerMode};

    fn record(registry: &Registry) -> Arc<Mutex<Vec<RegistryNotification>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        registry.observers().subscribe(move |n: &RegistryNotification| sink.lock().push(n.clone()));
        seen
    }

    fn app(name: &str, path: &str) -> ObjectRef { ObjectRef::new(name, path) }

    #[test]
    fn test_embed_assigns_sequential_ids_and_indices() {
        let mut registry = Registry::headless();

        let first = registry.embed(app("org.example.App1", "/app"));
        let second = registry.embed(app("org.example.App2", "/app"));

        assert_eq!((first.index, second.index), (0, 1));
        assert_eq!(second.id, first.id + 1);
        assert_eq!(registry.apps().child_count(), 2);
        assert_eq!(first.parent.path, crate::constants::ROOT_PATH);
    }

    #[test]
    fn test_name_loss_reports_original_index() {
        let mut registry = Registry::headless();
        let seen = record(&registry);

        registry.embed(app("org.example.App1", "/app"));
        registry.embed(app("org.example.App2", "/app"));
        registry.name_vanished("org.example.App1");

        assert_eq!(registry.apps().child_count(), 1);
        assert_eq!(registry.apps().len(), 1);
        assert_eq!(registry.child_at_index(0), app("org.example.App2", "/app"));
        assert_eq!(
            seen.lock().last(),
            Some(&RegistryNotification::ChildRemoved {
                index: 0,
                child: app("org.example.App1", "/app")
            })
        );
    }

    #[test]
    fn test_name_loss_removes_every_path_of_the_name() {
        let mut registry = Registry::headless();
        let seen = record(&registry);

        registry.embed(app(":1.7", "/a"));
        registry.embed(app(":1.8", "/x"));
        registry.embed(app(":1.7", "/b"));
        registry.name_vanished(":1.7");

        assert_eq!(registry.children(), vec![app(":1.8", "/x")]);
        let removed: Vec<_> = seen
            .lock()
            .iter()
            .filter_map(|n| match n {
                RegistryNotification::ChildRemoved { index, .. } => Some(*index),
                _ => None,
            })
            .collect();
        assert_eq!(removed, vec![0, 1]);
    }

    #[test]
    fn test_name_loss_removes_all_listeners_of_the_name() {
        let mut registry = Registry::headless();
        registry.embed(app(":1.7", "/app"));
        registry
            .register_event(":1.7", "object:state-changed", Vec::new())
            .unwrap();
        registry.register_event(":1.9", "window", Vec::new()).unwrap();
        registry.register_keystroke_listener(
            app(":1.7", "/key"),
            smallvec![KeyDefinition::keysym(0x61)],
            0,
            0,
            ListenerMode { global: true, ..ListenerMode::default() },
        );
        registry.register_device_listener(app(":1.7", "/mouse"), 0);

        registry.name_vanished(":1.7");

        assert!(!registry.listeners().has_listeners_of(":1.7"));
        assert!(registry.listeners().has_listeners_of(":1.9"));
        assert!(registry.grabs().masks().is_empty());
        assert!(registry.apps().is_empty());
    }

    #[test]
    fn test_unembed_requires_exact_reference() {
        let mut registry = Registry::headless();
        registry.embed(app(":1.7", "/app"));

        assert!(!registry.unembed(&app(":1.7", "/other")));
        assert!(registry.unembed(&app(":1.7", "/app")));
        assert_eq!(registry.apps().child_count(), 0);
    }

    #[test]
    fn test_child_count_tracks_length() {
        let mut registry = Registry::headless();
        for i in 0..4 {
            registry.embed(app(&format!(":1.{i}"), "/app"));
            assert_eq!(registry.apps().child_count(), registry.apps().len());
        }
        registry.unembed(&app(":1.2", "/app"));
        registry.name_vanished(":1.0");
        assert_eq!(registry.apps().child_count(), 2);
        assert_eq!(registry.apps().child_count(), registry.apps().len());
    }

    #[test]
    fn test_child_at_index_out_of_range_is_null() {
        let registry = Registry::headless();
        assert!(registry.child_at_index(0).is_null());
        assert!(registry.child_at_index(-1).is_null());
    }
}
