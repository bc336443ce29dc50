//! Three-part accessibility event types (`Category:Name:Detail`).
//!
//! Subscriptions arrive as dash-separated strings such as
//! `object:state-changed:focused`; events arrive as bus signals on
//! `org.a11y.atspi.Event.<Category>` with a `<Name>` member and a minor
//! string. Both are folded into the same canonical camel-cased form so a
//! stored filter can be compared against an incoming event component by
//! component.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// A parsed event type or event filter.
///
/// As a filter, absent components act as wildcards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventType {
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl EventType {
    /// Parses a subscription string into its canonical form.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidEventType`] for empty strings, strings
    /// containing whitespace or control characters, and strings whose
    /// category is empty while later components are not.
    pub fn parse(raw: &str) -> Result<Self, RegistryError> {
        if raw.is_empty() {
            return Err(RegistryError::InvalidEventType("empty event type".to_string()));
        }
        Self::parse_filter(raw)
    }

    /// Parses a deregistration filter. The empty string is allowed and
    /// matches every stored filter.
    ///
    /// # Errors
    ///
    /// Same as [`Self::parse`], except that an empty string is accepted.
    pub fn parse_filter(raw: &str) -> Result<Self, RegistryError> {
        if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(RegistryError::InvalidEventType(format!(
                "'{raw}' contains whitespace or control characters"
            )));
        }

        let normalized = normalize(raw);
        let mut parts = normalized.splitn(3, ':');
        let category = parts.next().unwrap_or_default().to_string();
        let name = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
        let detail = parts.next().filter(|s| !s.is_empty()).map(str::to_string);

        if category.is_empty() && (name.is_some() || detail.is_some()) {
            return Err(RegistryError::InvalidEventType(format!("'{raw}' has no category")));
        }

        Ok(Self { category, name, detail })
    }

    /// Filter selecting every event.
    #[must_use]
    pub const fn any() -> Self { Self { category: String::new(), name: None, detail: None } }

    /// Builds the event type of a bus signal.
    ///
    /// `interface` is the full signal interface (`org.a11y.atspi.Event.Object`),
    /// `member` the signal name (`StateChanged`), `minor` the detail string
    /// of the signal body (`focused`, `add/system`). A `/` in the minor is a
    /// detail separator.
    #[must_use]
    pub fn from_signal(interface: &str, member: &str, minor: &str) -> Self {
        let category = interface.rsplit('.').next().unwrap_or(interface).to_string();
        let name = (!member.is_empty() && !member.eq_ignore_ascii_case(&category))
            .then(|| member.to_string());
        let detail = (!minor.is_empty()).then(|| normalize(&minor.replace('/', ":")));
        Self { category, name, detail }
    }

    /// Whether the filter matches nothing narrower than "every event".
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.category.is_empty() && self.name.is_none() && self.detail.is_none()
    }

    /// Whether `self`, used as a removal filter, covers the stored filter `stored`.
    ///
    /// Every component present in `self` must equal the same component of
    /// `stored`; the first absent component ends the comparison.
    #[must_use]
    pub fn covers(&self, stored: &Self) -> bool {
        if self.category.is_empty() {
            return true;
        }
        if self.category != stored.category {
            return false;
        }
        let Some(name) = &self.name else { return true };
        if stored.name.as_ref() != Some(name) {
            return false;
        }
        let Some(detail) = &self.detail else { return true };
        stored.detail.as_ref() == Some(detail)
    }

    /// Whether `self`, used as a subscription filter, selects `event`.
    ///
    /// A filter detail without `:` matches the event detail up to its first
    /// `:`, so `Add` selects `Add:System`.
    #[must_use]
    pub fn matches(&self, event: &Self) -> bool {
        if !self.category.is_empty() && self.category != event.category {
            return false;
        }
        if let Some(name) = &self.name
            && event.name.as_ref() != Some(name)
        {
            return false;
        }
        match (&self.detail, &event.detail) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(filter), Some(detail)) => {
                if filter.contains(':') {
                    filter == detail
                } else {
                    detail.split(':').next() == Some(filter.as_str())
                }
            }
        }
    }

    /// Whether a subscription to this type requires pointer polling.
    #[must_use]
    pub fn needs_mouse_poll(&self) -> bool {
        self.category == "Mouse" && self.name.as_deref().is_none_or(|name| name == "Abs")
    }

    /// The three-part form reported by `GetRegisteredEvents` (`Object:StateChanged:`).
    #[must_use]
    pub fn to_registered_string(&self) -> String {
        format!(
            "{}:{}:{}",
            self.category,
            self.name.as_deref().unwrap_or_default(),
            self.name.as_ref().and(self.detail.as_deref()).unwrap_or_default()
        )
    }

    /// Dash-separated lowercase form (`object:state-changed:focused`).
    #[must_use]
    pub fn to_dashed(&self) -> String {
        let mut out = dashed(&self.category, false);
        if let Some(name) = &self.name {
            out.push(':');
            out.push_str(&dashed(name, false));
        }
        if let Some(detail) = &self.detail {
            if self.name.is_none() {
                out.push(':');
            }
            out.push(':');
            out.push_str(&dashed(detail, true));
        }
        out
    }

    /// Signal member name used when relaying the event (`StateChanged`).
    #[must_use]
    pub fn member(&self) -> &str { self.name.as_deref().unwrap_or(&self.category) }

    /// Minor string of the relayed signal (`focused`, `add/system`).
    #[must_use]
    pub fn minor(&self) -> String {
        self.detail
            .as_deref()
            .map(|detail| {
                detail
                    .split(':')
                    .map(|part| dashed(part, false))
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .unwrap_or_default()
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.category)?;
        if let Some(name) = &self.name {
            write!(f, ":{name}")?;
        }
        if let Some(detail) = &self.detail {
            if self.name.is_none() {
                f.write_str(":")?;
            }
            write!(f, ":{detail}")?;
        }
        Ok(())
    }
}

/// Canonical casing of a subscription string.
///
/// The first character and the character after each `:` or `-` are
/// upper-cased, and `-` separators are dropped:
/// `object:state-changed:focused` becomes `Object:StateChanged:Focused`.
#[must_use]
pub fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut upper_next = true;

    for ch in raw.chars() {
        if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else if ch == '-' {
            upper_next = true;
        } else if ch == ':' {
            out.push(ch);
            upper_next = true;
        } else {
            out.push(ch);
        }
    }

    out
}

/// Dash-separated lowercase form of a camel-cased name.
///
/// `StateChanged` becomes `state-changed`. With `detail` set, `/` is read
/// as a detail separator and becomes `:`.
#[must_use]
pub fn dashed(name: &str, detail: bool) -> String {
    let mut out = String::with_capacity(name.len() * 2);

    for ch in name.chars() {
        if ch.is_uppercase() {
            if !out.is_empty() && !out.ends_with(':') {
                out.push('-');
            }
            out.extend(ch.to_lowercase());
        } else if detail && ch == '/' {
            out.push(':');
        } else {
            out.push(ch);
        }
    }

    out
}
