//! Entity keys for monitored objects.
//!
//! A monitored object is either a host or a service on a host. Its key is the
//! only thing that binds it to a published file, so the canonical key string
//! must be unambiguous for every possible pair of names.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of monitored object.
///
/// Serializes as the `_type` tag of a snapshot (`"HOST"` / `"SERVICE"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityKind {
    /// A host check result.
    Host,
    /// A service check result.
    Service,
}

impl EntityKind {
    /// The `_type` tag written into snapshots.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Host => "HOST",
            Self::Service => "SERVICE",
        }
    }

    /// Suffix terminating the canonical key string.
    const fn key_suffix(self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Service => "service",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Identity of a monitored object: `(host)` or `(host, service)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityKey {
    /// A host, by name.
    Host {
        /// Host name as configured in the monitoring core.
        host_name: String,
    },
    /// A service, by host name and service description.
    Service {
        /// Owning host name.
        host_name: String,
        /// Service description, unique per host.
        service_description: String,
    },
}

impl EntityKey {
    /// Key for a host.
    #[must_use]
    pub fn host(host_name: impl Into<String>) -> Self {
        Self::Host {
            host_name: host_name.into(),
        }
    }

    /// Key for a service on a host.
    #[must_use]
    pub fn service(host_name: impl Into<String>, service_description: impl Into<String>) -> Self {
        Self::Service {
            host_name: host_name.into(),
            service_description: service_description.into(),
        }
    }

    /// The kind of object this key names.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Host { .. } => EntityKind::Host,
            Self::Service { .. } => EntityKind::Service,
        }
    }

    /// Host name part of the key.
    #[must_use]
    pub fn host_name(&self) -> &str {
        match self {
            Self::Host { host_name } | Self::Service { host_name, .. } => host_name,
        }
    }

    /// Service description, for service keys.
    #[must_use]
    pub fn service_description(&self) -> Option<&str> {
        match self {
            Self::Host { .. } => None,
            Self::Service {
                service_description,
                ..
            } => Some(service_description),
        }
    }

    /// Canonical key string fed to the identity hasher.
    ///
    /// `<host>:host` or `<host>:<service>:service`. Inside each name `\` is
    /// written as `\\` and `:` as `\:`, so a separator can never be forged by a
    /// name. Names free of both characters appear verbatim.
    #[must_use]
    pub fn canonical(&self) -> String {
        let mut out = String::with_capacity(self.host_name().len() + 32);
        push_escaped(&mut out, self.host_name());
        out.push(':');
        if let Some(service) = self.service_description() {
            push_escaped(&mut out, service);
            out.push(':');
        }
        out.push_str(self.kind().key_suffix());
        out
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host { host_name } => write!(f, "host '{host_name}'"),
            Self::Service {
                host_name,
                service_description,
            } => write!(f, "service '{service_description}' on '{host_name}'"),
        }
    }
}

fn push_escaped(out: &mut String, name: &str) {
    for c in name.chars() {
        if c == '\\' || c == ':' {
            out.push('\\');
        }
        out.push(c);
    }
}
