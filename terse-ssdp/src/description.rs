//! The description header, `:name:<display>:devices:<n>:services:<n>:`
//!
//! Fields are located by searching for their `:key:` token, so their
//! order is not significant. Roots carry `devices` and `services`,
//! embedded devices carry `services` and `puuid`, services carry only
//! `puuid`.

/// The text between `:<key>:` and the following colon
fn field<'a>(value: &'a str, key: &str) -> Option<&'a str> {
    let mut search = value;
    loop {
        let at = search.find(':')?;
        let rest = &search[at + 1..];
        if let Some(after) = rest
            .strip_prefix(key)
            .and_then(|r| r.strip_prefix(':'))
        {
            let end = after.find(':')?;
            return Some(&after[..end]);
        }
        search = rest;
    }
}

/// Extract the display name from a description header value
///
/// `None` unless there is a `:name:` field terminated by a colon.
#[must_use]
pub fn display_name(value: &str) -> Option<&str> {
    field(value, "name")
}

/// Whether a unique service name denotes a service, not a device
///
/// `uuid:<id>::urn:<domain>:service:<type>:<ver>`
#[must_use]
pub fn usn_is_service(unique_service_name: &str) -> bool {
    unique_service_name
        .split_once("::")
        .is_some_and(|(_, urn)| urn.contains(":service:"))
}

/// The parsed fields of a description header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Description<'a> {
    /// Display name for a user interface
    pub name: &'a str,

    /// Number of embedded devices (roots only)
    pub devices: Option<usize>,

    /// Number of services (devices only)
    pub services: Option<usize>,

    /// Parent uuid (embedded devices and services)
    pub puuid: Option<&'a str>,
}

impl<'a> Description<'a> {
    /// Parse a description header value
    ///
    /// `None` if there is no well-formed `:name:` field. Count fields
    /// that are present but not numeric are treated as absent.
    #[must_use]
    pub fn parse(value: &'a str) -> Option<Self> {
        Some(Self {
            name: display_name(value)?,
            devices: field(value, "devices").and_then(|n| n.parse().ok()),
            services: field(value, "services")
                .and_then(|n| n.parse().ok()),
            puuid: field(value, "puuid"),
        })
    }

    /// Whether this came from a root device (no parent)
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.puuid.is_none()
    }

    /// Whether this description may accompany `unique_service_name`
    ///
    /// A description is contradictory if it names a parent and also
    /// counts embedded devices, or if the USN is a service's but the
    /// description counts devices or services. Contradictory responses
    /// are ignored.
    #[must_use]
    pub fn is_consistent(&self, unique_service_name: &str) -> bool {
        if self.puuid.is_some() && self.devices.is_some() {
            return false;
        }
        if usn_is_service(unique_service_name)
            && (self.devices.is_some() || self.services.is_some())
        {
            return false;
        }
        true
    }
}
