use crate::message::is_blank;

/// The search target of a root-device search
pub const ROOT_DEVICE: &str = "upnp:rootdevice";

/// Value of the search extension header asking for whole subtrees
pub const SSDP_ALL: &str = "ssdp:all";

const UUID_PREFIX: &str = "uuid:";
const URN_PREFIX: &str = "urn:";

/// What a search is looking for: the ST header, classified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SearchTarget<'a> {
    /// `upnp:rootdevice`
    RootDevice,

    /// `uuid:<id>`, holding the id with leading blanks removed
    Uuid(&'a str),

    /// `urn:<domain>:device:<type>:<ver>` or
    /// `urn:<domain>:service:<type>:<ver>`, held whole
    Urn(&'a str),
}

impl<'a> SearchTarget<'a> {
    /// Classify an ST value
    ///
    /// `None` for anything that is not one of the three recognised
    /// forms.
    #[must_use]
    pub fn parse(st: &'a str) -> Option<Self> {
        if st == ROOT_DEVICE {
            Some(Self::RootDevice)
        } else if let Some(id) = st.strip_prefix(UUID_PREFIX) {
            Some(Self::Uuid(id.trim_start_matches(|c: char| {
                c.is_ascii() && is_blank(c as u8)
            })))
        } else if st.starts_with(URN_PREFIX) {
            Some(Self::Urn(st))
        } else {
            None
        }
    }
}
