use crate::config::{
    Config, SearchTargetString, SEARCH_EXTENSION_HEADER, ST_HEADER_SIZE,
};
use crate::message::Message;
use crate::target::{SearchTarget, SSDP_ALL};
use crate::tree::DeviceTree;
use log::{debug, trace};

/// What to answer an accepted search with
///
/// Carries its own copy of the search target, so the receive buffer can
/// be reused before the responses are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch<N> {
    /// `upnp:rootdevice`: answer for the root, and its subtree if `all`
    Root {
        /// ST to echo in responses
        search_target: SearchTargetString,
        /// Whether to fan out over the whole subtree
        all: bool,
    },

    /// `uuid:<id>`: answer for that device, and its subtree if `all`
    Device {
        /// ST to echo in responses
        search_target: SearchTargetString,
        /// The device whose uuid was asked for
        node: N,
        /// Whether to fan out over the whole subtree
        all: bool,
    },

    /// `urn:...`: answer for every node of exactly this type
    TypeMatch {
        /// The type asked for, which is also the ST to echo
        urn: SearchTargetString,
    },
}

impl<N> Dispatch<N> {
    /// The ST value responses must echo
    #[must_use]
    pub fn search_target(&self) -> &str {
        match self {
            Self::Root { search_target, .. }
            | Self::Device { search_target, .. } => search_target,
            Self::TypeMatch { urn } => urn,
        }
    }
}

/// Why a datagram gets no answer
///
/// None of these are failures: the datagram is simply dropped and the
/// responder carries on.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Rejected {
    /// Not an `M-SEARCH` request
    NotSearchRequest,
    /// No search extension header, so a plain-SSDP search
    Unaddressed,
    /// No ST header
    MissingSearchTarget,
    /// `uuid:` search for a device we don't have
    UnknownDevice,
    /// ST is not one of the three recognised forms
    InvalidSearchTarget,
}

impl core::fmt::Display for Rejected {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::NotSearchRequest => "not a search request",
            Self::Unaddressed => "no search extension header",
            Self::MissingSearchTarget => "no ST header",
            Self::UnknownDevice => "no such device",
            Self::InvalidSearchTarget => "unrecognised search target",
        })
    }
}

/// Decide whether, and how, to answer a received message
///
/// # Errors
///
/// Returns a [`Rejected`] reason if the message should not be answered.
pub fn classify<T: DeviceTree>(
    message: &Message<'_>,
    tree: &T,
    config: &Config,
) -> Result<Dispatch<T::Node>, Rejected> {
    if !message.is_search_request() {
        return Err(Rejected::NotSearchRequest);
    }

    let extension = message
        .header_bytes(SEARCH_EXTENSION_HEADER)
        .ok_or(Rejected::Unaddressed)?;
    let all = extension.starts_with(SSDP_ALL.as_bytes());

    if message.header_bytes("ST").is_none() {
        if config.logging(log::Level::Debug) {
            debug!("search without ST header");
        }
        return Err(Rejected::MissingSearchTarget);
    }
    let Some(search_target) = message
        .header_string::<{ ST_HEADER_SIZE - 1 }>("ST")
    else {
        if config.logging(log::Level::Debug) {
            debug!("search target is not text");
        }
        return Err(Rejected::InvalidSearchTarget);
    };

    match SearchTarget::parse(&search_target) {
        Some(SearchTarget::RootDevice) => Ok(Dispatch::Root {
            search_target: search_target.clone(),
            all,
        }),
        Some(SearchTarget::Uuid(id)) => match tree.lookup_by_uuid(id) {
            Some(node) => Ok(Dispatch::Device {
                search_target: search_target.clone(),
                node,
                all,
            }),
            None => {
                if config.logging(log::Level::Debug) {
                    debug!("search for unknown device {id}");
                }
                Err(Rejected::UnknownDevice)
            }
        },
        Some(SearchTarget::Urn(_)) => {
            if config.logging(log::Level::Trace) {
                trace!("type search {search_target}");
            }
            Ok(Dispatch::TypeMatch {
                urn: search_target.clone(),
            })
        }
        None => {
            if config.logging(log::Level::Debug) {
                debug!("unrecognised search target {search_target}");
            }
            Err(Rejected::InvalidSearchTarget)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::{sample_tree, ALARM_UUID, CLOCK_SERVICE};
    use crate::model::Node;

    fn request(st: Option<&str>, extension: Option<&str>) -> Vec<u8> {
        let mut s = String::from("M-SEARCH * HTTP/1.1\r\n");
        s.push_str("HOST: 239.255.255.250:1900\r\n");
        s.push_str("MAN: ssdp:discover\r\n");
        if let Some(st) = st {
            s.push_str(&format!("ST: {st}\r\n"));
        }
        if let Some(ext) = extension {
            s.push_str(&format!("ST.LEELANAUSOFTWARE.COM: {ext}\r\n"));
        }
        s.push_str("\r\n");
        s.into_bytes()
    }

    fn run(raw: &[u8]) -> Result<Dispatch<Node>, Rejected> {
        classify(&Message::new(raw), &sample_tree(), &Config::default())
    }

    #[test]
    fn root_search() {
        let d = run(&request(Some("upnp:rootdevice"), Some(""))).unwrap();
        assert!(matches!(d, Dispatch::Root { all: false, .. }));
        assert_eq!(d.search_target(), "upnp:rootdevice");
    }

    #[test]
    fn root_search_all() {
        let d =
            run(&request(Some("upnp:rootdevice"), Some("ssdp:all"))).unwrap();
        assert!(matches!(d, Dispatch::Root { all: true, .. }));
    }

    #[test]
    fn uuid_search_resolves_device() {
        let st = format!("uuid:{ALARM_UUID}");
        let d = run(&request(Some(&st), Some("ssdp:all"))).unwrap();
        assert_eq!(
            d,
            Dispatch::Device {
                search_target: st.as_str().try_into().unwrap(),
                node: Node::Device(0),
                all: true,
            }
        );
    }

    #[test]
    fn uuid_search_blanks_after_prefix() {
        let st = format!("uuid:  {ALARM_UUID}");
        let d = run(&request(Some(&st), Some(""))).unwrap();
        assert!(matches!(
            d,
            Dispatch::Device {
                node: Node::Device(0),
                all: false,
                ..
            }
        ));
    }

    #[test]
    fn unknown_uuid_rejected() {
        assert_eq!(
            run(&request(Some("uuid:nobody"), Some("ssdp:all"))),
            Err(Rejected::UnknownDevice)
        );
    }

    #[test]
    fn type_search_always_fans_out() {
        let d = run(&request(Some(CLOCK_SERVICE), Some(""))).unwrap();
        assert_eq!(
            d,
            Dispatch::TypeMatch {
                urn: CLOCK_SERVICE.try_into().unwrap()
            }
        );
    }

    #[test]
    fn missing_extension_rejected() {
        for st in [
            Some("upnp:rootdevice"),
            Some(CLOCK_SERVICE),
            Some("uuid:nobody"),
            Some("garbage"),
            None,
        ] {
            assert_eq!(run(&request(st, None)), Err(Rejected::Unaddressed));
        }
    }

    #[test]
    fn garbled_extension_is_present_but_not_all() {
        let mut raw = request(Some("upnp:rootdevice"), Some("\u{1}"));
        let at = raw.iter().position(|&b| b == 1).unwrap();
        raw[at] = 0xFF;
        let d = run(&raw).unwrap();
        assert!(matches!(d, Dispatch::Root { all: false, .. }));
    }

    #[test]
    fn garbled_st_rejected_as_invalid() {
        let mut raw = request(Some("upnp:rootdevic\u{1}"), Some("ssdp:all"));
        let at = raw.iter().position(|&b| b == 1).unwrap();
        raw[at] = 0xFE;
        assert_eq!(run(&raw), Err(Rejected::InvalidSearchTarget));
    }

    #[test]
    fn missing_st_rejected() {
        assert_eq!(
            run(&request(None, Some("ssdp:all"))),
            Err(Rejected::MissingSearchTarget)
        );
    }

    #[test]
    fn invalid_st_rejected() {
        assert_eq!(
            run(&request(Some("ssdp:all"), Some("ssdp:all"))),
            Err(Rejected::InvalidSearchTarget)
        );
    }

    #[test]
    fn response_rejected() {
        assert_eq!(
            run(b"HTTP/1.1 200 OK\r\nST: upnp:rootdevice\r\n\r\n"),
            Err(Rejected::NotSearchRequest)
        );
        assert_eq!(run(b""), Err(Rejected::NotSearchRequest));
    }

    #[test]
    fn long_extension_still_means_all() {
        let d = run(&request(
            Some("upnp:rootdevice"),
            Some("ssdp:all-the-things-and-more"),
        ))
        .unwrap();
        assert!(matches!(d, Dispatch::Root { all: true, .. }));
    }

    #[test]
    fn display_rejection() {
        assert_eq!(
            format!("{}", Rejected::Unaddressed),
            "no search extension header"
        );
    }
}
