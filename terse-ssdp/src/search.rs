//! Actively searching for devices
//!
//! A search is one multicast request followed by a listening window.
//! The window is `timeout` long, but starts again every time an answer
//! to this search arrives, so a search lasts until the network has been
//! quiet for `timeout`.

use crate::config::{
    Config, CLIENT_BUFFER_SIZE, MULTICAST_ADDRESS, SSDP_PORT,
    TRANSMIT_BUFFER_SIZE,
};
use crate::description::Description;
use crate::message::{build_search, Message};
use crate::target::SearchTarget;
use crate::udp::{self, TargetedReceive, TargetedSend};
use log::debug;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

#[cfg(test)]
use mock_instant::Instant;

#[cfg(not(test))]
use std::time::Instant;

/// The errors which can be returned from [`search`]
#[non_exhaustive]
#[derive(Debug)]
pub enum Error {
    /// The search target is not `upnp:rootdevice`, `uuid:...` or `urn:...`
    InvalidTarget,
    /// Couldn't create the socket to search from
    Bind(udp::Error),
    /// Couldn't transmit the search request
    Send(udp::Error),
    /// Receiving answers failed
    Receive(udp::Error),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidTarget => f.write_str("invalid search target"),
            Self::Bind(e) => write!(f, "can't bind search socket: {e}"),
            Self::Send(e) => write!(f, "can't send search: {e}"),
            Self::Receive(e) => write!(f, "can't receive answers: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidTarget => None,
            Self::Bind(e) | Self::Send(e) | Self::Receive(e) => Some(e),
        }
    }
}

/// The fields of one accepted answer, parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Discovery<'a> {
    /// The ST header, which echoes the search
    pub search_target: &'a str,
    /// `uuid:<id>::<type>`
    pub unique_service_name: &'a str,
    /// The URL of the device or service
    pub location: &'a str,
    /// Name and place in the hierarchy
    pub description: Description<'a>,
}

impl<'a> Discovery<'a> {
    /// Collect the fields of a search response
    ///
    /// `None` unless ST, USN, LOCATION and a description with a name
    /// are all present.
    #[must_use]
    pub fn from_message(message: &Message<'a>) -> Option<Self> {
        Some(Self {
            search_target: message.header("ST")?,
            unique_service_name: message.header("USN")?,
            location: message.header("LOCATION")?,
            description: Description::parse(message.description()?)?,
        })
    }

    /// The uuid of the answering device (or of a service's device)
    #[must_use]
    pub fn uuid(&self) -> &'a str {
        let usn = self.unique_service_name;
        let id = usn.strip_prefix("uuid:").unwrap_or(usn);
        id.split_once("::").map_or(id, |(id, _)| id)
    }

    /// Whether the answer came from a service rather than a device
    #[must_use]
    pub fn is_service(&self) -> bool {
        crate::description::usn_is_service(self.unique_service_name)
    }
}

#[cfg(not(test))]
fn pause(duration: Duration) {
    std::thread::sleep(duration);
}

#[cfg(test)]
fn pause(duration: Duration) {
    mock_instant::MockClock::advance(duration);
}

/// Search the local network, calling `handler` for each answer
///
/// `search_target` must be `upnp:rootdevice`, `uuid:<id>` or a type
/// URN. The request goes out from local address `interface` (which may
/// be `0.0.0.0`); with `respond_all`, root devices answer for their
/// whole hierarchy. Returns once nothing matching has arrived for
/// `timeout`.
///
/// `handler` only sees answers that echo `search_target` and carry a
/// self-consistent description; [`Discovery::from_message`] extracts
/// their fields.
///
/// # Errors
///
/// [`Error::InvalidTarget`] before anything is sent, or the transport
/// error that ended the search.
///
/// ```no_run
/// use terse_ssdp::search::{search, Discovery};
/// use terse_ssdp::Config;
///
/// search(
///     "upnp:rootdevice",
///     |m| {
///         if let Some(d) = Discovery::from_message(m) {
///             println!("{} at {}", d.description.name, d.location);
///         }
///     },
///     std::net::Ipv4Addr::UNSPECIFIED,
///     terse_ssdp::config::DEFAULT_SEARCH_TIMEOUT,
///     true,
///     &Config::default(),
/// )?;
/// # Ok::<(), terse_ssdp::search::Error>(())
/// ```
pub fn search<H>(
    search_target: &str,
    handler: H,
    interface: Ipv4Addr,
    timeout: Duration,
    respond_all: bool,
    config: &Config,
) -> Result<(), Error>
where
    H: FnMut(&Message<'_>),
{
    if SearchTarget::parse(search_target).is_none() {
        return Err(Error::InvalidTarget);
    }
    let socket = udp::std::setup_socket(SocketAddrV4::new(interface, 0))
        .map_err(Error::Bind)?;
    search_on(
        &socket,
        search_target,
        handler,
        interface,
        timeout,
        respond_all,
        config,
    )
}

/// Search using a caller-provided socket
///
/// As [`search`], but over any transport: `socket` must not block when
/// nothing is waiting.
///
/// # Errors
///
/// As [`search`], except that there is no binding to fail.
pub fn search_on<SCK, H>(
    socket: &SCK,
    search_target: &str,
    handler: H,
    interface: Ipv4Addr,
    timeout: Duration,
    respond_all: bool,
    config: &Config,
) -> Result<(), Error>
where
    SCK: TargetedSend + TargetedReceive,
    H: FnMut(&Message<'_>),
{
    if SearchTarget::parse(search_target).is_none() {
        return Err(Error::InvalidTarget);
    }
    socket
        .send_with(
            TRANSMIT_BUFFER_SIZE,
            &SocketAddr::V4(SocketAddrV4::new(MULTICAST_ADDRESS, SSDP_PORT)),
            &IpAddr::V4(interface),
            |b| build_search(b, search_target, respond_all),
        )
        .map_err(Error::Send)?;
    pause(config.settle_delay);
    collect_responses(socket, search_target, handler, timeout, config)
}

fn collect_responses<SCK, H>(
    socket: &SCK,
    search_target: &str,
    mut handler: H,
    timeout: Duration,
    config: &Config,
) -> Result<(), Error>
where
    SCK: TargetedReceive,
    H: FnMut(&Message<'_>),
{
    let mut buf = [0u8; CLIENT_BUFFER_SIZE];
    let mut start = Instant::now();
    while start.elapsed() < timeout {
        let Some((n, _, wasfrom)) =
            socket.receive_to(&mut buf).map_err(Error::Receive)?
        else {
            pause(config.poll_interval);
            continue;
        };
        let message = Message::new(&buf[..n]);
        if !message.is_search_response() {
            continue;
        }
        if message.header("ST") != Some(search_target) {
            if config.logging(log::Level::Debug) {
                debug!("answer from {wasfrom} is for another search");
            }
            continue;
        }
        start = Instant::now();

        let usn = message.header("USN").unwrap_or("");
        match message.description().and_then(Description::parse) {
            Some(d) if d.is_consistent(usn) => handler(&message),
            Some(_) => {
                if config.logging(log::Level::Debug) {
                    debug!("contradictory description from {wasfrom}");
                }
            }
            None => {
                if config.logging(log::Level::Debug) {
                    debug!("no description from {wasfrom}");
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mock_instant::MockClock;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    const ROOT_ANSWER: &str = "HTTP/1.1 200 OK\r
CACHE-CONTROL: max-age = 1800\r
LOCATION: http://192.168.1.20:80\r
ST: upnp:rootdevice\r
USN: uuid:1234::urn:example-com:device:Clock:1\r
DESC.LEELANAUSOFTWARE.COM: :name:Kitchen Clock:devices:2:services:1:\r
\r\n\r\n";

    const PEER: SocketAddr = SocketAddr::V4(SocketAddrV4::new(
        Ipv4Addr::new(192, 168, 1, 20),
        1900,
    ));

    /// Datagrams become readable at fixed mock times
    #[derive(Default)]
    struct FakeSocket {
        sends: RefCell<Vec<(SocketAddr, IpAddr, String)>>,
        arrivals: RefCell<VecDeque<(Duration, String)>>,
        send_error: bool,
        receive_error: bool,
    }

    impl FakeSocket {
        fn arriving(answers: &[(u64, &str)]) -> Self {
            let s = Self::default();
            for (ms, text) in answers {
                s.arrivals
                    .borrow_mut()
                    .push_back((Duration::from_millis(*ms), text.to_string()));
            }
            s
        }
    }

    fn injected() -> udp::Error {
        udp::Error::Syscall(
            udp::Syscall::Recvmsg,
            std::io::Error::new(std::io::ErrorKind::Other, "injected"),
        )
    }

    impl TargetedSend for FakeSocket {
        fn send_with<F>(
            &self,
            size: usize,
            to: &SocketAddr,
            from: &IpAddr,
            f: F,
        ) -> Result<(), udp::Error>
        where
            F: FnOnce(&mut [u8]) -> usize,
        {
            if self.send_error {
                return Err(injected());
            }
            let mut buffer = vec![0u8; size];
            let n = f(&mut buffer);
            self.sends.borrow_mut().push((
                *to,
                *from,
                String::from_utf8(buffer[..n].to_vec()).unwrap(),
            ));
            Ok(())
        }
    }

    impl TargetedReceive for FakeSocket {
        fn receive_to(
            &self,
            buffer: &mut [u8],
        ) -> Result<Option<(usize, IpAddr, SocketAddr)>, udp::Error> {
            if self.receive_error {
                return Err(injected());
            }
            let mut arrivals = self.arrivals.borrow_mut();
            match arrivals.front() {
                Some((at, _)) if *at <= MockClock::time() => {
                    let (_, text) = arrivals.pop_front().unwrap();
                    let n = text.len().min(buffer.len());
                    buffer[..n].copy_from_slice(&text.as_bytes()[..n]);
                    Ok(Some((n, IpAddr::V4(Ipv4Addr::LOCALHOST), PEER)))
                }
                _ => Ok(None),
            }
        }
    }

    fn config() -> Config {
        Config::default().with_poll_interval(Duration::from_millis(10))
    }

    fn run(
        socket: &FakeSocket,
        st: &str,
        timeout_ms: u64,
    ) -> (Result<(), Error>, Vec<String>) {
        MockClock::set_time(Duration::ZERO);
        let mut seen = Vec::new();
        let r = search_on(
            socket,
            st,
            |m| seen.push(m.display_name().unwrap().to_string()),
            Ipv4Addr::new(192, 168, 1, 5),
            Duration::from_millis(timeout_ms),
            true,
            &config(),
        );
        (r, seen)
    }

    #[test]
    fn sends_search_to_multicast_group() {
        let s = FakeSocket::default();
        let (r, _) = run(&s, "upnp:rootdevice", 100);
        assert!(r.is_ok());
        let sends = s.sends.borrow();
        assert_eq!(sends.len(), 1);
        assert_eq!(sends[0].0, "239.255.255.250:1900".parse().unwrap());
        assert_eq!(sends[0].1, IpAddr::V4(Ipv4Addr::new(192, 168, 1, 5)));
        let m = Message::new(sends[0].2.as_bytes());
        assert!(m.is_search_request());
        assert_eq!(m.header("ST"), Some("upnp:rootdevice"));
        assert_eq!(m.header("ST.LEELANAUSOFTWARE.COM"), Some("ssdp:all"));
    }

    #[test]
    fn silence_times_out() {
        let s = FakeSocket::default();
        let (r, seen) = run(&s, "upnp:rootdevice", 2000);
        assert!(r.is_ok());
        assert!(seen.is_empty());
        let elapsed = MockClock::time();
        assert!(elapsed >= Duration::from_millis(2500));
        assert!(elapsed < Duration::from_millis(2520));
    }

    #[test]
    fn late_answer_extends_window() {
        // Settles for 500ms, then answer arrives 10ms before the window ends
        let s = FakeSocket::arriving(&[(2490, ROOT_ANSWER)]);
        let (r, seen) = run(&s, "upnp:rootdevice", 2000);
        assert!(r.is_ok());
        assert_eq!(seen, ["Kitchen Clock"]);
        let elapsed = MockClock::time();
        assert!(elapsed >= Duration::from_millis(4490));
        assert!(elapsed < Duration::from_millis(4510));
    }

    #[test]
    fn answer_after_window_missed() {
        let s = FakeSocket::arriving(&[(2600, ROOT_ANSWER)]);
        let (_, seen) = run(&s, "upnp:rootdevice", 2000);
        assert!(seen.is_empty());
    }

    #[test]
    fn several_answers() {
        let s = FakeSocket::arriving(&[
            (500, ROOT_ANSWER),
            (500, ROOT_ANSWER),
            (1000, ROOT_ANSWER),
        ]);
        let (_, seen) = run(&s, "upnp:rootdevice", 2000);
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn other_search_target_ignored() {
        let other = ROOT_ANSWER.replace(
            "ST: upnp:rootdevice",
            "ST: urn:example-com:device:Clock:1",
        );
        let s = FakeSocket::arriving(&[(1000, &other)]);
        let (_, seen) = run(&s, "upnp:rootdevice", 2000);
        assert!(seen.is_empty());
        // ... and didn't extend the window
        assert!(MockClock::time() < Duration::from_millis(2520));
    }

    #[test]
    fn requests_ignored() {
        let s = FakeSocket::arriving(&[(
            600,
            "M-SEARCH * HTTP/1.1\r\nST: upnp:rootdevice\r\n\r\n",
        )]);
        let (_, seen) = run(&s, "upnp:rootdevice", 2000);
        assert!(seen.is_empty());
    }

    #[test]
    fn answer_without_description_ignored_but_extends() {
        let bare = ROOT_ANSWER.replace(
            "DESC.LEELANAUSOFTWARE.COM: :name:Kitchen Clock:devices:2:services:1:\r\n",
            "",
        );
        let s = FakeSocket::arriving(&[(2000, &bare)]);
        let (_, seen) = run(&s, "upnp:rootdevice", 2000);
        assert!(seen.is_empty());
        assert!(MockClock::time() >= Duration::from_millis(4000));
    }

    #[test]
    fn contradictory_description_ignored() {
        let bad = ROOT_ANSWER.replace(
            ":services:1:",
            ":services:1:puuid:5678:",
        );
        let s = FakeSocket::arriving(&[(600, &bad)]);
        let (_, seen) = run(&s, "upnp:rootdevice", 2000);
        assert!(seen.is_empty());
    }

    #[test]
    fn invalid_target_sends_nothing() {
        let s = FakeSocket::default();
        let (r, _) = run(&s, "ssdp:all", 2000);
        assert!(matches!(r, Err(Error::InvalidTarget)));
        assert!(s.sends.borrow().is_empty());
        assert_eq!(MockClock::time(), Duration::ZERO);
    }

    #[test]
    fn send_error_reported() {
        let s = FakeSocket {
            send_error: true,
            ..Default::default()
        };
        let (r, _) = run(&s, "upnp:rootdevice", 2000);
        assert!(matches!(r, Err(Error::Send(_))));
        assert_eq!(MockClock::time(), Duration::ZERO);
    }

    #[test]
    fn receive_error_reported() {
        let s = FakeSocket {
            receive_error: true,
            ..Default::default()
        };
        let (r, _) = run(&s, "upnp:rootdevice", 2000);
        assert!(matches!(r, Err(Error::Receive(_))));
    }

    #[test]
    fn invalid_target_rejected_before_bind() {
        let r = search(
            "fnord",
            |_| {},
            Ipv4Addr::UNSPECIFIED,
            Duration::from_millis(1),
            false,
            &Config::default(),
        );
        assert!(matches!(r, Err(Error::InvalidTarget)));
    }

    #[test]
    fn discovery_fields() {
        let m = Message::new(ROOT_ANSWER.as_bytes());
        let d = Discovery::from_message(&m).unwrap();
        assert_eq!(d.search_target, "upnp:rootdevice");
        assert_eq!(d.location, "http://192.168.1.20:80");
        assert_eq!(d.uuid(), "1234");
        assert!(!d.is_service());
        assert_eq!(d.description.name, "Kitchen Clock");
        assert_eq!(d.description.devices, Some(2));
        assert!(d.description.is_root());
    }

    #[test]
    fn discovery_needs_location() {
        let text =
            ROOT_ANSWER.replace("LOCATION: http://192.168.1.20:80\r\n", "");
        let m = Message::new(text.as_bytes());
        assert!(Discovery::from_message(&m).is_none());
    }

    #[test]
    fn display_errors() {
        use std::error::Error as _;

        assert_eq!(
            format!("{}", Error::InvalidTarget),
            "invalid search target"
        );
        assert!(Error::InvalidTarget.source().is_none());
        let e = Error::Receive(injected());
        assert_eq!(
            format!("{e}"),
            "can't receive answers: recvmsg failed"
        );
        assert!(e.source().is_some());
    }
}
