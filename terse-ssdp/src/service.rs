use crate::config::{
    Config, MULTICAST_ADDRESS, RECEIVE_BUFFER_SIZE, SSDP_PORT,
};
use crate::engine::Engine;
use crate::netif::{self, InterfaceAddress};
use crate::tree::DeviceTree;
use crate::udp::{self, Multicast, TargetedReceive};
use log::{debug, warn};
use std::error::Error;
use std::net::{IpAddr, Ipv4Addr, SocketAddrV4};

fn new_socket(port: u16) -> Result<mio::net::UdpSocket, udp::Error> {
    let socket = udp::std::setup_socket(SocketAddrV4::new(
        Ipv4Addr::UNSPECIFIED,
        port,
    ))?;
    Ok(mio::net::UdpSocket::from_std(socket))
}

/// A responder, for use with the mio crate
///
/// Listens for searches on the SSDP multicast group, and on a unicast
/// socket of its own, and answers for the devices in its tree.
///
/// The owner runs the `mio::Poll` loop, and calls
/// [`Service::multicast_ready`] or [`Service::search_ready`] when the
/// corresponding token comes up.
///
pub struct Service<T: DeviceTree> {
    engine: Engine<T>,
    multicast_socket: mio::net::UdpSocket,
    search_socket: mio::net::UdpSocket,
}

impl<T: DeviceTree> Service<T> {
    /// Create a new responder on the standard SSDP port
    ///
    /// Joins the multicast group on every local IPv4 interface which
    /// allows it.
    ///
    /// # Errors
    ///
    /// Passes on errors from creating sockets, listing interfaces, or
    /// registering with mio.
    pub fn new(
        tree: T,
        config: Config,
        registry: &mio::Registry,
        tokens: (mio::Token, mio::Token),
    ) -> Result<Self, Box<dyn Error>> {
        Self::with_multicast_port(tree, config, registry, tokens, SSDP_PORT)
    }

    /// Create a new responder listening for multicast on `port`
    ///
    /// # Errors
    ///
    /// As [`Service::new`].
    pub fn with_multicast_port(
        tree: T,
        config: Config,
        registry: &mio::Registry,
        tokens: (mio::Token, mio::Token),
        port: u16,
    ) -> Result<Self, Box<dyn Error>> {
        let mut multicast_socket = new_socket(port)?;
        let mut search_socket = new_socket(0u16)?; // ephemeral port
        let mut engine = Engine::new(tree, config);

        for netif in netif::get_interfaces()? {
            join(&multicast_socket, &mut engine, netif);
        }

        registry.register(
            &mut multicast_socket,
            tokens.0,
            mio::Interest::READABLE,
        )?;
        registry.register(
            &mut search_socket,
            tokens.1,
            mio::Interest::READABLE,
        )?;

        Ok(Self {
            engine,
            multicast_socket,
            search_socket,
        })
    }

    /// The responder core, e.g. for listing its interfaces
    pub const fn engine(&self) -> &Engine<T> {
        &self.engine
    }

    /// The responder core, e.g. for changing the tree between events
    pub fn engine_mut(&mut self) -> &mut Engine<T> {
        &mut self.engine
    }

    /// The port on which multicast searches arrive
    ///
    /// # Errors
    ///
    /// Passes on errors from `getsockname(2)`.
    pub fn multicast_port(&self) -> std::io::Result<u16> {
        Ok(self.multicast_socket.local_addr()?.port())
    }

    /// The port of the unicast socket, from which answers are sent
    ///
    /// # Errors
    ///
    /// Passes on errors from `getsockname(2)`.
    pub fn unicast_port(&self) -> std::io::Result<u16> {
        Ok(self.search_socket.local_addr()?.port())
    }

    /// Handle the multicast socket becoming readable
    pub fn multicast_ready(&mut self, event: &mio::event::Event) {
        if event.is_readable() {
            self.drain(true);
        }
    }

    /// Handle the unicast socket becoming readable
    pub fn search_ready(&mut self, event: &mio::event::Event) {
        if event.is_readable() {
            self.drain(false);
        }
    }

    // mio is edge-triggered, so read until the socket is empty
    fn drain(&mut self, multicast: bool) {
        let mut buf = [0u8; RECEIVE_BUFFER_SIZE];
        loop {
            let socket = if multicast {
                &self.multicast_socket
            } else {
                &self.search_socket
            };
            match socket.receive_to(&mut buf) {
                Ok(Some((n, wasto, wasfrom))) => {
                    if let Err(e) = self.engine.on_data(
                        &buf[0..n],
                        &self.search_socket,
                        wasto,
                        wasfrom,
                    ) {
                        if self.engine.config().logging(log::Level::Debug) {
                            debug!("gave up on {wasfrom}: {e}");
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    if self.engine.config().logging(log::Level::Warn) {
                        warn!("receive failed: {e}");
                    }
                    break;
                }
            }
        }
    }
}

fn join<T: DeviceTree>(
    socket: &mio::net::UdpSocket,
    engine: &mut Engine<T>,
    netif: InterfaceAddress,
) {
    let config = engine.config();
    match socket
        .join_multicast_group(&IpAddr::V4(MULTICAST_ADDRESS), netif.address)
    {
        Ok(()) => {
            if config.logging(log::Level::Debug) {
                debug!("joined multicast on {}", netif.address);
            }
        }
        Err(e) => {
            if config.logging(log::Level::Warn) {
                warn!("can't join multicast on {}: {e}", netif.address);
            }
        }
    }
    engine.add_interface(netif);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{build_search, Message};
    use crate::model::tests::{sample_tree, ROOT_UUID};
    use serial_test::serial;
    use std::time::Duration;

    const MULTICAST: mio::Token = mio::Token(0);
    const SEARCH: mio::Token = mio::Token(1);

    #[test]
    #[serial]
    #[cfg_attr(miri, ignore)]
    fn answers_unicast_search() {
        let mut poll = mio::Poll::new().unwrap();
        let mut events = mio::Events::with_capacity(16);
        let mut service = Service::with_multicast_port(
            sample_tree(),
            Config::default(),
            poll.registry(),
            (MULTICAST, SEARCH),
            0,
        )
        .unwrap();
        assert!(!service.engine().interfaces().is_empty());
        let port = service.unicast_port().unwrap();
        assert_ne!(port, 0);
        assert_ne!(service.multicast_port().unwrap(), 0);

        let client = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        client
            .set_read_timeout(Some(Duration::from_millis(100)))
            .unwrap();
        let mut request = [0u8; 512];
        let n = build_search(&mut request, "upnp:rootdevice", false);
        client.send_to(&request[..n], ("127.0.0.1", port)).unwrap();

        let mut answer = None;
        let mut buf = [0u8; 1536];
        for _ in 0..50 {
            poll.poll(&mut events, Some(Duration::from_millis(10)))
                .unwrap();
            for event in &events {
                match event.token() {
                    MULTICAST => service.multicast_ready(event),
                    SEARCH => service.search_ready(event),
                    _ => (),
                }
            }
            if let Ok(n) = client.recv(&mut buf) {
                answer = Some(n);
                break;
            }
        }
        let n = answer.unwrap();
        let m = Message::new(&buf[..n]);
        assert!(m.is_search_response());
        assert_eq!(m.header("ST"), Some("upnp:rootdevice"));
        assert_eq!(m.header("LOCATION"), Some("http://127.0.0.1:80"));
        assert!(m.header("USN").unwrap().contains(ROOT_UUID));
        assert_eq!(m.display_name().unwrap().as_str(), "Kitchen Clock");
    }
}
