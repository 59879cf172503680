use crate::classify::{self, Dispatch, Rejected};
use crate::config::{Config, MAX_INTERFACES, TRANSMIT_BUFFER_SIZE};
use crate::message::Message;
use crate::netif::{select_interface, InterfaceAddress};
use crate::render::render;
use crate::tree::DeviceTree;
use crate::udp;
use crate::walk::walk;
use core::net::{IpAddr, Ipv4Addr, SocketAddr};
use log::{debug, trace, warn};

/// The core of a responder
///
/// This low-level facility is usually wrapped-up in
/// [`crate::Service`] for use in larger programs, but can also be used
/// directly when needed (e.g. on embedded systems).
///
/// This struct handles parsing searches and emitting responses; it does
/// not own or define the UDP sockets themselves, which are left to
/// its owner.  The owner should pass incoming UDP packets to
/// [`Engine::on_data`], and tell the engine about local interface
/// addresses with [`Engine::add_interface`] so that responses carry a
/// location the searcher can reach.
///
/// The device hierarchy is owned by the engine, and only ever read.
///
pub struct Engine<T: DeviceTree> {
    tree: T,
    interfaces: heapless::Vec<InterfaceAddress, MAX_INTERFACES>,
    config: Config,
}

impl<T: DeviceTree> Engine<T> {
    /// Create a new Engine answering for the devices in `tree`
    #[must_use]
    pub fn new(tree: T, config: Config) -> Self {
        Self {
            tree,
            interfaces: heapless::Vec::new(),
            config,
        }
    }

    /// The device hierarchy
    pub const fn tree(&self) -> &T {
        &self.tree
    }

    /// The device hierarchy, for modification between packets
    pub fn tree_mut(&mut self) -> &mut T {
        &mut self.tree
    }

    /// The configuration the engine was created with
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Note a local interface address, to answer searches from its subnet
    ///
    /// Returns `false` if the engine already knows [`MAX_INTERFACES`]
    /// addresses. Adding an address a second time replaces its netmask.
    pub fn add_interface(&mut self, interface: InterfaceAddress) -> bool {
        if let Some(existing) = self
            .interfaces
            .iter_mut()
            .find(|i| i.address == interface.address)
        {
            *existing = interface;
            return true;
        }
        if self.interfaces.push(interface).is_err() {
            if self.config.logging(log::Level::Warn) {
                warn!("too many interfaces, ignoring {}", interface.address);
            }
            return false;
        }
        true
    }

    /// Forget a local interface address
    pub fn remove_interface(&mut self, address: Ipv4Addr) {
        self.interfaces.retain(|i| i.address != address);
    }

    /// The local interface addresses currently known
    pub fn interfaces(&self) -> &[InterfaceAddress] {
        &self.interfaces
    }

    /// Decide whether, and how, to answer a received datagram
    ///
    /// # Errors
    ///
    /// Returns a [`Rejected`] reason if the datagram should not be
    /// answered.
    pub fn classify(
        &self,
        buf: &[u8],
    ) -> Result<Dispatch<T::Node>, Rejected> {
        classify::classify(&Message::new(buf), &self.tree, &self.config)
    }

    /// The local address to answer `wasfrom` from
    ///
    /// Preferably the known interface on the same subnet as the peer;
    /// failing that, the (unicast) address the search arrived on;
    /// failing that, `0.0.0.0`, leaving the choice to the network stack.
    fn responding_interface(
        &self,
        wasto: IpAddr,
        remote: Ipv4Addr,
    ) -> Ipv4Addr {
        match select_interface(remote, &self.interfaces) {
            Ipv4Addr::UNSPECIFIED => match wasto {
                IpAddr::V4(a) if !a.is_multicast() => a,
                _ => Ipv4Addr::UNSPECIFIED,
            },
            a => a,
        }
    }

    /// Send the responses `dispatch` calls for, one datagram per node
    ///
    /// A failed send is logged and the remaining nodes are still
    /// answered. Returns the number of responses sent.
    ///
    /// # Errors
    ///
    /// The first transport error, once every node has been tried.
    pub fn respond<SCK: udp::TargetedSend>(
        &self,
        dispatch: &Dispatch<T::Node>,
        socket: &SCK,
        wasto: IpAddr,
        wasfrom: SocketAddr,
    ) -> Result<usize, udp::Error> {
        let SocketAddr::V4(remote) = wasfrom else {
            return Err(udp::Error::Ipv6NotImplemented);
        };
        let interface = self.responding_interface(wasto, *remote.ip());
        let search_target = dispatch.search_target();
        let mut count = 0;
        let mut first_error = None;
        let result: Result<(), core::convert::Infallible> =
            walk(&self.tree, dispatch, |node| {
                if self.config.logging(log::Level::Trace) {
                    trace!(
                        "responding for {} {} to {wasfrom}",
                        self.tree.uuid(node),
                        self.tree.node_type(node)
                    );
                }
                match socket.send_with(
                    TRANSMIT_BUFFER_SIZE,
                    &wasfrom,
                    &IpAddr::V4(interface),
                    |b| render(&self.tree, node, search_target, interface, b),
                ) {
                    Ok(()) => count += 1,
                    Err(e) => {
                        if self.config.logging(log::Level::Warn) {
                            warn!(
                                "can't respond for {} to {wasfrom}: {e}",
                                self.tree.uuid(node)
                            );
                        }
                        first_error.get_or_insert(e);
                    }
                }
                Ok(())
            });
        if let Err(never) = result {
            match never {}
        }
        first_error.map_or(Ok(count), Err)
    }

    /// Notify the `Engine` that data is ready on one of its sockets
    ///
    /// Searches addressed to this protocol are answered immediately on
    /// `socket`; everything else is ignored. Returns the number of
    /// responses sent.
    ///
    /// # Errors
    ///
    /// Passes on transport errors from sending responses.
    pub fn on_data<SCK: udp::TargetedSend>(
        &self,
        buf: &[u8],
        socket: &SCK,
        wasto: IpAddr,
        wasfrom: SocketAddr,
    ) -> Result<usize, udp::Error> {
        match self.classify(buf) {
            Ok(dispatch) => self.respond(&dispatch, socket, wasto, wasfrom),
            Err(reason) => {
                if self.config.logging(log::Level::Debug)
                    && reason != Rejected::NotSearchRequest
                {
                    debug!("not answering {wasfrom}: {reason}");
                }
                Ok(0)
            }
        }
    }
}
