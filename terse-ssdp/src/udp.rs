use core::net::{IpAddr, Ipv4Addr, SocketAddr};

mod error;
pub use error::{Error, Syscall};

/// Sending UDP datagrams from a specific source IP
pub trait TargetedSend {
    /// Send a UDP datagram from a specific source IP (and interface)
    ///
    /// Works even if two interfaces share the same IP range
    /// (169.254/16, for instance), so long as they have different
    /// addresses. A source of `0.0.0.0` leaves the choice to the
    /// network stack.
    ///
    /// `f` is handed a buffer of (at most) `size` bytes to fill, and
    /// returns how many of them to send.
    ///
    /// For how this works see
    /// <https://man7.org/linux/man-pages/man7/ip.7.html>
    ///
    /// # Errors
    ///
    /// Returns `Err` if the underlying sendmsg call fails, or
    /// (currently) if IPv6 is attempted.
    ///
    fn send_with<F>(
        &self,
        size: usize,
        to: &SocketAddr,
        from: &IpAddr,
        f: F,
    ) -> Result<(), Error>
    where
        F: FnOnce(&mut [u8]) -> usize;
}

/// Receiving UDP datagrams, recording which IP we received it on
pub trait TargetedReceive {
    /// Receive a UDP datagram, recording which IP we received it on
    ///
    /// This is not the same as which IP it was addressed to (e.g. in
    /// the case of multicast packets); it's the IP from which the
    /// peer would be expecting a reply to originate.
    ///
    /// Never blocks: returns `Ok(None)` if nothing is waiting.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the underlying recvmsg call fails, if no
    /// packet info is received, or (currently) if IPv6 is attempted.
    ///
    fn receive_to(
        &self,
        buffer: &mut [u8],
    ) -> Result<Option<(usize, IpAddr, SocketAddr)>, Error>;
}

/// Joining and leaving multicast groups (by local interface address)
pub trait Multicast {
    /// Join a multicast group on the interface with address `interface`
    ///
    /// # Errors
    ///
    /// Can only fail if the underlying system call fails.
    ///
    fn join_multicast_group(
        &self,
        multicast_address: &IpAddr,
        interface: Ipv4Addr,
    ) -> Result<(), Error>;

    /// Leave a multicast group on the interface with address `interface`
    ///
    /// # Errors
    ///
    /// Can only fail if the underlying system call fails.
    ///
    fn leave_multicast_group(
        &self,
        multicast_address: &IpAddr,
        interface: Ipv4Addr,
    ) -> Result<(), Error>;
}

/// Socket setup and trait implementations using `std::net` underneath
#[cfg(feature = "std")]
pub mod std;

/// Trait implementations for MIO sockets
#[cfg(feature = "sync")]
pub mod mio;
