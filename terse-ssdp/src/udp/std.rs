use super::{Error, Syscall};
use crate::config::TRANSMIT_BUFFER_SIZE;
use nix::cmsg_space;
use nix::sys::socket::setsockopt;
use nix::sys::socket::sockopt::Ipv4PacketInfo;
use nix::sys::socket::ControlMessage;
use nix::sys::socket::ControlMessageOwned;
use nix::sys::socket::MsgFlags;
use nix::sys::socket::SockaddrStorage;
use std::io::IoSlice;
use std::io::IoSliceMut;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::os::unix::io::AsRawFd;
use std::os::unix::prelude::RawFd;

type NewSocketFn = fn() -> std::io::Result<socket2::Socket>;
type SockoptFn = fn(&socket2::Socket, bool) -> std::io::Result<()>;
type RawSockoptFn =
    fn(&socket2::Socket, bool) -> Result<(), nix::errno::Errno>;
type BindFn = fn(&socket2::Socket, SocketAddrV4) -> std::io::Result<()>;

fn setup_socket_inner(
    address: SocketAddrV4,
    new_socket: NewSocketFn,
    nonblocking: SockoptFn,
    reuse_address: SockoptFn,
    bind: BindFn,
    ipv4_packetinfo: RawSockoptFn,
) -> std::io::Result<std::net::UdpSocket> {
    let socket = new_socket()?;
    nonblocking(&socket, true)?;
    reuse_address(&socket, true)?;
    bind(&socket, address)?;
    ipv4_packetinfo(&socket, true)?;
    Ok(socket.into())
}

/// Create a non-blocking UDP socket bound to `address`
///
/// The socket has `SO_REUSEADDR` set, so that several processes can
/// listen on the multicast port, and `IP_PKTINFO`, so that
/// [`TargetedReceive`](super::TargetedReceive) can report which local
/// address each datagram arrived on.
///
/// # Errors
///
/// Returns [`Syscall::Bind`] if any step of creating the socket fails.
pub fn setup_socket(
    address: SocketAddrV4,
) -> Result<std::net::UdpSocket, Error> {
    setup_socket_inner(
        address,
        || {
            socket2::Socket::new(
                socket2::Domain::IPV4,
                socket2::Type::DGRAM,
                None,
            )
        },
        socket2::Socket::set_nonblocking,
        socket2::Socket::set_reuse_address,
        |s, a| s.bind(&socket2::SockAddr::from(a)),
        |s, b| setsockopt(s, Ipv4PacketInfo, &b),
    )
    .map_err(|e| Error::Syscall(Syscall::Bind, e))
}

#[allow(clippy::cast_possible_truncation)] // socklen_t
pub(crate) fn ipv4_multicast_operation(
    fd: RawFd,
    op: libc::c_int,
    multicast_address: &IpAddr,
    interface: Ipv4Addr,
) -> Result<(), std::io::Error> {
    match *multicast_address {
        IpAddr::V4(mcast) => {
            let mreqn = libc::ip_mreqn {
                imr_multiaddr: libc::in_addr {
                    s_addr: u32::from_ne_bytes(mcast.octets()),
                },
                imr_address: libc::in_addr {
                    s_addr: u32::from_ne_bytes(interface.octets()),
                },
                imr_ifindex: 0,
            };
            unsafe {
                let ret = libc::setsockopt(
                    fd,
                    libc::IPPROTO_IP,
                    op,
                    std::ptr::addr_of!(mreqn).cast::<libc::c_void>(),
                    std::mem::size_of_val(&mreqn) as libc::socklen_t,
                );
                if ret != 0 {
                    return Err(std::io::Error::last_os_error());
                }
            }
            Ok(())
        }
        IpAddr::V6(_) => Err(std::io::ErrorKind::Unsupported.into()),
    }
}

pub(crate) fn multicast_error(op: Syscall, e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::Unsupported {
        Error::Ipv6NotImplemented
    } else {
        Error::Syscall(op, e)
    }
}

pub(crate) fn require_ipv4(
    to: &SocketAddr,
    from: &IpAddr,
) -> Result<(), Error> {
    if to.is_ipv4() && from.is_ipv4() {
        Ok(())
    } else {
        Err(Error::Ipv6NotImplemented)
    }
}

/// Fill a stack buffer using `f`, then pass the filled part to `send`
pub(crate) fn with_transmit_buffer<F, S>(
    size: usize,
    f: F,
    send: S,
) -> Result<(), Error>
where
    F: FnOnce(&mut [u8]) -> usize,
    S: FnOnce(&[u8]) -> std::io::Result<()>,
{
    let mut buffer = [0u8; TRANSMIT_BUFFER_SIZE];
    let size = size.min(buffer.len());
    let actual_size = f(&mut buffer[..size]).min(size);
    send(&buffer[..actual_size])
        .map_err(|e| Error::Syscall(Syscall::Sendmsg, e))
}

pub(crate) fn send_from(
    fd: RawFd,
    buffer: &[u8],
    to: &SocketAddr,
    from: &IpAddr,
) -> Result<(), std::io::Error> {
    if let IpAddr::V4(from) = from {
        let iov = [IoSlice::new(buffer)];
        let pi = libc::in_pktinfo {
            ipi_ifindex: 0,
            ipi_addr: libc::in_addr { s_addr: 0 },
            ipi_spec_dst: libc::in_addr {
                s_addr: u32::to_be((*from).into()),
            },
        };

        let cmsg = ControlMessage::Ipv4PacketInfo(&pi);
        let dest = match to {
            SocketAddr::V4(ipv4) => SockaddrStorage::from(*ipv4),
            SocketAddr::V6(ipv6) => SockaddrStorage::from(*ipv6),
        };
        nix::sys::socket::sendmsg(
            fd,
            &iov,
            &[cmsg],
            MsgFlags::empty(),
            Some(&dest),
        )?;
        Ok(())
    } else {
        Err(std::io::ErrorKind::Unsupported.into())
    }
}

/// What recvmsg told us: length, local address, peer address
pub(crate) type Received =
    (usize, Option<IpAddr>, Option<SockaddrStorage>);

pub(crate) fn receive_using_recvmsg(
    fd: RawFd,
    buffer: &mut [u8],
) -> Result<Received, std::io::Error> {
    let mut cmsgspace = cmsg_space!(libc::in_pktinfo);
    let mut iov = [IoSliceMut::new(buffer)];
    let r = nix::sys::socket::recvmsg::<SockaddrStorage>(
        fd,
        &mut iov,
        Some(&mut cmsgspace),
        MsgFlags::empty(),
    )?;
    let rxon = match r.cmsgs()?.next() {
        Some(ControlMessageOwned::Ipv4PacketInfo(pi)) => Some(IpAddr::V4(
            Ipv4Addr::from(u32::from_be(pi.ipi_spec_dst.s_addr)),
        )),
        _ => None,
    };
    Ok((r.bytes, rxon, r.address))
}

/// Turn the outcome of a recvmsg into the form
/// [`TargetedReceive::receive_to`](super::TargetedReceive::receive_to)
/// returns
pub(crate) fn interpret_received(
    r: Result<Received, std::io::Error>,
) -> Result<Option<(usize, IpAddr, SocketAddr)>, Error> {
    let (bytes, rxon, address) = match r {
        Ok(r) => r,
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
            return Ok(None)
        }
        Err(e) => return Err(Error::Syscall(Syscall::Recvmsg, e)),
    };

    // No peer address, or a non-IPv4 one
    let Some(sin) = address.as_ref().and_then(|a| a.as_sockaddr_in()) else {
        return Err(Error::Ipv6NotImplemented);
    };
    let wasfrom = SocketAddrV4::new(Ipv4Addr::from(sin.ip()), sin.port());
    let Some(rxon) = rxon else {
        return Err(Error::NoPacketInfo);
    };
    Ok(Some((bytes, rxon, SocketAddr::V4(wasfrom))))
}

/** The type of `receive_using_recvmsg`
 */
type ReceiveInnerFn =
    fn(RawFd, &mut [u8]) -> Result<Received, std::io::Error>;

fn receive_to_inner(
    fd: RawFd,
    buffer: &mut [u8],
    recvmsg: ReceiveInnerFn,
) -> Result<Option<(usize, IpAddr, SocketAddr)>, Error> {
    interpret_received(recvmsg(fd, buffer))
}

pub(crate) fn receive_to(
    fd: RawFd,
    buffer: &mut [u8],
) -> Result<Option<(usize, IpAddr, SocketAddr)>, Error> {
    /* The inner function does most of the work, and is parameterised on
     * the recvmsg call purely for testing reasons.
     */
    receive_to_inner(fd, buffer, receive_using_recvmsg)
}

impl super::TargetedSend for std::net::UdpSocket {
    fn send_with<F>(
        &self,
        size: usize,
        to: &SocketAddr,
        from: &IpAddr,
        f: F,
    ) -> Result<(), Error>
    where
        F: FnOnce(&mut [u8]) -> usize,
    {
        require_ipv4(to, from)?;
        with_transmit_buffer(size, f, |buffer| {
            send_from(self.as_raw_fd(), buffer, to, from)
        })
    }
}

impl super::TargetedReceive for std::net::UdpSocket {
    fn receive_to(
        &self,
        buffer: &mut [u8],
    ) -> Result<Option<(usize, IpAddr, SocketAddr)>, Error> {
        receive_to(self.as_raw_fd(), buffer)
    }
}

impl super::Multicast for std::net::UdpSocket {
    fn join_multicast_group(
        &self,
        multicast_address: &IpAddr,
        interface: Ipv4Addr,
    ) -> Result<(), Error> {
        ipv4_multicast_operation(
            self.as_raw_fd(),
            libc::IP_ADD_MEMBERSHIP,
            multicast_address,
            interface,
        )
        .map_err(|e| multicast_error(Syscall::JoinMulticast, e))
    }

    fn leave_multicast_group(
        &self,
        multicast_address: &IpAddr,
        interface: Ipv4Addr,
    ) -> Result<(), Error> {
        ipv4_multicast_operation(
            self.as_raw_fd(),
            libc::IP_DROP_MEMBERSHIP,
            multicast_address,
            interface,
        )
        .map_err(|e| multicast_error(Syscall::LeaveMulticast, e))
    }
}
