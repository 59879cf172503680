use super::std::{
    interpret_received, ipv4_multicast_operation, multicast_error,
    receive_using_recvmsg, require_ipv4, send_from, with_transmit_buffer,
};
use super::{Error, Syscall};
use ::std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::os::unix::io::AsRawFd;

impl super::TargetedSend for mio::net::UdpSocket {
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
            self.try_io(|| send_from(self.as_raw_fd(), buffer, to, from))
        })
    }
}

impl super::TargetedReceive for mio::net::UdpSocket {
    fn receive_to(
        &self,
        buffer: &mut [u8],
    ) -> Result<Option<(usize, IpAddr, SocketAddr)>, Error> {
        interpret_received(
            self.try_io(|| receive_using_recvmsg(self.as_raw_fd(), buffer)),
        )
    }
}

impl super::Multicast for mio::net::UdpSocket {
    fn join_multicast_group(
        &self,
        address: &IpAddr,
        interface: Ipv4Addr,
    ) -> Result<(), Error> {
        ipv4_multicast_operation(
            self.as_raw_fd(),
            libc::IP_ADD_MEMBERSHIP,
            address,
            interface,
        )
        .map_err(|e| multicast_error(Syscall::JoinMulticast, e))
    }

    fn leave_multicast_group(
        &self,
        address: &IpAddr,
        interface: Ipv4Addr,
    ) -> Result<(), Error> {
        ipv4_multicast_operation(
            self.as_raw_fd(),
            libc::IP_DROP_MEMBERSHIP,
            address,
            interface,
        )
        .map_err(|e| multicast_error(Syscall::LeaveMulticast, e))
    }
}
