/// The socket operation that failed
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Syscall {
    /// Creating, configuring or binding a socket
    Bind,
    /// Receiving a search or an answer
    Recvmsg,
    /// Sending a search or an answer
    Sendmsg,
    /// Joining the multicast group on an interface
    JoinMulticast,
    /// Leaving the multicast group on an interface
    LeaveMulticast,
}

impl ::core::fmt::Display for Syscall {
    fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
        f.write_str(match self {
            Self::Bind => "bind",
            Self::Recvmsg => "recvmsg",
            Self::Sendmsg => "sendmsg",
            Self::JoinMulticast => "IP_ADD_MEMBERSHIP",
            Self::LeaveMulticast => "IP_DROP_MEMBERSHIP",
        })
    }
}

/// Transport failures
#[non_exhaustive]
#[derive(Debug)]
pub enum Error {
    /// A datagram arrived without the local address it was sent to
    NoPacketInfo,
    /// A peer or local address was IPv6, which is not supported
    Ipv6NotImplemented,

    /// A system call returned an error
    #[cfg(feature = "std")]
    Syscall(Syscall, ::std::io::Error),
}

impl ::core::fmt::Display for Error {
    fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
        match self {
            Self::NoPacketInfo => {
                f.write_str("datagram carried no destination address")
            }
            Self::Ipv6NotImplemented => f.write_str("IPv6 not supported"),

            #[cfg(feature = "std")]
            Self::Syscall(s, _) => write!(f, "{s} failed"),
        }
    }
}

#[cfg(feature = "std")]
impl ::std::error::Error for Error {
    fn source(&self) -> Option<&(dyn ::std::error::Error + 'static)> {
        match self {
            Self::Syscall(_, e) => Some(e),
            _ => None,
        }
    }
}
