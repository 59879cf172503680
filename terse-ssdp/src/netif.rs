use core::net::Ipv4Addr;

/// One local IPv4 address and the netmask of its subnet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InterfaceAddress {
    /// The local address
    pub address: Ipv4Addr,
    /// Its subnet mask
    pub netmask: Ipv4Addr,
}

impl InterfaceAddress {
    /// An address with an explicit netmask
    #[must_use]
    pub const fn new(address: Ipv4Addr, netmask: Ipv4Addr) -> Self {
        Self { address, netmask }
    }

    /// An address with a prefix length, e.g. 24 for `255.255.255.0`
    ///
    /// Prefixes longer than 32 are treated as 32.
    #[must_use]
    pub fn with_prefix(address: Ipv4Addr, prefix: u8) -> Self {
        let mask = if prefix == 0 {
            0
        } else if prefix >= 32 {
            u32::MAX
        } else {
            u32::MAX << (32 - prefix)
        };
        Self {
            address,
            netmask: Ipv4Addr::from(mask),
        }
    }

    /// Whether `remote` is on this address's subnet
    #[must_use]
    pub fn contains(&self, remote: Ipv4Addr) -> bool {
        let mask = u32::from(self.netmask);
        u32::from(self.address) & mask == u32::from(remote) & mask
    }
}

/// The local address to answer `remote` from
///
/// That is the first interface whose subnet contains `remote`, or
/// `0.0.0.0` if none does.
#[must_use]
pub fn select_interface(
    remote: Ipv4Addr,
    interfaces: &[InterfaceAddress],
) -> Ipv4Addr {
    interfaces
        .iter()
        .find(|ifc| ifc.contains(remote))
        .map_or(Ipv4Addr::UNSPECIFIED, |ifc| ifc.address)
}

/// List the IPv4 addresses of local interfaces that are up
///
/// Loopback is included, so that searches on the same host get answered.
///
/// # Errors
///
/// Passes on errors from `getifaddrs(3)`.
#[cfg(feature = "std")]
pub fn get_interfaces() -> Result<Vec<InterfaceAddress>, std::io::Error> {
    get_interfaces_inner(nix::ifaddrs::getifaddrs)
}

#[cfg(feature = "std")]
fn get_interfaces_inner(
    getifaddrs: fn() -> nix::Result<nix::ifaddrs::InterfaceAddressIterator>,
) -> Result<Vec<InterfaceAddress>, std::io::Error> {
    use nix::net::if_::InterfaceFlags;

    Ok(getifaddrs()?
        .filter(|ifaddr| ifaddr.flags.contains(InterfaceFlags::IFF_UP))
        .filter_map(|ifaddr| {
            let address = ifaddr.address?.as_sockaddr_in()?.ip();
            let netmask = ifaddr.netmask?.as_sockaddr_in()?.ip();
            Some(InterfaceAddress::new(
                Ipv4Addr::from(address),
                Ipv4Addr::from(netmask),
            ))
        })
        .collect())
}
