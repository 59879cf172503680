use core::net::Ipv4Addr;

/// Where a node sits in the hierarchy
///
/// Roots own embedded devices and services; embedded devices own only
/// services; services own nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NodeKind<N> {
    /// A top-level device
    Root,

    /// A device owned by a root
    EmbeddedDevice {
        /// The owning root
        parent: N,
    },

    /// A service owned by a root or an embedded device
    Service {
        /// The owning device
        parent: N,
    },
}

/// Read-only access to a hierarchy of devices and services
///
/// The hierarchy is owned elsewhere; the responder only ever asks
/// questions of it. Nodes are referred to by small copyable handles.
pub trait DeviceTree {
    /// A handle identifying one device or service
    type Node: Copy + Eq + core::fmt::Debug;

    /// The root device
    fn root(&self) -> Self::Node;

    /// What kind of node `node` is, and who owns it
    fn kind(&self, node: Self::Node) -> NodeKind<Self::Node>;

    /// The node's uuid, without any `uuid:` prefix
    ///
    /// Services have no identity of their own and report the uuid of
    /// the device that owns them.
    fn uuid(&self, node: Self::Node) -> &str;

    /// The node's type, e.g. `urn:example-com:device:Clock:1`
    fn node_type(&self, node: Self::Node) -> &str;

    /// Human-readable name
    fn display_name(&self, node: Self::Node) -> &str;

    /// Embedded devices, in declared order (empty except for roots)
    fn devices(
        &self,
        node: Self::Node,
    ) -> impl Iterator<Item = Self::Node> + '_;

    /// Services, in declared order (empty for services)
    fn services(
        &self,
        node: Self::Node,
    ) -> impl Iterator<Item = Self::Node> + '_;

    /// Write the node's URL as reached through local address `interface`
    ///
    /// # Errors
    ///
    /// Passes on errors from `w`.
    fn write_location(
        &self,
        node: Self::Node,
        interface: Ipv4Addr,
        w: &mut dyn core::fmt::Write,
    ) -> core::fmt::Result;

    /// Find the root or embedded device with this uuid
    fn lookup_by_uuid(&self, uuid: &str) -> Option<Self::Node> {
        let root = self.root();
        if self.uuid(root) == uuid {
            return Some(root);
        }
        self.devices(root).find(|&d| self.uuid(d) == uuid)
    }

    /// Whether the node's type is exactly `urn`
    fn matches_type(&self, node: Self::Node, urn: &str) -> bool {
        self.node_type(node) == urn
    }
}
