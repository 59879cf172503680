//! A ready-made device hierarchy with fixed capacity
//!
//! A [`RootDevice`] owns up to [`MAX_DEVICES`] embedded [`Device`]s and
//! up to [`MAX_SERVICES`] [`Service`]s; each embedded device owns up to
//! [`MAX_SERVICES`] services of its own. No allocation is needed, so the
//! model works on embedded targets too.
//!
//! Locations are built from the address of the interface a search
//! arrived on:
//!
//! | node | location |
//! |---|---|
//! | root | `http://<ifc>:<port>` |
//! | embedded device | `http://<ifc>:<port>/<root-target>/<device-target>` |
//! | service | owning device's location (root target included), then `/<service-target>` |

use crate::config::{
    DisplayName, DISPLAY_NAME_SIZE, MAX_DEVICES, MAX_SERVICES, TARGET_SIZE,
    TYPE_SIZE, UUID_SIZE,
};
use crate::tree::{DeviceTree, NodeKind};
use core::net::Ipv4Addr;
use heapless::{String, Vec};

type Uuid = String<{ UUID_SIZE - 1 }>;
type TypeUrn = String<{ TYPE_SIZE - 1 }>;
type Target = String<{ TARGET_SIZE - 1 }>;

/// Errors building a model
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A string is longer than its fixed capacity
    TooLong,
    /// A device already has as many children as it can hold
    TooMany,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::TooLong => f.write_str("string too long for device model"),
            Self::TooMany => f.write_str("too many devices or services"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

fn bounded<const N: usize>(s: &str) -> Result<String<N>, Error> {
    let mut out = String::new();
    out.push_str(s).map_err(|()| Error::TooLong)?;
    Ok(out)
}

/// A service offered by a device
#[derive(Debug, Clone)]
pub struct Service {
    service_type: TypeUrn,
    display_name: DisplayName,
    target: Target,
}

impl Service {
    /// Create a service
    ///
    /// # Errors
    ///
    /// [`Error::TooLong`] if any string exceeds its capacity (type
    /// 63 bytes, name [`DISPLAY_NAME_SIZE`] - 1, target 31).
    pub fn new(
        service_type: &str,
        display_name: &str,
        target: &str,
    ) -> Result<Self, Error> {
        Ok(Self {
            service_type: bounded(service_type)?,
            display_name: bounded(display_name)?,
            target: bounded(target)?,
        })
    }

    /// Service type URN
    #[must_use]
    pub fn service_type(&self) -> &str {
        &self.service_type
    }

    /// Display name
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// URL path segment
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }
}

/// A device: the root itself, or one embedded in it
#[derive(Debug, Clone)]
pub struct Device {
    uuid: Uuid,
    device_type: TypeUrn,
    display_name: DisplayName,
    target: Target,
    services: Vec<Service, MAX_SERVICES>,
}

impl Device {
    /// Create a device with no services
    ///
    /// # Errors
    ///
    /// [`Error::TooLong`] if any string exceeds its capacity.
    pub fn new(
        uuid: &str,
        device_type: &str,
        display_name: &str,
        target: &str,
    ) -> Result<Self, Error> {
        Ok(Self {
            uuid: bounded(uuid)?,
            device_type: bounded(device_type)?,
            display_name: bounded(display_name)?,
            target: bounded(target)?,
            services: Vec::new(),
        })
    }

    /// Create a device with a freshly-generated (v4) uuid
    ///
    /// # Errors
    ///
    /// [`Error::TooLong`] if any string exceeds its capacity.
    #[cfg(feature = "std")]
    pub fn with_random_uuid(
        device_type: &str,
        display_name: &str,
        target: &str,
    ) -> Result<Self, Error> {
        let mut buf = uuid::Uuid::encode_buffer();
        let uuid = uuid::Uuid::new_v4().hyphenated().encode_lower(&mut buf);
        Self::new(uuid, device_type, display_name, target)
    }

    /// Add a service
    ///
    /// # Errors
    ///
    /// [`Error::TooMany`] if the device already has [`MAX_SERVICES`].
    pub fn add_service(&mut self, service: Service) -> Result<(), Error> {
        self.services.push(service).map_err(|_| Error::TooMany)
    }

    /// The uuid, without prefix
    #[must_use]
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// Device type URN
    #[must_use]
    pub fn device_type(&self) -> &str {
        &self.device_type
    }

    /// Display name
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// URL path segment
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The services, in the order they were added
    #[must_use]
    pub fn services(&self) -> &[Service] {
        &self.services
    }
}

/// The top of a hierarchy, serving HTTP on `port`
#[derive(Debug, Clone)]
pub struct RootDevice {
    device: Device,
    port: u16,
    devices: Vec<Device, MAX_DEVICES>,
}

/// A handle on one node of a [`RootDevice`] hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Node {
    /// The root device itself
    Root,
    /// The embedded device at this index
    Device(usize),
    /// A service, owned by the root (`device: None`) or an embedded device
    Service {
        /// Index of the owning embedded device, or `None` for the root
        device: Option<usize>,
        /// Index within the owner's services
        index: usize,
    },
}

impl RootDevice {
    /// Wrap a device as the root of a hierarchy
    #[must_use]
    pub fn new(device: Device, port: u16) -> Self {
        Self {
            device,
            port,
            devices: Vec::new(),
        }
    }

    /// Add a service to the root device itself
    ///
    /// # Errors
    ///
    /// [`Error::TooMany`] if the root already has [`MAX_SERVICES`].
    pub fn add_service(&mut self, service: Service) -> Result<(), Error> {
        self.device.add_service(service)
    }

    /// Add an embedded device
    ///
    /// # Errors
    ///
    /// [`Error::TooMany`] if the root already has [`MAX_DEVICES`].
    pub fn add_device(&mut self, device: Device) -> Result<(), Error> {
        self.devices.push(device).map_err(|_| Error::TooMany)
    }

    /// The root's own device description
    #[must_use]
    pub const fn device(&self) -> &Device {
        &self.device
    }

    /// The HTTP port in location URLs
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// The embedded devices, in the order they were added
    #[must_use]
    pub fn embedded_devices(&self) -> &[Device] {
        &self.devices
    }

    fn owner(&self, device: Option<usize>) -> Option<&Device> {
        match device {
            None => Some(&self.device),
            Some(i) => self.devices.get(i),
        }
    }

    fn service(
        &self,
        device: Option<usize>,
        index: usize,
    ) -> Option<&Service> {
        self.owner(device)?.services.get(index)
    }
}

impl DeviceTree for RootDevice {
    type Node = Node;

    fn root(&self) -> Node {
        Node::Root
    }

    fn kind(&self, node: Node) -> NodeKind<Node> {
        match node {
            Node::Root => NodeKind::Root,
            Node::Device(_) => NodeKind::EmbeddedDevice { parent: Node::Root },
            Node::Service { device: None, .. } => {
                NodeKind::Service { parent: Node::Root }
            }
            Node::Service {
                device: Some(i), ..
            } => NodeKind::Service {
                parent: Node::Device(i),
            },
        }
    }

    fn uuid(&self, node: Node) -> &str {
        let owner = match node {
            Node::Root => None,
            Node::Device(i) => Some(i),
            Node::Service { device, .. } => device,
        };
        self.owner(owner).map_or("", Device::uuid)
    }

    fn node_type(&self, node: Node) -> &str {
        match node {
            Node::Root => self.device.device_type(),
            Node::Device(i) => {
                self.devices.get(i).map_or("", Device::device_type)
            }
            Node::Service { device, index } => self
                .service(device, index)
                .map_or("", Service::service_type),
        }
    }

    fn display_name(&self, node: Node) -> &str {
        match node {
            Node::Root => self.device.display_name(),
            Node::Device(i) => {
                self.devices.get(i).map_or("", Device::display_name)
            }
            Node::Service { device, index } => self
                .service(device, index)
                .map_or("", Service::display_name),
        }
    }

    fn devices(&self, node: Node) -> impl Iterator<Item = Node> + '_ {
        let n = if node == Node::Root {
            self.devices.len()
        } else {
            0
        };
        (0..n).map(Node::Device)
    }

    fn services(&self, node: Node) -> impl Iterator<Item = Node> + '_ {
        let (device, n) = match node {
            Node::Root => (None, self.device.services.len()),
            Node::Device(i) => {
                (Some(i), self.devices.get(i).map_or(0, |d| d.services.len()))
            }
            Node::Service { .. } => (None, 0),
        };
        (0..n).map(move |index| Node::Service { device, index })
    }

    fn write_location(
        &self,
        node: Node,
        interface: Ipv4Addr,
        w: &mut dyn core::fmt::Write,
    ) -> core::fmt::Result {
        write!(w, "http://{interface}:{}", self.port)?;
        let (device, service) = match node {
            Node::Root => return Ok(()),
            Node::Device(i) => (Some(i), None),
            Node::Service { device, index } => (device, Some(index)),
        };
        if device.is_some() || service.is_some() {
            write!(w, "/{}", self.device.target())?;
        }
        if let Some(d) = device.and_then(|i| self.devices.get(i)) {
            write!(w, "/{}", d.target())?;
        }
        if let Some(s) = service.and_then(|i| self.service(device, i)) {
            write!(w, "/{}", s.target())?;
        }
        Ok(())
    }
}
