use core::net::Ipv4Addr;
use core::time::Duration;
use log::{Level, LevelFilter};

/// The SSDP multicast group
pub const MULTICAST_ADDRESS: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);

/// The SSDP port, on which the multicast socket listens
pub const SSDP_PORT: u16 = 1900;

/// Header carrying the search extension (`ssdp:all` or empty)
///
/// Searches without this header are not addressed to this protocol and
/// are ignored.
pub const SEARCH_EXTENSION_HEADER: &str = "ST.LEELANAUSOFTWARE.COM";

/// Header carrying the `:name:...:` description of a responding node
pub const DESCRIPTION_HEADER: &str = "DESC.LEELANAUSOFTWARE.COM";

/// Size of the scratch buffer for outbound responses
pub const TRANSMIT_BUFFER_SIZE: usize = 1536;

/// Size of the buffer for inbound search requests
pub const RECEIVE_BUFFER_SIZE: usize = 1536;

/// Size of the buffer for search requests and responses on the client side
pub const CLIENT_BUFFER_SIZE: usize = 1000;

// Capacities below include a terminator slot: a destination of capacity
// C holds at most C-1 bytes of content.

/// Capacity for the value of the ST header
pub const ST_HEADER_SIZE: usize = 100;

/// Capacity for the value of the search extension header
pub const EXTENSION_HEADER_SIZE: usize = 20;

/// Capacity for the value of the description header
pub const DESCRIPTION_HEADER_SIZE: usize = 200;

/// Capacity for a display name
pub const DISPLAY_NAME_SIZE: usize = 32;

/// Capacity for a location URL
pub const LOCATION_SIZE: usize = 128;

/// Capacity for a uuid (36 characters plus terminator)
pub const UUID_SIZE: usize = 37;

/// Capacity for a device or service type URN
pub const TYPE_SIZE: usize = 64;

/// Capacity for the URL path segment of a device or service
pub const TARGET_SIZE: usize = 32;

/// Maximum number of embedded devices in a root device
pub const MAX_DEVICES: usize = 8;

/// Maximum number of services in any one device
pub const MAX_SERVICES: usize = 8;

/// Maximum number of local interface addresses tracked by an engine
pub const MAX_INTERFACES: usize = 4;

/// Default listening window for an active search
pub const DEFAULT_SEARCH_TIMEOUT: Duration = Duration::from_millis(2000);

/// Content capacity of a [`crate::classify::Dispatch`]'s search target
pub type SearchTargetString = heapless::String<{ ST_HEADER_SIZE - 1 }>;

/// Content capacity of a display name
pub type DisplayName = heapless::String<{ DISPLAY_NAME_SIZE - 1 }>;

/// Run-time settings shared by the engine, service and search client
///
/// There is no global state: each [`crate::Engine`] or
/// [`crate::Service`] carries its own copy, and the search client takes
/// one as a parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Most verbose level of diagnostics this component emits
    pub log_level: LevelFilter,

    /// Pause after transmitting a search, before listening for answers
    pub settle_delay: Duration,

    /// Idle wait between polls of the socket while collecting answers
    pub poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LevelFilter::Warn,
            settle_delay: Duration::from_millis(500),
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl Config {
    /// Replace the logging level
    #[must_use]
    pub fn with_log_level(mut self, level: LevelFilter) -> Self {
        self.log_level = level;
        self
    }

    /// Replace the post-transmit settle delay
    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Replace the receive poll interval
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Whether diagnostics at `level` should be emitted
    #[must_use]
    pub fn logging(&self, level: Level) -> bool {
        self.log_level >= level
    }
}
