use serial_test::serial;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;
use terse_ssdp::model::{Device, RootDevice, Service as ServiceInfo};
use terse_ssdp::search::{self, Discovery};
use terse_ssdp::udp::{self, TargetedReceive, TargetedSend};
use terse_ssdp::*;

const ROOT_UUID: &str = "cafe0000-0000-4000-8000-000000000001";

/// Sends searches to one responder's unicast port, not to the group
struct Redirect {
    socket: UdpSocket,
    to: SocketAddr,
}

impl TargetedSend for Redirect {
    fn send_with<F>(
        &self,
        size: usize,
        _to: &SocketAddr,
        from: &IpAddr,
        f: F,
    ) -> Result<(), udp::Error>
    where
        F: FnOnce(&mut [u8]) -> usize,
    {
        self.socket.send_with(size, &self.to, from, f)
    }
}

impl TargetedReceive for Redirect {
    fn receive_to(
        &self,
        buffer: &mut [u8],
    ) -> Result<Option<(usize, IpAddr, SocketAddr)>, udp::Error> {
        self.socket.receive_to(buffer)
    }
}

fn thermostat() -> RootDevice {
    let mut root = RootDevice::new(
        Device::new(
            ROOT_UUID,
            "urn:example-com:device:Thermostat:1",
            "Thermostat",
            "thermo",
        )
        .unwrap(),
        80,
    );
    root.add_service(
        ServiceInfo::new(
            "urn:example-com:service:Temperature:1",
            "Temperature",
            "temp",
        )
        .unwrap(),
    )
    .unwrap();
    root
}

/// Run a responder on its own thread until `stop` is set
fn spawn_responder(
    stop: Arc<AtomicBool>,
) -> (u16, std::thread::JoinHandle<()>) {
    let (tx, rx) = mpsc::channel();
    let handle = std::thread::spawn(move || {
        const SSDP_TOKEN1: mio::Token = mio::Token(0);
        const SSDP_TOKEN2: mio::Token = mio::Token(1);

        let mut poll = mio::Poll::new().unwrap();
        let mut events = mio::Events::with_capacity(128);
        let mut ssdp = Service::with_multicast_port(
            thermostat(),
            Config::default(),
            poll.registry(),
            (SSDP_TOKEN1, SSDP_TOKEN2),
            0,
        )
        .unwrap();
        tx.send(ssdp.unicast_port().unwrap()).unwrap();

        while !stop.load(Ordering::Relaxed) {
            poll.poll(&mut events, Some(Duration::from_millis(10)))
                .unwrap();
            for event in &events {
                match event.token() {
                    SSDP_TOKEN1 => ssdp.multicast_ready(event),
                    SSDP_TOKEN2 => ssdp.search_ready(event),
                    _ => (),
                }
            }
        }
    });
    (rx.recv().unwrap(), handle)
}

fn quick() -> Config {
    Config::default()
        .with_settle_delay(Duration::from_millis(20))
        .with_poll_interval(Duration::from_millis(5))
}

#[test]
#[serial]
#[cfg_attr(miri, ignore)]
fn search_finds_responder() {
    let stop = Arc::new(AtomicBool::new(false));
    let (port, handle) = spawn_responder(stop.clone());

    let socket = udp::std::setup_socket("127.0.0.1:0".parse().unwrap())
        .unwrap();
    let redirect = Redirect {
        socket,
        to: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port),
    };

    let mut found = Vec::new();
    let r = search::search_on(
        &redirect,
        "upnp:rootdevice",
        |m| {
            let d = Discovery::from_message(m).unwrap();
            found.push((
                d.uuid().to_string(),
                d.description.name.to_string(),
                d.location.to_string(),
            ));
        },
        Ipv4Addr::LOCALHOST,
        Duration::from_millis(300),
        true,
        &quick(),
    );

    stop.store(true, Ordering::Relaxed);
    handle.join().unwrap();

    assert!(r.is_ok());
    assert_eq!(
        found,
        [
            (
                ROOT_UUID.to_string(),
                "Thermostat".to_string(),
                "http://127.0.0.1:80".to_string()
            ),
            (
                ROOT_UUID.to_string(),
                "Temperature".to_string(),
                "http://127.0.0.1:80/thermo/temp".to_string()
            ),
        ]
    );
}

#[test]
#[cfg_attr(miri, ignore)]
fn invalid_target() {
    let r = search::search(
        "ssdp:all",
        |_| panic!("no answers expected"),
        Ipv4Addr::UNSPECIFIED,
        Duration::from_millis(10),
        false,
        &Config::default(),
    );
    assert!(matches!(r, Err(search::Error::InvalidTarget)));
}

#[test]
#[cfg_attr(miri, ignore)]
fn non_local_interface_fails_to_bind() {
    // TEST-NET-1, never a local address
    let r = search::search(
        "upnp:rootdevice",
        |_| panic!("no answers expected"),
        Ipv4Addr::new(192, 0, 2, 1),
        Duration::from_millis(10),
        false,
        &Config::default(),
    );
    assert!(matches!(r, Err(search::Error::Bind(_))));
}
