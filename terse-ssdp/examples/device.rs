use std::error::Error;
use terse_ssdp::model::{Device, RootDevice, Service as ServiceInfo};
use terse_ssdp::{Config, Service};

const SSDP_TOKEN1: mio::Token = mio::Token(0);
const SSDP_TOKEN2: mio::Token = mio::Token(1);

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    println!(
        "device from {} {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let mut root = RootDevice::new(
        Device::with_random_uuid(
            "urn:example-com:device:Clock:1",
            "Demo Clock",
            "clock",
        )?,
        8080,
    );
    let mut alarm = Device::with_random_uuid(
        "urn:example-com:device:Alarm:1",
        "Alarm",
        "alarm",
    )?;
    alarm.add_service(ServiceInfo::new(
        "urn:example-com:service:Time:1",
        "Get Time",
        "time",
    )?)?;
    root.add_device(alarm)?;
    println!("uuid:{}", root.device().uuid());

    let mut poll = mio::Poll::new()?;
    let mut events = mio::Events::with_capacity(128);
    let mut ssdp = Service::new(
        root,
        Config::default().with_log_level(log::LevelFilter::Debug),
        poll.registry(),
        (SSDP_TOKEN1, SSDP_TOKEN2),
    )?;
    for netif in ssdp.engine().interfaces() {
        println!("answering on {}", netif.address);
    }

    loop {
        poll.poll(&mut events, None)?;

        for event in &events {
            match event.token() {
                SSDP_TOKEN1 => ssdp.multicast_ready(event),
                SSDP_TOKEN2 => ssdp.search_ready(event),
                _ => (),
            }
        }
    }
}
