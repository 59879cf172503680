use std::error::Error;
use std::net::Ipv4Addr;
use terse_ssdp::config::DEFAULT_SEARCH_TIMEOUT;
use terse_ssdp::search::{search, Discovery};
use terse_ssdp::Config;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    println!(
        "search from {} {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let search_target = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "upnp:rootdevice".to_string());

    search(
        &search_target,
        |m| {
            if let Some(d) = Discovery::from_message(m) {
                let indent = match (d.description.is_root(), d.is_service()) {
                    (true, _) => "",
                    (false, false) => "  ",
                    (false, true) => "    ",
                };
                println!("{indent}+ {}", d.description.name);
                println!(
                    "{indent}  {} at {}",
                    d.unique_service_name, d.location
                );
            }
        },
        Ipv4Addr::UNSPECIFIED,
        DEFAULT_SEARCH_TIMEOUT,
        true,
        &Config::default(),
    )?;
    Ok(())
}
