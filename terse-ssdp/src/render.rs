use crate::config::{DESCRIPTION_HEADER, LOCATION_SIZE};
use crate::message::MessageCursor;
use crate::tree::{DeviceTree, NodeKind};
use core::fmt::Write;
use core::net::Ipv4Addr;

/// Build the response for one node into `buf`
///
/// The location is that of `node` as reached through `interface`, the
/// local address the search arrived on. `search_target` is echoed as the
/// ST header. Anything that doesn't fit is truncated; the output is
/// always NUL-terminated within `buf`. Returns the length written,
/// excluding the terminator.
pub fn render<T: DeviceTree>(
    tree: &T,
    node: T::Node,
    search_target: &str,
    interface: Ipv4Addr,
    buf: &mut [u8],
) -> usize {
    let mut location_buf = [0u8; LOCATION_SIZE];
    let mut location_cursor = MessageCursor::new(&mut location_buf);
    let _ = tree.write_location(node, interface, &mut location_cursor);
    let n = location_cursor.finish();
    let location = core::str::from_utf8(&location_buf[..n]).unwrap_or("");

    let mut cursor = MessageCursor::new(buf);
    let _ = write_response(
        &mut cursor,
        tree,
        node,
        location,
        search_target,
    );
    cursor.finish()
}

fn write_response<T: DeviceTree>(
    w: &mut MessageCursor<'_>,
    tree: &T,
    node: T::Node,
    location: &str,
    search_target: &str,
) -> core::fmt::Result {
    let uuid = tree.uuid(node);
    let name = tree.display_name(node);
    write!(
        w,
        "HTTP/1.1 200 OK\r
CACHE-CONTROL: max-age = 1800\r
LOCATION: {location}\r
ST: {search_target}\r
USN: uuid:{uuid}::{}\r
{DESCRIPTION_HEADER}: ",
        tree.node_type(node),
    )?;
    match tree.kind(node) {
        NodeKind::Root => write!(
            w,
            ":name:{name}:devices:{}:services:{}:",
            tree.devices(node).count(),
            tree.services(node).count(),
        )?,
        NodeKind::EmbeddedDevice { parent } => write!(
            w,
            ":name:{name}:services:{}:puuid:{}:",
            tree.services(node).count(),
            tree.uuid(parent),
        )?,
        NodeKind::Service { parent } => {
            write!(w, ":name:{name}:puuid:{}:", tree.uuid(parent))?;
        }
    }
    w.write_str("\r\n\r\n\r\n")
}
