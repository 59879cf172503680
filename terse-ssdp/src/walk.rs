//! Choosing which nodes answer a search
//!
//! Traversal is depth-first and pre-order: a device comes before its
//! services, and those come before its embedded devices.

use crate::classify::Dispatch;
use crate::tree::DeviceTree;

/// Call `visit` once for every node that should answer `dispatch`
///
/// Stops at the first error from `visit`, and returns it.
///
/// # Errors
///
/// Passes on errors from `visit`.
pub fn walk<T, E, F>(
    tree: &T,
    dispatch: &Dispatch<T::Node>,
    mut visit: F,
) -> Result<(), E>
where
    T: DeviceTree,
    F: FnMut(T::Node) -> Result<(), E>,
{
    match dispatch {
        Dispatch::Root { all: false, .. } => visit(tree.root()),
        Dispatch::Device {
            node, all: false, ..
        } => visit(*node),
        Dispatch::Root { all: true, .. } => {
            walk_all(tree, tree.root(), &mut visit)
        }
        Dispatch::Device {
            node, all: true, ..
        } => walk_all(tree, *node, &mut visit),
        Dispatch::TypeMatch { urn } => {
            walk_type(tree, tree.root(), urn, &mut visit)
        }
    }
}

fn walk_all<T, E, F>(tree: &T, node: T::Node, visit: &mut F) -> Result<(), E>
where
    T: DeviceTree,
    F: FnMut(T::Node) -> Result<(), E>,
{
    visit(node)?;
    for service in tree.services(node) {
        visit(service)?;
    }
    for device in tree.devices(node) {
        walk_all(tree, device, visit)?;
    }
    Ok(())
}

fn walk_type<T, E, F>(
    tree: &T,
    node: T::Node,
    urn: &str,
    visit: &mut F,
) -> Result<(), E>
where
    T: DeviceTree,
    F: FnMut(T::Node) -> Result<(), E>,
{
    if tree.matches_type(node, urn) {
        visit(node)?;
    }
    for service in tree.services(node) {
        if tree.matches_type(service, urn) {
            visit(service)?;
        }
    }
    for device in tree.devices(node) {
        walk_type(tree, device, urn, visit)?;
    }
    Ok(())
}
