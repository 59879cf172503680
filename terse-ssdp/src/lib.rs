//! A terse variant of SSDP, for discovering device hierarchies
//!
//! The terse-ssdp crate implements a cut-down relative of the Simple
//! Service Discovery Protocol (SSDP). Devices keep quiet until asked:
//! there are no periodic announcements, and searches are only answered
//! if they carry this protocol's own extension header. Each answer
//! describes one node of a device hierarchy (a root device, its
//! embedded devices, and their services) in a single compact header, so
//! that a searcher can rebuild the hierarchy without fetching any
//! description documents.
//!
//! The crate provides both halves of the protocol:
//!
//!  - a responder, either as the low-level [`Engine`] (which owns a
//!    [`DeviceTree`] but no sockets, and so also suits embedded
//!    systems) or as the mio-based [`Service`] wrapped around it;
//!
//!  - a searcher, [`search::search`], which multicasts one request and
//!    collects answers until the network has been quiet for a while.
//!
//! Searches and answers are plain HTTP-over-UDP text, parsed without
//! allocation by [`Message`].

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

/// Decide whether, and how, to answer a search
pub mod classify;

/// Protocol constants and runtime settings
pub mod config;

pub mod description;

/// The responder core
pub mod engine;

/// Parsing and building datagrams
pub mod message;

pub mod model;

/// Local interface addresses, and choosing between them
pub mod netif;

/// Rendering search responses
pub mod render;

#[cfg(feature = "std")]
pub mod search;

/// The responder, for use with the mio crate
#[cfg(feature = "sync")]
pub mod service;

/// Parsing search targets
pub mod target;

/// The interface between the responder and a device hierarchy
pub mod tree;

/// Traits and implementations for UDP sockets
pub mod udp;

pub mod walk;

pub use classify::{Dispatch, Rejected};
pub use config::Config;
pub use description::Description;
pub use engine::Engine;
pub use message::Message;
pub use model::{Device, RootDevice};
pub use netif::InterfaceAddress;
pub use target::SearchTarget;
pub use tree::{DeviceTree, NodeKind};

#[cfg(feature = "sync")]
pub use service::Service;
