#![deny(clippy::mod_module_files)]
//! Normalized client-side cache of remote resources.
//!
//! A [`store::Store`] keeps one immutable snapshot per resource. Commands on
//! a [`client::Resource`] apply an optimistic transition, send one request
//! through a [`transport::Transport`] and apply its completion when it
//! arrives. Associations between resources keep denormalized foreign keys
//! correct as entities are created, moved and destroyed.

pub mod association;
pub mod client;
pub mod config;
pub mod definition;
pub mod endpoint;
pub mod engine;
pub mod error;
pub mod guard;
pub mod key;
pub mod query;
pub mod replay;
pub mod state;
pub mod status;
pub mod store;
pub mod transport;
pub mod warning;

pub use client::{Client, Dispatch, Resource};
pub use config::SyncConfig;
pub use definition::ResourceDefinition;
pub use error::{Error, Result};
pub use store::Store;
