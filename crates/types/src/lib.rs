//! Shared type definitions for the nodemap workspace.
//!
//! - [`ResourceRecord`] and [`RecordSet`]: inventory items as returned by the
//!   cloud provider, keyed by their opaque id.
//! - [`NodeDescriptor`] and [`NodeSet`]: the normalized output handed to the
//!   host node registry.

mod node;
mod record;

pub use node::{NodeDescriptor, NodeSet};
pub use record::{RecordError, RecordSet, ResourceRecord};
