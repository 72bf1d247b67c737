//! Foreign-key propagation between independently defined resources.
//!
//! An owner resource stores keys of an associated resource in one of its
//! attributes. When an associated entity is created, moved to another owner,
//! or destroyed, the owner's cached copy is fixed up to match.

mod descriptor;
mod propagate;
mod registry;

pub use descriptor::{AssociationDescriptor, Cardinality};
pub use propagate::{propagate, Propagation};
pub use registry::AssociationRegistry;
