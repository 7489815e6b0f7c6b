//! Structural adapter: finds and calls host operations by the shape of their signatures rather
//! than their names, so the same bridge works across host API revisions.

pub mod coerce;
pub mod composite;
pub mod identity;
pub mod resolve;
pub mod signature;
pub mod widget;

pub use composite::CompositeRebuilder;
pub use resolve::{CapabilityResolver, ResolvedCapability};
pub use signature::{CapabilityRequest, ParamConstraint, ReturnConstraint};
