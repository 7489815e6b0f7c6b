//! The bridge's own state outside the host: launcher settings, the cape catalog and the cape
//! picker built from it.

pub mod catalog;
pub mod menu;
pub mod settings;
