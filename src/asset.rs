//! Loading the launcher's cape: finding its bytes, checking them, and registering them with the
//! host as a texture that survives until a different cape is chosen.

pub mod cache;
pub mod pipeline;
pub mod source;
pub mod verify;

pub use cache::CapeCache;
pub use pipeline::{LoadError, RegisteredTexture, Registrar, TexturePipeline};
pub use source::CapeSource;
pub use verify::{SignatureGate, Tier};
