pub mod config;
pub mod content_type;
pub mod fingerprint;
pub mod types;

pub use config::PreviewConfig;
pub use content_type::ContentTypes;
pub use fingerprint::{Fingerprint, FingerprintError};
pub use types::*;
