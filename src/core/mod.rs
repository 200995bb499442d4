// Public modules
pub mod collector;
pub mod config;
pub mod deps;
pub mod distro;
pub mod error;
pub mod image;
pub mod install;
pub mod layout;
pub mod logging;
pub mod packages;
pub mod pipeline;
pub mod prepare;
pub mod remote;
pub mod ssh;
pub mod workspace;

// Re-export common types for convenience
pub use distro::Distro;
pub use error::{Error, ErrorCode, Result};
pub use layout::CacheLayout;
pub use remote::{CommandOutput, RemoteHost};
pub use ssh::SshHost;
