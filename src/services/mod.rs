pub mod types;

#[cfg(feature = "remote")]
pub mod client;

#[cfg(feature = "remote")]
pub use client::*;
pub use types::*;
