// src/extractors/mod.rs
pub mod primary;
pub mod secondary;

// Re-export key adapter types for convenience
#[allow(unused_imports)]
pub use primary::{PrimaryAdapter, PrimaryUnit};
#[allow(unused_imports)]
pub use secondary::{SecondaryAdapter, SecondaryLine};
