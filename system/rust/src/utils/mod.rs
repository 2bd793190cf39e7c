//! Utilities

pub mod advertising;
pub mod owned_handle;
#[cfg(test)]
pub mod task;
