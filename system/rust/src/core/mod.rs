//! Shared data-types and utility methods go here.

pub mod address;
pub mod advertising_data;
pub mod logging;
pub mod shared_box;
pub mod sysprop;
