//! The controller-facing half of LE advertising: building advertising
//! commands, running them in order, and tracking which advertising sets are
//! live on the controller.

pub mod advertiser;
pub mod command;
pub mod command_builder;
pub mod command_runner;
pub mod connection;
pub mod error;
pub mod event_properties;
pub mod handle_map;
pub mod ids;
pub mod mocks;
pub mod transport;
