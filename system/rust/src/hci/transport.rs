//! The seam between the advertiser and whatever carries commands to the
//! controller

use async_trait::async_trait;

use super::{command::Command, error::ErrorCode};

/// Sends commands to the controller, one at a time
#[async_trait(?Send)]
pub trait HciTransport {
    /// Send a command, resolving once the controller has reported its status
    /// (via Command Status or Command Complete)
    async fn send_command(&self, command: Command) -> Result<(), ErrorCode>;
}
