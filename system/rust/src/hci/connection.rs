//! An LE link accepted while advertising

use std::{fmt, rc::Rc};

use log::{info, warn};
use tokio::task::spawn_local;

use crate::core::address::AddressWithType;

use super::{command::Command, error::ErrorCode, ids::ConnectionHandle, transport::HciTransport};

/// Our role on a link
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionRole {
    /// We initiated the connection
    Central,
    /// The peer connected to us, e.g. in response to advertising
    Peripheral,
}

/// Parameters of an LE link, as reported in the connection complete event
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LeConnectionParameters {
    /// Connection interval, in units of 1.25ms
    pub interval: u16,
    /// Peripheral latency, in connection events
    pub latency: u16,
    /// Supervision timeout, in units of 10ms
    pub supervision_timeout: u16,
}

/// Owns an LE link. Dropping the connection disconnects the link, unless it
/// was released first.
///
/// Must be dropped within a tokio LocalSet.
pub struct LowEnergyConnection {
    handle: ConnectionHandle,
    role: ConnectionRole,
    local_address: AddressWithType,
    peer_address: AddressWithType,
    parameters: LeConnectionParameters,
    transport: Option<Rc<dyn HciTransport>>,
}

impl LowEnergyConnection {
    /// Constructor
    pub fn new(
        handle: ConnectionHandle,
        local_address: AddressWithType,
        peer_address: AddressWithType,
        parameters: LeConnectionParameters,
        role: ConnectionRole,
        transport: Rc<dyn HciTransport>,
    ) -> Self {
        Self { handle, role, local_address, peer_address, parameters, transport: Some(transport) }
    }

    /// The connection handle
    pub fn handle(&self) -> ConnectionHandle {
        self.handle
    }

    /// Our role on the link
    pub fn role(&self) -> ConnectionRole {
        self.role
    }

    /// The address we connected from
    pub fn local_address(&self) -> AddressWithType {
        self.local_address
    }

    /// The peer's address
    pub fn peer_address(&self) -> AddressWithType {
        self.peer_address
    }

    /// The link parameters
    pub fn parameters(&self) -> LeConnectionParameters {
        self.parameters
    }

    /// Give up ownership of the link without disconnecting it
    pub fn release_link(mut self) -> ConnectionHandle {
        self.transport = None;
        self.handle
    }
}

impl fmt::Debug for LowEnergyConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LowEnergyConnection")
            .field("handle", &self.handle)
            .field("role", &self.role)
            .field("local_address", &self.local_address)
            .field("peer_address", &self.peer_address)
            .field("parameters", &self.parameters)
            .field("owned", &self.transport.is_some())
            .finish()
    }
}

impl Drop for LowEnergyConnection {
    fn drop(&mut self) {
        let Some(transport) = self.transport.take() else {
            return;
        };
        let connection_handle = self.handle;
        info!("disconnecting {connection_handle:?}");
        spawn_local(async move {
            let command = Command::Disconnect {
                connection_handle,
                reason: ErrorCode::REMOTE_USER_TERMINATED_CONNECTION,
            };
            if let Err(status) = transport.send_command(command).await {
                warn!("failed to disconnect {connection_handle:?}: {status}");
            }
        });
    }
}
