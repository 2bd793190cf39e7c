//! Typed LE advertising commands. The byte layout of each command belongs to
//! the transport; only the parameters the advertiser cares about are modeled.

use crate::core::address::AddressType;

use super::{
    error::ErrorCode,
    ids::{AdvertisingHandle, ConnectionHandle},
};

/// An HCI command opcode (OGF << 10 | OCF)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OpCode(pub u16);

#[allow(missing_docs)]
impl OpCode {
    pub const DISCONNECT: Self = Self(0x0406);
    pub const LE_SET_ADVERTISING_SET_RANDOM_ADDRESS: Self = Self(0x2035);
    pub const LE_SET_EXTENDED_ADVERTISING_PARAMETERS: Self = Self(0x2036);
    pub const LE_SET_EXTENDED_ADVERTISING_DATA: Self = Self(0x2037);
    pub const LE_SET_EXTENDED_SCAN_RESPONSE_DATA: Self = Self(0x2038);
    pub const LE_SET_EXTENDED_ADVERTISING_ENABLE: Self = Self(0x2039);
    pub const LE_REMOVE_ADVERTISING_SET: Self = Self(0x203C);
}

/// Advertising interval bounds, in units of 0.625ms
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdvertisingIntervalRange {
    /// Lower bound
    pub min: u16,
    /// Upper bound
    pub max: u16,
}

impl AdvertisingIntervalRange {
    /// Constructor. Bounds are swapped if given in the wrong order.
    pub const fn new(min: u16, max: u16) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }
}

/// The properties of an advertising event, which together select the PDU type
/// used on air (5.3 Vol 4E 7.8.53)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AdvertisingEventProperties {
    /// Peers may connect
    pub connectable: bool,
    /// Peers may send scan requests
    pub scannable: bool,
    /// Only one peer is addressed
    pub directed: bool,
    /// High duty cycle directed connectable advertising (legacy only)
    pub high_duty_cycle_directed_connectable: bool,
    /// Use legacy advertising PDUs
    pub use_legacy_pdus: bool,
    /// Omit the advertiser's address from all PDUs
    pub anonymous_advertising: bool,
    /// Include TX power in the extended header
    pub include_tx_power: bool,
}

impl AdvertisingEventProperties {
    /// Whether this is directed advertising of either duty cycle
    pub fn is_directed(&self) -> bool {
        self.directed || self.high_duty_cycle_directed_connectable
    }
}

impl From<AdvertisingEventProperties> for u16 {
    fn from(p: AdvertisingEventProperties) -> Self {
        let mut props: u16 = 0;
        if p.connectable {
            props |= 0x01;
        }
        if p.scannable {
            props |= 0x02;
        }
        if p.directed {
            props |= 0x04;
        }
        if p.high_duty_cycle_directed_connectable {
            props |= 0x08;
        }
        if p.use_legacy_pdus {
            props |= 0x10;
        }
        if p.anonymous_advertising {
            props |= 0x20;
        }
        if p.include_tx_power {
            props |= 0x40;
        }
        props
    }
}

/// Which address the controller advertises from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OwnAddressType {
    /// The public device address
    Public = 0x00,
    /// The random address configured for the set
    Random = 0x01,
    /// A resolvable private address, falling back to public
    ResolvableOrPublic = 0x02,
    /// A resolvable private address, falling back to random
    ResolvableOrRandom = 0x03,
}

impl From<AddressType> for OwnAddressType {
    fn from(address_type: AddressType) -> Self {
        match address_type {
            AddressType::Random => OwnAddressType::Random,
            AddressType::Public | AddressType::BrEdr => OwnAddressType::Public,
        }
    }
}

/// Where a chunk of advertising or scan response data sits in the full payload
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FragmentOperation {
    /// Neither first nor last
    Intermediate = 0x00,
    /// First of several
    First = 0x01,
    /// Last of several
    Last = 0x02,
    /// The whole payload
    Complete = 0x03,
}

/// Channels 37, 38 and 39
pub const ALL_PRIMARY_CHANNELS: u8 = 0x07;

/// Let the controller pick the TX power
pub const TX_POWER_NO_PREFERENCE: i8 = 0x7f;

/// A command sent to the controller
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// LE Set Extended Advertising Parameters
    SetExtendedAdvertisingParameters {
        /// The advertising set
        handle: AdvertisingHandle,
        /// Event properties, see [`AdvertisingEventProperties`]
        properties: AdvertisingEventProperties,
        /// Primary advertising interval
        interval: AdvertisingIntervalRange,
        /// Own address type
        own_address_type: OwnAddressType,
        /// Primary advertising channel map
        channel_map: u8,
        /// Requested TX power in dBm
        tx_power: i8,
    },
    /// LE Set Advertising Set Random Address
    SetAdvertisingSetRandomAddress {
        /// The advertising set
        handle: AdvertisingHandle,
        /// The random address, little-endian
        address: [u8; 6],
    },
    /// LE Set Extended Advertising Data
    SetExtendedAdvertisingData {
        /// The advertising set
        handle: AdvertisingHandle,
        /// Position of this chunk
        operation: FragmentOperation,
        /// The chunk
        data: Vec<u8>,
    },
    /// LE Set Extended Scan Response Data
    SetExtendedScanResponseData {
        /// The advertising set
        handle: AdvertisingHandle,
        /// Position of this chunk
        operation: FragmentOperation,
        /// The chunk
        data: Vec<u8>,
    },
    /// LE Set Extended Advertising Enable, for a single set
    SetExtendedAdvertisingEnable {
        /// The advertising set
        handle: AdvertisingHandle,
        /// Enable or disable
        enable: bool,
    },
    /// LE Remove Advertising Set
    RemoveAdvertisingSet {
        /// The advertising set
        handle: AdvertisingHandle,
    },
    /// Disconnect
    Disconnect {
        /// The connection to terminate
        connection_handle: ConnectionHandle,
        /// Reason reported to the peer
        reason: ErrorCode,
    },
}

impl Command {
    /// The opcode of this command
    pub fn opcode(&self) -> OpCode {
        match self {
            Command::SetExtendedAdvertisingParameters { .. } => {
                OpCode::LE_SET_EXTENDED_ADVERTISING_PARAMETERS
            }
            Command::SetAdvertisingSetRandomAddress { .. } => {
                OpCode::LE_SET_ADVERTISING_SET_RANDOM_ADDRESS
            }
            Command::SetExtendedAdvertisingData { .. } => OpCode::LE_SET_EXTENDED_ADVERTISING_DATA,
            Command::SetExtendedScanResponseData { .. } => {
                OpCode::LE_SET_EXTENDED_SCAN_RESPONSE_DATA
            }
            Command::SetExtendedAdvertisingEnable { .. } => {
                OpCode::LE_SET_EXTENDED_ADVERTISING_ENABLE
            }
            Command::RemoveAdvertisingSet { .. } => OpCode::LE_REMOVE_ADVERTISING_SET,
            Command::Disconnect { .. } => OpCode::DISCONNECT,
        }
    }

    /// The advertising set this command targets, if any
    pub fn advertising_handle(&self) -> Option<AdvertisingHandle> {
        match self {
            Command::SetExtendedAdvertisingParameters { handle, .. }
            | Command::SetAdvertisingSetRandomAddress { handle, .. }
            | Command::SetExtendedAdvertisingData { handle, .. }
            | Command::SetExtendedScanResponseData { handle, .. }
            | Command::SetExtendedAdvertisingEnable { handle, .. }
            | Command::RemoveAdvertisingSet { handle } => Some(*handle),
            Command::Disconnect { .. } => None,
        }
    }
}
