//! Strongly-typed identifiers for controller-side objects

/// The highest advertising handle the controller accepts (5.3 Vol 4E 7.8.53)
pub const MAX_ADVERTISING_HANDLE: u8 = 0xEF;

/// The handle of an advertising set on the controller
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AdvertisingHandle(pub u8);

/// The handle of an ACL connection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionHandle(pub u16);
