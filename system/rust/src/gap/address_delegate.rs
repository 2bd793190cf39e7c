//! Choosing the local address an advertisement is sent from

use log::debug;

use crate::core::{
    address::{AddressType, AddressWithType},
    sysprop::{get_bool, PropertyBool},
};

/// Receives the local address to advertise from
pub type LocalAddressCallback = Box<dyn FnOnce(AddressWithType)>;

/// Supplies local addresses, honoring the privacy policy
pub trait LocalAddressDelegate {
    /// The public (identity) address of this device
    fn identity_address(&self) -> AddressWithType;

    /// Whether LE privacy is enabled
    fn privacy_enabled(&self) -> bool;

    /// Pick a local address and pass it to `callback`. `requested` overrides
    /// the privacy policy when set. The callback may run before this returns.
    fn ensure_local_address(&self, requested: Option<AddressType>, callback: LocalAddressCallback);
}

/// Pick between the identity address and the current random address
pub fn select_local_address(
    requested: Option<AddressType>,
    privacy_enabled: bool,
    identity: AddressWithType,
    random: AddressWithType,
) -> AddressWithType {
    match requested {
        Some(AddressType::Public) => identity,
        Some(AddressType::Random) => random,
        Some(AddressType::BrEdr) | None if privacy_enabled => random,
        Some(AddressType::BrEdr) | None => identity,
    }
}

/// A delegate with a fixed identity address and random address
#[derive(Debug)]
pub struct StaticAddressDelegate {
    identity: AddressWithType,
    random: AddressWithType,
    privacy_enabled: bool,
}

impl StaticAddressDelegate {
    /// Constructor. Privacy follows `bluetooth.core.le.privacy_enabled`.
    pub fn new(identity: AddressWithType, random: AddressWithType) -> Self {
        Self { identity, random, privacy_enabled: get_bool(PropertyBool::LePrivacyEnabled) }
    }
}

impl LocalAddressDelegate for StaticAddressDelegate {
    fn identity_address(&self) -> AddressWithType {
        self.identity
    }

    fn privacy_enabled(&self) -> bool {
        self.privacy_enabled
    }

    fn ensure_local_address(&self, requested: Option<AddressType>, callback: LocalAddressCallback) {
        let address =
            select_local_address(requested, self.privacy_enabled, self.identity, self.random);
        debug!("advertising from {address:?} (requested: {requested:?})");
        callback(address)
    }
}
