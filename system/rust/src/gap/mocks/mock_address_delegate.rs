//! Fake implementation of LocalAddressDelegate for use in test

use std::cell::{Cell, RefCell};

use log::info;

use crate::{
    core::address::{AddressType, AddressWithType},
    gap::address_delegate::{select_local_address, LocalAddressCallback, LocalAddressDelegate},
};

/// Public address the fake starts with
pub const FAKE_IDENTITY_ADDRESS: AddressWithType =
    AddressWithType::new([0x01, 0x00, 0x00, 0x00, 0x00, 0x00], AddressType::Public);
/// Random address the fake starts with
pub const FAKE_RANDOM_ADDRESS: AddressWithType =
    AddressWithType::new([0x55, 0x44, 0x33, 0x22, 0x11, 0xc0], AddressType::Random);

/// Answers every request immediately with the configured addresses, and
/// records what was requested. Privacy starts disabled.
pub struct FakeLocalAddressDelegate {
    identity: Cell<AddressWithType>,
    local: Cell<AddressWithType>,
    privacy: Cell<bool>,
    requests: RefCell<Vec<Option<AddressType>>>,
}

impl FakeLocalAddressDelegate {
    /// Constructor
    pub fn new() -> Self {
        Self {
            identity: Cell::new(FAKE_IDENTITY_ADDRESS),
            local: Cell::new(FAKE_RANDOM_ADDRESS),
            privacy: Cell::new(false),
            requests: RefCell::new(vec![]),
        }
    }

    /// Turn LE privacy on or off
    pub fn enable_privacy(&self, enabled: bool) {
        self.privacy.set(enabled)
    }

    /// Replace the identity address
    pub fn set_identity_address(&self, address: AddressWithType) {
        self.identity.set(address)
    }

    /// Replace the random address handed out when privacy applies
    pub fn set_local_address(&self, address: AddressWithType) {
        self.local.set(address)
    }

    /// Every requested address type, in order
    pub fn requests(&self) -> Vec<Option<AddressType>> {
        self.requests.borrow().clone()
    }
}

impl Default for FakeLocalAddressDelegate {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalAddressDelegate for FakeLocalAddressDelegate {
    fn identity_address(&self) -> AddressWithType {
        self.identity.get()
    }

    fn privacy_enabled(&self) -> bool {
        self.privacy.get()
    }

    fn ensure_local_address(&self, requested: Option<AddressType>, callback: LocalAddressCallback) {
        self.requests.borrow_mut().push(requested);
        let address =
            select_local_address(requested, self.privacy.get(), self.identity.get(), self.local.get());
        info!("fake delegate returning {address:?}");
        callback(address)
    }
}
