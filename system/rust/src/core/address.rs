//! A device address with type (public / random / classic)

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
/// The type of a device address (see: 5.3 Vol 6B 1.3 Device Address)
pub enum AddressType {
    /// A public LE address
    Public = 0x0,
    /// A random LE address (either random static or private)
    Random = 0x1,
    /// A BR/EDR address. Never valid for advertising.
    BrEdr = 0x2,
}

/// A device address
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub struct AddressWithType {
    /// The 6 address bytes stored in little-endian format
    pub address: [u8; 6],
    /// The address type
    pub address_type: AddressType,
}

impl AddressWithType {
    /// An empty/invalid address
    pub const EMPTY: Self = Self { address: [0, 0, 0, 0, 0, 0], address_type: AddressType::Public };

    /// Constructor
    pub const fn new(address: [u8; 6], address_type: AddressType) -> Self {
        Self { address, address_type }
    }

    /// Whether this address can be used over the LE transport
    pub fn is_le(&self) -> bool {
        !matches!(self.address_type, AddressType::BrEdr)
    }

    /// Whether this is a random LE address
    pub fn is_random(&self) -> bool {
        matches!(self.address_type, AddressType::Random)
    }
}
