//! LE advertising payloads and their AD structure (TLV) encoding

use std::collections::HashMap;

use bitflags::bitflags;
use itertools::Itertools;
use num_traits::clamp;

/// Manufacturer identifier, as assigned by the Bluetooth SIG
pub type ManfId = u16;

// Advertising data types.
const FLAGS: u8 = 0x01;
const COMPLETE_LIST_16_BIT_SERVICE_UUIDS: u8 = 0x03;
const COMPLETE_LOCAL_NAME: u8 = 0x09;
const TX_POWER_LEVEL: u8 = 0x0a;
const SERVICE_DATA_16_BIT_UUID: u8 = 0x16;
const APPEARANCE: u8 = 0x19;
const MANUFACTURER_SPECIFIC_DATA: u8 = 0xff;

/// Largest payload a single AD structure can carry (the length octet covers
/// the type octet too)
const AD_PAYLOAD_LEN_MAX: usize = 254;

/// Encoded size of the flags element: length, type and one octet of flags
pub const FLAGS_SIZE: usize = 3;

/// Encoded size of a TX power level element: length, type and one octet of
/// power
pub const TLV_TX_POWER_LEVEL_SIZE: usize = 3;

bitflags! {
    /// Discoverability and BR/EDR capability flags carried in the leading
    /// flags element of an advertising payload
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct AdvFlags: u8 {
        /// LE Limited Discoverable Mode
        const LE_LIMITED_DISCOVERABLE_MODE = 0x01;
        /// LE General Discoverable Mode
        const LE_GENERAL_DISCOVERABLE_MODE = 0x02;
        /// BR/EDR Not Supported
        const BR_EDR_NOT_SUPPORTED = 0x04;
        /// Simultaneous LE and BR/EDR to Same Device Capable (Controller)
        const SIMULTANEOUS_LE_AND_BR_EDR_CONTROLLER = 0x08;
        /// Simultaneous LE and BR/EDR to Same Device Capable (Host)
        const SIMULTANEOUS_LE_AND_BR_EDR_HOST = 0x10;
    }
}

/// The data to be advertised, or returned in a scan response.
///
/// Encoding is deterministic: elements are always written in the same order,
/// and keyed collections are written sorted by key.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AdvertisingData {
    local_name: Option<String>,
    tx_power: Option<i8>,
    appearance: Option<u16>,
    service_uuids: Vec<u16>,
    service_data: HashMap<u16, Vec<u8>>,
    manufacturer_data: HashMap<ManfId, Vec<u8>>,
}

impl AdvertisingData {
    /// Creates an empty payload
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the complete local name
    pub fn set_local_name(&mut self, name: &str) {
        self.local_name = Some(name.to_string());
    }

    /// The complete local name, if any
    pub fn local_name(&self) -> Option<&str> {
        self.local_name.as_deref()
    }

    /// Sets the advertised TX power level, in dBm
    pub fn set_tx_power(&mut self, dbm: i8) {
        self.tx_power = Some(dbm);
    }

    /// The advertised TX power level, if any
    pub fn tx_power(&self) -> Option<i8> {
        self.tx_power
    }

    /// Sets the appearance value
    pub fn set_appearance(&mut self, appearance: u16) {
        self.appearance = Some(appearance);
    }

    /// Adds a 16-bit service UUID. Duplicates are ignored.
    pub fn add_service_uuid(&mut self, uuid: u16) {
        if !self.service_uuids.contains(&uuid) {
            self.service_uuids.push(uuid);
        }
    }

    /// Sets the service data for a 16-bit service UUID. Returns false if the
    /// data cannot fit in a single element.
    pub fn set_service_data(&mut self, uuid: u16, data: &[u8]) -> bool {
        if data.len() + 2 > AD_PAYLOAD_LEN_MAX {
            return false;
        }
        self.service_data.insert(uuid, data.to_vec());
        true
    }

    /// Sets the manufacturer specific data for a manufacturer. Returns false
    /// if the data cannot fit in a single element.
    pub fn set_manufacturer_data(&mut self, manufacturer: ManfId, data: &[u8]) -> bool {
        if data.len() + 2 > AD_PAYLOAD_LEN_MAX {
            return false;
        }
        self.manufacturer_data.insert(manufacturer, data.to_vec());
        true
    }

    /// The manufacturer specific data for a manufacturer, if any
    pub fn manufacturer_data(&self, manufacturer: ManfId) -> Option<&[u8]> {
        self.manufacturer_data.get(&manufacturer).map(Vec::as_slice)
    }

    /// Whether any element is set
    pub fn is_empty(&self) -> bool {
        self.block_size(false) == 0
    }

    /// Size of the encoded payload. The flags element is only written for
    /// advertising data (never for scan responses), so callers say whether to
    /// count it.
    pub fn block_size(&self, include_flags: bool) -> usize {
        self.write_block(None).len() + if include_flags { FLAGS_SIZE } else { 0 }
    }

    /// Encodes the payload. If `flags` are given, a flags element is written
    /// first.
    pub fn write_block(&self, flags: Option<AdvFlags>) -> Vec<u8> {
        let mut bytes = Vec::<u8>::new();
        if let Some(flags) = flags {
            AdvertisingData::append_adv_data(&mut bytes, FLAGS, &[flags.bits()]);
        }
        if let Some(name) = &self.local_name {
            AdvertisingData::append_adv_data(&mut bytes, COMPLETE_LOCAL_NAME, name.as_bytes());
        }
        if let Some(dbm) = self.tx_power {
            AdvertisingData::append_adv_data(&mut bytes, TX_POWER_LEVEL, &dbm.to_le_bytes());
        }
        if let Some(appearance) = self.appearance {
            AdvertisingData::append_adv_data(&mut bytes, APPEARANCE, &appearance.to_le_bytes());
        }
        AdvertisingData::append_service_uuids(&mut bytes, &self.service_uuids);
        AdvertisingData::append_service_data(&mut bytes, &self.service_data);
        AdvertisingData::append_manufacturer_data(&mut bytes, &self.manufacturer_data);
        bytes
    }

    fn append_adv_data(dest: &mut Vec<u8>, ad_type: u8, ad_payload: &[u8]) {
        let len = clamp(ad_payload.len(), 0, AD_PAYLOAD_LEN_MAX);
        dest.push((len + 1) as u8);
        dest.push(ad_type);
        dest.extend(&ad_payload[..len]);
    }

    fn append_service_uuids(dest: &mut Vec<u8>, uuids: &[u16]) {
        if uuids.is_empty() {
            return;
        }
        let bytes: Vec<u8> = uuids.iter().flat_map(|uuid| uuid.to_le_bytes()).collect();
        AdvertisingData::append_adv_data(dest, COMPLETE_LIST_16_BIT_SERVICE_UUIDS, &bytes);
    }

    fn append_service_data(dest: &mut Vec<u8>, service_data: &HashMap<u16, Vec<u8>>) {
        for (uuid, data) in service_data.iter().sorted() {
            let concated = [&uuid.to_le_bytes()[..], data].concat();
            AdvertisingData::append_adv_data(dest, SERVICE_DATA_16_BIT_UUID, &concated);
        }
    }

    fn append_manufacturer_data(dest: &mut Vec<u8>, manufacturer_data: &HashMap<ManfId, Vec<u8>>) {
        for (m, data) in manufacturer_data.iter().sorted() {
            let concated = [&m.to_le_bytes()[..], data].concat();
            AdvertisingData::append_adv_data(dest, MANUFACTURER_SPECIFIC_DATA, &concated);
        }
    }

    /// Returns a copy with a TX power level element. The value is a
    /// placeholder; lower layers fill in the real power.
    pub fn with_tx_power_placeholder(&self) -> Self {
        let mut data = self.clone();
        data.tx_power = Some(0);
        data
    }
}
