//! Deriving advertising event properties and data size limits from what the
//! caller asked for, and validating a request against them

use log::warn;

use crate::core::{
    address::AddressWithType,
    advertising_data::{AdvertisingData, TLV_TX_POWER_LEVEL_SIZE},
};

use super::{advertiser::AdvertisingOptions, command::AdvertisingEventProperties, error::HostError};

/// Maximum advertising or scan response data length for legacy PDUs
/// (5.3 Vol 4E 7.8.7)
pub const LEGACY_ADV_DATA_LEN_MAX: usize = 31;

/// Derive the event properties for an advertisement. Directed advertising is
/// never requested.
pub fn advertising_event_properties(
    data: &AdvertisingData,
    scan_rsp: &AdvertisingData,
    options: &AdvertisingOptions,
    connectable: bool,
) -> AdvertisingEventProperties {
    if options.extended_pdu {
        extended_advertising_event_properties(data, scan_rsp, options, connectable)
    } else {
        legacy_advertising_event_properties(data, scan_rsp, options, connectable)
    }
}

fn extended_advertising_event_properties(
    _data: &AdvertisingData,
    scan_rsp: &AdvertisingData,
    options: &AdvertisingOptions,
    connectable: bool,
) -> AdvertisingEventProperties {
    AdvertisingEventProperties {
        connectable,
        scannable: scan_rsp.block_size(false) > 0,
        use_legacy_pdus: !options.extended_pdu,
        anonymous_advertising: options.anonymous,
        include_tx_power: options.include_tx_power_level,
        ..Default::default()
    }
}

fn legacy_advertising_event_properties(
    _data: &AdvertisingData,
    scan_rsp: &AdvertisingData,
    _options: &AdvertisingOptions,
    connectable: bool,
) -> AdvertisingEventProperties {
    let mut properties =
        AdvertisingEventProperties { use_legacy_pdus: true, ..Default::default() };

    // ADV_IND
    if connectable {
        properties.connectable = true;
        properties.scannable = true;
        return properties;
    }

    // ADV_SCAN_IND
    if scan_rsp.block_size(false) > 0 {
        properties.scannable = true;
        return properties;
    }

    // ADV_NONCONN_IND
    properties
}

/// The largest advertising (or scan response) payload allowed for an event
/// with the given properties
pub fn size_limit(
    properties: &AdvertisingEventProperties,
    options: &AdvertisingOptions,
    max_advertising_data_length: usize,
) -> usize {
    if !properties.use_legacy_pdus {
        return max_advertising_data_length;
    }

    // Legacy directed PDUs (ADV_DIRECT_IND) carry no advertising data
    // (5.4 Vol 6B 2.3.1.2)
    if properties.is_directed() {
        return 0;
    }

    // Legacy PDUs have no header field for TX power, so it is carried in the
    // advertising data itself (5.4 Vol 6B 2.3, Figure 2.5)
    if options.include_tx_power_level {
        return LEGACY_ADV_DATA_LEN_MAX - TLV_TX_POWER_LEVEL_SIZE;
    }

    LEGACY_ADV_DATA_LEN_MAX
}

/// Check whether an advertisement can be started with the given payloads and
/// options.
///
/// Panics if given a BR/EDR address.
pub fn can_start_advertising(
    address: &AddressWithType,
    data: &AdvertisingData,
    scan_rsp: &AdvertisingData,
    options: &AdvertisingOptions,
    connectable: bool,
    max_advertising_data_length: usize,
) -> Result<(), HostError> {
    assert!(address.is_le(), "cannot advertise from a BR/EDR address {address:?}");

    if options.anonymous {
        warn!("anonymous advertising not supported");
        return Err(HostError::NotSupported);
    }

    let properties = advertising_event_properties(data, scan_rsp, options, connectable);

    // Extended advertising PDUs cannot be both connectable and scannable
    // (5.4 Vol 4E 7.8.53)
    if !properties.use_legacy_pdus && properties.connectable && properties.scannable {
        warn!("extended advertising pdus cannot be both connectable and scannable");
        return Err(HostError::NotSupported);
    }

    let limit = size_limit(&properties, options, max_advertising_data_length);
    let size = data.block_size(true);
    if size > limit {
        warn!("advertising data too large (actual: {size}, max: {limit})");
        return Err(HostError::AdvertisingDataTooLong);
    }

    let size = scan_rsp.block_size(false);
    if size > limit {
        warn!("scan response too large (actual: {size}, max: {limit})");
        return Err(HostError::ScanResponseTooLong);
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use crate::{
        core::address::AddressType, gap::AdvertisingInterval,
        utils::advertising::fake_advertising_data,
    };

    use super::*;

    const MAX_DATA_LEN: usize = 251;
    const ADDRESS: AddressWithType =
        AddressWithType::new([1, 2, 3, 4, 5, 6], AddressType::Public);

    fn options(extended_pdu: bool) -> AdvertisingOptions {
        AdvertisingOptions {
            extended_pdu,
            ..AdvertisingOptions::new(AdvertisingInterval::Fast1.range())
        }
    }

    #[test]
    fn test_legacy_connectable() {
        let props = advertising_event_properties(
            &AdvertisingData::new(),
            &AdvertisingData::new(),
            &options(false),
            true,
        );

        assert_eq!(
            props,
            AdvertisingEventProperties {
                connectable: true,
                scannable: true,
                use_legacy_pdus: true,
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_legacy_scannable() {
        let props = advertising_event_properties(
            &AdvertisingData::new(),
            &fake_advertising_data(10),
            &options(false),
            false,
        );

        assert!(props.scannable);
        assert!(!props.connectable);
        assert!(props.use_legacy_pdus);
    }

    #[test]
    fn test_legacy_non_connectable() {
        let props = advertising_event_properties(
            &fake_advertising_data(10),
            &AdvertisingData::new(),
            &options(false),
            false,
        );

        assert_eq!(
            props,
            AdvertisingEventProperties { use_legacy_pdus: true, ..Default::default() }
        );
    }

    #[test]
    fn test_legacy_ignores_option_flags() {
        let options = AdvertisingOptions {
            anonymous: true,
            include_tx_power_level: true,
            ..options(false)
        };

        let props = advertising_event_properties(
            &AdvertisingData::new(),
            &AdvertisingData::new(),
            &options,
            false,
        );

        assert!(!props.anonymous_advertising);
        assert!(!props.include_tx_power);
    }

    #[test]
    fn test_extended_properties() {
        let options = AdvertisingOptions {
            anonymous: true,
            include_tx_power_level: true,
            ..options(true)
        };

        let props = advertising_event_properties(
            &AdvertisingData::new(),
            &fake_advertising_data(10),
            &options,
            false,
        );

        assert_eq!(
            props,
            AdvertisingEventProperties {
                scannable: true,
                anonymous_advertising: true,
                include_tx_power: true,
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_extended_empty_scan_response_not_scannable() {
        let props = advertising_event_properties(
            &AdvertisingData::new(),
            &AdvertisingData::new(),
            &options(true),
            true,
        );

        assert!(props.connectable);
        assert!(!props.scannable);
        assert!(!props.use_legacy_pdus);
    }

    #[test]
    fn test_size_limit() {
        let legacy = AdvertisingEventProperties { use_legacy_pdus: true, ..Default::default() };
        let directed = AdvertisingEventProperties { directed: true, ..legacy };
        let with_tx_power = AdvertisingOptions { include_tx_power_level: true, ..options(false) };

        assert_eq!(size_limit(&legacy, &options(false), MAX_DATA_LEN), 31);
        assert_eq!(size_limit(&legacy, &with_tx_power, MAX_DATA_LEN), 28);
        assert_eq!(size_limit(&directed, &options(false), MAX_DATA_LEN), 0);
        assert_eq!(
            size_limit(&AdvertisingEventProperties::default(), &options(true), MAX_DATA_LEN),
            MAX_DATA_LEN
        );
    }

    #[test]
    fn test_can_start_rejects_anonymous() {
        let options = AdvertisingOptions { anonymous: true, ..options(true) };

        let ret = can_start_advertising(
            &ADDRESS,
            &AdvertisingData::new(),
            &AdvertisingData::new(),
            &options,
            false,
            MAX_DATA_LEN,
        );

        assert_eq!(ret, Err(HostError::NotSupported));
    }

    #[test]
    fn test_can_start_rejects_extended_connectable_and_scannable() {
        let ret = can_start_advertising(
            &ADDRESS,
            &AdvertisingData::new(),
            &fake_advertising_data(10),
            &options(true),
            true,
            MAX_DATA_LEN,
        );

        assert_eq!(ret, Err(HostError::NotSupported));
    }

    #[test]
    fn test_can_start_counts_flags_for_data_only() {
        // 28 bytes of data + 3 bytes of flags fills a legacy PDU exactly
        let ok = can_start_advertising(
            &ADDRESS,
            &fake_advertising_data(28),
            &fake_advertising_data(31),
            &options(false),
            false,
            MAX_DATA_LEN,
        );
        let data_too_long = can_start_advertising(
            &ADDRESS,
            &fake_advertising_data(29),
            &AdvertisingData::new(),
            &options(false),
            false,
            MAX_DATA_LEN,
        );
        let scan_rsp_too_long = can_start_advertising(
            &ADDRESS,
            &AdvertisingData::new(),
            &fake_advertising_data(32),
            &options(false),
            false,
            MAX_DATA_LEN,
        );

        assert_eq!(ok, Ok(()));
        assert_eq!(data_too_long, Err(HostError::AdvertisingDataTooLong));
        assert_eq!(scan_rsp_too_long, Err(HostError::ScanResponseTooLong));
    }

    #[test]
    fn test_can_start_tx_power_reduces_legacy_limit() {
        let options = AdvertisingOptions { include_tx_power_level: true, ..options(false) };

        let ret = can_start_advertising(
            &ADDRESS,
            &fake_advertising_data(26),
            &AdvertisingData::new(),
            &options,
            false,
            MAX_DATA_LEN,
        );

        assert_eq!(ret, Err(HostError::AdvertisingDataTooLong));
    }

    #[test]
    #[should_panic]
    fn test_can_start_panics_on_classic_address() {
        let address = AddressWithType::new([1, 2, 3, 4, 5, 6], AddressType::BrEdr);

        let _ = can_start_advertising(
            &address,
            &AdvertisingData::new(),
            &AdvertisingData::new(),
            &options(false),
            false,
            MAX_DATA_LEN,
        );
    }
}
