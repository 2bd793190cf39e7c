//! Building the commands that configure, enable and tear down an advertising
//! set. Each controller generation gets its own builder; the advertiser only
//! sees the trait.

use crate::core::{
    address::AddressWithType,
    advertising_data::{AdvFlags, AdvertisingData},
};

use super::{
    command::{
        AdvertisingEventProperties, AdvertisingIntervalRange, Command, FragmentOperation,
        OwnAddressType, ALL_PRIMARY_CHANNELS, TX_POWER_NO_PREFERENCE,
    },
    handle_map::AdvertisingHandleMap,
    ids::AdvertisingHandle,
};

/// Largest chunk of advertising or scan response data carried by one
/// extended data command (5.3 Vol 4E 7.8.54)
pub const MAX_EXTENDED_FRAGMENT_LEN: usize = 251;

/// A built parameters command, along with the handle it reserved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetAdvertisingParams {
    /// The command to send
    pub command: Command,
    /// The handle reserved for the advertising set
    pub handle: AdvertisingHandle,
}

/// Builds the commands for one controller generation
pub trait AdvertisingCommandBuilder {
    /// How many advertising sets the controller can run at once
    fn max_advertisements(&self) -> usize;

    /// Reserve a handle for `address` and build the parameters command for
    /// it. Returns None if no handle is available.
    fn build_set_advertising_params(
        &self,
        handle_map: &mut AdvertisingHandleMap,
        address: &AddressWithType,
        properties: &AdvertisingEventProperties,
        own_address_type: OwnAddressType,
        interval: &AdvertisingIntervalRange,
    ) -> Option<SetAdvertisingParams>;

    /// Build the command that sets the random address of an advertising set.
    /// Returns None if the controller manages the address itself.
    fn build_set_advertising_random_addr(
        &self,
        handle_map: &AdvertisingHandleMap,
        handle: AdvertisingHandle,
    ) -> Option<Command>;

    /// Build the commands that write the advertising data, flags first
    fn build_set_advertising_data(
        &self,
        handle: AdvertisingHandle,
        data: &AdvertisingData,
        flags: AdvFlags,
    ) -> Vec<Command>;

    /// Build the commands that write the scan response data
    fn build_set_scan_response(
        &self,
        handle: AdvertisingHandle,
        scan_rsp: &AdvertisingData,
    ) -> Vec<Command>;

    /// Build the command that enables or disables an advertising set
    fn build_enable(&self, handle: AdvertisingHandle, enable: bool) -> Command;

    /// Build the command that clears the advertising data
    fn build_unset_advertising_data(&self, handle: AdvertisingHandle) -> Command;

    /// Build the command that clears the scan response data
    fn build_unset_scan_response(&self, handle: AdvertisingHandle) -> Command;

    /// Build the command that removes an advertising set from the controller
    fn build_remove_advertising_set(&self, handle: AdvertisingHandle) -> Command;
}

/// Builds LE extended advertising commands (5.0+ controllers)
#[derive(Debug)]
pub struct ExtendedCommandBuilder {
    max_advertisements: usize,
}

impl ExtendedCommandBuilder {
    /// Constructor. `max_advertisements` is the number of advertising sets
    /// the controller reports it supports.
    pub fn new(max_advertisements: usize) -> Self {
        Self { max_advertisements }
    }
}

fn fragment(data: &[u8]) -> Vec<(FragmentOperation, Vec<u8>)> {
    let chunks: Vec<&[u8]> = data.chunks(MAX_EXTENDED_FRAGMENT_LEN).collect();
    let last = chunks.len().saturating_sub(1);
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let operation = if chunks.len() == 1 {
                FragmentOperation::Complete
            } else if i == 0 {
                FragmentOperation::First
            } else if i == last {
                FragmentOperation::Last
            } else {
                FragmentOperation::Intermediate
            };
            (operation, chunk.to_vec())
        })
        .collect()
}

impl AdvertisingCommandBuilder for ExtendedCommandBuilder {
    fn max_advertisements(&self) -> usize {
        self.max_advertisements
    }

    fn build_set_advertising_params(
        &self,
        handle_map: &mut AdvertisingHandleMap,
        address: &AddressWithType,
        properties: &AdvertisingEventProperties,
        own_address_type: OwnAddressType,
        interval: &AdvertisingIntervalRange,
    ) -> Option<SetAdvertisingParams> {
        let handle = handle_map.map_handle(*address)?;
        Some(SetAdvertisingParams {
            command: Command::SetExtendedAdvertisingParameters {
                handle,
                properties: *properties,
                interval: *interval,
                own_address_type,
                channel_map: ALL_PRIMARY_CHANNELS,
                tx_power: TX_POWER_NO_PREFERENCE,
            },
            handle,
        })
    }

    fn build_set_advertising_random_addr(
        &self,
        handle_map: &AdvertisingHandleMap,
        handle: AdvertisingHandle,
    ) -> Option<Command> {
        let address = handle_map.get_address(handle).filter(|address| address.is_random())?;
        Some(Command::SetAdvertisingSetRandomAddress { handle, address: address.address })
    }

    fn build_set_advertising_data(
        &self,
        handle: AdvertisingHandle,
        data: &AdvertisingData,
        flags: AdvFlags,
    ) -> Vec<Command> {
        fragment(&data.write_block(Some(flags)))
            .into_iter()
            .map(|(operation, data)| Command::SetExtendedAdvertisingData {
                handle,
                operation,
                data,
            })
            .collect()
    }

    fn build_set_scan_response(
        &self,
        handle: AdvertisingHandle,
        scan_rsp: &AdvertisingData,
    ) -> Vec<Command> {
        fragment(&scan_rsp.write_block(None))
            .into_iter()
            .map(|(operation, data)| Command::SetExtendedScanResponseData {
                handle,
                operation,
                data,
            })
            .collect()
    }

    fn build_enable(&self, handle: AdvertisingHandle, enable: bool) -> Command {
        Command::SetExtendedAdvertisingEnable { handle, enable }
    }

    fn build_unset_advertising_data(&self, handle: AdvertisingHandle) -> Command {
        Command::SetExtendedAdvertisingData {
            handle,
            operation: FragmentOperation::Complete,
            data: vec![],
        }
    }

    fn build_unset_scan_response(&self, handle: AdvertisingHandle) -> Command {
        Command::SetExtendedScanResponseData {
            handle,
            operation: FragmentOperation::Complete,
            data: vec![],
        }
    }

    fn build_remove_advertising_set(&self, handle: AdvertisingHandle) -> Command {
        Command::RemoveAdvertisingSet { handle }
    }
}

#[cfg(test)]
mod test {
    use crate::{core::address::AddressType, utils::advertising::fake_advertising_data};

    use super::*;

    const HANDLE: AdvertisingHandle = AdvertisingHandle(0);
    const PUBLIC_ADDRESS: AddressWithType =
        AddressWithType::new([1, 0, 0, 0, 0, 0], AddressType::Public);
    const RANDOM_ADDRESS: AddressWithType =
        AddressWithType::new([0x55, 0x44, 0x33, 0x22, 0x11, 0x00], AddressType::Random);

    #[test]
    fn test_fragment_single() {
        let fragments = fragment(&[1, 2, 3]);

        assert_eq!(fragments, vec![(FragmentOperation::Complete, vec![1, 2, 3])]);
    }

    #[test]
    fn test_fragment_empty() {
        assert!(fragment(&[]).is_empty());
    }

    #[test]
    fn test_fragment_exact_fit() {
        let fragments = fragment(&[0; MAX_EXTENDED_FRAGMENT_LEN]);

        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].0, FragmentOperation::Complete);
    }

    #[test]
    fn test_fragment_multiple() {
        let data: Vec<u8> = (0..MAX_EXTENDED_FRAGMENT_LEN * 2 + 10).map(|i| i as u8).collect();

        let fragments = fragment(&data);

        let operations: Vec<_> = fragments.iter().map(|(op, _)| *op).collect();
        assert_eq!(
            operations,
            vec![FragmentOperation::First, FragmentOperation::Intermediate, FragmentOperation::Last]
        );
        assert_eq!(fragments[2].1.len(), 10);
        assert_eq!(fragments.into_iter().flat_map(|(_, chunk)| chunk).collect::<Vec<_>>(), data);
    }

    #[test]
    fn test_build_params_reserves_handle() {
        let builder = ExtendedCommandBuilder::new(1);
        let mut handle_map = AdvertisingHandleMap::new(builder.max_advertisements());
        let interval = AdvertisingIntervalRange::new(0x30, 0x60);

        let params = builder
            .build_set_advertising_params(
                &mut handle_map,
                &PUBLIC_ADDRESS,
                &AdvertisingEventProperties::default(),
                OwnAddressType::Public,
                &interval,
            )
            .unwrap();

        assert_eq!(params.handle, HANDLE);
        assert_eq!(handle_map.get_address(HANDLE), Some(PUBLIC_ADDRESS));
        assert!(builder
            .build_set_advertising_params(
                &mut handle_map,
                &PUBLIC_ADDRESS,
                &AdvertisingEventProperties::default(),
                OwnAddressType::Public,
                &interval,
            )
            .is_none());
    }

    #[test]
    fn test_random_addr_only_for_random_addresses() {
        let builder = ExtendedCommandBuilder::new(2);
        let mut handle_map = AdvertisingHandleMap::new(2);
        let public = handle_map.map_handle(PUBLIC_ADDRESS).unwrap();
        let random = handle_map.map_handle(RANDOM_ADDRESS).unwrap();

        assert_eq!(builder.build_set_advertising_random_addr(&handle_map, public), None);
        assert_eq!(
            builder.build_set_advertising_random_addr(&handle_map, random),
            Some(Command::SetAdvertisingSetRandomAddress {
                handle: random,
                address: RANDOM_ADDRESS.address
            })
        );
    }

    #[test]
    fn test_advertising_data_includes_flags() {
        let builder = ExtendedCommandBuilder::new(1);
        let data = fake_advertising_data(20);

        let commands = builder.build_set_advertising_data(
            HANDLE,
            &data,
            AdvFlags::LE_GENERAL_DISCOVERABLE_MODE,
        );

        assert_eq!(
            commands,
            vec![Command::SetExtendedAdvertisingData {
                handle: HANDLE,
                operation: FragmentOperation::Complete,
                data: data.write_block(Some(AdvFlags::LE_GENERAL_DISCOVERABLE_MODE)),
            }]
        );
    }

    #[test]
    fn test_empty_scan_response_builds_nothing() {
        let builder = ExtendedCommandBuilder::new(1);

        assert!(builder.build_set_scan_response(HANDLE, &AdvertisingData::new()).is_empty());
    }

    #[test]
    fn test_large_scan_response_is_fragmented() {
        let builder = ExtendedCommandBuilder::new(1);

        let commands = builder.build_set_scan_response(HANDLE, &fake_advertising_data(300));

        assert_eq!(commands.len(), 2);
        assert!(matches!(
            commands[0],
            Command::SetExtendedScanResponseData { operation: FragmentOperation::First, .. }
        ));
        assert!(matches!(
            commands[1],
            Command::SetExtendedScanResponseData { operation: FragmentOperation::Last, .. }
        ));
    }
}
