//! Helpers for building advertising payloads in tests

use crate::core::advertising_data::AdvertisingData;

/// Build advertising data whose encoded size (without flags) is exactly
/// `packed_size` bytes. `packed_size` must be zero or at least 4, the size of
/// the smallest manufacturer data element.
pub fn fake_advertising_data(packed_size: usize) -> AdvertisingData {
    assert!(packed_size == 0 || packed_size >= 4, "cannot pack {packed_size} bytes");
    let mut result = AdvertisingData::new();
    let buffer: Vec<u8> = (0..10).collect();
    let mut bytes_left = packed_size;
    while bytes_left > 0 {
        // Each element takes 10 bytes, unless the element after it (4 bytes
        // minimum) would not fit, in which case this one takes the rest
        let data_bytes = if bytes_left < 14 { bytes_left - 4 } else { 6 };
        assert!(result.set_manufacturer_data(0xb000 + bytes_left as u16, &buffer[..data_bytes]));
        bytes_left = packed_size - result.block_size(false);
    }
    result
}
