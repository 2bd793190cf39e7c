//! Allocation of controller advertising handles

use std::collections::HashMap;

use log::debug;

use crate::core::address::AddressWithType;

use super::ids::{AdvertisingHandle, MAX_ADVERTISING_HANDLE};

/// Maps advertising handles to the address advertised on each. Handles are
/// handed out round-robin, so a handle that was just released is the last to
/// be reused.
#[derive(Debug)]
pub struct AdvertisingHandleMap {
    capacity: u8,
    map: HashMap<AdvertisingHandle, AddressWithType>,
    last_handle: Option<AdvertisingHandle>,
}

impl AdvertisingHandleMap {
    /// Constructor. The capacity is clamped to the number of handles the
    /// protocol allows, and to at least one.
    pub fn new(capacity: usize) -> Self {
        let max = MAX_ADVERTISING_HANDLE as usize + 1;
        let capacity = capacity.clamp(1, max) as u8;
        Self { capacity, map: HashMap::new(), last_handle: None }
    }

    /// Reserve a handle for the given address. Returns None if every handle is
    /// in use.
    pub fn map_handle(&mut self, address: AddressWithType) -> Option<AdvertisingHandle> {
        let handle = self.next_handle()?;
        debug!("mapped {handle:?} to {address:?}");
        self.map.insert(handle, address);
        Some(handle)
    }

    /// The address using the given handle
    pub fn get_address(&self, handle: AdvertisingHandle) -> Option<AddressWithType> {
        self.map.get(&handle).copied()
    }

    /// Release a handle. Releasing a handle not in use does nothing.
    pub fn remove_handle(&mut self, handle: AdvertisingHandle) {
        self.map.remove(&handle);
    }

    /// Number of handles in use
    pub fn size(&self) -> usize {
        self.map.len()
    }

    /// Maximum number of handles in use at once
    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    /// Whether no handles are in use
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// The most recently issued handle
    pub fn last_used_handle(&self) -> Option<AdvertisingHandle> {
        self.last_handle
    }

    fn next_handle(&mut self) -> Option<AdvertisingHandle> {
        if self.size() >= self.capacity() {
            return None;
        }

        let start = self.last_handle.map_or(0, |h| (h.0 as usize + 1) % self.capacity());
        let handle = (0..self.capacity())
            .map(|offset| AdvertisingHandle(((start + offset) % self.capacity()) as u8))
            .find(|handle| !self.map.contains_key(handle))?;

        self.last_handle = Some(handle);
        Some(handle)
    }
}

#[cfg(test)]
mod test {
    use crate::core::address::AddressType;

    use super::*;

    const ADDRESS: AddressWithType =
        AddressWithType::new([1, 2, 3, 4, 5, 6], AddressType::Public);
    const OTHER_ADDRESS: AddressWithType =
        AddressWithType::new([6, 5, 4, 3, 2, 1], AddressType::Random);

    #[test]
    fn test_first_handle_is_zero() {
        let mut map = AdvertisingHandleMap::new(4);

        assert_eq!(map.last_used_handle(), None);
        assert_eq!(map.map_handle(ADDRESS), Some(AdvertisingHandle(0)));
        assert_eq!(map.last_used_handle(), Some(AdvertisingHandle(0)));
    }

    #[test]
    fn test_get_address() {
        let mut map = AdvertisingHandleMap::new(4);
        let handle = map.map_handle(ADDRESS).unwrap();
        let other = map.map_handle(OTHER_ADDRESS).unwrap();

        assert_ne!(handle, other);
        assert_eq!(map.get_address(handle), Some(ADDRESS));
        assert_eq!(map.get_address(other), Some(OTHER_ADDRESS));
        assert_eq!(map.get_address(AdvertisingHandle(3)), None);
    }

    #[test]
    fn test_exhausted() {
        let mut map = AdvertisingHandleMap::new(2);
        map.map_handle(ADDRESS).unwrap();
        map.map_handle(ADDRESS).unwrap();

        assert_eq!(map.map_handle(ADDRESS), None);
        assert_eq!(map.size(), 2);
    }

    #[test]
    fn test_round_robin_reuse() {
        let mut map = AdvertisingHandleMap::new(3);
        let first = map.map_handle(ADDRESS).unwrap();
        map.remove_handle(first);

        // the released handle is only reused after the other handles
        assert_eq!(map.map_handle(ADDRESS), Some(AdvertisingHandle(1)));
        assert_eq!(map.map_handle(ADDRESS), Some(AdvertisingHandle(2)));
        assert_eq!(map.map_handle(ADDRESS), Some(first));
        assert_eq!(map.map_handle(ADDRESS), None);
    }

    #[test]
    fn test_skips_handles_in_use() {
        let mut map = AdvertisingHandleMap::new(3);
        let h0 = map.map_handle(ADDRESS).unwrap();
        let h1 = map.map_handle(ADDRESS).unwrap();
        let h2 = map.map_handle(ADDRESS).unwrap();
        map.remove_handle(h1);

        assert_eq!(map.map_handle(ADDRESS), Some(h1));
        assert_ne!(h0, h2);
    }

    #[test]
    fn test_capacity_one() {
        let mut map = AdvertisingHandleMap::new(1);
        let handle = map.map_handle(ADDRESS).unwrap();
        assert_eq!(map.map_handle(ADDRESS), None);

        map.remove_handle(handle);

        assert_eq!(map.map_handle(ADDRESS), Some(AdvertisingHandle(0)));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut map = AdvertisingHandleMap::new(2);
        let handle = map.map_handle(ADDRESS).unwrap();

        map.remove_handle(handle);
        map.remove_handle(handle);
        map.remove_handle(AdvertisingHandle(1));

        assert!(map.is_empty());
    }

    #[test]
    fn test_capacity_clamped() {
        assert_eq!(AdvertisingHandleMap::new(0).capacity(), 1);
        assert_eq!(AdvertisingHandleMap::new(1000).capacity(), 240);
    }
}
