//! The caller-facing side of LE advertising: advertisement ids, interval
//! policy, local address selection, and the manager that ties them to the
//! advertiser.

use crate::hci::command::AdvertisingIntervalRange;

pub mod address_delegate;
pub mod advertisement_instance;
pub mod advertising_manager;
pub mod mocks;

pub use advertisement_instance::AdvertisementInstance;
pub use advertising_manager::AdvertisingManager;

/// Identifies an advertisement to callers of the AdvertisingManager. Unlike
/// an AdvertisingHandle, it is never reused.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AdvertisementId(pub u64);

/// Denotes "no advertisement"
pub const INVALID_ADVERTISEMENT_ID: AdvertisementId = AdvertisementId(0);

impl AdvertisementId {
    /// Whether this names an advertisement
    pub fn is_valid(&self) -> bool {
        *self != INVALID_ADVERTISEMENT_ID
    }
}

/// Advertising interval classes (5.3 Vol 3C Appendix A), in units of 0.625ms
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdvertisingInterval {
    /// 30ms to 60ms, for user-initiated connectable advertising
    Fast1,
    /// 100ms to 150ms
    Fast2,
    /// 1s to 1.2s, for background advertising
    Slow,
}

const FAST1_INTERVAL: AdvertisingIntervalRange = AdvertisingIntervalRange::new(0x0030, 0x0060);
const FAST2_INTERVAL: AdvertisingIntervalRange = AdvertisingIntervalRange::new(0x00A0, 0x00F0);
const SLOW_INTERVAL: AdvertisingIntervalRange = AdvertisingIntervalRange::new(0x0640, 0x0780);

impl AdvertisingInterval {
    /// The controller interval bounds for this class
    pub fn range(self) -> AdvertisingIntervalRange {
        match self {
            AdvertisingInterval::Fast1 => FAST1_INTERVAL,
            AdvertisingInterval::Fast2 => FAST2_INTERVAL,
            AdvertisingInterval::Slow => SLOW_INTERVAL,
        }
    }

    /// The bounds to use for an advertisement. Some controllers reject
    /// non-connectable advertising at FAST1 timing, so it gets FAST2.
    pub fn range_for(self, connectable: bool) -> AdvertisingIntervalRange {
        match self {
            AdvertisingInterval::Fast1 if !connectable => FAST2_INTERVAL,
            _ => self.range(),
        }
    }
}
