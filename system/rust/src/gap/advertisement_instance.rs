//! Ownership of a running advertisement

use std::fmt;

use crate::core::shared_box::WeakBox;

use super::{AdvertisementId, AdvertisingManager, INVALID_ADVERTISEMENT_ID};

/// Owns one advertisement: dropping (or overwriting) a non-empty instance
/// stops it. Moving the instance moves the ownership with it.
#[derive(Default)]
pub struct AdvertisementInstance {
    id: AdvertisementId,
    owner: Option<WeakBox<AdvertisingManager>>,
}

impl AdvertisementInstance {
    pub(super) fn new(id: AdvertisementId, owner: WeakBox<AdvertisingManager>) -> Self {
        Self { id, owner: Some(owner) }
    }

    /// The advertisement owned, or INVALID_ADVERTISEMENT_ID if empty
    pub fn id(&self) -> AdvertisementId {
        self.id
    }

    /// Whether this instance owns an advertisement
    pub fn is_empty(&self) -> bool {
        self.owner.is_none()
    }
}

impl fmt::Debug for AdvertisementInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdvertisementInstance").field("id", &self.id).finish()
    }
}

impl Drop for AdvertisementInstance {
    fn drop(&mut self) {
        let Some(owner) = self.owner.take() else {
            return;
        };
        let id = std::mem::replace(&mut self.id, INVALID_ADVERTISEMENT_ID);
        owner.with(|manager| {
            if let Some(manager) = manager {
                manager.stop_advertising(id);
            }
        });
    }
}
