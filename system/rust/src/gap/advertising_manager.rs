//! Caller-facing advertising API. Each started advertisement is named by an
//! AdvertisementId and owned by an AdvertisementInstance; dropping the
//! instance stops the advertisement.

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use log::{debug, info, warn};

use crate::{
    core::{
        address::{AddressType, AddressWithType},
        advertising_data::AdvertisingData,
        shared_box::{SharedBox, WeakBox},
    },
    hci::{
        advertiser::{self, AdvertisingOptions, LowEnergyAdvertiser},
        connection::LowEnergyConnection,
        error::{HostError, Result},
        ids::AdvertisingHandle,
    },
};

use super::{
    address_delegate::LocalAddressDelegate, AdvertisementId, AdvertisementInstance,
    AdvertisingInterval,
};

/// Invoked when a peer connects to a connectable advertisement, which has
/// then been stopped
pub type ConnectionCallback = Box<dyn FnOnce(AdvertisementId, LowEnergyConnection)>;

struct ManagerState {
    advertisements: HashMap<AdvertisementId, AdvertisingHandle>,
    next_id: u64,
}

/// Starts and stops advertisements on behalf of callers, choosing the local
/// address and interval for them
pub struct AdvertisingManager {
    this: WeakBox<AdvertisingManager>,
    advertiser: SharedBox<LowEnergyAdvertiser>,
    address_delegate: Rc<dyn LocalAddressDelegate>,
    state: RefCell<ManagerState>,
}

impl AdvertisingManager {
    /// Constructor
    pub fn new(
        advertiser: SharedBox<LowEnergyAdvertiser>,
        address_delegate: Rc<dyn LocalAddressDelegate>,
    ) -> SharedBox<Self> {
        SharedBox::new_cyclic(|this| Self {
            this,
            advertiser,
            address_delegate,
            state: RefCell::new(ManagerState { advertisements: HashMap::new(), next_id: 1 }),
        })
    }

    /// The advertiser, to deliver incoming connections to
    pub fn advertiser(&self) -> &LowEnergyAdvertiser {
        &self.advertiser
    }

    /// Whether any advertisement is active
    pub fn advertising(&self) -> bool {
        !self.state.borrow().advertisements.is_empty()
    }

    /// Whether the advertisement `id` is active
    pub fn is_advertising(&self, id: AdvertisementId) -> bool {
        self.state.borrow().advertisements.contains_key(&id)
    }

    fn new_advertisement_id(&self) -> AdvertisementId {
        let mut state = self.state.borrow_mut();
        let id = AdvertisementId(state.next_id);
        state.next_id += 1;
        id
    }

    /// Start advertising `data`, and `scan_rsp` if it is not empty.
    ///
    /// The advertisement is connectable iff `connect_callback` is set, and
    /// stops at the first connection. `address_type` overrides the privacy
    /// policy when choosing the local address.
    ///
    /// `status_callback` receives the instance owning the advertisement, or an
    /// empty instance and the error.
    #[allow(clippy::too_many_arguments)]
    pub fn start_advertising(
        &self,
        data: AdvertisingData,
        scan_rsp: AdvertisingData,
        connect_callback: Option<ConnectionCallback>,
        interval: AdvertisingInterval,
        extended_pdu: bool,
        anonymous: bool,
        include_tx_power_level: bool,
        address_type: Option<AddressType>,
        status_callback: impl FnOnce(AdvertisementInstance, Result<()>) + 'static,
    ) {
        if connect_callback.is_some() && anonymous {
            warn!("advertisement cannot be both connectable and anonymous");
            status_callback(
                AdvertisementInstance::default(),
                Err(HostError::InvalidParameters.into()),
            );
            return;
        }

        let interval = interval.range_for(connect_callback.is_some());
        let options = AdvertisingOptions {
            extended_pdu,
            anonymous,
            include_tx_power_level,
            ..AdvertisingOptions::new(interval)
        };

        // reserved up front so the connection callback can carry it
        let id = self.new_advertisement_id();
        let connect_callback =
            connect_callback.map(|callback| self.wrap_connect_callback(id, callback));

        let this = self.this.clone();
        self.address_delegate.ensure_local_address(
            address_type,
            Box::new(move |address: AddressWithType| {
                this.with(|manager| {
                    let Some(manager) = manager else {
                        warn!("advertising manager dropped before {id:?} could start");
                        status_callback(
                            AdvertisementInstance::default(),
                            Err(HostError::Failed.into()),
                        );
                        return;
                    };
                    let this = manager.this.clone();
                    manager.advertiser.start_advertising(
                        address,
                        &data,
                        &scan_rsp,
                        options,
                        connect_callback,
                        move |result| match result {
                            Ok(handle) => this.with(|manager| match manager {
                                Some(manager) => {
                                    manager.on_advertisement_started(id, handle);
                                    status_callback(
                                        AdvertisementInstance::new(id, manager.downgrade()),
                                        Ok(()),
                                    );
                                }
                                None => status_callback(
                                    AdvertisementInstance::default(),
                                    Err(HostError::Failed.into()),
                                ),
                            }),
                            Err(err) => {
                                warn!("failed to start {id:?}: {err}");
                                status_callback(AdvertisementInstance::default(), Err(err.error))
                            }
                        },
                    );
                })
            }),
        );
    }

    fn wrap_connect_callback(
        &self,
        id: AdvertisementId,
        callback: ConnectionCallback,
    ) -> advertiser::ConnectionCallback {
        let this = self.this.clone();
        Box::new(move |link: LowEnergyConnection| {
            this.with(|manager| {
                if let Some(manager) = manager {
                    manager.on_incoming_connection(id);
                }
            });
            callback(id, link)
        })
    }

    fn on_advertisement_started(&self, id: AdvertisementId, handle: AdvertisingHandle) {
        info!("started {id:?} on {handle:?}");
        if let Some(old) = self.state.borrow_mut().advertisements.insert(id, handle) {
            warn!("{id:?} was already bound to {old:?}");
        }
    }

    fn on_incoming_connection(&self, id: AdvertisementId) {
        // the advertiser has already stopped the advertisement
        if self.state.borrow_mut().advertisements.remove(&id).is_none() {
            debug!("connection for {id:?}, which is no longer active");
        }
    }

    /// Stop the advertisement `id`. Returns false if it is not active.
    pub fn stop_advertising(&self, id: AdvertisementId) -> bool {
        let Some(handle) = self.state.borrow_mut().advertisements.remove(&id) else {
            return false;
        };
        info!("stopping {id:?} on {handle:?}");
        self.advertiser.stop_advertising(handle);
        true
    }
}
