//! The LE advertiser: turns start/stop requests into ordered batches of
//! controller commands, and routes incoming connections back to whoever
//! started the advertisement.
//!
//! Starting an advertisement takes two batches. The first sets the
//! advertising parameters, which is where the advertising handle gets
//! reserved. The second (random address, data, scan response, enable) is only
//! built once the first succeeds. Stopping takes one batch of four commands
//! per handle.
//!
//! Only one operation runs at a time. A start requested while another
//! operation is running waits in a queue. A stop cancels whatever is running
//! and takes over its cleanup.

use std::{
    cell::RefCell,
    collections::{BTreeMap, VecDeque},
    rc::Rc,
};

use log::{debug, info, warn};

use crate::core::{
    address::AddressWithType,
    advertising_data::{AdvFlags, AdvertisingData},
    shared_box::{SharedBox, WeakBox},
};

use super::{
    command::{AdvertisingIntervalRange, Command, OwnAddressType},
    command_builder::AdvertisingCommandBuilder,
    command_runner::SequentialCommandRunner,
    connection::{ConnectionRole, LeConnectionParameters, LowEnergyConnection},
    error::{Error, HostError, Result, StartAdvertisingError},
    event_properties::{advertising_event_properties, can_start_advertising},
    handle_map::AdvertisingHandleMap,
    ids::{AdvertisingHandle, ConnectionHandle},
    transport::HciTransport,
};

/// Invoked with the link when a peer connects to a connectable advertisement
pub type ConnectionCallback = Box<dyn FnOnce(LowEnergyConnection)>;

/// Invoked once with the outcome of a start request
pub type StartAdvertisingCallback =
    Box<dyn FnOnce(std::result::Result<AdvertisingHandle, StartAdvertisingError>)>;

/// How to advertise
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdvertisingOptions {
    /// Advertising interval bounds
    pub interval: AdvertisingIntervalRange,
    /// Flags written at the start of the advertising data
    pub flags: AdvFlags,
    /// Use extended advertising PDUs
    pub extended_pdu: bool,
    /// Advertise without an address (not supported)
    pub anonymous: bool,
    /// Advertise the TX power level
    pub include_tx_power_level: bool,
}

impl AdvertisingOptions {
    /// Options for a general discoverable, legacy PDU advertisement
    pub fn new(interval: AdvertisingIntervalRange) -> Self {
        Self {
            interval,
            flags: AdvFlags::LE_GENERAL_DISCOVERABLE_MODE,
            extended_pdu: false,
            anonymous: false,
            include_tx_power_level: false,
        }
    }
}

/// Payloads held between the two batches of a start
struct StagedParameters {
    data: AdvertisingData,
    scan_rsp: AdvertisingData,
}

/// A validated start request waiting for the running operation to finish
struct PendingStart {
    address: AddressWithType,
    data: AdvertisingData,
    scan_rsp: AdvertisingData,
    options: AdvertisingOptions,
    connect_callback: Option<ConnectionCallback>,
    result_callback: StartAdvertisingCallback,
}

struct StartOperation {
    handle: AdvertisingHandle,
    address: AddressWithType,
    options: AdvertisingOptions,
    connect_callback: Option<ConnectionCallback>,
    result_callback: StartAdvertisingCallback,
}

enum Operation {
    Start(StartOperation),
    Stop { handles: Vec<AdvertisingHandle> },
}

struct AdvertiserState {
    handle_map: AdvertisingHandleMap,
    /// Active advertisements. The callback is None for non-connectable ones.
    connection_callbacks: BTreeMap<AdvertisingHandle, Option<ConnectionCallback>>,
    staged: Option<StagedParameters>,
    current: Option<Operation>,
    pending_starts: VecDeque<PendingStart>,
}

/// Drives advertising sets on the controller
pub struct LowEnergyAdvertiser {
    this: WeakBox<LowEnergyAdvertiser>,
    transport: Rc<dyn HciTransport>,
    runner: SequentialCommandRunner,
    builder: Box<dyn AdvertisingCommandBuilder>,
    max_advertising_data_length: usize,
    state: RefCell<AdvertiserState>,
}

impl LowEnergyAdvertiser {
    /// Constructor. `max_advertising_data_length` is the controller's limit
    /// for extended advertising data.
    pub fn new(
        transport: Rc<dyn HciTransport>,
        builder: Box<dyn AdvertisingCommandBuilder>,
        max_advertising_data_length: usize,
    ) -> SharedBox<Self> {
        let handle_map = AdvertisingHandleMap::new(builder.max_advertisements());
        SharedBox::new_cyclic(|this| Self {
            this,
            runner: SequentialCommandRunner::new(transport.clone()),
            transport,
            builder,
            max_advertising_data_length,
            state: RefCell::new(AdvertiserState {
                handle_map,
                connection_callbacks: BTreeMap::new(),
                staged: None,
                current: None,
                pending_starts: VecDeque::new(),
            }),
        })
    }

    /// How many advertisements can run at once
    pub fn max_advertisements(&self) -> usize {
        self.builder.max_advertisements()
    }

    /// The controller's limit for extended advertising data
    pub fn max_advertising_data_length(&self) -> usize {
        self.max_advertising_data_length
    }

    /// Whether any advertisement is active
    pub fn is_advertising(&self) -> bool {
        !self.state.borrow().connection_callbacks.is_empty()
    }

    /// Whether the advertisement on `handle` is active
    pub fn is_advertising_handle(&self, handle: AdvertisingHandle) -> bool {
        self.state.borrow().connection_callbacks.contains_key(&handle)
    }

    /// Number of advertising handles reserved, including those of
    /// advertisements still starting
    pub fn handles_in_use(&self) -> usize {
        self.state.borrow().handle_map.size()
    }

    /// Start advertising `data` (and `scan_rsp`, if non-empty) from
    /// `address`. If `connect_callback` is set, the advertisement is
    /// connectable, and the callback receives the first incoming link.
    ///
    /// The request is validated immediately; invalid requests fail without a
    /// handle. Otherwise `result_callback` gets the handle once advertising is
    /// enabled, or the error along with the handle it had reserved.
    pub fn start_advertising(
        &self,
        address: AddressWithType,
        data: &AdvertisingData,
        scan_rsp: &AdvertisingData,
        options: AdvertisingOptions,
        connect_callback: Option<ConnectionCallback>,
        result_callback: impl FnOnce(std::result::Result<AdvertisingHandle, StartAdvertisingError>)
            + 'static,
    ) {
        if let Err(err) = can_start_advertising(
            &address,
            data,
            scan_rsp,
            &options,
            connect_callback.is_some(),
            self.max_advertising_data_length,
        ) {
            result_callback(Err(StartAdvertisingError::without_handle(err)));
            return;
        }

        let request = PendingStart {
            address,
            data: data.clone(),
            scan_rsp: scan_rsp.clone(),
            options,
            connect_callback,
            result_callback: Box::new(result_callback),
        };

        {
            let mut state = self.state.borrow_mut();
            if state.current.is_some() {
                debug!("queueing start for {address:?} behind the running operation");
                state.pending_starts.push_back(request);
                return;
            }
        }
        self.begin_start(request);
    }

    /// Returns whether an operation is now running. If not, the request has
    /// already been failed.
    fn begin_start(&self, request: PendingStart) -> bool {
        let PendingStart { address, data, scan_rsp, options, connect_callback, result_callback } =
            request;

        let properties = advertising_event_properties(
            &data,
            &scan_rsp,
            &options,
            connect_callback.is_some(),
        );
        // legacy PDUs carry TX power in the advertising data itself
        let data = if properties.use_legacy_pdus && options.include_tx_power_level {
            data.with_tx_power_placeholder()
        } else {
            data
        };

        let params = {
            let mut state = self.state.borrow_mut();
            let params = self.builder.build_set_advertising_params(
                &mut state.handle_map,
                &address,
                &properties,
                OwnAddressType::from(address.address_type),
                &options.interval,
            );
            if params.is_some() {
                state.staged = Some(StagedParameters { data, scan_rsp });
            }
            params
        };

        let Some(params) = params else {
            warn!("failed to start advertising for {address:?}, no advertising handle available");
            result_callback(Err(StartAdvertisingError::without_handle(HostError::Failed)));
            return false;
        };

        let handle = params.handle;
        self.state.borrow_mut().current = Some(Operation::Start(StartOperation {
            handle,
            address,
            options,
            connect_callback,
            result_callback,
        }));

        // The rest of the setup is only built once the parameters are
        // accepted, since a batch cannot be extended while it runs
        self.runner.queue_command(params.command);
        let this = self.this.clone();
        self.runner.run_commands(move |result| {
            this.with(|advertiser| {
                if let Some(advertiser) = advertiser {
                    advertiser.on_set_advertising_params_complete(handle, result)
                }
            })
        });
        true
    }

    fn take_start_operation(&self, handle: AdvertisingHandle) -> Option<StartOperation> {
        let mut state = self.state.borrow_mut();
        match state.current.take() {
            Some(Operation::Start(op)) if op.handle == handle => Some(op),
            other => {
                state.current = other;
                None
            }
        }
    }

    fn fail_start(&self, op: StartOperation, error: Error) {
        warn!("failed to start advertising (addr: {:?}, handle: {:?}): {error}", op.address, op.handle);
        {
            let mut state = self.state.borrow_mut();
            state.handle_map.remove_handle(op.handle);
            state.staged = None;
        }
        (op.result_callback)(Err(StartAdvertisingError { error, handle: Some(op.handle) }));
        self.on_current_operation_complete();
    }

    fn on_set_advertising_params_complete(&self, handle: AdvertisingHandle, result: Result<()>) {
        if let Err(error) = result {
            if let Some(op) = self.take_start_operation(handle) {
                self.fail_start(op, error);
            }
            return;
        }

        {
            let mut state = self.state.borrow_mut();
            let Some(Operation::Start(op)) = &state.current else {
                return;
            };
            if op.handle != handle {
                return;
            }
            let (address, flags) = (op.address, op.options.flags);
            let Some(staged) = state.staged.take() else {
                return;
            };

            if address.is_random() {
                if let Some(command) =
                    self.builder.build_set_advertising_random_addr(&state.handle_map, handle)
                {
                    self.runner.queue_command(command);
                }
            }
            for command in self.builder.build_set_advertising_data(handle, &staged.data, flags) {
                self.runner.queue_command(command);
            }
            for command in self.builder.build_set_scan_response(handle, &staged.scan_rsp) {
                self.runner.queue_command(command);
            }
            self.runner.queue_command(self.builder.build_enable(handle, true));
        }

        let this = self.this.clone();
        self.runner.run_commands(move |result| {
            this.with(|advertiser| {
                if let Some(advertiser) = advertiser {
                    advertiser.on_enable_complete(handle, result)
                }
            })
        });
    }

    fn on_enable_complete(&self, handle: AdvertisingHandle, result: Result<()>) {
        let Some(op) = self.take_start_operation(handle) else {
            return;
        };
        if let Err(error) = result {
            self.fail_start(op, error);
            return;
        }

        info!("advertising enabled for {handle:?}");
        self.state.borrow_mut().connection_callbacks.insert(handle, op.connect_callback);
        (op.result_callback)(Ok(handle));
        self.on_current_operation_complete();
    }

    fn on_stop_complete(&self, result: Result<()>) {
        {
            let mut state = self.state.borrow_mut();
            match &state.current {
                Some(Operation::Stop { handles }) => {
                    info!("advertising stopped for {handles:?}: {result:?}");
                }
                _ => return,
            }
            state.current = None;
        }
        self.on_current_operation_complete();
    }

    /// Start queued requests until one is running or the queue is empty
    fn on_current_operation_complete(&self) {
        loop {
            let next = {
                let mut state = self.state.borrow_mut();
                if state.current.is_some() {
                    return;
                }
                state.pending_starts.pop_front()
            };
            let Some(next) = next else {
                return;
            };
            if self.begin_start(next) {
                return;
            }
        }
    }

    /// Stop the advertisement on `handle`. Does nothing if it is not active.
    pub fn stop_advertising(&self, handle: AdvertisingHandle) {
        if !self.is_advertising_handle(handle) {
            return;
        }
        self.stop_handles(vec![handle], false);
    }

    /// Stop every active advertisement in a single batch. Starts that are
    /// running or queued are canceled.
    pub fn stop_all_advertising(&self) {
        let handles: Vec<AdvertisingHandle> = {
            let state = self.state.borrow();
            if state.connection_callbacks.is_empty()
                && state.current.is_none()
                && state.pending_starts.is_empty()
            {
                return;
            }
            state.connection_callbacks.keys().copied().collect()
        };
        self.stop_handles(handles, true);
    }

    fn queue_teardown(&self, handle: AdvertisingHandle) {
        self.runner.queue_command(self.builder.build_enable(handle, false));
        self.runner.queue_command(self.builder.build_unset_scan_response(handle));
        self.runner.queue_command(self.builder.build_unset_advertising_data(handle));
        self.runner.queue_command(self.builder.build_remove_advertising_set(handle));
    }

    fn stop_handles(&self, mut handles: Vec<AdvertisingHandle>, cancel_queued_starts: bool) {
        let mut canceled_start = None;
        let mut canceled_queued = vec![];
        // dropped only once the state is released, since they may call back
        // into the advertiser
        let mut dropped_callbacks = vec![];

        {
            let mut state = self.state.borrow_mut();

            let mut carried_handles = vec![];
            let mut carried_commands = vec![];
            if !self.runner.is_ready() || state.current.is_some() {
                let unsent = self.runner.cancel();
                state.staged = None;
                match state.current.take() {
                    Some(Operation::Stop { handles: stopping }) => {
                        // commands that already reached the controller are
                        // not repeated
                        debug!(
                            "canceled teardown of {stopping:?}, carrying over {} commands",
                            unsent.len()
                        );
                        carried_handles = stopping;
                        carried_commands = unsent;
                    }
                    Some(Operation::Start(op)) => {
                        let created = !unsent.iter().any(|command| {
                            matches!(command, Command::SetExtendedAdvertisingParameters { .. })
                        });
                        debug!("canceled start of {:?}, set created: {created}", op.handle);
                        canceled_start = Some((op, created));
                    }
                    None => {}
                }
            }
            if cancel_queued_starts {
                canceled_queued.extend(state.pending_starts.drain(..));
            }

            for &handle in &handles {
                self.queue_teardown(handle);
                state.handle_map.remove_handle(handle);
                if let Some(callback) = state.connection_callbacks.remove(&handle) {
                    dropped_callbacks.push(callback);
                }
            }
            for command in carried_commands {
                self.runner.queue_command(command);
            }
            handles.extend(carried_handles);

            // a set that never finished starting is torn down last, since
            // removing it may fail and end the batch
            if let Some((op, created)) = &canceled_start {
                if *created {
                    self.queue_teardown(op.handle);
                    handles.push(op.handle);
                }
                state.handle_map.remove_handle(op.handle);
            }

            state.current = Some(Operation::Stop { handles });
        }

        let this = self.this.clone();
        self.runner.run_commands(move |result| {
            this.with(|advertiser| {
                if let Some(advertiser) = advertiser {
                    advertiser.on_stop_complete(result)
                }
            })
        });

        drop(dropped_callbacks);
        if let Some((op, _)) = canceled_start {
            (op.result_callback)(Err(StartAdvertisingError {
                error: HostError::Canceled.into(),
                handle: Some(op.handle),
            }));
        }
        for request in canceled_queued {
            (request.result_callback)(Err(StartAdvertisingError::without_handle(
                HostError::Canceled,
            )));
        }
    }

    /// Handle a connection the controller accepted on the advertising set
    /// `advertising_handle`. If that advertisement is active and connectable,
    /// it is stopped and the link goes to its connection callback. Otherwise
    /// the link is disconnected.
    pub fn complete_incoming_connection(
        &self,
        connection_handle: ConnectionHandle,
        role: ConnectionRole,
        local_address: AddressWithType,
        peer_address: AddressWithType,
        conn_params: LeConnectionParameters,
        advertising_handle: AdvertisingHandle,
    ) {
        // If the checks below reject the connection, dropping the link
        // disconnects it
        let link = LowEnergyConnection::new(
            connection_handle,
            local_address,
            peer_address,
            conn_params,
            role,
            self.transport.clone(),
        );

        let callback = {
            let mut state = self.state.borrow_mut();
            let Some(entry) = state.connection_callbacks.get_mut(&advertising_handle) else {
                debug!(
                    "connection received without advertising (role: {role:?}, local address: \
                     {local_address:?}, peer address: {peer_address:?}, connection parameters: \
                     {conn_params:?}, adv handle: {advertising_handle:?})"
                );
                return;
            };
            entry.take()
        };
        let Some(callback) = callback else {
            debug!(
                "connection received when not connectable (role: {role:?}, local address: \
                 {local_address:?}, peer address: {peer_address:?}, connection parameters: \
                 {conn_params:?})"
            );
            return;
        };

        self.stop_advertising(advertising_handle);
        callback(link);
        self.state.borrow_mut().connection_callbacks.remove(&advertising_handle);
    }
}
