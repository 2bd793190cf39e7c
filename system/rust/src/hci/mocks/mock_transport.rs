//! Mocked implementation of HciTransport for use in test

use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, HashMap},
};

use async_trait::async_trait;
use log::trace;
use tokio::sync::Notify;

use crate::hci::{
    command::{Command, OpCode},
    error::ErrorCode,
    ids::AdvertisingHandle,
    transport::HciTransport,
};

/// Records every command it is sent. By default every command succeeds
/// immediately; tests can make a command fail, or hold commands in flight
/// until released.
///
/// With `emulate_advertising_sets`, the mock also keeps the controller's view
/// of advertising sets, applying each command as it arrives, and rejects
/// commands the way a controller would.
#[derive(Default)]
pub struct MockHciTransport {
    sent: RefCell<Vec<Command>>,
    failures: RefCell<HashMap<OpCode, ErrorCode>>,
    held: Cell<bool>,
    held_opcode: Cell<Option<OpCode>>,
    released: Notify,
    /// Set handle to whether it is enabled, when emulating
    sets: RefCell<Option<BTreeMap<AdvertisingHandle, bool>>>,
}

impl MockHciTransport {
    /// Constructor
    pub fn new() -> Self {
        Self::default()
    }

    /// Every command sent so far, in order
    pub fn sent_commands(&self) -> Vec<Command> {
        self.sent.borrow().clone()
    }

    /// Return and forget the commands sent so far
    pub fn take_sent_commands(&self) -> Vec<Command> {
        std::mem::take(&mut *self.sent.borrow_mut())
    }

    /// Fail the next command with the given opcode
    pub fn fail_next(&self, opcode: OpCode, status: ErrorCode) {
        self.failures.borrow_mut().insert(opcode, status);
    }

    /// Keep subsequently sent commands in flight until `release_commands`
    pub fn hold_commands(&self) {
        self.held.set(true);
    }

    /// Keep subsequently sent commands with this opcode in flight until
    /// `release_commands`. Other commands complete as usual.
    pub fn hold_opcode(&self, opcode: OpCode) {
        self.held_opcode.set(Some(opcode));
    }

    /// Complete all held commands, and stop holding new ones
    pub fn release_commands(&self) {
        self.held.set(false);
        self.held_opcode.set(None);
        self.released.notify_waiters();
    }

    /// Start tracking advertising sets like a controller, with none created
    pub fn emulate_advertising_sets(&self) {
        *self.sets.borrow_mut() = Some(BTreeMap::new());
    }

    /// The sets the emulated controller holds, and whether each is enabled
    pub fn advertising_sets(&self) -> BTreeMap<AdvertisingHandle, bool> {
        self.sets.borrow().clone().unwrap_or_default()
    }

    fn apply(&self, command: &Command) -> Result<(), ErrorCode> {
        let mut sets = self.sets.borrow_mut();
        let Some(sets) = sets.as_mut() else {
            return Ok(());
        };
        match *command {
            Command::SetExtendedAdvertisingParameters { handle, .. } => {
                if sets.get(&handle) == Some(&true) {
                    return Err(ErrorCode::COMMAND_DISALLOWED);
                }
                sets.insert(handle, false);
            }
            Command::SetExtendedAdvertisingEnable { handle, enable } => {
                *sets.get_mut(&handle).ok_or(ErrorCode::UNKNOWN_ADVERTISING_IDENTIFIER)? = enable;
            }
            Command::RemoveAdvertisingSet { handle } => match sets.get(&handle) {
                None => return Err(ErrorCode::UNKNOWN_ADVERTISING_IDENTIFIER),
                Some(true) => return Err(ErrorCode::COMMAND_DISALLOWED),
                Some(false) => {
                    sets.remove(&handle);
                }
            },
            Command::SetAdvertisingSetRandomAddress { handle, .. }
            | Command::SetExtendedAdvertisingData { handle, .. }
            | Command::SetExtendedScanResponseData { handle, .. } => {
                if !sets.contains_key(&handle) {
                    return Err(ErrorCode::UNKNOWN_ADVERTISING_IDENTIFIER);
                }
            }
            Command::Disconnect { .. } => {}
        }
        Ok(())
    }
}

#[async_trait(?Send)]
impl HciTransport for MockHciTransport {
    async fn send_command(&self, command: Command) -> Result<(), ErrorCode> {
        trace!("mock transport got {command:?}");
        let opcode = command.opcode();
        let failure = self.failures.borrow_mut().remove(&opcode);
        let result = match failure {
            Some(status) => Err(status),
            None => self.apply(&command),
        };
        self.sent.borrow_mut().push(command);
        while self.held.get() || self.held_opcode.get() == Some(opcode) {
            self.released.notified().await;
        }
        result
    }
}
