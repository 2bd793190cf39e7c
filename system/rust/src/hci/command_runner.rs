//! Runs batches of commands strictly in order, one batch at a time

use std::{
    cell::RefCell,
    collections::VecDeque,
    rc::{Rc, Weak},
};

use log::{debug, warn};
use scopeguard::ScopeGuard;
use tokio::task::spawn_local;

use crate::utils::owned_handle::OwnedHandle;

use super::{
    command::Command,
    error::{HostError, Result},
    transport::HciTransport,
};

/// Invoked once with the outcome of a batch: success, or the first failure
pub type ResultCallback = Box<dyn FnOnce(Result<()>)>;

struct RunnerInner {
    transport: Rc<dyn HciTransport>,
    queued: RefCell<Vec<Command>>,
    /// Commands of the running batch not yet handed to the transport
    unsent: RefCell<VecDeque<Command>>,
    running: RefCell<Option<OwnedHandle<()>>>,
}

impl RunnerInner {
    fn next_command(&self) -> Option<Command> {
        self.unsent.borrow_mut().pop_front()
    }
}

/// Commands are queued with `queue_command` and then sent together by
/// `run_commands`. Each command is only sent once the previous one succeeds;
/// the first failure ends the batch.
///
/// A running batch can be canceled. Commands already handed to the transport
/// complete, but the rest are never sent and the batch callback is dropped
/// without being invoked.
pub struct SequentialCommandRunner {
    inner: Rc<RunnerInner>,
}

impl SequentialCommandRunner {
    /// Constructor
    pub fn new(transport: Rc<dyn HciTransport>) -> Self {
        Self {
            inner: Rc::new(RunnerInner {
                transport,
                queued: RefCell::new(vec![]),
                unsent: RefCell::new(VecDeque::new()),
                running: RefCell::new(None),
            }),
        }
    }

    /// Add a command to the next batch
    pub fn queue_command(&self, command: Command) {
        self.inner.queued.borrow_mut().push(command);
    }

    /// Send all queued commands as one batch. The callback runs on a later
    /// tick of the executor, once the batch completes.
    ///
    /// If a batch is already running, the queued commands are discarded and
    /// the callback is invoked immediately with `HostError::Failed`.
    pub fn run_commands(&self, callback: impl FnOnce(Result<()>) + 'static) {
        let commands = std::mem::take(&mut *self.inner.queued.borrow_mut());
        if !self.is_ready() {
            warn!("dropping batch of {} commands, another batch is running", commands.len());
            callback(Err(HostError::Failed.into()));
            return;
        }

        let total = commands.len();
        *self.inner.unsent.borrow_mut() = commands.into();
        let task = spawn_local(run_batch(
            Rc::downgrade(&self.inner),
            self.inner.transport.clone(),
            total,
            Box::new(callback),
        ));
        *self.inner.running.borrow_mut() = Some(task.into());
    }

    /// Cancel the running batch, and discard any queued commands.
    ///
    /// Returns the commands of the running batch that never reached the
    /// transport, in order. The command in flight, if any, is not among them.
    pub fn cancel(&self) -> Vec<Command> {
        self.inner.queued.borrow_mut().clear();
        let unsent: Vec<Command> = self.inner.unsent.borrow_mut().drain(..).collect();
        if let Some(task) = self.inner.running.borrow_mut().take() {
            debug!("canceling running command batch, {} commands unsent", unsent.len());
            drop(task);
        }
        unsent
    }

    /// Whether a new batch can be run, i.e. no batch is running
    pub fn is_ready(&self) -> bool {
        self.inner.running.borrow().as_ref().map_or(true, OwnedHandle::is_finished)
    }

    /// Whether commands are waiting for `run_commands`
    pub fn has_queued_commands(&self) -> bool {
        !self.inner.queued.borrow().is_empty()
    }
}

async fn run_batch(
    runner: Weak<RunnerInner>,
    transport: Rc<dyn HciTransport>,
    total: usize,
    callback: ResultCallback,
) {
    let mut outstanding = scopeguard::guard(total, |outstanding| {
        if outstanding > 0 {
            debug!("command batch canceled with {outstanding} of {total} commands not completed");
        }
    });

    let mut result = Ok(());
    while let Some(command) = runner.upgrade().and_then(|runner| runner.next_command()) {
        let opcode = command.opcode();
        if let Err(status) = transport.send_command(command).await {
            warn!("command {opcode:?} failed with {status}, ending batch");
            result = Err(status.into());
            break;
        }
        *outstanding -= 1;
    }
    ScopeGuard::into_inner(outstanding);

    // release the running slot before the callback, which may start the next
    // batch
    let Some(runner) = runner.upgrade() else {
        return;
    };
    runner.unsent.borrow_mut().clear();
    let task = runner.running.borrow_mut().take();
    if let Some(task) = task {
        task.detach();
    }
    drop(runner);

    callback(result);
}

#[cfg(test)]
mod test {
    use std::cell::Cell;

    use crate::{
        hci::{
            command::OpCode, error::ErrorCode, ids::AdvertisingHandle,
            mocks::mock_transport::MockHciTransport,
        },
        utils::task::{block_on_locally, run_until_idle},
    };

    use super::*;

    fn remove(handle: u8) -> Command {
        Command::RemoveAdvertisingSet { handle: AdvertisingHandle(handle) }
    }

    fn enable(handle: u8) -> Command {
        Command::SetExtendedAdvertisingEnable { handle: AdvertisingHandle(handle), enable: true }
    }

    fn recorder() -> (Rc<RefCell<Vec<Result<()>>>>, impl FnOnce(Result<()>) + 'static) {
        let results = Rc::new(RefCell::new(vec![]));
        let sink = results.clone();
        (results, move |result| sink.borrow_mut().push(result))
    }

    #[test]
    fn test_batch_runs_in_order() {
        block_on_locally(async {
            // arrange
            let transport = Rc::new(MockHciTransport::new());
            let runner = SequentialCommandRunner::new(transport.clone());
            let (results, callback) = recorder();

            // act
            runner.queue_command(enable(1));
            runner.queue_command(remove(2));
            runner.queue_command(remove(3));
            assert!(runner.has_queued_commands());
            runner.run_commands(callback);
            assert!(!runner.has_queued_commands());
            assert!(!runner.is_ready());
            run_until_idle().await;

            // assert
            assert_eq!(transport.sent_commands(), vec![enable(1), remove(2), remove(3)]);
            assert_eq!(*results.borrow(), vec![Ok(())]);
            assert!(runner.is_ready());
        });
    }

    #[test]
    fn test_first_failure_ends_batch() {
        block_on_locally(async {
            // arrange
            let transport = Rc::new(MockHciTransport::new());
            transport.fail_next(OpCode::LE_REMOVE_ADVERTISING_SET, ErrorCode::COMMAND_DISALLOWED);
            let runner = SequentialCommandRunner::new(transport.clone());
            let (results, callback) = recorder();

            // act
            runner.queue_command(enable(1));
            runner.queue_command(remove(1));
            runner.queue_command(enable(2));
            runner.run_commands(callback);
            run_until_idle().await;

            // assert: the command after the failure was never sent
            assert_eq!(transport.sent_commands(), vec![enable(1), remove(1)]);
            assert_eq!(
                *results.borrow(),
                vec![Err(ErrorCode::COMMAND_DISALLOWED.into())]
            );
            assert!(runner.is_ready());
        });
    }

    #[test]
    fn test_empty_batch_succeeds() {
        block_on_locally(async {
            let transport = Rc::new(MockHciTransport::new());
            let runner = SequentialCommandRunner::new(transport.clone());
            let (results, callback) = recorder();

            runner.run_commands(callback);
            run_until_idle().await;

            assert!(transport.sent_commands().is_empty());
            assert_eq!(*results.borrow(), vec![Ok(())]);
        });
    }

    #[test]
    fn test_cancel_drops_rest_of_batch() {
        block_on_locally(async {
            // arrange: hold the first command in flight
            let transport = Rc::new(MockHciTransport::new());
            transport.hold_commands();
            let runner = SequentialCommandRunner::new(transport.clone());
            let (results, callback) = recorder();
            runner.queue_command(enable(1));
            runner.queue_command(remove(1));
            runner.run_commands(callback);
            run_until_idle().await;
            assert_eq!(transport.sent_commands(), vec![enable(1)]);

            // act
            let unsent = runner.cancel();
            transport.release_commands();
            run_until_idle().await;

            // assert: nothing more was sent and the callback never ran
            assert_eq!(unsent, vec![remove(1)]);
            assert_eq!(transport.sent_commands(), vec![enable(1)]);
            assert!(results.borrow().is_empty());
            assert!(runner.is_ready());
        });
    }

    #[test]
    fn test_cancel_discards_queued_commands() {
        let transport = Rc::new(MockHciTransport::new());
        let runner = SequentialCommandRunner::new(transport);

        runner.queue_command(enable(1));
        let unsent = runner.cancel();

        assert!(unsent.is_empty());
        assert!(!runner.has_queued_commands());
        assert!(runner.is_ready());
    }

    #[test]
    fn test_callback_can_run_next_batch() {
        block_on_locally(async {
            // arrange
            let transport = Rc::new(MockHciTransport::new());
            let runner = Rc::new(SequentialCommandRunner::new(transport.clone()));
            let completed = Rc::new(Cell::new(false));

            // act: start a second batch from the first batch's callback
            runner.queue_command(enable(1));
            let weak_runner = Rc::downgrade(&runner);
            let second_completed = completed.clone();
            runner.run_commands(move |result| {
                assert_eq!(result, Ok(()));
                let runner = weak_runner.upgrade().unwrap();
                assert!(runner.is_ready());
                runner.queue_command(remove(1));
                runner.run_commands(move |result| {
                    assert_eq!(result, Ok(()));
                    second_completed.set(true);
                });
            });
            run_until_idle().await;

            // assert
            assert!(completed.get());
            assert_eq!(transport.sent_commands(), vec![enable(1), remove(1)]);
        });
    }

    #[test]
    fn test_run_while_busy_fails() {
        block_on_locally(async {
            // arrange
            let transport = Rc::new(MockHciTransport::new());
            transport.hold_commands();
            let runner = SequentialCommandRunner::new(transport.clone());
            let (first, first_callback) = recorder();
            let (second, second_callback) = recorder();
            runner.queue_command(enable(1));
            runner.run_commands(first_callback);

            // act
            runner.queue_command(enable(2));
            runner.run_commands(second_callback);
            transport.release_commands();
            run_until_idle().await;

            // assert
            assert_eq!(*second.borrow(), vec![Err(HostError::Failed.into())]);
            assert_eq!(*first.borrow(), vec![Ok(())]);
            assert_eq!(transport.sent_commands(), vec![enable(1)]);
        });
    }

    #[test]
    fn test_dropping_runner_discards_callback() {
        block_on_locally(async {
            let transport = Rc::new(MockHciTransport::new());
            let runner = SequentialCommandRunner::new(transport.clone());
            let (results, callback) = recorder();
            runner.queue_command(enable(1));
            runner.run_commands(callback);

            drop(runner);
            run_until_idle().await;

            assert!(results.borrow().is_empty());
        });
    }
}
