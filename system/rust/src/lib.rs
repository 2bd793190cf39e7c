//! LE advertising control plane. Turns requests to advertise into ordered
//! batches of HCI commands, tracks the advertising sets that are live, and
//! routes incoming connections back to whoever advertised.
//!
//! Everything runs on one thread. GlobalModuleRegistry owns that thread's
//! event loop; other threads reach the modules through do_in_rust_thread.

use std::{rc::Rc, sync::Mutex};

use anyhow::{anyhow, bail, Context, Result};
use log::{info, warn};
use tokio::{runtime::Builder, sync::mpsc, task::LocalSet};

pub mod core;
pub mod gap;
pub mod hci;
pub mod utils;

use crate::{
    core::sysprop::{get_i32, PropertyI32},
    gap::{address_delegate::LocalAddressDelegate, AdvertisingManager},
    hci::{
        advertiser::LowEnergyAdvertiser, command_builder::ExtendedCommandBuilder,
        transport::HciTransport,
    },
};

/// The owner of the thread on which all advertising modules run
pub struct GlobalModuleRegistry {
    task_tx: MainThreadTx,
}

/// The modules reachable from outside the Rust thread
pub struct ModuleViews<'a> {
    /// Starts and stops advertisements
    pub advertising_manager: &'a AdvertisingManager,
}

static GLOBAL_MODULE_REGISTRY: Mutex<Option<GlobalModuleRegistry>> = Mutex::new(None);

fn controller_limit(prop: PropertyI32) -> Result<usize> {
    let value = get_i32(prop);
    usize::try_from(value).with_context(|| format!("invalid value {value} for {prop:?}"))
}

impl GlobalModuleRegistry {
    /// Bring up the advertising modules and serve posted tasks until stop()
    /// is called. Blocks the calling thread, which becomes the Rust thread.
    pub fn start(
        transport: Rc<dyn HciTransport>,
        address_delegate: Rc<dyn LocalAddressDelegate>,
    ) -> Result<()> {
        crate::core::logging::init_logging();
        info!("starting advertising modules");

        let max_advertisements = controller_limit(PropertyI32::LeMaxAdvertisingSets)?;
        let max_advertising_data_length =
            controller_limit(PropertyI32::LeMaxAdvertisingDataLength)?;

        let rt = Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to start tokio runtime")?;
        let local = LocalSet::new();

        let (tx, mut rx) = mpsc::unbounded_channel::<BoxedMainThreadCallback>();
        {
            let mut registry =
                GLOBAL_MODULE_REGISTRY.lock().map_err(|_| anyhow!("module registry poisoned"))?;
            // initialization should only happen once
            if registry.is_some() {
                bail!("advertising modules already started");
            }
            *registry = Some(Self { task_tx: tx });
        }

        local.block_on(&rt, async {
            let advertiser = LowEnergyAdvertiser::new(
                transport,
                Box::new(ExtendedCommandBuilder::new(max_advertisements)),
                max_advertising_data_length,
            );
            let advertising_manager = AdvertisingManager::new(advertiser, address_delegate);

            let mut modules = ModuleViews { advertising_manager: &advertising_manager };

            // This is the core event loop that serializes incoming requests into
            // the Rust thread. do_in_rust_thread lets us post into here from
            // foreign threads.
            info!("starting Tokio event loop");
            while let Some(f) = rx.recv().await {
                f(&mut modules)
            }
        });
        warn!("Rust thread queue has stopped, shutting down executor thread");
        Ok(())
    }

    /// Whether start() has registered the Rust thread
    pub fn is_running() -> bool {
        GLOBAL_MODULE_REGISTRY.lock().map_or(false, |registry| registry.is_some())
    }

    /// Ask the Rust thread to finish the tasks already posted and exit
    pub fn stop() -> Result<()> {
        let mut registry =
            GLOBAL_MODULE_REGISTRY.lock().map_err(|_| anyhow!("module registry poisoned"))?;
        registry.take().context("advertising modules not started")?;
        Ok(())
    }
}

type BoxedMainThreadCallback = Box<dyn for<'a> FnOnce(&'a mut ModuleViews) + Send + 'static>;
type MainThreadTx = mpsc::UnboundedSender<BoxedMainThreadCallback>;

/// Posts a callback to the Rust thread and gives it access to the public
/// modules.
///
/// Do not call this from the Rust thread itself. Modules there receive
/// references to the modules they depend on at startup.
pub fn do_in_rust_thread<F>(f: F) -> Result<()>
where
    F: for<'a> FnOnce(&'a mut ModuleViews) + Send + 'static,
{
    let registry =
        GLOBAL_MODULE_REGISTRY.lock().map_err(|_| anyhow!("module registry poisoned"))?;
    let registry = registry.as_ref().context("advertising modules not started")?;
    registry.task_tx.send(Box::new(f)).map_err(|_| anyhow!("Rust thread has stopped"))
}
