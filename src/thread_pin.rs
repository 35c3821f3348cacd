// Thread pinning
//
// Window-system and driver calls must all come from one OS thread. The first
// `ThreadPin::acquire` records that thread for the rest of the process; the
// token it returns is !Send, so anything that takes `&ThreadPin` can only run
// there.

use anyhow::{ensure, Result};
use std::marker::PhantomData;
use std::sync::OnceLock;
use std::thread::{self, ThreadId};

static OWNER: OnceLock<ThreadId> = OnceLock::new();

/// Proof that the current thread owns the window and the GPU context.
#[derive(Debug)]
pub struct ThreadPin {
    _not_send: PhantomData<*const ()>,
}

impl ThreadPin {
    /// Pin the calling thread, or confirm it is the already-pinned one.
    pub fn acquire() -> Result<Self> {
        pin(&OWNER, thread::current().id())?;
        log::debug!("Pinned owner thread {:?}", thread::current().id());
        Ok(Self {
            _not_send: PhantomData,
        })
    }
}

fn pin(slot: &OnceLock<ThreadId>, current: ThreadId) -> Result<()> {
    let owner = *slot.get_or_init(|| current);
    ensure!(
        owner == current,
        "window and GPU context are pinned to thread {:?}, called from {:?}",
        owner,
        current
    );
    Ok(())
}
