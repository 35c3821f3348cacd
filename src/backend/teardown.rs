// Teardown - ordered release of everything the bootstrap created
//
// Each stage registers a release action as soon as its resource exists.
// Dropping the sequencer (or calling `run`) releases exactly what was
// registered, in stage order, so an early `?` in the middle of the bootstrap
// cleans up the partial context the same way a normal shutdown does.

use anyhow::Result;

/// Release order. Variants are listed in the order they are torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    ImageViews,
    Swapchain,
    Surface,
    LogicalDevice,
    DebugMessenger,
    Instance,
}

type ReleaseFn = Box<dyn FnOnce() -> Result<()>>;

struct Registered {
    stage: Stage,
    release: ReleaseFn,
}

#[derive(Default)]
pub struct TeardownSequencer {
    entries: Vec<Registered>,
}

impl TeardownSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the release action for a resource that now exists.
    pub fn register<F>(&mut self, stage: Stage, release: F)
    where
        F: FnOnce() -> Result<()> + 'static,
    {
        log::debug!("Registered {:?} for teardown", stage);
        self.entries.push(Registered {
            stage,
            release: Box::new(release),
        });
    }

    pub fn is_registered(&self, stage: Stage) -> bool {
        self.entries.iter().any(|e| e.stage == stage)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Release everything registered so far. Failures are logged and skipped;
    /// the remaining stages still run.
    pub fn run(&mut self) {
        if self.is_empty() {
            return;
        }

        let mut entries = std::mem::take(&mut self.entries);
        // Within a stage, release the most recently registered first.
        entries.reverse();
        entries.sort_by_key(|e| e.stage);

        for entry in entries {
            log::debug!("Releasing {:?}", entry.stage);
            if let Err(e) = (entry.release)() {
                log::warn!("Failed to release {:?}: {:#}", entry.stage, e);
            }
        }
    }
}

impl Drop for TeardownSequencer {
    fn drop(&mut self) {
        self.run();
    }
}
