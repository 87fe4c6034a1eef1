//! The direct command queue and its fence.

use std::sync::Arc;

use parking_lot::Mutex;
use static_assertions::assert_impl_all;

use crate::backend::GpuBackend;
use crate::command::CommandList;
use crate::error::GraphicsError;
use crate::profiling::{profile_fence, profile_scope};

/// The single GPU queue every frame is submitted to, paired with a monotonic
/// fence.
///
/// Fence values start at 0 and each [`signal`](Self::signal) issues the next
/// integer. A value `v` is complete once the GPU has executed everything
/// submitted before the signal that issued `v`.
///
/// # Thread Safety
///
/// Submissions and signals are serialized by an internal lock, so the order
/// they reach the GPU is the order their calls took the lock.
pub struct CommandQueue {
    backend: Arc<dyn GpuBackend>,
    last_signaled: Mutex<u64>,
}

assert_impl_all!(CommandQueue: Send, Sync);

impl CommandQueue {
    pub fn new(backend: Arc<dyn GpuBackend>) -> Self {
        Self {
            backend,
            last_signaled: Mutex::new(0),
        }
    }

    /// Close every list and submit them in order.
    ///
    /// Each list records the fence value that will cover it (the next value
    /// [`signal`](Self::signal) issues), which is what later gates
    /// [`CommandList::reset`]. Nothing is submitted if any list was already
    /// submitted without a reset.
    pub fn execute_command_lists(
        &self,
        lists: &mut [&mut CommandList],
    ) -> Result<(), GraphicsError> {
        profile_scope!("execute_command_lists");

        let last_signaled = self.last_signaled.lock();
        let covering_fence = *last_signaled + 1;

        for list in lists.iter_mut() {
            list.close()?;
        }

        for list in lists.iter_mut() {
            let commands = list.take_for_submission(covering_fence)?;
            log::trace!(
                "Submitting '{}' ({} commands, covered by fence {})",
                list.label(),
                commands.len(),
                covering_fence
            );
            self.backend.submit(list.allocator(), commands)?;
        }
        Ok(())
    }

    /// Signal the next fence value after all previously submitted work.
    pub fn signal(&self) -> Result<u64, GraphicsError> {
        let mut last_signaled = self.last_signaled.lock();
        let value = *last_signaled + 1;
        self.backend.signal(value)?;
        *last_signaled = value;

        profile_fence!(value, self.backend.completed_value());
        Ok(value)
    }

    /// Block until the fence reaches `value`.
    ///
    /// Returns immediately if it already has. Waiting on a value that was
    /// never signaled would block forever and is rejected instead.
    pub fn wait_for_fence(&self, value: u64) -> Result<(), GraphicsError> {
        if self.backend.completed_value() >= value {
            return Ok(());
        }

        let last_signaled = self.last_signaled();
        if value > last_signaled {
            return Err(GraphicsError::InvalidParameter(format!(
                "waiting on fence {value}, but only {last_signaled} has been signaled"
            )));
        }

        profile_scope!("wait_for_fence");
        log::trace!("Waiting for fence {}", value);
        self.backend.wait_for_value(value)
    }

    /// Signal and wait: returns once the GPU has drained every submission.
    pub fn flush(&self) -> Result<u64, GraphicsError> {
        let value = self.signal()?;
        self.wait_for_fence(value)?;
        Ok(value)
    }

    /// Highest fence value the GPU has reached.
    pub fn completed_value(&self) -> u64 {
        self.backend.completed_value()
    }

    /// Highest fence value issued so far.
    pub fn last_signaled(&self) -> u64 {
        *self.last_signaled.lock()
    }

    pub fn is_complete(&self, value: u64) -> bool {
        self.completed_value() >= value
    }

    /// Submissions the GPU has not finished, counted in fence values.
    pub fn pending(&self) -> u64 {
        self.last_signaled()
            .saturating_sub(self.completed_value())
    }
}

impl std::fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandQueue")
            .field("backend", &self.backend.name())
            .field("last_signaled", &self.last_signaled())
            .field("completed", &self.completed_value())
            .finish()
    }
}
