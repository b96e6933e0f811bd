//! Resource arena with per-resource locking and FIFO hand-off
//!
//! The pool is the only place where holder/waiter state lives. Every
//! mutation of a resource happens under that resource's own mutex, so the
//! at-most-one-holder invariant holds no matter how many units race on it.
//! Ownership is transferred by the releasing side: it pops the head waiter,
//! records it as holder and then wakes it, so a woken `acquire` can return
//! `Granted` without touching the lock again.

use cmh_errors::{Error, PoolError};
use cmh_types::{ProcessId, ReclaimedResource, ResourceId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;

/// Result of a bounded wait for a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// The caller is now the holder
    Granted,
    /// The timeout elapsed first; the caller is no longer queued
    TimedOut,
}

/// Point-in-time view of one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub resource: ResourceId,
    pub holder: Option<ProcessId>,
    pub waiters: Vec<ProcessId>,
}

struct Waiter {
    process: ProcessId,
    grant: oneshot::Sender<()>,
}

#[derive(Default)]
struct Slot {
    holder: Option<ProcessId>,
    waiters: VecDeque<Waiter>,
}

impl Slot {
    fn enqueue(&mut self, process: ProcessId, grant: oneshot::Sender<()>) {
        // A process is queued at most once; a stale entry just gets the new sender.
        if let Some(existing) = self.waiters.iter_mut().find(|w| w.process == process) {
            existing.grant = grant;
        } else {
            self.waiters.push_back(Waiter { process, grant });
        }
    }

    fn withdraw(&mut self, process: ProcessId) {
        self.waiters.retain(|w| w.process != process);
    }

    /// Pass ownership to the first waiter that is still listening
    fn hand_off(&mut self) -> Option<ProcessId> {
        while let Some(waiter) = self.waiters.pop_front() {
            self.holder = Some(waiter.process);
            if waiter.grant.send(()).is_ok() {
                return Some(waiter.process);
            }
        }
        self.holder = None;
        None
    }

    fn waiter_ids(&self) -> Vec<ProcessId> {
        self.waiters.iter().map(|w| w.process).collect()
    }
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    // Slot state is updated field-by-field with no intermediate broken
    // state, so a poisoned lock still guards consistent data.
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owner of every resource in a run
pub struct ResourcePool {
    slots: Vec<Mutex<Slot>>,
}

impl ResourcePool {
    /// Create `count` free resources `R1..=Rcount`
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self {
            slots: (0..count).map(|_| Mutex::new(Slot::default())).collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Ids of every resource, ascending
    pub fn ids(&self) -> impl Iterator<Item = ResourceId> {
        ResourceId::range(self.slots.len())
    }

    fn slot(&self, resource: ResourceId) -> Result<&Mutex<Slot>, PoolError> {
        resource
            .index()
            .and_then(|index| self.slots.get(index))
            .ok_or(PoolError::UnknownResource {
                resource: resource.get(),
            })
    }

    /// Take `resource` for `process`, waiting at most `timeout`
    ///
    /// Returns `Granted` immediately when the resource is free. Otherwise
    /// the caller joins the back of the waiter queue and stays there until a
    /// release hands it ownership or the timeout elapses. Dropping the
    /// returned future withdraws the caller; if ownership had already been
    /// handed over it is passed on to the next waiter.
    ///
    /// # Errors
    ///
    /// Returns `UnknownResource` for an id outside the pool and
    /// `AlreadyHolder` if `process` already holds `resource`.
    pub async fn acquire(
        &self,
        resource: ResourceId,
        process: ProcessId,
        timeout: Duration,
    ) -> Result<AcquireOutcome, Error> {
        let slot = self.slot(resource)?;

        let grant = {
            let mut state = lock(slot);
            match state.holder {
                None => {
                    state.holder = Some(process);
                    return Ok(AcquireOutcome::Granted);
                }
                Some(holder) if holder == process => {
                    return Err(PoolError::AlreadyHolder {
                        resource: resource.get(),
                        process: process.get(),
                    }
                    .into());
                }
                Some(_) => {}
            }
            let (tx, rx) = oneshot::channel();
            state.enqueue(process, tx);
            rx
        };

        let mut pending = PendingGrant {
            slot,
            process,
            settled: false,
        };

        let outcome = match tokio::time::timeout(timeout, grant).await {
            Ok(Ok(())) => AcquireOutcome::Granted,
            Ok(Err(_)) | Err(_) => {
                // A hand-off may have landed right as the timer fired.
                let mut state = lock(slot);
                if state.holder == Some(process) {
                    AcquireOutcome::Granted
                } else {
                    state.withdraw(process);
                    AcquireOutcome::TimedOut
                }
            }
        };
        pending.settled = true;

        tracing::trace!(%resource, %process, ?outcome, "acquire finished");
        Ok(outcome)
    }

    /// Take `resource` only if it is free right now
    ///
    /// # Errors
    ///
    /// Returns `UnknownResource` for an id outside the pool.
    pub fn try_acquire(&self, resource: ResourceId, process: ProcessId) -> Result<bool, Error> {
        let mut state = lock(self.slot(resource)?);
        if state.holder.is_none() {
            state.holder = Some(process);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Give up `resource`, handing it to the head waiter if there is one
    ///
    /// Returns the new holder, if any.
    ///
    /// # Errors
    ///
    /// Returns `NotHolder` (leaving the resource untouched) when `process`
    /// is not the current holder, and `UnknownResource` for an id outside
    /// the pool.
    pub fn release(
        &self,
        resource: ResourceId,
        process: ProcessId,
    ) -> Result<Option<ProcessId>, Error> {
        let mut state = lock(self.slot(resource)?);
        if state.holder != Some(process) {
            return Err(PoolError::NotHolder {
                resource: resource.get(),
                process: process.get(),
                holder: state.holder.map(ProcessId::get),
            }
            .into());
        }
        let next = state.hand_off();
        tracing::trace!(%resource, %process, next = ?next, "released");
        Ok(next)
    }

    /// Current holder of `resource`
    ///
    /// The value can be stale by the time the caller looks at it; probe
    /// routing tolerates that.
    ///
    /// # Errors
    ///
    /// Returns `UnknownResource` for an id outside the pool.
    pub fn holder(&self, resource: ResourceId) -> Result<Option<ProcessId>, Error> {
        Ok(lock(self.slot(resource)?).holder)
    }

    /// Queued processes of `resource`, head first
    ///
    /// # Errors
    ///
    /// Returns `UnknownResource` for an id outside the pool.
    pub fn waiters(&self, resource: ResourceId) -> Result<Vec<ProcessId>, Error> {
        Ok(lock(self.slot(resource)?).waiter_ids())
    }

    /// Holder and waiters of every resource, ascending by id
    #[must_use]
    pub fn snapshot(&self) -> Vec<ResourceSnapshot> {
        self.ids()
            .zip(&self.slots)
            .map(|(resource, slot)| {
                let state = lock(slot);
                ResourceSnapshot {
                    resource,
                    holder: state.holder,
                    waiters: state.waiter_ids(),
                }
            })
            .collect()
    }

    /// Resources currently held by `process`, ascending
    #[must_use]
    pub fn held_by(&self, process: ProcessId) -> Vec<ResourceId> {
        self.ids()
            .zip(&self.slots)
            .filter(|(_, slot)| lock(slot).holder == Some(process))
            .map(|(resource, _)| resource)
            .collect()
    }

    /// Clear every holder, as if each had released
    ///
    /// Used once all units have been joined; anything still held at that
    /// point was left behind by a unit that failed.
    pub fn reclaim_all(&self) -> Vec<ReclaimedResource> {
        let mut reclaimed = Vec::new();
        for (resource, slot) in self.ids().zip(&self.slots) {
            let mut state = lock(slot);
            if let Some(holder) = state.holder {
                state.hand_off();
                reclaimed.push(ReclaimedResource { resource, holder });
            }
        }
        reclaimed
    }
}

/// Cleans up after an `acquire` that is dropped mid-wait
struct PendingGrant<'a> {
    slot: &'a Mutex<Slot>,
    process: ProcessId,
    settled: bool,
}

impl Drop for PendingGrant<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut state = lock(self.slot);
        state.withdraw(self.process);
        if state.holder == Some(self.process) {
            state.hand_off();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const P1: ProcessId = ProcessId::new(1);
    const P2: ProcessId = ProcessId::new(2);
    const P3: ProcessId = ProcessId::new(3);
    const R1: ResourceId = ResourceId::new(1);

    #[tokio::test]
    async fn test_free_resource_is_granted_immediately() {
        let pool = ResourcePool::new(2);
        let outcome = pool.acquire(R1, P1, Duration::ZERO).await.unwrap();
        assert_eq!(outcome, AcquireOutcome::Granted);
        assert_eq!(pool.holder(R1).unwrap(), Some(P1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_held_resource_times_out_after_timeout() {
        let pool = ResourcePool::new(1);
        assert!(pool.try_acquire(R1, P1).unwrap());

        let started = tokio::time::Instant::now();
        let outcome = pool
            .acquire(R1, P2, Duration::from_millis(500))
            .await
            .unwrap();
        assert_eq!(outcome, AcquireOutcome::TimedOut);
        assert!(started.elapsed() >= Duration::from_millis(500));
        assert_eq!(pool.holder(R1).unwrap(), Some(P1));
        assert!(pool.waiters(R1).unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_hands_off_in_fifo_order() {
        let pool = std::sync::Arc::new(ResourcePool::new(1));
        assert!(pool.try_acquire(R1, P1).unwrap());

        let second = tokio::spawn({
            let pool = pool.clone();
            async move { pool.acquire(R1, P2, Duration::from_secs(10)).await }
        });
        tokio::task::yield_now().await;
        let third = tokio::spawn({
            let pool = pool.clone();
            async move { pool.acquire(R1, P3, Duration::from_secs(10)).await }
        });
        tokio::task::yield_now().await;
        assert_eq!(pool.waiters(R1).unwrap(), vec![P2, P3]);

        assert_eq!(pool.release(R1, P1).unwrap(), Some(P2));
        assert_eq!(second.await.unwrap().unwrap(), AcquireOutcome::Granted);
        assert_eq!(pool.holder(R1).unwrap(), Some(P2));

        assert_eq!(pool.release(R1, P2).unwrap(), Some(P3));
        assert_eq!(third.await.unwrap().unwrap(), AcquireOutcome::Granted);
        assert_eq!(pool.release(R1, P3).unwrap(), None);
        assert_eq!(pool.holder(R1).unwrap(), None);
    }

    #[test]
    fn test_release_by_non_holder_leaves_state_unchanged() {
        let pool = ResourcePool::new(1);
        assert!(pool.try_acquire(R1, P1).unwrap());
        let before = pool.snapshot();

        let err = pool.release(R1, P2).unwrap_err();
        assert!(matches!(
            err,
            Error::Pool(PoolError::NotHolder {
                resource: 1,
                process: 2,
                holder: Some(1)
            })
        ));
        assert_eq!(pool.snapshot(), before);
    }

    #[tokio::test]
    async fn test_reacquiring_a_held_resource_is_rejected() {
        let pool = ResourcePool::new(1);
        assert!(pool.try_acquire(R1, P1).unwrap());
        let err = pool.acquire(R1, P1, Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, Error::Pool(PoolError::AlreadyHolder { .. })));
    }

    #[test]
    fn test_unknown_resource() {
        let pool = ResourcePool::new(1);
        assert!(matches!(
            pool.holder(ResourceId::new(2)),
            Err(Error::Pool(PoolError::UnknownResource { resource: 2 }))
        ));
        assert!(pool.holder(ResourceId::new(0)).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_acquire_withdraws_waiter() {
        let pool = std::sync::Arc::new(ResourcePool::new(1));
        assert!(pool.try_acquire(R1, P1).unwrap());

        let waiter = tokio::spawn({
            let pool = pool.clone();
            async move { pool.acquire(R1, P2, Duration::from_secs(10)).await }
        });
        tokio::task::yield_now().await;
        assert_eq!(pool.waiters(R1).unwrap(), vec![P2]);

        waiter.abort();
        let _ = waiter.await;
        assert!(pool.waiters(R1).unwrap().is_empty());
        assert_eq!(pool.release(R1, P1).unwrap(), None);
    }

    #[test]
    fn test_reclaim_all_reports_holders() {
        let pool = ResourcePool::new(3);
        assert!(pool.try_acquire(ResourceId::new(1), P1).unwrap());
        assert!(pool.try_acquire(ResourceId::new(3), P2).unwrap());
        assert_eq!(pool.held_by(P1), vec![ResourceId::new(1)]);

        let reclaimed = pool.reclaim_all();
        assert_eq!(
            reclaimed,
            vec![
                ReclaimedResource {
                    resource: ResourceId::new(1),
                    holder: P1
                },
                ReclaimedResource {
                    resource: ResourceId::new(3),
                    holder: P2
                },
            ]
        );
        assert!(pool.snapshot().iter().all(|s| s.holder.is_none()));
    }
}
