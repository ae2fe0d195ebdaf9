// Per-actuator job queues shared between the control side and the
// simulation tick.
//
// Every queue sits behind one mutex. The control side takes it only for the
// duration of a single push; the tick takes it once to pop the head of every
// queue, so queue mutation is serialized without serializing the tick.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use tracing::trace;

use super::address::ActuatorAddress;
use crate::error::{Result, SimError};

/// One tick's worth of work for an actuator.
#[derive(Debug, Clone, PartialEq)]
pub enum Job {
    /// Signed travel for this tick: millimetres for drive motors, degrees
    /// for arm motors.
    Move(f64),
    /// Sound playing on a speaker during this tick.
    Sound(String),
}

impl Job {
    pub fn as_move(&self) -> Option<f64> {
        match self {
            Job::Move(amount) => Some(*amount),
            Job::Sound(_) => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct ActuatorQueues {
    queues: Mutex<BTreeMap<ActuatorAddress, VecDeque<Job>>>,
}

impl ActuatorQueues {
    /// Create one empty queue per address.
    pub fn new(addresses: impl IntoIterator<Item = ActuatorAddress>) -> Self {
        let queues = addresses
            .into_iter()
            .map(|address| (address, VecDeque::new()))
            .collect();
        Self {
            queues: Mutex::new(queues),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<ActuatorAddress, VecDeque<Job>>> {
        // queue contents stay consistent even if a holder panicked mid-push
        self.queues.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a job to the actuator's queue. Never blocks beyond the push.
    pub fn enqueue(&self, address: &ActuatorAddress, job: Job) -> Result<()> {
        let mut queues = self.lock();
        let queue = queues
            .get_mut(address)
            .ok_or_else(|| SimError::UnknownActuator(address.clone()))?;
        queue.push_back(job);
        Ok(())
    }

    /// Append several jobs under a single acquisition of the lock.
    pub fn enqueue_all(
        &self,
        address: &ActuatorAddress,
        jobs: impl IntoIterator<Item = Job>,
    ) -> Result<()> {
        let mut queues = self.lock();
        let queue = queues
            .get_mut(address)
            .ok_or_else(|| SimError::UnknownActuator(address.clone()))?;
        queue.extend(jobs);
        Ok(())
    }

    /// Pop at most one job from every queue.
    ///
    /// Every registered address appears in the result, in address order;
    /// `None` means the queue was empty this tick.
    pub fn drain_all(&self) -> Vec<(ActuatorAddress, Option<Job>)> {
        let mut queues = self.lock();
        let jobs: Vec<_> = queues
            .iter_mut()
            .map(|(address, queue)| (address.clone(), queue.pop_front()))
            .collect();
        trace!(
            "Drained {} jobs",
            jobs.iter().filter(|(_, job)| job.is_some()).count()
        );
        jobs
    }

    /// Replace an actuator's queue with a fresh empty one.
    pub fn clear(&self, address: &ActuatorAddress) -> Result<()> {
        let mut queues = self.lock();
        let queue = queues
            .get_mut(address)
            .ok_or_else(|| SimError::UnknownActuator(address.clone()))?;
        *queue = VecDeque::new();
        Ok(())
    }

    pub fn clear_all(&self) {
        for queue in self.lock().values_mut() {
            *queue = VecDeque::new();
        }
    }

    /// Number of jobs still pending for an actuator.
    pub fn pending(&self, address: &ActuatorAddress) -> Result<usize> {
        self.lock()
            .get(address)
            .map(VecDeque::len)
            .ok_or_else(|| SimError::UnknownActuator(address.clone()))
    }
}
