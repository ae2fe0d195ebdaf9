// Per-sensor hand-off signal and the cached sensor values it guards.
//
// Each sensor owns a single-slot channel. The tick refreshes the cached
// values and then fills every empty slot; a reader takes the token for its
// address before copying the value out. A reader therefore never sees a
// value older than the last completed tick, and a second read within the
// same tick waits for the next one.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crossbeam_channel::{Receiver, Sender};

use super::address::SensorAddress;
use super::parts::SensorValue;
use crate::error::{Result, SimError};

struct Slot {
    tx: Sender<()>,
    rx: Receiver<()>,
}

/// One "fresh data available" signal per sensor address.
pub struct SensorHandoff {
    slots: HashMap<SensorAddress, Slot>,
}

impl SensorHandoff {
    /// All slots start empty: readers wait for the first tick.
    pub fn new(addresses: impl IntoIterator<Item = SensorAddress>) -> Self {
        let slots = addresses
            .into_iter()
            .map(|address| {
                let (tx, rx) = crossbeam_channel::bounded(1);
                (address, Slot { tx, rx })
            })
            .collect();
        Self { slots }
    }

    /// Signal every sensor. Slots that were never taken stay signalled.
    pub fn release_all(&self) {
        for slot in self.slots.values() {
            // a full slot is already signalled
            let _ = slot.tx.try_send(());
        }
    }

    /// Block until the sensor at `address` has been signalled, consuming
    /// the signal.
    pub fn wait(&self, address: &SensorAddress) -> Result<()> {
        let slot = self
            .slots
            .get(address)
            .ok_or_else(|| SimError::UnknownSensor(address.clone()))?;
        // the sender is owned by `self`, so recv can only return Ok
        let _ = slot.rx.recv();
        Ok(())
    }

}

/// Cached sensor readings, written by the tick and read by the control side.
#[derive(Clone, Default)]
pub struct SensorValues {
    inner: Arc<RwLock<HashMap<SensorAddress, SensorValue>>>,
}

impl SensorValues {
    pub fn get(&self, address: &SensorAddress) -> Option<SensorValue> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(address)
            .copied()
    }

    pub fn set(&self, address: SensorAddress, value: SensorValue) {
        self.inner
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(address, value);
    }

    pub fn clear(&self) {
        self.inner.write().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).is_empty()
    }

    /// Copy of every cached reading, ordered by address.
    pub fn snapshot(&self) -> Vec<(SensorAddress, SensorValue)> {
        let mut values: Vec<_> = self
            .inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(address, value)| (address.clone(), *value))
            .collect();
        values.sort_by(|a, b| a.0.cmp(&b.0));
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn addr() -> SensorAddress {
        SensorAddress::new(0, "in1")
    }

    #[test]
    fn test_reader_waits_for_first_release() {
        let handoff = Arc::new(SensorHandoff::new([addr()]));
        let (done_tx, done_rx) = mpsc::channel();

        let reader = {
            let handoff = Arc::clone(&handoff);
            thread::spawn(move || {
                handoff.wait(&addr()).unwrap();
                done_tx.send(()).unwrap();
            })
        };

        assert!(done_rx.recv_timeout(Duration::from_millis(50)).is_err());
        handoff.release_all();
        done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        reader.join().unwrap();
    }

    #[test]
    fn test_release_is_idempotent() {
        let handoff = SensorHandoff::new([addr()]);
        handoff.release_all();
        handoff.release_all();
        handoff.release_all();

        let handoff = Arc::new(handoff);

        // several releases still hand out a single token
        handoff.wait(&addr()).unwrap();
        let (done_tx, done_rx) = mpsc::channel();
        let reader = {
            let handoff = Arc::clone(&handoff);
            thread::spawn(move || {
                handoff.wait(&addr()).unwrap();
                done_tx.send(()).unwrap();
            })
        };
        assert!(done_rx.recv_timeout(Duration::from_millis(50)).is_err());
        handoff.release_all();
        done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        reader.join().unwrap();
    }

    #[test]
    fn test_unknown_sensor_is_an_error() {
        let handoff = SensorHandoff::new([addr()]);
        let other = SensorAddress::new(1, "in4");
        assert!(matches!(handoff.wait(&other), Err(SimError::UnknownSensor(a)) if a == other));
    }

    #[test]
    fn test_values_snapshot_is_ordered() {
        let values = SensorValues::default();
        values.set(SensorAddress::new(1, "in1"), SensorValue::Touch(true));
        values.set(SensorAddress::new(0, "in2"), SensorValue::Color(3));
        let snapshot = values.snapshot();
        assert_eq!(snapshot[0].0, SensorAddress::new(0, "in2"));
        assert_eq!(snapshot[1].1, SensorValue::Touch(true));

        values.clear();
        assert!(values.is_empty());
        assert_eq!(values.get(&SensorAddress::new(1, "in1")), None);
    }
}
