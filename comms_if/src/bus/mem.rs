//! In-memory bus

use std::collections::{HashMap, HashSet, VecDeque};

use super::{Bus, BusError};

/// Number of writes a [`MemBus`] remembers. Once full the oldest half is forgotten.
pub const MAX_HISTORY: usize = 10_000;

/// A bus held entirely in memory.
///
/// Published messages on subscribed keys are looped back to [`Bus::poll_subscribed`], and the
/// most recent writes are recorded so that the traffic produced by a client can be inspected.
/// The bus can be taken offline to simulate a lost connection.
#[derive(Debug, Default)]
pub struct MemBus {
    values: HashMap<String, Vec<u8>>,

    history: Vec<BusWrite>,

    subscriptions: HashSet<String>,

    pending: VecDeque<(String, Vec<u8>)>,

    offline: bool,

    /// Writes refused while offline
    num_failed_writes: usize
}

/// A write made to a [`MemBus`].
#[derive(Debug, Clone, PartialEq)]
pub struct BusWrite {
    pub op: WriteOp,
    pub key: String,
    pub payload: Vec<u8>
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    Set,
    Publish
}

impl MemBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the bus on or offline. While offline every operation fails with
    /// [`BusError::NotConnected`].
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    /// Remove the value stored under `key`.
    pub fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }

    /// Queue a message on `key` as if another process had published it. The message is only
    /// delivered if `key` is subscribed.
    pub fn inject(&mut self, key: &str, payload: &[u8]) {
        if self.subscriptions.contains(key) {
            self.pending.push_back((key.to_string(), payload.to_vec()));
        }
    }

    /// Recorded writes, oldest first. At most [`MAX_HISTORY`] are kept.
    pub fn history(&self) -> &[BusWrite] {
        &self.history
    }

    /// Payloads published on `key`, oldest first.
    pub fn published(&self, key: &str) -> Vec<&[u8]> {
        self.history.iter()
            .filter(|w| w.op == WriteOp::Publish && w.key == key)
            .map(|w| w.payload.as_slice())
            .collect()
    }

    /// Forget all recorded writes.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Number of `set` and `publish` calls refused because the bus was offline.
    pub fn num_failed_writes(&self) -> usize {
        self.num_failed_writes
    }

    fn check_online(&self) -> Result<(), BusError> {
        match self.offline {
            true => Err(BusError::NotConnected),
            false => Ok(())
        }
    }

    fn record_write(&mut self, op: WriteOp, key: &str, payload: &[u8]) -> Result<(), BusError> {
        if let Err(e) = self.check_online() {
            self.num_failed_writes += 1;
            return Err(e)
        }

        if self.history.len() >= MAX_HISTORY {
            self.history.drain(..MAX_HISTORY / 2);
        }
        self.history.push(BusWrite {
            op,
            key: key.to_string(),
            payload: payload.to_vec()
        });

        Ok(())
    }
}

impl Bus for MemBus {
    fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, BusError> {
        self.check_online()?;
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, payload: &[u8]) -> Result<(), BusError> {
        self.record_write(WriteOp::Set, key, payload)?;
        self.values.insert(key.to_string(), payload.to_vec());
        Ok(())
    }

    fn publish(&mut self, key: &str, payload: &[u8]) -> Result<(), BusError> {
        self.record_write(WriteOp::Publish, key, payload)?;
        self.inject(key, payload);
        Ok(())
    }

    fn subscribe(&mut self, key: &str) -> Result<(), BusError> {
        self.check_online()?;
        self.subscriptions.insert(key.to_string());
        Ok(())
    }

    fn poll_subscribed(&mut self) -> Result<Vec<(String, Vec<u8>)>, BusError> {
        self.check_online()?;
        Ok(self.pending.drain(..).collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_subscription_loopback() {
        let mut bus = MemBus::new();

        // Messages on keys which aren't subscribed are dropped
        bus.publish("a", b"1").unwrap();
        bus.subscribe("a").unwrap();
        bus.publish("a", b"2").unwrap();
        bus.publish("b", b"3").unwrap();
        bus.inject("a", b"4");

        let msgs = bus.poll_subscribed().unwrap();
        assert_eq!(msgs, vec![
            ("a".to_string(), b"2".to_vec()),
            ("a".to_string(), b"4".to_vec())
        ]);
        assert!(bus.poll_subscribed().unwrap().is_empty());

        // Publishing doesn't store a value
        assert_eq!(bus.get("a").unwrap(), None);
        assert_eq!(bus.published("a").len(), 2);
    }

    #[test]
    fn test_offline() {
        let mut bus = MemBus::new();
        bus.set("k", b"v").unwrap();

        bus.set_offline(true);
        assert!(matches!(bus.get("k"), Err(BusError::NotConnected)));
        assert!(bus.set("k", b"w").is_err());
        assert!(bus.publish("k", b"w").is_err());
        assert_eq!(bus.history().len(), 1);
        assert_eq!(bus.num_failed_writes(), 2);

        bus.set_offline(false);
        assert_eq!(bus.get("k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn test_history_limit() {
        let mut bus = MemBus::new();

        for i in 0..MAX_HISTORY {
            bus.publish("k", i.to_string().as_bytes()).unwrap();
        }
        assert_eq!(bus.history().len(), MAX_HISTORY);

        // The next write drops the oldest half
        bus.set("k", b"last").unwrap();
        let history = bus.history();
        assert_eq!(history.len(), MAX_HISTORY / 2 + 1);
        assert_eq!(history[0].payload, (MAX_HISTORY / 2).to_string().into_bytes());
        assert_eq!(history[history.len() - 1].op, WriteOp::Set);
    }
}
