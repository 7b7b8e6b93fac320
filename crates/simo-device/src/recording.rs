use parking_lot::Mutex;
use simo_core::{ChannelStatus, CommandChannel, SensorData};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// Commands kept before the oldest are dropped.
const HISTORY: usize = 256;

#[derive(Debug)]
struct Recorded {
    sent: VecDeque<String>,
    raw: VecDeque<Vec<u8>>,
    connected: bool,
    sensors: SensorData,
}

/// In-memory [`CommandChannel`].
///
/// Used when no controller link is configured (dry run) and as the
/// deterministic transport in tests. Sensor values are whatever was last set
/// with [`RecordingChannel::set_sensors`].
#[derive(Debug, Clone)]
pub struct RecordingChannel {
    inner: Arc<Mutex<Recorded>>,
}

impl Default for RecordingChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Recorded {
                sent: VecDeque::new(),
                raw: VecDeque::new(),
                connected: true,
                sensors: SensorData::default(),
            })),
        }
    }

    /// A channel that refuses every send until reconnected.
    pub fn disconnected() -> Self {
        let channel = Self::new();
        channel.set_connected(false);
        channel
    }

    pub fn set_connected(&self, connected: bool) {
        self.inner.lock().connected = connected;
    }

    pub fn set_sensors(&self, sensors: SensorData) {
        self.inner.lock().sensors = sensors;
    }

    /// Every command accepted so far, oldest first.
    pub fn sent(&self) -> Vec<String> {
        self.inner.lock().sent.iter().cloned().collect()
    }

    pub fn last_sent(&self) -> Option<String> {
        self.inner.lock().sent.back().cloned()
    }

    pub fn raw(&self) -> Vec<Vec<u8>> {
        self.inner.lock().raw.iter().cloned().collect()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.sent.clear();
        inner.raw.clear();
    }
}

fn push_bounded<T>(queue: &mut VecDeque<T>, item: T) {
    if queue.len() == HISTORY {
        queue.pop_front();
    }
    queue.push_back(item);
}

impl CommandChannel for RecordingChannel {
    fn send(&self, command: &str) -> bool {
        let mut inner = self.inner.lock();
        if !inner.connected {
            return false;
        }
        debug!(command, "command recorded");
        push_bounded(&mut inner.sent, command.to_string());
        true
    }

    fn send_raw(&self, bytes: &[u8]) -> bool {
        let mut inner = self.inner.lock();
        if !inner.connected {
            return false;
        }
        push_bounded(&mut inner.raw, bytes.to_vec());
        true
    }

    fn status(&self) -> ChannelStatus {
        ChannelStatus {
            connected: self.inner.lock().connected,
        }
    }

    fn sensor_data(&self) -> SensorData {
        self.inner.lock().sensors
    }
}
