use parking_lot::Mutex;
use simo_config::{DeviceConfig, SafetyConfig};
use simo_core::{ChannelStatus, CommandChannel, Result, SensorData, SimoError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::protocol::{ControllerFrame, PING, SENSOR_REQUEST, SensorCache, render_command};

/// Where and how to reach the controller bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkOptions {
    /// `host:port`
    pub address: String,
    pub reconnect: Duration,
    /// How often to ask the controller for a `SENSOR` frame.
    pub poll_interval: Duration,
}

impl LinkOptions {
    /// `None` when no link is configured, which means dry run.
    pub fn from_config(device: &DeviceConfig, safety: &SafetyConfig) -> Result<Option<Self>> {
        let address = device.link_address().map_err(|reason| SimoError::ConfigValidation {
            field: "device.link".into(),
            reason,
        })?;
        Ok(address.map(|address| Self {
            address,
            reconnect: Duration::from_millis(device.reconnect_ms.max(100)),
            poll_interval: Duration::from_millis(safety.effective_poll_interval_ms()),
        }))
    }
}

/// Newline-framed TCP link to the motor controller.
///
/// A background task owns the socket: it reconnects after drops, writes
/// queued commands, requests a `SENSOR` frame every poll interval, and feeds
/// replies into the sensor cache. `send` never blocks and returns `false`
/// while the link is down. Commands are never retried across reconnects.
pub struct TcpLink {
    address: String,
    connected: Arc<AtomicBool>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    cache: Arc<Mutex<SensorCache>>,
    shutdown: watch::Sender<bool>,
}

impl TcpLink {
    /// Start the link task. Must be called inside a tokio runtime.
    pub fn spawn(options: LinkOptions) -> Self {
        let connected = Arc::new(AtomicBool::new(false));
        let cache = Arc::new(Mutex::new(SensorCache::new()));
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);

        tokio::spawn(link_loop(
            options.clone(),
            outbound_rx,
            Arc::clone(&connected),
            Arc::clone(&cache),
            shutdown_rx,
        ));

        Self {
            address: options.address,
            connected,
            outbound,
            cache,
            shutdown,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Stop the background task and drop the connection.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        self.connected.store(false, Ordering::SeqCst);
    }

    fn enqueue(&self, bytes: Vec<u8>) -> bool {
        if !self.is_connected() {
            return false;
        }
        self.outbound.send(bytes).is_ok()
    }
}

impl Drop for TcpLink {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

impl CommandChannel for TcpLink {
    fn send(&self, command: &str) -> bool {
        let accepted = self.enqueue(render_command(command));
        if !accepted {
            warn!(command, address = %self.address, "link down, command not sent");
        }
        accepted
    }

    fn send_raw(&self, bytes: &[u8]) -> bool {
        self.enqueue(bytes.to_vec())
    }

    fn status(&self) -> ChannelStatus {
        ChannelStatus {
            connected: self.is_connected(),
        }
    }

    fn sensor_data(&self) -> SensorData {
        self.cache.lock().data()
    }
}

fn handle_line(line: &str, cache: &Mutex<SensorCache>) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    match line.parse::<ControllerFrame>() {
        Ok(ControllerFrame::Pong) => debug!("controller alive"),
        Ok(ControllerFrame::Ack { detail }) => debug!(%detail, "controller ack"),
        Ok(ControllerFrame::Fault { detail }) => warn!(%detail, "controller reported error"),
        Ok(frame) => cache.lock().apply(&frame),
        Err(e) => debug!(error = %e, "ignoring controller line"),
    }
}

/// Connect, serve, and reconnect until shut down.
async fn link_loop(
    options: LinkOptions,
    mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    connected: Arc<AtomicBool>,
    cache: Arc<Mutex<SensorCache>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        match TcpStream::connect(&options.address).await {
            Ok(stream) => {
                info!(address = %options.address, "controller link connected");
                // nothing queued before this connection is ever delivered
                while outbound.try_recv().is_ok() {}
                connected.store(true, Ordering::SeqCst);

                let stop = serve(stream, &options, &mut outbound, &cache, &mut shutdown_rx).await;
                connected.store(false, Ordering::SeqCst);
                if stop {
                    break;
                }
                warn!(address = %options.address, "controller link dropped");
            }
            Err(e) => {
                debug!(address = %options.address, error = %e, "controller link unavailable");
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(options.reconnect) => {}
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
    connected.store(false, Ordering::SeqCst);
    debug!(address = %options.address, "controller link stopped");
}

/// Serve one connection. Returns `true` when the link should stop for good.
async fn serve(
    stream: TcpStream,
    options: &LinkOptions,
    outbound: &mut mpsc::UnboundedReceiver<Vec<u8>>,
    cache: &Mutex<SensorCache>,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> bool {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    let mut poll = tokio::time::interval(options.poll_interval);
    poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    if writer.write_all(&render_command(PING)).await.is_err() {
        return false;
    }

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    let _ = writer.shutdown().await;
                    return true;
                }
            }
            Some(bytes) = outbound.recv() => {
                if let Err(e) = writer.write_all(&bytes).await {
                    warn!(error = %e, "write to controller failed");
                    return false;
                }
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => handle_line(&line, cache),
                Ok(None) => return false,
                Err(e) => {
                    warn!(error = %e, "read from controller failed");
                    return false;
                }
            },
            _ = poll.tick() => {
                if writer.write_all(&render_command(SENSOR_REQUEST)).await.is_err() {
                    return false;
                }
            }
        }
    }
}
