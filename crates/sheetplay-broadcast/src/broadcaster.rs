//! Background thread that periodically sends the playback position over UDP.

use crate::error::{Error, Result};
use crate::lease::{BroadcastLease, LeaseKey};
use crate::message::PositionBroadcast;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use sheetplay_core::{CompiledSheet, PlayerConfig};
use sheetplay_midi::SharedPlayback;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// What the broadcaster needs to know each interval.
#[derive(Debug, Clone)]
pub struct PositionSnapshot {
    pub sheet: Arc<CompiledSheet>,
    pub seconds: f64,
    pub seconds_per_quarter: f64,
}

/// Source of the current playback position.
pub trait PositionSource: Send + Sync + 'static {
    /// `None` while nothing has been compiled.
    fn snapshot(&self) -> Option<PositionSnapshot>;
}

impl PositionSource for SharedPlayback {
    fn snapshot(&self) -> Option<PositionSnapshot> {
        let set = self.current()?;
        Some(PositionSnapshot {
            sheet: Arc::clone(set.sheet()),
            seconds: self.transport().seconds(),
            seconds_per_quarter: set.seconds_per_quarter(),
        })
    }
}

/// Broadcaster settings.
#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    /// Destination is `localhost:<port>`.
    pub port: u16,
    pub host: String,
    pub interval: Duration,
    pub lease_retry_interval: Duration,
    pub shutdown_timeout: Duration,
    /// Directory for lease lock files; the system temp dir when `None`.
    pub lease_dir: Option<std::path::PathBuf>,
}

impl From<&PlayerConfig> for BroadcastConfig {
    fn from(config: &PlayerConfig) -> Self {
        Self {
            port: config.broadcast_port,
            host: config.broadcast_host.clone(),
            interval: config.broadcast_interval,
            lease_retry_interval: config.lease_retry_interval,
            shutdown_timeout: config.shutdown_timeout,
            lease_dir: None,
        }
    }
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self::from(&PlayerConfig::default())
    }
}

/// Handle to the running broadcaster thread.
pub struct PositionBroadcaster {
    stop_tx: Option<Sender<()>>,
    done_rx: Receiver<()>,
    handle: Option<JoinHandle<()>>,
    shutdown_timeout: Duration,
}

impl PositionBroadcaster {
    /// Spawn the broadcaster thread.
    pub fn start<S: PositionSource>(source: Arc<S>, config: BroadcastConfig) -> Result<Self> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let (done_tx, done_rx) = bounded::<()>(1);
        let shutdown_timeout = config.shutdown_timeout;

        let handle = thread::Builder::new()
            .name("sheetplay-broadcast".into())
            .spawn(move || {
                broadcast_loop(source.as_ref(), &config, &stop_rx);
                let _ = done_tx.send(());
            })
            .map_err(|e| Error::Spawn(e.to_string()))?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            done_rx,
            handle: Some(handle),
            shutdown_timeout,
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal the thread and wait for it, at most `shutdown_timeout`.
    ///
    /// Returns `false` if the thread did not finish in time; it is detached.
    pub fn stop(&mut self) -> bool {
        let Some(handle) = self.handle.take() else {
            return true;
        };
        // Dropping the sender wakes the loop even if the channel is full.
        self.stop_tx.take();

        match self.done_rx.recv_timeout(self.shutdown_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let _ = handle.join();
                debug!("Broadcaster stopped");
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "Broadcaster did not stop within {:?}, detaching",
                    self.shutdown_timeout
                );
                false
            }
        }
    }
}

impl Drop for PositionBroadcaster {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Current lease, or when to try again.
enum LeaseState {
    None,
    Held(BroadcastLease),
    Waiting { key: LeaseKey, retry_at: Instant },
}

fn broadcast_loop<S: PositionSource + ?Sized>(
    source: &S,
    config: &BroadcastConfig,
    stop_rx: &Receiver<()>,
) {
    let target = format!("localhost:{}", config.port);
    info!("Starting position broadcast on {target}");

    let mut link: Option<Link> = None;
    let mut lease = LeaseState::None;

    loop {
        if let Some(snapshot) = source.snapshot() {
            let key = LeaseKey::new(&snapshot.sheet.sheet_path, config.port);
            if refresh_lease(&mut lease, key, config) {
                if let Err(e) = send_once(&mut link, &target, &snapshot, &config.host) {
                    warn!("Position broadcast failed: {e}");
                    link = None;
                }
            }
        }

        match stop_rx.recv_timeout(config.interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    info!("Position broadcast on {target} finished");
}

/// Make sure we hold the lease for `key`. Returns whether we may send.
fn refresh_lease(state: &mut LeaseState, key: LeaseKey, config: &BroadcastConfig) -> bool {
    match state {
        LeaseState::Held(held) if held.key() == key => return true,
        LeaseState::Waiting { key: k, retry_at } if *k == key && Instant::now() < *retry_at => {
            return false;
        }
        _ => {}
    }

    // Release any lease for a previous sheet before taking the new one.
    *state = LeaseState::None;
    let acquired = match &config.lease_dir {
        Some(dir) => BroadcastLease::try_acquire_in(key, dir),
        None => BroadcastLease::try_acquire(key),
    };
    match acquired {
        Ok(Some(held)) => {
            *state = LeaseState::Held(held);
            true
        }
        Ok(None) => {
            *state = LeaseState::Waiting {
                key,
                retry_at: Instant::now() + config.lease_retry_interval,
            };
            false
        }
        Err(e) => {
            warn!("{e}");
            *state = LeaseState::Waiting {
                key,
                retry_at: Instant::now() + config.lease_retry_interval,
            };
            false
        }
    }
}

/// Lazily bound UDP socket and resolved target.
struct Link {
    socket: UdpSocket,
    target: SocketAddr,
}

impl Link {
    fn open(target: &str) -> Result<Self> {
        let mut addrs = target.to_socket_addrs()?;
        let target = addrs
            .find(SocketAddr::is_ipv4)
            .or_else(|| target.to_socket_addrs().ok()?.next())
            .ok_or_else(|| {
                Error::Network(io::Error::new(
                    io::ErrorKind::AddrNotAvailable,
                    format!("{target} did not resolve"),
                ))
            })?;
        let local: SocketAddr = if target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local)?;
        debug!("Position broadcast socket bound for {target}");
        Ok(Self { socket, target })
    }
}

fn send_once(
    link: &mut Option<Link>,
    target: &str,
    snapshot: &PositionSnapshot,
    host: &str,
) -> Result<()> {
    let message = PositionBroadcast::at(
        &snapshot.sheet,
        snapshot.seconds,
        snapshot.seconds_per_quarter,
        host,
    );
    let bytes = message.to_json()?;

    if link.is_none() {
        *link = Some(Link::open(target)?);
    }
    if let Some(link) = link.as_ref() {
        link.socket.send_to(&bytes, link.target)?;
    }
    Ok(())
}
