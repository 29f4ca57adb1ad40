// THEORY:
// The `emulator` module is the final, top-level API for the strip emulator.
// It wires the core modules together in dependency order (mapping, then
// buffer sized from the mapping, then receiver and rate counter) with
// explicit construction and no ambient globals. The returned handle is the
// whole lifecycle: read access for consumers, and a shutdown that joins
// every spawned task.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::future::join_all;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::core_modules::mapping::{Layout, MappingConfig, StripMapping};
use crate::core_modules::rate_counter::{FrameTicks, RateCounter};
use crate::core_modules::receiver::StreamReceiver;

// Re-export key data structures for the public API.
pub use crate::core_modules::mapping::{MappingError, Pattern, ZeroLocation};
pub use crate::core_modules::pixel::{Pixel, PixelIndex};
pub use crate::core_modules::rate_counter::RateSample;
pub use crate::core_modules::strip_buffer::StripBuffer;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 6555;

/// Configuration for the emulator, plain fields constructed by the caller.
#[derive(Debug, Clone)]
pub struct EmulatorConfig {
    pub grid_width: usize,
    pub grid_height: usize,
    pub zero_location: ZeroLocation,
    pub pattern: Pattern,
    /// A user-supplied mapping table overriding the generated topology:
    /// `grid_height` rows of `grid_width` optional indices.
    pub custom_mapping: Option<Vec<Vec<Option<PixelIndex>>>>,
    pub host: String,
    pub port: u16,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            grid_width: 8,
            grid_height: 8,
            zero_location: ZeroLocation::TopLeft,
            pattern: Pattern::Vertical,
            custom_mapping: None,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl EmulatorConfig {
    fn mapping_config(&self) -> MappingConfig {
        let layout = match &self.custom_mapping {
            Some(rows) => Layout::Custom(rows.clone()),
            None => Layout::Generated {
                zero_location: self.zero_location,
                pattern: self.pattern,
            },
        };
        MappingConfig {
            grid_width: self.grid_width,
            grid_height: self.grid_height,
            layout,
        }
    }
}

/// Startup failures. Both are fatal: the process must not run with an
/// invalid mapping or without its listening socket.
#[derive(Debug, Error)]
pub enum StartError {
    #[error(transparent)]
    Mapping(#[from] MappingError),
    #[error("could not bind {addr}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// The running emulator: shared read access plus lifecycle control.
#[derive(Debug)]
pub struct Emulator {
    mapping: Arc<StripMapping>,
    buffer: Arc<StripBuffer>,
    rate_rx: watch::Receiver<RateSample>,
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Emulator {
    /// Builds the component chain and spawns the receiver and rate counter.
    /// Returns once the socket is bound, so an `Ok` means frames can arrive.
    pub async fn start(config: EmulatorConfig) -> Result<Self, StartError> {
        let mapping = Arc::new(StripMapping::new(config.mapping_config())?);
        let buffer = Arc::new(StripBuffer::new(mapping.pixel_count()));

        let receiver = StreamReceiver::bind(&config.host, config.port)
            .await
            .map_err(|source| StartError::Bind {
                addr: format!("{}:{}", config.host, config.port),
                source,
            })?;
        let local_addr = receiver.local_addr();

        let ticks = FrameTicks::new();
        let rate = RateCounter::new(ticks.clone());
        let rate_rx = rate.subscribe();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let tasks = vec![
            receiver.spawn(Arc::clone(&buffer), ticks, shutdown_rx.clone()),
            rate.spawn(shutdown_rx),
        ];

        info!(
            "emulator up: {} pixels on a {}x{} grid, {local_addr}",
            mapping.pixel_count(),
            config.grid_width,
            config.grid_height,
        );

        Ok(Self {
            mapping,
            buffer,
            rate_rx,
            local_addr,
            shutdown_tx,
            tasks,
        })
    }

    /// The grid-to-chain mapping, shareable with consumer tasks.
    pub fn mapping(&self) -> Arc<StripMapping> {
        Arc::clone(&self.mapping)
    }

    /// The live pixel store, shareable with consumer tasks.
    pub fn buffer(&self) -> Arc<StripBuffer> {
        Arc::clone(&self.buffer)
    }

    /// A fresh subscription to the per-second frame rate.
    pub fn rate_watch(&self) -> watch::Receiver<RateSample> {
        self.rate_rx.clone()
    }

    /// The receiver's bound address, with the OS-assigned port when the
    /// configuration requested port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Flips the shutdown flag and waits for every task to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for result in join_all(self.tasks).await {
            if let Err(error) = result {
                warn!(?error, "task ended abnormally");
            }
        }
        info!("emulator stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::pixel::START_MARKER;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpStream;
    use tokio::time::{sleep, timeout};

    const WAIT: Duration = Duration::from_secs(5);

    fn test_config() -> EmulatorConfig {
        EmulatorConfig {
            grid_width: 2,
            grid_height: 2,
            port: 0,
            ..EmulatorConfig::default()
        }
    }

    #[tokio::test]
    async fn start_send_read_shutdown() {
        let emulator = Emulator::start(test_config()).await.expect("start");
        let mapping = emulator.mapping();
        let buffer = emulator.buffer();
        buffer.take_dirty();

        let mut frame = Vec::new();
        frame.extend_from_slice(&START_MARKER);
        for value in 1..=4u8 {
            frame.extend_from_slice(&[0xFF, value, value, value]);
        }
        frame.extend_from_slice(&[0xFF; 4]);

        let mut client = TcpStream::connect(emulator.local_addr())
            .await
            .expect("connect");
        client.write_all(&frame).await.expect("send frame");

        // Marker (4) + four records (16) + one padding record (4).
        timeout(WAIT, async {
            while buffer.packet_length() != 24 {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("frame arrives in time");
        assert!(buffer.take_dirty());

        // Consumer path: grid coordinate -> chain index -> stored record.
        // Default topology is a vertical scan from the top left.
        let index = mapping.get(1, 0).expect("cell is mapped");
        assert_eq!(index, 2);
        let pixel = buffer.get(index);
        assert_eq!(pixel, Pixel::new(0xFF, 3, 3, 3));

        timeout(WAIT, emulator.shutdown())
            .await
            .expect("shutdown in time");
    }

    #[tokio::test]
    async fn invalid_custom_mapping_aborts_startup() {
        let config = EmulatorConfig {
            custom_mapping: Some(vec![
                vec![Some(0), Some(0)],
                vec![Some(1), Some(2)],
            ]),
            ..test_config()
        };
        let error = Emulator::start(config).await.expect_err("must not start");
        assert!(matches!(
            error,
            StartError::Mapping(MappingError::DuplicateIndex(0))
        ));
    }

    #[tokio::test]
    async fn occupied_port_aborts_startup() {
        let first = Emulator::start(test_config()).await.expect("start");
        let config = EmulatorConfig {
            port: first.local_addr().port(),
            ..test_config()
        };
        let error = Emulator::start(config).await.expect_err("must not start");
        assert!(matches!(error, StartError::Bind { .. }));

        timeout(WAIT, first.shutdown())
            .await
            .expect("shutdown in time");
    }
}
