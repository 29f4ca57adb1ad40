// THEORY:
// The `receiver` module owns the network side of the emulator: bind, accept,
// read, feed the decoder, store the results. It is the only writer of the
// strip buffer and the only holder of decoder state.
//
// Key architectural principles:
// 1.  **Fail fast at bind, never at runtime**: a port that cannot be bound is
//     a startup error the caller must see and abort on. Once listening, no
//     peer behavior can stop the task: disconnects, resets, and garbage bytes
//     all end with the connection dropped and the listener accepting again.
// 2.  **One connection at a time**: a real strip has one controller. While a
//     connection is being serviced, further connection attempts wait in the
//     accept backlog until the current one closes.
// 3.  **Cooperative shutdown**: the task watches a shutdown flag at every
//     loop boundary through `select!`, so stop latency is bounded by the
//     current read, never by a peer that goes quiet.
// 4.  **Per-connection decoder state**: each connection gets a fresh
//     `FrameDecoder`, so indexing restarts with the first marker of every
//     connection and no stale window bytes leak across peers.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core_modules::frame_decoder::{DecodeEvent, FrameDecoder};
use crate::core_modules::rate_counter::FrameTicks;
use crate::core_modules::strip_buffer::StripBuffer;

const READ_CHUNK: usize = 4096;

/// The TCP listener feeding decoded pixel updates into the strip buffer.
pub struct StreamReceiver {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl StreamReceiver {
    /// Binds the listening socket. Failure here is fatal for startup and
    /// propagates to the caller; there is no retry.
    pub async fn bind(host: &str, port: u16) -> io::Result<Self> {
        let listener = TcpListener::bind((host, port)).await?;
        let local_addr = listener.local_addr()?;
        info!("listening on {local_addr}");
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// The bound address, with the OS-assigned port when 0 was requested.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Spawns the accept-and-read loop. `FrameStart` events become
    /// `apply_frame_start` plus a rate tick; `PixelUpdate` events become
    /// `apply`. The task ends only when the shutdown flag flips (or its
    /// sender is dropped).
    pub fn spawn(
        self,
        buffer: Arc<StripBuffer>,
        ticks: FrameTicks,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    accepted = self.listener.accept() => match accepted {
                        Ok((stream, peer)) => {
                            info!("connection from {peer}");
                            let stop = serve_connection(
                                stream,
                                &buffer,
                                &ticks,
                                &mut shutdown_rx,
                            )
                            .await;
                            if stop {
                                break;
                            }
                        }
                        Err(error) => warn!(?error, "accept failed"),
                    }
                }
            }
            debug!("receiver stopped");
        })
    }
}

/// Reads one connection to its end, returning `true` if shutdown was
/// observed while connected. Peer errors are logged and recovered by
/// returning to the accept loop.
async fn serve_connection(
    mut stream: TcpStream,
    buffer: &StripBuffer,
    ticks: &FrameTicks,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> bool {
    let mut decoder = FrameDecoder::new();
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    return true;
                }
            }
            read = stream.read(&mut chunk) => match read {
                Ok(0) => {
                    debug!("connection closed by peer");
                    return false;
                }
                Ok(received) => {
                    for &byte in &chunk[..received] {
                        match decoder.feed(byte) {
                            Some(DecodeEvent::FrameStart) => {
                                buffer.apply_frame_start();
                                ticks.tick();
                            }
                            Some(DecodeEvent::PixelUpdate { index, pixel }) => {
                                buffer.apply(index, pixel);
                            }
                            None => {}
                        }
                    }
                }
                Err(error) => {
                    warn!(?error, "read failed, dropping connection");
                    return false;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::pixel::{Pixel, START_MARKER};
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tokio::time::{sleep, timeout};

    const WAIT: Duration = Duration::from_secs(5);

    async fn wait_for_packet_length(buffer: &StripBuffer, expected: usize) {
        timeout(WAIT, async {
            while buffer.packet_length() != expected {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("packet length reached in time");
    }

    #[tokio::test]
    async fn frame_over_tcp_lands_in_the_buffer() {
        let buffer = Arc::new(StripBuffer::new(4));
        let ticks = FrameTicks::new();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let receiver = StreamReceiver::bind("127.0.0.1", 0).await.expect("bind");
        let addr = receiver.local_addr();
        let handle = receiver.spawn(Arc::clone(&buffer), ticks.clone(), shutdown_rx);

        buffer.take_dirty();

        let mut frame = Vec::new();
        frame.extend_from_slice(&START_MARKER);
        for value in 1..=4u8 {
            frame.extend_from_slice(&[0xFF, value, value, value]);
        }
        frame.extend_from_slice(&[0xFF; 4]);

        let mut client = TcpStream::connect(addr).await.expect("connect");
        client.write_all(&frame).await.expect("send frame");

        // Marker (4) + four records (16) + one padding record (4).
        wait_for_packet_length(&buffer, 24).await;
        for index in 0..4 {
            let value = index as u8 + 1;
            assert_eq!(buffer.get(index), Pixel::new(0xFF, value, value, value));
        }
        assert!(buffer.take_dirty());
        assert_eq!(ticks.count(), 1);
        assert!(buffer.updated_at().is_some());

        shutdown_tx.send(true).expect("receiver subscribed");
        timeout(WAIT, handle)
            .await
            .expect("stop in time")
            .expect("task join");
    }

    #[tokio::test]
    async fn reconnect_restarts_indexing() {
        let buffer = Arc::new(StripBuffer::new(4));
        let ticks = FrameTicks::new();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let receiver = StreamReceiver::bind("127.0.0.1", 0).await.expect("bind");
        let addr = receiver.local_addr();
        let handle = receiver.spawn(Arc::clone(&buffer), ticks.clone(), shutdown_rx);

        let mut first = TcpStream::connect(addr).await.expect("connect");
        let mut stream_bytes = Vec::new();
        stream_bytes.extend_from_slice(&START_MARKER);
        stream_bytes.extend_from_slice(&[0xFF, 1, 1, 1, 0xFF, 2, 2, 2]);
        first.write_all(&stream_bytes).await.expect("send");
        wait_for_packet_length(&buffer, 12).await;
        drop(first);

        // A fresh connection gets a fresh decoder: its first record goes to
        // index 0 no matter how far the previous connection advanced.
        let mut second = TcpStream::connect(addr).await.expect("reconnect");
        let mut stream_bytes = Vec::new();
        stream_bytes.extend_from_slice(&START_MARKER);
        stream_bytes.extend_from_slice(&[0xFF, 9, 9, 9]);
        second.write_all(&stream_bytes).await.expect("send");
        wait_for_packet_length(&buffer, 8).await;

        assert_eq!(buffer.get(0), Pixel::new(0xFF, 9, 9, 9));
        assert_eq!(buffer.get(1), Pixel::new(0xFF, 2, 2, 2));
        assert_eq!(buffer.get(2), Pixel::OFF);
        assert_eq!(ticks.count(), 2);

        shutdown_tx.send(true).expect("receiver subscribed");
        timeout(WAIT, handle)
            .await
            .expect("stop in time")
            .expect("task join");
    }

    #[tokio::test]
    async fn bind_fails_when_the_port_is_taken() {
        let first = StreamReceiver::bind("127.0.0.1", 0).await.expect("bind");
        let port = first.local_addr().port();
        let second = StreamReceiver::bind("127.0.0.1", port).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn shutdown_stops_an_idle_listener() {
        let buffer = Arc::new(StripBuffer::new(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let receiver = StreamReceiver::bind("127.0.0.1", 0).await.expect("bind");
        let handle = receiver.spawn(buffer, FrameTicks::new(), shutdown_rx);

        shutdown_tx.send(true).expect("receiver subscribed");
        timeout(WAIT, handle)
            .await
            .expect("stop in time")
            .expect("task join");
    }
}
