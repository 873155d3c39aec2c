//! Ingest adapters: the seam between transport front-ends and the spool.
//!
//! The wire contract is a bidirectional stream: the client writes
//! `SignalMessage` records, the server answers each with an `IngestAck`
//! carrying the assigned spool position, stamping `ts_ingest` when the
//! client left it zero.
//!
//! The reference implementation here frames that stream over TCP: every
//! frame is a u32-LE length followed by one JSON document. Heavier
//! front-ends (gRPC, Kafka, NATS, AMQP) live outside this crate behind the
//! same [`IngestAdapter`] trait.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use log::{error, info, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{EngineError, Result};
use crate::model::{IngestAck, SignalMessage, now_nanos};
use crate::spool::Spool;

/// Maximum accepted frame size; anything larger is a broken stream.
const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

/// A transport front-end feeding the spool.
pub trait IngestAdapter {
    /// Start serving (non-blocking).
    fn start(&mut self) -> Result<()>;

    /// Stop serving and join background threads.
    fn stop(&mut self);
}

/// Write one length-prefixed JSON frame.
pub fn write_frame<T: Serialize>(stream: &mut impl Write, value: &T) -> Result<()> {
    let payload = serde_json::to_vec(value)?;
    stream.write_all(&(payload.len() as u32).to_le_bytes())?;
    stream.write_all(&payload)?;
    stream.flush()?;
    Ok(())
}

/// Read one length-prefixed JSON frame; `None` on clean end-of-stream.
pub fn read_frame<T: DeserializeOwned>(stream: &mut impl Read) -> Result<Option<T>> {
    let mut len_buf = [0u8; 4];
    match stream.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_le_bytes(len_buf);
    if len == 0 || len > MAX_FRAME_LEN {
        return Err(EngineError::Stream(format!("bad frame length {len}")));
    }

    let mut payload = vec![0u8; len as usize];
    stream
        .read_exact(&mut payload)
        .map_err(|e| EngineError::Stream(format!("truncated frame: {e}")))?;
    Ok(Some(serde_json::from_slice(&payload)?))
}

/// Framed-TCP ingest server.
pub struct TcpIngestAdapter {
    listen_address: String,
    spool: Arc<Spool>,
    running: Arc<AtomicBool>,
    accept_thread: Option<JoinHandle<()>>,
}

impl TcpIngestAdapter {
    pub fn new(listen_address: impl Into<String>, spool: Arc<Spool>) -> Self {
        TcpIngestAdapter {
            listen_address: listen_address.into(),
            spool,
            running: Arc::new(AtomicBool::new(false)),
            accept_thread: None,
        }
    }

}

impl IngestAdapter for TcpIngestAdapter {
    fn start(&mut self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(EngineError::Adapter("already running".to_string()));
        }

        let listener = TcpListener::bind(&self.listen_address)
            .map_err(|e| EngineError::Adapter(format!("bind {}: {e}", self.listen_address)))?;
        listener
            .set_nonblocking(true)
            .map_err(|e| EngineError::Adapter(format!("set_nonblocking: {e}")))?;
        info!("ingest: listening on {}", self.listen_address);

        let running = Arc::clone(&self.running);
        let spool = Arc::clone(&self.spool);
        let handle = std::thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                match listener.accept() {
                    Ok((stream, peer)) => {
                        info!("ingest: connection from {peer}");
                        if stream.set_nonblocking(false).is_err() {
                            continue;
                        }
                        let spool = Arc::clone(&spool);
                        let running = Arc::clone(&running);
                        // Connection threads are detached: a worker blocked
                        // on a quiet client must not stall shutdown.
                        std::thread::spawn(move || {
                            if let Err(e) = serve_connection(stream, &spool, &running) {
                                warn!("ingest: connection from {peer} ended: {e}");
                            }
                        });
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        std::thread::sleep(Duration::from_millis(50));
                    }
                    Err(e) => {
                        error!("ingest: accept failed: {e}");
                        break;
                    }
                }
            }
        });
        self.accept_thread = Some(handle);
        Ok(())
    }

    fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.accept_thread.take() {
            let _ = handle.join();
        }
        info!("ingest: stopped");
    }
}

/// Serve one client: append every received message, ack each one.
fn serve_connection(
    mut stream: TcpStream,
    spool: &Spool,
    running: &AtomicBool,
) -> Result<()> {
    let mut sequence = 0i64;
    while running.load(Ordering::SeqCst) {
        let Some(mut message) = read_frame::<SignalMessage>(&mut stream)? else {
            return Ok(());
        };
        sequence += 1;

        if message.ts_ingest == 0 {
            message.ts_ingest = now_nanos();
        }

        let ack = match spool.append(&message) {
            Ok((partition, offset)) => IngestAck {
                message_id: format!("{}:{}", message.source_id, message.source_sequence),
                sequence,
                spool_offset: Some(crate::model::SpoolOffset {
                    partition,
                    offset,
                    frame_number: None,
                }),
                success: true,
                error_message: String::new(),
            },
            Err(e) => {
                // Tell the client, then drop the stream; it decides
                // whether to retry.
                let ack = IngestAck {
                    sequence,
                    success: false,
                    error_message: e.to_string(),
                    ..IngestAck::default()
                };
                write_frame(&mut stream, &ack)?;
                return Err(e);
            }
        };
        write_frame(&mut stream, &ack)?;
    }
    Ok(())
}

/// Client side of the framed ingest stream.
pub struct IngestClient {
    stream: TcpStream,
}

impl IngestClient {
    pub fn connect(address: &str) -> Result<Self> {
        let stream = TcpStream::connect(address)
            .map_err(|e| EngineError::Adapter(format!("connect {address}: {e}")))?;
        Ok(IngestClient { stream })
    }

    /// Send one message and wait for its ack.
    pub fn send(&mut self, message: &SignalMessage) -> Result<IngestAck> {
        write_frame(&mut self.stream, message)?;
        read_frame(&mut self.stream)?
            .ok_or_else(|| EngineError::Stream("server closed before ack".to_string()))
    }
}
