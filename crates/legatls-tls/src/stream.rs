//! Blocking TLS stream over a `Duplex` transport.
//!
//! Locks: negotiation (status only, with a condvar for waiters), reader,
//! writer, and the short-held protocol lock. Acquisition order is
//! reader, writer, protocol.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::config::TlsConfig;
use crate::protocol::{RecordEvent, RecordProtocol};
use crate::transport::{Duplex, TransportWriter};
use crate::{CipherSuite, ProtocolVersion, TlsConnection, TlsError};

/// Progress of the one handshake a stream performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Negotiation {
    Idle,
    InProgress,
    Done,
    Failed,
}

struct ReadSide<R> {
    transport: R,
    /// Raw transport bytes not yet forming a full record.
    record_buf: Vec<u8>,
    /// Decrypted application data not yet handed to the caller.
    input: VecDeque<u8>,
    /// close_notify received.
    eof: bool,
}

/// A TLS connection usable from several threads at once.
///
/// The first `read_data`/`write_data` (or an explicit `handshake`) runs the
/// handshake; concurrent callers wait for it rather than starting another.
pub struct SslStream<T: Duplex> {
    negotiation: Mutex<Negotiation>,
    negotiated: Condvar,
    reader: Mutex<ReadSide<T::Reader>>,
    writer: Mutex<T::Writer>,
    protocol: Mutex<RecordProtocol>,
}

impl<T: Duplex> SslStream<T> {
    /// Wrap `transport`. The role comes from `config`.
    pub fn new(transport: T, config: Arc<TlsConfig>) -> Result<Self, TlsError> {
        let protocol = RecordProtocol::new(config)?;
        let (reader, writer) = transport.split()?;
        Ok(Self {
            negotiation: Mutex::new(Negotiation::Idle),
            negotiated: Condvar::new(),
            reader: Mutex::new(ReadSide {
                transport: reader,
                record_buf: Vec::with_capacity(16 * 1024),
                input: VecDeque::new(),
                eof: false,
            }),
            writer: Mutex::new(writer),
            protocol: Mutex::new(protocol),
        })
    }

    pub fn is_handshake_complete(&self) -> bool {
        self.protocol.lock().is_handshake_complete()
    }

    pub fn is_resumed(&self) -> bool {
        self.protocol.lock().is_resumed()
    }

    pub fn peer_certificates(&self) -> Vec<Vec<u8>> {
        self.protocol.lock().peer_certificates().to_vec()
    }

    /// Write every queued outbound record to the transport.
    fn flush_outbound(&self) -> Result<(), TlsError> {
        let mut writer = self.writer.lock();
        let out = self.protocol.lock().take_outbound();
        self.send(&mut writer, &out)
    }

    /// Write `out` with the writer lock held. A failed or partial write
    /// leaves the peer mid-record, so the connection is aborted.
    fn send(&self, writer: &mut T::Writer, out: &[u8]) -> Result<(), TlsError> {
        if out.is_empty() {
            return Ok(());
        }
        writer
            .write_all(out)
            .and_then(|()| writer.flush())
            .map_err(|e| self.transport_failed(e))
    }

    fn transport_failed(&self, err: io::Error) -> TlsError {
        self.protocol.lock().abort();
        TlsError::IoError(err)
    }

    /// Decode the next record, reading from the transport as needed.
    /// `Ok(None)` means the transport ended cleanly at a record boundary.
    fn next_record(&self, side: &mut ReadSide<T::Reader>) -> Result<Option<RecordEvent>, TlsError> {
        loop {
            let received = self.protocol.lock().receive_record(&side.record_buf);
            match received {
                Ok(Some((consumed, event))) => {
                    side.record_buf.drain(..consumed);
                    self.flush_outbound()?;
                    return Ok(Some(event));
                }
                Ok(None) => {}
                Err(e) => {
                    // Best-effort alert; the original error wins.
                    let _ = self.flush_outbound();
                    return Err(e);
                }
            }

            let mut tmp = [0u8; 16384];
            let n = match side.transport.read(&mut tmp) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                // Read timeouts included: the connection ends with them.
                Err(e) => return Err(self.transport_failed(e)),
            };
            if n == 0 {
                if side.record_buf.is_empty() {
                    return Ok(None);
                }
                return Err(TlsError::TruncatedStream);
            }
            side.record_buf.extend_from_slice(&tmp[..n]);
        }
    }

    fn run_handshake(&self) -> Result<(), TlsError> {
        let mut side = self.reader.lock();
        let started = self.protocol.lock().start_handshake();
        self.flush_outbound()?;
        started?;
        loop {
            {
                let protocol = self.protocol.lock();
                if protocol.is_handshake_complete() {
                    debug!(
                        version = ?protocol.version(),
                        suite = ?protocol.cipher_suite(),
                        "stream negotiated"
                    );
                    return Ok(());
                }
            }
            match self.next_record(&mut side)? {
                Some(RecordEvent::ApplicationData(data)) => side.input.extend(data),
                Some(RecordEvent::CloseNotify) | None => return Err(TlsError::ConnectionClosed),
                Some(_) => {}
            }
        }
    }
}

impl<T: Duplex> TlsConnection for SslStream<T> {
    fn handshake(&self) -> Result<(), TlsError> {
        {
            let mut state = self.negotiation.lock();
            loop {
                match *state {
                    Negotiation::Done => return Ok(()),
                    Negotiation::Failed => {
                        return Err(TlsError::HandshakeFailed("handshake already failed".into()))
                    }
                    Negotiation::InProgress => self.negotiated.wait(&mut state),
                    Negotiation::Idle => {
                        *state = Negotiation::InProgress;
                        break;
                    }
                }
            }
        }

        let result = self.run_handshake();
        let mut state = self.negotiation.lock();
        *state = if result.is_ok() {
            Negotiation::Done
        } else {
            Negotiation::Failed
        };
        self.negotiated.notify_all();
        result
    }

    fn read_data(&self, buf: &mut [u8]) -> Result<usize, TlsError> {
        self.handshake()?;
        if buf.is_empty() {
            return Ok(0);
        }
        let mut side = self.reader.lock();
        loop {
            if !side.input.is_empty() {
                let n = buf.len().min(side.input.len());
                for (dst, src) in buf.iter_mut().zip(side.input.drain(..n)) {
                    *dst = src;
                }
                return Ok(n);
            }
            if side.eof {
                return Ok(0);
            }
            match self.next_record(&mut side)? {
                Some(RecordEvent::ApplicationData(data)) => side.input.extend(data),
                Some(RecordEvent::CloseNotify) => side.eof = true,
                Some(_) => {}
                // The peer went away without close_notify.
                None => return Err(TlsError::TruncatedStream),
            }
        }
    }

    fn write_data(&self, buf: &[u8]) -> Result<usize, TlsError> {
        self.handshake()?;
        let mut writer = self.writer.lock();
        let (result, out) = {
            let mut protocol = self.protocol.lock();
            let result = protocol.write_application_data(buf);
            (result, protocol.take_outbound())
        };
        self.send(&mut writer, &out)?;
        result
    }

    fn close(&self) -> Result<(), TlsError> {
        let mut writer = self.writer.lock();
        let out = {
            let mut protocol = self.protocol.lock();
            protocol.close()?;
            protocol.take_outbound()
        };
        // close_notify is best-effort; shutting the write side is not.
        let _ = self.send(&mut writer, &out);
        writer.close_write().map_err(|e| self.transport_failed(e))
    }

    fn version(&self) -> Option<ProtocolVersion> {
        self.protocol.lock().version()
    }

    fn cipher_suite(&self) -> Option<CipherSuite> {
        self.protocol.lock().cipher_suite()
    }
}

impl<T: Duplex> Read for SslStream<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_data(buf).map_err(io::Error::from)
    }
}

impl<T: Duplex> Write for SslStream<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_data(buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        let flushed = self.writer.lock().flush();
        if flushed.is_err() {
            self.protocol.lock().abort();
        }
        flushed
    }
}

impl<T: Duplex> std::fmt::Debug for SslStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SslStream")
            .field("negotiation", &*self.negotiation.lock())
            .finish_non_exhaustive()
    }
}
