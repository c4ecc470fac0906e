//! Asynchronous TLS stream over a tokio `AsyncRead + AsyncWrite` transport.
//!
//! Same record protocol and lock layout as the blocking `SslStream`; only
//! the transport calls await. The protocol lock is a plain mutex and is
//! never held across an await point.
//!
//! Dropping a pending `read_data` is harmless. Dropping a pending handshake
//! or write fails the connection, since the peer may hold half a record.

use std::collections::VecDeque;
use std::io;

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{Mutex as AsyncMutex, Notify};
use tracing::debug;

use crate::config::TlsConfig;
use crate::protocol::{RecordEvent, RecordProtocol};
use crate::stream::Negotiation;
use crate::{AsyncTlsConnection, CipherSuite, ProtocolVersion, TlsError};
use std::sync::Arc;

struct AsyncReadSide<R> {
    transport: R,
    record_buf: Vec<u8>,
    input: VecDeque<u8>,
    eof: bool,
}

/// An asynchronous TLS connection; share it behind an `Arc` to read and
/// write from different tasks.
pub struct AsyncSslStream<S> {
    negotiation: Mutex<Negotiation>,
    negotiated: Notify,
    reader: AsyncMutex<AsyncReadSide<ReadHalf<S>>>,
    writer: AsyncMutex<WriteHalf<S>>,
    protocol: Mutex<RecordProtocol>,
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send> AsyncSslStream<S> {
    pub fn new(stream: S, config: Arc<TlsConfig>) -> Result<Self, TlsError> {
        let protocol = RecordProtocol::new(config)?;
        let (reader, writer) = tokio::io::split(stream);
        Ok(Self {
            negotiation: Mutex::new(Negotiation::Idle),
            negotiated: Notify::new(),
            reader: AsyncMutex::new(AsyncReadSide {
                transport: reader,
                record_buf: Vec::with_capacity(16 * 1024),
                input: VecDeque::new(),
                eof: false,
            }),
            writer: AsyncMutex::new(writer),
            protocol: Mutex::new(protocol),
        })
    }

    pub fn is_handshake_complete(&self) -> bool {
        self.protocol.lock().is_handshake_complete()
    }

    pub fn is_resumed(&self) -> bool {
        self.protocol.lock().is_resumed()
    }

    async fn flush_outbound(&self) -> Result<(), TlsError> {
        let mut writer = self.writer.lock().await;
        let out = self.protocol.lock().take_outbound();
        self.send(&mut writer, &out).await
    }

    /// Write `out` with the writer lock held; any failure aborts the
    /// connection since the peer may have seen part of a record.
    async fn send(&self, writer: &mut WriteHalf<S>, out: &[u8]) -> Result<(), TlsError> {
        if out.is_empty() {
            return Ok(());
        }
        let mut sending = SendGuard {
            protocol: &self.protocol,
            done: false,
        };
        let written = match writer.write_all(out).await {
            Ok(()) => writer.flush().await,
            Err(e) => Err(e),
        };
        sending.done = true;
        written.map_err(|e| self.transport_failed(e))
    }

    fn transport_failed(&self, err: io::Error) -> TlsError {
        self.protocol.lock().abort();
        TlsError::IoError(err)
    }

    async fn next_record(&self, side: &mut AsyncReadSide<ReadHalf<S>>) -> Result<Option<RecordEvent>, TlsError> {
        loop {
            let received = self.protocol.lock().receive_record(&side.record_buf);
            match received {
                Ok(Some((consumed, event))) => {
                    side.record_buf.drain(..consumed);
                    self.flush_outbound().await?;
                    return Ok(Some(event));
                }
                Ok(None) => {}
                Err(e) => {
                    let _ = self.flush_outbound().await;
                    return Err(e);
                }
            }

            let mut tmp = [0u8; 16384];
            let n = match side.transport.read(&mut tmp).await {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
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

    async fn run_handshake(&self) -> Result<(), TlsError> {
        let mut side = self.reader.lock().await;
        let started = self.protocol.lock().start_handshake();
        self.flush_outbound().await?;
        started?;
        loop {
            let complete = {
                let protocol = self.protocol.lock();
                protocol
                    .is_handshake_complete()
                    .then(|| (protocol.version(), protocol.cipher_suite()))
            };
            if let Some((version, suite)) = complete {
                debug!(?version, ?suite, "async stream negotiated");
                return Ok(());
            }
            match self.next_record(&mut side).await? {
                Some(RecordEvent::ApplicationData(data)) => side.input.extend(data),
                Some(RecordEvent::CloseNotify) | None => return Err(TlsError::ConnectionClosed),
                Some(_) => {}
            }
        }
    }
}

/// Held by the task running the handshake. If that future is dropped
/// before it settles, the stream fails and waiting tasks are released.
struct NegotiationGuard<'a, S> {
    stream: &'a AsyncSslStream<S>,
    settled: bool,
}

impl<S> NegotiationGuard<'_, S> {
    fn settle(mut self, outcome: Negotiation) {
        *self.stream.negotiation.lock() = outcome;
        self.settled = true;
        self.stream.negotiated.notify_waiters();
    }
}

impl<S> Drop for NegotiationGuard<'_, S> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        debug!("handshake cancelled");
        self.stream.protocol.lock().abort();
        *self.stream.negotiation.lock() = Negotiation::Failed;
        self.stream.negotiated.notify_waiters();
    }
}

/// Aborts the connection if a transport write is cancelled part way.
struct SendGuard<'a> {
    protocol: &'a Mutex<RecordProtocol>,
    done: bool,
}

impl Drop for SendGuard<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.protocol.lock().abort();
        }
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send> AsyncTlsConnection for AsyncSslStream<S> {
    async fn handshake(&self) -> Result<(), TlsError> {
        loop {
            // Register before checking so a completion in between is not missed.
            let notified = self.negotiated.notified();
            let state = *self.negotiation.lock();
            match state {
                Negotiation::Done => return Ok(()),
                Negotiation::Failed => {
                    return Err(TlsError::HandshakeFailed("handshake already failed".into()))
                }
                Negotiation::InProgress => notified.await,
                Negotiation::Idle => {
                    let claimed = {
                        let mut state = self.negotiation.lock();
                        if *state == Negotiation::Idle {
                            *state = Negotiation::InProgress;
                            true
                        } else {
                            false
                        }
                    };
                    if !claimed {
                        continue;
                    }
                    let guard = NegotiationGuard {
                        stream: self,
                        settled: false,
                    };
                    let result = self.run_handshake().await;
                    guard.settle(if result.is_ok() {
                        Negotiation::Done
                    } else {
                        Negotiation::Failed
                    });
                    return result;
                }
            }
        }
    }

    async fn read_data(&self, buf: &mut [u8]) -> Result<usize, TlsError> {
        self.handshake().await?;
        if buf.is_empty() {
            return Ok(0);
        }
        let mut side = self.reader.lock().await;
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
            match self.next_record(&mut side).await? {
                Some(RecordEvent::ApplicationData(data)) => side.input.extend(data),
                Some(RecordEvent::CloseNotify) => side.eof = true,
                Some(_) => {}
                None => return Err(TlsError::TruncatedStream),
            }
        }
    }

    async fn write_data(&self, buf: &[u8]) -> Result<usize, TlsError> {
        self.handshake().await?;
        let mut writer = self.writer.lock().await;
        let (result, out) = {
            let mut protocol = self.protocol.lock();
            let result = protocol.write_application_data(buf);
            (result, protocol.take_outbound())
        };
        self.send(&mut writer, &out).await?;
        result
    }

    async fn close(&self) -> Result<(), TlsError> {
        let mut writer = self.writer.lock().await;
        let out = {
            let mut protocol = self.protocol.lock();
            protocol.close()?;
            protocol.take_outbound()
        };
        let _ = self.send(&mut writer, &out).await;
        writer.shutdown().await.map_err(|e| self.transport_failed(e))
    }

    fn version(&self) -> Option<ProtocolVersion> {
        self.protocol.lock().version()
    }

    fn cipher_suite(&self) -> Option<CipherSuite> {
        self.protocol.lock().cipher_suite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypt::pkcs1::public_key_to_der;
    use crate::crypt::pkcs1::tests::test_rsa_key;
    use crate::TlsRole;
    use std::time::Duration;
    use tokio::time::timeout;

    fn configs() -> (Arc<TlsConfig>, Arc<TlsConfig>) {
        let client = TlsConfig::builder().build().unwrap();
        let server = TlsConfig::builder()
            .role(TlsRole::Server)
            .certificate_chain(vec![public_key_to_der(&test_rsa_key().to_public_key()).unwrap()])
            .private_key(test_rsa_key().clone())
            .build()
            .unwrap();
        (Arc::new(client), Arc::new(server))
    }

    #[tokio::test]
    async fn test_async_handshake_and_data() {
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let (cc, sc) = configs();
        let client = AsyncSslStream::new(client_io, cc).unwrap();
        let server = AsyncSslStream::new(server_io, sc).unwrap();

        let (c, s) = tokio::join!(client.handshake(), server.handshake());
        c.unwrap();
        s.unwrap();
        assert_eq!(client.version(), Some(ProtocolVersion::Tls10));
        assert_eq!(client.cipher_suite(), server.cipher_suite());

        client.write_data(b"ping").await.unwrap();
        let mut buf = [0u8; 16];
        let n = server.read_data(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"ping");
        server.write_data(b"pong").await.unwrap();
        let n = client.read_data(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"pong");
    }

    #[tokio::test]
    async fn test_async_close_notify() {
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let (cc, sc) = configs();
        let client = AsyncSslStream::new(client_io, cc).unwrap();
        let server = AsyncSslStream::new(server_io, sc).unwrap();

        let (c, s) = tokio::join!(client.write_data(b"last words"), async {
            let mut buf = [0u8; 32];
            let n = server.read_data(&mut buf).await?;
            Ok::<_, TlsError>(buf[..n].to_vec())
        });
        c.unwrap();
        assert_eq!(s.unwrap(), b"last words");

        client.close().await.unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(server.read_data(&mut buf).await.unwrap(), 0);
        assert!(matches!(client.write_data(b"x").await, Err(TlsError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_cancelled_handshake_releases_waiters() {
        // The peer end stays open but never answers.
        let (client_io, _silent_peer) = tokio::io::duplex(64 * 1024);
        let (cc, _) = configs();
        let client = AsyncSslStream::new(client_io, cc).unwrap();

        let (first, waiter) = tokio::join!(
            timeout(Duration::from_millis(100), client.handshake()),
            timeout(Duration::from_secs(2), client.handshake()),
        );
        assert!(first.is_err());
        assert!(matches!(waiter, Ok(Err(TlsError::HandshakeFailed(_)))));

        let later = timeout(Duration::from_secs(2), client.handshake()).await;
        assert!(matches!(later, Ok(Err(TlsError::HandshakeFailed(_)))));
        assert!(client.protocol.lock().is_failed());
    }

    #[tokio::test]
    async fn test_async_write_to_vanished_peer_aborts() {
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let (cc, sc) = configs();
        let client = AsyncSslStream::new(client_io, cc).unwrap();
        let server = AsyncSslStream::new(server_io, sc).unwrap();
        let (c, s) = tokio::join!(client.handshake(), server.handshake());
        c.unwrap();
        s.unwrap();
        drop(server);

        let err = client.write_data(b"lost").await.unwrap_err();
        assert!(matches!(err, TlsError::IoError(ref e) if e.kind() == io::ErrorKind::BrokenPipe));
        assert!(client.protocol.lock().is_failed());
        assert!(matches!(client.write_data(b"again").await, Err(TlsError::ConnectionClosed)));
    }
}
