//! Duplex byte-channel transports for the blocking stream.
//!
//! A transport is split once into a read half and a write half so reads and
//! writes can proceed under separate locks.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

/// Write half of a transport.
pub trait TransportWriter: Write + Send {
    /// Signal end of stream to the peer.
    fn close_write(&mut self) -> io::Result<()>;
}

/// A duplex byte channel.
pub trait Duplex {
    type Reader: Read + Send;
    type Writer: TransportWriter;

    fn split(self) -> io::Result<(Self::Reader, Self::Writer)>;
}

impl TransportWriter for TcpStream {
    fn close_write(&mut self) -> io::Result<()> {
        match TcpStream::shutdown(self, std::net::Shutdown::Write) {
            // Already torn down by the peer.
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}

impl Duplex for TcpStream {
    type Reader = TcpStream;
    type Writer = TcpStream;

    fn split(self) -> io::Result<(TcpStream, TcpStream)> {
        let reader = self.try_clone()?;
        Ok((reader, self))
    }
}

#[derive(Default)]
struct PipeState {
    buf: VecDeque<u8>,
    closed: bool,
}

#[derive(Default)]
struct Pipe {
    state: Mutex<PipeState>,
    readable: Condvar,
}

impl Pipe {
    fn close(&self) {
        self.state.lock().closed = true;
        self.readable.notify_all();
    }
}

/// Reading end of an in-memory pipe. Blocks until data or end of stream.
pub struct MemoryReader {
    pipe: Arc<Pipe>,
}

impl Read for MemoryReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut state = self.pipe.state.lock();
        while state.buf.is_empty() && !state.closed {
            self.pipe.readable.wait(&mut state);
        }
        let n = buf.len().min(state.buf.len());
        for (dst, src) in buf.iter_mut().zip(state.buf.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }
}

impl Drop for MemoryReader {
    fn drop(&mut self) {
        self.pipe.close();
    }
}

/// Writing end of an in-memory pipe. Dropping it ends the stream.
pub struct MemoryWriter {
    pipe: Arc<Pipe>,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.pipe.state.lock();
        if state.closed {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"));
        }
        state.buf.extend(buf);
        drop(state);
        self.pipe.readable.notify_all();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl TransportWriter for MemoryWriter {
    fn close_write(&mut self) -> io::Result<()> {
        self.pipe.close();
        Ok(())
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        self.pipe.close();
    }
}

/// One endpoint of an in-memory duplex channel.
pub struct MemoryDuplex {
    pub reader: MemoryReader,
    pub writer: MemoryWriter,
}

impl Duplex for MemoryDuplex {
    type Reader = MemoryReader;
    type Writer = MemoryWriter;

    fn split(self) -> io::Result<(MemoryReader, MemoryWriter)> {
        Ok((self.reader, self.writer))
    }
}

impl Read for MemoryDuplex {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl Write for MemoryDuplex {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// A connected pair of in-memory endpoints.
pub fn memory_duplex() -> (MemoryDuplex, MemoryDuplex) {
    let a_to_b = Arc::new(Pipe::default());
    let b_to_a = Arc::new(Pipe::default());
    let a = MemoryDuplex {
        reader: MemoryReader { pipe: b_to_a.clone() },
        writer: MemoryWriter { pipe: a_to_b.clone() },
    };
    let b = MemoryDuplex {
        reader: MemoryReader { pipe: a_to_b },
        writer: MemoryWriter { pipe: b_to_a },
    };
    (a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_memory_duplex_both_directions() {
        let (mut a, mut b) = memory_duplex();
        a.write_all(b"hello").unwrap();
        b.write_all(b"world").unwrap();
        let mut buf = [0u8; 5];
        b.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
        a.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"world");
    }

    #[test]
    fn test_memory_duplex_blocks_until_data() {
        let (a, mut b) = memory_duplex();
        let (_reader, mut writer) = a.split().unwrap();
        let handle = thread::spawn(move || {
            let mut buf = [0u8; 3];
            b.read_exact(&mut buf).unwrap();
            buf
        });
        thread::sleep(std::time::Duration::from_millis(20));
        writer.write_all(b"abc").unwrap();
        assert_eq!(&handle.join().unwrap(), b"abc");
    }

    #[test]
    fn test_close_write_signals_eof() {
        let (a, mut b) = memory_duplex();
        let (_reader, mut writer) = a.split().unwrap();
        writer.write_all(b"x").unwrap();
        writer.close_write().unwrap();
        let mut out = Vec::new();
        b.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"x");
        assert!(writer.write_all(b"y").is_err());
    }

    #[test]
    fn test_tcp_split() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4];
            conn.read_exact(&mut buf).unwrap();
            conn.write_all(&buf).unwrap();
        });
        let (mut reader, mut writer) = TcpStream::connect(addr).unwrap().split().unwrap();
        writer.write_all(b"echo").unwrap();
        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"echo");
        writer.close_write().unwrap();
        handle.join().unwrap();
    }
}
