//! Handshake transcript: the concatenation of every handshake message
//! (header included) in wire order.

/// Running transcript over handshake messages.
///
/// SSL 3.0 and TLS 1.0 both need MD5 and SHA-1 digests of the same message
/// sequence at several points (CertificateVerify, both Finished messages),
/// and the SSL 3.0 constructions mix the master secret in before the
/// digest, so the raw messages are buffered and hashed on demand.
#[derive(Default)]
pub struct Transcript {
    message_buffer: Vec<u8>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a complete handshake message into the transcript.
    pub fn update(&mut self, data: &[u8]) {
        self.message_buffer.extend_from_slice(data);
    }

    /// All handshake bytes seen so far.
    pub fn messages(&self) -> &[u8] {
        &self.message_buffer
    }

    pub fn is_empty(&self) -> bool {
        self.message_buffer.is_empty()
    }
}
