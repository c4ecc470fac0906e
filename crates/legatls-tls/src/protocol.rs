//! Sans-IO record protocol engine.
//!
//! `RecordProtocol` consumes wire bytes, produces wire bytes into an
//! outbound queue, and drives the per-role handshake flows. The blocking
//! and async streams both sit on top of it and only move bytes.

use std::sync::Arc;

use crate::alert::{fatal_alert_for, parse_alert, Alert, AlertDescription};
use crate::config::TlsConfig;
use crate::context::SecurityContext;
use crate::crypt::CipherSuiteParams;
use crate::handshake::codec::parse_handshake_header;
use crate::handshake::messages::HandshakeMessage;
use crate::handshake::transitions::{check_transition, Incoming};
use crate::handshake::{client, server, HandshakeState, HandshakeType};
use crate::record::{parse_record, serialize_record, ContentType, Record, MAX_PLAINTEXT_LENGTH};
use crate::{CipherSuite, ProtocolVersion, TlsRole};
use legatls_types::TlsError;
use tracing::{debug, trace, warn};

/// What a processed record amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordEvent {
    /// Handshake bytes were consumed (possibly only buffered).
    Handshake,
    ChangeCipherSpec,
    ApplicationData(Vec<u8>),
    /// A non-fatal alert other than close_notify.
    Alert(Alert),
    /// The peer sent close_notify.
    CloseNotify,
}

/// One connection's record layer and handshake driver.
pub struct RecordProtocol {
    config: Arc<TlsConfig>,
    pub(crate) ctx: SecurityContext,
    outbound: Vec<u8>,
}

impl RecordProtocol {
    pub fn new(config: Arc<TlsConfig>) -> Result<Self, TlsError> {
        if config.min_version > config.max_version {
            return Err(TlsError::InvalidConfig("min_version exceeds max_version".into()));
        }
        if config.cipher_suites.is_empty() {
            return Err(TlsError::InvalidConfig("no cipher suites configured".into()));
        }
        for suite in &config.cipher_suites {
            CipherSuiteParams::from_suite(*suite)?;
        }
        let ctx = SecurityContext::new(config.role, config.max_version);
        Ok(Self {
            config,
            ctx,
            outbound: Vec::new(),
        })
    }

    pub fn config(&self) -> &TlsConfig {
        &self.config
    }

    pub fn role(&self) -> TlsRole {
        self.ctx.role
    }

    pub fn context(&self) -> &SecurityContext {
        &self.ctx
    }

    pub fn handshake_state(&self) -> HandshakeState {
        self.ctx.state
    }

    pub fn is_handshake_complete(&self) -> bool {
        self.ctx.state == HandshakeState::Finished
    }

    pub fn is_failed(&self) -> bool {
        self.ctx.state == HandshakeState::Failed
    }

    pub fn is_resumed(&self) -> bool {
        self.ctx.resumed
    }

    pub fn received_close_notify(&self) -> bool {
        self.ctx.received_connection_end
    }

    pub fn sent_close_notify(&self) -> bool {
        self.ctx.sent_connection_end
    }

    /// Negotiated version, once the handshake finished.
    pub fn version(&self) -> Option<ProtocolVersion> {
        self.is_handshake_complete().then_some(self.ctx.version)
    }

    /// Negotiated suite, once the handshake finished.
    pub fn cipher_suite(&self) -> Option<CipherSuite> {
        if !self.is_handshake_complete() {
            return None;
        }
        self.ctx.params().map(|p| p.suite)
    }

    pub fn peer_certificates(&self) -> &[Vec<u8>] {
        &self.ctx.peer_certificates
    }

    pub fn session_id(&self) -> &[u8] {
        &self.ctx.session_id
    }

    /// Bytes waiting to be written to the transport.
    pub fn has_outbound(&self) -> bool {
        !self.outbound.is_empty()
    }

    pub fn take_outbound(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.outbound)
    }

    /// Kick off the handshake. Clients queue their ClientHello; servers
    /// start waiting for one. Calling this again is a no-op.
    pub fn start_handshake(&mut self) -> Result<(), TlsError> {
        match self.ctx.state {
            HandshakeState::None => {}
            HandshakeState::Failed => return Err(TlsError::ConnectionClosed),
            HandshakeState::Started | HandshakeState::Finished => return Ok(()),
        }
        self.ctx.state = HandshakeState::Started;
        let result = match self.ctx.role {
            TlsRole::Client => client::start(self),
            TlsRole::Server => Ok(()),
        };
        result.map_err(|e| self.fail(e))
    }

    /// Process the record at the front of `data`.
    ///
    /// Returns `Ok(None)` until `data` holds a full record, otherwise the
    /// number of bytes consumed and what the record carried. Any error is
    /// terminal: a fatal alert is queued where appropriate and the
    /// connection is marked failed.
    pub fn receive_record(&mut self, data: &[u8]) -> Result<Option<(usize, RecordEvent)>, TlsError> {
        if self.ctx.state == HandshakeState::Failed || self.ctx.received_connection_end {
            return Err(TlsError::ConnectionClosed);
        }
        let (record, consumed) = match parse_record(data) {
            Ok(Some(parsed)) => parsed,
            Ok(None) => return Ok(None),
            Err(e) => return Err(self.fail(e)),
        };
        match self.process_record(record) {
            Ok(event) => Ok(Some((consumed, event))),
            Err(e) => Err(self.fail(e)),
        }
    }

    fn process_record(&mut self, record: Record) -> Result<RecordEvent, TlsError> {
        // A peer that rejected our version may alert with its own.
        if self.ctx.version_negotiated
            && record.content_type != ContentType::Alert
            && record.version != self.ctx.version.to_u16()
        {
            return Err(TlsError::UnsupportedVersion);
        }
        trace!(
            content_type = ?record.content_type,
            len = record.fragment.len(),
            seq = self.ctx.read_seq,
            "record received"
        );

        let plaintext = match self.ctx.current_read.as_mut() {
            Some(cipher) => {
                let pt = cipher.open(self.ctx.read_seq, record.content_type, &record.fragment)?;
                self.ctx.read_seq = next_seq(self.ctx.read_seq)?;
                pt
            }
            None => {
                if record.fragment.len() > MAX_PLAINTEXT_LENGTH {
                    return Err(TlsError::RecordOverflow);
                }
                record.fragment
            }
        };

        if record.content_type != ContentType::Handshake && !self.ctx.hs_buf.is_empty() {
            return Err(TlsError::UnexpectedMessage(
                "record interleaved with a fragmented handshake message".into(),
            ));
        }

        match record.content_type {
            ContentType::Handshake => {
                if plaintext.is_empty() {
                    return Err(TlsError::DecodeError("empty handshake record".into()));
                }
                self.ctx.hs_buf.extend_from_slice(&plaintext);
                self.drain_handshake_buffer()?;
                Ok(RecordEvent::Handshake)
            }
            ContentType::ChangeCipherSpec => {
                if plaintext != [1] {
                    return Err(TlsError::DecodeError("malformed ChangeCipherSpec".into()));
                }
                check_transition(
                    self.ctx.role,
                    &self.ctx.transition_view(),
                    Incoming::ChangeCipherSpec,
                )?;
                self.ctx.activate_read()?;
                debug!(role = ?self.ctx.role, "ChangeCipherSpec received, read keys active");
                Ok(RecordEvent::ChangeCipherSpec)
            }
            ContentType::Alert => {
                let alert = parse_alert(&plaintext)?;
                if alert.is_fatal() {
                    return Err(TlsError::AlertReceived(alert));
                }
                if alert.description == AlertDescription::CloseNotify {
                    debug!(role = ?self.ctx.role, "close_notify received");
                    self.ctx.received_connection_end = true;
                    return Ok(RecordEvent::CloseNotify);
                }
                warn!(role = ?self.ctx.role, %alert, "warning alert received");
                Ok(RecordEvent::Alert(alert))
            }
            ContentType::ApplicationData => {
                if self.ctx.current_read.is_none() {
                    return Err(TlsError::UnexpectedMessage(
                        "application data before ChangeCipherSpec".into(),
                    ));
                }
                Ok(RecordEvent::ApplicationData(plaintext))
            }
        }
    }

    fn drain_handshake_buffer(&mut self) -> Result<(), TlsError> {
        loop {
            let (msg_type, raw) = match parse_handshake_header(&self.ctx.hs_buf)? {
                None => return Ok(()),
                Some((msg_type, _, total)) => (msg_type, self.ctx.hs_buf[..total].to_vec()),
            };
            self.ctx.hs_buf.drain(..raw.len());
            self.process_handshake(msg_type, &raw)?;
        }
    }

    fn process_handshake(&mut self, msg_type: u8, raw: &[u8]) -> Result<(), TlsError> {
        let msg_type = HandshakeType::from_u8(msg_type)?;
        let body = &raw[4..];

        // Renegotiation is not supported; both triggers get a warning.
        match (self.ctx.role, msg_type) {
            (TlsRole::Client, HandshakeType::HelloRequest) => {
                if !body.is_empty() {
                    return Err(TlsError::DecodeError("HelloRequest with a body".into()));
                }
                if self.ctx.state == HandshakeState::None {
                    debug!("HelloRequest before handshake start, ignored");
                } else {
                    self.send_alert(Alert::warning(AlertDescription::NoRenegotiation))?;
                }
                return Ok(());
            }
            (TlsRole::Server, HandshakeType::ClientHello) if self.ctx.state == HandshakeState::Finished => {
                return self.send_alert(Alert::warning(AlertDescription::NoRenegotiation));
            }
            _ => {}
        }

        check_transition(self.ctx.role, &self.ctx.transition_view(), Incoming::Handshake(msg_type))?;
        let msg = HandshakeMessage::parse(msg_type, body, self.ctx.version)?;
        debug!(role = ?self.ctx.role, ?msg_type, len = body.len(), "handshake message received");
        match self.ctx.role {
            TlsRole::Client => client::handle(self, msg, raw)?,
            TlsRole::Server => server::handle(self, msg, raw)?,
        }
        self.ctx.last_received = Some(msg_type);
        Ok(())
    }

    /// Frame `data` as one or more records of `content_type`, protected by
    /// the current write state.
    fn write_records(&mut self, content_type: ContentType, data: &[u8]) -> Result<(), TlsError> {
        for chunk in data.chunks(MAX_PLAINTEXT_LENGTH) {
            let fragment = match self.ctx.current_write.as_mut() {
                Some(cipher) => {
                    let sealed = cipher.seal(self.ctx.write_seq, content_type, chunk)?;
                    self.ctx.write_seq = next_seq(self.ctx.write_seq)?;
                    sealed
                }
                None => chunk.to_vec(),
            };
            trace!(?content_type, len = fragment.len(), "record queued");
            serialize_record(
                &Record {
                    content_type,
                    version: self.ctx.version.to_u16(),
                    fragment,
                },
                &mut self.outbound,
            );
        }
        Ok(())
    }

    /// Queue a handshake message and add it to the transcript.
    pub(crate) fn send_handshake(&mut self, msg: &HandshakeMessage) -> Result<(), TlsError> {
        let raw = msg.encode(self.ctx.version);
        let msg_type = msg.msg_type();
        if msg_type != HandshakeType::HelloRequest {
            self.ctx.transcript.update(&raw);
        }
        self.ctx.last_sent = Some(msg_type);
        debug!(role = ?self.ctx.role, ?msg_type, len = raw.len() - 4, "handshake message sent");
        self.write_records(ContentType::Handshake, &raw)
    }

    /// Queue a ChangeCipherSpec and switch writes to the pending keys.
    pub(crate) fn send_change_cipher_spec(&mut self) -> Result<(), TlsError> {
        self.write_records(ContentType::ChangeCipherSpec, &[1])?;
        self.ctx.activate_write()?;
        debug!(role = ?self.ctx.role, "ChangeCipherSpec sent, write keys active");
        Ok(())
    }

    /// Queue an alert record.
    pub fn send_alert(&mut self, alert: Alert) -> Result<(), TlsError> {
        if self.ctx.sent_connection_end {
            return Ok(());
        }
        if alert.description == AlertDescription::CloseNotify {
            debug!(role = ?self.ctx.role, "close_notify sent");
        } else {
            warn!(role = ?self.ctx.role, %alert, "alert sent");
        }
        self.write_records(ContentType::Alert, &alert.to_bytes())?;
        if alert.is_fatal() {
            self.ctx.state = HandshakeState::Failed;
            self.ctx.sent_connection_end = true;
        } else if alert.description == AlertDescription::CloseNotify {
            self.ctx.sent_connection_end = true;
        }
        Ok(())
    }

    /// Mark the connection failed, queue the matching fatal alert
    /// best-effort and hand the error back.
    pub(crate) fn fail(&mut self, err: TlsError) -> TlsError {
        warn!(role = ?self.ctx.role, error = %err, "connection aborted");
        if let TlsError::AlertReceived(_) = err {
            self.ctx.received_connection_end = true;
        } else if let Some(alert) = fatal_alert_for(&err) {
            // A failure to queue the alert must not replace the real error.
            let _ = self.send_alert(alert);
        }
        self.ctx.state = HandshakeState::Failed;
        err
    }

    /// The transport failed or a transfer was cut short. The byte stream can
    /// no longer be trusted, so nothing more is sent or accepted and queued
    /// records are discarded.
    pub fn abort(&mut self) {
        if self.ctx.state != HandshakeState::Failed {
            warn!(role = ?self.ctx.role, "transport lost, connection aborted");
        }
        self.ctx.state = HandshakeState::Failed;
        self.ctx.sent_connection_end = true;
        self.outbound.clear();
    }

    /// Encrypt application data into records.
    pub fn write_application_data(&mut self, data: &[u8]) -> Result<usize, TlsError> {
        if self.ctx.state != HandshakeState::Finished || self.ctx.sent_connection_end {
            return Err(TlsError::ConnectionClosed);
        }
        if self.ctx.current_write.is_none() {
            return Err(TlsError::RecordError("no write keys active".into()));
        }
        match self.write_records(ContentType::ApplicationData, data) {
            Ok(()) => Ok(data.len()),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Queue close_notify if the handshake completed and none was sent.
    pub fn close(&mut self) -> Result<(), TlsError> {
        let send = self.ctx.state == HandshakeState::Finished
            && !self.ctx.sent_connection_end
            && !self.config.quiet_shutdown;
        if send {
            self.send_alert(Alert::CLOSE_NOTIFY)?;
        }
        self.ctx.sent_connection_end = true;
        Ok(())
    }
}

fn next_seq(seq: u64) -> Result<u64, TlsError> {
    seq.checked_add(1)
        .ok_or_else(|| TlsError::RecordError("sequence number overflow".into()))
}

impl std::fmt::Debug for RecordProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordProtocol")
            .field("ctx", &self.ctx)
            .field("outbound_len", &self.outbound.len())
            .finish()
    }
}
