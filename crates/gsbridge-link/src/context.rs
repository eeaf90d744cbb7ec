use std::collections::VecDeque;

use bytes::BytesMut;
use gsbridge_frame::{FrameParser, ParserStats};
use gsbridge_protocol::{HostCommand, Outbound};
use tokio::time::Instant;

use crate::config::BridgeConfig;
use crate::handshake::{
    DeviceLinkState, HandshakeEvent, HandshakeKind, HandshakeOutcome, LinkHandshake, Step,
};

/// A radio directive to write to the serial line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkWrite {
    pub step: Step,
    pub bytes: Vec<u8>,
}

/// All mutable bridge state.
///
/// The context performs no I/O. The loop hands it host envelopes and serial
/// bytes, writes out whatever [`take_serial_output`](Self::take_serial_output)
/// and [`poll_link`](Self::poll_link) return, and sends the returned
/// [`Outbound`] messages to the host.
#[derive(Debug)]
pub struct BridgeContext {
    config: BridgeConfig,
    parser: FrameParser,
    link: DeviceLinkState,
    handshake: Option<LinkHandshake>,
    pending: VecDeque<u64>,
    serial_out: BytesMut,
}

impl BridgeContext {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            parser: FrameParser::new(),
            link: DeviceLinkState::Disconnected,
            handshake: None,
            pending: VecDeque::with_capacity(config.pending_capacity),
            serial_out: BytesMut::new(),
            config,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn link_state(&self) -> DeviceLinkState {
        self.link
    }

    pub fn parser_stats(&self) -> ParserStats {
        self.parser.stats()
    }

    /// Command words waiting for a handshake to finish.
    pub fn pending_words(&self) -> usize {
        self.pending.len()
    }

    /// A new host connection was accepted.
    ///
    /// Each connection gets one handshake attempt, made only if the radio
    /// link is down.
    pub fn on_peer_connected(&mut self, now: Instant) {
        if !self.config.link.enabled {
            return;
        }
        if self.link != DeviceLinkState::Disconnected {
            tracing::debug!(link = %self.link, "radio link already up, no handshake");
            return;
        }
        self.handshake = Some(LinkHandshake::connect(&self.config.link, now));
        self.link = DeviceLinkState::HandshakeInFlight;
    }

    /// The host connection went away.
    pub fn on_peer_disconnected(&mut self) {
        let stats = self.parser.stats();
        tracing::info!(
            frames = stats.frames,
            checksum_errors = stats.checksum_errors,
            length_errors = stats.length_errors,
            discarded_bytes = stats.discarded_bytes,
            "host disconnected"
        );
    }

    /// Start tearing the radio link down. Returns `false` if there is no
    /// established link to tear down.
    pub fn begin_disconnect(&mut self, now: Instant) -> bool {
        if !self.config.link.enabled || self.link != DeviceLinkState::Connected {
            return false;
        }
        self.handshake = Some(LinkHandshake::disconnect(&self.config.link, now));
        self.link = DeviceLinkState::HandshakeInFlight;
        true
    }

    /// When the in-flight handshake next needs attention.
    pub fn next_link_deadline(&self) -> Option<Instant> {
        self.handshake.as_ref().map(LinkHandshake::deadline)
    }

    /// Drive the handshake to `now`, returning a directive to write if one is due.
    pub fn poll_link(&mut self, now: Instant) -> Option<LinkWrite> {
        let handshake = self.handshake.as_mut()?;
        match handshake.poll(now) {
            HandshakeEvent::Idle => None,
            HandshakeEvent::Write { step, bytes } => Some(LinkWrite { step, bytes }),
            HandshakeEvent::Finished(outcome) => {
                let kind = handshake.kind();
                self.handshake = None;
                self.finish_handshake(kind, outcome);
                None
            }
        }
    }

    /// Report that a directive from [`poll_link`](Self::poll_link) could not be written.
    pub fn link_write_failed(&mut self, step: Step, error: &std::io::Error) {
        if let Some(handshake) = self.handshake.as_mut() {
            handshake.write_failed(step, error);
        }
    }

    fn finish_handshake(&mut self, kind: HandshakeKind, outcome: HandshakeOutcome) {
        self.link = match (kind, outcome) {
            (HandshakeKind::Connect, HandshakeOutcome::Completed) => DeviceLinkState::Connected,
            (HandshakeKind::Connect, HandshakeOutcome::Aborted) => DeviceLinkState::Disconnected,
            (HandshakeKind::Disconnect, _) => DeviceLinkState::Disconnected,
        };
        match outcome {
            HandshakeOutcome::Completed => {
                tracing::info!(?kind, link = %self.link, "radio handshake finished")
            }
            HandshakeOutcome::Aborted => tracing::warn!(
                ?kind,
                "radio handshake aborted, not retried until the host reconnects"
            ),
        }

        if !self.pending.is_empty() {
            tracing::debug!(
                words = self.pending.len(),
                "flushing commands held during handshake"
            );
        }
        while let Some(word) = self.pending.pop_front() {
            self.config.tx_encoding.encode(word, &mut self.serial_out);
        }
    }

    /// Handle one envelope body from the host.
    ///
    /// Valid commands are encoded for the serial line. Invalid ones produce
    /// an `ERR` reply and nothing is sent to the device.
    pub fn handle_host_message(&mut self, body: &[u8]) -> Option<Outbound> {
        tracing::trace!(body = %String::from_utf8_lossy(body), "host envelope");
        let command = match HostCommand::from_json(body) {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!(error = ?e, "rejected host command");
                return Some(Outbound::error(e.to_string()));
            }
        };
        let words = match command.words() {
            Ok(words) => words,
            Err(e) => {
                tracing::warn!(error = %e, "host command does not pack");
                return Some(Outbound::error(e.to_string()));
            }
        };
        tracing::debug!(
            kind = command.message_type().tag(),
            words = words.len(),
            "host command"
        );
        for word in words {
            self.queue_word(word);
        }
        None
    }

    fn queue_word(&mut self, word: u64) {
        if self.handshake.is_none() {
            self.config.tx_encoding.encode(word, &mut self.serial_out);
            return;
        }
        if self.pending.len() >= self.config.pending_capacity {
            if let Some(dropped) = self.pending.pop_front() {
                tracing::warn!(
                    word = format_args!("{dropped:#018x}"),
                    "handshake queue full, dropped oldest command"
                );
            }
        }
        self.pending.push_back(word);
    }

    /// Bytes ready for the serial line, if any.
    pub fn take_serial_output(&mut self) -> Option<BytesMut> {
        if self.serial_out.is_empty() {
            return None;
        }
        Some(self.serial_out.split())
    }

    /// Feed bytes read from the serial line; returns messages for the host.
    pub fn handle_serial_bytes(&mut self, bytes: &[u8]) -> Vec<Outbound> {
        tracing::trace!(len = bytes.len(), "serial bytes");
        let mut out = Vec::new();
        for word in self.parser.feed_slice(bytes) {
            match Outbound::from_word(word) {
                Ok(Some(message)) => out.push(message),
                Ok(None) => tracing::debug!(
                    word = format_args!("{word:#018x}"),
                    "ignoring host-bound word from device"
                ),
                Err(e) => tracing::debug!(
                    word = format_args!("{word:#018x}"),
                    error = %e,
                    "dropping undecodable word"
                ),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use gsbridge_frame::{frame_bytes, TxEncoding, FRAME_SIZE};
    use gsbridge_protocol::{Control, StatusReport};

    use super::*;
    use crate::config::LinkConfig;

    const FORWARD_50: &[u8] =
        br#"{"type":"C","forward":1,"backward":0,"left":0,"right":0,"speed":50,"priority_level":0}"#;

    fn no_link() -> BridgeConfig {
        BridgeConfig {
            link: LinkConfig {
                enabled: false,
                ..LinkConfig::default()
            },
            ..BridgeConfig::default()
        }
    }

    fn drain_handshake(ctx: &mut BridgeContext, start: Instant) -> Vec<Vec<u8>> {
        let mut writes = Vec::new();
        let mut now = start;
        for _ in 0..10 {
            if let Some(write) = ctx.poll_link(now) {
                writes.push(write.bytes);
            }
            match ctx.next_link_deadline() {
                Some(deadline) => now = deadline,
                None => break,
            }
        }
        writes
    }

    #[test]
    fn control_command_becomes_one_frame() {
        let mut ctx = BridgeContext::new(no_link());
        assert!(ctx.handle_host_message(FORWARD_50).is_none());
        let out = ctx.take_serial_output().unwrap();
        assert_eq!(out.len(), FRAME_SIZE);
        assert_eq!(&out[..3], &[0xAA, 0x55, 0x08]);
        let word = u64::from_be_bytes(out[3..11].try_into().unwrap());
        let c = Control::unpack(word).unwrap();
        assert!(c.forward);
        assert_eq!(c.speed, 50);
        assert!(ctx.take_serial_output().is_none());
    }

    #[test]
    fn invalid_command_replies_err_and_sends_nothing() {
        let mut ctx = BridgeContext::new(no_link());
        let reply = ctx.handle_host_message(br#"{"type":"C","speed":150}"#).unwrap();
        assert_eq!(reply, Outbound::error("bad C fields"));
        assert!(ctx.take_serial_output().is_none());
    }

    #[test]
    fn bit_string_tx_encoding() {
        let mut ctx = BridgeContext::new(BridgeConfig {
            tx_encoding: TxEncoding::BitString,
            ..no_link()
        });
        ctx.handle_host_message(FORWARD_50);
        let out = ctx.take_serial_output().unwrap();
        assert_eq!(out.len(), 65);
        assert_eq!(out[64], b'\r');
        assert!(out[..64].iter().all(|b| *b == b'0' || *b == b'1'));
    }

    #[test]
    fn status_report_frame_goes_to_host() {
        let mut ctx = BridgeContext::new(no_link());
        let word = StatusReport {
            speed: 42,
            state: 1,
            motor: 0,
            robot_id: 2,
            curr_pos: 1000,
        }
        .pack()
        .unwrap();
        let mut bytes = vec![0x00, 0x13, 0xAA];
        bytes.extend_from_slice(&frame_bytes(word));
        let out = ctx.handle_serial_bytes(&bytes);
        assert_eq!(out.len(), 1);
        assert_eq!(
            out[0].to_json(),
            br#"{"type":"SR","speed":42,"state":1,"motor":0,"robot_id":2,"curr_pos":1000}"#.to_vec()
        );
        assert_eq!(ctx.parser_stats().frames, 1);
    }

    #[test]
    fn corrupt_and_host_bound_frames_are_not_forwarded() {
        let mut ctx = BridgeContext::new(no_link());
        let mut corrupt = frame_bytes(5 | (1 << 16));
        corrupt[11] ^= 0xFF;
        assert!(ctx.handle_serial_bytes(&corrupt).is_empty());
        assert_eq!(ctx.parser_stats().checksum_errors, 1);

        let control = frame_bytes(Control::default().pack().unwrap());
        assert!(ctx.handle_serial_bytes(&control).is_empty());
        assert_eq!(ctx.parser_stats().frames, 1);
    }

    #[test]
    fn handshake_runs_once_per_connection() {
        let mut ctx = BridgeContext::new(BridgeConfig::default());
        let t0 = Instant::now();
        ctx.on_peer_connected(t0);
        assert_eq!(ctx.link_state(), DeviceLinkState::HandshakeInFlight);

        let writes = drain_handshake(&mut ctx, t0);
        assert_eq!(
            writes,
            vec![b"$$$".to_vec(), b"C\r".to_vec(), b"---\r".to_vec()]
        );
        assert_eq!(ctx.link_state(), DeviceLinkState::Connected);

        // Reconnecting with the link up does not repeat the handshake.
        ctx.on_peer_disconnected();
        ctx.on_peer_connected(t0 + Duration::from_secs(5));
        assert_eq!(ctx.link_state(), DeviceLinkState::Connected);
        assert!(ctx.next_link_deadline().is_none());
    }

    #[test]
    fn aborted_handshake_retried_only_on_new_connection() {
        let mut ctx = BridgeContext::new(BridgeConfig::default());
        let t0 = Instant::now();
        ctx.on_peer_connected(t0);
        let write = ctx.poll_link(t0).unwrap();
        assert_eq!(write.step, Step::Enter);
        ctx.link_write_failed(write.step, &std::io::Error::other("tx fault"));
        assert!(ctx.poll_link(t0).is_none());
        assert_eq!(ctx.link_state(), DeviceLinkState::Disconnected);
        assert!(ctx.next_link_deadline().is_none());

        ctx.on_peer_connected(t0 + Duration::from_secs(1));
        assert_eq!(ctx.link_state(), DeviceLinkState::HandshakeInFlight);
    }

    #[test]
    fn commands_wait_for_command_mode_to_end() {
        let mut ctx = BridgeContext::new(BridgeConfig::default());
        let t0 = Instant::now();
        ctx.on_peer_connected(t0);
        let enter = ctx.poll_link(t0).unwrap();
        assert_eq!(enter.bytes, b"$$$".to_vec());

        ctx.handle_host_message(FORWARD_50);
        assert_eq!(ctx.pending_words(), 1);
        assert!(ctx.take_serial_output().is_none());

        drain_handshake(&mut ctx, t0);
        assert_eq!(ctx.pending_words(), 0);
        let out = ctx.take_serial_output().unwrap();
        assert_eq!(out.len(), FRAME_SIZE);
    }

    #[test]
    fn pending_queue_drops_oldest() {
        let mut ctx = BridgeContext::new(BridgeConfig {
            pending_capacity: 2,
            ..BridgeConfig::default()
        });
        let t0 = Instant::now();
        ctx.on_peer_connected(t0);
        for id in 1..=3 {
            let body = format!(r#"{{"type":"P","priority_level":0,"id":{id},"instruction":1}}"#);
            ctx.handle_host_message(body.as_bytes());
        }
        assert_eq!(ctx.pending_words(), 2);

        drain_handshake(&mut ctx, t0);
        let out = ctx.take_serial_output().unwrap();
        let ids: Vec<u64> = out
            .chunks(FRAME_SIZE)
            .map(|f| (u64::from_be_bytes(f[3..11].try_into().unwrap()) >> 11) & 0xFFF)
            .collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn disconnect_only_when_connected() {
        let mut ctx = BridgeContext::new(BridgeConfig::default());
        let t0 = Instant::now();
        assert!(!ctx.begin_disconnect(t0));

        ctx.on_peer_connected(t0);
        drain_handshake(&mut ctx, t0);
        assert!(ctx.begin_disconnect(t0 + Duration::from_secs(3)));
        let writes = drain_handshake(&mut ctx, t0 + Duration::from_secs(3));
        assert_eq!(
            writes,
            vec![b"$$$".to_vec(), b"K,\r".to_vec(), b"---\r".to_vec()]
        );
        assert_eq!(ctx.link_state(), DeviceLinkState::Disconnected);
    }

    #[test]
    fn ack_and_high_priority_words_are_forwarded_raw() {
        let mut ctx = BridgeContext::new(no_link());
        let ack = 0x1234_0000_0000_0007u64;
        let mut bytes = frame_bytes(ack).to_vec();
        bytes.extend_from_slice(&frame_bytes(8));

        let out = ctx.handle_serial_bytes(&bytes);
        assert_eq!(
            out,
            vec![
                Outbound::Ack {
                    raw_u64: ack.to_string()
                },
                Outbound::HighPriorityReport {
                    raw_u64: "8".into()
                },
            ]
        );
    }

    #[test]
    fn disabled_link_never_handshakes() {
        let mut ctx = BridgeContext::new(no_link());
        ctx.on_peer_connected(Instant::now());
        assert_eq!(ctx.link_state(), DeviceLinkState::Disconnected);
        assert!(ctx.poll_link(Instant::now()).is_none());
        assert!(!ctx.begin_disconnect(Instant::now()));
    }
}
