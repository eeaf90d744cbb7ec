//! Radio command-mode handshake.
//!
//! The radio accepts configuration directives only in command mode, and each
//! directive needs time to settle before the next one. Instead of sleeping,
//! [`LinkHandshake`] records when the next directive is due and hands it
//! out from [`LinkHandshake::poll`], so the bridge loop keeps servicing both
//! endpoints while a handshake is in flight.

use std::fmt;

use tokio::time::{Duration, Instant};

use crate::config::LinkConfig;

/// Whether the radio link to the embedded controller is up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeviceLinkState {
    #[default]
    Disconnected,
    HandshakeInFlight,
    Connected,
}

impl fmt::Display for DeviceLinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::HandshakeInFlight => "handshake-in-flight",
            Self::Connected => "connected",
        };
        f.write_str(s)
    }
}

/// One radio directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// `$$$`, sent without a terminator.
    Enter,
    /// `C\r`, or `C,<addr>\r` with a configured remote.
    Connect,
    /// `K,\r`
    Disband,
    /// `---\r`
    Exit,
}

impl Step {
    /// Bytes written to the serial line for this directive.
    pub fn directive(self, config: &LinkConfig) -> Vec<u8> {
        match self {
            Self::Enter => b"$$$".to_vec(),
            Self::Connect => match &config.remote_addr {
                Some(addr) => format!("C,{addr}\r").into_bytes(),
                None => b"C\r".to_vec(),
            },
            Self::Disband => b"K,\r".to_vec(),
            Self::Exit => b"---\r".to_vec(),
        }
    }

    /// How long the radio needs after this directive.
    pub fn settle(self, config: &LinkConfig) -> Duration {
        match self {
            Self::Enter => config.enter_settle,
            Self::Connect => config.connect_settle,
            Self::Disband => config.disband_settle,
            Self::Exit => config.exit_settle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeKind {
    Connect,
    Disconnect,
}

impl HandshakeKind {
    fn steps(self) -> &'static [Step] {
        match self {
            Self::Connect => &[Step::Enter, Step::Connect, Step::Exit],
            Self::Disconnect => &[Step::Enter, Step::Disband, Step::Exit],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeOutcome {
    /// Every directive was issued and the last one has settled.
    Completed,
    /// The radio could not be put into command mode.
    Aborted,
}

/// What the caller should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeEvent {
    /// Nothing due yet.
    Idle,
    /// Write `bytes` to the serial line now.
    Write { step: Step, bytes: Vec<u8> },
    Finished(HandshakeOutcome),
}

/// A connect or disconnect directive sequence in flight.
#[derive(Debug, Clone)]
pub struct LinkHandshake {
    kind: HandshakeKind,
    config: LinkConfig,
    next: usize,
    due: Instant,
    aborted: bool,
}

impl LinkHandshake {
    /// Start a connect sequence; the first directive is due at `now`.
    pub fn connect(config: &LinkConfig, now: Instant) -> Self {
        Self::start(HandshakeKind::Connect, config, now)
    }

    /// Start a disconnect sequence; the first directive is due at `now`.
    pub fn disconnect(config: &LinkConfig, now: Instant) -> Self {
        Self::start(HandshakeKind::Disconnect, config, now)
    }

    fn start(kind: HandshakeKind, config: &LinkConfig, now: Instant) -> Self {
        tracing::info!(?kind, remote = ?config.remote_addr, "starting radio handshake");
        Self {
            kind,
            config: config.clone(),
            next: 0,
            due: now,
            aborted: false,
        }
    }

    pub fn kind(&self) -> HandshakeKind {
        self.kind
    }

    /// When [`poll`](Self::poll) will next have something to report.
    pub fn deadline(&self) -> Instant {
        self.due
    }

    /// Advance the sequence to `now`.
    pub fn poll(&mut self, now: Instant) -> HandshakeEvent {
        if self.aborted {
            return HandshakeEvent::Finished(HandshakeOutcome::Aborted);
        }
        if now < self.due {
            return HandshakeEvent::Idle;
        }
        match self.kind.steps().get(self.next) {
            Some(&step) => {
                self.next += 1;
                self.due = now + step.settle(&self.config);
                tracing::debug!(?step, settle = ?step.settle(&self.config), "radio directive due");
                HandshakeEvent::Write {
                    step,
                    bytes: step.directive(&self.config),
                }
            }
            None => HandshakeEvent::Finished(HandshakeOutcome::Completed),
        }
    }

    /// Report that writing `step` failed.
    ///
    /// Failing to enter command mode ends the attempt. Later failures are
    /// only logged so the radio is still told to leave command mode.
    pub fn write_failed(&mut self, step: Step, error: &std::io::Error) {
        if step == Step::Enter {
            tracing::warn!(kind = ?self.kind, %error, "radio did not take $$$, handshake aborted");
            self.aborted = true;
        } else {
            tracing::warn!(kind = ?self.kind, ?step, %error, "radio directive write failed, continuing");
        }
    }
}
