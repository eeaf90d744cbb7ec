use std::collections::VecDeque;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::{Sink, Stream};
use gsbridge_frame::{EnvelopeCodec, FrameError, ParserStats};
use gsbridge_protocol::Outbound;
use gsbridge_transport::{TransportError, UnixDomainSocket};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::codec::Framed;
use tracing::{debug, info, trace, warn};

use crate::config::BridgeConfig;
use crate::context::BridgeContext;
use crate::error::{LinkError, Result};

type HostConn = Framed<UnixStream, EnvelopeCodec>;

const SERIAL_READ_CHUNK: usize = 256;

/// What the host connection produced when it was last polled.
enum HostEvent {
    Envelope(Option<std::result::Result<Bytes, FrameError>>),
    WriteFailed(FrameError),
}

/// The bridge between one host connection and the serial line.
///
/// Runs on a single task. Only one host connection is served at a time; a
/// second client waits in the listen backlog until the first goes away.
///
/// Nothing in the loop waits on the host. Replies and reports go into a
/// bounded outbox that is written out whenever the socket accepts data, so
/// a host that stops reading costs only its own oldest messages.
pub struct Bridge<S> {
    serial: S,
    listener: UnixDomainSocket,
    ctx: BridgeContext,
    host: Option<HostConn>,
    outbox: VecDeque<Bytes>,
    outbox_dropped: u64,
    serial_failures: u32,
    serial_resume: Option<Instant>,
}

impl<S> Bridge<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(serial: S, listener: UnixDomainSocket, config: BridgeConfig) -> Self {
        Self {
            serial,
            listener,
            ctx: BridgeContext::new(config),
            host: None,
            outbox: VecDeque::new(),
            outbox_dropped: 0,
            serial_failures: 0,
            serial_resume: None,
        }
    }

    pub fn context(&self) -> &BridgeContext {
        &self.ctx
    }

    /// Run until Ctrl-C or SIGTERM.
    pub async fn run(self) -> Result<ParserStats> {
        self.run_until(shutdown_signal()).await
    }

    /// Run until `shutdown` resolves, then take the radio link down if it is
    /// up. The socket file is removed when the bridge is dropped.
    ///
    /// Returns the serial parser counters. Fails only when the serial line
    /// reports end of stream.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<ParserStats>
    where
        F: Future<Output = ()>,
    {
        let mut tick = tokio::time::interval(self.ctx.config().tick);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);
        let mut buf = [0u8; SERIAL_READ_CHUNK];

        info!(socket = ?self.listener.path(), "bridge up, waiting for host");

        loop {
            self.drive_link().await;
            self.flush_serial().await;

            let serial_ready = self
                .serial_resume
                .is_none_or(|resume| Instant::now() >= resume);

            tokio::select! {
                () = &mut shutdown => {
                    info!("shutdown requested");
                    break;
                }
                accepted = self.listener.accept(), if self.host.is_none() => {
                    self.on_accept(accepted);
                }
                event = host_io(&mut self.host, &mut self.outbox), if self.host.is_some() => {
                    self.on_host_event(event);
                }
                read = self.serial.read(&mut buf), if serial_ready => {
                    self.on_serial_read(read, &buf)?;
                }
                _ = tick.tick() => {}
            }
        }

        self.shutdown_link().await;
        let stats = self.ctx.parser_stats();
        info!(
            frames = stats.frames,
            checksum_errors = stats.checksum_errors,
            length_errors = stats.length_errors,
            discarded_bytes = stats.discarded_bytes,
            "bridge stopped"
        );
        Ok(stats)
    }

    fn on_accept(&mut self, accepted: std::result::Result<UnixStream, TransportError>) {
        match accepted {
            Ok(stream) => {
                info!("host connected");
                let codec = EnvelopeCodec::with_max_len(self.ctx.config().max_envelope_len);
                self.host = Some(Framed::new(stream, codec));
                self.ctx.on_peer_connected(Instant::now());
            }
            Err(e) => warn!(error = %e, "accept failed"),
        }
    }

    fn on_host_event(&mut self, event: HostEvent) {
        match event {
            HostEvent::Envelope(Some(Ok(body))) => {
                if let Some(reply) = self.ctx.handle_host_message(&body) {
                    self.queue_for_host(reply);
                }
            }
            HostEvent::Envelope(Some(Err(e))) if e.is_protocol_violation() => {
                warn!(error = %e, "closing host connection");
                self.drop_host();
            }
            HostEvent::Envelope(Some(Err(e))) => {
                debug!(error = %e, "host connection failed");
                self.drop_host();
            }
            HostEvent::Envelope(None) => self.drop_host(),
            HostEvent::WriteFailed(e) => {
                warn!(error = %e, "failed to write to host");
                self.drop_host();
            }
        }
    }

    fn on_serial_read(&mut self, read: io::Result<usize>, buf: &[u8]) -> Result<()> {
        let n = match read {
            Ok(0) => return Err(LinkError::SerialClosed),
            Ok(n) => n,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => {
                return Ok(())
            }
            Err(e) => {
                self.serial_failures += 1;
                if self.serial_failures == 1 {
                    warn!(error = %e, "serial read failed, retrying every tick");
                } else {
                    debug!(error = %e, failures = self.serial_failures, "serial read failed");
                }
                self.serial_resume = Some(Instant::now() + self.ctx.config().tick);
                return Ok(());
            }
        };
        if self.serial_failures > 0 {
            info!(failures = self.serial_failures, "serial line readable again");
            self.serial_failures = 0;
        }
        self.serial_resume = None;

        let messages = self.ctx.handle_serial_bytes(&buf[..n]);
        if self.host.is_none() {
            if !messages.is_empty() {
                debug!(count = messages.len(), "no host connected, dropping reports");
            }
            return Ok(());
        }
        for message in messages {
            self.queue_for_host(message);
        }
        Ok(())
    }

    fn queue_for_host(&mut self, message: Outbound) {
        if self.host.is_none() {
            return;
        }
        if self.outbox.len() >= self.ctx.config().host_queue_capacity {
            self.outbox.pop_front();
            if self.outbox_dropped == 0 {
                warn!(
                    capacity = self.ctx.config().host_queue_capacity,
                    "host is not reading, dropping oldest messages"
                );
            }
            self.outbox_dropped += 1;
        }
        self.outbox.push_back(Bytes::from(message.to_json()));
    }

    fn drop_host(&mut self) {
        if self.host.take().is_none() {
            return;
        }
        if self.outbox_dropped > 0 || !self.outbox.is_empty() {
            info!(
                dropped = self.outbox_dropped,
                unsent = self.outbox.len(),
                "host messages lost"
            );
        }
        self.outbox.clear();
        self.outbox_dropped = 0;
        self.ctx.on_peer_disconnected();
    }

    async fn drive_link(&mut self) {
        let now = Instant::now();
        while let Some(write) = self.ctx.poll_link(now) {
            trace!(step = ?write.step, "writing radio directive");
            if let Err(e) = write_serial(&mut self.serial, &write.bytes).await {
                self.ctx.link_write_failed(write.step, &e);
            }
        }
    }

    async fn flush_serial(&mut self) {
        let Some(out) = self.ctx.take_serial_output() else {
            return;
        };
        trace!(len = out.len(), "serial write");
        if let Err(e) = write_serial(&mut self.serial, &out).await {
            warn!(error = %e, len = out.len(), "serial write failed, commands dropped");
        }
    }

    async fn shutdown_link(&mut self) {
        if !self.ctx.begin_disconnect(Instant::now()) {
            return;
        }
        info!("taking radio link down");
        while let Some(deadline) = self.ctx.next_link_deadline() {
            tokio::time::sleep_until(deadline).await;
            self.drive_link().await;
        }
    }
}

/// Write queued messages as far as the socket allows, then wait for the
/// next envelope. Resolves on an envelope, end of stream or a write error.
async fn host_io(host: &mut Option<HostConn>, outbox: &mut VecDeque<Bytes>) -> HostEvent {
    match host.as_mut() {
        Some(conn) => std::future::poll_fn(|cx| poll_host(conn, outbox, cx)).await,
        None => std::future::pending().await,
    }
}

fn poll_host(
    conn: &mut HostConn,
    outbox: &mut VecDeque<Bytes>,
    cx: &mut Context<'_>,
) -> Poll<HostEvent> {
    while !outbox.is_empty() {
        match Sink::<Bytes>::poll_ready(Pin::new(&mut *conn), cx) {
            Poll::Ready(Ok(())) => {
                if let Some(body) = outbox.pop_front() {
                    if let Err(e) = Sink::<Bytes>::start_send(Pin::new(&mut *conn), body) {
                        return Poll::Ready(HostEvent::WriteFailed(e));
                    }
                }
            }
            Poll::Ready(Err(e)) => return Poll::Ready(HostEvent::WriteFailed(e)),
            Poll::Pending => break,
        }
    }
    if let Poll::Ready(Err(e)) = Sink::<Bytes>::poll_flush(Pin::new(&mut *conn), cx) {
        return Poll::Ready(HostEvent::WriteFailed(e));
    }
    Stream::poll_next(Pin::new(conn), cx).map(HostEvent::Envelope)
}

async fn write_serial<S: AsyncWrite + Unpin>(serial: &mut S, bytes: &[u8]) -> io::Result<()> {
    serial.write_all(bytes).await?;
    serial.flush().await
}

/// Resolves on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
