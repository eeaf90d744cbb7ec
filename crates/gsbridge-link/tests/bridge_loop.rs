use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use gsbridge_frame::{frame_bytes, EnvelopeCodec, ParserStats, FRAME_SIZE};
use gsbridge_link::{Bridge, BridgeConfig, LinkConfig, LinkError};
use gsbridge_protocol::{Control, Query, StatusReport};
use gsbridge_transport::UnixDomainSocket;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream, ReadBuf};
use tokio::net::UnixStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;

const FORWARD_50: &[u8] =
    br#"{"type":"C","forward":1,"backward":0,"left":0,"right":0,"speed":50,"priority_level":0}"#;
const QUERY: &[u8] = br#"{"type":"Q","instruction":2,"report":1,"priority_level":0,"id":7}"#;
const WAIT: Duration = Duration::from_secs(5);

type Client = Framed<UnixStream, EnvelopeCodec>;

struct Harness {
    device: DuplexStream,
    socket: PathBuf,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<ParserStats, LinkError>>,
}

impl Harness {
    async fn start(tag: &str, config: BridgeConfig) -> Self {
        Self::start_with(tag, config, |serial| serial).await
    }

    /// Like [`start`](Self::start), with the bridge's end of the serial line
    /// wrapped by `wrap`.
    async fn start_with<S, W>(tag: &str, config: BridgeConfig, wrap: W) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
        W: FnOnce(DuplexStream) -> S,
    {
        let dir = std::env::temp_dir().join(format!(
            "gsbridge-link-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let socket = dir.join("bridge.sock");

        let (bridge_side, device) = tokio::io::duplex(4096);
        let listener = UnixDomainSocket::bind(&socket).unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let bridge = Bridge::new(wrap(bridge_side), listener, config);
        let task = tokio::spawn(bridge.run_until(async {
            let _ = rx.await;
        }));

        Self {
            device,
            socket,
            shutdown: Some(tx),
            task,
        }
    }

    async fn connect(&self) -> Client {
        let stream = UnixStream::connect(&self.socket).await.unwrap();
        Framed::new(stream, EnvelopeCodec::new())
    }

    async fn read_device(&mut self, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        tokio::time::timeout(WAIT, self.device.read_exact(&mut buf))
            .await
            .expect("device read timed out")
            .unwrap();
        buf
    }

    async fn stop(mut self) -> (Result<ParserStats, LinkError>, DuplexStream, PathBuf) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let result = tokio::time::timeout(WAIT, self.task)
            .await
            .expect("bridge did not stop")
            .unwrap();
        (result, self.device, self.socket)
    }
}

fn no_link() -> BridgeConfig {
    BridgeConfig {
        link: LinkConfig {
            enabled: false,
            ..LinkConfig::default()
        },
        ..BridgeConfig::default()
    }
}

fn fast_link() -> BridgeConfig {
    let settle = Duration::from_millis(10);
    BridgeConfig {
        link: LinkConfig {
            enter_settle: settle,
            connect_settle: settle,
            disband_settle: settle,
            exit_settle: settle,
            ..LinkConfig::default()
        },
        ..BridgeConfig::default()
    }
}

async fn recv_json(client: &mut Client) -> String {
    let body = tokio::time::timeout(WAIT, client.next())
        .await
        .expect("reply timed out")
        .expect("connection closed")
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

fn status_frame(speed: u8) -> [u8; FRAME_SIZE] {
    let word = StatusReport {
        speed,
        state: 1,
        motor: 0,
        robot_id: 2,
        curr_pos: 1000,
    }
    .pack()
    .unwrap();
    frame_bytes(word)
}

fn status_json(speed: u8) -> String {
    format!(r#"{{"type":"SR","speed":{speed},"state":1,"motor":0,"robot_id":2,"curr_pos":1000}}"#)
}

/// Serial line whose first `failures` reads fail with an I/O error.
struct FlakySerial {
    inner: DuplexStream,
    failures: usize,
}

impl AsyncRead for FlakySerial {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.failures > 0 {
            self.failures -= 1;
            return Poll::Ready(Err(io::Error::other("transient EIO")));
        }
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for FlakySerial {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

fn word_of(frame: &[u8]) -> u64 {
    assert_eq!(&frame[..3], &[0xAA, 0x55, 0x08]);
    u64::from_be_bytes(frame[3..11].try_into().unwrap())
}

#[tokio::test]
async fn control_command_becomes_serial_frame() {
    let mut h = Harness::start("control", no_link()).await;
    let mut client = h.connect().await;

    client.send(Bytes::from_static(FORWARD_50)).await.unwrap();
    let frame = h.read_device(FRAME_SIZE).await;
    let control = Control::unpack(word_of(&frame)).unwrap();
    assert!(control.forward);
    assert_eq!(control.speed, 50);
    assert_eq!(control.priority, 0);

    let (result, _, _) = h.stop().await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn status_report_reaches_host() {
    let mut h = Harness::start("status", no_link()).await;
    let mut client = h.connect().await;

    // Round trip one command so the connection is known to be accepted.
    client.send(Bytes::from_static(QUERY)).await.unwrap();
    let frame = h.read_device(FRAME_SIZE).await;
    assert_eq!(Query::unpack(word_of(&frame)).unwrap().id, 7);

    let word = StatusReport {
        speed: 42,
        state: 1,
        motor: 0,
        robot_id: 2,
        curr_pos: 1000,
    }
    .pack()
    .unwrap();
    let mut noisy = vec![0x55, 0xAA, 0x00];
    noisy.extend_from_slice(&frame_bytes(word));
    h.device.write_all(&noisy).await.unwrap();

    assert_eq!(
        recv_json(&mut client).await,
        r#"{"type":"SR","speed":42,"state":1,"motor":0,"robot_id":2,"curr_pos":1000}"#
    );

    let (result, _, _) = h.stop().await;
    assert_eq!(result.unwrap().frames, 1);
}

#[tokio::test]
async fn invalid_command_gets_err_and_sends_nothing() {
    let mut h = Harness::start("invalid", no_link()).await;
    let mut client = h.connect().await;

    client
        .send(Bytes::from_static(br#"{"type":"C","speed":150}"#))
        .await
        .unwrap();
    assert_eq!(
        recv_json(&mut client).await,
        r#"{"type":"ERR","msg":"bad C fields"}"#
    );

    client.send(Bytes::from_static(b"{oops")).await.unwrap();
    assert_eq!(
        recv_json(&mut client).await,
        r#"{"type":"ERR","msg":"bad json"}"#
    );

    // The connection stays open and the next device bytes belong to the next command.
    client.send(Bytes::from_static(QUERY)).await.unwrap();
    let frame = h.read_device(FRAME_SIZE).await;
    assert!(Query::unpack(word_of(&frame)).is_ok());

    h.stop().await.0.unwrap();
}

#[tokio::test]
async fn illegal_length_closes_only_that_connection() {
    let mut h = Harness::start("length", no_link()).await;

    for prefix in [0u32, 1024 * 1024 + 1] {
        let mut raw = UnixStream::connect(&h.socket).await.unwrap();
        raw.write_all(&prefix.to_be_bytes()).await.unwrap();
        let mut buf = [0u8; 8];
        let n = tokio::time::timeout(WAIT, raw.read(&mut buf))
            .await
            .expect("bridge did not close the connection")
            .unwrap_or(0);
        assert_eq!(n, 0, "prefix {prefix} must close the connection");
    }

    let mut client = h.connect().await;
    client.send(Bytes::from_static(FORWARD_50)).await.unwrap();
    let frame = h.read_device(FRAME_SIZE).await;
    assert!(Control::unpack(word_of(&frame)).is_ok());

    h.stop().await.0.unwrap();
}

#[tokio::test]
async fn handshake_precedes_queued_commands() {
    let mut h = Harness::start("handshake", fast_link()).await;
    let mut client = h.connect().await;

    client.send(Bytes::from_static(FORWARD_50)).await.unwrap();
    let directives = h.read_device(9).await;
    assert_eq!(directives, b"$$$C\r---\r".to_vec());
    let frame = h.read_device(FRAME_SIZE).await;
    assert!(Control::unpack(word_of(&frame)).unwrap().forward);

    // Link is up now: shutdown takes it down again.
    let (result, mut device, socket) = h.stop().await;
    result.unwrap();
    let mut teardown = vec![0u8; 10];
    tokio::time::timeout(WAIT, device.read_exact(&mut teardown))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(teardown, b"$$$K,\r---\r".to_vec());
    assert!(!socket.exists(), "socket file must be removed on shutdown");
}

#[tokio::test]
async fn serial_eof_stops_the_bridge() {
    let h = Harness::start("eof", no_link()).await;
    let Harness {
        device,
        task,
        shutdown,
        ..
    } = h;
    drop(device);
    let result = tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
    assert!(matches!(result, Err(LinkError::SerialClosed)));
    drop(shutdown);
}

#[tokio::test]
async fn host_that_stops_reading_does_not_stall_the_bridge() {
    let config = BridgeConfig {
        host_queue_capacity: 64,
        ..no_link()
    };
    let mut h = Harness::start("stalled", config).await;
    let mut client = h.connect().await;

    client.send(Bytes::from_static(QUERY)).await.unwrap();
    h.read_device(FRAME_SIZE).await;

    // Far more report JSON than the socket buffers while the client never reads.
    const REPORTS: u64 = 20_000;
    let mut flood = Vec::with_capacity(REPORTS as usize * FRAME_SIZE);
    for i in 0..REPORTS {
        flood.extend_from_slice(&status_frame((i % 100) as u8));
    }
    tokio::time::timeout(WAIT, h.device.write_all(&flood))
        .await
        .expect("bridge stopped draining the serial line")
        .unwrap();

    // Commands from the stalled host still reach the device.
    client.send(Bytes::from_static(FORWARD_50)).await.unwrap();
    let frame = h.read_device(FRAME_SIZE).await;
    assert!(Control::unpack(word_of(&frame)).unwrap().forward);

    let (result, _, _) = h.stop().await;
    assert_eq!(result.unwrap().frames, REPORTS);
    drop(client);
}

#[tokio::test]
async fn serial_read_error_is_retried() {
    let mut h = Harness::start_with("flaky", no_link(), |inner| FlakySerial {
        inner,
        failures: 3,
    })
    .await;
    let mut client = h.connect().await;

    client.send(Bytes::from_static(QUERY)).await.unwrap();
    h.read_device(FRAME_SIZE).await;

    h.device.write_all(&status_frame(42)).await.unwrap();
    assert_eq!(recv_json(&mut client).await, status_json(42));

    let (result, _, _) = h.stop().await;
    assert_eq!(result.unwrap().frames, 1);
}

#[tokio::test]
async fn reports_without_a_host_are_drained_not_replayed() {
    let mut h = Harness::start("drain", no_link()).await;

    // The pipe holds 4096 bytes, so this write only completes once the
    // bridge has read the leading frame.
    let mut early = status_frame(1).to_vec();
    early.extend_from_slice(&[0u8; 5000]);
    tokio::time::timeout(WAIT, h.device.write_all(&early))
        .await
        .expect("bridge did not drain the serial line")
        .unwrap();

    let mut client = h.connect().await;
    client.send(Bytes::from_static(QUERY)).await.unwrap();
    h.read_device(FRAME_SIZE).await;

    h.device.write_all(&status_frame(2)).await.unwrap();
    assert_eq!(recv_json(&mut client).await, status_json(2));
    assert!(
        tokio::time::timeout(Duration::from_millis(200), client.next())
            .await
            .is_err(),
        "only reports that arrive while connected are forwarded"
    );

    let (result, _, _) = h.stop().await;
    assert_eq!(result.unwrap().frames, 2);
}
