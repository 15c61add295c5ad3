//! Test doubles: a scripted transport and a one-shot local HTTP server.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use bytes::Bytes;
use futures_util::stream::{self, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::error::{Result, SessionError};
use crate::transport::{AlertTransport, ChunkStream};

/// One item a scripted stream yields.
pub(crate) enum Step {
    Chunk(Bytes),
    Fail(&'static str),
}

impl Step {
    pub(crate) fn chunk(data: impl AsRef<[u8]>) -> Self {
        Step::Chunk(Bytes::copy_from_slice(data.as_ref()))
    }
}

/// What happens after the scripted steps run out.
#[derive(Clone, Copy)]
pub(crate) enum End {
    /// The stream stays open without data.
    Hang,
    /// The device closes the body.
    Eof,
}

/// Behavior of one `open` call.
pub(crate) enum Script {
    Stream { steps: Vec<Step>, end: End },
    Refuse(SessionError),
}

impl Script {
    pub(crate) fn stream(steps: Vec<Step>, end: End) -> Self {
        Script::Stream { steps, end }
    }
}

/// Transport that replays one script per `open`. Once the scripts are used
/// up every further stream hangs.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    scripts: Mutex<VecDeque<Script>>,
    opens: AtomicUsize,
}

impl ScriptedTransport {
    pub(crate) fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            opens: AtomicUsize::new(0),
        }
    }

    pub(crate) fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl AlertTransport for ScriptedTransport {
    async fn open(&self) -> Result<ChunkStream> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.lock().unwrap().pop_front();

        let (steps, end) = match script {
            Some(Script::Refuse(err)) => return Err(err),
            Some(Script::Stream { steps, end }) => (steps, end),
            None => (Vec::new(), End::Hang),
        };

        let items = stream::iter(steps.into_iter().map(|step| match step {
            Step::Chunk(data) => Ok(data),
            Step::Fail(msg) => Err(SessionError::Read(msg.into())),
        }));
        Ok(match end {
            End::Eof => items.boxed(),
            End::Hang => items.chain(stream::pending()).boxed(),
        })
    }
}

/// Raw HTTP response written back for one accepted connection.
pub(crate) struct HttpReply {
    raw: Vec<u8>,
}

impl HttpReply {
    /// Send `response` verbatim.
    pub(crate) fn raw(response: &str) -> Self {
        Self {
            raw: response.as_bytes().to_vec(),
        }
    }

    /// A 200 whose body is delimited by closing the connection.
    pub(crate) fn stream_until_close(body: &str) -> Self {
        let head = "HTTP/1.1 200 OK\r\nContent-Type: multipart/mixed; boundary=MIME_boundary\r\nConnection: close\r\n\r\n";
        Self {
            raw: [head.as_bytes(), body.as_bytes()].concat(),
        }
    }

    /// An empty response with the given status code.
    pub(crate) fn status(code: u16) -> Self {
        Self::raw(&format!(
            "HTTP/1.1 {code} Status\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
        ))
    }
}

/// Serve one connection per reply, in order. The task yields the raw text of
/// every request it received.
pub(crate) async fn serve_http(replies: Vec<HttpReply>) -> (SocketAddr, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let mut requests = Vec::with_capacity(replies.len());
        for reply in replies {
            let (mut socket, _) = listener.accept().await.unwrap();
            requests.push(read_request(&mut socket).await);
            socket.write_all(&reply.raw).await.unwrap();
            let _ = socket.shutdown().await;
        }
        requests
    });

    (addr, handle)
}

/// A local port with nothing listening on it.
pub(crate) async fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];

    let head_end = loop {
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = socket.read(&mut buf).await.unwrap();
        if n == 0 {
            return String::from_utf8_lossy(&data).into_owned();
        }
        data.extend_from_slice(&buf[..n]);
    };

    let head = String::from_utf8_lossy(&data[..head_end]).into_owned();
    let body_len = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while data.len() < head_end + body_len {
        let n = socket.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
    }

    String::from_utf8_lossy(&data).into_owned()
}
