//! A minimal HTTP origin server for tests.

use http::StatusCode;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use std::{io, thread};
use url::Url;

/// Response the [TestOrigin] serves for a route.
#[derive(Debug, Clone)]
pub struct CannedResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl CannedResponse {
    /// A `200 OK` response with the given body.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: None,
            body: body.into(),
        }
    }

    /// An empty response with the given status code.
    pub fn status(status: u16) -> Self {
        Self {
            status: StatusCode::from_u16(status).expect("invalid status code"),
            content_type: None,
            body: Vec::new(),
        }
    }

    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = Some(content_type.to_string());
        self
    }
}

/// A request received by the [TestOrigin].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    /// Path as sent on the wire, i.e. still percent-encoded.
    pub path: String,
    /// Headers with lowercase names.
    pub headers: Vec<(String, String)>,
}

impl RecordedRequest {
    /// Value of the first header with the given (lowercase) name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(header, _)| header == name)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Default)]
struct State {
    routes: HashMap<String, CannedResponse>,
    required_authorization: Option<String>,
    delay: Duration,
    offline: bool,
    requests: Vec<RecordedRequest>,
}

/// An HTTP/1.1 origin server on a random local port, serving canned responses.
///
/// Every request is recorded and can be inspected with [TestOrigin::requests]. Requests to
/// unknown paths are answered with `404 Not Found`. The server stops when dropped.
pub struct TestOrigin {
    addr: SocketAddr,
    base_url: Url,
    state: Arc<Mutex<State>>,
    stop: Arc<AtomicBool>,
    accept_thread: Option<JoinHandle<()>>,
}

impl TestOrigin {
    /// Starts a new origin server listening on `127.0.0.1`.
    pub fn start() -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        let base_url = Url::parse(&format!("http://{addr}/"))
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
        let state = Arc::new(Mutex::new(State::default()));
        let stop = Arc::new(AtomicBool::new(false));

        let accept_thread = {
            let state = Arc::clone(&state);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                for stream in listener.incoming() {
                    if stop.load(Ordering::SeqCst) {
                        break;
                    }
                    if let Ok(stream) = stream {
                        let state = Arc::clone(&state);
                        thread::spawn(move || {
                            let _ = handle_connection(stream, &state);
                        });
                    }
                }
            })
        };

        Ok(Self {
            addr,
            base_url,
            state,
            stop,
            accept_thread: Some(accept_thread),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL of the server, ending in `/`.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Serves `response` for requests to `path`.
    pub fn route(&self, path: &str, response: CannedResponse) {
        self.state.lock().routes.insert(path.to_string(), response);
    }

    /// Answers requests without exactly this `Authorization` header value with `401`.
    pub fn require_authorization(&self, value: &str) {
        self.state.lock().required_authorization = Some(value.to_string());
    }

    /// Delays every response by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().delay = delay;
    }

    /// When offline, connections are closed after receiving the request without any response.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    /// All requests received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.state.lock().requests.len()
    }

    /// Number of requests received so far for `path`.
    pub fn request_count_for(&self, path: &str) -> usize {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|request| request.path == path)
            .count()
    }
}

impl Drop for TestOrigin {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        // Wake up the accept loop, so that it notices the stop flag.
        let _ = TcpStream::connect(self.addr);
        if let Some(accept_thread) = self.accept_thread.take() {
            let _ = accept_thread.join();
        }
    }
}

fn handle_connection(stream: TcpStream, state: &Mutex<State>) -> io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
        }
    }

    let request = RecordedRequest {
        method,
        path,
        headers,
    };
    let (response, delay, offline) = {
        let mut state = state.lock();
        let authorized = match &state.required_authorization {
            Some(required) => request.header("authorization") == Some(required.as_str()),
            None => true,
        };
        let response = if !authorized {
            CannedResponse::status(401)
        } else {
            state
                .routes
                .get(&request.path)
                .cloned()
                .unwrap_or_else(|| CannedResponse::status(404))
        };
        state.requests.push(request);
        (response, state.delay, state.offline)
    };

    if offline {
        return stream.shutdown(Shutdown::Both);
    }
    if !delay.is_zero() {
        thread::sleep(delay);
    }
    write_response(stream, &response)
}

fn write_response(mut stream: TcpStream, response: &CannedResponse) -> io::Result<()> {
    let mut head = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n",
        response.status.as_u16(),
        response.status.canonical_reason().unwrap_or_default(),
        response.body.len()
    );
    if let Some(content_type) = &response.content_type {
        head.push_str(&format!("Content-Type: {content_type}\r\n"));
    }
    head.push_str("\r\n");
    stream.write_all(head.as_bytes())?;
    stream.write_all(&response.body)?;
    stream.flush()
}
