//! Outgoing HTTP request workflow behind the `send` export.
//!
//! The workflow is written against [`HttpImports`], a trait whose associated
//! types are the WASI HTTP resource handles and whose methods are the host
//! calls. Handles are owned values: the host releases a handle when it is
//! dropped, and takes ownership of the ones it consumes (`handle` takes the
//! request and its options, `finish` takes the outgoing body). Locals are
//! declared in acquisition order, so every exit path, including `?`, releases
//! them in reverse order and child streams go before their parent bodies.

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;
use core::time::Duration;

/// Largest slice a single blocking write may carry.
pub const WRITE_CHUNK: usize = 4096;

/// Bytes requested per blocking read of the response body.
pub const READ_CHUNK: u64 = 4096;

/// Request method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Patch,
    Other(String),
}

/// Request scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

/// One of the three timeouts carried by the request options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    Connect,
    FirstByte,
    BetweenBytes,
}

impl fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TimeoutKind::Connect => "connect",
            TimeoutKind::FirstByte => "first byte",
            TimeoutKind::BetweenBytes => "between bytes",
        })
    }
}

/// Timeouts passed to the host with the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    pub first_byte: Duration,
    pub between_bytes: Duration,
}

impl Timeouts {
    /// The timeouts in the order they are applied.
    pub fn iter(&self) -> impl Iterator<Item = (TimeoutKind, Duration)> {
        [
            (TimeoutKind::Connect, self.connect),
            (TimeoutKind::FirstByte, self.first_byte),
            (TimeoutKind::BetweenBytes, self.between_bytes),
        ]
        .into_iter()
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(5),
            first_byte: Duration::from_secs(5),
            between_bytes: Duration::from_secs(5),
        }
    }
}

/// Everything `send` needs to build the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    pub method: Method,
    pub scheme: Scheme,
    pub authority: String,
    pub path_with_query: String,
    /// Header name and raw value pairs, in order.
    pub headers: Vec<(String, Vec<u8>)>,
    pub body: Vec<u8>,
    pub timeouts: Timeouts,
}

impl Default for RequestSpec {
    /// The request the HTTP starter sends: a JSON `POST` to a local server.
    fn default() -> Self {
        Self {
            method: Method::Post,
            scheme: Scheme::Http,
            authority: "localhost:9999".to_string(),
            path_with_query: "/post-example".to_string(),
            headers: alloc::vec![(
                "content-type".to_string(),
                b"application/json".to_vec()
            )],
            body: br#"{"message":"hello from a starter component"}"#.to_vec(),
            timeouts: Timeouts::default(),
        }
    }
}

/// A fully read response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Response {
    /// Body decoded as UTF-8, with invalid sequences replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Outcome of a failed stream operation.
///
/// `Closed` is the normal end of an input stream; anything else is fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    Closed,
    Failed(String),
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::Closed => f.write_str("stream closed"),
            StreamError::Failed(reason) => f.write_str(reason),
        }
    }
}

/// The step at which `send` gave up. `Display` is the message the export
/// returns to its caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    Headers(String),
    SetMethod,
    SetPath,
    SetScheme,
    SetAuthority,
    OutgoingBody,
    OutputStream,
    WriteBody(StreamError),
    FinishBody(String),
    SetTimeout(TimeoutKind),
    Dispatch(String),
    Request(String),
    ResponseTaken,
    IncomingBody,
    InputStream,
    ReadBody(String),
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::Headers(reason) => write!(f, "Failed to create request headers: {reason}"),
            SendError::SetMethod => f.write_str("Failed to set request method"),
            SendError::SetPath => f.write_str("Failed to set request path"),
            SendError::SetScheme => f.write_str("Failed to set request scheme"),
            SendError::SetAuthority => f.write_str("Failed to set request authority"),
            SendError::OutgoingBody => f.write_str("Failed to get outgoing request body"),
            SendError::OutputStream => f.write_str("Failed to open request body stream"),
            SendError::WriteBody(err) => write!(f, "Failed to write request body: {err}"),
            SendError::FinishBody(reason) => write!(f, "Failed to finish request body: {reason}"),
            SendError::SetTimeout(kind) => write!(f, "Failed to set {kind} timeout"),
            SendError::Dispatch(reason) => write!(f, "Failed to send request: {reason}"),
            SendError::Request(reason) => write!(f, "Request failed: {reason}"),
            SendError::ResponseTaken => f.write_str("Response was already taken"),
            SendError::IncomingBody => f.write_str("Failed to consume response body"),
            SendError::InputStream => f.write_str("Failed to open response body stream"),
            SendError::ReadBody(reason) => write!(f, "Failed to read response body: {reason}"),
        }
    }
}

/// Host calls used by [`send`].
///
/// Each associated type is an owned resource handle. Dropping a handle
/// releases it; methods taking a handle by value consume it.
pub trait HttpImports {
    type Request;
    type OutgoingBody;
    type OutputStream;
    type Options;
    type FutureResponse;
    type Pollable;
    type Response;
    type IncomingBody;
    type InputStream;

    /// Create a request carrying `headers`. `Err` describes a rejected header.
    fn new_request(&mut self, headers: &[(String, Vec<u8>)]) -> Result<Self::Request, String>;
    fn set_method(&mut self, request: &Self::Request, method: &Method) -> Result<(), ()>;
    fn set_path_with_query(&mut self, request: &Self::Request, path: &str) -> Result<(), ()>;
    fn set_scheme(&mut self, request: &Self::Request, scheme: Scheme) -> Result<(), ()>;
    fn set_authority(&mut self, request: &Self::Request, authority: &str) -> Result<(), ()>;

    /// Take the request's body. Succeeds at most once per request.
    fn outgoing_body(&mut self, request: &Self::Request) -> Result<Self::OutgoingBody, ()>;
    /// Open the body's output stream, a child of the body.
    fn output_stream(&mut self, body: &Self::OutgoingBody) -> Result<Self::OutputStream, ()>;
    /// Blocking write and flush of at most [`WRITE_CHUNK`] bytes.
    fn write(&mut self, stream: &Self::OutputStream, bytes: &[u8]) -> Result<(), StreamError>;
    /// Finish the body. Its output stream must already be released.
    fn finish(&mut self, body: Self::OutgoingBody) -> Result<(), String>;

    fn new_options(&mut self) -> Self::Options;
    fn set_timeout(
        &mut self,
        options: &Self::Options,
        kind: TimeoutKind,
        timeout: Duration,
    ) -> Result<(), ()>;

    /// Dispatch the request.
    fn handle(
        &mut self,
        request: Self::Request,
        options: Self::Options,
    ) -> Result<Self::FutureResponse, String>;
    /// Readiness handle for `future`, a child of the future.
    fn subscribe(&mut self, future: &Self::FutureResponse) -> Self::Pollable;
    /// Block until `pollable` is ready.
    fn block(&mut self, pollable: &Self::Pollable);
    /// `None` while pending; `Some(Err(()))` once the response was taken.
    #[allow(clippy::type_complexity)]
    fn poll(
        &mut self,
        future: &Self::FutureResponse,
    ) -> Option<Result<Result<Self::Response, String>, ()>>;

    fn status(&mut self, response: &Self::Response) -> u16;
    /// Take the response's body. Succeeds at most once per response.
    fn consume(&mut self, response: &Self::Response) -> Result<Self::IncomingBody, ()>;
    /// Open the body's input stream, a child of the body.
    fn input_stream(&mut self, body: &Self::IncomingBody) -> Result<Self::InputStream, ()>;
    /// Blocking read of up to `len` bytes. `Err(StreamError::Closed)` at end.
    fn read(&mut self, stream: &Self::InputStream, len: u64) -> Result<Vec<u8>, StreamError>;
}

/// Send the request described by `spec` and read the whole response.
pub fn send<H: HttpImports>(host: &mut H, spec: &RequestSpec) -> Result<Response, SendError> {
    let request = host
        .new_request(&spec.headers)
        .map_err(SendError::Headers)?;
    host.set_method(&request, &spec.method)
        .map_err(|()| SendError::SetMethod)?;
    host.set_path_with_query(&request, &spec.path_with_query)
        .map_err(|()| SendError::SetPath)?;
    host.set_scheme(&request, spec.scheme)
        .map_err(|()| SendError::SetScheme)?;
    host.set_authority(&request, &spec.authority)
        .map_err(|()| SendError::SetAuthority)?;

    write_body(host, &request, &spec.body)?;
    let options = request_options(host, &spec.timeouts)?;

    let future = host
        .handle(request, options)
        .map_err(SendError::Dispatch)?;
    let response = await_response(host, &future)?;
    let status = host.status(&response);
    let body = read_body(host, &response)?;

    Ok(Response { status, body })
}

/// [`send`] collapsed into the export's single string: the response body, or
/// the message of the step that failed.
pub fn send_to_string<H: HttpImports>(host: &mut H, spec: &RequestSpec) -> String {
    match send(host, spec) {
        Ok(response) => response.text(),
        Err(err) => err.to_string(),
    }
}

fn write_body<H: HttpImports>(
    host: &mut H,
    request: &H::Request,
    bytes: &[u8],
) -> Result<(), SendError> {
    let body = host
        .outgoing_body(request)
        .map_err(|()| SendError::OutgoingBody)?;
    {
        let stream = host
            .output_stream(&body)
            .map_err(|()| SendError::OutputStream)?;
        for chunk in bytes.chunks(WRITE_CHUNK) {
            host.write(&stream, chunk).map_err(SendError::WriteBody)?;
        }
    }
    host.finish(body).map_err(SendError::FinishBody)
}

fn request_options<H: HttpImports>(
    host: &mut H,
    timeouts: &Timeouts,
) -> Result<H::Options, SendError> {
    let options = host.new_options();
    for (kind, timeout) in timeouts.iter() {
        host.set_timeout(&options, kind, timeout)
            .map_err(|()| SendError::SetTimeout(kind))?;
    }
    Ok(options)
}

fn await_response<H: HttpImports>(
    host: &mut H,
    future: &H::FutureResponse,
) -> Result<H::Response, SendError> {
    loop {
        match host.poll(future) {
            Some(Ok(Ok(response))) => return Ok(response),
            Some(Ok(Err(code))) => return Err(SendError::Request(code)),
            Some(Err(())) => return Err(SendError::ResponseTaken),
            None => {
                let pollable = host.subscribe(future);
                host.block(&pollable);
            }
        }
    }
}

fn read_body<H: HttpImports>(
    host: &mut H,
    response: &H::Response,
) -> Result<Vec<u8>, SendError> {
    let body = host
        .consume(response)
        .map_err(|()| SendError::IncomingBody)?;
    let stream = host
        .input_stream(&body)
        .map_err(|()| SendError::InputStream)?;

    let mut bytes = Vec::new();
    loop {
        match host.read(&stream, READ_CHUNK) {
            Ok(chunk) => bytes.extend_from_slice(&chunk),
            Err(StreamError::Closed) => break,
            Err(StreamError::Failed(reason)) => return Err(SendError::ReadBody(reason)),
        }
    }
    Ok(bytes)
}
