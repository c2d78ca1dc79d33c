//! HTTP starter: `send` posts a JSON body to a local server through
//! `wasi:http/outgoing-handler` and returns the response body, or a message
//! naming the step that failed.

wit_bindgen::generate!({
    path: "wit",
    world: "http-send",
});

use core::time::Duration;
use exports::pack::name::api::Guest;
use starter_runtime::http::{
    send_to_string, HttpImports, Method, RequestSpec, Scheme, StreamError, TimeoutKind,
};
use wasi::http::outgoing_handler;
use wasi::http::types::{
    Fields, FutureIncomingResponse, IncomingBody, IncomingResponse, Method as WasiMethod,
    OutgoingBody, OutgoingRequest, RequestOptions, Scheme as WasiScheme,
};
use wasi::io::poll::Pollable;
use wasi::io::streams::{self, InputStream, OutputStream};

/// [`HttpImports`] over the WASI HTTP bindings. WASI resources release
/// themselves on drop.
struct WasiHttp;

fn wasi_method(method: &Method) -> WasiMethod {
    match method {
        Method::Get => WasiMethod::Get,
        Method::Head => WasiMethod::Head,
        Method::Post => WasiMethod::Post,
        Method::Put => WasiMethod::Put,
        Method::Delete => WasiMethod::Delete,
        Method::Patch => WasiMethod::Patch,
        Method::Other(other) => WasiMethod::Other(other.clone()),
    }
}

fn wasi_stream_error(err: streams::StreamError) -> StreamError {
    match err {
        streams::StreamError::Closed => StreamError::Closed,
        streams::StreamError::LastOperationFailed(err) => {
            StreamError::Failed(err.to_debug_string())
        }
    }
}

fn nanos(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX)
}

impl HttpImports for WasiHttp {
    type Request = OutgoingRequest;
    type OutgoingBody = OutgoingBody;
    type OutputStream = OutputStream;
    type Options = RequestOptions;
    type FutureResponse = FutureIncomingResponse;
    type Pollable = Pollable;
    type Response = IncomingResponse;
    type IncomingBody = IncomingBody;
    type InputStream = InputStream;

    fn new_request(&mut self, headers: &[(String, Vec<u8>)]) -> Result<OutgoingRequest, String> {
        let fields = Fields::from_list(headers).map_err(|err| format!("{err:?}"))?;
        Ok(OutgoingRequest::new(fields))
    }

    fn set_method(&mut self, request: &OutgoingRequest, method: &Method) -> Result<(), ()> {
        request.set_method(&wasi_method(method))
    }

    fn set_path_with_query(&mut self, request: &OutgoingRequest, path: &str) -> Result<(), ()> {
        request.set_path_with_query(Some(path))
    }

    fn set_scheme(&mut self, request: &OutgoingRequest, scheme: Scheme) -> Result<(), ()> {
        let scheme = match scheme {
            Scheme::Http => WasiScheme::Http,
            Scheme::Https => WasiScheme::Https,
        };
        request.set_scheme(Some(&scheme))
    }

    fn set_authority(&mut self, request: &OutgoingRequest, authority: &str) -> Result<(), ()> {
        request.set_authority(Some(authority))
    }

    fn outgoing_body(&mut self, request: &OutgoingRequest) -> Result<OutgoingBody, ()> {
        request.body()
    }

    fn output_stream(&mut self, body: &OutgoingBody) -> Result<OutputStream, ()> {
        body.write()
    }

    fn write(&mut self, stream: &OutputStream, bytes: &[u8]) -> Result<(), StreamError> {
        stream
            .blocking_write_and_flush(bytes)
            .map_err(wasi_stream_error)
    }

    fn finish(&mut self, body: OutgoingBody) -> Result<(), String> {
        OutgoingBody::finish(body, None).map_err(|code| format!("{code:?}"))
    }

    fn new_options(&mut self) -> RequestOptions {
        RequestOptions::new()
    }

    fn set_timeout(
        &mut self,
        options: &RequestOptions,
        kind: TimeoutKind,
        timeout: Duration,
    ) -> Result<(), ()> {
        let timeout = Some(nanos(timeout));
        match kind {
            TimeoutKind::Connect => options.set_connect_timeout(timeout),
            TimeoutKind::FirstByte => options.set_first_byte_timeout(timeout),
            TimeoutKind::BetweenBytes => options.set_between_bytes_timeout(timeout),
        }
    }

    fn handle(
        &mut self,
        request: OutgoingRequest,
        options: RequestOptions,
    ) -> Result<FutureIncomingResponse, String> {
        outgoing_handler::handle(request, Some(options)).map_err(|code| format!("{code:?}"))
    }

    fn subscribe(&mut self, future: &FutureIncomingResponse) -> Pollable {
        future.subscribe()
    }

    fn block(&mut self, pollable: &Pollable) {
        pollable.block();
    }

    fn poll(
        &mut self,
        future: &FutureIncomingResponse,
    ) -> Option<Result<Result<IncomingResponse, String>, ()>> {
        future
            .get()
            .map(|taken| taken.map(|response| response.map_err(|code| format!("{code:?}"))))
    }

    fn status(&mut self, response: &IncomingResponse) -> u16 {
        response.status()
    }

    fn consume(&mut self, response: &IncomingResponse) -> Result<IncomingBody, ()> {
        response.consume()
    }

    fn input_stream(&mut self, body: &IncomingBody) -> Result<InputStream, ()> {
        body.stream()
    }

    fn read(&mut self, stream: &InputStream, len: u64) -> Result<Vec<u8>, StreamError> {
        stream.blocking_read(len).map_err(wasi_stream_error)
    }
}

struct Component;

impl Guest for Component {
    fn send() -> String {
        send_to_string(&mut WasiHttp, &RequestSpec::default())
    }
}

export!(Component);
