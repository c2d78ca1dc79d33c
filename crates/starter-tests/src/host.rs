use starter_runtime::http::{
    HttpImports, Method, Scheme, StreamError, TimeoutKind, READ_CHUNK, WRITE_CHUNK,
};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

/// Kinds of resource handed out by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Request,
    OutgoingBody,
    OutputStream,
    Options,
    FutureResponse,
    Pollable,
    Response,
    IncomingBody,
    InputStream,
}

/// Host calls that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    NewRequest,
    SetMethod,
    SetPath,
    SetScheme,
    SetAuthority,
    OutgoingBody,
    OutputStream,
    Write,
    Finish,
    SetTimeout(TimeoutKind),
    Handle,
    /// The future resolves to a request error.
    Request,
    /// The future reports its response as already taken.
    ResponseTaken,
    Consume,
    InputStream,
    Read,
}

impl Step {
    pub const ALL: [Step; 18] = [
        Step::NewRequest,
        Step::SetMethod,
        Step::SetPath,
        Step::SetScheme,
        Step::SetAuthority,
        Step::OutgoingBody,
        Step::OutputStream,
        Step::Write,
        Step::Finish,
        Step::SetTimeout(TimeoutKind::Connect),
        Step::SetTimeout(TimeoutKind::FirstByte),
        Step::SetTimeout(TimeoutKind::BetweenBytes),
        Step::Handle,
        Step::Request,
        Step::ResponseTaken,
        Step::Consume,
        Step::InputStream,
        Step::Read,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Acquired(Resource, u32),
    Released(Resource, u32),
    /// `finish` was called on the outgoing body.
    Finished(u32),
    /// `handle` took the request and options.
    Dispatched { request: u32, options: u32 },
    /// `block` waited on a pollable.
    Blocked(u32),
}

type Log = Rc<RefCell<Vec<Event>>>;

/// A resource handle. Dropping it logs its release.
#[derive(Debug)]
pub struct Handle {
    resource: Resource,
    id: u32,
    log: Log,
}

impl Handle {
    pub fn resource(&self) -> Resource {
        self.resource
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    fn assert_is(&self, resource: Resource) {
        assert_eq!(self.resource, resource, "handle {} passed as wrong type", self.id);
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.log
            .borrow_mut()
            .push(Event::Released(self.resource, self.id));
    }
}

/// What the request was configured with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordedRequest {
    pub headers: Vec<(String, Vec<u8>)>,
    pub method: Option<Method>,
    pub path_with_query: Option<String>,
    pub scheme: Option<Scheme>,
    pub authority: Option<String>,
    pub timeouts: Vec<(TimeoutKind, Duration)>,
    /// Body as written, one entry per `write` call.
    pub chunks: Vec<Vec<u8>>,
}

impl RecordedRequest {
    pub fn body(&self) -> Vec<u8> {
        self.chunks.concat()
    }
}

/// In-memory HTTP host that records every handle it creates and releases.
#[derive(Debug)]
pub struct RecordingHost {
    log: Log,
    next_id: u32,
    fail: Option<Step>,
    pending_polls: usize,
    blocks: usize,
    status: u16,
    response_chunks: VecDeque<Vec<u8>>,
    pub request: RecordedRequest,
}

impl Default for RecordingHost {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingHost {
    /// A host answering `200` with an empty body as soon as it is polled.
    pub fn new() -> Self {
        Self {
            log: Rc::new(RefCell::new(Vec::new())),
            next_id: 0,
            fail: None,
            pending_polls: 0,
            blocks: 0,
            status: 200,
            response_chunks: VecDeque::new(),
            request: RecordedRequest::default(),
        }
    }

    /// Answer with `status` and `body`, delivered `chunk` bytes per read.
    pub fn with_response(mut self, status: u16, body: &[u8], chunk: usize) -> Self {
        let chunk = chunk.clamp(1, READ_CHUNK as usize);
        self.status = status;
        self.response_chunks = body.chunks(chunk).map(<[u8]>::to_vec).collect();
        self
    }

    /// Keep the response pending until the caller has blocked `polls` times.
    pub fn with_pending_polls(mut self, polls: usize) -> Self {
        self.pending_polls = polls;
        self
    }

    /// Make `step` fail.
    pub fn failing_at(mut self, step: Step) -> Self {
        self.fail = Some(step);
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.log.borrow().clone()
    }

    /// Number of handles of `resource` that were acquired.
    pub fn acquired(&self, resource: Resource) -> usize {
        self.log
            .borrow()
            .iter()
            .filter(|event| matches!(event, Event::Acquired(r, _) if *r == resource))
            .count()
    }

    /// Panics unless every acquired handle was released exactly once, after
    /// it was acquired.
    pub fn assert_all_released(&self) {
        let events = self.log.borrow();
        for (at, event) in events.iter().enumerate() {
            let Event::Acquired(resource, id) = event else {
                continue;
            };
            let releases: Vec<_> = events
                .iter()
                .enumerate()
                .filter(|(_, e)| **e == Event::Released(*resource, *id))
                .map(|(position, _)| position)
                .collect();
            assert_eq!(
                releases.len(),
                1,
                "{resource:?} {id} released {} times",
                releases.len()
            );
            assert!(releases[0] > at, "{resource:?} {id} released before acquired");
        }
    }

    /// Position of `event` in the log.
    pub fn position(&self, event: &Event) -> Option<usize> {
        self.log.borrow().iter().position(|e| e == event)
    }

    /// Position of the release of the first handle of `resource`.
    pub fn released_at(&self, resource: Resource) -> Option<usize> {
        self.log
            .borrow()
            .iter()
            .position(|e| matches!(e, Event::Released(r, _) if *r == resource))
    }

    fn acquire(&mut self, resource: Resource) -> Handle {
        let id = self.next_id;
        self.next_id += 1;
        self.log.borrow_mut().push(Event::Acquired(resource, id));
        Handle {
            resource,
            id,
            log: Rc::clone(&self.log),
        }
    }

    fn fails(&self, step: Step) -> bool {
        self.fail == Some(step)
    }

    fn check(&self, step: Step) -> Result<(), ()> {
        if self.fails(step) {
            Err(())
        } else {
            Ok(())
        }
    }
}

impl HttpImports for RecordingHost {
    type Request = Handle;
    type OutgoingBody = Handle;
    type OutputStream = Handle;
    type Options = Handle;
    type FutureResponse = Handle;
    type Pollable = Handle;
    type Response = Handle;
    type IncomingBody = Handle;
    type InputStream = Handle;

    fn new_request(&mut self, headers: &[(String, Vec<u8>)]) -> Result<Handle, String> {
        if self.fails(Step::NewRequest) {
            return Err("invalid header value".to_string());
        }
        self.request.headers = headers.to_vec();
        Ok(self.acquire(Resource::Request))
    }

    fn set_method(&mut self, request: &Handle, method: &Method) -> Result<(), ()> {
        request.assert_is(Resource::Request);
        self.check(Step::SetMethod)?;
        self.request.method = Some(method.clone());
        Ok(())
    }

    fn set_path_with_query(&mut self, request: &Handle, path: &str) -> Result<(), ()> {
        request.assert_is(Resource::Request);
        self.check(Step::SetPath)?;
        self.request.path_with_query = Some(path.to_string());
        Ok(())
    }

    fn set_scheme(&mut self, request: &Handle, scheme: Scheme) -> Result<(), ()> {
        request.assert_is(Resource::Request);
        self.check(Step::SetScheme)?;
        self.request.scheme = Some(scheme);
        Ok(())
    }

    fn set_authority(&mut self, request: &Handle, authority: &str) -> Result<(), ()> {
        request.assert_is(Resource::Request);
        self.check(Step::SetAuthority)?;
        self.request.authority = Some(authority.to_string());
        Ok(())
    }

    fn outgoing_body(&mut self, request: &Handle) -> Result<Handle, ()> {
        request.assert_is(Resource::Request);
        self.check(Step::OutgoingBody)?;
        Ok(self.acquire(Resource::OutgoingBody))
    }

    fn output_stream(&mut self, body: &Handle) -> Result<Handle, ()> {
        body.assert_is(Resource::OutgoingBody);
        self.check(Step::OutputStream)?;
        Ok(self.acquire(Resource::OutputStream))
    }

    fn write(&mut self, stream: &Handle, bytes: &[u8]) -> Result<(), StreamError> {
        stream.assert_is(Resource::OutputStream);
        assert!(
            bytes.len() <= WRITE_CHUNK,
            "blocking write of {} bytes",
            bytes.len()
        );
        if self.fails(Step::Write) {
            return Err(StreamError::Failed("broken pipe".to_string()));
        }
        self.request.chunks.push(bytes.to_vec());
        Ok(())
    }

    fn finish(&mut self, body: Handle) -> Result<(), String> {
        body.assert_is(Resource::OutgoingBody);
        self.log.borrow_mut().push(Event::Finished(body.id));
        if self.fails(Step::Finish) {
            return Err("body size mismatch".to_string());
        }
        Ok(())
    }

    fn new_options(&mut self) -> Handle {
        self.acquire(Resource::Options)
    }

    fn set_timeout(
        &mut self,
        options: &Handle,
        kind: TimeoutKind,
        timeout: Duration,
    ) -> Result<(), ()> {
        options.assert_is(Resource::Options);
        self.check(Step::SetTimeout(kind))?;
        self.request.timeouts.push((kind, timeout));
        Ok(())
    }

    fn handle(&mut self, request: Handle, options: Handle) -> Result<Handle, String> {
        request.assert_is(Resource::Request);
        options.assert_is(Resource::Options);
        self.log.borrow_mut().push(Event::Dispatched {
            request: request.id,
            options: options.id,
        });
        drop(options);
        drop(request);
        if self.fails(Step::Handle) {
            return Err("HTTPRequestURIInvalid".to_string());
        }
        Ok(self.acquire(Resource::FutureResponse))
    }

    fn subscribe(&mut self, future: &Handle) -> Handle {
        future.assert_is(Resource::FutureResponse);
        self.acquire(Resource::Pollable)
    }

    fn block(&mut self, pollable: &Handle) {
        pollable.assert_is(Resource::Pollable);
        self.log.borrow_mut().push(Event::Blocked(pollable.id));
        self.blocks += 1;
    }

    fn poll(&mut self, future: &Handle) -> Option<Result<Result<Handle, String>, ()>> {
        future.assert_is(Resource::FutureResponse);
        if self.blocks < self.pending_polls {
            return None;
        }
        if self.fails(Step::Request) {
            return Some(Ok(Err("ConnectionRefused".to_string())));
        }
        if self.fails(Step::ResponseTaken) {
            return Some(Err(()));
        }
        Some(Ok(Ok(self.acquire(Resource::Response))))
    }

    fn status(&mut self, response: &Handle) -> u16 {
        response.assert_is(Resource::Response);
        self.status
    }

    fn consume(&mut self, response: &Handle) -> Result<Handle, ()> {
        response.assert_is(Resource::Response);
        self.check(Step::Consume)?;
        Ok(self.acquire(Resource::IncomingBody))
    }

    fn input_stream(&mut self, body: &Handle) -> Result<Handle, ()> {
        body.assert_is(Resource::IncomingBody);
        self.check(Step::InputStream)?;
        Ok(self.acquire(Resource::InputStream))
    }

    fn read(&mut self, stream: &Handle, len: u64) -> Result<Vec<u8>, StreamError> {
        stream.assert_is(Resource::InputStream);
        if self.fails(Step::Read) {
            return Err(StreamError::Failed("connection reset".to_string()));
        }
        match self.response_chunks.pop_front() {
            Some(chunk) => {
                assert!(chunk.len() as u64 <= len, "read returned more than asked");
                Ok(chunk)
            }
            None => Err(StreamError::Closed),
        }
    }
}
