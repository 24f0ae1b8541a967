//! HTTP/1.1 client protocol
//!
//! Sans-IO protocol impl, which means "writing" and "reading" are made via buffers
//! rather than the Write/Read std traits.
//!
//! The [`Flow`] object drives a single GET request/response cycle. Outgoing
//! bytes are produced by [`Flow::send_request`], incoming bytes are handed over
//! with [`Flow::feed`], and [`Flow::next_event`] turns them into [`Event`]s.
//!
//! The states are:
//!
//! * **Idle** - Nothing happened yet
//! * **RequestSent** - The request is serialized, but not confirmed written
//! * **AwaitingResponse** - The request is on the wire, no response bytes yet
//! * **ReceivingHeaders** - Response bytes arrived, looking for the end of headers
//! * **ReceivingBody** - Headers parsed, receiving the body
//! * **Complete** - The entire response is received
//! * **Closed** - The flow was closed, or the peer closed early
//! * **Errored** - The response could not be framed
//!
//! ```text
//!                            ┌──────────────────┐
//!                            │       Idle       │
//!                            └──────────────────┘
//!                                      │
//!                                      ▼
//!                            ┌──────────────────┐
//!                            │   RequestSent    │
//!                            └──────────────────┘
//!                                      │
//!                                      ▼
//!                            ┌──────────────────┐
//!                            │ AwaitingResponse │
//!                            └──────────────────┘
//!                                      │
//!                                      ▼
//!                            ┌──────────────────┐
//!                         ┌──│ ReceivingHeaders │
//!                         │  └──────────────────┘
//!                         │            │
//!                         │            ▼
//!                         │  ┌──────────────────┐
//!                         │  │  ReceivingBody   │
//!                         │  └──────────────────┘
//!                         │            │
//!                         │            ▼
//!                         │  ┌──────────────────┐
//!                         └─▶│     Complete     │
//!                            └──────────────────┘
//!
//!     Any state moves to Closed or Errored, both are terminal.
//! ```
//!
//! # Example
//!
//! ```
//! use toyhttp::client::{Event, Flow, State};
//! use toyhttp::Request;
//!
//! let request = Request::get("/my-path")
//!     .header("host", "example.test")
//!     .unwrap();
//!
//! let mut flow = Flow::new();
//!
//! // ********************************** Send request
//!
//! let output = flow.send_request(&request).unwrap();
//! assert_eq!(output, b"GET /my-path HTTP/1.1\r\nhost: example.test\r\n\r\n");
//!
//! // Once the bytes are written to the connection.
//! flow.request_sent().unwrap();
//! assert_eq!(flow.state(), State::AwaitingResponse);
//!
//! // ********************************** Receive response
//!
//! // Partial input is buffered until the headers are complete.
//! flow.feed(b"HTTP/1.1 200 OK\r\nContent-Len").unwrap();
//! assert_eq!(flow.next_event().unwrap(), Event::NeedMoreData);
//!
//! flow.feed(b"gth: 9\r\n\r\nhi there!").unwrap();
//!
//! let Event::Response(response) = flow.next_event().unwrap() else {
//!     panic!("Expected a response");
//! };
//! assert_eq!(response.status(), 200);
//!
//! // ********************************** Receive body
//!
//! assert_eq!(flow.next_event().unwrap(), Event::Body(b"hi there!".to_vec()));
//! assert_eq!(flow.next_event().unwrap(), Event::MessageComplete);
//! assert_eq!(flow.state(), State::Complete);
//!
//! flow.close();
//! ```
//!
//! # In scope:
//!
//! * GET requests without body
//! * `content-length`, `transfer-encoding: chunked` and close delimited bodies
//! * Interim 1xx responses (discarded)
//!
//! # Out of scope:
//!
//! * Opening/closing sockets, see [`Transport`](crate::transport::Transport)
//! * Request bodies, pipelining and connection reuse
//! * Redirects

use std::fmt;

use crate::body::{BodyMode, BodyReader};
use crate::error::{Error, ParseError};
use crate::ext::StatusExt;
use crate::parser::parse_response;
use crate::request::Request;
use crate::response::Response;
use crate::util::{find_header_end, log_data};


/// Max number of headers to parse from an HTTP response
pub const MAX_RESPONSE_HEADERS: usize = 128;

/// Default max size of a response header block.
pub const DEFAULT_MAX_HEADER_SIZE: usize = 16 * 1024;

/// Lifecycle state of a [`Flow`].
///
/// States only move forward in the order they are declared. `Closed` and
/// `Errored` can be reached from any state and are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum State {
    /// Nothing sent yet.
    Idle,
    /// Request serialized, waiting for confirmation it was written.
    RequestSent,
    /// Request written, no response bytes yet.
    AwaitingResponse,
    /// Receiving the status line and headers.
    ReceivingHeaders,
    /// Receiving the response body.
    ReceivingBody,
    /// The response is fully received.
    Complete,
    /// Closed by the user or by the peer.
    Closed,
    /// The response could not be framed.
    Errored,
}

impl State {
    fn is_terminal(&self) -> bool {
        matches!(self, State::Closed | State::Errored)
    }

    fn can_move_to(&self, next: State) -> bool {
        if self.is_terminal() {
            return false;
        }
        next.is_terminal() || next > *self
    }
}

/// Events produced from incoming response bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The buffered input holds no complete unit. Feed more data.
    NeedMoreData,

    /// The status line and headers. Emitted exactly once, before any body.
    Response(Response),

    /// A piece of the response body.
    Body(Vec<u8>),

    /// The response is complete. Repeated for every further call.
    MessageComplete,
}

/// State machine for one HTTP/1.1 request/response cycle.
///
/// See the [state graph][crate::client] in the module documentation.
pub struct Flow {
    state: State,
    input: Vec<u8>,
    reader: Option<BodyReader>,
    error: Option<ParseError>,
    max_header_size: usize,
}

impl Flow {
    /// Create a new flow in state `Idle`.
    pub fn new() -> Self {
        Flow {
            state: State::Idle,
            input: Vec::new(),
            reader: None,
            error: None,
            max_header_size: DEFAULT_MAX_HEADER_SIZE,
        }
    }

    /// Limit the size of the response header block.
    ///
    /// A header block that grows beyond this without being terminated fails
    /// with [`ParseError::HeaderTooLarge`].
    pub fn set_max_header_size(&mut self, max: usize) {
        self.max_header_size = max;
    }

    /// Current state.
    pub fn state(&self) -> State {
        self.state
    }

    /// Body framing of the response, once the headers are received.
    pub fn body_mode(&self) -> Option<BodyMode> {
        self.reader.as_ref().map(|r| r.body_mode())
    }

    /// Tell if the response body is close delimited.
    ///
    /// Such a body has no length indication. It only ends when the server closes
    /// the connection, which must be signaled with [`Flow::receive_eof`].
    pub fn is_close_delimited(&self) -> bool {
        self.reader
            .as_ref()
            .map(|r| r.is_close_delimited())
            .unwrap_or(false)
    }

    /// Serialize the request.
    ///
    /// The returned bytes must be written in full to the connection, followed by
    /// a call to [`Flow::request_sent`].
    pub fn send_request(&mut self, request: &Request) -> Result<Vec<u8>, Error> {
        self.check_errored()?;
        self.expect_state(State::Idle, "send request")?;

        let output = request.to_bytes();
        log_data(&output);

        self.transition(State::RequestSent)?;

        Ok(output)
    }

    /// Confirm the request bytes are written to the connection.
    pub fn request_sent(&mut self) -> Result<(), Error> {
        self.check_errored()?;
        self.expect_state(State::RequestSent, "confirm request sent")?;
        self.transition(State::AwaitingResponse)
    }

    /// Append received bytes to the input buffer.
    ///
    /// Nothing is parsed until [`Flow::next_event`] is called. An empty input is
    /// not an end of stream, use [`Flow::receive_eof`] for that.
    pub fn feed(&mut self, input: &[u8]) -> Result<(), Error> {
        self.check_errored()?;

        match self.state {
            State::AwaitingResponse => {
                if input.is_empty() {
                    return Ok(());
                }
                self.transition(State::ReceivingHeaders)?;
            }
            State::ReceivingHeaders | State::ReceivingBody => {}
            State::Complete => {
                if !input.is_empty() {
                    debug!("Ignore {} bytes after complete response", input.len());
                }
                return Ok(());
            }
            state => {
                return Err(Error::InvalidState {
                    state,
                    action: "feed input",
                })
            }
        }

        self.input.extend_from_slice(input);

        Ok(())
    }

    /// Signal that the peer closed the connection.
    ///
    /// This is how a close delimited body ends, the following [`Flow::next_event`]
    /// calls drain what is buffered and then give [`Event::MessageComplete`]. In any
    /// other unfinished state, this closes the flow and fails with [`Error::Connection`].
    pub fn receive_eof(&mut self) -> Result<(), Error> {
        self.check_errored()?;

        match self.state {
            State::Complete | State::Closed => Ok(()),
            State::ReceivingBody if self.is_close_delimited() => {
                if let Some(reader) = self.reader.as_mut() {
                    reader.finish_close_delimited();
                }
                debug!("Close delimited body ended by peer");
                Ok(())
            }
            State::ReceivingBody => {
                self.transition(State::Closed)?;
                Err(Error::unexpected_close("before end of response body"))
            }
            _ => {
                self.transition(State::Closed)?;
                Err(Error::unexpected_close("before response was received"))
            }
        }
    }

    /// Extract the next event from the buffered input.
    ///
    /// Call repeatedly until [`Event::NeedMoreData`] or [`Event::MessageComplete`].
    pub fn next_event(&mut self) -> Result<Event, Error> {
        self.check_errored()?;

        match self.state {
            State::AwaitingResponse => Ok(Event::NeedMoreData),
            State::ReceivingHeaders => self.next_response(),
            State::ReceivingBody => self.next_body(),
            State::Complete => Ok(Event::MessageComplete),
            state => Err(Error::InvalidState {
                state,
                action: "read next event",
            }),
        }
    }

    /// Close the flow. Idempotent, and a no-op once errored.
    pub fn close(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        debug!("{:?} -> {:?}", self.state, State::Closed);
        self.state = State::Closed;
        self.input.clear();
    }

    fn next_response(&mut self) -> Result<Event, Error> {
        loop {
            let Some(end) = find_header_end(&self.input) else {
                if self.input.len() > self.max_header_size {
                    return Err(self.fail(ParseError::HeaderTooLarge));
                }
                return Ok(Event::NeedMoreData);
            };

            if end > self.max_header_size {
                return Err(self.fail(ParseError::HeaderTooLarge));
            }

            let response = match parse_response::<MAX_RESPONSE_HEADERS>(&self.input[..end]) {
                Ok(v) => v,
                Err(e) => return Err(self.fail(e)),
            };

            log_data(&self.input[..end]);
            self.input.drain(..end);

            if response.status().is_interim() {
                debug!("Discard interim response: {}", response.status());
                continue;
            }

            let reader = match BodyReader::for_response(response.status(), response.headers()) {
                Ok(v) => v,
                Err(e) => return Err(self.fail(e)),
            };

            debug!("Response body mode: {:?}", reader.body_mode());

            let next = if reader.is_ended() {
                State::Complete
            } else {
                State::ReceivingBody
            };

            self.reader = Some(reader);
            self.transition(next)?;

            return Ok(Event::Response(response));
        }
    }

    fn next_body(&mut self) -> Result<Event, Error> {
        loop {
            let Some(reader) = self.reader.as_mut() else {
                return Err(Error::InvalidState {
                    state: self.state,
                    action: "read body without response",
                });
            };

            let (input_used, data) = match reader.read(&self.input) {
                Ok(v) => v,
                Err(e) => return Err(self.fail(e)),
            };
            let ended = reader.is_ended();

            let chunk = data.map(|r| self.input[r].to_vec());
            self.input.drain(..input_used);

            if ended {
                self.transition(State::Complete)?;
            }

            if let Some(chunk) = chunk.filter(|c| !c.is_empty()) {
                return Ok(Event::Body(chunk));
            }

            if ended {
                return Ok(Event::MessageComplete);
            }

            if input_used == 0 {
                return Ok(Event::NeedMoreData);
            }
        }
    }

    fn transition(&mut self, to: State) -> Result<(), Error> {
        if !self.state.can_move_to(to) {
            return Err(Error::InvalidTransition {
                from: self.state,
                to,
            });
        }

        debug!("{:?} -> {:?}", self.state, to);
        self.state = to;

        Ok(())
    }

    fn expect_state(&self, expected: State, action: &'static str) -> Result<(), Error> {
        if self.state != expected {
            return Err(Error::InvalidState {
                state: self.state,
                action,
            });
        }
        Ok(())
    }

    fn check_errored(&self) -> Result<(), Error> {
        match &self.error {
            Some(e) => Err(Error::Parse(e.clone())),
            None => Ok(()),
        }
    }

    fn fail(&mut self, e: ParseError) -> Error {
        debug!("{:?} -> {:?}: {}", self.state, State::Errored, e);
        self.state = State::Errored;
        self.error = Some(e.clone());
        self.input.clear();
        Error::Parse(e)
    }

    #[cfg(test)]
    pub(crate) fn buffered(&self) -> usize {
        self.input.len()
    }
}

impl Default for Flow {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Flow<{:?}>", self.state)
    }
}
