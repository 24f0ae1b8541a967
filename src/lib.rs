//! Minimal blocking HTTP/1.1 GET client.
//!
//! Three layers, each usable on its own:
//!
//! * [`transport`] moves bytes over plain TCP or TLS with certificate verification.
//! * [`client`] is a Sans-IO state machine that serializes a GET request and turns
//!   received bytes into [`Event`](client::Event)s. It never touches a socket.
//! * [`Agent`] ties the two together to perform one request per call.
//!
//! ```no_run
//! let (status, body) = toyhttp::simple_get("https://example.test/").unwrap();
//!
//! println!("{} {}", status, String::from_utf8_lossy(&body));
//! ```
//!
//! Each call uses a fresh connection that is closed before returning. There is no
//! pooling, no redirects, no cookies and no request bodies.
//!
//! # Logging
//!
//! Diagnostics go through the [`log`](https://docs.rs/log) crate. State transitions,
//! connects and framing decisions are logged at `debug`. Wire data is logged at
//! `trace`.

#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![deny(missing_docs)]

#[macro_use]
extern crate log;

mod agent;
mod body;
mod config;
mod error;
mod ext;
mod parser;
mod request;
mod response;
mod target;
mod util;

pub mod client;
pub mod transport;

pub use agent::{simple_get, simple_get_with_timeout, Agent};
pub use body::BodyMode;
pub use config::{Config, DEFAULT_USER_AGENT};
pub use error::{Error, ParseError};
pub use request::Request;
pub use response::Response;

// Re-export the basis for this library.
pub use http;
