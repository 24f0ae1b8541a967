#![no_main]

use libfuzzer_sys::fuzz_target;
use toyhttp::client::{Event, Flow, State};
use toyhttp::Request;

// Response heads that steer the flow into each body mode
const HEADS: &[&[u8]] = &[
    b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\n",
    b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n",
    b"HTTP/1.0 200 OK\r\n\r\n",
    b"HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 204 No Content\r\n\r\n",
    b"",
];

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    let request = Request::get("/fuzz").header("host", "fuzz.test").unwrap();

    let mut flow = Flow::new();
    flow.send_request(&request).unwrap();
    flow.request_sent().unwrap();

    // First byte picks a prepared head, second byte the feed size
    let head = HEADS[(data[0] as usize) % HEADS.len()];
    let step = (data[1] as usize % 64) + 1;

    let mut input = head.to_vec();
    input.extend_from_slice(&data[2..]);

    let mut seen_response = false;

    for piece in input.chunks(step) {
        if flow.feed(piece).is_err() {
            return;
        }
        if !drain(&mut flow, &mut seen_response) {
            return;
        }
    }

    if flow.receive_eof().is_err() {
        assert_eq!(flow.state(), State::Closed);
        return;
    }

    drain(&mut flow, &mut seen_response);
});

/// Drain events. Returns false once the flow is complete or failed.
fn drain(flow: &mut Flow, seen_response: &mut bool) -> bool {
    loop {
        match flow.next_event() {
            Ok(Event::NeedMoreData) => return true,
            Ok(Event::Response(_)) => {
                assert!(!*seen_response, "response emitted twice");
                *seen_response = true;
            }
            Ok(Event::Body(data)) => {
                assert!(*seen_response, "body before response");
                assert!(!data.is_empty());
            }
            Ok(Event::MessageComplete) => {
                assert!(*seen_response, "complete before response");
                assert_eq!(flow.state(), State::Complete);
                return false;
            }
            Err(_) => {
                assert_eq!(flow.state(), State::Errored);
                return false;
            }
        }
    }
}
