//! Fuzz target: `Request::decode`
//!
//! Feeds arbitrary payloads to the request decoder and checks that it
//! never panics and that anything it accepts re-encodes to a prefix of
//! the input.
//!
//! cargo fuzz run fuzz_request_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use rhythmbadge::rpc::messages::Request;
use rhythmbadge::rpc::reassembly::MAX_REQUEST_PAYLOAD;

fuzz_target!(|data: &[u8]| {
    let Ok(request) = Request::decode(data) else {
        return;
    };

    let mut out = [0u8; MAX_REQUEST_PAYLOAD];
    let n = request
        .encode(&mut out)
        .expect("decoded request must re-encode");
    assert!(n <= data.len(), "encoding longer than its source");
    assert_eq!(Request::decode(&out[..n]), Ok(request));
});
