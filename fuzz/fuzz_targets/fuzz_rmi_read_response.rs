//! Fuzzes read-data report parsing and the request encoders.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_rmi_read_response
#![no_main]
use hid_rmi_protocol::ReadResponse;
use hid_rmi_protocol::report::{encode_read_request, encode_set_page, encode_write};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(response) = ReadResponse::parse(data) {
        assert!(response.payload.len() <= usize::from(response.count));
        assert!(response.payload.len() + 2 <= data.len());
    }

    let [a, b, c, rest @ ..] = data else {
        return;
    };
    let mut buf = vec![0u8; usize::from(*c)];
    let addr = u16::from_le_bytes([*a, *b]);
    let _ = encode_write(&mut buf, addr, rest);
    let _ = encode_read_request(&mut buf, addr, u16::from(*c));
    let _ = encode_set_page(&mut buf, *a);
});
