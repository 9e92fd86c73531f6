#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;

use hazelgrid_core::protocol::Frame;

fuzz_target!(|data: &[u8]| {
    let mut buf = BytesMut::from(data);

    while !buf.is_empty() {
        match Frame::read_from(&mut buf) {
            Ok(Some(frame)) => {
                let _ = frame.is_begin_frame();
                let _ = frame.is_end_frame();
                assert_eq!(frame.wire_size(), frame.frame_length() + 4);
            }
            Ok(None) | Err(_) => break,
        }
    }
});
