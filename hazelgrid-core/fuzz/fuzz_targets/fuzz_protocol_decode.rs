#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;

use hazelgrid_core::protocol::{Protocol, ProtocolCodec};
use tokio_util::codec::{Decoder, Encoder};

fuzz_target!(|data: &[u8]| {
    let mut codec = ProtocolCodec::with_max_frame_size(64 * 1024);
    let mut buf = BytesMut::from(data);

    while let Ok(Some(message)) = codec.decode(&mut buf) {
        // Anything that decodes must re-encode to an equal message.
        let mut encoded = BytesMut::new();
        codec.encode(message.clone(), &mut encoded).unwrap();
        let again: Protocol = ProtocolCodec::new().decode(&mut encoded).unwrap().unwrap();
        assert_eq!(again, message);
        let _ = message.is_retryable();
        let _ = message.into_result();
    }
});
