#![no_main]

use libfuzzer_sys::fuzz_target;

use hazelgrid_core::serialization::{ByteOrder, SerializationService};

fuzz_target!(|data: &[u8]| {
    let service = SerializationService::builder()
        .byte_order(ByteOrder::LittleEndian)
        .with_builtin_serializers()
        .unwrap()
        .build();
    let mut input = service.create_input(data);

    while let Ok(value) = service.read_data(&mut input) {
        let _ = value.partition_hash();
        let _ = service.from_data_any(&value);
    }
});
