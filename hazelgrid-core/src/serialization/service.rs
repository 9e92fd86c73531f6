//! The serialization registry and entry point.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

use tracing::debug;

use super::data_output::CountingDataOutput;
use super::serializer::*;
use super::{
    ByteOrder, Data, DataInput, DataOutput, ObjectDataInput, ObjectDataInputStream,
    ObjectDataOutput, ObjectDataOutputStream,
};
use crate::error::{GridError, Result};

#[derive(Default)]
struct Registry {
    by_id: HashMap<i32, Arc<dyn ErasedSerializer>>,
    by_type: HashMap<TypeId, i32>,
}

/// Collects serializers during startup and freezes them into a [`SerializationService`].
///
/// The builder starts empty; call [`with_builtin_serializers`](Self::with_builtin_serializers)
/// to add the primitive, string and array encodings.
pub struct SerializationServiceBuilder {
    byte_order: ByteOrder,
    registry: Registry,
}

impl SerializationServiceBuilder {
    /// Creates an empty big-endian builder.
    pub fn new() -> Self {
        Self {
            byte_order: ByteOrder::BigEndian,
            registry: Registry::default(),
        }
    }

    /// Sets the byte order used by the service and every stream it creates.
    pub fn byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    /// Registers `serializer` under its type id.
    ///
    /// Fails with [`GridError::DuplicateTypeId`] if the id is taken, or with a
    /// configuration error if the Rust type already has a serializer.
    pub fn register<S: StreamSerializer>(mut self, serializer: S) -> Result<Self> {
        let type_id = serializer.type_identifier();
        if self.registry.by_id.contains_key(&type_id) {
            return Err(GridError::DuplicateTypeId(type_id));
        }
        let target = TypeId::of::<S::Target>();
        if let Some(existing) = self.registry.by_type.get(&target) {
            return Err(GridError::Configuration(format!(
                "{} is already registered under type id {}",
                std::any::type_name::<S::Target>(),
                existing
            )));
        }
        debug!(
            type_id,
            rust_type = std::any::type_name::<S::Target>(),
            "registered serializer"
        );
        self.registry.by_type.insert(target, type_id);
        self.registry.by_id.insert(type_id, Arc::new(serializer));
        Ok(self)
    }

    /// Registers an encode/decode closure pair under `type_id`.
    pub fn register_fn<T, E, D>(self, type_id: i32, encode: E, decode: D) -> Result<Self>
    where
        T: Send + 'static,
        E: Fn(&mut dyn DataOutput, &T) -> Result<()> + Send + Sync + 'static,
        D: Fn(&mut dyn DataInput) -> Result<T> + Send + Sync + 'static,
    {
        self.register(FnSerializer::new(type_id, encode, decode))
    }

    /// Registers the built-in serializers for primitives, strings, raw bytes and arrays.
    pub fn with_builtin_serializers(self) -> Result<Self> {
        self.register(ByteSerializer)?
            .register(BooleanSerializer)?
            .register(CharSerializer)?
            .register(ShortSerializer)?
            .register(IntegerSerializer)?
            .register(LongSerializer)?
            .register(FloatSerializer)?
            .register(DoubleSerializer)?
            .register(StringSerializer)?
            .register(ByteArraySerializer::new())?
            .register(CharArraySerializer)?
            .register(ShortArraySerializer)?
            .register(IntegerArraySerializer)?
            .register(LongArraySerializer)?
            .register(FloatArraySerializer)?
            .register(DoubleArraySerializer)?
            .register(BooleanArraySerializer)
    }

    /// Freezes the registry.
    pub fn build(self) -> SerializationService {
        SerializationService {
            byte_order: self.byte_order,
            registry: Arc::new(self.registry),
        }
    }
}

impl Default for SerializationServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Converts between typed values and [`Data`].
///
/// The registry is immutable once built, so lookups take no lock and the
/// service can be shared freely between threads. Cloning is cheap.
#[derive(Clone)]
pub struct SerializationService {
    byte_order: ByteOrder,
    registry: Arc<Registry>,
}

impl SerializationService {
    /// Returns a new builder.
    pub fn builder() -> SerializationServiceBuilder {
        SerializationServiceBuilder::new()
    }

    /// Returns the byte order fixed at construction.
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Returns true if a serializer is registered for `type_id`.
    pub fn is_registered(&self, type_id: i32) -> bool {
        self.registry.by_id.contains_key(&type_id)
    }

    /// Returns the type id registered for `T`.
    pub fn type_id_of<T: Any>(&self) -> Option<i32> {
        self.registry.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Serializes `value` into a new [`Data`].
    pub fn to_data<T: Any>(&self, value: &T) -> Result<Data> {
        let (type_id, serializer) = self.serializer_for::<T>()?;
        let mut out = self.create_output();
        serializer.write_any(&mut out, value)?;
        Ok(Data::from_bytes(type_id, out.freeze()))
    }

    /// Deserializes `data` as a `T`.
    pub fn from_data<T: Any>(&self, data: &Data) -> Result<T> {
        let serializer = self.serializer_by_id(data.type_id())?;
        if serializer.target_type() != TypeId::of::<T>() {
            return Err(GridError::Serialization(format!(
                "type id {} decodes to {}, not {}",
                data.type_id(),
                serializer.target_name(),
                std::any::type_name::<T>()
            )));
        }
        let value = self.decode(serializer, data)?;
        value.downcast::<T>().map(|v| *v).map_err(|_| {
            GridError::Serialization(format!(
                "decoded value is not a {}",
                std::any::type_name::<T>()
            ))
        })
    }

    /// Deserializes `data` into whatever type is registered for its type id.
    pub fn from_data_any(&self, data: &Data) -> Result<Box<dyn Any + Send>> {
        let serializer = self.serializer_by_id(data.type_id())?;
        self.decode(serializer, data)
    }

    /// Writes `data` as `[type_id][length][payload]`.
    pub fn write_data(&self, out: &mut dyn DataOutput, data: &Data) -> Result<()> {
        self.check_order(out.byte_order())?;
        out.write_int(data.type_id())?;
        out.write_int(payload_len(data.len())?)?;
        out.write_bytes(data.as_bytes())
    }

    /// Reads a value written by [`write_data`](Self::write_data).
    pub fn read_data(&self, input: &mut dyn DataInput) -> Result<Data> {
        self.check_order(input.byte_order())?;
        let type_id = input.read_int()?;
        let len = input.read_int()?;
        if len < 0 {
            return Err(GridError::CorruptPayload(format!(
                "negative payload length {} for type id {}",
                len, type_id
            )));
        }
        let payload = input.read_bytes(len as usize)?;
        Ok(Data::from_bytes(type_id, payload))
    }

    /// Serializes `value` straight into `out` with the same framing as
    /// [`write_data`](Self::write_data), without building an intermediate buffer.
    pub fn write_object<T: Any>(&self, out: &mut dyn DataOutput, value: &T) -> Result<()> {
        self.check_order(out.byte_order())?;
        let (type_id, serializer) = self.serializer_for::<T>()?;

        let mut counter = CountingDataOutput::new(self.byte_order);
        serializer.write_any(&mut counter, value)?;

        out.write_int(type_id)?;
        out.write_int(payload_len(counter.count())?)?;
        serializer.write_any(out, value)
    }

    /// Reads a value written by [`write_object`](Self::write_object) or
    /// [`write_data`](Self::write_data).
    pub fn read_object<T: Any>(&self, input: &mut dyn DataInput) -> Result<T> {
        let data = self.read_data(input)?;
        self.from_data(&data)
    }

    /// Creates a buffer output in this service's byte order.
    pub fn create_output(&self) -> ObjectDataOutput {
        ObjectDataOutput::with_byte_order(self.byte_order)
    }

    /// Creates a slice input in this service's byte order.
    pub fn create_input<'a>(&self, bytes: &'a [u8]) -> ObjectDataInput<'a> {
        ObjectDataInput::with_byte_order(bytes, self.byte_order)
    }

    /// Wraps a sink in this service's byte order.
    pub fn create_output_stream<W: Write>(&self, sink: W) -> ObjectDataOutputStream<W> {
        ObjectDataOutputStream::new(sink, self.byte_order)
    }

    /// Wraps a source in this service's byte order.
    pub fn create_input_stream<R: Read>(&self, source: R) -> ObjectDataInputStream<R> {
        ObjectDataInputStream::new(source, self.byte_order)
    }

    fn serializer_for<T: Any>(&self) -> Result<(i32, &dyn ErasedSerializer)> {
        let type_id = self.type_id_of::<T>().ok_or_else(|| {
            GridError::UnknownType(format!(
                "no serializer registered for {}",
                std::any::type_name::<T>()
            ))
        })?;
        Ok((type_id, self.serializer_by_id(type_id)?))
    }

    fn serializer_by_id(&self, type_id: i32) -> Result<&dyn ErasedSerializer> {
        self.registry
            .by_id
            .get(&type_id)
            .map(|s| s.as_ref())
            .ok_or_else(|| GridError::UnknownType(format!("no serializer for type id {}", type_id)))
    }

    fn decode(
        &self,
        serializer: &dyn ErasedSerializer,
        data: &Data,
    ) -> Result<Box<dyn Any + Send>> {
        let mut input = self.create_input(data.as_bytes());
        let value = serializer.read_any(&mut input)?;
        if input.remaining() > 0 {
            return Err(GridError::CorruptPayload(format!(
                "{} trailing bytes after decoding type id {}",
                input.remaining(),
                data.type_id()
            )));
        }
        Ok(value)
    }

    fn check_order(&self, order: ByteOrder) -> Result<()> {
        if order != self.byte_order {
            return Err(GridError::Serialization(format!(
                "stream byte order {} does not match service byte order {}",
                order, self.byte_order
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for SerializationService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.registry.by_id.keys().copied().collect();
        ids.sort_unstable();
        f.debug_struct("SerializationService")
            .field("byte_order", &self.byte_order)
            .field("type_ids", &ids)
            .finish()
    }
}

fn payload_len(len: usize) -> Result<i32> {
    i32::try_from(len).map_err(|_| {
        GridError::Serialization(format!("payload of {} bytes exceeds the length prefix", len))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builtins(order: ByteOrder) -> SerializationService {
        SerializationService::builder()
            .byte_order(order)
            .with_builtin_serializers()
            .unwrap()
            .build()
    }

    #[test]
    fn test_passthrough_type_three_wire_bytes() {
        let service = SerializationService::builder()
            .register(ByteArraySerializer::with_type_id(3))
            .unwrap()
            .build();

        let data = service.to_data(&vec![0x01u8, 0x02, 0x03]).unwrap();
        assert_eq!(data.type_id(), 3);
        assert_eq!(data.as_bytes(), &[0x01, 0x02, 0x03]);

        let mut out = service.create_output();
        service.write_data(&mut out, &data).unwrap();
        assert_eq!(
            out.as_bytes(),
            &[0, 0, 0, 3, 0, 0, 0, 3, 0x01, 0x02, 0x03]
        );

        let restored: Vec<u8> = service.from_data(&data).unwrap();
        assert_eq!(restored, vec![1, 2, 3]);
    }

    #[test]
    fn test_duplicate_type_id() {
        let result = SerializationService::builder()
            .register(ByteArraySerializer::with_type_id(3))
            .unwrap()
            .register_fn(
                3,
                |out: &mut dyn DataOutput, v: &i32| out.write_int(*v),
                |input: &mut dyn DataInput| input.read_int(),
            );
        assert!(matches!(result, Err(GridError::DuplicateTypeId(3))));
    }

    #[test]
    fn test_same_rust_type_twice_is_configuration_error() {
        let result = SerializationService::builder()
            .register(ByteArraySerializer::with_type_id(3))
            .unwrap()
            .register(ByteArraySerializer::with_type_id(4));
        assert!(matches!(result, Err(GridError::Configuration(_))));
    }

    #[test]
    fn test_unknown_type_both_directions() {
        let service = SerializationService::builder().build();
        assert!(matches!(service.to_data(&5i32), Err(GridError::UnknownType(_))));
        let data = Data::from_bytes(42, vec![0, 0, 0, 1]);
        assert!(matches!(
            service.from_data::<i32>(&data),
            Err(GridError::UnknownType(_))
        ));
        assert!(matches!(
            service.from_data_any(&data),
            Err(GridError::UnknownType(_))
        ));
    }

    #[test]
    fn test_builtin_roundtrip_both_orders() {
        for order in [ByteOrder::BigEndian, ByteOrder::LittleEndian] {
            let service = builtins(order);
            let text = "n\u{00E4}me\u{0}\u{1F600}".to_string();
            let data = service.to_data(&text).unwrap();
            assert_eq!(data.type_id(), CONSTANT_TYPE_STRING);
            assert_eq!(service.from_data::<String>(&data).unwrap(), text);

            let longs = vec![i64::MIN, 0, i64::MAX];
            let data = service.to_data(&longs).unwrap();
            assert_eq!(service.from_data::<Vec<i64>>(&data).unwrap(), longs);

            let data = service.to_data(&f64::NAN).unwrap();
            let back = service.from_data::<f64>(&data).unwrap();
            assert_eq!(back.to_bits(), f64::NAN.to_bits());

            let data = service.to_data(&true).unwrap();
            assert!(service.from_data::<bool>(&data).unwrap());
        }
    }

    #[test]
    fn test_order_is_visible_in_payload() {
        let big = builtins(ByteOrder::BigEndian).to_data(&1i32).unwrap();
        let little = builtins(ByteOrder::LittleEndian).to_data(&1i32).unwrap();
        assert_eq!(big.as_bytes(), &[0, 0, 0, 1]);
        assert_eq!(little.as_bytes(), &[1, 0, 0, 0]);
    }

    #[test]
    fn test_trailing_bytes_are_corrupt_payload() {
        let service = builtins(ByteOrder::BigEndian);
        let data = Data::from_bytes(CONSTANT_TYPE_INTEGER, vec![0, 0, 0, 1, 0xAA]);
        assert!(matches!(
            service.from_data::<i32>(&data),
            Err(GridError::CorruptPayload(_))
        ));
    }

    #[test]
    fn test_overrun_is_corrupt_payload() {
        let service = builtins(ByteOrder::BigEndian);
        let data = Data::from_bytes(CONSTANT_TYPE_LONG, vec![0, 0, 0, 1]);
        assert!(matches!(
            service.from_data::<i64>(&data),
            Err(GridError::CorruptPayload(_))
        ));

        let data = Data::from_bytes(CONSTANT_TYPE_STRING, vec![0, 0, 0, 9, b'a']);
        assert!(matches!(
            service.from_data::<String>(&data),
            Err(GridError::CorruptPayload(_))
        ));
    }

    #[test]
    fn test_requested_type_mismatch() {
        let service = builtins(ByteOrder::BigEndian);
        let data = service.to_data(&7i32).unwrap();
        assert!(matches!(
            service.from_data::<i64>(&data),
            Err(GridError::Serialization(_))
        ));
    }

    #[test]
    fn test_from_data_any() {
        let service = builtins(ByteOrder::BigEndian);
        let data = service.to_data(&"abc".to_string()).unwrap();
        let value = service.from_data_any(&data).unwrap();
        assert_eq!(value.downcast_ref::<String>().map(String::as_str), Some("abc"));
    }

    #[test]
    fn test_write_object_matches_to_data_framing() {
        let service = builtins(ByteOrder::LittleEndian);
        let value = vec![1.5f32, -2.0];

        let mut framed = service.create_output();
        service
            .write_data(&mut framed, &service.to_data(&value).unwrap())
            .unwrap();

        let mut streamed = service.create_output_stream(Vec::new());
        service.write_object(&mut streamed, &value).unwrap();
        assert_eq!(framed.as_bytes(), streamed.get_ref().as_slice());

        let bytes = streamed.into_inner();
        let mut input = service.create_input_stream(bytes.as_slice());
        let back: Vec<f32> = service.read_object(&mut input).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_stream_order_mismatch_is_rejected() {
        let service = builtins(ByteOrder::BigEndian);
        let data = service.to_data(&1i32).unwrap();
        let mut out = ObjectDataOutput::with_byte_order(ByteOrder::LittleEndian);
        assert!(matches!(
            service.write_data(&mut out, &data),
            Err(GridError::Serialization(_))
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn test_read_data_negative_length() {
        let service = builtins(ByteOrder::BigEndian);
        let bytes = [0, 0, 0, 3, 0xFF, 0xFF, 0xFF, 0xFE];
        let mut input = service.create_input(&bytes);
        assert!(matches!(
            service.read_data(&mut input),
            Err(GridError::CorruptPayload(_))
        ));
    }

    #[test]
    fn test_read_data_sequence() {
        let service = builtins(ByteOrder::BigEndian);
        let first = service.to_data(&1i8).unwrap();
        let second = Data::from_bytes(99, Vec::new());
        let mut out = service.create_output();
        service.write_data(&mut out, &first).unwrap();
        service.write_data(&mut out, &second).unwrap();

        let bytes = out.freeze();
        let mut input = service.create_input(&bytes);
        assert_eq!(service.read_data(&mut input).unwrap(), first);
        let empty = service.read_data(&mut input).unwrap();
        assert_eq!(empty, second);
        assert_eq!(empty.partition_hash(), 0);
        assert_eq!(input.remaining(), 0);
    }

    #[test]
    fn test_registry_lookups() {
        let service = builtins(ByteOrder::BigEndian);
        assert!(service.is_registered(CONSTANT_TYPE_BYTE_ARRAY));
        assert!(!service.is_registered(3));
        assert_eq!(service.type_id_of::<Vec<u8>>(), Some(CONSTANT_TYPE_BYTE_ARRAY));
        assert_eq!(service.type_id_of::<(u8, u8)>(), None);
    }

    #[test]
    fn test_concurrent_readers() {
        let service = Arc::new(builtins(ByteOrder::BigEndian));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let service = Arc::clone(&service);
                std::thread::spawn(move || {
                    for n in 0..200i64 {
                        let value = n * i;
                        let data = service.to_data(&value).unwrap();
                        assert_eq!(service.from_data::<i64>(&data).unwrap(), value);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
