//! Map operations and their encoding as internal forwarding requests.

use std::fmt;

use bytes::Bytes;

use hazelgrid_core::protocol::constants::COMMAND_INTERNAL_MAP;
use hazelgrid_core::{Data, GridError, Protocol, Result, SerializationService};

use crate::storage::RecordStore;

const OP_GET: &str = "get";
const OP_PUT: &str = "put";
const OP_REMOVE: &str = "remove";
const OP_CONTAINS_KEY: &str = "containsKey";

/// A single-key operation on a map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapOperation {
    /// Reads the value of `key`.
    Get {
        /// The key.
        key: Data,
    },
    /// Stores `value` under `key`.
    Put {
        /// The key.
        key: Data,
        /// The new value.
        value: Data,
    },
    /// Deletes `key`.
    Remove {
        /// The key.
        key: Data,
    },
    /// Tests whether `key` is present.
    ContainsKey {
        /// The key.
        key: Data,
    },
}

/// The result of a [`MapOperation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    /// A value, or `None` when the key had no mapping.
    Value(Option<Data>),
    /// A yes/no answer.
    Flag(bool),
}

impl OperationOutcome {
    /// Returns the carried value; a flag outcome yields `None`.
    pub fn into_value(self) -> Option<Data> {
        match self {
            Self::Value(value) => value,
            Self::Flag(_) => None,
        }
    }

    /// Returns the carried flag; a value outcome yields whether a value is present.
    pub fn into_flag(self) -> bool {
        match self {
            Self::Value(value) => value.is_some(),
            Self::Flag(flag) => flag,
        }
    }
}

/// An operation received from another member, addressed to one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedOperation {
    /// Name of the target map.
    pub map: String,
    /// Partition the sender routed the key to.
    pub partition_id: i32,
    /// The operation to execute.
    pub operation: MapOperation,
}

impl MapOperation {
    /// Returns the wire name of this operation.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Get { .. } => OP_GET,
            Self::Put { .. } => OP_PUT,
            Self::Remove { .. } => OP_REMOVE,
            Self::ContainsKey { .. } => OP_CONTAINS_KEY,
        }
    }

    /// Returns the key the operation targets.
    pub fn key(&self) -> &Data {
        match self {
            Self::Get { key }
            | Self::Put { key, .. }
            | Self::Remove { key }
            | Self::ContainsKey { key } => key,
        }
    }

    /// Runs the operation against a partition of `store`.
    pub fn execute(self, store: &RecordStore, partition_id: i32) -> Result<OperationOutcome> {
        match self {
            Self::Get { key } => store.get(partition_id, &key).map(OperationOutcome::Value),
            Self::Put { key, value } => store
                .put(partition_id, key, value)
                .map(OperationOutcome::Value),
            Self::Remove { key } => store.remove(partition_id, &key).map(OperationOutcome::Value),
            Self::ContainsKey { key } => store
                .contains_key(partition_id, &key)
                .map(OperationOutcome::Flag),
        }
    }

    /// Builds the internal request forwarding this operation to the owner of
    /// `partition_id`.
    ///
    /// Arguments are `[map, operation, partition id]`; the key, then the value
    /// for a put, travel as buffers in `Data` wire framing.
    pub fn to_request(
        &self,
        map: &str,
        partition_id: i32,
        serialization: &SerializationService,
    ) -> Result<Protocol> {
        let mut request = Protocol::request(COMMAND_INTERNAL_MAP)
            .with_arg(map)
            .with_arg(self.name())
            .with_arg(partition_id.to_string())
            .with_buffer(encode_data(serialization, self.key())?);
        if let Self::Put { value, .. } = self {
            request = request.with_buffer(encode_data(serialization, value)?);
        }
        Ok(request)
    }

    /// Decodes an internal request built by [`to_request`](Self::to_request).
    pub fn from_request(
        request: &Protocol,
        serialization: &SerializationService,
    ) -> Result<ForwardedOperation> {
        let map = request.arg(0)?.to_string();
        let name = request.arg(1)?;
        let raw_partition = request.arg(2)?;
        let partition_id = raw_partition.parse::<i32>().map_err(|e| {
            GridError::Protocol(format!("invalid partition id '{}': {}", raw_partition, e))
        })?;
        let key = decode_data(serialization, request.buffer(0)?)?;
        let operation = match name {
            OP_GET => Self::Get { key },
            OP_PUT => Self::Put {
                key,
                value: decode_data(serialization, request.buffer(1)?)?,
            },
            OP_REMOVE => Self::Remove { key },
            OP_CONTAINS_KEY => Self::ContainsKey { key },
            other => {
                return Err(GridError::Protocol(format!(
                    "unknown map operation '{}'",
                    other
                )))
            }
        };
        Ok(ForwardedOperation {
            map,
            partition_id,
            operation,
        })
    }

    /// Decodes the value of a response to this operation's internal request.
    pub fn decode_outcome(
        &self,
        value: Option<&Bytes>,
        serialization: &SerializationService,
    ) -> Result<OperationOutcome> {
        match self {
            Self::ContainsKey { .. } => decode_flag(value).map(OperationOutcome::Flag),
            _ => value
                .map(|bytes| decode_data(serialization, bytes))
                .transpose()
                .map(OperationOutcome::Value),
        }
    }
}

impl OperationOutcome {
    /// Encodes this outcome as the value of an internal response.
    pub fn encode(&self, serialization: &SerializationService) -> Result<Option<Bytes>> {
        match self {
            Self::Value(Some(data)) => encode_data(serialization, data).map(Some),
            Self::Value(None) => Ok(None),
            Self::Flag(flag) => Ok(Some(encode_flag(*flag))),
        }
    }
}

impl fmt::Display for MapOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(key={} bytes)", self.name(), self.key().len())
    }
}

/// Encodes a flag as a one-byte buffer.
pub fn encode_flag(flag: bool) -> Bytes {
    Bytes::copy_from_slice(&[u8::from(flag)])
}

/// Decodes a one-byte flag buffer.
pub fn decode_flag(value: Option<&Bytes>) -> Result<bool> {
    match value.map(|b| b.as_ref()) {
        Some([0]) => Ok(false),
        Some([1]) => Ok(true),
        Some(other) => Err(GridError::CorruptPayload(format!(
            "expected a one-byte flag, got {} bytes",
            other.len()
        ))),
        None => Err(GridError::CorruptPayload("missing flag value".to_string())),
    }
}

fn encode_data(serialization: &SerializationService, data: &Data) -> Result<Bytes> {
    let mut out = serialization.create_output();
    serialization.write_data(&mut out, data)?;
    Ok(out.freeze())
}

fn decode_data(serialization: &SerializationService, bytes: &[u8]) -> Result<Data> {
    let mut input = serialization.create_input(bytes);
    let data = serialization.read_data(&mut input)?;
    if input.remaining() != 0 {
        return Err(GridError::CorruptPayload(format!(
            "{} trailing bytes after data",
            input.remaining()
        )));
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hazelgrid_core::serialization::CONSTANT_TYPE_BYTE_ARRAY;

    fn key(bytes: &[u8]) -> Data {
        Data::from_bytes(CONSTANT_TYPE_BYTE_ARRAY, bytes.to_vec())
    }

    fn service() -> SerializationService {
        SerializationService::builder().build()
    }

    #[test]
    fn test_forwarded_put_decodes() {
        let service = service();
        let op = MapOperation::Put {
            key: key(b"k"),
            value: key(b""),
        };
        let request = op.to_request("orders", 5, &service).unwrap();
        assert_eq!(request.command(), COMMAND_INTERNAL_MAP);
        assert_eq!(request.args(), &["orders", "put", "5"]);
        assert_eq!(request.buffers().len(), 2);

        let forwarded = MapOperation::from_request(&request, &service).unwrap();
        assert_eq!(forwarded.map, "orders");
        assert_eq!(forwarded.partition_id, 5);
        assert_eq!(forwarded.operation, op);
    }

    #[test]
    fn test_forwarded_key_keeps_type_id() {
        let service = service();
        let op = MapOperation::Get {
            key: Data::from_bytes(3, vec![1, 2, 3]),
        };
        let request = op.to_request("m", 0, &service).unwrap();
        assert_eq!(
            request.buffer(0).unwrap().as_ref(),
            &[0, 0, 0, 3, 0, 0, 0, 3, 1, 2, 3]
        );
        let forwarded = MapOperation::from_request(&request, &service).unwrap();
        assert_eq!(forwarded.operation.key().type_id(), 3);
    }

    #[test]
    fn test_malformed_requests() {
        let service = service();
        let missing = Protocol::request(COMMAND_INTERNAL_MAP).with_arg("m");
        assert!(matches!(
            MapOperation::from_request(&missing, &service),
            Err(GridError::Protocol(_))
        ));

        let unknown = MapOperation::Get { key: key(b"k") }
            .to_request("m", 0, &service)
            .unwrap();
        let unknown = Protocol::new_request(
            COMMAND_INTERNAL_MAP,
            vec!["m".into(), "clear".into(), "0".into()],
            unknown.buffers().to_vec(),
        );
        assert!(matches!(
            MapOperation::from_request(&unknown, &service),
            Err(GridError::Protocol(_))
        ));

        let truncated = Protocol::request(COMMAND_INTERNAL_MAP)
            .with_arg("m")
            .with_arg("get")
            .with_arg("0")
            .with_buffer(vec![0, 0, 0, 1, 0, 0, 0, 9, 1]);
        assert!(matches!(
            MapOperation::from_request(&truncated, &service),
            Err(GridError::CorruptPayload(_))
        ));
    }

    #[test]
    fn test_outcome_encoding_keeps_absence() {
        let service = service();
        let get = MapOperation::Get { key: key(b"k") };

        let absent = OperationOutcome::Value(None).encode(&service).unwrap();
        assert_eq!(absent, None);
        assert_eq!(
            get.decode_outcome(None, &service).unwrap(),
            OperationOutcome::Value(None)
        );

        let empty = OperationOutcome::Value(Some(key(b"")))
            .encode(&service)
            .unwrap();
        assert_eq!(
            get.decode_outcome(empty.as_ref(), &service).unwrap(),
            OperationOutcome::Value(Some(key(b"")))
        );
    }

    #[test]
    fn test_flags() {
        assert_eq!(encode_flag(true).as_ref(), &[1]);
        assert!(!decode_flag(Some(&encode_flag(false))).unwrap());
        assert!(decode_flag(None).is_err());
        assert!(decode_flag(Some(&Bytes::from_static(&[2]))).is_err());

        let contains = MapOperation::ContainsKey { key: key(b"k") };
        let outcome = contains
            .decode_outcome(Some(&encode_flag(true)), &SerializationService::builder().build())
            .unwrap();
        assert!(outcome.into_flag());
    }

    #[test]
    fn test_execute_against_store() {
        let store = RecordStore::new("m", 1);
        let put = MapOperation::Put {
            key: key(b"k"),
            value: key(b"v"),
        };
        assert_eq!(put.execute(&store, 0).unwrap(), OperationOutcome::Value(None));
        let get = MapOperation::Get { key: key(b"k") };
        assert_eq!(get.execute(&store, 0).unwrap().into_value(), Some(key(b"v")));
        let contains = MapOperation::ContainsKey { key: key(b"k") };
        assert!(contains.execute(&store, 0).unwrap().into_flag());
    }
}
