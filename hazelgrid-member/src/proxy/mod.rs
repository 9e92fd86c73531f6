//! Map proxies and the operations they route.

mod map;
mod operation;
mod registry;

pub use map::MapProxy;
pub use operation::{decode_flag, encode_flag, ForwardedOperation, MapOperation, OperationOutcome};
pub use registry::ProxyRegistry;
