pub use crate::capability::{Capability, DeviceInfo, DeviceKind, GeoLocation};
pub use crate::error::{Error, FgResult};
pub use crate::types::{Clock, Timestamp};

// vim: ts=4
