pub use fairgate_types::prelude::*;

pub use tracing::{debug, info, warn};

// vim: ts=4
