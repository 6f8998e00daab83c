//! Native-side runtime support.
//!
//! The pieces a managed runtime needs to drive generated bridges: packing
//! values into a [`Frame`] laid out exactly like the native wrapper's
//! packed struct, the string-conversion primitives, and the
//! [`NativeCallPool`] that runs each call on a borrowed OS thread.

pub mod frame;
pub mod pool;
pub mod strings;

use thiserror::Error;

pub use frame::{Frame, FrameValue, NativeStruct};
pub use pool::{NativeCallPool, NativeFn, PoolStats};
pub use strings::{c_string, free, go_bytes, go_string, go_string_n};

/// Errors raised while marshaling or dispatching a native call.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("no slot or field named `{0}`")]
    UnknownSlot(String),

    #[error("`{slot}` is {expected} bytes wide but the value is {actual}")]
    SizeMismatch {
        slot: String,
        expected: u64,
        actual: u64,
    },

    #[error("string contains a NUL byte at offset {0}")]
    InteriorNul(usize),

    #[error("native call pool is shut down")]
    PoolClosed,

    #[error("native call panicked: {0}")]
    CallPanicked(String),

    #[error("failed to start native call worker: {0}")]
    Spawn(String),
}
