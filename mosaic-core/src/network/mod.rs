//! Connection plumbing: addressing, connect-with-timeout, and the
//! handshake-then-frames stream halves.

pub mod connection;
pub mod stream;

pub use connection::{ConnectionInfo, connect};
pub use stream::{FrameStreamReceiver, FrameStreamSender};
