pub mod errors;

pub use errors::{
    ConfigError, DeliveryError, QueueError, SessionError, TerminalError, WarpError,
};

pub type Result<T> = std::result::Result<T, WarpError>;
