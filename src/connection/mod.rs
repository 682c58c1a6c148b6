mod connection;
mod detector;
mod types;
mod window;

pub use connection::Connection;
pub use detector::StagnationDetector;
pub use types::{BatchOutcome, RequestRecord, Termination};
pub use window::SuccessWindow;
