//! Process plumbing shared by the binary: log file handling and signal delivery.

pub mod logging;
pub mod signals;

pub use logging::{install_panic_hook, RotatingLog};
pub use signals::{spawn_signal_thread, SignalSet};
