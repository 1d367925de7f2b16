pub mod secrets;
pub mod watch;

pub use secrets::Secrets;
pub use watch::WatchConfig;
