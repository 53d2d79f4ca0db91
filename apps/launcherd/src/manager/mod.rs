pub mod download;
pub mod error;
pub mod install;
pub mod launch;
pub mod library;
pub mod logs;
pub mod privileges;
pub mod process_guard;
pub mod source;
pub mod state;
pub mod updates;
pub mod version_paths;

pub use error::ManagerError;
pub use logs::LogStore;
pub use state::{SessionState, SharedState};
