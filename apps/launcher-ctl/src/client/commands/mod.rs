pub mod core;
pub mod install;
pub mod launch;
pub mod library;
