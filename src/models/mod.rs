pub mod job;
pub mod settings;
pub mod state;
