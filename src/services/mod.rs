pub mod api_client;
pub mod credentials;
pub mod label;
pub mod notifier;
pub mod poller;
pub mod printer;
pub mod processor;
pub mod recent_jobs;
pub mod settings_store;
pub mod store;
