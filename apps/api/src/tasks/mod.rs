pub mod handlers;
pub mod kv;
pub mod monitor;
pub mod service;
pub mod store;
pub mod supervisor;
