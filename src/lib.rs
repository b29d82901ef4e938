pub mod config;
pub mod controller;
pub mod domain;
pub mod ingest;
pub mod logging;
pub mod mail;
pub mod rag;
pub mod secrets;
pub mod store;
pub mod terminal;
