pub mod record;
pub mod config;
pub mod error;
pub mod sink;

pub mod couchdb;

pub mod noop_sink;
