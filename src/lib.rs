// Library for tests to access modules

pub mod backoff;
pub mod config;
pub mod error;
pub mod models;
pub mod publisher;
pub mod sampler;
pub mod sysinfo_repo;
pub mod version;
pub mod worker;
