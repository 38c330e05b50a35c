pub mod cli;
pub mod http;
pub mod logging;
pub mod outside;
pub mod pipeline;
pub mod proxy;
pub mod result;
pub mod scheduler;
pub mod selector;
pub mod services;
pub mod types;
