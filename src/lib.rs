pub mod app;
pub mod cli;
pub mod context;
pub mod rest;
pub mod storage;
pub mod tracing;
