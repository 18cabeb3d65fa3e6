//! Resilient remote-operation core for multi-disk VM snapshot and restore
//! workflows: a retrying request executor, a fan-out/fan-in batch executor,
//! and a completion poller for long-running provisioning and copy operations.

pub mod config;
pub mod logging;

pub mod batch;
pub mod control;
pub mod credential;
pub mod operation;
pub mod poller;
pub mod retry;
pub mod transport;
