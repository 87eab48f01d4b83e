//! upwatch - endpoint uptime monitoring.
//!
//! Probes HTTP, TCP and ICMP endpoints on a fixed cadence, stores every
//! outcome in SQLite, and reports uptime over trailing windows.

pub mod config;
pub mod db;
pub mod probe;
pub mod scheduler;
pub mod uptime;
pub mod web;
