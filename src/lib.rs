//! collectd-haproxy - HAProxy metrics for collectd.
//!
//! Polls the HAProxy admin socket with `show info` and `show stat`,
//! classifies the reported fields against a fixed metric catalog and
//! writes typed measurements through a `MetricWriter`, by default as
//! collectd exec `PUTVAL` lines on stdout.

pub mod collector;
pub mod config;
pub mod observer;
pub mod scheduler;
pub mod writer;
