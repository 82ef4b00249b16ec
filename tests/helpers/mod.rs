#![allow(dead_code)]

pub mod fake_provider;

use chrono::Utc;
use proc_stats_workers::{ProcessReading, ProcessState};

/// A running process reading with fixed resource usage.
pub fn reading(pid: u32, name: &str, cpu_percent: f64, mem_percent: f64) -> ProcessReading {
    ProcessReading {
        pid,
        parent_pid: 1,
        name: name.to_owned(),
        cpu_percent,
        mem_percent,
        started_at: Utc::now(),
        state: ProcessState::Running,
    }
}
