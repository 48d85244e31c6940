//! Fixed task table. The host runtime schedules its loops from it and the
//! `s2` console query lists it.

use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSpec {
    pub name: &'static str,
    /// Offset of the first run after start-up.
    pub phase_ms: u64,
    pub period_ms: u64,
}

pub const ADC_TASK: TaskSpec = TaskSpec {
    name: "ADC",
    phase_ms: 0,
    period_ms: 500,
};
pub const STD_TASK: TaskSpec = TaskSpec {
    name: "STD",
    phase_ms: 50,
    period_ms: 100,
};
pub const CTL_TASK: TaskSpec = TaskSpec {
    name: "CTL",
    phase_ms: 200,
    period_ms: 1_000,
};
pub const PRF_TASK: TaskSpec = TaskSpec {
    name: "PRF",
    phase_ms: 300,
    period_ms: 60_000,
};

pub const TASKS: [TaskSpec; 4] = [ADC_TASK, STD_TASK, CTL_TASK, PRF_TASK];

/// One line per task, e.g. `CTL  1000 ms (+200)`.
pub fn describe_tasks() -> String {
    let mut out = String::new();
    for (index, task) in TASKS.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        let _ = write!(
            out,
            "{} {:>5} ms (+{})",
            task.name, task.period_ms, task.phase_ms
        );
    }
    out
}
