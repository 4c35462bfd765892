//! Job table: fixed-capacity store of active jobs, a pid→jid reverse index,
//! and the state machine the reaper drives through `on_child_event`.

use std::collections::HashMap;

/// Table capacity; the original fixes this at 128 (`main.h`'s `job_t job[128]`
//  sized array).
pub const CAPACITY: usize = 128;

/// The lifecycle state of a live job. `Continued` is not a persisted state --
/// it is only the label printed by `on_child_event` for a SIGCONT
/// notification before the job settles into `Foreground`/`Background`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Foreground,
    Background,
    Stopped,
    Done,
    Killed,
}

impl JobState {
    /// The exact string printed in job listing lines.
    pub fn label(self) -> &'static str {
        match self {
            JobState::Foreground => "Foreground",
            JobState::Background => "Running",
            JobState::Stopped => "Stopped",
            JobState::Done => "Done",
            JobState::Killed => "Killed",
        }
    }
}

/// An event reported by the reaper about a reaped/changed child.
#[derive(Debug, Clone, Copy)]
pub enum ChildEvent {
    Stopped,
    Continued,
    Exited(i32),
    /// Signaled with the given signal number (`SIGKILL`/`SIGINT` are handled
    /// specially by `on_child_event`).
    Signaled(i32),
}

/// A pipeline submitted to the OS and tracked through its lifecycle.
#[derive(Debug, Clone)]
pub struct Job {
    pub jid: u32,
    pub leader_pid: i32,
    pub member_count: u32,
    pub remaining: u32,
    pub state: JobState,
    pub cmdline: String,
}

impl Job {
    /// The exact line format printed: `[<jid>] (<pid>) <state> <cmdline>`.
    pub fn format_line(&self) -> String {
        self.format_line_with(self.state.label())
    }

    /// Same format with an explicit label, used for the transient
    /// "Continued" notification that is not a persisted `JobState`.
    pub fn format_line_with(&self, label: &str) -> String {
        format!("[{}] ({}) {} {}", self.jid, self.leader_pid, label, self.cmdline)
    }
}

/// Fixed-capacity indexed store of [`Job`], plus the pid→jid reverse index.
pub struct JobTable {
    slots: Vec<Option<Job>>,
    pid_to_jid: HashMap<i32, u32>,
}

impl Default for JobTable {
    fn default() -> Self {
        Self::new()
    }
}

impl JobTable {
    pub fn new() -> Self {
        JobTable {
            slots: (0..CAPACITY).map(|_| None).collect(),
            pid_to_jid: HashMap::new(),
        }
    }

    /// Register a newly launched pipeline. `member_pids` are every process id
    /// in the pipeline (all sharing `leader_pid` as their process group).
    /// Returns the assigned jid, or `None` if the table is full.
    pub fn add(
        &mut self,
        leader_pid: i32,
        member_pids: &[i32],
        state: JobState,
        cmdline: String,
    ) -> Option<u32> {
        let slot = self.slots.iter().position(Option::is_none)?;
        let jid = (slot + 1) as u32;
        let member_count = member_pids.len() as u32;

        self.slots[slot] = Some(Job {
            jid,
            leader_pid,
            member_count,
            remaining: member_count,
            state,
            cmdline,
        });

        for &pid in member_pids {
            self.pid_to_jid.insert(pid, jid);
        }

        Some(jid)
    }

    pub fn find_by_jid(&self, jid: u32) -> Option<&Job> {
        self.slots.get((jid as usize).checked_sub(1)?)?.as_ref()
    }

    pub fn find_by_jid_mut(&mut self, jid: u32) -> Option<&mut Job> {
        self.slots.get_mut((jid as usize).checked_sub(1)?)?.as_mut()
    }

    /// The leader pid of the single `Foreground` job, if any. At most one
    /// job is ever `Foreground` at a time.
    pub fn find_foreground(&self) -> Option<i32> {
        self.slots
            .iter()
            .flatten()
            .find(|j| j.state == JobState::Foreground)
            .map(|j| j.leader_pid)
    }

    pub fn jid_of_foreground(&self) -> Option<u32> {
        self.slots
            .iter()
            .flatten()
            .find(|j| j.state == JobState::Foreground)
            .map(|j| j.jid)
    }

    /// All live jobs, in jid order, for the `jobs` built-in.
    pub fn jobs_sorted(&self) -> Vec<&Job> {
        self.slots.iter().flatten().collect()
    }

    fn clear_slot(&mut self, jid: u32) {
        if let Some(slot) = self.slots.get_mut((jid as usize).saturating_sub(1)) {
            *slot = None;
        }
    }

    /// Invoked by the reaper with one event per `waitpid` return. `pid` is
    /// looked up via the pid→jid map rather than assumed to be a leader pid
    /// -- an earlier revision of the original program conflated the two and
    /// reaped the wrong job.
    pub fn on_child_event(&mut self, pid: i32, event: ChildEvent) {
        let Some(&jid) = self.pid_to_jid.get(&pid) else {
            return;
        };

        match event {
            ChildEvent::Stopped => {
                if let Some(job) = self.find_by_jid_mut(jid) {
                    if job.state == JobState::Foreground {
                        println!();
                    }
                    job.state = JobState::Stopped;
                    println!("{}", job.format_line());
                }
            }
            ChildEvent::Continued => {
                if let Some(job) = self.find_by_jid_mut(jid) {
                    if job.state != JobState::Background {
                        println!(
                            "[{}] ({}) Continued {}",
                            job.jid, job.leader_pid, job.cmdline
                        );
                    }
                }
            }
            ChildEvent::Exited(_) => {
                self.reap_member(jid, pid);
            }
            ChildEvent::Signaled(sig) if sig == libc::SIGKILL => {
                if let Some(job) = self.find_by_jid_mut(jid) {
                    job.state = JobState::Killed;
                    println!("{}", job.format_line());
                }
                self.reap_member(jid, pid);
            }
            ChildEvent::Signaled(sig) if sig == libc::SIGINT => {
                println!();
                self.reap_member(jid, pid);
            }
            ChildEvent::Signaled(_) => {
                self.reap_member(jid, pid);
            }
        }
    }

    fn reap_member(&mut self, jid: u32, pid: i32) {
        self.pid_to_jid.remove(&pid);
        let Some(job) = self.find_by_jid_mut(jid) else {
            return;
        };
        job.remaining = job.remaining.saturating_sub(1);
        if job.remaining == 0 {
            if !matches!(job.state, JobState::Foreground | JobState::Killed) {
                job.state = JobState::Done;
                println!("{}", job.format_line());
            }
            self.clear_slot(jid);
        }
    }

    pub fn set_state(&mut self, jid: u32, state: JobState) {
        if let Some(job) = self.find_by_jid_mut(jid) {
            job.state = state;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_assigns_lowest_free_slot() {
        let mut table = JobTable::new();
        let jid1 = table.add(100, &[100], JobState::Background, "a".into()).unwrap();
        let jid2 = table.add(200, &[200], JobState::Background, "b".into()).unwrap();
        assert_eq!(jid1, 1);
        assert_eq!(jid2, 2);

        table.on_child_event(100, ChildEvent::Exited(0));
        assert!(table.find_by_jid(1).is_none());

        let jid3 = table.add(300, &[300], JobState::Background, "c".into()).unwrap();
        assert_eq!(jid3, 1, "freed slot 1 must be reused before allocating 3");
    }

    #[test]
    fn at_most_one_foreground_job() {
        let mut table = JobTable::new();
        table.add(1, &[1], JobState::Foreground, "a".into());
        table.add(2, &[2], JobState::Background, "b".into());
        assert_eq!(table.find_foreground(), Some(1));
    }

    #[test]
    fn foreground_exit_is_silent() {
        let mut table = JobTable::new();
        table.add(10, &[10], JobState::Foreground, "a".into());
        // No Done line is expected on a foreground job's own completion.
        table.on_child_event(10, ChildEvent::Exited(0));
        assert!(table.find_by_jid(1).is_none());
    }

    #[test]
    fn remaining_reaches_zero_and_slot_clears() {
        let mut table = JobTable::new();
        table.add(5, &[5, 6], JobState::Background, "ls | wc".into());
        table.on_child_event(5, ChildEvent::Exited(0));
        assert!(table.find_by_jid(1).is_some());
        table.on_child_event(6, ChildEvent::Exited(0));
        assert!(table.find_by_jid(1).is_none());
    }

    #[test]
    fn job_line_format_matches_expected_layout() {
        let mut table = JobTable::new();
        table.add(42, &[42], JobState::Background, "sleep 5".into());
        let job = table.find_by_jid(1).unwrap();
        assert_eq!(job.format_line(), "[1] (42) Running sleep 5");
    }

    #[test]
    fn reap_keys_by_pid_not_leader() {
        let mut table = JobTable::new();
        table.add(7, &[7, 8], JobState::Background, "a | b".into());
        // The reaper may observe a non-leader member pid first.
        table.on_child_event(8, ChildEvent::Exited(0));
        let job = table.find_by_jid(1).unwrap();
        assert_eq!(job.remaining, 1);
    }
}
