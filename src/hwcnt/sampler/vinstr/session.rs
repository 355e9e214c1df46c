use std::collections::VecDeque;
use std::mem;

/// Interval between a start and the matching stop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) struct Session {
    last_ts_ns: u64,
    user_data_periodic: u64,
    // Manual push count of the sample closing this session.
    stop_sample_nr: Option<u64>,
}

impl Session {
    pub fn new(start_ts_ns: u64, user_data_periodic: u64) -> Self {
        Self {
            last_ts_ns: start_ts_ns,
            user_data_periodic,
            stop_sample_nr: None,
        }
    }

    /// Records the end of a sample, returns the end of the previous one.
    pub fn update_ts(&mut self, ts: u64) -> u64 {
        mem::replace(&mut self.last_ts_ns, ts)
    }

    pub fn user_data_periodic(&self) -> u64 {
        self.user_data_periodic
    }

    pub fn stop(&mut self, stop_sample_nr: u64) {
        self.stop_sample_nr = Some(stop_sample_nr);
    }

    pub fn can_erase(&self, manual_sample_nr: u64) -> bool {
        self.stop_sample_nr == Some(manual_sample_nr)
    }
}

/// User data of outstanding manual dumps.
#[derive(Debug, Default)]
pub(super) struct UserDataQueue {
    values: VecDeque<u64>,
    push_count: u64,
    pop_count: u64,
}

impl UserDataQueue {
    pub fn push(&mut self, user_data: u64) {
        self.values.push_back(user_data);
        self.push_count += 1;
    }

    pub fn pop(&mut self) -> Option<u64> {
        self.pop_count += 1;
        self.values.pop_front()
    }

    pub fn push_count(&self) -> u64 {
        self.push_count
    }

    pub fn pop_count(&self) -> u64 {
        self.pop_count
    }
}
