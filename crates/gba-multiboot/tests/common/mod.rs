use std::collections::VecDeque;

use gba_port::{Transport, err::Error};

/// Replays scripted replies and records every word sent.
///
/// Once the script runs out every reply is zero.
#[derive(Default)]
pub struct Script {
    replies: VecDeque<u32>,
    pub sent: Vec<u32>,
    fail_after: Option<usize>,
}

impl Script {
    pub fn new(replies: impl IntoIterator<Item = u32>) -> Self {
        Self {
            replies: replies.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Fail every exchange after `n` successful ones.
    pub fn failing_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }
}

impl Transport for Script {
    fn exchange(&mut self, word: u32) -> gba_port::Result<u32> {
        if self.fail_after.is_some_and(|n| self.sent.len() >= n) {
            return Err(Error::Io(std::io::ErrorKind::BrokenPipe.into()));
        }

        self.sent.push(word);
        Ok(self.replies.pop_front().unwrap_or(0))
    }
}
