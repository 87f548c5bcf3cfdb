/// Payload transfer observer.
pub trait Progress {
    /// Called after each payload word with the byte offset reached so far.
    fn report(&mut self, done: u32, total: u32);
}

impl<F: FnMut(u32, u32)> Progress for F {
    fn report(&mut self, done: u32, total: u32) {
        self(done, total)
    }
}

/// Discards progress reports.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn report(&mut self, _done: u32, _total: u32) {}
}
