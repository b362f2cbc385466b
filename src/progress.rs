//! Progress reporting for long-running commands. Every command that walks
//! a whole catalog (convert, mipmap, border, finish...) reports through a
//! `Progress` implementation so the CLI can drive a progress bar while a
//! library caller can opt into silence with `NullProgress`.

use std::fmt::Debug;

/// Sink for a command's progress: a fixed amount of work becomes known up
/// front (`start`), then completed one unit at a time (`step`), then
/// `finish` closes it out. Implementations must tolerate being called from
/// multiple `rayon` worker threads concurrently.
pub trait Progress: Send + Sync + Debug {
    fn start(&self, label: &str, total: u64);
    fn step(&self, count: u64);
    fn finish(&self);
}

/// A `Progress` that does nothing, for library callers that don't want a
/// status bar.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl Progress for NullProgress {
    fn start(&self, _label: &str, _total: u64) {}
    fn step(&self, _count: u64) {}
    fn finish(&self) {}
}

/// Bundles a `Progress` sink with the oversample `depth` every pass reads
/// to decide how deep to recurse past the pages actually stored on disk.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a, P: Progress> {
    pub progress: &'a P,
    pub depth: i32,
}

impl<'a, P: Progress> Context<'a, P> {
    #[must_use]
    pub const fn new(progress: &'a P, depth: i32) -> Self {
        Self { progress, depth }
    }
}
