//! Progress reporting port for long-running stages

use std::fmt;

/// Stages of an exposure run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Normalize,
    Buffer,
    Windows,
    Extraction,
}

impl Stage {
    pub const COUNT: usize = 4;

    /// 1-based position among all stages
    pub fn position(&self) -> usize {
        match self {
            Stage::Normalize => 1,
            Stage::Buffer => 2,
            Stage::Windows => 3,
            Stage::Extraction => 4,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Stage::Normalize => "Normalizing geometries",
            Stage::Buffer => "Buffering hazards",
            Stage::Windows => "Computing raster windows",
            Stage::Extraction => "Extracting population",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}] {}", self.position(), Self::COUNT, self.label())
    }
}

/// Receives progress notifications. Methods may be called from worker threads.
pub trait ProgressObserver: Send + Sync {
    fn stage_started(&self, stage: Stage, total: usize);

    fn advance(&self, stage: Stage, n: usize);

    fn stage_finished(&self, stage: Stage);
}

/// Observer that ignores every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn stage_started(&self, _stage: Stage, _total: usize) {}

    fn advance(&self, _stage: Stage, _n: usize) {}

    fn stage_finished(&self, _stage: Stage) {}
}
