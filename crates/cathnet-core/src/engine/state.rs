use super::error::EngineError;
use std::cmp::Ordering;
use std::path::PathBuf;

/// Lifecycle of a training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainState {
    Idle,
    Running { epoch: usize },
    Stopped { epochs_completed: usize },
}

impl TrainState {
    /// Enters the first epoch of a run of `num_epochs` epochs.
    pub fn start(self, num_epochs: usize) -> Result<Self, EngineError> {
        match self {
            TrainState::Idle if num_epochs == 0 => Ok(TrainState::Stopped {
                epochs_completed: 0,
            }),
            TrainState::Idle => Ok(TrainState::Running { epoch: 0 }),
            other => Err(EngineError::Internal(format!(
                "cannot start training from state {other:?}"
            ))),
        }
    }

    /// Moves past the current epoch, stopping once `num_epochs` have completed.
    pub fn advance(self, num_epochs: usize) -> Result<Self, EngineError> {
        match self {
            TrainState::Running { epoch } if epoch + 1 >= num_epochs => Ok(TrainState::Stopped {
                epochs_completed: epoch + 1,
            }),
            TrainState::Running { epoch } => Ok(TrainState::Running { epoch: epoch + 1 }),
            other => Err(EngineError::Internal(format!(
                "cannot advance training from state {other:?}"
            ))),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, TrainState::Running { .. })
    }
}

/// A retained snapshot, ordered so that the worst one (highest validation loss, then the
/// older epoch) compares greatest.
#[derive(Debug, Clone)]
pub struct RankedSnapshot {
    pub val_loss: f64,
    pub epoch: usize,
    pub step: usize,
    pub path: PathBuf,
}

impl PartialEq for RankedSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for RankedSnapshot {}

impl PartialOrd for RankedSnapshot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RankedSnapshot {
    fn cmp(&self, other: &Self) -> Ordering {
        self.val_loss
            .total_cmp(&other.val_loss)
            .then_with(|| other.epoch.cmp(&self.epoch))
    }
}
