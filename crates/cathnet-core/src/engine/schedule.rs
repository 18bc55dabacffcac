use super::config::TrainingConfig;
use tracing::info;

/// Learning rate schedule: a linear warmup over the first optimizer steps, then a
/// reduction by `factor` whenever the validation loss has not improved for more than
/// `patience` epochs, never going below `min_lr`.
#[derive(Debug, Clone)]
pub struct LrScheduler {
    warmup_steps: usize,
    factor: f64,
    patience: usize,
    min_lr: f64,
    lr: f64,
    best: f64,
    bad_epochs: usize,
    step: usize,
}

impl LrScheduler {
    pub fn new(config: &TrainingConfig) -> Self {
        Self {
            warmup_steps: config.lr_warmup_steps,
            factor: config.lr_factor,
            patience: config.lr_patience,
            min_lr: config.lr_min,
            lr: config.lr,
            best: f64::INFINITY,
            bad_epochs: 0,
            step: 0,
        }
    }

    /// The rate to use for the next optimizer step.
    pub fn next_lr(&mut self) -> f64 {
        let scale = if self.step < self.warmup_steps {
            (self.step + 1) as f64 / self.warmup_steps as f64
        } else {
            1.0
        };
        self.step += 1;
        self.lr * scale
    }

    /// Feeds the validation loss of a finished epoch; returns the new rate if it was
    /// reduced.
    pub fn observe(&mut self, val_loss: f64) -> Option<f64> {
        if val_loss < self.best {
            self.best = val_loss;
            self.bad_epochs = 0;
            return None;
        }
        self.bad_epochs += 1;
        if self.bad_epochs <= self.patience {
            return None;
        }
        self.bad_epochs = 0;
        let reduced = (self.lr * self.factor).max(self.min_lr);
        if reduced < self.lr {
            info!(from = self.lr, to = reduced, "Validation loss plateaued; reducing learning rate.");
            self.lr = reduced;
            Some(reduced)
        } else {
            None
        }
    }

    /// The current post-warmup rate.
    pub fn lr(&self) -> f64 {
        self.lr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::fixtures::training_builder;
    use std::path::Path;

    fn scheduler(warmup: usize, patience: usize) -> LrScheduler {
        let config = training_builder(Path::new("/unused"))
            .lr(1e-3)
            .lr_warmup_steps(warmup)
            .lr_factor(0.5)
            .lr_patience(patience)
            .lr_min(2e-4)
            .build()
            .unwrap();
        LrScheduler::new(&config)
    }

    #[test]
    fn warmup_ramps_linearly_to_the_base_rate() {
        let mut s = scheduler(4, 1);
        let rates: Vec<f64> = (0..6).map(|_| s.next_lr()).collect();
        let expected = [0.25e-3, 0.5e-3, 0.75e-3, 1e-3, 1e-3, 1e-3];
        for (r, e) in rates.iter().zip(expected) {
            assert!((r - e).abs() < 1e-15);
        }
    }

    #[test]
    fn plateau_reduces_after_patience_and_respects_the_floor() {
        let mut s = scheduler(0, 1);
        assert_eq!(s.observe(1.0), None);
        assert_eq!(s.observe(1.0), None);
        assert_eq!(s.observe(1.1), Some(5e-4));
        assert_eq!(s.observe(0.9), None);
        assert_eq!(s.observe(0.95), None);
        assert_eq!(s.observe(0.95), Some(2.5e-4));
        s.observe(1.0);
        assert_eq!(s.observe(1.0), Some(2e-4));
        s.observe(1.0);
        assert_eq!(s.observe(1.0), None);
        assert_eq!(s.lr(), 2e-4);
    }
}
