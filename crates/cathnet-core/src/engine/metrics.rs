use burn::prelude::*;
use burn::tensor::ElementConversion;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the append-only metric log in the run's log directory.
pub const METRICS_FILE: &str = "metrics.csv";

#[derive(Debug, Error)]
pub enum RunLogError {
    #[error("Failed to open run log {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to write run log {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Train,
    Val,
    Test,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Train => write!(f, "train"),
            Phase::Val => write!(f, "val"),
            Phase::Test => write!(f, "test"),
        }
    }
}

/// One row of `metrics.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub phase: Phase,
    pub epoch: usize,
    pub step: usize,
    pub name: String,
    pub value: f64,
}

/// Append-only CSV log of scalar metrics.
pub struct RunLog {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl RunLog {
    /// Opens the log in `dir`, keeping any rows already written.
    pub fn open(dir: &Path) -> Result<Self, RunLogError> {
        let path = dir.join(METRICS_FILE);
        let io_err = |source| RunLogError::Io {
            path: path.clone(),
            source,
        };
        let fresh = path.metadata().map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;
        let writer = csv::WriterBuilder::new()
            .has_headers(fresh)
            .from_writer(file);
        Ok(Self { path, writer })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(
        &mut self,
        phase: Phase,
        epoch: usize,
        step: usize,
        name: &str,
        value: f64,
    ) -> Result<(), RunLogError> {
        self.writer
            .serialize(MetricRow {
                phase,
                epoch,
                step,
                name: name.to_string(),
                value,
            })
            .map_err(|source| RunLogError::Csv {
                path: self.path.clone(),
                source,
            })
    }

    pub fn flush(&mut self) -> Result<(), RunLogError> {
        self.writer.flush().map_err(|source| RunLogError::Io {
            path: self.path.clone(),
            source,
        })
    }

    pub fn read(path: &Path) -> Result<Vec<MetricRow>, RunLogError> {
        let csv_err = |source| RunLogError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;
        reader
            .deserialize()
            .collect::<Result<Vec<MetricRow>, _>>()
            .map_err(csv_err)
    }
}

/// Running squared and absolute error sums over any number of tensor elements.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ErrorAccumulator {
    sum_sq: f64,
    sum_abs: f64,
    count: usize,
}

impl ErrorAccumulator {
    pub fn add<B: Backend, const D: usize>(&mut self, prediction: Tensor<B, D>, target: Tensor<B, D>) {
        let diff = prediction - target;
        self.count += diff.shape().num_elements();
        self.sum_sq += diff.clone().powf_scalar(2.0).sum().into_scalar().elem::<f64>();
        self.sum_abs += diff.abs().sum().into_scalar().elem::<f64>();
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn mse(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum_sq / self.count as f64
        }
    }

    pub fn mae(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum_abs / self.count as f64
        }
    }
}

/// Metrics of one pass over a split.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PassMetrics {
    pub energy: ErrorAccumulator,
    pub forces: Option<ErrorAccumulator>,
}

impl PassMetrics {
    /// `y_weight * MSE(E) + neg_dy_weight * MSE(F)`, the quantity that is monitored.
    pub fn loss(&self, y_weight: f64, neg_dy_weight: f64) -> f64 {
        let force_term = self.forces.map_or(0.0, |f| neg_dy_weight * f.mse());
        y_weight * self.energy.mse() + force_term
    }

    pub fn record(
        &self,
        log: &mut RunLog,
        phase: Phase,
        epoch: usize,
        step: usize,
        loss: f64,
    ) -> Result<(), RunLogError> {
        log.record(phase, epoch, step, "loss", loss)?;
        log.record(phase, epoch, step, "y_mse", self.energy.mse())?;
        log.record(phase, epoch, step, "y_mae", self.energy.mae())?;
        if let Some(forces) = &self.forces {
            log.record(phase, epoch, step, "neg_dy_mse", forces.mse())?;
            log.record(phase, epoch, step, "neg_dy_mae", forces.mae())?;
        }
        Ok(())
    }
}
