use super::dataset::{IndexSummary, MdCathDataset};
use super::error::DataError;
use super::split::{Splits, make_splits};
use super::stats::Normalization;
use super::store::RemoteStore;
use super::validity::SampleValidator;
use crate::core::io::container::{ContainerError, DomainContainer};
use crate::core::io::traits::SourceFile;
use crate::core::models::domain::DomainRecord;
use crate::engine::config::DatasetConfig;
use crate::engine::progress::{Progress, ProgressReporter};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// What provisioning did, for logging and for callers that assert on it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    /// Domains whose files had to be fetched.
    pub fetched: Vec<String>,
    pub index: IndexSummary,
}

impl ProvisionReport {
    /// Number of candidate frames rejected as invalid.
    pub fn excluded(&self) -> usize {
        self.index.excluded
    }
}

/// Everything the training and evaluation stages need from the dataset.
#[derive(Debug)]
pub struct ProvisionedData {
    pub dataset: MdCathDataset,
    pub splits: Splits,
    pub stats: Normalization,
    pub report: ProvisionReport,
}

/// Path of a domain's source file under the data root.
pub fn domain_path(root: &Path, domain: &str) -> PathBuf {
    root.join(DomainContainer::file_name(domain))
}

/// Makes sure every requested domain file is present locally, fetching missing ones.
///
/// Files that already exist are never fetched again.
///
/// # Errors
///
/// Returns [`DataError::Unavailable`] for the first domain that is absent and cannot be
/// fetched.
pub fn ensure_local(
    root: &Path,
    domains: &[String],
    store: &dyn RemoteStore,
    reporter: &ProgressReporter,
) -> Result<Vec<String>, DataError> {
    fs::create_dir_all(root).map_err(|source| DataError::Io {
        path: root.to_path_buf(),
        source,
    })?;

    let mut fetched = Vec::new();
    reporter.report(Progress::TaskStart {
        total_steps: domains.len() as u64,
    });
    for domain in domains {
        let path = domain_path(root, domain);
        if path.is_file() {
            debug!(%domain, path = %path.display(), "Domain file present.");
        } else {
            info!(%domain, "Fetching domain file.");
            store
                .fetch(&DomainContainer::file_name(domain), &path)
                .map_err(|e| DataError::Unavailable {
                    domain: domain.clone(),
                    reason: e.to_string(),
                })?;
            fetched.push(domain.clone());
        }
        reporter.report(Progress::TaskIncrement);
    }
    reporter.report(Progress::TaskFinish);
    Ok(fetched)
}

fn load_domain(root: &Path, domain: &str) -> Result<DomainRecord, DataError> {
    let path = domain_path(root, domain);
    let record = DomainContainer::read_from_path(&path).map_err(|e| match e {
        ContainerError::Io(source) => DataError::Io {
            path: path.clone(),
            source,
        },
        other => DataError::Format {
            path: path.clone(),
            message: other.to_string(),
        },
    })?;
    if record.domain_id != domain {
        return Err(DataError::Format {
            path,
            message: format!(
                "file holds domain '{}' instead of '{domain}'",
                record.domain_id
            ),
        });
    }
    Ok(record)
}

/// Provisions the dataset: fetch, load, filter, validate, split and normalize.
///
/// Deterministic for a given configuration and set of local files.
#[instrument(skip_all, name = "provision_dataset")]
pub fn provision(
    config: &DatasetConfig,
    store: &dyn RemoteStore,
    validator: &dyn SampleValidator,
    reporter: &ProgressReporter,
) -> Result<ProvisionedData, DataError> {
    reporter.report(Progress::PhaseStart {
        name: "Resolving domain files",
    });
    let fetched = ensure_local(&config.root, &config.domains, store, reporter)?;
    reporter.report(Progress::PhaseFinish);

    reporter.report(Progress::PhaseStart {
        name: "Indexing frames",
    });
    let records = config
        .domains
        .par_iter()
        .map(|domain| load_domain(&config.root, domain))
        .collect::<Result<Vec<_>, _>>()?;
    let dataset = MdCathDataset::index(records, config, validator);
    reporter.report(Progress::PhaseFinish);

    let index = dataset.summary().clone();
    if index.excluded > 0 {
        warn!(
            excluded = index.excluded,
            candidates = index.candidates,
            "Excluded {} of {} frames that failed validity checks.",
            index.excluded,
            index.candidates
        );
    }

    let splits = match &config.splits_file {
        Some(path) => {
            info!(path = %path.display(), "Loading split indices from file.");
            Splits::load(path, dataset.len())?
        }
        None => make_splits(
            dataset.len(),
            config.train_size,
            config.val_size,
            config.test_size,
            config.seed,
        )?,
    };

    let stats = Normalization::from_energies(splits.train.iter().map(|&i| dataset.energy(i) as f64));

    info!(
        domains = config.domains.len(),
        valid = dataset.len(),
        train = splits.train.len(),
        val = splits.val.len(),
        test = splits.test.len(),
        mean = stats.mean,
        std = stats.std,
        "Dataset provisioned."
    );

    Ok(ProvisionedData {
        dataset,
        splits,
        stats,
        report: ProvisionReport { fetched, index },
    })
}
