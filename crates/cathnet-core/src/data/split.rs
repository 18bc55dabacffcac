use super::error::DataError;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::str::FromStr;

/// Requested size of one split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SplitSizeRepr", into = "SplitSizeRepr")]
pub enum SplitSize {
    /// An exact number of samples.
    Count(usize),
    /// A fraction in `(0, 1]` of the valid samples, rounded to the nearest integer.
    Fraction(f64),
    /// Whatever the other two splits leave over.
    Remainder,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum SplitSizeRepr {
    Count(u64),
    Fraction(f64),
    Text(String),
}

impl TryFrom<SplitSizeRepr> for SplitSize {
    type Error = String;

    fn try_from(repr: SplitSizeRepr) -> Result<Self, Self::Error> {
        match repr {
            SplitSizeRepr::Count(n) => Ok(SplitSize::Count(n as usize)),
            SplitSizeRepr::Fraction(f) => Ok(SplitSize::Fraction(f)),
            SplitSizeRepr::Text(s) => s.parse(),
        }
    }
}

impl From<SplitSize> for SplitSizeRepr {
    fn from(size: SplitSize) -> Self {
        match size {
            SplitSize::Count(n) => SplitSizeRepr::Count(n as u64),
            SplitSize::Fraction(f) => SplitSizeRepr::Fraction(f),
            SplitSize::Remainder => SplitSizeRepr::Text("remainder".to_string()),
        }
    }
}

impl FromStr for SplitSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("remainder") {
            return Ok(SplitSize::Remainder);
        }
        if let Ok(n) = s.parse::<usize>() {
            return Ok(SplitSize::Count(n));
        }
        s.parse::<f64>()
            .map(SplitSize::Fraction)
            .map_err(|_| format!("'{s}' is not a count, a fraction or 'remainder'"))
    }
}

impl fmt::Display for SplitSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitSize::Count(n) => write!(f, "{n}"),
            SplitSize::Fraction(x) => write!(f, "{x}"),
            SplitSize::Remainder => write!(f, "remainder"),
        }
    }
}

impl SplitSize {
    fn resolve_fixed(&self, available: usize) -> Option<usize> {
        match *self {
            SplitSize::Count(n) => Some(n),
            SplitSize::Fraction(f) => Some((f * available as f64).round() as usize),
            SplitSize::Remainder => None,
        }
    }
}

/// Three disjoint partitions of the valid sample indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Splits {
    #[serde(rename = "idx_train")]
    pub train: Vec<usize>,
    #[serde(rename = "idx_val")]
    pub val: Vec<usize>,
    #[serde(rename = "idx_test")]
    pub test: Vec<usize>,
}

/// Draws the three splits from `available` samples with a seeded permutation.
///
/// # Errors
///
/// Returns [`DataError::SplitTooLarge`] when the resolved sizes exceed `available`, and
/// [`DataError::EmptySplit`] when any split resolves to zero samples.
pub fn make_splits(
    available: usize,
    train: SplitSize,
    val: SplitSize,
    test: SplitSize,
    seed: u64,
) -> Result<Splits, DataError> {
    let fixed = [
        train.resolve_fixed(available),
        val.resolve_fixed(available),
        test.resolve_fixed(available),
    ];
    let fixed_total: usize = fixed.iter().flatten().sum();
    if fixed_total > available {
        return Err(DataError::SplitTooLarge {
            requested: fixed_total,
            available,
        });
    }
    let remainder = available - fixed_total;
    let [n_train, n_val, n_test] = fixed.map(|n| n.unwrap_or(remainder));

    for (name, n) in [("train", n_train), ("validation", n_val), ("test", n_test)] {
        if n == 0 {
            return Err(DataError::EmptySplit { split: name });
        }
    }

    let mut order: Vec<usize> = (0..available).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let train = order[..n_train].to_vec();
    let val = order[n_train..n_train + n_val].to_vec();
    let test = order[n_train + n_val..n_train + n_val + n_test].to_vec();
    Ok(Splits { train, val, test })
}

impl Splits {
    pub fn total(&self) -> usize {
        self.train.len() + self.val.len() + self.test.len()
    }

    /// Checks that every index is in range and no index appears twice.
    pub fn validate(&self, available: usize) -> Result<(), String> {
        let mut seen = HashSet::with_capacity(self.total());
        for (name, part) in [("train", &self.train), ("val", &self.val), ("test", &self.test)] {
            if part.is_empty() {
                return Err(format!("the {name} split is empty"));
            }
            for &idx in part {
                if idx >= available {
                    return Err(format!(
                        "{name} index {idx} is out of range for {available} samples"
                    ));
                }
                if !seen.insert(idx) {
                    return Err(format!("index {idx} appears in more than one split"));
                }
            }
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<(), DataError> {
        let file = File::create(path).map_err(|source| DataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::to_writer(BufWriter::new(file), self).map_err(|e| DataError::Format {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Loads splits from a JSON file and checks them against the number of valid samples.
    pub fn load(path: &Path, available: usize) -> Result<Self, DataError> {
        let file = File::open(path).map_err(|source| DataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let splits: Splits =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| DataError::Format {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        splits
            .validate(available)
            .map_err(|message| DataError::Format {
                path: path.to_path_buf(),
                message,
            })?;
        Ok(splits)
    }
}
