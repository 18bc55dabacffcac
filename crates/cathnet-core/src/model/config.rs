use burn::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Radial basis family used to expand interatomic distances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RbfKind {
    /// Gaussians on an exponentially transformed distance.
    ExpNorm,
    /// Gaussians evenly spaced on the distance itself.
    Gauss,
}

/// Nonlinearity applied after each dense layer of the pair network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Silu,
    Tanh,
    /// Shifted softplus, `softplus(x) - ln 2`.
    Ssp,
    Sigmoid,
}

impl fmt::Display for RbfKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RbfKind::ExpNorm => write!(f, "expnorm"),
            RbfKind::Gauss => write!(f, "gauss"),
        }
    }
}

impl FromStr for RbfKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "expnorm" => Ok(RbfKind::ExpNorm),
            "gauss" => Ok(RbfKind::Gauss),
            other => Err(format!(
                "unknown radial basis '{other}' (expected 'expnorm' or 'gauss')"
            )),
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Activation::Silu => "silu",
            Activation::Tanh => "tanh",
            Activation::Ssp => "ssp",
            Activation::Sigmoid => "sigmoid",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Activation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "silu" => Ok(Activation::Silu),
            "tanh" => Ok(Activation::Tanh),
            "ssp" => Ok(Activation::Ssp),
            "sigmoid" => Ok(Activation::Sigmoid),
            other => Err(format!(
                "unknown activation '{other}' (expected one of silu, tanh, ssp, sigmoid)"
            )),
        }
    }
}

/// Hyperparameters of the potential.
///
/// Distances are in Angstroms. `max_z` bounds the atomic numbers the element embedding
/// can represent; `max_num_neighbors` bounds the neighbor count of any atom in a batch.
#[derive(Config, Debug)]
pub struct PotentialConfig {
    /// Width of the element embeddings and of every hidden layer.
    #[config(default = 128)]
    pub embedding_dimension: usize,
    /// Number of dense layers in the pair network.
    #[config(default = 2)]
    pub num_layers: usize,
    /// Number of radial basis functions.
    #[config(default = 32)]
    pub num_rbf: usize,
    #[config(default = "RbfKind::ExpNorm")]
    pub rbf_type: RbfKind,
    #[config(default = "Activation::Silu")]
    pub activation: Activation,
    #[config(default = 0.0)]
    pub cutoff_lower: f64,
    #[config(default = 5.0)]
    pub cutoff_upper: f64,
    #[config(default = 128)]
    pub max_z: usize,
    #[config(default = 64)]
    pub max_num_neighbors: usize,
    /// Whether forces are predicted alongside energies.
    #[config(default = true)]
    pub derivative: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rbf_kind_parses_case_insensitively() {
        assert_eq!("ExpNorm".parse::<RbfKind>().unwrap(), RbfKind::ExpNorm);
        assert_eq!("gauss".parse::<RbfKind>().unwrap(), RbfKind::Gauss);
        assert!("bessel".parse::<RbfKind>().is_err());
    }

    #[test]
    fn activation_display_matches_parse() {
        for act in [
            Activation::Silu,
            Activation::Tanh,
            Activation::Ssp,
            Activation::Sigmoid,
        ] {
            assert_eq!(act.to_string().parse::<Activation>().unwrap(), act);
        }
    }

    #[test]
    fn config_json_round_trip_keeps_enum_choices() {
        let config = PotentialConfig::new()
            .with_rbf_type(RbfKind::Gauss)
            .with_activation(Activation::Ssp)
            .with_num_layers(3);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"gauss\""));
        let back: PotentialConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.rbf_type, RbfKind::Gauss);
        assert_eq!(back.activation, Activation::Ssp);
        assert_eq!(back.num_layers, 3);
    }
}
