use super::defaults::DefaultsConfig;
use super::file::{FileConfig, FileDatasetConfig, FileModelConfig, FileTrainingConfig};
use crate::cli::TrainArgs;
use crate::data::DataManager;
use crate::error::{CliError, Result};
use cathnet::engine::config::{
    self as core_config, DatasetConfigBuilder, DatasetFilters, RunConfig, TrainingConfigBuilder,
};
use cathnet::model::config::PotentialConfig;
use tracing::debug;

const SECTIONS: [&str; 3] = ["dataset", "model", "training"];

/// Resolves the run configuration for `train`.
///
/// Precedence, lowest first: built-in defaults, the config file, command-line flags,
/// then `--set` overrides.
pub fn build_run_config(args: &TrainArgs, data_manager: &DataManager) -> Result<RunConfig> {
    let defaults = DefaultsConfig::default();

    let file_config = match &args.config {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };
    let file_config = apply_flags(file_config, args);
    let mut file_config = apply_set_values(file_config, &args.set_values)?;
    debug!("Merged file configuration: {:?}", &file_config);

    let dataset = merge_dataset(
        file_config.dataset.take().unwrap_or_default(),
        &defaults,
        data_manager,
    )?;
    let model = merge_model(file_config.model.take().unwrap_or_default());
    let training = merge_training(file_config.training.take().unwrap_or_default(), &defaults)?;

    Ok(RunConfig::new(dataset, model, training)?)
}

fn apply_flags(mut config: FileConfig, args: &TrainArgs) -> FileConfig {
    let dataset = config.dataset.get_or_insert_with(Default::default);
    if !args.domains.is_empty() {
        dataset.domains = Some(args.domains.clone());
    }
    if !args.temperatures.is_empty() {
        dataset.temperatures = Some(args.temperatures.clone());
    }
    if args.frame_stride.is_some() {
        dataset.frame_stride = args.frame_stride;
    }
    if args.data_root.is_some() {
        dataset.root = args.data_root.clone();
    }
    if args.remote_url.is_some() {
        dataset.remote_url = args.remote_url.clone();
    }
    if args.offline {
        dataset.remote_url = None;
    }
    if args.seed.is_some() {
        dataset.seed = args.seed;
    }

    let training = config.training.get_or_insert_with(Default::default);
    if args.log_dir.is_some() {
        training.log_dir = args.log_dir.clone();
    }
    if args.num_epochs.is_some() {
        training.num_epochs = args.num_epochs;
    }
    if args.batch_size.is_some() {
        training.batch_size = args.batch_size;
    }
    if args.lr.is_some() {
        training.lr = args.lr;
    }
    if args.precision.is_some() {
        training.precision = args.precision;
    }
    if args.accelerator.is_some() {
        training.accelerator = args.accelerator;
    }
    if !args.devices.is_empty() {
        training.devices = Some(args.devices.clone());
    }
    if args.load_model.is_some() {
        training.load_model = args.load_model.clone();
    }
    if args.seed.is_some() {
        training.seed = args.seed;
    }
    config
}

/// Applies `section.key=VALUE` overrides. Values are read as TOML literals when they
/// parse as one (`5`, `1e-3`, `[1, 2]`, `true`) and as plain strings otherwise.
fn apply_set_values(config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    if set_values.is_empty() {
        return Ok(config);
    }
    let toml::Value::Table(mut root) = toml::Value::try_from(&config)
        .map_err(|e| CliError::Config(format!("Failed to apply --set values: {}", e)))?
    else {
        return Err(CliError::Config(
            "Failed to apply --set values: configuration is not a table".to_string(),
        ));
    };

    for kv_pair in set_values {
        let Some((key, value_str)) = kv_pair.split_once('=') else {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            )));
        };
        let Some((section, field)) = key.trim().split_once('.') else {
            return Err(CliError::Config(format!(
                "Invalid --set key '{}'. Expected SECTION.KEY, e.g. training.lr.",
                key
            )));
        };
        if !SECTIONS.contains(&section) {
            return Err(CliError::Config(format!(
                "Unknown configuration section for --set: '{}'",
                section
            )));
        }

        let table = root
            .entry(section.to_string())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        let toml::Value::Table(table) = table else {
            return Err(CliError::Config(format!(
                "Configuration section '{}' is not a table",
                section
            )));
        };
        table.insert(field.to_string(), parse_value(value_str.trim()));
    }

    toml::Value::Table(root)
        .try_into()
        .map_err(|e| CliError::Config(format!("Unsupported or invalid --set value: {}", e)))
}

fn parse_value(text: &str) -> toml::Value {
    toml::from_str::<toml::Table>(&format!("value = {}", text))
        .ok()
        .and_then(|mut table| table.remove("value"))
        .unwrap_or_else(|| toml::Value::String(text.to_string()))
}

fn merge_dataset(
    file: FileDatasetConfig,
    defaults: &DefaultsConfig,
    data_manager: &DataManager,
) -> Result<core_config::DatasetConfig> {
    let domains = file.domains.ok_or_else(|| {
        CliError::Config(
            "At least one domain is required, via --domain or `dataset.domains`.".to_string(),
        )
    })?;
    let filters = DatasetFilters {
        max_atoms: file.max_atoms,
        max_residues: file.max_residues,
        min_gyration_radius: file.min_gyration_radius,
        max_gyration_radius: file.max_gyration_radius,
        max_alpha: file.max_alpha,
        max_beta: file.max_beta,
        max_coil: file.max_coil,
    };

    Ok(DatasetConfigBuilder::new()
        .root(
            file.root
                .unwrap_or_else(|| data_manager.get_data_path().to_path_buf()),
        )
        .remote_url(file.remote_url)
        .domains(domains)
        .temperatures(file.temperatures.unwrap_or_else(|| defaults.temperatures.clone()))
        .frame_stride(file.frame_stride.unwrap_or(defaults.frame_stride))
        .filters(filters)
        .train_size(file.train_size.unwrap_or(defaults.train_size))
        .val_size(file.val_size.unwrap_or(defaults.val_size))
        .test_size(file.test_size.unwrap_or(defaults.test_size))
        .splits_file(file.splits_file)
        .seed(file.seed.unwrap_or(defaults.seed))
        .build()?)
}

fn merge_model(file: FileModelConfig) -> PotentialConfig {
    let mut model = PotentialConfig::new();
    if let Some(v) = file.embedding_dimension {
        model = model.with_embedding_dimension(v);
    }
    if let Some(v) = file.num_layers {
        model = model.with_num_layers(v);
    }
    if let Some(v) = file.num_rbf {
        model = model.with_num_rbf(v);
    }
    if let Some(v) = file.rbf_type {
        model = model.with_rbf_type(v);
    }
    if let Some(v) = file.activation {
        model = model.with_activation(v);
    }
    if let Some(v) = file.cutoff_lower {
        model = model.with_cutoff_lower(v);
    }
    if let Some(v) = file.cutoff_upper {
        model = model.with_cutoff_upper(v);
    }
    if let Some(v) = file.max_z {
        model = model.with_max_z(v);
    }
    if let Some(v) = file.max_num_neighbors {
        model = model.with_max_num_neighbors(v);
    }
    if let Some(v) = file.derivative {
        model = model.with_derivative(v);
    }
    model
}

fn merge_training(
    file: FileTrainingConfig,
    defaults: &DefaultsConfig,
) -> Result<core_config::TrainingConfig> {
    Ok(TrainingConfigBuilder::new()
        .batch_size(file.batch_size.unwrap_or(defaults.batch_size))
        .inference_batch_size(
            file.inference_batch_size
                .unwrap_or(defaults.inference_batch_size),
        )
        .lr(file.lr.unwrap_or(defaults.lr))
        .weight_decay(file.weight_decay.unwrap_or(defaults.weight_decay))
        .lr_warmup_steps(file.lr_warmup_steps.unwrap_or(defaults.lr_warmup_steps))
        .lr_factor(file.lr_factor.unwrap_or(defaults.lr_factor))
        .lr_patience(file.lr_patience.unwrap_or(defaults.lr_patience))
        .lr_min(file.lr_min.unwrap_or(defaults.lr_min))
        .gradient_clipping(file.gradient_clipping)
        .num_epochs(file.num_epochs.unwrap_or(defaults.num_epochs))
        .y_weight(file.y_weight.unwrap_or(defaults.y_weight))
        .neg_dy_weight(file.neg_dy_weight.unwrap_or(defaults.neg_dy_weight))
        .log_dir(file.log_dir.unwrap_or_else(|| defaults.log_dir.clone()))
        .save_interval(file.save_interval.unwrap_or(defaults.save_interval))
        .save_top_k(file.save_top_k.unwrap_or(defaults.save_top_k))
        .num_workers(file.num_workers.unwrap_or(defaults.num_workers))
        .precision(file.precision.unwrap_or(defaults.precision))
        .accelerator(file.accelerator.unwrap_or(defaults.accelerator))
        .devices(file.devices.unwrap_or_default())
        .load_model(file.load_model)
        .seed(file.seed.unwrap_or(defaults.seed))
        .build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cathnet::data::split::SplitSize;
    use cathnet::engine::config::{Accelerator, ConfigError, Precision};
    use cathnet::model::config::RbfKind;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::{TempDir, tempdir};

    fn setup() -> (TempDir, DataManager) {
        let tmp = tempdir().expect("create temp dir");
        let manager = DataManager::with_custom_path(tmp.path().join("data"));
        (tmp, manager)
    }

    fn base_args(dir: &Path) -> TrainArgs {
        TrainArgs {
            domains: vec!["1abcA00".to_string()],
            log_dir: Some(dir.join("logs")),
            ..Default::default()
        }
    }

    fn write_config(dir: &Path, text: &str) -> PathBuf {
        let path = dir.join("run.toml");
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn defaults_fill_every_missing_key() {
        let (tmp, manager) = setup();
        let config = build_run_config(&base_args(tmp.path()), &manager).expect("build ok");
        let defaults = DefaultsConfig::default();

        assert_eq!(config.dataset.root, tmp.path().join("data"));
        assert_eq!(config.dataset.remote_url, None);
        assert_eq!(config.dataset.temperatures, defaults.temperatures);
        assert_eq!(config.dataset.frame_stride, defaults.frame_stride);
        assert_eq!(config.dataset.test_size, SplitSize::Remainder);
        assert_eq!(config.training.batch_size, defaults.batch_size);
        assert_eq!(config.training.precision, Precision::Single);
        assert_eq!(config.training.accelerator, Accelerator::Cpu);
        assert_eq!(config.model.num_rbf, PotentialConfig::new().num_rbf);
        assert!(tmp.path().join("logs").is_dir());
    }

    #[test]
    fn file_overrides_defaults() {
        let (tmp, manager) = setup();
        let path = write_config(
            tmp.path(),
            r#"
            [dataset]
            temperatures = [320]
            frame-stride = 2

            [model]
            num-rbf = 16
            rbf-type = "gauss"

            [training]
            num-epochs = 7
            lr = 5e-4
            "#,
        );
        let mut args = base_args(tmp.path());
        args.config = Some(path);

        let config = build_run_config(&args, &manager).expect("build ok");
        assert_eq!(config.dataset.temperatures, vec![320]);
        assert_eq!(config.dataset.frame_stride, 2);
        assert_eq!(config.model.num_rbf, 16);
        assert_eq!(config.model.rbf_type, RbfKind::Gauss);
        assert_eq!(config.training.num_epochs, 7);
        assert!((config.training.lr - 5e-4).abs() < 1e-12);
    }

    #[test]
    fn flags_override_file_and_set_overrides_flags() {
        let (tmp, manager) = setup();
        let path = write_config(
            tmp.path(),
            r#"
            [dataset]
            domains = ["9zzzA00"]

            [training]
            num-epochs = 7
            batch-size = 8
            lr-patience = 2
            "#,
        );
        let mut args = base_args(tmp.path());
        args.config = Some(path);
        args.num_epochs = Some(11);
        args.batch_size = Some(4);
        args.set_values = vec![
            "training.batch-size=2".to_string(),
            "training.lr-patience=9".to_string(),
            "dataset.val-size=0.2".to_string(),
            "model.activation=tanh".to_string(),
        ];

        let config = build_run_config(&args, &manager).expect("build ok");
        assert_eq!(config.dataset.domains, vec!["1abcA00"]);
        assert_eq!(config.training.num_epochs, 11);
        assert_eq!(config.training.batch_size, 2);
        assert_eq!(config.training.lr_patience, 9);
        assert_eq!(config.dataset.val_size, SplitSize::Fraction(0.2));
        assert_eq!(
            config.model.activation,
            cathnet::model::config::Activation::Tanh
        );
    }

    #[test]
    fn set_values_accept_lists_and_strings() {
        let (tmp, manager) = setup();
        let mut args = base_args(tmp.path());
        args.set_values = vec![
            "dataset.domains=[\"1abcA00\", \"2defB01\"]".to_string(),
            "dataset.remote-url=https://example.org/mdcath".to_string(),
            "dataset.train-size=remainder".to_string(),
            "dataset.test-size=5".to_string(),
        ];

        let config = build_run_config(&args, &manager).expect("build ok");
        assert_eq!(config.dataset.domains.len(), 2);
        assert_eq!(
            config.dataset.remote_url.as_deref(),
            Some("https://example.org/mdcath")
        );
        assert_eq!(config.dataset.test_size, SplitSize::Count(5));
    }

    #[test]
    fn offline_flag_drops_the_file_remote_url() {
        let (tmp, manager) = setup();
        let path = write_config(
            tmp.path(),
            "[dataset]\nremote-url = \"https://example.org/mdcath\"\n",
        );
        let mut args = base_args(tmp.path());
        args.config = Some(path);
        args.offline = true;

        let config = build_run_config(&args, &manager).expect("build ok");
        assert_eq!(config.dataset.remote_url, None);
    }

    #[test]
    fn malformed_or_unknown_set_values_are_rejected() {
        let (tmp, manager) = setup();
        for bad in ["training.lr", "lr=0.1", "optimizer.lr=0.1", "training.learning-rate=0.1"] {
            let mut args = base_args(tmp.path());
            args.set_values = vec![bad.to_string()];
            assert!(
                matches!(build_run_config(&args, &manager), Err(CliError::Config(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn missing_domains_are_a_config_error() {
        let (tmp, manager) = setup();
        let mut args = base_args(tmp.path());
        args.domains.clear();
        assert!(matches!(
            build_run_config(&args, &manager),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn contradictory_settings_fail_before_any_work() {
        let (tmp, manager) = setup();
        let mut args = base_args(tmp.path());
        args.accelerator = Some(Accelerator::Gpu);
        args.precision = Some(64);

        let err = build_run_config(&args, &manager).unwrap_err();
        assert!(matches!(
            err,
            CliError::Cathnet(cathnet::engine::error::EngineError::Config {
                source: ConfigError::Conflict(_)
            })
        ));
    }
}
