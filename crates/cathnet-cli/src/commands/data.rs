use crate::cli::{DataArgs, DataCommands};
use crate::data::{self, DataManager};
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use cathnet::data::provision::{domain_path, ensure_local};
use cathnet::engine::progress::{Progress, ProgressReporter};
use std::fs;
use std::path::PathBuf;
use tracing::info;

pub async fn run(args: DataArgs) -> Result<()> {
    match args.command {
        DataCommands::Download {
            remote_url,
            domains,
            force,
        } => {
            handle_download(&remote_url, &domains, force).await?;
        }
        DataCommands::Path => {
            handle_path()?;
        }
        DataCommands::SetPath { path } => {
            handle_set_path(path)?;
        }
        DataCommands::ResetPath => {
            handle_reset_path()?;
        }
    }
    Ok(())
}

async fn handle_download(remote_url: &str, domains: &[String], force: bool) -> Result<()> {
    println!("Initializing data manager...");
    let manager = DataManager::new()?;
    let root = manager.get_data_path().to_path_buf();

    if force {
        for domain in domains {
            let path = domain_path(&root, domain);
            if path.is_file() {
                info!("--force specified, removing {:?}", &path);
                fs::remove_file(&path)?;
            }
        }
    }

    let store = data::remote_store(Some(remote_url))?;
    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Fetching {} domain(s) to: {:?}", domains.len(), &root);
    let fetched = tokio::task::block_in_place(|| {
        reporter.report(Progress::PhaseStart {
            name: "Fetching domain files",
        });
        let fetched = ensure_local(&root, domains, store.as_ref(), &reporter);
        reporter.report(Progress::PhaseFinish);
        fetched
    })?;

    println!(
        "✓ {} file(s) fetched, {} already present.",
        fetched.len(),
        domains.len() - fetched.len()
    );
    Ok(())
}

fn handle_path() -> Result<()> {
    let manager = DataManager::new()?;
    println!("{}", manager.get_data_path().display());
    Ok(())
}

fn handle_set_path(path: PathBuf) -> Result<()> {
    if !path.is_absolute() {
        return Err(CliError::Argument(format!(
            "Data path must be absolute, got {:?}",
            path
        )));
    }
    DataManager::set_custom_path(&path)?;
    println!("✓ Data path set to: {}", path.display());
    Ok(())
}

fn handle_reset_path() -> Result<()> {
    DataManager::reset_path()?;
    let manager = DataManager::new()?;
    println!(
        "✓ Data path reset to default: {}",
        manager.get_data_path().display()
    );
    Ok(())
}
