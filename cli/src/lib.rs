//! Commands behind the `cardvault` binary, kept in a library so they can
//! be driven from tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use cardvault_migrate::{
    BundleInspection, MigrationConfig, Migrator, OperationOutcome, inspect_bundle,
};
use cardvault_store::LocalStore;
use cardvault_types::AccountId;
use tracing::info;

/// Loads the config file if one was given, otherwise the defaults.
pub fn load_config(path: Option<&Path>) -> Result<MigrationConfig> {
    match path {
        Some(path) => MigrationConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(MigrationConfig::default()),
    }
}

async fn open_migrator(store_dir: &Path, account: &str, config: MigrationConfig) -> Result<Migrator> {
    let account = AccountId::parse(account).context("invalid account id")?;
    let store = Arc::new(
        LocalStore::open(store_dir)
            .await
            .with_context(|| format!("failed to open store at {}", store_dir.display()))?,
    );
    Ok(Migrator::new(store.clone(), store, account, config)?)
}

/// Exports an account into `out_dir`. Returns the outcome and, on
/// success, the path of the written bundle.
pub async fn export(
    store_dir: &Path,
    account: &str,
    out_dir: &Path,
    config: MigrationConfig,
) -> Result<(OperationOutcome, Option<PathBuf>)> {
    let migrator = open_migrator(store_dir, account, config).await?;
    let result = migrator.export().await;
    let outcome = OperationOutcome::from_export(&result);

    let Ok(bundle) = result else {
        return Ok((outcome, None));
    };
    tokio::fs::create_dir_all(out_dir)
        .await
        .with_context(|| format!("failed to create {}", out_dir.display()))?;
    let path = out_dir.join(&bundle.file_name);
    tokio::fs::write(&path, &bundle.bytes)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!("Wrote {} ({} bytes)", path.display(), bundle.bytes.len());
    Ok((outcome, Some(path)))
}

/// Imports a `.json` document or `.zip` bundle into an account.
pub async fn import(
    store_dir: &Path,
    account: &str,
    file: &Path,
    config: MigrationConfig,
) -> Result<OperationOutcome> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let file_name = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let migrator = open_migrator(store_dir, account, config).await?;
    Ok(migrator.run_import(&file_name, &bytes).await)
}

/// Lists what a bundle contains without importing it.
pub async fn inspect(file: &Path) -> Result<BundleInspection> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    inspect_bundle(&bytes).with_context(|| format!("{} is not a readable bundle", file.display()))
}
