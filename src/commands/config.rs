//! `config` subcommands

use super::ConfigCommands;
use crate::access::{with_access, FolderAccess, Unrestricted};
use crate::settings::{Settings, SettingsStore};
use anyhow::{bail, Result};
use std::path::Path;

pub fn execute(store: &SettingsStore, cmd: ConfigCommands) -> Result<()> {
    match cmd {
        ConfigCommands::Show => show(store),
        ConfigCommands::Set {
            server,
            model,
            language,
            batch_size,
            auto_rename,
        } => {
            let mut settings = store.load()?;
            apply_changes(&mut settings, server, model, language, batch_size, auto_rename)?;
            store.save(&settings)?;
            println!("✔ Settings saved to {}", store.path().display());
            Ok(())
        }
        ConfigCommands::Authorize { folder } => authorize(store, &Unrestricted, &folder),
    }
}

fn show(store: &SettingsStore) -> Result<()> {
    let settings = store.load()?;
    println!("# {}", store.path().display());
    println!("{}", serde_json::to_string_pretty(&settings)?);

    match settings.server() {
        Ok(server) => println!("# resolved server: {}", server),
        Err(e) => println!("# stored server address is invalid: {}", e),
    }
    Ok(())
}

fn apply_changes(
    settings: &mut Settings,
    server: Option<String>,
    model: Option<String>,
    language: Option<String>,
    batch_size: Option<usize>,
    auto_rename: Option<bool>,
) -> Result<()> {
    if let Some(server) = server {
        // Stored raw, but refuse something that will never normalize
        crate::ai::normalize_server_address(&server)?;
        settings.server_address = server;
    }
    if let Some(model) = model {
        settings.model = model;
    }
    if let Some(language) = language {
        settings.language = language;
    }
    if let Some(batch_size) = batch_size {
        if batch_size == 0 {
            bail!("batch size must be at least 1");
        }
        settings.batch_size = batch_size;
    }
    if let Some(auto_rename) = auto_rename {
        settings.auto_rename = auto_rename;
    }
    Ok(())
}

/// Grant access and persist the token as the folder bookmark
fn authorize(store: &SettingsStore, access: &dyn FolderAccess, folder: &Path) -> Result<()> {
    let token = access.authorize(folder)?;
    let images = with_access(access, &token, |path| crate::services::discover(&[path]).len())?;

    let mut settings = store.load()?;
    settings.folder_bookmark = Some(token);
    store.save(&settings)?;

    println!("✔ Authorized {} ({} image(s))", folder.display(), images);
    Ok(())
}
