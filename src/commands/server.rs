//! `health` and `models` commands

use super::ServerArgs;
use crate::ai::{normalize_server_address, InferenceClient, OllamaClient, ServerAddress};
use crate::settings::Settings;
use anyhow::Result;

/// Command-line address wins over the stored one
pub(crate) fn resolve_server(settings: &Settings, args: &ServerArgs) -> Result<ServerAddress> {
    let raw = args.server.as_deref().unwrap_or(&settings.server_address);
    Ok(normalize_server_address(raw)?)
}

pub async fn health(settings: &Settings, args: &ServerArgs) -> Result<()> {
    let server = resolve_server(settings, args)?;
    let client = OllamaClient::new(server.clone(), settings.model.clone());

    client.health_check().await?;
    println!("✔ {} is reachable", server);
    Ok(())
}

pub async fn models(settings: &Settings, args: &ServerArgs) -> Result<()> {
    let server = resolve_server(settings, args)?;
    let client = OllamaClient::new(server.clone(), settings.model.clone());

    let mut names = client.list_models().await?;
    names.sort();

    if names.is_empty() {
        println!("No models installed on {}", server);
    }
    for name in names {
        let marker = if name == settings.model { " (selected)" } else { "" };
        println!("{}{}", name, marker);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_overrides_stored_address() {
        let settings = Settings {
            server_address: "stored-host".to_string(),
            ..Settings::default()
        };

        let from_flag = resolve_server(
            &settings,
            &ServerArgs {
                server: Some("flag-host:1234".to_string()),
            },
        )
        .unwrap();
        assert_eq!(from_flag.as_str(), "http://flag-host:1234");

        let from_settings = resolve_server(&settings, &ServerArgs { server: None }).unwrap();
        assert_eq!(from_settings.as_str(), "http://stored-host:11434");
    }

    #[test]
    fn test_empty_address_is_rejected() {
        let settings = Settings::default();
        let result = resolve_server(
            &settings,
            &ServerArgs {
                server: Some("  ".to_string()),
            },
        );
        assert!(result.is_err());
    }
}
