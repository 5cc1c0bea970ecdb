use crate::Config;
use anyhow::Result;
use std::path::PathBuf;

const CONFIG_FILE: &str = "inkpost.toml";

pub async fn run(path: PathBuf, name: Option<String>) -> Result<()> {
    let site_name = name.unwrap_or_else(|| "My Blog".to_string());

    let config_path = path.join(CONFIG_FILE);
    if config_path.exists() {
        anyhow::bail!("{} already exists", config_path.display());
    }

    std::fs::create_dir_all(path.join("data"))?;
    std::fs::write(&config_path, Config::default_toml(&site_name))?;

    tracing::info!("Created new site at {:?}", path);
    tracing::info!("Run 'inkpost migrate' to set up the database");
    tracing::info!("Run 'inkpost serve' to start the server");

    Ok(())
}
