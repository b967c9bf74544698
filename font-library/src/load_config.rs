/// `load_config` module: loads the static YAML config and injects secrets from the environment.
///
/// Every key of the YAML file is optional; missing keys fall back to the
/// defaults the ingest has always used (the `Font Library` doctype, its
/// `font_name`/`font_file` fields, the four font extensions, the site and
/// source locations).
///
/// # Environment
/// - `FRAPPE_SITE_URL` overrides `site.url`
/// - `FRAPPE_API_KEY` and `FRAPPE_API_SECRET` authenticate against the site
///   (read by [`load_credentials`], never from the YAML file)
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::Result;
use font_library_core::config::LibraryConfig;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

const DEFAULT_SITE_URL: &str = "https://ecom-dev.nesscale.com";
const DEFAULT_DRIVE_FOLDER_URL: &str =
    "https://drive.google.com/drive/folders/1le2Zw4uQx1_Kx5Lp8BPpX3v-15DOSTji";
const DEFAULT_FONTS_PATH: &str = "/home/frappe/frappe-bench/Fonts";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub site: SiteSection,
    pub library: LibraryConfig,
    pub drive: DriveSection,
    pub local: LocalSection,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SiteSection {
    pub url: String,
}

impl Default for SiteSection {
    fn default() -> Self {
        Self {
            url: DEFAULT_SITE_URL.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DriveSection {
    pub folder_url: String,
}

impl Default for DriveSection {
    fn default() -> Self {
        Self {
            folder_url: DEFAULT_DRIVE_FOLDER_URL.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LocalSection {
    pub fonts_path: PathBuf,
}

impl Default for LocalSection {
    fn default() -> Self {
        Self {
            fonts_path: PathBuf::from(DEFAULT_FONTS_PATH),
        }
    }
}

/// API token pair of the site user the uploads run as.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// Loads a static YAML config file (no secrets) and applies environment overrides.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    // An empty file is valid and means "all defaults".
    let mut config: CliConfig = if config_content.trim().is_empty() {
        CliConfig::default()
    } else {
        match serde_yaml::from_str(&config_content) {
            Ok(conf) => {
                info!(config_path = ?path_ref, "Parsed config YAML successfully");
                conf
            }
            Err(e) => {
                error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
                return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
            }
        }
    };

    if let Ok(site_url) = std::env::var("FRAPPE_SITE_URL") {
        info!(site_url = %site_url, "FRAPPE_SITE_URL overrides site.url");
        config.site.url = site_url;
    }

    if config.library.valid_extensions.is_empty() {
        error!("library.valid_extensions is empty");
        anyhow::bail!("library.valid_extensions must list at least one extension");
    }

    config.library.trace_loaded();
    info!(site_url = %config.site.url, "Config loaded and merged successfully");
    Ok(config)
}

/// Reads `FRAPPE_API_KEY` and `FRAPPE_API_SECRET` from the environment.
pub fn load_credentials() -> Result<Credentials> {
    let api_key = match std::env::var("FRAPPE_API_KEY") {
        Ok(key) => key,
        Err(e) => {
            error!(error = ?e, "FRAPPE_API_KEY environment variable not set");
            return Err(anyhow::anyhow!(
                "FRAPPE_API_KEY environment variable not set: {e}"
            ));
        }
    };
    let api_secret = match std::env::var("FRAPPE_API_SECRET") {
        Ok(secret) => secret,
        Err(e) => {
            error!(error = ?e, "FRAPPE_API_SECRET environment variable not set");
            return Err(anyhow::anyhow!(
                "FRAPPE_API_SECRET environment variable not set: {e}"
            ));
        }
    };
    info!(api_key_set = !api_key.is_empty(), "Frappe credentials found in env");
    Ok(Credentials {
        api_key,
        api_secret,
    })
}
