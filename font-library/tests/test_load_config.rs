use serial_test::serial;
use std::env;
use std::fs::write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

use font_library::load_config::{load_config, load_credentials};

fn config_file(yaml: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), yaml).unwrap();
    file
}

#[test]
#[serial]
fn full_config_is_loaded() {
    env::remove_var("FRAPPE_SITE_URL");
    let file = config_file(
        r#"
site:
  url: https://fonts.example.com
library:
  doctype: Typeface
  font_name_field: title
  attach_field: upload
  valid_extensions: [".ttf"]
drive:
  folder_url: https://drive.google.com/drive/folders/abcdefghijkl
local:
  fonts_path: /srv/fonts
"#,
    );

    let config = load_config(file.path()).expect("Config should load");

    assert_eq!(config.site.url, "https://fonts.example.com");
    assert_eq!(config.library.doctype, "Typeface");
    assert_eq!(config.library.font_name_field, "title");
    assert_eq!(config.library.attach_field, "upload");
    assert_eq!(config.library.valid_extensions, vec![".ttf"]);
    assert_eq!(
        config.drive.folder_url,
        "https://drive.google.com/drive/folders/abcdefghijkl"
    );
    assert_eq!(config.local.fonts_path, PathBuf::from("/srv/fonts"));
}

#[test]
#[serial]
fn missing_keys_fall_back_to_defaults() {
    env::remove_var("FRAPPE_SITE_URL");
    let file = config_file("library:\n  doctype: Font Library\n");

    let config = load_config(file.path()).expect("Config should load");

    assert_eq!(config.site.url, "https://ecom-dev.nesscale.com");
    assert_eq!(config.library.font_name_field, "font_name");
    assert_eq!(config.library.attach_field, "font_file");
    assert_eq!(
        config.library.valid_extensions,
        vec![".ttf", ".otf", ".woff", ".woff2"]
    );
    assert_eq!(
        config.local.fonts_path,
        PathBuf::from("/home/frappe/frappe-bench/Fonts")
    );
    assert!(config.drive.folder_url.contains("/drive/folders/"));
}

#[test]
#[serial]
fn empty_file_means_all_defaults() {
    env::remove_var("FRAPPE_SITE_URL");
    let file = config_file("");
    let config = load_config(file.path()).expect("Empty config should load");
    assert_eq!(config.library.doctype, "Font Library");
}

#[test]
#[serial]
fn site_url_env_overrides_yaml() {
    env::set_var("FRAPPE_SITE_URL", "https://staging.example.com");
    let file = config_file("site:\n  url: https://prod.example.com\n");

    let config = load_config(file.path()).expect("Config should load");
    env::remove_var("FRAPPE_SITE_URL");

    assert_eq!(config.site.url, "https://staging.example.com");
}

#[test]
#[serial]
fn invalid_yaml_is_an_error() {
    let file = config_file("library: [this is: not valid");
    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config YAML"));
}

#[test]
#[serial]
fn empty_extension_list_is_rejected() {
    env::remove_var("FRAPPE_SITE_URL");
    let file = config_file("library:\n  valid_extensions: []\n");
    assert!(load_config(file.path()).is_err());
}

#[test]
#[serial]
fn credentials_come_from_env() {
    env::set_var("FRAPPE_API_KEY", "key-123");
    env::set_var("FRAPPE_API_SECRET", "secret-456");

    let creds = load_credentials().expect("Credentials should load");
    assert_eq!(creds.api_key, "key-123");
    assert_eq!(creds.api_secret, "secret-456");
    assert!(!format!("{creds:?}").contains("secret-456"));

    env::remove_var("FRAPPE_API_SECRET");
    let err = load_credentials().unwrap_err();
    assert!(err.to_string().contains("FRAPPE_API_SECRET"));

    env::remove_var("FRAPPE_API_KEY");
}
