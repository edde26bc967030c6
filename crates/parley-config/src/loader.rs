// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Later layers override earlier ones:
//! compiled defaults, `/etc/parley/parley.toml`, `~/.config/parley/parley.toml`,
//! `./parley.toml`, then `PARLEY_*` environment variables.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::ParleyConfig;

/// Config sections that environment variables can address.
const SECTIONS: &[&str] = &[
    "agent", "telegram", "llm", "search", "delivery", "storage", "quota",
];

/// Candidate config files, lowest precedence first.
pub fn config_file_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/parley/parley.toml")];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("parley").join("parley.toml"));
    }
    paths.push(PathBuf::from("parley.toml"));
    paths
}

/// Builds the full layered Figment without extracting it.
pub fn build_figment() -> Figment {
    config_file_paths()
        .into_iter()
        .fold(
            Figment::new().merge(Serialized::defaults(ParleyConfig::default())),
            |figment, path| figment.merge(Toml::file(path)),
        )
        .merge(env_provider())
}

/// Loads configuration from the standard hierarchy with env overrides.
pub fn load_config() -> Result<ParleyConfig, figment::Error> {
    build_figment().extract()
}

/// Loads configuration from a TOML string on top of the defaults.
pub fn load_config_from_str(toml_content: &str) -> Result<ParleyConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ParleyConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Loads configuration from one explicit file, with env overrides.
pub fn load_config_from_path(path: &Path) -> Result<ParleyConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ParleyConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Maps `PARLEY_<SECTION>_<KEY>` to `<section>.<key>`.
///
/// Only the first underscore after a known section name becomes a dot, so
/// `PARLEY_TELEGRAM_BOT_TOKEN` lands on `telegram.bot_token`.
fn env_provider() -> Env {
    Env::prefixed("PARLEY_").map(|key| {
        let key = key.as_str().to_ascii_lowercase();
        SECTIONS
            .iter()
            .find_map(|section| {
                key.strip_prefix(section)
                    .and_then(|rest| rest.strip_prefix('_'))
                    .map(|rest| format!("{section}.{rest}"))
            })
            .unwrap_or(key)
            .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_nested_keys() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("PARLEY_TELEGRAM_BOT_TOKEN", "123:abc");
            jail.set_env("PARLEY_SEARCH_PER_DOMAIN_CAP", "3");
            jail.set_env("PARLEY_LLM_API_KEY", "gsk-test");
            let config: ParleyConfig = Figment::new()
                .merge(Serialized::defaults(ParleyConfig::default()))
                .merge(env_provider())
                .extract()?;
            assert_eq!(config.telegram.bot_token.as_deref(), Some("123:abc"));
            assert_eq!(config.search.per_domain_cap, 3);
            assert_eq!(config.llm.api_key.as_deref(), Some("gsk-test"));
            Ok(())
        });
    }

    #[test]
    fn single_env_token_loads() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("PARLEY_TELEGRAM_BOT_TOKEN", "123:abc");
            let config = load_config_from_path(Path::new("missing.toml"))?;
            assert_eq!(config.telegram.bot_token.as_deref(), Some("123:abc"));
            assert_eq!(config.agent.history_cap, 20);
            Ok(())
        });
    }

    #[test]
    fn local_file_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "parley.toml",
                r#"
[delivery]
min_flush_interval_ms = 500
"#,
            )?;
            let config = load_config_from_path(Path::new("parley.toml"))?;
            assert_eq!(config.delivery.min_flush_interval_ms, 500);
            assert_eq!(config.delivery.max_part_len, 4096);
            Ok(())
        });
    }

    #[test]
    fn config_paths_end_with_local_file() {
        let paths = config_file_paths();
        assert_eq!(paths.first().unwrap(), Path::new("/etc/parley/parley.toml"));
        assert_eq!(paths.last().unwrap(), Path::new("parley.toml"));
    }
}
