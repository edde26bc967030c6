// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `parley config` command implementation.

use parley_config::ParleyConfig;

const REDACTED: &str = "<redacted>";

/// Serializes the effective configuration as TOML with secrets masked.
pub fn render_redacted(config: &ParleyConfig) -> Result<String, toml::ser::Error> {
    let mut shown = config.clone();
    if shown.telegram.bot_token.is_some() {
        shown.telegram.bot_token = Some(REDACTED.to_string());
    }
    if shown.llm.api_key.is_some() {
        shown.llm.api_key = Some(REDACTED.to_string());
    }
    toml::to_string_pretty(&shown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_are_masked() {
        let config = parley_config::load_and_validate_str(
            "[telegram]\nbot_token = \"123:secret\"\n\n[llm]\napi_key = \"gsk-secret\"\n",
        )
        .unwrap();
        let rendered = render_redacted(&config).unwrap();
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains(REDACTED));
        assert!(rendered.contains("history_cap = 20"));
    }
}
