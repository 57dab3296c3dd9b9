//! Localized message lookup.
//!
//! User-facing error and progress strings are resolved through a keyed
//! catalog instead of being hard-coded at the call site. The English catalog
//! is embedded at compile time; unknown keys fall back to the key itself so
//! a missing entry never panics a build.

use std::collections::BTreeMap;
use std::sync::OnceLock;

const EN: &str = include_str!("../locales/en.toml");

static CATALOG: OnceLock<BTreeMap<String, String>> = OnceLock::new();

fn catalog() -> &'static BTreeMap<String, String> {
    CATALOG.get_or_init(|| toml::from_str(EN).unwrap_or_default())
}

/// Look up a message by key.
pub fn tr(key: &str) -> String {
    catalog()
        .get(key)
        .cloned()
        .unwrap_or_else(|| key.to_string())
}

/// Look up a message and substitute `{}` placeholders in order.
pub fn tr_args(key: &str, args: &[&str]) -> String {
    let mut msg = tr(key);
    for arg in args {
        if let Some(pos) = msg.find("{}") {
            msg.replace_range(pos..pos + 2, arg);
        }
    }
    msg
}
