//! Message templates with `{placeholder}` substitution

use regex::{Captures, Regex};
use std::sync::OnceLock;

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_.]*)\}").expect("placeholder regex"))
}

/// Substitute `{key}` placeholders from `args`
///
/// Unknown keys render as `(unknown)`. Text outside placeholders is copied
/// verbatim.
pub fn format_message(template: &str, args: &[(&str, &str)]) -> String {
    placeholder_re()
        .replace_all(template, |caps: &Captures| {
            let key = &caps[1];
            args.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
                .unwrap_or_else(|| "(unknown)".to_string())
        })
        .into_owned()
}

/// Placeholder names used by a template, in order of appearance
pub fn placeholders(template: &str) -> Vec<&str> {
    placeholder_re()
        .captures_iter(template)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect()
}
