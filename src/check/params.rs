//! Check parameters: named, string-encoded options

use super::definition::{ParameterDef, ParameterKind};
use super::CheckError;
use std::collections::HashMap;

/// Host-side settings the engine reads parameter overrides from
///
/// Queried on every evaluation, so a change between two runs is picked up by
/// the next one.
pub trait ParameterSource: Send + Sync {
    /// Current overrides for one check, keyed by parameter name
    fn parameters(&self, check_id: &str) -> HashMap<String, String>;
}

/// No overrides at all
#[derive(Debug, Default, Clone, Copy)]
pub struct NoParameters;

impl ParameterSource for NoParameters {
    fn parameters(&self, _check_id: &str) -> HashMap<String, String> {
        HashMap::new()
    }
}

impl ParameterSource for HashMap<String, HashMap<String, String>> {
    fn parameters(&self, check_id: &str) -> HashMap<String, String> {
        self.get(check_id).cloned().unwrap_or_default()
    }
}

/// Snapshot of parameter values passed to one evaluation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckParameters {
    values: HashMap<String, String>,
}

impl CheckParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declared defaults overlaid with the given overrides
    pub fn resolve(defs: &[ParameterDef], overrides: HashMap<String, String>) -> Self {
        let mut values: HashMap<String, String> = defs
            .iter()
            .map(|def| (def.name.clone(), def.default.clone()))
            .collect();
        values.extend(overrides);
        Self { values }
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.values.insert(name.to_string(), value.to_string());
        self
    }

    pub fn raw(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn get_str(&self, name: &str) -> Result<&str, CheckError> {
        self.raw(name).ok_or_else(|| CheckError::MissingParameter {
            name: name.to_string(),
        })
    }

    pub fn get_bool(&self, name: &str) -> Result<bool, CheckError> {
        let raw = self.get_str(name)?;
        ParameterKind::Bool
            .parse_bool(raw)
            .ok_or_else(|| CheckError::InvalidParameter {
                name: name.to_string(),
                value: raw.to_string(),
                expected: ParameterKind::Bool,
            })
    }

    pub fn get_int(&self, name: &str) -> Result<i64, CheckError> {
        let raw = self.get_str(name)?;
        raw.trim()
            .parse::<i64>()
            .map_err(|_| CheckError::InvalidParameter {
                name: name.to_string(),
                value: raw.to_string(),
                expected: ParameterKind::Int,
            })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
