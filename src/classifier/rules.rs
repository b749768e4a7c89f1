//! Heuristic rule configuration for the classifier.
//!
//! Contains no classification logic, only the configurable inputs:
//! the suspicious extension set and the offensive-tool deny list.

use crate::core::ProtectionConfig;

use serde::{Deserialize, Serialize};

/// File name tokens that identify well-known offensive tooling.
///
/// Matched case-insensitively as substrings of the file name. The list
/// is fixed; the extension set, by contrast, is configurable.
const TOOL_TOKENS: &[&str] = &[
    "mimikatz",
    "psexec",
    "procdump",
    "lazagne",
    "bloodhound",
    "sharphound",
    "cobaltstrike",
    "meterpreter",
    "rubeus",
    "secretsdump",
    "winpeas",
    "netcat",
];

/// Rule inputs for heuristic classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspiciousRules {
    /// Suspicious extensions, lowercase with leading dot.
    pub extensions: Vec<String>,

    /// Known offensive-tool name tokens, lowercase.
    pub tool_tokens: Vec<String>,
}

impl Default for SuspiciousRules {
    fn default() -> Self {
        Self {
            extensions: vec![
                ".exe".into(),
                ".bat".into(),
                ".cmd".into(),
                ".ps1".into(),
                ".vbs".into(),
                ".scr".into(),
            ],
            tool_tokens: TOOL_TOKENS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl SuspiciousRules {
    /// Creates rules with the default extension set and deny list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds rules from a protection configuration, normalizing
    /// extensions to lowercase.
    pub fn from_config(config: &ProtectionConfig) -> Self {
        Self {
            extensions: config
                .suspicious_extensions
                .iter()
                .map(|e| e.to_lowercase())
                .collect(),
            ..Self::default()
        }
    }

    /// Replaces the extension set.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(|e| e.into().to_lowercase()).collect();
        self
    }

    /// Returns `true` if the given extension (with leading dot,
    /// any case) is in the suspicious set.
    pub fn is_suspicious_extension(&self, ext: &str) -> bool {
        let ext = ext.to_lowercase();
        self.extensions.iter().any(|e| e == &ext)
    }

    /// Returns the matched deny-list token for a file name, if any.
    pub fn matched_tool_token(&self, file_name: &str) -> Option<&str> {
        let lower = file_name.to_lowercase();
        self.tool_tokens
            .iter()
            .find(|t| lower.contains(t.as_str()))
            .map(|t| t.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_matching_case_insensitive() {
        let rules = SuspiciousRules::default();
        assert!(rules.is_suspicious_extension(".exe"));
        assert!(rules.is_suspicious_extension(".EXE"));
        assert!(!rules.is_suspicious_extension(".txt"));
    }

    #[test]
    fn test_tool_token_matching() {
        let rules = SuspiciousRules::default();
        assert_eq!(rules.matched_tool_token("Mimikatz.exe"), Some("mimikatz"));
        assert_eq!(rules.matched_tool_token("run-PsExec-now.bat"), Some("psexec"));
        assert_eq!(rules.matched_tool_token("report.pdf"), None);
    }

    #[test]
    fn test_from_config_normalizes() {
        let config = ProtectionConfig::new().with_suspicious_extensions([".EXE", ".Bat"]);
        let rules = SuspiciousRules::from_config(&config);
        assert!(rules.is_suspicious_extension(".exe"));
        assert!(rules.is_suspicious_extension(".bat"));
    }
}
