use std::collections::BTreeMap;

use serde::Deserialize;

use crate::alias::AliasClass;
use crate::error::ReconError;
use crate::model::Source;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ReconConfig {
    pub name: String,
    /// Minimum fuzzy score (0.0–1.0] to accept a plan-name match, strict ≥.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    /// Expected digit count after SSN normalization.
    #[serde(default = "default_ssn_digit_length")]
    pub ssn_digit_length: usize,
    /// Maximum allowed cost difference in cents before a `cost_mismatch`
    /// finding. 0 means exact equality.
    #[serde(default)]
    pub cost_tolerance_cents: i64,
    #[serde(default)]
    pub sources: BTreeMap<Source, SourceConfig>,
    /// Alias equivalence classes, in priority order. Omit for the built-in
    /// table.
    #[serde(default = "AliasClass::default_classes", rename = "aliases")]
    pub alias_classes: Vec<AliasClass>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub file: String,
}

fn default_similarity_threshold() -> f64 {
    0.90
}

fn default_ssn_digit_length() -> usize {
    9
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            name: "recon".into(),
            similarity_threshold: default_similarity_threshold(),
            ssn_digit_length: default_ssn_digit_length(),
            cost_tolerance_cents: 0,
            sources: BTreeMap::new(),
            alias_classes: AliasClass::default_classes(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if !(self.similarity_threshold > 0.0 && self.similarity_threshold <= 1.0) {
            return Err(ReconError::ConfigValidation(format!(
                "similarity_threshold must be in (0.0, 1.0], got {}",
                self.similarity_threshold
            )));
        }
        if self.ssn_digit_length == 0 {
            return Err(ReconError::ConfigValidation(
                "ssn_digit_length must be positive".into(),
            ));
        }
        if self.cost_tolerance_cents < 0 {
            return Err(ReconError::ConfigValidation(format!(
                "cost_tolerance_cents must be non-negative, got {}",
                self.cost_tolerance_cents
            )));
        }
        // Sources are optional for embedded use; when configured there must
        // be enough of them to compare.
        if !self.sources.is_empty() && self.sources.len() < 2 {
            return Err(ReconError::NotEnoughSources(self.sources.len()));
        }
        for class in &self.alias_classes {
            if class.canonical.trim().is_empty() {
                return Err(ReconError::ConfigValidation(
                    "alias class with empty canonical name".into(),
                ));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
name = "August Close"

[sources.payroll]
file = "payroll.csv"

[sources.carrier]
file = "carrier.csv"

[sources.ben_admin]
file = "benadmin.csv"
"#;

    #[test]
    fn parse_valid_with_defaults() {
        let config = ReconConfig::from_toml(VALID).unwrap();
        assert_eq!(config.name, "August Close");
        assert_eq!(config.similarity_threshold, 0.90);
        assert_eq!(config.ssn_digit_length, 9);
        assert_eq!(config.cost_tolerance_cents, 0);
        assert_eq!(config.sources.len(), 3);
        assert_eq!(config.sources[&Source::Payroll].file, "payroll.csv");
        // Built-in alias table when [[aliases]] is omitted.
        assert!(!config.alias_classes.is_empty());
    }

    #[test]
    fn parse_explicit_aliases_preserve_order() {
        let input = r#"
name = "Custom"

[sources.payroll]
file = "p.csv"
[sources.carrier]
file = "c.csv"

[[aliases]]
canonical = "medical"
aliases = ["health"]

[[aliases]]
canonical = "dental"
"#;
        let config = ReconConfig::from_toml(input).unwrap();
        assert_eq!(config.alias_classes.len(), 2);
        assert_eq!(config.alias_classes[0].canonical, "medical");
        assert_eq!(config.alias_classes[0].aliases, vec!["health"]);
        assert_eq!(config.alias_classes[1].canonical, "dental");
        assert!(config.alias_classes[1].aliases.is_empty());
    }

    #[test]
    fn reject_bad_threshold() {
        // Scalar keys must precede the [sources.*] tables in TOML.
        let input = format!("similarity_threshold = 1.5\n{VALID}");
        let err = ReconConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("similarity_threshold"));
    }

    #[test]
    fn reject_single_source() {
        let input = r#"
name = "Lonely"

[sources.payroll]
file = "p.csv"
"#;
        let err = ReconConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("at least 2"));
    }

    #[test]
    fn reject_unknown_source_key() {
        let input = r#"
name = "Bad"

[sources.vendor]
file = "v.csv"
[sources.payroll]
file = "p.csv"
"#;
        assert!(ReconConfig::from_toml(input).is_err());
    }

    #[test]
    fn reject_negative_tolerance() {
        let input = format!("cost_tolerance_cents = -1\n{VALID}");
        let err = ReconConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("cost_tolerance_cents"));
    }
}
