//! File-based settings
//!
//! Provides [`SettingsConfig`], a serde-deserializable form of [`Settings`] loaded from TOML.
//!
//! ```toml
//! reference_handling = "structural_with_reference_loops"
//! members = "properties"
//! include_non_public = false
//! ignored_types = ["Map<string, f64>"]
//! ignored_members = ["Level.cache"]
//! immutable_types = ["Point"]
//! ```

use crate::settings::{MemberKinds, MemberSelection, ReferenceHandling, Settings};
use serde::{Deserialize, Serialize};
use stategraph_model::{ModelError, TypeRef};
use std::sync::Arc;

/// Errors from loading settings configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML does not parse or does not match the schema
    #[error("invalid TOML: {0}")]
    InvalidToml(#[from] toml::de::Error),

    /// Serialization failed
    #[error("cannot serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Type name does not parse
    #[error("invalid type '{value}': {source}")]
    InvalidType {
        value: String,
        #[source]
        source: ModelError,
    },

    /// Member entry is not `Type.member`
    #[error("invalid member '{0}', expected 'Type.member'")]
    InvalidMember(String),
}

/// Serializable settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SettingsConfig {
    /// Reference handling
    pub reference_handling: ReferenceHandling,
    /// Member kind to select
    pub members: MemberKinds,
    /// Whether non-public members are selected
    pub include_non_public: bool,
    /// Types whose values are skipped
    pub ignored_types: Vec<String>,
    /// Members skipped, as `Type.member`
    pub ignored_members: Vec<String>,
    /// Types treated as immutable
    pub immutable_types: Vec<String>,
}

impl SettingsConfig {
    /// Parse from TOML
    ///
    /// # Errors
    /// Returns error if TOML is invalid or has unknown keys
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Render as TOML
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    /// Convert to settings
    ///
    /// # Errors
    /// Returns error if a type name or member entry is malformed
    pub fn to_settings(&self) -> Result<Arc<Settings>, ConfigError> {
        let selection = match self.members {
            MemberKinds::Properties => MemberSelection::properties(),
            MemberKinds::Fields => MemberSelection::fields(),
        };
        let selection = if self.include_non_public {
            selection.with_non_public()
        } else {
            selection
        };

        let mut builder = Settings::builder()
            .reference_handling(self.reference_handling)
            .member_selection(selection);

        for name in &self.ignored_types {
            builder = builder.ignore_type(parse_type(name)?);
        }
        for entry in &self.ignored_members {
            let (owner, member) = entry
                .rsplit_once('.')
                .filter(|(o, m)| !o.is_empty() && !m.is_empty())
                .ok_or_else(|| ConfigError::InvalidMember(entry.clone()))?;
            builder = builder.ignore_member(owner.trim(), member.trim());
        }
        for name in &self.immutable_types {
            builder = builder.immutable(parse_type(name)?);
        }

        Ok(builder.build())
    }
}

fn parse_type(value: &str) -> Result<TypeRef, ConfigError> {
    value.parse().map_err(|source| ConfigError::InvalidType {
        value: value.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use stategraph_model::MemberDescriptor;

    #[test]
    fn empty_config_is_default() {
        let config = SettingsConfig::from_toml_str("").unwrap();
        assert_eq!(config, SettingsConfig::default());
        let settings = config.to_settings().unwrap();
        assert_eq!(settings.reference_handling(), ReferenceHandling::Structural);
    }

    #[test]
    fn full_config() {
        let config = SettingsConfig::from_toml_str(
            r#"
            reference_handling = "structural_with_reference_loops"
            members = "fields"
            include_non_public = true
            ignored_types = ["List<i64>"]
            ignored_members = ["Level.cache"]
            immutable_types = ["Point"]
            "#,
        )
        .unwrap();

        let settings = config.to_settings().unwrap();
        assert_eq!(
            settings.reference_handling(),
            ReferenceHandling::StructuralWithReferenceLoops
        );
        assert_eq!(settings.selection().kinds(), MemberKinds::Fields);
        assert!(settings.is_ignored_type(&TypeRef::list(TypeRef::INT)));
        assert!(settings.is_ignored_member("Level", &MemberDescriptor::field("cache", TypeRef::INT)));
        assert!(settings.is_immutable_override(&TypeRef::named("Point")));
    }

    #[test]
    fn rejects_unknown_keys() {
        let result = SettingsConfig::from_toml_str("loops = true");
        assert!(matches!(result, Err(ConfigError::InvalidToml(_))));
    }

    #[test]
    fn rejects_bad_entries() {
        let config = SettingsConfig {
            ignored_members: vec!["nodot".into()],
            ..SettingsConfig::default()
        };
        assert!(matches!(config.to_settings(), Err(ConfigError::InvalidMember(_))));

        let config = SettingsConfig {
            ignored_types: vec!["List<".into()],
            ..SettingsConfig::default()
        };
        assert!(matches!(config.to_settings(), Err(ConfigError::InvalidType { .. })));
    }

    #[test]
    fn renders_toml() {
        let config = SettingsConfig {
            reference_handling: ReferenceHandling::References,
            ..SettingsConfig::default()
        };
        let text = config.to_toml_string().unwrap();
        assert!(text.contains("reference_handling = \"references\""));
        assert_eq!(SettingsConfig::from_toml_str(&text).unwrap(), config);
    }
}
