//! Field-name mapping derived from a backend config.

use std::collections::HashMap;

use bridge_parser::Config;

/// Sigma field name → backend field name.
///
/// A config may list several targets for one field; only the first is used.
/// Unmapped names pass through unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMappings {
    fields: HashMap<String, String>,
}

impl FieldMappings {
    pub fn from_config(config: &Config) -> Self {
        let fields = config
            .field_mappings
            .keys()
            .filter_map(|field| {
                config
                    .mapped_field(field)
                    .map(|target| (field.clone(), target.to_string()))
            })
            .collect();
        FieldMappings { fields }
    }

    /// The backend name for `field`.
    pub fn resolve<'a>(&'a self, field: &'a str) -> &'a str {
        self.fields.get(field).map(String::as_str).unwrap_or(field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldMappings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        FieldMappings {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
