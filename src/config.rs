//! Declarative compiler configuration.
//!
//! ```json
//! {
//!   "templateDirs": ["templates"],
//!   "preloadTemplates": true,
//!   "directives": {
//!     "userCard": { "restrict": "E", "templatePath": "user-card.html", "replace": true },
//!     "banner": { "restrict": "C", "template": "<b>{{{title}}}</b>", "prepend": true }
//!   }
//! }
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::directive::{Directive, Restrict};
use crate::error::ConfigError;
use crate::loader::FileTemplateLoader;
use crate::registry::DirectiveRegistry;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompilerConfig {
    pub template_dirs: Vec<PathBuf>,
    pub preload_templates: bool,
    pub directives: IndexMap<String, DirectiveConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DirectiveConfig {
    #[serde(rename = "Controller", deserialize_with = "string_only")]
    pub controller: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub priority: i32,
    pub replace: bool,
    pub restrict: Option<String>,
    pub template: Option<String>,
    pub template_path: Option<String>,
    pub prepend: bool,
}

/// A `Controller` that is not a string is treated as absent.
fn string_only<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Some(s),
        _ => None,
    })
}

impl DirectiveConfig {
    pub fn to_directive(&self, name: &str) -> Result<Directive, ConfigError> {
        let restrict = match &self.restrict {
            None => Restrict::default(),
            Some(value) => Restrict::parse(value).ok_or_else(|| ConfigError::InvalidRestrict {
                name: name.to_string(),
                value: value.clone(),
            })?,
        };

        Ok(Directive {
            controller: self.controller.clone(),
            kind: self.kind.clone(),
            priority: self.priority,
            replace: self.replace,
            restrict,
            link: None,
            template: self.template.clone(),
            template_path: self.template_path.clone(),
            prepend: self.prepend,
        })
    }
}

impl CompilerConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = text.parse()?;

        // Relative template dirs are relative to the config file.
        if let Some(base) = path.parent() {
            for dir in &mut config.template_dirs {
                if dir.is_relative() {
                    *dir = base.join(&*dir);
                }
            }
        }
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Registers every configured directive, in file order. Stops at the
    /// first invalid one.
    pub fn register_directives(&self, registry: &mut DirectiveRegistry) -> Result<usize, ConfigError> {
        for (name, config) in &self.directives {
            registry.register(name.as_str(), config.to_directive(name)?)?;
        }
        Ok(self.directives.len())
    }

    /// A loader over `templateDirs`, preloaded if `preloadTemplates` is set.
    pub fn file_loader(&self) -> FileTemplateLoader {
        let loader = FileTemplateLoader::new(self.template_dirs.iter().cloned());
        if self.preload_templates {
            loader.preload();
        }
        loader
    }
}

impl FromStr for CompilerConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_json(s)
    }
}
