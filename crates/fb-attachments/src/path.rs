//! Path and URL template resolution

use std::collections::HashMap;

use fb_core::RecordHost;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::config::PathTemplate;
use crate::error::{AttachmentError, AttachmentResult};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([^}]+)\}").expect("placeholder pattern is valid"));

/// Resolves [`PathTemplate`]s against a record
#[derive(Debug, Clone, Default)]
pub struct PathResolver {
    aliases: HashMap<String, String>,
}

impl PathResolver {
    pub fn new(aliases: HashMap<String, String>) -> Self {
        Self { aliases }
    }

    /// Resolve a template into a concrete directory or URL prefix.
    ///
    /// `{field}` placeholders are replaced with string or numeric record
    /// fields. Anything else leaves the placeholder as written.
    pub fn resolve(
        &self,
        template: &PathTemplate,
        record: &dyn RecordHost,
    ) -> AttachmentResult<String> {
        let resolved = match template {
            PathTemplate::Pattern(pattern) if pattern.trim().is_empty() => {
                return Err(AttachmentError::config(
                    "path must be a string or resolvable function",
                ));
            }
            PathTemplate::Pattern(pattern) => substitute(pattern, record),
            PathTemplate::Custom(f) => f(record),
        };
        Ok(self.expand_alias(&resolved))
    }

    /// Replace a leading `@alias` segment with its configured prefix
    pub fn expand_alias(&self, path: &str) -> String {
        if !path.starts_with('@') {
            return path.to_string();
        }
        let (alias, rest) = match path.find('/') {
            Some(pos) => path.split_at(pos),
            None => (path, ""),
        };
        match self.aliases.get(alias) {
            Some(prefix) => format!("{}{}", prefix.trim_end_matches('/'), rest),
            None => path.to_string(),
        }
    }
}

/// Substitute `{field}` placeholders
pub fn substitute(pattern: &str, record: &dyn RecordHost) -> String {
    PLACEHOLDER
        .replace_all(pattern, |caps: &Captures| {
            record
                .attribute(&caps[1])
                .and_then(|value| value.as_path_segment())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fb_core::{MemoryRecord, UploadedFile, Value};

    fn record() -> MemoryRecord {
        MemoryRecord::new("User")
            .with_attribute("id", 7i64)
            .with_attribute("slug", "alice")
            .with_attribute("ratio", 1.5)
            .with_attribute("active", true)
            .with_attribute("nothing", Value::Null)
            .with_attribute("avatar", UploadedFile::new("a.png", "/tmp/a"))
    }

    #[test]
    fn test_substitutes_every_scalar_placeholder() {
        let record = record();
        assert_eq!(
            substitute("/srv/{slug}/{id}/{id}-{ratio}", &record),
            "/srv/alice/7/7-1.5"
        );
    }

    #[test]
    fn test_unresolvable_placeholders_stay_literal() {
        let record = record();
        assert_eq!(
            substitute("/srv/{missing}/{active}/{nothing}/{avatar}/{id}", &record),
            "/srv/{missing}/{active}/{nothing}/{avatar}/7"
        );
        assert_eq!(substitute("/srv/{unclosed", &record), "/srv/{unclosed");
    }

    #[test]
    fn test_custom_template() {
        let resolver = PathResolver::default();
        let template = PathTemplate::custom(|record| {
            format!(
                "/custom/{}",
                record.attribute("slug").map(|v| v.to_string()).unwrap_or_default()
            )
        });
        assert_eq!(resolver.resolve(&template, &record()).unwrap(), "/custom/alice");
    }

    #[test]
    fn test_empty_template_is_config_error() {
        let resolver = PathResolver::default();
        let err = resolver
            .resolve(&PathTemplate::from(""), &record())
            .unwrap_err();
        assert!(matches!(err, AttachmentError::Config(_)));
    }

    #[test]
    fn test_aliases() {
        let mut aliases = HashMap::new();
        aliases.insert("@webroot".to_string(), "/var/www/".to_string());
        let resolver = PathResolver::new(aliases);
        let record = record();

        assert_eq!(
            resolver
                .resolve(&"@webroot/uploads/{id}".into(), &record)
                .unwrap(),
            "/var/www/uploads/7"
        );
        assert_eq!(resolver.resolve(&"@webroot".into(), &record).unwrap(), "/var/www");
        assert_eq!(
            resolver.resolve(&"@cdn/{id}".into(), &record).unwrap(),
            "@cdn/7"
        );
        assert_eq!(
            resolver.resolve(&"/abs/@webroot".into(), &record).unwrap(),
            "/abs/@webroot"
        );
    }
}
