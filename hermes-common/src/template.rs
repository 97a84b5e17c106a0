//! `{{variable}}` message templates.
//!
//! A template is parsed once at construction and rendered once per recipient against
//! that recipient's [`Variables`]. Placeholders may be written `{{name}}`,
//! `{{ name }}` or `{{.name}}`. A placeholder whose variable the recipient does not
//! define is a render error.

use std::path::Path;

use crate::{error::TemplateError, variables::Variables};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
}

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    name: String,
    segments: Vec<Segment>,
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

impl Template {
    /// # Errors
    ///
    /// Returns [`TemplateError::Unclosed`] or [`TemplateError::InvalidPlaceholder`] for
    /// malformed placeholders.
    pub fn parse(name: impl Into<String>, source: &str) -> Result<Self, TemplateError> {
        let name = name.into();
        let mut segments = Vec::new();
        let mut rest = source;
        let mut offset = 0;

        while let Some(start) = rest.find(OPEN) {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }

            let after_open = &rest[start + OPEN.len()..];
            let Some(end) = after_open.find(CLOSE) else {
                return Err(TemplateError::Unclosed {
                    template: name,
                    offset: offset + start,
                });
            };

            let raw = &after_open[..end];
            let variable = raw.trim();
            let variable = variable.strip_prefix('.').unwrap_or(variable);
            if !is_valid_name(variable) {
                return Err(TemplateError::InvalidPlaceholder {
                    template: name,
                    placeholder: raw.to_string(),
                });
            }
            segments.push(Segment::Variable(variable.to_string()));

            let consumed = start + OPEN.len() + end + CLOSE.len();
            offset += consumed;
            rest = &rest[consumed..];
        }

        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self { name, segments })
    }

    /// Reads and parses a template file.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Io`] if the file cannot be read, otherwise as
    /// [`Template::parse`].
    pub fn from_file(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(name, &source)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names referenced by the template, in order of appearance.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Variable(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// # Errors
    ///
    /// Returns [`TemplateError::MissingVariable`] for the first placeholder `variables`
    /// does not define.
    pub fn render(&self, variables: &Variables) -> Result<String, TemplateError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Variable(name) => {
                    let Some(value) = variables.get(name) else {
                        return Err(TemplateError::MissingVariable {
                            template: self.name.clone(),
                            variable: name.clone(),
                        });
                    };
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

/// The subject, text body and HTML body of a run's messages.
#[derive(Debug, Clone)]
pub struct MessageTemplates {
    subject: Template,
    text: Option<Template>,
    html: Option<Template>,
}

/// One recipient's rendered subject and bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedContent {
    pub subject: String,
    pub text: Option<String>,
    pub html: Option<String>,
}

impl MessageTemplates {
    /// # Errors
    ///
    /// Returns [`TemplateError::NoBody`] when both bodies are absent.
    pub fn new(
        subject: Template,
        text: Option<Template>,
        html: Option<Template>,
    ) -> Result<Self, TemplateError> {
        if text.is_none() && html.is_none() {
            return Err(TemplateError::NoBody);
        }
        Ok(Self {
            subject,
            text,
            html,
        })
    }

    /// # Errors
    ///
    /// Returns the first [`TemplateError::MissingVariable`] from any of the templates.
    pub fn render(&self, variables: &Variables) -> Result<RenderedContent, TemplateError> {
        Ok(RenderedContent {
            subject: self.subject.render(variables)?,
            text: self
                .text
                .as_ref()
                .map(|t| t.render(variables))
                .transpose()?,
            html: self
                .html
                .as_ref()
                .map(|t| t.render(variables))
                .transpose()?,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Variables {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_render_substitutes_all_styles() {
        let template = Template::parse("text", "Hi {{name}}, {{ city }} and {{.name}}!").unwrap();
        let out = template
            .render(&vars(&[("name", "Sarah"), ("city", "Paris")]))
            .unwrap();
        assert_eq!(out, "Hi Sarah, Paris and Sarah!");
        assert_eq!(template.variables().collect::<Vec<_>>(), ["name", "city", "name"]);
    }

    #[test]
    fn test_plain_text_passes_through() {
        let template = Template::parse("text", "no placeholders { here }").unwrap();
        assert_eq!(
            template.render(&Variables::new()).unwrap(),
            "no placeholders { here }"
        );
    }

    #[test]
    fn test_missing_variable() {
        let template = Template::parse("html", "<p>{{name}}</p>").unwrap();
        let err = template.render(&Variables::new()).unwrap_err();
        assert!(matches!(
            err,
            TemplateError::MissingVariable { ref template, ref variable }
                if template == "html" && variable == "name"
        ));
    }

    #[test]
    fn test_unclosed_placeholder() {
        let err = Template::parse("text", "Hello {{name").unwrap_err();
        assert!(matches!(err, TemplateError::Unclosed { offset: 6, .. }));
    }

    #[test]
    fn test_invalid_placeholder() {
        assert!(Template::parse("text", "{{}}").is_err());
        assert!(Template::parse("text", "{{ two words }}").is_err());
    }

    #[test]
    fn test_message_templates_require_a_body() {
        let subject = Template::parse("subject", "Hello").unwrap();
        assert!(matches!(
            MessageTemplates::new(subject, None, None),
            Err(TemplateError::NoBody)
        ));
    }

    #[test]
    fn test_message_templates_render_every_part() {
        let templates = MessageTemplates::new(
            Template::parse("subject", "For {{name}}").unwrap(),
            Some(Template::parse("text", "Dear {{name}}").unwrap()),
            Some(Template::parse("html", "<b>{{name}}</b>").unwrap()),
        )
        .unwrap();

        let rendered = templates.render(&vars(&[("name", "Tom")])).unwrap();
        assert_eq!(
            rendered,
            RenderedContent {
                subject: "For Tom".to_string(),
                text: Some("Dear Tom".to_string()),
                html: Some("<b>Tom</b>".to_string()),
            }
        );
    }
}
