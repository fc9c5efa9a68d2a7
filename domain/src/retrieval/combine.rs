//! Document combination.
//!
//! Renders retrieved passages into one context string. Each passage goes
//! through a [`DocumentTemplate`]; the results are joined with a separator.
//! Nothing is truncated here and the retriever's ordering is kept as is.

use super::passage::Passage;
use crate::core::error::DomainError;

/// Default separator between rendered passages.
pub const DEFAULT_SEPARATOR: &str = "\n\n";

/// Placeholder that expands to the passage content.
pub const PAGE_CONTENT: &str = "page_content";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
}

/// Per-passage template.
///
/// `{page_content}` expands to the passage text and `{key}` to the metadata
/// entry `key`. `{{` and `}}` produce literal braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl DocumentTemplate {
    pub fn parse(source: impl Into<String>) -> Result<Self, DomainError> {
        let source = source.into();
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(ch) => name.push(ch),
                            None => {
                                return Err(DomainError::MalformedTemplate(format!(
                                    "unclosed placeholder in '{}'",
                                    source
                                )));
                            }
                        }
                    }
                    if name.trim().is_empty() {
                        return Err(DomainError::MalformedTemplate(format!(
                            "empty placeholder in '{}'",
                            source
                        )));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Variable(name.trim().to_string()));
                }
                '}' => {
                    return Err(DomainError::MalformedTemplate(format!(
                        "unmatched '}}' in '{}'",
                        source
                    )));
                }
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { source, segments })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Render one passage.
    pub fn render(&self, passage: &Passage) -> Result<String, DomainError> {
        let mut out = String::with_capacity(passage.content.len() + self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Variable(name) if name == PAGE_CONTENT => {
                    out.push_str(&passage.content)
                }
                Segment::Variable(name) => {
                    let value = passage
                        .metadata
                        .get(name)
                        .ok_or_else(|| DomainError::MissingTemplateVariable(name.clone()))?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

impl Default for DocumentTemplate {
    fn default() -> Self {
        Self {
            source: format!("{{{}}}", PAGE_CONTENT),
            segments: vec![Segment::Variable(PAGE_CONTENT.to_string())],
        }
    }
}

/// Renders passages with a template and joins them with a separator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentCombiner {
    template: DocumentTemplate,
    separator: String,
}

impl DocumentCombiner {
    pub fn new(template: DocumentTemplate, separator: impl Into<String>) -> Self {
        Self {
            template,
            separator: separator.into(),
        }
    }

    pub fn template(&self) -> &DocumentTemplate {
        &self.template
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    pub fn combine(&self, passages: &[Passage]) -> Result<String, DomainError> {
        let rendered = passages
            .iter()
            .map(|p| self.template.render(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rendered.join(&self.separator))
    }
}

impl Default for DocumentCombiner {
    fn default() -> Self {
        Self::new(DocumentTemplate::default(), DEFAULT_SEPARATOR)
    }
}
