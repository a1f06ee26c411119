//! Render failures.
//!
//! Every failure inside a render pass is a [`RenderError`]. Failures raised
//! while a template is being evaluated are wrapped in [`RenderError::Render`],
//! which names the template. When the cause is itself a render failure of
//! another template (triggered through a field lookup), the wrappers nest and
//! the display reads `while rendering home.jinja: while rendering about.jinja: ...`.

use thiserror::Error;
use webdoc_core::TemplateId;

/// Errors raised during a render pass.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The requested template has no backing source file.
    #[error("template not found: {0}")]
    TemplateNotFound(TemplateId),

    /// A field lookup found the template, but the field was never written.
    #[error("template '{template}' does not have field '{field}'")]
    FieldNotFound {
        /// Template owning the field.
        template: TemplateId,
        /// Requested field name.
        field: String,
    },

    /// The template engine failed mid-render.
    #[error("[evaluation] {0}")]
    Evaluation(#[source] minijinja::Error),

    /// A data directive tried to persist an undefined value.
    #[error("attempted to set undefined value for key '{key}' in section '{section}'")]
    UndefinedValue {
        /// Active data section.
        section: String,
        /// Key being written.
        key: String,
    },

    /// A data directive was used outside of any data section.
    #[error("data key '{key}' written outside of a data section")]
    NoActiveSection {
        /// Key being written.
        key: String,
    },

    /// A template asked for its own output while still rendering.
    #[error("circular reference: {0} is already being rendered")]
    Cycle(TemplateId),

    /// A render pass was started while another one is active.
    #[error("a render pass is already in progress")]
    ReentrantPass,

    /// Writing a rendered document failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure while rendering a specific template.
    #[error("while rendering {template}: {source}")]
    Render {
        /// Template being rendered when the failure happened.
        template: TemplateId,
        /// What went wrong.
        #[source]
        source: Box<RenderError>,
    },
}

/// Result type for render operations.
pub type Result<T> = std::result::Result<T, RenderError>;

impl RenderError {
    /// Wrap `source` as a failure of `template`.
    pub fn render(template: TemplateId, source: RenderError) -> Self {
        Self::Render {
            template,
            source: Box::new(source),
        }
    }

    /// Templates on the failure path, outermost first.
    pub fn chain(&self) -> Vec<&TemplateId> {
        let mut chain = Vec::new();
        let mut current = self;
        while let Self::Render { template, source } = current {
            chain.push(template);
            current = source;
        }
        chain
    }

    /// The innermost failure.
    pub fn root_cause(&self) -> &RenderError {
        let mut current = self;
        while let Self::Render { source, .. } = current {
            current = source;
        }
        current
    }

    /// Multi-line report, one template per line, for terminal output.
    pub fn report(&self) -> String {
        let mut out = String::new();
        for (depth, template) in self.chain().into_iter().enumerate() {
            out.push_str(&"  ".repeat(depth));
            out.push_str(&format!("while rendering {template}:\n"));
        }
        out.push_str(&"  ".repeat(self.chain().len()));
        out.push_str(&format!("- {}", self.root_cause()));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested() -> RenderError {
        RenderError::render(
            TemplateId::new("home.jinja"),
            RenderError::render(
                TemplateId::new("about.jinja"),
                RenderError::TemplateNotFound(TemplateId::new("missing.jinja")),
            ),
        )
    }

    #[test]
    fn test_nested_display() {
        assert_eq!(
            nested().to_string(),
            "while rendering home.jinja: while rendering about.jinja: \
             template not found: missing.jinja"
        );
    }

    #[test]
    fn test_chain_and_root_cause() {
        let err = nested();
        let chain: Vec<_> = err.chain().into_iter().map(TemplateId::as_str).collect();
        assert_eq!(chain, ["home.jinja", "about.jinja"]);
        assert!(matches!(
            err.root_cause(),
            RenderError::TemplateNotFound(id) if id.as_str() == "missing.jinja"
        ));
    }

    #[test]
    fn test_report() {
        let report = nested().report();
        assert_eq!(
            report,
            "while rendering home.jinja:\n  while rendering about.jinja:\n    \
             - template not found: missing.jinja"
        );
    }

    #[test]
    fn test_field_not_found_message() {
        let err = RenderError::FieldNotFound {
            template: TemplateId::new("about.jinja"),
            field: "name".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "template 'about.jinja' does not have field 'name'"
        );
    }
}
