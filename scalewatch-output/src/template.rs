//! Template engine for report paths

use crate::errors::DeliveryError;
use handlebars::Handlebars;
use serde_json::Value;
use std::collections::HashMap;

/// Template engine for variable substitution using Handlebars
#[derive(Debug, Clone)]
pub struct TemplateEngine {
    handlebars: Handlebars<'static>,
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        // paths, not HTML
        handlebars.register_escape_fn(handlebars::no_escape);

        Self { handlebars }
    }

    /// Render a template with the given variables
    pub fn render(
        &self,
        template: &str,
        variables: &HashMap<String, String>,
    ) -> Result<String, DeliveryError> {
        let json_vars: Value = variables
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect::<serde_json::Map<_, _>>()
            .into();

        self.handlebars
            .render_template(template, &json_vars)
            .map_err(|e| DeliveryError::TemplateRender {
                template: template.to_string(),
                error: e.to_string(),
            })
    }

    /// Check that a template compiles
    pub fn validate(&self, template: &str) -> Result<(), DeliveryError> {
        handlebars::Template::compile(template)
            .map(|_| ())
            .map_err(|e| DeliveryError::TemplateRender {
                template: template.to_string(),
                error: format!("Invalid template syntax: {}", e),
            })
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}
