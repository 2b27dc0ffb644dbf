//! Page templates embedded in the binary and rendered with Handlebars.

use handlebars::{Handlebars, RenderError, TemplateError};
use serde::Serialize;

const LAYOUT: &str = include_str!("../templates/layout.hbs");
const ABOUT: &str = include_str!("../templates/about.hbs");
const CSRF: &str = include_str!("../templates/csrf.hbs");
const HEADERS: &str = include_str!("../templates/headers.hbs");

/// Values every page needs from the shared layout.
#[derive(Debug, Serialize)]
pub struct PageContext<'a, T: Serialize> {
    pub page_title: &'a str,
    pub csp_nonce: &'a str,
    pub static_url_path: &'a str,
    #[serde(flatten)]
    pub page: T,
}

pub struct Templates {
    registry: Handlebars<'static>,
}

impl std::fmt::Debug for Templates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Templates").finish_non_exhaustive()
    }
}

impl Templates {
    /// Register the layout partial and page templates.
    ///
    /// # Errors
    /// Returns an error if a template fails to parse.
    pub fn new() -> Result<Self, Box<TemplateError>> {
        let mut registry = Handlebars::new();
        // Catch undefined variables instead of rendering blanks
        registry.set_strict_mode(true);
        registry.register_partial("layout", LAYOUT)?;
        registry.register_template_string("about", ABOUT)?;
        registry.register_template_string("csrf", CSRF)?;
        registry.register_template_string("headers", HEADERS)?;
        Ok(Self { registry })
    }

    /// Render a registered page. Variables are HTML-escaped unless the
    /// template uses triple braces.
    ///
    /// # Errors
    /// Returns an error if the template is unknown or references a missing value.
    pub fn render<T: Serialize>(
        &self,
        name: &str,
        context: &PageContext<'_, T>,
    ) -> Result<String, RenderError> {
        self.registry.render(name, context)
    }
}
