//! Text templates over the configuration tree
//!
//! Templates are MiniJinja with the helper library from [`crate::filters`]
//! and [`crate::functions`]. Every top-level key of the data is a template
//! variable and the whole tree is also available as `values`:
//!
//! ```text
//! {{ global.region | upper }}.example.com
//! {{ values.ingress.host | trimsuffix(".") }}
//! ```
//!
//! Missing keys render as `<no value>`; syntax errors and unknown filters or
//! functions are errors.

use minijinja::{AutoEscape, Environment, UndefinedBehavior, Value};
use serde_json::Value as JsonValue;

use crate::error::{EngineError, Result, TemplateError};
use crate::filters;
use crate::functions;

/// Rendered in place of a missing value
pub const NO_VALUE: &str = "<no value>";

/// Name used for inline templates in diagnostics
const INLINE_TEMPLATE: &str = "<template>";

/// Resolves option value templates
pub struct TemplateResolver {
    env: Environment<'static>,
}

impl Default for TemplateResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TemplateResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateResolver").finish_non_exhaustive()
    }
}

impl TemplateResolver {
    pub fn new() -> Self {
        Self {
            env: create_environment(),
        }
    }

    /// Render `template` against `data`
    pub fn resolve(&self, template: &str, data: &JsonValue) -> Result<String> {
        self.env
            .render_str(template, template_context(data))
            .map_err(|e| {
                EngineError::Template(TemplateError::from_minijinja(e, INLINE_TEMPLATE, template))
            })
    }

    /// Render a named template, e.g. a chart file
    pub fn render_named(&self, name: &str, template: &str, data: &JsonValue) -> Result<String> {
        self.env
            .render_named_str(name, template, template_context(data))
            .map_err(|e| EngineError::Template(TemplateError::from_minijinja(e, name, template)))
    }
}

/// Top-level keys of `data` plus `values`
fn template_context(data: &JsonValue) -> JsonValue {
    let mut context = match data {
        JsonValue::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };
    context.insert("values".to_string(), data.clone());
    JsonValue::Object(context)
}

pub(crate) fn create_environment() -> Environment<'static> {
    let mut env = Environment::new();

    env.set_undefined_behavior(UndefinedBehavior::Chainable);
    // Output is YAML or plain text, never markup
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env.set_formatter(|out, state, value| {
        if value.is_undefined() {
            minijinja::escape_formatter(out, state, &Value::from(NO_VALUE))
        } else {
            minijinja::escape_formatter(out, state, value)
        }
    });

    env.add_filter("toyaml", filters::toyaml);
    env.add_filter("tojson", filters::tojson);
    env.add_filter("b64encode", filters::b64encode);
    env.add_filter("b64decode", filters::b64decode);
    env.add_filter("quote", filters::quote);
    env.add_filter("squote", filters::squote);
    env.add_filter("nindent", filters::nindent);
    env.add_filter("indent", filters::indent);
    env.add_filter("required", filters::required);
    env.add_filter("empty", filters::empty);
    env.add_filter("haskey", filters::haskey);
    env.add_filter("keys", filters::keys);
    env.add_filter("sha256", filters::sha256sum);
    env.add_filter("trunc", filters::trunc);
    env.add_filter("trimprefix", filters::trimprefix);
    env.add_filter("trimsuffix", filters::trimsuffix);
    env.add_filter("snakecase", filters::snakecase);
    env.add_filter("kebabcase", filters::kebabcase);
    env.add_filter("camelcase", filters::camelcase);
    env.add_filter("regex_replace", filters::regex_replace);
    env.add_filter("regex_split", filters::regex_split);
    env.add_filter("regex_match", filters::regex_match);
    env.add_filter("contains", filters::contains);
    env.add_filter("hasprefix", filters::hasprefix);
    env.add_filter("hassuffix", filters::hassuffix);

    env.add_function("fail", functions::fail);
    env.add_function("dict", functions::dict);
    env.add_function("list", functions::list);
    env.add_function("get", functions::get);
    env.add_function("index", functions::index);
    env.add_function("coalesce", functions::coalesce);
    env.add_function("ternary", functions::ternary);
    env.add_function("tostring", functions::tostring);

    env
}
