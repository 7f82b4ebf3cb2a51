//! fleetdeck Engine - dynamic option value evaluation
//!
//! - [`ResourceEvaluator`]: CEL over a single resource (`plugin`) or a list (`plugins`)
//! - [`PlatformEvaluator`]: CEL over `global` with string extension functions
//! - [`placeholder`]: `${...}` substitution inside YAML documents
//! - [`TemplateResolver`]: MiniJinja templates with a helper library
//! - [`ValueEvaluator`]: the common interface the resolution pipeline uses
//! - [`ChartRenderer`]: values in, manifest and hooks out

pub mod chart;
pub mod error;
pub mod expression;
mod extensions;
pub mod filters;
pub mod functions;
pub mod placeholder;
pub mod platform;
pub mod source;
pub mod suggestions;
pub mod template;

pub use chart::{ChartRenderer, RenderedChart, StaticChart, TemplateChart};
pub use error::{EngineError, Result, TemplateError, TemplateErrorKind};
pub use expression::ResourceEvaluator;
pub use placeholder::{resolve_yaml, resolve_yaml_value};
pub use platform::{EvalContext, PlatformEvaluator};
pub use source::ValueEvaluator;
pub use template::TemplateResolver;
