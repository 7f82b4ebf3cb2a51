//! String extension functions for platform expressions
//!
//! `contains`, `startsWith` and `endsWith` are part of the standard CEL
//! library; the functions here fill in the rest of the string helpers.

use std::sync::Arc;

use cel_interpreter::extractors::This;
use cel_interpreter::{Context, ExecutionError, Value};

/// Register every extension function on `context`
pub(crate) fn register(context: &mut Context<'static>) {
    context.add_function("upperAscii", upper_ascii);
    context.add_function("lowerAscii", lower_ascii);
    context.add_function("upper", upper_ascii);
    context.add_function("lower", lower_ascii);
    context.add_function("split", split);
    context.add_function("join", join);
    context.add_function("trim", trim);
    context.add_function("replace", replace);
}

fn string(s: impl Into<String>) -> Value {
    Value::String(Arc::new(s.into()))
}

/// `'eu-1'.upperAscii()` -> `'EU-1'`
fn upper_ascii(This(this): This<Arc<String>>) -> Result<Value, ExecutionError> {
    Ok(string(this.to_ascii_uppercase()))
}

fn lower_ascii(This(this): This<Arc<String>>) -> Result<Value, ExecutionError> {
    Ok(string(this.to_ascii_lowercase()))
}

/// `'a,b'.split(',')` -> `['a', 'b']`
fn split(This(this): This<Arc<String>>, separator: Arc<String>) -> Result<Value, ExecutionError> {
    let parts = this.split(separator.as_str()).map(string).collect();
    Ok(Value::List(Arc::new(parts)))
}

/// `['a', 'b'].join('-')` -> `'a-b'`
fn join(This(this): This<Value>, separator: Arc<String>) -> Result<Value, ExecutionError> {
    let Value::List(items) = this else {
        return Err(ExecutionError::function_error(
            "join",
            "receiver must be a list of strings",
        ));
    };

    let mut parts = Vec::with_capacity(items.len());
    for item in items.iter() {
        match item {
            Value::String(s) => parts.push(s.as_str()),
            _ => {
                return Err(ExecutionError::function_error(
                    "join",
                    "list elements must be strings",
                ));
            }
        }
    }

    Ok(string(parts.join(separator.as_str())))
}

fn trim(This(this): This<Arc<String>>) -> Result<Value, ExecutionError> {
    Ok(string(this.trim()))
}

/// `'a-b-c'.replace('-', '.')` replaces every occurrence
fn replace(
    This(this): This<Arc<String>>,
    from: Arc<String>,
    to: Arc<String>,
) -> Result<Value, ExecutionError> {
    Ok(string(this.replace(from.as_str(), to.as_str())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cel_interpreter::Program;

    fn run(expression: &str) -> Value {
        let mut context = Context::default();
        register(&mut context);
        Program::compile(expression)
            .unwrap()
            .execute(&context)
            .unwrap()
    }

    #[test]
    fn test_registered_functions_execute() {
        assert_eq!(run("'eu-1'.upperAscii()"), string("EU-1"));
        assert_eq!(run("'EU-1'.lower()"), string("eu-1"));
        assert_eq!(run("'  x '.trim()"), string("x"));
        assert_eq!(run("'a-b-c'.replace('-', '.')"), string("a.b.c"));
        assert_eq!(run("'a,b'.split(',').join('+')"), string("a+b"));
        assert_eq!(
            run("'a,b'.split(',')"),
            Value::List(Arc::new(vec![string("a"), string("b")]))
        );
    }

    #[test]
    fn test_join_rejects_non_strings() {
        let mut context = Context::default();
        register(&mut context);
        let result = Program::compile("[1, 2].join(',')").unwrap().execute(&context);
        assert!(result.is_err());
    }
}
