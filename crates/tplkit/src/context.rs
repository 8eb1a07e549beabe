//! Context for variable resolution during template rendering.

use crate::error::{Result, TemplateError};
use crate::value::Value;
use std::collections::HashMap;

/// Variable bindings for one render invocation.
///
/// The root bindings come from the caller; `for` loops and includes push
/// local scopes on top. Lookups walk from the innermost scope outwards, and
/// an inner binding may shadow an outer one.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    root: HashMap<String, Value>,
    local_stack: Vec<HashMap<String, Value>>,
}

impl RenderContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context from root data, which must be an object (or null).
    pub fn from_value(root_data: Value) -> Result<Self> {
        let root = match root_data {
            Value::Object(obj) => obj,
            Value::Null => HashMap::new(),
            other => {
                return Err(TemplateError::InvalidContext {
                    message: format!("Root data must be an object, got {}", other.type_name()),
                });
            }
        };

        Ok(Self {
            root,
            local_stack: Vec::new(),
        })
    }

    /// Create a context from JSON root data.
    pub fn from_json(data: serde_json::Value) -> Result<Self> {
        Self::from_value(Value::from_json(data))
    }

    /// Bind a root variable.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.root.insert(name.into(), value.into());
    }

    /// Look a single name up through the scope chain.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.local_stack
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .or_else(|| self.root.get(name))
    }

    /// Resolve a dotted path (e.g. `["user", "profile", "name"]`).
    ///
    /// `expression` is the expression being evaluated and only used for
    /// error reporting.
    pub fn resolve<S: AsRef<str>>(&self, path: &[S], expression: &str) -> Result<&Value> {
        let name = path
            .first()
            .map(AsRef::as_ref)
            .ok_or_else(|| TemplateError::UnresolvedVariable {
                name: "<empty path>".to_string(),
                expression: expression.to_string(),
            })?;

        let mut value = self
            .lookup(name)
            .ok_or_else(|| TemplateError::UnresolvedVariable {
                name: name.to_string(),
                expression: expression.to_string(),
            })?;

        for (index, segment) in path.iter().enumerate().skip(1) {
            value = access_property(value, path, index, segment.as_ref(), expression)?;
        }

        Ok(value)
    }

    /// Push a new scope of local bindings
    pub fn push_scope(&mut self, bindings: HashMap<String, Value>) {
        self.local_stack.push(bindings);
    }

    /// Pop the current scope
    pub fn pop_scope(&mut self) {
        self.local_stack.pop();
    }

    /// Number of local scopes currently pushed.
    pub fn scope_depth(&self) -> usize {
        self.local_stack.len()
    }

    /// Run `f` with `bindings` pushed as the innermost scope. The scope is
    /// popped again whether or not `f` succeeds.
    pub fn with_scope<T>(
        &mut self,
        bindings: HashMap<String, Value>,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.push_scope(bindings);
        let result = f(self);
        self.pop_scope();
        result
    }
}

fn access_property<'a, S: AsRef<str>>(
    value: &'a Value,
    path: &[S],
    index: usize,
    key: &str,
    expression: &str,
) -> Result<&'a Value> {
    match value {
        Value::Object(obj) => obj
            .get(key)
            .ok_or_else(|| TemplateError::UnresolvedVariable {
                name: joined(&path[..=index]),
                expression: expression.to_string(),
            }),
        other => Err(TemplateError::TypeMismatch {
            operator: ".".to_string(),
            operands: format!("{} (property '{}')", other.type_name(), key),
            expression: expression.to_string(),
        }),
    }
}

fn joined<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_test_context() -> RenderContext {
        RenderContext::from_json(json!({
            "name": "Alice",
            "user": {"email": "alice@example.com"}
        }))
        .unwrap()
    }

    #[test]
    fn test_resolve_simple() {
        let ctx = create_test_context();
        let value = ctx.resolve(&["name"], "name").unwrap();
        assert_eq!(value, &Value::String("Alice".to_string()));
    }

    #[test]
    fn test_resolve_path() {
        let ctx = create_test_context();
        let value = ctx.resolve(&["user", "email"], "user.email").unwrap();
        assert_eq!(value, &Value::String("alice@example.com".to_string()));
    }

    #[test]
    fn test_unresolved_variable() {
        let ctx = create_test_context();
        match ctx.resolve(&["unknown"], "unknown + 1") {
            Err(TemplateError::UnresolvedVariable { name, expression }) => {
                assert_eq!(name, "unknown");
                assert_eq!(expression, "unknown + 1");
            }
            other => panic!("expected UnresolvedVariable, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_property_names_path() {
        let ctx = create_test_context();
        match ctx.resolve(&["user", "phone"], "user.phone") {
            Err(TemplateError::UnresolvedVariable { name, .. }) => assert_eq!(name, "user.phone"),
            other => panic!("expected UnresolvedVariable, got {other:?}"),
        }
    }

    #[test]
    fn test_property_on_non_object() {
        let ctx = create_test_context();
        assert!(matches!(
            ctx.resolve(&["name", "first"], "name.first"),
            Err(TemplateError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_scope_stack() {
        let mut ctx = create_test_context();
        let mut bindings = HashMap::new();
        bindings.insert("item".to_string(), Value::Integer(42));
        ctx.push_scope(bindings);

        let value = ctx.resolve(&["item"], "item").unwrap();
        assert_eq!(value, &Value::Integer(42));

        ctx.pop_scope();
        assert!(ctx.resolve(&["item"], "item").is_err());
    }

    #[test]
    fn test_inner_scope_shadows_outer() {
        let mut ctx = create_test_context();
        let mut bindings = HashMap::new();
        bindings.insert("name".to_string(), Value::String("Bob".to_string()));

        ctx.push_scope(bindings);
        assert_eq!(ctx.lookup("name"), Some(&Value::String("Bob".to_string())));
        ctx.pop_scope();
        assert_eq!(ctx.lookup("name"), Some(&Value::String("Alice".to_string())));
    }

    #[test]
    fn test_with_scope_pops_on_error() {
        let mut ctx = create_test_context();
        let result: Result<()> = ctx.with_scope(HashMap::new(), |inner| {
            assert_eq!(inner.scope_depth(), 1);
            Err(TemplateError::DepthExceeded { limit: 1 })
        });
        assert!(result.is_err());
        assert_eq!(ctx.scope_depth(), 0);
    }

    #[test]
    fn test_root_must_be_object() {
        assert!(matches!(
            RenderContext::from_json(json!([1, 2])),
            Err(TemplateError::InvalidContext { .. })
        ));
        assert!(RenderContext::from_json(json!(null)).is_ok());
    }
}
