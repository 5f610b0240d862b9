//! Function bindings for function services.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use servicepath_core::{value_text, GUARD_SEPARATOR};
use std::future::Future;
use std::sync::Arc;

/// A callable bound to a function service.
///
/// Arguments arrive in the service's declared input order. Returning
/// `Ok(None)` asks for the service to be ignored for the rest of the session.
#[async_trait]
pub trait ServiceFunction: Send + Sync {
    /// Declared number of arguments, checked against the catalog at setup.
    fn arity(&self) -> Option<usize> {
        None
    }

    /// Invoke the function.
    async fn call(&self, args: Vec<Value>) -> anyhow::Result<Option<Value>>;
}

/// Adapter for synchronous closures.
pub struct SyncFn<F> {
    f: F,
    arity: Option<usize>,
}

impl<F> SyncFn<F> {
    /// Declare the number of arguments.
    pub fn with_arity(mut self, arity: usize) -> Self {
        self.arity = Some(arity);
        self
    }
}

#[async_trait]
impl<F> ServiceFunction for SyncFn<F>
where
    F: Fn(Vec<Value>) -> anyhow::Result<Option<Value>> + Send + Sync,
{
    fn arity(&self) -> Option<usize> {
        self.arity
    }

    async fn call(&self, args: Vec<Value>) -> anyhow::Result<Option<Value>> {
        (self.f)(args)
    }
}

/// Adapter for closures returning a future.
pub struct AsyncFn<F> {
    f: F,
    arity: Option<usize>,
}

impl<F> AsyncFn<F> {
    /// Declare the number of arguments.
    pub fn with_arity(mut self, arity: usize) -> Self {
        self.arity = Some(arity);
        self
    }
}

#[async_trait]
impl<F, Fut> ServiceFunction for AsyncFn<F>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Option<Value>>> + Send,
{
    fn arity(&self) -> Option<usize> {
        self.arity
    }

    async fn call(&self, args: Vec<Value>) -> anyhow::Result<Option<Value>> {
        (self.f)(args).await
    }
}

/// Wrap a synchronous closure.
pub fn service_fn<F>(f: F) -> SyncFn<F>
where
    F: Fn(Vec<Value>) -> anyhow::Result<Option<Value>> + Send + Sync,
{
    SyncFn { f, arity: None }
}

/// Wrap an async closure.
pub fn async_service_fn<F, Fut>(f: F) -> AsyncFn<F>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Option<Value>>> + Send,
{
    AsyncFn { f, arity: None }
}

/// Generated binding: returns its first argument.
pub struct IdentityFunction;

#[async_trait]
impl ServiceFunction for IdentityFunction {
    async fn call(&self, args: Vec<Value>) -> anyhow::Result<Option<Value>> {
        Ok(args.into_iter().next().filter(|v| !v.is_null()))
    }
}

/// Generated binding for `field==literal` names: returns the literal when the
/// first argument equals it.
pub struct EqualityFunction {
    literal: String,
}

impl EqualityFunction {
    /// Create a binding matching `literal`.
    pub fn new(literal: impl Into<String>) -> Self {
        Self { literal: literal.into() }
    }
}

#[async_trait]
impl ServiceFunction for EqualityFunction {
    async fn call(&self, args: Vec<Value>) -> anyhow::Result<Option<Value>> {
        let matched = args
            .first()
            .map(|arg| value_text(arg) == self.literal)
            .unwrap_or(false);
        Ok(matched.then(|| Value::String(self.literal.clone())))
    }
}

/// Binding generated for a function name with no explicit binding.
pub fn default_binding(function_name: &str) -> Arc<dyn ServiceFunction> {
    match function_name.split_once(GUARD_SEPARATOR) {
        Some((_, literal)) => Arc::new(EqualityFunction::new(literal)),
        None => Arc::new(IdentityFunction),
    }
}

/// Named function bindings.
#[derive(Clone, Default)]
pub struct FunctionTable {
    functions: IndexMap<String, Arc<dyn ServiceFunction>>,
}

impl FunctionTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a binding, builder style.
    pub fn with(mut self, name: impl Into<String>, function: impl ServiceFunction + 'static) -> Self {
        self.insert(name, Arc::new(function));
        self
    }

    /// Add or replace a binding.
    pub fn insert(&mut self, name: impl Into<String>, function: Arc<dyn ServiceFunction>) {
        self.functions.insert(name.into(), function);
    }

    /// Look up a binding.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ServiceFunction>> {
        self.functions.get(name)
    }

    /// Whether a binding exists.
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Bindings in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Arc<dyn ServiceFunction>)> {
        self.functions.iter()
    }

    /// Copy every binding of `other` over this table.
    pub fn merge(&mut self, other: &FunctionTable) {
        for (name, function) in other.iter() {
            self.functions.insert(name.clone(), function.clone());
        }
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl std::fmt::Debug for FunctionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.functions.keys()).finish()
    }
}

/// How [`crate::ServiceRegistry::set_functions`] treats existing bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionMergeMode {
    /// Drop existing bindings first
    Replace,
    /// Keep existing bindings not named in the new table
    Merge,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_sync_adapter() {
        let double = service_fn(|args| Ok(args[0].as_i64().map(|n| json!(n * 2)))).with_arity(1);

        assert_eq!(double.arity(), Some(1));
        assert_eq!(double.call(vec![json!(4)]).await.unwrap(), Some(json!(8)));
    }

    #[tokio::test]
    async fn test_async_adapter() {
        let echo = async_service_fn(|args: Vec<Value>| async move {
            Ok::<_, anyhow::Error>(args.into_iter().next())
        });

        assert_eq!(echo.arity(), None);
        assert_eq!(echo.call(vec![json!("x")]).await.unwrap(), Some(json!("x")));
    }

    #[tokio::test]
    async fn test_default_bindings() {
        let identity = default_binding("relabel");
        assert_eq!(identity.call(vec![json!(3), json!(4)]).await.unwrap(), Some(json!(3)));
        assert_eq!(identity.call(vec![]).await.unwrap(), None);

        let guard = default_binding("switch==on");
        assert_eq!(guard.call(vec![json!("on")]).await.unwrap(), Some(json!("on")));
        assert_eq!(guard.call(vec![json!("off")]).await.unwrap(), None);

        let numeric = default_binding("mode==2");
        assert_eq!(numeric.call(vec![json!(2)]).await.unwrap(), Some(json!("2")));
    }

    #[test]
    fn test_table_merge() {
        let mut table = FunctionTable::new().with("a", IdentityFunction);
        table.merge(&FunctionTable::new().with("b", IdentityFunction));

        assert!(table.contains("a"));
        assert!(table.contains("b"));
        assert_eq!(table.len(), 2);
    }
}
