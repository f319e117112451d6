//! Action function registry
//!
//! Maps action names to executable functions. A function is registered
//! together with the receiver it operates on, so the same callable shape
//! can be bound to different documents.

use crate::action::Args;
use crate::error::{ActionFailure, ProvenanceError};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// An executable action function
#[async_trait::async_trait]
pub trait ActionFunction: Send + Sync {
    /// Run the function with positional arguments
    ///
    /// Returns the previous value where the function replaces one, or
    /// `Value::Null`.
    async fn call(&self, args: Args) -> Result<Value, ActionFailure>;
}

/// Function bound to its receiver
struct BoundFunction<R, F> {
    receiver: Arc<R>,
    function: F,
}

#[async_trait::async_trait]
impl<R, F, Fut> ActionFunction for BoundFunction<R, F>
where
    R: Send + Sync + 'static,
    F: Fn(Arc<R>, Args) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ActionFailure>> + Send + 'static,
{
    async fn call(&self, args: Args) -> Result<Value, ActionFailure> {
        (self.function)(Arc::clone(&self.receiver), args).await
    }
}

/// A resolved registry entry
#[derive(Clone)]
pub struct RegistryEntry {
    name: String,
    function: Arc<dyn ActionFunction>,
}

impl RegistryEntry {
    /// Registered name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the entry's function
    ///
    /// # Errors
    /// `ActionExecution` wrapping whatever the function raised.
    pub async fn invoke(&self, args: Args) -> Result<Value, ProvenanceError> {
        self.function
            .call(args)
            .await
            .map_err(|source| ProvenanceError::execution(&self.name, source))
    }
}

impl std::fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryEntry").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Name-indexed table of action functions
///
/// Names are the persisted wire format of every recorded action: renaming an
/// entry makes previously serialized graphs unreplayable.
#[derive(Default)]
pub struct ActionFunctionRegistry {
    functions: HashMap<String, RegistryEntry>,
}

impl ActionFunctionRegistry {
    /// Create an empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// Register `function` bound to `receiver` under `name`
    ///
    /// # Errors
    /// `DuplicateActionName` if `name` is already taken.
    pub fn register<R, F, Fut>(
        &mut self,
        name: &str,
        receiver: Arc<R>,
        function: F,
    ) -> Result<(), ProvenanceError>
    where
        R: Send + Sync + 'static,
        F: Fn(Arc<R>, Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ActionFailure>> + Send + 'static,
    {
        self.register_function(name, Arc::new(BoundFunction { receiver, function }))
    }

    /// Register a pre-built function object under `name`
    ///
    /// # Errors
    /// `DuplicateActionName` if `name` is already taken.
    pub fn register_function(
        &mut self,
        name: &str,
        function: Arc<dyn ActionFunction>,
    ) -> Result<(), ProvenanceError> {
        if self.functions.contains_key(name) {
            return Err(ProvenanceError::DuplicateActionName(name.to_string()));
        }
        tracing::debug!(action = name, "registered action function");
        self.functions.insert(
            name.to_string(),
            RegistryEntry {
                name: name.to_string(),
                function,
            },
        );
        Ok(())
    }

    /// Look up an entry
    ///
    /// # Errors
    /// `UnknownAction` if nothing is registered under `name`.
    pub fn resolve(&self, name: &str) -> Result<&RegistryEntry, ProvenanceError> {
        self.functions
            .get(name)
            .ok_or_else(|| ProvenanceError::UnknownAction(name.to_string()))
    }

    /// Resolve and call `name` with `args`
    ///
    /// # Errors
    /// `UnknownAction` on a lookup miss, `ActionExecution` if the function fails.
    pub async fn invoke(&self, name: &str, args: impl Into<Args>) -> Result<Value, ProvenanceError> {
        let entry = self.resolve(name)?.clone();
        entry.invoke(args.into()).await
    }

    /// Check if a name is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered functions
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Check if the registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl std::fmt::Debug for ActionFunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionFunctionRegistry")
            .field("names", &self.names())
            .finish()
    }
}
