//! Loader callback: the data source behind a cache group.

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use thiserror::Error;

use crate::cache::CacheValue;

/// Failure reported by a loader.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The key genuinely does not exist in the data source.
    #[error("key does not exist")]
    NotFound,

    /// The data source could not produce a value.
    #[error("{0}")]
    Failed(String),
}

impl LoadError {
    pub fn failed(reason: impl ToString) -> Self {
        LoadError::Failed(reason.to_string())
    }
}

/// Produces the value for a key this node owns and does not hold yet.
///
/// A group never runs two loads for the same key at the same time.
#[async_trait]
pub trait Loader: Send + Sync {
    async fn load(&self, key: &str) -> Result<CacheValue, LoadError>;
}

/// Adapts an async closure into a [`Loader`].
///
/// ```ignore
/// let loader = LoaderFn::new(|key: String| async move {
///     Ok(CacheValue::from(format!("value of {}", key)))
/// });
/// ```
pub struct LoaderFn<F, Fut> {
    func: F,
    _marker: PhantomData<fn() -> Fut>,
}

impl<F, Fut> LoaderFn<F, Fut>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<CacheValue, LoadError>> + Send,
{
    pub fn new(func: F) -> Self {
        Self {
            func,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut> Loader for LoaderFn<F, Fut>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<CacheValue, LoadError>> + Send,
{
    async fn load(&self, key: &str) -> Result<CacheValue, LoadError> {
        (self.func)(key.to_string()).await
    }
}
