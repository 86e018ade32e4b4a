//! Pre-delete hooks invoked by the reaper before removing a record.

use serde::de::DeserializeOwned;
use std::marker::PhantomData;

use crate::error::HookError;

/// Called for every expired record right before the reaper deletes it.
///
/// `payload` is `None` when the stored value could not be decoded. Returning
/// an error keeps that record in the namespace; the rest of the batch is
/// still processed.
pub trait PreDeleteHook: Send + Sync + 'static {
    fn before_delete(&self, key: &[u8], payload: Option<&[u8]>) -> Result<(), HookError>;
}

impl<F> PreDeleteHook for F
where
    F: Fn(&[u8], Option<&[u8]>) -> Result<(), HookError> + Send + Sync + 'static,
{
    fn before_delete(&self, key: &[u8], payload: Option<&[u8]>) -> Result<(), HookError> {
        self(key, payload)
    }
}

/// Hook that decodes the payload as JSON into a caller-chosen type.
///
/// Empty and undecodable-record payloads are handed over as `None`. A payload
/// that is present but does not decode into `T` fails the hook, so the
/// record is kept for inspection.
///
/// # Example
///
/// ```
/// use std::collections::HashMap;
/// use sessreap::reaper::{JsonHook, ReaperOptions};
///
/// let hook = JsonHook::new(|_key: &[u8], values: Option<HashMap<String, String>>| {
///     if let Some(values) = values {
///         println!("dropping session for {:?}", values.get("user"));
///     }
///     Ok(())
/// });
/// let options = ReaperOptions::new().with_pre_delete(hook);
/// assert!(options.has_pre_delete());
/// ```
pub struct JsonHook<T, F> {
    callback: F,
    _values: PhantomData<fn() -> T>,
}

impl<T, F> JsonHook<T, F>
where
    T: DeserializeOwned + 'static,
    F: Fn(&[u8], Option<T>) -> Result<(), HookError> + Send + Sync + 'static,
{
    /// Wraps a callback receiving the decoded session values.
    pub const fn new(callback: F) -> Self {
        Self {
            callback,
            _values: PhantomData,
        }
    }
}

impl<T, F> PreDeleteHook for JsonHook<T, F>
where
    T: DeserializeOwned + 'static,
    F: Fn(&[u8], Option<T>) -> Result<(), HookError> + Send + Sync + 'static,
{
    fn before_delete(&self, key: &[u8], payload: Option<&[u8]>) -> Result<(), HookError> {
        let values = match payload {
            Some(bytes) if !bytes.is_empty() => Some(
                serde_json::from_slice(bytes)
                    .map_err(|e| HookError::new(format!("cannot decode session values: {e}")))?,
            ),
            _ => None,
        };
        (self.callback)(key, values)
    }
}
