use super::errors::PoolError;
use std::any::Any;

pub type TaskResult<T> = Result<T, PoolError>;

/// Turns a `catch_unwind` payload into something printable.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
