//! The two host callback slots.
//!
//! There is exactly one network-signal slot and one attribute-change slot.
//! Registering a callback replaces the previous one; `None` clears the slot.

use crate::events::AttrSetEvent;
use crate::zcl::HostValue;
use parking_lot::RwLock;
use std::sync::Arc;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum CallbackError {
    /// The callback does not accept the argument shape it was called with.
    #[error("callback does not accept this argument shape")]
    WrongShape,

    #[error("callback failed: {0}")]
    User(String),
}

pub type CallbackResult = std::result::Result<(), CallbackError>;

/// Arguments common to both attribute callback shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttrArgs {
    pub endpoint: u8,
    pub cluster_id: u16,
    pub attr_id: u16,
    /// `None` when the value's type tag is not one the bridge decodes.
    pub value: Option<HostValue>,
    pub attr_type: u8,
    pub status: i32,
}

impl From<&AttrSetEvent> for AttrArgs {
    fn from(ev: &AttrSetEvent) -> Self {
        Self {
            endpoint: ev.endpoint,
            cluster_id: ev.cluster_id,
            attr_id: ev.attr_id,
            value: ev.value.to_host(),
            attr_type: ev.value.zcl_type,
            status: ev.status,
        }
    }
}

/// One invocation of the attribute callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrCall<'a> {
    /// Seven-argument form: source short address first.
    WithSource(u16, &'a AttrArgs),
    /// Six-argument form without a source.
    Legacy(&'a AttrArgs),
}

impl AttrCall<'_> {
    pub fn args(&self) -> &AttrArgs {
        match self {
            AttrCall::WithSource(_, args) | AttrCall::Legacy(args) => args,
        }
    }

    pub fn source(&self) -> Option<u16> {
        match self {
            AttrCall::WithSource(addr, _) => Some(*addr),
            AttrCall::Legacy(_) => None,
        }
    }
}

pub type SignalCallback = Arc<dyn Fn(u16, i32) -> CallbackResult + Send + Sync>;
pub type AttrCallback = Arc<dyn Fn(AttrCall<'_>) -> CallbackResult + Send + Sync>;

/// Wrap a six-argument-only callback. It answers the seven-argument form with
/// [`CallbackError::WrongShape`], which makes the dispatcher retry without
/// the source.
pub fn legacy_attr_callback<F>(f: F) -> AttrCallback
where
    F: Fn(&AttrArgs) -> CallbackResult + Send + Sync + 'static,
{
    Arc::new(move |call: AttrCall<'_>| match call {
        AttrCall::WithSource(..) => Err(CallbackError::WrongShape),
        AttrCall::Legacy(args) => f(args),
    })
}

#[derive(Default)]
pub struct HostCallbacks {
    signal: RwLock<Option<SignalCallback>>,
    attribute: RwLock<Option<AttrCallback>>,
}

impl HostCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_signal_callback(&self, callback: Option<SignalCallback>) {
        *self.signal.write() = callback;
    }

    pub fn set_attribute_callback(&self, callback: Option<AttrCallback>) {
        *self.attribute.write() = callback;
    }

    pub fn signal_callback(&self) -> Option<SignalCallback> {
        self.signal.read().clone()
    }

    pub fn attribute_callback(&self) -> Option<AttrCallback> {
        self.attribute.read().clone()
    }
}

/// Call `callback` for `event`, negotiating the argument shape.
///
/// Events with a source are offered the seven-argument form first. Only a
/// [`CallbackError::WrongShape`] answer triggers the six-argument retry; any
/// other error, from either attempt, is returned to the caller.
pub fn invoke_attr_callback(callback: &AttrCallback, event: &AttrSetEvent) -> CallbackResult {
    let args = AttrArgs::from(event);
    match event.source {
        Some(source) => match callback(AttrCall::WithSource(source.short_addr, &args)) {
            Err(CallbackError::WrongShape) => callback(AttrCall::Legacy(&args)),
            other => other,
        },
        None => callback(AttrCall::Legacy(&args)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::AttrSource;
    use crate::zcl::{AttrType, AttrValue};
    use parking_lot::Mutex;

    fn event(source: Option<u16>) -> AttrSetEvent {
        AttrSetEvent {
            source: source.map(|short_addr| AttrSource {
                short_addr,
                endpoint: 3,
            }),
            endpoint: 1,
            cluster_id: 0x0402,
            attr_id: 0x0000,
            status: 0,
            value: AttrValue::from_i32(AttrType::S16, -250).unwrap(),
        }
    }

    #[test]
    fn test_full_shape_receives_source() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let cb: AttrCallback = Arc::new(move |call: AttrCall<'_>| {
            sink.lock().push((call.source(), call.args().value));
            Ok(())
        });
        invoke_attr_callback(&cb, &event(Some(0x1234))).unwrap();
        invoke_attr_callback(&cb, &event(None)).unwrap();
        assert_eq!(
            seen.lock().as_slice(),
            &[
                (Some(0x1234), Some(HostValue::Signed(-250))),
                (None, Some(HostValue::Signed(-250)))
            ]
        );
    }

    #[test]
    fn test_wrong_shape_falls_back_to_legacy() {
        let calls = Arc::new(Mutex::new(0));
        let count = calls.clone();
        let cb = legacy_attr_callback(move |args| {
            assert_eq!(args.cluster_id, 0x0402);
            *count.lock() += 1;
            Ok(())
        });
        invoke_attr_callback(&cb, &event(Some(0x1234))).unwrap();
        assert_eq!(*calls.lock(), 1);
    }

    #[test]
    fn test_user_error_not_retried() {
        let calls = Arc::new(Mutex::new(0));
        let count = calls.clone();
        let cb: AttrCallback = Arc::new(move |_call: AttrCall<'_>| {
            *count.lock() += 1;
            Err(CallbackError::User("boom".into()))
        });
        let err = invoke_attr_callback(&cb, &event(Some(0x1234))).unwrap_err();
        assert_eq!(err, CallbackError::User("boom".into()));
        assert_eq!(*calls.lock(), 1);
    }

    #[test]
    fn test_slots_replace() {
        let callbacks = HostCallbacks::new();
        assert!(callbacks.signal_callback().is_none());
        callbacks.set_signal_callback(Some(Arc::new(|_: u16, _: i32| Ok(()))));
        assert!(callbacks.signal_callback().is_some());
        callbacks.set_signal_callback(None);
        assert!(callbacks.signal_callback().is_none());
    }
}
