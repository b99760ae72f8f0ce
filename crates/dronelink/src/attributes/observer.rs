// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Observer registry.
//!
//! One registry serves attribute listeners, message listeners, parameter
//! listeners, wildcard listeners and the reserved disconnect selector. Delivery is synchronous
//! on the dispatching thread, in registration order.
//!
//! The listener list is published through an `ArcSwap` snapshot: dispatch
//! loads it without locking and invokes callbacks with no registry lock
//! held, so a callback may add or remove listeners (including itself).
//! A removed listener is flagged inactive before `remove_listener` returns
//! and is skipped by every dispatch that reaches it afterwards.

use super::value::AttributeValue;
use crate::message::{MessageKind, Packet};
use crate::metrics::PumpMetrics;
use crate::sink::{SessionEvent, SessionSink};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Handle returned by `add_listener`, used for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// What a listener is registered for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// One attribute by name (lowercase).
    Attribute(String),
    /// Every message of one kind.
    Message(MessageKind),
    /// One parameter by name (uppercase), or `"*"` for all of them.
    /// Fires only when the value changes.
    Parameter(String),
    /// Every attribute update and every message.
    Wildcard,
    /// Session closed (link lost or `close()`); fires once.
    Disconnect,
}

impl Selector {
    /// Attribute selector, normalising the name.
    pub fn attribute(name: &str) -> Self {
        Self::Attribute(name.to_ascii_lowercase())
    }

    /// Parameter selector, normalising the name.
    pub fn parameter(name: &str) -> Self {
        Self::Parameter(name.to_ascii_uppercase())
    }

    fn matches_attribute(&self, name: &str) -> bool {
        match self {
            Self::Attribute(n) => n == name,
            Self::Wildcard => true,
            _ => false,
        }
    }

    fn matches_message(&self, kind: MessageKind) -> bool {
        match self {
            Self::Message(k) => *k == kind,
            Self::Wildcard => true,
            _ => false,
        }
    }

    fn matches_parameter(&self, name: &str) -> bool {
        match self {
            Self::Parameter(n) => n == "*" || n.eq_ignore_ascii_case(name),
            _ => false,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attribute(name) => write!(f, "attribute '{}'", name),
            Self::Message(kind) => write!(f, "message {}", kind),
            Self::Parameter(name) => write!(f, "parameter '{}'", name),
            Self::Wildcard => f.write_str("'*'"),
            Self::Disconnect => f.write_str("disconnect"),
        }
    }
}

/// Payload of a delivered event.
#[derive(Debug, Clone, Copy)]
pub enum EventKind<'a> {
    Attribute {
        name: &'a str,
        value: &'a AttributeValue,
        version: u64,
        /// Value differs from the previous one.
        changed: bool,
    },
    Message(&'a Packet),
    Parameter {
        name: &'a str,
        value: f32,
    },
    Disconnect {
        reason: &'a str,
    },
}

/// Event handed to a listener callback.
#[derive(Debug, Clone, Copy)]
pub struct Event<'a> {
    /// Selector of the listener being invoked.
    pub selector: &'a Selector,
    pub kind: EventKind<'a>,
}

impl<'a> Event<'a> {
    /// Attribute value, for attribute events.
    pub fn value(&self) -> Option<&'a AttributeValue> {
        match self.kind {
            EventKind::Attribute { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Packet, for message events.
    pub fn packet(&self) -> Option<&'a Packet> {
        match self.kind {
            EventKind::Message(packet) => Some(packet),
            _ => None,
        }
    }
}

/// Listener callback.
pub type Callback = Arc<dyn Fn(&Event<'_>) + Send + Sync>;

struct Registration {
    id: ListenerId,
    selector: Selector,
    callback: Callback,
    active: AtomicBool,
}

/// Listener registry with panic isolation.
pub struct ObserverRegistry {
    listeners: ArcSwap<Vec<Arc<Registration>>>,
    /// Serializes writers of `listeners`
    write_lock: Mutex<()>,
    next_id: AtomicU64,
    /// Set on close: nothing is delivered afterwards
    closed: AtomicBool,
    disconnect_fired: AtomicBool,
    metrics: Arc<PumpMetrics>,
    sink: Arc<dyn SessionSink>,
}

impl ObserverRegistry {
    pub fn new(metrics: Arc<PumpMetrics>, sink: Arc<dyn SessionSink>) -> Self {
        Self {
            listeners: ArcSwap::from_pointee(Vec::new()),
            write_lock: Mutex::new(()),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            disconnect_fired: AtomicBool::new(false),
            metrics,
            sink,
        }
    }

    /// Register `callback` for `selector`.
    pub fn add_listener<F>(&self, selector: Selector, callback: F) -> ListenerId
    where
        F: Fn(&Event<'_>) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let registration = Arc::new(Registration {
            id,
            selector,
            callback: Arc::new(callback),
            active: AtomicBool::new(true),
        });

        let _guard = self.write_lock.lock();
        let mut next = Vec::clone(&self.listeners.load());
        next.push(registration);
        self.listeners.store(Arc::new(next));
        id
    }

    /// Remove a listener. Unknown or already-removed ids are ignored.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let _guard = self.write_lock.lock();
        let current = self.listeners.load();
        let Some(pos) = current.iter().position(|r| r.id == id) else {
            return false;
        };
        current[pos].active.store(false, Ordering::Release);
        let mut next = Vec::clone(&current);
        next.remove(pos);
        self.listeners.store(Arc::new(next));
        true
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.load().len()
    }

    /// Deliver one attribute update.
    pub fn notify_attribute(&self, name: &str, value: &AttributeValue, version: u64, changed: bool) {
        self.dispatch(
            |s| s.matches_attribute(name),
            EventKind::Attribute {
                name,
                value,
                version,
                changed,
            },
        );
    }

    /// Deliver one decoded message.
    pub fn notify_message(&self, packet: &Packet) {
        let kind = packet.kind();
        self.dispatch(|s| s.matches_message(kind), EventKind::Message(packet));
    }

    /// Deliver a parameter value change.
    pub fn notify_parameter(&self, name: &str, value: f32) {
        self.dispatch(
            |s| s.matches_parameter(name),
            EventKind::Parameter { name, value },
        );
    }

    /// Deliver the disconnect event. Only the first call has an effect.
    pub fn notify_disconnect(&self, reason: &str) {
        if self.disconnect_fired.swap(true, Ordering::AcqRel) {
            return;
        }
        self.dispatch(
            |s| matches!(s, Selector::Disconnect),
            EventKind::Disconnect { reason },
        );
    }

    /// Stop all further deliveries.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn dispatch(&self, matches: impl Fn(&Selector) -> bool, kind: EventKind<'_>) {
        let snapshot = self.listeners.load_full();
        for registration in snapshot.iter() {
            if self.closed.load(Ordering::Acquire) {
                return;
            }
            if !registration.active.load(Ordering::Acquire) || !matches(&registration.selector) {
                continue;
            }
            let event = Event {
                selector: &registration.selector,
                kind,
            };
            let callback = &registration.callback;
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback(&event))) {
                self.metrics.listener_panics.fetch_add(1, Ordering::Relaxed);
                self.sink.event(&SessionEvent::ListenerPanic {
                    selector: registration.selector.to_string(),
                    message: panic_message(payload.as_ref()),
                });
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Header, Message};
    use crate::sink::LogSink;
    use std::sync::atomic::AtomicUsize;

    fn registry() -> (Arc<ObserverRegistry>, Arc<PumpMetrics>) {
        let metrics = Arc::new(PumpMetrics::new());
        let registry = Arc::new(ObserverRegistry::new(
            Arc::clone(&metrics),
            Arc::new(LogSink),
        ));
        (registry, metrics)
    }

    fn status_text() -> Packet {
        Packet::new(
            Header::default(),
            Message::StatusText {
                severity: 6,
                text: "hello".into(),
            },
        )
    }

    #[test]
    fn test_delivery_in_registration_order() {
        let (registry, _) = registry();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in 0..3 {
            let order = Arc::clone(&order);
            registry.add_listener(Selector::attribute("mode"), move |_| order.lock().push(tag));
        }
        registry.notify_attribute("mode", &AttributeValue::Text("AUTO".into()), 1, true);
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_selectors_filter_events() {
        let (registry, _) = registry();
        let attr = Arc::new(AtomicUsize::new(0));
        let msg = Arc::new(AtomicUsize::new(0));
        let wild = Arc::new(AtomicUsize::new(0));
        {
            let attr = Arc::clone(&attr);
            registry.add_listener(Selector::attribute("ARMED"), move |e| {
                assert_eq!(e.value(), Some(&AttributeValue::Bool(true)));
                attr.fetch_add(1, Ordering::SeqCst);
            });
        }
        {
            let msg = Arc::clone(&msg);
            registry.add_listener(Selector::Message(MessageKind::StatusText), move |e| {
                assert!(e.packet().is_some());
                msg.fetch_add(1, Ordering::SeqCst);
            });
        }
        {
            let wild = Arc::clone(&wild);
            registry.add_listener(Selector::Wildcard, move |_| {
                wild.fetch_add(1, Ordering::SeqCst);
            });
        }

        registry.notify_attribute("armed", &AttributeValue::Bool(true), 1, true);
        registry.notify_attribute("mode", &AttributeValue::Text("AUTO".into()), 1, true);
        registry.notify_message(&status_text());

        assert_eq!(attr.load(Ordering::SeqCst), 1);
        assert_eq!(msg.load(Ordering::SeqCst), 1);
        assert_eq!(wild.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_parameter_selectors() {
        let (registry, _) = registry();
        let named = Arc::new(AtomicUsize::new(0));
        let any = Arc::new(AtomicUsize::new(0));
        {
            let named = Arc::clone(&named);
            registry.add_listener(Selector::parameter("rtl_alt"), move |e| {
                assert!(matches!(
                    e.kind,
                    EventKind::Parameter { name: "RTL_ALT", value } if value == 1500.0
                ));
                named.fetch_add(1, Ordering::SeqCst);
            });
        }
        {
            let any = Arc::clone(&any);
            registry.add_listener(Selector::parameter("*"), move |_| {
                any.fetch_add(1, Ordering::SeqCst);
            });
        }
        registry.notify_parameter("RTL_ALT", 1500.0);
        registry.notify_parameter("WPNAV_SPEED", 500.0);
        registry.notify_attribute("mode", &AttributeValue::Text("AUTO".into()), 1, true);

        assert_eq!(named.load(Ordering::SeqCst), 1);
        assert_eq!(any.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let (registry, metrics) = registry();
        let after = Arc::new(AtomicUsize::new(0));
        registry.add_listener(Selector::Wildcard, |_| panic!("listener bug"));
        {
            let after = Arc::clone(&after);
            registry.add_listener(Selector::Wildcard, move |_| {
                after.fetch_add(1, Ordering::SeqCst);
            });
        }

        registry.notify_message(&status_text());
        registry.notify_message(&status_text());

        assert_eq!(after.load(Ordering::SeqCst), 2);
        assert_eq!(metrics.snapshot().listener_panics, 2);
    }

    #[test]
    fn test_remove_is_idempotent_and_stops_delivery() {
        let (registry, _) = registry();
        let hits = Arc::new(AtomicUsize::new(0));
        let id = {
            let hits = Arc::clone(&hits);
            registry.add_listener(Selector::Wildcard, move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };
        registry.notify_message(&status_text());
        assert!(registry.remove_listener(id));
        assert!(!registry.remove_listener(id));
        registry.notify_message(&status_text());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(registry.listener_count(), 0);
    }

    #[test]
    fn test_callback_may_remove_itself_and_add_others() {
        let (registry, _) = registry();
        let hits = Arc::new(AtomicUsize::new(0));
        let own_id = Arc::new(Mutex::new(None::<ListenerId>));
        let id = {
            let registry_ref = Arc::downgrade(&registry);
            let own_id = Arc::clone(&own_id);
            let hits = Arc::clone(&hits);
            registry.add_listener(Selector::Wildcard, move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
                if let (Some(registry), Some(id)) = (registry_ref.upgrade(), *own_id.lock()) {
                    registry.remove_listener(id);
                    registry.add_listener(Selector::Disconnect, |_| {});
                }
            })
        };
        *own_id.lock() = Some(id);

        registry.notify_message(&status_text());
        registry.notify_message(&status_text());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(registry.listener_count(), 1);
    }

    #[test]
    fn test_disconnect_fires_once_and_close_silences() {
        let (registry, _) = registry();
        let hits = Arc::new(AtomicUsize::new(0));
        {
            let hits = Arc::clone(&hits);
            registry.add_listener(Selector::Disconnect, move |e| {
                assert!(matches!(e.kind, EventKind::Disconnect { reason: "eof" }));
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }
        registry.notify_disconnect("eof");
        registry.notify_disconnect("eof");
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let wild = Arc::new(AtomicUsize::new(0));
        {
            let wild = Arc::clone(&wild);
            registry.add_listener(Selector::Wildcard, move |_| {
                wild.fetch_add(1, Ordering::SeqCst);
            });
        }
        registry.close();
        registry.notify_message(&status_text());
        assert_eq!(wild.load(Ordering::SeqCst), 0);
    }
}
