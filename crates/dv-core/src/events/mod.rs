use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::Mutex;

/// Opaque, caller-supplied value threaded through emitted events for correlation.
pub type EventDetail = serde_json::Value;

/// Identifier returned by [`EventEmitter::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

/// Handler slot; empty while the handler runs
type Slot<H> = Arc<Mutex<Option<Box<H>>>>;

struct Registration<H: ?Sized> {
    id: HandlerId,
    handler: Slot<H>,
}

/// Synchronous event emitter keyed by event kind.
///
/// `K` is the event kind (usually a fieldless enum) and `H` the unsized
/// handler type, typically `dyn FnMut(&SomeEvent<'_>) + Send`. Keeping the
/// handler type open lets events borrow from the emitting object instead of
/// being `'static`.
///
/// Handlers registered for a kind run inline, in registration order, on the
/// thread that emits. The handler list is copied before dispatch, so a
/// handler may subscribe or unsubscribe other handlers while it runs. A
/// handler may also cause the same kind to be emitted again; the nested
/// dispatch skips the handlers that are still running.
pub struct EventEmitter<K, H: ?Sized> {
    next_id: AtomicU64,
    handlers: Mutex<AHashMap<K, Vec<Registration<H>>>>,
}

impl<K, H> EventEmitter<K, H>
where
    K: Copy + Eq + Hash + fmt::Debug,
    H: ?Sized,
{
    /// Create an emitter without handlers
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            handlers: Mutex::new(AHashMap::new()),
        }
    }

    /// Subscribe a handler to events of `kind`
    pub fn on(&self, kind: K, handler: Box<H>) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut handlers = self.handlers.lock();
        handlers.entry(kind).or_insert_with(Vec::new).push(Registration {
            id,
            handler: Arc::new(Mutex::new(Some(handler))),
        });
        tracing::trace!(?kind, ?id, "registered event handler");
        id
    }

    /// Unsubscribe a handler. Returns `false` if the id is unknown.
    pub fn off(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.lock();
        for registrations in handlers.values_mut() {
            if let Some(position) = registrations.iter().position(|r| r.id == id) {
                registrations.remove(position);
                return true;
            }
        }
        false
    }

    /// Number of handlers currently subscribed to `kind`
    pub fn handler_count(&self, kind: K) -> usize {
        self.handlers.lock().get(&kind).map_or(0, Vec::len)
    }

    /// Drop every handler
    pub fn clear(&self) {
        self.handlers.lock().clear();
    }

    /// Dispatch an event of `kind`.
    ///
    /// `invoke` is called once per subscribed handler with mutable access to
    /// it; the caller builds the event and passes it in.
    pub fn emit_with(&self, kind: K, mut invoke: impl FnMut(&mut H)) {
        let snapshot: Vec<Slot<H>> = {
            let handlers = self.handlers.lock();
            match handlers.get(&kind) {
                Some(registrations) => registrations.iter().map(|r| Arc::clone(&r.handler)).collect(),
                None => return,
            }
        };

        tracing::trace!(?kind, handlers = snapshot.len(), "emitting event");

        for slot in snapshot {
            // the slot lock is released before the call so nested emits can
            // reach the other handlers
            let Some(mut handler) = slot.lock().take() else {
                tracing::trace!(?kind, "handler already running, skipped");
                continue;
            };
            invoke(&mut *handler);
            *slot.lock() = Some(handler);
        }
    }
}

impl<K, H> Default for EventEmitter<K, H>
where
    K: Copy + Eq + Hash + fmt::Debug,
    H: ?Sized,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, H: ?Sized> fmt::Debug for EventEmitter<K, H>
where
    K: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.lock();
        let mut map = f.debug_map();
        for (kind, registrations) in handlers.iter() {
            map.entry(kind, &registrations.len());
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Kind {
        Before,
        After,
    }

    struct Ping<'a> {
        label: &'a str,
    }

    type PingHandler = dyn FnMut(&Ping<'_>) + Send;

    fn emitter() -> EventEmitter<Kind, PingHandler> {
        EventEmitter::new()
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let emitter = emitter();
        let log = Arc::new(StdMutex::new(Vec::new()));

        for name in ["first", "second", "third"] {
            let log = Arc::clone(&log);
            emitter.on(
                Kind::Before,
                Box::new(move |ping: &Ping<'_>| {
                    log.lock().unwrap().push(format!("{}:{}", name, ping.label));
                }),
            );
        }

        let label = String::from("go");
        emitter.emit_with(Kind::Before, |handler| handler(&Ping { label: &label }));

        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:go", "second:go", "third:go"]
        );
    }

    #[test]
    fn test_only_matching_kind_is_dispatched() {
        let emitter = emitter();
        let hits = Arc::new(AtomicU64::new(0));

        let counter = Arc::clone(&hits);
        emitter.on(
            Kind::After,
            Box::new(move |_: &Ping<'_>| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        emitter.emit_with(Kind::Before, |handler| handler(&Ping { label: "x" }));
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        emitter.emit_with(Kind::After, |handler| handler(&Ping { label: "x" }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_off_removes_handler() {
        let emitter = emitter();
        let hits = Arc::new(AtomicU64::new(0));

        let counter = Arc::clone(&hits);
        let id = emitter.on(
            Kind::Before,
            Box::new(move |_: &Ping<'_>| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert_eq!(emitter.handler_count(Kind::Before), 1);

        assert!(emitter.off(id));
        assert!(!emitter.off(id));
        assert_eq!(emitter.handler_count(Kind::Before), 0);

        emitter.emit_with(Kind::Before, |handler| handler(&Ping { label: "x" }));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_handler_may_subscribe_during_dispatch() {
        let emitter = Arc::new(emitter());
        let inner = Arc::clone(&emitter);

        emitter.on(
            Kind::Before,
            Box::new(move |_: &Ping<'_>| {
                inner.on(Kind::After, Box::new(|_: &Ping<'_>| {}));
            }),
        );

        emitter.emit_with(Kind::Before, |handler| handler(&Ping { label: "x" }));
        assert_eq!(emitter.handler_count(Kind::After), 1);
    }

    #[test]
    fn test_nested_emit_of_same_kind_skips_running_handler() {
        let emitter = Arc::new(emitter());
        let outer_calls = Arc::new(AtomicU64::new(0));
        let other_calls = Arc::new(AtomicU64::new(0));

        let inner = Arc::clone(&emitter);
        let outer = Arc::clone(&outer_calls);
        emitter.on(
            Kind::Before,
            Box::new(move |_: &Ping<'_>| {
                outer.fetch_add(1, Ordering::SeqCst);
                inner.emit_with(Kind::Before, |handler| handler(&Ping { label: "nested" }));
            }),
        );

        let other = Arc::clone(&other_calls);
        emitter.on(
            Kind::Before,
            Box::new(move |_: &Ping<'_>| {
                other.fetch_add(1, Ordering::SeqCst);
            }),
        );

        emitter.emit_with(Kind::Before, |handler| handler(&Ping { label: "x" }));
        assert_eq!(outer_calls.load(Ordering::SeqCst), 1);
        assert_eq!(other_calls.load(Ordering::SeqCst), 2);

        // the re-entrant handler is back in place afterwards
        emitter.emit_with(Kind::Before, |handler| handler(&Ping { label: "y" }));
        assert_eq!(outer_calls.load(Ordering::SeqCst), 2);
        assert_eq!(other_calls.load(Ordering::SeqCst), 4);
    }
}
