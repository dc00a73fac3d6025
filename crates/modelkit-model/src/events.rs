//! Lifecycle events.
//!
//! Persistence operations dispatch an [`EventContext`] at fixed points.
//! Listeners run synchronously, in registration order, and may mutate
//! whatever the context carries (the record, the source data, the compiled
//! payload, the pending query or the result); the operation continues with
//! the mutated values. A listener error aborts the operation.
//!
//! Read events (`BeforeFind`, `AfterFind`, `BeforeSelect`, `AfterSelect`)
//! carry the pending query and then the records built from its rows.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use modelkit_core::{Result, Row, SavePayload, Value};
use modelkit_query::{ModelQuery, QueryResult};

use crate::record::Record;

/// Lifecycle event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelEvent {
    BeforeInit,
    AfterInit,
    BeforeInsert,
    AfterInsert,
    BeforeUpdate,
    AfterUpdate,
    BeforeSave,
    AfterSave,
    BeforeDelete,
    AfterDelete,
    BeforeParseData,
    AfterParseData,
    BeforeFind,
    AfterFind,
    BeforeSelect,
    AfterSelect,
}

impl ModelEvent {
    /// Event name as used in logs.
    pub const fn name(self) -> &'static str {
        match self {
            ModelEvent::BeforeInit => "before_init",
            ModelEvent::AfterInit => "after_init",
            ModelEvent::BeforeInsert => "before_insert",
            ModelEvent::AfterInsert => "after_insert",
            ModelEvent::BeforeUpdate => "before_update",
            ModelEvent::AfterUpdate => "after_update",
            ModelEvent::BeforeSave => "before_save",
            ModelEvent::AfterSave => "after_save",
            ModelEvent::BeforeDelete => "before_delete",
            ModelEvent::AfterDelete => "after_delete",
            ModelEvent::BeforeParseData => "before_parse_data",
            ModelEvent::AfterParseData => "after_parse_data",
            ModelEvent::BeforeFind => "before_find",
            ModelEvent::AfterFind => "after_find",
            ModelEvent::BeforeSelect => "before_select",
            ModelEvent::AfterSelect => "after_select",
        }
    }
}

impl fmt::Display for ModelEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a dispatched event carries.
///
/// Fields that do not apply to an event are `None`.
pub struct EventContext<'a> {
    /// The event.
    pub event: ModelEvent,
    /// Real class name of the model.
    pub class: &'a str,
    /// The record the operation runs on.
    pub record: Option<&'a mut Record>,
    /// Source data of a record build or save-data compilation.
    pub data: Option<&'a mut Row>,
    /// Compiled payload about to be written, or just written.
    pub payload: Option<&'a mut SavePayload>,
    /// Query about to execute.
    pub query: Option<&'a mut ModelQuery>,
    /// Outcome of the executed statement.
    pub result: Option<&'a mut QueryResult>,
    /// Primary-key values a find was asked for.
    pub ids: Option<&'a [Value]>,
    /// Records read back by a find (at most one) or a select.
    pub records: Option<&'a mut Vec<Record>>,
}

impl<'a> EventContext<'a> {
    /// Context carrying nothing but the event and class.
    pub fn new(event: ModelEvent, class: &'a str) -> Self {
        Self {
            event,
            class,
            record: None,
            data: None,
            payload: None,
            query: None,
            result: None,
            ids: None,
            records: None,
        }
    }

    pub fn with_record(mut self, record: &'a mut Record) -> Self {
        self.record = Some(record);
        self
    }

    pub fn with_data(mut self, data: &'a mut Row) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_payload(mut self, payload: &'a mut SavePayload) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_query(mut self, query: &'a mut ModelQuery) -> Self {
        self.query = Some(query);
        self
    }

    pub fn with_result(mut self, result: &'a mut QueryResult) -> Self {
        self.result = Some(result);
        self
    }

    pub fn with_ids(mut self, ids: &'a [Value]) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn with_records(mut self, records: &'a mut Vec<Record>) -> Self {
        self.records = Some(records);
        self
    }
}

impl fmt::Debug for EventContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventContext")
            .field("event", &self.event)
            .field("class", &self.class)
            .field("payload", &self.payload)
            .field("result", &self.result)
            .field("ids", &self.ids)
            .finish_non_exhaustive()
    }
}

/// Event listener.
pub type Listener = Arc<dyn Fn(&mut EventContext<'_>) -> Result<()> + Send + Sync>;

type ListenerKey = (Option<String>, ModelEvent);

/// Registered listeners, global or per class.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<HashMap<ListenerKey, Vec<Listener>>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("EventBus")
            .field("registrations", &listeners.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen to `event` on every model.
    pub fn on<F>(&self, event: ModelEvent, listener: F)
    where
        F: Fn(&mut EventContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.register((None, event), Arc::new(listener));
    }

    /// Listen to `event` on models whose real class is `class`.
    pub fn on_class<F>(&self, class: impl Into<String>, event: ModelEvent, listener: F)
    where
        F: Fn(&mut EventContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.register((Some(class.into()), event), Arc::new(listener));
    }

    fn register(&self, key: ListenerKey, listener: Listener) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_default()
            .push(listener);
    }

    /// Whether anything listens to `event` for `class`.
    pub fn has_listeners(&self, class: &str, event: ModelEvent) -> bool {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        listeners.contains_key(&(None, event))
            || listeners.contains_key(&(Some(class.to_string()), event))
    }

    /// Run global listeners, then class listeners, stopping at the first
    /// error.
    pub fn dispatch(&self, ctx: &mut EventContext<'_>) -> Result<()> {
        let listeners: Vec<Listener> = {
            let map = self
                .listeners
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            map.get(&(None, ctx.event))
                .into_iter()
                .chain(map.get(&(Some(ctx.class.to_string()), ctx.event)))
                .flatten()
                .cloned()
                .collect()
        };
        if listeners.is_empty() {
            return Ok(());
        }
        tracing::trace!(
            event = %ctx.event,
            class = ctx.class,
            listeners = listeners.len(),
            "Dispatching model event"
        );
        for listener in listeners {
            listener(ctx)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelkit_core::{Error, SaveValue, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_listeners_mutate_payload_in_order() {
        let bus = EventBus::new();
        bus.on(ModelEvent::AfterParseData, |ctx| {
            if let Some(payload) = ctx.payload.as_deref_mut() {
                payload.insert("a", 1);
            }
            Ok(())
        });
        bus.on_class("app::Post", ModelEvent::AfterParseData, |ctx| {
            if let Some(payload) = ctx.payload.as_deref_mut() {
                payload.insert("a", 2);
            }
            Ok(())
        });

        let mut payload = SavePayload::new();
        let mut ctx =
            EventContext::new(ModelEvent::AfterParseData, "app::Post").with_payload(&mut payload);
        bus.dispatch(&mut ctx).unwrap();
        assert_eq!(payload.get("a"), Some(&SaveValue::Value(Value::Int(2))));
    }

    #[test]
    fn test_class_listeners_are_scoped() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        bus.on_class("app::Post", ModelEvent::BeforeInsert, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        assert!(bus.has_listeners("app::Post", ModelEvent::BeforeInsert));
        assert!(!bus.has_listeners("app::User", ModelEvent::BeforeInsert));

        bus.dispatch(&mut EventContext::new(ModelEvent::BeforeInsert, "app::User"))
            .unwrap();
        bus.dispatch(&mut EventContext::new(ModelEvent::BeforeInsert, "app::Post"))
            .unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_error_stops_dispatch() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        bus.on(ModelEvent::BeforeDelete, |_| {
            Err(Error::Precondition("deletes are disabled".into()))
        });
        let counter = Arc::clone(&hits);
        bus.on(ModelEvent::BeforeDelete, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let err = bus
            .dispatch(&mut EventContext::new(ModelEvent::BeforeDelete, "app::Post"))
            .unwrap_err();
        assert!(err.is_precondition());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
