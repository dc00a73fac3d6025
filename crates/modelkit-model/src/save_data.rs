//! Save-data compilation.
//!
//! Turns a record (or loose source data) into the exact `column -> value`
//! payload an insert, update or replace sends. Per stored field, the first
//! matching source wins:
//!
//! 1. a pending raw SQL override,
//! 2. the update-time role,
//! 3. the create-time role,
//! 4. the field's ID generator,
//! 5. the source data, by property name then column name,
//! 6. on anything but a plain update, the declared default, else `NULL`.
//!
//! A plain update skips fields absent from the source data. The chosen value is then dropped when it is a `NULL` the column cannot
//! take, encoded by the coercion policy, and dropped again when incremental
//! update finds it unchanged. Update payloads never carry primary keys.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use modelkit_core::{
    Error, FieldDescriptor, ModelDescriptor, Result, Row, SavePayload, SaveValue, TimePrecision,
    Value,
};

use crate::coerce::CoercionSet;
use crate::events::{EventBus, EventContext, ModelEvent};
use crate::generator::GeneratorRegistry;
use crate::record::Record;
use crate::timestamp::{Clock, format_timestamp};

/// Kind of write a payload is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Plain insert.
    Insert,
    /// Plain update; absent fields are left untouched.
    Update,
    /// `save` of a record known not to exist.
    SaveInsert,
    /// `save` of a record known to exist.
    SaveUpdate,
    /// `save` of a record whose existence is unknown (upsert).
    SaveReplace,
}

impl Operation {
    /// Whether create-time and ID generators fill values.
    pub const fn creates(self) -> bool {
        matches!(
            self,
            Operation::Insert | Operation::SaveInsert | Operation::SaveReplace
        )
    }

    /// Whether primary keys are stripped from the payload.
    pub const fn updates(self) -> bool {
        matches!(self, Operation::Update | Operation::SaveUpdate)
    }

    /// Whether this is a plain insert.
    pub const fn is_insert(self) -> bool {
        matches!(self, Operation::Insert)
    }
}

/// Collaborators of save-data compilation.
#[derive(Clone, Copy)]
pub struct SaveDataCompiler<'a> {
    pub coercion: &'a CoercionSet,
    pub generators: &'a GeneratorRegistry,
    pub events: &'a EventBus,
    pub clock: &'a dyn Clock,
}

impl std::fmt::Debug for SaveDataCompiler<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaveDataCompiler")
            .field("coercion", self.coercion)
            .finish_non_exhaustive()
    }
}

impl SaveDataCompiler<'_> {
    /// Compile `data` into a payload for `operation`.
    ///
    /// With a record, its raw overrides are consumed, its origin drives the
    /// incremental diff, and generated values are written back into it.
    pub fn compile(
        &self,
        descriptor: &Arc<ModelDescriptor>,
        data: Row,
        operation: Operation,
        mut record: Option<&mut Record>,
    ) -> Result<SavePayload> {
        let class = descriptor.real_class_name();
        let mut data = data;
        {
            let mut ctx = EventContext::new(ModelEvent::BeforeParseData, class).with_data(&mut data);
            ctx.record = record.as_deref_mut();
            self.events.dispatch(&mut ctx)?;
        }

        let raw = record
            .as_deref_mut()
            .map(Record::take_raw)
            .unwrap_or_default();
        let origin: HashMap<String, Value> = record
            .as_deref()
            .map(|r| r.origin().clone())
            .unwrap_or_default();
        let incremental = descriptor.incremental_update();
        let mut now: Option<DateTime<Utc>> = None;
        let mut payload = SavePayload::new();

        for field in descriptor.db_fields() {
            if field.virtual_field {
                continue;
            }
            let name = field.property_name.as_str();
            let column = field.column_name();

            if let Some(sql) = raw.get(name).or_else(|| raw.get(column)) {
                payload.insert(column, SaveValue::Raw(sql.clone()));
                continue;
            }

            let current = record
                .as_deref()
                .map(|r| r.value(name))
                .unwrap_or_default();
            let value = if let Some(precision) = field
                .update_time
                .filter(|_| !operation.is_insert())
                .filter(|_| {
                    current.is_empty_like()
                        || origin.get(column).unwrap_or(&Value::Null) == &current
                }) {
                let value = self.timestamp(class, field, precision, &mut now)?;
                write_back(record.as_deref_mut(), name, &value);
                value
            } else if let Some(precision) = field
                .create_time
                .filter(|_| operation.creates() && current.is_empty_like())
            {
                let value = self.timestamp(class, field, precision, &mut now)?;
                write_back(record.as_deref_mut(), name, &value);
                value
            } else if let Some(generator) = field
                .generator
                .as_deref()
                .filter(|g| operation.creates() && !g.is_empty())
            {
                let generator = self.generators.get(generator).ok_or_else(|| {
                    Error::configuration(class, format!("unknown generator `{generator}`"))
                })?;
                let value = generator.generate(record.as_deref(), &field.generator_options)?;
                write_back(record.as_deref_mut(), name, &value);
                value
            } else if let Some(value) = data.get(name).or_else(|| data.get(column)) {
                value.clone()
            } else if operation == Operation::Update {
                continue;
            } else if let Some(default) = &field.default {
                write_back(record.as_deref_mut(), name, default);
                default.clone()
            } else {
                Value::Null
            };

            if value.is_null()
                && !field.nullable
                && !self.coercion.is_null_exempt(field.semantic_type)
            {
                continue;
            }
            let value = self.coercion.save_value(field, value)?;
            if incremental
                && !operation.is_insert()
                && (origin.get(column) == Some(&value) || origin.get(name) == Some(&value))
            {
                continue;
            }
            payload.insert(column, value);
        }

        if operation.updates() {
            for key in descriptor.primary_keys() {
                payload.remove(key);
            }
        }

        {
            let mut ctx = EventContext::new(ModelEvent::AfterParseData, class)
                .with_data(&mut data)
                .with_payload(&mut payload);
            ctx.record = record.as_deref_mut();
            self.events.dispatch(&mut ctx)?;
        }

        tracing::trace!(
            class = class,
            operation = ?operation,
            columns = payload.len(),
            "Compiled save data"
        );
        Ok(payload)
    }

    /// Render the timestamp for `field`, reading the clock at most once per
    /// compilation.
    fn timestamp(
        &self,
        class: &str,
        field: &FieldDescriptor,
        precision: TimePrecision,
        now: &mut Option<DateTime<Utc>>,
    ) -> Result<Value> {
        let now = *now.get_or_insert_with(|| self.clock.now());
        format_timestamp(field.semantic_type, precision, now).ok_or_else(|| {
            Error::configuration(
                class,
                format!(
                    "column `{}` of type {} can not hold a timestamp",
                    field.column_name(),
                    field.semantic_type
                ),
            )
        })
    }
}

fn write_back(record: Option<&mut Record>, property: &str, value: &Value) {
    if let Some(record) = record {
        record.put(property, value.clone());
    }
}
