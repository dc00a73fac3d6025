//! Persistence operations.
//!
//! [`Orm`] ties descriptors, records and the query layer together. Writes
//! compile a payload with the save-data compiler, hand it to a query bound
//! to the record's table and pool, and fold the outcome back into the
//! record: the generated id, the origin values and the existence state.
//! Nothing is folded back when the connection reports failure.
//!
//! Lifecycle events fire only for models declared as live objects, always
//! before-then-after around the statement. Listeners may rewrite the
//! payload or the pending query and the statement runs with their changes.
//! Read events and the parse-data events fire for every model.
//!
//! # Example
//!
//! ```ignore
//! let orm = Orm::builder(declarations, connection).build();
//! let mut article = orm.new_record("app::Article", Row::new().with("title", "A"))?;
//! assert!(orm.insert(&mut article)?.is_success());
//! article.set("title", "B")?;
//! orm.save(&mut article)?;
//! ```

use std::sync::Arc;

use modelkit_core::{
    CompileContext, ConfigProvider, DeclarationProvider, DescriptorRegistry, EmptyConfig, Error,
    ModelDescriptor, ModelFork, OrmSettings, Result, Row, SavePayload, SoftDeleteSpec, Value,
};
use modelkit_query::{
    AggregateFunction, Condition, Connection, Dialect, ModelQuery, Operator, QueryFactory,
    QueryResult,
};

use crate::coerce::CoercionSet;
use crate::events::{EventBus, EventContext, ModelEvent};
use crate::generator::GeneratorRegistry;
use crate::record::{Existence, Record};
use crate::relation::{NoRelations, RelationCatalogAdapter, RelationRegistry};
use crate::save_data::{Operation, SaveDataCompiler};
use crate::soft_delete::{SoftDeletePolicy, UnixSeconds, deleted_condition, live_condition};
use crate::timestamp::{Clock, SystemClock};

/// A model addressed by class name or through a fork.
#[derive(Debug, Clone, Copy)]
pub enum ModelRef<'a> {
    /// The class's own table and pool.
    Class(&'a str),
    /// A table/pool override.
    Fork(&'a ModelFork),
}

impl<'a> From<&'a str> for ModelRef<'a> {
    fn from(class: &'a str) -> Self {
        ModelRef::Class(class)
    }
}

impl<'a> From<&'a String> for ModelRef<'a> {
    fn from(class: &'a String) -> Self {
        ModelRef::Class(class)
    }
}

impl<'a> From<&'a ModelFork> for ModelRef<'a> {
    fn from(fork: &'a ModelFork) -> Self {
        ModelRef::Fork(fork)
    }
}

enum RegistryHandle {
    Global,
    Shared(Arc<DescriptorRegistry>),
}

impl RegistryHandle {
    fn get(&self) -> &DescriptorRegistry {
        match self {
            RegistryHandle::Global => modelkit_core::registry::global(),
            RegistryHandle::Shared(registry) => registry.as_ref(),
        }
    }
}

/// Builder for [`Orm`].
pub struct OrmBuilder {
    declarations: Arc<dyn DeclarationProvider>,
    connection: Arc<dyn Connection>,
    config: Arc<dyn ConfigProvider>,
    relations: Arc<dyn RelationRegistry>,
    generators: GeneratorRegistry,
    coercion: CoercionSet,
    events: EventBus,
    clock: Arc<dyn Clock>,
    soft_delete_policy: Arc<dyn SoftDeletePolicy>,
    registry: RegistryHandle,
    dialect: Dialect,
}

impl std::fmt::Debug for OrmBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrmBuilder")
            .field("generators", &self.generators)
            .field("coercion", &self.coercion)
            .field("dialect", &self.dialect)
            .finish_non_exhaustive()
    }
}

impl OrmBuilder {
    /// Set the configuration provider (model overrides, `db.*` settings).
    pub fn config(mut self, config: impl ConfigProvider + 'static) -> Self {
        self.config = Arc::new(config);
        self
    }

    /// Set the relation registry.
    pub fn relations(mut self, relations: impl RelationRegistry + 'static) -> Self {
        self.relations = Arc::new(relations);
        self
    }

    /// Replace the generator registry.
    pub fn generators(mut self, generators: GeneratorRegistry) -> Self {
        self.generators = generators;
        self
    }

    /// Replace the coercion policy set.
    pub fn coercion(mut self, coercion: CoercionSet) -> Self {
        self.coercion = coercion;
        self
    }

    /// Start with an existing event bus.
    pub fn events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// Set the clock used for timestamps and soft-delete markers.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set how soft-delete markers are produced.
    pub fn soft_delete_policy(mut self, policy: impl SoftDeletePolicy + 'static) -> Self {
        self.soft_delete_policy = Arc::new(policy);
        self
    }

    /// Share a descriptor registry with other `Orm` instances.
    pub fn registry(mut self, registry: Arc<DescriptorRegistry>) -> Self {
        self.registry = RegistryHandle::Shared(registry);
        self
    }

    /// Use the process-wide descriptor registry.
    pub fn global_registry(mut self) -> Self {
        self.registry = RegistryHandle::Global;
        self
    }

    /// Dialect for logged SQL.
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn build(self) -> Orm {
        let settings = OrmSettings::from_config(self.config.as_ref());
        tracing::debug!(
            default_pool = ?settings.default_pool,
            table_prefix = %settings.table_prefix,
            "Building orm"
        );
        let queries = QueryFactory::new(self.connection)
            .with_prefix(settings.table_prefix)
            .with_default_pool(settings.default_pool)
            .with_dialect(self.dialect);
        Orm {
            declarations: self.declarations,
            config: self.config,
            relations: self.relations,
            generators: self.generators,
            coercion: self.coercion,
            events: self.events,
            clock: self.clock,
            soft_delete_policy: self.soft_delete_policy,
            registry: self.registry,
            queries,
        }
    }
}

/// Persistence entry points over one connection.
pub struct Orm {
    declarations: Arc<dyn DeclarationProvider>,
    config: Arc<dyn ConfigProvider>,
    relations: Arc<dyn RelationRegistry>,
    generators: GeneratorRegistry,
    coercion: CoercionSet,
    events: EventBus,
    clock: Arc<dyn Clock>,
    soft_delete_policy: Arc<dyn SoftDeletePolicy>,
    registry: RegistryHandle,
    queries: QueryFactory,
}

impl std::fmt::Debug for Orm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orm")
            .field("queries", &self.queries)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

impl Orm {
    /// Start building an `Orm` over `declarations` and `connection`.
    pub fn builder(
        declarations: impl DeclarationProvider + 'static,
        connection: Arc<dyn Connection>,
    ) -> OrmBuilder {
        OrmBuilder {
            declarations: Arc::new(declarations),
            connection,
            config: Arc::new(EmptyConfig),
            relations: Arc::new(NoRelations),
            generators: GeneratorRegistry::new(),
            coercion: CoercionSet::default(),
            events: EventBus::new(),
            clock: Arc::new(SystemClock),
            soft_delete_policy: Arc::new(UnixSeconds),
            registry: RegistryHandle::Shared(Arc::new(DescriptorRegistry::new())),
            dialect: Dialect::default(),
        }
    }

    /// Lifecycle event listeners.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// The query factory, for queries outside the model operations.
    pub fn queries(&self) -> &QueryFactory {
        &self.queries
    }

    /// The clock used for timestamps.
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    fn compile_descriptor(&self, class: &str, inherit: bool) -> Result<Arc<ModelDescriptor>> {
        let relations = RelationCatalogAdapter(self.relations.as_ref());
        let ctx = CompileContext {
            declarations: self.declarations.as_ref(),
            config: self.config.as_ref(),
            relations: &relations,
            generators: &self.generators,
        };
        self.registry.get().get_or_compile(class, inherit, ctx)
    }

    /// Compiled descriptor of `class`.
    pub fn descriptor(&self, class: &str) -> Result<Arc<ModelDescriptor>> {
        self.compile_descriptor(class, false)
    }

    /// Descriptor of `class` compiled from its parent's declaration.
    pub fn inherited_descriptor(&self, class: &str) -> Result<Arc<ModelDescriptor>> {
        self.compile_descriptor(class, true)
    }

    /// Fork of `class` routed to another table and/or pool.
    pub fn fork(&self, class: &str, table: Option<&str>, pool: Option<&str>) -> Result<ModelFork> {
        let mut fork = ModelFork::new(self.descriptor(class)?);
        if let Some(table) = table {
            fork = fork.with_table(table);
        }
        if let Some(pool) = pool {
            fork = fork.with_pool(pool);
        }
        Ok(fork)
    }

    fn resolve<'m>(&self, model: impl Into<ModelRef<'m>>) -> Result<ModelFork> {
        match model.into() {
            ModelRef::Class(class) => Ok(ModelFork::new(self.descriptor(class)?)),
            ModelRef::Fork(fork) => Ok(fork.clone()),
        }
    }

    fn compiler(&self) -> SaveDataCompiler<'_> {
        SaveDataCompiler {
            coercion: &self.coercion,
            generators: &self.generators,
            events: &self.events,
            clock: self.clock.as_ref(),
        }
    }

    // Records

    /// Build a new record from raw data.
    ///
    /// Keys may be property or column names; unknown keys are ignored.
    /// Declared constraints apply, so an oversized value is an
    /// [`Error::Value`].
    pub fn new_record<'m>(&self, model: impl Into<ModelRef<'m>>, data: Row) -> Result<Record> {
        let record = Record::new(self.resolve(model)?);
        self.init_record(record, data, true)
    }

    /// Build a record from a row read back from storage.
    ///
    /// The row becomes the record's origin and the record is known to
    /// exist.
    pub fn record_from_persisted<'m>(
        &self,
        model: impl Into<ModelRef<'m>>,
        row: Row,
    ) -> Result<Record> {
        let mut record = Record::new(self.resolve(model)?);
        record.reset_origin(&row);
        record.set_existence(Existence::Exists);
        self.init_record(record, row, false)
    }

    fn init_record(&self, mut record: Record, data: Row, checked: bool) -> Result<Record> {
        let descriptor = Arc::clone(record.descriptor());
        let class = descriptor.real_class_name();
        let live = descriptor.is_live_object();
        let mut data = data;
        if live {
            let mut ctx = EventContext::new(ModelEvent::BeforeInit, class)
                .with_record(&mut record)
                .with_data(&mut data);
            self.events.dispatch(&mut ctx)?;
        }
        record.fill(&data, &self.coercion, checked)?;
        if descriptor.has_relation() {
            self.relations.init_model(&mut record)?;
        }
        if live {
            let mut ctx = EventContext::new(ModelEvent::AfterInit, class)
                .with_record(&mut record)
                .with_data(&mut data);
            self.events.dispatch(&mut ctx)?;
        }
        Ok(record)
    }

    /// Compile the save payload of `record` for `operation`.
    ///
    /// Consumes the record's raw overrides.
    pub fn save_data(&self, record: &mut Record, operation: Operation) -> Result<SavePayload> {
        let descriptor = Arc::clone(record.descriptor());
        let data = record.to_row();
        self.compiler()
            .compile(&descriptor, data, operation, Some(record))
    }

    // Queries

    /// Query bound to the model's table and pool.
    ///
    /// For soft-deletable models, rows carrying a deletion marker are
    /// filtered out.
    pub fn query<'m>(&self, model: impl Into<ModelRef<'m>>) -> Result<ModelQuery> {
        let fork = self.resolve(model)?;
        self.query_for(&fork)
    }

    /// Query bound to the model's table and pool, without the soft-delete
    /// filter.
    pub fn origin_query<'m>(&self, model: impl Into<ModelRef<'m>>) -> Result<ModelQuery> {
        self.queries.for_fork(&self.resolve(model)?)
    }

    fn query_for(&self, fork: &ModelFork) -> Result<ModelQuery> {
        let mut query = self.queries.for_fork(fork)?;
        if let Some(spec) = fork.descriptor().soft_delete() {
            let condition = live_condition(spec, query.table());
            query.push_condition(condition);
        }
        Ok(query)
    }

    fn key_conditions(
        descriptor: &ModelDescriptor,
        query: &mut ModelQuery,
        ids: &[Value],
    ) -> bool {
        let mut scoped = false;
        for (key, id) in descriptor.primary_keys().iter().zip(ids) {
            query.push_condition(Condition::new(key.clone(), Operator::Eq, id.clone()));
            scoped = true;
        }
        scoped
    }

    /// Scope `query` to the record's primary key, preferring values in
    /// `payload`.
    fn record_key_conditions(
        record: &Record,
        payload: Option<&SavePayload>,
        query: &mut ModelQuery,
    ) -> bool {
        let mut scoped = false;
        for key in record.descriptor().primary_keys() {
            let value = payload
                .and_then(|p| p.bound_value(key))
                .or_else(|| record.get(key).filter(|v| !v.is_null()));
            if let Some(value) = value {
                query.push_condition(Condition::new(key.clone(), Operator::Eq, value.clone()));
                scoped = true;
            }
        }
        scoped
    }

    /// Find one record by primary-key values, in key order.
    ///
    /// Fewer values than keys filter on the leading keys only; no values
    /// finds nothing.
    pub fn find<'m>(&self, model: impl Into<ModelRef<'m>>, ids: &[Value]) -> Result<Option<Record>> {
        if ids.is_empty() {
            return Ok(None);
        }
        let fork = self.resolve(model)?;
        let mut query = self.query_for(&fork)?.limit(1);
        Self::key_conditions(fork.descriptor(), &mut query, ids);
        self.find_with(&fork, ids, query)
    }

    /// Run a single-row lookup between `BeforeFind` and `AfterFind`.
    fn find_with(
        &self,
        fork: &ModelFork,
        ids: &[Value],
        query: ModelQuery,
    ) -> Result<Option<Record>> {
        let class = fork.descriptor().real_class_name();
        let mut query = query;
        let mut ctx = EventContext::new(ModelEvent::BeforeFind, class)
            .with_ids(ids)
            .with_query(&mut query);
        self.events.dispatch(&mut ctx)?;

        let mut records = query
            .first()?
            .map(|row| self.record_from_persisted(fork, row))
            .transpose()?
            .into_iter()
            .collect::<Vec<_>>();

        let mut ctx = EventContext::new(ModelEvent::AfterFind, class)
            .with_ids(ids)
            .with_records(&mut records);
        self.events.dispatch(&mut ctx)?;
        Ok(records.into_iter().next())
    }

    /// All records matching `conditions`.
    pub fn select<'m>(
        &self,
        model: impl Into<ModelRef<'m>>,
        conditions: &[Condition],
    ) -> Result<Vec<Record>> {
        let fork = self.resolve(model)?;
        let class = fork.descriptor().real_class_name();
        let mut query = self.query_for(&fork)?;
        for condition in conditions {
            query.push_condition(condition.clone());
        }
        let mut ctx = EventContext::new(ModelEvent::BeforeSelect, class).with_query(&mut query);
        self.events.dispatch(&mut ctx)?;

        let mut records = query
            .select()?
            .into_iter()
            .map(|row| self.record_from_persisted(&fork, row))
            .collect::<Result<Vec<_>>>()?;

        let mut ctx = EventContext::new(ModelEvent::AfterSelect, class).with_records(&mut records);
        self.events.dispatch(&mut ctx)?;
        Ok(records)
    }

    /// Whether a row with these primary-key values exists, soft-deleted or
    /// not.
    pub fn exists<'m>(&self, model: impl Into<ModelRef<'m>>, ids: &[Value]) -> Result<bool> {
        let fork = self.resolve(model)?;
        let mut query = self.queries.for_fork(&fork)?;
        if !Self::key_conditions(fork.descriptor(), &mut query, ids) {
            return Ok(false);
        }
        Ok(query.count()? > 0)
    }

    /// Aggregate over the model's visible rows; `column = None` means `*`.
    pub fn aggregate<'m>(
        &self,
        model: impl Into<ModelRef<'m>>,
        function: AggregateFunction,
        column: Option<&str>,
    ) -> Result<Value> {
        self.query(model)?.aggregate(function, column)
    }

    pub fn count<'m>(&self, model: impl Into<ModelRef<'m>>) -> Result<i64> {
        self.query(model)?.count()
    }

    pub fn sum<'m>(&self, model: impl Into<ModelRef<'m>>, column: &str) -> Result<Value> {
        self.aggregate(model, AggregateFunction::Sum, Some(column))
    }

    pub fn avg<'m>(&self, model: impl Into<ModelRef<'m>>, column: &str) -> Result<Value> {
        self.aggregate(model, AggregateFunction::Avg, Some(column))
    }

    pub fn max<'m>(&self, model: impl Into<ModelRef<'m>>, column: &str) -> Result<Value> {
        self.aggregate(model, AggregateFunction::Max, Some(column))
    }

    pub fn min<'m>(&self, model: impl Into<ModelRef<'m>>, column: &str) -> Result<Value> {
        self.aggregate(model, AggregateFunction::Min, Some(column))
    }

    // Writes

    /// Insert the record.
    #[tracing::instrument(level = "debug", skip(self, record))]
    pub fn insert(&self, record: &mut Record) -> Result<QueryResult> {
        let payload = self.save_data(record, Operation::Insert)?;
        self.insert_payload(record, payload)
    }

    /// Update the record's row with its assigned fields.
    ///
    /// An empty payload succeeds without running a statement.
    #[tracing::instrument(level = "debug", skip(self, record))]
    pub fn update(&self, record: &mut Record) -> Result<QueryResult> {
        let payload = self.save_data(record, Operation::Update)?;
        self.update_payload(record, payload)
    }

    fn insert_payload(&self, record: &mut Record, payload: SavePayload) -> Result<QueryResult> {
        let descriptor = Arc::clone(record.descriptor());
        let class = descriptor.real_class_name();
        let live = descriptor.is_live_object();
        let mut payload = payload;
        let mut query = self.queries.for_fork(record.fork())?;

        if live {
            let mut ctx = EventContext::new(ModelEvent::BeforeInsert, class)
                .with_record(record)
                .with_payload(&mut payload)
                .with_query(&mut query);
            self.events.dispatch(&mut ctx)?;
        }

        let mut result = query.insert(payload.clone())?;
        if result.is_success() {
            if let (Some(property), Some(id)) =
                (descriptor.auto_increment_field(), result.last_insert_id())
            {
                record.put(property, Value::Int(id));
                if let Some(field) = descriptor.field(property) {
                    record.set_origin_value(field.column_name(), Value::Int(id));
                }
            }
        }

        if live {
            let mut ctx = EventContext::new(ModelEvent::AfterInsert, class)
                .with_record(record)
                .with_payload(&mut payload)
                .with_result(&mut result);
            self.events.dispatch(&mut ctx)?;
        }
        if descriptor.has_relation() {
            self.relations.insert_model(record)?;
        }
        if result.is_success() {
            record.merge_origin(&payload);
            record.set_existence(Existence::Exists);
        }
        tracing::info!(
            class = class,
            success = result.is_success(),
            id = ?result.last_insert_id(),
            "Inserted record"
        );
        Ok(result)
    }

    fn update_payload(&self, record: &mut Record, payload: SavePayload) -> Result<QueryResult> {
        let descriptor = Arc::clone(record.descriptor());
        let class = descriptor.real_class_name();
        if payload.is_empty() {
            tracing::debug!(class = class, "Nothing to update");
            return Ok(QueryResult::trivial());
        }
        let live = descriptor.is_live_object();
        let mut payload = payload;
        let mut query = self.queries.for_fork(record.fork())?.limit(1);

        if live {
            let mut ctx = EventContext::new(ModelEvent::BeforeUpdate, class)
                .with_record(record)
                .with_payload(&mut payload)
                .with_query(&mut query);
            self.events.dispatch(&mut ctx)?;
        }

        if !Self::record_key_conditions(record, Some(&payload), &mut query) {
            return Err(Error::Precondition(format!(
                "update of `{class}` has no primary key value"
            )));
        }
        let mut result = query.update(payload.clone())?;

        if live {
            let mut ctx = EventContext::new(ModelEvent::AfterUpdate, class)
                .with_record(record)
                .with_payload(&mut payload)
                .with_result(&mut result);
            self.events.dispatch(&mut ctx)?;
        }
        if descriptor.has_relation() {
            self.relations.update_model(record)?;
        }
        if result.is_success() {
            record.merge_origin(&payload);
        }
        tracing::info!(
            class = class,
            success = result.is_success(),
            affected = result.affected_rows,
            "Updated record"
        );
        Ok(result)
    }

    /// Insert or update the record depending on whether it exists.
    ///
    /// Unknown existence is inferred from a positive auto-increment value.
    /// Without an auto-increment field the row is replaced, keyed by the
    /// primary key.
    #[tracing::instrument(level = "debug", skip(self, record))]
    pub fn save(&self, record: &mut Record) -> Result<QueryResult> {
        let descriptor = Arc::clone(record.descriptor());
        let class = descriptor.real_class_name();
        let exists = record.existence().known().or_else(|| {
            descriptor
                .auto_increment_field()
                .map(|property| record.get(property).and_then(Value::as_i64).unwrap_or(0) > 0)
        });
        let operation = match exists {
            Some(true) => Operation::SaveUpdate,
            Some(false) => Operation::SaveInsert,
            None => Operation::SaveReplace,
        };
        let live = descriptor.is_live_object();
        let mut payload = self.save_data(record, operation)?;
        let mut query = self.queries.for_fork(record.fork())?;

        if live {
            let mut ctx = EventContext::new(ModelEvent::BeforeSave, class)
                .with_record(record)
                .with_payload(&mut payload)
                .with_query(&mut query);
            self.events.dispatch(&mut ctx)?;
        }

        // Insert and update fold their own payload into origin.
        let mut result = match operation {
            Operation::SaveUpdate => self.update_payload(record, payload.clone())?,
            Operation::SaveInsert => self.insert_payload(record, payload.clone())?,
            _ => {
                let result = query.replace(payload.clone(), descriptor.primary_keys())?;
                if result.is_success() {
                    if let (Some(property), Some(id)) =
                        (descriptor.auto_increment_field(), result.last_insert_id())
                    {
                        record.put(property, Value::Int(id));
                    }
                    record.merge_origin(&payload);
                }
                result
            }
        };
        if result.is_success() {
            record.set_existence(Existence::Exists);
        }

        if live {
            let mut ctx = EventContext::new(ModelEvent::AfterSave, class)
                .with_record(record)
                .with_payload(&mut payload)
                .with_result(&mut result);
            self.events.dispatch(&mut ctx)?;
        }
        Ok(result)
    }

    /// Delete the record.
    ///
    /// Soft-deletable models get their deletion marker written instead.
    #[tracing::instrument(level = "debug", skip(self, record))]
    pub fn delete(&self, record: &mut Record) -> Result<QueryResult> {
        let descriptor = Arc::clone(record.descriptor());
        match descriptor.soft_delete() {
            Some(spec) => self.soft_delete(record, spec),
            None => self.physical_delete(record),
        }
    }

    fn physical_delete(&self, record: &mut Record) -> Result<QueryResult> {
        let descriptor = Arc::clone(record.descriptor());
        let class = descriptor.real_class_name();
        let live = descriptor.is_live_object();
        let mut query = self.queries.for_fork(record.fork())?;

        if live {
            let mut ctx = EventContext::new(ModelEvent::BeforeDelete, class)
                .with_record(record)
                .with_query(&mut query);
            self.events.dispatch(&mut ctx)?;
        }
        if !Self::record_key_conditions(record, None, &mut query) {
            return Err(Error::Precondition(format!(
                "delete of `{class}` has no primary key value"
            )));
        }
        let mut result = query.delete()?;

        if live {
            let mut ctx = EventContext::new(ModelEvent::AfterDelete, class)
                .with_record(record)
                .with_result(&mut result);
            self.events.dispatch(&mut ctx)?;
        }
        if descriptor.has_relation() {
            self.relations.delete_model(record)?;
        }
        if result.is_success() {
            record.set_existence(Existence::NotExists);
        }
        tracing::info!(
            class = class,
            success = result.is_success(),
            affected = result.affected_rows,
            "Deleted record"
        );
        Ok(result)
    }

    fn soft_delete(&self, record: &mut Record, spec: &SoftDeleteSpec) -> Result<QueryResult> {
        let descriptor = Arc::clone(record.descriptor());
        let class = descriptor.real_class_name();
        let live = descriptor.is_live_object();
        let mut query = self.queries.for_fork(record.fork())?;

        if live {
            let mut ctx = EventContext::new(ModelEvent::BeforeDelete, class)
                .with_record(record)
                .with_query(&mut query);
            self.events.dispatch(&mut ctx)?;
        }
        if !Self::record_key_conditions(record, None, &mut query) {
            return Err(Error::Precondition(format!(
                "soft delete of `{class}` has no primary key value"
            )));
        }
        let marker = self.soft_delete_policy.generate(self.clock.now());
        record.put(&spec.field, marker.clone());
        let mut result = query.update(SavePayload::new().with(spec.field.as_str(), marker.clone()))?;

        if live {
            let mut ctx = EventContext::new(ModelEvent::AfterDelete, class)
                .with_record(record)
                .with_result(&mut result);
            self.events.dispatch(&mut ctx)?;
        }
        if descriptor.has_relation() {
            self.relations.delete_model(record)?;
        }
        if result.is_success() {
            record.set_origin_value(&spec.field, marker);
            record.set_existence(Existence::NotExists);
        }
        tracing::info!(
            class = class,
            success = result.is_success(),
            "Soft deleted record"
        );
        Ok(result)
    }

    fn soft_delete_spec(descriptor: &ModelDescriptor) -> Result<SoftDeleteSpec> {
        descriptor.soft_delete().cloned().ok_or_else(|| {
            Error::configuration(
                descriptor.real_class_name(),
                "model is not declared soft-deletable",
            )
        })
    }

    /// Physically delete a soft-deletable record.
    #[tracing::instrument(level = "debug", skip(self, record))]
    pub fn hard_delete(&self, record: &mut Record) -> Result<QueryResult> {
        Self::soft_delete_spec(record.descriptor())?;
        self.physical_delete(record)
    }

    /// Clear the deletion marker of a soft-deleted record.
    #[tracing::instrument(level = "debug", skip(self, record))]
    pub fn restore(&self, record: &mut Record) -> Result<QueryResult> {
        let descriptor = Arc::clone(record.descriptor());
        let spec = Self::soft_delete_spec(&descriptor)?;
        let mut query = self.queries.for_fork(record.fork())?;
        if !Self::record_key_conditions(record, None, &mut query) {
            return Err(Error::Precondition(format!(
                "restore of `{}` has no primary key value",
                descriptor.real_class_name()
            )));
        }
        record.put(&spec.field, spec.default.clone());
        let result =
            query.update(SavePayload::new().with(spec.field.as_str(), spec.default.clone()))?;
        if result.is_success() {
            record.set_origin_value(&spec.field, spec.default);
            record.set_existence(Existence::Exists);
        }
        tracing::info!(
            class = descriptor.real_class_name(),
            success = result.is_success(),
            "Restored record"
        );
        Ok(result)
    }

    /// Find one soft-deleted record by primary-key values.
    pub fn find_deleted<'m>(
        &self,
        model: impl Into<ModelRef<'m>>,
        ids: &[Value],
    ) -> Result<Option<Record>> {
        let fork = self.resolve(model)?;
        let spec = Self::soft_delete_spec(fork.descriptor())?;
        if ids.is_empty() {
            return Ok(None);
        }
        let mut query = self.queries.for_fork(&fork)?.limit(1);
        Self::key_conditions(fork.descriptor(), &mut query, ids);
        query.push_condition(deleted_condition(&spec));
        self.find_with(&fork, ids, query)
    }
}
