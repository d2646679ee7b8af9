mod count_cache;

pub use count_cache::CacheStats;

use crate::{
    audit::{Actor, AuditStamp},
    compile::{Window, compile_count, compile_delete, compile_select, compile_update, sql},
    criteria::{Criteria, Predicate},
    descriptor::{self, Verb},
    error::Error,
    executor::{CancelToken, QueryExecutor},
    obs::sink::{self, MetricsEvent},
    page::{Page, PageError, PageRequest, Slice},
    project::Projection,
    row::Row,
    schema::{EntitySchema, SchemaRegistry},
    value::Value,
};
use count_cache::CountCache;
use std::sync::Arc;

///
/// Engine
///
/// The crate's front door: schema-validated criteria in, pages out.
/// Owns the executor, the immutable schema registry, and the count
/// cache. Every operation is synchronous and per-call; the only shared
/// mutable state is the cache.
///

///
/// EngineConfig
///

#[derive(Clone, Copy, Debug)]
pub struct EngineConfig {
    /// Hard upper bound on page size; larger requests are errors.
    pub max_page_size: u64,
    /// Whether filtered totals are cached between mutations.
    pub count_cache: bool,
}

pub const DEFAULT_MAX_PAGE_SIZE: u64 = 1000;

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            count_cache: true,
        }
    }
}

///
/// DescriptorOutcome
///
/// What a routed descriptor produced, discriminated by its verb.
///

#[derive(Clone, Debug, PartialEq)]
pub enum DescriptorOutcome {
    Rows(Vec<Row>),
    Count(u64),
    Exists(bool),
    Affected(u64),
}

///
/// Engine
///

#[derive(Debug)]
pub struct Engine<X: QueryExecutor> {
    registry: SchemaRegistry,
    executor: X,
    config: EngineConfig,
    count_cache: CountCache,
}

impl<X: QueryExecutor> Engine<X> {
    #[must_use]
    pub fn new(registry: SchemaRegistry, executor: X) -> Self {
        Self::with_config(registry, executor, EngineConfig::default())
    }

    #[must_use]
    pub fn with_config(registry: SchemaRegistry, executor: X, config: EngineConfig) -> Self {
        Self {
            registry,
            executor,
            config,
            count_cache: CountCache::default(),
        }
    }

    #[must_use]
    pub const fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn executor(&self) -> &X {
        &self.executor
    }

    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.count_cache.stats()
    }

    /// Fetch one page plus the filtered total.
    ///
    /// A page index past the end yields an empty page carrying the real
    /// total; it is never an error. The count query is skipped when the
    /// fetched page already pins down the total.
    pub fn find_page(
        &self,
        entity: &str,
        criteria: &Criteria,
        request: PageRequest,
        projection: Option<&Projection>,
        cancel: &CancelToken,
    ) -> Result<Page<Row>, Error> {
        self.check_size(request.size())?;
        let schema = self.schema(entity)?;

        let window = Window::page(request.offset(), request.size());
        let plan = compile_select(&self.registry, &schema, criteria, window, projection, true)?;
        let rows = self.executor.fetch(&plan, cancel)?;
        let fetched = rows.len() as u64;

        let total = if fetched < request.size() && (request.number() == 0 || fetched > 0) {
            // The short page pins the total down without a count query.
            request.offset() + fetched
        } else {
            self.count_with(&schema, criteria, cancel)?
        };

        sink::record(MetricsEvent::PageFetched {
            entity: schema.entity().to_string(),
            rows: fetched,
        });

        Ok(Page::new(rows, request.number(), request.size(), total))
    }

    /// Fetch one slice: probes one row past the page instead of counting.
    pub fn find_slice(
        &self,
        entity: &str,
        criteria: &Criteria,
        request: PageRequest,
        projection: Option<&Projection>,
        cancel: &CancelToken,
    ) -> Result<Slice<Row>, Error> {
        self.check_size(request.size())?;
        let schema = self.schema(entity)?;

        let window = Window {
            limit: Some(request.size() + 1),
            offset: request.offset(),
        };
        let plan = compile_select(&self.registry, &schema, criteria, window, projection, true)?;
        let mut rows = self.executor.fetch(&plan, cancel)?;

        let has_next = rows.len() as u64 > request.size();
        rows.truncate(usize::try_from(request.size()).unwrap_or(usize::MAX));

        sink::record(MetricsEvent::SliceFetched {
            entity: schema.entity().to_string(),
            rows: rows.len() as u64,
        });

        Ok(Slice::new(rows, request.number(), request.size(), has_next))
    }

    /// Fetch the first `limit` rows in criteria order.
    pub fn find_top(
        &self,
        entity: &str,
        criteria: &Criteria,
        limit: u64,
        projection: Option<&Projection>,
        cancel: &CancelToken,
    ) -> Result<Vec<Row>, Error> {
        let schema = self.schema(entity)?;
        let plan = compile_select(
            &self.registry,
            &schema,
            criteria,
            Window::limit(limit),
            projection,
            true,
        )?;
        Ok(self.executor.fetch(&plan, cancel)?)
    }

    /// Count the rows the criteria match, consulting the cache first.
    pub fn count(
        &self,
        entity: &str,
        criteria: &Criteria,
        cancel: &CancelToken,
    ) -> Result<u64, Error> {
        let schema = self.schema(entity)?;
        self.count_with(&schema, criteria, cancel)
    }

    /// Whether any row matches: a limit-1 probe on the primary key.
    pub fn exists(
        &self,
        entity: &str,
        criteria: &Criteria,
        cancel: &CancelToken,
    ) -> Result<bool, Error> {
        let schema = self.schema(entity)?;
        let projection = Projection::of([schema.primary_key().name.clone()]);
        let plan = compile_select(
            &self.registry,
            &schema,
            criteria,
            Window::limit(1),
            Some(&projection),
            true,
        )?;
        Ok(!self.executor.fetch(&plan, cancel)?.is_empty())
    }

    /// Bulk update every row the predicate matches, stamping audit
    /// fields when the schema declares them. Returns the affected count
    /// and invalidates all cached totals.
    pub fn update(
        &self,
        entity: &str,
        predicate: &Predicate,
        assignments: Vec<(String, Value)>,
        actor: Actor,
        cancel: &CancelToken,
    ) -> Result<u64, Error> {
        let schema = self.schema(entity)?;

        let mut assignments = assignments;
        if schema.is_audited() {
            let stamp = AuditStamp::now(actor);
            assignments.extend(stamp.update_fields());
        }

        let plan = compile_update(&self.registry, &schema, predicate, assignments)?;
        let affected = self.executor.execute(&plan, cancel)?;
        self.after_mutation(&schema, affected);
        Ok(affected)
    }

    /// Bulk delete every row the predicate matches.
    pub fn delete(
        &self,
        entity: &str,
        predicate: &Predicate,
        cancel: &CancelToken,
    ) -> Result<u64, Error> {
        let schema = self.schema(entity)?;
        let plan = compile_delete(&self.registry, &schema, predicate)?;
        let affected = self.executor.execute(&plan, cancel)?;
        self.after_mutation(&schema, affected);
        Ok(affected)
    }

    /// Parse, bind, and route a descriptor in one call.
    pub fn run_descriptor(
        &self,
        entity: &str,
        text: &str,
        args: Vec<Value>,
        cancel: &CancelToken,
    ) -> Result<DescriptorOutcome, Error> {
        let schema = self.schema(entity)?;
        let parsed = descriptor::parse(text)?;
        let criteria = parsed.bind(&self.registry, &schema, args).map_err(Error::from)?;

        match parsed.verb() {
            Verb::Find => {
                let window = parsed.limit().map_or_else(Window::all, Window::limit);
                let plan =
                    compile_select(&self.registry, &schema, &criteria, window, None, true)?;
                Ok(DescriptorOutcome::Rows(self.executor.fetch(&plan, cancel)?))
            }
            Verb::Count => Ok(DescriptorOutcome::Count(
                self.count_with(&schema, &criteria, cancel)?,
            )),
            Verb::Exists => Ok(DescriptorOutcome::Exists(
                self.exists(entity, &criteria, cancel)?,
            )),
            Verb::Remove => {
                let plan = compile_delete(&self.registry, &schema, &criteria.predicate)?;
                let affected = self.executor.execute(&plan, cancel)?;
                self.after_mutation(&schema, affected);
                Ok(DescriptorOutcome::Affected(affected))
            }
        }
    }

    fn schema(&self, entity: &str) -> Result<Arc<EntitySchema>, Error> {
        self.registry
            .get(entity)
            .cloned()
            .ok_or_else(|| Error::UnknownEntity {
                entity: entity.to_string(),
            })
    }

    fn check_size(&self, size: u64) -> Result<(), Error> {
        if size > self.config.max_page_size {
            return Err(PageError::SizeExceedsMax {
                size,
                max: self.config.max_page_size,
            }
            .into());
        }
        Ok(())
    }

    fn count_with(
        &self,
        schema: &EntitySchema,
        criteria: &Criteria,
        cancel: &CancelToken,
    ) -> Result<u64, Error> {
        let plan = compile_count(&self.registry, schema, criteria)?;
        let statement = sql::count(&plan);
        let key = format!("{}|{:?}", statement.sql, statement.binds);

        if self.config.count_cache {
            if let Some(total) = self.count_cache.get(&key) {
                sink::record(MetricsEvent::CountCacheHit {
                    entity: schema.entity().to_string(),
                });
                return Ok(total);
            }
            sink::record(MetricsEvent::CountCacheMiss {
                entity: schema.entity().to_string(),
            });
        }

        let total = self.executor.fetch_count(&plan, cancel)?;
        sink::record(MetricsEvent::CountExecuted {
            entity: schema.entity().to_string(),
        });
        if self.config.count_cache {
            self.count_cache.insert(key, total);
        }
        Ok(total)
    }

    fn after_mutation(&self, schema: &EntitySchema, affected: u64) {
        self.count_cache.invalidate_all();
        sink::record(MetricsEvent::MutationExecuted {
            entity: schema.entity().to_string(),
            affected,
        });
    }
}

///
/// TESTS
///
