// Filter ordering, effective-policy resolution and the per-action cache

use super::{FilterDescriptor, FilterMetadata, FilterSource, PolicyKind};
use crate::context::ActionDescriptor;
use crate::logging::pipeline;
use crate::services::ActionServices;
use crate::Result;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Stable sort by `(order, scope)`; declaration order breaks remaining ties.
pub fn order_descriptors(descriptors: &mut [FilterDescriptor]) {
    descriptors.sort_by_key(|d| (d.order, d.scope));
}

/// Filters for one request, split by stage.
///
/// Built from an already ordered list. Policy filters that are not the
/// effective one for their kind are dropped from every stage.
pub struct FilterPlan {
    all: Vec<Arc<dyn FilterMetadata>>,
    pub(crate) authorization: Vec<Arc<dyn FilterMetadata>>,
    pub(crate) resource: Vec<Arc<dyn FilterMetadata>>,
    pub(crate) action: Vec<Arc<dyn FilterMetadata>>,
    /// Reversed: the filter closest to the action sees the error first
    pub(crate) exception: Vec<Arc<dyn FilterMetadata>>,
    pub(crate) result: Vec<Arc<dyn FilterMetadata>>,
    pub(crate) always_run_result: Vec<Arc<dyn FilterMetadata>>,
}

impl FilterPlan {
    pub fn assemble(filters: Vec<Arc<dyn FilterMetadata>>) -> Self {
        let effective = effective_policy_indices(&filters);

        let mut plan = Self {
            all: Vec::new(),
            authorization: Vec::new(),
            resource: Vec::new(),
            action: Vec::new(),
            exception: Vec::new(),
            result: Vec::new(),
            always_run_result: Vec::new(),
        };

        for (index, filter) in filters.iter().enumerate() {
            if let Some(kind) = filter.policy()
                && !effective.contains(&index)
            {
                pipeline::skipped_policy(filter.name(), kind.as_str());
                continue;
            }

            if filter.as_async_authorization_filter().is_some()
                || filter.as_authorization_filter().is_some()
            {
                plan.authorization.push(filter.clone());
            }
            if filter.as_async_resource_filter().is_some() || filter.as_resource_filter().is_some() {
                plan.resource.push(filter.clone());
            }
            if filter.as_async_action_filter().is_some() || filter.as_action_filter().is_some() {
                plan.action.push(filter.clone());
            }
            if filter.as_async_exception_filter().is_some() || filter.as_exception_filter().is_some()
            {
                plan.exception.push(filter.clone());
            }
            if filter.as_async_result_filter().is_some() || filter.as_result_filter().is_some() {
                plan.result.push(filter.clone());
                if filter.is_always_run_result_filter() {
                    plan.always_run_result.push(filter.clone());
                }
            }
        }

        plan.exception.reverse();
        plan.all = filters;
        plan
    }

    /// Every filter, in execution order, including skipped policy filters.
    pub fn filters(&self) -> &[Arc<dyn FilterMetadata>] {
        &self.all
    }

    /// The filter enforcing `kind`, if any.
    pub fn effective_policy(&self, kind: PolicyKind) -> Option<&Arc<dyn FilterMetadata>> {
        self.all.iter().rev().find(|f| f.policy() == Some(kind))
    }

    /// Whether `filter` (by identity) runs in this plan.
    pub fn is_effective(&self, filter: &Arc<dyn FilterMetadata>) -> bool {
        match filter.policy() {
            Some(kind) => self
                .effective_policy(kind)
                .is_some_and(|effective| Arc::ptr_eq(effective, filter)),
            None => self.all.iter().any(|f| Arc::ptr_eq(f, filter)),
        }
    }

    pub(crate) fn stage_names(stage: &[Arc<dyn FilterMetadata>]) -> Vec<&str> {
        stage.iter().map(|f| f.name()).collect()
    }
}

impl fmt::Debug for FilterPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterPlan")
            .field("authorization", &Self::stage_names(&self.authorization))
            .field("resource", &Self::stage_names(&self.resource))
            .field("action", &Self::stage_names(&self.action))
            .field("exception", &Self::stage_names(&self.exception))
            .field("result", &Self::stage_names(&self.result))
            .finish()
    }
}

/// Scanning from the action outwards, the first filter of each policy kind wins.
fn effective_policy_indices(filters: &[Arc<dyn FilterMetadata>]) -> HashSet<usize> {
    let mut seen = HashSet::new();
    let mut effective = HashSet::new();
    for (index, filter) in filters.iter().enumerate().rev() {
        if let Some(kind) = filter.policy()
            && seen.insert(kind)
        {
            effective.insert(index);
        }
    }
    effective
}

struct CachedFilters {
    descriptors: Vec<FilterDescriptor>,
    /// `None` where a non-reusable factory must run per request
    instances: Vec<Option<Arc<dyn FilterMetadata>>>,
    /// Present when every instance is cached
    plan: Option<Arc<FilterPlan>>,
}

/// Ordered filters per action, computed on first use.
///
/// Reusable instances (plain filters and reusable factories) are shared by
/// all requests; non-reusable factories produce fresh instances per request.
#[derive(Default)]
pub struct FilterCache {
    entries: RwLock<HashMap<String, Arc<CachedFilters>>>,
}

impl FilterCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters for `action`, with `global` filters applied first at equal order.
    pub fn get_filters(
        &self,
        action: &ActionDescriptor,
        global: &[FilterDescriptor],
        services: &ActionServices,
    ) -> Result<Arc<FilterPlan>> {
        let cached = self.entries.read().get(&action.id).cloned();
        let cached = match cached {
            Some(cached) => cached,
            None => {
                let built = Arc::new(Self::build(action, global, services)?);
                self.entries
                    .write()
                    .entry(action.id.clone())
                    .or_insert(built)
                    .clone()
            }
        };

        if let Some(plan) = &cached.plan {
            return Ok(plan.clone());
        }

        let mut filters = Vec::with_capacity(cached.descriptors.len());
        for (descriptor, instance) in cached.descriptors.iter().zip(&cached.instances) {
            match (instance, &descriptor.source) {
                (Some(instance), _) => filters.push(instance.clone()),
                (None, FilterSource::Factory(factory)) => {
                    filters.push(factory.create_instance(services)?)
                }
                (None, FilterSource::Instance(filter)) => filters.push(filter.clone()),
            }
        }
        Ok(Arc::new(FilterPlan::assemble(filters)))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn build(
        action: &ActionDescriptor,
        global: &[FilterDescriptor],
        services: &ActionServices,
    ) -> Result<CachedFilters> {
        let mut descriptors: Vec<FilterDescriptor> =
            global.iter().chain(&action.filters).cloned().collect();
        order_descriptors(&mut descriptors);

        let mut instances = Vec::with_capacity(descriptors.len());
        for descriptor in &descriptors {
            let instance = match &descriptor.source {
                FilterSource::Instance(filter) => Some(filter.clone()),
                FilterSource::Factory(factory) if factory.is_reusable() => {
                    Some(factory.create_instance(services)?)
                }
                FilterSource::Factory(_) => None,
            };
            instances.push(instance);
        }

        let plan = instances
            .iter()
            .map(Option::clone)
            .collect::<Option<Vec<_>>>()
            .map(|filters| Arc::new(FilterPlan::assemble(filters)));

        Ok(CachedFilters {
            descriptors,
            instances,
            plan,
        })
    }
}

impl fmt::Debug for FilterCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterCache")
            .field("actions", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::handler_fn;
    use crate::filters::{FilterFactory, FilterOutcome, FilterScope, ResultExecutingContext, ResultFilter};
    use crate::results::ActionOutput;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Named {
        name: &'static str,
        order: i32,
        policy: Option<PolicyKind>,
    }

    impl Named {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                order: 0,
                policy: None,
            }
        }

        fn with_policy(name: &'static str, kind: PolicyKind) -> Self {
            Self {
                name,
                order: 0,
                policy: Some(kind),
            }
        }
    }

    impl ResultFilter for Named {
        fn on_result_executing(&self, _: &mut ResultExecutingContext<'_>) -> Result<FilterOutcome> {
            Ok(FilterOutcome::Continue)
        }
    }

    impl FilterMetadata for Named {
        fn name(&self) -> &str {
            self.name
        }

        fn order(&self) -> i32 {
            self.order
        }

        fn policy(&self) -> Option<PolicyKind> {
            self.policy
        }

        fn as_result_filter(&self) -> Option<&dyn ResultFilter> {
            Some(self)
        }
    }

    fn action() -> ActionDescriptor {
        ActionDescriptor::new("home", "index", handler_fn(|_, _| Ok(ActionOutput::Empty)))
    }

    fn names(plan: &FilterPlan) -> Vec<&str> {
        FilterPlan::stage_names(&plan.result)
    }

    #[test]
    fn test_order_then_scope() {
        let action = action()
            .with_filter(Named::new("action"))
            .with_controller_filter(Named::new("controller"))
            .with_filter_descriptor(
                FilterDescriptor::new(Named::new("early-action"), FilterScope::Action).with_order(-1),
            );
        let global = vec![FilterDescriptor::new(Named::new("global"), FilterScope::Global)];

        let plan = FilterCache::new()
            .get_filters(&action, &global, &ActionServices::new())
            .unwrap();
        assert_eq!(names(&plan), vec!["early-action", "global", "controller", "action"]);
    }

    #[test]
    fn test_ties_keep_declaration_order() {
        let action = action()
            .with_filter(Named::new("first"))
            .with_filter(Named::new("second"))
            .with_filter(Named::new("third"));

        let plan = FilterCache::new()
            .get_filters(&action, &[], &ActionServices::new())
            .unwrap();
        assert_eq!(names(&plan), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_one_effective_policy_per_kind() {
        for n in 0..5 {
            let mut filters: Vec<Arc<dyn FilterMetadata>> = Vec::new();
            for i in 0..n {
                let name: &'static str = Box::leak(format!("size-{}", i).into_boxed_str());
                filters.push(Arc::new(Named::with_policy(name, PolicyKind::RequestSize)));
            }
            filters.push(Arc::new(Named::with_policy("consumes", PolicyKind::Consumes)));
            filters.push(Arc::new(Named::new("plain")));

            let plan = FilterPlan::assemble(filters.clone());
            let sized: Vec<&str> = names(&plan)
                .into_iter()
                .filter(|name| name.starts_with("size-"))
                .collect();

            if n == 0 {
                assert!(sized.is_empty());
                assert!(plan.effective_policy(PolicyKind::RequestSize).is_none());
            } else {
                let last = format!("size-{}", n - 1);
                assert_eq!(sized, vec![last.as_str()]);
                let effective = plan.effective_policy(PolicyKind::RequestSize).unwrap();
                assert!(plan.is_effective(effective));
                assert!(n == 1 || !plan.is_effective(&filters[0]));
            }
            assert!(names(&plan).contains(&"consumes"));
            assert!(names(&plan).contains(&"plain"));
        }
    }

    struct CountingFactory {
        reusable: bool,
        created: Arc<AtomicUsize>,
    }

    impl FilterFactory for CountingFactory {
        fn is_reusable(&self) -> bool {
            self.reusable
        }

        fn create_instance(&self, _services: &ActionServices) -> Result<Arc<dyn FilterMetadata>> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Named::new("made")))
        }
    }

    #[test]
    fn test_factory_reuse() {
        let services = ActionServices::new();
        for (reusable, expected) in [(true, 1), (false, 3)] {
            let created = Arc::new(AtomicUsize::new(0));
            let action = action().with_filter_descriptor(FilterDescriptor::factory(
                CountingFactory {
                    reusable,
                    created: created.clone(),
                },
                FilterScope::Action,
            ));

            let cache = FilterCache::new();
            for _ in 0..3 {
                let plan = cache.get_filters(&action, &[], &services).unwrap();
                assert_eq!(names(&plan), vec!["made"]);
            }
            assert_eq!(created.load(Ordering::SeqCst), expected);
            assert_eq!(cache.len(), 1);
        }
    }

    #[test]
    fn test_cached_plan_is_shared() {
        let action = action().with_filter(Named::new("a"));
        let cache = FilterCache::new();
        let services = ActionServices::new();
        let first = cache.get_filters(&action, &[], &services).unwrap();
        let second = cache.get_filters(&action, &[], &services).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
