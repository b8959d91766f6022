// rules-engine/src/rule_index.rs
// ============================================================================
// Module: Rule Index (Rule Manager)
// Description: Forward trigger indexes, reverse action-product indexes,
//              group lifecycle, and debounced persistence scheduling.
// Purpose: Implement spec §4.2 in full.
// Dependencies: crate::{clock, interfaces}, rules_core::*, rules_logic::pattern
// ============================================================================

//! ## Overview
//! The Rule Index answers two questions in sub-linear time: "which rules
//! does this stimulus trigger" (forward indexes) and "which rules would
//! produce this fact key / event topic" (reverse indexes, for backward
//! reasoning). It also owns rule/group lifecycle and schedules debounced
//! persistence saves on every mutation.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::RwLock;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use rules_core::Group;
use rules_core::GroupId;
use rules_core::PatternId;
use rules_core::Rule;
use rules_core::RuleAction;
use rules_core::RuleId;
use rules_core::Trigger;
use rules_core::ValidationError;
use rules_logic::Separator;
use rules_logic::matches_pattern;

use crate::clock::SharedClock;
use crate::interfaces::DiagnosticLevel;
use crate::interfaces::DiagnosticSink;
use crate::interfaces::PersistenceError;
use crate::interfaces::RulePersistence;

/// Two-tier index over one trigger kind's pattern space.
#[derive(Default)]
struct TierIndex {
    exact: HashMap<String, HashSet<RuleId>>,
    wildcard: HashMap<String, HashSet<RuleId>>,
}

impl TierIndex {
    fn insert(&mut self, pattern: &str, rule_id: RuleId) {
        let tier = if pattern.contains('*') { &mut self.wildcard } else { &mut self.exact };
        tier.entry(pattern.to_string()).or_default().insert(rule_id);
    }

    fn remove(&mut self, pattern: &str, rule_id: &RuleId) {
        let tier = if pattern.contains('*') { &mut self.wildcard } else { &mut self.exact };
        if let Some(bucket) = tier.get_mut(pattern) {
            bucket.remove(rule_id);
            if bucket.is_empty() {
                tier.remove(pattern);
            }
        }
    }

    fn lookup(&self, key: &str, separator: Separator) -> HashSet<RuleId> {
        let mut found: HashSet<RuleId> = self.exact.get(key).cloned().unwrap_or_default();
        for (pattern, rule_ids) in &self.wildcard {
            if matches_pattern(pattern, key, separator) {
                found.extend(rule_ids.iter().cloned());
            }
        }
        found
    }
}

/// Replaces every `${...}` interpolation placeholder with a single `*`
/// segment, so a reverse-index lookup key can match it structurally
/// (spec §4.2).
fn normalize_template(template: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        out.push('*');
        rest = rest[start + 2..].find('}').map_or("", |end| &rest[start + 2 + end + 1..]);
    }
    out.push_str(rest);
    out
}

/// Errors produced by Rule Index mutations.
#[derive(Debug, thiserror::Error)]
pub enum RuleIndexError {
    /// Rule/group input failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// No rule exists with the given identifier.
    #[error("rule \"{0}\" not found")]
    RuleNotFound(RuleId),
    /// No group exists with the given identifier.
    #[error("group \"{0}\" not found")]
    GroupNotFound(GroupId),
    /// A persistence adapter call failed.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

struct Indexes {
    fact: TierIndex,
    event: TierIndex,
    timer: TierIndex,
    temporal: HashMap<PatternId, HashSet<RuleId>>,
    fact_action: TierIndex,
    event_action: TierIndex,
}

impl Indexes {
    fn new() -> Self {
        Self {
            fact: TierIndex::default(),
            event: TierIndex::default(),
            timer: TierIndex::default(),
            temporal: HashMap::new(),
            fact_action: TierIndex::default(),
            event_action: TierIndex::default(),
        }
    }

    fn insert_trigger(&mut self, rule_id: RuleId, trigger: &Trigger) {
        match trigger {
            Trigger::Fact { pattern } => self.fact.insert(pattern, rule_id),
            Trigger::Event { topic } => self.event.insert(topic, rule_id),
            Trigger::Timer { name } => self.timer.insert(name, rule_id),
            Trigger::Temporal { pattern } => {
                self.temporal.entry(pattern.clone()).or_default().insert(rule_id);
            }
        }
    }

    fn remove_trigger(&mut self, rule_id: &RuleId, trigger: &Trigger) {
        match trigger {
            Trigger::Fact { pattern } => self.fact.remove(pattern, rule_id),
            Trigger::Event { topic } => self.event.remove(topic, rule_id),
            Trigger::Timer { name } => self.timer.remove(name, rule_id),
            Trigger::Temporal { pattern } => {
                if let Some(bucket) = self.temporal.get_mut(pattern) {
                    bucket.remove(rule_id);
                    if bucket.is_empty() {
                        self.temporal.remove(pattern);
                    }
                }
            }
        }
    }

    fn insert_reverse(&mut self, rule_id: RuleId, actions: &[RuleAction]) {
        RuleAction::walk_actions(actions, &mut |action| match action {
            RuleAction::SetFact { key, .. } => self.fact_action.insert(&normalize_template(key), rule_id.clone()),
            RuleAction::EmitEvent { topic, .. } => {
                self.event_action.insert(&normalize_template(topic), rule_id.clone());
            }
            _ => {}
        });
    }

    fn remove_reverse(&mut self, rule_id: &RuleId, actions: &[RuleAction]) {
        RuleAction::walk_actions(actions, &mut |action| match action {
            RuleAction::SetFact { key, .. } => self.fact_action.remove(&normalize_template(key), rule_id),
            RuleAction::EmitEvent { topic, .. } => self.event_action.remove(&normalize_template(topic), rule_id),
            _ => {}
        });
    }
}

/// Forward (trigger) and reverse (action-product) rule index.
pub struct RuleIndex {
    clock: SharedClock,
    rules: Arc<RwLock<HashMap<RuleId, Rule>>>,
    groups: Arc<RwLock<HashMap<GroupId, Group>>>,
    by_group: RwLock<HashMap<GroupId, HashSet<RuleId>>>,
    indexes: RwLock<Indexes>,
    next_version: AtomicU64,
    persistence: Option<Arc<dyn RulePersistence>>,
    debounce_ms: u64,
    generation: Arc<AtomicU64>,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl RuleIndex {
    /// Builds an empty Rule Index.
    #[must_use]
    pub fn new(
        clock: SharedClock,
        persistence: Option<Arc<dyn RulePersistence>>,
        debounce_ms: u64,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            clock,
            rules: Arc::new(RwLock::new(HashMap::new())),
            groups: Arc::new(RwLock::new(HashMap::new())),
            by_group: RwLock::new(HashMap::new()),
            indexes: RwLock::new(Indexes::new()),
            next_version: AtomicU64::new(1),
            persistence,
            debounce_ms,
            generation: Arc::new(AtomicU64::new(0)),
            diagnostics,
        }
    }

    fn rules_read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<RuleId, Rule>> {
        self.rules.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn rules_write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<RuleId, Rule>> {
        self.rules.write().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn groups_read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<GroupId, Group>> {
        self.groups.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn groups_write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<GroupId, Group>> {
        self.groups.write().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn group_enabled(&self, group: Option<&GroupId>) -> Option<bool> {
        group.map(|id| self.groups_read().get(id).is_some_and(|g| g.enabled))
    }

    fn sorted_active(&self, ids: HashSet<RuleId>) -> Vec<Rule> {
        let rules = self.rules_read();
        let mut matched: Vec<Rule> = ids
            .into_iter()
            .filter_map(|id| rules.get(&id).cloned())
            .filter(|rule| rule.is_active(self.group_enabled(rule.group.as_ref())))
            .collect();
        matched.sort_by(|a, b| b.priority.cmp(&a.priority));
        matched
    }

    // ========================================================================
    // SECTION: Rule Lifecycle
    // ========================================================================

    /// Registers a new rule, assigning a fresh monotonic version and timestamps.
    ///
    /// # Errors
    /// Returns [`RuleIndexError::Validation`] if `rule.group` names a group
    /// that does not exist.
    pub fn register_rule(&self, mut rule: Rule) -> Result<Rule, RuleIndexError> {
        if let Some(group_id) = &rule.group {
            if !self.groups_read().contains_key(group_id) {
                return Err(ValidationError::single(
                    "group",
                    format!("group \"{group_id}\" does not exist"),
                )
                .into());
            }
        }

        let now = self.clock.now_ms();
        rule.version = self.next_version.fetch_add(1, Ordering::SeqCst);
        rule.created_at = now;
        rule.updated_at = now;

        {
            let mut indexes = self.indexes.write().unwrap_or_else(std::sync::PoisonError::into_inner);
            indexes.insert_trigger(rule.id.clone(), &rule.trigger);
            indexes.insert_reverse(rule.id.clone(), &rule.actions);
        }
        if let Some(group_id) = &rule.group {
            self.by_group.write().unwrap_or_else(std::sync::PoisonError::into_inner).entry(group_id.clone()).or_default().insert(rule.id.clone());
        }
        self.rules_write().insert(rule.id.clone(), rule.clone());
        self.schedule_save();
        Ok(rule)
    }

    /// Removes a rule and every index entry that referenced it.
    ///
    /// # Errors
    /// Returns [`RuleIndexError::RuleNotFound`] if no such rule is registered.
    pub fn unregister_rule(&self, id: &RuleId) -> Result<Rule, RuleIndexError> {
        let rule = self.rules_write().remove(id).ok_or_else(|| RuleIndexError::RuleNotFound(id.clone()))?;
        {
            let mut indexes = self.indexes.write().unwrap_or_else(std::sync::PoisonError::into_inner);
            indexes.remove_trigger(id, &rule.trigger);
            indexes.remove_reverse(id, &rule.actions);
        }
        if let Some(group_id) = &rule.group {
            if let Some(bucket) = self.by_group.write().unwrap_or_else(std::sync::PoisonError::into_inner).get_mut(group_id) {
                bucket.remove(id);
            }
        }
        self.schedule_save();
        Ok(rule)
    }

    fn set_rule_enabled(&self, id: &RuleId, enabled: bool) -> Result<(), RuleIndexError> {
        let now = self.clock.now_ms();
        let mut rules = self.rules_write();
        let rule = rules.get_mut(id).ok_or_else(|| RuleIndexError::RuleNotFound(id.clone()))?;
        rule.enabled = enabled;
        rule.updated_at = now;
        drop(rules);
        self.schedule_save();
        Ok(())
    }

    /// Enables a rule.
    ///
    /// # Errors
    /// Returns [`RuleIndexError::RuleNotFound`] if no such rule is registered.
    pub fn enable_rule(&self, id: &RuleId) -> Result<(), RuleIndexError> {
        self.set_rule_enabled(id, true)
    }

    /// Disables a rule.
    ///
    /// # Errors
    /// Returns [`RuleIndexError::RuleNotFound`] if no such rule is registered.
    pub fn disable_rule(&self, id: &RuleId) -> Result<(), RuleIndexError> {
        self.set_rule_enabled(id, false)
    }

    /// Returns a rule by id, regardless of its active state.
    #[must_use]
    pub fn get_rule(&self, id: &RuleId) -> Option<Rule> {
        self.rules_read().get(id).cloned()
    }

    /// Returns every registered rule, regardless of active state.
    #[must_use]
    pub fn get_rules(&self) -> Vec<Rule> {
        self.rules_read().values().cloned().collect()
    }

    // ========================================================================
    // SECTION: Group Lifecycle
    // ========================================================================

    /// Creates a new, enabled group.
    pub fn create_group(&self, mut group: Group) -> Group {
        let now = self.clock.now_ms();
        group.created_at = now;
        group.updated_at = now;
        self.groups_write().insert(group.id.clone(), group.clone());
        self.schedule_save();
        group
    }

    /// Deletes a group, clearing `group` on every rule that referenced it.
    ///
    /// # Errors
    /// Returns [`RuleIndexError::GroupNotFound`] if no such group is registered.
    pub fn delete_group(&self, id: &GroupId) -> Result<Group, RuleIndexError> {
        let group = self.groups_write().remove(id).ok_or_else(|| RuleIndexError::GroupNotFound(id.clone()))?;
        let now = self.clock.now_ms();
        if let Some(member_ids) = self.by_group.write().unwrap_or_else(std::sync::PoisonError::into_inner).remove(id) {
            let mut rules = self.rules_write();
            for rule_id in member_ids {
                if let Some(rule) = rules.get_mut(&rule_id) {
                    rule.group = None;
                    rule.updated_at = now;
                }
            }
        }
        self.schedule_save();
        Ok(group)
    }

    fn set_group_enabled(&self, id: &GroupId, enabled: bool) -> Result<(), RuleIndexError> {
        let now = self.clock.now_ms();
        let mut groups = self.groups_write();
        let group = groups.get_mut(id).ok_or_else(|| RuleIndexError::GroupNotFound(id.clone()))?;
        group.enabled = enabled;
        group.updated_at = now;
        drop(groups);
        self.schedule_save();
        Ok(())
    }

    /// Enables a group. Does not resurrect individually disabled member rules.
    ///
    /// # Errors
    /// Returns [`RuleIndexError::GroupNotFound`] if no such group is registered.
    pub fn enable_group(&self, id: &GroupId) -> Result<(), RuleIndexError> {
        self.set_group_enabled(id, true)
    }

    /// Disables a group, making every member rule inactive.
    ///
    /// # Errors
    /// Returns [`RuleIndexError::GroupNotFound`] if no such group is registered.
    pub fn disable_group(&self, id: &GroupId) -> Result<(), RuleIndexError> {
        self.set_group_enabled(id, false)
    }

    /// Returns a group by id.
    #[must_use]
    pub fn get_group(&self, id: &GroupId) -> Option<Group> {
        self.groups_read().get(id).cloned()
    }

    /// Returns every registered group.
    #[must_use]
    pub fn get_groups(&self) -> Vec<Group> {
        self.groups_read().values().cloned().collect()
    }

    /// Returns every rule belonging to `group_id`, regardless of active state.
    #[must_use]
    pub fn get_group_rules(&self, group_id: &GroupId) -> Vec<Rule> {
        let rules = self.rules_read();
        self.by_group
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(group_id)
            .into_iter()
            .flatten()
            .filter_map(|id| rules.get(id).cloned())
            .collect()
    }

    // ========================================================================
    // SECTION: Forward Lookup
    // ========================================================================

    /// Returns active rules whose fact trigger matches `key`, sorted by
    /// descending priority.
    #[must_use]
    pub fn lookup_by_fact(&self, key: &str) -> Vec<Rule> {
        let ids = self.indexes.read().unwrap_or_else(std::sync::PoisonError::into_inner).fact.lookup(key, Separator::Colon);
        self.sorted_active(ids)
    }

    /// Returns active rules whose event trigger matches `topic`, sorted by
    /// descending priority.
    #[must_use]
    pub fn lookup_by_event(&self, topic: &str) -> Vec<Rule> {
        let ids = self.indexes.read().unwrap_or_else(std::sync::PoisonError::into_inner).event.lookup(topic, Separator::Dot);
        self.sorted_active(ids)
    }

    /// Returns active rules whose timer trigger matches `name`, sorted by
    /// descending priority.
    #[must_use]
    pub fn lookup_by_timer(&self, name: &str) -> Vec<Rule> {
        let ids = self.indexes.read().unwrap_or_else(std::sync::PoisonError::into_inner).timer.lookup(name, Separator::Colon);
        self.sorted_active(ids)
    }

    /// Returns active rules bound to the given temporal pattern, sorted by
    /// descending priority.
    #[must_use]
    pub fn lookup_by_temporal(&self, pattern: &PatternId) -> Vec<Rule> {
        let ids = self
            .indexes
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .temporal
            .get(pattern)
            .cloned()
            .unwrap_or_default();
        self.sorted_active(ids)
    }

    // ========================================================================
    // SECTION: Reverse Lookup
    // ========================================================================

    /// Returns active rules whose action list would write fact `key`.
    #[must_use]
    pub fn get_by_fact_action(&self, key: &str) -> Vec<Rule> {
        let ids = self.indexes.read().unwrap_or_else(std::sync::PoisonError::into_inner).fact_action.lookup(key, Separator::Colon);
        self.sorted_active(ids)
    }

    /// Returns active rules whose action list would emit event `topic`.
    #[must_use]
    pub fn get_by_event_action(&self, topic: &str) -> Vec<Rule> {
        let ids = self.indexes.read().unwrap_or_else(std::sync::PoisonError::into_inner).event_action.lookup(topic, Separator::Dot);
        self.sorted_active(ids)
    }

    // ========================================================================
    // SECTION: Persistence
    // ========================================================================

    fn schedule_save(&self) {
        let Some(persistence) = self.persistence.clone() else { return };
        let my_generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let generation = Arc::clone(&self.generation);
        let rules = Arc::clone(&self.rules);
        let groups = Arc::clone(&self.groups);
        let diagnostics = Arc::clone(&self.diagnostics);
        let debounce_ms = self.debounce_ms;

        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(debounce_ms)).await;
            if generation.load(Ordering::SeqCst) != my_generation {
                // A later mutation re-armed the debounce; this save is stale.
                return;
            }
            let rules_snapshot: Vec<Rule> =
                rules.read().unwrap_or_else(std::sync::PoisonError::into_inner).values().cloned().collect();
            let groups_snapshot: Vec<Group> =
                groups.read().unwrap_or_else(std::sync::PoisonError::into_inner).values().cloned().collect();
            if let Err(error) = persistence.save(&rules_snapshot, &groups_snapshot).await {
                // Spec §4.2 / §7: background saves swallow errors.
                diagnostics.record(DiagnosticLevel::Warn, "rule_index", &format!("debounced save failed: {error}"));
            }
        });
    }

    /// Immediately saves the current rule and group sets, cancelling any
    /// pending debounced save.
    ///
    /// # Errors
    /// Returns [`RuleIndexError::Persistence`] if the adapter's `save` call fails.
    pub async fn persist(&self) -> Result<(), RuleIndexError> {
        // Invalidate any in-flight debounced save.
        self.generation.fetch_add(1, Ordering::SeqCst);
        let Some(persistence) = self.persistence.clone() else { return Ok(()) };
        let rules_snapshot = self.get_rules();
        let groups_snapshot = self.get_groups();
        persistence.save(&rules_snapshot, &groups_snapshot).await?;
        Ok(())
    }

    /// Loads rules and groups from the persistence adapter, rebuilding every
    /// index. Groups are restored before rules so rule→group references
    /// resolve, and `nextVersion` is seeded past the maximum seen version.
    ///
    /// # Errors
    /// Returns [`RuleIndexError::Persistence`] if the adapter's `load` call fails.
    pub async fn restore(&self) -> Result<(), RuleIndexError> {
        let Some(persistence) = self.persistence.clone() else { return Ok(()) };
        let (rules, groups) = persistence.load().await?;

        {
            let mut groups_map = self.groups_write();
            groups_map.clear();
            for group in groups {
                groups_map.insert(group.id.clone(), group);
            }
        }

        let mut max_version = 0u64;
        {
            let mut rules_map = self.rules_write();
            let mut indexes = self.indexes.write().unwrap_or_else(std::sync::PoisonError::into_inner);
            let mut by_group = self.by_group.write().unwrap_or_else(std::sync::PoisonError::into_inner);
            rules_map.clear();
            indexes.fact = TierIndex::default();
            indexes.event = TierIndex::default();
            indexes.timer = TierIndex::default();
            indexes.temporal.clear();
            indexes.fact_action = TierIndex::default();
            indexes.event_action = TierIndex::default();
            by_group.clear();

            for rule in rules {
                max_version = max_version.max(rule.version);
                indexes.insert_trigger(rule.id.clone(), &rule.trigger);
                indexes.insert_reverse(rule.id.clone(), &rule.actions);
                if let Some(group_id) = &rule.group {
                    by_group.entry(group_id.clone()).or_default().insert(rule.id.clone());
                }
                rules_map.insert(rule.id.clone(), rule);
            }
        }

        self.next_version.store(max_version + 1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::interfaces::NullDiagnosticSink;
    use rules_core::ConditionTree;
    use rules_logic::Requirement;
    use std::collections::BTreeSet;

    fn index() -> RuleIndex {
        RuleIndex::new(Arc::new(ManualClock::new(0)), None, 100, Arc::new(NullDiagnosticSink))
    }

    fn sample_rule(id: &str, priority: i32, trigger: Trigger) -> Rule {
        Rule {
            id: RuleId::new(id),
            name: id.to_string(),
            priority,
            enabled: true,
            tags: BTreeSet::new(),
            group: None,
            trigger,
            requirements: vec![],
            conditions: ConditionTree::and(vec![]),
            actions: vec![RuleAction::SetFact {
                key: "customer:${event.id}:tier".to_string(),
                value: serde_json::json!("vip"),
            }],
            version: 0,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn register_assigns_version_and_timestamps() {
        let idx = index();
        let rule = idx.register_rule(sample_rule("r1", 0, Trigger::Event { topic: "order.paid".to_string() })).unwrap();
        assert_eq!(rule.version, 1);
    }

    #[test]
    fn rejects_registration_against_missing_group() {
        let idx = index();
        let mut rule = sample_rule("r1", 0, Trigger::Event { topic: "order.paid".to_string() });
        rule.group = Some(GroupId::new("missing"));
        assert!(idx.register_rule(rule).is_err());
    }

    #[test]
    fn lookup_by_fact_matches_wildcard_and_sorts_by_priority() {
        let idx = index();
        idx.register_rule(sample_rule("low", 1, Trigger::Fact { pattern: "customer:*:age".to_string() })).unwrap();
        idx.register_rule(sample_rule("high", 5, Trigger::Fact { pattern: "customer:*:age".to_string() })).unwrap();
        let matches = idx.lookup_by_fact("customer:1:age");
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].id, RuleId::new("high"));
    }

    #[test]
    fn disabled_rule_is_excluded_from_lookup() {
        let idx = index();
        idx.register_rule(sample_rule("r1", 0, Trigger::Fact { pattern: "k".to_string() })).unwrap();
        idx.disable_rule(&RuleId::new("r1")).unwrap();
        assert!(idx.lookup_by_fact("k").is_empty());
    }

    #[test]
    fn group_gating_controls_lookup() {
        let idx = index();
        let group = idx.create_group(Group::new(GroupId::new("g1"), "g1", 0));
        let mut rule = sample_rule("r1", 0, Trigger::Fact { pattern: "k".to_string() });
        rule.group = Some(group.id.clone());
        idx.register_rule(rule).unwrap();

        assert_eq!(idx.lookup_by_fact("k").len(), 1);
        idx.disable_group(&group.id).unwrap();
        assert!(idx.lookup_by_fact("k").is_empty());
        idx.enable_group(&group.id).unwrap();
        assert_eq!(idx.lookup_by_fact("k").len(), 1);
    }

    #[test]
    fn deleting_group_clears_rule_group_field() {
        let idx = index();
        let group = idx.create_group(Group::new(GroupId::new("g1"), "g1", 0));
        let mut rule = sample_rule("r1", 0, Trigger::Fact { pattern: "k".to_string() });
        rule.group = Some(group.id.clone());
        idx.register_rule(rule).unwrap();

        idx.delete_group(&group.id).unwrap();
        assert_eq!(idx.get_rule(&RuleId::new("r1")).unwrap().group, None);
    }

    #[test]
    fn reverse_index_normalizes_interpolation_and_tracks_unregister() {
        let idx = index();
        idx.register_rule(sample_rule("r1", 0, Trigger::Event { topic: "order.paid".to_string() })).unwrap();
        assert_eq!(idx.get_by_fact_action("customer:123:tier").len(), 1);
        idx.unregister_rule(&RuleId::new("r1")).unwrap();
        assert!(idx.get_by_fact_action("customer:123:tier").is_empty());
    }

    #[test]
    fn normalize_template_replaces_placeholder_with_wildcard() {
        assert_eq!(normalize_template("customer:${event.id}:tier"), "customer:*:tier");
        assert_eq!(normalize_template("order.created"), "order.created");
    }
}
