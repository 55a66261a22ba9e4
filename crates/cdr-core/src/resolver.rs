//! Dependency resolution: turns a tier's rules into an execution order.
//!
//! Rules are ordered with Kahn's algorithm. Among rules whose dependencies
//! are all satisfied, the lexically smallest id runs first, so the same
//! rule set always produces the same plan.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use cdr_model::{RuleDescriptor, RuleId, Tier};
use tracing::debug;

use crate::error::{CleanError, Result};

/// Ordered list of rules for one tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    tier: Tier,
    rules: Vec<RuleDescriptor>,
}

impl ExecutionPlan {
    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// Descriptors in execution order.
    pub fn rules(&self) -> &[RuleDescriptor] {
        &self.rules
    }

    pub fn rule_ids(&self) -> Vec<&RuleId> {
        self.rules.iter().map(|rule| &rule.rule_id).collect()
    }

    /// Zero-based position of `rule_id` in the plan.
    pub fn position(&self, rule_id: &str) -> Option<usize> {
        self.rules
            .iter()
            .position(|rule| rule.rule_id.as_str() == rule_id)
    }

    pub fn contains(&self, rule_id: &str) -> bool {
        self.position(rule_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Order `descriptors` so every rule runs after the rules it depends on.
///
/// Every descriptor is expected to apply to `tier`; dependencies must be
/// among `descriptors`.
///
/// # Errors
///
/// - [`CleanError::Configuration`] for duplicate rule ids
/// - [`CleanError::UnresolvedDependency`] for a dependency outside the set
/// - [`CleanError::CyclicDependency`] when the dependencies form a cycle
pub fn resolve<'a>(
    tier: Tier,
    descriptors: impl IntoIterator<Item = &'a RuleDescriptor>,
) -> Result<ExecutionPlan> {
    let mut by_id: BTreeMap<&RuleId, &RuleDescriptor> = BTreeMap::new();
    for descriptor in descriptors {
        if by_id.insert(&descriptor.rule_id, descriptor).is_some() {
            return Err(CleanError::configuration(
                descriptor.rule_id.as_str(),
                "rule id appears more than once",
            ));
        }
    }

    for descriptor in by_id.values() {
        if let Some(missing) = descriptor
            .depends_on
            .iter()
            .find(|dependency| !by_id.contains_key(dependency))
        {
            return Err(CleanError::UnresolvedDependency {
                rule_id: descriptor.rule_id.clone(),
                missing: missing.clone(),
            });
        }
    }

    // Indices follow id order, so a min-heap of indices is a min-heap of ids.
    let nodes: Vec<&RuleDescriptor> = by_id.values().copied().collect();
    let index: BTreeMap<&RuleId, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, descriptor)| (&descriptor.rule_id, i))
        .collect();

    let n = nodes.len();
    let mut in_degree = vec![0usize; n];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, descriptor) in nodes.iter().enumerate() {
        for dependency in &descriptor.depends_on {
            dependents[index[dependency]].push(i);
            in_degree[i] += 1;
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = (0..n)
        .filter(|&i| in_degree[i] == 0)
        .map(Reverse)
        .collect();
    let mut order = Vec::with_capacity(n);
    while let Some(Reverse(node)) = ready.pop() {
        order.push(node);
        for &dependent in &dependents[node] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.push(Reverse(dependent));
            }
        }
    }

    if order.len() != n {
        let cycle = find_cycle(&nodes, &index, &in_degree);
        let rule_id = cycle
            .first()
            .cloned()
            .unwrap_or_else(|| nodes[0].rule_id.clone());
        return Err(CleanError::CyclicDependency { rule_id, cycle });
    }

    let rules: Vec<RuleDescriptor> = order.into_iter().map(|i| nodes[i].clone()).collect();
    debug!(
        tier = %tier,
        rules = rules.len(),
        order = ?rules.iter().map(|rule| rule.rule_id.as_str()).collect::<Vec<_>>(),
        "resolved execution plan"
    );
    Ok(ExecutionPlan { tier, rules })
}

/// Walk dependency edges among the rules Kahn's algorithm could not place.
///
/// Each unplaced rule has at least one unplaced dependency, so following
/// the smallest such dependency from the smallest unplaced rule must revisit
/// a rule. The returned cycle starts at its smallest member and lists each
/// rule followed by one of its dependencies.
fn find_cycle(
    nodes: &[&RuleDescriptor],
    index: &BTreeMap<&RuleId, usize>,
    in_degree: &[usize],
) -> Vec<RuleId> {
    let unplaced = |i: usize| in_degree[i] > 0;
    let Some(start) = (0..nodes.len()).find(|&i| unplaced(i)) else {
        return Vec::new();
    };

    let mut path: Vec<usize> = Vec::new();
    let mut seen_at: BTreeMap<usize, usize> = BTreeMap::new();
    let mut current = start;
    while !seen_at.contains_key(&current) {
        seen_at.insert(current, path.len());
        path.push(current);
        let next = nodes[current]
            .depends_on
            .iter()
            .map(|dependency| index[dependency])
            .find(|&i| unplaced(i));
        match next {
            Some(next) => current = next,
            None => break,
        }
    }

    let from = seen_at.get(&current).copied().unwrap_or(0);
    let mut cycle: Vec<usize> = path[from..].to_vec();
    if let Some(min_pos) = cycle
        .iter()
        .enumerate()
        .min_by_key(|(_, node)| **node)
        .map(|(pos, _)| pos)
    {
        cycle.rotate_left(min_pos);
    }
    cycle
        .into_iter()
        .map(|i| nodes[i].rule_id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: &str, deps: &[&str]) -> RuleDescriptor {
        RuleDescriptor::new(RuleId::new(id).unwrap(), "test rule")
            .with_tiers([Tier::Combined])
            .depends_on(deps.iter().map(|dep| RuleId::new(*dep).unwrap()))
    }

    #[test]
    fn empty_set_gives_empty_plan() {
        let plan = resolve(Tier::Combined, std::iter::empty()).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.tier(), Tier::Combined);
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let rules = [rule("a", &["a"])];
        let err = resolve(Tier::Combined, &rules).unwrap_err();
        let CleanError::CyclicDependency { rule_id, cycle } = err else {
            panic!("expected cycle, got {err:?}");
        };
        assert_eq!(rule_id.as_str(), "a");
        assert_eq!(cycle.len(), 1);
    }

    #[test]
    fn cycle_path_is_reported_from_smallest_member() {
        let rules = [
            rule("a", &[]),
            rule("b", &["d"]),
            rule("c", &["b"]),
            rule("d", &["c", "a"]),
        ];
        let err = resolve(Tier::Combined, &rules).unwrap_err();
        let CleanError::CyclicDependency { rule_id, cycle } = err else {
            panic!("expected cycle, got {err:?}");
        };
        assert_eq!(rule_id.as_str(), "b");
        let names: Vec<&str> = cycle.iter().map(RuleId::as_str).collect();
        assert_eq!(names, ["b", "d", "c"]);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let rules = [rule("a", &[]), rule("a", &[])];
        assert!(matches!(
            resolve(Tier::Combined, &rules),
            Err(CleanError::Configuration { .. })
        ));
    }
}
