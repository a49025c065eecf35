//! # Teardown order.
//!
//! ```text
//! 1. group by priority, highest first (registration order inside a group)
//! 2. inside a group, a.dependencies ∋ b  ⇒  b before a   (Kahn, lowest index first)
//! ```
//!
//! Priority always wins: a dependency on a *lower*-priority component cannot be
//! honoured and is only reported. Unknown dependency names are ignored.
//! Cycles are rejected at registration by [`find_cycle`], so step 2 always
//! drains its group.

use std::collections::{BTreeMap, HashMap};

use super::component::ComponentRegistration;

/// Indices into `regs`, in teardown order.
pub(crate) fn teardown_order(regs: &[ComponentRegistration]) -> Vec<usize> {
    let index: HashMap<&str, usize> = regs
        .iter()
        .enumerate()
        .map(|(i, r)| (r.name.as_str(), i))
        .collect();

    for r in regs {
        for dep in &r.dependencies {
            if let Some(&j) = index.get(dep.as_str()) {
                if regs[j].priority < r.priority {
                    tracing::warn!(
                        component = %r.name,
                        dependency = %dep,
                        "dependency has lower priority and will shut down later"
                    );
                }
            }
        }
    }

    let mut bands: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    for (i, r) in regs.iter().enumerate() {
        bands.entry(r.priority).or_default().push(i);
    }

    let mut order = Vec::with_capacity(regs.len());
    for (_, band) in bands.into_iter().rev() {
        order_band(regs, &index, &band, &mut order);
    }
    order
}

fn order_band(
    regs: &[ComponentRegistration],
    index: &HashMap<&str, usize>,
    band: &[usize],
    out: &mut Vec<usize>,
) {
    let priority = regs[band[0]].priority;
    let same_band = |name: &str| index.get(name).copied().filter(|&j| regs[j].priority == priority);

    // pending[i] = in-band dependencies of i not yet emitted
    let mut pending: HashMap<usize, usize> = band
        .iter()
        .map(|&i| {
            let n = regs[i]
                .dependencies
                .iter()
                .filter(|d| same_band(d.as_str()).is_some())
                .count();
            (i, n)
        })
        .collect();

    let mut left: Vec<usize> = band.to_vec();
    while !left.is_empty() {
        let pos = left
            .iter()
            .position(|i| pending.get(i).copied().unwrap_or(0) == 0)
            .unwrap_or(0);
        let next = left.remove(pos);
        out.push(next);

        let name = regs[next].name.as_str();
        for &i in &left {
            if regs[i].dependencies.contains(name) {
                if let Some(n) = pending.get_mut(&i) {
                    *n = n.saturating_sub(1);
                }
            }
        }
    }
}

/// Returns a dependency cycle through `candidate` if adding it would create one.
///
/// The path starts and ends with the same name (`a -> b -> a`).
pub(crate) fn find_cycle(
    regs: &[ComponentRegistration],
    candidate: &ComponentRegistration,
) -> Option<Vec<String>> {
    let mut deps: HashMap<&str, Vec<&str>> = regs
        .iter()
        .map(|r| (r.name.as_str(), r.dependencies.iter().map(String::as_str).collect()))
        .collect();
    deps.insert(
        candidate.name.as_str(),
        candidate.dependencies.iter().map(String::as_str).collect(),
    );

    let mut path = vec![candidate.name.as_str()];
    if walk(&deps, candidate.name.as_str(), &mut path) {
        Some(path.into_iter().map(str::to_string).collect())
    } else {
        None
    }
}

fn walk<'a>(deps: &HashMap<&'a str, Vec<&'a str>>, target: &str, path: &mut Vec<&'a str>) -> bool {
    let Some(&current) = path.last() else {
        return false;
    };
    let Some(next) = deps.get(current) else {
        return false;
    };
    for &dep in next {
        if dep == target {
            path.push(dep);
            return true;
        }
        if path.contains(&dep) {
            continue;
        }
        path.push(dep);
        if walk(deps, target, path) {
            return true;
        }
        path.pop();
    }
    false
}
