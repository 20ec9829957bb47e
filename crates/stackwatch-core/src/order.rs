//! Startup ordering.
//!
//! Services declare their dependencies by name. The planner flattens the
//! dependency DAG into a total order using Kahn's algorithm; when several
//! services are ready at once, declaration order wins, so an already
//! well-ordered list is returned unchanged.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::types::ServiceSpec;

/// Order `specs` so that every service comes after its dependencies.
///
/// Fails on duplicate names, unknown or self dependencies, and cycles.
pub fn plan_startup_order(specs: &[ServiceSpec]) -> ConfigResult<Vec<ServiceSpec>> {
    if specs.is_empty() {
        return Err(ConfigError::NoServices);
    }

    let mut index: HashMap<&str, usize> = HashMap::with_capacity(specs.len());
    for (i, spec) in specs.iter().enumerate() {
        if index.insert(spec.name.as_str(), i).is_some() {
            return Err(ConfigError::DuplicateService(spec.name.clone()));
        }
    }

    // in_degree[i] = number of unresolved dependencies of specs[i].
    let mut in_degree = vec![0usize; specs.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); specs.len()];

    for (i, spec) in specs.iter().enumerate() {
        let mut seen = HashSet::new();
        for dep in &spec.depends_on {
            if !seen.insert(dep.as_str()) {
                continue;
            }
            let Some(&d) = index.get(dep.as_str()) else {
                return Err(ConfigError::UnknownDependency {
                    service: spec.name.clone(),
                    dependency: dep.clone(),
                });
            };
            if d == i {
                return Err(ConfigError::DependencyCycle(vec![spec.name.clone()]));
            }
            in_degree[i] += 1;
            dependents[d].push(i);
        }
    }

    let mut placed = vec![false; specs.len()];
    let mut ordered = Vec::with_capacity(specs.len());

    while ordered.len() < specs.len() {
        let Some(next) = (0..specs.len()).find(|&i| !placed[i] && in_degree[i] == 0) else {
            // Unplaced services that merely depend on a cycle are left out.
            let cycle = (0..specs.len())
                .filter(|&i| !placed[i] && reaches_itself(i, &dependents, &placed))
                .map(|i| specs[i].name.clone())
                .collect();
            return Err(ConfigError::DependencyCycle(cycle));
        };

        placed[next] = true;
        for &dependent in &dependents[next] {
            in_degree[dependent] -= 1;
        }
        ordered.push(specs[next].clone());
    }

    debug!(
        order = ?ordered.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
        "planned startup order"
    );

    Ok(ordered)
}

/// Whether `start` lies on a cycle among the unplaced services.
fn reaches_itself(start: usize, dependents: &[Vec<usize>], placed: &[bool]) -> bool {
    let mut visited = vec![false; dependents.len()];
    let mut stack = vec![start];
    while let Some(node) = stack.pop() {
        for &next in &dependents[node] {
            if next == start {
                return true;
            }
            if !placed[next] && !visited[next] {
                visited[next] = true;
                stack.push(next);
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Probe;

    fn svc(name: &str, deps: &[&str]) -> ServiceSpec {
        ServiceSpec::new(
            name,
            Probe::Tcp {
                address: "localhost:1".into(),
            },
        )
        .depends_on(deps)
    }

    fn names(specs: &[ServiceSpec]) -> Vec<&str> {
        specs.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn well_ordered_list_is_unchanged() {
        let specs = vec![
            svc("postgres", &[]),
            svc("redis", &[]),
            svc("app", &["postgres", "redis"]),
            svc("prometheus", &["app"]),
        ];
        let ordered = plan_startup_order(&specs).unwrap();
        assert_eq!(names(&ordered), ["postgres", "redis", "app", "prometheus"]);
    }

    #[test]
    fn dependencies_are_moved_first() {
        let specs = vec![
            svc("grafana", &["prometheus"]),
            svc("app", &["postgres"]),
            svc("prometheus", &["app"]),
            svc("postgres", &[]),
        ];
        let ordered = plan_startup_order(&specs).unwrap();
        assert_eq!(names(&ordered), ["postgres", "app", "prometheus", "grafana"]);
    }

    #[test]
    fn independent_services_keep_declaration_order() {
        let specs = vec![svc("c", &[]), svc("a", &[]), svc("b", &[])];
        let ordered = plan_startup_order(&specs).unwrap();
        assert_eq!(names(&ordered), ["c", "a", "b"]);
    }

    #[test]
    fn duplicate_dependency_counts_once() {
        let specs = vec![svc("db", &[]), svc("app", &["db", "db"])];
        let ordered = plan_startup_order(&specs).unwrap();
        assert_eq!(names(&ordered), ["db", "app"]);
    }

    #[test]
    fn cycle_is_reported() {
        let specs = vec![
            svc("postgres", &[]),
            svc("a", &["b"]),
            svc("b", &["c"]),
            svc("c", &["a"]),
        ];
        match plan_startup_order(&specs) {
            Err(ConfigError::DependencyCycle(members)) => {
                assert_eq!(members, ["a", "b", "c"]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn cycle_excludes_services_that_only_depend_on_it() {
        let specs = vec![
            svc("d", &["a"]),
            svc("a", &["b"]),
            svc("b", &["c"]),
            svc("c", &["a"]),
            svc("e", &["d"]),
        ];
        match plan_startup_order(&specs) {
            Err(ConfigError::DependencyCycle(members)) => {
                assert_eq!(members, ["a", "b", "c"]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let specs = vec![svc("app", &["app"])];
        assert!(matches!(
            plan_startup_order(&specs),
            Err(ConfigError::DependencyCycle(_))
        ));
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let specs = vec![svc("app", &["mysql"])];
        match plan_startup_order(&specs) {
            Err(ConfigError::UnknownDependency {
                service,
                dependency,
            }) => {
                assert_eq!(service, "app");
                assert_eq!(dependency, "mysql");
            }
            other => panic!("expected unknown dependency, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let specs = vec![svc("app", &[]), svc("app", &[])];
        assert!(matches!(
            plan_startup_order(&specs),
            Err(ConfigError::DuplicateService(_))
        ));
    }

    #[test]
    fn empty_list_is_rejected() {
        assert!(matches!(
            plan_startup_order(&[]),
            Err(ConfigError::NoServices)
        ));
    }
}
