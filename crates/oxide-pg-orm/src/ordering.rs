//! Dependency ordering of flattened rows.
//!
//! A row holding a reference is inserted after the row it references. Edges
//! through required references and junction columns are hard; edges through
//! nullable references are soft and are only given up to break a cycle, in
//! which case the reference is inserted as NULL and set afterwards.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use oxide_pg_core::schema::ColumnKind;
use tracing::debug;

use crate::entity::{EntityRef, Relation};
use crate::error::{OrmError, Result};
use crate::flatten::FlatRow;
use crate::key::EntityKey;

/// A nullable reference written after both rows exist.
#[derive(Debug, Clone)]
pub struct DeferredReference {
    /// Row holding the reference.
    pub entity: EntityRef,
    /// Reference column.
    pub column: &'static str,
    /// Referenced row.
    pub target: EntityRef,
}

/// Rows in insertion order plus the references postponed to break cycles.
#[derive(Debug, Default)]
pub struct InsertPlan {
    pub rows: Vec<FlatRow>,
    pub deferred: Vec<DeferredReference>,
}

impl InsertPlan {
    /// Returns true if `column` of `entity` is written after the insert.
    #[must_use]
    pub fn is_deferred(&self, entity: &EntityKey, column: &str) -> bool {
        self.deferred
            .iter()
            .any(|d| d.column == column && d.entity.entity_key() == *entity)
    }
}

#[derive(Debug)]
struct Edge {
    from: usize,
    to: usize,
    /// Reference column on `to`; `None` for junction edges.
    column: Option<&'static str>,
    hard: bool,
    removed: bool,
}

/// Orders `rows` so that referenced rows come first.
///
/// Independent rows keep their relative order.
///
/// # Errors
///
/// Fails with [`OrmError::OrderingCycle`] when required references form a
/// cycle.
pub fn order_rows(rows: Vec<FlatRow>) -> Result<InsertPlan> {
    let positions: HashMap<EntityKey, usize> = rows
        .iter()
        .enumerate()
        .filter_map(|(i, row)| match row {
            FlatRow::Entity(entity) => Some((entity.entity_key(), i)),
            FlatRow::Junction(_) => None,
        })
        .collect();

    let mut edges = Vec::new();
    for (to, row) in rows.iter().enumerate() {
        match row {
            FlatRow::Entity(entity) => {
                for column in entity.descriptor().columns {
                    if !matches!(column.kind, ColumnKind::Reference(_)) {
                        continue;
                    }
                    let Relation::One(Some(target)) = entity.relation(column.name) else {
                        continue;
                    };
                    if let Some(&from) = positions.get(&target.entity_key()) {
                        if from != to {
                            edges.push(Edge {
                                from,
                                to,
                                column: Some(column.name),
                                hard: !column.nullable,
                                removed: false,
                            });
                        }
                    }
                }
            }
            FlatRow::Junction(junction) => {
                for key in [junction.owner_key(), junction.member_key()] {
                    if let Some(&from) = positions.get(&key) {
                        edges.push(Edge {
                            from,
                            to,
                            column: None,
                            hard: true,
                            removed: false,
                        });
                    }
                }
            }
        }
    }

    let mut incoming = vec![Vec::new(); rows.len()];
    let mut outgoing = vec![Vec::new(); rows.len()];
    for (i, edge) in edges.iter().enumerate() {
        incoming[edge.to].push(i);
        outgoing[edge.from].push(i);
    }
    let mut in_degree: Vec<usize> = incoming.iter().map(Vec::len).collect();
    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut emitted = vec![false; rows.len()];
    let mut order = Vec::with_capacity(rows.len());
    let mut deferred = Vec::new();

    while order.len() < rows.len() {
        let Some(Reverse(next)) = ready.pop() else {
            let Some(candidate) = cycle_breaker(&edges, &incoming, &outgoing, &emitted) else {
                return Err(cycle_error(&rows, &emitted));
            };
            for &e in &incoming[candidate] {
                let edge = &mut edges[e];
                if edge.removed {
                    continue;
                }
                edge.removed = true;
                in_degree[candidate] -= 1;
                if let (FlatRow::Entity(entity), FlatRow::Entity(target), Some(column)) =
                    (&rows[candidate], &rows[edge.from], edge.column)
                {
                    debug!(entity = %entity.entity_key(), column, "deferring nullable reference");
                    deferred.push(DeferredReference {
                        entity: entity.clone(),
                        column,
                        target: target.clone(),
                    });
                }
            }
            ready.push(Reverse(candidate));
            continue;
        };
        if emitted[next] {
            continue;
        }
        emitted[next] = true;
        order.push(next);
        for &e in &outgoing[next] {
            let edge = &mut edges[e];
            if edge.removed {
                continue;
            }
            edge.removed = true;
            in_degree[edge.to] -= 1;
            if in_degree[edge.to] == 0 {
                ready.push(Reverse(edge.to));
            }
        }
    }

    let mut slots: Vec<Option<FlatRow>> = rows.into_iter().map(Some).collect();
    let rows = order.into_iter().filter_map(|i| slots[i].take()).collect();
    Ok(InsertPlan { rows, deferred })
}

/// First row of a cycle whose remaining incoming edges are all soft.
///
/// Only components that no other pending row feeds into are considered, so
/// a row that merely references a cycle still waits for it.
fn cycle_breaker(
    edges: &[Edge],
    incoming: &[Vec<usize>],
    outgoing: &[Vec<usize>],
    emitted: &[bool],
) -> Option<usize> {
    let component = components(edges, incoming, outgoing, emitted);
    let count = component.iter().flatten().max().map_or(0, |c| c + 1);
    let mut size = vec![0_usize; count];
    for &c in component.iter().flatten() {
        size[c] += 1;
    }
    let mut entered = vec![false; count];
    for edge in edges.iter().filter(|edge| !edge.removed) {
        if let (Some(from), Some(to)) = (component[edge.from], component[edge.to]) {
            if from != to {
                entered[to] = true;
            }
        }
    }

    (0..emitted.len()).find(|&i| {
        component[i].is_some_and(|c| size[c] > 1 && !entered[c])
            && incoming[i]
                .iter()
                .all(|&e| edges[e].removed || !edges[e].hard)
    })
}

/// Strongly connected components of the pending rows over the remaining
/// edges (Kosaraju). Emitted rows have no component.
fn components(
    edges: &[Edge],
    incoming: &[Vec<usize>],
    outgoing: &[Vec<usize>],
    emitted: &[bool],
) -> Vec<Option<usize>> {
    let n = emitted.len();
    let mut visited = emitted.to_vec();
    let mut finished = Vec::with_capacity(n);
    for start in 0..n {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        let mut stack = vec![(start, 0_usize)];
        while let Some(frame) = stack.last_mut() {
            let node = frame.0;
            if let Some(&e) = outgoing[node].get(frame.1) {
                frame.1 += 1;
                let edge = &edges[e];
                if !edge.removed && !visited[edge.to] {
                    visited[edge.to] = true;
                    stack.push((edge.to, 0));
                }
            } else {
                finished.push(node);
                stack.pop();
            }
        }
    }

    let mut component = vec![None; n];
    let mut count = 0;
    for &start in finished.iter().rev() {
        if component[start].is_some() {
            continue;
        }
        component[start] = Some(count);
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            for &e in &incoming[node] {
                let edge = &edges[e];
                if !edge.removed && component[edge.from].is_none() {
                    component[edge.from] = Some(count);
                    stack.push(edge.from);
                }
            }
        }
        count += 1;
    }
    component
}

fn cycle_error(rows: &[FlatRow], emitted: &[bool]) -> OrmError {
    let pending: Vec<String> = rows
        .iter()
        .zip(emitted)
        .filter(|(_, emitted)| !**emitted)
        .map(|(row, _)| match row {
            FlatRow::Entity(entity) => entity.entity_key().to_string(),
            FlatRow::Junction(junction) => junction.table_id().to_string(),
        })
        .collect();
    OrmError::OrderingCycle(pending.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use crate::fixtures::{entity, Row, ACCOUNT, LOOP, PERSON};
    use crate::flatten::flatten;

    fn keys(plan: &InsertPlan) -> Vec<String> {
        plan.rows
            .iter()
            .map(|row| match row {
                FlatRow::Entity(e) => e.entity_key().to_string(),
                FlatRow::Junction(j) => j.table.name(),
            })
            .collect()
    }

    #[test]
    fn test_referenced_rows_come_first() {
        let ann = Row::new(&PERSON, 1);
        let account = Row::new(&ACCOUNT, 10);
        account.link("owner", &ann);
        let plan = order_rows(flatten(&[entity(&account)])).unwrap();
        assert_eq!(
            keys(&plan),
            vec![r#""crm"."person"[1]"#, r#""crm"."account"[10]"#]
        );
        assert!(plan.deferred.is_empty());
    }

    #[test]
    fn test_junction_rows_follow_both_sides() {
        let ann = Row::new(&PERSON, 1);
        let bob = Row::new(&PERSON, 2);
        ann.push("friends", &bob);
        let plan = order_rows(flatten(&[entity(&ann)])).unwrap();
        assert_eq!(
            keys(&plan),
            vec![r#""crm"."person"[1]"#, r#""crm"."person"[2]"#, "person_friends"]
        );
    }

    #[test]
    fn test_independent_rows_keep_order() {
        let rows: Vec<_> = (1..=4).map(|i| Row::new(&PERSON, i)).collect();
        let roots: Vec<_> = rows.iter().map(entity).collect();
        let plan = order_rows(flatten(&roots)).unwrap();
        assert_eq!(
            keys(&plan),
            (1..=4)
                .map(|i| format!(r#""crm"."person"[{i}]"#))
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_nullable_cycle_is_deferred() {
        let ann = Row::new(&PERSON, 1);
        let bob = Row::new(&PERSON, 2);
        ann.link("manager", &bob);
        bob.link("manager", &ann);
        let plan = order_rows(flatten(&[entity(&ann)])).unwrap();

        assert_eq!(
            keys(&plan),
            vec![r#""crm"."person"[1]"#, r#""crm"."person"[2]"#]
        );
        assert_eq!(plan.deferred.len(), 1);
        let deferred = &plan.deferred[0];
        assert_eq!(deferred.entity.entity_key(), ann.entity_key());
        assert_eq!(deferred.target.entity_key(), bob.entity_key());
        assert!(plan.is_deferred(&ann.entity_key(), "manager"));
        assert!(!plan.is_deferred(&bob.entity_key(), "manager"));
    }

    #[test]
    fn test_reference_into_a_cycle_is_not_deferred() {
        let ann = Row::new(&PERSON, 1);
        let bob = Row::new(&PERSON, 2);
        let carol = Row::new(&PERSON, 3);
        carol.link("manager", &ann);
        ann.link("manager", &bob);
        bob.link("manager", &ann);
        let plan = order_rows(flatten(&[entity(&carol)])).unwrap();

        assert_eq!(
            keys(&plan),
            vec![
                r#""crm"."person"[1]"#,
                r#""crm"."person"[3]"#,
                r#""crm"."person"[2]"#
            ]
        );
        assert_eq!(plan.deferred.len(), 1);
        assert!(plan.is_deferred(&ann.entity_key(), "manager"));
        assert!(!plan.is_deferred(&carol.entity_key(), "manager"));
    }

    #[test]
    fn test_required_cycle_fails() {
        let x = Row::new(&LOOP, 1);
        let y = Row::new(&LOOP, 2);
        x.link("next", &y);
        y.link("next", &x);
        let err = order_rows(flatten(&[entity(&x)])).unwrap_err();
        assert!(matches!(
            err,
            OrmError::OrderingCycle(ref rows) if rows == r#""crm"."loop"[1], "crm"."loop"[2]"#
        ));
    }
}
