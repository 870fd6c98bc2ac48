//! Dependency-aware ordering of fetched objects.
//!
//! Both sorts are Kahn's algorithm with ties broken by the original
//! position, so the result is deterministic. When only cycles remain, the
//! lowest-positioned member of one cycle is released and sorting resumes,
//! so objects that merely depend on a cycle still follow their parents.

use std::collections::{BTreeSet, HashMap};

use regex::RegexBuilder;

use crate::core::{ScriptDbObject, Table, TableForeignKey};

/// Order `nodes` so every node comes after the nodes in its `deps` list.
///
/// `deps[i]` holds indices that must precede `i`; self edges are ignored.
/// Returns a permutation of `0..deps.len()`.
fn kahn_order(deps: &[BTreeSet<usize>]) -> Vec<usize> {
    let n = deps.len();
    let mut pending: Vec<usize> = deps
        .iter()
        .enumerate()
        .map(|(i, d)| d.iter().filter(|&&p| p != i).count())
        .collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, d) in deps.iter().enumerate() {
        for &p in d {
            if p != i {
                dependents[p].push(i);
            }
        }
    }

    let mut ready: BTreeSet<usize> = (0..n).filter(|&i| pending[i] == 0).collect();
    let mut placed = vec![false; n];
    let mut order = Vec::with_capacity(n);

    while order.len() < n {
        let next = match ready.pop_first() {
            Some(next) => next,
            None => match cycle_member(deps, &placed) {
                Some(next) => next,
                None => break,
            },
        };
        placed[next] = true;
        order.push(next);
        for &child in &dependents[next] {
            pending[child] = pending[child].saturating_sub(1);
            if pending[child] == 0 && !placed[child] {
                ready.insert(child);
            }
        }
    }
    order
}

/// Lowest-index member of a cycle among the unplaced nodes.
///
/// Every unplaced node has an unplaced dependency once Kahn stalls, so
/// following the first one from the lowest unplaced node must revisit a
/// node; the revisited stretch of the path is a cycle.
fn cycle_member(deps: &[BTreeSet<usize>], placed: &[bool]) -> Option<usize> {
    let mut current = (0..deps.len()).find(|&i| !placed[i])?;
    let mut path: Vec<usize> = Vec::new();
    loop {
        if let Some(start) = path.iter().position(|&p| p == current) {
            return path[start..].iter().copied().min();
        }
        path.push(current);
        let from = current;
        current = deps[from]
            .iter()
            .copied()
            .find(|&p| p != from && !placed[p])?;
    }
}

fn apply_order<T>(items: &mut Vec<T>, order: &[usize]) {
    let mut slots: Vec<Option<T>> = items.drain(..).map(Some).collect();
    for &i in order {
        if let Some(item) = slots[i].take() {
            items.push(item);
        }
    }
}

fn table_key(owner: &str, name: &str) -> (String, String) {
    (owner.to_lowercase(), name.to_lowercase())
}

/// Put referenced tables before the tables whose foreign keys point at them.
///
/// References to tables outside `tables` and self references are ignored.
/// `order` is renumbered 1..N afterwards.
pub fn resort_tables(tables: &mut Vec<Table>, foreign_keys: &[TableForeignKey]) {
    let index: HashMap<(String, String), usize> = tables
        .iter()
        .enumerate()
        .map(|(i, t)| (table_key(&t.owner, &t.name), i))
        .collect();
    // Catalogs that do not report owners still match on the bare name.
    let by_name: HashMap<String, usize> = tables
        .iter()
        .enumerate()
        .map(|(i, t)| (t.name.to_lowercase(), i))
        .collect();
    let lookup = |owner: &str, name: &str| {
        if owner.is_empty() {
            by_name.get(&name.to_lowercase()).copied()
        } else {
            index.get(&table_key(owner, name)).copied()
        }
    };

    let mut deps = vec![BTreeSet::new(); tables.len()];
    for fk in foreign_keys {
        let (Some(child), Some(parent)) = (
            lookup(&fk.owner, &fk.table_name),
            lookup(&fk.referenced_owner, &fk.referenced_table_name),
        ) else {
            continue;
        };
        if child != parent {
            deps[child].insert(parent);
        }
    }

    let order = kahn_order(&deps);
    apply_order(tables, &order);
    for (i, table) in tables.iter_mut().enumerate() {
        table.order = i as i32 + 1;
    }
}

/// Put objects referenced by name in another object's definition first.
///
/// A reference is the object's name appearing as a whole word, case
/// insensitive. Best effort: names inside comments or strings count too.
pub fn resort_by_definition<T: ScriptDbObject>(objects: &mut Vec<T>) {
    let patterns: Vec<Option<regex::Regex>> = objects
        .iter()
        .map(|o| {
            RegexBuilder::new(&format!(r"\b{}\b", regex::escape(o.name())))
                .case_insensitive(true)
                .build()
                .ok()
        })
        .collect();

    let deps: Vec<BTreeSet<usize>> = objects
        .iter()
        .enumerate()
        .map(|(i, o)| {
            patterns
                .iter()
                .enumerate()
                .filter(|(j, p)| {
                    *j != i
                        && !objects[*j].name().eq_ignore_ascii_case(o.name())
                        && p.as_ref().is_some_and(|re| re.is_match(o.definition()))
                })
                .map(|(j, _)| j)
                .collect()
        })
        .collect();

    let order = kahn_order(&deps);
    apply_order(objects, &order);
    for (i, object) in objects.iter_mut().enumerate() {
        object.set_order(i as i32 + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ScriptObject;

    fn fk(table: &str, referenced: &str) -> TableForeignKey {
        TableForeignKey {
            owner: "dbo".into(),
            table_name: table.into(),
            name: format!("FK_{}_{}", table, referenced),
            column_name: format!("{}Id", referenced),
            referenced_owner: "dbo".into(),
            referenced_table_name: referenced.into(),
            referenced_column_name: "Id".into(),
            ..TableForeignKey::default()
        }
    }

    fn names(tables: &[Table]) -> Vec<&str> {
        tables.iter().map(|t| t.name.as_str()).collect()
    }

    fn view(name: &str, definition: &str) -> ScriptObject {
        ScriptObject {
            owner: "dbo".into(),
            name: name.into(),
            definition: definition.into(),
            order: 0,
        }
    }

    #[test]
    fn test_parents_first() {
        let mut tables = vec![
            Table::new("dbo", "OrderLine"),
            Table::new("dbo", "Order"),
            Table::new("dbo", "Customer"),
        ];
        let fks = vec![fk("OrderLine", "Order"), fk("Order", "Customer")];
        resort_tables(&mut tables, &fks);
        assert_eq!(names(&tables), vec!["Customer", "Order", "OrderLine"]);
        assert_eq!(tables[2].order, 3);
    }

    #[test]
    fn test_independent_tables_keep_original_order() {
        let mut tables = vec![
            Table::new("dbo", "B"),
            Table::new("dbo", "A"),
            Table::new("dbo", "C"),
        ];
        resort_tables(&mut tables, &[]);
        assert_eq!(names(&tables), vec!["B", "A", "C"]);
    }

    #[test]
    fn test_cycle_keeps_relative_order() {
        let mut tables = vec![
            Table::new("dbo", "X"),
            Table::new("dbo", "Y"),
            Table::new("dbo", "Free"),
        ];
        let fks = vec![fk("X", "Y"), fk("Y", "X")];
        resort_tables(&mut tables, &fks);
        assert_eq!(names(&tables), vec!["Free", "X", "Y"]);
    }

    #[test]
    fn test_dependents_of_a_cycle_follow_it() {
        let mut tables = vec![
            Table::new("dbo", "Child"),
            Table::new("dbo", "X"),
            Table::new("dbo", "Y"),
        ];
        let fks = vec![fk("Child", "X"), fk("X", "Y"), fk("Y", "X")];
        resort_tables(&mut tables, &fks);
        let order = names(&tables);
        let at = |name: &str| order.iter().position(|n| *n == name).unwrap();
        assert!(at("X") < at("Child"));
        assert!(at("X") < at("Y"));
        assert_eq!(order, vec!["X", "Child", "Y"]);
    }

    #[test]
    fn test_two_cycles_with_a_bridge() {
        let mut tables = vec![
            Table::new("dbo", "D"),
            Table::new("dbo", "C"),
            Table::new("dbo", "B"),
            Table::new("dbo", "A"),
        ];
        // A <-> B, C <-> D, and C also needs A.
        let fks = vec![
            fk("A", "B"),
            fk("B", "A"),
            fk("C", "D"),
            fk("D", "C"),
            fk("C", "A"),
        ];
        resort_tables(&mut tables, &fks);
        let order = names(&tables);
        assert_eq!(order.len(), 4);
        let at = |name: &str| order.iter().position(|n| *n == name).unwrap();
        assert!(at("A") < at("C"));
    }

    #[test]
    fn test_self_and_external_references_ignored() {
        let mut tables = vec![Table::new("dbo", "Employee"), Table::new("dbo", "Dept")];
        let fks = vec![fk("Employee", "Employee"), fk("Employee", "Elsewhere")];
        resort_tables(&mut tables, &fks);
        assert_eq!(names(&tables), vec!["Employee", "Dept"]);
    }

    #[test]
    fn test_views_referenced_first() {
        let mut views = vec![
            view("vTop", "CREATE VIEW vTop AS SELECT * FROM vBase"),
            view("vBase", "CREATE VIEW vBase AS SELECT * FROM T"),
            view("vBaseline", "CREATE VIEW vBaseline AS SELECT 1 AS x"),
        ];
        resort_by_definition(&mut views);
        let order: Vec<&str> = views.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(order, vec!["vBase", "vTop", "vBaseline"]);
        assert_eq!(views[0].order, 1);
    }

    #[test]
    fn test_word_boundary_only() {
        let mut views = vec![
            view("vA", "CREATE VIEW vA AS SELECT * FROM vAB"),
            view("vAB", "CREATE VIEW vAB AS SELECT 1 AS x"),
            view("v", "CREATE VIEW v AS SELECT 2 AS y"),
        ];
        resort_by_definition(&mut views);
        let order: Vec<&str> = views.iter().map(|v| v.name.as_str()).collect();
        // vA mentions "v" only as part of longer words.
        assert_eq!(order, vec!["vAB", "vA", "v"]);
    }
}
