//! Cost-based dynamic-programming query planner.
//!
//! Strategy: build the triple graph (nodes are triples, edges shared
//! variables), collapse text cliques into synthetic text nodes, then
//! enumerate connected join plans of increasing size in a DP table. Row k
//! holds every surviving plan covering exactly k graph nodes; plans that
//! agree on the pruning key (sort order plus covered nodes) are collapsed
//! to the cheapest representative. Filters are applied eagerly as soon as
//! a plan covers their variables.

use crate::error::{QueryError, Result};
use crate::exec_tree::{
    join_variable_columns, score_variable, IndexScan, Operation, OperationKind,
    QueryExecutionTree, ScanKind,
};
use crate::parsed::{is_variable, ParsedQuery, SparqlFilter};
use crate::triple_graph::{TripleGraph, TripleGraphNode};
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use tessera_core::Index;
use tracing::debug;

/// A partial plan: the tree built so far plus the triple-graph nodes and
/// filters it has incorporated. Size and cost estimates are cached at
/// construction.
#[derive(Clone, Debug)]
pub struct SubtreePlan {
    pub qet: Arc<QueryExecutionTree>,
    pub included_nodes: BTreeSet<usize>,
    pub included_filters: BTreeSet<usize>,
    cost: usize,
    size: usize,
}

impl SubtreePlan {
    fn new(
        tree: QueryExecutionTree,
        included_nodes: BTreeSet<usize>,
        included_filters: BTreeSet<usize>,
    ) -> SubtreePlan {
        let cost = tree.cost_estimate();
        let size = tree.size_estimate();
        SubtreePlan {
            qet: Arc::new(tree),
            included_nodes,
            included_filters,
            cost,
            size,
        }
    }

    pub fn cost_estimate(&self) -> usize {
        self.cost
    }

    pub fn size_estimate(&self) -> usize {
        self.size
    }
}

/// Turns a parsed query into an executable operator tree.
pub struct QueryPlanner<'a> {
    index: &'a Index,
}

impl<'a> QueryPlanner<'a> {
    pub fn new(index: &'a Index) -> QueryPlanner<'a> {
        QueryPlanner { index }
    }

    /// Plan the given query.
    pub fn create_execution_tree(&self, query: &ParsedQuery) -> Result<QueryExecutionTree> {
        debug!("Creating execution plan");
        let mut graph = TripleGraph::from_triples(&query.triples);
        graph.collapse_text_cliques()?;

        let mut final_tab: Vec<Vec<SubtreePlan>> = if graph.is_pure_text_query() {
            vec![vec![self.pure_text_query(&graph)?]]
        } else {
            self.fill_dp_tab(&graph, &query.filters)?
        };

        if !query.order_by.is_empty() {
            let previous = final_tab
                .last()
                .ok_or_else(|| QueryError::Internal("empty DP table".to_string()))?;
            let row = self.get_order_by_row(query, previous)?;
            final_tab.push(row);
        }

        let last_row = final_tab
            .last()
            .ok_or_else(|| QueryError::Internal("empty DP table".to_string()))?;
        if last_row.is_empty() {
            return Err(QueryError::BadQuery(
                "Query has no connected plan covering all triples".to_string(),
            ));
        }

        let mut min_index = 0;
        for i in 1..last_row.len() {
            if last_row[i].cost_estimate() < last_row[min_index].cost_estimate() {
                min_index = i;
            }
        }
        let best = &last_row[min_index];
        debug!(
            cost = best.cost_estimate(),
            size = best.size_estimate(),
            "Done creating execution plan"
        );

        let mut tree = (*best.qet).clone();
        if let Some(select) = query.select_clause() {
            if select.distinct {
                let keep_columns: Vec<usize> = select
                    .variables
                    .iter()
                    .filter_map(|var| tree.variable_column(var))
                    .collect();
                let child = Arc::new(tree);
                let mut distinct = QueryExecutionTree::new(Operation::Distinct {
                    child: child.clone(),
                    keep_columns,
                });
                distinct.set_variable_columns(child.variable_columns().clone());
                distinct.set_context_vars(child.context_vars().clone());
                tree = distinct;
            }
        }

        Ok(tree.with_text_limit(parse_text_limit(&query.text_limit)?))
    }

    /// Row 1 of the DP table: one or two scans per regular node, a text
    /// leaf per collapsed text node.
    fn seed_with_scans_and_text(&self, graph: &TripleGraph) -> Result<Vec<SubtreePlan>> {
        let mut seeds = Vec::new();
        for node in graph.nodes() {
            if node.cvar.is_some() {
                seeds.push(self.text_leaf_plan(node)?);
                continue;
            }
            let triple = &node.triple;
            match node.variables.len() {
                0 => {
                    return Err(QueryError::BadQuery(format!(
                        "Triples should have at least one variable. Not the case in: {triple}"
                    )))
                }
                1 => {
                    // One direction suffices, both are equivalent.
                    let (kind, variable) = if is_variable(&triple.s) {
                        (ScanKind::PosBoundO, &triple.s)
                    } else if is_variable(&triple.o) {
                        (ScanKind::PsoBoundS, &triple.o)
                    } else {
                        return Err(QueryError::NotYetImplemented(format!(
                            "No predicate vars yet, please. Triple in question: {triple}"
                        )));
                    };
                    let mut tree = QueryExecutionTree::new(Operation::Scan(IndexScan {
                        kind,
                        subject: (kind == ScanKind::PsoBoundS).then(|| triple.s.clone()),
                        predicate: triple.p.clone(),
                        object: (kind == ScanKind::PosBoundO).then(|| triple.o.clone()),
                        size_estimate: self.index.scan_size_estimate(&triple.p, 1),
                    }));
                    tree.set_variable_column(variable.clone(), 0);
                    seeds.push(SubtreePlan::new(
                        tree,
                        BTreeSet::from([node.id]),
                        BTreeSet::new(),
                    ));
                }
                2 => {
                    if is_variable(&triple.p) {
                        return Err(QueryError::NotYetImplemented(format!(
                            "No predicate vars yet, please. Triple in question: {triple}"
                        )));
                    }
                    // Both scan directions are kept so a later merge can
                    // avoid a re-sort.
                    for kind in [ScanKind::PsoFreeS, ScanKind::PosFreeO] {
                        let mut tree = QueryExecutionTree::new(Operation::Scan(IndexScan {
                            kind,
                            subject: None,
                            predicate: triple.p.clone(),
                            object: None,
                            size_estimate: self.index.scan_size_estimate(&triple.p, 0),
                        }));
                        match kind {
                            ScanKind::PsoFreeS => {
                                tree.set_variable_column(triple.s.clone(), 0);
                                tree.set_variable_column(triple.o.clone(), 1);
                            }
                            _ => {
                                tree.set_variable_column(triple.o.clone(), 0);
                                tree.set_variable_column(triple.s.clone(), 1);
                            }
                        }
                        seeds.push(SubtreePlan::new(
                            tree,
                            BTreeSet::from([node.id]),
                            BTreeSet::new(),
                        ));
                    }
                }
                _ => {
                    return Err(QueryError::NotYetImplemented(format!(
                        "Triples should have at most two variables. Not the case in: {triple}"
                    )))
                }
            }
        }
        Ok(seeds)
    }

    /// Text leaf: column 0 is the context variable, column 1 its score,
    /// further columns the co-occurring entity variables.
    fn text_leaf_plan(&self, node: &TripleGraphNode) -> Result<SubtreePlan> {
        let words = node
            .word_part
            .as_deref()
            .filter(|w| !w.is_empty())
            .ok_or_else(|| {
                QueryError::BadQuery("Need a word part for each text operation.".to_string())
            })?;
        let cvar = node
            .cvar
            .as_deref()
            .ok_or_else(|| QueryError::Internal("text leaf without context var".to_string()))?;

        let mut tree = QueryExecutionTree::new(Operation::TextWithoutFilter {
            words: words.to_string(),
            n_free_vars: node.variables.len() - 1,
            size_estimate: self.index.text_size_estimate(words),
        });
        tree.set_variable_column(cvar, 0);
        tree.set_variable_column(score_variable(cvar), 1);
        let mut column = 2;
        for variable in &node.variables {
            if variable != cvar {
                tree.set_variable_column(variable.clone(), column);
                column += 1;
            }
        }
        tree.add_context_var(cvar);
        Ok(SubtreePlan::new(
            tree,
            BTreeSet::from([node.id]),
            BTreeSet::new(),
        ))
    }

    /// Fast path for queries that are a single text operation.
    fn pure_text_query(&self, graph: &TripleGraph) -> Result<SubtreePlan> {
        let node = &graph.nodes()[0];
        let words = node
            .word_part
            .as_deref()
            .filter(|w| !w.is_empty())
            .ok_or_else(|| {
                QueryError::BadQuery("Need a word part for each text operation.".to_string())
            })?;
        let cvar = node
            .cvar
            .as_deref()
            .ok_or_else(|| QueryError::Internal("pure text query without context var".to_string()))?;
        let mut tree = QueryExecutionTree::new(Operation::TextForContexts {
            words: words.to_string(),
            size_estimate: self.index.text_size_estimate(words),
        });
        tree.set_variable_column(cvar, 0);
        tree.set_variable_column(score_variable(cvar), 1);
        tree.add_context_var(cvar);
        Ok(SubtreePlan::new(
            tree,
            BTreeSet::from([node.id]),
            BTreeSet::new(),
        ))
    }

    /// Fill the DP table bottom-up: row k merges every connected,
    /// non-overlapping pair from rows i and k-i.
    fn fill_dp_tab(
        &self,
        graph: &TripleGraph,
        filters: &[SparqlFilter],
    ) -> Result<Vec<Vec<SubtreePlan>>> {
        let mut table = vec![self.seed_with_scans_and_text(graph)?];
        apply_filters_if_possible(&mut table[0], filters);

        for k in 2..=graph.len() {
            table.push(Vec::new());
            for i in 1..=k / 2 {
                let new_plans = self.merge(&table[i - 1], &table[k - i - 1], graph)?;
                table[k - 1].extend(new_plans);
                apply_filters_if_possible(&mut table[k - 1], filters);
            }
        }
        Ok(table)
    }

    /// Merge two DP rows: for every connected, non-overlapping pair emit a
    /// sort-and-join plan (and, when one side is an unfiltered text leaf,
    /// a fused text-with-filter plan), then prune per key.
    fn merge(
        &self,
        a: &[SubtreePlan],
        b: &[SubtreePlan],
        graph: &TripleGraph,
    ) -> Result<Vec<SubtreePlan>> {
        // Candidates grouped by pruning key, in first-insertion order.
        let mut candidates: Vec<(String, Vec<SubtreePlan>)> = Vec::new();
        let mut slot_of: FxHashMap<String, usize> = FxHashMap::default();
        let mut add_candidate = |plan: SubtreePlan, ordered_col: usize| {
            let key = pruning_key(&plan, ordered_col);
            let slot = *slot_of.entry(key.clone()).or_insert_with(|| {
                candidates.push((key, Vec::new()));
                candidates.len() - 1
            });
            candidates[slot].1.push(plan);
        };

        for plan_a in a {
            for plan_b in b {
                if !connected(plan_a, plan_b, graph) {
                    continue;
                }
                let join_cols = join_columns(plan_a, plan_b);
                if join_cols.len() != 1 {
                    return Err(QueryError::NotYetImplemented(
                        "Joins should happen on one variable only, for now. \
                         No cyclic queries either, currently."
                            .to_string(),
                    ));
                }
                let (left_col, right_col) = join_cols[0];

                let a_is_text = plan_a.qet.kind() == OperationKind::TextWithoutFilter;
                let b_is_text = plan_b.qet.kind() == OperationKind::TextWithoutFilter;
                if a_is_text != b_is_text {
                    // One side is a text leaf without filter: additionally
                    // fuse the text operation with the other side as its
                    // entity filter.
                    let (text, other, other_join_col) = if a_is_text {
                        (plan_a, plan_b, right_col)
                    } else {
                        (plan_b, plan_a, left_col)
                    };
                    add_candidate(
                        self.text_with_filter_plan(text, other, other_join_col)?,
                        left_col,
                    );
                }

                add_candidate(
                    sort_and_join_plan(plan_a, plan_b, left_col, right_col),
                    left_col,
                );
            }
        }

        // Per key, only the cheapest plan survives.
        let mut pruned = Vec::with_capacity(candidates.len());
        for (_, group) in candidates {
            let mut min_index = 0;
            for i in 1..group.len() {
                if group[i].cost_estimate() < group[min_index].cost_estimate() {
                    min_index = i;
                }
            }
            if group.len() > 1 {
                debug!(
                    pruned = group.len() - 1,
                    "pruning equivalent plans within DP row"
                );
            }
            pruned.push(group.into_iter().nth(min_index).expect("non-empty group"));
        }
        Ok(pruned)
    }

    /// Fuse a text leaf with another plan acting as its entity filter.
    /// Context and score columns keep their places; the remaining text
    /// columns are renumbered so the filter table's columns come last.
    fn text_with_filter_plan(
        &self,
        text: &SubtreePlan,
        other: &SubtreePlan,
        other_join_col: usize,
    ) -> Result<SubtreePlan> {
        let Operation::TextWithoutFilter {
            words,
            n_free_vars,
            size_estimate,
        } = text.qet.operation()
        else {
            return Err(QueryError::Internal(
                "text-with-filter fusion on a non-text plan".to_string(),
            ));
        };
        let cvar = text
            .qet
            .context_vars()
            .iter()
            .next()
            .ok_or_else(|| QueryError::Internal("text plan without context var".to_string()))?
            .clone();
        let score = score_variable(&cvar);

        let mut tree = QueryExecutionTree::new(Operation::TextWithFilter {
            words: words.clone(),
            n_free_vars: *n_free_vars,
            filter: other.qet.clone(),
            filter_column: other_join_col,
            size_estimate: *size_estimate,
        });

        let mut map: FxHashMap<String, usize> = FxHashMap::default();
        let mut column = 2;
        let mut text_columns: Vec<(&String, usize)> = text
            .qet
            .variable_columns()
            .iter()
            .map(|(var, &col)| (var, col))
            .collect();
        text_columns.sort_by_key(|&(_, col)| col);
        for (variable, col) in text_columns {
            if *variable == cvar || *variable == score {
                map.insert(variable.clone(), col);
            } else if !other.qet.var_covered(variable) {
                map.insert(variable.clone(), column);
                column += 1;
            }
        }
        // The entity we filter on is provided by the filter table and keeps
        // its place there.
        debug_assert_eq!(column, text.qet.result_width() - 1);
        for (variable, &col) in other.qet.variable_columns() {
            map.insert(variable.clone(), column + col);
        }
        tree.set_variable_columns(map);
        tree.set_context_vars(other.qet.context_vars().clone());
        tree.add_context_var(cvar);

        let mut included_nodes = other.included_nodes.clone();
        included_nodes.extend(text.included_nodes.iter().copied());
        let mut included_filters = other.included_filters.clone();
        included_filters.extend(text.included_filters.iter().copied());
        Ok(SubtreePlan::new(tree, included_nodes, included_filters))
    }

    /// The extra DP row for ORDER BY: wrap every plan of the last row, or
    /// keep it unchanged when a single ascending key is already the sort
    /// column.
    fn get_order_by_row(
        &self,
        query: &ParsedQuery,
        previous: &[SubtreePlan],
    ) -> Result<Vec<SubtreePlan>> {
        let mut row = Vec::with_capacity(previous.len());
        for plan in previous {
            if query.order_by.len() == 1 && !query.order_by[0].descending {
                let key = &query.order_by[0].key;
                let column = plan.qet.variable_column(key).ok_or_else(|| {
                    QueryError::BadQuery(format!("ORDER BY key {key} is not bound by the query"))
                })?;
                if plan.qet.result_sorted_on() == Some(column) {
                    // Already sorted perfectly.
                    row.push(plan.clone());
                } else {
                    let mut tree = QueryExecutionTree::new(Operation::Sort {
                        child: plan.qet.clone(),
                        column,
                    });
                    tree.set_variable_columns(plan.qet.variable_columns().clone());
                    tree.set_context_vars(plan.qet.context_vars().clone());
                    row.push(SubtreePlan::new(
                        tree,
                        plan.included_nodes.clone(),
                        plan.included_filters.clone(),
                    ));
                }
            } else {
                let mut keys = Vec::with_capacity(query.order_by.len());
                for order in &query.order_by {
                    let column = plan.qet.variable_column(&order.key).ok_or_else(|| {
                        QueryError::BadQuery(format!(
                            "ORDER BY key {} is not bound by the query",
                            order.key
                        ))
                    })?;
                    keys.push((column, order.descending));
                }
                let mut tree = QueryExecutionTree::new(Operation::OrderBy {
                    child: plan.qet.clone(),
                    keys,
                });
                tree.set_variable_columns(plan.qet.variable_columns().clone());
                tree.set_context_vars(plan.qet.context_vars().clone());
                row.push(SubtreePlan::new(
                    tree,
                    plan.included_nodes.clone(),
                    plan.included_filters.clone(),
                ));
            }
        }
        Ok(row)
    }
}

/// Prepend sorts where needed and join the two plans on their shared
/// variable.
fn sort_and_join_plan(
    plan_a: &SubtreePlan,
    plan_b: &SubtreePlan,
    left_col: usize,
    right_col: usize,
) -> SubtreePlan {
    let left = sorted_on(&plan_a.qet, left_col);
    let right = sorted_on(&plan_b.qet, right_col);

    let mut tree = QueryExecutionTree::new(Operation::Join {
        left: left.clone(),
        right: right.clone(),
        left_col,
        right_col,
    });
    tree.set_variable_columns(join_variable_columns(&left, &right, right_col));

    let mut included_nodes = plan_a.included_nodes.clone();
    included_nodes.extend(plan_b.included_nodes.iter().copied());
    let mut included_filters = plan_a.included_filters.clone();
    included_filters.extend(plan_b.included_filters.iter().copied());
    SubtreePlan::new(tree, included_nodes, included_filters)
}

/// The tree itself if already sorted on `column`, else a sort wrapper.
fn sorted_on(tree: &Arc<QueryExecutionTree>, column: usize) -> Arc<QueryExecutionTree> {
    if tree.result_sorted_on() == Some(column) {
        return tree.clone();
    }
    let mut sort = QueryExecutionTree::new(Operation::Sort {
        child: tree.clone(),
        column,
    });
    sort.set_variable_columns(tree.variable_columns().clone());
    Arc::new(sort)
}

/// Two plans may join iff their node sets are disjoint and some edge leads
/// from one into the other.
fn connected(a: &SubtreePlan, b: &SubtreePlan, graph: &TripleGraph) -> bool {
    if !a.included_nodes.is_disjoint(&b.included_nodes) {
        return false;
    }
    for &node in &a.included_nodes {
        for &target in graph.adjacent(node) {
            if !a.included_nodes.contains(&target) && b.included_nodes.contains(&target) {
                return true;
            }
        }
    }
    false
}

/// Shared variables as `(column in a, column in b)`, ordered by variable
/// name.
fn join_columns(a: &SubtreePlan, b: &SubtreePlan) -> Vec<(usize, usize)> {
    let mut vars: Vec<(&String, usize)> = a
        .qet
        .variable_columns()
        .iter()
        .map(|(var, &col)| (var, col))
        .collect();
    vars.sort();
    vars.into_iter()
        .filter_map(|(var, a_col)| b.qet.variable_column(var).map(|b_col| (a_col, b_col)))
        .collect()
}

/// Canonical key for DP pruning: the variable the plan is ordered on plus
/// the sorted set of covered nodes. Plans with equal keys are
/// indistinguishable to later operators.
fn pruning_key(plan: &SubtreePlan, ordered_col: usize) -> String {
    let mut key = plan
        .qet
        .ordered_variable(ordered_col)
        .unwrap_or_default()
        .to_string();
    for node in &plan.included_nodes {
        key.push(' ');
        key.push_str(&node.to_string());
    }
    key
}

/// Apply every filter whose variables a plan covers, replacing the plan
/// in place and recording the filter as applied.
fn apply_filters_if_possible(row: &mut [SubtreePlan], filters: &[SparqlFilter]) {
    for slot in row.iter_mut() {
        for (i, filter) in filters.iter().enumerate() {
            if slot.included_filters.contains(&i) {
                continue;
            }
            let (Some(lhs_col), Some(rhs_col)) = (
                slot.qet.variable_column(&filter.lhs),
                slot.qet.variable_column(&filter.rhs),
            ) else {
                continue;
            };
            let mut tree = QueryExecutionTree::new(Operation::Filter {
                child: slot.qet.clone(),
                kind: filter.kind,
                lhs_col,
                rhs_col,
            });
            tree.set_variable_columns(slot.qet.variable_columns().clone());
            tree.set_context_vars(slot.qet.context_vars().clone());
            let mut included_filters = slot.included_filters.clone();
            included_filters.insert(i);
            *slot = SubtreePlan::new(tree, slot.included_nodes.clone(), included_filters);
        }
    }
}

/// Empty means 1, otherwise a non-negative decimal.
fn parse_text_limit(text_limit: &str) -> Result<u64> {
    if text_limit.is_empty() {
        return Ok(1);
    }
    text_limit
        .parse::<u64>()
        .map_err(|_| QueryError::BadQuery(format!("Invalid text limit: \"{text_limit}\"")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsed::{
        FilterKind, OrderKey, SparqlTriple, IN_CONTEXT_RELATION,
    };
    use tessera_core::{TextVocabulary, Vocabulary};

    fn make_test_index() -> Index {
        let vocab = Vocabulary::from_terms(vec![
            "<p>".to_string(),
            "<q>".to_string(),
            "<o>".to_string(),
        ]);
        Index::new(vocab, TextVocabulary::default())
    }

    fn triple(s: &str, p: &str, o: &str) -> SparqlTriple {
        SparqlTriple::new(s, p, o)
    }

    fn collapsed_graph(triples: &[SparqlTriple]) -> TripleGraph {
        let mut graph = TripleGraph::from_triples(triples);
        graph.collapse_text_cliques().unwrap();
        graph
    }

    #[test]
    fn test_single_scan_one_variable() {
        // SELECT ?x WHERE { ?x <p> <o> }
        let index = make_test_index();
        let planner = QueryPlanner::new(&index);
        let query = ParsedQuery::select(
            vec!["?x".to_string()],
            vec![triple("?x", "<p>", "<o>")],
        );
        let tree = planner.create_execution_tree(&query).unwrap();

        let Operation::Scan(scan) = tree.operation() else {
            panic!("expected a scan, got {:?}", tree.kind());
        };
        assert_eq!(scan.kind, ScanKind::PosBoundO);
        assert_eq!(scan.predicate, "<p>");
        assert_eq!(scan.object.as_deref(), Some("<o>"));
        assert_eq!(tree.variable_column("?x"), Some(0));
    }

    #[test]
    fn test_two_triple_join_rows_and_pruning() {
        // SELECT ?x ?y WHERE { ?x <p> ?y . ?y <q> <o> }
        let index = make_test_index();
        let planner = QueryPlanner::new(&index);
        let graph = collapsed_graph(&[triple("?x", "<p>", "?y"), triple("?y", "<q>", "<o>")]);

        let table = planner.fill_dp_tab(&graph, &[]).unwrap();
        assert_eq!(table.len(), 2);
        // Row 1: two directions for the first triple plus one for the second.
        assert_eq!(table[0].len(), 3);
        // Row 2: all four orientations collapse under the pruning key.
        assert_eq!(table[1].len(), 1);

        let plan = &table[1][0];
        assert_eq!(plan.included_nodes.len(), 2);
        let Operation::Join { left, right, .. } = plan.qet.operation() else {
            panic!("expected a join, got {:?}", plan.qet.kind());
        };
        // The surviving plan joins on ?y without any re-sort.
        assert_eq!(left.kind(), OperationKind::Scan);
        assert_eq!(right.kind(), OperationKind::Scan);
        assert_eq!(
            plan.qet.ordered_variable(plan.qet.result_sorted_on().unwrap()),
            Some("?y")
        );
        assert!(plan.qet.var_covered("?x"));
    }

    #[test]
    fn test_cyclic_query_is_rejected() {
        // { ?x <p> ?y . ?y <q> ?z . ?z <r> ?x } is cyclic.
        let index = make_test_index();
        let planner = QueryPlanner::new(&index);
        let query = ParsedQuery::select(
            vec!["?x".to_string()],
            vec![
                triple("?x", "<p>", "?y"),
                triple("?y", "<q>", "?z"),
                triple("?z", "<r>", "?x"),
            ],
        );
        let err = planner.create_execution_tree(&query).unwrap_err();
        assert!(matches!(err, QueryError::NotYetImplemented(_)));
        assert!(err.to_string().contains("cyclic"));
    }

    #[test]
    fn test_predicate_variable_is_rejected() {
        let index = make_test_index();
        let planner = QueryPlanner::new(&index);
        for triples in [
            vec![triple("?x", "?p", "<o>")],
            vec![triple("<s>", "?p", "<o>")],
        ] {
            let query = ParsedQuery::select(vec!["?x".to_string()], triples);
            let err = planner.create_execution_tree(&query).unwrap_err();
            assert!(matches!(err, QueryError::NotYetImplemented(_)), "{err}");
            assert!(err.to_string().contains("predicate vars"));
        }
    }

    #[test]
    fn test_three_variables_rejected() {
        let index = make_test_index();
        let planner = QueryPlanner::new(&index);
        let query = ParsedQuery::select(vec!["?x".to_string()], vec![triple("?x", "?p", "?o")]);
        let err = planner.create_execution_tree(&query).unwrap_err();
        assert!(matches!(err, QueryError::NotYetImplemented(_)));
    }

    #[test]
    fn test_no_variable_rejected() {
        let index = make_test_index();
        let planner = QueryPlanner::new(&index);
        let query = ParsedQuery::select(vec![], vec![triple("<s>", "<p>", "<o>")]);
        let err = planner.create_execution_tree(&query).unwrap_err();
        assert!(matches!(err, QueryError::BadQuery(_)));
    }

    #[test]
    fn test_plan_completeness_invariants() {
        // Chain of three triples: every plan in row k covers exactly k
        // nodes and the covered sets are connected.
        let index = make_test_index();
        let planner = QueryPlanner::new(&index);
        let graph = collapsed_graph(&[
            triple("?x", "<p>", "?y"),
            triple("?y", "<q>", "?z"),
            triple("?z", "<r>", "<o>"),
        ]);
        let table = planner.fill_dp_tab(&graph, &[]).unwrap();
        for (k, row) in table.iter().enumerate() {
            assert!(!row.is_empty(), "row {} is empty", k + 1);
            for plan in row {
                assert_eq!(plan.included_nodes.len(), k + 1);
                let keep: Vec<usize> = plan.included_nodes.iter().copied().collect();
                let sub = graph.induced(&keep);
                let reachable = sub.bfs_leave_out(0, &Default::default());
                assert_eq!(reachable.len(), sub.len(), "induced subgraph disconnected");
            }
        }
    }

    #[test]
    fn test_pruning_soundness() {
        let index = make_test_index();
        let planner = QueryPlanner::new(&index);
        let graph = collapsed_graph(&[
            triple("?x", "<p>", "?y"),
            triple("?y", "<q>", "?z"),
            triple("?z", "<r>", "<o>"),
        ]);
        let table = planner.fill_dp_tab(&graph, &[]).unwrap();
        let last = table.last().unwrap();
        let mut seen = std::collections::HashSet::new();
        for plan in last {
            let key = pruning_key(plan, plan.qet.result_sorted_on().unwrap_or(0));
            assert!(seen.insert(key), "two surviving plans share a pruning key");
        }
    }

    #[test]
    fn test_filter_injection_and_coverage() {
        let index = make_test_index();
        let planner = QueryPlanner::new(&index);
        let graph = collapsed_graph(&[triple("?x", "<p>", "?y"), triple("?y", "<q>", "<o>")]);
        let filters = vec![SparqlFilter::new("?x", "?y", FilterKind::Ne)];
        let table = planner.fill_dp_tab(&graph, &filters).unwrap();

        // Row 1: the two-variable seeds have the filter applied, the
        // one-variable seed does not cover ?x.
        for plan in &table[0] {
            if plan.qet.var_covered("?x") {
                assert_eq!(plan.qet.kind(), OperationKind::Filter);
                assert!(plan.included_filters.contains(&0));
            } else {
                assert!(plan.included_filters.is_empty());
            }
            // Filter coverage: recorded filters have both variables bound.
            for &f in &plan.included_filters {
                assert!(plan.qet.var_covered(&filters[f].lhs));
                assert!(plan.qet.var_covered(&filters[f].rhs));
            }
        }
        // The final plan records the filter exactly once.
        assert!(table[1][0].included_filters.contains(&0));
    }

    #[test]
    fn test_order_by_skips_sort_when_already_sorted() {
        let index = make_test_index();
        let planner = QueryPlanner::new(&index);
        let mut query = ParsedQuery::select(
            vec!["?x".to_string()],
            vec![triple("?x", "<p>", "<o>")],
        );
        query.order_by = vec![OrderKey::asc("?x")];
        let tree = planner.create_execution_tree(&query).unwrap();
        // The scan is already sorted on ?x: no wrapper.
        assert_eq!(tree.kind(), OperationKind::Scan);

        query.order_by = vec![OrderKey::desc("?x")];
        let tree = planner.create_execution_tree(&query).unwrap();
        assert_eq!(tree.kind(), OperationKind::OrderBy);
    }

    #[test]
    fn test_order_by_unbound_key_is_rejected() {
        let index = make_test_index();
        let planner = QueryPlanner::new(&index);
        let mut query = ParsedQuery::select(
            vec!["?x".to_string()],
            vec![triple("?x", "<p>", "<o>")],
        );
        query.order_by = vec![OrderKey::asc("?nope")];
        let err = planner.create_execution_tree(&query).unwrap_err();
        assert!(matches!(err, QueryError::BadQuery(_)));
    }

    #[test]
    fn test_distinct_wraps_and_keeps_selected_columns() {
        let index = make_test_index();
        let planner = QueryPlanner::new(&index);
        let mut query = ParsedQuery::select(
            vec!["?x".to_string(), "?gone".to_string()],
            vec![triple("?x", "<p>", "<o>")],
        );
        if let crate::parsed::QueryClause::Select(clause) = &mut query.clause {
            clause.distinct = true;
        }
        let tree = planner.create_execution_tree(&query).unwrap();
        let Operation::Distinct { keep_columns, .. } = tree.operation() else {
            panic!("expected distinct, got {:?}", tree.kind());
        };
        // ?gone is not in the column map and is silently dropped.
        assert_eq!(keep_columns, &vec![0]);
    }

    #[test]
    fn test_text_limit_parsing() {
        let index = make_test_index();
        let planner = QueryPlanner::new(&index);
        let mut query = ParsedQuery::select(
            vec!["?x".to_string()],
            vec![triple("?x", "<p>", "<o>")],
        );
        assert_eq!(planner.create_execution_tree(&query).unwrap().text_limit(), 1);

        query.text_limit = "5".to_string();
        assert_eq!(planner.create_execution_tree(&query).unwrap().text_limit(), 5);

        query.text_limit = "many".to_string();
        assert!(matches!(
            planner.create_execution_tree(&query).unwrap_err(),
            QueryError::BadQuery(_)
        ));
    }

    #[test]
    fn test_pure_text_query_fast_path() {
        let index = make_test_index();
        let planner = QueryPlanner::new(&index);
        let query = ParsedQuery::select(
            vec!["?c".to_string()],
            vec![triple("?c", IN_CONTEXT_RELATION, "edible mushroom")],
        );
        let tree = planner.create_execution_tree(&query).unwrap();
        assert_eq!(tree.kind(), OperationKind::TextForContexts);
        assert_eq!(tree.variable_column("?c"), Some(0));
        assert_eq!(tree.variable_column("SCORE(?c)"), Some(1));
    }

    #[test]
    fn test_text_clique_fuses_with_entity_filter() {
        // ?x <p> <o> joined with a text clique over ?c mentioning ?x.
        let mut index = make_test_index();
        index.set_word_estimate("edible", 100);
        let planner = QueryPlanner::new(&index);
        let query = ParsedQuery::select(
            vec!["?x".to_string(), "?c".to_string()],
            vec![
                triple("?x", "<p>", "<o>"),
                triple("?x", IN_CONTEXT_RELATION, "?c"),
                triple("?c", IN_CONTEXT_RELATION, "edible"),
            ],
        );
        let tree = planner.create_execution_tree(&query).unwrap();
        assert_eq!(tree.kind(), OperationKind::TextWithFilter);
        // Context and score keep their columns, the filter table's columns
        // come after the surviving text columns.
        assert_eq!(tree.variable_column("?c"), Some(0));
        assert_eq!(tree.variable_column("SCORE(?c)"), Some(1));
        assert_eq!(tree.variable_column("?x"), Some(2));
        assert!(tree.context_vars().contains("?c"));
    }

    #[test]
    fn test_missing_word_part_is_rejected() {
        let index = make_test_index();
        let planner = QueryPlanner::new(&index);
        let node = TripleGraphNode {
            id: 0,
            triple: triple("?x", IN_CONTEXT_RELATION, "?c"),
            variables: ["?x".to_string(), "?c".to_string()].into_iter().collect(),
            cvar: Some("?c".to_string()),
            word_part: Some(String::new()),
        };
        let err = planner.text_leaf_plan(&node).unwrap_err();
        assert!(err.to_string().contains("word part"), "{err}");
    }

    #[test]
    fn test_selection_is_deterministic() {
        let index = make_test_index();
        let planner = QueryPlanner::new(&index);
        let query = ParsedQuery::select(
            vec!["?x".to_string(), "?y".to_string()],
            vec![triple("?x", "<p>", "?y"), triple("?y", "<q>", "<o>")],
        );
        let first = planner.create_execution_tree(&query).unwrap();
        for _ in 0..5 {
            let again = planner.create_execution_tree(&query).unwrap();
            assert_eq!(format!("{first:?}"), format!("{again:?}"));
        }
    }
}
