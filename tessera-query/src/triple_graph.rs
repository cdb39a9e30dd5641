//! The triple-pattern connection graph.
//!
//! Nodes are triple patterns; two nodes are adjacent iff they share a
//! variable. Text triples (those whose predicate is one of the context
//! predicates) are collapsed into synthetic text nodes per context
//! variable before planning. Nodes live in an arena indexed by dense ids;
//! adjacency is a plain index list, never an owning reference.

use crate::error::{QueryError, Result};
use crate::parsed::{
    is_variable, SparqlFilter, SparqlTriple, HAS_CONTEXT_RELATION, IN_CONTEXT_RELATION,
};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::{BTreeSet, VecDeque};
use std::fmt;

/// One node of the graph: a triple pattern, or a collapsed text clique.
#[derive(Clone, Debug)]
pub struct TripleGraphNode {
    pub id: usize,
    /// The pattern, or for a collapsed text node a representative of the
    /// clique (first in insertion order).
    pub triple: SparqlTriple,
    pub variables: BTreeSet<String>,
    /// The context variable, set iff this is a (collapsed) text node.
    pub cvar: Option<String>,
    /// Space-joined word part of a collapsed text node.
    pub word_part: Option<String>,
}

impl TripleGraphNode {
    fn from_triple(id: usize, triple: SparqlTriple) -> TripleGraphNode {
        let variables = triple
            .variables()
            .into_iter()
            .map(str::to_string)
            .collect();
        TripleGraphNode {
            id,
            triple,
            variables,
            cvar: None,
            word_part: None,
        }
    }
}

/// Undirected multigraph over triple patterns.
#[derive(Clone, Debug, Default)]
pub struct TripleGraph {
    nodes: Vec<TripleGraphNode>,
    adj: Vec<Vec<usize>>,
}

impl TripleGraph {
    /// Build the graph in parse order: each new node gets an edge to every
    /// earlier node sharing a variable.
    pub fn from_triples(triples: &[SparqlTriple]) -> TripleGraph {
        let mut graph = TripleGraph::default();
        for triple in triples {
            let id = graph.nodes.len();
            let node = TripleGraphNode::from_triple(id, triple.clone());
            graph.adj.push(Vec::new());
            for earlier in 0..id {
                if !graph.nodes[earlier].variables.is_disjoint(&node.variables) {
                    graph.adj[id].push(earlier);
                    graph.adj[earlier].push(id);
                }
            }
            graph.nodes.push(node);
        }
        graph
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[TripleGraphNode] {
        &self.nodes
    }

    pub fn node(&self, id: usize) -> &TripleGraphNode {
        &self.nodes[id]
    }

    pub fn adjacent(&self, id: usize) -> &[usize] {
        &self.adj[id]
    }

    /// A node is a text node iff its predicate is one of the context
    /// predicates (or it is an already-collapsed clique).
    pub fn is_text_node(&self, id: usize) -> bool {
        let node = &self.nodes[id];
        node.cvar.is_some()
            || node.triple.p == IN_CONTEXT_RELATION
            || node.triple.p == HAS_CONTEXT_RELATION
    }

    /// Group text nodes by context variable, in first-occurrence order.
    ///
    /// A context variable is an endpoint that is a variable whose
    /// counterpart is non-variable. A text triple with two non-variable
    /// endpoints is malformed.
    pub fn identify_text_cliques(&self) -> Result<Vec<(String, Vec<usize>)>> {
        let mut context_vars: FxHashSet<String> = FxHashSet::default();
        for id in 0..self.len() {
            if !self.is_text_node(id) {
                continue;
            }
            let triple = &self.nodes[id].triple;
            if !is_variable(&triple.s) {
                if is_variable(&triple.o) {
                    context_vars.insert(triple.o.clone());
                } else {
                    return Err(QueryError::BadQuery(format!(
                        "Triples need at least one variable. Not the case in: {triple}"
                    )));
                }
            }
            if !is_variable(&triple.o) && is_variable(&triple.s) {
                context_vars.insert(triple.s.clone());
            }
        }

        let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
        let mut group_of: FxHashMap<String, usize> = FxHashMap::default();
        let mut add = |cvar: &str, id: usize| {
            let slot = *group_of.entry(cvar.to_string()).or_insert_with(|| {
                groups.push((cvar.to_string(), Vec::new()));
                groups.len() - 1
            });
            groups[slot].1.push(id);
        };
        for id in 0..self.len() {
            if !self.is_text_node(id) {
                continue;
            }
            let triple = &self.nodes[id].triple;
            let s_is_cvar = context_vars.contains(&triple.s);
            let o_is_cvar = context_vars.contains(&triple.o);
            if s_is_cvar && o_is_cvar {
                return Err(QueryError::BadQuery(format!(
                    "Both endpoints of a text triple bind a context: {triple}"
                )));
            }
            if s_is_cvar {
                add(&triple.s, id);
            }
            if o_is_cvar {
                add(&triple.o, id);
            }
        }
        Ok(groups)
    }

    /// Replace each text clique with one synthetic text node, renumbering
    /// the remaining nodes to a dense range. Text nodes come first (in
    /// first-occurrence order of their context variable), then the
    /// surviving nodes in their old order.
    pub fn collapse_text_cliques(&mut self) -> Result<()> {
        let groups = self.identify_text_cliques()?;
        if groups.is_empty() {
            return Ok(());
        }

        let mut removed: FxHashMap<usize, usize> = FxHashMap::default();
        let mut text_nodes: Vec<TripleGraphNode> = Vec::new();
        let mut text_adj_old: Vec<BTreeSet<usize>> = Vec::new();

        for (text_id, (cvar, member_ids)) in groups.iter().enumerate() {
            let mut word_part = String::new();
            let mut variables: BTreeSet<String> = BTreeSet::new();
            let mut adjacency: BTreeSet<usize> = BTreeSet::new();
            let mut representative: Option<SparqlTriple> = None;
            for &member in member_ids {
                removed.insert(member, text_id);
                adjacency.extend(self.adj[member].iter().copied());
                let node = &self.nodes[member];
                variables.extend(node.variables.iter().cloned());
                if representative.is_none() {
                    representative = Some(node.triple.clone());
                }
                // The non-variable endpoint opposite the context variable
                // contributes to the word part, in insertion order.
                let triple = &node.triple;
                let word = if triple.s == *cvar && !is_variable(&triple.o) {
                    Some(triple.o.as_str())
                } else if triple.o == *cvar && !is_variable(&triple.s) {
                    Some(triple.s.as_str())
                } else {
                    None
                };
                if let Some(word) = word {
                    if !word_part.is_empty() {
                        word_part.push(' ');
                    }
                    word_part.push_str(word);
                }
            }
            text_nodes.push(TripleGraphNode {
                id: text_id,
                triple: representative
                    .ok_or_else(|| QueryError::Internal("empty text clique".to_string()))?,
                variables,
                cvar: Some(cvar.clone()),
                word_part: Some(word_part),
            });
            text_adj_old.push(adjacency);
        }

        // Renumber survivors after the text nodes, preserving their order.
        let num_text = text_nodes.len();
        let mut old_to_new: FxHashMap<usize, usize> = FxHashMap::default();
        let mut survivors: Vec<usize> = Vec::new();
        for node in &self.nodes {
            if !removed.contains_key(&node.id) {
                old_to_new.insert(node.id, num_text + survivors.len());
                survivors.push(node.id);
            }
        }

        let mut new_nodes = text_nodes;
        for &old_id in &survivors {
            let mut node = self.nodes[old_id].clone();
            node.id = old_to_new[&old_id];
            new_nodes.push(node);
        }

        let mut new_adj: Vec<Vec<usize>> = Vec::with_capacity(new_nodes.len());
        for (text_id, olds) in text_adj_old.iter().enumerate() {
            let mut set: BTreeSet<usize> = BTreeSet::new();
            for old in olds {
                match removed.get(old) {
                    Some(&other) if other != text_id => {
                        set.insert(other);
                    }
                    Some(_) => {}
                    None => {
                        set.insert(old_to_new[old]);
                    }
                }
            }
            new_adj.push(set.into_iter().collect());
        }
        for &old_id in &survivors {
            let mut set: BTreeSet<usize> = BTreeSet::new();
            for neighbor in &self.adj[old_id] {
                match removed.get(neighbor) {
                    Some(&text_id) => {
                        set.insert(text_id);
                    }
                    None => {
                        set.insert(old_to_new[neighbor]);
                    }
                }
            }
            new_adj.push(set.into_iter().collect());
        }

        self.nodes = new_nodes;
        self.adj = new_adj;
        Ok(())
    }

    /// A pure text query is a single collapsed text node and nothing else.
    pub fn is_pure_text_query(&self) -> bool {
        self.nodes.len() == 1 && self.nodes[0].cvar.is_some()
    }

    /// BFS from `start`, never entering `leave_out`. Returns visited nodes
    /// in traversal order.
    pub fn bfs_leave_out(&self, start: usize, leave_out: &FxHashSet<usize>) -> Vec<usize> {
        let mut result = Vec::new();
        let mut visited: FxHashSet<usize> = FxHashSet::default();
        let mut queue = VecDeque::new();
        queue.push_back(start);
        visited.insert(start);
        while let Some(node) = queue.pop_front() {
            result.push(node);
            for &neighbor in &self.adj[node] {
                if !visited.contains(&neighbor) && !leave_out.contains(&neighbor) {
                    visited.insert(neighbor);
                    queue.push_back(neighbor);
                }
            }
        }
        result
    }

    /// Filters whose variables touch the given node set.
    pub fn pick_filters(&self, filters: &[SparqlFilter], nodes: &[usize]) -> Vec<SparqlFilter> {
        let mut covered: FxHashSet<&str> = FxHashSet::default();
        for &id in nodes {
            covered.extend(self.nodes[id].variables.iter().map(String::as_str));
        }
        filters
            .iter()
            .filter(|f| covered.contains(f.lhs.as_str()) || covered.contains(f.rhs.as_str()))
            .cloned()
            .collect()
    }

    /// Induced-subgraph copy: keeps node data, remaps ids to a dense
    /// `0..keep.len()` range (ascending old-id order), drops edges to
    /// removed nodes.
    pub fn induced(&self, keep: &[usize]) -> TripleGraph {
        let keep_set: FxHashSet<usize> = keep.iter().copied().collect();
        let mut old_to_new: FxHashMap<usize, usize> = FxHashMap::default();
        let mut nodes = Vec::new();
        for old in 0..self.len() {
            if keep_set.contains(&old) {
                let mut node = self.nodes[old].clone();
                node.id = nodes.len();
                old_to_new.insert(old, node.id);
                nodes.push(node);
            }
        }
        let mut adj = Vec::with_capacity(nodes.len());
        for old in 0..self.len() {
            if !keep_set.contains(&old) {
                continue;
            }
            adj.push(
                self.adj[old]
                    .iter()
                    .filter(|n| keep_set.contains(n))
                    .map(|n| old_to_new[n])
                    .collect(),
            );
        }
        TripleGraph { nodes, adj }
    }

    /// Recursively partition the graph at each context variable, yielding
    /// the text-free sub-graphs together with the filters that touch their
    /// variables. Smaller sub-graphs appear first.
    pub fn split_at_context_vars(
        &self,
        filters: &[SparqlFilter],
    ) -> Result<Vec<(TripleGraph, Vec<SparqlFilter>)>> {
        let mut parts = self.split_step(filters)?;
        parts.sort_by_key(|(graph, _)| graph.len());
        Ok(parts)
    }

    fn split_step(&self, filters: &[SparqlFilter]) -> Result<Vec<(TripleGraph, Vec<SparqlFilter>)>> {
        let groups = self.identify_text_cliques()?;
        let Some((_, first_group)) = groups.first() else {
            return Ok(vec![(self.clone(), filters.to_vec())]);
        };
        let text_ids: FxHashSet<usize> = first_group.iter().copied().collect();

        let mut start = 0;
        while start < self.len() && text_ids.contains(&start) {
            start += 1;
        }
        // Only text triples left: nothing non-textual to recurse into.
        if start == self.len() {
            return Ok(Vec::new());
        }

        let mut parts = Vec::new();
        let mut done: FxHashSet<usize> = text_ids.clone();
        loop {
            let reachable = self.bfs_leave_out(start, &text_ids);
            done.extend(reachable.iter().copied());
            let sub = self.induced(&reachable);
            let picked = self.pick_filters(filters, &reachable);
            parts.extend(sub.split_step(&picked)?);
            match (0..self.len()).find(|id| !done.contains(id)) {
                Some(next) => start = next,
                None => break,
            }
        }
        Ok(parts)
    }
}

impl fmt::Display for TripleGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, node) in self.nodes.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            match (&node.cvar, &node.word_part) {
                (Some(cvar), Some(words)) => {
                    write!(f, "{i} {{TextOP for {cvar}, wordPart: \"{words}\"}} : (")?
                }
                _ => write!(f, "{i} {} : (", node.triple)?,
            }
            for (j, neighbor) in self.adj[i].iter().enumerate() {
                if j > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{neighbor}")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsed::FilterKind;

    fn triple(s: &str, p: &str, o: &str) -> SparqlTriple {
        SparqlTriple::new(s, p, o)
    }

    #[test]
    fn test_build_adjacency() {
        // ?x <p> ?y . ?y <q> <o> . ?z <r> <o2>
        let graph = TripleGraph::from_triples(&[
            triple("?x", "<p>", "?y"),
            triple("?y", "<q>", "<o>"),
            triple("?z", "<r>", "<o2>"),
        ]);
        assert_eq!(graph.len(), 3);
        assert_eq!(graph.adjacent(0), &[1]);
        assert_eq!(graph.adjacent(1), &[0]);
        assert!(graph.adjacent(2).is_empty());
    }

    #[test]
    fn test_identify_cliques_groups_by_cvar() {
        let graph = TripleGraph::from_triples(&[
            triple("?c", IN_CONTEXT_RELATION, "edible"),
            triple("?x", IN_CONTEXT_RELATION, "?c"),
            triple("?c2", IN_CONTEXT_RELATION, "poisonous"),
        ]);
        let groups = graph.identify_text_cliques().unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "?c");
        assert_eq!(groups[0].1, vec![0, 1]);
        assert_eq!(groups[1].0, "?c2");
        assert_eq!(groups[1].1, vec![2]);
    }

    #[test]
    fn test_text_triple_without_variable_is_rejected() {
        let graph = TripleGraph::from_triples(&[triple("<s>", IN_CONTEXT_RELATION, "word")]);
        let err = graph.identify_text_cliques().unwrap_err();
        assert!(matches!(err, QueryError::BadQuery(_)));
    }

    #[test]
    fn test_collapse_builds_word_part_and_renumbers() {
        // ?x <is-a> <Plant> . ?c in-context edible . ?c in-context leaves . ?x has-context ?c
        let mut graph = TripleGraph::from_triples(&[
            triple("?x", "<is-a>", "<Plant>"),
            triple("?c", IN_CONTEXT_RELATION, "edible"),
            triple("?c", IN_CONTEXT_RELATION, "leaves"),
            triple("?x", HAS_CONTEXT_RELATION, "?c"),
        ]);
        graph.collapse_text_cliques().unwrap();

        // One text node (id 0) plus the surviving regular node (id 1).
        assert_eq!(graph.len(), 2);
        let text = graph.node(0);
        assert_eq!(text.cvar.as_deref(), Some("?c"));
        assert_eq!(text.word_part.as_deref(), Some("edible leaves"));
        assert!(text.variables.contains("?c"));
        assert!(text.variables.contains("?x"));

        let regular = graph.node(1);
        assert_eq!(regular.triple, triple("?x", "<is-a>", "<Plant>"));

        // They share ?x, so they are adjacent under the new numbering.
        assert_eq!(graph.adjacent(0), &[1]);
        assert_eq!(graph.adjacent(1), &[0]);
    }

    #[test]
    fn test_collapse_without_text_nodes_is_noop() {
        let mut graph =
            TripleGraph::from_triples(&[triple("?x", "<p>", "?y"), triple("?y", "<q>", "<o>")]);
        let before = graph.len();
        graph.collapse_text_cliques().unwrap();
        assert_eq!(graph.len(), before);
        assert!(!graph.is_pure_text_query());
    }

    #[test]
    fn test_pure_text_query() {
        let mut graph =
            TripleGraph::from_triples(&[triple("?c", IN_CONTEXT_RELATION, "edible mushroom")]);
        graph.collapse_text_cliques().unwrap();
        assert!(graph.is_pure_text_query());
        assert_eq!(graph.node(0).word_part.as_deref(), Some("edible mushroom"));
    }

    #[test]
    fn test_induced_copy_remaps_densely() {
        let graph = TripleGraph::from_triples(&[
            triple("?x", "<p>", "?y"),
            triple("?y", "<q>", "?z"),
            triple("?z", "<r>", "<o>"),
        ]);
        let sub = graph.induced(&[1, 2]);
        assert_eq!(sub.len(), 2);
        assert_eq!(sub.node(0).triple, triple("?y", "<q>", "?z"));
        assert_eq!(sub.node(1).triple, triple("?z", "<r>", "<o>"));
        assert_eq!(sub.adjacent(0), &[1]);
        assert_eq!(sub.adjacent(1), &[0]);
    }

    #[test]
    fn test_split_at_context_vars_orders_smaller_first() {
        // Two components connected only through the text clique at ?c:
        // component A = one triple, component B = two triples.
        let graph = TripleGraph::from_triples(&[
            triple("?a", "<p>", "?b"),
            triple("?b", "<q>", "?d"),
            triple("?a", HAS_CONTEXT_RELATION, "?c"),
            triple("?c", IN_CONTEXT_RELATION, "edible"),
            triple("?e", HAS_CONTEXT_RELATION, "?c"),
            triple("?e", "<r>", "<o>"),
        ]);
        let filters = vec![
            SparqlFilter::new("?a", "?b", FilterKind::Ne),
            SparqlFilter::new("?e", "?e", FilterKind::Eq),
        ];
        let parts = graph.split_at_context_vars(&filters).unwrap();
        assert_eq!(parts.len(), 2);
        assert!(parts[0].0.len() <= parts[1].0.len());
        assert_eq!(parts[0].0.len(), 1);
        assert_eq!(parts[1].0.len(), 2);
        // Filters follow their variables.
        assert_eq!(parts[0].1, vec![SparqlFilter::new("?e", "?e", FilterKind::Eq)]);
        assert_eq!(parts[1].1, vec![SparqlFilter::new("?a", "?b", FilterKind::Ne)]);
    }

    #[test]
    fn test_bfs_leave_out() {
        let graph = TripleGraph::from_triples(&[
            triple("?x", "<p>", "?y"),
            triple("?y", "<q>", "?z"),
            triple("?z", "<r>", "?w"),
        ]);
        let mut leave_out = FxHashSet::default();
        leave_out.insert(1);
        let reachable = graph.bfs_leave_out(0, &leave_out);
        assert_eq!(reachable, vec![0]);
    }

    #[test]
    fn test_display_lists_nodes_and_adjacency() {
        let graph =
            TripleGraph::from_triples(&[triple("?x", "<p>", "?y"), triple("?y", "<q>", "<o>")]);
        let rendered = graph.to_string();
        assert!(rendered.contains("0 ?x <p> ?y : (1)"));
        assert!(rendered.contains("1 ?y <q> <o> : (0)"));
    }
}
