//! Serializable operator-tree statistics for the tool-specific JSON
//! output.

use serde::Serialize;
use tessera_core::LimitOffset;
use tessera_query::{Operation, QueryExecutionTree};

/// One operator's statistics, nested like the tree itself.
#[derive(Clone, Debug, Serialize)]
pub struct RuntimeInformation {
    pub description: String,
    pub operation: String,
    /// Variable names in output-column order.
    pub columns: Vec<String>,
    pub size_estimate: usize,
    pub cost_estimate: usize,
    pub children: Vec<RuntimeInformation>,
}

impl RuntimeInformation {
    pub fn from_tree(tree: &QueryExecutionTree) -> RuntimeInformation {
        let mut columns: Vec<(usize, &String)> = tree
            .variable_columns()
            .iter()
            .map(|(variable, &col)| (col, variable))
            .collect();
        columns.sort();
        RuntimeInformation {
            description: describe(tree),
            operation: tree.kind().name().to_string(),
            columns: columns.into_iter().map(|(_, v)| v.clone()).collect(),
            size_estimate: tree.size_estimate(),
            cost_estimate: tree.cost_estimate(),
            children: tree
                .operation()
                .children()
                .into_iter()
                .map(|child| RuntimeInformation::from_tree(child))
                .collect(),
        }
    }

    /// Wrap with the LIMIT/OFFSET row the exported result was sliced by,
    /// when the clause is set.
    pub fn with_limit_offset_row(self, limit_offset: &LimitOffset) -> RuntimeInformation {
        if limit_offset.limit.is_none() && limit_offset.offset == 0 {
            return self;
        }
        let description = match limit_offset.limit {
            Some(limit) => format!("LIMIT {limit} OFFSET {}", limit_offset.offset),
            None => format!("OFFSET {}", limit_offset.offset),
        };
        RuntimeInformation {
            description,
            operation: "LIMIT".to_string(),
            columns: self.columns.clone(),
            size_estimate: self.size_estimate,
            cost_estimate: self.cost_estimate,
            children: vec![self],
        }
    }
}

fn describe(tree: &QueryExecutionTree) -> String {
    match tree.operation() {
        Operation::Scan(scan) => match (&scan.subject, &scan.object) {
            (Some(subject), _) => {
                format!("SCAN {:?} with P = {}, S = {subject}", scan.kind, scan.predicate)
            }
            (_, Some(object)) => {
                format!("SCAN {:?} with P = {}, O = {object}", scan.kind, scan.predicate)
            }
            _ => format!("SCAN {:?} with P = {}", scan.kind, scan.predicate),
        },
        Operation::Sort { column, .. } => format!("SORT on column {column}"),
        Operation::OrderBy { keys, .. } => {
            let rendered: Vec<String> = keys
                .iter()
                .map(|(col, desc)| format!("{col}{}", if *desc { " desc" } else { " asc" }))
                .collect();
            format!("ORDER BY on {}", rendered.join(", "))
        }
        Operation::Join {
            left_col,
            right_col,
            ..
        } => format!("JOIN on columns {left_col} = {right_col}"),
        Operation::Filter { kind, lhs_col, rhs_col, .. } => {
            format!("FILTER {kind:?} between columns {lhs_col} and {rhs_col}")
        }
        Operation::Distinct { keep_columns, .. } => {
            format!("DISTINCT on columns {keep_columns:?}")
        }
        Operation::TextWithoutFilter { words, .. } => {
            format!("TEXT OPERATION WITHOUT FILTER for \"{words}\"")
        }
        Operation::TextWithFilter { words, .. } => {
            format!("TEXT OPERATION WITH FILTER for \"{words}\"")
        }
        Operation::TextForEntities { words, .. } => {
            format!("TEXT OPERATION FOR ENTITIES for \"{words}\"")
        }
        Operation::TextForContexts { words, .. } => {
            format!("TEXT OPERATION FOR CONTEXTS for \"{words}\"")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_query::{IndexScan, ScanKind};

    fn scan_tree() -> QueryExecutionTree {
        let mut tree = QueryExecutionTree::new(Operation::Scan(IndexScan {
            kind: ScanKind::PosBoundO,
            subject: None,
            predicate: "<p>".to_string(),
            object: Some("<o>".to_string()),
            size_estimate: 3,
        }));
        tree.set_variable_column("?x", 0);
        tree
    }

    #[test]
    fn test_from_tree_carries_estimates_and_columns() {
        let info = RuntimeInformation::from_tree(&scan_tree());
        assert_eq!(info.operation, "SCAN");
        assert_eq!(info.columns, vec!["?x"]);
        assert_eq!(info.size_estimate, 3);
        assert!(info.children.is_empty());
    }

    #[test]
    fn test_limit_offset_row_wraps_only_when_set() {
        let info = RuntimeInformation::from_tree(&scan_tree());
        let unchanged = info.clone().with_limit_offset_row(&LimitOffset::default());
        assert_eq!(unchanged.operation, "SCAN");

        let wrapped = info.with_limit_offset_row(&LimitOffset::new(Some(2), 1));
        assert_eq!(wrapped.operation, "LIMIT");
        assert_eq!(wrapped.description, "LIMIT 2 OFFSET 1");
        assert_eq!(wrapped.children.len(), 1);
    }
}
