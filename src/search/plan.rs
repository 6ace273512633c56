use std::fmt;
use serde::{Serialize, Deserialize};
use crate::core::error::Result;

/// One step of an evaluation plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanStep {
    /// Answered by a registered index
    Index { index: String, query: String },
    /// No index could answer; every object is tested
    Scan { query: String },
    /// First child is iterated, later children are membership filters
    Intersection,
    /// Children exclude objects from the enclosing intersection
    Exclude,
    Union { deduplicated: bool },
    /// Left child minus right child
    Difference,
    All,
    Empty,
}

/// Description of how a `ResultSet` will be produced, as chosen at retrieve time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanNode {
    pub step: PlanStep,
    pub retrieval_cost: u32,
    pub merge_cost: u64,
    pub children: Vec<PlanNode>,
}

impl PlanNode {
    pub fn leaf(step: PlanStep, retrieval_cost: u32, merge_cost: u64) -> Self {
        PlanNode { step, retrieval_cost, merge_cost, children: Vec::new() }
    }

    pub fn with_children(step: PlanStep, retrieval_cost: u32, merge_cost: u64, children: Vec<PlanNode>) -> Self {
        PlanNode { step, retrieval_cost, merge_cost, children }
    }

    /// Names of the indexes used, in evaluation order
    pub fn indexes_used(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_indexes(&mut names);
        names
    }

    fn collect_indexes<'a>(&'a self, names: &mut Vec<&'a str>) {
        if let PlanStep::Index { index, .. } = &self.step {
            names.push(index.as_str());
        }
        for child in &self.children {
            child.collect_indexes(names);
        }
    }

    pub fn uses_scan(&self) -> bool {
        matches!(self.step, PlanStep::Scan { .. }) || self.children.iter().any(PlanNode::uses_scan)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn render(&self, f: &mut fmt::Formatter, depth: usize) -> fmt::Result {
        let indent = "  ".repeat(depth);
        match &self.step {
            PlanStep::Index { index, query } => write!(f, "{}Index[{}] {}", indent, index, query)?,
            PlanStep::Scan { query } => write!(f, "{}Scan {}", indent, query)?,
            PlanStep::Union { deduplicated } => {
                write!(f, "{}Union{}", indent, if *deduplicated { " (dedup)" } else { "" })?
            }
            step => write!(f, "{}{:?}", indent, step)?,
        }
        writeln!(f, " retrieval={} merge={}", self.retrieval_cost, self.merge_cost)?;
        for child in &self.children {
            child.render(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for PlanNode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.render(f, 0)
    }
}
