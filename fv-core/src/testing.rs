//! Hierarchical test reporting and field comparisons.
//!
//! [`Testing`] records a tree of named checks. Each check is opened with
//! [`begin`](Testing::begin), may be marked failed any number of times, and
//! is closed with [`end`](Testing::end). A check fails if it or any nested
//! check failed.

use crate::field::Field;
use crate::types::Value;
use approx::relative_eq;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
pub struct TestNode {
    pub name: String,
    pub parent: Option<usize>,
    pub failures: usize,
    pub duration: Option<Duration>,
}

#[derive(Debug, Clone, Default)]
pub struct Testing {
    nodes: Vec<TestNode>,
    open: Vec<usize>,
}

impl Testing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a check nested under the innermost open one.
    pub fn begin(&mut self, name: impl Into<String>) -> usize {
        let id = self.nodes.len();
        let name = name.into();
        log::debug!("begin {}", name);
        self.nodes.push(TestNode {
            name,
            parent: self.open.last().copied(),
            failures: 0,
            duration: None,
        });
        self.open.push(id);
        id
    }

    /// Mark the innermost open check failed.
    pub fn fail(&mut self) {
        match self.open.last() {
            Some(&id) => {
                self.nodes[id].failures += 1;
                log::warn!("check '{}' failed", self.nodes[id].name);
            }
            None => log::warn!("fail() called with no open check"),
        }
    }

    /// Close the innermost open check.
    pub fn end(&mut self, duration: Duration) {
        if let Some(id) = self.open.pop() {
            self.nodes[id].duration = Some(duration);
            log::debug!(
                "end {} ({} failures, {:?})",
                self.nodes[id].name,
                self.nodes[id].failures,
                duration
            );
        }
    }

    /// Run `f` inside a timed check.
    pub fn scope<R>(&mut self, name: impl Into<String>, f: impl FnOnce(&mut Testing) -> R) -> R {
        let start = Instant::now();
        self.begin(name);
        let result = f(self);
        self.end(start.elapsed());
        result
    }

    pub fn node(&self, id: usize) -> Option<&TestNode> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> &[TestNode] {
        &self.nodes
    }

    /// True if check `id` or any check nested in it failed.
    pub fn failed(&self, id: usize) -> bool {
        self.nodes.iter().enumerate().any(|(i, n)| n.failures > 0 && self.is_within(i, id))
    }

    /// True if any recorded check failed.
    pub fn any_failed(&self) -> bool {
        self.nodes.iter().any(|n| n.failures > 0)
    }

    fn is_within(&self, mut node: usize, ancestor: usize) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.nodes[node].parent {
                Some(p) => node = p,
                None => return false,
            }
        }
    }
}

/// Compare two fields component-wise and record a failure on mismatch.
///
/// Components match when their relative difference is within `tolerance`,
/// or their absolute difference is for values near zero. A length mismatch
/// is a failure. Returns whether the fields matched.
pub fn assert_almost_eq<V: Value>(
    testing: &mut Testing,
    field: &Field<V>,
    reference: &Field<V>,
    tolerance: f64,
) -> bool {
    if field.len() != reference.len() {
        log::warn!(
            "field length {} differs from reference length {}",
            field.len(),
            reference.len()
        );
        testing.fail();
        return false;
    }

    let mismatch = field.iter().zip(reference).enumerate().find_map(|(i, (a, b))| {
        (0..V::DIM)
            .find(|&axis| {
                !relative_eq!(
                    a.axis(axis),
                    b.axis(axis),
                    epsilon = tolerance,
                    max_relative = tolerance
                )
            })
            .map(|axis| (i, axis))
    });

    match mismatch {
        Some((i, axis)) => {
            log::warn!(
                "entry {} axis {}: {} vs reference {}",
                i,
                axis,
                field[i].axis(axis),
                reference[i].axis(axis)
            );
            testing.fail();
            false
        }
        None => true,
    }
}
