//! Prefix tree over canonical element paths.
//!
//! Every valid sub-configuration of the supremum is materialised once by
//! [`Trie::from_configuration`]. After that, nodes are never created: verdicts
//! are written by [`Trie::mark`], dominance propagation forces verdicts onto
//! open nodes, and a node whose verdict is decided and whose children are all
//! invalid is itself invalidated. Invalidation travels upward on return from
//! the recursive walks, so a pruned region collapses in `O(depth)` per path.
//!
//! Nodes live in an arena indexed by [`NodeId`]; a child's `parent` index is
//! the only back-reference.

use std::time::Duration;

use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Configuration;
use crate::element::{render_path, Element};
use crate::verdict::Verdict;

pub type NodeId = usize;

const ROOT: NodeId = 0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrieError {
    /// The same configuration was found both TRUE and FALSE.
    #[error("contradictory verdicts for [{configuration}]: recorded {recorded}, incoming {incoming}")]
    Contradiction {
        configuration: String,
        recorded: Verdict,
        incoming: Verdict,
    },
    #[error("verdict {verdict} cannot be propagated")]
    Unpropagatable { verdict: Verdict },
}

/// What [`Trie::mark`] did with the incoming verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// The node was open and now carries the verdict and a boundary flag.
    Marked,
    /// The node was already decided with the same verdict.
    Confirmed,
    /// The node was already decided differently; the incoming verdict won.
    Overwritten { previous: Verdict },
    /// No configuration node exists at this path.
    Missing,
}

#[derive(Debug, Clone)]
struct Node {
    element: Option<Element>,
    valid: bool,
    /// `None` on pure prefix nodes.
    verdict: Option<Verdict>,
    min: bool,
    max: bool,
    duration: Option<Duration>,
    parent: Option<NodeId>,
    /// Sorted by element.
    children: Vec<NodeId>,
}

impl Node {
    fn new(element: Option<Element>, parent: Option<NodeId>) -> Self {
        Self {
            element,
            valid: true,
            verdict: None,
            min: false,
            max: false,
            duration: None,
            parent,
            children: Vec::new(),
        }
    }

    fn is_open(&self) -> bool {
        self.verdict.is_some_and(Verdict::is_open)
    }
}

/// A flagged configuration from the final trie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundaryEntry {
    pub configuration: Configuration,
    pub verdict: Verdict,
    #[serde(rename = "duration_secs", serialize_with = "serialize_secs")]
    pub duration: Duration,
}

fn serialize_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

/// The three boundary reports, in canonical trie order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Boundaries {
    /// Minimal configurations that ran out of time or memory.
    pub exhausted: Vec<BoundaryEntry>,
    /// Minimal FALSE or CANNOT configurations.
    pub failing: Vec<BoundaryEntry>,
    /// Maximal TRUE configurations.
    pub maximal: Vec<BoundaryEntry>,
}

#[derive(Debug, Clone)]
pub struct Trie {
    nodes: Vec<Node>,
    supremum: Configuration,
}

impl Trie {
    fn new(supremum: Configuration) -> Self {
        Self {
            nodes: vec![Node::new(None, None)],
            supremum,
        }
    }

    /// Materialise every valid configuration below `supremum`.
    pub fn from_configuration(supremum: Configuration) -> Self {
        let mut trie = Self::new(supremum);
        let flags = |set: bool| if set { vec![false, true] } else { vec![false] };
        for crypto in supremum.crypto().subsets() {
            for channel_mode in supremum.channel_mode().subsets() {
                for &reopen in &flags(supremum.reopen()) {
                    for security_mode in supremum.security_mode().subsets() {
                        for user_token in supremum.user_token().subsets() {
                            for &switch in &flags(supremum.switch()) {
                                for leaks in supremum.leaks().subsets() {
                                    // Empty mandatory facets are rejected here.
                                    if let Ok(c) = Configuration::new(
                                        crypto,
                                        channel_mode,
                                        reopen,
                                        security_mode,
                                        user_token,
                                        switch,
                                        leaks,
                                    ) {
                                        trie.insert(&c);
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
        debug!(
            supremum = %supremum,
            configurations = trie.configuration_count(),
            nodes = trie.nodes.len(),
            "materialised lattice"
        );
        trie
    }

    pub fn supremum(&self) -> &Configuration {
        &self.supremum
    }

    /// Add the path of `configuration`, ending in an `UNKNOWN` node. Only
    /// valid while materialising: nothing has been pruned yet.
    fn insert(&mut self, configuration: &Configuration) {
        let mut id = ROOT;
        for element in configuration.elements() {
            let children = &self.nodes[id].children;
            match children.binary_search_by(|&c| self.nodes[c].element.cmp(&Some(element))) {
                Ok(pos) => id = children[pos],
                Err(pos) => {
                    let child = self.nodes.len();
                    self.nodes.push(Node::new(Some(element), Some(id)));
                    self.nodes[id].children.insert(pos, child);
                    id = child;
                }
            }
        }
        self.nodes[id].verdict = Some(Verdict::Unknown);
    }

    /// Whether no open configuration is reachable through valid nodes.
    ///
    /// Pruning walks only revisit the region they settle, so a decided
    /// subtree may keep valid prefix nodes; those do not count.
    pub fn is_void(&self) -> bool {
        !self.reaches_open(ROOT)
    }

    fn reaches_open(&self, id: NodeId) -> bool {
        self.nodes[id].children.iter().any(|&c| {
            let node = &self.nodes[c];
            node.valid && (node.is_open() || self.reaches_open(c))
        })
    }

    /// Number of configurations still `UNKNOWN`.
    pub fn open_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.verdict == Some(Verdict::Unknown))
            .count()
    }

    pub fn configuration_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.verdict.is_some()).count()
    }

    /// Whether `configuration` belongs to the lattice at all, decided or not.
    pub fn contains(&self, configuration: &Configuration) -> bool {
        self.locate_any(&configuration.elements())
            .is_some_and(|id| self.nodes[id].verdict.is_some())
    }

    /// Current verdict at `path`, following invalid nodes too.
    pub fn verdict(&self, path: &[Element]) -> Option<Verdict> {
        self.locate_any(path).and_then(|id| self.nodes[id].verdict)
    }

    /// Whether `path` is reachable through valid nodes and still `UNKNOWN`.
    pub fn find(&self, path: &[Element]) -> bool {
        self.locate_valid(path)
            .is_some_and(|id| self.nodes[id].verdict == Some(Verdict::Unknown))
    }

    /// Claim an `UNKNOWN` configuration for testing.
    ///
    /// Callers must hold exclusive access to the trie (it is shared behind a
    /// mutex), which makes the check-and-set atomic.
    pub fn reserve(&mut self, path: &[Element]) -> bool {
        match self.locate_valid(path) {
            Some(id) if self.nodes[id].verdict == Some(Verdict::Unknown) => {
                self.nodes[id].verdict = Some(Verdict::Pending);
                true
            }
            _ => false,
        }
    }

    fn locate_valid(&self, path: &[Element]) -> Option<NodeId> {
        self.locate(path, true)
    }

    fn locate_any(&self, path: &[Element]) -> Option<NodeId> {
        self.locate(path, false)
    }

    fn locate(&self, path: &[Element], valid_only: bool) -> Option<NodeId> {
        let mut id = ROOT;
        for &element in path {
            id = *self.nodes[id].children.iter().find(|&&c| {
                let node = &self.nodes[c];
                node.element == Some(element) && (node.valid || !valid_only)
            })?;
        }
        Some(id)
    }

    /// Record a tested verdict.
    ///
    /// An open node takes the verdict, the duration and its boundary flag. For
    /// a node decided meanwhile, an equal verdict is confirmed and a
    /// TRUE/FALSE clash is an error. Any other difference is overwritten; a
    /// node that only carried a propagated verdict (no flag) then takes the
    /// flag of the tested one.
    pub fn mark(
        &mut self,
        path: &[Element],
        verdict: Verdict,
        duration: Duration,
    ) -> Result<MarkOutcome, TrieError> {
        let Some(id) = self.locate_any(path) else {
            warn!(path = %render_path(path), "mark could not find the configuration");
            return Ok(MarkOutcome::Missing);
        };
        let node = &mut self.nodes[id];
        match node.verdict {
            None => {
                warn!(path = %render_path(path), "mark reached a prefix node");
                Ok(MarkOutcome::Missing)
            }
            Some(current) if current.is_open() => {
                node.verdict = Some(verdict);
                node.duration = Some(duration);
                node.max = verdict == Verdict::True;
                node.min = verdict.is_failure();
                Ok(MarkOutcome::Marked)
            }
            Some(current) if current == verdict => Ok(MarkOutcome::Confirmed),
            Some(current) if current.contradicts(verdict) => Err(TrieError::Contradiction {
                configuration: describe(path),
                recorded: current,
                incoming: verdict,
            }),
            Some(current) => {
                warn!(
                    configuration = %describe(path),
                    previous = %current,
                    incoming = %verdict,
                    "overwriting a verdict decided concurrently"
                );
                if !node.max && !node.min {
                    node.max = verdict == Verdict::True;
                    node.min = verdict.is_failure();
                }
                node.verdict = Some(verdict);
                node.duration = Some(duration);
                Ok(MarkOutcome::Overwritten { previous: current })
            }
        }
    }

    /// Mark `path` and propagate the verdict through the lattice.
    ///
    /// TRUE settles everything weaker and clears `max` below; a failure
    /// settles everything stronger and clears `min` above.
    pub fn record(
        &mut self,
        path: &[Element],
        verdict: Verdict,
        duration: Duration,
    ) -> Result<MarkOutcome, TrieError> {
        if verdict != Verdict::True && !verdict.is_failure() {
            return Err(TrieError::Unpropagatable { verdict });
        }
        let outcome = self.mark(path, verdict, duration)?;
        if verdict == Verdict::True {
            self.delete_inferior_or_equal(path, verdict);
            self.unmark_inferior(path);
        } else {
            self.delete_superior_or_equal(path, verdict);
            self.unmark_superior(path);
        }
        Ok(outcome)
    }

    fn is_orphan(&self, id: NodeId) -> bool {
        let node = &self.nodes[id];
        !node.is_open() && !node.children.iter().any(|&c| self.nodes[c].valid)
    }

    /// Force `verdict` onto every open configuration `⊑ path`.
    pub fn delete_inferior_or_equal(&mut self, path: &[Element], verdict: Verdict) {
        debug!(path = %render_path(path), %verdict, "settling inferior configurations");
        self.prune_inferior(ROOT, path, verdict);
    }

    fn prune_inferior(&mut self, id: NodeId, rest: &[Element], verdict: Verdict) -> bool {
        let node = &mut self.nodes[id];
        if node.is_open() {
            node.verdict = Some(verdict);
            if node.children.is_empty() {
                return true;
            }
        }
        for i in 0..self.nodes[id].children.len() {
            let child = self.nodes[id].children[i];
            if !self.nodes[child].valid {
                continue;
            }
            let Some(element) = self.nodes[child].element else {
                continue;
            };
            if let Some(p) = rest.iter().position(|&e| e == element) {
                if self.prune_inferior(child, &rest[p + 1..], verdict) {
                    self.nodes[child].valid = false;
                }
            }
        }
        self.is_orphan(id)
    }

    /// Force `verdict` onto every open configuration `⊒ path`.
    pub fn delete_superior_or_equal(&mut self, path: &[Element], verdict: Verdict) {
        debug!(path = %render_path(path), %verdict, "settling superior configurations");
        self.prune_superior(ROOT, path, verdict);
    }

    fn prune_superior(&mut self, id: NodeId, rest: &[Element], verdict: Verdict) -> bool {
        let node = &mut self.nodes[id];
        if rest.is_empty() && node.is_open() {
            node.verdict = Some(verdict);
            if node.children.is_empty() {
                return true;
            }
        }
        for i in 0..self.nodes[id].children.len() {
            let child = self.nodes[id].children[i];
            if !self.nodes[child].valid {
                continue;
            }
            let Some(element) = self.nodes[child].element else {
                continue;
            };
            let next = match rest.split_first() {
                None => rest,
                Some((&head, tail)) if element == head => tail,
                Some((&head, _)) if element < head => rest,
                Some(_) => continue,
            };
            if self.prune_superior(child, next, verdict) {
                self.nodes[child].valid = false;
            }
        }
        self.is_orphan(id)
    }

    /// Clear `max` on every configuration strictly below `path`.
    pub fn unmark_inferior(&mut self, path: &[Element]) {
        self.clear_max_below(ROOT, path, true);
    }

    fn clear_max_below(&mut self, id: NodeId, rest: &[Element], on_path: bool) {
        let node = &mut self.nodes[id];
        if node.verdict.is_some() && !(on_path && rest.is_empty()) {
            node.max = false;
            if node.children.is_empty() {
                return;
            }
        }
        for i in 0..self.nodes[id].children.len() {
            let child = self.nodes[id].children[i];
            let Some(element) = self.nodes[child].element else {
                continue;
            };
            if let Some(p) = rest.iter().position(|&e| e == element) {
                self.clear_max_below(child, &rest[p + 1..], on_path && p == 0);
            }
        }
    }

    /// Clear `min` on every configuration strictly above `path`.
    pub fn unmark_superior(&mut self, path: &[Element]) {
        self.clear_min_above(ROOT, path, true);
    }

    fn clear_min_above(&mut self, id: NodeId, rest: &[Element], on_path: bool) {
        let node = &mut self.nodes[id];
        if rest.is_empty() && node.verdict.is_some() {
            if !on_path {
                node.min = false;
            }
            if node.children.is_empty() {
                return;
            }
        }
        for i in 0..self.nodes[id].children.len() {
            let child = self.nodes[id].children[i];
            let Some(element) = self.nodes[child].element else {
                continue;
            };
            match rest.split_first() {
                None => self.clear_min_above(child, rest, false),
                Some((&head, tail)) if element == head => {
                    self.clear_min_above(child, tail, on_path)
                }
                Some((&head, _)) if element < head => self.clear_min_above(child, rest, false),
                Some(_) => {}
            }
        }
    }

    /// Next configuration to test, if any remains.
    ///
    /// The first descent stays out of pending subtrees so concurrent workers
    /// spread over disjoint regions; the second one does not.
    pub fn first(&self) -> Option<Vec<Element>> {
        let mut path = Vec::new();
        if self.descend(ROOT, &mut path, true) {
            return Some(path);
        }
        path.clear();
        self.descend(ROOT, &mut path, false).then_some(path)
    }

    fn descend(&self, id: NodeId, path: &mut Vec<Element>, avoid_pending: bool) -> bool {
        let node = &self.nodes[id];
        if node.verdict == Some(Verdict::Unknown) {
            return true;
        }
        for &child in &node.children {
            let c = &self.nodes[child];
            if !c.valid || (avoid_pending && c.verdict == Some(Verdict::Pending)) {
                continue;
            }
            let Some(element) = c.element else {
                continue;
            };
            path.push(element);
            if self.descend(child, path, avoid_pending) {
                return true;
            }
            path.pop();
        }
        false
    }

    /// Path from the root to `id`, rebuilt through parent links.
    fn path_of(&self, mut id: NodeId) -> Vec<Element> {
        let mut path = Vec::new();
        while let Some(parent) = self.nodes[id].parent {
            path.extend(self.nodes[id].element);
            id = parent;
        }
        path.reverse();
        path
    }

    /// Flagged configurations, valid or not.
    pub fn boundaries(&self) -> Boundaries {
        let mut out = Boundaries::default();
        let mut stack: Vec<NodeId> = self.nodes[ROOT].children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            stack.extend(node.children.iter().rev().copied());
            let Some(verdict) = node.verdict else {
                continue;
            };
            let bucket = match verdict {
                Verdict::MemOut | Verdict::Timeout if node.min => &mut out.exhausted,
                Verdict::False | Verdict::Cannot if node.min => &mut out.failing,
                Verdict::True if node.max => &mut out.maximal,
                _ => continue,
            };
            if let Ok(configuration) = Configuration::from_elements(&self.path_of(id)) {
                bucket.push(BoundaryEntry {
                    configuration,
                    verdict,
                    duration: node.duration.unwrap_or_default(),
                });
            }
        }
        out
    }
}

fn describe(path: &[Element]) -> String {
    Configuration::from_elements(path)
        .map(|c| c.to_string())
        .unwrap_or_else(|_| render_path(path))
}
