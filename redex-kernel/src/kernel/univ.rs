use fxhash::FxBuildHasher;
use hashbrown::HashMap;
use indexmap::IndexSet;
use tracing::debug;

use super::{ConvPb, Error};
use crate::term::{Sort, Universe};

/// A constraint between two universe variables
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Constraint {
    /// `u = v`
    Eq(Universe, Universe),
    /// `u ≤ v`
    Le(Universe, Universe),
    /// `u < v`
    ///
    /// Conversion only ever produces `Eq` and `Le`; strict constraints come from declarations
    /// registered with [`UGraph::merge`].
    Lt(Universe, Universe),
}

impl Constraint {
    /// Whether this constraint holds in every model
    pub fn is_trivial(&self) -> bool {
        match self {
            Constraint::Eq(u, v) | Constraint::Le(u, v) => u == v,
            Constraint::Lt(..) => false,
        }
    }

    /// The constraint obtained by swapping the sides of a symmetric comparison
    ///
    /// Only equalities are symmetric; inequalities are returned unchanged.
    pub fn mirror(self) -> Self {
        match self {
            Constraint::Eq(u, v) => Constraint::Eq(v, u),
            c => c,
        }
    }
}

/// A set of universe constraints, in emission order
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ConstraintSet(IndexSet<Constraint, FxBuildHasher>);

impl ConstraintSet {
    /// Add a constraint to this set, ignoring trivial constraints
    ///
    /// Returns whether the set changed
    pub fn insert(&mut self, c: Constraint) -> bool {
        if c.is_trivial() {
            return false;
        }
        let inserted = self.0.insert(c);
        if inserted {
            debug!(constraint = ?c, "emitting universe constraint");
        }
        inserted
    }

    /// Get whether this set contains a constraint
    pub fn contains(&self, c: &Constraint) -> bool {
        self.0.contains(c)
    }

    /// Get the number of constraints in this set
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Get whether this set is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the constraints in this set, in emission order
    pub fn iter(&self) -> impl Iterator<Item = &Constraint> + '_ {
        self.0.iter()
    }

    /// Record the current state of this set
    pub fn snapshot(&self) -> usize {
        self.0.len()
    }

    /// Discard every constraint emitted since `snapshot`
    pub fn restore(&mut self, snapshot: usize) {
        self.0.truncate(snapshot)
    }

    /// Swap the sides of every equality in this set
    pub fn mirror(&self) -> ConstraintSet {
        self.iter().map(|c| c.mirror()).collect()
    }
}

impl FromIterator<Constraint> for ConstraintSet {
    fn from_iter<I: IntoIterator<Item = Constraint>>(iter: I) -> Self {
        let mut result = ConstraintSet::default();
        for c in iter {
            result.insert(c);
        }
        result
    }
}

impl Extend<Constraint> for ConstraintSet {
    fn extend<I: IntoIterator<Item = Constraint>>(&mut self, iter: I) {
        for c in iter {
            self.insert(c);
        }
    }
}

impl<'a> IntoIterator for &'a ConstraintSet {
    type Item = &'a Constraint;
    type IntoIter = indexmap::set::Iter<'a, Constraint>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Compare two sorts, recording the universe constraints needed for the comparison to hold
pub(crate) fn sort_cmp(
    pb: ConvPb,
    lhs: Sort,
    rhs: Sort,
    cu: &mut ConstraintSet,
) -> Result<(), Error> {
    match (pb, lhs, rhs) {
        (_, Sort::Prop, Sort::Prop) => Ok(()),
        (ConvPb::LessOrEqual, Sort::Prop, Sort::Type(_)) => Ok(()),
        (ConvPb::Equal, Sort::Type(u), Sort::Type(v)) => {
            cu.insert(Constraint::Eq(u, v));
            Ok(())
        }
        (ConvPb::LessOrEqual, Sort::Type(u), Sort::Type(v)) => {
            cu.insert(Constraint::Le(u, v));
            Ok(())
        }
        _ => Err(Error::NotConvertible),
    }
}

/// Compare two sorts
///
/// Returns the universe constraints under which `lhs` is equal to (or, for
/// [`ConvPb::LessOrEqual`], included in) `rhs`.
///
/// # Examples
/// ```
/// # use redex_kernel::kernel::*;
/// # use redex_kernel::term::*;
/// let (u, v) = (Universe(1), Universe(2));
/// assert!(compare_sorts(ConvPb::LessOrEqual, Sort::Prop, Sort::Type(u)).unwrap().is_empty());
/// assert_eq!(compare_sorts(ConvPb::Equal, Sort::Prop, Sort::Type(u)), Err(Error::NotConvertible));
/// let cs = compare_sorts(ConvPb::LessOrEqual, Sort::Type(u), Sort::Type(v)).unwrap();
/// assert!(cs.contains(&Constraint::Le(u, v)));
/// assert_eq!(compare_sorts(ConvPb::LessOrEqual, Sort::Type(u), Sort::Prop), Err(Error::NotConvertible));
/// ```
pub fn compare_sorts(pb: ConvPb, lhs: Sort, rhs: Sort) -> Result<ConstraintSet, Error> {
    let mut cu = ConstraintSet::default();
    sort_cmp(pb, lhs, rhs, &mut cu)?;
    Ok(cu)
}

/// A graph of universe constraints
///
/// The graph is consistent if and only if no strongly connected component contains a strict
/// edge: every such cycle would force some universe to be strictly below itself.
#[derive(Debug, Clone, Default)]
pub struct UGraph {
    constraints: IndexSet<Constraint, FxBuildHasher>,
}

impl UGraph {
    /// Merge a set of constraints into this graph
    ///
    /// If the result would be inconsistent, the graph is left unchanged.
    pub fn merge(&mut self, cs: &ConstraintSet) -> Result<(), Error> {
        let snapshot = self.snapshot();
        for c in cs {
            self.constraints.insert(*c);
        }
        if !self.is_consistent() {
            self.restore(snapshot);
            return Err(Error::InconsistentConstraints);
        }
        Ok(())
    }

    /// Check whether a set of constraints is consistent with this graph, without changing it
    pub fn check(&self, cs: &ConstraintSet) -> bool {
        let mut graph = self.clone();
        graph.merge(cs).is_ok()
    }

    /// Get the number of constraints recorded in this graph
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    /// Get whether this graph records no constraints
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Get whether this graph records a constraint
    pub fn contains(&self, c: &Constraint) -> bool {
        self.constraints.contains(c)
    }

    pub(crate) fn snapshot(&self) -> usize {
        self.constraints.len()
    }

    pub(crate) fn restore(&mut self, snapshot: usize) {
        self.constraints.truncate(snapshot)
    }

    /// Check this graph for a cycle through a strict edge
    pub fn is_consistent(&self) -> bool {
        let mut nodes: IndexSet<Universe, FxBuildHasher> = IndexSet::default();
        let mut edges: Vec<(usize, usize, bool)> = Vec::new();
        for c in &self.constraints {
            let (u, v, strict, sym) = match *c {
                Constraint::Eq(u, v) => (u, v, false, true),
                Constraint::Le(u, v) => (u, v, false, false),
                Constraint::Lt(u, v) => (u, v, true, false),
            };
            let (u, _) = nodes.insert_full(u);
            let (v, _) = nodes.insert_full(v);
            if strict && u == v {
                return false;
            }
            edges.push((u, v, strict));
            if sym {
                edges.push((v, u, false));
            }
        }
        let mut succ: HashMap<usize, Vec<usize>, FxBuildHasher> = HashMap::default();
        for &(u, v, _) in &edges {
            succ.entry(u).or_default().push(v);
        }
        let scc = Tarjan::new(nodes.len(), &succ).run();
        edges.iter().all(|&(u, v, strict)| !strict || scc[u] != scc[v])
    }
}

/// Tarjan's strongly connected components algorithm, with an explicit stack
struct Tarjan<'a> {
    succ: &'a HashMap<usize, Vec<usize>, FxBuildHasher>,
    index: Vec<Option<usize>>,
    low: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    component: Vec<usize>,
    next_index: usize,
    next_component: usize,
}

impl<'a> Tarjan<'a> {
    fn new(n: usize, succ: &'a HashMap<usize, Vec<usize>, FxBuildHasher>) -> Self {
        Tarjan {
            succ,
            index: vec![None; n],
            low: vec![0; n],
            on_stack: vec![false; n],
            stack: Vec::new(),
            component: vec![usize::MAX; n],
            next_index: 0,
            next_component: 0,
        }
    }

    fn successors(&self, v: usize) -> &'a [usize] {
        self.succ.get(&v).map_or(&[][..], |s| s.as_slice())
    }

    fn visit(&mut self, v: usize) {
        self.index[v] = Some(self.next_index);
        self.low[v] = self.next_index;
        self.next_index += 1;
        self.stack.push(v);
        self.on_stack[v] = true;
    }

    /// Returns the component of each node
    fn run(mut self) -> Vec<usize> {
        for root in 0..self.index.len() {
            if self.index[root].is_some() {
                continue;
            }
            self.visit(root);
            let mut work = vec![(root, 0usize)];
            while let Some(top) = work.last_mut() {
                let v = top.0;
                if let Some(&w) = self.successors(v).get(top.1) {
                    top.1 += 1;
                    match self.index[w] {
                        None => {
                            self.visit(w);
                            work.push((w, 0));
                        }
                        Some(iw) if self.on_stack[w] => self.low[v] = self.low[v].min(iw),
                        Some(_) => {}
                    }
                    continue;
                }
                work.pop();
                if let Some(&(parent, _)) = work.last() {
                    self.low[parent] = self.low[parent].min(self.low[v]);
                }
                if Some(self.low[v]) == self.index[v] {
                    while let Some(w) = self.stack.pop() {
                        self.on_stack[w] = false;
                        self.component[w] = self.next_component;
                        if w == v {
                            break;
                        }
                    }
                    self.next_component += 1;
                }
            }
        }
        self.component
    }
}
