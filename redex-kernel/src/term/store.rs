use fxhash::FxBuildHasher;
use indexmap::IndexSet;

use super::*;

/// A handle for a term in a [`TermStore`]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[repr(transparent)]
pub struct TermId(u32);

impl TermId {
    pub fn ix(&self) -> usize {
        self.0 as usize
    }
}

/// A node in a term
pub type Node = GNode<TermId>;

/// A hash-consed store of terms
///
/// Structurally equal terms are always assigned the same [`TermId`]. Terms are never removed or
/// modified once inserted.
#[derive(Debug, Clone, Default)]
pub struct TermStore {
    nodes: IndexSet<Node, FxBuildHasher>,
    data: Vec<TermData>,
}

#[derive(Debug, Copy, Clone, Default)]
struct TermData {
    /// An exclusive upper bound on this term's loose bound variables
    bv: u32,
}

impl TermStore {
    /// Insert a node into the store
    ///
    /// # Panics
    /// If the store holds more than `u32::MAX` terms
    pub fn add(&mut self, node: Node) -> TermId {
        if let Some(ix) = self.nodes.get_index_of(&node) {
            return TermId(ix as u32);
        }
        let bv = self.node_bv(&node);
        let (ix, _) = self.nodes.insert_full(node);
        self.data.push(TermData { bv });
        TermId(u32::try_from(ix).expect("term store overflow"))
    }

    /// Insert a node, flattening an application whose head is itself an application
    pub(crate) fn add_flat(&mut self, node: Node) -> TermId {
        match node {
            GNode::App(f, args) => self.app(f, args.into_vec()),
            node => self.add(node),
        }
    }

    /// Get the node corresponding to a term
    pub fn node(&self, tm: TermId) -> &Node {
        &self.nodes[tm.ix()]
    }

    /// Try to lookup a node in this store
    pub fn lookup(&self, node: &Node) -> Option<TermId> {
        self.nodes.get_index_of(node).map(|ix| TermId(ix as u32))
    }

    /// Get the upper bound for this term's bound variables
    pub fn bv(&self, tm: TermId) -> u32 {
        self.data[tm.ix()].bv
    }

    /// Get whether a term is closed, i.e. has no loose bound variables
    pub fn is_closed(&self, tm: TermId) -> bool {
        self.bv(tm) == 0
    }

    /// Get the number of terms in this store
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Get whether this store is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn node_bv(&self, node: &Node) -> u32 {
        if let GNode::Rel(k) = node {
            return *k;
        }
        let mut bv = 0;
        node.for_each_child(|binders, child| bv = bv.max(self.bv(*child).saturating_sub(binders)));
        bv
    }

    /// Split a term into its head and arguments
    pub fn decompose_app(&self, tm: TermId) -> (TermId, &[TermId]) {
        match self.node(tm) {
            GNode::App(f, args) => (*f, &args[..]),
            _ => (tm, &[]),
        }
    }
}

/// # Term construction
///
/// Shorthands for inserting common nodes
impl TermStore {
    /// Insert a sort
    pub fn sort(&mut self, sort: Sort) -> TermId {
        self.add(GNode::Sort(sort))
    }

    /// Insert the sort of propositions
    pub fn prop(&mut self) -> TermId {
        self.sort(Sort::Prop)
    }

    /// Insert the predicative sort at universe `u`
    pub fn type_(&mut self, u: u32) -> TermId {
        self.sort(Sort::Type(Universe(u)))
    }

    /// Insert a bound variable
    ///
    /// # Example
    /// ```
    /// # use redex_kernel::term::*;
    /// # let mut store = TermStore::default();
    /// let x = store.rel(2);
    /// let ty = store.prop();
    /// let lam = store.lambda(ty, x);
    /// assert_eq!(store.bv(x), 2);
    /// assert_eq!(store.bv(lam), 1);
    /// assert!(store.is_closed(ty));
    /// ```
    pub fn rel(&mut self, k: u32) -> TermId {
        self.add(GNode::Rel(k))
    }

    /// Insert a named local variable
    pub fn var(&mut self, name: impl Into<Name>) -> TermId {
        self.add(GNode::Var(name.into()))
    }

    /// Insert a global constant
    pub fn constant(&mut self, name: impl Into<Name>) -> TermId {
        self.add(GNode::Const(name.into()))
    }

    /// Insert an inductive type
    pub fn ind(&mut self, name: impl Into<Name>) -> TermId {
        self.add(GNode::Ind(name.into()))
    }

    /// Insert a constructor
    pub fn construct(&mut self, ind: impl Into<Name>, ix: u32) -> TermId {
        self.add(GNode::Construct(ind.into(), ix))
    }

    /// Insert an application
    ///
    /// Nested applications are flattened, and applying a function to no arguments returns it
    /// unchanged.
    ///
    /// # Example
    /// ```
    /// # use redex_kernel::term::*;
    /// # let mut store = TermStore::default();
    /// let f = store.constant("f");
    /// let a = store.constant("a");
    /// let b = store.constant("b");
    /// let fa = store.app(f, [a]);
    /// let fab = store.app(fa, [b]);
    /// assert_eq!(fab, store.app(f, [a, b]));
    /// assert_eq!(store.app(f, []), f);
    /// ```
    pub fn app(&mut self, func: TermId, args: impl IntoIterator<Item = TermId>) -> TermId {
        let mut args = args.into_iter().peekable();
        if args.peek().is_none() {
            return func;
        }
        let (head, prefix) = self.decompose_app(func);
        let all: Box<[TermId]> = prefix.iter().copied().chain(args).collect();
        self.add(GNode::App(head, all))
    }

    /// Insert a lambda abstraction
    pub fn lambda(&mut self, ty: TermId, body: TermId) -> TermId {
        self.add(GNode::Lambda([ty, body]))
    }

    /// Insert a dependent function type
    pub fn prod(&mut self, dom: TermId, codom: TermId) -> TermId {
        self.add(GNode::Prod([dom, codom]))
    }

    /// Insert a let-binding
    pub fn let_in(&mut self, value: TermId, ty: TermId, body: TermId) -> TermId {
        self.add(GNode::LetIn([value, ty, body]))
    }

    /// Insert a case analysis
    pub fn case(
        &mut self,
        info: CaseInfo,
        motive: TermId,
        scrutinee: TermId,
        branches: impl IntoIterator<Item = TermId>,
    ) -> TermId {
        self.add(GNode::Case(info, [motive, scrutinee], branches.into_iter().collect()))
    }

    /// Insert a fixpoint block
    pub fn fix(
        &mut self,
        info: FixInfo,
        tys: impl IntoIterator<Item = TermId>,
        bodies: impl IntoIterator<Item = TermId>,
    ) -> TermId {
        self.add(GNode::Fix(info, tys.into_iter().collect(), bodies.into_iter().collect()))
    }

    /// Insert a cofixpoint block
    pub fn cofix(
        &mut self,
        index: u32,
        tys: impl IntoIterator<Item = TermId>,
        bodies: impl IntoIterator<Item = TermId>,
    ) -> TermId {
        self.add(GNode::CoFix(index, tys.into_iter().collect(), bodies.into_iter().collect()))
    }
}
