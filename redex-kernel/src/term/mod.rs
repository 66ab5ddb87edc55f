use smol_str::SmolStr;

mod store;
pub mod subst;

pub use store::*;

/// The name of a global constant, inductive type, or local variable
pub type Name = SmolStr;

/// A node making up a term
///
/// Bound variables are de Bruijn indices starting at 1. Every child of a node is tagged by
/// [`GNode::with_binders`] with the number of binders it lives under.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum GNode<T> {
    /// A sort
    Sort(Sort),
    /// A bound variable
    Rel(u32),
    /// A named local variable, declared in the environment's local context
    Var(Name),
    /// An application of a function to a nonempty list of arguments
    App(T, Box<[T]>),
    /// A lambda abstraction `[type, body]`
    Lambda([T; 2]),
    /// A dependent function type `[domain, codomain]`
    Prod([T; 2]),
    /// A let-binding `[value, type, body]`
    LetIn([T; 3]),
    /// A global constant
    Const(Name),
    /// An inductive type
    Ind(Name),
    /// The constructor of an inductive type with the given (0-based) index
    Construct(Name, u32),
    /// A case analysis `[motive, scrutinee]` with one branch per constructor
    Case(CaseInfo, [T; 2], Box<[T]>),
    /// A block of mutually recursive fixpoints: the types, then the bodies
    Fix(FixInfo, Box<[T]>, Box<[T]>),
    /// A block of mutually corecursive cofixpoints: the selected index, the types, then the bodies
    CoFix(u32, Box<[T]>, Box<[T]>),
}

/// The descriptor of a case analysis
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct CaseInfo {
    /// The inductive type being eliminated
    pub ind: Name,
    /// The number of parameters of the inductive type
    ///
    /// Parameters are dropped from a constructor's arguments before they are passed to a branch.
    pub npars: u32,
}

/// The descriptor of a fixpoint block
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct FixInfo {
    /// The function of the block this term denotes
    pub index: u32,
    /// For each function of the block, the 0-based position of its decreasing argument
    pub rec_args: Box<[u32]>,
}

impl FixInfo {
    /// Get the decreasing argument of the selected function
    pub fn rec_arg(&self) -> Option<u32> {
        self.rec_args.get(self.index as usize).copied()
    }
}

/// A universe variable
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Default)]
pub struct Universe(pub u32);

/// A sort
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Sort {
    /// The impredicative sort of propositions
    Prop,
    /// A predicative universe
    Type(Universe),
}

fn map_slice<T, U>(xs: Box<[T]>, f: impl FnMut(T) -> U) -> Box<[U]> {
    xs.into_vec().into_iter().map(f).collect()
}

fn map_slice_err<T, U, E>(xs: Box<[T]>, f: impl FnMut(T) -> Result<U, E>) -> Result<Box<[U]>, E> {
    xs.into_vec().into_iter().map(f).collect()
}

impl<T> GNode<T> {
    /// Map this node's index type
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> GNode<U> {
        match self {
            GNode::Sort(s) => GNode::Sort(s),
            GNode::Rel(k) => GNode::Rel(k),
            GNode::Var(x) => GNode::Var(x),
            GNode::App(x, xs) => {
                let x = f(x);
                GNode::App(x, map_slice(xs, &mut f))
            }
            GNode::Lambda([x, y]) => GNode::Lambda([f(x), f(y)]),
            GNode::Prod([x, y]) => GNode::Prod([f(x), f(y)]),
            GNode::LetIn([x, y, z]) => GNode::LetIn([f(x), f(y), f(z)]),
            GNode::Const(c) => GNode::Const(c),
            GNode::Ind(i) => GNode::Ind(i),
            GNode::Construct(i, j) => GNode::Construct(i, j),
            GNode::Case(ci, [x, y], bs) => {
                let xy = [f(x), f(y)];
                GNode::Case(ci, xy, map_slice(bs, &mut f))
            }
            GNode::Fix(fi, tys, bds) => {
                let tys = map_slice(tys, &mut f);
                GNode::Fix(fi, tys, map_slice(bds, &mut f))
            }
            GNode::CoFix(i, tys, bds) => {
                let tys = map_slice(tys, &mut f);
                GNode::CoFix(i, tys, map_slice(bds, &mut f))
            }
        }
    }

    /// Map this node's index type, or error
    pub fn map_err<U, E>(self, mut f: impl FnMut(T) -> Result<U, E>) -> Result<GNode<U>, E> {
        match self {
            GNode::Sort(s) => Ok(GNode::Sort(s)),
            GNode::Rel(k) => Ok(GNode::Rel(k)),
            GNode::Var(x) => Ok(GNode::Var(x)),
            GNode::App(x, xs) => {
                let x = f(x)?;
                Ok(GNode::App(x, map_slice_err(xs, &mut f)?))
            }
            GNode::Lambda([x, y]) => Ok(GNode::Lambda([f(x)?, f(y)?])),
            GNode::Prod([x, y]) => Ok(GNode::Prod([f(x)?, f(y)?])),
            GNode::LetIn([x, y, z]) => Ok(GNode::LetIn([f(x)?, f(y)?, f(z)?])),
            GNode::Const(c) => Ok(GNode::Const(c)),
            GNode::Ind(i) => Ok(GNode::Ind(i)),
            GNode::Construct(i, j) => Ok(GNode::Construct(i, j)),
            GNode::Case(ci, [x, y], bs) => {
                let xy = [f(x)?, f(y)?];
                Ok(GNode::Case(ci, xy, map_slice_err(bs, &mut f)?))
            }
            GNode::Fix(fi, tys, bds) => {
                let tys = map_slice_err(tys, &mut f)?;
                Ok(GNode::Fix(fi, tys, map_slice_err(bds, &mut f)?))
            }
            GNode::CoFix(i, tys, bds) => {
                let tys = map_slice_err(tys, &mut f)?;
                Ok(GNode::CoFix(i, tys, map_slice_err(bds, &mut f)?))
            }
        }
    }

    /// Annotate this node's indices with their binders
    pub fn with_binders(self) -> GNode<(u32, T)> {
        match self {
            GNode::Lambda([x, y]) => GNode::Lambda([(0, x), (1, y)]),
            GNode::Prod([x, y]) => GNode::Prod([(0, x), (1, y)]),
            GNode::LetIn([x, y, z]) => GNode::LetIn([(0, x), (0, y), (1, z)]),
            GNode::Fix(fi, tys, bds) => {
                let n = bds.len() as u32;
                GNode::Fix(fi, map_slice(tys, |x| (0, x)), map_slice(bds, |x| (n, x)))
            }
            GNode::CoFix(i, tys, bds) => {
                let n = bds.len() as u32;
                GNode::CoFix(i, map_slice(tys, |x| (0, x)), map_slice(bds, |x| (n, x)))
            }
            node => node.map(|x| (0, x)),
        }
    }

    /// Visit this node's children, together with the number of binders each lives under
    pub fn for_each_child(&self, mut f: impl FnMut(u32, &T)) {
        match self {
            GNode::Sort(_)
            | GNode::Rel(_)
            | GNode::Var(_)
            | GNode::Const(_)
            | GNode::Ind(_)
            | GNode::Construct(..) => {}
            GNode::App(x, xs) => {
                f(0, x);
                xs.iter().for_each(|x| f(0, x));
            }
            GNode::Lambda([x, y]) | GNode::Prod([x, y]) => {
                f(0, x);
                f(1, y);
            }
            GNode::LetIn([x, y, z]) => {
                f(0, x);
                f(0, y);
                f(1, z);
            }
            GNode::Case(_, [x, y], bs) => {
                f(0, x);
                f(0, y);
                bs.iter().for_each(|b| f(0, b));
            }
            GNode::Fix(_, tys, bds) | GNode::CoFix(_, tys, bds) => {
                let n = bds.len() as u32;
                tys.iter().for_each(|t| f(0, t));
                bds.iter().for_each(|b| f(n, b));
            }
        }
    }
}
