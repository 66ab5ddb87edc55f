use thiserror::Error;
use tracing::instrument;

mod closure;
mod config;
mod conv;
mod env;
pub mod esubst;
mod oracle;
mod stack;
mod univ;
mod whnf;

pub use closure::TableKey;
pub use config::{ConvOptions, IndEquiv, Interrupt, Limits, RedFlags, SyntacticIndEquiv};
pub use conv::ConvPb;
pub use env::{ConstantBody, ConstructorBody, Env, EnvSnapshot, InductiveBody, LocalDecl};
pub use oracle::{Level, Oracle};
pub use univ::{Constraint, ConstraintSet, UGraph, compare_sorts};
pub use whnf::Stats;

use crate::term::{GNode, Name, Node, Sort, TermId, TermStore};
use conv::Converter;
use whnf::Machine;

/// An instance of the `redex` kernel
///
/// A kernel owns a store of hash-consed terms, a typing environment and the unfolding oracle used
/// by conversion. Every reduction or conversion call runs its own machine, whose closures are
/// discarded once the call returns.
#[derive(Debug, Default, Clone)]
pub struct Kernel {
    store: TermStore,
    env: Env,
    oracle: Oracle,
}

/// # Term Management
///
/// Functions for creating and inspecting terms
impl Kernel {
    /// Insert a node
    ///
    /// # Examples
    /// ```
    /// # use redex_kernel::kernel::*;
    /// # use redex_kernel::term::*;
    /// # let mut ker = Kernel::default();
    /// let x = ker.add(GNode::Rel(1));
    /// let u = ker.add(GNode::Sort(Sort::Prop));
    /// let lam = ker.add(GNode::Lambda([u, x]));
    /// assert_eq!(*ker.node(x), GNode::Rel(1));
    /// assert_eq!(*ker.node(lam), GNode::Lambda([u, x]));
    /// assert_eq!(ker.add(GNode::Lambda([u, x])), lam);
    /// ```
    pub fn add(&mut self, node: Node) -> TermId {
        self.store.add(node)
    }

    /// Get the node corresponding to a term
    pub fn node(&self, tm: TermId) -> &Node {
        self.store.node(tm)
    }

    /// Try to lookup a node
    pub fn lookup(&self, node: &Node) -> Option<TermId> {
        self.store.lookup(node)
    }

    /// Get this kernel's term store
    pub fn store(&self) -> &TermStore {
        &self.store
    }

    /// Get this kernel's term store mutably
    pub fn store_mut(&mut self) -> &mut TermStore {
        &mut self.store
    }
}

/// # Environment
///
/// Functions for extending and inspecting the typing environment
impl Kernel {
    /// Get this kernel's environment
    pub fn env(&self) -> &Env {
        &self.env
    }

    /// Declare a global constant
    ///
    /// # Examples
    /// ```
    /// # use redex_kernel::kernel::*;
    /// # let mut ker = Kernel::default();
    /// let ty = ker.type_(0);
    /// let x = ker.rel(1);
    /// let id = ker.lambda(ty, x);
    /// ker.add_constant("id", ty, Some(id), false).unwrap();
    /// assert_eq!(ker.env().constant_body(&"id".into()), Ok(Some(id)));
    /// assert_eq!(
    ///     ker.add_constant("id", ty, None, false),
    ///     Err(Error::AlreadyDeclared("id".into()))
    /// );
    /// ```
    pub fn add_constant(
        &mut self,
        name: impl Into<Name>,
        ty: TermId,
        body: Option<TermId>,
        opaque: bool,
    ) -> Result<(), Error> {
        self.env.add_constant(name.into(), ty, body, opaque)
    }

    /// Declare a global constant without a definition
    pub fn add_axiom(&mut self, name: impl Into<Name>, ty: TermId) -> Result<(), Error> {
        self.env.add_axiom(name.into(), ty)
    }

    /// Declare an inductive type
    pub fn add_inductive(&mut self, name: impl Into<Name>, body: InductiveBody) -> Result<(), Error> {
        self.env.add_inductive(name.into(), body)
    }

    /// Push a declaration onto the local context
    pub fn push_local(
        &mut self,
        name: impl Into<Name>,
        ty: TermId,
        body: Option<TermId>,
    ) -> Result<(), Error> {
        self.env.push_local(name.into(), ty, body)
    }

    /// Merge universe constraints into the environment's universe graph
    ///
    /// # Examples
    /// ```
    /// # use redex_kernel::kernel::*;
    /// # use redex_kernel::term::*;
    /// # let mut ker = Kernel::default();
    /// let (u, v) = (Universe(1), Universe(2));
    /// let lt: ConstraintSet = [Constraint::Lt(u, v)].into_iter().collect();
    /// ker.add_constraints(&lt).unwrap();
    /// let le: ConstraintSet = [Constraint::Le(v, u)].into_iter().collect();
    /// assert_eq!(ker.add_constraints(&le), Err(Error::InconsistentConstraints));
    /// assert!(ker.env().universes().contains(&Constraint::Lt(u, v)));
    /// assert!(!ker.env().universes().contains(&Constraint::Le(v, u)));
    /// ```
    pub fn add_constraints(&mut self, cs: &ConstraintSet) -> Result<(), Error> {
        self.env.add_constraints(cs)
    }

    /// Record the current state of the environment
    pub fn snapshot(&self) -> EnvSnapshot {
        self.env.snapshot()
    }

    /// Discard every declaration and constraint added since `snapshot` was taken
    ///
    /// # Examples
    /// ```
    /// # use redex_kernel::kernel::*;
    /// # let mut ker = Kernel::default();
    /// let ty = ker.type_(0);
    /// let snapshot = ker.snapshot();
    /// ker.add_axiom("a", ty).unwrap();
    /// assert!(ker.env().constant(&"a".into()).is_ok());
    /// ker.restore(snapshot);
    /// assert_eq!(ker.env().constant(&"a".into()), Err(Error::UnknownConstant("a".into())));
    /// ```
    pub fn restore(&mut self, snapshot: EnvSnapshot) {
        self.env.restore(snapshot)
    }

    /// Get this kernel's unfolding oracle
    pub fn oracle(&self) -> &Oracle {
        &self.oracle
    }

    /// Set the unfolding strategy of a constant
    pub fn set_strategy(&mut self, name: impl Into<Name>, level: Level) {
        self.oracle.set_strategy(name.into(), level)
    }

    /// Set the unfolding strategy of a local variable
    pub fn set_var_strategy(&mut self, name: impl Into<Name>, level: Level) {
        self.oracle.set_var_strategy(name.into(), level)
    }
}

/// # Reduction
///
/// Functions for computing normal forms
impl Kernel {
    /// Compute the weak head normal form of a term
    ///
    /// # Examples
    /// ```
    /// # use redex_kernel::kernel::*;
    /// # let mut ker = Kernel::default();
    /// let ty = ker.type_(0);
    /// ker.add_axiom("a", ty).unwrap();
    /// let x = ker.rel(1);
    /// let id = ker.lambda(ty, x);
    /// let a = ker.constant("a");
    /// let t = ker.app(id, [a]);
    /// assert_eq!(ker.whnf(RedFlags::ALL, t), Ok(a));
    /// assert_eq!(ker.whnf(RedFlags::NONE, t), Ok(t));
    /// ```
    pub fn whnf(&mut self, flags: RedFlags, tm: TermId) -> Result<TermId, Error> {
        Ok(self.whnf_with(flags, Limits::default(), tm)?.0)
    }

    /// Compute the weak head normal form of a term, counting the reductions performed
    pub fn whnf_with_stats(&mut self, flags: RedFlags, tm: TermId) -> Result<(TermId, Stats), Error> {
        self.whnf_with(flags, Limits::default(), tm)
    }

    /// Compute the weak head normal form of a term under some limits
    pub fn whnf_with(
        &mut self,
        flags: RedFlags,
        limits: Limits<'_>,
        tm: TermId,
    ) -> Result<(TermId, Stats), Error> {
        let mut m = Machine::new(&mut self.store, &self.env, flags, limits);
        let result = m.whnf(tm)?;
        Ok((result, m.stats()))
    }

    /// Compute the normal form of a term
    ///
    /// # Examples
    /// ```
    /// # use redex_kernel::kernel::*;
    /// # let mut ker = Kernel::default();
    /// let ty = ker.type_(0);
    /// let x = ker.rel(1);
    /// let id = ker.lambda(ty, x);
    /// ker.add_constant("id", ty, Some(id), false).unwrap();
    /// // λ (y : Type0). id y
    /// let c = ker.constant("id");
    /// let y = ker.rel(1);
    /// let body = ker.app(c, [y]);
    /// let t = ker.lambda(ty, body);
    /// assert_eq!(ker.nf(RedFlags::ALL, t), Ok(id));
    /// assert_eq!(ker.nf(RedFlags::BETAIOTAZETA, t), Ok(t));
    /// ```
    pub fn nf(&mut self, flags: RedFlags, tm: TermId) -> Result<TermId, Error> {
        Ok(self.nf_with(flags, Limits::default(), tm)?.0)
    }

    /// Compute the normal form of a term, counting the reductions performed
    pub fn nf_with_stats(&mut self, flags: RedFlags, tm: TermId) -> Result<(TermId, Stats), Error> {
        self.nf_with(flags, Limits::default(), tm)
    }

    /// Compute the normal form of a term under some limits
    pub fn nf_with(
        &mut self,
        flags: RedFlags,
        limits: Limits<'_>,
        tm: TermId,
    ) -> Result<(TermId, Stats), Error> {
        let mut m = Machine::new(&mut self.store, &self.env, flags, limits);
        let result = m.nf(tm)?;
        Ok((result, m.stats()))
    }

    /// Reduce a term to a dependent function type
    ///
    /// Returns the domain and codomain
    pub fn reduce_to_prod(&mut self, tm: TermId) -> Result<(TermId, TermId), Error> {
        let tm = self.whnf(RedFlags::ALL, tm)?;
        match *self.store.node(tm) {
            GNode::Prod([dom, codom]) => Ok((dom, codom)),
            _ => Err(Error::NotAProduct),
        }
    }

    /// Reduce a term to an arity, i.e. a chain of dependent function types ending in a sort
    ///
    /// Returns the domains, outermost first, and the final sort
    ///
    /// # Examples
    /// ```
    /// # use redex_kernel::kernel::*;
    /// # use redex_kernel::term::*;
    /// # let mut ker = Kernel::default();
    /// let ty = ker.type_(0);
    /// let prop = ker.prop();
    /// let arity = ker.prod(ty, prop);
    /// ker.add_constant("Pred", ty, Some(arity), false).unwrap();
    /// let pred = ker.constant("Pred");
    /// assert_eq!(ker.reduce_to_arity(pred), Ok((vec![ty], Sort::Prop)));
    /// assert_eq!(ker.reduce_to_prod(prop), Err(Error::NotAProduct));
    /// let x = ker.rel(1);
    /// assert_eq!(ker.reduce_to_arity(x), Err(Error::NotAnArity));
    /// ```
    pub fn reduce_to_arity(&mut self, tm: TermId) -> Result<(Vec<TermId>, Sort), Error> {
        let mut doms = Vec::new();
        let mut tm = tm;
        loop {
            tm = self.whnf(RedFlags::ALL, tm)?;
            match *self.store.node(tm) {
                GNode::Prod([dom, codom]) => {
                    doms.push(dom);
                    tm = codom;
                }
                GNode::Sort(s) => return Ok((doms, s)),
                _ => return Err(Error::NotAnArity),
            }
        }
    }
}

/// # Conversion
///
/// Functions for deciding definitional equality and cumulativity
impl Kernel {
    /// Check whether two terms are convertible, using this kernel's oracle
    ///
    /// Returns the universe constraints under which `lhs` is equal to (or, for
    /// [`ConvPb::LessOrEqual`], a subtype of) `rhs`. These are not added to the environment.
    ///
    /// # Examples
    /// ```
    /// # use redex_kernel::kernel::*;
    /// # use redex_kernel::term::*;
    /// # let mut ker = Kernel::default();
    /// let prop = ker.prop();
    /// let ty = ker.type_(1);
    /// assert!(ker.convert(ConvPb::LessOrEqual, prop, ty).unwrap().is_empty());
    /// assert_eq!(ker.convert(ConvPb::Equal, prop, ty), Err(Error::NotConvertible));
    /// let ty2 = ker.type_(2);
    /// let cs = ker.convert(ConvPb::LessOrEqual, ty, ty2).unwrap();
    /// assert!(cs.contains(&Constraint::Le(Universe(1), Universe(2))));
    /// ```
    pub fn convert(&mut self, pb: ConvPb, lhs: TermId, rhs: TermId) -> Result<ConstraintSet, Error> {
        let oracle = &self.oracle;
        Self::convert_in(
            &mut self.store,
            &self.env,
            ConvOptions::new(oracle),
            pb,
            lhs,
            rhs,
        )
        .map(|(cs, _)| cs)
    }

    /// Check whether two terms are convertible
    ///
    /// The options carry their own oracle; use a clone of [`Kernel::oracle`] to get this kernel's
    /// behaviour.
    pub fn convert_with(
        &mut self,
        opts: ConvOptions<'_>,
        pb: ConvPb,
        lhs: TermId,
        rhs: TermId,
    ) -> Result<ConstraintSet, Error> {
        Self::convert_in(&mut self.store, &self.env, opts, pb, lhs, rhs).map(|(cs, _)| cs)
    }

    /// Check whether two terms are convertible, counting the reductions performed
    pub fn convert_with_stats(
        &mut self,
        pb: ConvPb,
        lhs: TermId,
        rhs: TermId,
    ) -> Result<(ConstraintSet, Stats), Error> {
        let oracle = &self.oracle;
        Self::convert_in(
            &mut self.store,
            &self.env,
            ConvOptions::new(oracle),
            pb,
            lhs,
            rhs,
        )
    }

    /// Check whether two terms are convertible, treating non-convertibility as `false`
    ///
    /// Any other failure is still reported as an error.
    pub fn is_convertible(&mut self, pb: ConvPb, lhs: TermId, rhs: TermId) -> Result<bool, Error> {
        match self.convert(pb, lhs, rhs) {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_convertible() => Ok(false),
            Err(err) => Err(err),
        }
    }

    #[instrument(level = "debug", skip_all, fields(pb = ?pb))]
    fn convert_in(
        store: &mut TermStore,
        env: &Env,
        opts: ConvOptions<'_>,
        pb: ConvPb,
        lhs: TermId,
        rhs: TermId,
    ) -> Result<(ConstraintSet, Stats), Error> {
        if lhs == rhs {
            return Ok((ConstraintSet::default(), Stats::default()));
        }
        let mut cnv = Converter::new(store, env, opts);
        let cs = cnv.convert(pb, lhs, rhs)?;
        Ok((cs, cnv.stats()))
    }
}

/// A kernel error
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum Error {
    /// The terms are not convertible
    #[error("not convertible")]
    NotConvertible,
    /// The terms are not convertible, because of the component with the given index
    #[error("not convertible at component {0}")]
    NotConvertibleAt(usize),
    /// Expected a dependent function type
    #[error("expected a product")]
    NotAProduct,
    /// Expected an arity
    #[error("expected an arity")]
    NotAnArity,
    /// Unknown constant
    #[error("unknown constant: {0}")]
    UnknownConstant(Name),
    /// Unknown inductive type
    #[error("unknown inductive type: {0}")]
    UnknownInductive(Name),
    /// Unknown local variable
    #[error("unknown variable: {0}")]
    UnknownVariable(Name),
    /// The name is already declared
    #[error("already declared: {0}")]
    AlreadyDeclared(Name),
    /// The universe constraints are inconsistent
    #[error("inconsistent universe constraints")]
    InconsistentConstraints,
    /// The call was interrupted
    #[error("interrupted")]
    Interrupted,
    /// The call ran out of fuel
    #[error("out of fuel")]
    OutOfFuel,
    /// An internal invariant was violated
    #[error("anomaly: {0}")]
    Anomaly(&'static str),
}

impl Error {
    /// Whether this error means the terms compared are not convertible
    ///
    /// Any other error aborts conversion.
    pub fn is_not_convertible(&self) -> bool {
        matches!(self, Error::NotConvertible | Error::NotConvertibleAt(_))
    }

    /// Attach the index of the component which failed to convert, unless one is already known
    pub(crate) fn located(self, ix: usize) -> Error {
        match self {
            Error::NotConvertible => Error::NotConvertibleAt(ix),
            err => err,
        }
    }

    /// Forget the index of the component which failed to convert
    pub(crate) fn unlocated(self) -> Error {
        match self {
            Error::NotConvertibleAt(_) => Error::NotConvertible,
            err => err,
        }
    }
}
