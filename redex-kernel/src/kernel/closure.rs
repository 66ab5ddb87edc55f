use std::rc::Rc;

use tracing::trace;
use typed_generational_arena::SmallIndex;

use super::Error;
use super::esubst::{Expand, Lift, Subs};
use super::whnf::Machine;
use crate::term::{GNode, Name, TermId};

/// A handle for a closure in a [`Machine`]'s arena
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ClosId(pub(super) SmallIndex<FConstr>);

/// The environment of a closure
pub type CEnv = Subs<ClosId>;

/// How far a closure is known to be reduced
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RedState {
    /// A normal form
    Norm,
    /// A weak head normal form which may create a redex when applied or eliminated
    Cstr,
    /// A weak head normal form
    Whnf,
    /// Possibly reducible
    Red,
}

/// A reference which may be unfolded
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum TableKey {
    /// A global constant
    Const(Name),
    /// A local variable
    Var(Name),
}

/// The head of a closure
#[derive(Debug, Clone)]
pub enum FTerm {
    /// A free bound variable
    Rel(u32),
    /// A closed atom, i.e. a sort
    Atom(TermId),
    /// A reference to a constant or local variable
    Flex(TableKey),
    /// An inductive type
    Ind(Name),
    /// A constructor
    Construct(Name, u32),
    /// A closure applied to a nonempty list of arguments
    App(ClosId, Rc<[ClosId]>),
    /// A lambda abstraction under an environment
    Lambda(TermId, CEnv),
    /// A dependent function type under an environment
    Prod(TermId, CEnv),
    /// A let-binding under an environment
    LetIn(TermId, CEnv),
    /// A fixpoint under an environment
    Fix(TermId, CEnv),
    /// A cofixpoint under an environment
    CoFix(TermId, CEnv),
    /// A case analysis of the given scrutinee, whose motive and branches live under an environment
    CaseT(TermId, ClosId, CEnv),
    /// A closure lifted over some binders
    Lift(u32, ClosId),
    /// An arbitrary term under an environment
    Clos(TermId, CEnv),
}

/// A closure
///
/// A closure in state [`RedState::Red`] is a thunk. Once the machine has computed its weak head
/// normal form, the closure is overwritten with it, and is never written again.
#[derive(Debug, Clone)]
pub struct FConstr {
    pub(super) norm: RedState,
    pub(super) term: FTerm,
}

/// # Closures
///
/// Building, lifting, updating and forcing closures
impl Machine<'_> {
    /// Allocate a new closure
    pub(crate) fn alloc(&mut self, norm: RedState, term: FTerm) -> ClosId {
        ClosId(self.arena.insert(FConstr { norm, term }))
    }

    /// Get the head of a closure
    pub(crate) fn fterm(&self, m: ClosId) -> &FTerm {
        &self.arena[m.0].term
    }

    /// Get how far a closure is known to be reduced
    pub(crate) fn norm(&self, m: ClosId) -> RedState {
        self.arena[m.0].norm
    }

    /// Build the closure of a free bound variable
    pub(crate) fn mk_rel(&mut self, k: u32) -> ClosId {
        self.alloc(RedState::Norm, FTerm::Rel(k))
    }

    /// Build the closure of index `k` under `env`
    pub(crate) fn clos_rel(&mut self, env: &CEnv, k: u32) -> Result<ClosId, Error> {
        match env.expand(k)? {
            Expand::Value(n, v) => Ok(self.lift(n, v)),
            Expand::Rel(i) => Ok(self.mk_rel(i)),
        }
    }

    /// Build the closure of a term under an environment
    ///
    /// Only variables are looked up; anything else is suspended.
    pub(crate) fn mk_clos(&mut self, env: &CEnv, tm: TermId) -> Result<ClosId, Error> {
        if let GNode::Rel(k) = *self.store.node(tm) {
            return self.clos_rel(env, k);
        }
        let (norm, term) = match self.store.node(tm) {
            GNode::Sort(_) => (RedState::Norm, FTerm::Atom(tm)),
            GNode::Var(x) => (RedState::Red, FTerm::Flex(TableKey::Var(x.clone()))),
            GNode::Const(c) => (RedState::Red, FTerm::Flex(TableKey::Const(c.clone()))),
            GNode::Ind(i) => (RedState::Norm, FTerm::Ind(i.clone())),
            GNode::Construct(i, j) => (RedState::Cstr, FTerm::Construct(i.clone(), *j)),
            _ if self.store.is_closed(tm) => (RedState::Red, FTerm::Clos(tm, CEnv::id())),
            _ => (RedState::Red, FTerm::Clos(tm, env.clone())),
        };
        Ok(self.alloc(norm, term))
    }

    /// Lift a closure over `n` binders
    pub(crate) fn lift(&mut self, n: u32, m: ClosId) -> ClosId {
        let mut n = n;
        let mut m = m;
        loop {
            if n == 0 {
                return m;
            }
            let shifted = match self.fterm(m) {
                FTerm::Atom(_) | FTerm::Flex(_) | FTerm::Ind(_) | FTerm::Construct(..) => {
                    return m;
                }
                FTerm::Rel(k) => FTerm::Rel(k + n),
                FTerm::Lambda(t, e) => FTerm::Lambda(*t, e.shifted(n)),
                FTerm::Fix(t, e) => FTerm::Fix(*t, e.shifted(n)),
                FTerm::CoFix(t, e) => FTerm::CoFix(*t, e.shifted(n)),
                FTerm::Lift(k, a) => {
                    n += k;
                    m = *a;
                    continue;
                }
                _ => FTerm::Lift(n, m),
            };
            let norm = self.norm(m);
            return self.alloc(norm, shifted);
        }
    }

    /// Overwrite a thunk with its weak head normal form
    ///
    /// Closures which are already values are left untouched.
    pub(crate) fn update(&mut self, target: ClosId, value: ClosId) {
        if target == value || self.norm(target) != RedState::Red {
            return;
        }
        let norm = match self.norm(value) {
            RedState::Red => RedState::Whnf,
            norm => norm,
        };
        let term = self.fterm(value).clone();
        trace!(?target, "updating closure");
        self.arena[target.0] = FConstr { norm, term };
        self.stats.updates += 1;
    }

    /// Build the closure of `head` applied to `args`
    pub(crate) fn app_clos(&mut self, head: ClosId, args: Vec<ClosId>) -> ClosId {
        if args.is_empty() {
            return head;
        }
        self.alloc(RedState::Whnf, FTerm::App(head, args.into()))
    }

    /// Read back the term a closure stands for
    pub(crate) fn force(&mut self, m: ClosId) -> Result<TermId, Error> {
        self.to_term(&Lift::id(), m)
    }

    /// Read back the term a closure stands for, relocating its free variables by `lfts`
    pub(crate) fn to_term(&mut self, lfts: &Lift, m: ClosId) -> Result<TermId, Error> {
        match self.fterm(m).clone() {
            FTerm::Rel(k) => {
                let k = lfts.reloc(k)?;
                Ok(self.store.rel(k))
            }
            FTerm::Atom(t) => Ok(t),
            FTerm::Flex(TableKey::Const(c)) => Ok(self.store.constant(c)),
            FTerm::Flex(TableKey::Var(x)) => Ok(self.store.var(x)),
            FTerm::Ind(i) => Ok(self.store.ind(i)),
            FTerm::Construct(i, j) => Ok(self.store.construct(i, j)),
            FTerm::App(f, args) => {
                let f = self.to_term(lfts, f)?;
                let args = args
                    .iter()
                    .map(|a| self.to_term(lfts, *a))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(self.store.app(f, args))
            }
            FTerm::Lift(n, a) => self.to_term(&lfts.shift(n), a),
            FTerm::CaseT(t, c, e) => {
                let GNode::Case(ci, [motive, _], branches) = self.store.node(t).clone() else {
                    return Err(Error::Anomaly("Machine::to_term (malformed case)"));
                };
                let motive = self.term_of_env(lfts, &e, motive)?;
                let scrutinee = self.to_term(lfts, c)?;
                let branches = branches
                    .iter()
                    .map(|b| self.term_of_env(lfts, &e, *b))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(self.store.case(ci, motive, scrutinee, branches))
            }
            FTerm::Lambda(t, e)
            | FTerm::Prod(t, e)
            | FTerm::LetIn(t, e)
            | FTerm::Fix(t, e)
            | FTerm::CoFix(t, e)
            | FTerm::Clos(t, e) => self.term_of_env(lfts, &e, t),
        }
    }

    /// Read back a term under an environment, relocating its free variables by `lfts`
    fn term_of_env(&mut self, lfts: &Lift, env: &CEnv, tm: TermId) -> Result<TermId, Error> {
        if self.store.is_closed(tm) || (env.is_id() && lfts.is_id()) {
            return Ok(tm);
        }
        match self.store.node(tm).clone() {
            GNode::Rel(k) => match env.expand(k)? {
                Expand::Value(n, v) => self.to_term(&lfts.shift(n), v),
                Expand::Rel(i) => {
                    let i = lfts.reloc(i)?;
                    Ok(self.store.rel(i))
                }
            },
            node => {
                let node = node
                    .with_binders()
                    .map_err(|(b, x)| self.term_of_env(&lfts.lift(b), &env.lift(b), x))?;
                Ok(self.store.add_flat(node))
            }
        }
    }
}
