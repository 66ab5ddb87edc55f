use tracing::{debug, trace};

use super::Error;
use super::closure::{CEnv, ClosId, FTerm, TableKey};
use super::config::{ConvOptions, IndEquiv, RedFlags};
use super::env::Env;
use super::esubst::Lift;
use super::oracle::Oracle;
use super::stack::{Spine, Stack, StackMember};
use super::univ::{ConstraintSet, sort_cmp};
use super::whnf::{Machine, Stats};
use crate::term::{GNode, TermId, TermStore};

/// A conversion problem
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ConvPb {
    /// Definitional equality
    Equal,
    /// Cumulativity: the left-hand side is a subtype of the right-hand side
    LessOrEqual,
}

/// One side of a conversion problem
///
/// The lift relocates the variables of the context at the bottom of the stack into the context
/// of the comparison.
struct Appr {
    lft: Lift,
    head: ClosId,
    stk: Stack,
}

impl Appr {
    fn new(lft: Lift, head: ClosId) -> Appr {
        Appr {
            lft,
            head,
            stk: Stack::default(),
        }
    }

    /// The lift relocating the variables of the head
    fn head_lift(&self) -> Lift {
        self.lft.shift(self.stk.shifts())
    }
}

/// A stack frame with shifts folded into the lifts of its components
enum PureFrame {
    Arg(Lift, ClosId),
    Case(Lift, TermId, CEnv),
    Fix(Lift, ClosId, Vec<PureFrame>),
}

/// Flatten a stack into its arguments and eliminators, top first
fn pure_stack(lft: &Lift, stk: &Spine) -> Vec<PureFrame> {
    let mut frames = Vec::new();
    let mut l = lft.clone();
    for frame in stk.frames_from_bottom() {
        match frame {
            StackMember::Shift(n) => l = l.shift(*n),
            StackMember::Update(_) => {}
            StackMember::App(args) => {
                for a in args.as_slice().iter().rev() {
                    frames.push(PureFrame::Arg(l.clone(), *a));
                }
            }
            StackMember::CaseT(t, e) => frames.push(PureFrame::Case(l.clone(), *t, e.clone())),
            StackMember::Fix(f, saved) => {
                frames.push(PureFrame::Fix(l.clone(), *f, pure_stack(&l, saved)))
            }
        }
    }
    frames.reverse();
    frames
}

/// A conversion checker
///
/// Terms are reduced lazily, one head at a time, and compared structurally; references are
/// unfolded in the order chosen by the oracle.
pub(crate) struct Converter<'k> {
    m: Machine<'k>,
    oracle: &'k Oracle,
    ind_equiv: &'k dyn IndEquiv,
    l2r: bool,
    delta: bool,
}

impl<'k> Converter<'k> {
    pub(crate) fn new(store: &'k mut TermStore, env: &'k Env, opts: ConvOptions<'k>) -> Self {
        Converter {
            m: Machine::new(store, env, opts.flags - RedFlags::DELTA, opts.limits),
            oracle: opts.oracle,
            ind_equiv: opts.ind_equiv,
            l2r: opts.l2r,
            delta: opts.flags.contains(RedFlags::DELTA),
        }
    }

    /// The reductions performed so far
    pub(crate) fn stats(&self) -> Stats {
        self.m.stats()
    }

    /// Compare two terms, returning the universe constraints needed for them to be convertible
    pub(crate) fn convert(
        &mut self,
        pb: ConvPb,
        lhs: TermId,
        rhs: TermId,
    ) -> Result<ConstraintSet, Error> {
        let mut cu = ConstraintSet::default();
        let m1 = self.m.mk_clos(&CEnv::id(), lhs)?;
        let m2 = self.m.mk_clos(&CEnv::id(), rhs)?;
        self.ccnv(pb, &Lift::id(), &Lift::id(), m1, m2, &mut cu)?;
        Ok(cu)
    }

    /// Whether two closures denote the same term without any reduction
    fn same_closure(&self, l1: &Lift, l2: &Lift, m1: ClosId, m2: ClosId) -> bool {
        match (self.m.fterm(m1), self.m.fterm(m2)) {
            (FTerm::Clos(t1, e1), FTerm::Clos(t2, e2)) if t1 == t2 => {
                self.m.store.is_closed(*t1) || (e1.is_id() && e2.is_id() && l1 == l2)
            }
            _ => m1 == m2 && l1 == l2,
        }
    }

    fn ccnv(
        &mut self,
        pb: ConvPb,
        l1: &Lift,
        l2: &Lift,
        m1: ClosId,
        m2: ClosId,
        cu: &mut ConstraintSet,
    ) -> Result<(), Error> {
        if self.same_closure(l1, l2, m1, m2) {
            return Ok(());
        }
        self.eqappr(pb, Appr::new(l1.clone(), m1), Appr::new(l2.clone(), m2), cu)
    }

    fn eqappr(
        &mut self,
        pb: ConvPb,
        a1: Appr,
        a2: Appr,
        cu: &mut ConstraintSet,
    ) -> Result<(), Error> {
        let mut pb = pb;
        let mut a1 = a1;
        let mut a2 = a2;
        loop {
            self.m.tick()?;
            a1.head = self.m.whd_stack(a1.head, &mut a1.stk)?;
            a2.head = self.m.whd_stack(a2.head, &mut a2.stk)?;
            let el1 = a1.head_lift();
            let el2 = a2.head_lift();
            let f1 = self.m.fterm(a1.head).clone();
            let f2 = self.m.fterm(a2.head).clone();
            trace!(lhs = ?f1, rhs = ?f2, ?pb, "comparing heads");
            match (f1, f2) {
                // Let-bindings are only left unreduced when zeta is disabled: fire one step and
                // compare again
                (FTerm::LetIn(t1, e1), _) => a1.head = self.m.zeta(t1, &e1, &mut a1.stk)?,
                (_, FTerm::LetIn(t2, e2)) => a2.head = self.m.zeta(t2, &e2, &mut a2.stk)?,
                (FTerm::Atom(t1), FTerm::Atom(t2)) => {
                    if !a1.stk.is_neutral() || !a2.stk.is_neutral() {
                        return Err(Error::NotConvertible);
                    }
                    let (&GNode::Sort(s1), &GNode::Sort(s2)) =
                        (self.m.store.node(t1), self.m.store.node(t2))
                    else {
                        return Err(Error::Anomaly("Converter::eqappr (atom is not a sort)"));
                    };
                    return sort_cmp(pb, s1, s2, cu);
                }
                (FTerm::Rel(n1), FTerm::Rel(n2)) => {
                    if el1.reloc(n1)? != el2.reloc(n2)? {
                        return Err(Error::NotConvertible);
                    }
                    return self.convert_stacks(&a1, &a2, cu);
                }
                (FTerm::Flex(k1), FTerm::Flex(k2)) => {
                    // Rigid references fail with the located error of their arguments
                    let mut stuck = Error::NotConvertible;
                    if k1 == k2 {
                        let snapshot = cu.snapshot();
                        match self.convert_stacks(&a1, &a2, cu) {
                            Err(err) if err.is_not_convertible() => {
                                cu.restore(snapshot);
                                stuck = err;
                            }
                            result => return result,
                        }
                    }
                    if !self.delta {
                        return Err(stuck);
                    }
                    let left_first = self.oracle.order(self.l2r, &k1, &k2);
                    debug!(lhs = ?k1, rhs = ?k2, left_first, "oracle decision");
                    let (first, second) = if left_first {
                        (&mut a1, &mut a2)
                    } else {
                        (&mut a2, &mut a1)
                    };
                    let (k_first, k_second) = if left_first { (&k1, &k2) } else { (&k2, &k1) };
                    if let Some(body) = self.m.unfold(k_first)? {
                        first.head = body;
                    } else if let Some(body) = self.m.unfold(k_second)? {
                        second.head = body;
                    } else {
                        return Err(stuck);
                    }
                }
                (FTerm::Lambda(t1, e1), FTerm::Lambda(t2, e2))
                | (FTerm::Prod(t1, e1), FTerm::Prod(t2, e2)) => {
                    // Applied abstractions are only left when beta is disabled
                    if !a1.stk.is_neutral() || !a2.stk.is_neutral() {
                        self.ccnv(ConvPb::Equal, &el1, &el2, a1.head, a2.head, cu)
                            .map_err(Error::unlocated)?;
                        return self.convert_stacks(&a1, &a2, cu);
                    }
                    let [ty1, bd1] = self.binder(t1)?;
                    let [ty2, bd2] = self.binder(t2)?;
                    let c1 = self.m.mk_clos(&e1, ty1)?;
                    let c2 = self.m.mk_clos(&e2, ty2)?;
                    self.ccnv(ConvPb::Equal, &el1, &el2, c1, c2, cu)?;
                    let b1 = self.m.mk_clos(&e1.lift(1), bd1)?;
                    let b2 = self.m.mk_clos(&e2.lift(1), bd2)?;
                    a1 = Appr::new(el1.lift(1), b1);
                    a2 = Appr::new(el2.lift(1), b2);
                }
                (FTerm::Lambda(t1, e1), _) => {
                    if !a1.stk.is_neutral() {
                        return Err(Error::NotConvertible);
                    }
                    let [_, bd1] = self.binder(t1)?;
                    let b1 = self.m.mk_clos(&e1.lift(1), bd1)?;
                    let rel1 = self.m.mk_rel(1);
                    a1 = Appr::new(el1.lift(1), b1);
                    a2.stk.eta_expand(rel1);
                    a2.lft = a2.lft.lift(1);
                    pb = ConvPb::Equal;
                }
                (_, FTerm::Lambda(t2, e2)) => {
                    if !a2.stk.is_neutral() {
                        return Err(Error::NotConvertible);
                    }
                    let [_, bd2] = self.binder(t2)?;
                    let b2 = self.m.mk_clos(&e2.lift(1), bd2)?;
                    let rel1 = self.m.mk_rel(1);
                    a2 = Appr::new(el2.lift(1), b2);
                    a1.stk.eta_expand(rel1);
                    a1.lft = a1.lft.lift(1);
                    pb = ConvPb::Equal;
                }
                (FTerm::Flex(k1), _) => match self.unfold_if(&k1)? {
                    Some(body) => a1.head = body,
                    None => return Err(Error::NotConvertible),
                },
                (_, FTerm::Flex(k2)) => match self.unfold_if(&k2)? {
                    Some(body) => a2.head = body,
                    None => return Err(Error::NotConvertible),
                },
                (FTerm::Ind(i1), FTerm::Ind(i2)) => {
                    if !self.ind_equiv.eq_ind(&i1, &i2) {
                        return Err(Error::NotConvertible);
                    }
                    return self.convert_stacks(&a1, &a2, cu);
                }
                (FTerm::Construct(i1, j1), FTerm::Construct(i2, j2)) => {
                    if j1 != j2 || !self.ind_equiv.eq_ind(&i1, &i2) {
                        return Err(Error::NotConvertible);
                    }
                    return self.convert_stacks(&a1, &a2, cu);
                }
                (FTerm::Fix(t1, e1), FTerm::Fix(t2, e2)) => {
                    let (GNode::Fix(fi1, tys1, bds1), GNode::Fix(fi2, tys2, bds2)) =
                        (self.m.store.node(t1).clone(), self.m.store.node(t2).clone())
                    else {
                        return Err(Error::Anomaly("Converter::eqappr (malformed fixpoint)"));
                    };
                    if fi1 != fi2 {
                        return Err(Error::NotConvertible);
                    }
                    self.convert_block(
                        &el1,
                        &el2,
                        &e1,
                        &e2,
                        (&tys1[..], &bds1[..]),
                        (&tys2[..], &bds2[..]),
                        cu,
                    )?;
                    return self.convert_stacks(&a1, &a2, cu);
                }
                (FTerm::CoFix(t1, e1), FTerm::CoFix(t2, e2)) => {
                    let (GNode::CoFix(i1, tys1, bds1), GNode::CoFix(i2, tys2, bds2)) =
                        (self.m.store.node(t1).clone(), self.m.store.node(t2).clone())
                    else {
                        return Err(Error::Anomaly("Converter::eqappr (malformed cofixpoint)"));
                    };
                    if i1 != i2 {
                        return Err(Error::NotConvertible);
                    }
                    self.convert_block(
                        &el1,
                        &el2,
                        &e1,
                        &e2,
                        (&tys1[..], &bds1[..]),
                        (&tys2[..], &bds2[..]),
                        cu,
                    )?;
                    return self.convert_stacks(&a1, &a2, cu);
                }
                (FTerm::App(..) | FTerm::Clos(..) | FTerm::Lift(..) | FTerm::CaseT(..), _)
                | (_, FTerm::App(..) | FTerm::Clos(..) | FTerm::Lift(..) | FTerm::CaseT(..)) => {
                    return Err(Error::Anomaly("Converter::eqappr (unreduced head)"));
                }
                _ => return Err(Error::NotConvertible),
            }
        }
    }

    fn unfold_if(&mut self, key: &TableKey) -> Result<Option<ClosId>, Error> {
        if !self.delta {
            return Ok(None);
        }
        self.m.unfold(key)
    }

    fn binder(&self, t: TermId) -> Result<[TermId; 2], Error> {
        match *self.m.store.node(t) {
            GNode::Lambda(parts) | GNode::Prod(parts) => Ok(parts),
            _ => Err(Error::Anomaly("Converter::binder (not a binder)")),
        }
    }

    /// Compare the eliminators applied to two heads already known to be equal
    fn convert_stacks(&mut self, a1: &Appr, a2: &Appr, cu: &mut ConstraintSet) -> Result<(), Error> {
        if a1.stk.shape() != a2.stk.shape() {
            return Err(Error::NotConvertible);
        }
        let p1 = pure_stack(&a1.lft, &a1.stk);
        let p2 = pure_stack(&a2.lft, &a2.stk);
        self.compare_pure(&p1, &p2, cu)
    }

    fn compare_pure(
        &mut self,
        p1: &[PureFrame],
        p2: &[PureFrame],
        cu: &mut ConstraintSet,
    ) -> Result<(), Error> {
        if p1.len() != p2.len() {
            return Err(Error::NotConvertible);
        }
        let mut ix = 0;
        for (f1, f2) in p1.iter().zip(p2) {
            match (f1, f2) {
                (PureFrame::Arg(l1, m1), PureFrame::Arg(l2, m2)) => {
                    self.ccnv(ConvPb::Equal, l1, l2, *m1, *m2, cu)
                        .map_err(|err| err.located(ix))?;
                    ix += 1;
                }
                (PureFrame::Case(l1, t1, e1), PureFrame::Case(l2, t2, e2)) => {
                    let (GNode::Case(ci1, [mo1, _], brs1), GNode::Case(ci2, [mo2, _], brs2)) =
                        (self.m.store.node(*t1).clone(), self.m.store.node(*t2).clone())
                    else {
                        return Err(Error::Anomaly("Converter::compare_pure (malformed case)"));
                    };
                    if !self.ind_equiv.eq_ind(&ci1.ind, &ci2.ind) {
                        return Err(Error::NotConvertible);
                    }
                    let c1 = self.m.mk_clos(e1, mo1)?;
                    let c2 = self.m.mk_clos(e2, mo2)?;
                    self.ccnv(ConvPb::Equal, l1, l2, c1, c2, cu)?;
                    self.convert_vect(l1, l2, e1, e2, &brs1, &brs2, cu)?;
                }
                (PureFrame::Fix(l1, m1, s1), PureFrame::Fix(l2, m2, s2)) => {
                    self.ccnv(ConvPb::Equal, l1, l2, *m1, *m2, cu)?;
                    self.compare_pure(s1, s2, cu)?;
                }
                _ => return Err(Error::NotConvertible),
            }
        }
        Ok(())
    }

    /// Compare the types and bodies of two fixpoint or cofixpoint blocks
    #[allow(clippy::too_many_arguments)]
    fn convert_block(
        &mut self,
        l1: &Lift,
        l2: &Lift,
        e1: &CEnv,
        e2: &CEnv,
        (tys1, bds1): (&[TermId], &[TermId]),
        (tys2, bds2): (&[TermId], &[TermId]),
        cu: &mut ConstraintSet,
    ) -> Result<(), Error> {
        if bds1.len() != bds2.len() {
            return Err(Error::NotConvertible);
        }
        let n = bds1.len() as u32;
        self.convert_vect(l1, l2, e1, e2, tys1, tys2, cu)?;
        self.convert_vect(&l1.lift(n), &l2.lift(n), &e1.lift(n), &e2.lift(n), bds1, bds2, cu)
    }

    /// Compare two vectors of terms pointwise, reporting the index of the first mismatch
    #[allow(clippy::too_many_arguments)]
    fn convert_vect(
        &mut self,
        l1: &Lift,
        l2: &Lift,
        e1: &CEnv,
        e2: &CEnv,
        v1: &[TermId],
        v2: &[TermId],
        cu: &mut ConstraintSet,
    ) -> Result<(), Error> {
        if v1.len() != v2.len() {
            return Err(Error::NotConvertible);
        }
        for (ix, (t1, t2)) in v1.iter().zip(v2).enumerate() {
            let c1 = self.m.mk_clos(e1, *t1)?;
            let c2 = self.m.mk_clos(e2, *t2)?;
            self.ccnv(ConvPb::Equal, l1, l2, c1, c2, cu)
                .map_err(|err| err.located(ix))?;
        }
        Ok(())
    }
}
