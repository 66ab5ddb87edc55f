use fxhash::FxBuildHasher;
use hashbrown::HashMap;
use tracing::{debug, trace};
use typed_generational_arena::SmallArena;

use super::closure::{CEnv, ClosId, FConstr, FTerm, RedState, TableKey};
use super::config::{Limits, RedFlags};
use super::env::Env;
use super::esubst::Lift;
use super::stack::{Stack, StackMember};
use super::{Error, Interrupt};
use crate::term::{FixInfo, GNode, TermId, TermStore};

/// Counters of the reductions performed by a [`Machine`]
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct Stats {
    /// Beta-reductions
    pub beta: u64,
    /// Unfoldings of constants and local definitions
    pub delta: u64,
    /// Case analyses of constructors
    pub iota: u64,
    /// Substitutions of let-bound values
    pub zeta: u64,
    /// Unfoldings of fixpoints on a constructor
    pub fix: u64,
    /// Unfoldings of cofixpoints under a case analysis
    pub cofix: u64,
    /// Thunks overwritten with their value
    pub updates: u64,
}

/// A lazy reduction machine
///
/// Every closure allocated during a call lives in the machine's arena, and is shared by every
/// reference to it: a thunk forced once is never reduced again.
pub struct Machine<'k> {
    pub(super) store: &'k mut TermStore,
    env: &'k Env,
    pub(super) arena: SmallArena<FConstr>,
    flags: RedFlags,
    /// The unfolded bodies of references, shared across the call
    bodies: HashMap<TableKey, Option<ClosId>, FxBuildHasher>,
    pub(super) stats: Stats,
    interrupt: Option<&'k Interrupt>,
    fuel: Option<u64>,
}

impl<'k> Machine<'k> {
    pub(crate) fn new(
        store: &'k mut TermStore,
        env: &'k Env,
        flags: RedFlags,
        limits: Limits<'k>,
    ) -> Self {
        Machine {
            store,
            env,
            arena: SmallArena::new(),
            flags,
            bodies: HashMap::default(),
            stats: Stats::default(),
            interrupt: limits.interrupt,
            fuel: limits.fuel,
        }
    }

    pub(crate) fn stats(&self) -> Stats {
        self.stats
    }

    /// Account for one step of work
    pub(crate) fn tick(&mut self) -> Result<(), Error> {
        if let Some(interrupt) = self.interrupt {
            interrupt.check()?;
        }
        if let Some(fuel) = &mut self.fuel {
            *fuel = fuel.checked_sub(1).ok_or(Error::OutOfFuel)?;
        }
        Ok(())
    }

    /// Get the unfolding of a reference, if it has one
    pub(crate) fn unfold(&mut self, key: &TableKey) -> Result<Option<ClosId>, Error> {
        if let Some(body) = self.bodies.get(key) {
            if body.is_some() {
                self.stats.delta += 1;
            }
            return Ok(*body);
        }
        let body = match key {
            TableKey::Const(c) => self.env.constant_body(c)?,
            TableKey::Var(x) => self.env.local_body(x)?,
        };
        let body = match body {
            Some(tm) => {
                debug!(?key, "unfolding");
                self.stats.delta += 1;
                Some(self.mk_clos(&CEnv::id(), tm)?)
            }
            None => None,
        };
        self.bodies.insert(key.clone(), body);
        Ok(body)
    }
}

/// # Weak head reduction
impl Machine<'_> {
    /// Reduce a closure until its head is no longer a closure, an application or a case
    ///
    /// Eliminators are pushed onto the stack, and fixpoints are unfolded up to their decreasing
    /// argument. No other rule is fired.
    fn knh(&mut self, m: ClosId, stk: &mut Stack) -> Result<ClosId, Error> {
        let mut m = m;
        loop {
            self.tick()?;
            match self.fterm(m).clone() {
                FTerm::Lift(k, a) => {
                    stk.shift(k);
                    m = a;
                }
                FTerm::Clos(t, e) => {
                    stk.update(m, self.norm(m));
                    return self.knht(&e, t, stk);
                }
                FTerm::App(f, args) => {
                    stk.update(m, self.norm(m));
                    stk.append_shared(args);
                    m = f;
                }
                FTerm::CaseT(t, c, e) => {
                    stk.update(m, self.norm(m));
                    stk.push(StackMember::CaseT(t, e));
                    m = c;
                }
                FTerm::Fix(t, _) if self.flags.contains(RedFlags::IOTA) => {
                    let rarg = self.fix_info(t)?.rec_arg().ok_or(Error::Anomaly(
                        "Machine::knh (fixpoint without decreasing argument)",
                    ))?;
                    match self.get_nth_arg(m, rarg as usize, stk)? {
                        (f, Some((pars, arg))) => {
                            stk.push(StackMember::Fix(f, Stack::from_args(pars)));
                            m = arg;
                        }
                        (f, None) => return Ok(f),
                    }
                }
                _ => return Ok(m),
            }
        }
    }

    /// [`Machine::knh`] on a term under an environment
    fn knht(&mut self, env: &CEnv, tm: TermId, stk: &mut Stack) -> Result<ClosId, Error> {
        let mut tm = tm;
        loop {
            match self.store.node(tm).clone() {
                GNode::App(f, args) => {
                    let args = args
                        .iter()
                        .map(|a| self.mk_clos(env, *a))
                        .collect::<Result<Vec<_>, _>>()?;
                    stk.append(args);
                    tm = f;
                }
                GNode::Case(_, [_, scrutinee], _) => {
                    stk.push(StackMember::CaseT(tm, env.clone()));
                    tm = scrutinee;
                }
                GNode::Fix(..) => {
                    let m = self.alloc(RedState::Cstr, FTerm::Fix(tm, env.clone()));
                    return self.knh(m, stk);
                }
                GNode::Rel(k) => {
                    let m = self.clos_rel(env, k)?;
                    return self.knh(m, stk);
                }
                GNode::Lambda(_) => return Ok(self.alloc(RedState::Cstr, FTerm::Lambda(tm, env.clone()))),
                GNode::Prod(_) => return Ok(self.alloc(RedState::Whnf, FTerm::Prod(tm, env.clone()))),
                GNode::LetIn(_) => return Ok(self.alloc(RedState::Red, FTerm::LetIn(tm, env.clone()))),
                GNode::CoFix(..) => return Ok(self.alloc(RedState::Cstr, FTerm::CoFix(tm, env.clone()))),
                _ => return self.mk_clos(env, tm),
            }
        }
    }

    /// Reduce a closure to weak head normal form, with respect to this machine's flags
    ///
    /// Returns the head; the eliminators it is applied to are left on the stack.
    pub(crate) fn whd_stack(&mut self, m: ClosId, stk: &mut Stack) -> Result<ClosId, Error> {
        let mut m = self.knh(m, stk)?;
        loop {
            trace!(head = ?self.fterm(m), "head step");
            m = match self.fterm(m).clone() {
                FTerm::Lambda(..) if self.flags.contains(RedFlags::BETA) => {
                    let (head, mut args) = self.strip_app(m, stk, Some(1))?;
                    let Some(arg) = args.pop() else {
                        return Ok(head);
                    };
                    let FTerm::Lambda(t, e) = self.fterm(head).clone() else {
                        return Err(Error::Anomaly("Machine::whd_stack (lifted lambda)"));
                    };
                    let GNode::Lambda([_, body]) = *self.store.node(t) else {
                        return Err(Error::Anomaly("Machine::whd_stack (malformed lambda)"));
                    };
                    self.stats.beta += 1;
                    self.knht(&e.cons(arg), body, stk)?
                }
                FTerm::Flex(key) if self.flags.contains(RedFlags::DELTA) => {
                    match self.unfold(&key)? {
                        Some(body) => self.knh(body, stk)?,
                        None => return Ok(m),
                    }
                }
                FTerm::LetIn(t, e) if self.flags.contains(RedFlags::ZETA) => {
                    self.zeta(t, &e, stk)?
                }
                FTerm::Construct(..) if self.flags.contains(RedFlags::IOTA) => {
                    let (head, mut args) = self.strip_app(m, stk, None)?;
                    match stk.pop() {
                        Some(StackMember::CaseT(t, e)) => {
                            let (npars, branch) = self.branch(t, head)?;
                            if args.len() < npars {
                                return Err(Error::Anomaly("Machine::whd_stack (missing parameters)"));
                            }
                            self.stats.iota += 1;
                            stk.append(args.split_off(npars));
                            self.knht(&e, branch, stk)?
                        }
                        Some(StackMember::Fix(f, saved)) => {
                            self.stats.fix += 1;
                            let arg = self.app_clos(head, args);
                            stk.append(vec![arg]);
                            stk.extend(saved);
                            let (env, body) = self.contract_fix(f)?;
                            self.knht(&env, body, stk)?
                        }
                        frame => {
                            if let Some(frame) = frame {
                                stk.push(frame);
                            }
                            stk.append(args);
                            return Ok(head);
                        }
                    }
                }
                FTerm::CoFix(..) if self.flags.contains(RedFlags::IOTA) => {
                    let (head, args) = self.strip_app(m, stk, None)?;
                    let under_case = matches!(stk.top(), Some(StackMember::CaseT(..)));
                    stk.append(args);
                    if !under_case {
                        return Ok(head);
                    }
                    self.stats.cofix += 1;
                    let (env, body) = self.contract_fix(head)?;
                    self.knht(&env, body, stk)?
                }
                _ => return Ok(m),
            };
        }
    }

    /// Substitute the value of a let-binding into its body
    pub(crate) fn zeta(&mut self, t: TermId, env: &CEnv, stk: &mut Stack) -> Result<ClosId, Error> {
        let GNode::LetIn([value, _, body]) = *self.store.node(t) else {
            return Err(Error::Anomaly("Machine::zeta (malformed let)"));
        };
        let value = self.mk_clos(env, value)?;
        self.stats.zeta += 1;
        self.knht(&env.cons(value), body, stk)
    }

    /// Select the branch of a case analysis matching a constructor
    ///
    /// Returns the number of parameters to drop and the branch.
    fn branch(&self, case: TermId, ctor: ClosId) -> Result<(usize, TermId), Error> {
        let GNode::Case(ci, _, branches) = self.store.node(case) else {
            return Err(Error::Anomaly("Machine::branch (malformed case)"));
        };
        let FTerm::Construct(_, j) = self.fterm(ctor) else {
            return Err(Error::Anomaly("Machine::branch (not a constructor)"));
        };
        let decl = self.env.inductive(&ci.ind)?;
        if decl.constructors.len() != branches.len() || decl.nparams != ci.npars {
            return Err(Error::Anomaly("Machine::branch (case does not match its inductive)"));
        }
        let branch = branches
            .get(*j as usize)
            .ok_or(Error::Anomaly("Machine::branch (missing branch)"))?;
        Ok((ci.npars as usize, *branch))
    }

    fn fix_info(&self, t: TermId) -> Result<&FixInfo, Error> {
        match self.store.node(t) {
            GNode::Fix(info, _, _) => Ok(info),
            _ => Err(Error::Anomaly("Machine::fix_info (not a fixpoint)")),
        }
    }

    /// Unfold a fixpoint or cofixpoint closure once
    ///
    /// Returns the body of the selected function, under an environment binding every function
    /// of the block.
    pub(crate) fn contract_fix(&mut self, m: ClosId) -> Result<(CEnv, TermId), Error> {
        let (t, e) = match self.fterm(m) {
            FTerm::Fix(t, e) | FTerm::CoFix(t, e) => (*t, e.clone()),
            _ => return Err(Error::Anomaly("Machine::contract_fix (not a fixpoint)")),
        };
        let (index, tys, bodies, rec_args) = match self.store.node(t) {
            GNode::Fix(info, tys, bodies) => {
                (info.index, tys.clone(), bodies.clone(), Some(info.rec_args.clone()))
            }
            GNode::CoFix(index, tys, bodies) => (*index, tys.clone(), bodies.clone(), None),
            _ => return Err(Error::Anomaly("Machine::contract_fix (malformed fixpoint)")),
        };
        let body = *bodies
            .get(index as usize)
            .ok_or(Error::Anomaly("Machine::contract_fix (missing body)"))?;
        let mut env = e.clone();
        for j in 0..bodies.len() as u32 {
            let fj = if j == index {
                m
            } else {
                let fterm = match &rec_args {
                    Some(rec_args) => {
                        let info = FixInfo {
                            index: j,
                            rec_args: rec_args.clone(),
                        };
                        let tj = self.store.add(GNode::Fix(info, tys.clone(), bodies.clone()));
                        FTerm::Fix(tj, e.clone())
                    }
                    None => {
                        let tj = self.store.add(GNode::CoFix(j, tys.clone(), bodies.clone()));
                        FTerm::CoFix(tj, e.clone())
                    }
                };
                self.alloc(RedState::Cstr, fterm)
            };
            env = env.cons(fj);
        }
        Ok((env, body))
    }

    /// Reduce a closure to weak head normal form, and rebuild it
    pub(crate) fn whd(&mut self, m: ClosId) -> Result<ClosId, Error> {
        let mut stk = Stack::default();
        let head = self.whd_stack(m, &mut stk)?;
        self.zip(head, stk)
    }

    /// Compute the weak head normal form of a term
    pub(crate) fn whnf(&mut self, tm: TermId) -> Result<TermId, Error> {
        let m = self.mk_clos(&CEnv::id(), tm)?;
        let v = self.whd(m)?;
        self.force(v)
    }
}

/// # Strong normalization
impl Machine<'_> {
    /// Compute the normal form of a term
    pub(crate) fn nf(&mut self, tm: TermId) -> Result<TermId, Error> {
        let m = self.mk_clos(&CEnv::id(), tm)?;
        self.norm_clos(&Lift::id(), m)
    }

    fn norm_clos(&mut self, lfts: &Lift, m: ClosId) -> Result<TermId, Error> {
        let mut stk = Stack::default();
        let head = self.whd_stack(m, &mut stk)?;
        let mut depth = stk.shifts();
        let mut tm = self.norm_head(&lfts.shift(depth), head)?;
        while let Some(frame) = stk.pop() {
            let l = lfts.shift(depth);
            tm = match frame {
                StackMember::App(args) => {
                    let args = args
                        .as_slice()
                        .iter()
                        .map(|a| self.norm_clos(&l, *a))
                        .collect::<Result<Vec<_>, _>>()?;
                    self.store.app(tm, args)
                }
                StackMember::CaseT(t, e) => {
                    let GNode::Case(ci, [motive, _], branches) = self.store.node(t).clone() else {
                        return Err(Error::Anomaly("Machine::norm_clos (malformed case)"));
                    };
                    let motive = self.norm_term(&l, &e, motive)?;
                    let branches = branches
                        .iter()
                        .map(|b| self.norm_term(&l, &e, *b))
                        .collect::<Result<Vec<_>, _>>()?;
                    self.store.case(ci, motive, tm, branches)
                }
                StackMember::Fix(f, saved) => {
                    let f = self.norm_clos(&l, f)?;
                    let mut args = Vec::new();
                    for frame in saved.frames_from_bottom() {
                        if let StackMember::App(a) = frame {
                            args.splice(0..0, a.as_slice().iter().copied());
                        }
                    }
                    let args = args
                        .into_iter()
                        .map(|a| self.norm_clos(&l, a))
                        .collect::<Result<Vec<_>, _>>()?;
                    let f = self.store.app(f, args);
                    self.store.app(f, [tm])
                }
                StackMember::Shift(n) => {
                    depth -= n;
                    tm
                }
                StackMember::Update(_) => tm,
            };
        }
        Ok(tm)
    }

    fn norm_term(&mut self, lfts: &Lift, env: &CEnv, tm: TermId) -> Result<TermId, Error> {
        let m = self.mk_clos(env, tm)?;
        self.norm_clos(lfts, m)
    }

    /// Normalize the subterms of a head in weak head normal form
    fn norm_head(&mut self, lfts: &Lift, m: ClosId) -> Result<TermId, Error> {
        let (t, e) = match self.fterm(m) {
            FTerm::Lambda(t, e)
            | FTerm::Prod(t, e)
            | FTerm::LetIn(t, e)
            | FTerm::Fix(t, e)
            | FTerm::CoFix(t, e) => (*t, e.clone()),
            _ => return self.to_term(lfts, m),
        };
        let node = self.store.node(t).clone().with_binders().map_err(|(b, x)| {
            self.norm_term(&lfts.lift(b), &e.lift(b), x)
        })?;
        Ok(self.store.add(node))
    }
}
