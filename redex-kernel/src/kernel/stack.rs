use std::rc::Rc;

use ref_cast::RefCast;

use super::Error;
use super::closure::{CEnv, ClosId, FTerm, RedState};
use super::whnf::Machine;
use crate::term::TermId;

/// A nonempty run of arguments pending on a stack
#[derive(Debug, Clone)]
pub struct Args {
    items: Rc<[ClosId]>,
    start: usize,
}

impl Args {
    /// The pending arguments, first argument first
    pub fn as_slice(&self) -> &[ClosId] {
        &self.items[self.start..]
    }

    /// The number of pending arguments
    pub fn len(&self) -> usize {
        self.items.len() - self.start
    }

    /// Split off the first `n` arguments
    ///
    /// Returns the remaining arguments, if any
    fn take(self, n: usize, into: &mut Vec<ClosId>) -> Option<Args> {
        let n = n.min(self.len());
        into.extend_from_slice(&self.as_slice()[..n]);
        if n == self.len() {
            return None;
        }
        Some(Args {
            start: self.start + n,
            items: self.items,
        })
    }
}

/// A pending eliminator
#[derive(Debug, Clone)]
pub enum StackMember {
    /// Apply the head to arguments
    App(Args),
    /// Case-analyse the head, with the motive and branches of a case term living in an
    /// environment
    CaseT(TermId, CEnv),
    /// The head is the decreasing argument of a fixpoint, already applied to the stacked
    /// arguments before it
    Fix(ClosId, Stack),
    /// The frames below live `n` binders deeper than the head
    Shift(u32),
    /// Write the weak head normal form reached here back into a thunk
    Update(ClosId),
}

/// A stack of eliminators, applied innermost-first to a head
#[derive(Debug, Clone, Default)]
pub struct Stack(Vec<StackMember>);

/// A borrowed view of the frames of a [`Stack`], bottom frame first
#[derive(Debug, RefCast)]
#[repr(transparent)]
pub struct Spine([StackMember]);

/// The shape of a stack, ignoring shifts, updates and how arguments are grouped
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) enum Shape {
    Args(usize),
    Case,
    Fix(Vec<Shape>),
}

impl std::ops::Deref for Stack {
    type Target = Spine;

    fn deref(&self) -> &Spine {
        Spine::ref_cast(&self.0[..])
    }
}

impl Stack {
    /// A stack applying its head to the given arguments
    pub fn from_args(args: Vec<ClosId>) -> Stack {
        let mut stk = Stack::default();
        stk.append(args);
        stk
    }

    pub fn push(&mut self, frame: StackMember) {
        self.0.push(frame)
    }

    pub fn pop(&mut self) -> Option<StackMember> {
        self.0.pop()
    }

    /// Push arguments, the first of which is applied first
    pub fn append(&mut self, args: Vec<ClosId>) {
        if !args.is_empty() {
            self.append_shared(args.into())
        }
    }

    /// Push a shared run of arguments
    pub fn append_shared(&mut self, items: Rc<[ClosId]>) {
        if !items.is_empty() {
            self.0.push(StackMember::App(Args { items, start: 0 }))
        }
    }

    /// Push a shift frame, merging it with a shift already on top
    pub fn shift(&mut self, n: u32) {
        if n == 0 {
            return;
        }
        if let Some(StackMember::Shift(k)) = self.0.last_mut() {
            *k += n;
            return;
        }
        self.0.push(StackMember::Shift(n))
    }

    /// Push an update frame for `m`, if it is a thunk
    pub fn update(&mut self, m: ClosId, norm: RedState) {
        if norm == RedState::Red {
            self.0.push(StackMember::Update(m))
        }
    }

    /// Apply the whole stack to the variable `rel1` of a new binder
    ///
    /// The frames already on the stack stay outside the binder.
    pub fn eta_expand(&mut self, rel1: ClosId) {
        let extra = [
            StackMember::App(Args {
                items: Rc::from([rel1]),
                start: 0,
            }),
            StackMember::Shift(1),
        ];
        self.0.splice(0..0, extra);
    }

    /// Push a saved stack on top of this one
    pub fn extend(&mut self, saved: Stack) {
        self.0.extend(saved.0)
    }
}

impl Spine {
    /// Iterate over the frames, top frame first
    pub fn frames(&self) -> impl Iterator<Item = &StackMember> + '_ {
        self.0.iter().rev()
    }

    /// Iterate over the frames, bottom frame first
    pub fn frames_from_bottom(&self) -> impl Iterator<Item = &StackMember> + '_ {
        self.0.iter()
    }

    /// Get the topmost frame
    pub fn top(&self) -> Option<&StackMember> {
        self.0.last()
    }

    /// Whether every frame is a shift or an update, so that the head is not eliminated
    pub fn is_neutral(&self) -> bool {
        self.0
            .iter()
            .all(|f| matches!(f, StackMember::Shift(_) | StackMember::Update(_)))
    }

    /// The total number of binders crossed by the shifts of this stack
    pub fn shifts(&self) -> u32 {
        self.0
            .iter()
            .map(|f| match f {
                StackMember::Shift(n) => *n,
                _ => 0,
            })
            .sum()
    }

    pub(crate) fn shape(&self) -> Vec<Shape> {
        let mut shape = Vec::new();
        for frame in self.frames() {
            match frame {
                StackMember::App(args) => match shape.last_mut() {
                    Some(Shape::Args(n)) => *n += args.len(),
                    _ => shape.push(Shape::Args(args.len())),
                },
                StackMember::CaseT(..) => shape.push(Shape::Case),
                StackMember::Fix(_, saved) => shape.push(Shape::Fix(saved.shape())),
                StackMember::Shift(_) | StackMember::Update(_) => {}
            }
        }
        shape
    }
}

/// # Stacks
///
/// Operations on stacks needing access to closures
impl Machine<'_> {
    /// Collect up to `limit` arguments from the top of a stack
    ///
    /// Shifts crossed on the way are applied to the head and arguments, and update frames are
    /// written with the head applied to the arguments collected so far.
    pub(crate) fn strip_app(
        &mut self,
        head: ClosId,
        stk: &mut Stack,
        limit: Option<usize>,
    ) -> Result<(ClosId, Vec<ClosId>), Error> {
        let mut head = head;
        let mut args = Vec::new();
        loop {
            match stk.0.last() {
                Some(StackMember::Shift(n)) => {
                    let n = *n;
                    stk.pop();
                    head = self.lift(n, head);
                    for arg in args.iter_mut() {
                        *arg = self.lift(n, *arg);
                    }
                }
                Some(StackMember::Update(r)) => {
                    let r = *r;
                    stk.pop();
                    let value = self.app_clos(head, args.clone());
                    self.update(r, value);
                }
                Some(StackMember::App(_)) if limit.is_none_or(|l| args.len() < l) => {
                    let Some(StackMember::App(frame)) = stk.pop() else {
                        return Err(Error::Anomaly("Machine::strip_app (lost frame)"));
                    };
                    let wanted = limit.map_or(usize::MAX, |l| l - args.len());
                    if let Some(rest) = frame.take(wanted, &mut args) {
                        stk.push(StackMember::App(rest));
                    }
                }
                _ => return Ok((head, args)),
            }
        }
    }

    /// Find the `n`-th (0-based) argument of `head` on a stack
    ///
    /// On success, the arguments up to and including it are removed from the stack. Otherwise the
    /// stack is left with every available argument in a single frame.
    pub(crate) fn get_nth_arg(
        &mut self,
        head: ClosId,
        n: usize,
        stk: &mut Stack,
    ) -> Result<(ClosId, Option<(Vec<ClosId>, ClosId)>), Error> {
        let (head, mut args) = self.strip_app(head, stk, Some(n + 1))?;
        if args.len() == n + 1 {
            let arg = args.pop().ok_or(Error::Anomaly("Machine::get_nth_arg"))?;
            return Ok((head, Some((args, arg))));
        }
        stk.append(args);
        Ok((head, None))
    }

    /// Rebuild the closure of a head under a stack, performing its updates
    pub(crate) fn zip(&mut self, head: ClosId, stk: Stack) -> Result<ClosId, Error> {
        let mut stk = stk;
        let mut head = head;
        while let Some(frame) = stk.pop() {
            head = match frame {
                StackMember::App(args) => self.app_clos(head, args.as_slice().to_vec()),
                StackMember::Shift(n) => self.lift(n, head),
                StackMember::Update(r) => {
                    self.update(r, head);
                    head
                }
                StackMember::CaseT(t, e) => self.alloc(RedState::Whnf, FTerm::CaseT(t, head, e)),
                StackMember::Fix(f, saved) => {
                    let mut s = Stack::from_args(vec![head]);
                    s.extend(saved);
                    self.zip(f, s)?
                }
            };
        }
        Ok(head)
    }
}
