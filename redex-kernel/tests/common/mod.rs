#![allow(dead_code)]

use redex_kernel::kernel::*;
use redex_kernel::term::*;

/// A kernel with natural numbers, streams, an identity function, a fixpoint for addition and a
/// few axioms
pub struct Fixture {
    pub ker: Kernel,
    pub set: TermId,
    pub nat: TermId,
    pub zero: TermId,
    pub succ: TermId,
    /// The raw fixpoint term computing addition by recursion on its first argument
    pub add: TermId,
    /// The stream of ones, as a raw cofixpoint term
    pub ones: TermId,
}

impl Fixture {
    pub fn new() -> Fixture {
        let mut ker = Kernel::default();
        let set = ker.type_(0);
        let nat = ker.ind("Nat");
        let nat_nat = ker.prod(nat, nat);
        ker.add_inductive(
            "Nat",
            InductiveBody {
                ty: set,
                nparams: 0,
                constructors: vec![
                    ConstructorBody {
                        name: "O".into(),
                        ty: nat,
                    },
                    ConstructorBody {
                        name: "S".into(),
                        ty: nat_nat,
                    },
                ],
            },
        )
        .unwrap();
        let zero = ker.construct("Nat", 0);
        let succ = ker.construct("Nat", 1);

        // id := λ (A : Type0) (x : A). x
        let x = ker.rel(1);
        let inner = ker.lambda(x, x);
        let id = ker.lambda(set, inner);
        let a = ker.rel(1);
        let a2 = ker.rel(2);
        let a_a = ker.prod(a, a2);
        let id_ty = ker.prod(set, a_a);
        ker.add_constant("id", id_ty, Some(id), false).unwrap();

        let nat3 = ker.prod(nat, nat_nat);
        ker.add_axiom("k", nat).unwrap();
        ker.add_axiom("j", nat).unwrap();
        ker.add_axiom("f", nat_nat).unwrap();
        ker.add_axiom("c", nat3).unwrap();

        // add := fix add (n m : Nat) := match n with O => m | S p => S (add p m)
        let motive = ker.lambda(nat, nat);
        let (r1, r2, r4) = (ker.rel(1), ker.rel(2), ker.rel(4));
        let rec = ker.app(r4, [r1, r2]);
        let succ_rec = ker.app(succ, [rec]);
        let s_branch = ker.lambda(nat, succ_rec);
        let info = CaseInfo {
            ind: "Nat".into(),
            npars: 0,
        };
        let case = ker.case(info, motive, r2, [r1, s_branch]);
        let body = ker.lambda(nat, case);
        let body = ker.lambda(nat, body);
        let add = ker.fix(
            FixInfo {
                index: 0,
                rec_args: [0].into(),
            },
            [nat3],
            [body],
        );
        ker.add_constant("add", nat3, Some(add), false).unwrap();

        // ones := cofix ones := cons 1 ones
        let stream = ker.ind("Stream");
        let stream_stream = ker.prod(stream, stream);
        let cons_ty = ker.prod(nat, stream_stream);
        ker.add_inductive(
            "Stream",
            InductiveBody {
                ty: set,
                nparams: 0,
                constructors: vec![ConstructorBody {
                    name: "cons".into(),
                    ty: cons_ty,
                }],
            },
        )
        .unwrap();
        let cons = ker.construct("Stream", 0);
        let one = ker.app(succ, [zero]);
        let r1 = ker.rel(1);
        let ones_body = ker.app(cons, [one, r1]);
        let ones = ker.cofix(0, [stream], [ones_body]);

        Fixture {
            ker,
            set,
            nat,
            zero,
            succ,
            add,
            ones,
        }
    }

    /// The unary numeral for `n`
    pub fn num(&mut self, n: u32) -> TermId {
        let mut result = self.zero;
        for _ in 0..n {
            result = self.ker.app(self.succ, [result]);
        }
        result
    }

    /// The mutually recursive parity tests `(even, odd)`, answering with the numerals 1 and 0
    pub fn parity(&mut self) -> (TermId, TermId) {
        let nat = self.nat;
        self.parity_with(nat)
    }

    /// The parity block, with `odd` taking an argument of type `odd_dom`
    pub fn parity_with(&mut self, odd_dom: TermId) -> (TermId, TermId) {
        let ker = &mut self.ker;
        let (nat, zero) = (self.nat, self.zero);
        let nat_nat = ker.prod(nat, nat);
        let motive = ker.lambda(nat, nat);
        let info = CaseInfo {
            ind: "Nat".into(),
            npars: 0,
        };
        let one = ker.app(self.succ, [zero]);
        // Under the block, `n` and `p`: `p` is 1, `odd` is 3 and `even` is 4
        let (r1, r3, r4) = (ker.rel(1), ker.rel(3), ker.rel(4));
        let odd_p = ker.app(r3, [r1]);
        let odd_p = ker.lambda(nat, odd_p);
        let even_case = ker.case(info.clone(), motive, r1, [one, odd_p]);
        let even_body = ker.lambda(nat, even_case);
        let even_p = ker.app(r4, [r1]);
        let even_p = ker.lambda(nat, even_p);
        let odd_case = ker.case(info, motive, r1, [zero, even_p]);
        let odd_body = ker.lambda(odd_dom, odd_case);
        let mut block = |index| {
            let info = FixInfo {
                index,
                rec_args: [0, 0].into(),
            };
            ker.fix(info, [nat_nat, nat_nat], [even_body, odd_body])
        };
        (block(0), block(1))
    }

    /// `id Nat t`
    pub fn id_nat(&mut self, t: TermId) -> TermId {
        let id = self.ker.constant("id");
        self.ker.app(id, [self.nat, t])
    }
}
