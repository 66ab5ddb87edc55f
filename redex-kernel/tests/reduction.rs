mod common;

use common::Fixture;
use redex_kernel::kernel::*;
use redex_kernel::term::*;

#[test]
fn beta_matches_eager_substitution() {
    let mut fx = Fixture::new();
    let ker = &mut fx.ker;
    // (λ (x : Nat). c x k x) j
    let c = ker.constant("c");
    let k = ker.constant("k");
    let j = ker.constant("j");
    let x = ker.rel(1);
    let body = ker.app(c, [x, k, x]);
    let lam = ker.lambda(fx.nat, body);
    let redex = ker.app(lam, [j]);
    let expected = ker.store_mut().subst1(body, j).unwrap();
    assert_eq!(expected, ker.app(c, [j, k, j]));
    assert_eq!(ker.whnf(RedFlags::ALL, redex), Ok(expected));
    let (_, stats) = ker.whnf_with_stats(RedFlags::ALL, redex).unwrap();
    assert_eq!(stats.beta, 1);
    assert_eq!(ker.whnf(RedFlags::NONE, redex), Ok(redex));
}

#[test]
fn beta_under_binders_lowers_free_variables() {
    let mut fx = Fixture::new();
    let ker = &mut fx.ker;
    // λ (y : Nat). (λ (x : Nat). x y) k  ~>  λ (y : Nat). k y
    let (x, y) = (ker.rel(1), ker.rel(2));
    let xy = ker.app(x, [y]);
    let lam = ker.lambda(fx.nat, xy);
    let k = ker.constant("k");
    let redex = ker.app(lam, [k]);
    let t = ker.lambda(fx.nat, redex);
    let y = ker.rel(1);
    let ky = ker.app(k, [y]);
    let expected = ker.lambda(fx.nat, ky);
    assert_eq!(ker.nf(RedFlags::ALL, t), Ok(expected));
    // Weak head reduction stops at the binder
    assert_eq!(ker.whnf(RedFlags::ALL, t), Ok(t));
}

#[test]
fn iota_selects_branch_and_passes_arguments() {
    let mut fx = Fixture::new();
    let k = fx.ker.constant("k");
    let f = fx.ker.constant("f");
    let scrutinee = fx.ker.app(fx.succ, [k]);
    let x = fx.ker.rel(1);
    let fx1 = fx.ker.app(f, [x]);
    let s_branch = fx.ker.lambda(fx.nat, fx1);
    let motive = fx.ker.lambda(fx.nat, fx.nat);
    let info = CaseInfo {
        ind: "Nat".into(),
        npars: 0,
    };
    let case = fx.ker.case(info.clone(), motive, scrutinee, [fx.zero, s_branch]);
    let expected = fx.ker.app(f, [k]);
    let (result, stats) = fx.ker.whnf_with_stats(RedFlags::ALL, case).unwrap();
    assert_eq!(result, expected);
    assert_eq!(stats.iota, 1);
    assert_eq!(fx.ker.convert(ConvPb::Equal, case, expected), Ok(ConstraintSet::default()));

    // A stuck scrutinee leaves the case in place
    let stuck = fx.ker.case(info, motive, k, [fx.zero, s_branch]);
    assert_eq!(fx.ker.whnf(RedFlags::ALL, stuck), Ok(stuck));
}

#[test]
fn iota_drops_parameters() {
    let mut fx = Fixture::new();
    let ker = &mut fx.ker;
    // Inductive Box (A : Type0) := box : A -> Box A
    let set = fx.set;
    let boxed = ker.ind("Box");
    let arity = ker.prod(set, set);
    let a = ker.rel(1);
    let box_a = ker.app(boxed, [a]);
    let a2 = ker.rel(2);
    let box_a2 = ker.app(boxed, [a2]);
    let inner = ker.prod(a, box_a2);
    let ctor_ty = ker.prod(set, inner);
    ker.add_inductive(
        "Box",
        InductiveBody {
            ty: arity,
            nparams: 1,
            constructors: vec![ConstructorBody {
                name: "box".into(),
                ty: ctor_ty,
            }],
        },
    )
    .unwrap();
    let ctor = ker.construct("Box", 0);
    let k = ker.constant("k");
    let value = ker.app(ctor, [fx.nat, k]);
    let motive = ker.lambda(box_a, fx.nat);
    let x = ker.rel(1);
    let unbox = ker.lambda(fx.nat, x);
    let info = CaseInfo {
        ind: "Box".into(),
        npars: 1,
    };
    let case = ker.case(info, motive, value, [unbox]);
    assert_eq!(ker.whnf(RedFlags::ALL, case), Ok(k));
}

#[test]
fn fixpoint_waits_for_its_decreasing_argument() {
    let mut fx = Fixture::new();
    let k = fx.ker.constant("k");
    let one = fx.num(1);
    // Stuck on an axiom in decreasing position
    let stuck = fx.ker.app(fx.add, [k, one]);
    let (result, stats) = fx.ker.whnf_with_stats(RedFlags::ALL, stuck).unwrap();
    assert_eq!(result, stuck);
    assert_eq!(stats.fix, 0);

    // Missing its decreasing argument
    let (result, stats) = fx.ker.whnf_with_stats(RedFlags::ALL, fx.add).unwrap();
    assert_eq!(result, fx.add);
    assert_eq!(stats.fix, 0);

    // Without iota, even a constructor does not unfold it
    let zero = fx.num(0);
    let t = fx.ker.app(fx.add, [one, zero]);
    let (result, stats) = fx.ker.whnf_with_stats(RedFlags::BETA, t).unwrap();
    assert_eq!(result, t);
    assert_eq!(stats.fix, 0);
}

#[test]
fn fixpoint_unfolds_once_per_constructor() {
    let mut fx = Fixture::new();
    let (zero, one) = (fx.num(0), fx.num(1));
    let t = fx.ker.app(fx.add, [one, zero]);
    let (result, stats) = fx.ker.whnf_with_stats(RedFlags::ALL, t).unwrap();
    let rec = fx.ker.app(fx.add, [zero, zero]);
    let expected = fx.ker.app(fx.succ, [rec]);
    assert_eq!(result, expected);
    assert_eq!(stats.fix, 1);
    assert_eq!(stats.iota, 1);

    let (two, three, five) = (fx.num(2), fx.num(3), fx.num(5));
    let sum = fx.ker.app(fx.add, [two, three]);
    let (result, stats) = fx.ker.nf_with_stats(RedFlags::ALL, sum).unwrap();
    assert_eq!(result, five);
    assert_eq!(stats.fix, 3);
}

#[test]
fn fixpoint_through_constant() {
    let mut fx = Fixture::new();
    let add = fx.ker.constant("add");
    let (two, two_again, four) = (fx.num(2), fx.num(2), fx.num(4));
    let sum = fx.ker.app(add, [two, two_again]);
    assert_eq!(fx.ker.nf(RedFlags::ALL, sum), Ok(four));
    assert_eq!(fx.ker.convert(ConvPb::Equal, sum, four), Ok(ConstraintSet::default()));
    // Without delta the constant is rigid
    assert_eq!(fx.ker.nf(RedFlags::BETAIOTAZETA, sum), Ok(sum));
}

#[test]
fn mutual_fixpoints_call_their_siblings() {
    let mut fx = Fixture::new();
    let (even, odd) = fx.parity();
    for n in 0..6 {
        let arg = fx.num(n);
        let t = fx.ker.app(even, [arg]);
        let (result, stats) = fx.ker.nf_with_stats(RedFlags::ALL, t).unwrap();
        assert_eq!(result, fx.num(1 - n % 2));
        assert_eq!(stats.fix, u64::from(n) + 1);
        let t = fx.ker.app(odd, [arg]);
        let expected = fx.num(n % 2);
        assert_eq!(fx.ker.nf(RedFlags::ALL, t), Ok(expected));
    }

    // One unfolding of `even` lands on `odd`
    let k = fx.ker.constant("k");
    let sk = fx.ker.app(fx.succ, [k]);
    let t = fx.ker.app(even, [sk]);
    let (result, stats) = fx.ker.whnf_with_stats(RedFlags::ALL, t).unwrap();
    assert_eq!(result, fx.ker.app(odd, [k]));
    assert_eq!(stats.fix, 1);
}

#[test]
fn case_analyses_must_match_their_inductive() {
    let mut fx = Fixture::new();
    let motive = fx.ker.lambda(fx.nat, fx.nat);
    let mismatch = Err(Error::Anomaly("Machine::branch (case does not match its inductive)"));
    let info = CaseInfo {
        ind: "Nat".into(),
        npars: 0,
    };
    let short = fx.ker.case(info, motive, fx.zero, [fx.zero]);
    assert_eq!(fx.ker.whnf(RedFlags::ALL, short), mismatch);

    let info = CaseInfo {
        ind: "Nat".into(),
        npars: 1,
    };
    let params = fx.ker.case(info, motive, fx.zero, [fx.zero, fx.zero]);
    assert_eq!(fx.ker.whnf(RedFlags::ALL, params), mismatch);

    let info = CaseInfo {
        ind: "Even".into(),
        npars: 0,
    };
    let unknown = fx.ker.case(info, motive, fx.zero, [fx.zero, fx.zero]);
    assert_eq!(
        fx.ker.whnf(RedFlags::ALL, unknown),
        Err(Error::UnknownInductive("Even".into()))
    );
}

#[test]
fn cofixpoint_unfolds_under_case() {
    let mut fx = Fixture::new();
    let stream = fx.ker.ind("Stream");
    let motive = fx.ker.lambda(stream, fx.nat);
    let head = fx.ker.rel(2);
    let tail_lam = fx.ker.lambda(stream, head);
    let branch = fx.ker.lambda(fx.nat, tail_lam);
    let info = CaseInfo {
        ind: "Stream".into(),
        npars: 0,
    };
    let hd = fx.ker.case(info, motive, fx.ones, [branch]);
    let one = fx.num(1);
    let (result, stats) = fx.ker.whnf_with_stats(RedFlags::ALL, hd).unwrap();
    assert_eq!(result, one);
    assert_eq!(stats.cofix, 1);

    // Outside of a case, a cofixpoint is a value
    let (result, stats) = fx.ker.whnf_with_stats(RedFlags::ALL, fx.ones).unwrap();
    assert_eq!(result, fx.ones);
    assert_eq!(stats.cofix, 0);
}

#[test]
fn zeta_is_controlled_by_its_flag() {
    let mut fx = Fixture::new();
    let ker = &mut fx.ker;
    let f = ker.constant("f");
    let k = ker.constant("k");
    let x = ker.rel(1);
    let fx1 = ker.app(f, [x]);
    let t = ker.let_in(k, fx.nat, fx1);
    let fk = ker.app(f, [k]);
    assert_eq!(ker.whnf(RedFlags::ALL, t), Ok(fk));
    assert_eq!(ker.whnf(RedFlags::BETA | RedFlags::IOTA, t), Ok(t));
    let (_, stats) = ker.whnf_with_stats(RedFlags::ZETA, t).unwrap();
    assert_eq!(stats.zeta, 1);
}

#[test]
fn let_bound_values_are_reduced_once() {
    let mut fx = Fixture::new();
    let c = fx.ker.constant("c");
    let three = fx.num(3);
    let shared = fx.id_nat(three);

    // let x := id Nat 3 in c x x x
    let x = fx.ker.rel(1);
    let body = fx.ker.app(c, [x, x, x]);
    let t = fx.ker.let_in(shared, fx.nat, body);
    let (result, stats) = fx.ker.nf_with_stats(RedFlags::ALL, t).unwrap();
    let expected = fx.ker.app(c, [three, three, three]);
    assert_eq!(result, expected);
    assert_eq!(stats.delta, 1);
    assert!(stats.updates >= 1);

    // Without the binding, every occurrence is reduced separately
    let unshared = fx.ker.app(c, [shared, shared, shared]);
    let (result, stats) = fx.ker.nf_with_stats(RedFlags::ALL, unshared).unwrap();
    assert_eq!(result, expected);
    assert_eq!(stats.delta, 3);
}

#[test]
fn local_definitions_unfold() {
    let mut fx = Fixture::new();
    let two = fx.num(2);
    fx.ker.push_local("x", fx.nat, Some(two)).unwrap();
    fx.ker.push_local("y", fx.nat, None).unwrap();
    let x = fx.ker.var("x");
    let y = fx.ker.var("y");
    assert_eq!(fx.ker.whnf(RedFlags::ALL, x), Ok(two));
    assert_eq!(fx.ker.whnf(RedFlags::BETAIOTAZETA, x), Ok(x));
    assert_eq!(fx.ker.whnf(RedFlags::ALL, y), Ok(y));
    let z = fx.ker.var("z");
    assert_eq!(
        fx.ker.whnf(RedFlags::ALL, z),
        Err(Error::UnknownVariable("z".into()))
    );
}

#[test]
fn unknown_constants_are_reported() {
    let mut ker = Kernel::default();
    let nope = ker.constant("nope");
    assert_eq!(
        ker.whnf(RedFlags::ALL, nope),
        Err(Error::UnknownConstant("nope".into()))
    );
    assert_eq!(ker.whnf(RedFlags::BETA, nope), Ok(nope));
}

#[test]
fn shaped_reductions() {
    let mut fx = Fixture::new();
    let nat_nat = fx.ker.prod(fx.nat, fx.nat);
    fx.ker.add_constant("Endo", fx.set, Some(nat_nat), false).unwrap();
    let endo = fx.ker.constant("Endo");
    assert_eq!(fx.ker.reduce_to_prod(endo), Ok((fx.nat, fx.nat)));
    assert_eq!(fx.ker.reduce_to_prod(fx.nat), Err(Error::NotAProduct));
    assert_eq!(fx.ker.reduce_to_arity(endo), Err(Error::NotAnArity));

    let prop = fx.ker.prop();
    let rel = fx.ker.prod(fx.nat, prop);
    let rel = fx.ker.prod(fx.nat, rel);
    fx.ker.add_constant("Rel", fx.set, Some(rel), false).unwrap();
    let rel = fx.ker.constant("Rel");
    assert_eq!(
        fx.ker.reduce_to_arity(rel),
        Ok((vec![fx.nat, fx.nat], Sort::Prop))
    );
}

#[test]
fn fuel_and_interrupts_abort_reduction() {
    let mut fx = Fixture::new();
    let (two, three) = (fx.num(2), fx.num(3));
    let sum = fx.ker.app(fx.add, [two, three]);
    let limits = Limits {
        interrupt: None,
        fuel: Some(3),
    };
    assert_eq!(
        fx.ker.nf_with(RedFlags::ALL, limits, sum),
        Err(Error::OutOfFuel)
    );
    let irq = Interrupt::new();
    irq.raise();
    let limits = Limits {
        interrupt: Some(&irq),
        fuel: None,
    };
    assert_eq!(
        fx.ker.whnf_with(RedFlags::ALL, limits, sum),
        Err(Error::Interrupted)
    );
    irq.clear();
    assert!(fx.ker.whnf_with(RedFlags::ALL, limits, sum).is_ok());
}
