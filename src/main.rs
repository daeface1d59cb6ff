use std::cmp::Ordering;

use substrate::{
    list::{list_from_slice, list_iter},
    machine::{COMPARE_EQUAL, COMPARE_GREATER, COMPARE_LESS},
    type_info::{BuiltinKind, DuTag, Functors, TypeCtorDesc, TypeProcs},
    Machine, MachineConfig, Result, Transfer, TypeInfo, UntrailReason,
};

fn unify_int(m: &mut Machine) -> Result<Transfer> {
    let equal = m.reg(1) == m.reg(2);
    m.set_reg(1, equal as usize);
    Ok(Transfer::Proceed)
}

fn index_int(_: &mut Machine) -> Result<Transfer> {
    Ok(Transfer::Proceed)
}

fn compare_int(m: &mut Machine) -> Result<Transfer> {
    let code = match m.reg(1).cmp(&m.reg(2)) {
        Ordering::Equal => COMPARE_EQUAL,
        Ordering::Less => COMPARE_LESS,
        Ordering::Greater => COMPARE_GREATER,
    };
    m.set_reg(1, code);
    Ok(Transfer::Proceed)
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut m = Machine::new(MachineConfig::default())?;
    println!("grade: {}", m.config().grade());

    let addrs = m.define_module(
        "int",
        &[
            ("unify", unify_int),
            ("index", index_int),
            ("compare", compare_int),
        ],
    );
    let procs = TypeProcs {
        unify: addrs[0],
        index: addrs[1],
        compare: addrs[2],
    };

    let int = m.types_mut().add_ctor(TypeCtorDesc {
        module: "builtin",
        name: "int",
        arity: 0,
        procs,
        higher_order: false,
        functors: Functors::Special(BuiltinKind::Int),
    });
    let list = m.types_mut().add_ctor(TypeCtorDesc {
        module: "list",
        name: "list",
        arity: 1,
        procs,
        higher_order: false,
        functors: Functors::Du(DuTag::Simple),
    });

    // list(T1), instantiated against list(int)
    let pseudo = m.types_mut().add_static(list, vec![TypeInfo::Param(1)]);
    let caller = m.types_mut().add_static(list, vec![TypeInfo::Ctor(int)]);
    let ti = m.create_type_info(caller, pseudo)?;
    println!("instantiated: {}", m.describe_type_info(ti)?);
    println!("same as caller: {:?}", m.compare_type_info(ti, caller)?);
    println!("int is {:?}", m.data_representation(int));
    println!("3 vs 7: {:?}", m.generic_compare(TypeInfo::Ctor(int), 3, 7)?);

    // build a list, bind a cell inside a choice point, then backtrack
    let cp = m.create_choicepoint();
    let xs = list_from_slice(m.heap_mut(), &[1, 2, 3])?;
    println!("list: {:?}", list_iter(m.heap(), xs).collect::<Vec<_>>());
    let cell = m.heap_mut().create(&[0])?;
    m.trail_assign(cell, 42)?;
    println!("heap words before backtracking: {}", m.heap().words_in_use());
    m.backtrack_to(cp);
    println!("heap words after backtracking: {}", m.heap().words_in_use());

    let trail_demo = m.create_choicepoint();
    m.trail_mut().record_callback(
        |datum, reason: UntrailReason| println!("untrail {} ({:?})", datum, reason),
        7,
    )?;
    m.commit_to(trail_demo);

    println!("labels:");
    for label in m.labels().all_labels() {
        println!("  {:#06x} {}", label.addr, label.name);
    }

    Ok(())
}
