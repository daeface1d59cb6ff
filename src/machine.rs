// The machine: one value of this type holds every piece of mutable state
// generated code runs against. Separate machines share nothing.

use std::cmp::Ordering;

use log::debug;

use crate::{
    config::MachineConfig,
    control::{Block, CodeAddr, Program, Transfer},
    error::{ConfigError, Result, RuntimeError},
    heap::{Addr, Heap, HeapMark},
    label::{LabelTable, Registration},
    tags::TagLayout,
    trail::{Ticket, Trail, UntrailReason},
    type_info::{
        AllocationList, BuiltinKind, DataRepresentation, Functors, OwnedTypeInfos, TypeCtorDesc,
        TypeCtorId, TypeInfo, TypeInfoSpace, TypeProcs, TypeTable,
    },
    Word,
};

pub const BUILTIN_MODULE: &str = "builtin";

// result codes of compare procedures, left in r1
pub const COMPARE_EQUAL: Word = 0;
pub const COMPARE_LESS: Word = 1;
pub const COMPARE_GREATER: Word = 2;

// Code addresses and type constructors every machine starts with.
#[derive(Debug, Clone, Copy)]
pub struct Builtins {
    // succip of a `call`: stops the dispatch loop
    pub done: CodeAddr,
    pub unify_pred: CodeAddr,
    pub index_pred: CodeAddr,
    pub compare_pred: CodeAddr,
    // shared by every pred and func type
    pub pred: TypeCtorId,
}

// What backtracking to a choice point needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChoicePoint {
    pub ticket: Ticket,
    pub heap: HeapMark,
}

pub struct Machine {
    config: MachineConfig,
    heap: Heap,
    trail: Trail,
    labels: LabelTable,
    types: TypeTable,
    owned: OwnedTypeInfos,
    program: Program,

    // general purpose registers r1..rN, regs[0] is unused
    regs: Vec<Word>,
    // type_info arguments of the procedure being called generically
    type_args: Vec<TypeInfo>,
    succip: CodeAddr,

    builtins: Builtins,
}

fn engine_done(_: &mut Machine) -> Result<Transfer> {
    Ok(Transfer::Halt)
}

fn builtin_unify_pred(_: &mut Machine) -> Result<Transfer> {
    Err(RuntimeError::HigherOrderUnify)
}

fn builtin_index_pred(m: &mut Machine) -> Result<Transfer> {
    m.set_reg(1, -1isize as Word);
    Ok(Transfer::Proceed)
}

fn builtin_compare_pred(_: &mut Machine) -> Result<Transfer> {
    Err(RuntimeError::HigherOrderCompare)
}

impl Machine {
    pub fn new(config: MachineConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;

        let layout = TagLayout::new(config.tag_bits, config.tag_position);
        let mut program = Program::new();
        let mut labels = LabelTable::new(config.label_buckets);
        let mut types = TypeTable::new(layout, config.type_layout);

        let blocks: [(&str, Block); 4] = [
            ("engine_done", engine_done),
            ("unify_pred", builtin_unify_pred),
            ("index_pred", builtin_index_pred),
            ("compare_pred", builtin_compare_pred),
        ];
        let addrs = define_blocks(&mut program, &mut labels, BUILTIN_MODULE, &blocks);

        let procs = TypeProcs {
            unify: addrs[1],
            index: addrs[2],
            compare: addrs[3],
        };
        let pred = types.add_ctor(TypeCtorDesc {
            module: BUILTIN_MODULE,
            name: "pred",
            arity: 0,
            procs,
            higher_order: true,
            functors: Functors::Special(BuiltinKind::Pred),
        });

        debug!("machine created, grade {}", config.grade());
        Ok(Machine {
            heap: Heap::new(layout, config.reclamation, config.heap_words),
            trail: Trail::new(config.trail_entries),
            labels,
            types,
            owned: OwnedTypeInfos::new(),
            program,
            regs: vec![0; config.registers + 1],
            type_args: Vec::new(),
            succip: addrs[0],
            builtins: Builtins {
                done: addrs[0],
                unify_pred: procs.unify,
                index_pred: procs.index,
                compare_pred: procs.compare,
                pred,
            },
            config,
        })
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn layout(&self) -> TagLayout {
        self.heap.layout()
    }

    pub fn builtins(&self) -> &Builtins {
        &self.builtins
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    pub fn trail(&self) -> &Trail {
        &self.trail
    }

    pub fn trail_mut(&mut self) -> &mut Trail {
        &mut self.trail
    }

    pub fn labels(&mut self) -> &mut LabelTable {
        &mut self.labels
    }

    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    pub fn types_mut(&mut self) -> &mut TypeTable {
        &mut self.types
    }

    pub fn owned_type_infos(&self) -> &OwnedTypeInfos {
        &self.owned
    }

    // Add a module's code blocks. Their labels are registered the first
    // time anything looks a label up.
    pub fn define_module(&mut self, module: &str, blocks: &[(&str, Block)]) -> Vec<CodeAddr> {
        define_blocks(&mut self.program, &mut self.labels, module, blocks)
    }

    // Give an existing address a second name.
    pub fn alias(&mut self, name: &str, addr: CodeAddr) -> Registration {
        self.labels.ensure_initialized();
        self.labels.insert(name, addr)
    }

    pub fn entry(&mut self, name: &str) -> Option<CodeAddr> {
        self.labels.lookup_by_name(name).map(|l| l.addr)
    }

    // The name of the label at `addr`, for diagnostics.
    pub fn describe_addr(&mut self, addr: CodeAddr) -> Option<String> {
        self.labels.lookup_by_addr(addr).map(|l| l.name.clone())
    }

    // Jump to `entry` and keep following transfers until a block halts.
    pub fn run(&mut self, entry: CodeAddr) -> Result<()> {
        let mut pc = entry;
        loop {
            let block = self.program.block(pc)?;
            match block(self)? {
                Transfer::Jump(addr) => pc = addr,
                Transfer::Proceed => pc = self.succip,
                Transfer::Halt => return Ok(()),
            }
        }
    }

    // Run the procedure at `entry` until it proceeds.
    pub fn call(&mut self, entry: CodeAddr) -> Result<()> {
        let saved = std::mem::replace(&mut self.succip, self.builtins.done);
        let result = self.run(entry);
        self.succip = saved;
        result
    }

    pub fn succip(&self) -> CodeAddr {
        self.succip
    }

    pub fn set_succip(&mut self, addr: CodeAddr) {
        self.succip = addr;
    }

    // registers are numbered from 1
    pub fn reg(&self, n: usize) -> Word {
        self.regs.get(n).copied().unwrap_or(0)
    }

    pub fn set_reg(&mut self, n: usize, value: Word) {
        if n >= self.regs.len() {
            self.regs.resize(n + 1, 0);
        }
        self.regs[n] = value;
    }

    pub fn type_arg(&self, n: usize) -> Option<TypeInfo> {
        n.checked_sub(1).and_then(|i| self.type_args.get(i)).copied()
    }

    pub fn type_args(&self) -> &[TypeInfo] {
        &self.type_args
    }

    pub fn create_choicepoint(&mut self) -> ChoicePoint {
        ChoicePoint {
            ticket: self.trail.mark(),
            heap: self.heap.mark(),
        }
    }

    // Undo everything since `cp` was created but keep it, ready for its
    // next alternative.
    pub fn retry(&mut self, cp: &ChoicePoint) {
        self.trail.reset_to(cp.ticket.trail, UntrailReason::Undo, &mut self.heap);
        self.heap.restore(cp.heap);
    }

    // Fail over `cp`: undo everything since it was created and remove it.
    pub fn backtrack_to(&mut self, cp: ChoicePoint) {
        self.trail.unwind_to(cp.ticket, UntrailReason::Undo, &mut self.heap);
        self.heap.restore(cp.heap);
    }

    // Commit to the work done since `cp`, removing it.
    pub fn commit_to(&mut self, cp: ChoicePoint) {
        self.trail.unwind_to(cp.ticket, UntrailReason::Commit, &mut self.heap);
    }

    // Remove `cp` and drop its trail entries without calling anything.
    pub fn discard_choicepoint(&mut self, cp: ChoicePoint) {
        self.trail.discard_to(cp.ticket);
    }

    // Destructively update a heap cell, recording the old value so
    // backtracking puts it back.
    pub fn trail_assign(&mut self, addr: Addr, value: Word) -> Result<()> {
        self.trail.record_value_at(&self.heap, addr)?;
        self.heap.set(addr, value);
        Ok(())
    }

    pub fn type_space(&mut self) -> TypeInfoSpace<'_> {
        TypeInfoSpace {
            table: &self.types,
            heap: &mut self.heap,
            owned: &mut self.owned,
        }
    }

    pub fn create_type_info(&mut self, caller: TypeInfo, pseudo: TypeInfo) -> Result<TypeInfo> {
        self.type_space().create_type_info(caller, pseudo)
    }

    pub fn make_type_info(
        &mut self,
        caller: TypeInfo,
        pseudo: TypeInfo,
        list: &mut AllocationList,
    ) -> Result<TypeInfo> {
        self.type_space().make_type_info(caller, pseudo, list)
    }

    pub fn deallocate(&mut self, list: AllocationList) {
        self.owned.deallocate(list);
    }

    pub fn collapse_equivalences(&mut self, ti: TypeInfo) -> Result<TypeInfo> {
        self.type_space().collapse_equivalences(ti)
    }

    // Compare two type_infos. Whatever collapsing equivalences put on the
    // heap is reclaimed before returning.
    pub fn compare_type_info(&mut self, a: TypeInfo, b: TypeInfo) -> Result<Ordering> {
        let mark = self.heap.mark();
        let result = self.type_space().compare(a, b);
        self.heap.restore(mark);
        result
    }

    pub fn describe_type_info(&mut self, ti: TypeInfo) -> Result<String> {
        self.type_space().describe(ti)
    }

    pub fn data_representation(&self, ctor: TypeCtorId) -> DataRepresentation {
        self.types.data_representation(ctor)
    }

    // Set up a generic call: the type's arguments go in type_args, and the
    // type's procedures are returned.
    fn load_type_args(&mut self, ti: TypeInfo) -> Result<TypeProcs> {
        let node = self.type_space().read(ti)?.into_owned();
        let procs = self.types.ctor(node.ctor)?.procs;
        self.type_args = node.args;
        Ok(procs)
    }

    // Unify two values of type `ti` with the type's own unify procedure.
    pub fn generic_unify(&mut self, ti: TypeInfo, x: Word, y: Word) -> Result<bool> {
        let procs = self.load_type_args(ti)?;
        self.set_reg(1, x);
        self.set_reg(2, y);
        self.call(procs.unify)?;
        Ok(self.reg(1) != 0)
    }

    pub fn generic_index(&mut self, ti: TypeInfo, x: Word) -> Result<isize> {
        let procs = self.load_type_args(ti)?;
        self.set_reg(1, x);
        self.call(procs.index)?;
        Ok(self.reg(1) as isize)
    }

    pub fn generic_compare(&mut self, ti: TypeInfo, x: Word, y: Word) -> Result<Ordering> {
        let procs = self.load_type_args(ti)?;
        self.set_reg(1, x);
        self.set_reg(2, y);
        self.call(procs.compare)?;

        match self.reg(1) {
            COMPARE_EQUAL => Ok(Ordering::Equal),
            COMPARE_LESS => Ok(Ordering::Less),
            COMPARE_GREATER => Ok(Ordering::Greater),
            other => Err(RuntimeError::BadCompareResult(other)),
        }
    }
}

fn define_blocks(
    program: &mut Program,
    labels: &mut LabelTable,
    module: &str,
    blocks: &[(&str, Block)],
) -> Vec<CodeAddr> {
    let entries: Vec<(String, CodeAddr)> = blocks
        .iter()
        .map(|&(name, block)| (format!("{}:{}", module, name), program.add(block)))
        .collect();
    let addrs = entries.iter().map(|&(_, addr)| addr).collect();

    debug!("module {} defines {} blocks", module, entries.len());
    labels.add_module_init(Box::new(move |table: &mut LabelTable| {
        for (name, addr) in entries {
            table.insert(name, addr);
        }
    }));
    addrs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::TagPosition,
        type_info::{DuTag, TypeCtorDesc},
        WORD_BYTES,
    };

    fn machine() -> Machine {
        let config = MachineConfig::default()
            .with_tags(2, TagPosition::Low)
            .with_heap_words(4096);
        Machine::new(config).unwrap()
    }

    // r1 counts down to zero, r2 counts the iterations
    fn countdown(m: &mut Machine) -> Result<Transfer> {
        if m.reg(1) == 0 {
            return Ok(Transfer::Proceed);
        }
        m.set_reg(1, m.reg(1) - 1);
        m.set_reg(2, m.reg(2) + 1);
        let again = m.entry("test:countdown").ok_or(RuntimeError::BadJump(0))?;
        Ok(Transfer::Jump(again))
    }

    fn unify_int(m: &mut Machine) -> Result<Transfer> {
        let equal = m.reg(1) == m.reg(2);
        m.set_reg(1, equal as Word);
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

    fn register_int(m: &mut Machine) -> TypeCtorId {
        let addrs = m.define_module(
            "int",
            &[
                ("unify", unify_int),
                ("index", index_int),
                ("compare", compare_int),
            ],
        );
        m.types_mut().add_ctor(TypeCtorDesc {
            module: "builtin",
            name: "int",
            arity: 0,
            procs: TypeProcs {
                unify: addrs[0],
                index: addrs[1],
                compare: addrs[2],
            },
            higher_order: false,
            functors: Functors::Special(BuiltinKind::Int),
        })
    }

    #[test]
    fn builtin_labels_are_registered_lazily() {
        let mut m = machine();
        let unify = m.builtins().unify_pred;
        assert_eq!(m.describe_addr(unify).as_deref(), Some("builtin:unify_pred"));
        assert_eq!(m.entry("builtin:engine_done"), Some(m.builtins().done));
    }

    #[test]
    fn dispatch_loop_follows_jumps() {
        let mut m = machine();
        let addrs = m.define_module("test", &[("countdown", countdown)]);
        m.set_reg(1, 5);
        m.call(addrs[0]).unwrap();
        assert_eq!(m.reg(1), 0);
        assert_eq!(m.reg(2), 5);
    }

    #[test]
    fn jumping_nowhere_is_fatal() {
        let mut m = machine();
        let bad = m.builtins().done + 1000 * WORD_BYTES;
        assert_eq!(m.run(bad), Err(RuntimeError::BadJump(bad)));
    }

    #[test]
    fn aliases_share_an_address() {
        let mut m = machine();
        let addrs = m.define_module("test", &[("countdown", countdown)]);
        let reg = m.alias("test:countdown_alias", addrs[0]);
        assert!(!reg.is_duplicate());
        assert_eq!(m.entry("test:countdown_alias"), Some(addrs[0]));
        assert_eq!(m.entry("test:countdown"), Some(addrs[0]));
    }

    #[test]
    fn backtracking_undoes_assignments_and_allocations() {
        let mut m = machine();
        let cell = m.heap_mut().create(&[1]).unwrap();
        let cp = m.create_choicepoint();
        m.trail_assign(cell, 2).unwrap();
        m.heap_mut().allocate(0, 8).unwrap();
        assert_eq!(m.heap().get(cell), 2);

        m.retry(&cp);
        assert_eq!(m.heap().get(cell), 1);
        assert_eq!(m.heap().words_in_use(), 1);

        m.trail_assign(cell, 3).unwrap();
        m.commit_to(cp);
        assert_eq!(m.heap().get(cell), 3);
        assert!(m.trail().is_empty());
    }

    #[test]
    fn generic_calls_dispatch_through_the_type() {
        let mut m = machine();
        let int = TypeInfo::Ctor(register_int(&mut m));
        assert_eq!(m.generic_unify(int, 4, 4), Ok(true));
        assert_eq!(m.generic_unify(int, 4, 5), Ok(false));
        assert_eq!(m.generic_compare(int, 9, 5), Ok(Ordering::Greater));
        assert_eq!(m.generic_index(int, 7), Ok(7));
    }

    #[test]
    fn higher_order_values_cannot_be_unified_or_compared() {
        let mut m = machine();
        let int = register_int(&mut m);
        let pred = m.builtins().pred;
        let p = m.types_mut().add_static(pred, vec![TypeInfo::Ctor(int)]);

        assert_eq!(m.generic_unify(p, 1, 1), Err(RuntimeError::HigherOrderUnify));
        assert_eq!(m.generic_compare(p, 1, 1), Err(RuntimeError::HigherOrderCompare));
        assert_eq!(m.generic_index(p, 1), Ok(-1));
        assert_eq!(m.type_arg(1), Some(TypeInfo::Ctor(int)));
        assert_eq!(m.data_representation(pred), DataRepresentation::Pred);
    }

    #[test]
    fn comparison_reclaims_collapsed_copies() {
        let mut m = machine();
        let int = register_int(&mut m);
        let procs = m.types().ctor(int).unwrap().procs;
        let list = m.types_mut().add_ctor(TypeCtorDesc {
            module: "list",
            name: "list",
            arity: 1,
            procs,
            higher_order: false,
            functors: Functors::Du(DuTag::Simple),
        });
        let list_t1 = m.types_mut().add_static(list, vec![TypeInfo::Param(1)]);
        let seq = m.types_mut().add_ctor(TypeCtorDesc {
            module: "seq",
            name: "seq",
            arity: 1,
            procs,
            higher_order: false,
            functors: Functors::Equiv(list_t1),
        });
        let seq_int = m.types_mut().add_static(seq, vec![TypeInfo::Ctor(int)]);
        let list_int = m.types_mut().add_static(list, vec![TypeInfo::Ctor(int)]);

        let before = m.heap().words_in_use();
        assert_eq!(m.compare_type_info(seq_int, list_int), Ok(Ordering::Equal));
        assert_eq!(m.heap().words_in_use(), before);
        assert_eq!(m.describe_type_info(list_int).unwrap(), "list:list(builtin:int)");
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let config = MachineConfig::default().with_label_buckets(0);
        assert_eq!(Machine::new(config).err(), Some(ConfigError::Zero("label_buckets")));
    }
}
