// Structural comparison of type_infos, and collapsing of equivalence types.

use std::cmp::Ordering;

use log::debug;

use crate::error::{Result, RuntimeError};

use super::{TypeCtorId, TypeInfo, TypeInfoSpace};

impl TypeInfoSpace<'_> {
    fn ctor_of(&self, ti: TypeInfo) -> Result<TypeCtorId> {
        match ti {
            TypeInfo::Param(var) => Err(RuntimeError::UnboundTypeVariable {
                context: "type_info comparison",
                var,
            }),
            TypeInfo::Ctor(id) => Ok(id),
            _ => Ok(self.read(ti)?.ctor),
        }
    }

    // Follow equivalence types until `ti` names a type that is not a
    // synonym. Each step instantiates the synonym's target on the heap.
    pub fn collapse_equivalences(&mut self, ti: TypeInfo) -> Result<TypeInfo> {
        let mut ti = ti;
        let mut steps = 0;

        loop {
            let ctor = self.ctor_of(ti)?;
            let Some(target) = self.table.ctor(ctor)?.equivalent() else {
                break;
            };
            ti = self.create_type_info(ti, target)?;
            steps += 1;
        }

        if steps > 0 {
            debug!("collapsed {} equivalence steps to {:?}", steps, ti);
        }
        Ok(ti)
    }

    // Order two type_infos. The order between different constructors is
    // arbitrary but stable for the life of the machine.
    pub fn compare(&mut self, a: TypeInfo, b: TypeInfo) -> Result<Ordering> {
        if a == b {
            return Ok(Ordering::Equal);
        }

        let a = self.collapse_equivalences(a)?;
        let b = self.collapse_equivalences(b)?;
        if a == b {
            return Ok(Ordering::Equal);
        }

        let node_a = self.read(a)?.into_owned();
        let node_b = self.read(b)?.into_owned();
        match node_a.ctor.cmp(&node_b.ctor) {
            Ordering::Equal => {}
            order => return Ok(order),
        }

        // every pred and func type shares one constructor; the arity is
        // part of the type_info itself
        if self.table.ctor(node_a.ctor)?.higher_order {
            match node_a.args.len().cmp(&node_b.args.len()) {
                Ordering::Equal => {}
                order => return Ok(order),
            }
        }

        for (&x, &y) in node_a.args.iter().zip(&node_b.args) {
            match self.compare(x, y)? {
                Ordering::Equal => {}
                order => return Ok(order),
            }
        }
        Ok(Ordering::Equal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::type_info::{
        tests::{desc, fixture, PROCS},
        AllocationList, BuiltinKind, DuTag, Functors, TypeCtorDesc,
    };

    #[test]
    fn identical_handles_are_equal_without_lookup() {
        let (table, mut heap, mut owned) = fixture();
        let mut space = TypeInfoSpace {
            table: &table,
            heap: &mut heap,
            owned: &mut owned,
        };
        // no such constructor, but identity short-circuits
        let ti = TypeInfo::Static(99);
        assert_eq!(space.compare(ti, ti), Ok(Ordering::Equal));
    }

    #[test]
    fn constructors_order_by_registration() {
        let (mut table, mut heap, mut owned) = fixture();
        let int = table.add_ctor(desc("int", 0, Functors::Special(BuiltinKind::Int)));
        let string = table.add_ctor(desc("string", 0, Functors::Special(BuiltinKind::String)));
        let list = table.add_ctor(desc("list", 1, Functors::Du(DuTag::Simple)));
        let list_int = table.add_static(list, vec![TypeInfo::Ctor(int)]);
        let list_string = table.add_static(list, vec![TypeInfo::Ctor(string)]);

        let mut space = TypeInfoSpace {
            table: &table,
            heap: &mut heap,
            owned: &mut owned,
        };
        assert_eq!(space.compare(TypeInfo::Ctor(int), TypeInfo::Ctor(string)), Ok(Ordering::Less));
        assert_eq!(space.compare(list_int, TypeInfo::Ctor(string)), Ok(Ordering::Greater));
        assert_eq!(space.compare(list_int, list_string), Ok(Ordering::Less));
        assert_eq!(space.compare(list_string, list_int), Ok(Ordering::Greater));
    }

    #[test]
    fn separately_built_copies_compare_equal() {
        let (mut table, mut heap, mut owned) = fixture();
        let int = table.add_ctor(desc("int", 0, Functors::Special(BuiltinKind::Int)));
        let list = table.add_ctor(desc("list", 1, Functors::Du(DuTag::Simple)));
        let pseudo = table.add_static(list, vec![TypeInfo::Param(1)]);
        let caller = table.add_static(list, vec![TypeInfo::Ctor(int)]);

        let mut allocations = AllocationList::new();
        let mut space = TypeInfoSpace {
            table: &table,
            heap: &mut heap,
            owned: &mut owned,
        };
        let on_heap = space.create_type_info(caller, pseudo).unwrap();
        let owned_copy = space.make_type_info(caller, pseudo, &mut allocations).unwrap();
        assert_ne!(on_heap, owned_copy);
        assert_eq!(space.compare(on_heap, owned_copy), Ok(Ordering::Equal));
        assert_eq!(space.compare(on_heap, caller), Ok(Ordering::Equal));
        owned.deallocate(allocations);
    }

    #[test]
    fn equivalences_collapse_before_comparing() {
        let (mut table, mut heap, mut owned) = fixture();
        let int = table.add_ctor(desc("int", 0, Functors::Special(BuiltinKind::Int)));
        let list = table.add_ctor(desc("list", 1, Functors::Du(DuTag::Simple)));
        let list_t1 = table.add_static(list, vec![TypeInfo::Param(1)]);
        // seq(T) == list(T)
        let seq = table.add_ctor(desc("seq", 1, Functors::Equiv(list_t1)));
        let seq_int = table.add_static(seq, vec![TypeInfo::Ctor(int)]);
        let list_int = table.add_static(list, vec![TypeInfo::Ctor(int)]);

        let mut space = TypeInfoSpace {
            table: &table,
            heap: &mut heap,
            owned: &mut owned,
        };
        let collapsed = space.collapse_equivalences(seq_int).unwrap();
        assert_eq!(space.read(collapsed).unwrap().ctor, list);
        assert_eq!(space.compare(seq_int, list_int), Ok(Ordering::Equal));
        assert_eq!(space.collapse_equivalences(list_int), Ok(list_int));
    }

    #[test]
    fn higher_order_types_compare_arity_first() {
        let (mut table, mut heap, mut owned) = fixture();
        let int = table.add_ctor(desc("int", 0, Functors::Special(BuiltinKind::Int)));
        let string = table.add_ctor(desc("string", 0, Functors::Special(BuiltinKind::String)));
        let pred = table.add_ctor(TypeCtorDesc {
            module: "builtin",
            name: "pred",
            arity: 0,
            procs: PROCS,
            higher_order: true,
            functors: Functors::Special(BuiltinKind::Pred),
        });
        let p1 = table.add_static(pred, vec![TypeInfo::Ctor(string)]);
        let p2 = table.add_static(pred, vec![TypeInfo::Ctor(int), TypeInfo::Ctor(int)]);
        let p2b = table.add_static(pred, vec![TypeInfo::Ctor(int), TypeInfo::Ctor(string)]);

        let mut space = TypeInfoSpace {
            table: &table,
            heap: &mut heap,
            owned: &mut owned,
        };
        assert_eq!(space.compare(p1, p2), Ok(Ordering::Less));
        assert_eq!(space.compare(p2, p2b), Ok(Ordering::Less));
    }

    #[test]
    fn unbound_variables_are_fatal() {
        let (mut table, mut heap, mut owned) = fixture();
        let int = table.add_ctor(desc("int", 0, Functors::Special(BuiltinKind::Int)));
        let mut space = TypeInfoSpace {
            table: &table,
            heap: &mut heap,
            owned: &mut owned,
        };
        assert_eq!(
            space.compare(TypeInfo::Param(1), TypeInfo::Ctor(int)),
            Err(RuntimeError::UnboundTypeVariable {
                context: "type_info comparison",
                var: 1
            })
        );
    }
}
