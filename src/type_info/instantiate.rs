// Instantiating pseudo type_infos against a caller's type_info.
//
// Substitution runs in two passes. The plan pass walks the pseudo type_info
// and records, in post order, only the nodes whose arguments changed. The
// materialise pass then allocates exactly those nodes through a
// `TypeInfoAllocator`. Subtrees that contain no type parameters stay
// `Planned::Same` and are shared with the pseudo type_info.

use crate::{
    error::{Result, RuntimeError},
    heap::Heap,
};

use super::{
    heap_node_words, AllocationList, OwnedTypeInfos, TypeCtorId, TypeInfo, TypeInfoNode,
    TypeInfoSpace,
};

// Where freshly built type_infos go.
pub trait TypeInfoAllocator {
    fn alloc(&mut self, node: TypeInfoNode) -> Result<TypeInfo>;
}

// Builds type_infos on the machine heap. They are reclaimed by restoring
// the heap to a mark taken before the call.
pub struct HeapAllocator<'h> {
    heap: &'h mut Heap,
}

impl<'h> HeapAllocator<'h> {
    pub fn new(heap: &'h mut Heap) -> Self {
        HeapAllocator { heap }
    }
}

impl TypeInfoAllocator for HeapAllocator<'_> {
    fn alloc(&mut self, node: TypeInfoNode) -> Result<TypeInfo> {
        self.heap.create(&heap_node_words(&node)).map(TypeInfo::Heap)
    }
}

// Builds type_infos the caller owns, recording each one in `list`.
pub struct OwnedAllocator<'a> {
    owned: &'a mut OwnedTypeInfos,
    list: &'a mut AllocationList,
}

impl<'a> OwnedAllocator<'a> {
    pub fn new(owned: &'a mut OwnedTypeInfos, list: &'a mut AllocationList) -> Self {
        OwnedAllocator { owned, list }
    }
}

impl TypeInfoAllocator for OwnedAllocator<'_> {
    fn alloc(&mut self, node: TypeInfoNode) -> Result<TypeInfo> {
        let id = self.owned.insert(node);
        self.list.push(id);
        Ok(TypeInfo::Owned(id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Planned {
    Same(TypeInfo),
    Fresh(usize),
}

#[derive(Debug)]
struct PlanNode {
    ctor: TypeCtorId,
    args: Vec<Planned>,
}

#[derive(Debug)]
struct Plan {
    nodes: Vec<PlanNode>,
    root: Planned,
}

impl Plan {
    fn materialise(self, alloc: &mut impl TypeInfoAllocator) -> Result<TypeInfo> {
        let mut built: Vec<TypeInfo> = Vec::with_capacity(self.nodes.len());
        for node in self.nodes {
            let args = node
                .args
                .into_iter()
                .map(|arg| match arg {
                    Planned::Same(ti) => ti,
                    Planned::Fresh(i) => built[i],
                })
                .collect();
            let ti = alloc.alloc(TypeInfoNode {
                ctor: node.ctor,
                args,
            })?;
            built.push(ti);
        }

        Ok(match self.root {
            Planned::Same(ti) => ti,
            Planned::Fresh(i) => built[i],
        })
    }
}

// The caller's arguments, read the first time a parameter needs them.
struct CallerArgs {
    caller: TypeInfo,
    args: Option<Vec<TypeInfo>>,
}

impl CallerArgs {
    fn get(&mut self, space: &TypeInfoSpace<'_>, var: u32) -> Result<TypeInfo> {
        if self.args.is_none() {
            self.args = Some(space.read(self.caller)?.args.clone());
        }
        let args = self.args.as_deref().unwrap_or_default();

        let arg = var
            .checked_sub(1)
            .and_then(|i| args.get(i as usize))
            .copied()
            .ok_or(RuntimeError::TypeParamOutOfRange {
                var,
                arity: args.len(),
            })?;

        if let TypeInfo::Param(_) = arg {
            return Err(RuntimeError::UnboundTypeVariable {
                context: "type_info instantiation",
                var,
            });
        }
        Ok(arg)
    }
}

impl TypeInfoSpace<'_> {
    // Substitute the type parameters of `pseudo` with the arguments of
    // `caller`, building fresh nodes on the heap.
    pub fn create_type_info(&mut self, caller: TypeInfo, pseudo: TypeInfo) -> Result<TypeInfo> {
        let plan = self.plan(caller, pseudo)?;
        plan.materialise(&mut HeapAllocator::new(&mut *self.heap))
    }

    // Like `create_type_info`, but every node built is owned by `list`
    // instead of living on the heap.
    pub fn make_type_info(
        &mut self,
        caller: TypeInfo,
        pseudo: TypeInfo,
        list: &mut AllocationList,
    ) -> Result<TypeInfo> {
        let plan = self.plan(caller, pseudo)?;
        plan.materialise(&mut OwnedAllocator::new(&mut *self.owned, list))
    }

    // Instantiate into an allocator that lives outside this space.
    pub fn instantiate_with(
        &self,
        caller: TypeInfo,
        pseudo: TypeInfo,
        alloc: &mut impl TypeInfoAllocator,
    ) -> Result<TypeInfo> {
        self.plan(caller, pseudo)?.materialise(alloc)
    }

    fn plan(&self, caller: TypeInfo, pseudo: TypeInfo) -> Result<Plan> {
        let mut caller = CallerArgs { caller, args: None };
        let mut nodes = Vec::new();
        let root = self.plan_node(pseudo, &mut caller, &mut nodes)?;
        Ok(Plan { nodes, root })
    }

    fn plan_node(
        &self,
        pseudo: TypeInfo,
        caller: &mut CallerArgs,
        nodes: &mut Vec<PlanNode>,
    ) -> Result<Planned> {
        if let TypeInfo::Param(var) = pseudo {
            return caller.get(self, var).map(Planned::Same);
        }
        if let TypeInfo::Ctor(_) = pseudo {
            return Ok(Planned::Same(pseudo));
        }

        let node = self.read(pseudo)?;
        if node.args.is_empty() {
            return Ok(Planned::Same(pseudo));
        }

        let mut changed = false;
        let mut args = Vec::with_capacity(node.args.len());
        for &arg in &node.args {
            let planned = self.plan_node(arg, caller, nodes)?;
            changed |= planned != Planned::Same(arg);
            args.push(planned);
        }

        if !changed {
            return Ok(Planned::Same(pseudo));
        }

        nodes.push(PlanNode {
            ctor: node.ctor,
            args,
        });
        Ok(Planned::Fresh(nodes.len() - 1))
    }
}
