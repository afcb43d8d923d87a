//! SMT-LIB text for term DAGs
//!
//! Structurally equal subterms are numbered once. A compound subterm that
//! occurs more than once and is at least [`SHARE_MIN_SIZE`] nodes large as
//! a tree is bound by `let` and referenced by name, so the text stays
//! linear in the number of distinct subterms. Smaller repeats are printed
//! inline.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::expr::{Sort, SymExpr, SymOp};

/// Tree size from which a repeated subterm gets a `let` binding
pub(crate) const SHARE_MIN_SIZE: u64 = 8;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Node {
    Leaf(SymExpr),
    Op(SymOp, Vec<usize>),
    App(String, Vec<usize>, Sort),
}

impl Node {
    fn children(&self) -> &[usize] {
        match self {
            Node::Leaf(_) => &[],
            Node::Op(_, args) | Node::App(_, args, _) => args,
        }
    }
}

/// Hash-consed view of one term
struct Dag {
    nodes: Vec<Node>,
    uses: Vec<u32>,
    size: Vec<u64>,
    root: usize,
}

fn children(e: &SymExpr) -> &[Arc<SymExpr>] {
    match e {
        SymExpr::Op(_, args) | SymExpr::App(_, args, _) => args,
        _ => &[],
    }
}

impl Dag {
    fn build(root: &SymExpr) -> Option<Self> {
        let mut dag = Dag {
            nodes: Vec::new(),
            uses: Vec::new(),
            size: Vec::new(),
            root: 0,
        };
        let mut by_ptr: HashMap<*const SymExpr, usize> = HashMap::new();
        let mut by_node: HashMap<Node, usize> = HashMap::new();
        let mut stack = vec![(root, false)];

        while let Some((e, expanded)) = stack.pop() {
            let ptr: *const SymExpr = e;
            if by_ptr.contains_key(&ptr) {
                continue;
            }
            if !expanded {
                stack.push((e, true));
                for child in children(e).iter().rev() {
                    if !by_ptr.contains_key(&Arc::as_ptr(child)) {
                        stack.push((child.as_ref(), false));
                    }
                }
                continue;
            }
            let ids = children(e)
                .iter()
                .map(|c| by_ptr.get(&Arc::as_ptr(c)).copied())
                .collect::<Option<Vec<_>>>()?;
            let node = match e {
                SymExpr::Op(op, _) => Node::Op(*op, ids),
                SymExpr::App(name, _, sort) => Node::App(name.clone(), ids, sort.clone()),
                leaf => Node::Leaf(leaf.clone()),
            };
            let id = match by_node.get(&node) {
                Some(&id) => id,
                None => dag.push(&mut by_node, node),
            };
            by_ptr.insert(ptr, id);
        }
        dag.root = by_ptr.get(&(root as *const SymExpr)).copied()?;
        Some(dag)
    }

    fn push(&mut self, by_node: &mut HashMap<Node, usize>, node: Node) -> usize {
        let id = self.nodes.len();
        let mut size = 1u64;
        for &child in node.children() {
            self.uses[child] += 1;
            size = size.saturating_add(self.size[child]);
        }
        by_node.insert(node.clone(), id);
        self.nodes.push(node);
        self.uses.push(0);
        self.size.push(size);
        id
    }

    fn is_shared(&self, id: usize) -> bool {
        !self.nodes[id].children().is_empty()
            && self.uses[id] > 1
            && self.size[id] >= SHARE_MIN_SIZE
    }

    /// Write node `id`, referring to bound subterms by name. The node itself
    /// is always written out.
    fn write_term(
        &self,
        f: &mut fmt::Formatter<'_>,
        id: usize,
        names: &HashMap<usize, usize>,
    ) -> fmt::Result {
        enum Step {
            Term(usize),
            Text(&'static str),
        }
        let mut stack = vec![Step::Term(id)];
        let mut top = true;
        while let Some(step) = stack.pop() {
            let id = match step {
                Step::Text(text) => {
                    f.write_str(text)?;
                    continue;
                }
                Step::Term(t) => t,
            };
            if !std::mem::take(&mut top) {
                if let Some(n) = names.get(&id) {
                    write!(f, "_let{n}")?;
                    continue;
                }
            }
            let args = match &self.nodes[id] {
                Node::Leaf(e) => {
                    write!(f, "{e}")?;
                    continue;
                }
                Node::App(name, args, _) if args.is_empty() => {
                    f.write_str(name)?;
                    continue;
                }
                Node::Op(op, args) => {
                    write!(f, "({op}")?;
                    args
                }
                Node::App(name, args, _) => {
                    write!(f, "({name}")?;
                    args
                }
            };
            stack.push(Step::Text(")"));
            for &arg in args.iter().rev() {
                stack.push(Step::Term(arg));
                stack.push(Step::Text(" "));
            }
        }
        Ok(())
    }
}

/// Write a compound term with `let` bindings for its large repeated parts
pub(crate) fn write_shared(f: &mut fmt::Formatter<'_>, e: &SymExpr) -> fmt::Result {
    let dag = Dag::build(e).ok_or(fmt::Error)?;
    let mut names = HashMap::new();
    // Ids are assigned children first, so each binding only mentions
    // earlier ones
    for id in (0..dag.nodes.len()).filter(|&id| dag.is_shared(id)) {
        let n = names.len();
        write!(f, "(let ((_let{n} ")?;
        dag.write_term(f, id, &names)?;
        f.write_str(")) ")?;
        names.insert(id, n);
    }
    dag.write_term(f, dag.root, &names)?;
    for _ in 0..names.len() {
        f.write_str(")")?;
    }
    Ok(())
}
