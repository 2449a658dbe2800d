//! Walking trees of declarations
//!
//! A declaration is anything that may own a code unit and may contain further declarations: a
//! module contains classes and functions, a class contains methods, a function contains nested
//! functions. [`iter_declarations`] visits a whole tree, each node before its children, and the
//! children of a node before the node's later siblings.

use crate::code::CodeUnit;
use std::collections::VecDeque;
use std::sync::Arc;

/// A node in a tree of declarations
pub trait Declaration {
    /// Code unit owned by this declaration, if any
    fn code_unit(&self) -> Option<&CodeUnit>;

    /// Directly contained declarations
    fn children(&self) -> Box<dyn Iterator<Item = &Self> + '_>;
}

/// Lazy pre-order walk over a declaration tree
///
/// The pending nodes form a queue. The head is removed and yielded, then its children are placed
/// back at the front of the queue, in their original order.
pub struct Declarations<'a, D: ?Sized> {
    pending: VecDeque<&'a D>,
}

impl<'a, D: Declaration + ?Sized> Iterator for Declarations<'a, D> {
    type Item = &'a D;

    fn next(&mut self) -> Option<&'a D> {
        let next = self.pending.pop_front()?;
        let children: Vec<&'a D> = next.children().collect();
        for child in children.into_iter().rev() {
            self.pending.push_front(child);
        }
        Some(next)
    }
}

/// Visit `root` and everything under it
pub fn iter_declarations<D: Declaration + ?Sized>(root: &D) -> Declarations<'_, D> {
    Declarations {
        pending: VecDeque::from(vec![root]),
    }
}

/// Declaration tree of a code unit and the code units nested in it
///
/// Children are the code constants of the unit, in constants pool order. Each node has a dotted
/// path made from the qualified names leading down to it.
#[derive(Clone, Debug)]
pub struct CodeDeclaration {
    pub unit: Arc<CodeUnit>,
    pub path: String,
    pub children: Vec<CodeDeclaration>,
}

impl CodeDeclaration {
    pub fn from_code_unit(unit: Arc<CodeUnit>) -> CodeDeclaration {
        let path = String::from(unit.qualified_name());
        CodeDeclaration::with_path(unit, path)
    }

    fn with_path(unit: Arc<CodeUnit>, path: String) -> CodeDeclaration {
        let children = unit
            .nested_code_units()
            .map(|nested| {
                let nested_path = format!("{}.{}", path, nested.qualified_name());
                CodeDeclaration::with_path(nested.clone(), nested_path)
            })
            .collect();
        CodeDeclaration {
            unit,
            path,
            children,
        }
    }
}

impl Declaration for CodeDeclaration {
    fn code_unit(&self) -> Option<&CodeUnit> {
        Some(&self.unit)
    }

    fn children(&self) -> Box<dyn Iterator<Item = &CodeDeclaration> + '_> {
        Box::new(self.children.iter())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::code::Constant;

    struct Node {
        name: &'static str,
        children: Vec<Node>,
    }

    fn node(name: &'static str, children: Vec<Node>) -> Node {
        Node { name, children }
    }

    impl Declaration for Node {
        fn code_unit(&self) -> Option<&CodeUnit> {
            None
        }

        fn children(&self) -> Box<dyn Iterator<Item = &Node> + '_> {
            Box::new(self.children.iter())
        }
    }

    fn names(root: &Node) -> Vec<&'static str> {
        iter_declarations(root).map(|decl| decl.name).collect()
    }

    #[test]
    fn children_come_before_later_siblings() {
        let root = node(
            "root",
            vec![node("A", vec![node("C", vec![])]), node("B", vec![])],
        );
        assert_eq!(names(&root), vec!["root", "A", "C", "B"]);
    }

    #[test]
    fn deeper_trees() {
        let root = node(
            "root",
            vec![
                node("A", vec![node("C", vec![node("E", vec![])]), node("D", vec![])]),
                node("B", vec![node("F", vec![])]),
            ],
        );
        assert_eq!(names(&root), vec!["root", "A", "C", "E", "D", "B", "F"]);
    }

    #[test]
    fn lone_root() {
        let root = node("root", vec![]);
        assert_eq!(names(&root), vec!["root"]);
        assert!(root.code_unit().is_none());
    }

    #[test]
    fn code_declarations_follow_constants() {
        let inner = CodeUnit::builder("inner", "m.py").build();
        let outer = CodeUnit::builder("outer", "m.py")
            .constants(vec![Constant::None, Constant::code(inner)])
            .build();
        let other = CodeUnit::builder("other", "m.py").build();
        let module = CodeUnit::builder("<module>", "m.py")
            .constants(vec![
                Constant::code(outer),
                Constant::Int(3),
                Constant::code(other),
            ])
            .build();

        let root = CodeDeclaration::from_code_unit(Arc::new(module));
        let paths: Vec<_> = iter_declarations(&root)
            .map(|decl| decl.path.as_str())
            .collect();
        assert_eq!(
            paths,
            vec![
                "<module>",
                "<module>.outer",
                "<module>.outer.inner",
                "<module>.other"
            ]
        );

        let units: Vec<_> = iter_declarations(&root)
            .filter_map(|decl| decl.code_unit())
            .map(|unit| unit.qualified_name())
            .collect();
        assert_eq!(units, vec!["<module>", "outer", "inner", "other"]);
    }
}
