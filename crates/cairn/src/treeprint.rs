//! Box-drawing pretty printer for the AST.

use crate::ast::Node;

/// Which annotations the printer attaches to each node.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeOptions {
    pub pointers: bool,
    pub types: bool,
    pub symbol_ids: bool,
}

impl TreeOptions {
    /// Every annotation on, as `--tree-all` requests.
    pub fn all() -> Self {
        Self {
            pointers: true,
            types: true,
            symbol_ids: true,
        }
    }
}

struct PrefixRecord {
    label: &'static str,
    branch: &'static str,
}

/// Renders a tree with `├─`/`╰─` prefixes, one node per line.
pub struct TreePrinter {
    prefixes: Vec<PrefixRecord>,
    options: TreeOptions,
    out: String,
}

impl TreePrinter {
    pub fn new(options: TreeOptions) -> Self {
        Self {
            prefixes: vec![],
            options,
            out: String::new(),
        }
    }

    pub fn print(mut self, root: &Node) -> String {
        self.print_node(root);
        self.out
    }

    fn print_node(&mut self, node: &Node) {
        use std::fmt::Write;

        self.print_label_prefix();
        let _ = write!(self.out, "{}", node.label());
        if self.options.pointers {
            let _ = write!(self.out, " [p={:p}]", std::ptr::from_ref(node));
        }
        if self.options.types
            && let Some(ty) = &node.ty
        {
            let _ = write!(self.out, " [type={ty}]");
        }
        if self.options.symbol_ids && node.id != 0 {
            let _ = write!(self.out, " [id={}]", node.id);
        }
        self.out.push('\n');

        let children = node.children();
        let Some((last, rest)) = children.split_last() else {
            return;
        };
        for child in rest {
            self.prefixes.push(PrefixRecord {
                label: "├─",
                branch: "│ ",
            });
            self.print_node(child);
            self.prefixes.pop();
        }
        self.prefixes.push(PrefixRecord {
            label: "╰─",
            branch: "  ",
        });
        self.print_node(last);
        self.prefixes.pop();
    }

    fn print_label_prefix(&mut self) {
        for (i, prefix) in self.prefixes.iter().enumerate() {
            if i == self.prefixes.len() - 1 {
                self.out.push_str(prefix.label);
            } else {
                self.out.push_str(prefix.branch);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{NoIncludes, parse};

    #[test]
    fn prints_nested_structure() {
        let root = parse("fn main() { return 1 + 2; }", &NoIncludes).unwrap();
        let text = TreePrinter::new(TreeOptions::default()).print(&root);
        assert!(text.contains("fn main/0"), "{text}");
        assert!(text.contains("╰─"), "{text}");
        assert!(text.contains("│"), "{text}");
        assert!(text.lines().any(|line| line.ends_with('+')), "{text}");
    }

    #[test]
    fn symbol_id_annotation_is_optional() {
        let root = parse("fn main() { return 1; }", &NoIncludes).unwrap();
        let mut prepared = crate::prepare::prepare(root).unwrap();
        let _ = crate::bytecode::compiler::lower(&mut prepared).unwrap();
        let options = TreeOptions {
            symbol_ids: true,
            ..TreeOptions::default()
        };
        let text = TreePrinter::new(options).print(&prepared.root);
        assert!(text.contains("[id="), "{text}");
    }
}
