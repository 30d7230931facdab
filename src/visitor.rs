use crate::ir::{ElementNode, InterpolationNode, TemplateNode, TextNode};

/// The TemplateVisitor trait is the traversal mechanism for the template IR.
///
/// Implementers override `visit_*` methods and call the matching `walk_*`
/// function to continue into children unless pruning is intended.
pub trait TemplateVisitor {
    fn visit_children(&mut self, children: &mut Vec<TemplateNode>) {
        walk_children(self, children);
    }

    fn visit_node(&mut self, node: &mut TemplateNode) {
        walk_node(self, node);
    }

    fn visit_element(&mut self, element: &mut ElementNode) {
        walk_element(self, element);
    }

    fn visit_text(&mut self, _text: &mut TextNode) {}

    fn visit_interpolation(&mut self, _interpolation: &mut InterpolationNode) {}
}

pub fn walk_children<V: TemplateVisitor + ?Sized>(visitor: &mut V, children: &mut Vec<TemplateNode>) {
    for node in children {
        visitor.visit_node(node);
    }
}

pub fn walk_node<V: TemplateVisitor + ?Sized>(visitor: &mut V, node: &mut TemplateNode) {
    match node {
        TemplateNode::Element(el) => visitor.visit_element(el),
        TemplateNode::Text(t) => visitor.visit_text(t),
        TemplateNode::Interpolation(i) => visitor.visit_interpolation(i),
        TemplateNode::Comment(_) => {}
    }
}

pub fn walk_element<V: TemplateVisitor + ?Sized>(visitor: &mut V, element: &mut ElementNode) {
    visitor.visit_children(&mut element.children);
}

/// Drops comment nodes before compilation.
pub struct CommentStripper;

impl TemplateVisitor for CommentStripper {
    fn visit_children(&mut self, children: &mut Vec<TemplateNode>) {
        children.retain(|node| !matches!(node, TemplateNode::Comment(_)));
        walk_children(self, children);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::CommentNode;

    #[test]
    fn comments_are_stripped_at_every_depth() {
        let mut inner = ElementNode::new("view");
        inner.children.push(TemplateNode::Comment(CommentNode { value: "x".into() }));
        let mut nodes = vec![
            TemplateNode::Comment(CommentNode { value: "top".into() }),
            TemplateNode::Element(inner),
        ];
        CommentStripper.visit_children(&mut nodes);
        assert_eq!(nodes.len(), 1);
        assert!(nodes[0].as_element().unwrap().children.is_empty());
    }
}
