//! Plain-text rendering of route trees.

use std::fmt::Write;

use crate::node::ProcessingNode;
use crate::route::RouteDefinition;

/// Render a route as an indented tree, one node per line.
///
/// ```
/// use routeweave_core::{render_route, ProcessingNode, RouteDefinition};
///
/// let route = RouteDefinition::new("orders").with_outputs([
///     ProcessingNode::proxy("audit").with_outputs([ProcessingNode::proceed()]),
/// ]);
/// assert_eq!(render_route(&route), "route orders\n  intercept(audit)\n    proceed\n");
/// ```
pub fn render_route(route: &RouteDefinition) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "route {}", route.id());
    for node in route.outputs() {
        render_node(&mut out, node, 1);
    }
    out
}

fn render_node(out: &mut String, node: &ProcessingNode, depth: usize) {
    let _ = writeln!(out, "{}{}", "  ".repeat(depth), node);
    for child in &node.outputs {
        render_node(out, child, depth + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_nested_tree() {
        let route = RouteDefinition::new("r").with_outputs([
            ProcessingNode::on_exception(["IoError"], true)
                .with_outputs([ProcessingNode::step("log:error")]),
            ProcessingNode::proxy("audit").with_outputs([
                ProcessingNode::step("log:audit"),
                ProcessingNode::proceed().with_outputs([ProcessingNode::step("direct:a")]),
            ]),
        ]);
        let expected = "\
route r
  onException(IoError) handled
    to(log:error)
  intercept(audit)
    to(log:audit)
    proceed
      to(direct:a)
";
        assert_eq!(render_route(&route), expected);
    }

    #[test]
    fn empty_route_renders_header_only() {
        assert_eq!(render_route(&RouteDefinition::new("empty")), "route empty\n");
    }
}
