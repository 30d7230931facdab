//! Inline event expressions.
//!
//! The target templates can only bind an event to a method name. Any other
//! handler (`doThing(1, item.label)`, `count++`, `() => go(id)`) is moved into
//! a dispatch table on the component; the template carries its id and the
//! loop/slot locals it closes over as `data-*` attributes.

use crate::context::{NameKind, TransformContext};
use crate::expression::{handler_shape, rewrite_expression, HandlerShape, IdentifierRewriter};
use crate::scope::{Resolution, ScopeTracker};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineExpressionAsset {
    pub id: String,
    pub expression: String,
    /// Body of `function (ctx, scope, $event) { ... }`.
    pub body: String,
    pub scope_keys: Vec<String>,
}

/// Result of registering one handler.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineRegistration {
    pub id: String,
    /// Captured locals: scope key and its current template value.
    pub scope: Vec<(String, String)>,
}

struct InlineRewriter<'c> {
    scope: &'c mut ScopeTracker,
    identifiers: &'c mut BTreeSet<String>,
    captured: Vec<(String, String)>,
}

impl InlineRewriter<'_> {
    fn capture(&mut self, name: &str, text: String) -> Option<String> {
        if !self.captured.iter().any(|(k, _)| k == name) {
            self.captured.push((name.to_string(), text));
        }
        Some(format!("scope.{}", name))
    }
}

impl IdentifierRewriter for InlineRewriter<'_> {
    fn identifier(&mut self, name: &str) -> Option<String> {
        match self.scope.resolve(name) {
            Resolution::Local(text) | Resolution::SlotProp(text) | Resolution::HostLocal(text) => {
                self.capture(name, text)
            }
            Resolution::Instance { in_slot } => {
                self.identifiers.insert(name.to_string());
                if in_slot {
                    Some(format!("ctx.__wvOwner.{}", name))
                } else {
                    Some(format!("ctx.{}", name))
                }
            }
            Resolution::Global => None,
        }
    }

    fn this_expression(&mut self) -> Option<String> {
        Some("ctx".to_string())
    }

    fn this_member(&mut self, prop: &str) -> Option<String> {
        Some(format!("ctx.{}", prop))
    }
}

/// Registers `expr` as an inline handler. `None` when it does not parse;
/// a warning has been recorded in that case.
pub fn register_inline(ctx: &mut TransformContext<'_>, expr: &str) -> Option<InlineRegistration> {
    let expr = expr.trim();
    let Some(shape) = handler_shape(expr) else {
        ctx.warn(format!("Failed to parse event handler `{}`; it is dropped", expr));
        return None;
    };
    let mut rewriter = InlineRewriter {
        scope: &mut ctx.scope,
        identifiers: &mut ctx.template_identifiers,
        captured: Vec::new(),
    };
    let printed = rewrite_expression(expr, &mut rewriter);
    let captured = rewriter.captured;
    let (code, warnings) = match printed {
        Ok(result) => result,
        Err(message) => {
            ctx.warn(format!("Failed to parse event handler `{}`: {}", expr, message));
            return None;
        }
    };
    for w in warnings {
        ctx.warn(w);
    }
    let body = match shape {
        HandlerShape::Identifier | HandlerShape::MemberPath => format!("return {}($event);", code),
        HandlerShape::Function => format!("return ({})($event);", code),
        HandlerShape::Statement => format!("return {};", code),
    };
    let id = ctx.next_name(NameKind::Inline);
    tracing::trace!(id = %id, expr = %expr, "registered inline expression");
    ctx.unit.inline_expressions.push(InlineExpressionAsset {
        id: id.clone(),
        expression: expr.to_string(),
        body,
        scope_keys: captured.iter().map(|(k, _)| k.clone()).collect(),
    });
    Some(InlineRegistration { id, scope: captured })
}

/// Every handler on one element shares a single set of `data-wv-sK`
/// attributes, so each asset's keys become the element-wide union.
pub fn unify_scope_keys(ctx: &mut TransformContext<'_>, registrations: &[InlineRegistration]) -> Vec<(String, String)> {
    let mut union: Vec<(String, String)> = Vec::new();
    for reg in registrations {
        for (key, value) in &reg.scope {
            if !union.iter().any(|(k, _)| k == key) {
                union.push((key.clone(), value.clone()));
            }
        }
    }
    let keys: Vec<String> = union.iter().map(|(k, _)| k.clone()).collect();
    for reg in registrations {
        if let Some(asset) = ctx
            .unit
            .inline_expressions
            .iter_mut()
            .find(|a| a.id == reg.id)
        {
            asset.scope_keys = keys.clone();
        }
    }
    union
}
