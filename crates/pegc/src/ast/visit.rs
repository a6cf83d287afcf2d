//! Structural traversal of the grammar tree.
//!
//! Every node kind has a `visit_*` hook whose default recurses into the children, single-child
//! nodes return the result of their child and leaves return [`VisitResult::output`]. Passes
//! override only the hooks they care about and thread their own `Context` through the walk.

use std::ops::ControlFlow;

use super::{
    Action, CharClass, Code, Expr, ExprKind, Grammar, Labeled, Literal, Named, Rule, RuleRef,
};
use crate::location::Location;

/// What a visitor hook returns, decides whether a walk over siblings keeps going.
pub trait VisitResult: Sized {
    fn output() -> Self;
    fn branch(self) -> ControlFlow<Self>;
}

impl VisitResult for () {
    fn output() {}
    fn branch(self) -> ControlFlow<Self> {
        ControlFlow::Continue(())
    }
}

impl VisitResult for bool {
    fn output() -> Self {
        false
    }
    fn branch(self) -> ControlFlow<Self> {
        ControlFlow::Continue(())
    }
}

impl<T: Default, E> VisitResult for Result<T, E> {
    fn output() -> Self {
        Ok(T::default())
    }
    fn branch(self) -> ControlFlow<Self> {
        match self {
            Ok(_) => ControlFlow::Continue(()),
            Err(err) => ControlFlow::Break(Err(err)),
        }
    }
}

macro_rules! try_visit {
    ($e:expr) => {
        if let ControlFlow::Break(result) = VisitResult::branch($e) {
            return result;
        }
    };
}

pub trait Visitor<'ast>: Sized {
    type Context;
    type Result: VisitResult;

    fn visit_grammar(&mut self, grammar: &'ast Grammar, cx: &mut Self::Context) -> Self::Result {
        walk_grammar(self, grammar, cx)
    }
    fn visit_top_level_initializer(
        &mut self,
        _code: &'ast Code,
        _cx: &mut Self::Context,
    ) -> Self::Result {
        VisitResult::output()
    }
    fn visit_initializer(&mut self, _code: &'ast Code, _cx: &mut Self::Context) -> Self::Result {
        VisitResult::output()
    }
    fn visit_rule(&mut self, rule: &'ast Rule, cx: &mut Self::Context) -> Self::Result {
        self.visit_expr(&rule.expression, cx)
    }
    fn visit_expr(&mut self, expr: &'ast Expr, cx: &mut Self::Context) -> Self::Result {
        walk_expr(self, expr, cx)
    }

    fn visit_named(
        &mut self,
        _expr: &'ast Expr,
        named: &'ast Named,
        cx: &mut Self::Context,
    ) -> Self::Result {
        self.visit_expr(&named.expression, cx)
    }
    fn visit_choice(
        &mut self,
        _expr: &'ast Expr,
        alternatives: &'ast [Expr],
        cx: &mut Self::Context,
    ) -> Self::Result {
        walk_list(self, alternatives, cx)
    }
    fn visit_action(
        &mut self,
        _expr: &'ast Expr,
        action: &'ast Action,
        cx: &mut Self::Context,
    ) -> Self::Result {
        self.visit_expr(&action.expression, cx)
    }
    fn visit_sequence(
        &mut self,
        _expr: &'ast Expr,
        elements: &'ast [Expr],
        cx: &mut Self::Context,
    ) -> Self::Result {
        walk_list(self, elements, cx)
    }
    fn visit_labeled(
        &mut self,
        _expr: &'ast Expr,
        labeled: &'ast Labeled,
        cx: &mut Self::Context,
    ) -> Self::Result {
        self.visit_expr(&labeled.expression, cx)
    }
    fn visit_text(
        &mut self,
        _expr: &'ast Expr,
        expression: &'ast Expr,
        cx: &mut Self::Context,
    ) -> Self::Result {
        self.visit_expr(expression, cx)
    }
    fn visit_simple_and(
        &mut self,
        _expr: &'ast Expr,
        expression: &'ast Expr,
        cx: &mut Self::Context,
    ) -> Self::Result {
        self.visit_expr(expression, cx)
    }
    fn visit_simple_not(
        &mut self,
        _expr: &'ast Expr,
        expression: &'ast Expr,
        cx: &mut Self::Context,
    ) -> Self::Result {
        self.visit_expr(expression, cx)
    }
    fn visit_optional(
        &mut self,
        _expr: &'ast Expr,
        expression: &'ast Expr,
        cx: &mut Self::Context,
    ) -> Self::Result {
        self.visit_expr(expression, cx)
    }
    fn visit_zero_or_more(
        &mut self,
        _expr: &'ast Expr,
        expression: &'ast Expr,
        cx: &mut Self::Context,
    ) -> Self::Result {
        self.visit_expr(expression, cx)
    }
    fn visit_one_or_more(
        &mut self,
        _expr: &'ast Expr,
        expression: &'ast Expr,
        cx: &mut Self::Context,
    ) -> Self::Result {
        self.visit_expr(expression, cx)
    }
    fn visit_group(
        &mut self,
        _expr: &'ast Expr,
        expression: &'ast Expr,
        cx: &mut Self::Context,
    ) -> Self::Result {
        self.visit_expr(expression, cx)
    }
    fn visit_semantic_and(
        &mut self,
        _expr: &'ast Expr,
        _code: &'ast Code,
        _cx: &mut Self::Context,
    ) -> Self::Result {
        VisitResult::output()
    }
    fn visit_semantic_not(
        &mut self,
        _expr: &'ast Expr,
        _code: &'ast Code,
        _cx: &mut Self::Context,
    ) -> Self::Result {
        VisitResult::output()
    }
    fn visit_rule_ref(
        &mut self,
        _expr: &'ast Expr,
        _rule_ref: &'ast RuleRef,
        _cx: &mut Self::Context,
    ) -> Self::Result {
        VisitResult::output()
    }
    fn visit_literal(
        &mut self,
        _expr: &'ast Expr,
        _literal: &'ast Literal,
        _cx: &mut Self::Context,
    ) -> Self::Result {
        VisitResult::output()
    }
    fn visit_class(
        &mut self,
        _expr: &'ast Expr,
        _class: &'ast CharClass,
        _cx: &mut Self::Context,
    ) -> Self::Result {
        VisitResult::output()
    }
    fn visit_any(&mut self, _expr: &'ast Expr, _cx: &mut Self::Context) -> Self::Result {
        VisitResult::output()
    }
}

pub fn walk_grammar<'ast, V: Visitor<'ast>>(
    visitor: &mut V,
    grammar: &'ast Grammar,
    cx: &mut V::Context,
) -> V::Result {
    if let Some(code) = &grammar.top_level_initializer {
        try_visit!(visitor.visit_top_level_initializer(code, cx));
    }
    if let Some(code) = &grammar.initializer {
        try_visit!(visitor.visit_initializer(code, cx));
    }
    for rule in &grammar.rules {
        try_visit!(visitor.visit_rule(rule, cx));
    }
    VisitResult::output()
}

pub fn walk_list<'ast, V: Visitor<'ast>>(
    visitor: &mut V,
    exprs: &'ast [Expr],
    cx: &mut V::Context,
) -> V::Result {
    for expr in exprs {
        try_visit!(visitor.visit_expr(expr, cx));
    }
    VisitResult::output()
}

/// Dispatches on the node kind.
pub fn walk_expr<'ast, V: Visitor<'ast>>(
    visitor: &mut V,
    expr: &'ast Expr,
    cx: &mut V::Context,
) -> V::Result {
    match &expr.kind {
        ExprKind::Named(named) => visitor.visit_named(expr, named, cx),
        ExprKind::Choice { alternatives } => visitor.visit_choice(expr, alternatives, cx),
        ExprKind::Action(action) => visitor.visit_action(expr, action, cx),
        ExprKind::Sequence { elements } => visitor.visit_sequence(expr, elements, cx),
        ExprKind::Labeled(labeled) => visitor.visit_labeled(expr, labeled, cx),
        ExprKind::Text { expression } => visitor.visit_text(expr, expression, cx),
        ExprKind::SimpleAnd { expression } => visitor.visit_simple_and(expr, expression, cx),
        ExprKind::SimpleNot { expression } => visitor.visit_simple_not(expr, expression, cx),
        ExprKind::Optional { expression } => visitor.visit_optional(expr, expression, cx),
        ExprKind::ZeroOrMore { expression } => visitor.visit_zero_or_more(expr, expression, cx),
        ExprKind::OneOrMore { expression } => visitor.visit_one_or_more(expr, expression, cx),
        ExprKind::Group { expression } => visitor.visit_group(expr, expression, cx),
        ExprKind::SemanticAnd(code) => visitor.visit_semantic_and(expr, code, cx),
        ExprKind::SemanticNot(code) => visitor.visit_semantic_not(expr, code, cx),
        ExprKind::RuleRef(rule_ref) => visitor.visit_rule_ref(expr, rule_ref, cx),
        ExprKind::Literal(literal) => visitor.visit_literal(expr, literal, cx),
        ExprKind::Class(class) => visitor.visit_class(expr, class, cx),
        ExprKind::Any => visitor.visit_any(expr, cx),
    }
}

/// The in-place counterpart of [`Visitor`], used by the passes which rewrite or annotate the tree.
pub trait VisitorMut: Sized {
    type Context;
    type Result: VisitResult;

    fn visit_grammar(&mut self, grammar: &mut Grammar, cx: &mut Self::Context) -> Self::Result {
        walk_grammar_mut(self, grammar, cx)
    }
    fn visit_rule(&mut self, rule: &mut Rule, cx: &mut Self::Context) -> Self::Result {
        self.visit_expr(&mut rule.expression, cx)
    }
    fn visit_expr(&mut self, expr: &mut Expr, cx: &mut Self::Context) -> Self::Result {
        walk_expr_mut(self, expr, cx)
    }

    fn visit_named(&mut self, named: &mut Named, cx: &mut Self::Context) -> Self::Result {
        self.visit_expr(&mut named.expression, cx)
    }
    fn visit_choice(&mut self, alternatives: &mut [Expr], cx: &mut Self::Context) -> Self::Result {
        walk_list_mut(self, alternatives, cx)
    }
    fn visit_action(&mut self, action: &mut Action, cx: &mut Self::Context) -> Self::Result {
        self.visit_expr(&mut action.expression, cx)
    }
    fn visit_sequence(&mut self, elements: &mut [Expr], cx: &mut Self::Context) -> Self::Result {
        walk_list_mut(self, elements, cx)
    }
    fn visit_labeled(&mut self, labeled: &mut Labeled, cx: &mut Self::Context) -> Self::Result {
        self.visit_expr(&mut labeled.expression, cx)
    }
    fn visit_text(&mut self, expression: &mut Expr, cx: &mut Self::Context) -> Self::Result {
        self.visit_expr(expression, cx)
    }
    fn visit_simple_and(&mut self, expression: &mut Expr, cx: &mut Self::Context) -> Self::Result {
        self.visit_expr(expression, cx)
    }
    fn visit_simple_not(&mut self, expression: &mut Expr, cx: &mut Self::Context) -> Self::Result {
        self.visit_expr(expression, cx)
    }
    fn visit_optional(&mut self, expression: &mut Expr, cx: &mut Self::Context) -> Self::Result {
        self.visit_expr(expression, cx)
    }
    fn visit_zero_or_more(
        &mut self,
        expression: &mut Expr,
        cx: &mut Self::Context,
    ) -> Self::Result {
        self.visit_expr(expression, cx)
    }
    fn visit_one_or_more(&mut self, expression: &mut Expr, cx: &mut Self::Context) -> Self::Result {
        self.visit_expr(expression, cx)
    }
    fn visit_group(&mut self, expression: &mut Expr, cx: &mut Self::Context) -> Self::Result {
        self.visit_expr(expression, cx)
    }
    fn visit_semantic_and(&mut self, _code: &mut Code, _cx: &mut Self::Context) -> Self::Result {
        VisitResult::output()
    }
    fn visit_semantic_not(&mut self, _code: &mut Code, _cx: &mut Self::Context) -> Self::Result {
        VisitResult::output()
    }
    fn visit_rule_ref(
        &mut self,
        _location: &Location,
        _rule_ref: &mut RuleRef,
        _cx: &mut Self::Context,
    ) -> Self::Result {
        VisitResult::output()
    }
    fn visit_literal(&mut self, _literal: &mut Literal, _cx: &mut Self::Context) -> Self::Result {
        VisitResult::output()
    }
    fn visit_class(&mut self, _class: &mut CharClass, _cx: &mut Self::Context) -> Self::Result {
        VisitResult::output()
    }
    fn visit_any(&mut self, _cx: &mut Self::Context) -> Self::Result {
        VisitResult::output()
    }
}

pub fn walk_grammar_mut<V: VisitorMut>(
    visitor: &mut V,
    grammar: &mut Grammar,
    cx: &mut V::Context,
) -> V::Result {
    for rule in &mut grammar.rules {
        try_visit!(visitor.visit_rule(rule, cx));
    }
    VisitResult::output()
}

pub fn walk_list_mut<V: VisitorMut>(
    visitor: &mut V,
    exprs: &mut [Expr],
    cx: &mut V::Context,
) -> V::Result {
    for expr in exprs {
        try_visit!(visitor.visit_expr(expr, cx));
    }
    VisitResult::output()
}

pub fn walk_expr_mut<V: VisitorMut>(
    visitor: &mut V,
    expr: &mut Expr,
    cx: &mut V::Context,
) -> V::Result {
    match &mut expr.kind {
        ExprKind::Named(named) => visitor.visit_named(named, cx),
        ExprKind::Choice { alternatives } => visitor.visit_choice(alternatives, cx),
        ExprKind::Action(action) => visitor.visit_action(action, cx),
        ExprKind::Sequence { elements } => visitor.visit_sequence(elements, cx),
        ExprKind::Labeled(labeled) => visitor.visit_labeled(labeled, cx),
        ExprKind::Text { expression } => visitor.visit_text(expression, cx),
        ExprKind::SimpleAnd { expression } => visitor.visit_simple_and(expression, cx),
        ExprKind::SimpleNot { expression } => visitor.visit_simple_not(expression, cx),
        ExprKind::Optional { expression } => visitor.visit_optional(expression, cx),
        ExprKind::ZeroOrMore { expression } => visitor.visit_zero_or_more(expression, cx),
        ExprKind::OneOrMore { expression } => visitor.visit_one_or_more(expression, cx),
        ExprKind::Group { expression } => visitor.visit_group(expression, cx),
        ExprKind::SemanticAnd(code) => visitor.visit_semantic_and(code, cx),
        ExprKind::SemanticNot(code) => visitor.visit_semantic_not(code, cx),
        ExprKind::RuleRef(rule_ref) => visitor.visit_rule_ref(&expr.location, rule_ref, cx),
        ExprKind::Literal(literal) => visitor.visit_literal(literal, cx),
        ExprKind::Class(class) => visitor.visit_class(class, cx),
        ExprKind::Any => visitor.visit_any(cx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;

    struct CountLiterals;

    impl<'ast> Visitor<'ast> for CountLiterals {
        type Context = usize;
        type Result = ();

        fn visit_literal(&mut self, _expr: &'ast Expr, _literal: &'ast Literal, cx: &mut usize) {
            *cx += 1;
        }
    }

    struct FirstRuleRef;

    impl<'ast> Visitor<'ast> for FirstRuleRef {
        type Context = Vec<&'ast str>;
        type Result = Result<(), &'ast str>;

        fn visit_rule_ref(
            &mut self,
            _expr: &'ast Expr,
            rule_ref: &'ast RuleRef,
            cx: &mut Vec<&'ast str>,
        ) -> Self::Result {
            cx.push(&rule_ref.name);
            Err(&rule_ref.name)
        }
    }

    #[test]
    fn test_default_recursion() {
        let grammar = grammar(vec![
            rule("a", sequence(vec![literal("x"), optional(literal("y")), rule_ref("b")])),
            rule("b", choice(vec![text(literal("z")), action(literal("w"), "return 1;")])),
        ]);

        let mut count = 0;
        CountLiterals.visit_grammar(&grammar, &mut count);
        assert_eq!(count, 4);
    }

    #[test]
    fn test_break_stops_walk() {
        let grammar = grammar(vec![rule("a", sequence(vec![rule_ref("b"), rule_ref("c")]))]);

        let mut seen = Vec::new();
        let result = FirstRuleRef.visit_grammar(&grammar, &mut seen);
        assert_eq!(result, Err("b"));
        assert_eq!(seen, ["b"]);
    }

    struct Rename;

    impl VisitorMut for Rename {
        type Context = ();
        type Result = ();

        fn visit_literal(&mut self, literal: &mut Literal, _cx: &mut ()) {
            literal.value = literal.value.to_uppercase().into();
        }
    }

    #[test]
    fn test_visitor_mut() {
        let mut grammar = grammar(vec![rule("a", zero_or_more(group(literal("x"))))]);
        Rename.visit_grammar(&mut grammar, &mut ());

        let mut values = Vec::new();
        grammar.rules[0].expression.for_each(|expr| {
            if let ExprKind::Literal(literal) = &expr.kind {
                values.push(literal.value.clone());
            }
        });
        assert_eq!(values, [crate::RcString::from("X")]);
    }
}
