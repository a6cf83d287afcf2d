use cranelift_entity::EntityRef;

use super::{
    visit::Visitor,
    CharClass, Code, Expr, Grammar, Literal, Rule, RuleIndex, RuleRef,
};

/// First rule with the given name, later duplicates are unreachable.
pub fn find_rule<'a>(grammar: &'a Grammar, name: &str) -> Option<&'a Rule> {
    grammar.rules.iter().find(|rule| &*rule.name == name)
}

pub fn index_of_rule(grammar: &Grammar, name: &str) -> Option<RuleIndex> {
    grammar
        .rules
        .iter()
        .position(|rule| &*rule.name == name)
        .map(RuleIndex::new)
}

/// Whether `expr` is guaranteed to advance the input whenever it succeeds.
///
/// Rule references are followed into the referenced body. A rule that is re-entered while it is
/// still being examined answers `false`, so the query terminates on cyclic grammars.
pub fn always_consumes_on_success(grammar: &Grammar, expr: &Expr) -> bool {
    let mut entered = Vec::new();
    AlwaysConsumes { grammar }.visit_expr(expr, &mut entered)
}

struct AlwaysConsumes<'ast> {
    grammar: &'ast Grammar,
}

impl<'ast> Visitor<'ast> for AlwaysConsumes<'ast> {
    type Context = Vec<RuleIndex>;
    type Result = bool;

    fn visit_choice(
        &mut self,
        _expr: &'ast Expr,
        alternatives: &'ast [Expr],
        cx: &mut Vec<RuleIndex>,
    ) -> bool {
        alternatives.iter().all(|alternative| self.visit_expr(alternative, cx))
    }
    fn visit_sequence(
        &mut self,
        _expr: &'ast Expr,
        elements: &'ast [Expr],
        cx: &mut Vec<RuleIndex>,
    ) -> bool {
        elements.iter().any(|element| self.visit_expr(element, cx))
    }
    fn visit_simple_and(
        &mut self,
        _expr: &'ast Expr,
        _expression: &'ast Expr,
        _cx: &mut Vec<RuleIndex>,
    ) -> bool {
        false
    }
    fn visit_simple_not(
        &mut self,
        _expr: &'ast Expr,
        _expression: &'ast Expr,
        _cx: &mut Vec<RuleIndex>,
    ) -> bool {
        false
    }
    fn visit_optional(
        &mut self,
        _expr: &'ast Expr,
        _expression: &'ast Expr,
        _cx: &mut Vec<RuleIndex>,
    ) -> bool {
        false
    }
    fn visit_zero_or_more(
        &mut self,
        _expr: &'ast Expr,
        _expression: &'ast Expr,
        _cx: &mut Vec<RuleIndex>,
    ) -> bool {
        false
    }
    fn visit_semantic_and(
        &mut self,
        _expr: &'ast Expr,
        _code: &'ast Code,
        _cx: &mut Vec<RuleIndex>,
    ) -> bool {
        false
    }
    fn visit_semantic_not(
        &mut self,
        _expr: &'ast Expr,
        _code: &'ast Code,
        _cx: &mut Vec<RuleIndex>,
    ) -> bool {
        false
    }
    fn visit_rule_ref(
        &mut self,
        _expr: &'ast Expr,
        rule_ref: &'ast RuleRef,
        cx: &mut Vec<RuleIndex>,
    ) -> bool {
        let Some(index) = index_of_rule(self.grammar, &rule_ref.name) else {
            return false;
        };
        if cx.contains(&index) {
            return false;
        }
        let grammar = self.grammar;
        cx.push(index);
        let consumes = self.visit_expr(&grammar.rules[index.index()].expression, cx);
        cx.pop();
        consumes
    }
    fn visit_literal(
        &mut self,
        _expr: &'ast Expr,
        literal: &'ast Literal,
        _cx: &mut Vec<RuleIndex>,
    ) -> bool {
        !literal.value.is_empty()
    }
    fn visit_class(
        &mut self,
        _expr: &'ast Expr,
        _class: &'ast CharClass,
        _cx: &mut Vec<RuleIndex>,
    ) -> bool {
        true
    }
    fn visit_any(&mut self, _expr: &'ast Expr, _cx: &mut Vec<RuleIndex>) -> bool {
        true
    }
}
