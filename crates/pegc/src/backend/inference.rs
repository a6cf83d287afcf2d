use cranelift_entity::EntityRef;

use crate::{
    ast::{
        query::index_of_rule,
        visit::{walk_expr_mut, VisitorMut},
        CharClass, Expr, Grammar, Literal, MatchResult, Rule, RuleIndex, RuleRef,
    },
    error::GrammarError,
    location::Location,
};

use super::Options;

/// Upper bound of fixed point iterations for a single rule, the number of orderings of the
/// three match states. Must be re-derived if a node kind starts producing results in a new way.
const MAX_ITERATIONS: u32 = 6;

/// Annotates every expression with whether it always, sometimes or never matches.
pub fn infer_match_results(grammar: &mut Grammar, _options: &Options) -> Result<(), GrammarError> {
    let mut inference = Inference { grammar };
    for i in 0..inference.grammar.rules.len() {
        inference.infer_rule(RuleIndex::new(i))?;
    }
    Ok(())
}

struct Inference<'a> {
    grammar: &'a mut Grammar,
}

impl Inference<'_> {
    fn rule(&mut self, index: RuleIndex) -> &mut Rule {
        &mut self.grammar.rules[index.index()]
    }

    /// Memoized on the rule, a rule which is still converging reports its current estimate.
    fn infer_rule(&mut self, index: RuleIndex) -> Result<MatchResult, GrammarError> {
        if let Some(result) = self.rule(index).match_result {
            return Ok(result);
        }

        let rule = self.rule(index);
        rule.match_result = Some(MatchResult::Sometimes);
        let mut body = rule.expression.take();
        let result = self.converge(index, &mut body);
        self.rule(index).expression = body;
        result
    }

    fn converge(&mut self, index: RuleIndex, body: &mut Expr) -> Result<MatchResult, GrammarError> {
        let mut count = 0;
        loop {
            let previous = self.rule(index).match_result.unwrap_or_default();
            let result = self.visit_expr(body, &mut ())?;
            let rule = self.rule(index);
            rule.match_result = Some(result);

            count += 1;
            if count > MAX_ITERATIONS {
                return Err(GrammarError::new(
                    "Infinity cycle detected when trying to evaluate node match result",
                    rule.location.clone(),
                ));
            }
            if result == previous {
                log::trace!("{} converged to {result:?} after {count} iterations", rule.name);
                return Ok(result);
            }
        }
    }
}

type InferResult = Result<MatchResult, GrammarError>;

/// Single-child nodes take over the result of their child by default, leaves without an
/// override (`any` and semantic predicates) are [`MatchResult::Sometimes`].
impl VisitorMut for Inference<'_> {
    type Context = ();
    type Result = InferResult;

    fn visit_expr(&mut self, expr: &mut Expr, cx: &mut ()) -> InferResult {
        let result = walk_expr_mut(self, expr, cx)?;
        expr.match_result = result;
        Ok(result)
    }

    fn visit_choice(&mut self, alternatives: &mut [Expr], cx: &mut ()) -> InferResult {
        let mut always = true;
        let mut never = true;
        for alternative in alternatives {
            match self.visit_expr(alternative, cx)? {
                MatchResult::Always => never = false,
                MatchResult::Sometimes => {
                    always = false;
                    never = false;
                }
                MatchResult::Never => always = false,
            }
        }
        Ok(if always {
            MatchResult::Always
        } else if never {
            MatchResult::Never
        } else {
            MatchResult::Sometimes
        })
    }
    fn visit_sequence(&mut self, elements: &mut [Expr], cx: &mut ()) -> InferResult {
        let mut always = true;
        let mut never = false;
        // every element is annotated even after a failing one
        for element in elements {
            match self.visit_expr(element, cx)? {
                MatchResult::Always => {}
                MatchResult::Sometimes => always = false,
                MatchResult::Never => {
                    always = false;
                    never = true;
                }
            }
        }
        Ok(if always {
            MatchResult::Always
        } else if never {
            MatchResult::Never
        } else {
            MatchResult::Sometimes
        })
    }
    fn visit_simple_not(&mut self, expression: &mut Expr, cx: &mut ()) -> InferResult {
        Ok(self.visit_expr(expression, cx)?.invert())
    }
    fn visit_optional(&mut self, expression: &mut Expr, cx: &mut ()) -> InferResult {
        self.visit_expr(expression, cx)?;
        Ok(MatchResult::Always)
    }
    fn visit_zero_or_more(&mut self, expression: &mut Expr, cx: &mut ()) -> InferResult {
        self.visit_expr(expression, cx)?;
        Ok(MatchResult::Always)
    }
    fn visit_rule_ref(
        &mut self,
        location: &Location,
        rule_ref: &mut RuleRef,
        _cx: &mut (),
    ) -> InferResult {
        match index_of_rule(self.grammar, &rule_ref.name) {
            Some(index) => self.infer_rule(index),
            None => Err(GrammarError::new(
                format!("Rule \"{}\" is not defined", rule_ref.name),
                location.clone(),
            )),
        }
    }
    fn visit_literal(&mut self, literal: &mut Literal, _cx: &mut ()) -> InferResult {
        Ok(match literal.value.is_empty() {
            true => MatchResult::Always,
            false => MatchResult::Sometimes,
        })
    }
    fn visit_class(&mut self, class: &mut CharClass, _cx: &mut ()) -> InferResult {
        Ok(match class.parts.is_empty() {
            true => MatchResult::Never,
            false => MatchResult::Sometimes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::{build::*, ClassPart, ExprKind},
        location::Cursor,
    };

    fn infer(body: Expr) -> MatchResult {
        let mut grammar = grammar(vec![rule("start", body)]);
        infer_match_results(&mut grammar, &Options::default()).unwrap();
        let result = grammar.rules[0].expression.match_result;
        assert_eq!(grammar.rules[0].match_result, Some(result));
        result
    }

    use MatchResult::*;

    #[test]
    fn test_leaves() {
        assert_eq!(infer(literal("")), Always);
        assert_eq!(infer(literal("x")), Sometimes);
        assert_eq!(infer(class(vec![], false, false)), Never);
        assert_eq!(infer(class(vec![ClassPart::Range('a', 'z')], false, false)), Sometimes);
        assert_eq!(infer(any()), Sometimes);
        assert_eq!(infer(semantic_and("true")), Sometimes);
        assert_eq!(infer(semantic_not("false")), Sometimes);
    }

    #[test]
    fn test_composites() {
        let never = || class(vec![], false, false);

        assert_eq!(infer(optional(never())), Always);
        assert_eq!(infer(zero_or_more(literal("x"))), Always);
        assert_eq!(infer(one_or_more(literal("x"))), Sometimes);
        assert_eq!(infer(one_or_more(never())), Never);
        assert_eq!(infer(choice(vec![literal(""), never()])), Sometimes);
        assert_eq!(infer(choice(vec![literal(""), literal("")])), Always);
        assert_eq!(infer(choice(vec![never(), never()])), Never);
        assert_eq!(infer(sequence(vec![literal("x"), never()])), Never);
        assert_eq!(infer(sequence(vec![literal(""), optional(any())])), Always);
        assert_eq!(infer(sequence(vec![literal(""), any()])), Sometimes);
        assert_eq!(infer(sequence(vec![])), Always);
        assert_eq!(infer(simple_not(literal(""))), Never);
        assert_eq!(infer(simple_not(never())), Always);
        assert_eq!(infer(simple_and(literal(""))), Always);
        assert_eq!(infer(text(labeled("a", group(never())))), Never);
        assert_eq!(infer(named("thing", action(literal(""), "return 1;"))), Always);
    }

    #[test]
    fn test_children_annotated() {
        let mut grammar = grammar(vec![rule(
            "start",
            sequence(vec![class(vec![], false, false), optional(literal("")), literal("x")]),
        )]);
        infer_match_results(&mut grammar, &Options::default()).unwrap();

        let results: Vec<_> = grammar.rules[0]
            .expression
            .children()
            .iter()
            .map(|child| child.match_result)
            .collect();
        assert_eq!(results, [Never, Always, Sometimes]);

        let optional = &grammar.rules[0].expression.children()[1];
        let ExprKind::Optional { expression } = &optional.kind else {
            panic!("expected an optional");
        };
        assert_eq!(expression.match_result, Always);
    }

    #[test]
    fn test_rule_refs() {
        let mut grammar = grammar(vec![
            rule("start", sequence(vec![rule_ref("empty"), rule_ref("never")])),
            rule("empty", literal("")),
            rule("never", rule_ref("nothing")),
            rule("nothing", class(vec![], true, false)),
        ]);
        infer_match_results(&mut grammar, &Options::default()).unwrap();

        let results: Vec<_> = grammar.rules.iter().map(|rule| rule.match_result).collect();
        assert_eq!(results, [Some(Never), Some(Always), Some(Never), Some(Never)]);
    }

    #[test]
    fn test_undefined_rule_location() {
        let mut reference = rule_ref("missing");
        reference.location = Location::at(Cursor::new(8, 1, 9));
        let mut grammar = grammar(vec![rule("start", sequence(vec![literal("x"), reference]))]);

        let err = infer_match_results(&mut grammar, &Options::default()).unwrap_err();
        assert_eq!(err.message, "Rule \"missing\" is not defined");
        assert_eq!(err.location, Location::at(Cursor::new(8, 1, 9)));
    }

    #[test]
    fn test_recursive_rules_converge() {
        let mut grammar = grammar(vec![
            rule("a", choice(vec![sequence(vec![literal("x"), rule_ref("a")]), literal("")])),
            rule("b", sequence(vec![literal(""), rule_ref("c")])),
            rule("c", choice(vec![rule_ref("b"), literal("")])),
        ]);
        infer_match_results(&mut grammar, &Options::default()).unwrap();

        let results: Vec<_> = grammar.rules.iter().map(|rule| rule.match_result).collect();
        assert_eq!(results, [Some(Sometimes), Some(Sometimes), Some(Sometimes)]);
    }

    #[test]
    fn test_memoized() {
        let mut grammar = grammar(vec![rule("start", rule_ref("a")), rule("a", literal(""))]);
        grammar.rules[1].match_result = Some(Never);
        infer_match_results(&mut grammar, &Options::default()).unwrap();

        assert_eq!(grammar.rules[0].match_result, Some(Never));
        // the body of a memoized rule is left alone
        assert_eq!(grammar.rules[1].expression.match_result, Sometimes);
    }
}
