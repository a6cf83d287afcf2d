use std::collections::HashMap;

use crate::{
    ast::{
        query::{always_consumes_on_success, find_rule},
        visit::Visitor,
        Action, Expr, Grammar, Labeled, Rule, RuleRef,
    },
    error::GrammarError,
    location::Location,
};

use super::Options;

type CheckResult = Result<(), GrammarError>;

/// Every rule reference must name a declared rule.
pub fn report_undefined_rules(grammar: &mut Grammar, _options: &Options) -> CheckResult {
    let grammar = &*grammar;
    UndefinedRules { grammar }.visit_grammar(grammar, &mut ())
}

struct UndefinedRules<'ast> {
    grammar: &'ast Grammar,
}

impl<'ast> Visitor<'ast> for UndefinedRules<'ast> {
    type Context = ();
    type Result = CheckResult;

    fn visit_rule_ref(
        &mut self,
        expr: &'ast Expr,
        rule_ref: &'ast RuleRef,
        _cx: &mut (),
    ) -> CheckResult {
        if find_rule(self.grammar, &rule_ref.name).is_none() {
            return Err(GrammarError::new(
                format!("Rule \"{}\" is not defined", rule_ref.name),
                expr.location.clone(),
            ));
        }
        Ok(())
    }
}

pub fn report_duplicate_rules(grammar: &mut Grammar, _options: &Options) -> CheckResult {
    DuplicateRules.visit_grammar(grammar, &mut HashMap::new())
}

struct DuplicateRules;

impl<'ast> Visitor<'ast> for DuplicateRules {
    type Context = HashMap<&'ast str, &'ast Location>;
    type Result = CheckResult;

    fn visit_rule(&mut self, rule: &'ast Rule, cx: &mut Self::Context) -> CheckResult {
        if let Some(&original) = cx.get(&*rule.name) {
            return Err(GrammarError::new(
                format!("Rule \"{}\" is already defined", rule.name),
                rule.name_location.clone(),
            )
            .with_diagnostic("Original rule location", original.clone()));
        }
        cx.insert(&rule.name, &rule.name_location);
        Ok(())
    }
}

/// Labels must be unique within their scope. A scope starts at each rule, every choice
/// alternative and every prefix or suffix operator gets its own copy of the enclosing one.
pub fn report_duplicate_labels(grammar: &mut Grammar, _options: &Options) -> CheckResult {
    DuplicateLabels.visit_grammar(grammar, &mut HashMap::new())
}

struct DuplicateLabels;

type LabelEnv<'ast> = HashMap<&'ast str, &'ast Location>;

impl DuplicateLabels {
    fn visit_scoped<'ast>(&mut self, expression: &'ast Expr, env: &LabelEnv<'ast>) -> CheckResult {
        self.visit_expr(expression, &mut env.clone())
    }
}

impl<'ast> Visitor<'ast> for DuplicateLabels {
    type Context = LabelEnv<'ast>;
    type Result = CheckResult;

    fn visit_rule(&mut self, rule: &'ast Rule, _cx: &mut LabelEnv<'ast>) -> CheckResult {
        self.visit_expr(&rule.expression, &mut HashMap::new())
    }
    fn visit_choice(
        &mut self,
        _expr: &'ast Expr,
        alternatives: &'ast [Expr],
        cx: &mut LabelEnv<'ast>,
    ) -> CheckResult {
        for alternative in alternatives {
            self.visit_scoped(alternative, cx)?;
        }
        Ok(())
    }
    fn visit_action(
        &mut self,
        _expr: &'ast Expr,
        action: &'ast Action,
        cx: &mut LabelEnv<'ast>,
    ) -> CheckResult {
        self.visit_scoped(&action.expression, cx)
    }
    fn visit_labeled(
        &mut self,
        _expr: &'ast Expr,
        labeled: &'ast Labeled,
        cx: &mut LabelEnv<'ast>,
    ) -> CheckResult {
        // a bare pluck has no name to clash with
        let Some(label) = &labeled.label else {
            return self.visit_expr(&labeled.expression, cx);
        };
        if let Some(&original) = cx.get(&**label) {
            return Err(GrammarError::new(
                format!("Label \"{label}\" is already defined"),
                labeled.label_location.clone(),
            )
            .with_diagnostic("Original label location", original.clone()));
        }
        self.visit_expr(&labeled.expression, cx)?;
        cx.insert(label, &labeled.label_location);
        Ok(())
    }
    fn visit_text(
        &mut self,
        _expr: &'ast Expr,
        expression: &'ast Expr,
        cx: &mut LabelEnv<'ast>,
    ) -> CheckResult {
        self.visit_scoped(expression, cx)
    }
    fn visit_simple_and(
        &mut self,
        _expr: &'ast Expr,
        expression: &'ast Expr,
        cx: &mut LabelEnv<'ast>,
    ) -> CheckResult {
        self.visit_scoped(expression, cx)
    }
    fn visit_simple_not(
        &mut self,
        _expr: &'ast Expr,
        expression: &'ast Expr,
        cx: &mut LabelEnv<'ast>,
    ) -> CheckResult {
        self.visit_scoped(expression, cx)
    }
    fn visit_optional(
        &mut self,
        _expr: &'ast Expr,
        expression: &'ast Expr,
        cx: &mut LabelEnv<'ast>,
    ) -> CheckResult {
        self.visit_scoped(expression, cx)
    }
    fn visit_zero_or_more(
        &mut self,
        _expr: &'ast Expr,
        expression: &'ast Expr,
        cx: &mut LabelEnv<'ast>,
    ) -> CheckResult {
        self.visit_scoped(expression, cx)
    }
    fn visit_one_or_more(
        &mut self,
        _expr: &'ast Expr,
        expression: &'ast Expr,
        cx: &mut LabelEnv<'ast>,
    ) -> CheckResult {
        self.visit_scoped(expression, cx)
    }
    fn visit_group(
        &mut self,
        _expr: &'ast Expr,
        expression: &'ast Expr,
        cx: &mut LabelEnv<'ast>,
    ) -> CheckResult {
        self.visit_scoped(expression, cx)
    }
}

pub fn report_reserved_labels(grammar: &mut Grammar, options: &Options) -> CheckResult {
    ReservedLabels { options }.visit_grammar(grammar, &mut ())
}

struct ReservedLabels<'a> {
    options: &'a Options,
}

impl<'ast> Visitor<'ast> for ReservedLabels<'_> {
    type Context = ();
    type Result = CheckResult;

    fn visit_labeled(
        &mut self,
        _expr: &'ast Expr,
        labeled: &'ast Labeled,
        cx: &mut (),
    ) -> CheckResult {
        if let Some(label) = &labeled.label {
            if self.options.reserved_words.iter().any(|word| **word == **label) {
                return Err(GrammarError::new(
                    format!("Label can't be a reserved word \"{label}\""),
                    labeled.label_location.clone(),
                ));
            }
        }
        self.visit_expr(&labeled.expression, cx)
    }
}

/// Repeating an expression which can succeed without consuming input would never terminate.
pub fn report_infinite_repetition(grammar: &mut Grammar, _options: &Options) -> CheckResult {
    let grammar = &*grammar;
    InfiniteRepetition { grammar }.visit_grammar(grammar, &mut ())
}

struct InfiniteRepetition<'ast> {
    grammar: &'ast Grammar,
}

impl<'ast> Visitor<'ast> for InfiniteRepetition<'ast> {
    type Context = ();
    type Result = CheckResult;

    fn visit_zero_or_more(
        &mut self,
        expr: &'ast Expr,
        expression: &'ast Expr,
        cx: &mut (),
    ) -> CheckResult {
        if !always_consumes_on_success(self.grammar, expression) {
            return Err(GrammarError::new(
                "Parser would loop infinitely on some inputs: Zero or more repetitions (`*`) of a pattern that may not consume any input",
                expr.location.clone(),
            ));
        }
        self.visit_expr(expression, cx)
    }
    fn visit_one_or_more(
        &mut self,
        expr: &'ast Expr,
        expression: &'ast Expr,
        cx: &mut (),
    ) -> CheckResult {
        if !always_consumes_on_success(self.grammar, expression) {
            return Err(GrammarError::new(
                "Parser would loop infinitely on some inputs: One or more repetitions (`+`) of a pattern that may not consume any input",
                expr.location.clone(),
            ));
        }
        self.visit_expr(expression, cx)
    }
}

/// Plucking with `@` and an action block are mutually exclusive.
pub fn report_incorrect_plucking(grammar: &mut Grammar, _options: &Options) -> CheckResult {
    IncorrectPlucking.visit_grammar(grammar, &mut None)
}

struct IncorrectPlucking;

impl<'ast> Visitor<'ast> for IncorrectPlucking {
    /// The closest enclosing action.
    type Context = Option<&'ast Action>;
    type Result = CheckResult;

    fn visit_action(
        &mut self,
        _expr: &'ast Expr,
        action: &'ast Action,
        _cx: &mut Option<&'ast Action>,
    ) -> CheckResult {
        self.visit_expr(&action.expression, &mut Some(action))
    }
    fn visit_labeled(
        &mut self,
        _expr: &'ast Expr,
        labeled: &'ast Labeled,
        cx: &mut Option<&'ast Action>,
    ) -> CheckResult {
        if let (true, Some(action)) = (labeled.pick, *cx) {
            return Err(GrammarError::new(
                "\"@\" cannot be used with an action block",
                labeled.label_location.clone(),
            )
            .with_diagnostic("Action block location", action.code_location.clone()));
        }
        self.visit_expr(&labeled.expression, &mut None)
    }
}
