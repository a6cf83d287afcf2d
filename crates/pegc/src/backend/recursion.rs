use crate::{
    ast::{
        query::{always_consumes_on_success, find_rule},
        visit::Visitor,
        Expr, Grammar, Rule, RuleRef,
    },
    error::GrammarError,
    location::Location,
};

use super::Options;

/// Reports rules which can reach a call of themselves without consuming any input, directly or
/// through other rules. This also covers cases like `start = "a"? start`.
pub fn report_infinite_recursion(
    grammar: &mut Grammar,
    _options: &Options,
) -> Result<(), GrammarError> {
    let grammar = &*grammar;
    LeftRecursion { grammar }.visit_grammar(grammar, &mut Backtrace::default())
}

/// The rules currently being entered, and the references which entered them.
#[derive(Default)]
struct Backtrace<'ast> {
    rules: Vec<&'ast str>,
    refs: Vec<(&'ast str, &'ast Location)>,
}

struct LeftRecursion<'ast> {
    grammar: &'ast Grammar,
}

impl<'ast> Visitor<'ast> for LeftRecursion<'ast> {
    type Context = Backtrace<'ast>;
    type Result = Result<(), GrammarError>;

    fn visit_rule(&mut self, rule: &'ast Rule, cx: &mut Backtrace<'ast>) -> Self::Result {
        cx.rules.push(&rule.name);
        self.visit_expr(&rule.expression, cx)?;
        cx.rules.pop();
        Ok(())
    }
    fn visit_sequence(
        &mut self,
        _expr: &'ast Expr,
        elements: &'ast [Expr],
        cx: &mut Backtrace<'ast>,
    ) -> Self::Result {
        for element in elements {
            self.visit_expr(element, cx)?;
            // anything after consumed input can't recurse on the same position
            if always_consumes_on_success(self.grammar, element) {
                break;
            }
        }
        Ok(())
    }
    fn visit_rule_ref(
        &mut self,
        expr: &'ast Expr,
        rule_ref: &'ast RuleRef,
        cx: &mut Backtrace<'ast>,
    ) -> Self::Result {
        // undefined references are reported elsewhere
        let Some(rule) = find_rule(self.grammar, &rule_ref.name) else {
            return Ok(());
        };

        cx.refs.push((&rule_ref.name, &expr.location));
        if !cx.rules.contains(&&*rule_ref.name) {
            self.visit_rule(rule, cx)?;
            cx.refs.pop();
            return Ok(());
        }

        cx.rules.push(&rule_ref.name);
        let mut err = GrammarError::new(
            format!(
                "Possible infinite loop when parsing (left recursion: {})",
                cx.rules.join(" -> ")
            ),
            rule.name_location.clone(),
        );
        let steps = cx.refs.len();
        for (i, &(name, location)) in cx.refs.iter().enumerate() {
            let message = if i + 1 == steps {
                format!("Step {}: call itself without input consumption - left recursion", i + 1)
            } else {
                format!("Step {}: call of the rule \"{name}\" without input consumption", i + 1)
            };
            err = err.with_diagnostic(message, location.clone());
        }
        Err(err)
    }
}
