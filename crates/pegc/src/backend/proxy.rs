use crate::{
    ast::{visit::VisitorMut, Grammar, RuleRef},
    error::GrammarError,
    location::Location,
    RcString,
};

use super::Options;

/// Redirects references to rules whose whole body is a reference to another rule, and removes
/// such rules unless they are a start rule.
pub fn remove_proxy_rules(grammar: &mut Grammar, options: &Options) -> Result<(), GrammarError> {
    let mut indices = Vec::new();

    for index in 0..grammar.rules.len() {
        let rule = &grammar.rules[index];
        let Some(target) = rule.proxy_target() else {
            continue;
        };
        let (proxy, target) = (rule.name.clone(), target.clone());

        ReplaceRuleRefs {
            from: &proxy,
            to: &target,
        }
        .visit_grammar(grammar, &mut ());

        if !options.is_start_rule(&proxy) {
            indices.push(index);
        }
    }

    for index in indices.into_iter().rev() {
        let rule = grammar.rules.remove(index);
        log::debug!("removed proxy rule {}", rule.name);
    }
    Ok(())
}

struct ReplaceRuleRefs<'a> {
    from: &'a RcString,
    to: &'a RcString,
}

impl VisitorMut for ReplaceRuleRefs<'_> {
    type Context = ();
    type Result = ();

    fn visit_rule_ref(&mut self, _location: &Location, rule_ref: &mut RuleRef, _cx: &mut ()) {
        if rule_ref.name == *self.from {
            rule_ref.name = self.to.clone();
        }
    }
}
