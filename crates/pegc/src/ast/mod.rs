pub mod build;
pub mod display;
pub mod query;
pub mod visit;

use cranelift_entity::entity_impl;
use serde::{Deserialize, Serialize};

use crate::{codegen::constants::Constants, location::Location, RcString};

/// Position of a rule in [`Grammar::rules`], the operand of the `RULE` instruction.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct RuleIndex(u32);

entity_impl! { RuleIndex }

/// Statically known outcome of matching an expression.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchResult {
    Always,
    #[default]
    Sometimes,
    Never,
}

impl MatchResult {
    pub fn invert(self) -> MatchResult {
        match self {
            MatchResult::Always => MatchResult::Never,
            MatchResult::Sometimes => MatchResult::Sometimes,
            MatchResult::Never => MatchResult::Always,
        }
    }
}

/// A raw block of host-language code, emitted verbatim.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Code {
    pub code: RcString,
    #[serde(default)]
    pub code_location: Location,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grammar {
    #[serde(default)]
    pub top_level_initializer: Option<Code>,
    #[serde(default)]
    pub initializer: Option<Code>,
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub location: Location,
    /// Filled in by bytecode generation.
    #[serde(skip)]
    pub constants: Option<Constants>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub name: RcString,
    #[serde(default)]
    pub name_location: Location,
    pub expression: Expr,
    #[serde(default)]
    pub location: Location,
    /// Converged result of the rule body, memoized by inference.
    #[serde(default, rename = "match", skip_serializing_if = "Option::is_none")]
    pub match_result: Option<MatchResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytecode: Option<Vec<u32>>,
}

impl Rule {
    /// The body is nothing but a reference to another rule.
    pub fn proxy_target(&self) -> Option<&RcString> {
        match &self.expression.kind {
            ExprKind::RuleRef(rule_ref) => Some(&rule_ref.name),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Expr {
    #[serde(flatten)]
    pub kind: ExprKind,
    #[serde(default)]
    pub location: Location,
    #[serde(default, rename = "match")]
    pub match_result: MatchResult,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExprKind {
    Named(Named),
    Choice { alternatives: Vec<Expr> },
    Action(Action),
    Sequence { elements: Vec<Expr> },
    Labeled(Labeled),
    Text { expression: Box<Expr> },
    SimpleAnd { expression: Box<Expr> },
    SimpleNot { expression: Box<Expr> },
    Optional { expression: Box<Expr> },
    ZeroOrMore { expression: Box<Expr> },
    OneOrMore { expression: Box<Expr> },
    Group { expression: Box<Expr> },
    SemanticAnd(Code),
    SemanticNot(Code),
    RuleRef(RuleRef),
    Literal(Literal),
    Class(CharClass),
    Any,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Named {
    pub name: RcString,
    pub expression: Box<Expr>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub expression: Box<Expr>,
    pub code: RcString,
    #[serde(default)]
    pub code_location: Location,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Labeled {
    /// `None` for a bare pluck (`@expr`).
    #[serde(default)]
    pub label: Option<RcString>,
    #[serde(default)]
    pub label_location: Location,
    #[serde(default)]
    pub pick: bool,
    pub expression: Box<Expr>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuleRef {
    pub name: RcString,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Literal {
    pub value: RcString,
    #[serde(default)]
    pub ignore_case: bool,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClassPart {
    Char(char),
    Range(char, char),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharClass {
    pub parts: Vec<ClassPart>,
    #[serde(default)]
    pub inverted: bool,
    #[serde(default)]
    pub ignore_case: bool,
}

impl ExprKind {
    pub fn name(&self) -> &'static str {
        match self {
            ExprKind::Named(_) => "named",
            ExprKind::Choice { .. } => "choice",
            ExprKind::Action(_) => "action",
            ExprKind::Sequence { .. } => "sequence",
            ExprKind::Labeled(_) => "labeled",
            ExprKind::Text { .. } => "text",
            ExprKind::SimpleAnd { .. } => "simple_and",
            ExprKind::SimpleNot { .. } => "simple_not",
            ExprKind::Optional { .. } => "optional",
            ExprKind::ZeroOrMore { .. } => "zero_or_more",
            ExprKind::OneOrMore { .. } => "one_or_more",
            ExprKind::Group { .. } => "group",
            ExprKind::SemanticAnd(_) => "semantic_and",
            ExprKind::SemanticNot(_) => "semantic_not",
            ExprKind::RuleRef(_) => "rule_ref",
            ExprKind::Literal(_) => "literal",
            ExprKind::Class(_) => "class",
            ExprKind::Any => "any",
        }
    }
}

impl Expr {
    pub fn new(kind: ExprKind, location: Location) -> Expr {
        Self {
            kind,
            location,
            match_result: MatchResult::Sometimes,
        }
    }
    /// An empty sequence, used as a placeholder when moving expressions out.
    pub fn empty() -> Expr {
        Self::new(
            ExprKind::Sequence {
                elements: Vec::new(),
            },
            Location::default(),
        )
    }
    pub fn take(&mut self) -> Expr {
        std::mem::replace(self, Expr::empty())
    }
    pub fn children(&self) -> &[Expr] {
        match &self.kind {
            ExprKind::Choice { alternatives } => alternatives,
            ExprKind::Sequence { elements } => elements,
            ExprKind::Named(Named { expression, .. })
            | ExprKind::Action(Action { expression, .. })
            | ExprKind::Labeled(Labeled { expression, .. })
            | ExprKind::Text { expression }
            | ExprKind::SimpleAnd { expression }
            | ExprKind::SimpleNot { expression }
            | ExprKind::Optional { expression }
            | ExprKind::ZeroOrMore { expression }
            | ExprKind::OneOrMore { expression }
            | ExprKind::Group { expression } => std::slice::from_ref(&**expression),
            ExprKind::SemanticAnd(_)
            | ExprKind::SemanticNot(_)
            | ExprKind::RuleRef(_)
            | ExprKind::Literal(_)
            | ExprKind::Class(_)
            | ExprKind::Any => &[],
        }
    }
    /// Pre-order walk over this expression and all of its descendants.
    #[cfg(test)]
    pub(crate) fn for_each(&self, mut fun: impl FnMut(&Expr)) {
        self.for_each_impl(&mut fun);
    }
    #[cfg(test)]
    fn for_each_impl(&self, fun: &mut dyn FnMut(&Expr)) {
        fun(self);
        for child in self.children() {
            child.for_each_impl(fun);
        }
    }
}

impl Grammar {
    pub fn rule_names(&self) -> impl Iterator<Item = &RcString> + '_ {
        self.rules.iter().map(|rule| &rule.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRAMMAR: &str = r#"{
        "type": "grammar",
        "topLevelInitializer": null,
        "initializer": { "type": "initializer", "code": " let n = 0; ", "codeLocation": {"source":null,"start":{"offset":0,"line":1,"column":1},"end":{"offset":1,"line":1,"column":2}} },
        "rules": [
            {
                "type": "rule",
                "name": "start",
                "nameLocation": {"source":null,"start":{"offset":0,"line":1,"column":1},"end":{"offset":5,"line":1,"column":6}},
                "expression": {
                    "type": "action",
                    "code": " return a; ",
                    "expression": {
                        "type": "sequence",
                        "elements": [
                            { "type": "labeled", "label": "a", "pick": false, "expression": { "type": "literal", "value": "x", "ignoreCase": false } },
                            { "type": "labeled", "label": null, "pick": true, "expression": { "type": "class", "parts": [["a", "z"], "_"], "inverted": false, "ignoreCase": true } },
                            { "type": "zero_or_more", "expression": { "type": "rule_ref", "name": "ws" } },
                            { "type": "any" }
                        ]
                    }
                }
            },
            { "type": "rule", "name": "ws", "expression": { "type": "literal", "value": " ", "ignoreCase": false } }
        ]
    }"#;

    #[test]
    fn test_deserialize_grammar() {
        let grammar: Grammar = serde_json::from_str(GRAMMAR).unwrap();
        assert_eq!(grammar.rules.len(), 2);
        assert_eq!(&*grammar.initializer.unwrap().code, " let n = 0; ");

        let start = &grammar.rules[0];
        assert_eq!(start.name_location.end.column, 6);
        let ExprKind::Action(action) = &start.expression.kind else {
            panic!("expected an action");
        };
        let ExprKind::Sequence { elements } = &action.expression.kind else {
            panic!("expected a sequence");
        };
        assert_eq!(elements.len(), 4);
        assert!(matches!(
            &elements[1].kind,
            ExprKind::Labeled(Labeled { label: None, pick: true, .. })
        ));

        let ExprKind::Labeled(labeled) = &elements[1].kind else {
            unreachable!()
        };
        let ExprKind::Class(class) = &labeled.expression.kind else {
            panic!("expected a class");
        };
        assert_eq!(class.parts, [ClassPart::Range('a', 'z'), ClassPart::Char('_')]);
        assert!(class.ignore_case);
        assert!(matches!(elements[3].kind, ExprKind::Any));
        assert_eq!(elements[3].match_result, MatchResult::Sometimes);
    }

    #[test]
    fn test_serialize_match_annotation() {
        let mut expr = Expr::new(ExprKind::Any, Location::default());
        expr.match_result = MatchResult::Never;
        let json = serde_json::to_value(&expr).unwrap();
        assert_eq!(json["type"], "any");
        assert_eq!(json["match"], "never");
    }

    #[test]
    fn test_take_and_walk() {
        let mut grammar: Grammar = serde_json::from_str(GRAMMAR).unwrap();
        let mut kinds = Vec::new();
        grammar.rules[0].expression.for_each(|expr| kinds.push(expr.kind.name()));
        assert_eq!(
            kinds,
            [
                "action",
                "sequence",
                "labeled",
                "literal",
                "labeled",
                "class",
                "zero_or_more",
                "rule_ref",
                "any"
            ]
        );

        let body = grammar.rules[1].expression.take();
        assert!(matches!(body.kind, ExprKind::Literal(_)));
        assert!(grammar.rules[1].expression.children().is_empty());
        assert_eq!(grammar.rules[1].proxy_target(), None);
    }

    #[test]
    fn test_invert() {
        assert_eq!(MatchResult::Always.invert(), MatchResult::Never);
        assert_eq!(MatchResult::Never.invert(), MatchResult::Always);
        assert_eq!(MatchResult::Sometimes.invert(), MatchResult::Sometimes);
    }
}
