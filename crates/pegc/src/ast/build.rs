//! Constructors for building grammars without a front-end, all locations are left at their default.

use super::*;

pub fn grammar(rules: Vec<Rule>) -> Grammar {
    Grammar {
        top_level_initializer: None,
        initializer: None,
        rules,
        location: Location::default(),
        constants: None,
    }
}

pub fn rule(name: &str, expression: Expr) -> Rule {
    Rule {
        name: name.into(),
        name_location: Location::default(),
        expression,
        location: Location::default(),
        match_result: None,
        bytecode: None,
    }
}

fn expr(kind: ExprKind) -> Expr {
    Expr::new(kind, Location::default())
}

pub fn named(name: &str, expression: Expr) -> Expr {
    expr(ExprKind::Named(Named {
        name: name.into(),
        expression: Box::new(expression),
    }))
}

pub fn choice(alternatives: Vec<Expr>) -> Expr {
    expr(ExprKind::Choice { alternatives })
}

pub fn action(expression: Expr, code: &str) -> Expr {
    expr(ExprKind::Action(Action {
        expression: Box::new(expression),
        code: code.into(),
        code_location: Location::default(),
    }))
}

pub fn sequence(elements: Vec<Expr>) -> Expr {
    expr(ExprKind::Sequence { elements })
}

pub fn labeled(label: &str, expression: Expr) -> Expr {
    expr(ExprKind::Labeled(Labeled {
        label: Some(label.into()),
        label_location: Location::default(),
        pick: false,
        expression: Box::new(expression),
    }))
}

/// `@label:expression`
pub fn picked(label: &str, expression: Expr) -> Expr {
    let mut expr = labeled(label, expression);
    if let ExprKind::Labeled(labeled) = &mut expr.kind {
        labeled.pick = true;
    }
    expr
}

/// `@expression`
pub fn pluck(expression: Expr) -> Expr {
    expr(ExprKind::Labeled(Labeled {
        label: None,
        label_location: Location::default(),
        pick: true,
        expression: Box::new(expression),
    }))
}

pub fn text(expression: Expr) -> Expr {
    expr(ExprKind::Text {
        expression: Box::new(expression),
    })
}

pub fn simple_and(expression: Expr) -> Expr {
    expr(ExprKind::SimpleAnd {
        expression: Box::new(expression),
    })
}

pub fn simple_not(expression: Expr) -> Expr {
    expr(ExprKind::SimpleNot {
        expression: Box::new(expression),
    })
}

pub fn optional(expression: Expr) -> Expr {
    expr(ExprKind::Optional {
        expression: Box::new(expression),
    })
}

pub fn zero_or_more(expression: Expr) -> Expr {
    expr(ExprKind::ZeroOrMore {
        expression: Box::new(expression),
    })
}

pub fn one_or_more(expression: Expr) -> Expr {
    expr(ExprKind::OneOrMore {
        expression: Box::new(expression),
    })
}

pub fn group(expression: Expr) -> Expr {
    expr(ExprKind::Group {
        expression: Box::new(expression),
    })
}

fn code(code: &str) -> Code {
    Code {
        code: code.into(),
        code_location: Location::default(),
    }
}

pub fn semantic_and(predicate: &str) -> Expr {
    expr(ExprKind::SemanticAnd(code(predicate)))
}

pub fn semantic_not(predicate: &str) -> Expr {
    expr(ExprKind::SemanticNot(code(predicate)))
}

pub fn rule_ref(name: &str) -> Expr {
    expr(ExprKind::RuleRef(RuleRef { name: name.into() }))
}

pub fn literal(value: &str) -> Expr {
    expr(ExprKind::Literal(Literal {
        value: value.into(),
        ignore_case: false,
    }))
}

pub fn literal_ic(value: &str) -> Expr {
    expr(ExprKind::Literal(Literal {
        value: value.into(),
        ignore_case: true,
    }))
}

pub fn class(parts: Vec<ClassPart>, inverted: bool, ignore_case: bool) -> Expr {
    expr(ExprKind::Class(CharClass {
        parts,
        inverted,
        ignore_case,
    }))
}

pub fn any() -> Expr {
    expr(ExprKind::Any)
}
