use std::fmt::Write;

use super::{ClassPart, Expr, ExprKind, Grammar, MatchResult, Rule};

/// Writes a quoted, escaped string literal.
pub fn display_str_literal(buf: &mut dyn Write, delimiter: &str, value: &str) -> std::fmt::Result {
    buf.write_str(delimiter)?;
    for ch in value.chars() {
        // Escapes \0, \t, \r, \n, \\, \', \", and uses \u{...} for non-printable characters.
        write!(buf, "{}", ch.escape_debug())?;
    }
    buf.write_str(delimiter)
}

pub fn display_class_parts(
    buf: &mut dyn Write,
    parts: &[ClassPart],
    inverted: bool,
) -> std::fmt::Result {
    buf.write_str("[")?;
    if inverted {
        buf.write_str("^")?;
    }
    for part in parts {
        match *part {
            ClassPart::Char(ch) => write!(buf, "{}", ch.escape_debug())?,
            ClassPart::Range(start, end) => {
                write!(buf, "{}-{}", start.escape_debug(), end.escape_debug())?
            }
        }
    }
    buf.write_str("]")
}

impl ExprKind {
    /// Single line summary of the node without its children.
    pub fn display_into(&self, buf: &mut dyn Write) -> std::fmt::Result {
        write!(buf, "{}", self.name())?;
        match self {
            ExprKind::Named(named) => {
                write!(buf, " ")?;
                display_str_literal(buf, "\"", &named.name)?;
            }
            ExprKind::Action(action) => {
                write!(buf, " {{")?;
                display_str_literal(buf, "", action.code.trim())?;
                write!(buf, "}}")?;
            }
            ExprKind::Labeled(labeled) => {
                if labeled.pick {
                    write!(buf, " @")?;
                }
                if let Some(label) = &labeled.label {
                    write!(buf, " {label}")?;
                }
            }
            ExprKind::SemanticAnd(code) | ExprKind::SemanticNot(code) => {
                write!(buf, " {{")?;
                display_str_literal(buf, "", code.code.trim())?;
                write!(buf, "}}")?;
            }
            ExprKind::RuleRef(rule_ref) => write!(buf, " {}", rule_ref.name)?,
            ExprKind::Literal(literal) => {
                write!(buf, " ")?;
                display_str_literal(buf, "\"", &literal.value)?;
                if literal.ignore_case {
                    write!(buf, "i")?;
                }
            }
            ExprKind::Class(class) => {
                write!(buf, " ")?;
                display_class_parts(buf, &class.parts, class.inverted)?;
                if class.ignore_case {
                    write!(buf, "i")?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

fn display_match(buf: &mut dyn Write, result: MatchResult) -> std::fmt::Result {
    match result {
        MatchResult::Always => write!(buf, " (always)"),
        MatchResult::Sometimes => Ok(()),
        MatchResult::Never => write!(buf, " (never)"),
    }
}

impl Expr {
    pub fn display_into_indent(&self, buf: &mut dyn Write, indent: u32) -> std::fmt::Result {
        for _ in 0..indent {
            write!(buf, "  ")?;
        }
        self.kind.display_into(buf)?;
        display_match(buf, self.match_result)?;
        writeln!(buf)?;
        for child in self.children() {
            child.display_into_indent(buf, indent + 1)?;
        }
        Ok(())
    }
    pub fn display_into(&self, buf: &mut dyn Write) -> std::fmt::Result {
        self.display_into_indent(buf, 0)
    }
}

impl Rule {
    pub fn display_into(&self, buf: &mut dyn Write) -> std::fmt::Result {
        write!(buf, "{}", self.name)?;
        if let Some(result) = self.match_result {
            display_match(buf, result)?;
        }
        writeln!(buf, ":")?;
        self.expression.display_into_indent(buf, 1)
    }
}

impl Grammar {
    pub fn display_into(&self, buf: &mut dyn Write) -> std::fmt::Result {
        for rule in &self.rules {
            rule.display_into(buf)?;
        }
        Ok(())
    }
    pub fn display_string(&self) -> String {
        let mut buf = String::new();
        _ = self.display_into(&mut buf);
        buf
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::build::*;
    use crate::ast::ClassPart;

    #[test]
    fn test_display_grammar() {
        let grammar = grammar(vec![
            rule(
                "start",
                action(
                    sequence(vec![
                        labeled("a", literal("a\n")),
                        pluck(class(
                            vec![ClassPart::Range('0', '9'), ClassPart::Char('_')],
                            true,
                            false,
                        )),
                    ]),
                    " return a; ",
                ),
            ),
            rule("ws", zero_or_more(literal_ic(" "))),
        ]);

        let expected = "\
start:
  action {return a;}
    sequence
      labeled a
        literal \"a\\n\"
      labeled @
        class [^0-9_]
ws:
  zero_or_more
    literal \" \"i
";
        assert_eq!(grammar.display_string(), expected);
    }
}
