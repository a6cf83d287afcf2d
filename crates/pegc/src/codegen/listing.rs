//! Decoding of generated bytecode back into readable pseudo-code.
//!
//! The walk runs the stack tracker over every instruction, so a listing can only be produced for
//! bytecode which keeps the stack balanced across branches and loop iterations.

use std::fmt::{Display, Write};

use crate::{
    ast::{Grammar, Rule},
    backend::Options,
    error::GrammarError,
    RcString,
};

use super::{opcode::Opcode, stack::Stack};

#[derive(Clone, Debug)]
pub struct Listing {
    pub rule: RcString,
    /// Declaration of every stack slot the rule uses.
    pub defines: String,
    pub statements: Vec<String>,
    /// Slot holding the value of the rule.
    pub result: String,
    pub max_sp: i32,
}

impl Display for Listing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "function parse_{}() {{", self.rule)?;
        if !self.defines.is_empty() {
            writeln!(f, "  {}", self.defines)?;
            writeln!(f)?;
        }
        for statement in &self.statements {
            writeln!(f, "{statement}")?;
        }
        writeln!(f)?;
        writeln!(f, "  return {};", self.result)?;
        write!(f, "}}")
    }
}

/// Decodes the bytecode attached to `rule`.
pub fn list_rule(grammar: &Grammar, rule: &Rule) -> Result<Listing, GrammarError> {
    let Some(bytecode) = &rule.bytecode else {
        return Err(GrammarError::new(
            format!("Rule \"{}\" has no bytecode", rule.name),
            rule.location.clone(),
        ));
    };

    let mut walker = Walker {
        grammar,
        rule,
        bytecode,
        statements: Vec::new(),
        indent: 1,
    };
    let mut stack = Stack::new(rule.name.clone(), rule.location.clone());
    walker.walk(&mut stack, 0, bytecode.len())?;

    if stack.sp() != 0 {
        return Err(walker.error(format_args!(
            "The rule must leave exactly one value on the stack, the stack pointer ends at {}",
            stack.sp()
        )));
    }

    Ok(Listing {
        rule: rule.name.clone(),
        defines: stack.defines(),
        statements: walker.statements,
        result: stack.result()?,
        max_sp: stack.max_sp(),
    })
}

/// Checks that the bytecode of every rule decodes and keeps the stack balanced.
pub fn verify_bytecode(grammar: &mut Grammar, _options: &Options) -> Result<(), GrammarError> {
    for rule in &grammar.rules {
        let listing = list_rule(grammar, rule)?;
        log::trace!("{}: {} stack slots", rule.name, listing.max_sp + 1);
    }
    Ok(())
}

type WalkResult = Result<(), GrammarError>;

struct Walker<'a> {
    grammar: &'a Grammar,
    rule: &'a Rule,
    bytecode: &'a [u32],
    statements: Vec<String>,
    indent: usize,
}

impl<'a> Walker<'a> {
    fn error(&self, message: impl Display) -> GrammarError {
        GrammarError::new(
            format!("Rule \"{}\": {message}", self.rule.name),
            self.rule.location.clone(),
        )
    }

    fn word(&self, ip: usize, end: usize) -> Result<u32, GrammarError> {
        match ip < end {
            true => Ok(self.bytecode[ip]),
            false => Err(self.error(format_args!("Bytecode is truncated at position {ip}"))),
        }
    }

    /// Operands `ip + 1..=ip + count`.
    fn operands(&self, ip: usize, count: usize, end: usize) -> Result<&'a [u32], GrammarError> {
        if ip + count >= end {
            return Err(self.error(format_args!("Bytecode is truncated at position {ip}")));
        }
        Ok(&self.bytecode[ip + 1..=ip + count])
    }

    fn emit(&mut self, statement: impl Display) {
        let mut line = String::new();
        for _ in 0..self.indent {
            line.push_str("  ");
        }
        // writing into a String can't fail
        let _ = write!(line, "{statement}");
        self.statements.push(line);
    }

    fn rule_name(&self, index: u32) -> Result<&'a RcString, GrammarError> {
        match self.grammar.rules.get(index as usize) {
            Some(rule) => Ok(&rule.name),
            None => Err(self.error(format_args!("Reference to a missing rule {index}"))),
        }
    }

    fn walk(&mut self, stack: &mut Stack, start: usize, end: usize) -> WalkResult {
        let mut ip = start;
        while ip < end {
            let word = self.word(ip, end)?;
            let Some(op) = Opcode::from_u32(word) else {
                return Err(self.error(format_args!("Unknown opcode {word} at position {ip}")));
            };
            let fixed = self.operands(ip, op.operand_count(), end)?;

            match op {
                Opcode::PushEmptyString => self.emit(stack.push("\"\"")?),
                Opcode::PushUndefined => self.emit(stack.push("undefined")?),
                Opcode::PushNull => self.emit(stack.push("null")?),
                Opcode::PushFailed => self.emit(stack.push("FAILED")?),
                Opcode::PushEmptyArray => self.emit(stack.push("[]")?),
                Opcode::PushCurrPos => self.emit(stack.push("curr_pos")?),
                Opcode::Pop => drop(stack.pop()?),
                Opcode::PopCurrPos => {
                    let value = stack.pop()?;
                    self.emit(format_args!("curr_pos = {value};"));
                }
                Opcode::PopN => drop(stack.pop_many(fixed[0])?),
                Opcode::Nip => {
                    let value = stack.pop()?;
                    stack.pop()?;
                    self.emit(stack.push(value)?);
                }
                Opcode::Append => {
                    let value = stack.pop()?;
                    self.emit(format_args!("{}.push({value});", stack.top()?));
                }
                Opcode::Wrap => {
                    let values = stack.pop_many(fixed[0])?;
                    self.emit(stack.push(format_args!("[{}]", values.join(", ")))?);
                }
                Opcode::Text => {
                    let value = stack.pop()?;
                    self.emit(stack.push(format_args!("input.substring({value}, curr_pos)"))?);
                }
                Opcode::Pluck => {
                    let (n, k) = (fixed[0], fixed[1] as usize);
                    let offsets = self.operands(ip + 2, k, end)?;
                    let values = offsets
                        .iter()
                        .map(|&offset| stack.index(offset))
                        .collect::<Result<Vec<_>, _>>()?;
                    stack.pop_many(n)?;
                    let value = match values.as_slice() {
                        [single] => single.clone(),
                        _ => format!("[{}]", values.join(", ")),
                    };
                    self.emit(stack.push(value)?);
                    ip += k;
                }

                Opcode::If => {
                    let condition = stack.top()?;
                    ip = self.condition(stack, ip, 0, condition, end)?;
                    continue;
                }
                Opcode::IfError => {
                    let condition = format!("{} === FAILED", stack.top()?);
                    ip = self.condition(stack, ip, 0, condition, end)?;
                    continue;
                }
                Opcode::IfNotError => {
                    let condition = format!("{} !== FAILED", stack.top()?);
                    ip = self.condition(stack, ip, 0, condition, end)?;
                    continue;
                }
                Opcode::WhileNotError => {
                    let condition = format!("{} !== FAILED", stack.top()?);
                    let body_end = ip + 2 + fixed[0] as usize;
                    if body_end > end {
                        return Err(self.error(format_args!(
                            "Loop body at position {ip} overruns its block"
                        )));
                    }
                    self.emit(format_args!("while ({condition}) {{"));
                    self.indent += 1;
                    stack.checked_loop(ip, self, |stack, walker| {
                        walker.walk(stack, ip + 2, body_end)
                    })?;
                    self.indent -= 1;
                    self.emit("}");
                    ip = body_end;
                    continue;
                }

                Opcode::MatchAny => {
                    ip = self.condition(stack, ip, 0, "input.length > curr_pos".to_owned(), end)?;
                    continue;
                }
                Opcode::MatchString => {
                    let condition = format!("input.startsWith(literals[{}], curr_pos)", fixed[0]);
                    ip = self.condition(stack, ip, 1, condition, end)?;
                    continue;
                }
                Opcode::MatchStringIc => {
                    let condition = format!(
                        "input.substr(curr_pos, literals[{0}].length).toLowerCase() === literals[{0}]",
                        fixed[0]
                    );
                    ip = self.condition(stack, ip, 1, condition, end)?;
                    continue;
                }
                Opcode::MatchCharClass => {
                    let condition = format!("classes[{}].test(input.charAt(curr_pos))", fixed[0]);
                    ip = self.condition(stack, ip, 1, condition, end)?;
                    continue;
                }
                Opcode::AcceptN => match fixed[0] {
                    1 => {
                        self.emit(stack.push("input.charAt(curr_pos)")?);
                        self.emit("curr_pos++;");
                    }
                    n => {
                        self.emit(stack.push(format_args!("input.substr(curr_pos, {n})"))?);
                        self.emit(format_args!("curr_pos += {n};"));
                    }
                },
                Opcode::AcceptString => {
                    self.emit(stack.push(format_args!("literals[{}]", fixed[0]))?);
                    self.emit(format_args!("curr_pos += literals[{}].length;", fixed[0]));
                }
                Opcode::Fail => {
                    self.emit(stack.push("FAILED")?);
                    self.emit(format_args!(
                        "if (silent_fails === 0) {{ fail(expectations[{}]); }}",
                        fixed[0]
                    ));
                }

                Opcode::LoadSavedPos => {
                    let value = stack.index(fixed[0])?;
                    self.emit(format_args!("saved_pos = {value};"));
                }
                Opcode::UpdateSavedPos => self.emit("saved_pos = curr_pos;"),
                Opcode::Call => {
                    let (function, n, count) = (fixed[0], fixed[1], fixed[2] as usize);
                    let params = self.operands(ip + 3, count, end)?;
                    let args = params
                        .iter()
                        .map(|&offset| stack.index(offset))
                        .collect::<Result<Vec<_>, _>>()?;
                    stack.pop_many(n)?;
                    let call = format!("functions[{function}]({})", args.join(", "));
                    self.emit(stack.push(call)?);
                    ip += count;
                }
                Opcode::Rule => {
                    let name = self.rule_name(fixed[0])?.clone();
                    self.emit(stack.push(format_args!("parse_{name}()"))?);
                }

                Opcode::SilentFailsOn => self.emit("silent_fails++;"),
                Opcode::SilentFailsOff => self.emit("silent_fails--;"),
            }
            ip += 1 + op.operand_count();
        }
        Ok(())
    }

    /// Emits a conditional whose header has `args` operands before the branch lengths, returns
    /// the position after the else branch.
    fn condition(
        &mut self,
        stack: &mut Stack,
        ip: usize,
        args: usize,
        condition: String,
        end: usize,
    ) -> Result<usize, GrammarError> {
        let header = args + 3;
        let lengths = self.operands(ip, args + 2, end)?;
        let (then_len, else_len) = (lengths[args] as usize, lengths[args + 1] as usize);

        let then_start = ip + header;
        let else_start = then_start + then_len;
        let else_end = else_start + else_len;
        if else_end > end {
            return Err(self.error(format_args!(
                "Branches of the condition at position {ip} overrun their block"
            )));
        }

        self.emit(format_args!("if ({condition}) {{"));
        self.indent += 1;
        stack.checked_if(
            ip,
            self,
            |stack, walker| walker.walk(stack, then_start, else_start),
            |stack, walker| {
                if else_len > 0 {
                    walker.indent -= 1;
                    walker.emit("} else {");
                    walker.indent += 1;
                }
                walker.walk(stack, else_start, else_end)
            },
        )?;
        self.indent -= 1;
        self.emit("}");
        Ok(else_end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::{build::*, ClassPart},
        codegen::generate_bytecode,
    };

    fn hand_written(code: &[Opcode]) -> Vec<u32> {
        code.iter().map(|&op| u32::from(op)).collect()
    }

    fn grammar_with(bytecode: Vec<u32>) -> Grammar {
        let mut grammar = grammar(vec![rule("start", literal("a"))]);
        grammar.rules[0].bytecode = Some(bytecode);
        grammar
    }

    fn listing(bytecode: Vec<u32>) -> Result<Listing, GrammarError> {
        let grammar = grammar_with(bytecode);
        list_rule(&grammar, &grammar.rules[0])
    }

    #[test]
    fn test_list_literal() {
        let listing = listing(vec![18, 0, 2, 2, 22, 0, 23, 0]).unwrap();
        assert_eq!(listing.max_sp, 0);
        assert_eq!(
            listing.to_string(),
            "\
function parse_start() {
  let s0;

  if (input.startsWith(literals[0], curr_pos)) {
    s0 = literals[0];
    curr_pos += literals[0].length;
  } else {
    s0 = FAILED;
    if (silent_fails === 0) { fail(expectations[0]); }
  }

  return s0;
}"
        );
    }

    #[test]
    fn test_list_loop_and_wrap() {
        // "a"* then wrap the array together with the start position
        let mut code = hand_written(&[Opcode::PushCurrPos, Opcode::PushEmptyArray]);
        let literal = vec![18, 0, 2, 2, 22, 0, 23, 0];
        code.extend(&literal);
        code.extend([16, 9, 10]);
        code.extend(&literal);
        code.extend(hand_written(&[Opcode::Pop]));
        code.extend([11, 2]);

        let listing = listing(code).unwrap();
        assert_eq!(listing.max_sp, 2);
        assert_eq!(listing.defines, "let s0, s1, s2;");
        assert!(listing.statements.contains(&"  while (s2 !== FAILED) {".to_owned()));
        assert!(listing.statements.contains(&"    s1.push(s2);".to_owned()));
        assert_eq!(listing.statements.last().unwrap(), "  s0 = [s0, s1];");
    }

    #[test]
    fn test_unbalanced_branches() {
        // the then branch pushes a value, the empty else branch doesn't
        let err = listing(vec![5, 15, 1, 0, 1]).unwrap_err();
        assert_eq!(
            err.message,
            "Rule \"start\": Branches of a condition can't move the stack pointer differently (before: 0, after then: 1, after else: 0). Position: 1"
        );
    }

    #[test]
    fn test_unbalanced_loop() {
        let err = listing(vec![4, 3, 16, 1, 3, 6]).unwrap_err();
        assert!(err.message.contains("Body of a loop can't move the stack pointer"));
    }

    #[test]
    fn test_decode_errors() {
        let err = listing(vec![0]).unwrap_err();
        assert_eq!(err.message, "Rule \"start\": Unknown opcode 0 at position 0");

        let err = listing(vec![18, 0, 2]).unwrap_err();
        assert!(err.message.contains("truncated at position 0"));

        let err = listing(vec![18, 0, 2, 9, 22, 0, 23, 0]).unwrap_err();
        assert!(err.message.contains("overrun"));

        let err = listing(vec![27, 5]).unwrap_err();
        assert!(err.message.contains("missing rule 5"));
    }

    #[test]
    fn test_rule_must_leave_one_value() {
        let err = listing(vec![5, 5]).unwrap_err();
        assert!(err.message.contains("exactly one value"));

        let err = listing(vec![]).unwrap_err();
        assert!(err.message.contains("the stack pointer ends at -1"));

        let err = listing(vec![5, 6, 6]).unwrap_err();
        assert!(err.message.contains("The variable stack underflow"));
    }

    #[test]
    fn test_call_arguments() {
        // a:"a" b:"b" then call functions[0](a, b) over both elements and the position
        let mut code = vec![5];
        code.extend([22, 0, 22, 1]);
        code.extend([24, 2, 26, 0, 3, 2, 1, 0]);
        let listing = listing(code).unwrap();
        assert!(listing.statements.contains(&"  saved_pos = s0;".to_owned()));
        assert_eq!(listing.statements.last().unwrap(), "  s0 = functions[0](s1, s2);");
    }

    #[test]
    fn test_verify_generated() {
        let mut grammar = grammar(vec![
            rule(
                "start",
                action(
                    sequence(vec![
                        labeled("a", rule_ref("word")),
                        zero_or_more(sequence(vec![literal(","), labeled("b", rule_ref("word"))])),
                        simple_not(any()),
                    ]),
                    "return [a, b];",
                ),
            ),
            rule("word", text(one_or_more(class(vec![ClassPart::Range('a', 'z')], false, false)))),
        ]);
        crate::backend::inference::infer_match_results(&mut grammar, &Options::default()).unwrap();
        generate_bytecode(&mut grammar, &Options::default()).unwrap();
        verify_bytecode(&mut grammar, &Options::default()).unwrap();

        let listing = list_rule(&grammar, &grammar.rules[1]).unwrap();
        assert!(listing.to_string().contains("input.substring(s0, curr_pos)"));
    }

    #[test]
    fn test_missing_bytecode() {
        let mut grammar = grammar(vec![rule("start", literal("a"))]);
        let err = verify_bytecode(&mut grammar, &Options::default()).unwrap_err();
        assert_eq!(err.message, "Rule \"start\" has no bytecode");
    }
}
