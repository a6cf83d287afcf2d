//! Lowering of grammar expressions into stack machine bytecode.
//!
//! Every expression pushes exactly one value: its result or the failure sentinel. The bytecode of
//! branches is elided whenever the match result of the governing expression is statically known.

pub mod constants;
pub mod listing;
pub mod opcode;
pub mod stack;

use indexmap::IndexMap;

use crate::{
    ast::{
        query::index_of_rule,
        visit::Visitor,
        Action, CharClass, Code as CodeBlock, Expr, ExprKind, Grammar, Labeled, Literal,
        MatchResult, Named, Rule, RuleRef,
    },
    backend::Options,
    error::GrammarError,
    RcString,
};

use constants::{ClassConst, Constants, Expectation, FunctionConst, FunctionIndex};
use opcode::Opcode;

pub type Code = Vec<u32>;

type GenResult = Result<Code, GrammarError>;

/// Labels in scope, mapped to the stack slot holding their value.
type Env = IndexMap<RcString, i32>;

macro_rules! code {
    ($($item:expr),* $(,)?) => {
        vec![$(u32::from($item)),*]
    };
}

fn build_sequence<const N: usize>(parts: [Code; N]) -> Code {
    parts.concat()
}

/// `condition then_len else_len then.. else..`, or just one of the branches when the outcome is
/// known statically.
fn build_condition(result: MatchResult, condition: Code, then_code: Code, else_code: Code) -> Code {
    match result {
        MatchResult::Always => then_code,
        MatchResult::Never => else_code,
        MatchResult::Sometimes => {
            let mut code = condition;
            code.push(then_code.len() as u32);
            code.push(else_code.len() as u32);
            code.extend(then_code);
            code.extend(else_code);
            code
        }
    }
}

fn build_loop(condition: Code, body: Code) -> Code {
    let mut code = condition;
    code.push(body.len() as u32);
    code.extend(body);
    code
}

/// Calls `function` with every label of `env` as an argument, replacing `delta` values on top of
/// the stack with the result.
fn build_call(function: FunctionIndex, delta: u32, env: &Env, sp: i32) -> Code {
    let mut code = code![Opcode::Call, function.as_u32(), delta, env.len() as u32];
    code.extend(env.values().map(|&slot| (sp - slot) as u32));
    code
}

/// Generation state threaded through the expressions of a rule.
struct Frame<'ast> {
    /// Topmost occupied stack slot before the expression runs.
    sp: i32,
    env: Env,
    /// Slots of values selected with `@` in the enclosing sequence.
    pluck: Vec<i32>,
    action: Option<&'ast Action>,
}

impl<'ast> Frame<'ast> {
    fn new(sp: i32, env: Env, action: Option<&'ast Action>) -> Frame<'ast> {
        Self {
            sp,
            env,
            pluck: Vec::new(),
            action,
        }
    }
    /// A frame for a nested expression which doesn't leak labels into this one.
    fn nested(&self, sp: i32) -> Frame<'ast> {
        Frame::new(sp, self.env.clone(), None)
    }
}

/// Generates the bytecode of every rule, the shared constant tables are stored on the grammar.
pub fn generate_bytecode(grammar: &mut Grammar, _options: &Options) -> Result<(), GrammarError> {
    let mut generator = Generator {
        grammar,
        constants: Constants::default(),
    };
    let bytecode = grammar
        .rules
        .iter()
        .map(|rule| generator.generate_rule(rule))
        .collect::<Result<Vec<_>, _>>()?;
    let constants = generator.constants;

    log::debug!(
        "generated {} literals, {} classes, {} expectations, {} functions",
        constants.literals.len(),
        constants.classes.len(),
        constants.expectations.len(),
        constants.functions.len()
    );

    for (rule, code) in grammar.rules.iter_mut().zip(bytecode) {
        rule.bytecode = Some(code);
    }
    grammar.constants = Some(constants);
    Ok(())
}

struct Generator<'ast> {
    grammar: &'ast Grammar,
    constants: Constants,
}

impl<'ast> Generator<'ast> {
    fn generate_rule(&mut self, rule: &'ast Rule) -> GenResult {
        let code = self.visit_expr(&rule.expression, &mut Frame::new(-1, Env::new(), None))?;
        log::trace!("{}: {} words of bytecode", rule.name, code.len());
        Ok(code)
    }

    fn add_function(&mut self, predicate: bool, env: &Env, body: &RcString) -> FunctionIndex {
        self.constants.functions.add(FunctionConst {
            predicate,
            params: env.keys().cloned().collect(),
            body: body.clone(),
        })
    }

    fn alternatives(&mut self, alternatives: &'ast [Expr], cx: &Frame<'ast>) -> GenResult {
        let Some((first, rest)) = alternatives.split_first() else {
            return Ok(Vec::new());
        };
        let first_code = self.visit_expr(first, &mut cx.nested(cx.sp))?;
        // later alternatives are unreachable
        if first.match_result == MatchResult::Always {
            return Ok(first_code);
        }
        // even a failing alternative may run actions or predicates, so it is still generated
        let rest_code = match rest.is_empty() {
            true => Vec::new(),
            false => build_condition(
                MatchResult::Sometimes,
                code![Opcode::IfError],
                build_sequence([code![Opcode::Pop], self.alternatives(rest, cx)?]),
                Vec::new(),
            ),
        };
        Ok(build_sequence([first_code, rest_code]))
    }

    /// Generates the elements of a sequence whose first `total - elements.len()` elements have
    /// already been pushed.
    fn elements(
        &mut self,
        total: usize,
        elements: &'ast [Expr],
        frame: &mut Frame<'ast>,
    ) -> GenResult {
        let Some((element, rest)) = elements.split_first() else {
            return self.sequence_end(total, frame);
        };
        let processed = total - elements.len() + 1;

        let action = frame.action.take();
        let element_code = self.visit_expr(element, frame)?;
        frame.action = action;

        frame.sp += 1;
        let rest_code = self.elements(total, rest, frame)?;
        frame.sp -= 1;

        let unwind = match processed {
            1 => code![Opcode::Pop],
            n => code![Opcode::PopN, n as u32],
        };
        Ok(build_sequence([
            element_code,
            build_condition(
                element.match_result,
                code![Opcode::IfNotError],
                rest_code,
                build_sequence([unwind, code![Opcode::PopCurrPos, Opcode::PushFailed]]),
            ),
        ]))
    }

    fn sequence_end(&mut self, total: usize, frame: &Frame<'ast>) -> GenResult {
        let total = total as u32;
        if !frame.pluck.is_empty() {
            let mut code = code![Opcode::Pluck, total + 1, frame.pluck.len() as u32];
            code.extend(frame.pluck.iter().map(|&slot| (frame.sp - slot) as u32));
            return Ok(code);
        }
        if let Some(action) = frame.action {
            let function = self.add_function(false, &frame.env, &action.code);
            return Ok(build_sequence([
                code![Opcode::LoadSavedPos, total],
                build_call(function, total + 1, &frame.env, frame.sp),
            ]));
        }
        Ok(code![Opcode::Wrap, total, Opcode::Nip])
    }

    fn simple_predicate(
        &mut self,
        expression: &'ast Expr,
        negative: bool,
        cx: &Frame<'ast>,
    ) -> GenResult {
        let body = self.visit_expr(expression, &mut cx.nested(cx.sp + 1))?;
        let (result, condition) = match negative {
            true => (expression.match_result.invert(), Opcode::IfError),
            false => (expression.match_result, Opcode::IfNotError),
        };
        let (then_pop, else_pop) = match negative {
            true => (Opcode::Pop, Opcode::PopCurrPos),
            false => (Opcode::PopCurrPos, Opcode::Pop),
        };
        Ok(build_sequence([
            code![Opcode::PushCurrPos, Opcode::SilentFailsOn],
            body,
            code![Opcode::SilentFailsOff],
            build_condition(
                result,
                code![condition],
                code![Opcode::Pop, then_pop, Opcode::PushUndefined],
                code![Opcode::Pop, else_pop, Opcode::PushFailed],
            ),
        ]))
    }

    fn semantic_predicate(
        &mut self,
        expr: &'ast Expr,
        code: &'ast CodeBlock,
        negative: bool,
        cx: &Frame<'ast>,
    ) -> GenResult {
        let function = self.add_function(true, &cx.env, &code.code);
        let (then_push, else_push) = match negative {
            true => (Opcode::PushFailed, Opcode::PushUndefined),
            false => (Opcode::PushUndefined, Opcode::PushFailed),
        };
        Ok(build_sequence([
            code![Opcode::UpdateSavedPos],
            build_call(function, 0, &cx.env, cx.sp),
            build_condition(
                expr.match_result,
                code![Opcode::If],
                code![Opcode::Pop, then_push],
                code![Opcode::Pop, else_push],
            ),
        ]))
    }

    fn append_loop(body: Code) -> Code {
        build_loop(code![Opcode::WhileNotError], build_sequence([code![Opcode::Append], body]))
    }
}

impl<'ast> Visitor<'ast> for Generator<'ast> {
    type Context = Frame<'ast>;
    type Result = GenResult;

    fn visit_named(
        &mut self,
        expr: &'ast Expr,
        named: &'ast Named,
        cx: &mut Frame<'ast>,
    ) -> GenResult {
        let expected = (expr.match_result == MatchResult::Sometimes).then(|| {
            self.constants.expectations.add(Expectation::Rule {
                value: named.name.clone(),
            })
        });
        let body = self.visit_expr(&named.expression, cx)?;
        // FAIL pushes the sentinel again, the body's own is popped first
        let report = match expected {
            Some(expected) => build_condition(
                MatchResult::Sometimes,
                code![Opcode::IfError],
                code![Opcode::Pop, Opcode::Fail, expected.as_u32()],
                Vec::new(),
            ),
            None => Vec::new(),
        };
        Ok(build_sequence([
            code![Opcode::SilentFailsOn],
            body,
            code![Opcode::SilentFailsOff],
            report,
        ]))
    }
    fn visit_choice(
        &mut self,
        _expr: &'ast Expr,
        alternatives: &'ast [Expr],
        cx: &mut Frame<'ast>,
    ) -> GenResult {
        self.alternatives(alternatives, cx)
    }
    fn visit_action(
        &mut self,
        _expr: &'ast Expr,
        action: &'ast Action,
        cx: &mut Frame<'ast>,
    ) -> GenResult {
        // a non-empty sequence calls the action itself once all elements are on the stack
        let emit_call = !matches!(
            &action.expression.kind,
            ExprKind::Sequence { elements } if !elements.is_empty()
        );

        let mut frame = match emit_call {
            true => Frame::new(cx.sp + 1, cx.env.clone(), None),
            false => Frame::new(cx.sp, cx.env.clone(), Some(action)),
        };
        let body = self.visit_expr(&action.expression, &mut frame)?;
        if !emit_call {
            return Ok(body);
        }

        let result = action.expression.match_result;
        let call = match result {
            MatchResult::Never => Vec::new(),
            _ => {
                let function = self.add_function(false, &frame.env, &action.code);
                build_sequence([
                    code![Opcode::LoadSavedPos, 1u32],
                    build_call(function, 1, &frame.env, cx.sp + 2),
                ])
            }
        };
        Ok(build_sequence([
            code![Opcode::PushCurrPos],
            body,
            build_condition(result, code![Opcode::IfNotError], call, Vec::new()),
            code![Opcode::Nip],
        ]))
    }
    fn visit_sequence(
        &mut self,
        _expr: &'ast Expr,
        elements: &'ast [Expr],
        cx: &mut Frame<'ast>,
    ) -> GenResult {
        // labels of the elements stay visible to the enclosing expression
        let mut frame = Frame::new(cx.sp + 1, std::mem::take(&mut cx.env), cx.action);
        let elements_code = self.elements(elements.len(), elements, &mut frame);
        cx.env = frame.env;
        Ok(build_sequence([code![Opcode::PushCurrPos], elements_code?]))
    }
    fn visit_labeled(
        &mut self,
        _expr: &'ast Expr,
        labeled: &'ast Labeled,
        cx: &mut Frame<'ast>,
    ) -> GenResult {
        let mut frame = cx.nested(cx.sp);
        if let Some(label) = &labeled.label {
            cx.env.insert(label.clone(), cx.sp + 1);
        }
        if labeled.pick {
            cx.pluck.push(cx.sp + 1);
        }
        self.visit_expr(&labeled.expression, &mut frame)
    }
    fn visit_text(
        &mut self,
        expr: &'ast Expr,
        expression: &'ast Expr,
        cx: &mut Frame<'ast>,
    ) -> GenResult {
        let body = self.visit_expr(expression, &mut cx.nested(cx.sp + 1))?;
        Ok(build_sequence([
            code![Opcode::PushCurrPos],
            body,
            build_condition(
                expr.match_result,
                code![Opcode::IfNotError],
                code![Opcode::Pop, Opcode::Text],
                code![Opcode::Nip],
            ),
        ]))
    }
    fn visit_simple_and(
        &mut self,
        _expr: &'ast Expr,
        expression: &'ast Expr,
        cx: &mut Frame<'ast>,
    ) -> GenResult {
        self.simple_predicate(expression, false, cx)
    }
    fn visit_simple_not(
        &mut self,
        _expr: &'ast Expr,
        expression: &'ast Expr,
        cx: &mut Frame<'ast>,
    ) -> GenResult {
        self.simple_predicate(expression, true, cx)
    }
    fn visit_optional(
        &mut self,
        _expr: &'ast Expr,
        expression: &'ast Expr,
        cx: &mut Frame<'ast>,
    ) -> GenResult {
        let body = self.visit_expr(expression, &mut cx.nested(cx.sp))?;
        Ok(build_sequence([
            body,
            build_condition(
                expression.match_result.invert(),
                code![Opcode::IfError],
                code![Opcode::Pop, Opcode::PushNull],
                Vec::new(),
            ),
        ]))
    }
    fn visit_zero_or_more(
        &mut self,
        _expr: &'ast Expr,
        expression: &'ast Expr,
        cx: &mut Frame<'ast>,
    ) -> GenResult {
        let body = self.visit_expr(expression, &mut cx.nested(cx.sp + 1))?;
        Ok(build_sequence([
            code![Opcode::PushEmptyArray],
            body.clone(),
            Self::append_loop(body),
            code![Opcode::Pop],
        ]))
    }
    fn visit_one_or_more(
        &mut self,
        _expr: &'ast Expr,
        expression: &'ast Expr,
        cx: &mut Frame<'ast>,
    ) -> GenResult {
        let body = self.visit_expr(expression, &mut cx.nested(cx.sp + 1))?;
        Ok(build_sequence([
            code![Opcode::PushEmptyArray],
            body.clone(),
            build_condition(
                expression.match_result,
                code![Opcode::IfNotError],
                build_sequence([Self::append_loop(body), code![Opcode::Pop]]),
                code![Opcode::Pop, Opcode::Pop, Opcode::PushFailed],
            ),
        ]))
    }
    fn visit_group(
        &mut self,
        _expr: &'ast Expr,
        expression: &'ast Expr,
        cx: &mut Frame<'ast>,
    ) -> GenResult {
        self.visit_expr(expression, &mut cx.nested(cx.sp))
    }
    fn visit_semantic_and(
        &mut self,
        expr: &'ast Expr,
        code: &'ast CodeBlock,
        cx: &mut Frame<'ast>,
    ) -> GenResult {
        self.semantic_predicate(expr, code, false, cx)
    }
    fn visit_semantic_not(
        &mut self,
        expr: &'ast Expr,
        code: &'ast CodeBlock,
        cx: &mut Frame<'ast>,
    ) -> GenResult {
        self.semantic_predicate(expr, code, true, cx)
    }
    fn visit_rule_ref(
        &mut self,
        expr: &'ast Expr,
        rule_ref: &'ast RuleRef,
        _cx: &mut Frame<'ast>,
    ) -> GenResult {
        let Some(index) = index_of_rule(self.grammar, &rule_ref.name) else {
            return Err(GrammarError::new(
                format!("Rule \"{}\" is not defined", rule_ref.name),
                expr.location.clone(),
            ));
        };
        Ok(code![Opcode::Rule, index.as_u32()])
    }
    fn visit_literal(
        &mut self,
        expr: &'ast Expr,
        literal: &'ast Literal,
        _cx: &mut Frame<'ast>,
    ) -> GenResult {
        if literal.value.is_empty() {
            return Ok(code![Opcode::PushEmptyString]);
        }

        let result = expr.match_result;
        let needs_literal = match result {
            MatchResult::Always => !literal.ignore_case,
            MatchResult::Sometimes => true,
            MatchResult::Never => false,
        };
        let literal_index = needs_literal.then(|| {
            let value: RcString = match literal.ignore_case {
                true => literal.value.to_lowercase().into(),
                false => literal.value.clone(),
            };
            self.constants.literals.add(value)
        });
        let expected = (result != MatchResult::Always).then(|| {
            self.constants.expectations.add(Expectation::Literal {
                value: literal.value.clone(),
                ignore_case: literal.ignore_case,
            })
        });

        let (match_op, accept) = match (literal.ignore_case, literal_index) {
            (false, Some(index)) => (
                Opcode::MatchString,
                code![Opcode::AcceptString, index.as_u32()],
            ),
            _ => (
                Opcode::MatchStringIc,
                code![Opcode::AcceptN, literal.value.chars().count() as u32],
            ),
        };
        Ok(build_condition(
            result,
            literal_index
                .map(|index| code![match_op, index.as_u32()])
                .unwrap_or_default(),
            accept,
            expected
                .map(|expected| code![Opcode::Fail, expected.as_u32()])
                .unwrap_or_default(),
        ))
    }
    fn visit_class(
        &mut self,
        expr: &'ast Expr,
        class: &'ast CharClass,
        _cx: &mut Frame<'ast>,
    ) -> GenResult {
        let result = expr.match_result;
        let class_index = (result == MatchResult::Sometimes).then(|| {
            self.constants.classes.add(ClassConst {
                parts: class.parts.clone(),
                inverted: class.inverted,
                ignore_case: class.ignore_case,
            })
        });
        let expected = (result != MatchResult::Always).then(|| {
            self.constants.expectations.add(Expectation::Class {
                value: class.parts.clone(),
                inverted: class.inverted,
                ignore_case: class.ignore_case,
            })
        });
        Ok(build_condition(
            result,
            class_index
                .map(|index| code![Opcode::MatchCharClass, index.as_u32()])
                .unwrap_or_default(),
            code![Opcode::AcceptN, 1u32],
            expected
                .map(|expected| code![Opcode::Fail, expected.as_u32()])
                .unwrap_or_default(),
        ))
    }
    fn visit_any(&mut self, expr: &'ast Expr, _cx: &mut Frame<'ast>) -> GenResult {
        let result = expr.match_result;
        let expected = (result != MatchResult::Always)
            .then(|| self.constants.expectations.add(Expectation::Any));
        Ok(build_condition(
            result,
            code![Opcode::MatchAny],
            code![Opcode::AcceptN, 1u32],
            expected
                .map(|expected| code![Opcode::Fail, expected.as_u32()])
                .unwrap_or_default(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cranelift_entity::EntityRef;

    use crate::{
        ast::{build::*, ClassPart},
        backend::inference::infer_match_results,
        codegen::{constants::ExpectationIndex, listing::verify_bytecode},
    };

    const LITERAL_A: [u32; 8] = [18, 0, 2, 2, 22, 0, 23, 0];
    const LITERAL_B: [u32; 8] = [18, 1, 2, 2, 22, 1, 23, 1];

    fn generate(rules: Vec<Rule>) -> Grammar {
        let mut grammar = grammar(rules);
        let options = Options::default();
        infer_match_results(&mut grammar, &options).unwrap();
        generate_bytecode(&mut grammar, &options).unwrap();
        verify_bytecode(&mut grammar, &options).unwrap();
        grammar
    }

    fn bytecode(body: Expr) -> Vec<u32> {
        generate(vec![rule("start", body)]).rules[0].bytecode.clone().unwrap()
    }

    fn constants(grammar: &Grammar) -> &Constants {
        grammar.constants.as_ref().unwrap()
    }

    fn concat(parts: &[&[u32]]) -> Vec<u32> {
        parts.concat()
    }

    #[test]
    fn test_literals() {
        assert_eq!(bytecode(literal("a")), LITERAL_A);
        assert_eq!(bytecode(literal("")), [35]);

        let grammar = generate(vec![rule("start", literal_ic("Ab"))]);
        assert_eq!(grammar.rules[0].bytecode.as_deref(), Some(&[19, 0, 2, 2, 21, 2, 23, 0][..]));
        let constants = constants(&grammar);
        let literals: Vec<_> = constants.literals.iter().map(|(_, value)| &**value).collect();
        assert_eq!(literals, ["ab"]);
        assert_eq!(
            constants.expectations.iter().map(|(_, value)| value.clone()).collect::<Vec<_>>(),
            [Expectation::Literal {
                value: "Ab".into(),
                ignore_case: true
            }]
        );
    }

    #[test]
    fn test_classes_and_any() {
        let body = class(vec![ClassPart::Range('a', 'z')], true, false);
        let grammar = generate(vec![rule("start", body)]);
        assert_eq!(grammar.rules[0].bytecode.as_deref(), Some(&[20, 0, 2, 2, 21, 1, 23, 0][..]));
        assert_eq!(constants(&grammar).classes.len(), 1);

        // an empty class never matches, only its failure is reported
        let grammar = generate(vec![rule("start", class(vec![], false, false))]);
        assert_eq!(grammar.rules[0].bytecode.as_deref(), Some(&[23, 0][..]));
        assert!(constants(&grammar).classes.is_empty());
        assert_eq!(constants(&grammar).expectations.len(), 1);

        assert_eq!(bytecode(any()), [17, 2, 2, 21, 1, 23, 0]);
    }

    #[test]
    fn test_sequence() {
        let code = bytecode(sequence(vec![literal("a"), literal("b")]));
        assert_eq!(
            code,
            concat(&[
                &[5],
                &LITERAL_A,
                &[15, 18, 3],
                &LITERAL_B,
                &[15, 3, 4, 11, 2, 9, 8, 2, 7, 3],
                &[6, 7, 3],
            ])
        );
        assert_eq!(bytecode(sequence(vec![])), [5, 11, 0, 9]);
    }

    #[test]
    fn test_sequence_action() {
        let grammar = generate(vec![rule(
            "start",
            action(
                sequence(vec![labeled("a", literal("a")), labeled("b", literal("b"))]),
                "return a + b;",
            ),
        )]);
        assert_eq!(
            grammar.rules[0].bytecode.as_deref(),
            Some(
                &concat(&[
                    &[5],
                    &LITERAL_A,
                    &[15, 23, 3],
                    &LITERAL_B,
                    &[15, 8, 4],
                    &[24, 2, 26, 0, 3, 2, 1, 0],
                    &[8, 2, 7, 3],
                    &[6, 7, 3],
                ])[..]
            )
        );

        let functions: Vec<_> = constants(&grammar)
            .functions
            .iter()
            .map(|(_, f)| f.clone())
            .collect();
        assert_eq!(
            functions,
            [FunctionConst {
                predicate: false,
                params: vec!["a".into(), "b".into()],
                body: "return a + b;".into(),
            }]
        );
    }

    #[test]
    fn test_pluck() {
        let code = bytecode(sequence(vec![pluck(literal("a")), literal("b")]));
        assert_eq!(
            code,
            concat(&[
                &[5],
                &LITERAL_A,
                &[15, 19, 3],
                &LITERAL_B,
                &[15, 4, 4, 36, 3, 1, 1, 8, 2, 7, 3],
                &[6, 7, 3],
            ])
        );
    }

    #[test]
    fn test_action_call() {
        assert_eq!(
            bytecode(action(literal("a"), "return 1;")),
            concat(&[&[5], &LITERAL_A, &[15, 6, 0, 24, 1, 26, 0, 1, 0, 9]])
        );
        assert_eq!(
            bytecode(action(labeled("a", literal("a")), "return a;")),
            concat(&[&[5], &LITERAL_A, &[15, 7, 0, 24, 1, 26, 0, 1, 1, 0, 9]])
        );

        // the action of an expression which never matches is never called
        let body = action(class(vec![], false, false), "return 1;");
        let grammar = generate(vec![rule("start", body)]);
        assert_eq!(grammar.rules[0].bytecode.as_deref(), Some(&[5, 23, 0, 9][..]));
        assert!(constants(&grammar).functions.is_empty());

        // an empty sequence behaves like any other expression
        assert_eq!(
            bytecode(action(sequence(vec![]), "return 1;")),
            [5, 5, 11, 0, 9, 24, 1, 26, 0, 1, 0, 9]
        );
    }

    #[test]
    fn test_named() {
        let grammar = generate(vec![rule("start", named("letter a", literal("a")))]);
        assert_eq!(
            grammar.rules[0].bytecode.as_deref(),
            Some(&[28, 18, 0, 2, 2, 22, 0, 23, 1, 29, 14, 3, 0, 6, 23, 0][..])
        );
        assert_eq!(
            constants(&grammar).expectations.get(ExpectationIndex::new(0)),
            Some(&Expectation::Rule {
                value: "letter a".into()
            })
        );

        let grammar = generate(vec![rule("start", named("nothing", literal("")))]);
        assert_eq!(grammar.rules[0].bytecode.as_deref(), Some(&[28, 35, 29][..]));
        assert!(constants(&grammar).expectations.is_empty());
    }

    #[test]
    fn test_choice() {
        assert_eq!(
            bytecode(choice(vec![literal("a"), literal("b")])),
            concat(&[&LITERAL_A, &[14, 9, 0, 6], &LITERAL_B])
        );

        // alternatives after one that always matches are dropped
        let grammar = generate(vec![rule("start", choice(vec![literal(""), literal("a")]))]);
        assert_eq!(grammar.rules[0].bytecode.as_deref(), Some(&[35][..]));
        assert!(constants(&grammar).literals.is_empty());
    }

    #[test]
    fn test_repetition() {
        assert_eq!(bytecode(optional(literal("a"))), concat(&[&LITERAL_A, &[14, 2, 0, 6, 2]]));
        assert_eq!(
            bytecode(zero_or_more(literal("a"))),
            concat(&[&[4], &LITERAL_A, &[16, 9, 10], &LITERAL_A, &[6]])
        );
        assert_eq!(
            bytecode(one_or_more(literal("a"))),
            concat(&[&[4], &LITERAL_A, &[15, 12, 3, 16, 9, 10], &LITERAL_A, &[6, 6, 6, 3]])
        );
        assert_eq!(bytecode(optional(literal(""))), [35]);
    }

    #[test]
    fn test_text_and_group() {
        assert_eq!(
            bytecode(text(literal("a"))),
            concat(&[&[5], &LITERAL_A, &[15, 2, 1, 6, 12, 9]])
        );
        assert_eq!(bytecode(group(literal("a"))), LITERAL_A);
    }

    #[test]
    fn test_simple_predicates() {
        assert_eq!(
            bytecode(simple_and(literal("a"))),
            concat(&[&[5, 28], &LITERAL_A, &[29, 15, 3, 3, 6, 7, 1, 6, 6, 3]])
        );
        assert_eq!(
            bytecode(simple_not(literal("a"))),
            concat(&[&[5, 28], &LITERAL_A, &[29, 14, 3, 3, 6, 6, 1, 6, 7, 3]])
        );
        assert_eq!(bytecode(simple_not(literal(""))), [5, 28, 35, 29, 6, 7, 3]);
    }

    #[test]
    fn test_semantic_predicates() {
        assert_eq!(bytecode(semantic_and("return true;")), [25, 26, 0, 0, 0, 13, 2, 2, 6, 1, 6, 3]);
        assert_eq!(bytecode(semantic_not("return true;")), [25, 26, 0, 0, 0, 13, 2, 2, 6, 3, 6, 1]);

        let grammar = generate(vec![rule(
            "start",
            sequence(vec![labeled("a", literal("a")), semantic_and("return a;")]),
        )]);
        assert_eq!(
            grammar.rules[0].bytecode.as_deref(),
            Some(
                &concat(&[
                    &[5],
                    &LITERAL_A,
                    &[15, 23, 3],
                    &[25, 26, 0, 0, 1, 0, 13, 2, 2, 6, 1, 6, 3],
                    &[15, 3, 4, 11, 2, 9, 8, 2, 7, 3],
                    &[6, 7, 3],
                ])[..]
            )
        );
        let function = constants(&grammar).functions.get(FunctionIndex::new(0)).unwrap();
        assert!(function.predicate);
        assert_eq!(function.params, [RcString::from("a")]);
    }

    #[test]
    fn test_rule_refs() {
        let generated =
            generate(vec![rule("start", rule_ref("other")), rule("other", literal("a"))]);
        assert_eq!(generated.rules[0].bytecode.as_deref(), Some(&[27, 1][..]));
        assert_eq!(generated.rules[1].bytecode.as_deref(), Some(&LITERAL_A[..]));

        let mut grammar = grammar(vec![rule("start", rule_ref("missing"))]);
        let err = generate_bytecode(&mut grammar, &Options::default()).unwrap_err();
        assert_eq!(err.message, "Rule \"missing\" is not defined");
    }

    #[test]
    fn test_constants_shared_between_rules() {
        let grammar = generate(vec![
            rule("start", sequence(vec![literal("a"), rule_ref("other")])),
            rule("other", choice(vec![literal("b"), literal("a")])),
        ]);
        let constants = constants(&grammar);
        assert_eq!(constants.literals.len(), 2);
        assert_eq!(constants.expectations.len(), 2);
        let expected = concat(&[&LITERAL_B, &[14, 9, 0, 6], &LITERAL_A]);
        assert_eq!(grammar.rules[1].bytecode.as_deref(), Some(&expected[..]));
    }

    #[test]
    fn test_labels_scoped() {
        // labels of a choice alternative aren't visible to the action of the enclosing sequence
        let grammar = generate(vec![rule(
            "start",
            action(
                sequence(vec![
                    labeled("a", literal("a")),
                    group(sequence(vec![labeled("inner", literal("b"))])),
                    labeled("b", choice(vec![labeled("c", literal("c")), literal("d")])),
                ]),
                "return [a, b];",
            ),
        )]);
        let function = constants(&grammar).functions.get(FunctionIndex::new(0)).unwrap();
        assert_eq!(function.params, [RcString::from("a"), RcString::from("b")]);
    }
}
