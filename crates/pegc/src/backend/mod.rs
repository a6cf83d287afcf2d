pub mod check;
pub mod inference;
pub mod proxy;
pub mod recursion;

use serde::Deserialize;

use crate::{
    ast::Grammar,
    codegen,
    error::{CompileError, GrammarError, OptionsError},
};

/// Keywords of the host language the generated parser is emitted in.
pub const RESERVED_WORDS: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete", "do",
    "else", "export", "extends", "finally", "for", "function", "if", "import", "in", "instanceof",
    "new", "return", "super", "switch", "this", "throw", "try", "typeof", "var", "void", "while",
    "with", "null", "true", "false", "enum", "implements", "interface", "let", "package",
    "private", "protected", "public", "static", "yield", "await",
];

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Options {
    /// Rules which the generated parser can start from, the first rule when unset.
    pub allowed_start_rules: Option<Vec<String>>,
    /// Names that can't be used as labels.
    pub reserved_words: Vec<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            allowed_start_rules: None,
            reserved_words: RESERVED_WORDS.iter().map(|word| word.to_string()).collect(),
        }
    }
}

impl Options {
    pub fn validate(&mut self, grammar: &Grammar) -> Result<(), OptionsError> {
        let Some(first) = grammar.rules.first() else {
            return Err(OptionsError::NoRules);
        };
        let start_rules = self
            .allowed_start_rules
            .get_or_insert_with(|| vec![first.name.to_string()]);
        if start_rules.is_empty() {
            return Err(OptionsError::NoStartRules);
        }
        for name in start_rules.iter() {
            if !grammar.rule_names().any(|rule| **rule == **name) {
                return Err(OptionsError::UnknownStartRule(name.clone()));
            }
        }
        Ok(())
    }
    pub fn start_rules(&self) -> &[String] {
        self.allowed_start_rules.as_deref().unwrap_or_default()
    }
    pub fn is_start_rule(&self, name: &str) -> bool {
        self.start_rules().iter().any(|rule| rule == name)
    }
}

pub type Pass = fn(&mut Grammar, &Options) -> Result<(), GrammarError>;

#[derive(Clone)]
pub struct Stage {
    pub name: &'static str,
    pub passes: Vec<(&'static str, Pass)>,
}

/// The three ordered stages of the pipeline.
#[derive(Clone)]
pub struct Passes {
    pub check: Stage,
    pub transform: Stage,
    pub generate: Stage,
}

impl Default for Passes {
    fn default() -> Self {
        Self {
            check: Stage {
                name: "check",
                passes: vec![
                    ("report_undefined_rules", check::report_undefined_rules),
                    ("report_duplicate_rules", check::report_duplicate_rules),
                    ("report_duplicate_labels", check::report_duplicate_labels),
                    ("report_reserved_labels", check::report_reserved_labels),
                    ("report_infinite_recursion", recursion::report_infinite_recursion),
                    ("report_infinite_repetition", check::report_infinite_repetition),
                    ("report_incorrect_plucking", check::report_incorrect_plucking),
                ],
            },
            transform: Stage {
                name: "transform",
                passes: vec![
                    ("remove_proxy_rules", proxy::remove_proxy_rules),
                    ("infer_match_results", inference::infer_match_results),
                ],
            },
            generate: Stage {
                name: "generate",
                passes: vec![
                    ("generate_bytecode", codegen::generate_bytecode),
                    ("verify_bytecode", codegen::listing::verify_bytecode),
                ],
            },
        }
    }
}

impl Passes {
    pub fn stages(&self) -> [&Stage; 3] {
        [&self.check, &self.transform, &self.generate]
    }
}

/// Validates the options and runs every stage against the grammar, stopping at the first error.
pub fn compile(
    grammar: &mut Grammar,
    passes: &Passes,
    mut options: Options,
) -> Result<(), CompileError> {
    options.validate(grammar)?;
    log::debug!("start rules: {:?}", options.start_rules());

    for stage in passes.stages() {
        for (name, pass) in &stage.passes {
            log::debug!("{}: running {name}", stage.name);
            pass(grammar, &options)?;
        }
    }
    Ok(())
}
