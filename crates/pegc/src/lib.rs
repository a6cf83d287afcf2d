pub mod ast;
pub mod backend;
pub mod codegen;
pub mod error;
pub mod location;

pub type RcString = std::rc::Rc<str>;

pub use ast::Grammar;
pub use backend::{compile, Options, Passes};
pub use error::{CompileError, GrammarError, OptionsError};
