use std::fmt::Display;

use crate::{error::GrammarError, location::Location, RcString};

/// Names the virtual stack slots of a single rule and checks that control flow keeps the stack
/// pointer balanced.
#[derive(Clone, Debug)]
pub struct Stack {
    /// Index of the topmost occupied slot, `-1` when empty.
    sp: i32,
    max_sp: i32,
    var_name: &'static str,
    rule_name: RcString,
    location: Location,
}

type StackResult<T> = Result<T, GrammarError>;

impl Stack {
    pub fn new(rule_name: RcString, location: Location) -> Stack {
        Self {
            sp: -1,
            max_sp: -1,
            var_name: "s",
            rule_name,
            location,
        }
    }

    pub fn sp(&self) -> i32 {
        self.sp
    }
    pub fn max_sp(&self) -> i32 {
        self.max_sp
    }

    fn error(&self, message: impl Display) -> GrammarError {
        GrammarError::new(
            format!("Rule \"{}\": {message}", self.rule_name),
            self.location.clone(),
        )
    }

    pub fn name(&self, i: i32) -> StackResult<String> {
        if i < 0 {
            return Err(self.error(format_args!(
                "The variable stack underflow: attempt to use a variable at index {i}"
            )));
        }
        Ok(format!("{}{i}", self.var_name))
    }

    /// Assigns `expr` to a new slot on top of the stack.
    pub fn push(&mut self, expr: impl Display) -> StackResult<String> {
        self.sp += 1;
        self.max_sp = self.max_sp.max(self.sp);
        Ok(format!("{} = {expr};", self.name(self.sp)?))
    }

    pub fn pop(&mut self) -> StackResult<String> {
        let name = self.name(self.sp)?;
        self.sp -= 1;
        Ok(name)
    }

    /// Names of the `n` topmost slots, from the deepest one.
    pub fn pop_many(&mut self, n: u32) -> StackResult<Vec<String>> {
        let n = n as i32;
        let names = (self.sp - n + 1..=self.sp)
            .map(|i| self.name(i))
            .collect::<StackResult<Vec<_>>>()?;
        self.sp -= n;
        Ok(names)
    }

    pub fn top(&self) -> StackResult<String> {
        self.name(self.sp)
    }

    /// Name of the slot `i` places below the top.
    pub fn index(&self, i: u32) -> StackResult<String> {
        self.name(self.sp - i as i32)
    }

    /// The bottom slot, which holds the value of the rule.
    pub fn result(&self) -> StackResult<String> {
        if self.max_sp < 0 {
            return Err(self.error("The variable stack is empty, can't get the result"));
        }
        self.name(0)
    }

    /// A declaration of every slot that was ever used.
    pub fn defines(&self) -> String {
        if self.max_sp < 0 {
            return String::new();
        }
        let names: Vec<_> = (0..=self.max_sp).map(|i| format!("{}{i}", self.var_name)).collect();
        format!("let {};", names.join(", "))
    }

    /// Runs both branches of a condition from the same stack pointer, they must leave it at the
    /// same position.
    pub fn checked_if<C>(
        &mut self,
        pos: usize,
        cx: &mut C,
        generate_if: impl FnOnce(&mut Stack, &mut C) -> StackResult<()>,
        generate_else: impl FnOnce(&mut Stack, &mut C) -> StackResult<()>,
    ) -> StackResult<()> {
        let base_sp = self.sp;

        generate_if(self, cx)?;
        let then_sp = self.sp;
        self.sp = base_sp;

        generate_else(self, cx)?;
        if then_sp != self.sp {
            return Err(self.error(format_args!(
                "Branches of a condition can't move the stack pointer differently (before: {base_sp}, after then: {then_sp}, after else: {}). Position: {pos}",
                self.sp
            )));
        }
        Ok(())
    }

    /// The body of a loop must leave the stack pointer where it found it.
    pub fn checked_loop<C>(
        &mut self,
        pos: usize,
        cx: &mut C,
        generate_body: impl FnOnce(&mut Stack, &mut C) -> StackResult<()>,
    ) -> StackResult<()> {
        let base_sp = self.sp;
        generate_body(self, cx)?;
        if self.sp != base_sp {
            return Err(self.error(format_args!(
                "Body of a loop can't move the stack pointer (before: {base_sp}, after: {}). Position: {pos}",
                self.sp
            )));
        }
        Ok(())
    }
}
