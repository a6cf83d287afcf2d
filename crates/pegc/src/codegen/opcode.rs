macro_rules! opcodes {
    ($($(#[$meta:meta])* $name:ident = $value:literal,)+) => {
        /// Instructions of the parsing stack machine. Operands follow the opcode inline.
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
        #[repr(u32)]
        pub enum Opcode {
            $($(#[$meta])* $name = $value,)+
        }

        impl Opcode {
            pub fn from_u32(value: u32) -> Option<Opcode> {
                match value {
                    $($value => Some(Opcode::$name),)+
                    _ => None,
                }
            }
        }
    };
}

opcodes! {
    // Stack manipulation
    PushEmptyString = 35,
    PushUndefined = 1,
    PushNull = 2,
    PushFailed = 3,
    PushEmptyArray = 4,
    PushCurrPos = 5,
    Pop = 6,
    /// Pops the top into the current position.
    PopCurrPos = 7,
    /// `n`
    PopN = 8,
    /// Removes the value below the top.
    Nip = 9,
    Append = 10,
    /// `n`, pops `n` values and pushes them as an array.
    Wrap = 11,
    /// Replaces the saved position on top by the input consumed since it.
    Text = 12,
    /// `n, k, p1..pk`, pops `n` values and pushes the `k` values at the given offsets.
    Pluck = 36,

    // Conditions and loops
    /// `then_len, else_len`
    If = 13,
    /// `then_len, else_len`
    IfError = 14,
    /// `then_len, else_len`
    IfNotError = 15,
    /// `body_len`
    WhileNotError = 16,

    // Matching
    /// `then_len, else_len`
    MatchAny = 17,
    /// `literal, then_len, else_len`
    MatchString = 18,
    /// `literal, then_len, else_len`
    MatchStringIc = 19,
    /// `class, then_len, else_len`
    MatchCharClass = 20,
    /// `n`
    AcceptN = 21,
    /// `literal`
    AcceptString = 22,
    /// `expectation`
    Fail = 23,

    // Calls
    /// `offset`
    LoadSavedPos = 24,
    UpdateSavedPos = 25,
    /// `function, n, param_count, p1..pN`
    Call = 26,
    /// `rule`
    Rule = 27,

    // Failure reporting
    SilentFailsOn = 28,
    SilentFailsOff = 29,
}

impl From<Opcode> for u32 {
    fn from(value: Opcode) -> Self {
        value as u32
    }
}

impl Opcode {
    /// Number of fixed operands, variable trailing operands of `PLUCK` and `CALL` are not counted.
    pub fn operand_count(self) -> usize {
        match self {
            Opcode::PushEmptyString
            | Opcode::PushUndefined
            | Opcode::PushNull
            | Opcode::PushFailed
            | Opcode::PushEmptyArray
            | Opcode::PushCurrPos
            | Opcode::Pop
            | Opcode::PopCurrPos
            | Opcode::Nip
            | Opcode::Append
            | Opcode::Text
            | Opcode::UpdateSavedPos
            | Opcode::SilentFailsOn
            | Opcode::SilentFailsOff => 0,
            Opcode::PopN
            | Opcode::Wrap
            | Opcode::WhileNotError
            | Opcode::AcceptN
            | Opcode::AcceptString
            | Opcode::Fail
            | Opcode::LoadSavedPos
            | Opcode::Rule => 1,
            Opcode::If
            | Opcode::IfError
            | Opcode::IfNotError
            | Opcode::MatchAny
            | Opcode::Pluck => 2,
            Opcode::MatchString
            | Opcode::MatchStringIc
            | Opcode::MatchCharClass
            | Opcode::Call => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_values() {
        assert_eq!(u32::from(Opcode::PushEmptyString), 35);
        assert_eq!(u32::from(Opcode::Pluck), 36);
        assert_eq!(u32::from(Opcode::SilentFailsOff), 29);
        assert_eq!(Opcode::from_u32(26), Some(Opcode::Call));
        assert_eq!(Opcode::from_u32(0), None);
        assert_eq!(Opcode::from_u32(37), None);
    }

    #[test]
    fn test_decode_all() {
        let decoded = (0..64).filter_map(Opcode::from_u32).count();
        assert_eq!(decoded, 31);
    }
}
