use crate::jvm::BinaryName;

/// Knobs of the abstract interpreter
pub struct Settings {
    /// Class of the synthetic value sitting on the stack when an exception-handler path starts
    ///
    /// Handlers begin with exactly one value on the operand stack. The engine does not track
    /// which exception types an instruction can actually raise, so every handler entry gets a
    /// value of this one class.
    pub synthetic_throwable: BinaryName,

    /// Upper bound on interpretation steps per method, across all forked paths
    ///
    /// Heavily obfuscated methods can fork an enormous number of paths; exceeding the budget is
    /// reported as a hard error rather than letting the walk run away.
    pub step_budget: usize,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            synthetic_throwable: BinaryName::EXCEPTION,
            step_budget: 1 << 20,
        }
    }
}
