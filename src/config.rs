// File: src/config.rs
//
// Tunable limits for the compiler and VM: stack/frame capacity, string/bytes
// size limits, and the allocation budget that bounds sandboxed execution.

/// Compile-time tunables.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Maximum number of constants a single compilation unit may emit.
    pub max_constants: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self { max_constants: 1 << 16 }
    }
}

/// Runtime tunables for a single VM instance.
#[derive(Debug, Clone)]
pub struct VmConfig {
    /// Value stack capacity, in slots.
    pub stack_size: usize,
    /// Maximum call-frame depth.
    pub max_frames: usize,
    /// Maximum length of any `String` value, in bytes.
    pub max_string_len: usize,
    /// Maximum length of any `Bytes` value, in bytes.
    pub max_bytes_len: usize,
    /// Total heap-object allocation budget for the run. `None` disables
    /// the check (used by the REPL and by tests that need no ceiling).
    pub max_alloc: Option<u64>,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            stack_size: 2048,
            max_frames: 1024,
            max_string_len: 2 << 20,
            max_bytes_len: 2 << 20,
            max_alloc: None,
        }
    }
}

impl VmConfig {
    pub fn with_alloc_limit(mut self, limit: u64) -> Self {
        self.max_alloc = Some(limit);
        self
    }
}
