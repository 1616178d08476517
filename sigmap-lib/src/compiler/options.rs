/// Opaque identifiers forwarded to the code-emission backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompileTarget {
    pub platform: String,
    pub module_name: String,
    pub function_name: String,
}

impl CompileTarget {
    pub fn new(
        platform: impl Into<String>,
        module_name: impl Into<String>,
        function_name: impl Into<String>,
    ) -> Self {
        Self {
            platform: platform.into(),
            module_name: module_name.into(),
            function_name: function_name.into(),
        }
    }

    pub fn host(module_name: impl Into<String>, function_name: impl Into<String>) -> Self {
        Self::new("host", module_name, function_name)
    }
}

impl Default for CompileTarget {
    fn default() -> Self {
        Self::host("model", "predict")
    }
}

/// Graph-level simplification settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OptimizerOptions {
    /// Drop type casts whose source already has the target element type.
    pub fold_identity_casts: bool,
    /// Extra pass names, forwarded to the emitter untouched.
    pub passes: Vec<String>,
}

impl Default for OptimizerOptions {
    fn default() -> Self {
        Self {
            fold_identity_casts: true,
            passes: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MapCompilerOptions {
    /// Route dense matrix products through an external BLAS. Has no effect
    /// on results.
    pub use_blas: bool,
    pub optimizer: OptimizerOptions,
}

impl MapCompilerOptions {
    pub fn with_blas(mut self, use_blas: bool) -> Self {
        self.use_blas = use_blas;
        self
    }

    pub fn with_optimizer(mut self, optimizer: OptimizerOptions) -> Self {
        self.optimizer = optimizer;
        self
    }
}
