use thiserror::Error;

/// Load-time failure taxonomy. Every variant carries the originating
/// adapter name and the logical path so a failing unit can be located
/// without a full stack trace. Variants are `Clone` so an in-flight load
/// can fan the same outcome out to every waiting caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("resource '{path}' not found ({adapter}): {message}")]
    NotFound {
        adapter: String,
        path: String,
        message: String,
    },
    #[error("dependency cycle at '{path}' ({adapter}): {message}")]
    Cycle {
        adapter: String,
        path: String,
        message: String,
    },
    #[error("execution of '{path}' failed ({adapter}): {message}")]
    Execution {
        adapter: String,
        path: String,
        message: String,
    },
    #[error("contract for '{path}' failed ({adapter}): {message}")]
    Contract {
        adapter: String,
        path: String,
        message: String,
    },
}

impl LoadError {
    pub fn not_found(
        adapter: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        LoadError::NotFound {
            adapter: adapter.into(),
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn cycle(
        adapter: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        LoadError::Cycle {
            adapter: adapter.into(),
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn execution(
        adapter: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        LoadError::Execution {
            adapter: adapter.into(),
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn contract(
        adapter: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        LoadError::Contract {
            adapter: adapter.into(),
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn adapter(&self) -> &str {
        match self {
            LoadError::NotFound { adapter, .. }
            | LoadError::Cycle { adapter, .. }
            | LoadError::Execution { adapter, .. }
            | LoadError::Contract { adapter, .. } => adapter,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            LoadError::NotFound { path, .. }
            | LoadError::Cycle { path, .. }
            | LoadError::Execution { path, .. }
            | LoadError::Contract { path, .. } => path,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            LoadError::NotFound { message, .. }
            | LoadError::Cycle { message, .. }
            | LoadError::Execution { message, .. }
            | LoadError::Contract { message, .. } => message,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, LoadError::NotFound { .. })
    }
}
