//! Inference backend identities

use std::fmt;
use std::str::FromStr;

use crate::AuraError;

/// Compute backend used by the inference scheduler
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum BackendKind {
    /// Reference CPU path
    #[default]
    Reference,
    /// GPU delegate
    Gpu,
    /// Neural accelerator delegate
    Npu,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [BackendKind::Reference, BackendKind::Gpu, BackendKind::Npu];

    /// Stable name used by the control surface and telemetry
    pub fn name(self) -> &'static str {
        match self {
            BackendKind::Reference => "cpu",
            BackendKind::Gpu => "gpu",
            BackendKind::Npu => "npu",
        }
    }

    /// Is this an accelerated delegate?
    pub fn is_accelerated(self) -> bool {
        !matches!(self, BackendKind::Reference)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BackendKind {
    type Err = AuraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" | "reference" => Ok(BackendKind::Reference),
            "gpu" => Ok(BackendKind::Gpu),
            "npu" | "nnapi" => Ok(BackendKind::Npu),
            other => Err(AuraError::UnknownBackend(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_names_roundtrip() {
        for kind in BackendKind::ALL {
            assert_eq!(kind.name().parse::<BackendKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_backend_aliases() {
        assert_eq!("NNAPI".parse::<BackendKind>().unwrap(), BackendKind::Npu);
        assert_eq!(" reference ".parse::<BackendKind>().unwrap(), BackendKind::Reference);
    }

    #[test]
    fn test_unknown_backend() {
        let err = "tpu".parse::<BackendKind>().unwrap_err();
        assert_eq!(err, AuraError::UnknownBackend("tpu".to_string()));
    }
}
