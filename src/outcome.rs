/// Result of one provisioning step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Succeeded(String),
    /// The desired state was already in place.
    AlreadyDone(String),
    Failed {
        message: String,
        guidance: Vec<String>,
    },
}

impl StepOutcome {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            guidance: Vec::new(),
        }
    }

    pub fn with_guidance(self, line: impl Into<String>) -> Self {
        match self {
            Self::Failed {
                message,
                mut guidance,
            } => {
                guidance.push(line.into());
                Self::Failed { message, guidance }
            }
            other => other,
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Succeeded(m) | Self::AlreadyDone(m) => m,
            Self::Failed { message, .. } => message,
        }
    }
}
