use thiserror::Error;

/// A rule broken by input that reached the domain layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("`{field}` must not be empty")]
    Blank { field: &'static str },
    #[error("`{field}` must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },
    #[error("`{value}` is not a slug; try `{suggestion}`")]
    NotASlug { value: String, suggestion: String },
}

impl DomainError {
    pub fn field(&self) -> &'static str {
        match self {
            Self::Blank { field } | Self::TooLong { field, .. } => field,
            Self::NotASlug { .. } => "slug",
        }
    }
}
