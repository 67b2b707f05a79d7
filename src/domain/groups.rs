//! Rules for community groups.

use slug::slugify;

use crate::domain::error::DomainError;

pub const TITLE_MAX_CHARS: usize = 200;
pub const SLUG_MAX_CHARS: usize = 50;
pub const DESCRIPTION_MAX_CHARS: usize = 700;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidGroup {
    pub slug: String,
    pub title: String,
    pub description: String,
}

pub fn validate_group(slug: &str, title: &str, description: &str) -> Result<ValidGroup, DomainError> {
    let slug = slug.trim();
    if slug.is_empty() {
        return Err(DomainError::Blank { field: "slug" });
    }
    if slug.chars().count() > SLUG_MAX_CHARS {
        return Err(DomainError::TooLong {
            field: "slug",
            max: SLUG_MAX_CHARS,
        });
    }
    if !is_slug(slug) {
        return Err(DomainError::NotASlug {
            value: slug.to_string(),
            suggestion: slugify(slug),
        });
    }

    let title = title.trim();
    if title.is_empty() {
        return Err(DomainError::Blank { field: "title" });
    }
    if title.chars().count() > TITLE_MAX_CHARS {
        return Err(DomainError::TooLong {
            field: "title",
            max: TITLE_MAX_CHARS,
        });
    }

    let description = description.trim();
    if description.chars().count() > DESCRIPTION_MAX_CHARS {
        return Err(DomainError::TooLong {
            field: "description",
            max: DESCRIPTION_MAX_CHARS,
        });
    }

    Ok(ValidGroup {
        slug: slug.to_string(),
        title: title.to_string(),
        description: description.to_string(),
    })
}

/// Lowercase ASCII letters, digits, hyphens and underscores.
fn is_slug(value: &str) -> bool {
    value
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_slug() {
        let group = validate_group("rust_lovers", " Rust lovers ", "").expect("valid group");
        assert_eq!(group.title, "Rust lovers");
    }

    #[test]
    fn suggests_slugified_value() {
        let err = validate_group("Rust Lovers", "Rust", "").expect_err("invalid slug");
        assert!(err.to_string().contains("rust-lovers"));
    }

    #[test]
    fn rejects_long_description() {
        let description = "x".repeat(DESCRIPTION_MAX_CHARS + 1);
        let err = validate_group("g", "G", &description).expect_err("too long");
        assert_eq!(err.field(), "description");
    }
}
