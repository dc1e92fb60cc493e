use crate::{
    error::RepoError,
    models::{NewDocument, Subject, Visibility},
};

pub const MIN_TITLE_CHARS: usize = 2;

/// A `NewDocument` that passed every check, with text fields trimmed and the
/// category resolved against the fixed subject set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidDocument {
    pub title: String,
    pub url: String,
    pub description: String,
    pub category: Subject,
    pub visibility: Visibility,
}

/// Title must have at least two characters after trimming. Counted in chars,
/// not bytes, so short Vietnamese titles are measured correctly.
pub fn validate_title(title: &str) -> Result<String, RepoError> {
    let title = title.trim();
    if title.chars().count() < MIN_TITLE_CHARS {
        return Err(RepoError::InvalidInput(
            "Tiêu đề phải có ít nhất 2 ký tự".to_string(),
        ));
    }
    Ok(title.to_string())
}

/// Case-sensitive scheme check. Beyond that only control characters are
/// refused, since the URL ends up in a `Location` header.
pub fn validate_url(url: &str) -> Result<String, RepoError> {
    let url = url.trim();
    let scheme_ok = url.starts_with("http://") || url.starts_with("https://");
    if scheme_ok && !url.chars().any(char::is_control) {
        Ok(url.to_string())
    } else {
        Err(RepoError::InvalidInput("URL không hợp lệ".to_string()))
    }
}

/// Never fails.
pub fn resolve_category(raw: &str) -> Subject {
    Subject::coerce(raw)
}

pub fn validate(fields: &NewDocument) -> Result<ValidDocument, RepoError> {
    let title = validate_title(&fields.title)?;
    let url = validate_url(&fields.url)?;

    Ok(ValidDocument {
        title,
        url,
        description: fields
            .description
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string(),
        category: resolve_category(&fields.category),
        visibility: fields.visibility,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(title: &str, url: &str, category: &str) -> NewDocument {
        NewDocument {
            title: title.to_string(),
            url: url.to_string(),
            description: None,
            category: category.to_string(),
            visibility: Visibility::Public,
        }
    }

    #[test]
    fn title_is_measured_after_trimming() {
        assert!(validate_title("  a  ").is_err());
        assert_eq!(validate_title("  ab ").unwrap(), "ab");
    }

    #[test]
    fn title_counts_characters_not_bytes() {
        // "Lý" is three bytes but two characters.
        assert_eq!(validate_title("Lý").unwrap(), "Lý");
        assert!(validate_title("ý").is_err());
    }

    #[test]
    fn url_scheme_is_case_sensitive() {
        assert!(validate_url("https://x.test").is_ok());
        assert!(validate_url("  http://x.test ").is_ok());
        assert!(validate_url("HTTPS://x.test").is_err());
        assert!(validate_url("ftp://x").is_err());
        assert!(validate_url("").is_err());
    }

    #[test]
    fn url_with_interior_control_characters_is_rejected() {
        assert!(validate_url("https://x.io/a\nb").is_err());
        assert!(validate_url("https://x.io/a\tb").is_err());
        assert!(validate_url("https://x.io/a\u{7f}b").is_err());
        // Surrounding whitespace is trimmed first.
        assert!(validate_url("\thttps://x.io/ab\n").is_ok());
        assert!(validate_url("https://x.io/tài-liệu").is_ok());
    }

    #[test]
    fn unknown_category_falls_back_to_general() {
        let valid = validate(&fields("Bài 1", "https://x.test", "Nhạc")).unwrap();
        assert_eq!(valid.category, Subject::Chung);

        let valid = validate(&fields("Bài 1", "https://x.test", "Tiếng Anh")).unwrap();
        assert_eq!(valid.category, Subject::TiengAnh);
    }

    #[test]
    fn title_is_checked_before_url() {
        let err = validate(&fields("a", "ftp://x", "Toán")).unwrap_err();
        assert!(matches!(err, RepoError::InvalidInput(msg) if msg.contains("Tiêu đề")));
    }
}
