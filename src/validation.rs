// Content checks shared by the server and the thread client

use crate::error::{AppError, AppResult};

/// Count characters a reader would see once markup is stripped.
///
/// Rich-text editors submit things like `<p><br></p>` for an empty box, so a
/// plain `trim()` is not enough to spot empty comments.
pub fn visible_text_len(content: &str) -> usize {
    let mut in_tag = false;
    let mut visible = String::with_capacity(content.len());
    for c in content.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => visible.push(c),
            _ => {}
        }
    }
    visible
        .replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .chars()
        .filter(|c| !c.is_whitespace())
        .count()
}

pub fn is_visibly_empty(content: &str) -> bool {
    visible_text_len(content) == 0
}

pub fn validate_content(content: &str, max_length: usize) -> AppResult<()> {
    if is_visibly_empty(content) {
        return Err(AppError::Validation(
            "Comment content must not be empty".to_string(),
        ));
    }
    let length = content.chars().count();
    if length > max_length {
        return Err(AppError::Validation(format!(
            "Comment is too long ({} characters, at most {} allowed)",
            length, max_length
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_blank_and_markup_only() {
        assert!(validate_content("", 100).is_err());
        assert!(validate_content("   \n\t", 100).is_err());
        assert!(validate_content("<p><br></p>", 100).is_err());
        assert!(validate_content("<p>&nbsp;</p>", 100).is_err());
    }

    #[test]
    fn test_accepts_text() {
        assert!(validate_content("Hello", 100).is_ok());
        assert!(validate_content("<p><b>Hi</b> back</p>", 100).is_ok());
        assert_eq!(visible_text_len("<p><b>Hi</b> back</p>"), 6);
    }

    #[test]
    fn test_length_limit_counts_characters() {
        assert!(validate_content("ééé", 3).is_ok());
        let err = validate_content("abcd", 3).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_lone_angle_bracket_stays_visible() {
        assert_eq!(visible_text_len("3 > 2"), 3);
    }
}
