/// First path segments owned by fixed routes. An entry with one of these
/// slugs could never be reached at `/{slug}/`.
pub const RESERVED_SLUGS: [&str; 6] = ["create", "create_user", "drafts", "login", "logout", "profile"];

pub fn is_reserved(slug: &str) -> bool {
    RESERVED_SLUGS.contains(&slug)
}

/// Derive a URL slug from an entry title.
///
/// The title is lowercased, every run of non-word characters becomes a single
/// hyphen, and leading/trailing hyphens are trimmed. Word characters are
/// Unicode letters, digits and `_`. A title with no word characters yields an
/// empty slug; callers must reject that.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for c in title.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() || c == '_' {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_punctuation_runs() {
        assert_eq!(slugify("Hello World!"), "hello-world");
        assert_eq!(slugify("  Rust -- the   good parts?! "), "rust-the-good-parts");
    }

    #[test]
    fn keeps_underscores_and_digits() {
        assert_eq!(slugify("snake_case 101"), "snake_case-101");
    }

    #[test]
    fn unicode_letters_are_word_characters() {
        assert_eq!(slugify("Café Über"), "café-über");
    }

    #[test]
    fn route_names_are_reserved() {
        assert!(is_reserved(&slugify("Drafts")));
        assert!(!is_reserved(&slugify("Create User")));
        assert!(is_reserved(&slugify("create_user")));
        assert!(!is_reserved("drafts-2"));
    }

    #[test]
    fn no_word_characters_gives_empty_slug() {
        assert_eq!(slugify("!!! ???"), "");
        assert_eq!(slugify(""), "");
    }
}
