use serde::Deserialize;

// -- Query strings --

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IndexQuery {
    pub q: Option<String>,
    pub page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
}

// -- Forms --

/// Shared by the signup and login forms.
#[derive(Debug, Default, Deserialize)]
pub struct CredentialsForm {
    pub username: Option<String>,
    pub password: Option<String>,
    pub next: Option<String>,
}

impl CredentialsForm {
    /// Both fields present and non-empty.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        Some((filled(&self.username)?, filled(&self.password)?))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct EntryForm {
    pub title: Option<String>,
    pub content: Option<String>,
    /// Checkbox: present means published, whatever the value.
    pub published: Option<String>,
}

impl EntryForm {
    pub fn title_and_content(&self) -> Option<(&str, &str)> {
        Some((filled(&self.title)?, filled(&self.content)?))
    }

    pub fn is_published(&self) -> bool {
        self.published.is_some()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ReplyForm {
    pub content: Option<String>,
}

impl ReplyForm {
    pub fn content(&self) -> Option<&str> {
        filled(&self.content)
    }
}

fn filled(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_fields_count_as_missing() {
        let form = CredentialsForm {
            username: Some("alice".into()),
            password: Some(String::new()),
            next: None,
        };
        assert_eq!(form.credentials(), None);

        let form = EntryForm {
            title: Some("Hello".into()),
            content: Some("body".into()),
            published: Some("on".into()),
        };
        assert_eq!(form.title_and_content(), Some(("Hello", "body")));
        assert!(form.is_published());
    }
}
