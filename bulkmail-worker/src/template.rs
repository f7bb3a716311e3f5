//! Placeholder substitution for subject and body templates.
//!
//! A placeholder is a field name wrapped in double braces, e.g. `{{FirstName}}`.
//! Names are matched exactly against the contact's fields. A placeholder whose
//! field is absent renders as an empty string so template syntax never leaks
//! into sent mail.

use crate::dispatch::Contact;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Render a template against one contact.
///
/// Text that does not form a well-formed placeholder (an unterminated `{{`, or
/// braces inside the name) is copied through unchanged.
pub fn render(template: &str, contact: &Contact) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN.len()..];

        let Some(end) = after_open.find(CLOSE) else {
            out.push_str(&rest[start..]);
            return out;
        };

        let name = &after_open[..end];
        if is_field_name(name) {
            if let Some(value) = contact.get(name) {
                out.push_str(value);
            }
            rest = &after_open[end + CLOSE.len()..];
        } else {
            // Not a placeholder; emit one brace and rescan from the next char.
            out.push('{');
            rest = &rest[start + 1..];
        }
    }

    out.push_str(rest);
    out
}

/// Field names referenced by a template, in order of appearance.
pub fn placeholders(template: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        let after_open = &rest[start + OPEN.len()..];
        let Some(end) = after_open.find(CLOSE) else {
            break;
        };

        let name = &after_open[..end];
        if is_field_name(name) {
            names.push(name);
            rest = &after_open[end + CLOSE.len()..];
        } else {
            rest = &rest[start + 1..];
        }
    }

    names
}

fn is_field_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['{', '}'])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ann() -> Contact {
        Contact::new()
            .with("Email", "ann@example.com")
            .with("FirstName", "Ann")
            .with("Company", "Initech")
    }

    #[test]
    fn test_render_substitutes_field() {
        assert_eq!(render("Hi {{FirstName}}", &ann()), "Hi Ann");
    }

    #[test]
    fn test_render_missing_field_is_empty() {
        assert_eq!(render("Hi {{FirstName}}", &Contact::new()), "Hi ");
        assert_eq!(render("{{LastName}}!", &ann()), "!");
    }

    #[test]
    fn test_render_is_case_sensitive() {
        assert_eq!(render("Hi {{firstname}}", &ann()), "Hi ");
    }

    #[test]
    fn test_render_multiple_and_repeated() {
        let out = render("{{FirstName}} at {{Company}} ({{FirstName}})", &ann());
        assert_eq!(out, "Ann at Initech (Ann)");
    }

    #[test]
    fn test_render_leaves_malformed_syntax() {
        assert_eq!(render("Hi {{FirstName", &ann()), "Hi {{FirstName");
        assert_eq!(render("a {{}} b", &ann()), "a {{}} b");
        assert_eq!(render("{{{FirstName}}}", &ann()), "{Ann}");
    }

    #[test]
    fn test_render_does_not_rescan_substituted_values() {
        let contact = Contact::new().with("Note", "{{FirstName}}").with("FirstName", "Ann");
        assert_eq!(render("{{Note}}", &contact), "{{FirstName}}");
    }

    #[test]
    fn test_render_is_idempotent_on_same_input() {
        let template = "<p>Dear {{FirstName}},</p>";
        assert_eq!(render(template, &ann()), render(template, &ann()));
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(
            placeholders("{{FirstName}} from {{Company}} {{ bad"),
            vec!["FirstName", "Company"]
        );
    }
}
