use std::collections::HashMap;

/// Values substituted into `{{key}}` placeholders.
pub type TemplateContext = HashMap<&'static str, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailTemplate {
    Welcome,
    EnrollmentConfirmation,
    CourseCompleted,
    AssignmentGraded,
    CourseApproved,
    CourseRejected,
}

impl EmailTemplate {
    fn source(&self) -> (&'static str, &'static str) {
        match self {
            Self::Welcome => (
                "Welcome to Academy, {{name}}",
                "Hi {{name}},\n\nYour account is ready. Browse the catalogue at {{frontend_url}}/courses and start learning.",
            ),
            Self::EnrollmentConfirmation => (
                "You are enrolled in {{course_title}}",
                "Hi {{name}},\n\nYou are now enrolled in \"{{course_title}}\".\nContinue at {{frontend_url}}/courses/{{course_id}}.",
            ),
            Self::CourseCompleted => (
                "Congratulations on completing {{course_title}}",
                "Hi {{name}},\n\nYou completed every lesson of \"{{course_title}}\". Well done!",
            ),
            Self::AssignmentGraded => (
                "Your assignment \"{{assignment_title}}\" was graded",
                "Hi {{name}},\n\nYour submission for \"{{assignment_title}}\" received {{score}}/{{max_score}}.",
            ),
            Self::CourseApproved => (
                "Your course {{course_title}} was approved",
                "Hi {{name}},\n\n\"{{course_title}}\" passed review and is now published.",
            ),
            Self::CourseRejected => (
                "Your course {{course_title}} needs changes",
                "Hi {{name}},\n\n\"{{course_title}}\" was not approved.\nReason: {{reason}}",
            ),
        }
    }

    /// Fills the placeholders. Unknown placeholders are left as they are.
    pub fn render(&self, context: &TemplateContext) -> RenderedEmail {
        let (subject, body) = self.source();
        RenderedEmail {
            subject: substitute(subject, context),
            body: substitute(body, context),
        }
    }
}

fn substitute(source: &str, context: &TemplateContext) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = after[..end].trim();
                match context.get(key) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(&rest[start..start + 2 + end + 2]),
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_subject_and_body() {
        let mut ctx = TemplateContext::new();
        ctx.insert("name", String::from("Ada"));
        ctx.insert("assignment_title", String::from("Essay"));
        ctx.insert("score", String::from("8"));
        ctx.insert("max_score", String::from("10"));

        let mail = EmailTemplate::AssignmentGraded.render(&ctx);
        assert_eq!(mail.subject, "Your assignment \"Essay\" was graded");
        assert!(mail.body.contains("received 8/10"));
        assert!(mail.body.starts_with("Hi Ada,"));
    }

    #[test]
    fn missing_values_keep_placeholder() {
        let mail = EmailTemplate::Welcome.render(&TemplateContext::new());
        assert_eq!(mail.subject, "Welcome to Academy, {{name}}");
    }

    #[test]
    fn unterminated_placeholder_is_copied() {
        let ctx = TemplateContext::new();
        assert_eq!(substitute("a {{b", &ctx), "a {{b");
    }
}
