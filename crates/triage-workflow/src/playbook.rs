//! Playbook template conversion and playbook ids

use indexmap::IndexMap;
use triage_model::{Playbook, PlaybookTemplate, PlaybookTemplateForm, Task};

use crate::error::WorkflowError;
use crate::graph::topological_order;

/// Parse a YAML playbook template
///
/// # Errors
/// `WorkflowError::Template` when the YAML does not describe a playbook
pub fn parse_template(yaml: &str) -> Result<PlaybookTemplate, WorkflowError> {
    Ok(serde_yaml::from_str(yaml)?)
}

/// Attach execution order to a template
///
/// Tasks are stored in execution order; the first one has order 0.
///
/// # Errors
/// `EmptyPlaybook`, `UnknownTask` or `Cycle`
pub fn from_template(template: PlaybookTemplate) -> Result<Playbook, WorkflowError> {
    if template.tasks.is_empty() {
        return Err(WorkflowError::EmptyPlaybook(template.name));
    }

    let order = topological_order(&template)?;
    let PlaybookTemplate { name, mut tasks } = template;

    let mut ordered = IndexMap::with_capacity(order.len());
    for (position, id) in order.into_iter().enumerate() {
        let Some(task) = tasks.swap_remove(&id) else {
            continue;
        };
        ordered.insert(
            id,
            Task {
                name: task.name,
                kind: task.kind,
                automation: task.automation,
                data: task.data,
                order: u32::try_from(position).unwrap_or(u32::MAX),
                next: task.next,
                done: false,
                output: None,
            },
        );
    }

    Ok(Playbook {
        name,
        tasks: ordered,
    })
}

/// Convert a submitted template form into its requested id and playbook
///
/// The id is the form's explicit id, else the kebab-cased playbook name.
///
/// # Errors
/// Template parse and ordering errors
pub fn from_form(form: &PlaybookTemplateForm) -> Result<(String, Playbook), WorkflowError> {
    let playbook = from_template(parse_template(&form.yaml)?)?;
    let id = form
        .id
        .clone()
        .unwrap_or_else(|| playbook_id(&playbook.name));
    Ok((id, playbook))
}

/// Kebab-case id derived from a playbook name
///
/// Word boundaries are non-alphanumeric runs, lower-to-upper transitions and
/// the last capital of an acronym (`HTTPServer` -> `http-server`).
#[must_use]
pub fn playbook_id(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut id = String::with_capacity(name.len());
    let mut boundary = false;

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            boundary = !id.is_empty();
            continue;
        }
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_numeric() || (prev.is_uppercase() && next_is_lower) {
                boundary = !id.is_empty();
            }
        }
        if boundary {
            id.push('-');
            boundary = false;
        }
        id.extend(c.to_lowercase());
    }

    id
}

/// First free id among `id`, `id0`, `id1`, ...
#[must_use]
pub fn disambiguate<V>(existing: &IndexMap<String, V>, id: &str) -> String {
    if !existing.contains_key(id) {
        return id.to_string();
    }
    (0u64..)
        .map(|i| format!("{id}{i}"))
        .find(|candidate| !existing.contains_key(candidate))
        .unwrap_or_else(|| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use triage_model::TaskKind;

    const PHISHING: &str = r#"
name: Phishing Triage
tasks:
  board:
    name: Board involvement?
    type: input
    next: [escalate, mail]
  escalate:
    name: Escalate to CISO
  mail:
    name: Fetch mail
    type: automation
    automation: hash.sha1
    data:
      payload: { header: true }
    next: [escalate]
"#;

    #[test]
    fn kebab_case_ids() {
        assert_eq!(playbook_id("Phishing Triage"), "phishing-triage");
        assert_eq!(playbook_id("MalwareTriage"), "malware-triage");
        assert_eq!(playbook_id("HTTPServer check"), "http-server-check");
        assert_eq!(playbook_id("  simple  "), "simple");
        assert_eq!(playbook_id("v2 Playbook_name"), "v2-playbook-name");
    }

    #[test]
    fn disambiguate_appends_first_free_suffix() {
        let mut existing: IndexMap<String, ()> = IndexMap::new();
        assert_eq!(disambiguate(&existing, "phishing"), "phishing");

        existing.insert("phishing".into(), ());
        assert_eq!(disambiguate(&existing, "phishing"), "phishing0");

        existing.insert("phishing0".into(), ());
        assert_eq!(disambiguate(&existing, "phishing"), "phishing1");
    }

    #[test]
    fn yaml_template_converts_in_execution_order() {
        let (id, playbook) = from_form(&PlaybookTemplateForm::new(PHISHING)).unwrap();

        assert_eq!(id, "phishing-triage");
        assert_eq!(playbook.ordered_task_ids(), vec!["board", "mail", "escalate"]);
        assert_eq!(playbook.root_task().map(|(id, _)| id), Some("board"));

        let mail = playbook.task("mail").unwrap();
        assert_eq!(mail.kind, TaskKind::Automation);
        assert_eq!(mail.order, 1);
        assert_eq!(mail.automation.as_deref(), Some("hash.sha1"));
    }

    #[test]
    fn explicit_form_id_wins() {
        let form = PlaybookTemplateForm {
            id: Some("custom".into()),
            yaml: PHISHING.into(),
        };
        assert_eq!(from_form(&form).unwrap().0, "custom");
    }

    #[test]
    fn invalid_templates() {
        assert!(matches!(parse_template("tasks: 3"), Err(WorkflowError::Template(_))));
        assert!(matches!(
            from_template(PlaybookTemplate::new("empty")),
            Err(WorkflowError::EmptyPlaybook(_))
        ));
    }
}
