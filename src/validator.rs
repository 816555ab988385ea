use super::*;

/// A rule set attached to one form for the lifetime of the page.
#[derive(Debug)]
pub(crate) struct FormBinding {
    form_id: String,
    rules: RuleSet,
    settings: Rc<Settings>,
}

/// Control values of one form, looked up by `name` among its descendants.
struct FormFields<'a> {
    dom: &'a Dom,
    form: NodeId,
}

impl FieldValues for FormFields<'_> {
    fn raw_value(&self, field: &str) -> Option<String> {
        let control = self.dom.find_descendant_by_attr(self.form, "name", field)?;
        self.dom.value(control).ok()
    }
}

/// Validates `#form_id` against `rules` on every submit attempt.
///
/// Returns `false` and registers nothing when the form is not in the
/// document.
pub fn bind_validation(document: &mut Document, form_id: &str, rules: RuleSet) -> bool {
    bind_validation_with(document, form_id, rules, &Settings::default())
}

pub fn bind_validation_with(
    document: &mut Document,
    form_id: &str,
    rules: RuleSet,
    settings: &Settings,
) -> bool {
    bind_validation_shared(document, form_id, rules, &Rc::new(settings.clone()))
}

pub(crate) fn bind_validation_shared(
    document: &mut Document,
    form_id: &str,
    rules: RuleSet,
    settings: &Rc<Settings>,
) -> bool {
    let Some(form) = document.dom.by_id(form_id) else {
        document.trace_line(format!("[bind] validation #{form_id} skipped: form not found"));
        return false;
    };

    document.trace_line(format!(
        "[bind] validation #{form_id} fields={}",
        rules.len()
    ));
    let binding = FormBinding {
        form_id: form_id.to_string(),
        rules,
        settings: Rc::clone(settings),
    };
    document.add_listener(form, "submit", Handler::Validate(Rc::new(binding)));
    true
}

pub(crate) fn handle_submit(
    document: &mut Document,
    binding: &FormBinding,
    event: &mut EventState,
) -> Result<()> {
    let form = event.current_target;
    let evaluation = binding.rules.evaluate(&FormFields {
        dom: &document.dom,
        form,
    });

    apply_field_markers(document, form, &evaluation, &binding.settings.error_class)?;

    let messages = evaluation.messages();
    document.trace_line(format!(
        "[validate] #{} failures={}",
        binding.form_id,
        messages.len()
    ));
    if messages.is_empty() {
        return Ok(());
    }

    event.prevent_default();
    render::render_errors(
        document,
        form,
        &messages,
        &binding.settings.error_container_class,
    )?;
    Ok(())
}

fn apply_field_markers(
    document: &mut Document,
    form: NodeId,
    evaluation: &Evaluation,
    error_class: &str,
) -> Result<()> {
    for result in evaluation.results() {
        let Some(control) = document
            .dom
            .find_descendant_by_attr(form, "name", &result.field)
        else {
            continue;
        };
        match result.outcome {
            FieldOutcome::Failed(_) => document.dom.class_add(control, error_class)?,
            FieldOutcome::Passed => document.dom.class_remove(control, error_class)?,
            FieldOutcome::Missing => {}
        }
    }
    Ok(())
}
