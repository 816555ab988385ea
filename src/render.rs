use super::*;

/// Shows `errors` in the `.error-messages` container of `#form_id`.
///
/// The container is created as the form's first child on first use and is
/// emptied on every call, so rendering never accumulates lists. An empty
/// `errors` leaves the container in place with no list. Messages are set as
/// text and never interpreted as markup. A missing form is a no-op.
pub fn display_errors<S: AsRef<str>>(
    document: &mut Document,
    form_id: &str,
    errors: &[S],
) -> Result<()> {
    display_errors_with(document, form_id, errors, &Settings::default())
}

pub fn display_errors_with<S: AsRef<str>>(
    document: &mut Document,
    form_id: &str,
    errors: &[S],
    settings: &Settings,
) -> Result<()> {
    let Some(form) = document.dom.by_id(form_id) else {
        return Ok(());
    };
    render_errors(document, form, errors, &settings.error_container_class)?;
    Ok(())
}

pub(crate) fn render_errors<S: AsRef<str>>(
    document: &mut Document,
    form: NodeId,
    errors: &[S],
    container_class: &str,
) -> Result<NodeId> {
    let dom = &mut document.dom;
    let container = match dom.find_descendant_by_class(form, container_class) {
        Some(existing) => existing,
        None => {
            let container = dom.create_detached_element("div");
            dom.set_attr(container, "class", container_class)?;
            let first = dom.first_child(form);
            dom.insert_before(form, container, first)?;
            container
        }
    };

    dom.remove_children(container)?;
    if !errors.is_empty() {
        let list = dom.create_detached_element("ul");
        for error in errors {
            let item = dom.create_detached_element("li");
            dom.set_text_content(item, error.as_ref())?;
            dom.append_child(list, item)?;
        }
        dom.append_child(container, list)?;
    }
    Ok(container)
}
