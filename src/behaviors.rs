use super::*;

/// Which side of the comment preview toggle is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewMode {
    Editing,
    Previewing,
}

#[derive(Debug)]
pub(crate) struct PreviewBinding {
    input: NodeId,
    preview: NodeId,
    mode: Cell<PreviewMode>,
    settings: Rc<Settings>,
}

#[derive(Debug)]
pub(crate) struct CategoryGroup {
    checkboxes: Vec<NodeId>,
    error: Option<NodeId>,
}

impl CategoryGroup {
    fn any_checked(&self, dom: &Dom) -> bool {
        self.checkboxes
            .iter()
            .any(|checkbox| dom.checked(*checkbox).unwrap_or(false))
    }
}

/// Navigates to the category listing whenever `#category-filter` changes.
pub fn bind_category_filter(document: &mut Document, settings: &Settings) -> bool {
    bind_category_filter_shared(document, &Rc::new(settings.clone()))
}

pub(crate) fn bind_category_filter_shared(document: &mut Document, settings: &Rc<Settings>) -> bool {
    let Some(filter) = document.dom.by_id(&settings.category_filter_id) else {
        document.trace_line(format!(
            "[bind] category filter skipped: #{} not found",
            settings.category_filter_id
        ));
        return false;
    };
    document.add_listener(filter, "change", Handler::CategoryFilter(Rc::clone(settings)));
    document.trace_line("[bind] category filter".into());
    true
}

pub(crate) fn on_category_filter_change(
    document: &mut Document,
    settings: &Settings,
    event: &EventState,
) -> Result<()> {
    let category = document.dom.value(event.current_target)?;
    let url = settings.category_url(&category);
    document.navigate(&url);
    Ok(())
}

/// Makes every comment link scroll smoothly to its in-page target and focus
/// the comment input. Returns the number of links bound.
pub fn bind_comment_links(document: &mut Document, settings: &Settings) -> Result<usize> {
    bind_comment_links_shared(document, &Rc::new(settings.clone()))
}

pub(crate) fn bind_comment_links_shared(
    document: &mut Document,
    settings: &Rc<Settings>,
) -> Result<usize> {
    let links = document
        .dom
        .query_selector_all(&settings.comment_link_selector)?;
    for link in &links {
        document.add_listener(*link, "click", Handler::CommentLink(Rc::clone(settings)));
    }
    document.trace_line(format!("[bind] comment links={}", links.len()));
    Ok(links.len())
}

pub(crate) fn on_comment_link_click(
    document: &mut Document,
    settings: &Settings,
    event: &mut EventState,
) -> Result<()> {
    event.prevent_default();

    let Some(href) = document.dom.attr(event.current_target, "href") else {
        return Ok(());
    };
    let section = match document.dom.query_selector(&href) {
        Ok(section) => section,
        Err(err) => {
            document.trace_line(format!("[scroll] ignored href {href:?}: {err}"));
            return Ok(());
        }
    };
    let Some(section) = section else {
        return Ok(());
    };

    document.scroll_into_view(section, ScrollBehavior::Smooth);
    if let Some(input) = document.dom.by_id(&settings.comment_input_id) {
        document.focus_node(input)?;
    }
    Ok(())
}

/// Binds the preview toggle when the comment input, the preview element and
/// the toggle control are all present.
pub fn bind_preview_toggle(document: &mut Document, settings: &Settings) -> bool {
    bind_preview_toggle_shared(document, &Rc::new(settings.clone()))
}

pub(crate) fn bind_preview_toggle_shared(document: &mut Document, settings: &Rc<Settings>) -> bool {
    let dom = &document.dom;
    let (Some(input), Some(preview), Some(toggle)) = (
        dom.by_id(&settings.comment_input_id),
        dom.by_id(&settings.comment_preview_id),
        dom.by_id(&settings.preview_toggle_id),
    ) else {
        document.trace_line("[bind] preview toggle skipped: missing elements".into());
        return false;
    };

    let shown = dom
        .style_get(preview, "display")
        .map(|display| display == "block")
        .unwrap_or(false);
    let initial = if shown {
        PreviewMode::Previewing
    } else {
        PreviewMode::Editing
    };
    let binding = PreviewBinding {
        input,
        preview,
        mode: Cell::new(initial),
        settings: Rc::clone(settings),
    };
    document.add_listener(toggle, "click", Handler::PreviewToggle(Rc::new(binding)));
    document.trace_line(format!("[bind] preview toggle mode={initial:?}"));
    true
}

pub(crate) fn on_preview_toggle_click(
    document: &mut Document,
    binding: &PreviewBinding,
    event: &mut EventState,
) -> Result<()> {
    event.prevent_default();
    let toggle = event.current_target;
    let settings = &binding.settings;
    let dom = &mut document.dom;

    let next = match binding.mode.get() {
        PreviewMode::Previewing => {
            dom.style_set(binding.preview, "display", "none")?;
            dom.style_set(binding.input, "display", "block")?;
            dom.set_text_content(toggle, &settings.preview_label)?;
            PreviewMode::Editing
        }
        PreviewMode::Editing => {
            let raw = dom.value(binding.input)?;
            match settings.preview_rendering {
                PreviewRendering::PlainText => dom.set_text_content(binding.preview, &raw)?,
                PreviewRendering::Markup => dom.set_inner_html(binding.preview, &raw)?,
            }
            dom.style_set(binding.preview, "display", "block")?;
            dom.style_set(binding.input, "display", "none")?;
            dom.set_text_content(toggle, &settings.edit_label)?;
            PreviewMode::Previewing
        }
    };
    binding.mode.set(next);
    Ok(())
}

/// Requires at least one `.category-checkbox` to be checked: every change
/// updates `#category-error`, and submitting `#post-form` with none checked
/// is blocked.
pub fn bind_category_requirement(document: &mut Document, settings: &Settings) -> Result<bool> {
    bind_category_requirement_shared(document, &Rc::new(settings.clone()))
}

pub(crate) fn bind_category_requirement_shared(
    document: &mut Document,
    settings: &Rc<Settings>,
) -> Result<bool> {
    let checkboxes = document
        .dom
        .query_selector_all(&settings.category_checkbox_selector)?;
    if checkboxes.is_empty() {
        document.trace_line("[bind] category requirement skipped: no checkboxes".into());
        return Ok(false);
    }

    let group = Rc::new(CategoryGroup {
        checkboxes,
        error: document.dom.by_id(&settings.category_error_id),
    });
    for checkbox in &group.checkboxes {
        document.add_listener(*checkbox, "change", Handler::CategoryChange(Rc::clone(&group)));
    }
    if let Some(form) = document.dom.by_id(&settings.post_form_id) {
        document.add_listener(form, "submit", Handler::CategorySubmit(Rc::clone(&group)));
    }
    document.trace_line(format!(
        "[bind] category requirement checkboxes={}",
        group.checkboxes.len()
    ));
    Ok(true)
}

pub(crate) fn on_category_change(document: &mut Document, group: &CategoryGroup) -> Result<()> {
    let display = if group.any_checked(&document.dom) {
        "none"
    } else {
        "block"
    };
    if let Some(error) = group.error {
        document.dom.style_set(error, "display", display)?;
    }
    Ok(())
}

pub(crate) fn on_category_submit(
    document: &mut Document,
    group: &CategoryGroup,
    event: &mut EventState,
) -> Result<()> {
    if group.any_checked(&document.dom) {
        return Ok(());
    }
    event.prevent_default();
    if let Some(error) = group.error {
        document.dom.style_set(error, "display", "block")?;
    }
    document.trace_line("[validate] categories: none checked".into());
    Ok(())
}
