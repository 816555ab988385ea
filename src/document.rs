use super::*;

use crate::behaviors::{CategoryGroup, PreviewBinding};
use crate::validator::FormBinding;

/// Work attached to an element for one event type.
#[derive(Debug, Clone)]
pub(crate) enum Handler {
    Validate(Rc<FormBinding>),
    CategoryFilter(Rc<Settings>),
    CommentLink(Rc<Settings>),
    PreviewToggle(Rc<PreviewBinding>),
    CategoryChange(Rc<CategoryGroup>),
    CategorySubmit(Rc<CategoryGroup>),
}

#[derive(Debug, Default, Clone)]
struct ListenerStore {
    map: HashMap<NodeId, HashMap<String, Vec<Handler>>>,
}

impl ListenerStore {
    fn add(&mut self, node_id: NodeId, event: &str, handler: Handler) {
        self.map
            .entry(node_id)
            .or_default()
            .entry(event.to_string())
            .or_default()
            .push(handler);
    }

    fn get(&self, node_id: NodeId, event: &str) -> Vec<Handler> {
        self.map
            .get(&node_id)
            .and_then(|events| events.get(event))
            .cloned()
            .unwrap_or_default()
    }

    fn len(&self) -> usize {
        self.map
            .values()
            .flat_map(|events| events.values())
            .map(Vec::len)
            .sum()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct EventState {
    pub(crate) event_type: String,
    pub(crate) target: NodeId,
    pub(crate) current_target: NodeId,
    pub(crate) default_prevented: bool,
}

impl EventState {
    fn new(event_type: &str, target: NodeId) -> Self {
        Self {
            event_type: event_type.to_string(),
            target,
            current_target: target,
            default_prevented: false,
        }
    }

    pub(crate) fn prevent_default(&mut self) {
        self.default_prevented = true;
    }
}

/// A full page navigation requested by the page. `href` is the location
/// as the page wrote it, `to` the resolved URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub href: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollBehavior {
    Smooth,
}

/// A `scrollIntoView` request. `target` is `#id` when the element has one,
/// else its tag name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollRecord {
    pub target: String,
    pub behavior: ScrollBehavior,
}

/// A form submission that was not cancelled by any listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub form_id: Option<String>,
    pub action: String,
    pub method: String,
    pub fields: Vec<(String, String)>,
}

impl Submission {
    /// First value submitted under `name`.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn all(&self, name: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
            .collect()
    }
}

#[derive(Debug)]
struct TraceState {
    enabled: bool,
    events: bool,
    logs: VecDeque<String>,
    log_limit: usize,
    to_stderr: bool,
}

impl Default for TraceState {
    fn default() -> Self {
        Self {
            enabled: false,
            events: true,
            logs: VecDeque::new(),
            log_limit: 10_000,
            to_stderr: true,
        }
    }
}

/// An in-memory page: element tree, listeners and the side effects the
/// page asked the browser for.
#[derive(Debug)]
pub struct Document {
    pub(crate) dom: Dom,
    listeners: ListenerStore,
    url: String,
    active_element: Option<NodeId>,
    navigations: Vec<Navigation>,
    scrolls: Vec<ScrollRecord>,
    submissions: Vec<Submission>,
    trace: TraceState,
}

impl Document {
    pub fn from_html(html: &str) -> Result<Self> {
        Self::from_html_with_url("http://localhost/", html)
    }

    pub fn from_html_with_url(url: &str, html: &str) -> Result<Self> {
        let dom = html::parse_html(html)?;
        Ok(Self {
            dom,
            listeners: ListenerStore::default(),
            url: url.to_string(),
            active_element: None,
            navigations: Vec::new(),
            scrolls: Vec::new(),
            submissions: Vec::new(),
            trace: TraceState::default(),
        })
    }

    pub fn enable_trace(&mut self, enabled: bool) {
        self.trace.enabled = enabled;
    }

    pub fn set_trace_stderr(&mut self, enabled: bool) {
        self.trace.to_stderr = enabled;
    }

    pub fn set_trace_events(&mut self, enabled: bool) {
        self.trace.events = enabled;
    }

    pub fn set_trace_log_limit(&mut self, max_entries: usize) -> Result<()> {
        if max_entries == 0 {
            return Err(Error::DomRuntime(
                "set_trace_log_limit requires at least 1 entry".into(),
            ));
        }
        self.trace.log_limit = max_entries;
        while self.trace.logs.len() > self.trace.log_limit {
            self.trace.logs.pop_front();
        }
        Ok(())
    }

    pub fn take_trace_logs(&mut self) -> Vec<String> {
        std::mem::take(&mut self.trace.logs).into()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn take_navigations(&mut self) -> Vec<Navigation> {
        std::mem::take(&mut self.navigations)
    }

    pub fn take_scrolls(&mut self) -> Vec<ScrollRecord> {
        std::mem::take(&mut self.scrolls)
    }

    pub fn take_submissions(&mut self) -> Vec<Submission> {
        std::mem::take(&mut self.submissions)
    }

    /// Number of registered event listeners across all elements.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn active_element_id(&self) -> Option<String> {
        self.active_element
            .and_then(|node| self.dom.attr(node, "id"))
    }

    pub fn type_text(&mut self, selector: &str, text: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        let tag = self.dom.tag_name(target).unwrap_or_default().to_string();
        if tag != "input" && tag != "textarea" {
            return Err(Error::TypeMismatch {
                selector: selector.to_string(),
                expected: "input or textarea".into(),
                actual: tag,
            });
        }
        if self.is_disabled(target) {
            return Ok(());
        }

        self.dom.set_value(target, text)?;
        self.dispatch_event(target, "input")?;
        Ok(())
    }

    pub fn set_checked(&mut self, selector: &str, checked: bool) -> Result<()> {
        let target = self.select_one(selector)?;
        if !is_checkable_input(&self.dom, target) {
            return Err(Error::TypeMismatch {
                selector: selector.to_string(),
                expected: "input[type=checkbox|radio]".into(),
                actual: self.trace_node_label(target),
            });
        }
        if self.is_disabled(target) {
            return Ok(());
        }

        if self.dom.checked(target)? != checked {
            self.dom.set_checked(target, checked)?;
            self.dispatch_event(target, "input")?;
            self.dispatch_event(target, "change")?;
        }
        Ok(())
    }

    /// Picks the option with `value` in a `<select>` and fires
    /// `input` then `change`.
    pub fn select_option(&mut self, selector: &str, value: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        if !self.dom.is_tag(target, "select") {
            return Err(Error::TypeMismatch {
                selector: selector.to_string(),
                expected: "select".into(),
                actual: self.trace_node_label(target),
            });
        }
        if self.is_disabled(target) {
            return Ok(());
        }

        self.dom.set_select_value(target, value)?;
        self.dispatch_event(target, "input")?;
        self.dispatch_event(target, "change")?;
        Ok(())
    }

    pub fn click(&mut self, selector: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        if self.is_disabled(target) {
            return Ok(());
        }

        let click = self.dispatch_event(target, "click")?;
        if click.default_prevented {
            return Ok(());
        }

        if is_checkable_input(&self.dom, target) {
            let current = self.dom.checked(target)?;
            self.dom.set_checked(target, !current)?;
            self.dispatch_event(target, "input")?;
            self.dispatch_event(target, "change")?;
        } else if is_submit_control(&self.dom, target) {
            if let Some(form) = self.resolve_form_for_submit(target) {
                self.submit_form(form)?;
            }
        } else if let Some(anchor) = self.closest_link(target) {
            if let Some(href) = self.dom.attr(anchor, "href") {
                self.navigate(&href);
            }
        }
        Ok(())
    }

    pub fn submit(&mut self, selector: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        if let Some(form) = self.resolve_form_for_submit(target) {
            self.submit_form(form)?;
        }
        Ok(())
    }

    pub fn dispatch(&mut self, selector: &str, event: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        self.dispatch_event(target, event)?;
        Ok(())
    }

    pub fn focus(&mut self, selector: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        self.focus_node(target)
    }

    pub fn text(&self, selector: &str) -> Result<String> {
        let target = self.select_one(selector)?;
        Ok(self.dom.text_content(target))
    }

    pub fn value(&self, selector: &str) -> Result<String> {
        let target = self.select_one(selector)?;
        self.dom.value(target)
    }

    pub fn checked(&self, selector: &str) -> Result<bool> {
        let target = self.select_one(selector)?;
        self.dom.checked(target)
    }

    pub fn has_class(&self, selector: &str, class_name: &str) -> Result<bool> {
        let target = self.select_one(selector)?;
        self.dom.class_contains(target, class_name)
    }

    /// Inline style property of the first match, empty when unset.
    pub fn style(&self, selector: &str, property: &str) -> Result<String> {
        let target = self.select_one(selector)?;
        self.dom.style_get(target, property)
    }

    pub fn exists(&self, selector: &str) -> Result<bool> {
        Ok(self.dom.query_selector(selector)?.is_some())
    }

    pub fn count(&self, selector: &str) -> Result<usize> {
        Ok(self.dom.query_selector_all(selector)?.len())
    }

    pub fn dump_dom(&self, selector: &str) -> Result<String> {
        let target = self.select_one(selector)?;
        Ok(self.dom.dump_node(target))
    }

    pub fn assert_text(&self, selector: &str, expected: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.text_content(target);
        self.expect_equal(selector, target, expected, actual)
    }

    pub fn assert_value(&self, selector: &str, expected: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.value(target)?;
        self.expect_equal(selector, target, expected, actual)
    }

    pub fn assert_checked(&self, selector: &str, expected: bool) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.checked(target)?;
        self.expect_equal(selector, target, &expected.to_string(), actual.to_string())
    }

    pub fn assert_class(&self, selector: &str, class_name: &str, expected: bool) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.class_contains(target, class_name)?;
        self.expect_equal(
            selector,
            target,
            &format!("class {class_name}={expected}"),
            format!("class {class_name}={actual}"),
        )
    }

    pub fn assert_style(&self, selector: &str, property: &str, expected: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.style_get(target, property)?;
        self.expect_equal(selector, target, expected, actual)
    }

    pub fn assert_exists(&self, selector: &str) -> Result<()> {
        let _ = self.select_one(selector)?;
        Ok(())
    }

    fn expect_equal(
        &self,
        selector: &str,
        target: NodeId,
        expected: &str,
        actual: String,
    ) -> Result<()> {
        if actual != expected {
            return Err(Error::AssertionFailed {
                selector: selector.to_string(),
                expected: expected.to_string(),
                actual,
                dom_snippet: self.node_snippet(target),
            });
        }
        Ok(())
    }

    fn select_one(&self, selector: &str) -> Result<NodeId> {
        self.dom
            .query_selector(selector)?
            .ok_or_else(|| Error::SelectorNotFound(selector.to_string()))
    }

    fn node_snippet(&self, node_id: NodeId) -> String {
        truncate_chars(&self.dom.dump_node(node_id), 200)
    }

    fn is_disabled(&self, node_id: NodeId) -> bool {
        self.dom.attr(node_id, "disabled").is_some()
    }

    fn resolve_form_for_submit(&self, target: NodeId) -> Option<NodeId> {
        if self.dom.is_tag(target, "form") {
            return Some(target);
        }
        self.dom.find_ancestor_by_tag(target, "form")
    }

    fn closest_link(&self, target: NodeId) -> Option<NodeId> {
        if self.dom.is_tag(target, "a") {
            return Some(target);
        }
        self.dom.find_ancestor_by_tag(target, "a")
    }

    fn submit_form(&mut self, form: NodeId) -> Result<()> {
        let event = self.dispatch_event(form, "submit")?;
        if event.default_prevented {
            self.trace_line(format!(
                "[submit] {} cancelled",
                self.trace_node_label(form)
            ));
            return Ok(());
        }

        let submission = Submission {
            form_id: self.dom.attr(form, "id"),
            action: self
                .dom
                .attr(form, "action")
                .map(|action| resolve_href(&self.url, &action))
                .unwrap_or_else(|| self.url.clone()),
            method: self
                .dom
                .attr(form, "method")
                .map(|method| method.to_ascii_lowercase())
                .unwrap_or_else(|| "get".into()),
            fields: self.form_data(form)?,
        };
        self.trace_line(format!(
            "[submit] {} {} {} fields={}",
            self.trace_node_label(form),
            submission.method,
            submission.action,
            submission.fields.len()
        ));
        self.submissions.push(submission);
        Ok(())
    }

    fn form_data(&self, form: NodeId) -> Result<Vec<(String, String)>> {
        let mut controls = Vec::new();
        self.dom.collect_elements_descendants_dfs(form, &mut controls);

        let mut out = Vec::new();
        for control in controls {
            let Some(name) = self.dom.attr(control, "name") else {
                continue;
            };
            if name.is_empty() || self.is_disabled(control) {
                continue;
            }
            let kind = self
                .dom
                .attr(control, "type")
                .unwrap_or_default()
                .to_ascii_lowercase();
            if self.dom.is_tag(control, "input") {
                if matches!(kind.as_str(), "submit" | "button" | "reset" | "image" | "file") {
                    continue;
                }
                if matches!(kind.as_str(), "checkbox" | "radio") {
                    if self.dom.checked(control)? {
                        let value = self
                            .dom
                            .attr(control, "value")
                            .unwrap_or_else(|| "on".into());
                        out.push((name, value));
                    }
                    continue;
                }
                out.push((name, self.dom.value(control)?));
            } else if self.dom.is_tag(control, "textarea") || self.dom.is_tag(control, "select") {
                out.push((name, self.dom.value(control)?));
            }
        }
        Ok(out)
    }

    pub(crate) fn add_listener(&mut self, node: NodeId, event: &str, handler: Handler) {
        self.listeners.add(node, event, handler);
    }

    pub(crate) fn navigate(&mut self, href: &str) {
        let to = resolve_href(&self.url, href);
        let from = std::mem::replace(&mut self.url, to.clone());
        self.trace_line(format!("[navigate] {from} -> {to}"));
        self.navigations.push(Navigation {
            href: href.to_string(),
            from,
            to,
        });
    }

    pub(crate) fn scroll_into_view(&mut self, node: NodeId, behavior: ScrollBehavior) {
        let target = self.trace_node_label(node);
        self.trace_line(format!("[scroll] {target} behavior={behavior:?}"));
        self.scrolls.push(ScrollRecord { target, behavior });
    }

    pub(crate) fn focus_node(&mut self, node: NodeId) -> Result<()> {
        if self.is_disabled(node) || self.active_element == Some(node) {
            return Ok(());
        }
        if let Some(current) = self.active_element.take() {
            self.dispatch_event(current, "blur")?;
        }
        self.active_element = Some(node);
        self.dispatch_event(node, "focus")?;
        Ok(())
    }

    /// Runs the target's listeners, then bubbles through its ancestors.
    fn dispatch_event(&mut self, target: NodeId, event_type: &str) -> Result<EventState> {
        let mut event = EventState::new(event_type, target);

        let mut cursor = Some(target);
        while let Some(node) = cursor {
            event.current_target = node;
            self.invoke_listeners(node, &mut event)?;
            cursor = self.dom.parent(node);
        }

        self.trace_event_done(&event);
        Ok(event)
    }

    fn invoke_listeners(&mut self, node_id: NodeId, event: &mut EventState) -> Result<()> {
        let handlers = self.listeners.get(node_id, &event.event_type);
        for handler in handlers {
            if self.trace.enabled && self.trace.events {
                let line = format!(
                    "[event] {} target={} current={} default_prevented={}",
                    event.event_type,
                    self.trace_node_label(event.target),
                    self.trace_node_label(event.current_target),
                    event.default_prevented
                );
                self.trace_line(line);
            }
            self.run_handler(&handler, event)?;
        }
        Ok(())
    }

    fn run_handler(&mut self, handler: &Handler, event: &mut EventState) -> Result<()> {
        match handler {
            Handler::Validate(binding) => validator::handle_submit(self, binding, event),
            Handler::CategoryFilter(settings) => {
                behaviors::on_category_filter_change(self, settings, event)
            }
            Handler::CommentLink(settings) => behaviors::on_comment_link_click(self, settings, event),
            Handler::PreviewToggle(binding) => behaviors::on_preview_toggle_click(self, binding, event),
            Handler::CategoryChange(group) => behaviors::on_category_change(self, group),
            Handler::CategorySubmit(group) => behaviors::on_category_submit(self, group, event),
        }
    }

    fn trace_event_done(&mut self, event: &EventState) {
        if !(self.trace.enabled && self.trace.events) {
            return;
        }
        let line = format!(
            "[event] done {} target={} default_prevented={}",
            event.event_type,
            self.trace_node_label(event.target),
            event.default_prevented
        );
        self.trace_line(line);
    }

    pub(crate) fn trace_line(&mut self, line: String) {
        if self.trace.enabled {
            if self.trace.to_stderr {
                eprintln!("{line}");
            }
            if self.trace.logs.len() >= self.trace.log_limit {
                self.trace.logs.pop_front();
            }
            self.trace.logs.push_back(line);
        }
    }

    pub(crate) fn trace_node_label(&self, node: NodeId) -> String {
        if let Some(id) = self.dom.attr(node, "id") {
            if !id.is_empty() {
                return format!("#{id}");
            }
        }
        self.dom
            .tag_name(node)
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| format!("node-{}", node.0))
    }
}

fn is_checkable_input(dom: &Dom, node_id: NodeId) -> bool {
    dom.is_tag(node_id, "input")
        && dom
            .attr(node_id, "type")
            .map(|kind| kind.eq_ignore_ascii_case("checkbox") || kind.eq_ignore_ascii_case("radio"))
            .unwrap_or(false)
}

fn is_submit_control(dom: &Dom, node_id: NodeId) -> bool {
    if dom.is_tag(node_id, "button") {
        return dom
            .attr(node_id, "type")
            .map(|kind| kind.eq_ignore_ascii_case("submit"))
            .unwrap_or(true);
    }
    dom.is_tag(node_id, "input")
        && dom
            .attr(node_id, "type")
            .map(|kind| kind.eq_ignore_ascii_case("submit"))
            .unwrap_or(false)
}

/// Resolves `href` against `base` for the three shapes the forum uses:
/// absolute URLs, root-relative paths and fragments.
pub(crate) fn resolve_href(base: &str, href: &str) -> String {
    if href.contains("://") {
        return href.to_string();
    }
    let without_fragment = base.split('#').next().unwrap_or(base);
    if href.starts_with('#') {
        return format!("{without_fragment}{href}");
    }
    let origin = without_fragment
        .find("://")
        .map(|scheme_end| {
            let rest = &without_fragment[scheme_end + 3..];
            let host_end = rest.find('/').map(|i| scheme_end + 3 + i);
            &without_fragment[..host_end.unwrap_or(without_fragment.len())]
        })
        .unwrap_or("");
    if href.starts_with('/') {
        return format!("{origin}{href}");
    }
    let dir_end = without_fragment
        .split('?')
        .next()
        .and_then(|path| path.rfind('/'))
        .map(|i| i + 1)
        .unwrap_or(without_fragment.len());
    format!("{}{href}", &without_fragment[..dir_end])
}
