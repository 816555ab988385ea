//! Client-side behaviors for a small forum, bound against an in-memory document.
//!
//! A [`Document`] is parsed from HTML and then wired up with [`initialize`]:
//! category filter navigation, smooth scrolling to the comment form, the
//! comment preview toggle, declarative validation for the register, login,
//! post and comment forms, and the "at least one category" requirement of the
//! post form. Afterwards the document is driven like a page in a browser:
//!
//! ```
//! use forum_ui::{Document, initialize};
//!
//! let mut page = Document::from_html(
//!     r#"<form id="login-form">
//!          <input name="email" value="">
//!          <input name="password" value="secret">
//!        </form>"#,
//! )?;
//! initialize(&mut page)?;
//! page.submit("#login-form")?;
//! page.assert_text(".error-messages li", "Email is required")?;
//! assert!(page.take_submissions().is_empty());
//! # Ok::<(), forum_ui::Error>(())
//! ```

use std::cell::Cell;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::error::Error as StdError;
use std::fmt;
use std::rc::Rc;

mod behaviors;
mod config;
mod document;
mod dom;
mod email;
mod forms;
mod html;
mod render;
mod rules;
mod selector;
mod validator;


pub use behaviors::{
    PreviewMode, bind_category_filter, bind_category_requirement, bind_comment_links,
    bind_preview_toggle,
};
pub use config::{PreviewRendering, Settings};
pub use document::{Document, Navigation, ScrollBehavior, ScrollRecord, Submission};
pub use email::is_valid_email;
pub use forms::{comment_rules, login_rules, post_rules, register_rules};
pub use render::{display_errors, display_errors_with};
pub use rules::{
    Constraint, Evaluation, FailureReason, FieldFailure, FieldOutcome, FieldResult, FieldRule,
    FieldValues, RuleSet,
};
pub use validator::{bind_validation, bind_validation_with};

use document::{EventState, Handler};
use dom::{Dom, NodeId};
use selector::*;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    HtmlParse(String),
    DomRuntime(String),
    SelectorNotFound(String),
    UnsupportedSelector(String),
    TypeMismatch {
        selector: String,
        expected: String,
        actual: String,
    },
    AssertionFailed {
        selector: String,
        expected: String,
        actual: String,
        dom_snippet: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HtmlParse(msg) => write!(f, "html parse error: {msg}"),
            Self::DomRuntime(msg) => write!(f, "dom runtime error: {msg}"),
            Self::SelectorNotFound(selector) => write!(f, "selector not found: {selector}"),
            Self::UnsupportedSelector(selector) => write!(f, "unsupported selector: {selector}"),
            Self::TypeMismatch {
                selector,
                expected,
                actual,
            } => write!(
                f,
                "type mismatch for {selector}: expected {expected}, actual {actual}"
            ),
            Self::AssertionFailed {
                selector,
                expected,
                actual,
                dom_snippet,
            } => write!(
                f,
                "assertion failed for {selector}: expected {expected}, actual {actual}, snippet {dom_snippet}"
            ),
        }
    }
}

impl StdError for Error {}

/// Wires every behavior and form validator into `document` using the
/// default element contract.
pub fn initialize(document: &mut Document) -> Result<()> {
    initialize_with(document, &Settings::default())
}

/// Like [`initialize`], with a custom element contract.
///
/// Each binding is independent: a page that lacks some of the expected
/// elements simply gets fewer listeners.
pub fn initialize_with(document: &mut Document, settings: &Settings) -> Result<()> {
    let settings = Rc::new(settings.clone());

    behaviors::bind_category_filter_shared(document, &settings);
    behaviors::bind_comment_links_shared(document, &settings)?;
    behaviors::bind_preview_toggle_shared(document, &settings);

    for (form_id, rules) in forms::builtin_rule_sets(&settings) {
        validator::bind_validation_shared(document, &form_id, rules, &settings);
    }

    behaviors::bind_category_requirement_shared(document, &settings)?;
    Ok(())
}

pub(crate) fn truncate_chars(value: &str, max_chars: usize) -> String {
    let mut it = value.chars();
    let mut out = String::new();
    for _ in 0..max_chars {
        let Some(ch) = it.next() else {
            return out;
        };
        out.push(ch);
    }
    if it.next().is_some() {
        out.push_str("...");
    }
    out
}

pub(crate) fn encode_uri_component(src: &str) -> String {
    let mut out = String::new();
    for b in src.as_bytes() {
        if is_unescaped_uri_byte(*b) {
            out.push(*b as char);
        } else {
            out.push('%');
            out.push(to_hex_upper((*b >> 4) & 0x0F));
            out.push(to_hex_upper(*b & 0x0F));
        }
    }
    out
}

fn is_unescaped_uri_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b'-' | b'_' | b'.' | b'!' | b'~' | b'*' | b'\'' | b'(' | b')'
        )
}

fn to_hex_upper(nibble: u8) -> char {
    match nibble {
        0..=9 => (b'0' + nibble) as char,
        10..=15 => (b'A' + (nibble - 10)) as char,
        _ => '?',
    }
}
