/// How the comment preview shows the text typed into the comment input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreviewRendering {
    /// The input is shown as literal text.
    #[default]
    PlainText,
    /// The input is parsed as HTML and inserted into the preview as-is.
    Markup,
}

/// Element contract and tunables used by [`crate::initialize_with`].
///
/// The defaults match the forum templates: `#register-form`, `#login-form`,
/// `#post-form`, `#comment-form`, `#category-filter`, `.comment-link`,
/// `#comment-input`, `#comment-preview`, `#preview-toggle`,
/// `.category-checkbox` and `#category-error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub register_form_id: String,
    pub login_form_id: String,
    pub post_form_id: String,
    pub comment_form_id: String,
    pub category_filter_id: String,
    pub comment_link_selector: String,
    pub comment_input_id: String,
    pub comment_preview_id: String,
    pub preview_toggle_id: String,
    pub category_checkbox_selector: String,
    pub category_error_id: String,
    /// Class toggled on inputs that fail validation.
    pub error_class: String,
    /// Class of the container injected at the top of a failing form.
    pub error_container_class: String,
    pub home_path: String,
    pub preview_rendering: PreviewRendering,
    pub preview_label: String,
    pub edit_label: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            register_form_id: "register-form".into(),
            login_form_id: "login-form".into(),
            post_form_id: "post-form".into(),
            comment_form_id: "comment-form".into(),
            category_filter_id: "category-filter".into(),
            comment_link_selector: ".comment-link".into(),
            comment_input_id: "comment-input".into(),
            comment_preview_id: "comment-preview".into(),
            preview_toggle_id: "preview-toggle".into(),
            category_checkbox_selector: ".category-checkbox".into(),
            category_error_id: "category-error".into(),
            error_class: "error".into(),
            error_container_class: "error-messages".into(),
            home_path: "/".into(),
            preview_rendering: PreviewRendering::default(),
            preview_label: "Preview".into(),
            edit_label: "Edit".into(),
        }
    }
}

impl Settings {
    pub fn with_preview_rendering(mut self, rendering: PreviewRendering) -> Self {
        self.preview_rendering = rendering;
        self
    }

    pub fn with_home_path(mut self, path: &str) -> Self {
        self.home_path = path.to_string();
        self
    }

    pub fn with_error_class(mut self, class_name: &str) -> Self {
        self.error_class = class_name.to_string();
        self
    }

    pub fn with_error_container_class(mut self, class_name: &str) -> Self {
        self.error_container_class = class_name.to_string();
        self
    }

    pub fn with_form_ids(mut self, register: &str, login: &str, post: &str, comment: &str) -> Self {
        self.register_form_id = register.to_string();
        self.login_form_id = login.to_string();
        self.post_form_id = post.to_string();
        self.comment_form_id = comment.to_string();
        self
    }

    pub(crate) fn category_url(&self, category: &str) -> String {
        if category.is_empty() {
            self.home_path.clone()
        } else {
            format!(
                "{}?category={}",
                self.home_path,
                crate::encode_uri_component(category)
            )
        }
    }
}
