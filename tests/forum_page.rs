use forum_ui::{
    Document, FailureReason, FieldOutcome, FieldRule, RuleSet, ScrollBehavior, Settings,
    bind_category_filter, bind_category_requirement, bind_comment_links, bind_preview_toggle,
    bind_validation, initialize, register_rules,
};

const POST_DETAIL_HTML: &str = r##"
<!DOCTYPE html>
<html>
<body>
  <nav>
    <select id="category-filter">
      <option value="">All</option>
      <option value="1">Go</option>
      <option value="2">Rust</option>
    </select>
  </nav>
  <article id="post-12">
    <h1>Ownership</h1>
    <a class="comment-link" href="#comments">3 comments</a>
  </article>
  <section id="comments">
    <form id="comment-form" action="/post/12/comment" method="post">
      <textarea id="comment-input" name="content"></textarea>
      <div id="comment-preview" style="display: none;"></div>
      <button id="preview-toggle" type="button">Preview</button>
      <button id="comment-submit" type="submit">Send</button>
    </form>
  </section>
</body>
</html>
"##;

const REGISTER_HTML: &str = r#"
<form id="register-form" action="/register" method="post">
  <input id="username" name="username">
  <input id="email" name="email" type="email">
  <input id="password" name="password" type="password">
  <input id="confirm" name="confirm_password" type="password">
  <button id="submit" type="submit">Register</button>
</form>
"#;

#[test]
fn empty_username_reports_required_and_blocks_submit() -> forum_ui::Result<()> {
    let html = r#"
    <form id="signup">
      <input id="username" name="username">
      <button id="go" type="submit">Go</button>
    </form>
    "#;
    let mut page = Document::from_html(html)?;
    let rules =
        RuleSet::new().rule(FieldRule::new("username", "Username").required().min_length(3));
    assert!(bind_validation(&mut page, "signup", rules));

    page.click("#go")?;
    assert_eq!(page.count(".error-messages li")?, 1);
    page.assert_text(".error-messages li", "Username is required")?;
    assert!(page.take_submissions().is_empty());

    page.type_text("#username", "ab")?;
    page.click("#go")?;
    assert_eq!(page.count(".error-messages li")?, 1);
    page.assert_text(
        ".error-messages li",
        "Username must be at least 3 characters",
    )?;
    Ok(())
}

#[test]
fn matching_passwords_pass_and_mismatch_is_reported() -> forum_ui::Result<()> {
    let mut page = Document::from_html(REGISTER_HTML)?;
    initialize(&mut page)?;

    page.type_text("#username", "carol")?;
    page.type_text("#email", "carol@forum.dev")?;
    page.type_text("#password", "abcdef")?;
    page.type_text("#confirm", "xyz")?;
    page.click("#submit")?;
    page.assert_text(".error-messages li", "Confirm password does not match")?;
    page.assert_class("#confirm", "error", true)?;
    page.assert_class("#password", "error", false)?;

    page.type_text("#confirm", "abcdef")?;
    page.click("#submit")?;
    page.assert_class("#confirm", "error", false)?;
    let submissions = page.take_submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].form_id.as_deref(), Some("register-form"));
    assert_eq!(submissions[0].field("password"), Some("abcdef"));
    Ok(())
}

#[test]
fn register_rules_evaluate_without_a_document() {
    let evaluation = register_rules().evaluate(&[
        ("username", "dave"),
        ("email", "dave@"),
        ("password", "abcdef"),
        ("confirm_password", "abcdef"),
    ]);
    assert_eq!(evaluation.outcome("username"), Some(&FieldOutcome::Passed));
    assert_eq!(
        evaluation.outcome("email"),
        Some(&FieldOutcome::Failed(FailureReason::InvalidEmail))
    );
    assert_eq!(
        evaluation.messages(),
        vec!["Email must be a valid email address".to_string()]
    );
    assert!(!evaluation.is_valid());
}

#[test]
fn post_detail_page_wires_every_behavior() -> forum_ui::Result<()> {
    let mut page = Document::from_html_with_url("http://localhost/post/12", POST_DETAIL_HTML)?;
    initialize(&mut page)?;

    page.click(".comment-link")?;
    let scrolls = page.take_scrolls();
    assert_eq!(scrolls.len(), 1);
    assert_eq!(scrolls[0].target, "#comments");
    assert_eq!(scrolls[0].behavior, ScrollBehavior::Smooth);
    assert_eq!(page.active_element_id().as_deref(), Some("comment-input"));
    assert!(page.take_navigations().is_empty());

    page.type_text("#comment-input", "Nice write-up")?;
    page.click("#preview-toggle")?;
    page.assert_text("#comment-preview", "Nice write-up")?;
    page.assert_style("#comment-preview", "display", "block")?;
    page.assert_text("#preview-toggle", "Edit")?;

    page.click("#preview-toggle")?;
    page.assert_style("#comment-preview", "display", "none")?;
    page.assert_style("#comment-input", "display", "block")?;
    page.assert_text("#preview-toggle", "Preview")?;

    page.click("#comment-submit")?;
    let submissions = page.take_submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].action, "http://localhost/post/12/comment");
    assert_eq!(submissions[0].field("content"), Some("Nice write-up"));

    page.select_option("#category-filter", "2")?;
    assert_eq!(page.url(), "http://localhost/?category=2");
    page.select_option("#category-filter", "")?;
    assert_eq!(page.url(), "http://localhost/");
    Ok(())
}

#[test]
fn short_comment_is_blocked() -> forum_ui::Result<()> {
    let mut page = Document::from_html(POST_DETAIL_HTML)?;
    initialize(&mut page)?;

    page.type_text("#comment-input", "ok")?;
    page.click("#comment-submit")?;
    page.assert_text(
        "#comment-form .error-messages li",
        "Comment must be at least 3 characters",
    )?;
    page.assert_class("#comment-input", "error", true)?;
    assert!(page.take_submissions().is_empty());
    Ok(())
}

#[test]
fn binders_on_a_bare_page_register_nothing() -> forum_ui::Result<()> {
    let mut page = Document::from_html("<main><p>Nothing to see</p></main>")?;
    let settings = Settings::default();

    assert!(!bind_category_filter(&mut page, &settings));
    assert_eq!(bind_comment_links(&mut page, &settings)?, 0);
    assert!(!bind_preview_toggle(&mut page, &settings));
    assert!(!bind_category_requirement(&mut page, &settings)?);
    assert!(!bind_validation(&mut page, "register-form", register_rules()));
    assert_eq!(page.listener_count(), 0);

    initialize(&mut page)?;
    assert_eq!(page.listener_count(), 0);
    Ok(())
}

#[test]
fn category_requirement_toggles_error_indicator() -> forum_ui::Result<()> {
    let html = r#"
    <form id="post-form" action="/post/create" method="post">
      <input id="title" name="title" value="A long enough title">
      <textarea id="content" name="content">Plenty of body text here</textarea>
      <input id="c1" class="category-checkbox" type="checkbox" name="categories" value="1">
      <input id="c2" class="category-checkbox" type="checkbox" name="categories" value="2">
      <p id="category-error" style="display: none;">Pick a category</p>
      <button id="publish" type="submit">Publish</button>
    </form>
    "#;
    let mut page = Document::from_html(html)?;
    initialize(&mut page)?;

    page.click("#publish")?;
    page.assert_style("#category-error", "display", "block")?;
    assert!(page.take_submissions().is_empty());

    page.click("#c1")?;
    page.assert_checked("#c1", true)?;
    page.assert_style("#category-error", "display", "none")?;

    page.click("#publish")?;
    let submissions = page.take_submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].all("categories"), vec!["1"]);
    Ok(())
}
