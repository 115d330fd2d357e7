use handlebars::Handlebars;
use once_cell::sync::Lazy;

use crate::analyzer::AnalysisResult;
use crate::output::json;

static HBARS: Lazy<Handlebars> = Lazy::new(|| {
    let mut hbars = Handlebars::new();
    hbars.set_strict_mode(true);
    hbars.register_escape_fn(handlebars::no_escape);
    hbars
        .register_template_string("github_report_md", include_str!("github.md.hbs"))
        .expect("Failed to register github_report_md");
    hbars
});

/// Render a Markdown comment suitable for posting on a pull request.
pub fn render(results: &[AnalysisResult]) -> crate::Result<String> {
    Ok(HBARS.render("github_report_md", &json::report(results))?)
}
