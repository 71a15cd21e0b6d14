//! Request-response handlers dispatched by the [`crate::router::Router`].
//!
//! The event-stream route lives in [`crate::sse`]; everything here answers
//! with a complete body and releases the connection.

mod static_file;
mod status;

pub use static_file::StaticFileHandler;
pub use status::{JsonStatusHandler, StatusHandler};

use minijinja::{context, Environment};

const NOT_FOUND_TEMPLATE: &str = "<html><body><h1>Error</h1><p>The file <b>{{ path }}</b> was not \
found in the serving directory or access was denied.</p></body></html>";

/// 404 body naming the request path. Uses an `.html` template name so
/// minijinja auto-escapes the path.
pub fn not_found_page(path: &str) -> String {
    let mut env = Environment::new();
    let rendered = env
        .add_template("not_found.html", NOT_FOUND_TEMPLATE)
        .and_then(|()| env.get_template("not_found.html"))
        .and_then(|tmpl| tmpl.render(context! { path }));
    match rendered {
        Ok(html) => html,
        Err(e) => {
            tracing::warn!(error = %e, "failed to render 404 page");
            "<html><body><h1>Error</h1><p>File not found.</p></body></html>".to_string()
        }
    }
}
