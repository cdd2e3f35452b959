//! Renders a tenant's fetched UI templates (`login`, `logout`, `error`,
//! `index`) with `{{token}}` substitution; falls back to a built-in default
//! when a tenant has no template fetched for a given page.

use std::path::Path;

use uitsmijter_core::{domain::tenant::Tenant, templates::tenant_template_dir};

const DEFAULT_LOGIN: &str = include_str!("../templates/login.html");
const DEFAULT_ERROR: &str = include_str!("../templates/error.html");
const DEFAULT_LOGOUT: &str = include_str!("../templates/logout.html");

/// Which page to render.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Page {
	/// The login form.
	Login,
	/// The error page.
	Error,
	/// The logout navigation page.
	Logout,
}

impl Page {
	fn file_name(self) -> &'static str {
		match self {
			Page::Login => "login",
			Page::Error => "error",
			Page::Logout => "logout",
		}
	}

	fn default_source(self) -> &'static str {
		match self {
			Page::Login => DEFAULT_LOGIN,
			Page::Error => DEFAULT_ERROR,
			Page::Logout => DEFAULT_LOGOUT,
		}
	}
}

/// Renders `page` for `tenant`, substituting every `{{key}}` placeholder in
/// `vars` and dropping any the template doesn't reference.
pub fn render(views_dir: &Path, tenant: &Tenant, page: Page, vars: &[(&str, &str)]) -> String {
	let source = std::fs::read_to_string(tenant_template_dir(views_dir, &tenant.name).join(page.file_name()))
		.unwrap_or_else(|_| page.default_source().to_owned());

	substitute(&source, vars)
}

fn substitute(source: &str, vars: &[(&str, &str)]) -> String {
	let mut out = source.to_owned();

	for (key, value) in vars {
		out = out.replace(&format!("{{{{{key}}}}}"), value);
	}

	out
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn substitute_replaces_every_occurrence() {
		let rendered = substitute("hello {{name}}, bye {{name}}", &[("name", "Cee")]);

		assert_eq!(rendered, "hello Cee, bye Cee");
	}

	#[test]
	fn render_falls_back_to_the_default_when_the_tenant_has_no_fetched_template() {
		let tenant = uitsmijter_core::_preludet::fixture_tenant("cheese/cheese", "id.example.com");
		let dir = std::env::temp_dir().join(format!("uitsmijter-render-test-{}", uuid::Uuid::new_v4()));

		let rendered = render(&dir, &tenant, Page::Login, &[("action", "/login")]);

		assert!(rendered.contains("/login"));
	}
}
