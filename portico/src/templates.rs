//! Template registry and rendering environment.
//!
//! Templates ship embedded in the binary and are loaded into a single
//! `minijinja` environment at startup. Resource views resolve their template
//! through an explicit registration table ([`ResourceKind`] x [`ViewOp`])
//! instead of deriving names from type metadata, and the whole table is
//! validated eagerly by [`validate`] before the server starts: a missing
//! template or an unregistered list route is a configuration fault, not a
//! render-time surprise.

use minijinja::Environment;
use rust_embed::RustEmbed;

use crate::errors::Error;
use crate::views::routes;

/// Embedded page templates.
#[derive(RustEmbed)]
#[folder = "templates/"]
struct Templates;

/// Operation kinds of the generic view family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewOp {
    List,
    Detail,
    Create,
    Edit,
    Delete,
}

impl ViewOp {
    pub const ALL: [ViewOp; 5] = [ViewOp::List, ViewOp::Detail, ViewOp::Create, ViewOp::Edit, ViewOp::Delete];

    pub fn name(self) -> &'static str {
        match self {
            ViewOp::List => "list",
            ViewOp::Detail => "detail",
            ViewOp::Create => "create",
            ViewOp::Edit => "edit",
            ViewOp::Delete => "delete",
        }
    }
}

/// Registered resource kinds exposed through CRUD views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    User,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 1] = [ResourceKind::User];

    /// Lower-cased type name; the key of the template and route conventions.
    pub fn slug(self) -> &'static str {
        match self {
            ResourceKind::User => "user",
        }
    }

    /// Template identifier for one operation of this kind:
    /// `<slug>/<operation>.html`.
    pub fn template(self, op: ViewOp) -> String {
        format!("{}/{}.html", self.slug(), op.name())
    }

    /// Canonical list-route name: namespace prefix + slug + `_list`.
    pub fn list_route_name(self) -> String {
        format!("portico:{}_list", self.slug())
    }

    /// Path of the kind's list view, used for post-mutation redirects.
    pub fn list_route(self) -> Result<&'static str, Error> {
        routes::resolve(&self.list_route_name()).ok_or_else(|| Error::Configuration {
            message: format!("list route {} is not registered", self.list_route_name()),
        })
    }
}

/// Standalone page templates outside the per-resource convention.
pub const PAGE_TEMPLATES: &[&str] = &[
    "base.html",
    "base/index.html",
    "base/about.html",
    "base/contact.html",
    "authentication/login.html",
    "authentication/logged_out.html",
    "authentication/profile.html",
    "authentication/change_password.html",
    "authentication/change_done.html",
    "authentication/reset_password.html",
    "authentication/reset_done.html",
    "authentication/reset_confirm.html",
    "authentication/reset_complete.html",
];

/// Build the rendering environment from the embedded templates.
pub fn environment() -> Result<Environment<'static>, Error> {
    let mut env = Environment::new();

    for name in Templates::iter() {
        let file = Templates::get(&name).ok_or_else(|| Error::Configuration {
            message: format!("embedded template {name} vanished"),
        })?;
        let source = String::from_utf8(file.data.into_owned()).map_err(|e| Error::Configuration {
            message: format!("template {name} is not valid UTF-8: {e}"),
        })?;
        env.add_template_owned(name.to_string(), source).map_err(|e| Error::Configuration {
            message: format!("template {name} failed to parse: {e}"),
        })?;
    }

    Ok(env)
}

/// Eagerly validate the registration table against the environment.
///
/// Every (kind, operation) template and every page template must exist, and
/// every kind's list-route name must resolve to a path.
pub fn validate(env: &Environment<'_>) -> Result<(), Error> {
    for kind in ResourceKind::ALL {
        for op in ViewOp::ALL {
            let name = kind.template(op);
            env.get_template(&name).map_err(|_| Error::Configuration {
                message: format!("template {name} is not embedded"),
            })?;
        }
        kind.list_route()?;
    }

    for name in PAGE_TEMPLATES {
        env.get_template(name).map_err(|_| Error::Configuration {
            message: format!("template {name} is not embedded"),
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_resolution_is_pure() {
        // Same (kind, op) pair always yields the same identifier
        assert_eq!(ResourceKind::User.template(ViewOp::Edit), "user/edit.html");
        assert_eq!(ResourceKind::User.template(ViewOp::Edit), "user/edit.html");
        assert_eq!(ResourceKind::User.template(ViewOp::List), "user/list.html");
        assert_eq!(ResourceKind::User.template(ViewOp::Delete), "user/delete.html");
    }

    #[test]
    fn test_list_route_convention() {
        assert_eq!(ResourceKind::User.list_route_name(), "portico:user_list");
        assert_eq!(ResourceKind::User.list_route().unwrap(), crate::views::routes::DASHBOARD);
    }

    #[test]
    fn test_environment_contains_all_registered_templates() {
        let env = environment().expect("environment should build");
        validate(&env).expect("every registered template should be embedded");
    }

    #[test]
    fn test_validate_rejects_missing_template() {
        // An empty environment is missing everything
        let env = Environment::new();
        let err = validate(&env).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_base_template_renders() {
        let env = environment().unwrap();
        let tmpl = env.get_template("base/index.html").unwrap();
        let html = tmpl
            .render(minijinja::context! { messages => Vec::<crate::views::flash::Flash>::new(), current_user => () })
            .unwrap();
        assert!(html.contains("<!DOCTYPE html>") || html.contains("<!doctype html>"));
    }
}
