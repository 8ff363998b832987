//! Template loading and rendering.
//!
//! Templates are Jinja templates compiled by minijinja. The transformer only
//! needs [`CompiledTemplate::render_lines`]; everything else here is about
//! getting a compiled template from somewhere.

use minijinja::{Environment, Value};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::context::Context;
use crate::error::{TemplateError, TemplateResult};
use crate::parser::decode_content;

/// Name of the variable the dataset is bound to.
pub const LINES_VAR: &str = "lines";

/// Name of the global holding the `KEY=VALUE` options.
pub const OPTIONS_VAR: &str = "options";

/// Customizes the template environment before the template is compiled.
///
/// Use it to install filters, functions or globals. The default does nothing.
///
/// ```
/// use csvtemplate::template::{compile_str, EnvironmentHook};
/// use csvtemplate::Context;
/// use minijinja::{context, Environment};
///
/// let shout = |env: &mut Environment<'static>, _ctx: &Context| {
///     env.add_filter("shout", |s: String| s.to_uppercase());
/// };
/// let tpl = compile_str("t", "{{ 'hi'|shout }}", &Context::new("t"), &shout).unwrap();
/// assert_eq!(tpl.render(context! {}).unwrap(), "HI");
/// ```
pub trait EnvironmentHook {
    fn install(&self, _env: &mut Environment<'static>, _context: &Context) {}
}

/// Environment hook that installs nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainEnvironment;

impl EnvironmentHook for PlainEnvironment {}

impl<F> EnvironmentHook for F
where
    F: Fn(&mut Environment<'static>, &Context),
{
    fn install(&self, env: &mut Environment<'static>, context: &Context) {
        self(env, context)
    }
}

/// A template ready to render.
pub struct CompiledTemplate {
    env: Environment<'static>,
    name: String,
}

impl std::fmt::Debug for CompiledTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledTemplate")
            .field("name", &self.name)
            .finish()
    }
}

impl CompiledTemplate {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Render with arbitrary bindings.
    pub fn render<S: Serialize>(&self, bindings: S) -> TemplateResult<String> {
        let render_error = |source: minijinja::Error| TemplateError::Render {
            name: self.name.clone(),
            source,
        };
        let template = self.env.get_template(&self.name).map_err(render_error)?;
        template.render(bindings).map_err(render_error)
    }

    /// Render with the dataset bound to `lines`.
    pub fn render_lines(&self, lines: &[serde_json::Value]) -> TemplateResult<String> {
        let mut bindings = BTreeMap::new();
        bindings.insert(LINES_VAR, Value::from_serialize(lines));
        self.render(bindings)
    }
}

/// Source of compiled templates.
pub trait TemplateLoader {
    fn load(
        &self,
        context: &Context,
        hook: &dyn EnvironmentHook,
    ) -> TemplateResult<CompiledTemplate>;
}

/// Loads `context.template_source` from the filesystem.
///
/// The template is decoded with `context.encoding`. Other templates in the
/// same directory are reachable through `{% include %}` and `{% extends %}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileTemplateLoader;

impl TemplateLoader for FileTemplateLoader {
    fn load(
        &self,
        context: &Context,
        hook: &dyn EnvironmentHook,
    ) -> TemplateResult<CompiledTemplate> {
        compile_file(&context.template_source, context, hook)
    }
}

/// Loads a template held in memory, ignoring `context.template_source`.
#[derive(Debug, Clone)]
pub struct StringTemplateLoader {
    name: String,
    source: String,
}

impl StringTemplateLoader {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }
}

impl TemplateLoader for StringTemplateLoader {
    fn load(
        &self,
        context: &Context,
        hook: &dyn EnvironmentHook,
    ) -> TemplateResult<CompiledTemplate> {
        compile_str(self.name.clone(), self.source.clone(), context, hook)
    }
}

/// Compile a template file.
pub fn compile_file(
    path: &Path,
    context: &Context,
    hook: &dyn EnvironmentHook,
) -> TemplateResult<CompiledTemplate> {
    if !path.is_file() {
        return Err(TemplateError::NotFound(path.to_path_buf()));
    }

    let bytes = std::fs::read(path).map_err(|source| TemplateError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let source = decode_content(&bytes, &context.encoding).map_err(|_| TemplateError::Decode {
        path: path.to_path_buf(),
        encoding: context.encoding.clone(),
    })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let mut env = base_environment(context, hook);
    env.set_loader(minijinja::path_loader(dir));
    finish(env, name, source)
}

/// Compile a template from a string.
pub fn compile_str(
    name: impl Into<String>,
    source: impl Into<String>,
    context: &Context,
    hook: &dyn EnvironmentHook,
) -> TemplateResult<CompiledTemplate> {
    let env = base_environment(context, hook);
    finish(env, name.into(), source.into())
}

fn base_environment(context: &Context, hook: &dyn EnvironmentHook) -> Environment<'static> {
    let mut env = Environment::new();
    env.add_global(OPTIONS_VAR, Value::from_serialize(&context.options));
    hook.install(&mut env, context);
    env
}

fn finish(
    mut env: Environment<'static>,
    name: String,
    source: String,
) -> TemplateResult<CompiledTemplate> {
    env.add_template_owned(name.clone(), source)
        .map_err(|source| TemplateError::Load {
            name: name.clone(),
            source,
        })?;
    Ok(CompiledTemplate { env, name })
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::context;
    use serde_json::json;
    use std::fs;

    #[test]
    fn test_render_lines() {
        let context = Context::new("t");
        let source = "{% for l in lines %}{{ l.a }};{% endfor %}";
        let tpl = compile_str("t", source, &context, &PlainEnvironment).unwrap();
        let out = tpl.render_lines(&[json!({"a": "1"}), json!({"a": "2"})]).unwrap();
        assert_eq!(out, "1;2;");
    }

    #[test]
    fn test_options_global() {
        let context = Context::builder("t").option("table", "users").build();
        let source = "INSERT INTO {{ options.table }}";
        let tpl = compile_str("t", source, &context, &PlainEnvironment).unwrap();
        assert_eq!(tpl.render_lines(&[]).unwrap(), "INSERT INTO users");
    }

    #[test]
    fn test_environment_hook_installs_filter() {
        let hook = |env: &mut Environment<'static>, _ctx: &Context| {
            env.add_filter("sql_quote", |s: String| format!("'{}'", s.replace('\'', "''")));
        };
        let tpl =
            compile_str("t", "{{ \"O'Brien\"|sql_quote }}", &Context::new("t"), &hook).unwrap();
        assert_eq!(tpl.render(context! {}).unwrap(), "'O''Brien'");
    }

    #[test]
    fn test_syntax_error_is_load_error() {
        let err =
            compile_str("bad", "{% for %}", &Context::new("bad"), &PlainEnvironment).unwrap_err();
        assert!(matches!(err, TemplateError::Load { ref name, .. } if name == "bad"));
    }

    #[test]
    fn test_missing_file_not_found() {
        let context = Context::new("/definitely/not/here.j2");
        let err = FileTemplateLoader.load(&context, &PlainEnvironment).unwrap_err();
        assert!(matches!(err, TemplateError::NotFound(_)));
    }

    #[test]
    fn test_file_loader_with_include() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("row.j2"), "<{{ l.col_00 }}>").unwrap();
        fs::write(
            dir.path().join("main.j2"),
            "{% for l in lines %}{% include 'row.j2' %}{% endfor %}",
        )
        .unwrap();

        let context = Context::new(dir.path().join("main.j2"));
        let tpl = FileTemplateLoader.load(&context, &PlainEnvironment).unwrap();
        assert_eq!(tpl.name(), "main.j2");

        let out = tpl.render_lines(&[json!({"col_00": "a"}), json!({"col_00": "b"})]).unwrap();
        assert_eq!(out, "<a><b>");
    }

    #[test]
    fn test_file_loader_decodes_encoding() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latin.j2");
        // "é{{ 1 }}" in windows-1252
        fs::write(&path, [0xE9, b'{', b'{', b' ', b'1', b' ', b'}', b'}']).unwrap();

        let context = Context::builder(&path).encoding("windows-1252").build();
        let tpl = FileTemplateLoader.load(&context, &PlainEnvironment).unwrap();
        assert_eq!(tpl.render(context! {}).unwrap(), "é1");
    }

    #[test]
    fn test_trailing_newline_dropped() {
        let tpl = compile_str("t", "x\n", &Context::new("t"), &PlainEnvironment).unwrap();
        assert_eq!(tpl.render(context! {}).unwrap(), "x");
    }
}
