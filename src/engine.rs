use crate::{
    cache::Cache,
    compile::{Parser, Template},
    filter::Filter,
    function::Function,
    log::{error_missing_template, Error, INVALID_FILTER, INVALID_FUNCTION},
    render::{builtin, Renderer},
    store::Store,
};
use serde_json::Value;
use std::{
    collections::{BTreeSet, HashMap},
    fs,
    path::PathBuf,
    time::{Duration, Instant},
};

/// Configuration for an [`Engine`].
///
/// # Examples
///
/// ```
/// use stencil::{Engine, Settings};
///
/// let engine = Engine::new(
///     Settings::new()
///         .with_templates("templates")
///         .with_cache("cache")
///         .with_strict(true),
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// Directory that templates are read from when rendering by name.
    pub(crate) templates: Option<PathBuf>,
    /// Directory that compiled templates are cached in.
    ///
    /// Compilation results are not persisted when unset.
    pub(crate) cache: Option<PathBuf>,
    /// True if rendering an undefined variable is an error.
    pub(crate) strict: bool,
}

impl Settings {
    /// Create a new [`Settings`] with default values.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the template directory.
    #[inline]
    pub fn with_templates<T>(mut self, path: T) -> Self
    where
        T: Into<PathBuf>,
    {
        self.templates = Some(path.into());

        self
    }

    /// Set the compilation cache directory.
    #[inline]
    pub fn with_cache<T>(mut self, path: T) -> Self
    where
        T: Into<PathBuf>,
    {
        self.cache = Some(path.into());

        self
    }

    /// Set strict mode, which turns rendering an undefined variable into
    /// an error instead of empty output.
    #[inline]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;

        self
    }
}

/// Diagnostic information about a single render.
#[derive(Debug)]
pub struct Report {
    /// Name of the rendered template.
    pub name: String,
    /// Time spent acquiring and rendering the template.
    pub duration: Duration,
    /// Size of the rendered output in bytes.
    pub size: usize,
    /// Approximate memory held during the render, the capacity of the
    /// output buffer plus the source text.
    pub memory: usize,
    /// True if the template came from the compilation cache.
    pub from_cache: bool,
    /// Names of the top-level variables resolved during the render.
    pub referenced: BTreeSet<String>,
}

/// Compiles and renders templates, and holds the registered filters
/// and functions.
pub struct Engine {
    settings: Settings,
    cache: Cache,
    filters: HashMap<String, Box<dyn Filter>>,
    functions: HashMap<String, Box<dyn Function>>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl Engine {
    /// Create a new [`Engine`] with the given [`Settings`].
    ///
    /// The `Engine` starts with the built-in filters registered, so
    /// registering a filter named `upper` returns an error.
    pub fn new(settings: Settings) -> Self {
        let mut engine = Self {
            cache: Cache::new(settings.cache.clone()),
            settings,
            filters: HashMap::new(),
            functions: HashMap::new(),
        };

        let builtins: [(&str, fn(&Value, &[Value]) -> Result<Value, Error>); 11] = [
            ("length", builtin::length),
            ("count", builtin::length),
            ("upper", builtin::upper),
            ("lower", builtin::lower),
            ("trim", builtin::trim),
            ("abs", builtin::abs),
            ("first", builtin::first),
            ("last", builtin::last),
            ("join", builtin::join),
            ("slice", builtin::slice),
            ("batch", builtin::batch),
        ];
        for (name, filter) in builtins {
            engine.filters.insert(name.to_owned(), Box::new(filter));
        }

        engine
    }

    /// Return the [`Settings`] of the [`Engine`].
    #[inline]
    pub fn get_settings(&self) -> &Settings {
        &self.settings
    }

    /// Compile a [`Template`] from the given text.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when compilation fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use stencil::Engine;
    ///
    /// let engine = Engine::default();
    /// let template = engine.compile("hello, {{ name }}!");
    /// assert!(template.is_ok());
    /// ```
    #[inline]
    pub fn compile(&self, text: &str) -> Result<Template, Error> {
        Parser::new(text).compile(None)
    }

    /// Compile a [`Template`] from the given text.
    ///
    /// # Panics
    ///
    /// Panics when compilation fails.
    #[inline]
    pub fn compile_must(&self, text: &str) -> Template {
        self.compile(text).unwrap()
    }

    /// Render the given [`Template`] with the given [`Store`].
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when rendering fails.
    pub fn render_template(&self, template: &Template, store: &Store) -> Result<String, Error> {
        Renderer::new(self, template, store).render()
    }

    /// Render the named template from the template directory.
    ///
    /// The compiled form is pulled from the compilation cache when a
    /// fresh entry exists, and persisted to it otherwise.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when no template directory is set, the
    /// template cannot be read, or compilation or rendering fails.
    pub fn render(&self, name: &str, store: &Store) -> Result<String, Error> {
        let (template, _) = self.acquire(name)?;

        self.render_template(&template, store)
    }

    /// Render the named template from the template directory, and return
    /// a [`Report`] describing the render.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] for the same reasons as [`render`][`Engine::render`].
    pub fn render_report(&self, name: &str, store: &Store) -> Result<(String, Report), Error> {
        let start = Instant::now();
        let (template, from_cache) = self.acquire(name)?;

        let mut renderer = Renderer::new(self, &template, store);
        let output = renderer.render()?;
        let report = Report {
            name: name.to_owned(),
            duration: start.elapsed(),
            size: output.len(),
            memory: output.capacity() + template.get_source().len(),
            from_cache,
            referenced: renderer.into_referenced(),
        };

        Ok((output, report))
    }

    /// Remove every entry from the compilation cache.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when an entry cannot be removed.
    #[inline]
    pub fn clear_cache(&self) -> Result<(), Error> {
        self.cache.clear()
    }

    /// Return the named template, compiling it when the compilation
    /// cache has no fresh entry.
    ///
    /// The returned bool is true when the template came from the cache.
    /// A failure to persist a new entry degrades to uncached operation
    /// rather than failing the render.
    fn acquire(&self, name: &str) -> Result<(Template, bool), Error> {
        let Some(dir) = &self.settings.templates else {
            return Err(Error::build("missing template directory").with_help(
                "set a template directory with `Settings::with_templates` to render by name",
            ));
        };
        let path = dir.join(name);
        let modified = fs::metadata(&path)
            .and_then(|metadata| metadata.modified())
            .map_err(|_| error_missing_template(name))?;

        if let Some(template) = self.cache.fetch(name, modified) {
            return Ok((template, true));
        }

        let source = fs::read_to_string(&path).map_err(|_| error_missing_template(name))?;
        let template = Parser::new(&source)
            .compile(Some(name))
            .map_err(|error| error.with_name(name))?;
        let _ = self.cache.persist(name, modified, &template);

        Ok((template, false))
    }

    /// Register a [`Filter`] under the given name.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when the name is already registered.
    pub fn add_filter<T>(&mut self, name: T, filter: impl Filter + 'static) -> Result<(), Error>
    where
        T: Into<String>,
    {
        let name = name.into();
        if self.filters.contains_key(&name) {
            return Err(Error::build(INVALID_FILTER)
                .with_help(format!("filter `{name}` is already registered")));
        }
        self.filters.insert(name, Box::new(filter));

        Ok(())
    }

    /// Register a [`Filter`] under the given name.
    ///
    /// # Panics
    ///
    /// Panics when the name is already registered.
    #[inline]
    pub fn add_filter_must<T>(&mut self, name: T, filter: impl Filter + 'static)
    where
        T: Into<String>,
    {
        self.add_filter(name, filter).unwrap()
    }

    /// Register a [`Filter`] under the given name.
    ///
    /// Returns the `Engine`, so additional methods may be chained.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when the name is already registered.
    #[inline]
    pub fn with_filter<T>(mut self, name: T, filter: impl Filter + 'static) -> Result<Self, Error>
    where
        T: Into<String>,
    {
        self.add_filter(name, filter)?;

        Ok(self)
    }

    /// Register a [`Filter`] under the given name.
    ///
    /// Returns the `Engine`, so additional methods may be chained.
    ///
    /// # Panics
    ///
    /// Panics when the name is already registered.
    #[inline]
    pub fn with_filter_must<T>(mut self, name: T, filter: impl Filter + 'static) -> Self
    where
        T: Into<String>,
    {
        self.add_filter_must(name, filter);

        self
    }

    /// Return the [`Filter`] registered under the given name.
    #[inline]
    pub fn get_filter(&self, name: &str) -> Option<&dyn Filter> {
        self.filters.get(name).map(|filter| filter.as_ref())
    }

    /// Register a [`Function`] under the given name.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when the name is already registered.
    pub fn add_function<T>(
        &mut self,
        name: T,
        function: impl Function + 'static,
    ) -> Result<(), Error>
    where
        T: Into<String>,
    {
        let name = name.into();
        if self.functions.contains_key(&name) {
            return Err(Error::build(INVALID_FUNCTION)
                .with_help(format!("function `{name}` is already registered")));
        }
        self.functions.insert(name, Box::new(function));

        Ok(())
    }

    /// Register a [`Function`] under the given name.
    ///
    /// # Panics
    ///
    /// Panics when the name is already registered.
    #[inline]
    pub fn add_function_must<T>(&mut self, name: T, function: impl Function + 'static)
    where
        T: Into<String>,
    {
        self.add_function(name, function).unwrap()
    }

    /// Register a [`Function`] under the given name.
    ///
    /// Returns the `Engine`, so additional methods may be chained.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when the name is already registered.
    #[inline]
    pub fn with_function<T>(
        mut self,
        name: T,
        function: impl Function + 'static,
    ) -> Result<Self, Error>
    where
        T: Into<String>,
    {
        self.add_function(name, function)?;

        Ok(self)
    }

    /// Register a [`Function`] under the given name.
    ///
    /// Returns the `Engine`, so additional methods may be chained.
    ///
    /// # Panics
    ///
    /// Panics when the name is already registered.
    #[inline]
    pub fn with_function_must<T>(mut self, name: T, function: impl Function + 'static) -> Self
    where
        T: Into<String>,
    {
        self.add_function_must(name, function);

        self
    }

    /// Return the [`Function`] registered under the given name.
    #[inline]
    pub fn get_function(&self, name: &str) -> Option<&dyn Function> {
        self.functions.get(name).map(|function| function.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::{Engine, Settings};
    use crate::store::Store;
    use std::fs;

    #[test]
    fn test_render_by_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("hello.html"), "hello, {{ name }}!").unwrap();
        let engine = Engine::new(Settings::new().with_templates(dir.path()));

        let result = engine.render("hello.html", &Store::new().with_must("name", "taylor"));
        assert_eq!(result.unwrap(), "hello, taylor!");
    }

    #[test]
    fn test_render_missing_template() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::new(Settings::new().with_templates(dir.path()));

        assert!(engine.render("ghost.html", &Store::new()).is_err());
    }

    #[test]
    fn test_render_without_directory() {
        let engine = Engine::default();

        assert!(engine.render("hello.html", &Store::new()).is_err());
    }

    #[test]
    fn test_render_report() {
        let templates = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        fs::write(templates.path().join("page.html"), "hi, {{ name }}").unwrap();
        let engine = Engine::new(
            Settings::new()
                .with_templates(templates.path())
                .with_cache(cache.path()),
        );
        let store = Store::new().with_must("name", "taylor");

        let (output, report) = engine.render_report("page.html", &store).unwrap();
        assert_eq!(output, "hi, taylor");
        assert_eq!(report.name, "page.html");
        assert_eq!(report.size, output.len());
        assert!(!report.from_cache);
        assert!(report.referenced.contains("name"));

        // A second render finds the persisted entry.
        let (_, report) = engine.render_report("page.html", &store).unwrap();
        assert!(report.from_cache);
    }

    #[test]
    fn test_render_after_source_change() {
        let templates = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let path = templates.path().join("page.html");
        fs::write(&path, "one").unwrap();
        let engine = Engine::new(
            Settings::new()
                .with_templates(templates.path())
                .with_cache(cache.path()),
        );
        let store = Store::new();

        let (output, _) = engine.render_report("page.html", &store).unwrap();
        assert_eq!(output, "one");
        let (_, report) = engine.render_report("page.html", &store).unwrap();
        assert!(report.from_cache);

        // The rewrite needs a modified time later than the cache entry.
        std::thread::sleep(std::time::Duration::from_millis(20));
        fs::write(&path, "two").unwrap();

        let (output, report) = engine.render_report("page.html", &store).unwrap();
        assert_eq!(output, "two");
        assert!(!report.from_cache);
    }

    #[test]
    fn test_clear_cache() {
        let templates = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        fs::write(templates.path().join("page.html"), "x").unwrap();
        let engine = Engine::new(
            Settings::new()
                .with_templates(templates.path())
                .with_cache(cache.path()),
        );
        let store = Store::new();

        engine.render_report("page.html", &store).unwrap();
        engine.clear_cache().unwrap();

        let (_, report) = engine.render_report("page.html", &store).unwrap();
        assert!(!report.from_cache);
    }

    #[test]
    fn test_duplicate_filter() {
        let mut engine = Engine::default();

        assert!(engine.add_filter("upper", crate::render::builtin::upper).is_err());
    }

    #[test]
    fn test_compile_error_names_template() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.html"), "{% if %}").unwrap();
        let engine = Engine::new(Settings::new().with_templates(dir.path()));

        let error = engine.render("broken.html", &Store::new()).unwrap_err();
        assert_eq!(error.get_name(), Some("broken.html"));
    }
}
