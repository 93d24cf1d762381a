//! Renders a [`Template`] against a [`Store`].
//!
//! The [`Renderer`] walks the abstract syntax tree of the `Template` and
//! writes the result through a [`Pipe`], resolving variables against a
//! [`Shadow`] so loop bindings and assignments never mutate the `Store`.
pub(crate) mod builtin;
mod compare;
mod spaceless;

use crate::{
    compile::{
        tree::{Binary, DebugTree, Expression, FilterCall, ForTree, FunctionCall, LoopVariables, Tree, Variable},
        Operator, Scope, Template,
    },
    engine::Engine,
    log::{error_write, Error, INCOMPATIBLE_TYPES, INVALID_FILTER, INVALID_FUNCTION, UNDEFINED_VALUE},
    pipe::Pipe,
    region::Region,
    store::{Shadow, Store},
};
use compare::{apply_operator, is_truthy};
use serde_json::{json, Value};
use std::{borrow::Cow, cell::RefCell, collections::BTreeSet, fmt::Write};

/// Render a [`Template`] with the given [`Store`].
///
/// Provides a shortcut to quickly render a `Template` without creating
/// an `Engine`.
///
/// # Examples
///
/// ```
/// use stencil::{compile, render, Store};
///
/// let template = compile("hello, {{ name }}!").unwrap();
/// let store = Store::new().with_must("name", "taylor");
///
/// assert_eq!(render(&template, &store).unwrap(), "hello, taylor!");
/// ```
pub fn render(template: &Template, store: &Store) -> Result<String, Error> {
    Engine::default().render_template(template, store)
}

/// Loop metadata for one active `for` block.
struct LoopFrame {
    /// Zero-based position of the current iteration.
    index: usize,
    /// Total number of iterations.
    length: usize,
}

/// Walks a [`Template`] and writes the rendered result.
pub(crate) struct Renderer<'source, 'store> {
    /// Provides registered filters, functions and settings.
    engine: &'source Engine,
    /// The [`Template`] being rendered.
    template: &'source Template,
    /// Contains the [`Store`] and shadowed variables.
    shadow: Shadow<'store>,
    /// Metadata for the `for` blocks that are currently rendering,
    /// innermost last.
    loops: Vec<LoopFrame>,
    /// Escaping behavior stack.
    ///
    /// The base entry is the engine default, and every `autoescape`
    /// block pushes an entry for the duration of its scope.
    autoescape: Vec<bool>,
    /// Names of the top-level variables resolved during the render.
    referenced: RefCell<BTreeSet<String>>,
}

impl<'source, 'store> Renderer<'source, 'store> {
    /// Create a new [`Renderer`].
    pub fn new(engine: &'source Engine, template: &'source Template, store: &'store Store) -> Self {
        Self {
            engine,
            template,
            shadow: Shadow::new(store),
            loops: Vec::new(),
            autoescape: vec![true],
            referenced: RefCell::new(BTreeSet::new()),
        }
    }

    /// Render the [`Template`] and return the result as a [`String`].
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when a variable cannot be resolved in strict
    /// mode, an expression is applied to incompatible types, or a filter
    /// or function call fails.
    pub fn render(&mut self) -> Result<String, Error> {
        let mut buffer = String::with_capacity(self.template.get_source().len());
        let mut pipe = Pipe::new(&mut buffer);

        let template = self.template;
        self.render_scope(&template.scope, &mut pipe)?;

        Ok(buffer)
    }

    /// Consume the [`Renderer`] and return the names of the top-level
    /// variables that were resolved.
    pub fn into_referenced(self) -> BTreeSet<String> {
        self.referenced.into_inner()
    }

    /// Render every [`Tree`] in the given [`Scope`].
    fn render_scope(&mut self, scope: &'source Scope, pipe: &mut Pipe) -> Result<(), Error> {
        let source = self.template.get_source();

        for tree in &scope.data {
            match tree {
                Tree::Raw(region) | Tree::Verbatim(region) => pipe
                    .write_str(region.literal(source))
                    .map_err(|_| error_write())?,
                Tree::Output(output) => {
                    let escape = output.escape
                        && *self
                            .autoescape
                            .last()
                            .expect("autoescape stack must never be empty");
                    let value = self.evaluate(&output.expression)?;
                    if escape {
                        pipe.write_escaped(&value).map_err(|_| error_write())?;
                    } else {
                        pipe.write_value(&value).map_err(|_| error_write())?;
                    }
                }
                Tree::If(tree) => {
                    let mut taken = false;
                    for branch in &tree.branches {
                        let condition = self.evaluate(&branch.condition)?;
                        if is_truthy(&condition) {
                            self.render_scope(&branch.scope, pipe)?;
                            taken = true;
                            break;
                        }
                    }
                    if !taken {
                        if let Some(scope) = &tree.else_branch {
                            self.render_scope(scope, pipe)?;
                        }
                    }
                }
                Tree::For(tree) => self.render_for(tree, pipe)?,
                Tree::Set(set) => {
                    let value = self.evaluate(&set.value)?.into_owned();
                    self.shadow
                        .insert(set.name.region.literal(source).to_owned(), value);
                }
                Tree::Debug(tree) => self.render_debug(tree, pipe)?,
                Tree::Spaceless(scope) => {
                    let mut raw = String::new();
                    let mut inner = Pipe::new(&mut raw);
                    self.render_scope(scope, &mut inner)?;
                    pipe.write_str(&spaceless::collapse(&raw))
                        .map_err(|_| error_write())?;
                }
                Tree::Autoescape(tree) => {
                    let mode = match &tree.mode {
                        Some(expression) => {
                            let value = self.evaluate(expression)?;
                            is_truthy(&value)
                        }
                        None => true,
                    };
                    self.autoescape.push(mode);
                    let result = self.render_scope(&tree.scope, pipe);
                    self.autoescape.pop();
                    result?;
                }
            }
        }

        Ok(())
    }

    /// Render a `for` block.
    ///
    /// Arrays iterate over members, objects over key/value pairs in key
    /// order, and strings over characters. Null iterates zero times, and
    /// an empty iterable renders the `else` branch when one exists.
    fn render_for(&mut self, tree: &'source ForTree, pipe: &mut Pipe) -> Result<(), Error> {
        let source = self.template.get_source();
        let value = self.evaluate(&tree.iterable)?.into_owned();

        let items: Vec<(Option<Value>, Value)> = match value {
            Value::Array(array) => array
                .into_iter()
                .enumerate()
                .map(|(index, item)| (Some(json!(index)), item))
                .collect(),
            Value::Object(object) => object
                .into_iter()
                .map(|(key, item)| (Some(Value::String(key)), item))
                .collect(),
            Value::String(string) => string
                .chars()
                .enumerate()
                .map(|(index, character)| (Some(json!(index)), json!(character.to_string())))
                .collect(),
            Value::Null => Vec::new(),
            unsupported => {
                return Err(Error::build(INCOMPATIBLE_TYPES)
                    .with_pointer(source, tree.iterable.get_region())
                    .with_help(format!(
                        "`{unsupported}` is not iterable, expected an array, object or string"
                    )))
            }
        };
        if items.is_empty() {
            if let Some(scope) = &tree.else_branch {
                self.render_scope(scope, pipe)?;
            }
            return Ok(());
        }

        let length = items.len();
        self.loops.push(LoopFrame { index: 0, length });
        for (index, (key, item)) in items.into_iter().enumerate() {
            self.loops
                .last_mut()
                .expect("loop frame was pushed above")
                .index = index;

            self.shadow.push();
            match &tree.variables {
                LoopVariables::Item(identifier) => {
                    self.shadow
                        .insert(identifier.region.literal(source).to_owned(), item);
                }
                LoopVariables::KeyValue(pair) => {
                    self.shadow.insert(
                        pair.key.region.literal(source).to_owned(),
                        key.unwrap_or(Value::Null),
                    );
                    self.shadow
                        .insert(pair.value.region.literal(source).to_owned(), item);
                }
            }
            let result = self.render_scope(&tree.scope, pipe);
            self.shadow.pop();
            result?;
        }
        self.loops.pop();

        Ok(())
    }

    /// Render a `debug` block.
    ///
    /// Writes the named value, or every visible variable when the block
    /// has no expression.
    fn render_debug(&self, tree: &DebugTree, pipe: &mut Pipe) -> Result<(), Error> {
        match &tree.expression {
            Some(expression) => {
                let name = expression.get_region().literal(self.template.get_source());
                let value = self.evaluate(expression)?;
                write!(pipe, "Debug: {name} = ").map_err(|_| error_write())?;
                pipe.write_debug(&value).map_err(|_| error_write())?;
            }
            None => {
                pipe.write_str("Debug: all variables")
                    .map_err(|_| error_write())?;
                for (key, value) in self.shadow.visible() {
                    write!(pipe, "\n{key} = ").map_err(|_| error_write())?;
                    pipe.write_debug(value).map_err(|_| error_write())?;
                }
            }
        }

        Ok(())
    }

    /// Evaluate an [`Expression`] and return the resulting [`Value`].
    fn evaluate<'a>(&'a self, expression: &'a Expression) -> Result<Cow<'a, Value>, Error> {
        match expression {
            Expression::Literal(literal) => Ok(Cow::Borrowed(&literal.value)),
            Expression::Variable(variable) => self.evaluate_variable(variable),
            Expression::Function(call) => self.evaluate_function(call),
            Expression::Filter(call) => self.evaluate_filter(call),
            Expression::Not(negate) => {
                let operand = self.evaluate(&negate.operand)?;
                Ok(Cow::Owned(Value::Bool(!is_truthy(&operand))))
            }
            Expression::Binary(binary) => self.evaluate_binary(binary),
            Expression::Group(group) => self.evaluate(&group.inner),
        }
    }

    /// Evaluate a [`Binary`] expression.
    ///
    /// The logical operators are short-circuited here, so the right side
    /// is never evaluated when the left side decides the result.
    fn evaluate_binary(&self, binary: &Binary) -> Result<Cow<'_, Value>, Error> {
        match binary.operator {
            Operator::And => {
                let left = self.evaluate(&binary.left)?;
                let value = if is_truthy(&left) {
                    let right = self.evaluate(&binary.right)?;
                    is_truthy(&right)
                } else {
                    false
                };
                Ok(Cow::Owned(Value::Bool(value)))
            }
            Operator::Or => {
                let left = self.evaluate(&binary.left)?;
                let value = if is_truthy(&left) {
                    true
                } else {
                    let right = self.evaluate(&binary.right)?;
                    is_truthy(&right)
                };
                Ok(Cow::Owned(Value::Bool(value)))
            }
            operator => {
                let left = self.evaluate(&binary.left)?;
                let right = self.evaluate(&binary.right)?;
                apply_operator(&left, operator, &right)
                    .map(Cow::Owned)
                    .map_err(|error| self.contextualize(error, binary.region))
            }
        }
    }

    /// Evaluate a [`Variable`] against the [`Shadow`].
    fn evaluate_variable(&self, variable: &Variable) -> Result<Cow<'_, Value>, Error> {
        let source = self.template.get_source();
        let first_key = variable
            .path
            .first()
            .expect("variable must have at least one key");
        let first = first_key.get_region().literal(source);

        if first == "loop" && !self.loops.is_empty() {
            return self.evaluate_loop(variable);
        }
        self.referenced.borrow_mut().insert(first.to_owned());

        let Some(mut value) = self.shadow.get(first) else {
            return self.undefined(first, first_key.get_region());
        };
        for key in &variable.path[1..] {
            let name = key.get_region().literal(source);
            match value.as_object().and_then(|object| object.get(name)) {
                Some(next) => value = next,
                None => return self.undefined(name, key.get_region()),
            }
        }

        Ok(Cow::Borrowed(value))
    }

    /// Evaluate a `loop` variable against the innermost [`LoopFrame`].
    fn evaluate_loop(&self, variable: &Variable) -> Result<Cow<'_, Value>, Error> {
        let source = self.template.get_source();
        let frame = self
            .loops
            .last()
            .expect("loop metadata must exist inside a for block");

        if variable.path.len() != 2 {
            return Err(Error::build(UNDEFINED_VALUE)
                .with_pointer(source, variable.get_region())
                .with_help(
                    "`loop` provides `index`, `index0`, `first`, `last`, `length` and `revindex`",
                ));
        }
        let key = variable.path[1].get_region();
        let value = match key.literal(source) {
            "index" => json!(frame.index + 1),
            "index0" => json!(frame.index),
            "first" => json!(frame.index == 0),
            "last" => json!(frame.index + 1 == frame.length),
            "length" => json!(frame.length),
            "revindex" => json!(frame.length - frame.index),
            unknown => {
                return Err(Error::build(UNDEFINED_VALUE)
                    .with_pointer(source, key)
                    .with_help(format!(
                        "`loop` has no `{unknown}`, it provides `index`, `index0`, \
                        `first`, `last`, `length` and `revindex`"
                    )))
            }
        };

        Ok(Cow::Owned(value))
    }

    /// Evaluate a [`FunctionCall`] against the engine registry.
    fn evaluate_function(&self, call: &FunctionCall) -> Result<Cow<'_, Value>, Error> {
        let source = self.template.get_source();
        let name = call.name.region.literal(source);
        let Some(function) = self.engine.get_function(name) else {
            return Err(Error::build(INVALID_FUNCTION)
                .with_pointer(source, call.name.region)
                .with_help(format!(
                    "function `{name}` is not registered, did you add it with `.add_function`?"
                )));
        };

        let mut arguments = Vec::with_capacity(call.arguments.len());
        for argument in &call.arguments {
            arguments.push(self.evaluate(argument)?.into_owned());
        }

        function
            .call(&arguments)
            .map(Cow::Owned)
            .map_err(|error| self.contextualize(error, call.name.region))
    }

    /// Evaluate a [`FilterCall`] against the engine registry.
    fn evaluate_filter(&self, call: &FilterCall) -> Result<Cow<'_, Value>, Error> {
        let source = self.template.get_source();
        let name = call.name.region.literal(source);
        let Some(filter) = self.engine.get_filter(name) else {
            return Err(Error::build(INVALID_FILTER)
                .with_pointer(source, call.name.region)
                .with_help(format!(
                    "filter `{name}` is not registered, did you add it with `.add_filter`?"
                )));
        };

        let receiver = self.evaluate(&call.receiver)?;
        let mut arguments = Vec::with_capacity(call.arguments.len());
        for argument in &call.arguments {
            arguments.push(self.evaluate(argument)?.into_owned());
        }

        filter
            .apply(&receiver, &arguments)
            .map(Cow::Owned)
            .map_err(|error| self.contextualize(error, call.name.region))
    }

    /// Handle an unresolved variable.
    ///
    /// Produces an [`Error`] in strict mode, and null otherwise.
    fn undefined(&self, name: &str, region: Region) -> Result<Cow<'_, Value>, Error> {
        if self.engine.get_settings().strict {
            Err(Error::build(UNDEFINED_VALUE)
                .with_pointer(self.template.get_source(), region)
                .with_help(format!(
                    "variable `{name}` is not defined, and strict mode is enabled"
                )))
        } else {
            Ok(Cow::Owned(Value::Null))
        }
    }

    /// Attach a [`Pointer`][`crate::log::Pointer`] over the given
    /// [`Region`] to the [`Error`], unless it already carries a visual
    /// of its own.
    fn contextualize(&self, error: Error, region: Region) -> Error {
        if error.has_visual() {
            error
        } else {
            error.with_pointer(self.template.get_source(), region)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::render;
    use crate::{
        engine::{Engine, Settings},
        log::Error,
        store::Store,
    };

    #[test]
    fn test_render_output_escaped() {
        let result = render_test("{{ name }}", &Store::new().with_must("name", "<b>hi</b>"));

        assert_eq!(result.unwrap(), "&lt;b&gt;hi&lt;/b&gt;");
    }

    #[test]
    fn test_render_raw_output() {
        let result = render_test("{! name !}", &Store::new().with_must("name", "<b>hi</b>"));

        assert_eq!(result.unwrap(), "<b>hi</b>");
    }

    #[test]
    fn test_render_literal_math() {
        let result = render_test("{{ 1 + 2 * 3 }}", &Store::new());

        assert_eq!(result.unwrap(), "7");
    }

    #[test]
    fn test_render_if_branches() {
        let source = "{% if first %}a{% elseif second %}b{% else %}c{% endif %}";
        let store = Store::new()
            .with_must("first", false)
            .with_must("second", true);

        assert_eq!(render_test(source, &store).unwrap(), "b");
        assert_eq!(render_test(source, &Store::new()).unwrap(), "c");
    }

    #[test]
    fn test_render_logic() {
        let store = Store::new().with_must("yes", true).with_must("no", false);

        assert_eq!(
            render_test("{{ yes and not no }}", &store).unwrap(),
            "true"
        );
        // Short-circuit means the undefined right side is never touched.
        assert_eq!(render_test("{{ yes or ghost }}", &store).unwrap(), "true");
    }

    #[test]
    fn test_render_for_array() {
        let source = "{% for item in items %}{{ loop.index }}:{{ item }} {% endfor %}";
        let store = Store::new().with_must("items", vec!["a", "b", "c"]);

        assert_eq!(render_test(source, &store).unwrap(), "1:a 2:b 3:c ");
    }

    #[test]
    fn test_render_for_metadata() {
        let source = "{% for item in items %}\
            {{ loop.first }},{{ loop.last }},{{ loop.revindex }};\
            {% endfor %}";
        let store = Store::new().with_must("items", vec![10, 20]);

        assert_eq!(
            render_test(source, &store).unwrap(),
            "true,false,2;false,true,1;"
        );
    }

    #[test]
    fn test_render_for_key_value() {
        let source = "{% for key, value in pairs %}{{ key }}={{ value }};{% endfor %}";
        let store = Store::new().with_must("pairs", serde_json::json!({"b": 2, "a": 1}));

        // Objects iterate in key order.
        assert_eq!(render_test(source, &store).unwrap(), "a=1;b=2;");
    }

    #[test]
    fn test_render_for_string() {
        let source = "{% for letter in word %}[{{ letter }}]{% endfor %}";
        let store = Store::new().with_must("word", "abc");

        assert_eq!(render_test(source, &store).unwrap(), "[a][b][c]");
    }

    #[test]
    fn test_render_for_else() {
        let source = "{% for item in items %}{{ item }}{% else %}empty{% endfor %}";
        let store = Store::new().with_must("items", Vec::<i64>::new());

        assert_eq!(render_test(source, &store).unwrap(), "empty");
    }

    #[test]
    fn test_render_for_null() {
        let source = "{% for item in missing %}{{ item }}{% endfor %}ok";

        assert_eq!(render_test(source, &Store::new()).unwrap(), "ok");
    }

    #[test]
    fn test_render_for_not_iterable() {
        let result = render_test(
            "{% for item in number %}{% endfor %}",
            &Store::new().with_must("number", 10),
        );

        assert!(result.is_err());
    }

    #[test]
    fn test_render_set() {
        let source = "{% set greeting = \"hello, \" + name %}{{ greeting }}";
        let store = Store::new().with_must("name", "taylor");

        assert_eq!(render_test(source, &store).unwrap(), "hello, taylor");
    }

    #[test]
    fn test_render_set_scoped_to_loop() {
        let source = "{% for item in items %}{% set inner = item %}{% endfor %}{{ inner }}";
        let store = Store::new().with_must("items", vec![1]);

        // The loop frame is popped, so the assignment is gone.
        assert_eq!(render_test(source, &store).unwrap(), "");
    }

    #[test]
    fn test_render_nested_path() {
        let source = "{{ person.name }} is {{ person.age }}";
        let store = Store::new().with_must("person", serde_json::json!({"name": "taylor", "age": 28}));

        assert_eq!(render_test(source, &store).unwrap(), "taylor is 28");
    }

    #[test]
    fn test_render_lenient_undefined() {
        assert_eq!(render_test("[{{ ghost }}]", &Store::new()).unwrap(), "[]");
    }

    #[test]
    fn test_render_strict_undefined() {
        let engine = Engine::new(Settings::new().with_strict(true));
        let result = engine.render_template(
            &engine.compile("{{ ghost }}").unwrap(),
            &Store::new(),
        );

        assert!(result.is_err());
    }

    #[test]
    fn test_render_builtin_filters() {
        let store = Store::new().with_must("names", vec!["ana", "bo"]);

        assert_eq!(
            render_test("{{ names | join(\", \") | upper }}", &store).unwrap(),
            "ANA, BO"
        );
    }

    #[test]
    fn test_render_spaceless() {
        let source = "{% spaceless %}<div>\n  <b>{{ name }}</b>\n</div>{% endspaceless %}";
        let store = Store::new().with_must("name", "x");

        assert_eq!(render_test(source, &store).unwrap(), "<div><b>x</b></div>");
    }

    #[test]
    fn test_render_verbatim() {
        let source = "{% verbatim %}{{ not evaluated }}{% endverbatim %}";

        assert_eq!(
            render_test(source, &Store::new()).unwrap(),
            "{{ not evaluated }}"
        );
    }

    #[test]
    fn test_render_autoescape() {
        let store = Store::new().with_must("name", "<b>");
        let source = "{% autoescape false %}{{ name }}{% endautoescape %}{{ name }}";

        assert_eq!(render_test(source, &store).unwrap(), "<b>&lt;b&gt;");
    }

    #[test]
    fn test_render_autoescape_expression() {
        let store = Store::new()
            .with_must("name", "<b>")
            .with_must("enabled", false);
        let source = "{% autoescape enabled %}{{ name }}{% endautoescape %}";

        assert_eq!(render_test(source, &store).unwrap(), "<b>");
    }

    #[test]
    fn test_render_debug_value() {
        let store = Store::new().with_must("person", serde_json::json!({"name": "taylor"}));

        assert_eq!(
            render_test("{% debug person %}", &store).unwrap(),
            "Debug: person = {name: taylor}"
        );
    }

    #[test]
    fn test_render_debug_all() {
        let store = Store::new().with_must("one", 1);

        assert_eq!(
            render_test("{% debug %}", &store).unwrap(),
            "Debug: all variables\none = 1"
        );
    }

    /// Compile and render the source with a default Engine.
    fn render_test(source: &str, store: &Store) -> Result<String, Error> {
        let engine = Engine::default();
        let template = engine.compile(source)?;
        engine.render_template(&template, store)
    }

    #[test]
    fn test_render_shortcut() {
        let template = crate::compile("{{ 1 + 1 }}").unwrap();

        assert_eq!(render(&template, &Store::new()).unwrap(), "2");
    }
}
