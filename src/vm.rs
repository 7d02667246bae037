use crate::draft::Draft;
use crate::paths::{Path, Trail};
use crate::schema::{Graph, Keyword, Node, NodeId, ResourceId};
use crate::validator::{TypeKind, ValidationError, ValidationErrorKind};
use crate::value;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{HashSet, VecDeque};
use std::iter::FusedIterator;
use std::sync::Arc;

/// Is `instance` valid against the whole graph?
pub(crate) fn is_valid(graph: &Graph, instance: &Value) -> bool {
    holds(graph, Frame::root(graph.root, instance))
}

/// A lazy, single-consumer sequence of validation errors.
///
/// Errors come out in traversal order: the violations of a subschema's own
/// keywords first, in keyword order, then those found while descending into
/// its children. The iterator keeps the compiled schema alive on its own, so
/// it may outlive the [`Schema`](crate::Schema) it came from.
pub struct ErrorIter<'i> {
    graph: Arc<Graph>,
    vm: Vm<'i, Trail>,
}

impl<'i> ErrorIter<'i> {
    pub(crate) fn new(graph: Arc<Graph>, instance: &'i Value) -> ErrorIter<'i> {
        let mut vm: Vm<'i, Trail> = Vm::new();
        vm.stack.push(Frame::root(graph.root, instance));
        ErrorIter { graph, vm }
    }
}

impl<'i> Iterator for ErrorIter<'i> {
    type Item = ValidationError;

    fn next(&mut self) -> Option<ValidationError> {
        self.vm.next_err(&self.graph)
    }
}

impl<'i> FusedIterator for ErrorIter<'i> {}

/// How much of the traversal is recorded.
///
/// `()` records nothing and is used wherever only a yes/no answer is needed;
/// `Trail` records instance and schema paths for error reports.
pub(crate) trait Track: Clone + Default {
    const DETAILED: bool;

    fn keyword(&self, keyword: &'static str) -> Self;
    fn key(&self, key: &str) -> Self;
    fn index(&self, index: usize) -> Self;
    fn to_path(&self) -> Path;
}

impl Track for () {
    const DETAILED: bool = false;

    fn keyword(&self, _: &'static str) -> Self {}
    fn key(&self, _: &str) -> Self {}
    fn index(&self, _: usize) -> Self {}
    fn to_path(&self) -> Path {
        Path::default()
    }
}

impl Track for Trail {
    const DETAILED: bool = true;

    fn keyword(&self, keyword: &'static str) -> Self {
        self.push(keyword)
    }

    fn key(&self, key: &str) -> Self {
        self.push(key.to_owned())
    }

    fn index(&self, index: usize) -> Self {
        self.push(index)
    }

    fn to_path(&self) -> Path {
        Trail::to_path(self)
    }
}

/// The dynamic scope: schema resources entered so far, innermost first.
#[derive(Clone, Default)]
struct Scope(Option<Arc<ScopeLink>>);

struct ScopeLink {
    resource: ResourceId,
    parent: Scope,
}

impl Scope {
    fn enter(&self, resource: ResourceId) -> Scope {
        match &self.0 {
            Some(link) if link.resource == resource => self.clone(),
            _ => Scope(Some(Arc::new(ScopeLink {
                resource,
                parent: self.clone(),
            }))),
        }
    }

    fn outermost_first(&self) -> Vec<ResourceId> {
        let mut resources = Vec::new();
        let mut current = &self.0;
        while let Some(link) = current {
            resources.push(link.resource);
            current = &link.parent.0;
        }
        resources.reverse();
        resources
    }
}

/// What a frame evaluates: a location in the instance, or one of an
/// object's property names under `propertyNames`.
#[derive(Clone)]
enum Instance<'i> {
    Tree(&'i Value),
    Name(Arc<Value>),
}

static NO_MEMBERS: Value = Value::Null;

impl<'i> Instance<'i> {
    fn value(&self) -> &Value {
        match self {
            Instance::Tree(value) => value,
            Instance::Name(name) => name,
        }
    }

    /// The value as a node of the instance tree. Names have no members and
    /// stand in as `null` for keywords that descend.
    fn tree(&self) -> &'i Value {
        match self {
            Instance::Tree(value) => *value,
            Instance::Name(_) => &NO_MEMBERS,
        }
    }
}

#[derive(Clone)]
struct Frame<'i, T> {
    node: NodeId,
    instance: Instance<'i>,
    instance_path: T,
    schema_path: T,
    scope: Scope,
    /// References followed since the instance was last descended into.
    hops: usize,
}

impl<'i, T: Track> Frame<'i, T> {
    fn root(node: NodeId, instance: &'i Value) -> Frame<'i, T> {
        Frame {
            node,
            instance: Instance::Tree(instance),
            instance_path: T::default(),
            schema_path: T::default(),
            scope: Scope::default(),
            hops: 0,
        }
    }

    fn quiet(self) -> Frame<'i, ()> {
        Frame {
            node: self.node,
            instance: self.instance,
            instance_path: (),
            schema_path: (),
            scope: self.scope,
            hops: self.hops,
        }
    }

    /// `node` applied to this frame's instance, for its outcome only.
    fn in_place(&self, node: NodeId, scope: &Scope) -> Frame<'i, ()> {
        Frame {
            node,
            instance: self.instance.clone(),
            instance_path: (),
            schema_path: (),
            scope: scope.clone(),
            hops: self.hops,
        }
    }
}

/// `node` applied to an item or property value, for its outcome only.
fn member<'i>(node: NodeId, value: &'i Value, scope: &Scope) -> Frame<'i, ()> {
    Frame {
        node,
        instance: Instance::Tree(value),
        instance_path: (),
        schema_path: (),
        scope: scope.clone(),
        hops: 0,
    }
}

/// A condition a node's outcome depends on, when only outcomes matter.
///
/// Frame lists are stored last first, so the next one to start is popped
/// off the end.
enum Check<'i> {
    Node(Frame<'i, ()>),
    Not(Frame<'i, ()>),
    AnyOf(Vec<Frame<'i, ()>>),
    OneOf(Vec<Frame<'i, ()>>),
    IfThenElse {
        condition: Frame<'i, ()>,
        then: Option<Frame<'i, ()>>,
        otherwise: Option<Frame<'i, ()>>,
    },
    Contains {
        items: Vec<Frame<'i, ()>>,
        min: u64,
        max: Option<u64>,
    },
    /// `unevaluatedProperties` or `unevaluatedItems` of `owner`'s node,
    /// with `node` as its subschema.
    Unevaluated {
        owner: Frame<'i, ()>,
        node: NodeId,
    },
}

/// Pending work of the outcome machine. Tasks after `Eval` and `Walk` pop
/// the outcome of the evaluation pushed right above them.
enum Task<'i> {
    Eval(Frame<'i, ()>),
    All(Vec<Check<'i>>),
    AnyOf(Vec<Frame<'i, ()>>),
    OneOf {
        rest: Vec<Frame<'i, ()>>,
        valid: bool,
    },
    Not,
    Branch {
        then: Option<Frame<'i, ()>>,
        otherwise: Option<Frame<'i, ()>>,
    },
    Count {
        rest: Vec<Frame<'i, ()>>,
        matched: u64,
        min: u64,
        max: Option<u64>,
    },
    /// Collect what a node evaluates into the innermost annotation set.
    Walk {
        frame: Frame<'i, ()>,
        own: bool,
    },
    /// Walk an `anyOf` or `oneOf` branch if it held.
    WalkIf(Frame<'i, ()>),
    WalkBranch {
        condition: Frame<'i, ()>,
        then: Option<Frame<'i, ()>>,
        otherwise: Option<Frame<'i, ()>>,
    },
    /// Mark an item `contains` matched.
    Mark(usize),
    /// Check what nobody evaluated against an `unevaluated*` subschema.
    Settle {
        owner: Frame<'i, ()>,
        node: NodeId,
    },
}

/// Members of one object or array that some subschema evaluated.
#[derive(Default)]
struct Annotations {
    all: bool,
    prefix: usize,
    names: HashSet<String>,
    indices: HashSet<usize>,
}

impl Annotations {
    fn has_property(&self, name: &str) -> bool {
        self.all || self.names.contains(name)
    }

    fn has_item(&self, index: usize) -> bool {
        self.all || index < self.prefix || self.indices.contains(&index)
    }
}

/// The executor.
///
/// With `Trail` tracking, frames on `stack` report every violation to
/// `errors`, and the outcome of a predicate such as `not` or `anyOf` is
/// decided by a separate `()` machine. With `()` tracking, evaluation runs
/// on `tasks` and leaves a single outcome behind. Neither recurses on the
/// native stack, however deep the schema or instance.
struct Vm<'i, T> {
    stack: Vec<Frame<'i, T>>,
    errors: VecDeque<ValidationError>,
    tasks: Vec<Task<'i>>,
    outcomes: Vec<bool>,
    annotations: Vec<Annotations>,
    failed: bool,
}

impl<'i, T: Track> Vm<'i, T> {
    fn new() -> Vm<'i, T> {
        Vm {
            stack: Vec::new(),
            errors: VecDeque::new(),
            tasks: Vec::new(),
            outcomes: Vec::new(),
            annotations: Vec::new(),
            failed: false,
        }
    }

    fn next_err(&mut self, graph: &Graph) -> Option<ValidationError> {
        loop {
            if let Some(error) = self.errors.pop_front() {
                return Some(error);
            }
            let frame = self.stack.pop()?;
            self.eval(graph, frame);
        }
    }

    /// Check the assertions of one node and schedule its subschemas.
    ///
    /// Reported children are pushed in reverse so they are evaluated in
    /// keyword order, depth first. Without reporting, the node's outcome is
    /// the conjunction of its checks, which stops at the first failure.
    fn eval(&mut self, graph: &Graph, frame: Frame<'i, T>) {
        let (keywords, resource) = match &graph.nodes[frame.node] {
            Node::Bool(true) => return self.outcome(true),
            Node::Bool(false) => {
                let schema_path = frame.schema_path.clone();
                self.push_err(&frame, schema_path, || ValidationErrorKind::FalseSchema);
                return self.outcome(false);
            }
            Node::Keywords { keywords, resource } => (keywords, *resource),
        };

        let scope = frame.scope.enter(resource);
        let mut children = Vec::new();
        let mut checks = Vec::new();
        self.failed = false;
        for keyword in keywords {
            self.apply(graph, &frame, &scope, keyword, &mut children, &mut checks);
            if self.failed && !T::DETAILED {
                return self.outcome(false);
            }
        }

        if T::DETAILED {
            self.stack.extend(children.into_iter().rev());
        } else {
            checks.extend(children.into_iter().map(|child| Check::Node(child.quiet())));
            checks.reverse();
            self.all(checks);
        }
    }

    fn apply(
        &mut self,
        graph: &Graph,
        frame: &Frame<'i, T>,
        scope: &Scope,
        keyword: &Keyword,
        children: &mut Vec<Frame<'i, T>>,
        checks: &mut Vec<Check<'i>>,
    ) {
        let instance = frame.instance.value();
        let tree = frame.instance.tree();
        match keyword {
            Keyword::Type {
                types,
                integral_floats,
            } => {
                if !types
                    .iter()
                    .any(|json_type| json_type.matches(instance, *integral_floats))
                {
                    self.push_err(frame, frame.schema_path.keyword("type"), || {
                        ValidationErrorKind::Type {
                            kind: match types.as_slice() {
                                [single] => TypeKind::Single(*single),
                                _ => TypeKind::Multiple(types.clone()),
                            },
                        }
                    });
                }
            }
            Keyword::Enum(options) => {
                let matched = options
                    .as_array()
                    .map_or(false, |options| options.iter().any(|o| value::equal(o, instance)));
                if !matched {
                    self.push_err(frame, frame.schema_path.keyword("enum"), || {
                        ValidationErrorKind::Enum {
                            options: options.clone(),
                        }
                    });
                }
            }
            Keyword::Const(expected) => {
                if !value::equal(expected, instance) {
                    self.push_err(frame, frame.schema_path.keyword("const"), || {
                        ValidationErrorKind::Constant {
                            expected_value: expected.clone(),
                        }
                    });
                }
            }
            Keyword::Minimum { limit, exclusive } => {
                if let Value::Number(number) = instance {
                    let ordering = value::compare(number, limit);
                    let bound = || Value::Number(limit.clone());
                    if *exclusive && ordering != Ordering::Greater {
                        self.push_err(frame, frame.schema_path.keyword("minimum"), || {
                            ValidationErrorKind::ExclusiveMinimum { limit: bound() }
                        });
                    } else if ordering == Ordering::Less {
                        self.push_err(frame, frame.schema_path.keyword("minimum"), || {
                            ValidationErrorKind::Minimum { limit: bound() }
                        });
                    }
                }
            }
            Keyword::Maximum { limit, exclusive } => {
                if let Value::Number(number) = instance {
                    let ordering = value::compare(number, limit);
                    let bound = || Value::Number(limit.clone());
                    if *exclusive && ordering != Ordering::Less {
                        self.push_err(frame, frame.schema_path.keyword("maximum"), || {
                            ValidationErrorKind::ExclusiveMaximum { limit: bound() }
                        });
                    } else if ordering == Ordering::Greater {
                        self.push_err(frame, frame.schema_path.keyword("maximum"), || {
                            ValidationErrorKind::Maximum { limit: bound() }
                        });
                    }
                }
            }
            Keyword::ExclusiveMinimum(limit) => {
                if let Value::Number(number) = instance {
                    if value::compare(number, limit) != Ordering::Greater {
                        self.push_err(frame, frame.schema_path.keyword("exclusiveMinimum"), || {
                            ValidationErrorKind::ExclusiveMinimum {
                                limit: Value::Number(limit.clone()),
                            }
                        });
                    }
                }
            }
            Keyword::ExclusiveMaximum(limit) => {
                if let Value::Number(number) = instance {
                    if value::compare(number, limit) != Ordering::Less {
                        self.push_err(frame, frame.schema_path.keyword("exclusiveMaximum"), || {
                            ValidationErrorKind::ExclusiveMaximum {
                                limit: Value::Number(limit.clone()),
                            }
                        });
                    }
                }
            }
            Keyword::MultipleOf(divisor) => {
                if let Value::Number(number) = instance {
                    if !value::is_multiple_of(number, divisor) {
                        self.push_err(frame, frame.schema_path.keyword("multipleOf"), || {
                            ValidationErrorKind::MultipleOf {
                                multiple_of: Value::Number(divisor.clone()),
                            }
                        });
                    }
                }
            }
            Keyword::MinLength(limit) => {
                if let Value::String(s) = instance {
                    if (s.chars().count() as u64) < *limit {
                        self.push_err(frame, frame.schema_path.keyword("minLength"), || {
                            ValidationErrorKind::MinLength { limit: *limit }
                        });
                    }
                }
            }
            Keyword::MaxLength(limit) => {
                if let Value::String(s) = instance {
                    if (s.chars().count() as u64) > *limit {
                        self.push_err(frame, frame.schema_path.keyword("maxLength"), || {
                            ValidationErrorKind::MaxLength { limit: *limit }
                        });
                    }
                }
            }
            Keyword::Pattern(regex) => {
                if let Value::String(s) = instance {
                    if !regex.is_match(s) {
                        self.push_err(frame, frame.schema_path.keyword("pattern"), || {
                            ValidationErrorKind::Pattern {
                                pattern: regex.as_str().to_owned(),
                            }
                        });
                    }
                }
            }
            Keyword::Format { name, check } => {
                if let Value::String(s) = instance {
                    if !check.holds(s) {
                        self.push_err(frame, frame.schema_path.keyword("format"), || {
                            ValidationErrorKind::Format {
                                format: name.clone(),
                            }
                        });
                    }
                }
            }

            Keyword::MinItems(limit) => {
                if let Value::Array(items) = instance {
                    if (items.len() as u64) < *limit {
                        self.push_err(frame, frame.schema_path.keyword("minItems"), || {
                            ValidationErrorKind::MinItems { limit: *limit }
                        });
                    }
                }
            }
            Keyword::MaxItems(limit) => {
                if let Value::Array(items) = instance {
                    if (items.len() as u64) > *limit {
                        self.push_err(frame, frame.schema_path.keyword("maxItems"), || {
                            ValidationErrorKind::MaxItems { limit: *limit }
                        });
                    }
                }
            }
            Keyword::UniqueItems => {
                if let Value::Array(items) = instance {
                    let duplicated = items.iter().enumerate().any(|(i, a)| {
                        items[i + 1..].iter().any(|b| value::equal(a, b))
                    });
                    if duplicated {
                        self.push_err(frame, frame.schema_path.keyword("uniqueItems"), || {
                            ValidationErrorKind::UniqueItems
                        });
                    }
                }
            }
            Keyword::Contains { node, min, max } => {
                if let Value::Array(items) = tree {
                    let mut targets = items
                        .iter()
                        .map(|item| member(*node, item, scope))
                        .collect::<Vec<_>>();
                    if !T::DETAILED {
                        targets.reverse();
                        checks.push(Check::Contains {
                            items: targets,
                            min: *min,
                            max: *max,
                        });
                        return;
                    }
                    let matched = targets
                        .into_iter()
                        .map(|target| holds(graph, target))
                        .filter(|held| *held)
                        .count() as u64;
                    if matched < *min {
                        if matched == 0 && *min == 1 {
                            self.push_err(frame, frame.schema_path.keyword("contains"), || {
                                ValidationErrorKind::Contains
                            });
                        } else {
                            self.push_err(frame, frame.schema_path.keyword("minContains"), || {
                                ValidationErrorKind::MinContains { limit: *min }
                            });
                        }
                    }
                    if let Some(max) = max {
                        if matched > *max {
                            self.push_err(frame, frame.schema_path.keyword("maxContains"), || {
                                ValidationErrorKind::MaxContains { limit: *max }
                            });
                        }
                    }
                }
            }
            Keyword::Items(node) => {
                if let Value::Array(items) = tree {
                    let schema_path = frame.schema_path.keyword("items");
                    for (index, item) in items.iter().enumerate() {
                        children.push(Frame {
                            node: *node,
                            instance: Instance::Tree(item),
                            instance_path: frame.instance_path.index(index),
                            schema_path: schema_path.clone(),
                            scope: scope.clone(),
                            hops: 0,
                        });
                    }
                }
            }
            Keyword::Prefix { keyword, nodes } => {
                if let Value::Array(items) = tree {
                    let schema_path = frame.schema_path.keyword(*keyword);
                    for (index, (item, node)) in items.iter().zip(nodes).enumerate() {
                        children.push(Frame {
                            node: *node,
                            instance: Instance::Tree(item),
                            instance_path: frame.instance_path.index(index),
                            schema_path: schema_path.index(index),
                            scope: scope.clone(),
                            hops: 0,
                        });
                    }
                }
            }
            Keyword::ItemsAfter {
                keyword,
                node,
                skip,
            } => {
                if let Value::Array(items) = tree {
                    if items.len() <= *skip {
                        return;
                    }
                    let schema_path = frame.schema_path.keyword(*keyword);
                    if is_false(graph, *node) {
                        self.push_err(frame, schema_path, || ValidationErrorKind::AdditionalItems {
                            limit: *skip,
                        });
                        return;
                    }
                    for (index, item) in items.iter().enumerate().skip(*skip) {
                        children.push(Frame {
                            node: *node,
                            instance: Instance::Tree(item),
                            instance_path: frame.instance_path.index(index),
                            schema_path: schema_path.clone(),
                            scope: scope.clone(),
                            hops: 0,
                        });
                    }
                }
            }

            Keyword::MinProperties(limit) => {
                if let Value::Object(object) = instance {
                    if (object.len() as u64) < *limit {
                        self.push_err(frame, frame.schema_path.keyword("minProperties"), || {
                            ValidationErrorKind::MinProperties { limit: *limit }
                        });
                    }
                }
            }
            Keyword::MaxProperties(limit) => {
                if let Value::Object(object) = instance {
                    if (object.len() as u64) > *limit {
                        self.push_err(frame, frame.schema_path.keyword("maxProperties"), || {
                            ValidationErrorKind::MaxProperties { limit: *limit }
                        });
                    }
                }
            }
            Keyword::Required(names) => {
                if let Value::Object(object) = instance {
                    self.require(frame, object, names, frame.schema_path.keyword("required"));
                }
            }
            Keyword::Properties(entries) => {
                if let Value::Object(object) = tree {
                    let schema_path = frame.schema_path.keyword("properties");
                    for (name, node) in entries {
                        if let Some(property) = object.get(name) {
                            children.push(Frame {
                                node: *node,
                                instance: Instance::Tree(property),
                                instance_path: frame.instance_path.key(name),
                                schema_path: schema_path.key(name),
                                scope: scope.clone(),
                                hops: 0,
                            });
                        }
                    }
                }
            }
            Keyword::PatternProperties(entries) => {
                if let Value::Object(object) = tree {
                    let schema_path = frame.schema_path.keyword("patternProperties");
                    for (regex, node) in entries {
                        for (name, property) in object {
                            if regex.is_match(name) {
                                children.push(Frame {
                                    node: *node,
                                    instance: Instance::Tree(property),
                                    instance_path: frame.instance_path.key(name),
                                    schema_path: schema_path.key(regex.as_str()),
                                    scope: scope.clone(),
                                    hops: 0,
                                });
                            }
                        }
                    }
                }
            }
            Keyword::AdditionalProperties {
                node,
                properties,
                patterns,
            } => {
                if let Value::Object(object) = tree {
                    let extras = object.iter().filter(|(name, _)| {
                        !properties.contains(name) && !patterns.iter().any(|p| p.is_match(name))
                    });
                    let schema_path = frame.schema_path.keyword("additionalProperties");
                    if is_false(graph, *node) {
                        let unexpected = extras.map(|(name, _)| name.clone()).collect::<Vec<_>>();
                        if !unexpected.is_empty() {
                            self.push_err(frame, schema_path, || {
                                ValidationErrorKind::AdditionalProperties { unexpected }
                            });
                        }
                        return;
                    }
                    for (name, property) in extras {
                        children.push(Frame {
                            node: *node,
                            instance: Instance::Tree(property),
                            instance_path: frame.instance_path.key(name),
                            schema_path: schema_path.clone(),
                            scope: scope.clone(),
                            hops: 0,
                        });
                    }
                }
            }
            Keyword::PropertyNames(node) => {
                if let Value::Object(object) = tree {
                    // Names are not part of the instance tree; violations are
                    // reported at the object itself.
                    let schema_path = frame.schema_path.keyword("propertyNames");
                    for name in object.keys() {
                        children.push(Frame {
                            node: *node,
                            instance: Instance::Name(Arc::new(Value::String(name.clone()))),
                            instance_path: frame.instance_path.clone(),
                            schema_path: schema_path.clone(),
                            scope: scope.clone(),
                            hops: 0,
                        });
                    }
                }
            }
            Keyword::DependentRequired { keyword, entries } => {
                if let Value::Object(object) = instance {
                    let schema_path = frame.schema_path.keyword(*keyword);
                    for (property, names) in entries {
                        if object.contains_key(property) {
                            self.require(frame, object, names, schema_path.key(property));
                        }
                    }
                }
            }
            Keyword::DependentSchemas { keyword, entries } => {
                if let Value::Object(object) = tree {
                    let schema_path = frame.schema_path.keyword(*keyword);
                    for (property, node) in entries {
                        if object.contains_key(property) {
                            children.push(Frame {
                                node: *node,
                                instance: frame.instance.clone(),
                                instance_path: frame.instance_path.clone(),
                                schema_path: schema_path.key(property),
                                scope: scope.clone(),
                                hops: frame.hops,
                            });
                        }
                    }
                }
            }

            Keyword::AllOf(nodes) => {
                let schema_path = frame.schema_path.keyword("allOf");
                for (index, node) in nodes.iter().enumerate() {
                    children.push(Frame {
                        node: *node,
                        instance: frame.instance.clone(),
                        instance_path: frame.instance_path.clone(),
                        schema_path: schema_path.index(index),
                        scope: scope.clone(),
                        hops: frame.hops,
                    });
                }
            }
            Keyword::AnyOf(nodes) => {
                let mut targets = nodes
                    .iter()
                    .map(|node| frame.in_place(*node, scope))
                    .collect::<Vec<_>>();
                if !T::DETAILED {
                    targets.reverse();
                    checks.push(Check::AnyOf(targets));
                } else if !targets.into_iter().any(|target| holds(graph, target)) {
                    self.push_err(frame, frame.schema_path.keyword("anyOf"), || {
                        ValidationErrorKind::AnyOf
                    });
                }
            }
            Keyword::OneOf(nodes) => {
                let mut targets = nodes
                    .iter()
                    .map(|node| frame.in_place(*node, scope))
                    .collect::<Vec<_>>();
                if !T::DETAILED {
                    targets.reverse();
                    checks.push(Check::OneOf(targets));
                    return;
                }
                let mut valid = targets
                    .into_iter()
                    .map(|target| holds(graph, target))
                    .filter(|held| *held);
                match (valid.next(), valid.next()) {
                    (Some(_), None) => {}
                    (None, _) => self.push_err(frame, frame.schema_path.keyword("oneOf"), || {
                        ValidationErrorKind::OneOfNotValid
                    }),
                    (Some(_), Some(_)) => {
                        self.push_err(frame, frame.schema_path.keyword("oneOf"), || {
                            ValidationErrorKind::OneOfMultipleValid
                        })
                    }
                }
            }
            Keyword::Not { node, schema } => {
                let target = frame.in_place(*node, scope);
                if !T::DETAILED {
                    checks.push(Check::Not(target));
                } else if holds(graph, target) {
                    self.push_err(frame, frame.schema_path.keyword("not"), || {
                        ValidationErrorKind::Not {
                            schema: schema.clone(),
                        }
                    });
                }
            }
            Keyword::IfThenElse {
                condition,
                then,
                otherwise,
            } => {
                if !T::DETAILED {
                    checks.push(Check::IfThenElse {
                        condition: frame.in_place(*condition, scope),
                        then: then.map(|node| frame.in_place(node, scope)),
                        otherwise: otherwise.map(|node| frame.in_place(node, scope)),
                    });
                    return;
                }
                let (branch, keyword) = if holds(graph, frame.in_place(*condition, scope)) {
                    (then, "then")
                } else {
                    (otherwise, "else")
                };
                if let Some(node) = branch {
                    children.push(Frame {
                        node: *node,
                        instance: frame.instance.clone(),
                        instance_path: frame.instance_path.clone(),
                        schema_path: frame.schema_path.keyword(keyword),
                        scope: scope.clone(),
                        hops: frame.hops,
                    });
                }
            }

            Keyword::Ref(node) => self.follow(graph, frame, scope, *node, "$ref", children),
            Keyword::RecursiveRef { .. } | Keyword::DynamicRef { .. } => {
                let (target, name) = dynamic_target(graph, keyword, scope);
                self.follow(graph, frame, scope, target, name, children);
            }

            Keyword::UnevaluatedProperties(node) => {
                if let Value::Object(object) = tree {
                    let owner = frame.in_place(frame.node, scope);
                    if !T::DETAILED {
                        checks.push(Check::Unevaluated { owner, node: *node });
                        return;
                    }
                    let evaluated = annotations(graph, owner);
                    let extras = object
                        .iter()
                        .filter(|(name, _)| !evaluated.has_property(name));
                    let schema_path = frame.schema_path.keyword("unevaluatedProperties");
                    if is_false(graph, *node) {
                        let unexpected = extras.map(|(name, _)| name.clone()).collect::<Vec<_>>();
                        if !unexpected.is_empty() {
                            self.push_err(frame, schema_path, || {
                                ValidationErrorKind::UnevaluatedProperties { unexpected }
                            });
                        }
                        return;
                    }
                    for (name, property) in extras {
                        children.push(Frame {
                            node: *node,
                            instance: Instance::Tree(property),
                            instance_path: frame.instance_path.key(name),
                            schema_path: schema_path.clone(),
                            scope: scope.clone(),
                            hops: 0,
                        });
                    }
                }
            }
            Keyword::UnevaluatedItems(node) => {
                if let Value::Array(items) = tree {
                    let owner = frame.in_place(frame.node, scope);
                    if !T::DETAILED {
                        checks.push(Check::Unevaluated { owner, node: *node });
                        return;
                    }
                    let evaluated = annotations(graph, owner);
                    let extras = items
                        .iter()
                        .enumerate()
                        .filter(|(index, _)| !evaluated.has_item(*index));
                    let schema_path = frame.schema_path.keyword("unevaluatedItems");
                    if is_false(graph, *node) {
                        let unexpected = extras.map(|(_, item)| item.to_string()).collect::<Vec<_>>();
                        if !unexpected.is_empty() {
                            self.push_err(frame, schema_path, || {
                                ValidationErrorKind::UnevaluatedItems { unexpected }
                            });
                        }
                        return;
                    }
                    for (index, item) in extras {
                        children.push(Frame {
                            node: *node,
                            instance: Instance::Tree(item),
                            instance_path: frame.instance_path.index(index),
                            schema_path: schema_path.clone(),
                            scope: scope.clone(),
                            hops: 0,
                        });
                    }
                }
            }
        }
    }

    fn follow(
        &mut self,
        graph: &Graph,
        frame: &Frame<'i, T>,
        scope: &Scope,
        target: NodeId,
        keyword: &'static str,
        children: &mut Vec<Frame<'i, T>>,
    ) {
        let schema_path = frame.schema_path.keyword(keyword);
        if frame.hops >= graph.max_depth {
            self.push_err(frame, schema_path, || ValidationErrorKind::MaxDepthExceeded {
                limit: graph.max_depth,
            });
            return;
        }
        children.push(Frame {
            node: target,
            instance: frame.instance.clone(),
            instance_path: frame.instance_path.clone(),
            schema_path,
            scope: scope.clone(),
            hops: frame.hops + 1,
        });
    }

    fn require(
        &mut self,
        frame: &Frame<'i, T>,
        object: &Map<String, Value>,
        names: &[String],
        schema_path: T,
    ) {
        for name in names {
            if !object.contains_key(name) {
                self.push_err(frame, schema_path.clone(), || ValidationErrorKind::Required {
                    property: Value::String(name.clone()),
                });
                if !T::DETAILED {
                    return;
                }
            }
        }
    }

    fn push_err<K>(&mut self, frame: &Frame<'i, T>, schema_path: T, kind: K)
    where
        K: FnOnce() -> ValidationErrorKind,
    {
        self.failed = true;
        if T::DETAILED {
            self.errors.push_back(ValidationError::new(
                frame.instance.value().clone(),
                kind(),
                frame.instance_path.to_path(),
                schema_path.to_path(),
            ));
        }
    }

    fn outcome(&mut self, held: bool) {
        if !T::DETAILED {
            self.outcomes.push(held);
        }
    }

    fn pop_outcome(&mut self) -> bool {
        self.outcomes
            .pop()
            .expect("unreachable: every evaluation leaves an outcome")
    }

    fn all(&mut self, mut rest: Vec<Check<'i>>) {
        match rest.pop() {
            Some(check) => {
                self.tasks.push(Task::All(rest));
                self.start(check);
            }
            None => self.outcome(true),
        }
    }

    /// Schedule `check`, which leaves one outcome once its tasks are done.
    fn start(&mut self, check: Check<'i>) {
        match check {
            Check::Node(frame) => self.tasks.push(Task::Eval(frame)),
            Check::Not(frame) => {
                self.tasks.push(Task::Not);
                self.tasks.push(Task::Eval(frame));
            }
            Check::AnyOf(rest) => self.any_of(rest),
            Check::OneOf(rest) => self.one_of(rest, false),
            Check::IfThenElse {
                condition,
                then,
                otherwise,
            } => {
                self.tasks.push(Task::Branch { then, otherwise });
                self.tasks.push(Task::Eval(condition));
            }
            Check::Contains { items, min, max } => self.count(items, 0, min, max),
            Check::Unevaluated { owner, node } => {
                self.annotations.push(Annotations::default());
                self.tasks.push(Task::Settle {
                    owner: owner.clone(),
                    node,
                });
                self.tasks.push(Task::Walk { frame: owner, own: true });
            }
        }
    }

    fn any_of(&mut self, mut rest: Vec<Frame<'i, ()>>) {
        match rest.pop() {
            Some(frame) => {
                self.tasks.push(Task::AnyOf(rest));
                self.tasks.push(Task::Eval(frame));
            }
            None => self.outcome(false),
        }
    }

    fn one_of(&mut self, mut rest: Vec<Frame<'i, ()>>, valid: bool) {
        match rest.pop() {
            Some(frame) => {
                self.tasks.push(Task::OneOf { rest, valid });
                self.tasks.push(Task::Eval(frame));
            }
            None => self.outcome(valid),
        }
    }

    fn count(&mut self, mut rest: Vec<Frame<'i, ()>>, matched: u64, min: u64, max: Option<u64>) {
        match max {
            Some(max) if matched > max => return self.outcome(false),
            None if matched >= min => return self.outcome(true),
            _ => {}
        }
        match rest.pop() {
            Some(frame) => {
                self.tasks.push(Task::Count {
                    rest,
                    matched,
                    min,
                    max,
                });
                self.tasks.push(Task::Eval(frame));
            }
            None => self.outcome(matched >= min),
        }
    }
}

impl<'i> Vm<'i, ()> {
    fn run(&mut self, graph: &Graph) {
        while let Some(task) = self.tasks.pop() {
            self.step(graph, task);
        }
    }

    fn step(&mut self, graph: &Graph, task: Task<'i>) {
        match task {
            Task::Eval(frame) => self.eval(graph, frame),
            Task::All(rest) => {
                if self.pop_outcome() {
                    self.all(rest);
                } else {
                    self.outcome(false);
                }
            }
            Task::AnyOf(rest) => {
                if self.pop_outcome() {
                    self.outcome(true);
                } else {
                    self.any_of(rest);
                }
            }
            Task::OneOf { rest, valid } => {
                let held = self.pop_outcome();
                if held && valid {
                    self.outcome(false);
                } else {
                    self.one_of(rest, valid || held);
                }
            }
            Task::Not => {
                let held = self.pop_outcome();
                self.outcome(!held);
            }
            Task::Branch { then, otherwise } => {
                let branch = if self.pop_outcome() { then } else { otherwise };
                match branch {
                    Some(frame) => self.tasks.push(Task::Eval(frame)),
                    None => self.outcome(true),
                }
            }
            Task::Count {
                rest,
                matched,
                min,
                max,
            } => {
                let held = self.pop_outcome();
                self.count(rest, matched + u64::from(held), min, max);
            }
            Task::Walk { frame, own } => self.walk(graph, frame, own),
            Task::WalkIf(frame) => {
                if self.pop_outcome() {
                    self.tasks.push(Task::Walk { frame, own: false });
                }
            }
            Task::WalkBranch {
                condition,
                then,
                otherwise,
            } => {
                if self.pop_outcome() {
                    self.tasks.push(Task::Walk {
                        frame: condition,
                        own: false,
                    });
                    if let Some(frame) = then {
                        self.tasks.push(Task::Walk { frame, own: false });
                    }
                } else if let Some(frame) = otherwise {
                    self.tasks.push(Task::Walk { frame, own: false });
                }
            }
            Task::Mark(index) => {
                if self.pop_outcome() {
                    self.annotated().indices.insert(index);
                }
            }
            Task::Settle { owner, node } => self.settle(graph, owner, node),
        }
    }

    fn annotated(&mut self) -> &mut Annotations {
        self.annotations
            .last_mut()
            .expect("unreachable: walks run under an annotation set")
    }

    /// Record the members `frame`'s node evaluates, and schedule the
    /// subschemas it applies in place. With `own`, the node's own
    /// `unevaluated*` keywords are left out. Only reference hops count
    /// against the depth limit.
    fn walk(&mut self, graph: &Graph, frame: Frame<'i, ()>, own: bool) {
        let (keywords, resource) = match &graph.nodes[frame.node] {
            Node::Keywords { keywords, resource } => (keywords, *resource),
            Node::Bool(_) => return,
        };
        let scope = frame.scope.enter(resource);
        let instance = frame.instance.tree();

        for keyword in keywords {
            match (keyword, instance) {
                (Keyword::Properties(entries), Value::Object(object)) => {
                    let names = entries
                        .iter()
                        .filter(|(name, _)| object.contains_key(name))
                        .map(|(name, _)| name.clone());
                    self.annotated().names.extend(names);
                }
                (Keyword::PatternProperties(entries), Value::Object(object)) => {
                    let names = object
                        .keys()
                        .filter(|name| entries.iter().any(|(regex, _)| regex.is_match(name)))
                        .cloned();
                    self.annotated().names.extend(names);
                }
                (Keyword::AdditionalProperties { .. }, Value::Object(_))
                | (Keyword::Items(_), Value::Array(_))
                | (Keyword::ItemsAfter { .. }, Value::Array(_)) => self.annotated().all = true,
                (Keyword::UnevaluatedProperties(_), Value::Object(_))
                | (Keyword::UnevaluatedItems(_), Value::Array(_))
                    if !own =>
                {
                    self.annotated().all = true
                }
                (Keyword::Prefix { nodes, .. }, Value::Array(_)) => {
                    let evaluated = self.annotated();
                    evaluated.prefix = evaluated.prefix.max(nodes.len());
                }
                // Draft 2019-09 does not let `contains` evaluate items.
                (Keyword::Contains { node, .. }, Value::Array(items))
                    if graph.draft >= Draft::Draft202012 =>
                {
                    for (index, item) in items.iter().enumerate() {
                        self.tasks.push(Task::Mark(index));
                        self.tasks.push(Task::Eval(member(*node, item, &scope)));
                    }
                }
                (Keyword::AllOf(nodes), _) => {
                    for node in nodes {
                        self.tasks.push(Task::Walk {
                            frame: frame.in_place(*node, &scope),
                            own: false,
                        });
                    }
                }
                (Keyword::AnyOf(nodes), _) | (Keyword::OneOf(nodes), _) => {
                    for node in nodes {
                        let branch = frame.in_place(*node, &scope);
                        self.tasks.push(Task::WalkIf(branch.clone()));
                        self.tasks.push(Task::Eval(branch));
                    }
                }
                (
                    Keyword::IfThenElse {
                        condition,
                        then,
                        otherwise,
                    },
                    _,
                ) => {
                    let condition = frame.in_place(*condition, &scope);
                    self.tasks.push(Task::WalkBranch {
                        condition: condition.clone(),
                        then: then.map(|node| frame.in_place(node, &scope)),
                        otherwise: otherwise.map(|node| frame.in_place(node, &scope)),
                    });
                    self.tasks.push(Task::Eval(condition));
                }
                (Keyword::DependentSchemas { entries, .. }, Value::Object(object)) => {
                    for (property, node) in entries {
                        if object.contains_key(property) {
                            self.tasks.push(Task::Walk {
                                frame: frame.in_place(*node, &scope),
                                own: false,
                            });
                        }
                    }
                }
                (Keyword::Ref(_), _)
                | (Keyword::RecursiveRef { .. }, _)
                | (Keyword::DynamicRef { .. }, _)
                    if frame.hops < graph.max_depth =>
                {
                    let (target, _) = dynamic_target(graph, keyword, &scope);
                    self.tasks.push(Task::Walk {
                        frame: Frame {
                            hops: frame.hops + 1,
                            ..frame.in_place(target, &scope)
                        },
                        own: false,
                    });
                }
                _ => {}
            }
        }
    }

    /// Check the members no subschema evaluated against `node`.
    fn settle(&mut self, graph: &Graph, owner: Frame<'i, ()>, node: NodeId) {
        let evaluated = self.annotations.pop().unwrap_or_default();
        let extras: Vec<&'i Value> = match owner.instance.tree() {
            Value::Object(object) => object
                .iter()
                .filter(|(name, _)| !evaluated.has_property(name))
                .map(|(_, property)| property)
                .collect(),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .filter(|(index, _)| !evaluated.has_item(*index))
                .map(|(_, item)| item)
                .collect(),
            _ => Vec::new(),
        };
        if is_false(graph, node) {
            return self.outcome(extras.is_empty());
        }
        let checks = extras
            .into_iter()
            .rev()
            .map(|extra| Check::Node(member(node, extra, &owner.scope)))
            .collect();
        self.all(checks);
    }
}

/// Does `frame`'s node hold for its instance?
fn holds(graph: &Graph, frame: Frame<'_, ()>) -> bool {
    let mut vm: Vm<'_, ()> = Vm::new();
    vm.tasks.push(Task::Eval(frame));
    vm.run(graph);
    vm.pop_outcome()
}

/// The members `owner`'s instance has that its node, and the subschemas it
/// applies in place, evaluate.
fn annotations(graph: &Graph, owner: Frame<'_, ()>) -> Annotations {
    let mut vm: Vm<'_, ()> = Vm::new();
    vm.annotations.push(Annotations::default());
    vm.tasks.push(Task::Walk {
        frame: owner,
        own: true,
    });
    vm.run(graph);
    vm.annotations.pop().unwrap_or_default()
}

fn is_false(graph: &Graph, node: NodeId) -> bool {
    matches!(graph.nodes[node], Node::Bool(false))
}

/// Where a `$recursiveRef` or `$dynamicRef` leads in the current dynamic
/// scope, along with its keyword.
fn dynamic_target(graph: &Graph, keyword: &Keyword, scope: &Scope) -> (NodeId, &'static str) {
    match keyword {
        Keyword::RecursiveRef { node, dynamic } => {
            let target = if *dynamic {
                scope
                    .outermost_first()
                    .into_iter()
                    .map(|resource| &graph.resources[resource])
                    .find(|resource| resource.recursive_anchor)
                    .map_or(*node, |resource| resource.root)
            } else {
                *node
            };
            (target, "$recursiveRef")
        }
        Keyword::DynamicRef { node, anchor } => {
            let target = anchor
                .as_ref()
                .and_then(|anchor| {
                    scope
                        .outermost_first()
                        .into_iter()
                        .find_map(|resource| graph.resources[resource].dynamic_anchors.get(anchor))
                        .copied()
                })
                .unwrap_or(*node);
            (target, "$dynamicRef")
        }
        Keyword::Ref(node) => (*node, "$ref"),
        _ => unreachable!("not a reference keyword"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;
    use crate::validator::{Config, Validator};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn messages(schema: Value, instance: Value) -> Vec<String> {
        Schema::compile(&schema)
            .unwrap()
            .iter_errors(&instance)
            .map(|error| error.message())
            .collect()
    }

    #[test]
    fn node_assertions_come_before_children() {
        assert_eq!(
            messages(
                json!({
                    "properties": {"a": {"type": "string"}},
                    "required": ["b"]
                }),
                json!({"a": 1})
            ),
            vec![
                r#""b" is a required property"#.to_owned(),
                r#"1 is not of type "string""#.to_owned(),
            ]
        );
    }

    #[test]
    fn combinators_report_a_single_error() {
        assert_eq!(
            messages(
                json!({"anyOf": [{"type": "string"}, {"minimum": 5}]}),
                json!(1)
            ),
            vec!["1 is not valid under any of the schemas listed in the 'anyOf' keyword"]
        );
        assert_eq!(
            messages(json!({"oneOf": [{"minimum": 0}, {"maximum": 5}]}), json!(3)),
            vec!["3 is valid under more than one of the schemas listed in the 'oneOf' keyword"]
        );
        assert_eq!(
            messages(json!({"not": {"type": "integer"}}), json!(3)),
            vec![r#"{"type":"integer"} is not allowed for 3"#]
        );
    }

    #[test]
    fn aggregated_forbidden_members() {
        assert_eq!(
            messages(
                json!({"properties": {"a": {}}, "additionalProperties": false}),
                json!({"a": 1, "b": 2, "c": 3})
            ),
            vec!["Additional properties are not allowed ('b', 'c' were unexpected)"]
        );
        assert_eq!(
            messages(
                json!({"prefixItems": [{}], "items": false}),
                json!([1, 2, 3])
            ),
            vec!["Additional items are not allowed (2, 3 were unexpected)"]
        );
    }

    #[test]
    fn property_names_report_at_the_object() {
        let schema = Schema::compile(&json!({
            "properties": {"inner": {"propertyNames": {"maxLength": 2}}}
        }))
        .unwrap();
        let instance = json!({"inner": {"abc": 1}});
        let errors = schema.iter_errors(&instance).collect::<Vec<_>>();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].instance_path().to_string(), "/inner");
        assert_eq!(
            errors[0].schema_path().to_string(),
            "/properties/inner/propertyNames/maxLength"
        );
        assert_eq!(errors[0].message(), r#""abc" is longer than 2 characters"#);
    }

    #[test]
    fn unevaluated_properties_see_through_applicators() {
        let schema = Schema::compile(&json!({
            "allOf": [{"properties": {"a": true}}],
            "anyOf": [{"properties": {"b": true}, "required": ["b"]}, {"required": ["x"]}],
            "unevaluatedProperties": false
        }))
        .unwrap();
        assert!(schema.is_valid(&json!({"a": 1, "b": 2})));
        assert_eq!(
            schema
                .iter_errors(&json!({"a": 1, "c": 2}))
                .map(|error| error.message())
                .collect::<Vec<_>>(),
            vec![
                r#"{"a":1,"c":2} is not valid under any of the schemas listed in the 'anyOf' keyword"#,
                "Unevaluated properties are not allowed ('c' was unexpected)",
            ]
        );
    }

    #[test]
    fn unevaluated_items_with_prefix_and_contains() {
        let schema = Schema::compile(&json!({
            "prefixItems": [{"type": "string"}],
            "contains": {"type": "integer"},
            "unevaluatedItems": false
        }))
        .unwrap();
        assert!(schema.is_valid(&json!(["a", 1, 2])));
        assert!(!schema.is_valid(&json!(["a", 1, null])));
    }

    #[test]
    fn dynamic_references_follow_the_outermost_anchor() {
        let schema = Schema::compile(&json!({
            "$id": "https://example.com/strict-tree",
            "$dynamicAnchor": "node",
            "$ref": "tree",
            "unevaluatedProperties": false,
            "$defs": {
                "tree": {
                    "$id": "tree",
                    "$dynamicAnchor": "node",
                    "type": "object",
                    "properties": {
                        "data": true,
                        "children": {"type": "array", "items": {"$dynamicRef": "#node"}}
                    }
                }
            }
        }))
        .unwrap();
        assert!(schema.is_valid(&json!({"children": [{"data": 1}]})));
        assert!(!schema.is_valid(&json!({"children": [{"daat": 1}]})));
    }

    #[test]
    fn recursive_references() {
        let mut config = Config::new();
        config.draft(Draft::Draft201909);
        let schema = Validator::new_with_config(config)
            .compile(&json!({
                "$recursiveAnchor": true,
                "type": "object",
                "properties": {"next": {"$recursiveRef": "#"}}
            }))
            .unwrap();
        assert!(schema.is_valid(&json!({"next": {"next": {}}})));
        assert!(!schema.is_valid(&json!({"next": {"next": 1}})));
    }

    #[test]
    fn exhausted_iterators_stay_exhausted() {
        let schema = Schema::compile(&json!({"type": "string"})).unwrap();
        let instance = json!(1);
        let mut errors = schema.iter_errors(&instance);
        assert!(errors.next().is_some());
        assert!(errors.next().is_none());
        assert!(errors.next().is_none());
    }

    fn nested(keyword: &str, depth: usize, inner: Value) -> Value {
        (0..depth).fold(inner, |schema, _| json!({ keyword: schema }))
    }

    #[test]
    fn deep_not_chains() {
        let even = Schema::compile(&nested("not", 500, json!({"type": "integer"}))).unwrap();
        assert!(even.is_valid(&json!(1)));
        assert!(!even.is_valid(&json!("a")));
        let errors = even.iter_errors(&json!("a")).collect::<Vec<_>>();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].schema_path().to_string(), "/not");

        let odd = Schema::compile(&nested("not", 501, json!({"type": "integer"}))).unwrap();
        assert!(!odd.is_valid(&json!(1)));
        assert!(odd.is_valid(&json!("a")));
        assert_eq!(odd.iter_errors(&json!("a")).count(), 0);
    }

    #[test]
    fn deep_any_of_chains() {
        let schema = (0..400).fold(json!({"minimum": 3}), |schema, _| {
            json!({"anyOf": [{"type": "string"}, schema]})
        });
        let schema = Schema::compile(&schema).unwrap();
        assert!(schema.is_valid(&json!(5)));
        assert!(schema.is_valid(&json!("a")));
        assert!(!schema.is_valid(&json!(1)));
    }

    fn nested_all_of(depth: usize, inner: Value) -> Value {
        (0..depth).fold(inner, |schema, _| json!({"allOf": [schema]}))
    }

    #[test]
    fn unevaluated_properties_under_deep_applicators() {
        let mut schema = nested_all_of(40, json!({"properties": {"a": true}}));
        schema["unevaluatedProperties"] = json!(false);
        let schema = Schema::compile(&schema).unwrap();
        assert!(schema.is_valid(&json!({"a": 1})));
        assert!(!schema.is_valid(&json!({"a": 1, "b": 2})));
        assert_eq!(
            schema
                .iter_errors(&json!({"a": 1, "b": 2}))
                .map(|error| error.message())
                .collect::<Vec<_>>(),
            vec!["Unevaluated properties are not allowed ('b' was unexpected)"]
        );
    }

    #[test]
    fn unevaluated_items_under_deep_applicators() {
        let mut schema = nested_all_of(
            40,
            json!({"anyOf": [{"prefixItems": [true, true]}, {"type": "null"}]}),
        );
        schema["unevaluatedItems"] = json!({"type": "string"});
        let schema = Schema::compile(&schema).unwrap();
        assert!(schema.is_valid(&json!([1, 2, "c"])));
        assert!(!schema.is_valid(&json!([1, 2, 3])));
        let errors = schema.iter_errors(&json!([1, 2, 3])).collect::<Vec<_>>();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].instance_path().to_string(), "/2");
    }

    #[test]
    fn unevaluated_inside_a_negation() {
        let schema = Schema::compile(&json!({
            "not": {
                "allOf": [{"properties": {"a": true}}],
                "unevaluatedProperties": false
            }
        }))
        .unwrap();
        assert!(!schema.is_valid(&json!({"a": 1})));
        assert!(schema.is_valid(&json!({"a": 1, "b": 2})));
    }

    #[test]
    fn only_reference_hops_count_towards_the_depth_limit() {
        let mut config = Config::new();
        config.max_depth(2);
        let validator = Validator::new_with_config(config);

        let mut nested = nested_all_of(40, json!({"properties": {"a": true}}));
        nested["unevaluatedProperties"] = json!(false);
        let nested = validator.compile(&nested).unwrap();
        assert!(nested.is_valid(&json!({"a": 1})));

        let chained = validator
            .compile(&json!({
                "$ref": "#/$defs/one",
                "$defs": {
                    "one": {"$ref": "#/$defs/two"},
                    "two": {"$ref": "#/$defs/three"},
                    "three": true
                }
            }))
            .unwrap();
        let errors = chained.iter_errors(&json!(1)).collect::<Vec<_>>();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].schema_path().to_string(), "/$ref/$ref/$ref");
    }

    #[test]
    fn property_names_follow_the_objects_own_errors() {
        let schema = Schema::compile(&json!({
            "propertyNames": {"pattern": "^[a-z]+$"},
            "required": ["id"]
        }))
        .unwrap();
        let instance = json!({"Name": 1});
        let errors = schema.iter_errors(&instance).collect::<Vec<_>>();
        assert_eq!(errors.len(), 2);
        assert_eq!(
            errors[1].schema_path().to_string(),
            "/propertyNames/pattern"
        );
        assert_eq!(errors[1].instance(), &json!("Name"));
    }
}
