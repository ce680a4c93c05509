use crate::catalog::xml_tree::{XmlNode, local_part};
use crate::error::{QuickloadError, Result};
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Limit on nested groups, type derivations and element references
const MAX_DEPTH: usize = 32;

/// Result of checking one catalog file against the optional schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaCheck {
    /// No usable schema file, so nothing was checked
    Skipped,
    Valid,
    Invalid(Vec<String>),
}

impl SchemaCheck {
    /// Skipped counts as acceptable: a missing schema never blocks a catalog.
    pub fn is_acceptable(&self) -> bool {
        !matches!(self, SchemaCheck::Invalid(_))
    }
}

/// Checks catalog files against a schema file that may or may not exist.
///
/// The schema file is looked up again on every check, so dropping a schema
/// into the directory takes effect on the next run.
pub struct SchemaValidator {
    schema_file: PathBuf,
}

impl SchemaValidator {
    pub fn new<P: AsRef<Path>>(schema_file: P) -> Self {
        Self {
            schema_file: schema_file.as_ref().to_path_buf(),
        }
    }

    pub fn schema_file(&self) -> &Path {
        &self.schema_file
    }

    pub fn check_file(&self, document: &Path) -> SchemaCheck {
        match fs::read_to_string(document) {
            Ok(content) => self.check_str(&content),
            Err(e) => SchemaCheck::Invalid(vec![format!(
                "cannot read '{}': {e}",
                document.display()
            )]),
        }
    }

    pub fn check_str(&self, content: &str) -> SchemaCheck {
        if !self.schema_file.is_file() {
            debug!(
                schema = %self.schema_file.display(),
                "schema file not found, skipping validation"
            );
            return SchemaCheck::Skipped;
        }

        let schema = match Schema::load(&self.schema_file) {
            Ok(schema) => schema,
            Err(e) => {
                warn!(
                    schema = %self.schema_file.display(),
                    error = %e,
                    "schema could not be compiled, skipping validation"
                );
                return SchemaCheck::Skipped;
            }
        };

        schema.check_str(content)
    }
}

/// A compiled XML Schema.
///
/// Covers element declarations (global, local, by reference or by named type),
/// `sequence`/`choice`/`all` content with named groups and `any` wildcards,
/// `complexContent` extension and restriction, `simpleContent` extension,
/// attributes (typed, required, prohibited, `anyAttribute`) and simple types
/// restricted by `enumeration`, `length`, `minLength`, `maxLength`, `pattern`
/// and the inclusive/exclusive bounds. Anything else fails to compile.
#[derive(Debug, Clone)]
pub struct Schema {
    elements: HashMap<String, ElementDecl>,
    types: HashMap<String, ComplexType>,
    simple_types: HashMap<String, SimpleType>,
}

#[derive(Debug, Clone)]
struct ElementDecl {
    name: String,
    content: Content,
    min: u32,
    max: Option<u32>,
}

#[derive(Debug, Clone)]
enum Content {
    Simple(SimpleType),
    Complex(Box<ComplexType>),
    TypeRef(String),
    ElementRef(String),
}

#[derive(Debug, Clone)]
enum Particle {
    Element(ElementDecl),
    Any {
        min: u32,
        max: Option<u32>,
    },
    Group {
        choice: bool,
        particles: Vec<Particle>,
        min: u32,
        max: Option<u32>,
    },
}

#[derive(Debug, Clone, Default)]
enum Model {
    #[default]
    Empty,
    Particle(Particle),
    All(Vec<ElementDecl>),
}

#[derive(Debug, Clone, Default)]
struct ComplexType {
    model: Model,
    attributes: Vec<AttributeDecl>,
    any_attribute: bool,
    text: Option<SimpleType>,
    mixed: bool,
}

#[derive(Debug, Clone)]
struct AttributeDecl {
    name: String,
    required: bool,
    prohibited: bool,
    value: SimpleType,
}

#[derive(Debug, Clone)]
struct SimpleType {
    base: Base,
    facets: Vec<Facet>,
}

#[derive(Debug, Clone)]
enum Base {
    Builtin(Builtin),
    Named(String),
    Inline(Box<SimpleType>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Builtin {
    Any,
    Text,
    Boolean,
    Decimal,
    Float,
    Integer { min: Option<i128>, max: Option<i128> },
}

#[derive(Debug, Clone)]
enum Facet {
    Enumeration(Vec<String>),
    Length(usize),
    MinLength(usize),
    MaxLength(usize),
    Pattern(Vec<Regex>),
    MinInclusive(f64),
    MaxInclusive(f64),
    MinExclusive(f64),
    MaxExclusive(f64),
}

impl SimpleType {
    fn named(name: &str) -> Self {
        Self {
            base: Base::Named(name.to_string()),
            facets: Vec::new(),
        }
    }

    fn builtin(builtin: Builtin) -> Self {
        Self {
            base: Base::Builtin(builtin),
            facets: Vec::new(),
        }
    }
}

impl Schema {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let root = XmlNode::parse(content)
            .map_err(|e| QuickloadError::Schema(format!("Unreadable schema: {e}")))?;
        if root.local_name() != "schema" {
            return Err(QuickloadError::Schema(format!(
                "Expected <schema> root, found <{}>",
                root.name
            )));
        }

        let definitions = Definitions::collect(&root)?;
        let mut elements = HashMap::new();
        let mut types = HashMap::new();
        let mut simple_types = HashMap::new();

        for child in &root.children {
            match child.local_name() {
                "element" => {
                    let decl = definitions.element(child, 0)?;
                    elements.insert(decl.name.clone(), decl);
                }
                "complexType" => {
                    let name = required_attribute(child, "name")?;
                    types.insert(name, definitions.complex_type(child, 0)?);
                }
                "simpleType" => {
                    let name = required_attribute(child, "name")?;
                    simple_types.insert(name, simple_type(child, 0)?);
                }
                "group" => {
                    definitions.group_body(child, 0)?;
                }
                "attribute" | "annotation" => {}
                other => return Err(unsupported(other)),
            }
        }

        if elements.is_empty() {
            return Err(QuickloadError::Schema(
                "Schema declares no top-level elements".to_string(),
            ));
        }

        let schema = Self {
            elements,
            types,
            simple_types,
        };
        schema.check_derivations()?;
        Ok(schema)
    }

    pub fn check_str(&self, content: &str) -> SchemaCheck {
        match XmlNode::parse(content) {
            Ok(root) => {
                let problems = self.validate(&root);
                if problems.is_empty() {
                    SchemaCheck::Valid
                } else {
                    SchemaCheck::Invalid(problems)
                }
            }
            Err(e) => SchemaCheck::Invalid(vec![e.to_string()]),
        }
    }

    /// Returns every problem found; an empty list means the document conforms.
    pub fn validate(&self, root: &XmlNode) -> Vec<String> {
        let mut problems = Vec::new();
        match self.elements.get(root.local_name()) {
            Some(decl) => {
                let path = format!("/{}", root.local_name());
                self.check_element(decl, root, &path, 0, &mut problems);
            }
            None => problems.push(format!("root element <{}> is not declared", root.name)),
        }
        problems
    }

    /// Named simple types must bottom out in a built-in type.
    fn check_derivations(&self) -> Result<()> {
        for name in self.simple_types.keys() {
            let mut current = name.as_str();
            let mut steps = 0;
            while let Some(Base::Named(parent)) = self.simple_types.get(current).map(|t| &t.base) {
                current = parent.as_str();
                steps += 1;
                if steps > MAX_DEPTH {
                    return Err(QuickloadError::Schema(format!(
                        "Simple type '{name}' has a circular derivation"
                    )));
                }
            }
        }
        Ok(())
    }

    fn check_element(
        &self,
        decl: &ElementDecl,
        node: &XmlNode,
        path: &str,
        depth: usize,
        problems: &mut Vec<String>,
    ) {
        let content = match &decl.content {
            Content::ElementRef(name) => match self.elements.get(name) {
                Some(global) if !matches!(global.content, Content::ElementRef(_)) => {
                    &global.content
                }
                _ => {
                    problems.push(format!("{path}: referenced element '{name}' is not declared"));
                    return;
                }
            },
            content => content,
        };

        match content {
            Content::Simple(simple) => self.check_simple(simple, node, path, problems),
            Content::Complex(complex) => self.check_complex(complex, node, path, depth, problems),
            Content::TypeRef(type_name) => match self.types.get(type_name) {
                Some(complex) => self.check_complex(complex, node, path, depth, problems),
                None => self.check_simple(&SimpleType::named(type_name), node, path, problems),
            },
            Content::ElementRef(_) => {}
        }
    }

    fn check_simple(
        &self,
        simple: &SimpleType,
        node: &XmlNode,
        path: &str,
        problems: &mut Vec<String>,
    ) {
        if self.is_any_type(simple) {
            return;
        }

        if let Some((key, _)) = node
            .attributes
            .iter()
            .find(|(key, _)| !is_namespace_attribute(key))
        {
            problems.push(format!("{path}: attribute '{key}' is not allowed"));
        }
        self.check_leaf(simple, node, path, problems);
    }

    fn check_leaf(
        &self,
        simple: &SimpleType,
        node: &XmlNode,
        path: &str,
        problems: &mut Vec<String>,
    ) {
        if let Some(child) = node.children.first() {
            problems.push(format!(
                "{path}: element <{}> is not allowed in simple content",
                child.name
            ));
        }

        if let Some(problem) = self.value_problem(simple, &node.text, 0) {
            problems.push(format!("{path}: {problem}"));
        }
    }

    fn check_complex(
        &self,
        complex: &ComplexType,
        node: &XmlNode,
        path: &str,
        depth: usize,
        problems: &mut Vec<String>,
    ) {
        if depth > MAX_DEPTH * 8 {
            problems.push(format!("{path}: document is nested too deeply"));
            return;
        }

        for (key, value) in &node.attributes {
            if is_namespace_attribute(key) {
                continue;
            }
            match complex.attributes.iter().find(|attr| attr.name == local_part(key)) {
                Some(attr) if !attr.prohibited => {
                    if let Some(problem) = self.value_problem(&attr.value, value, 0) {
                        problems.push(format!("{path}/@{key}: {problem}"));
                    }
                }
                _ if complex.any_attribute => {}
                _ => problems.push(format!("{path}: attribute '{key}' is not allowed")),
            }
        }
        for attr in complex.attributes.iter().filter(|attr| attr.required) {
            if node.attribute(&attr.name).is_none() {
                problems.push(format!("{path}: missing required attribute '{}'", attr.name));
            }
        }

        if let Some(simple) = &complex.text {
            self.check_leaf(simple, node, path, problems);
            return;
        }

        if !complex.mixed && !node.text.trim().is_empty() {
            problems.push(format!("{path}: text content is not allowed"));
        }

        match &complex.model {
            Model::Empty => {
                if let Some(child) = node.children.first() {
                    problems.push(format!("{path}: unexpected element <{}>", child.name));
                }
            }
            Model::Particle(particle) => {
                self.check_particles(particle, node, path, depth, problems)
            }
            Model::All(elements) => self.check_all(elements, node, path, depth, problems),
        }
    }

    fn check_particles(
        &self,
        particle: &Particle,
        node: &XmlNode,
        path: &str,
        depth: usize,
        problems: &mut Vec<String>,
    ) {
        let mut matcher = ContentMatcher::new(&node.children);
        let end = matcher.particle(particle, 0);

        if end != Some(node.children.len()) {
            problems.push(matcher.mismatch(path, end));
            return;
        }

        for (child, decl) in node.children.iter().zip(&matcher.assigned) {
            if let Some(decl) = decl {
                let child_path = format!("{path}/{}", child.local_name());
                self.check_element(decl, child, &child_path, depth + 1, problems);
            }
        }
    }

    fn check_all(
        &self,
        elements: &[ElementDecl],
        node: &XmlNode,
        path: &str,
        depth: usize,
        problems: &mut Vec<String>,
    ) {
        let mut counts = vec![0u32; elements.len()];

        for child in &node.children {
            match elements
                .iter()
                .position(|decl| decl.name == child.local_name())
            {
                Some(slot) => {
                    counts[slot] += 1;
                    let child_path = format!("{path}/{}", child.local_name());
                    self.check_element(&elements[slot], child, &child_path, depth + 1, problems);
                }
                None => problems.push(format!("{path}: unexpected element <{}>", child.name)),
            }
        }

        for (decl, count) in elements.iter().zip(counts) {
            if count < decl.min {
                problems.push(format!("{path}: missing element <{}>", decl.name));
            }
            if decl.max.is_some_and(|max| count > max) {
                problems.push(format!("{path}: too many <{}> elements", decl.name));
            }
        }
    }

    fn is_any_type(&self, simple: &SimpleType) -> bool {
        if !simple.facets.is_empty() {
            return false;
        }
        match &simple.base {
            Base::Builtin(builtin) => *builtin == Builtin::Any,
            Base::Named(name) => !self.simple_types.contains_key(name) && name == "anyType",
            Base::Inline(_) => false,
        }
    }

    /// Checks a value against its base type first, then against its own facets.
    fn value_problem(&self, simple: &SimpleType, value: &str, depth: usize) -> Option<String> {
        if depth > MAX_DEPTH {
            return Some("type derivation is too deep".to_string());
        }

        let base_problem = match &simple.base {
            Base::Builtin(builtin) => builtin_problem(*builtin, value),
            Base::Named(name) => match self.simple_types.get(name) {
                Some(parent) => self.value_problem(parent, value, depth + 1),
                None => builtin_problem(builtin(name), value),
            },
            Base::Inline(parent) => self.value_problem(parent, value, depth + 1),
        };

        base_problem.or_else(|| {
            simple
                .facets
                .iter()
                .find_map(|facet| facet_problem(facet, value))
        })
    }
}

/// Greedy matcher of a content model against the children of one element.
///
/// Valid schemas are deterministic (each child can match only one particle),
/// so taking the first alternative that consumes input is enough.
struct ContentMatcher<'s, 'n> {
    children: &'n [XmlNode],
    /// Declaration each consumed child was matched to; `None` for wildcards
    assigned: Vec<Option<&'s ElementDecl>>,
    furthest: usize,
    expected: Vec<&'s str>,
}

impl<'s, 'n> ContentMatcher<'s, 'n> {
    fn new(children: &'n [XmlNode]) -> Self {
        Self {
            children,
            assigned: Vec::new(),
            furthest: 0,
            expected: Vec::new(),
        }
    }

    /// Matches `particle` from `start`; returns the position after it.
    fn particle(&mut self, particle: &'s Particle, start: usize) -> Option<usize> {
        match particle {
            Particle::Element(decl) => {
                self.repeat_leaf(start, decl.min, decl.max, Some(decl), &decl.name)
            }
            Particle::Any { min, max } => self.repeat_leaf(start, *min, *max, None, "*"),
            Particle::Group {
                choice,
                particles,
                min,
                max,
            } => self.repeat_group(start, *choice, particles, *min, *max),
        }
    }

    fn repeat_leaf(
        &mut self,
        start: usize,
        min: u32,
        max: Option<u32>,
        decl: Option<&'s ElementDecl>,
        label: &'s str,
    ) -> Option<usize> {
        let mut position = start;
        let mut count = 0u32;

        while max.is_none_or(|max| count < max) {
            match self.children.get(position) {
                Some(child) if decl.is_none_or(|decl| decl.name == child.local_name()) => {
                    self.assigned.push(decl);
                    position += 1;
                    count += 1;
                }
                _ => {
                    self.note_expected(position, label);
                    break;
                }
            }
        }

        if count < min {
            self.assigned.truncate(start);
            return None;
        }
        Some(position)
    }

    fn repeat_group(
        &mut self,
        start: usize,
        choice: bool,
        particles: &'s [Particle],
        min: u32,
        max: Option<u32>,
    ) -> Option<usize> {
        let mut position = start;
        let mut count = 0u32;

        while max.is_none_or(|max| count < max) {
            let next = if choice {
                self.choice_once(particles, position)
            } else {
                self.sequence_once(particles, position)
            };

            match next {
                Some(next) if next > position => {
                    position = next;
                    count += 1;
                }
                // An empty match satisfies every remaining repetition
                Some(_) => {
                    count = count.max(min);
                    break;
                }
                None => break,
            }
        }

        if count < min {
            self.assigned.truncate(start);
            return None;
        }
        Some(position)
    }

    fn sequence_once(&mut self, particles: &'s [Particle], start: usize) -> Option<usize> {
        let mut position = start;
        for particle in particles {
            match self.particle(particle, position) {
                Some(next) => position = next,
                None => {
                    self.assigned.truncate(start);
                    return None;
                }
            }
        }
        Some(position)
    }

    fn choice_once(&mut self, particles: &'s [Particle], start: usize) -> Option<usize> {
        let mut empty = None;
        for particle in particles {
            match self.particle(particle, start) {
                Some(next) if next > start => return Some(next),
                Some(next) => empty = Some(next),
                None => {}
            }
            self.assigned.truncate(start);
        }
        empty
    }

    fn note_expected(&mut self, position: usize, label: &'s str) {
        if position > self.furthest {
            self.furthest = position;
            self.expected.clear();
        }
        if position == self.furthest && !self.expected.contains(&label) {
            self.expected.push(label);
        }
    }

    fn mismatch(&self, path: &str, end: Option<usize>) -> String {
        let position = end.map_or(self.furthest, |end| end.max(self.furthest));
        let expected = self
            .expected
            .iter()
            .map(|label| format!("<{label}>"))
            .collect::<Vec<_>>()
            .join(" or ");

        match self.children.get(position) {
            Some(child) if position == self.furthest && !expected.is_empty() => format!(
                "{path}: unexpected element <{}>, expected {expected}",
                child.name
            ),
            Some(child) => format!("{path}: unexpected element <{}>", child.name),
            None => format!("{path}: content ends early, expected {expected}"),
        }
    }
}

/// Named complex types, groups and attributes of a schema, looked up while
/// compiling so they may be used before they are declared.
struct Definitions<'a> {
    complex_types: HashMap<&'a str, &'a XmlNode>,
    groups: HashMap<&'a str, &'a XmlNode>,
    attributes: HashMap<&'a str, &'a XmlNode>,
}

impl<'a> Definitions<'a> {
    fn collect(root: &'a XmlNode) -> Result<Self> {
        let mut definitions = Self {
            complex_types: HashMap::new(),
            groups: HashMap::new(),
            attributes: HashMap::new(),
        };

        for child in &root.children {
            let table = match child.local_name() {
                "complexType" => &mut definitions.complex_types,
                "group" => &mut definitions.groups,
                "attribute" => &mut definitions.attributes,
                _ => continue,
            };
            let name = child.attribute("name").ok_or_else(|| {
                QuickloadError::Schema(format!(
                    "Top-level <{}> is missing the 'name' attribute",
                    child.name
                ))
            })?;
            table.insert(name, child);
        }

        Ok(definitions)
    }

    fn element(&self, node: &XmlNode, depth: usize) -> Result<ElementDecl> {
        let depth = deeper(depth)?;
        let (min, max) = occurs(node)?;

        if let Some(reference) = node.attribute("ref") {
            let name = local_part(reference).to_string();
            return Ok(ElementDecl {
                content: Content::ElementRef(name.clone()),
                name,
                min,
                max,
            });
        }

        let name = required_attribute(node, "name")?;
        let content = if let Some(type_name) = node.attribute("type") {
            Content::TypeRef(local_part(type_name).to_string())
        } else if let Some(complex) = node.child("complexType") {
            Content::Complex(Box::new(self.complex_type(complex, depth)?))
        } else if let Some(simple) = node.child("simpleType") {
            Content::Simple(simple_type(simple, depth)?)
        } else {
            Content::Simple(SimpleType::builtin(Builtin::Any))
        };

        Ok(ElementDecl {
            name,
            content,
            min,
            max,
        })
    }

    fn complex_type(&self, node: &XmlNode, depth: usize) -> Result<ComplexType> {
        let depth = deeper(depth)?;
        let mut complex = ComplexType {
            mixed: node.attribute("mixed") == Some("true"),
            ..ComplexType::default()
        };
        self.fill_complex(&mut complex, &node.children, depth)?;
        Ok(complex)
    }

    fn fill_complex(
        &self,
        complex: &mut ComplexType,
        children: &[XmlNode],
        depth: usize,
    ) -> Result<()> {
        for child in children {
            match child.local_name() {
                "sequence" | "choice" | "group" => {
                    complex.model = Model::Particle(self.particle(child, depth)?);
                }
                "all" => {
                    let elements = significant_children(child)
                        .map(|element| match element.local_name() {
                            "element" => self.element(element, depth),
                            other => Err(unsupported(other)),
                        })
                        .collect::<Result<Vec<_>>>()?;
                    complex.model = Model::All(elements);
                }
                "attribute" => complex.attributes.push(self.attribute(child, depth)?),
                "anyAttribute" => complex.any_attribute = true,
                "simpleContent" => {
                    let derivation = derivation(child)?;
                    if derivation.local_name() != "extension" {
                        return Err(unsupported("simpleContent/restriction"));
                    }
                    let base = required_attribute(derivation, "base")?;
                    complex.text = Some(SimpleType::named(local_part(&base)));
                    self.fill_complex(complex, &derivation.children, depth)?;
                }
                "complexContent" => {
                    if child.attribute("mixed") == Some("true") {
                        complex.mixed = true;
                    }
                    let derivation = derivation(child)?;
                    match derivation.local_name() {
                        "extension" => self.extend(complex, derivation, depth)?,
                        "restriction" => {
                            self.fill_complex(complex, &derivation.children, depth)?
                        }
                        other => return Err(unsupported(other)),
                    }
                }
                "annotation" => {}
                other => return Err(unsupported(other)),
            }
        }
        Ok(())
    }

    /// `complexContent/extension`: the base type's content followed by the extension's.
    fn extend(&self, complex: &mut ComplexType, extension: &XmlNode, depth: usize) -> Result<()> {
        let base_name = required_attribute(extension, "base")?;
        let base_node = self
            .complex_types
            .get(local_part(&base_name))
            .ok_or_else(|| {
                QuickloadError::Schema(format!("Unknown base type '{base_name}'"))
            })?;
        let base = self.complex_type(base_node, depth)?;

        let mut own = ComplexType::default();
        self.fill_complex(&mut own, &extension.children, depth)?;

        complex.model = match (base.model, own.model) {
            (Model::Empty, model) | (model, Model::Empty) => model,
            (Model::Particle(inherited), Model::Particle(added)) => {
                Model::Particle(Particle::Group {
                    choice: false,
                    particles: vec![inherited, added],
                    min: 1,
                    max: Some(1),
                })
            }
            _ => {
                return Err(QuickloadError::Schema(format!(
                    "Cannot extend '{base_name}': <all> content cannot be extended"
                )));
            }
        };
        complex.attributes.extend(base.attributes);
        complex.attributes.extend(own.attributes);
        complex.any_attribute |= base.any_attribute || own.any_attribute;
        complex.mixed |= base.mixed;
        Ok(())
    }

    fn particle(&self, node: &XmlNode, depth: usize) -> Result<Particle> {
        let depth = deeper(depth)?;
        let (min, max) = occurs(node)?;

        match node.local_name() {
            "element" => Ok(Particle::Element(self.element(node, depth)?)),
            "any" => Ok(Particle::Any { min, max }),
            "sequence" | "choice" => Ok(Particle::Group {
                choice: node.local_name() == "choice",
                particles: significant_children(node)
                    .map(|child| self.particle(child, depth))
                    .collect::<Result<Vec<_>>>()?,
                min,
                max,
            }),
            "group" => {
                let reference = required_attribute(node, "ref")?;
                let definition = self
                    .groups
                    .get(local_part(&reference))
                    .ok_or_else(|| {
                        QuickloadError::Schema(format!("Unknown group '{reference}'"))
                    })?;
                match self.group_body(definition, depth)? {
                    Particle::Group {
                        choice, particles, ..
                    } => Ok(Particle::Group {
                        choice,
                        particles,
                        min,
                        max,
                    }),
                    _ => Err(unsupported("group")),
                }
            }
            other => Err(unsupported(other)),
        }
    }

    /// The single `sequence` or `choice` inside a named group definition.
    fn group_body(&self, definition: &XmlNode, depth: usize) -> Result<Particle> {
        let body = derivation(definition)?;
        match body.local_name() {
            "sequence" | "choice" => self.particle(body, depth),
            other => Err(unsupported(other)),
        }
    }

    fn attribute(&self, node: &XmlNode, depth: usize) -> Result<AttributeDecl> {
        let (name, declaration) = match node.attribute("ref") {
            Some(reference) => {
                let name = local_part(reference);
                let declaration = self.attributes.get(name).copied().unwrap_or(node);
                (name.to_string(), declaration)
            }
            None => (required_attribute(node, "name")?, node),
        };

        let value = if let Some(type_name) = declaration.attribute("type") {
            SimpleType::named(local_part(type_name))
        } else if let Some(simple) = declaration.child("simpleType") {
            simple_type(simple, depth)?
        } else {
            SimpleType::builtin(Builtin::Text)
        };

        let usage = node.attribute("use");
        Ok(AttributeDecl {
            name,
            required: usage == Some("required"),
            prohibited: usage == Some("prohibited"),
            value,
        })
    }
}

fn simple_type(node: &XmlNode, depth: usize) -> Result<SimpleType> {
    let depth = deeper(depth)?;
    let restriction = derivation(node)?;
    if restriction.local_name() != "restriction" {
        return Err(unsupported(restriction.local_name()));
    }

    let base = match restriction.attribute("base") {
        Some(base) => Base::Named(local_part(base).to_string()),
        None => {
            let inline = restriction.child("simpleType").ok_or_else(|| {
                QuickloadError::Schema("<restriction> needs a base type".to_string())
            })?;
            Base::Inline(Box::new(simple_type(inline, depth)?))
        }
    };

    let mut facets = Vec::new();
    let mut enumeration = Vec::new();
    let mut patterns = Vec::new();

    for facet in &restriction.children {
        let value = || required_attribute(facet, "value");
        match facet.local_name() {
            "enumeration" => enumeration.push(value()?),
            "pattern" => patterns.push(compile_pattern(&value()?)?),
            "length" => facets.push(Facet::Length(parse_count(&value()?)?)),
            "minLength" => facets.push(Facet::MinLength(parse_count(&value()?)?)),
            "maxLength" => facets.push(Facet::MaxLength(parse_count(&value()?)?)),
            "minInclusive" => facets.push(Facet::MinInclusive(parse_limit(&value()?)?)),
            "maxInclusive" => facets.push(Facet::MaxInclusive(parse_limit(&value()?)?)),
            "minExclusive" => facets.push(Facet::MinExclusive(parse_limit(&value()?)?)),
            "maxExclusive" => facets.push(Facet::MaxExclusive(parse_limit(&value()?)?)),
            "whiteSpace" if facet.attribute("value") == Some("preserve") => {}
            "simpleType" | "annotation" => {}
            other => return Err(unsupported(other)),
        }
    }

    if !enumeration.is_empty() {
        facets.push(Facet::Enumeration(enumeration));
    }
    if !patterns.is_empty() {
        facets.push(Facet::Pattern(patterns));
    }

    Ok(SimpleType { base, facets })
}

fn builtin(type_name: &str) -> Builtin {
    let integer = |min: Option<i128>, max: Option<i128>| Builtin::Integer { min, max };
    match type_name {
        "integer" => integer(None, None),
        "long" => integer(Some(i64::MIN.into()), Some(i64::MAX.into())),
        "int" => integer(Some(i32::MIN.into()), Some(i32::MAX.into())),
        "short" => integer(Some(i16::MIN.into()), Some(i16::MAX.into())),
        "byte" => integer(Some(i8::MIN.into()), Some(i8::MAX.into())),
        "nonNegativeInteger" => integer(Some(0), None),
        "positiveInteger" => integer(Some(1), None),
        "nonPositiveInteger" => integer(None, Some(0)),
        "negativeInteger" => integer(None, Some(-1)),
        "unsignedLong" => integer(Some(0), Some(u64::MAX.into())),
        "unsignedInt" => integer(Some(0), Some(u32::MAX.into())),
        "unsignedShort" => integer(Some(0), Some(u16::MAX.into())),
        "unsignedByte" => integer(Some(0), Some(u8::MAX.into())),
        "decimal" => Builtin::Decimal,
        "float" | "double" => Builtin::Float,
        "boolean" => Builtin::Boolean,
        "anyType" => Builtin::Any,
        _ => Builtin::Text,
    }
}

fn builtin_problem(builtin: Builtin, value: &str) -> Option<String> {
    let value = value.trim();
    match builtin {
        Builtin::Any | Builtin::Text => None,
        Builtin::Boolean => (!matches!(value, "true" | "false" | "1" | "0"))
            .then(|| format!("'{value}' is not a boolean")),
        Builtin::Decimal => (!is_decimal(value)).then(|| format!("'{value}' is not a decimal")),
        Builtin::Float => (!is_float(value)).then(|| format!("'{value}' is not a number")),
        Builtin::Integer { min, max } => {
            let Ok(number) = value.parse::<i128>() else {
                return Some(format!("'{value}' is not an integer"));
            };
            if let Some(min) = min.filter(|min| number < *min) {
                return Some(format!("{number} is below the minimum {min}"));
            }
            if let Some(max) = max.filter(|max| number > *max) {
                return Some(format!("{number} is above the maximum {max}"));
            }
            None
        }
    }
}

fn facet_problem(facet: &Facet, value: &str) -> Option<String> {
    let length = value.chars().count();
    let number = || value.trim().parse::<f64>().ok();

    match facet {
        Facet::Enumeration(allowed) if !allowed.iter().any(|a| a == value) => Some(format!(
            "'{value}' is not one of {}",
            allowed.join(", ")
        )),
        Facet::Length(expected) if length != *expected => Some(format!(
            "'{value}' must be exactly {expected} characters long"
        )),
        Facet::MinLength(min) if length < *min => {
            Some(format!("'{value}' is shorter than {min} characters"))
        }
        Facet::MaxLength(max) if length > *max => {
            Some(format!("'{value}' is longer than {max} characters"))
        }
        Facet::Pattern(patterns) if !patterns.iter().any(|p| p.is_match(value)) => {
            Some(format!("'{value}' does not match the required pattern"))
        }
        Facet::MinInclusive(limit) if number().is_some_and(|n| n < *limit) => {
            Some(format!("'{value}' is below {limit}"))
        }
        Facet::MaxInclusive(limit) if number().is_some_and(|n| n > *limit) => {
            Some(format!("'{value}' is above {limit}"))
        }
        Facet::MinExclusive(limit) if number().is_some_and(|n| n <= *limit) => {
            Some(format!("'{value}' must be greater than {limit}"))
        }
        Facet::MaxExclusive(limit) if number().is_some_and(|n| n >= *limit) => {
            Some(format!("'{value}' must be less than {limit}"))
        }
        _ => None,
    }
}

fn is_decimal(value: &str) -> bool {
    let unsigned = value.strip_prefix(['+', '-']).unwrap_or(value);
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    !(whole.is_empty() && fraction.is_empty())
        && whole.chars().all(|c| c.is_ascii_digit())
        && fraction.chars().all(|c| c.is_ascii_digit())
}

/// `f64::from_str` also takes `inf` and `nan`; the lexical space only has these spellings.
fn is_float(value: &str) -> bool {
    if matches!(value, "INF" | "-INF" | "NaN") {
        return true;
    }
    let digits_only = value
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'));
    digits_only && value.parse::<f64>().is_ok()
}

/// XSD patterns match the whole value.
fn compile_pattern(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
        QuickloadError::Schema(format!("Unsupported pattern '{pattern}': {e}"))
    })
}

fn parse_count(value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| QuickloadError::Schema(format!("Invalid length facet '{value}'")))
}

fn parse_limit(value: &str) -> Result<f64> {
    value
        .trim()
        .parse()
        .map_err(|_| QuickloadError::Schema(format!("Invalid bound '{value}'")))
}

fn occurs(node: &XmlNode) -> Result<(u32, Option<u32>)> {
    let min = match node.attribute("minOccurs") {
        Some(value) => parse_occurs(value)?,
        None => 1,
    };
    let max = match node.attribute("maxOccurs") {
        Some("unbounded") => None,
        Some(value) => Some(parse_occurs(value)?),
        None => Some(1),
    };
    Ok((min, max))
}

fn parse_occurs(value: &str) -> Result<u32> {
    value
        .trim()
        .parse()
        .map_err(|_| QuickloadError::Schema(format!("Invalid occurrence bound '{value}'")))
}

fn deeper(depth: usize) -> Result<usize> {
    if depth >= MAX_DEPTH {
        return Err(QuickloadError::Schema(
            "Schema nests groups or derivations too deeply".to_string(),
        ));
    }
    Ok(depth + 1)
}

/// The one child of `node` that is not an annotation.
fn derivation(node: &XmlNode) -> Result<&XmlNode> {
    significant_children(node).next().ok_or_else(|| {
        QuickloadError::Schema(format!("<{}> has no content", node.name))
    })
}

fn significant_children(node: &XmlNode) -> impl Iterator<Item = &XmlNode> {
    node.children
        .iter()
        .filter(|child| child.local_name() != "annotation")
}

fn required_attribute(node: &XmlNode, name: &str) -> Result<String> {
    node.attribute(name).map(str::to_string).ok_or_else(|| {
        QuickloadError::Schema(format!("<{}> is missing the '{name}' attribute", node.name))
    })
}

fn is_namespace_attribute(key: &str) -> bool {
    key == "xmlns" || key.starts_with("xmlns:") || key.starts_with("xsi:")
}

fn unsupported(construct: &str) -> QuickloadError {
    QuickloadError::Schema(format!("Unsupported schema construct <{construct}>"))
}
