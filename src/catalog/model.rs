use crate::catalog::xml_tree::XmlNode;
use crate::error::{QuickloadError, Result};

pub const CATALOG_VERSION: &str = "1.0";
pub const ROOT_ELEMENT: &str = "Products";

const PRODUCT: &str = "Product";
const PRODUCT_NAME: &str = "ProductName";
const PRODUCT_DESCRIPTION: &str = "ProductDescription";
const WORKPLAN: &str = "Workplan";
const STEP: &str = "Step";
const STEP_NUMBER: &str = "Number";
const STEP_FUNCTION: &str = "Function";
const STEP_PARAMETER: &str = "Parameter";
const STEP_DESCRIPTION: &str = "FunctionDescription";

/// Step numbers advance by this much inside one workplan
const STEP_INCREMENT: u32 = 10;

/// A catalog document, held as its parsed `<Products>` tree.
///
/// Appending only adds a `<Product>` subtree at the end of the root. Every other
/// element and attribute, including ones this tool knows nothing about, is
/// written back as it was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    root: XmlNode,
}

/// Read-only view of one `<Product>`; absent children read as empty text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub name: String,
    pub description: String,
    pub workplan: Option<Workplan>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Workplan {
    pub steps: Vec<Step>,
}

/// Step texts as found in the document, numbers included
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub number: String,
    pub function: String,
    pub parameter: String,
    pub description: String,
}

/// A step as requested by the operator, before it is numbered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSpec {
    pub function: String,
    pub parameter: u32,
    pub description: String,
}

impl StepSpec {
    pub fn new(
        function: impl Into<String>,
        parameter: u32,
        description: impl Into<String>,
    ) -> Self {
        Self {
            function: function.into(),
            parameter,
            description: description.into(),
        }
    }

    fn matches(&self, step: &Step) -> bool {
        step.function == self.function
            && step.parameter == self.parameter.to_string()
            && step.description == self.description
    }

    fn to_node(&self, number: u32) -> XmlNode {
        let mut step = XmlNode::new(STEP);
        step.children = vec![
            XmlNode::with_text(STEP_NUMBER, number.to_string()),
            XmlNode::with_text(STEP_FUNCTION, self.function.as_str()),
            XmlNode::with_text(STEP_PARAMETER, self.parameter.to_string()),
            XmlNode::with_text(STEP_DESCRIPTION, self.description.as_str()),
        ];
        step
    }
}

impl Product {
    fn from_node(node: &XmlNode) -> Self {
        Self {
            name: text_of(node, PRODUCT_NAME),
            description: text_of(node, PRODUCT_DESCRIPTION),
            workplan: node.child(WORKPLAN).map(Workplan::from_node),
        }
    }
}

impl Workplan {
    fn from_node(node: &XmlNode) -> Self {
        let steps = node
            .children
            .iter()
            .filter(|child| child.local_name() == STEP)
            .map(|step| Step {
                number: text_of(step, STEP_NUMBER),
                function: text_of(step, STEP_FUNCTION),
                parameter: text_of(step, STEP_PARAMETER),
                description: text_of(step, STEP_DESCRIPTION),
            })
            .collect();
        Self { steps }
    }

    fn matches(&self, specs: &[StepSpec]) -> bool {
        self.steps.len() == specs.len()
            && self
                .steps
                .iter()
                .zip(specs)
                .all(|(step, spec)| spec.matches(step))
    }
}

impl Catalog {
    pub fn empty(creator: &str) -> Self {
        let mut root = XmlNode::new(ROOT_ELEMENT);
        root.attributes = vec![
            ("Version".to_string(), CATALOG_VERSION.to_string()),
            ("Creator".to_string(), creator.to_string()),
        ];
        Self { root }
    }

    /// Accepts any well-formed document whose root is `<Products>`.
    pub fn from_root(root: XmlNode) -> Result<Self> {
        if root.local_name() != ROOT_ELEMENT {
            return Err(QuickloadError::CatalogParsing(format!(
                "Expected <{ROOT_ELEMENT}> root, found <{}>",
                root.name
            )));
        }
        Ok(Self { root })
    }

    pub fn from_xml(content: &str) -> Result<Self> {
        Self::from_root(XmlNode::parse(content)?)
    }

    pub fn version(&self) -> &str {
        self.root.attribute("Version").unwrap_or_default()
    }

    pub fn creator(&self) -> &str {
        self.root.attribute("Creator").unwrap_or_default()
    }

    pub fn products(&self) -> Vec<Product> {
        self.product_nodes().map(Product::from_node).collect()
    }

    /// True when a product with this exact name already carries this exact workplan.
    pub fn exists(&self, name: &str, steps: &[StepSpec]) -> bool {
        self.product_nodes()
            .map(Product::from_node)
            .any(|product| {
                product.name == name
                    && product
                        .workplan
                        .as_ref()
                        .is_some_and(|workplan| workplan.matches(steps))
            })
    }

    /// Adds a product whose workplan is numbered 10, 20, 30, ...
    pub fn append(&mut self, name: &str, description: &str, steps: &[StepSpec]) {
        let mut workplan = XmlNode::new(WORKPLAN);
        workplan.children = steps
            .iter()
            .zip(1u32..)
            .map(|(spec, position)| spec.to_node(position * STEP_INCREMENT))
            .collect();

        let mut product = XmlNode::new(PRODUCT);
        product.children = vec![
            XmlNode::with_text(PRODUCT_NAME, name),
            XmlNode::with_text(PRODUCT_DESCRIPTION, description),
            workplan,
        ];

        self.root.children.push(product);
    }

    pub fn to_xml(&self) -> Result<String> {
        self.root.to_document()
    }

    fn product_nodes(&self) -> impl Iterator<Item = &XmlNode> {
        self.root
            .children
            .iter()
            .filter(|child| child.local_name() == PRODUCT)
    }
}

fn text_of(node: &XmlNode, child: &str) -> String {
    node.child_text(child).unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn red_release() -> StepSpec {
        StepSpec::new("RR", 1, "release red workpiece")
    }

    fn national() -> StepSpec {
        StepSpec::new("SN", 1, "national distribution")
    }

    fn numbers(product: &Product) -> Vec<String> {
        product
            .workplan
            .as_ref()
            .unwrap()
            .steps
            .iter()
            .map(|step| step.number.clone())
            .collect()
    }

    #[test]
    fn append_numbers_first_step_ten() {
        let mut catalog = Catalog::empty("Festo Didactic");
        catalog.append("Widget A", "test", &[red_release()]);

        let products = catalog.products();
        assert_eq!(products.len(), 1);
        let steps = &products[0].workplan.as_ref().unwrap().steps;
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].number, "10");
        assert_eq!(steps[0].parameter, "1");

        assert!(catalog.exists("Widget A", &[red_release()]));
        assert!(!catalog.exists("Widget A", &[red_release(), national()]));
    }

    #[test]
    fn step_numbers_restart_for_each_product() {
        let mut catalog = Catalog::empty("Festo Didactic");
        catalog.append("First", "", &[red_release(), national(), national()]);
        catalog.append("Second", "", &[red_release(), national()]);

        let products = catalog.products();
        assert_eq!(numbers(&products[0]), vec!["10", "20", "30"]);
        assert_eq!(numbers(&products[1]), vec!["10", "20"]);
    }

    #[test]
    fn append_leaves_existing_products_untouched() {
        let mut catalog = Catalog::empty("Festo Didactic");
        catalog.append("A", "first", &[red_release()]);
        catalog.append("B", "second", &[national()]);
        let before = catalog.products();

        catalog.append("A", "again", &[national()]);

        let after = catalog.products();
        assert_eq!(&after[..2], &before[..]);
        assert_eq!(after[2].description, "again");
    }

    #[test]
    fn exists_requires_name_and_ordered_steps() {
        let mut catalog = Catalog::empty("Festo Didactic");
        catalog.append("Widget", "", &[red_release(), national()]);

        assert!(catalog.exists("Widget", &[red_release(), national()]));
        assert!(!catalog.exists("Widget", &[national(), red_release()]));
        assert!(!catalog.exists("widget", &[red_release(), national()]));
        assert!(!catalog.exists("Widget", &[red_release()]));
        assert!(!catalog.exists(
            "Widget",
            &[StepSpec::new("RR", 2, "release red workpiece"), national()]
        ));
    }

    #[test]
    fn same_name_with_other_steps_is_distinct() {
        let mut catalog = Catalog::empty("Festo Didactic");
        catalog.append("Widget", "", &[red_release()]);
        assert!(!catalog.exists("Widget", &[national()]));

        catalog.append("Widget", "", &[national()]);
        assert!(catalog.exists("Widget", &[red_release()]));
        assert!(catalog.exists("Widget", &[national()]));
    }

    #[test]
    fn product_without_workplan_never_matches() {
        let catalog = Catalog::from_xml(
            r#"<Products Version="1.0" Creator="x"><Product><ProductName>Bare</ProductName><ProductDescription>d</ProductDescription></Product></Products>"#,
        )
        .unwrap();

        let products = catalog.products();
        assert_eq!(products.len(), 1);
        assert!(products[0].workplan.is_none());
        assert!(!catalog.exists("Bare", &[]));
    }

    #[test]
    fn parses_hand_written_catalog() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<Products Version="1.0" Creator="Festo Didactic">
  <Product>
    <ProductName>Widget A</ProductName>
    <ProductDescription>test</ProductDescription>
    <Workplan>
      <Step>
        <Number>10</Number>
        <Function>RR</Function>
        <Parameter>1</Parameter>
        <FunctionDescription>release red workpiece</FunctionDescription>
      </Step>
    </Workplan>
  </Product>
</Products>
"#;
        let catalog = Catalog::from_xml(xml).unwrap();
        assert_eq!(catalog.version(), "1.0");
        assert_eq!(catalog.creator(), "Festo Didactic");
        assert!(catalog.exists("Widget A", &[red_release()]));
    }

    #[test]
    fn loose_step_numbers_are_read_as_text() {
        let catalog = Catalog::from_xml(
            r#"<Products Version="1.0" Creator="x">
  <Product>
    <ProductName>Keep me</ProductName>
    <ProductDescription/>
    <Workplan>
      <Step><Function>RR</Function><Parameter>1</Parameter><FunctionDescription>release red workpiece</FunctionDescription></Step>
      <Step><Number>twenty</Number><Function>SN</Function><Parameter>1</Parameter><FunctionDescription>national distribution</FunctionDescription></Step>
    </Workplan>
  </Product>
</Products>"#,
        )
        .unwrap();

        let products = catalog.products();
        assert_eq!(numbers(&products[0]), vec!["", "twenty"]);
        assert!(catalog.exists("Keep me", &[red_release(), national()]));
    }

    #[test]
    fn products_separated_by_other_elements_are_all_read() {
        let catalog = Catalog::from_xml(
            r#"<Products Version="1.0" Creator="x"><Product><ProductName>One</ProductName></Product><Note>between</Note><Product><ProductName>Two</ProductName></Product></Products>"#,
        )
        .unwrap();

        let names: Vec<String> = catalog.products().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["One", "Two"]);
    }

    #[test]
    fn append_keeps_unknown_content_of_existing_products() {
        let mut catalog = Catalog::from_xml(
            r#"<Products Version="1.0" Creator="Festo Didactic" Site="Line4">
  <Product>
    <ProductName>Old</ProductName>
    <ProductDescription>kept</ProductDescription>
    <Picture src="old.png"/>
    <Workplan>
      <Step>
        <Number>10</Number>
        <Function>RR</Function>
        <Parameter>1</Parameter>
        <FunctionDescription>release red workpiece</FunctionDescription>
        <ErrorStep>90</ErrorStep>
      </Step>
    </Workplan>
  </Product>
</Products>"#,
        )
        .unwrap();

        catalog.append("New", "added", &[national()]);
        let xml = catalog.to_xml().unwrap();

        assert!(xml.contains(r#"<Products Version="1.0" Creator="Festo Didactic" Site="Line4">"#));
        assert!(xml.contains(r#"<Picture src="old.png"/>"#));
        assert!(xml.contains("<ErrorStep>90</ErrorStep>"));

        let reparsed = Catalog::from_xml(&xml).unwrap();
        assert_eq!(reparsed.products().len(), 2);
        assert!(reparsed.exists("Old", &[red_release()]));
        assert!(reparsed.exists("New", &[national()]));
    }

    #[test]
    fn serialized_catalog_parses_back_to_same_document() {
        let mut catalog = Catalog::empty("Festo Didactic");
        catalog.append("Widget A", "test", &[red_release(), national()]);
        catalog.append("Widget B", "other", &[national()]);

        let xml = catalog.to_xml().unwrap();
        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="utf-8"?>"#));
        assert!(xml.contains("\n  <Product>"));

        assert_eq!(Catalog::from_xml(&xml).unwrap(), catalog);
    }

    #[test]
    fn rejects_foreign_root() {
        let err = Catalog::from_xml("<Inventory/>").unwrap_err();
        assert!(matches!(err, QuickloadError::CatalogParsing(_)));
    }

    #[test]
    fn rejects_malformed_xml() {
        let err = Catalog::from_xml("<Products><Product>").unwrap_err();
        assert!(matches!(err, QuickloadError::CatalogParsing(_)));
    }
}
