//! Hadoop `<configuration>` XML documents.
//!
//! The base document is held as a small element tree so that everything the
//! merge does not touch (the prolog, comments, `<description>` elements,
//! attributes) survives a round trip.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesCData, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::document::{ConfigDocument, Overlay, no_base};
use crate::error::{Error, Result};
use crate::file::ConfigFile;

const PROPERTY: &str = "property";
const NAME: &str = "name";
const VALUE: &str = "value";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    fn with_text(name: &str, text: &str) -> Self {
        let mut element = Self::new(name);
        element.set_text(text);
        element
    }

    fn property(name: &str, value: &str) -> Self {
        let mut element = Self::new(PROPERTY);
        element.children.push(Node::Element(Self::with_text(NAME, name)));
        element.children.push(Node::Element(Self::with_text(VALUE, value)));
        element
    }

    fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|element| element.name == name)
    }

    fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(text) | Node::CData(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    fn set_text(&mut self, text: &str) {
        self.children = vec![Node::Text(text.to_string())];
    }

    fn set_child_text(&mut self, name: &str, text: &str) {
        for node in &mut self.children {
            if let Node::Element(element) = node
                && element.name == name
            {
                element.set_text(text);
                return;
            }
        }
        self.children.push(Node::Element(Self::with_text(name, text)));
    }

    /// `(name, value)` of a `<property>` element.
    fn as_property(&self) -> Option<(String, String)> {
        if self.name != PROPERTY {
            return None;
        }
        let name = self.child(NAME)?.text();
        let value = self.child(VALUE).map(Element::text).unwrap_or_default();
        Some((name, value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Tree {
    prolog: String,
    root: Element,
}

impl Tree {
    fn parse(text: &str, file: &str) -> Result<Self> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(true);

        let mut prolog = String::new();
        let mut stack: Vec<Element> = Vec::new();
        let mut root = None;

        loop {
            let before = reader.buffer_position() as usize;
            let event = reader.read_event().map_err(|e| Error::parse(file, e))?;
            match event {
                Event::Start(start) => {
                    if stack.is_empty() && root.is_none() {
                        prolog = text.get(..before).unwrap_or_default().trim().to_string();
                    }
                    stack.push(open(&start, file)?);
                }
                Event::Empty(start) => {
                    if stack.is_empty() && root.is_none() {
                        prolog = text.get(..before).unwrap_or_default().trim().to_string();
                    }
                    attach(&mut stack, &mut root, open(&start, file)?);
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| Error::parse(file, "unbalanced closing tag"))?;
                    attach(&mut stack, &mut root, element);
                }
                Event::Text(content) => {
                    let content = content.unescape().map_err(|e| Error::parse(file, e))?;
                    push_node(&mut stack, Node::Text(content.into_owned()));
                }
                Event::CData(content) => {
                    push_node(&mut stack, Node::CData(String::from_utf8_lossy(&content).into_owned()));
                }
                Event::Comment(content) => {
                    push_node(&mut stack, Node::Comment(String::from_utf8_lossy(&content).into_owned()));
                }
                Event::Eof => break,
                // declaration, processing instructions and doctype only live in the prolog
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(Error::parse(file, "unexpected end of document"));
        }
        let root = root.ok_or_else(|| Error::parse(file, "document has no root element"))?;
        Ok(Self { prolog, root })
    }

    fn render(&self, file: &str) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b'\t', 1);
        write_element(&mut writer, &self.root, file)?;
        let body = String::from_utf8_lossy(&writer.into_inner()).into_owned();

        if self.prolog.is_empty() {
            Ok(format!("{body}\n"))
        } else {
            Ok(format!("{}\n{body}\n", self.prolog))
        }
    }

    fn properties(&self) -> impl Iterator<Item = (String, String)> + '_ {
        self.root.elements().filter_map(Element::as_property)
    }
}

fn open(start: &BytesStart<'_>, file: &str) -> Result<Element> {
    let mut element = Element::new(&String::from_utf8_lossy(start.name().as_ref()));
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| Error::parse(file, e))?;
        let value = attribute.unescape_value().map_err(|e| Error::parse(file, e))?;
        element.attributes.push((
            String::from_utf8_lossy(attribute.key.as_ref()).into_owned(),
            value.into_owned(),
        ));
    }
    Ok(element)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(element)),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

fn push_node(stack: &mut [Element], node: Node) {
    // nodes outside the root element are dropped
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element, file: &str) -> Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        return writer
            .write_event(Event::Empty(start))
            .map_err(|e| Error::parse(file, e));
    }

    writer
        .write_event(Event::Start(start))
        .map_err(|e| Error::parse(file, e))?;
    for node in &element.children {
        let written = match node {
            Node::Element(child) => {
                write_element(writer, child, file)?;
                continue;
            }
            Node::Text(text) => writer.write_event(Event::Text(BytesText::new(text))),
            Node::CData(text) => writer.write_event(Event::CData(BytesCData::new(text.as_str()))),
            Node::Comment(text) => writer.write_event(Event::Comment(BytesText::from_escaped(text.as_str()))),
        };
        written.map_err(|e| Error::parse(file, e))?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(|e| Error::parse(file, e))
}

/// Read the `<property>` entries of a Hadoop XML document, in document order.
pub fn read_properties(text: &str, file: &str) -> Result<Vec<(String, String)>> {
    Ok(Tree::parse(text, file)?.properties().collect())
}

/// A Hadoop XML config file such as `yarn-site.xml`.
#[derive(Debug, Clone)]
pub struct XmlConfig {
    file: ConfigFile,
    path: PathBuf,
    overlay: Overlay,
    base: Option<Tree>,
}

impl XmlConfig {
    /// Create a document for `file` without a base.
    pub fn new(file: ConfigFile) -> Self {
        Self {
            file,
            path: PathBuf::from(file.name()),
            overlay: Overlay::default(),
            base: None,
        }
    }
}

impl ConfigDocument for XmlConfig {
    fn file(&self) -> ConfigFile {
        self.file
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn set_path(&mut self, path: PathBuf) {
        self.path = path;
    }

    fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    fn overlay_mut(&mut self) -> &mut Overlay {
        &mut self.overlay
    }

    fn set_raw(&mut self, text: &str) -> Result<()> {
        self.base = Some(Tree::parse(text, self.file.name())?);
        Ok(())
    }

    fn has_base(&self) -> bool {
        self.base.is_some()
    }

    fn merge(&mut self) -> Result<()> {
        let Self {
            file,
            overlay,
            base,
            ..
        } = self;
        let tree = base.as_mut().ok_or_else(|| no_base(*file))?;
        overlay.check()?;

        let extension = overlay.extension();
        let removal = overlay.removal();
        let mut pending: BTreeSet<&str> = extension.keys().map(String::as_str).collect();

        tree.root.children.retain_mut(|node| {
            let Node::Element(element) = node else {
                return true;
            };
            let Some((name, value)) = element.as_property() else {
                return true;
            };

            if let Some(new_value) = extension.get(&name) {
                pending.remove(name.as_str());
                if &value != new_value {
                    log::debug!("Setting {name} to {new_value}");
                    element.set_child_text(VALUE, new_value);
                }
            } else if let Some(strip) = removal.get(&name) {
                let stripped = value.replace(strip.as_str(), "");
                if stripped.trim().is_empty() {
                    log::debug!("Removing property {name}");
                    return false;
                }
                if stripped != value {
                    log::debug!("Setting {name} to {stripped}");
                    element.set_child_text(VALUE, &stripped);
                }
            }
            true
        });

        for name in pending {
            let value = &extension[name];
            log::debug!("Adding new property {name} with value {value}");
            tree.root
                .children
                .push(Node::Element(Element::property(name, value)));
        }
        Ok(())
    }

    fn to_str(&self) -> Result<String> {
        self.base
            .as_ref()
            .ok_or_else(|| no_base(self.file))?
            .render(self.file.name())
    }

    fn to_dict(&self) -> BTreeMap<String, String> {
        match &self.base {
            Some(tree) => tree.properties().collect(),
            None => self.overlay.extension().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = r#"<?xml version="1.0"?>
<?xml-stylesheet type="text/xsl" href="configuration.xsl"?>
<!-- Site specific YARN configuration properties -->
<configuration>
  <property>
    <name>x</name>
    <value>1</value>
    <description>an &amp; escaped description</description>
  </property>
  <!-- scheduler -->
  <property>
    <name>yarn.scheduler.opts</name>
    <value>-Da=1 -Db=2</value>
  </property>
</configuration>
"#;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn loaded() -> XmlConfig {
        let mut doc = XmlConfig::new(ConfigFile::YarnSite);
        doc.set_raw(BASE).unwrap();
        doc
    }

    #[test]
    fn test_merge_updates_in_place_and_appends_once() {
        let mut doc = loaded();
        doc.extend_with_args(&map(&[("x", "2"), ("y", "3")]));
        doc.merge().unwrap();

        let props = doc.base.as_ref().unwrap().properties().collect::<Vec<_>>();
        assert_eq!(
            props,
            vec![
                ("x".to_string(), "2".to_string()),
                ("yarn.scheduler.opts".to_string(), "-Da=1 -Db=2".to_string()),
                ("y".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut doc = loaded();
        doc.extend_with_args(&map(&[("x", "2"), ("y", "3")]));
        doc.merge().unwrap();
        let first = doc.to_str().unwrap();
        doc.merge().unwrap();
        let second = doc.to_str().unwrap();

        assert_eq!(first, second);
        assert_eq!(second.matches("<name>y</name>").count(), 1);
    }

    #[test]
    fn test_conflict_rejected_before_mutation() {
        let mut doc = loaded();
        let before = doc.to_str().unwrap();
        doc.extend_with_args(&map(&[("x", "2"), ("new", "1")]));
        doc.remove_confs(&map(&[("x", "1")]));

        assert!(matches!(doc.merge(), Err(Error::ConflictingKey { .. })));
        assert_eq!(doc.to_str().unwrap(), before);
    }

    #[test]
    fn test_merge_without_base() {
        let mut doc = XmlConfig::new(ConfigFile::CoreSite);
        doc.extend_with_args(&map(&[("x", "2")]));
        assert!(matches!(doc.merge(), Err(Error::NoBase { .. })));
        assert!(doc.to_str().is_err());
    }

    #[test]
    fn test_removal_strips_substring() {
        let mut doc = loaded();
        doc.remove_confs(&map(&[("yarn.scheduler.opts", " -Db=2")]));
        doc.merge().unwrap();
        assert_eq!(doc.to_dict()["yarn.scheduler.opts"], "-Da=1");
    }

    #[test]
    fn test_removal_deletes_emptied_property() {
        let mut doc = loaded();
        doc.remove_confs(&map(&[("x", "1")]));
        doc.merge().unwrap();

        assert!(!doc.to_dict().contains_key("x"));
        assert!(!doc.to_str().unwrap().contains("<name>x</name>"));
    }

    #[test]
    fn test_round_trip_keeps_prolog_and_comments() {
        let doc = loaded();
        let out = doc.to_str().unwrap();

        assert!(out.starts_with("<?xml version=\"1.0\"?>\n<?xml-stylesheet"));
        assert!(out.contains("<!-- Site specific YARN configuration properties -->"));
        assert!(out.contains("<!-- scheduler -->"));
        assert!(out.contains("<description>an &amp; escaped description</description>"));
        assert!(out.contains("\t<property>"));
    }

    #[test]
    fn test_to_dict_without_base_uses_extension() {
        let mut doc = XmlConfig::new(ConfigFile::YarnSite);
        doc.extend_with_args(&map(&[("a", "1")]));
        assert_eq!(doc.to_dict(), map(&[("a", "1")]));
    }

    #[test]
    fn test_empty_document_base() {
        let mut doc = XmlConfig::new(ConfigFile::SslServer);
        doc.set_raw(ConfigFile::SslServer.kind().empty_document()).unwrap();
        doc.extend_with_args(&map(&[("ssl.server.keystore.location", "/etc/keystore.jks")]));
        doc.merge().unwrap();

        assert_eq!(doc.to_dict().len(), 1);
        assert!(doc.to_str().unwrap().starts_with("<configuration>"));
    }

    #[test]
    fn test_commit_writes_loaded_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("yarn-site.xml");
        std::fs::write(&path, BASE).unwrap();

        let mut doc = XmlConfig::new(ConfigFile::YarnSite);
        doc.set_base_config(&path).unwrap();
        doc.extend_with_args(&map(&[("x", "5")]));
        doc.merge().unwrap();
        assert_eq!(doc.commit().unwrap(), path);

        let reread = read_properties(&std::fs::read_to_string(&path).unwrap(), "yarn-site.xml").unwrap();
        assert_eq!(reread[0], ("x".to_string(), "5".to_string()));
    }

    #[test]
    fn test_malformed_document() {
        let mut doc = XmlConfig::new(ConfigFile::YarnSite);
        assert!(matches!(
            doc.set_raw("<configuration><property>"),
            Err(Error::Parse { .. })
        ));
    }
}
