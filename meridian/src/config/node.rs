use std::fmt::Display;
use std::str::FromStr;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::Error;

/// Element of a map document: a name, attributes in document order, text content and child
/// elements.
///
/// This is the generic attributed tree that map documents are read into and written from. The
/// loader never looks at XML directly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigNode {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<ConfigNode>,
}

fn xml_error(err: impl Display) -> Error {
    Error::config(format!("malformed document: {err}"))
}

impl ConfigNode {
    /// Creates an empty element.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Element name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Text content with surrounding whitespace removed.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Sets the text content.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Builder version of [`ConfigNode::set_text`].
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.set_text(text);
        self
    }

    /// Attributes in document order.
    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// Value of the attribute.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value.as_str())
    }

    /// Sets the attribute, replacing the previous value.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl ToString) {
        let name = name.into();
        let value = value.to_string();
        match self.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some((_, current)) => *current = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Builder version of [`ConfigNode::set_attribute`].
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Child elements in document order.
    pub fn children(&self) -> &[ConfigNode] {
        &self.children
    }

    /// Appends a child element.
    pub fn add_child(&mut self, child: ConfigNode) {
        self.children.push(child);
    }

    /// Builder version of [`ConfigNode::add_child`].
    pub fn with_child(mut self, child: ConfigNode) -> Self {
        self.add_child(child);
        self
    }

    /// First child with the name.
    pub fn child(&self, name: &str) -> Option<&ConfigNode> {
        self.children.iter().find(|child| child.name == name)
    }

    /// Reads the root element of an XML document.
    pub fn parse(xml: &str) -> Result<Self, Error> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<ConfigNode> = Vec::new();
        let mut root = None;
        loop {
            let event = reader.read_event().map_err(|err| {
                xml_error(format!("{err} at position {}", reader.buffer_position()))
            })?;

            match event {
                Event::Start(start) => stack.push(Self::from_start(&start)?),
                Event::Empty(start) => {
                    let node = Self::from_start(&start)?;
                    Self::close(node, &mut stack, &mut root)?;
                }
                Event::End(_) => {
                    let node = stack
                        .pop()
                        .ok_or_else(|| xml_error("unexpected closing tag"))?;
                    Self::close(node, &mut stack, &mut root)?;
                }
                Event::Text(text) => {
                    if let Some(node) = stack.last_mut() {
                        node.text.push_str(&text.unescape().map_err(xml_error)?);
                    }
                }
                Event::CData(data) => {
                    if let Some(node) = stack.last_mut() {
                        node.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                    }
                }
                Event::Eof => break,
                Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
            }
        }

        if !stack.is_empty() {
            return Err(xml_error("unexpected end of document"));
        }

        root.ok_or_else(|| xml_error("document has no root element"))
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Self, Error> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut node = Self::new(name);
        for attribute in start.attributes() {
            let attribute = attribute.map_err(xml_error)?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute.unescape_value().map_err(xml_error)?.into_owned();
            node.attributes.push((key, value));
        }

        Ok(node)
    }

    fn close(mut node: ConfigNode, stack: &mut [ConfigNode], root: &mut Option<ConfigNode>) -> Result<(), Error> {
        node.text = node.text.trim().to_string();
        match stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None if root.is_none() => *root = Some(node),
            None => return Err(xml_error("more than one root element")),
        }

        Ok(())
    }

    /// Writes the element as an indented XML document.
    pub fn to_xml(&self) -> Result<String, Error> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .map_err(xml_error)?;
        self.write(&mut writer)?;

        let mut xml = String::from_utf8(writer.into_inner()).map_err(xml_error)?;
        xml.push('\n');
        Ok(xml)
    }

    fn write(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), Error> {
        let mut start = BytesStart::new(self.name.as_str());
        for (name, value) in &self.attributes {
            start.push_attribute((name.as_str(), value.as_str()));
        }

        if self.children.is_empty() && self.text.is_empty() {
            return writer.write_event(Event::Empty(start)).map_err(xml_error);
        }

        writer.write_event(Event::Start(start)).map_err(xml_error)?;
        if !self.text.is_empty() {
            writer
                .write_event(Event::Text(BytesText::new(&self.text)))
                .map_err(xml_error)?;
        }
        for child in &self.children {
            child.write(writer)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new(self.name.as_str())))
            .map_err(xml_error)
    }

    /// Fails if the element has a child not named in `allowed`.
    pub(crate) fn check_children(&self, allowed: &[&str]) -> Result<(), Error> {
        match self
            .children
            .iter()
            .find(|child| !allowed.contains(&child.name.as_str()))
        {
            Some(child) => Err(Error::config(format!(
                "unknown child element '{}' in '{}', expected {}",
                child.name,
                self.name,
                expected_list(allowed)
            ))),
            None => Ok(()),
        }
    }

    /// Value of a required attribute.
    pub(crate) fn required(&self, name: &str) -> Result<&str, Error> {
        self.attribute(name).ok_or_else(|| {
            Error::config(format!(
                "missing required attribute '{name}' in '{}'",
                self.name
            ))
        })
    }

    /// Parses a required attribute.
    pub(crate) fn required_parsed<T>(&self, name: &str) -> Result<T, Error>
    where
        T: FromStr,
        T::Err: Display,
    {
        let value = self.required(name)?;
        parse_value(name, value)
    }

    /// Parses an optional attribute.
    pub(crate) fn parsed<T>(&self, name: &str) -> Result<Option<T>, Error>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.attribute(name)
            .map(|value| parse_value(name, value))
            .transpose()
    }

    /// Parses an optional attribute, falling back to the default.
    pub(crate) fn parsed_or<T>(&self, name: &str, default: T) -> Result<T, Error>
    where
        T: FromStr,
        T::Err: Display,
    {
        Ok(self.parsed(name)?.unwrap_or(default))
    }

    /// Parses an optional boolean attribute. Accepts `true`/`false`, `yes`/`no`, `on`/`off` and
    /// `1`/`0`.
    pub(crate) fn flag(&self, name: &str) -> Result<Option<bool>, Error> {
        self.attribute(name)
            .map(|value| {
                parse_bool(value).ok_or_else(|| {
                    Error::config(format!(
                        "failed to parse attribute '{name}': '{value}' is not a boolean"
                    ))
                })
            })
            .transpose()
    }

    /// Boolean attribute, falling back to the default.
    pub(crate) fn flag_or(&self, name: &str, default: bool) -> Result<bool, Error> {
        Ok(self.flag(name)?.unwrap_or(default))
    }

    /// Parses the text of the first child with the name.
    pub(crate) fn child_parsed<T>(&self, name: &str) -> Result<Option<T>, Error>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.child(name)
            .map(|child| parse_value(name, child.text()))
            .transpose()
    }
}

fn expected_list(allowed: &[&str]) -> String {
    match allowed {
        [] => "no children".to_string(),
        [single] => format!("'{single}'"),
        _ => format!(
            "one of {}",
            allowed
                .iter()
                .map(|name| format!("'{name}'"))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

fn parse_value<T>(name: &str, value: &str) -> Result<T, Error>
where
    T: FromStr,
    T::Err: Display,
{
    value.trim().parse().map_err(|err| {
        Error::config(format!(
            "failed to parse attribute '{name}' value '{value}': {err}"
        ))
    })
}

pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}
