//! Minimal XML element representation shared by the stream engine, feature
//! handlers, and transports.
//!
//! This is a value type, not a parser: transports parse the wire into
//! [`Element`] trees and hand them to the stream, and serialize outgoing
//! elements built here.

// std
use std::{collections::BTreeMap, fmt};

/// Namespace-qualified element name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
	namespace: String,
	local: String,
}
impl QName {
	/// Create a qualified name from a namespace URI and a local name.
	pub fn new(namespace: impl Into<String>, local: impl Into<String>) -> Self {
		Self { namespace: namespace.into(), local: local.into() }
	}

	/// Namespace URI component.
	pub fn namespace(&self) -> &str {
		&self.namespace
	}

	/// Local name component.
	pub fn local(&self) -> &str {
		&self.local
	}
}
impl fmt::Display for QName {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		// Clark notation, e.g. `{http://etherx.jabber.org/streams}stream`.
		write!(f, "{{{}}}{}", self.namespace, self.local)
	}
}

/// An XML element: qualified name, attributes, child elements, and text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element {
	name: QName,
	attributes: BTreeMap<String, String>,
	children: Vec<Element>,
	text: String,
}
impl Element {
	/// Create an empty element with the given qualified name.
	pub fn new(name: QName) -> Self {
		Self { name, attributes: BTreeMap::new(), children: Vec::new(), text: String::new() }
	}

	/// Qualified name of this element.
	pub fn name(&self) -> &QName {
		&self.name
	}

	/// Attribute value by name, e.g. `"to"` or `"xml:lang"`.
	pub fn attr(&self, name: &str) -> Option<&str> {
		self.attributes.get(name).map(String::as_str)
	}

	/// Set an attribute, replacing any previous value.
	pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
		self.attributes.insert(name.into(), value.into());
	}

	/// Remove an attribute, returning its previous value.
	pub fn remove_attr(&mut self, name: &str) -> Option<String> {
		self.attributes.remove(name)
	}

	/// Builder-style [`Self::set_attr`].
	pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.set_attr(name, value);

		self
	}

	/// Character data directly contained by this element.
	pub fn text(&self) -> &str {
		&self.text
	}

	/// Replace the character data of this element.
	pub fn set_text(&mut self, text: impl Into<String>) {
		self.text = text.into();
	}

	/// Builder-style [`Self::set_text`].
	pub fn with_text(mut self, text: impl Into<String>) -> Self {
		self.set_text(text);

		self
	}

	/// Append a child element.
	pub fn push_child(&mut self, child: Element) {
		self.children.push(child);
	}

	/// Builder-style [`Self::push_child`].
	pub fn with_child(mut self, child: Element) -> Self {
		self.push_child(child);

		self
	}

	/// Iterate over child elements in document order.
	pub fn children(&self) -> impl Iterator<Item = &Element> {
		self.children.iter()
	}

	/// Whether the element has neither children nor text.
	pub fn is_empty(&self) -> bool {
		self.children.is_empty() && self.text.is_empty()
	}

	/// First child with the given qualified name.
	pub fn find_child(&self, name: &QName) -> Option<&Element> {
		self.children.iter().find(|child| child.name == *name)
	}

	/// First child within the given namespace, regardless of local name.
	pub fn find_child_in(&self, namespace: &str) -> Option<&Element> {
		self.children.iter().find(|child| child.name.namespace() == namespace)
	}

	/// Serialize the element to a standalone XML string.
	pub fn serialize(&self) -> String {
		let mut out = String::new();

		self.write_into(&mut out, None);

		out
	}

	fn write_into(&self, out: &mut String, parent_namespace: Option<&str>) {
		out.push('<');
		out.push_str(self.name.local());

		if parent_namespace != Some(self.name.namespace()) {
			out.push_str(" xmlns=\"");
			escape_into(out, self.name.namespace(), true);
			out.push('"');
		}

		for (name, value) in &self.attributes {
			out.push(' ');
			out.push_str(name);
			out.push_str("=\"");
			escape_into(out, value, true);
			out.push('"');
		}

		if self.is_empty() {
			out.push_str("/>");

			return;
		}

		out.push('>');
		escape_into(out, &self.text, false);

		for child in &self.children {
			child.write_into(out, Some(self.name.namespace()));
		}

		out.push_str("</");
		out.push_str(self.name.local());
		out.push('>');
	}
}

fn escape_into(out: &mut String, value: &str, attribute: bool) {
	for c in value.chars() {
		match c {
			'&' => out.push_str("&amp;"),
			'<' => out.push_str("&lt;"),
			'>' => out.push_str("&gt;"),
			'"' if attribute => out.push_str("&quot;"),
			_ => out.push(c),
		}
	}
}
