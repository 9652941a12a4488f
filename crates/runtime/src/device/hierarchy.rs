//! `uiautomator dump` parsing and locator matching.

use std::sync::LazyLock;

use regex::Regex;
use stepwise_protocol::Locator;

static NODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<node\b([^>]*?)/?>").unwrap());
static ATTR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"([\w:-]+)="([^"]*)""#).unwrap());
static BOUNDS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[(-?\d+),(-?\d+)\]\[(-?\d+),(-?\d+)\]").unwrap());

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bounds {
	pub left: i32,
	pub top: i32,
	pub right: i32,
	pub bottom: i32,
}

impl Bounds {
	pub fn parse(raw: &str) -> Option<Self> {
		let caps = BOUNDS.captures(raw)?;
		let n = |i: usize| caps[i].parse::<i32>().ok();
		Some(Self {
			left: n(1)?,
			top: n(2)?,
			right: n(3)?,
			bottom: n(4)?,
		})
	}

	pub fn center(&self) -> (i32, i32) {
		((self.left + self.right) / 2, (self.top + self.bottom) / 2)
	}

	pub fn is_empty(&self) -> bool {
		self.right <= self.left || self.bottom <= self.top
	}
}

/// One `<node>` of the view hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiNode {
	pub resource_id: String,
	pub class: String,
	pub text: String,
	pub content_desc: String,
	pub package: String,
	pub enabled: bool,
	pub bounds: Bounds,
}

impl UiNode {
	/// Visible on screen and enabled.
	pub fn is_actionable(&self) -> bool {
		self.enabled && !self.bounds.is_empty()
	}

	pub fn center(&self) -> (i32, i32) {
		self.bounds.center()
	}

	pub fn matches(&self, locator: &Locator) -> bool {
		match locator {
			Locator::Attribute { element, name, value } => {
				self.is_widget(element.as_deref())
					&& match name.as_str() {
						"id" | "resource-id" => {
							self.resource_id == *value || self.resource_id.ends_with(&format!(":id/{value}"))
						}
						"text" => self.text == *value,
						"content-desc" | "desc" => self.content_desc == *value,
						"class" => self.class == *value,
						"package" => self.package == *value,
						_ => false,
					}
			}
			Locator::Role { selector } => self.is_widget(Some(selector)),
			Locator::Text { element, text } => {
				self.is_widget(element.as_deref()) && (self.text.contains(text.as_str()) || self.content_desc.contains(text.as_str()))
			}
			Locator::Position { .. } => false,
		}
	}

	/// `Button` and `android.widget.Button` both name the widget class.
	fn is_widget(&self, widget: Option<&str>) -> bool {
		match widget {
			None => true,
			Some(widget) if widget.contains('.') => self.class == widget,
			Some(widget) => {
				let simple = self.class.rsplit('.').next().unwrap_or(&self.class);
				simple.eq_ignore_ascii_case(widget)
			}
		}
	}
}

/// Parses every node of a dump, in document order.
pub fn parse(xml: &str) -> Vec<UiNode> {
	NODE.captures_iter(xml)
		.map(|node| {
			let mut parsed = UiNode::default();
			for attr in ATTR.captures_iter(&node[1]) {
				let value = unescape(&attr[2]);
				match &attr[1] {
					"resource-id" => parsed.resource_id = value,
					"class" => parsed.class = value,
					"text" => parsed.text = value,
					"content-desc" => parsed.content_desc = value,
					"package" => parsed.package = value,
					"enabled" => parsed.enabled = value == "true",
					"bounds" => parsed.bounds = Bounds::parse(&value).unwrap_or_default(),
					_ => {}
				}
			}
			parsed
		})
		.collect()
}

fn unescape(raw: &str) -> String {
	if !raw.contains('&') {
		return raw.to_string();
	}
	raw.replace("&lt;", "<")
		.replace("&gt;", ">")
		.replace("&quot;", "\"")
		.replace("&apos;", "'")
		.replace("&#10;", "\n")
		.replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
	use super::*;

	const DUMP: &str = r#"<?xml version='1.0' encoding='UTF-8' standalone='yes' ?><hierarchy rotation="0"><node index="0" text="" resource-id="" class="android.widget.FrameLayout" package="com.example.minhascompras" content-desc="" enabled="true" bounds="[0,0][1080,2400]"><node index="0" text="Compras &amp; Lista" resource-id="com.example.minhascompras:id/title" class="android.widget.TextView" package="com.example.minhascompras" content-desc="" enabled="true" bounds="[42,150][600,220]" /><node index="1" text="" resource-id="com.example.minhascompras:id/fab_add" class="android.widget.ImageButton" package="com.example.minhascompras" content-desc="Adicionar item" enabled="true" bounds="[900,2100][1040,2240]" /><node index="2" text="Semana" resource-id="" class="com.google.android.material.chip.Chip" package="com.example.minhascompras" content-desc="" enabled="false" bounds="[100,260][300,340]" /></node></hierarchy>
UI hierchary dumped to: /dev/tty"#;

	#[test]
	fn parses_nodes_in_document_order() {
		let nodes = parse(DUMP);
		assert_eq!(nodes.len(), 4);
		assert_eq!(nodes[1].text, "Compras & Lista");
		assert_eq!(nodes[2].content_desc, "Adicionar item");
		assert_eq!(
			nodes[2].bounds,
			Bounds {
				left: 900,
				top: 2100,
				right: 1040,
				bottom: 2240,
			}
		);
		assert_eq!(nodes[2].center(), (970, 2170));
		assert!(!nodes[3].is_actionable());
	}

	#[test]
	fn locators_match_ids_classes_and_text() {
		let nodes = parse(DUMP);
		let fab = &nodes[2];
		assert!(fab.matches(&Locator::id("fab_add")));
		assert!(fab.matches(&Locator::id("com.example.minhascompras:id/fab_add")));
		assert!(!fab.matches(&Locator::id("add")));
		assert!(fab.matches(&Locator::role("ImageButton")));
		assert!(fab.matches(&Locator::role("android.widget.ImageButton")));
		assert!(fab.matches(&Locator::text("Adicionar")));
		assert!(fab.matches(&Locator::text("Adicionar").on("imagebutton")));
		assert!(!fab.matches(&Locator::text("Adicionar").on("Button")));
		assert!(nodes[3].matches(&Locator::text("Semana").on("Chip")));
		assert!(!fab.matches(&Locator::position(970, 2170)));
	}

	#[test]
	fn malformed_bounds_are_empty() {
		assert_eq!(Bounds::parse("[0,0]"), None);
		assert!(Bounds::default().is_empty());
	}
}
