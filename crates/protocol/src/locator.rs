//! Locator descriptors.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One candidate way of finding a UI control.
///
/// Locators are tried in declared order inside a chain; the first that yields an
/// actionable control wins. Agents interpret each variant in their own terms (CSS and
/// XPath for browsers, the accessibility hierarchy for devices).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "camelCase")]
pub enum Locator {
	/// Control carrying an attribute with an exact value (`id`, `name`, `data-*`, `resource-id`).
	Attribute {
		/// Restricts the match to one element/widget type.
		#[serde(default, skip_serializing_if = "Option::is_none")]
		element: Option<String>,
		name: String,
		value: String,
	},
	/// Structural role: a CSS selector on browsers, a widget class on devices.
	Role { selector: String },
	/// Control whose visible text contains `text`.
	Text {
		#[serde(default, skip_serializing_if = "Option::is_none")]
		element: Option<String>,
		text: String,
	},
	/// Coarse screen coordinates. Only valid as the last entry of a chain.
	Position { x: i32, y: i32 },
}

impl Locator {
	/// Shorthand for an `id` attribute locator.
	pub fn id(value: impl Into<String>) -> Self {
		Self::attribute("id", value)
	}

	pub fn attribute(name: impl Into<String>, value: impl Into<String>) -> Self {
		Self::Attribute {
			element: None,
			name: name.into(),
			value: value.into(),
		}
	}

	pub fn role(selector: impl Into<String>) -> Self {
		Self::Role { selector: selector.into() }
	}

	pub fn text(text: impl Into<String>) -> Self {
		Self::Text {
			element: None,
			text: text.into(),
		}
	}

	pub fn position(x: i32, y: i32) -> Self {
		Self::Position { x, y }
	}

	/// Restricts an attribute or text locator to one element type.
	///
	/// Has no effect on role and positional locators.
	pub fn on(self, tag: impl Into<String>) -> Self {
		match self {
			Self::Attribute { name, value, .. } => Self::Attribute {
				element: Some(tag.into()),
				name,
				value,
			},
			Self::Text { text, .. } => Self::Text {
				element: Some(tag.into()),
				text,
			},
			other => other,
		}
	}

	pub fn is_positional(&self) -> bool {
		matches!(self, Self::Position { .. })
	}

	/// Short identifying key used for default step labels.
	pub fn key(&self) -> String {
		match self {
			Self::Attribute { value, .. } => value.clone(),
			Self::Role { selector } => selector.clone(),
			Self::Text { text, .. } => text.clone(),
			Self::Position { x, y } => format!("{x},{y}"),
		}
	}

	/// Applies `f` to every string payload, leaving coordinates untouched.
	pub fn map_strings<E>(&self, mut f: impl FnMut(&str) -> Result<String, E>) -> Result<Self, E> {
		Ok(match self {
			Self::Attribute { element, name, value } => Self::Attribute {
				element: element.clone(),
				name: name.clone(),
				value: f(value)?,
			},
			Self::Role { selector } => Self::Role { selector: f(selector)? },
			Self::Text { element, text } => Self::Text {
				element: element.clone(),
				text: f(text)?,
			},
			Self::Position { x, y } => Self::Position { x: *x, y: *y },
		})
	}
}

impl fmt::Display for Locator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Attribute { element, name, value } => {
				write!(f, "{}[{name}={value}]", element.as_deref().unwrap_or("attribute"))
			}
			Self::Role { selector } => write!(f, "role({selector})"),
			Self::Text { element: Some(tag), text } => write!(f, "text({tag} ~ \"{text}\")"),
			Self::Text { element: None, text } => write!(f, "text(\"{text}\")"),
			Self::Position { x, y } => write!(f, "position({x},{y})"),
		}
	}
}
