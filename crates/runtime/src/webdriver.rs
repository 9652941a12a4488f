//! Browser agents over the WebDriver protocol.
//!
//! The driver connects to a WebDriver server that is already running
//! (chromedriver, geckodriver, a Selenium grid); provisioning it is out of scope.

use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder, Locator as Query};
use serde_json::{Map, Value, json};
use stepwise::{AgentHandle, Control, Driver, DriverError, DriverResult};
use stepwise_protocol::{BrowserKind, Locator};
use tracing::{debug, info, trace};

pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";

/// WebDriver error fragments meaning the browser session is gone.
const SESSION_LOST_MARKERS: &[&str] = &[
	"invalid session id",
	"no such window",
	"session deleted",
	"session not created",
	"disconnected",
	"connection refused",
	"chrome not reachable",
	"browsing context has been discarded",
];

pub struct WebDriver {
	browser: BrowserKind,
	url: String,
	headless: bool,
	args: Vec<String>,
	name: String,
}

impl WebDriver {
	pub fn new(browser: BrowserKind, url: impl Into<String>) -> Self {
		let url = url.into();
		Self {
			name: format!("{} via {url}", browser_name(browser)),
			browser,
			url,
			headless: false,
			args: Vec::new(),
		}
	}

	pub fn headless(mut self, headless: bool) -> Self {
		self.headless = headless;
		self
	}

	pub fn args(mut self, args: Vec<String>) -> Self {
		self.args = args;
		self
	}

	pub fn capabilities(&self) -> Map<String, Value> {
		capabilities(self.browser, self.headless, &self.args)
	}
}

fn browser_name(browser: BrowserKind) -> &'static str {
	match browser {
		BrowserKind::Chrome => "chrome",
		BrowserKind::Firefox => "firefox",
	}
}

/// Session capabilities for `browser`; Chrome starts maximized like a human would see it.
pub fn capabilities(browser: BrowserKind, headless: bool, extra: &[String]) -> Map<String, Value> {
	let mut caps = Map::new();
	caps.insert("browserName".into(), json!(browser_name(browser)));

	match browser {
		BrowserKind::Chrome => {
			let mut args = vec!["--start-maximized".to_string()];
			if headless {
				args.push("--headless=new".into());
			}
			args.extend(extra.iter().cloned());
			caps.insert("goog:chromeOptions".into(), json!({ "args": args }));
		}
		BrowserKind::Firefox => {
			let mut args = Vec::new();
			if headless {
				args.push("-headless".to_string());
			}
			args.extend(extra.iter().cloned());
			caps.insert("moz:firefoxOptions".into(), json!({ "args": args }));
		}
	}

	caps
}

#[async_trait]
impl Driver for WebDriver {
	fn name(&self) -> &str {
		&self.name
	}

	async fn launch(&self) -> DriverResult<Box<dyn AgentHandle>> {
		debug!(target = "stepwise", url = %self.url, headless = self.headless, "connecting to webdriver");
		let client = ClientBuilder::rustls()
			.capabilities(self.capabilities())
			.connect(&self.url)
			.await
			.map_err(|e| DriverError::Launch(format!("cannot start a session at {}: {e}", self.url)))?;
		info!(target = "stepwise", browser = browser_name(self.browser), "browser session started");
		Ok(Box::new(WebAgent { client }))
	}
}

/// How a [`Locator`] is asked of the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserQuery {
	Css(String),
	XPath(String),
	/// Viewport coordinates, resolved with `document.elementFromPoint`.
	Point(i32, i32),
}

pub fn query_for(locator: &Locator) -> BrowserQuery {
	match locator {
		Locator::Attribute { element, name, value } => BrowserQuery::Css(format!(
			"{}[{name}=\"{}\"]",
			element.as_deref().unwrap_or(""),
			css_string(value)
		)),
		Locator::Role { selector } if selector.starts_with('/') || selector.starts_with('(') => {
			BrowserQuery::XPath(selector.clone())
		}
		Locator::Role { selector } => BrowserQuery::Css(selector.clone()),
		Locator::Text { element: Some(tag), text } => {
			BrowserQuery::XPath(format!("//{tag}[contains(normalize-space(.), {})]", xpath_literal(text)))
		}
		// innermost element holding the text, not every ancestor of it
		Locator::Text { element: None, text } => {
			let literal = xpath_literal(text);
			BrowserQuery::XPath(format!(
				"//*[contains(normalize-space(.), {literal}) and not(.//*[contains(normalize-space(.), {literal})])]"
			))
		}
		Locator::Position { x, y } => BrowserQuery::Point(*x, *y),
	}
}

fn css_string(value: &str) -> String {
	value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn xpath_literal(text: &str) -> String {
	if !text.contains('\'') {
		format!("'{text}'")
	} else if !text.contains('"') {
		format!("\"{text}\"")
	} else {
		let parts: Vec<String> = text.split('\'').map(|part| format!("'{part}'")).collect();
		format!("concat({})", parts.join(", \"'\", "))
	}
}

pub fn classify(message: &str) -> DriverError {
	let lower = message.to_ascii_lowercase();
	if SESSION_LOST_MARKERS.iter().any(|marker| lower.contains(marker)) {
		DriverError::SessionLost(message.to_string())
	} else {
		DriverError::Command(message.to_string())
	}
}

fn cmd_error(err: CmdError) -> DriverError {
	classify(&err.to_string())
}

struct WebAgent {
	client: Client,
}

impl WebAgent {
	async fn first_actionable(&self, query: Query<'_>) -> DriverResult<Option<Element>> {
		let elements = self.client.find_all(query).await.map_err(cmd_error)?;
		for element in elements {
			match actionable(&element).await {
				Ok(true) => return Ok(Some(element)),
				Ok(false) => {}
				Err(err @ DriverError::SessionLost(_)) => return Err(err),
				// stale between find and inspect
				Err(err) => trace!(target = "stepwise", error = %err, "skipping element"),
			}
		}
		Ok(None)
	}
}

async fn actionable(element: &Element) -> DriverResult<bool> {
	Ok(element.is_displayed().await.map_err(cmd_error)? && element.is_enabled().await.map_err(cmd_error)?)
}

const POINT_PRESENT: &str = "return document.elementFromPoint(arguments[0], arguments[1]) !== null;";
const POINT_CLICK: &str = "const el = document.elementFromPoint(arguments[0], arguments[1]);
if (!el) return false;
el.click();
return true;";
const POINT_FILL: &str = "const el = document.elementFromPoint(arguments[0], arguments[1]);
if (!el) return false;
el.focus();
el.value = arguments[2];
el.dispatchEvent(new Event('input', { bubbles: true }));
el.dispatchEvent(new Event('change', { bubbles: true }));
return true;";

#[async_trait]
impl AgentHandle for WebAgent {
	async fn find_control(&self, locator: &Locator) -> DriverResult<Option<Box<dyn Control>>> {
		let control: Option<Box<dyn Control>> = match query_for(locator) {
			BrowserQuery::Css(css) => self
				.first_actionable(Query::Css(&css))
				.await?
				.map(|element| Box::new(ElementControl { element }) as Box<dyn Control>),
			BrowserQuery::XPath(xpath) => self
				.first_actionable(Query::XPath(&xpath))
				.await?
				.map(|element| Box::new(ElementControl { element }) as Box<dyn Control>),
			BrowserQuery::Point(x, y) => {
				let present = self
					.client
					.execute(POINT_PRESENT, vec![json!(x), json!(y)])
					.await
					.map_err(cmd_error)?;
				(present == Value::Bool(true)).then(|| {
					Box::new(PointControl {
						client: self.client.clone(),
						x,
						y,
					}) as Box<dyn Control>
				})
			}
		};
		Ok(control)
	}

	async fn navigate(&self, target: &str) -> DriverResult<()> {
		self.client.goto(target).await.map_err(cmd_error)
	}

	async fn check_health(&self) -> DriverResult<()> {
		self.client.current_url().await.map(|_| ()).map_err(cmd_error)
	}

	async fn close(&self) -> DriverResult<()> {
		self.client.clone().close().await.map_err(cmd_error)
	}
}

struct ElementControl {
	element: Element,
}

#[async_trait]
impl Control for ElementControl {
	async fn fill(&self, text: &str) -> DriverResult<()> {
		self.element.clear().await.map_err(cmd_error)?;
		self.element.send_keys(text).await.map_err(cmd_error)
	}

	async fn activate(&self) -> DriverResult<()> {
		self.element.click().await.map_err(cmd_error)
	}
}

struct PointControl {
	client: Client,
	x: i32,
	y: i32,
}

impl PointControl {
	async fn run(&self, script: &str, extra: Vec<Value>) -> DriverResult<()> {
		let mut args = vec![json!(self.x), json!(self.y)];
		args.extend(extra);
		match self.client.execute(script, args).await.map_err(cmd_error)? {
			Value::Bool(true) => Ok(()),
			_ => Err(DriverError::Command(format!("no element at ({}, {})", self.x, self.y))),
		}
	}
}

#[async_trait]
impl Control for PointControl {
	async fn fill(&self, text: &str) -> DriverResult<()> {
		self.run(POINT_FILL, vec![json!(text)]).await
	}

	async fn activate(&self) -> DriverResult<()> {
		self.run(POINT_CLICK, Vec::new()).await
	}
}
