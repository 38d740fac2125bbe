//! Media query lists and their evaluation against a viewport environment.

use std::cell::RefCell;
use std::fmt;

/// The environment media queries are evaluated against.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaEnvironment {
    /// Media type, e.g. `"screen"` or `"print"`.
    pub media_type: String,
    /// Viewport width in CSS pixels.
    pub width: f32,
    /// Viewport height in CSS pixels.
    pub height: f32,
}

impl MediaEnvironment {
    pub fn new(media_type: impl Into<String>, width: f32, height: f32) -> Self {
        Self {
            media_type: media_type.into(),
            width,
            height,
        }
    }

    /// A `screen` environment with the given viewport size.
    pub fn screen(width: f32, height: f32) -> Self {
        Self::new("screen", width, height)
    }

    fn orientation(&self) -> Orientation {
        if self.height >= self.width {
            Orientation::Portrait
        } else {
            Orientation::Landscape
        }
    }
}

impl Default for MediaEnvironment {
    fn default() -> Self {
        Self::screen(1024.0, 768.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Portrait,
    Landscape,
}

/// A single `(feature: value)` test.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaFeature {
    Width(f32),
    MinWidth(f32),
    MaxWidth(f32),
    Height(f32),
    MinHeight(f32),
    MaxHeight(f32),
    Orientation(Orientation),
    /// A feature this engine does not evaluate. Never matches.
    Unknown(String),
}

impl MediaFeature {
    /// Build a feature from its name and (pixel or keyword) value.
    pub fn from_parts(name: &str, value: Option<&str>) -> MediaFeature {
        let px = value.and_then(parse_px);
        match (name, px, value) {
            ("width", Some(v), _) => MediaFeature::Width(v),
            ("min-width", Some(v), _) => MediaFeature::MinWidth(v),
            ("max-width", Some(v), _) => MediaFeature::MaxWidth(v),
            ("height", Some(v), _) => MediaFeature::Height(v),
            ("min-height", Some(v), _) => MediaFeature::MinHeight(v),
            ("max-height", Some(v), _) => MediaFeature::MaxHeight(v),
            ("orientation", _, Some("portrait")) => MediaFeature::Orientation(Orientation::Portrait),
            ("orientation", _, Some("landscape")) => {
                MediaFeature::Orientation(Orientation::Landscape)
            }
            _ => MediaFeature::Unknown(name.to_string()),
        }
    }

    fn matches(&self, env: &MediaEnvironment) -> bool {
        match *self {
            MediaFeature::Width(v) => env.width == v,
            MediaFeature::MinWidth(v) => env.width >= v,
            MediaFeature::MaxWidth(v) => env.width <= v,
            MediaFeature::Height(v) => env.height == v,
            MediaFeature::MinHeight(v) => env.height >= v,
            MediaFeature::MaxHeight(v) => env.height <= v,
            MediaFeature::Orientation(o) => env.orientation() == o,
            MediaFeature::Unknown(_) => false,
        }
    }
}

fn parse_px(value: &str) -> Option<f32> {
    value.strip_suffix("px").unwrap_or(value).parse().ok()
}

/// One query of a comma-separated media query list.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaQuery {
    pub negated: bool,
    /// `None` means `all`.
    pub media_type: Option<String>,
    pub features: Vec<MediaFeature>,
}

impl MediaQuery {
    /// The query `not all`, used in place of a query that failed to parse.
    pub fn not_all() -> Self {
        Self {
            negated: true,
            media_type: None,
            features: Vec::new(),
        }
    }

    fn matches(&self, env: &MediaEnvironment) -> bool {
        let type_matches = match &self.media_type {
            None => true,
            Some(t) => t == "all" || t.eq_ignore_ascii_case(&env.media_type),
        };
        let result = type_matches && self.features.iter().all(|f| f.matches(env));
        result != self.negated
    }

    fn is_viewport_dependent(&self) -> bool {
        self.features
            .iter()
            .any(|f| !matches!(f, MediaFeature::Unknown(_)))
    }
}

/// A comma-separated list of media queries. The list matches if any query
/// matches; an empty list matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaQueryList {
    pub queries: Vec<MediaQuery>,
}

impl MediaQueryList {
    pub fn new(queries: Vec<MediaQuery>) -> Self {
        Self { queries }
    }

    pub fn is_viewport_dependent(&self) -> bool {
        self.queries.iter().any(MediaQuery::is_viewport_dependent)
    }
}

impl fmt::Display for MediaFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaFeature::Width(v) => write!(f, "(width: {v}px)"),
            MediaFeature::MinWidth(v) => write!(f, "(min-width: {v}px)"),
            MediaFeature::MaxWidth(v) => write!(f, "(max-width: {v}px)"),
            MediaFeature::Height(v) => write!(f, "(height: {v}px)"),
            MediaFeature::MinHeight(v) => write!(f, "(min-height: {v}px)"),
            MediaFeature::MaxHeight(v) => write!(f, "(max-height: {v}px)"),
            MediaFeature::Orientation(Orientation::Portrait) => f.write_str("(orientation: portrait)"),
            MediaFeature::Orientation(Orientation::Landscape) => {
                f.write_str("(orientation: landscape)")
            }
            MediaFeature::Unknown(name) => write!(f, "({name})"),
        }
    }
}

impl fmt::Display for MediaQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.negated {
            parts.push("not".to_string());
        }
        match &self.media_type {
            Some(t) => parts.push(t.clone()),
            None if self.negated || self.features.is_empty() => parts.push("all".to_string()),
            None => {}
        }
        for feature in &self.features {
            if !parts.is_empty() {
                parts.push("and".to_string());
            }
            parts.push(feature.to_string());
        }
        f.write_str(&parts.join(" "))
    }
}

impl fmt::Display for MediaQueryList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self
            .queries
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        f.write_str(&text)
    }
}

/// A query list evaluated against viewport features, with the result it had.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaQueryResult {
    pub queries: MediaQueryList,
    pub result: bool,
}

/// Evaluates media query lists against a [`MediaEnvironment`].
///
/// Results of viewport-dependent lists are recorded so a later environment
/// change can tell whether any evaluation would flip.
#[derive(Debug)]
pub struct MediaQueryEvaluator {
    env: MediaEnvironment,
    viewport_dependent: RefCell<Vec<MediaQueryResult>>,
}

impl MediaQueryEvaluator {
    pub fn new(env: MediaEnvironment) -> Self {
        Self {
            env,
            viewport_dependent: RefCell::new(Vec::new()),
        }
    }

    pub fn environment(&self) -> &MediaEnvironment {
        &self.env
    }

    /// Evaluate `queries`. An empty list always matches.
    pub fn eval(&self, queries: &MediaQueryList) -> bool {
        let result =
            queries.queries.is_empty() || queries.queries.iter().any(|q| q.matches(&self.env));
        if queries.is_viewport_dependent() {
            self.viewport_dependent.borrow_mut().push(MediaQueryResult {
                queries: queries.clone(),
                result,
            });
        }
        result
    }

    /// Drain the recorded viewport-dependent results.
    pub fn take_viewport_dependent_results(&self) -> Vec<MediaQueryResult> {
        std::mem::take(&mut *self.viewport_dependent.borrow_mut())
    }

    /// Whether any of `results` evaluates differently in this environment.
    pub fn any_result_changed(&self, results: &[MediaQueryResult]) -> bool {
        results.iter().any(|r| {
            let now = r.queries.queries.is_empty()
                || r.queries.queries.iter().any(|q| q.matches(&self.env));
            now != r.result
        })
    }
}

impl Default for MediaQueryEvaluator {
    fn default() -> Self {
        Self::new(MediaEnvironment::default())
    }
}
