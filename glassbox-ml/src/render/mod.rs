//! SVG chart rendering.
//!
//! Chart builders lay out primitives (rects, lines, polylines, texts) in pixel
//! space; [`ChartRenderer`] turns the resulting [`SvgDocument`] into SVG text
//! through a Handlebars template.

pub mod importance;
pub mod partial_dependence;
pub mod scale;
pub mod waterfall;

use crate::error::MlError;
use handlebars::Handlebars;
use serde::Serialize;
use std::path::Path;

pub use importance::importance_chart;
pub use partial_dependence::partial_dependence_chart;
pub use waterfall::waterfall_chart;

pub(crate) const INK: &str = "#371ea3";
pub(crate) const AXIS: &str = "#4a4a4a";
pub(crate) const GRID: &str = "#d9d9d9";
pub(crate) const POSITIVE: &str = "#8bdcbe";
pub(crate) const NEGATIVE: &str = "#f05a71";
pub(crate) const MUTED: &str = "#46bac2";

const SVG_TEMPLATE: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{{width}}" height="{{height}}" viewBox="0 0 {{width}} {{height}}" font-family="Helvetica, Arial, sans-serif">
  <title>{{title}}</title>
  <rect x="0" y="0" width="{{width}}" height="{{height}}" fill="#ffffff"/>
{{#each rects}}  <rect x="{{x}}" y="{{y}}" width="{{width}}" height="{{height}}" fill="{{fill}}" fill-opacity="{{opacity}}"/>
{{/each}}{{#each lines}}  <line x1="{{x1}}" y1="{{y1}}" x2="{{x2}}" y2="{{y2}}" stroke="{{stroke}}" stroke-width="{{width}}"{{#if dash}} stroke-dasharray="{{dash}}"{{/if}}/>
{{/each}}{{#each polylines}}  <polyline points="{{points}}" fill="none" stroke="{{stroke}}" stroke-width="{{width}}"/>
{{/each}}{{#each texts}}  <text x="{{x}}" y="{{y}}" font-size="{{size}}" text-anchor="{{anchor}}" fill="{{fill}}"{{#if rotate}} transform="rotate({{rotate}} {{x}} {{y}})"{{/if}}>{{content}}</text>
{{/each}}</svg>
"##;

/// Chart canvas size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartSize {
    pub width: u32,
    pub height: u32,
}

impl Default for ChartSize {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub fill: String,
    pub opacity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Line {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub stroke: String,
    pub width: f64,
    pub dash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Polyline {
    pub points: String,
    pub stroke: String,
    pub width: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Text {
    pub x: f64,
    pub y: f64,
    pub content: String,
    pub size: f64,
    pub anchor: String,
    pub fill: String,
    pub rotate: Option<f64>,
}

/// Everything drawn on one chart, in pixel coordinates.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SvgDocument {
    pub width: u32,
    pub height: u32,
    pub title: String,
    pub rects: Vec<Rect>,
    pub lines: Vec<Line>,
    pub polylines: Vec<Polyline>,
    pub texts: Vec<Text>,
}

impl SvgDocument {
    pub fn new(size: ChartSize, title: impl Into<String>) -> Self {
        Self {
            width: size.width,
            height: size.height,
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn rect(&mut self, x: f64, y: f64, width: f64, height: f64, fill: &str) {
        self.rects.push(Rect {
            x: scale::round2(x),
            y: scale::round2(y),
            width: scale::round2(width.max(0.0)),
            height: scale::round2(height.max(0.0)),
            fill: fill.to_string(),
            opacity: 1.0,
        });
    }

    pub fn line(&mut self, from: (f64, f64), to: (f64, f64), stroke: &str, width: f64) {
        self.lines.push(Line {
            x1: from.0,
            y1: from.1,
            x2: to.0,
            y2: to.1,
            stroke: stroke.to_string(),
            width,
            dash: None,
        });
    }

    pub fn dashed_line(&mut self, from: (f64, f64), to: (f64, f64), stroke: &str, width: f64) {
        self.line(from, to, stroke, width);
        if let Some(line) = self.lines.last_mut() {
            line.dash = Some("4 3".to_string());
        }
    }

    pub fn polyline(&mut self, points: &[(f64, f64)], stroke: &str, width: f64) {
        let points = points
            .iter()
            .map(|(x, y)| format!("{},{}", x, y))
            .collect::<Vec<_>>()
            .join(" ");
        self.polylines.push(Polyline {
            points,
            stroke: stroke.to_string(),
            width,
        });
    }

    pub fn text(&mut self, at: (f64, f64), content: impl Into<String>, size: f64, anchor: &str) {
        self.texts.push(Text {
            x: at.0,
            y: at.1,
            content: content.into(),
            size,
            anchor: anchor.to_string(),
            fill: AXIS.to_string(),
            rotate: None,
        });
    }

    pub fn vertical_text(&mut self, at: (f64, f64), content: impl Into<String>, size: f64) {
        self.text(at, content, size, "middle");
        if let Some(text) = self.texts.last_mut() {
            text.rotate = Some(-90.0);
        }
    }
}

// `handlebars::html_escape` also encodes `=` and backticks, which every `name = value` label contains.
fn xml_escape(data: &str) -> String {
    let mut out = String::with_capacity(data.len());
    for c in data.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Renders [`SvgDocument`]s to SVG text.
pub struct ChartRenderer {
    registry: Handlebars<'static>,
}

impl ChartRenderer {
    pub fn new() -> Result<Self, MlError> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_escape_fn(xml_escape);
        registry.register_template_string("svg", SVG_TEMPLATE)?;
        Ok(Self { registry })
    }

    pub fn render(&self, document: &SvgDocument) -> Result<String, MlError> {
        Ok(self.registry.render("svg", document)?)
    }

    /// Render and write to `path`, creating parent directories.
    pub fn write(&self, document: &SvgDocument, path: &Path) -> Result<(), MlError> {
        let svg = self.render(document)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, svg)?;
        tracing::info!(path = %path.display(), "Chart written");
        Ok(())
    }
}
