//! Partial dependence line chart stacked over the predictor's histogram.

use super::scale::{LinearScale, nice_ticks, padded_extent, tick_label};
use super::{AXIS, ChartSize, GRID, INK, MUTED, SvgDocument};
use crate::pdp::PartialDependence;

const LEFT: f64 = 80.0;
const RIGHT: f64 = 24.0;
const TOP: f64 = 48.0;
const BOTTOM: f64 = 48.0;
const GAP: f64 = 28.0;
/// Share of the plotting height given to the line panel.
const LINE_SHARE: f64 = 0.68;

pub fn partial_dependence_chart(pd: &PartialDependence, size: ChartSize) -> SvgDocument {
    let title = format!("Partial dependence: {}", pd.predictor);
    let mut doc = SvgDocument::new(size, title.clone());
    let (w, h) = (size.width as f64, size.height as f64);
    let plot_h = h - TOP - BOTTOM - GAP;
    let line_bottom = TOP + plot_h * LINE_SHARE;
    let hist_top = line_bottom + GAP;
    let hist_bottom = h - BOTTOM;

    let categorical = pd.points.iter().any(|p| p.label.is_some());
    let xs = pd.points.iter().map(|p| p.predictor_value);
    let (x_lo, x_hi) = if categorical {
        (-0.5, pd.points.len() as f64 - 0.5)
    } else {
        let lo = xs.clone().fold(f64::INFINITY, f64::min);
        let hi = xs.fold(f64::NEG_INFINITY, f64::max);
        if hi > lo { (lo, hi) } else { (lo - 0.5, hi + 0.5) }
    };
    let x = LinearScale::new((x_lo, x_hi), (LEFT, w - RIGHT));

    let (y_lo, y_hi) = padded_extent(pd.points.iter().map(|p| p.mean_prediction), 0.05);
    let y = LinearScale::new((y_lo, y_hi), (line_bottom, TOP));

    let max_count = pd.histogram.iter().map(|b| b.count).max().unwrap_or(0).max(1) as f64;
    let hy = LinearScale::new((0.0, max_count), (hist_bottom, hist_top));

    doc.text((w / 2.0, TOP / 2.0), title, 16.0, "middle");

    // line panel
    for tick in nice_ticks(y_lo, y_hi, 5) {
        let py = y.map(tick);
        doc.line((LEFT, py), (w - RIGHT, py), GRID, 1.0);
        doc.text((LEFT - 8.0, py + 4.0), tick_label(tick), 11.0, "end");
    }
    doc.line((LEFT, TOP), (LEFT, line_bottom), AXIS, 1.0);
    doc.vertical_text((18.0, (TOP + line_bottom) / 2.0), "average prediction", 12.0);
    let points: Vec<(f64, f64)> = pd
        .points
        .iter()
        .map(|p| (x.map(p.predictor_value), y.map(p.mean_prediction)))
        .collect();
    doc.polyline(&points, INK, 2.0);
    if categorical {
        for &(px, py) in &points {
            doc.rect(px - 3.0, py - 3.0, 6.0, 6.0, INK);
        }
    }

    // histogram panel
    for bin in &pd.histogram {
        let x0 = x.map_clamped(bin.lower);
        let x1 = x.map_clamped(bin.upper);
        let top = hy.map(bin.count as f64);
        doc.rect(x0 + 0.5, top, x1 - x0 - 1.0, hist_bottom - top, MUTED);
    }
    doc.line((LEFT, hist_top), (LEFT, hist_bottom), AXIS, 1.0);
    doc.line((LEFT, hist_bottom), (w - RIGHT, hist_bottom), AXIS, 1.0);
    doc.text((LEFT - 8.0, hist_top + 4.0), tick_label(max_count), 11.0, "end");
    doc.text((LEFT - 8.0, hist_bottom), "0", 11.0, "end");
    doc.vertical_text((18.0, (hist_top + hist_bottom) / 2.0), "count", 12.0);

    // shared x axis
    if categorical {
        for p in &pd.points {
            let label = p.label.clone().unwrap_or_default();
            doc.text((x.map(p.predictor_value), hist_bottom + 18.0), label, 11.0, "middle");
        }
    } else {
        for tick in nice_ticks(x_lo, x_hi, 7) {
            doc.text((x.map(tick), hist_bottom + 18.0), tick_label(tick), 11.0, "middle");
        }
    }
    doc.text(
        ((LEFT + w - RIGHT) / 2.0, h - 10.0),
        pd.predictor.clone(),
        12.0,
        "middle",
    );
    doc
}
