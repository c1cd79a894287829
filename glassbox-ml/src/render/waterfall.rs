//! Break-down waterfall chart.
//!
//! One row per step, top to bottom. Variable steps are bars from their start
//! to their cumulative sum, coloured by sign; the intercept is a dashed
//! vertical reference and the prediction bar spans intercept to prediction.

use super::scale::{LinearScale, nice_ticks, padded_extent, tick_label};
use super::{AXIS, ChartSize, GRID, INK, NEGATIVE, POSITIVE, SvgDocument};
use crate::breakdown::{DisplayStep, INTERCEPT, PREDICTION, Sign};

const LEFT: f64 = 220.0;
const RIGHT: f64 = 70.0;
const TOP: f64 = 56.0;
const BOTTOM: f64 = 44.0;

pub fn waterfall_chart(steps: &[DisplayStep], size: ChartSize) -> SvgDocument {
    let mut doc = SvgDocument::new(size, "Break-down");
    let (w, h) = (size.width as f64, size.height as f64);
    doc.text((w / 2.0, TOP / 2.0), "Break-down", 16.0, "middle");
    if steps.is_empty() {
        return doc;
    }

    let intercept = steps
        .iter()
        .find(|s| s.variable_name == INTERCEPT)
        .map(|s| s.cumulative_sum)
        .unwrap_or(steps[0].start);
    let (lo, hi) = padded_extent(
        steps
            .iter()
            .filter(|s| s.variable_name != INTERCEPT)
            .flat_map(|s| [s.start, s.cumulative_sum])
            .chain([intercept]),
        0.08,
    );
    let x = LinearScale::new((lo, hi), (LEFT, w - RIGHT));

    for tick in nice_ticks(lo, hi, 6) {
        let px = x.map(tick);
        doc.line((px, TOP), (px, h - BOTTOM), GRID, 1.0);
        doc.text((px, h - BOTTOM + 18.0), tick_label(tick), 11.0, "middle");
    }

    let band = (h - TOP - BOTTOM) / steps.len() as f64;
    let bar = band * 0.6;
    let ix = x.map(intercept);
    let mut previous_end: Option<(f64, f64)> = None;

    for (i, step) in steps.iter().enumerate() {
        let centre = TOP + band * (i as f64 + 0.5);
        let (from, to, fill) = match step.variable_name.as_str() {
            INTERCEPT => (intercept, intercept, INK),
            PREDICTION => (intercept, step.cumulative_sum, INK),
            _ => {
                let fill = match step.sign {
                    Sign::Negative => NEGATIVE,
                    _ => POSITIVE,
                };
                (step.start, step.cumulative_sum, fill)
            }
        };
        let (x0, x1) = (x.map(from.min(to)), x.map(from.max(to)));
        if step.variable_name == INTERCEPT {
            doc.rect(ix - 1.5, centre - bar / 2.0, 3.0, bar, INK);
        } else {
            doc.rect(x0, centre - bar / 2.0, (x1 - x0).max(1.0), bar, fill);
        }

        if let Some((px, py)) = previous_end {
            doc.line((px, py), (px, centre - bar / 2.0), AXIS, 0.8);
        }
        previous_end = Some((x.map(step.cumulative_sum), centre + bar / 2.0));

        doc.text((LEFT - 8.0, centre + 4.0), step.label.clone(), 12.0, "end");
        doc.text(
            (x1 + 6.0, centre + 4.0),
            step.contribution_label.clone(),
            11.0,
            "start",
        );
    }

    doc.dashed_line((ix, TOP), (ix, h - BOTTOM), AXIS, 1.0);
    doc.line((LEFT, h - BOTTOM), (w - RIGHT, h - BOTTOM), AXIS, 1.0);
    doc
}
