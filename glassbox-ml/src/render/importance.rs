//! Horizontal bar chart of permutation importance.

use super::scale::{LinearScale, nice_ticks, padded_extent, tick_label};
use super::{AXIS, ChartSize, GRID, MUTED, SvgDocument};
use crate::error::MlError;
use crate::importance::FeatureImportance;
use crate::labels::format_number;
use glassbox_core::{ImportanceKind, LossKind};

const LEFT: f64 = 170.0;
const RIGHT: f64 = 60.0;
const TOP: f64 = 56.0;
const BOTTOM: f64 = 52.0;

fn axis_title(loss: LossKind, kind: ImportanceKind) -> String {
    let loss = match loss {
        LossKind::Rmse => "RMSE",
        LossKind::Mse => "MSE",
        LossKind::Mae => "MAE",
    };
    match kind {
        ImportanceKind::Raw => format!("{} after permutation", loss),
        ImportanceKind::Difference => format!("{} increase after permutation", loss),
        ImportanceKind::Ratio => format!("{} ratio to full model", loss),
    }
}

/// Bars start at the reference value (full-model loss, zero or one depending
/// on `kind`); the most important predictor is drawn at the top. Values
/// below the reference are clamped to the axis start.
pub fn importance_chart(
    fi: &FeatureImportance,
    kind: ImportanceKind,
    size: ChartSize,
) -> Result<SvgDocument, MlError> {
    let values = fi.display_values(kind)?;
    let reference = fi.reference_value(kind);
    let mut doc = SvgDocument::new(size, "Feature importance");
    let (w, h) = (size.width as f64, size.height as f64);

    let (_, hi) = padded_extent(values.iter().map(|(_, v)| *v).chain([reference]), 0.05);
    let hi = if hi > reference { hi } else { reference + 1.0 };
    let x = LinearScale::new((reference, hi), (LEFT, w - RIGHT));

    doc.text((w / 2.0, TOP / 2.0), "Feature importance", 16.0, "middle");
    for tick in nice_ticks(reference, hi, 6) {
        let px = x.map(tick);
        doc.line((px, TOP), (px, h - BOTTOM), GRID, 1.0);
        doc.text((px, h - BOTTOM + 18.0), tick_label(tick), 11.0, "middle");
    }

    let n = values.len().max(1) as f64;
    let band = (h - TOP - BOTTOM) / n;
    let bar = band * 0.6;
    // summary is ascending, so the last entry lands on the top row
    for (i, (variable, value)) in values.iter().enumerate() {
        let centre = h - BOTTOM - band * (i as f64 + 0.5);
        let x0 = x.map(reference);
        let x1 = x.map_clamped(*value);
        doc.rect(x0, centre - bar / 2.0, x1 - x0, bar, MUTED);
        doc.text((LEFT - 8.0, centre + 4.0), variable.clone(), 12.0, "end");
        doc.text((x1 + 6.0, centre + 4.0), format_number(*value), 11.0, "start");
    }

    doc.dashed_line((x.map(reference), TOP), (x.map(reference), h - BOTTOM), AXIS, 1.0);
    doc.line((LEFT, h - BOTTOM), (w - RIGHT, h - BOTTOM), AXIS, 1.0);
    doc.text(
        ((LEFT + w - RIGHT) / 2.0, h - 12.0),
        axis_title(fi.loss, kind),
        12.0,
        "middle",
    );
    Ok(doc)
}
