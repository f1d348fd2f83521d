//! SVG rendering of staircase trajectories.
//!
//! One panel per staircase: test sample against trial number. Correct trials
//! are filled markers, incorrect ones hollow; reversals are squares, other
//! trials circles.

use std::path::Path;

use anyhow::Result;
use plotters::coord::Shift;
use plotters::prelude::*;
use staircase_kernel::staircase::Staircase;
use staircase_kernel::trial::TrialRecord;

const PANEL_WIDTH: u32 = 1000;
const PANEL_HEIGHT: u32 = 500;
const MARKER_SIZE: i32 = 4;

/// Render all staircases into a single SVG file.
pub fn render_trajectories(staircases: &[Staircase], path: &Path) -> Result<()> {
    if staircases.is_empty() {
        return Ok(());
    }

    let height = PANEL_HEIGHT * staircases.len() as u32;
    let root = SVGBackend::new(path, (PANEL_WIDTH, height)).into_drawing_area();
    root.fill(&WHITE)?;

    let panels = root.split_evenly((staircases.len(), 1));
    for (staircase, panel) in staircases.iter().zip(panels.iter()) {
        draw_panel(staircase, panel)?;
    }

    root.present()?;
    Ok(())
}

fn draw_panel(staircase: &Staircase, area: &DrawingArea<SVGBackend<'_>, Shift>) -> Result<()> {
    let settings = staircase.settings();
    let (lo, hi) = if settings.start_value < settings.reference {
        (settings.start_value, settings.reference)
    } else {
        (settings.reference, settings.start_value)
    };
    let records = staircase.records();
    let last_trial = records.len().max(1) as f64;

    let mut chart = ChartBuilder::on(area)
        .caption(staircase.name(), ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.5f64..last_trial + 0.5, lo..hi)?;

    chart
        .configure_mesh()
        .x_desc("Test Count")
        .y_desc(format!("Test Sample ({})", settings.units))
        .draw()?;

    chart.draw_series(LineSeries::new(records.iter().map(point), &BLACK))?;
    chart.draw_series(records.iter().filter(|r| r.reversal).map(|r| {
        EmptyElement::at(point(r))
            + Rectangle::new(
                [(-MARKER_SIZE, -MARKER_SIZE), (MARKER_SIZE, MARKER_SIZE)],
                marker_style(r),
            )
    }))?;
    chart.draw_series(
        records
            .iter()
            .filter(|r| !r.reversal)
            .map(|r| EmptyElement::at(point(r)) + Circle::new((0, 0), MARKER_SIZE, marker_style(r))),
    )?;

    Ok(())
}

fn point(record: &TrialRecord) -> (f64, f64) {
    ((record.trial_index + 1) as f64, record.test_sample)
}

/// Filled for correct answers, hollow otherwise.
fn marker_style(record: &TrialRecord) -> ShapeStyle {
    if record.correct {
        BLACK.filled()
    } else {
        BLACK.stroke_width(1)
    }
}

#[cfg(test)]
mod tests {
    use staircase_kernel::config::StaircaseSettings;
    use staircase_kernel::judgment::PresentationOrder;
    use staircase_kernel::staircase::StaircaseId;

    use super::*;

    #[test]
    fn test_render_writes_svg() {
        let mut staircase = Staircase::new(
            StaircaseId::new(0),
            StaircaseSettings {
                name: "Staircase 1".to_string(),
                units: "gram".to_string(),
                comparison: "heavier".to_string(),
                reference: 50.0,
                start_value: 10.0,
                step_up: 5.0,
                step_down: 2.0,
                reversals_to_step_change: 1,
                reversals_to_finish: 2,
                require_first_error: false,
            },
        );
        for correct in [true, true, false, true] {
            staircase.submit_judgment(correct, PresentationOrder::ReferenceFirst);
        }

        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("plot.svg");
        render_trajectories(&[staircase], &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("<svg"));
        assert!(content.contains("Staircase 1"));
    }

    #[test]
    fn test_render_nothing_for_no_staircases() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("plot.svg");
        render_trajectories(&[], &path).unwrap();
        assert!(!path.exists());
    }
}
