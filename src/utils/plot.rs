use std::error::Error;
use std::path::Path;

use plotters::prelude::*;

use crate::simulation::Trajectory;
use crate::utils::state::GaussianState;

/// Polygon of mean +/- width * std of one state component over time:
/// upper edge left to right, then lower edge right to left.
pub fn band_series(beliefs: &[GaussianState<f64>], component: usize, width: f64) -> Vec<(f64, f64)> {
    let edge = |sign: f64| {
        move |(i, belief): (usize, &GaussianState<f64>)| {
            let std = belief.cov[(component, component)].max(0.0).sqrt();
            ((i + 1) as f64, belief.x[component] + sign * width * std)
        }
    };
    let upper = beliefs.iter().enumerate().map(edge(1.0));
    let lower = beliefs.iter().enumerate().rev().map(edge(-1.0));
    upper.chain(lower).collect()
}

fn value_range(points: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = points.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !min.is_finite() || !max.is_finite() {
        return (-1.0, 1.0);
    }
    let margin = ((max - min) * 0.05).max(1e-3);
    (min - margin, max + margin)
}

/// One panel per leading state component (at most two) showing the hidden
/// state, the matching observation component, the belief mean and a 2-sigma band.
pub fn plot_beliefs(
    path: &Path,
    trajectory: &Trajectory<f64>,
    beliefs: &[GaussianState<f64>],
    title: &str,
) -> Result<(), Box<dyn Error>> {
    let Some(first) = beliefs.first() else {
        return Err("no beliefs to plot".into());
    };
    let components = first.dim().min(2);
    let n = beliefs.len() as f64;

    let root = BitMapBackend::new(path, (1024, 768)).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled(title, ("sans-serif", 30))?;
    let panels = root.split_evenly((components, 1));

    for (component, panel) in panels.iter().enumerate() {
        let band = band_series(beliefs, component, 2.0);
        let observed: Vec<(f64, f64)> = trajectory
            .observations()
            .iter()
            .enumerate()
            .filter(|(_, z)| component < z.len())
            .map(|(i, z)| ((i + 1) as f64, z[component]))
            .collect();
        let (y_min, y_max) = value_range(
            band.iter()
                .chain(observed.iter())
                .map(|(_, y)| *y)
                .chain(trajectory.states().iter().map(|x| x[component])),
        );

        let mut chart = ChartBuilder::on(panel)
            .margin(10)
            .caption(format!("x[{component}]"), ("sans-serif", 20))
            .x_label_area_size(30)
            .y_label_area_size(50)
            .build_cartesian_2d(0.0..n + 1.0, y_min..y_max)?;
        chart.configure_mesh().x_desc("step").draw()?;

        chart
            .draw_series(std::iter::once(Polygon::new(band, BLUE.mix(0.2).filled())))?
            .label("belief +/- 2 std")
            .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 20, y + 5)], BLUE.mix(0.2).filled()));

        chart
            .draw_series(LineSeries::new(
                trajectory
                    .states()
                    .iter()
                    .enumerate()
                    .map(|(i, x)| ((i + 1) as f64, x[component])),
                &BLACK,
            ))?
            .label("hidden state")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLACK));

        chart
            .draw_series(
                observed
                    .iter()
                    .map(|(x, y)| Circle::new((*x, *y), 2, RED.filled())),
            )?
            .label("observation")
            .legend(|(x, y)| Circle::new((x + 10, y), 3, RED.filled()));

        chart
            .draw_series(LineSeries::new(
                beliefs
                    .iter()
                    .enumerate()
                    .map(|(i, b)| ((i + 1) as f64, b.x[component])),
                &BLUE,
            ))?
            .label("belief mean")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLUE));

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }

    root.present()?;
    log::info!("saved plot to {}", path.display());
    Ok(())
}
