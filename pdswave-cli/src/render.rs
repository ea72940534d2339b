//! PNG grid export of per-channel histograms.
//!
//! One image per detector side and histogram kind. A side is split into its
//! pads left to right; each pad is a `rows x columns` grid of panels placed
//! by [`LayoutConfig::cells`].

use pdswave_core::channel_map::ChannelMap;
use pdswave_core::config::PlotConfig;
use pdswave_core::histogram::{ChannelHistogramSet, Histogram1D, Histogram2D};
use pdswave_core::layout::{panel_title, LayoutConfig, SideLayout};
use plotters::coord::Shift;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;
use plotters::style::colors::colormaps::ViridisRGB;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Plot rendering error.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("failed to render {}: {message}", path.display())]
    Plot { path: PathBuf, message: String },
}

/// Histogram kind drawn on a canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlotKind {
    Charge,
    Persistence,
}

impl PlotKind {
    fn label(self) -> &'static str {
        match self {
            Self::Charge => "charge",
            Self::Persistence => "persistence",
        }
    }
}

/// Image path for one side and kind.
pub fn image_path(dir: &Path, run: u32, kind: PlotKind, side: &SideLayout) -> PathBuf {
    dir.join(format!("run_{run}_{}_{}.png", kind.label(), side.name))
}

/// Everything a canvas needs besides its side and kind.
pub struct RunPlots<'a> {
    pub run: u32,
    pub layout: &'a LayoutConfig,
    pub plot: &'a PlotConfig,
    pub histograms: &'a ChannelHistogramSet,
    pub channel_map: &'a ChannelMap,
}

impl RunPlots<'_> {
    /// Render both kinds for every side into `dir`; returns the written paths.
    pub fn render_all(&self, dir: &Path) -> Result<Vec<PathBuf>, RenderError> {
        let jobs: Vec<(PlotKind, &SideLayout)> = self
            .layout
            .sides
            .iter()
            .flat_map(|side| [(PlotKind::Charge, side), (PlotKind::Persistence, side)])
            .collect();

        jobs.par_iter()
            .map(|&(kind, side)| -> Result<PathBuf, RenderError> {
                let path = image_path(dir, self.run, kind, side);
                self.render_side(&path, kind, side)
                    .map_err(|message| RenderError::Plot {
                        path: path.clone(),
                        message,
                    })?;
                log::info!("Wrote {}", path.display());
                Ok(path)
            })
            .collect()
    }

    fn render_side(&self, path: &Path, kind: PlotKind, side: &SideLayout) -> Result<(), String> {
        let root = BitMapBackend::new(path, (self.plot.width, self.plot.height)).into_drawing_area();
        root.fill(&WHITE).map_err(|e| format!("{e:?}"))?;

        let layout = self.layout;
        let pads: Vec<Vec<_>> = root
            .split_evenly((1, side.pads.len()))
            .iter()
            .map(|pad| pad.split_evenly((layout.rows, layout.columns)))
            .collect();
        let rows = u32::try_from(layout.rows).unwrap_or(u32::MAX).max(1);
        let font_size = (self.plot.height / rows / 8).max(8);

        for cell in layout.cells(side) {
            let Some(area) = pads
                .get(cell.pad)
                .and_then(|panels| panels.get(cell.row * layout.columns + cell.column))
            else {
                continue;
            };
            let Some(hists) = self.histograms.channel(cell.channel) else {
                continue;
            };
            let location = u32::try_from(cell.channel)
                .ok()
                .and_then(|ch| self.channel_map.get(ch));
            let labels = self.plot.labels.then_some(font_size);

            let drawn = match kind {
                PlotKind::Charge => {
                    let title = panel_title(location, Some(hists.charge.entries()));
                    draw_charge_panel(area, &hists.charge, &title, labels)
                }
                PlotKind::Persistence => {
                    let title = panel_title(location, None);
                    draw_persistence_panel(area, &hists.persistence, &title, labels)
                }
            };
            drawn.map_err(|e| format!("channel {}: {e:?}", cell.channel))?;
        }

        root.present().map_err(|e| format!("{e:?}"))?;
        Ok(())
    }
}

type DrawResult<DB> = Result<(), DrawingAreaErrorKind<<DB as DrawingBackend>::ErrorType>>;

fn chart_builder<'a, 'b, DB: DrawingBackend>(
    area: &'a DrawingArea<DB, Shift>,
    title: &'b str,
    labels: Option<u32>,
) -> ChartBuilder<'a, 'b, DB> {
    let mut builder = ChartBuilder::on(area);
    builder.margin(4);
    if let Some(size) = labels {
        if !title.is_empty() {
            builder.caption(title, ("sans-serif", f64::from(size)));
        }
        builder
            .x_label_area_size(2 * size)
            .y_label_area_size(3 * size);
    }
    builder
}

/// Filled bars, one per non-empty bin.
fn draw_charge_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    hist: &Histogram1D,
    title: &str,
    labels: Option<u32>,
) -> DrawResult<DB> {
    let binning = hist.binning();
    #[allow(clippy::cast_precision_loss)]
    let y_max = hist.max_count().max(1) as f64 * 1.1;

    let mut chart = chart_builder(area, title, labels)
        .build_cartesian_2d(binning.low..binning.high, 0.0..y_max)?;
    if let Some(size) = labels {
        chart
            .configure_mesh()
            .disable_mesh()
            .x_labels(4)
            .y_labels(4)
            .label_style(("sans-serif", f64::from(size)))
            .draw()?;
    }

    chart.draw_series(
        hist.counts()
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c > 0)
            .map(|(i, &c)| {
                let x0 = binning.lower_edge(i);
                #[allow(clippy::cast_precision_loss)]
                let top = c as f64;
                Rectangle::new([(x0, 0.0), (x0 + binning.width(), top)], BLUE.mix(0.7).filled())
            }),
    )?;
    Ok(())
}

/// Non-empty cells colored on a viridis scale relative to the fullest cell.
fn draw_persistence_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    hist: &Histogram2D,
    title: &str,
    labels: Option<u32>,
) -> DrawResult<DB> {
    let (x, y) = (hist.x_binning(), hist.y_binning());
    let mut chart =
        chart_builder(area, title, labels).build_cartesian_2d(x.low..x.high, y.low..y.high)?;
    if let Some(size) = labels {
        chart
            .configure_mesh()
            .disable_mesh()
            .x_labels(4)
            .y_labels(4)
            .label_style(("sans-serif", f64::from(size)))
            .draw()?;
    }

    #[allow(clippy::cast_precision_loss)]
    let max = hist.max_count().max(1) as f64;
    chart.draw_series(hist.nonzero_cells().map(|(ix, iy, c)| {
        let (x0, y0) = (x.lower_edge(ix), y.lower_edge(iy));
        #[allow(clippy::cast_precision_loss)]
        let color = ViridisRGB.get_color(c as f64 / max);
        Rectangle::new([(x0, y0), (x0 + x.width(), y0 + y.width())], color.filled())
    }))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdswave_core::histogram::HistogramConfig;
    use pdswave_core::record::ChannelId;
    use tempfile::TempDir;

    fn filled() -> ChannelHistogramSet {
        let mut set = ChannelHistogramSet::new(160, &HistogramConfig::default());
        for ch in [0u16, 45, 159] {
            let id = ChannelId::new(i64::from(ch), 160).unwrap();
            let mut samples = vec![1000i16; 1024];
            samples[150] = 1200;
            set.record_charge(id, 200.0).unwrap();
            set.record_waveform(id, &samples, 1000).unwrap();
        }
        set
    }

    #[test]
    fn test_image_names() {
        let layout = LayoutConfig::default();
        let path = image_path(Path::new("out"), 27360, PlotKind::Persistence, &layout.sides[1]);
        assert_eq!(path, Path::new("out/run_27360_persistence_side_2.png"));
    }

    #[test]
    fn test_render_all_writes_four_images() {
        let dir = TempDir::new().unwrap();
        let layout = LayoutConfig::default();
        let plot = PlotConfig {
            width: 320,
            height: 400,
            labels: false,
        };
        let histograms = filled();
        let channel_map = ChannelMap::new();
        let plots = RunPlots {
            run: 7,
            layout: &layout,
            plot: &plot,
            histograms: &histograms,
            channel_map: &channel_map,
        };

        let mut written = plots.render_all(dir.path()).unwrap();
        written.sort();
        assert_eq!(written.len(), 4);
        for path in &written {
            let bytes = std::fs::read(path).unwrap();
            assert_eq!(&bytes[1..4], b"PNG");
        }
        assert!(dir.path().join("run_7_charge_side_1.png").exists());
        assert!(dir.path().join("run_7_persistence_side_2.png").exists());
    }
}
