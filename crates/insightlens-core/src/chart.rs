//! Chart specifications sent by the backend and their interpretation into
//! concrete, library-neutral chart descriptions.

use serde::{Deserialize, Serialize};

/// Kind of chart requested. Anything the client doesn't recognize is kept
/// verbatim and drawn as a bar chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChartKind {
    Pie,
    Line,
    Bar,
    Other(String),
}

impl From<String> for ChartKind {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "pie" => ChartKind::Pie,
            "line" => ChartKind::Line,
            "bar" => ChartKind::Bar,
            _ => ChartKind::Other(raw),
        }
    }
}

impl From<ChartKind> for String {
    fn from(kind: ChartKind) -> Self {
        match kind {
            ChartKind::Pie => "pie".to_string(),
            ChartKind::Line => "line".to_string(),
            ChartKind::Bar => "bar".to_string(),
            ChartKind::Other(raw) => raw,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartDataset {
    #[serde(default)]
    pub label: String,
    pub data: Vec<f64>,
    #[serde(rename = "yAxisID", default, skip_serializing_if = "Option::is_none")]
    pub y_axis_id: Option<String>,
}

/// Generic chart description, as returned in `chart_data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    #[serde(rename = "type")]
    pub kind: ChartKind,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub datasets: Vec<ChartDataset>,
}

/// Palette slots used by interpreted charts. Front-ends pick the real color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartColor {
    Green,
    Red,
    Blue,
    Yellow,
    Magenta,
    Cyan,
}

/// Pie slices only ever get these two colors, by position.
pub const PIE_PALETTE: [ChartColor; 2] = [ChartColor::Green, ChartColor::Red];

/// Line and bar series colors, by dataset position (wrapping).
pub const SERIES_PALETTE: [ChartColor; 4] = [
    ChartColor::Blue,
    ChartColor::Yellow,
    ChartColor::Magenta,
    ChartColor::Cyan,
];

pub const PRIMARY_AXIS_LABEL: &str = "NPS Score";
pub const SECONDARY_AXIS_LABEL: &str = "Review Count";

#[derive(Debug, Clone, PartialEq)]
pub struct PieSlice {
    pub label: String,
    pub value: f64,
    /// `None` past the second slice: the palette has two entries.
    pub color: Option<ChartColor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisSide {
    Primary,
    Secondary,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineSeries {
    pub label: String,
    pub values: Vec<f64>,
    pub axis: AxisSide,
    pub color: ChartColor,
}

/// Axis titles, present only when a line chart has more than one series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DualAxis {
    pub primary: &'static str,
    pub secondary: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BarValue {
    pub series: String,
    pub value: f64,
    pub color: ChartColor,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BarGroup {
    pub label: String,
    pub bars: Vec<BarValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderableChart {
    Pie {
        title: String,
        slices: Vec<PieSlice>,
    },
    Line {
        title: String,
        categories: Vec<String>,
        series: Vec<LineSeries>,
        axes: Option<DualAxis>,
    },
    Bar {
        title: String,
        groups: Vec<BarGroup>,
    },
}

impl RenderableChart {
    pub fn title(&self) -> &str {
        match self {
            RenderableChart::Pie { title, .. }
            | RenderableChart::Line { title, .. }
            | RenderableChart::Bar { title, .. } => title,
        }
    }
}

fn series_color(position: usize) -> ChartColor {
    SERIES_PALETTE[position % SERIES_PALETTE.len()]
}

/// Interpret a chart spec. Values are passed through untouched.
pub fn render(spec: &ChartSpec) -> RenderableChart {
    let title = spec.title.clone();
    match &spec.kind {
        ChartKind::Pie => {
            let slices = spec
                .datasets
                .first()
                .map(|dataset| {
                    dataset
                        .data
                        .iter()
                        .enumerate()
                        .map(|(i, value)| PieSlice {
                            label: spec.labels.get(i).cloned().unwrap_or_default(),
                            value: *value,
                            color: PIE_PALETTE.get(i).copied(),
                        })
                        .collect()
                })
                .unwrap_or_default();
            RenderableChart::Pie { title, slices }
        }
        ChartKind::Line => {
            let dual = spec.datasets.len() > 1;
            let series = spec
                .datasets
                .iter()
                .enumerate()
                .map(|(i, dataset)| LineSeries {
                    label: dataset.label.clone(),
                    values: dataset.data.clone(),
                    axis: if dual && dataset.y_axis_id.is_some() {
                        AxisSide::Secondary
                    } else {
                        AxisSide::Primary
                    },
                    color: series_color(i),
                })
                .collect();
            RenderableChart::Line {
                title,
                categories: spec.labels.clone(),
                series,
                axes: dual.then_some(DualAxis {
                    primary: PRIMARY_AXIS_LABEL,
                    secondary: SECONDARY_AXIS_LABEL,
                }),
            }
        }
        ChartKind::Bar | ChartKind::Other(_) => {
            let groups = spec
                .labels
                .iter()
                .enumerate()
                .map(|(i, label)| BarGroup {
                    label: label.clone(),
                    bars: spec
                        .datasets
                        .iter()
                        .enumerate()
                        .filter_map(|(s, dataset)| {
                            dataset.data.get(i).map(|value| BarValue {
                                series: dataset.label.clone(),
                                value: *value,
                                color: series_color(s),
                            })
                        })
                        .collect(),
                })
                .collect();
            RenderableChart::Bar { title, groups }
        }
    }
}
