//! Draws interpreted charts with ratatui's `Chart` and `BarChart` widgets.
//!
//! Terminal bars are unsigned integers, so bar heights are scaled and floored
//! at zero. The real values are always printed alongside the bars.

use insightlens_core::chart::{AxisSide, BarGroup as ChartBarGroup, ChartColor, LineSeries, PieSlice};
use insightlens_core::RenderableChart;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style, Stylize},
    symbols,
    text::{Line, Span},
    widgets::{
        Axis, Bar, BarChart, BarGroup, Block, Borders, Chart, Dataset, GraphType, Paragraph, Wrap,
    },
};

use crate::ui::clamp_u16;

// Two decimals survive the conversion to integer bar heights
const BAR_SCALE: f64 = 100.0;
const MAX_X_LABELS: usize = 6;

pub fn chart_color(color: ChartColor) -> Color {
    match color {
        ChartColor::Green => Color::Green,
        ChartColor::Red => Color::Red,
        ChartColor::Blue => Color::Blue,
        ChartColor::Yellow => Color::Yellow,
        ChartColor::Magenta => Color::Magenta,
        ChartColor::Cyan => Color::Cyan,
    }
}

fn bar_height(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        (value * BAR_SCALE).round() as u64
    } else {
        0
    }
}

pub fn render_chart(chart: &RenderableChart, frame: &mut Frame, area: Rect) {
    let title = if chart.title().is_empty() {
        " Chart ".to_string()
    } else {
        format!(" {} ", chart.title())
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta))
        .title(title);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    match chart {
        RenderableChart::Pie { slices, .. } => render_pie(slices, frame, inner),
        RenderableChart::Line {
            categories,
            series,
            axes,
            ..
        } => match axes {
            Some(axes) => {
                let (primary, secondary): (Vec<&LineSeries>, Vec<&LineSeries>) =
                    series.iter().partition(|s| s.axis == AxisSide::Primary);
                if secondary.is_empty() {
                    render_lines(&primary, categories, Some(axes.primary), frame, inner);
                } else {
                    let [top, bottom] = Layout::vertical([
                        Constraint::Percentage(50),
                        Constraint::Percentage(50),
                    ])
                    .areas(inner);
                    render_lines(&primary, categories, Some(axes.primary), frame, top);
                    render_lines(&secondary, categories, Some(axes.secondary), frame, bottom);
                }
            }
            None => {
                let all: Vec<&LineSeries> = series.iter().collect();
                render_lines(&all, categories, None, frame, inner);
            }
        },
        RenderableChart::Bar { groups, .. } => render_bars(groups, frame, inner),
    }
}

/// Pie slices as horizontal bars, one per slice, with their share of the total.
fn render_pie(slices: &[PieSlice], frame: &mut Frame, area: Rect) {
    if slices.is_empty() {
        render_empty(frame, area);
        return;
    }

    let total: f64 = slices.iter().map(|s| s.value).sum();
    let legend: Vec<Line> = slices
        .iter()
        .map(|slice| {
            let color = slice.color.map(chart_color).unwrap_or(Color::Gray);
            let share = if total > 0.0 {
                format!(" ({:.0}%)", slice.value / total * 100.0)
            } else {
                String::new()
            };
            Line::from(vec![
                Span::styled("■ ", Style::default().fg(color)),
                Span::raw(format!("{}: {}{}", slice.label, slice.value, share)),
            ])
        })
        .collect();

    let [legend_area, bars_area] = Layout::vertical([
        Constraint::Length(clamp_u16(legend.len()).saturating_add(1)),
        Constraint::Min(0),
    ])
    .areas(area);
    frame.render_widget(Paragraph::new(legend), legend_area);

    let bars: Vec<Bar> = slices
        .iter()
        .map(|slice| {
            let color = slice.color.map(chart_color).unwrap_or(Color::Gray);
            Bar::default()
                .value(bar_height(slice.value))
                .label(Line::from(slice.label.clone()))
                .text_value(String::new())
                .style(Style::default().fg(color))
        })
        .collect();

    let chart = BarChart::default()
        .direction(Direction::Horizontal)
        .bar_width(1)
        .bar_gap(0)
        .data(BarGroup::default().bars(&bars));

    frame.render_widget(chart, bars_area);
}

fn render_bars(groups: &[ChartBarGroup], frame: &mut Frame, area: Rect) {
    if groups.iter().all(|g| g.bars.is_empty()) {
        render_empty(frame, area);
        return;
    }

    let mut legend: Vec<Span> = Vec::new();
    let mut seen: Vec<&str> = Vec::new();
    for bar in groups.iter().flat_map(|g| g.bars.iter()) {
        if !bar.series.is_empty() && !seen.contains(&bar.series.as_str()) {
            seen.push(&bar.series);
            legend.push(Span::styled("■ ", Style::default().fg(chart_color(bar.color))));
            legend.push(Span::raw(format!("{}  ", bar.series)));
        }
    }

    // Real values, including the ones a bar can't show
    let values = groups
        .iter()
        .map(|g| {
            let values: Vec<String> = g.bars.iter().map(|b| b.value.to_string()).collect();
            format!("{}: {}", g.label, values.join(" / "))
        })
        .collect::<Vec<_>>()
        .join("  ");

    let [legend_area, bars_area, values_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(2),
    ])
    .areas(area);
    frame.render_widget(Paragraph::new(Line::from(legend)), legend_area);
    frame.render_widget(
        Paragraph::new(values)
            .style(Style::default().fg(Color::DarkGray))
            .wrap(Wrap { trim: true }),
        values_area,
    );

    let series_count = clamp_u16(groups.iter().map(|g| g.bars.len()).max().unwrap_or(1).max(1));
    let group_count = clamp_u16(groups.len().max(1));
    let bar_width = (bars_area.width / group_count / series_count)
        .saturating_sub(1)
        .clamp(1, 9);

    let mut chart = BarChart::default()
        .bar_width(bar_width)
        .bar_gap(0)
        .group_gap(2);

    for group in groups {
        let bars: Vec<Bar> = group
            .bars
            .iter()
            .map(|bar| {
                Bar::default()
                    .value(bar_height(bar.value))
                    .text_value(String::new())
                    .style(Style::default().fg(chart_color(bar.color)))
            })
            .collect();
        chart = chart.data(
            BarGroup::default()
                .label(Line::from(group.label.clone()))
                .bars(&bars),
        );
    }

    frame.render_widget(chart, bars_area);
}

fn render_lines(
    series: &[&LineSeries],
    categories: &[String],
    axis_title: Option<&'static str>,
    frame: &mut Frame,
    area: Rect,
) {
    if series.iter().all(|s| s.values.is_empty()) {
        render_empty(frame, area);
        return;
    }

    let [header_area, chart_area] =
        Layout::vertical([Constraint::Length(1), Constraint::Min(0)]).areas(area);

    let mut header: Vec<Span> = Vec::new();
    if let Some(title) = axis_title {
        header.push(Span::styled(format!("{}  ", title), Style::default().bold()));
    }
    for s in series {
        header.push(Span::styled("■ ", Style::default().fg(chart_color(s.color))));
        header.push(Span::raw(format!("{}  ", s.label)));
    }
    frame.render_widget(Paragraph::new(Line::from(header)), header_area);

    let points: Vec<Vec<(f64, f64)>> = series
        .iter()
        .map(|s| {
            s.values
                .iter()
                .enumerate()
                .map(|(i, v)| (i as f64, *v))
                .collect()
        })
        .collect();

    let datasets: Vec<Dataset> = series
        .iter()
        .zip(points.iter())
        .map(|(s, data)| {
            Dataset::default()
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(chart_color(s.color)))
                .data(data)
        })
        .collect();

    let finite = || {
        series
            .iter()
            .flat_map(|s| s.values.iter().copied())
            .filter(|v| v.is_finite())
    };
    let y_min = finite().fold(0.0_f64, f64::min);
    let mut y_max = finite().fold(f64::MIN, f64::max);
    if y_max <= y_min {
        y_max = y_min + 1.0;
    }

    let longest = series.iter().map(|s| s.values.len()).max().unwrap_or(0);
    let x_max = (categories.len().max(longest).saturating_sub(1)).max(1) as f64;

    let y_axis = Axis::default()
        .style(Style::default().fg(Color::DarkGray))
        .bounds([y_min, y_max])
        .labels(vec![
            Span::raw(format!("{:.0}", y_min)),
            Span::raw(format!("{:.0}", (y_min + y_max) / 2.0)),
            Span::raw(format!("{:.0}", y_max)),
        ]);

    let x_axis = Axis::default()
        .style(Style::default().fg(Color::DarkGray))
        .bounds([0.0, x_max])
        .labels(x_labels(categories));

    let chart = Chart::new(datasets).x_axis(x_axis).y_axis(y_axis);
    frame.render_widget(chart, chart_area);
}

/// Category labels for the x axis; long label lists are thinned to the ends and middle.
fn x_labels(categories: &[String]) -> Vec<Span<'static>> {
    if categories.len() <= MAX_X_LABELS {
        return categories.iter().map(|c| Span::raw(c.clone())).collect();
    }
    let last = categories.len() - 1;
    [0, last / 2, last]
        .iter()
        .map(|&i| Span::raw(categories[i].clone()))
        .collect()
}

fn render_empty(frame: &mut Frame, area: Rect) {
    let empty = Paragraph::new("No data to plot").style(Style::default().fg(Color::DarkGray));
    frame.render_widget(empty, area);
}
