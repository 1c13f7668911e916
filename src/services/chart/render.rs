use std::io::Cursor;

use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use image::{DynamicImage, ImageFormat, RgbImage};
use plotters::prelude::*;

use crate::error::{AppError, Result};
use crate::models::{Terminal, TrendSeries};

struct ChartStyle;

impl ChartStyle {
    const MARGIN: i32 = 24;
    const FONT_FAMILY: &'static str = "sans-serif";
    const CAPTION_FONT_SIZE: i32 = 32;
    const LABEL_FONT_SIZE: i32 = 18;
    const X_LABEL_AREA_SIZE: u32 = 48;
    const Y_LABEL_AREA_SIZE: u32 = 56;
    const LINE_WIDTH: u32 = 3;
    const BACKGROUND: RGBColor = BLACK;
    const FOREGROUND: RGBColor = WHITE;
    const GRID_ALPHA: f64 = 0.15;
    const X_TICK_HOURS: i64 = 2;
    const Y_TICK_STEP: u32 = 5;
    const Y_TICK_MAX: u32 = 60;

    fn terminal_line(terminal: Terminal) -> RGBColor {
        match terminal {
            Terminal::T1 => MAGENTA,
            Terminal::T2 => CYAN,
        }
    }
}

/// Unix timestamps of every even local hour inside the window.
fn two_hour_ticks(series: &TrendSeries, tz: Tz) -> Vec<i64> {
    let start_local = series.window_start.with_timezone(&tz);
    let hour_floor = start_local.date_naive().and_hms_opt(start_local.hour(), 0, 0);

    let Some(first) = hour_floor.and_then(|naive| tz.from_local_datetime(&naive).earliest())
    else {
        return Vec::new();
    };

    let end = series.window_end.timestamp();
    let mut ticks = Vec::new();
    let mut tick = first.with_timezone(&Utc);
    while tick.timestamp() <= end {
        let local_hour = tick.with_timezone(&tz).hour();
        if tick >= series.window_start && i64::from(local_hour) % ChartStyle::X_TICK_HOURS == 0 {
            ticks.push(tick.timestamp());
        }
        tick += Duration::hours(1);
    }
    ticks
}

fn y_ticks() -> Vec<u32> {
    (ChartStyle::Y_TICK_STEP..=ChartStyle::Y_TICK_MAX)
        .step_by(ChartStyle::Y_TICK_STEP as usize)
        .collect()
}

fn local_hhmm(timestamp: i64, tz: Tz) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|t| t.with_timezone(&tz).format("%H:%M").to_string())
        .unwrap_or_default()
}

/// Draw both terminals' lines over the series window and encode as PNG.
pub(super) fn render_trend_png(
    series: &TrendSeries,
    title: &str,
    tz: Tz,
    (width, height): (u32, u32),
) -> Result<Vec<u8>> {
    if series.is_empty() {
        return Err(AppError::chart("no points to render"));
    }

    let mut rgb_buffer = vec![0u8; width as usize * height as usize * 3];

    {
        let drawing_area =
            BitMapBackend::with_buffer(&mut rgb_buffer, (width, height)).into_drawing_area();
        drawing_area
            .fill(&ChartStyle::BACKGROUND)
            .map_err(|error| AppError::chart(format!("background fill error: {:?}", error)))?;

        let x_start = series.window_start.timestamp();
        let x_end = series.window_end.timestamp().max(x_start + 1);
        let y_top = series
            .max_minutes()
            .unwrap_or(0)
            .max(ChartStyle::Y_TICK_MAX)
            + ChartStyle::Y_TICK_STEP;

        let text = |size: i32| {
            (ChartStyle::FONT_FAMILY, size)
                .into_font()
                .color(&ChartStyle::FOREGROUND)
        };

        let mut chart = ChartBuilder::on(&drawing_area)
            .margin(ChartStyle::MARGIN)
            .caption(title, text(ChartStyle::CAPTION_FONT_SIZE))
            .x_label_area_size(ChartStyle::X_LABEL_AREA_SIZE)
            .y_label_area_size(ChartStyle::Y_LABEL_AREA_SIZE)
            .build_cartesian_2d(
                (x_start..x_end).with_key_points(two_hour_ticks(series, tz)),
                (0u32..y_top).with_key_points(y_ticks()),
            )
            .map_err(|error| AppError::chart(format!("chart build error: {:?}", error)))?;

        let x_formatter = |ts: &i64| local_hhmm(*ts, tz);
        chart
            .configure_mesh()
            .x_label_formatter(&x_formatter)
            .label_style(text(ChartStyle::LABEL_FONT_SIZE))
            .axis_style(ChartStyle::FOREGROUND)
            .bold_line_style(ChartStyle::FOREGROUND.mix(ChartStyle::GRID_ALPHA))
            .light_line_style(TRANSPARENT)
            .draw()
            .map_err(|error| AppError::chart(format!("mesh draw error: {:?}", error)))?;

        for (terminal, line) in series.by_terminal() {
            let color = ChartStyle::terminal_line(terminal);
            chart
                .draw_series(LineSeries::new(
                    line.into_iter().map(|(at, minutes)| (at.timestamp(), minutes)),
                    color.stroke_width(ChartStyle::LINE_WIDTH),
                ))
                .map_err(|error| AppError::chart(format!("series draw error: {:?}", error)))?
                .label(terminal.field())
                .legend(move |(x, y)| {
                    PathElement::new(
                        vec![(x, y), (x + 20, y)],
                        color.stroke_width(ChartStyle::LINE_WIDTH),
                    )
                });
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .label_font(text(ChartStyle::LABEL_FONT_SIZE))
            .background_style(ChartStyle::BACKGROUND.mix(0.8))
            .border_style(ChartStyle::FOREGROUND)
            .draw()
            .map_err(|error| AppError::chart(format!("legend draw error: {:?}", error)))?;

        drawing_area
            .present()
            .map_err(|error| AppError::chart(format!("present error: {:?}", error)))?;
    }

    let rgb_image = RgbImage::from_raw(width, height, rgb_buffer)
        .ok_or_else(|| AppError::chart("image buffer conversion failed"))?;
    let mut output = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(rgb_image)
        .write_to(&mut output, ImageFormat::Png)
        .map_err(|error| AppError::chart(format!("png encoding error: {}", error)))?;

    Ok(output.into_inner())
}
