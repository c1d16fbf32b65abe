//! Text rendering of the angle history.

use driftscope::prelude::v1::*;
use terminal_size::{terminal_size, Height, Width};

/// Columns taken by the frame and angle labels in front of the track.
const LABEL_WIDTH: usize = 17;

/// Smallest half range of the plot, in degrees.
const MIN_SCALE: f32 = 10.0;

/// Get the terminal size, falling back to a classic 80x24 screen.
pub fn screen_size() -> (usize, usize) {
    if let Some((Width(w), Height(h))) = terminal_size() {
        (w as usize, h as usize)
    } else {
        (80, 24)
    }
}

/// Column of `angle` on a track of `width` characters spanning `[-scale; scale]`.
fn column(angle: f32, scale: f32, width: usize) -> usize {
    let half = (width - 1) as f32 / 2.0;
    let pos = half + (angle / scale).clamp(-1.0, 1.0) * half;
    pos.round() as usize
}

/// Render the most recent samples as one row each, newest at the bottom.
///
/// # Arguments
///
/// * `history` - samples to plot.
/// * `title` - text shown in the header line.
/// * `(width, height)` - size of the screen in characters.
pub fn render(history: &AngleHistory, title: &str, (width, height): (usize, usize)) -> String {
    let track = width.saturating_sub(LABEL_WIDTH).max(3);
    let rows = height.saturating_sub(2).max(1);

    let scale = history
        .range()
        .map(|(lo, hi)| lo.abs().max(hi.abs()))
        .unwrap_or_default()
        .max(MIN_SCALE)
        .ceil();

    let mut out = match (history.latest(), history.last_angle()) {
        (Some(s), Some(angle)) => format!(
            "{} | frame {} | {:.2} deg | +-{}\n",
            title, s.frame, angle, scale
        ),
        (Some(s), None) => format!("{} | frame {} | no motion\n", title, s.frame),
        (None, _) => format!("{} | waiting for frames\n", title),
    };

    let skip = history.len().saturating_sub(rows);

    for sample in history.iter().skip(skip) {
        let mut line = vec![' '; track];
        line[column(0.0, scale, track)] = '|';

        // Frames without a new angle only show the axis.
        match sample.angle {
            Some(angle) => {
                line[column(angle, scale, track)] = '*';
                out += &format!("{:>6} {:>8.2}  ", sample.frame, angle);
            }
            None => out += &format!("{:>6} {:>8}  ", sample.frame, "-"),
        }

        out.extend(line);
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(angles: &[Option<f32>]) -> AngleHistory {
        let mut history = AngleHistory::new(10);
        for (frame, &angle) in angles.iter().enumerate() {
            history.push(Sample {
                frame: frame as u64,
                angle,
                direction: None,
            });
        }
        history
    }

    #[test]
    fn columns_span_track() {
        assert_eq!(column(0.0, 10.0, 21), 10);
        assert_eq!(column(-10.0, 10.0, 21), 0);
        assert_eq!(column(10.0, 10.0, 21), 20);
        assert_eq!(column(45.0, 10.0, 21), 20);
        assert_eq!(column(5.0, 10.0, 21), 15);
    }

    #[test]
    fn renders_newest_rows() {
        let out = render(
            &history(&[Some(0.0), Some(5.0), Some(-20.0)]),
            "test",
            (LABEL_WIDTH + 21, 4),
        );
        let lines = out.lines().collect::<Vec<_>>();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("frame 2"));
        assert!(lines[0].contains("+-20"));
        assert!(lines[1].starts_with("     1"));
        assert!(lines[2].starts_with("     2"));

        // -20 degrees sits at the left edge of the track.
        assert_eq!(lines[2].chars().nth(LABEL_WIDTH), Some('*'));
        assert_eq!(lines[2].chars().nth(LABEL_WIDTH + 10), Some('|'));
    }

    #[test]
    fn rows_without_angle_have_no_marker() {
        let out = render(
            &history(&[Some(3.0), None]),
            "test",
            (LABEL_WIDTH + 21, 10),
        );
        let lines = out.lines().collect::<Vec<_>>();

        assert!(lines[0].contains("3.00 deg"));
        assert!(lines[2].starts_with("     1        -  "));
        assert!(!lines[2].contains('*'));
        assert_eq!(lines[2].chars().nth(LABEL_WIDTH + 10), Some('|'));

        let out = render(&history(&[None]), "test", (80, 24));
        assert!(out.starts_with("test | frame 0 | no motion"));
    }

    #[test]
    fn renders_empty_history() {
        let out = render(&AngleHistory::default(), "test", (80, 24));
        assert_eq!(out, "test | waiting for frames\n");
    }
}
