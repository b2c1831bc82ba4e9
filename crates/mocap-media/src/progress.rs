//! Parsing of the render script's stdout.
//!
//! The script prints the imported clip's first and last frame as two bare
//! integers, Blender prints `Append frame N` for every encoded frame, and the
//! script finishes with `output_file <path>`.

use std::path::{Path, PathBuf};

/// A line of render output that carries information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderLine {
    /// Frames that will be rendered, inclusive
    FrameRange { start: i64, end: i64 },
    /// A frame was written; `done` counts frames of this view so far
    Frame { number: i64, done: u64 },
    /// Path of the finished video
    Output(PathBuf),
}

/// Stateful parser for one Blender run.
///
/// The printed range is the clip's range before the render window is
/// applied: rendering always starts at `start_frame`, and a positive
/// `duration` replaces the clip's last frame with `start_frame + duration`.
#[derive(Debug, Clone, Default)]
pub struct RenderOutputParser {
    start_frame: i64,
    duration: Option<i64>,
    printed: Vec<i64>,
    range: Option<(i64, i64)>,
    frames_done: u64,
    output_file: Option<PathBuf>,
}

impl RenderOutputParser {
    pub fn new(start_frame: u32, duration: Option<u32>) -> Self {
        Self {
            start_frame: i64::from(start_frame),
            duration: duration.filter(|d| *d > 0).map(i64::from),
            ..Default::default()
        }
    }

    /// Feed one stdout line.
    pub fn parse_line(&mut self, line: &str) -> Option<RenderLine> {
        let line = line.trim();

        if let Some(path) = line.strip_prefix("output_file ") {
            let path = PathBuf::from(path.trim());
            self.output_file = Some(path.clone());
            return Some(RenderLine::Output(path));
        }

        if let Some(rest) = line.strip_prefix("Append frame ") {
            let number: i64 = rest.split_whitespace().next()?.parse().ok()?;
            let done = self.frames_in_view(number);
            self.frames_done = self.frames_done.max(done);
            return Some(RenderLine::Frame {
                number,
                done: self.frames_done,
            });
        }

        if self.range.is_none() {
            if let Ok(value) = line.parse::<i64>() {
                self.printed.push(value);
                if self.printed.len() == 2 {
                    let end = match self.duration {
                        Some(duration) => self.start_frame + duration,
                        None => self.printed[1],
                    };
                    self.range = Some((self.start_frame, end));
                    return Some(RenderLine::FrameRange {
                        start: self.start_frame,
                        end,
                    });
                }
            }
        }

        None
    }

    /// Frames this run will render, once the range is known.
    pub fn frame_count(&self) -> Option<u64> {
        let (start, end) = self.range?;
        if end < start {
            return None;
        }
        Some((end - start + 1) as u64)
    }

    pub fn frames_done(&self) -> u64 {
        self.frames_done
    }

    pub fn output_file(&self) -> Option<&Path> {
        self.output_file.as_deref()
    }

    fn frames_in_view(&self, number: i64) -> u64 {
        let done = (number - self.start_frame + 1).max(0) as u64;
        match self.frame_count() {
            Some(count) => done.min(count),
            None => done,
        }
    }
}
