//! Date-parameterized file path templates.
//!
//! A template is a path with exactly three printf-style integer directives,
//! filled in order with the year, month and day of the rotation instant:
//!
//! ```
//! use rotatelog::PathTemplate;
//!
//! let template = PathTemplate::parse("/var/log/app_%d_%02d_%02d.log").unwrap();
//! assert_eq!(template.render(2024, 1, 2).to_str(), Some("/var/log/app_2024_01_02.log"));
//! ```

use {
    crate::RotateLogError,
    std::{fmt, path::PathBuf},
};

/// Number of directives a template must contain: year, month and day.
const FIELD_COUNT: usize = 3;

/// Widest zero padding accepted for a field.
const MAX_FIELD_WIDTH: usize = 9;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// An integer field, zero-padded to `width` digits when `width > 0`.
    Field { width: usize },
}

/// A parsed path template.
#[derive(Clone, PartialEq, Eq)]
pub struct PathTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    /// Parse a template. Accepts `%d`, `%0Nd` and `%%`.
    pub fn parse(template: &str) -> Result<Self, RotateLogError> {
        let invalid = |reason: String| RotateLogError::InvalidTemplate {
            template: template.to_string(),
            reason,
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut fields = 0;
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }
            if chars.peek() == Some(&'%') {
                chars.next();
                literal.push('%');
                continue;
            }

            let mut width = String::new();
            while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                width.push(d);
                chars.next();
            }
            match chars.next() {
                Some('d') => {}
                Some(other) => return Err(invalid(format!("unsupported directive '%{width}{other}'"))),
                None => return Err(invalid("dangling '%' at end of template".to_string())),
            }
            if !width.is_empty() && !width.starts_with('0') {
                return Err(invalid(format!("space padding '%{width}d' is not supported, use '%0{width}d'")));
            }
            let width = if width.is_empty() {
                0
            } else {
                width
                    .parse::<usize>()
                    .map_err(|err| invalid(format!("bad field width: {err}")))?
            };
            if width > MAX_FIELD_WIDTH {
                return Err(invalid(format!(
                    "field width {width} exceeds the maximum of {MAX_FIELD_WIDTH}"
                )));
            }

            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Field { width });
            fields += 1;
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        if fields != FIELD_COUNT {
            return Err(invalid(format!(
                "expected {FIELD_COUNT} '%d' fields (year, month, day), found {fields}"
            )));
        }

        Ok(PathTemplate {
            source: template.to_string(),
            segments,
        })
    }

    /// Render the path for the given calendar date.
    pub fn render(&self, year: i32, month: u32, day: u32) -> PathBuf {
        let values = [i64::from(year), i64::from(month), i64::from(day)];
        let mut values = values.iter();
        let mut out = String::with_capacity(self.source.len() + 8);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                &Segment::Field { width } => {
                    // parse() guarantees exactly FIELD_COUNT fields
                    if let Some(value) = values.next() {
                        out.push_str(&format!("{value:0width$}"));
                    }
                }
            }
        }
        PathBuf::from(out)
    }

    /// The template as it was written.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Debug for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PathTemplate").field(&self.source).finish()
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
