use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{PrintCheckError, ProgramError};

/// Metadata extracted from a toolpath program (G-code).
///
/// `filename` and `size_bytes` are copied from the caller. Every optional
/// field is either absent or holds the first value parsed for it, in line
/// order; later lines never overwrite it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramMetadata {
    pub filename: String,
    pub size_bytes: u64,

    /// Explicit layer markers when present, otherwise the number of distinct
    /// Z heights reached by linear moves.
    pub layer_count: u64,

    pub estimated_duration_seconds: Option<u64>,
    pub filament_length_m: Option<f64>,

    /// Never populated by the current rule set.
    pub filament_weight_g: Option<f64>,

    pub bed_temperature_c: Option<f64>,
    pub hotend_temperature_c: Option<f64>,

    /// Never populated by the current rule set.
    pub first_layer_height_mm: Option<f64>,
    /// Never populated by the current rule set.
    pub layer_height_mm: Option<f64>,

    pub bounding_box: BoundingBox,
}

/// Axis-aligned print bounds as `[x, y, z]`.
///
/// Only `min[0]` is ever derived (see [`first_number_after_colon`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: [Option<f64>; 3],
    pub max: [Option<f64>; 3],
}

/// Field a [`Rule`] writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Duration,
    FilamentLength,
    BedTemperature,
    HotendTemperature,
    MinX,
}

/// How a rule recognises its line.
#[derive(Debug, Clone, Copy)]
enum Marker {
    /// Case-sensitive substring anywhere in the line.
    Contains(&'static str),
    /// ASCII case-insensitive substring anywhere in the line.
    ContainsIgnoreCase(&'static str),
    /// The line's command word is one of these commands.
    Command(&'static [&'static str]),
}

/// How a rule reads its value once the marker matched.
#[derive(Debug, Clone, Copy)]
enum ValueParser {
    /// Leading digits directly after the marker.
    IntegerAfterMarker,
    /// A number after the marker immediately followed by `m`.
    MetresAfterMarker,
    /// The first number after the `=` that follows the marker.
    AfterEquals,
    /// A G-code parameter word such as `S60`.
    Word(char),
    /// First numeric token between the first and second colon.
    AfterFirstColon,
}

/// One row of the annotation table: marker, target field, parser and the
/// factor that converts the parsed value into the field's unit.
#[derive(Debug, Clone, Copy)]
struct Rule {
    marker: Marker,
    field: Field,
    parser: ValueParser,
    scale: f64,
}

const RULES: &[Rule] = &[
    Rule {
        marker: Marker::Command(&["M140", "M190"]),
        field: Field::BedTemperature,
        parser: ValueParser::Word('S'),
        scale: 1.0,
    },
    Rule {
        marker: Marker::Command(&["M104", "M109"]),
        field: Field::HotendTemperature,
        parser: ValueParser::Word('S'),
        scale: 1.0,
    },
    // Cura
    Rule {
        marker: Marker::Contains(";TIME:"),
        field: Field::Duration,
        parser: ValueParser::IntegerAfterMarker,
        scale: 1.0,
    },
    Rule {
        marker: Marker::Contains(";Filament used:"),
        field: Field::FilamentLength,
        parser: ValueParser::MetresAfterMarker,
        scale: 1.0,
    },
    // PrusaSlicer reports millimetres
    Rule {
        marker: Marker::ContainsIgnoreCase("filament used [mm]"),
        field: Field::FilamentLength,
        parser: ValueParser::AfterEquals,
        scale: 0.001,
    },
    Rule {
        marker: Marker::Contains(";MINX:"),
        field: Field::MinX,
        parser: ValueParser::AfterFirstColon,
        scale: 1.0,
    },
    Rule {
        marker: Marker::ContainsIgnoreCase("; min_x"),
        field: Field::MinX,
        parser: ValueParser::AfterFirstColon,
        scale: 1.0,
    },
];

const LAYER_MARKERS: &[&str] = &[";LAYER:", "LAYER_CHANGE"];
const LINEAR_MOVES: &[&str] = &["G0", "G1"];

/// Single-pass state behind [`extract`].
///
/// Lines are fed one at a time and never retained, so a host that streams a
/// large program can drive the accumulator directly and call
/// [`MetadataAccumulator::finish`] once the source is exhausted.
#[derive(Debug, Default)]
pub struct MetadataAccumulator {
    explicit_layers: u64,
    z_heights: HashSet<u64>,
    duration: Option<u64>,
    filament_length: Option<f64>,
    bed_temperature: Option<f64>,
    hotend_temperature: Option<f64>,
    min_x: Option<f64>,
    lines_seen: u64,
}

impl MetadataAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan one line against every rule.
    ///
    /// Rules are independent: a line may feed several fields, and a marker
    /// whose value does not parse is skipped for that rule only.
    pub fn feed(&mut self, line: &str) {
        self.lines_seen += 1;
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        if LAYER_MARKERS.iter().any(|marker| line.contains(marker)) {
            self.explicit_layers += 1;
        }

        let command = CommandWord::split(line);

        if let Some(cmd) = command.filter(|cmd| cmd.is_any(LINEAR_MOVES)) {
            if let Some(z) = parameter_word(cmd.params, 'Z') {
                // -0.0 and 0.0 are the same height
                let z = if z == 0.0 { 0.0 } else { z };
                self.z_heights.insert(z.to_bits());
            }
        }

        let mut lowered: Option<String> = None;
        for rule in RULES {
            if self.is_set(rule.field) {
                continue;
            }
            let after_marker = match rule.marker {
                Marker::Contains(marker) => line.find(marker).map(|i| i + marker.len()),
                Marker::ContainsIgnoreCase(marker) => lowered
                    .get_or_insert_with(|| line.to_ascii_lowercase())
                    .find(marker)
                    .map(|i| i + marker.len()),
                Marker::Command(commands) => command
                    .is_some_and(|cmd| cmd.is_any(commands))
                    .then_some(0),
            };
            let Some(offset) = after_marker else {
                continue;
            };
            let params = command.map(|cmd| cmd.params).unwrap_or_default();
            if let Some(value) = rule.parser.parse(line, &line[offset..], params) {
                self.set(rule.field, value, rule.scale);
            }
        }
    }

    /// Number of lines fed so far, blank lines included.
    pub fn lines_seen(&self) -> u64 {
        self.lines_seen
    }

    /// Consume the accumulator and build the metadata record.
    pub fn finish(self, filename: impl Into<String>, size_bytes: u64) -> ProgramMetadata {
        let layer_count = if self.explicit_layers > 0 {
            self.explicit_layers
        } else {
            self.z_heights.len() as u64
        };

        let filename = filename.into();
        debug!(
            "Scanned {} lines of '{}': {} layer markers, {} distinct Z heights",
            self.lines_seen,
            filename,
            self.explicit_layers,
            self.z_heights.len()
        );

        ProgramMetadata {
            filename,
            size_bytes,
            layer_count,
            estimated_duration_seconds: self.duration,
            filament_length_m: self.filament_length,
            filament_weight_g: None,
            bed_temperature_c: self.bed_temperature,
            hotend_temperature_c: self.hotend_temperature,
            first_layer_height_mm: None,
            layer_height_mm: None,
            bounding_box: BoundingBox {
                min: [self.min_x, None, None],
                max: [None, None, None],
            },
        }
    }

    fn is_set(&self, field: Field) -> bool {
        match field {
            Field::Duration => self.duration.is_some(),
            Field::FilamentLength => self.filament_length.is_some(),
            Field::BedTemperature => self.bed_temperature.is_some(),
            Field::HotendTemperature => self.hotend_temperature.is_some(),
            Field::MinX => self.min_x.is_some(),
        }
    }

    fn set(&mut self, field: Field, value: Parsed, scale: f64) {
        let slot = match (field, value) {
            (Field::Duration, Parsed::Count(seconds)) => {
                self.duration.get_or_insert(seconds);
                return;
            }
            (Field::Duration, Parsed::Measure(_)) | (_, Parsed::Count(_)) => return,
            (Field::FilamentLength, _) => &mut self.filament_length,
            (Field::BedTemperature, _) => &mut self.bed_temperature,
            (Field::HotendTemperature, _) => &mut self.hotend_temperature,
            (Field::MinX, _) => &mut self.min_x,
        };
        if let Parsed::Measure(v) = value {
            slot.get_or_insert(v * scale);
        }
    }
}

/// A parsed rule value. Counts stay integral so large durations keep
/// full precision; measures are scaled into the field's unit.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Parsed {
    Count(u64),
    Measure(f64),
}

impl ValueParser {
    fn parse(self, line: &str, rest: &str, params: &str) -> Option<Parsed> {
        if let ValueParser::IntegerAfterMarker = self {
            let digits = leading(rest, |c| c.is_ascii_digit());
            return digits.parse::<u64>().ok().map(Parsed::Count);
        }
        self.parse_measure(line, rest, params).map(Parsed::Measure)
    }

    fn parse_measure(self, line: &str, rest: &str, params: &str) -> Option<f64> {
        match self {
            ValueParser::IntegerAfterMarker => None,
            ValueParser::MetresAfterMarker => {
                let rest = rest.trim_start();
                let number = leading(rest, |c| c.is_ascii_digit() || c == '.');
                if rest[number.len()..].starts_with('m') {
                    parse_finite(number)
                } else {
                    None
                }
            }
            ValueParser::AfterEquals => {
                let (_, value) = rest.split_once('=')?;
                let value = value.trim_start();
                parse_finite(leading(value, |c| c.is_ascii_digit() || c == '.'))
            }
            ValueParser::Word(letter) => parameter_word(params, letter),
            ValueParser::AfterFirstColon => first_number_after_colon(line),
        }
    }
}

/// Leading command word of a G-code line, such as `G1` in `G01Z0.2 F600`.
///
/// Leading zeros of the number are dropped, so `G01` and `G1` are the same
/// command while `G10` stays distinct. `params` is the rest of the line up
/// to any `;` comment.
#[derive(Debug, Clone, Copy)]
struct CommandWord<'a> {
    letter: char,
    number: &'a str,
    subcode: bool,
    params: &'a str,
}

impl<'a> CommandWord<'a> {
    fn split(line: &'a str) -> Option<Self> {
        let code = line.split(';').next().unwrap_or_default();
        let letter = code.chars().next().filter(char::is_ascii_alphabetic)?;
        let after_letter = &code[1..];
        let digits = leading(after_letter, |c| c.is_ascii_digit());
        if digits.is_empty() {
            return None;
        }
        let mut params = &after_letter[digits.len()..];
        // `G29.1` is its own command, not `G29`
        let subcode = params.starts_with('.');
        if subcode {
            params = params[1..].trim_start_matches(|c: char| c.is_ascii_digit());
        }
        let trimmed = digits.trim_start_matches('0');
        Some(Self {
            letter: letter.to_ascii_uppercase(),
            number: if trimmed.is_empty() { "0" } else { trimmed },
            subcode,
            params,
        })
    }

    fn is(&self, command: &str) -> bool {
        let mut chars = command.chars();
        !self.subcode && chars.next() == Some(self.letter) && chars.as_str() == self.number
    }

    fn is_any(&self, commands: &[&str]) -> bool {
        commands.iter().any(|command| self.is(command))
    }
}

/// Read a G-code parameter such as `Z0.2` or `S60` from the parameters of a
/// command. Words may be separated by spaces or packed together (`X10Z0.2`);
/// a letter whose number does not parse is skipped.
fn parameter_word(params: &str, letter: char) -> Option<f64> {
    params.match_indices(letter).find_map(|(i, _)| {
        let rest = &params[i + letter.len_utf8()..];
        let sign = usize::from(rest.starts_with(|c: char| c == '-' || c == '+'));
        let number = leading(&rest[sign..], |c| c.is_ascii_digit() || c == '.');
        parse_finite(&rest[..sign + number.len()])
    })
}

/// Bounding-box minimum X from `;MINX:12.5` or `; min_x: 12.5`.
///
/// Takes the segment between the first and second colon and parses the
/// first run of digits, dots and minus signs in it. Lines without a colon
/// yield nothing. Only X-minimum is derived this way; no other bound is.
fn first_number_after_colon(line: &str) -> Option<f64> {
    let segment = line.split(':').nth(1)?;
    let is_numeric = |c: char| c.is_ascii_digit() || c == '.' || c == '-';
    let start = segment.find(is_numeric)?;
    parse_finite(leading(&segment[start..], is_numeric))
}

fn leading(s: &str, pred: impl Fn(char) -> bool) -> &str {
    let end = s.find(|c: char| !pred(c)).unwrap_or(s.len());
    &s[..end]
}

fn parse_finite(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Extract metadata from a toolpath program.
///
/// Processes each line exactly once, in order. Never fails: unknown and
/// malformed lines are ignored.
///
/// # Arguments
///
/// * `lines` - Program lines in file order
/// * `filename` - Name reported in the result
/// * `size_bytes` - Size reported in the result
///
/// # Examples
///
/// ```rust
/// use print_check::gcode::extract;
///
/// let lines = ["G1 Z0.2 F600", "M140 S60", "G1 Z0.4", ";TIME:3600"];
/// let metadata = extract(lines, "cube.gcode", 42);
/// assert_eq!(metadata.layer_count, 2);
/// assert_eq!(metadata.bed_temperature_c, Some(60.0));
/// ```
pub fn extract<I, S>(lines: I, filename: impl Into<String>, size_bytes: u64) -> ProgramMetadata
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut accumulator = MetadataAccumulator::new();
    for line in lines {
        accumulator.feed(line.as_ref());
    }
    accumulator.finish(filename, size_bytes)
}

/// Analyze a program file on disk.
///
/// The filename in the result is the path's final component and the size
/// comes from filesystem metadata. Bytes that are not valid UTF-8 are
/// replaced rather than rejected.
///
/// # Errors
///
/// Returns an error if:
/// - The file does not exist
/// - The file cannot be opened or read
pub fn analyze_path(path: impl AsRef<Path>) -> Result<ProgramMetadata, PrintCheckError> {
    let path = path.as_ref();
    let display = path.display().to_string();

    if !path.exists() {
        return Err(ProgramError::MissingFile { path: display }.into());
    }

    let read_failed = |e: std::io::Error| ProgramError::ReadFailed {
        path: display.clone(),
        reason: e.to_string(),
    };

    let size_bytes = fs::metadata(path).map_err(read_failed)?.len();
    let mut reader = BufReader::new(File::open(path).map_err(read_failed)?);

    let mut accumulator = MetadataAccumulator::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).map_err(read_failed)? == 0 {
            break;
        }
        accumulator.feed(&String::from_utf8_lossy(&buf));
    }

    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| display.clone());

    Ok(accumulator.finish(filename, size_bytes))
}
