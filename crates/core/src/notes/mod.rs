//! Scientific pitch names (`C4`, `f#3`, `Bb-1`) to MIDI note numbers.
//! C-1 is note 0 and C4 is middle C (60).

use crate::{midi::MAX_DATA, Result, TrafficJamError};

fn semitone(letter: char) -> Option<i32> {
    match letter.to_ascii_uppercase() {
        'C' => Some(0),
        'D' => Some(2),
        'E' => Some(4),
        'F' => Some(5),
        'G' => Some(7),
        'A' => Some(9),
        'B' => Some(11),
        _ => None,
    }
}

/// Returns the note number for `name`, or `None` if it is not a valid pitch
/// inside the MIDI range.
pub fn note_number(name: &str) -> Option<u8> {
    let mut chars = name.trim().chars();
    let mut pitch = semitone(chars.next()?)?;
    let mut rest = chars.as_str();

    if let Some(tail) = rest.strip_prefix('#') {
        pitch += 1;
        rest = tail;
    } else if let Some(tail) = rest.strip_prefix('b') {
        pitch -= 1;
        rest = tail;
    }

    let octave: i32 = rest.parse().ok()?;
    let number = (octave + 1) * 12 + pitch;
    u8::try_from(number).ok().filter(|n| *n <= MAX_DATA)
}

/// Parses a whitespace separated list of note names in order.
pub fn parse_note_list(spec: &str, context: &str) -> Result<Vec<u8>> {
    let notes = spec
        .split_whitespace()
        .map(|name| {
            note_number(name)
                .ok_or_else(|| TrafficJamError::config(context, format!("unknown note `{name}`")))
        })
        .collect::<Result<Vec<_>>>()?;

    if notes.is_empty() {
        return Err(TrafficJamError::config(context, "empty note list"));
    }
    Ok(notes)
}
