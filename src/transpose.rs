//! Progression transposition
//!
//! Between keys of the same mode every chord moves by the same interval.
//! Across modes each chord keeps its harmonic function: the function in the
//! old key is mapped degree for degree and realised in the new key
//! (`I↔i`, `ii↔ii°`, `iii↔III`, `IV↔iv`, `V↔V`, `vi↔VI`, `vii°↔VII`). Chords
//! with no function in the old key fall back to the chromatic shift.

use crate::analysis::{function_of, realize, RomanNumeral};
use crate::chord::{parse_chord, Chord, Quality};
use crate::key::{Key, Mode};

fn interval(from: &Key, to: &Key) -> i32 {
    i32::from(from.tonic_pc().interval_to(to.tonic_pc()))
}

/// The degree-for-degree counterpart of a diatonic numeral in `to`.
fn counterpart(roman: &RomanNumeral, from: &Key, to: &Key) -> Option<RomanNumeral> {
    // the major V survives both ways; minor v becomes V in a major key
    let mut mapped = if roman.degree == 5 && (roman.upper || to.mode == Mode::Major) {
        RomanNumeral::new(5, true)
    } else {
        RomanNumeral::diatonic(to, roman.degree)?
    };

    mapped.quality = match roman.quality {
        None => None,
        Some(Quality::Dominant7) if roman.degree == 5 && roman.upper => Some(Quality::Dominant7),
        Some(q) if from.seventh_quality(roman.degree) == Some(q) => to.seventh_quality(roman.degree),
        Some(q) => Some(q),
    };
    Some(mapped)
}

fn map_function(roman: &RomanNumeral, from: &Key, to: &Key) -> Option<RomanNumeral> {
    if let Some(target) = &roman.target {
        let target = counterpart(target, from, to)?;
        return Some(RomanNumeral {
            target: Some(Box::new(target.base())),
            ..roman.clone()
        });
    }
    counterpart(roman, from, to)
}

/// Transpose a single chord from `from` to `to`.
pub fn transpose_chord(chord: &Chord, from: &Key, to: &Key) -> Chord {
    let chromatic = || chord.transpose(interval(from, to), to.prefer_flat());
    if from.mode == to.mode {
        return chromatic();
    }
    function_of(chord, from)
        .and_then(|roman| map_function(&roman, from, to))
        .and_then(|roman| realize(&roman, to))
        .unwrap_or_else(chromatic)
}

/// Transpose a sequence of chord symbols. Symbols that do not parse are
/// passed through unchanged.
///
/// # Examples
/// ```
/// use fretwise::{transpose, Key};
///
/// let c = Key::parse("C").unwrap();
/// let eb = Key::parse("Eb").unwrap();
/// assert_eq!(transpose(&["C", "Am", "F", "G7"], &c, &eb), ["Eb", "Cm", "Ab", "Bb7"]);
///
/// let a_minor = Key::parse("Am").unwrap();
/// assert_eq!(transpose(&["Am", "Dm", "E7"], &a_minor, &c), ["C", "F", "G7"]);
/// ```
pub fn transpose<S: AsRef<str>>(chords: &[S], from: &Key, to: &Key) -> Vec<String> {
    chords
        .iter()
        .map(|symbol| {
            let symbol = symbol.as_ref();
            match parse_chord(symbol) {
                Ok(chord) => transpose_chord(&chord, from, to).to_string(),
                Err(e) => {
                    tracing::warn!("not transposing '{}': {}", symbol, e);
                    symbol.to_string()
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> Key {
        Key::parse(s).unwrap()
    }

    #[test]
    fn test_same_mode_is_chromatic() {
        let progression = ["C", "Am", "Dm7", "G7", "E7", "Bb", "Csus4"];
        for from in Key::all().into_iter().filter(|k| k.mode == Mode::Major) {
            for to in Key::all().into_iter().filter(|k| k.mode == Mode::Major) {
                let shift = interval(&from, &to);
                let out = transpose(&progression, &from, &to);
                for (before, after) in progression.iter().zip(&out) {
                    let expected = parse_chord(before).unwrap().transpose(shift, to.prefer_flat());
                    assert!(parse_chord(after).unwrap().same_sound(&expected), "{} -> {}", from, to);
                }
            }
        }
    }

    #[test]
    fn test_spelling_follows_target_key() {
        assert_eq!(transpose(&["C", "F", "G"], &key("C"), &key("F")), ["F", "Bb", "C"]);
        assert_eq!(transpose(&["C", "F", "G"], &key("C"), &key("E")), ["E", "A", "B"]);
        assert_eq!(transpose(&["Am", "E"], &key("Am"), &key("F#m")), ["F#m", "C#"]);
    }

    #[test]
    fn test_minor_to_major_keeps_function() {
        let out = transpose(&["Am", "F", "C", "G"], &key("Am"), &key("C"));
        assert_eq!(out, ["C", "Am", "Em", "Bdim"]);
    }

    #[test]
    fn test_major_to_minor_keeps_function() {
        let out = transpose(&["C", "Dm", "F", "G7", "Am", "Bb"], &key("C"), &key("Cm"));
        assert_eq!(out, ["Cm", "Ddim", "Fm", "G7", "Ab", "Bb"]);
    }

    #[test]
    fn test_sevenths_take_the_new_diatonic_seventh() {
        let out = transpose(&["Am7", "Bm7b5", "E7", "Cmaj7"], &key("Am"), &key("A"));
        assert_eq!(out, ["Amaj7", "Bm7", "E7", "C#m7"]);
    }

    #[test]
    fn test_secondary_dominant_maps_target() {
        // V/V in C is D; in A minor the V's own dominant is B
        assert_eq!(transpose(&["D"], &key("C"), &key("Am")), ["B"]);
    }

    #[test]
    fn test_non_functional_falls_back_to_chromatic() {
        assert_eq!(transpose(&["F#", "Csus2"], &key("C"), &key("Am")), ["D#", "Asus2"]);
        assert_eq!(transpose(&["Hm"], &key("C"), &key("Am")), ["Hm"]);
    }
}
